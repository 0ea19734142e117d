use std::{
    io::{self, BufRead},
    path::PathBuf,
    thread,
    time::Duration,
};

use anyhow::{Context, Result, anyhow, bail};
use clap::Parser;
use crossbeam_channel::{Sender, unbounded};
use fitquest::{
    BrightnessPredicate, Control, Exercise, ExerciseHistory, PipelineScheduler, Routine,
    SessionConfig, SessionOutcome, SessionSignal, SummarySink,
    pipeline::{self, CameraBackend, StillImageCamera, SyntheticCamera},
    star_rating,
    summary::MAX_STARS,
};

/// Count reps for a routine from a live camera or replayed images.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Camera device index
    #[arg(short, long, default_value_t = 0)]
    camera: u32,

    /// Replay png/jpeg files from this directory instead of a camera
    #[arg(long, conflicts_with = "synthetic")]
    images: Option<PathBuf>,

    /// Feed uniform frames of this gray level instead of a camera
    #[arg(long)]
    synthetic: Option<u8>,

    /// Capture tick in milliseconds
    #[arg(long, default_value_t = 16)]
    tick_ms: u64,

    /// Rotate frames by 180 degrees (mirrored webcams)
    #[arg(long)]
    rotate: bool,

    /// List cameras and exit
    #[arg(long)]
    list_cameras: bool,

    /// Exercise as name:reps:sets[:angle], repeatable
    #[arg(short, long = "exercise")]
    exercises: Vec<String>,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    if args.list_cameras {
        return list_cameras();
    }

    let routine = build_routine(&args.exercises)?;
    let config = SessionConfig::default()
        .with_camera_index(args.camera)
        .with_tick_period(Duration::from_millis(args.tick_ms))
        .with_rotation(args.rotate);
    let camera = select_camera(&args)?;

    let (control_tx, control_rx) = unbounded();
    spawn_stdin_controls(control_tx)?;
    println!("commands: q = exit, y/n = confirm/decline exit, a = skip exercise");

    let mut scheduler = PipelineScheduler::new(config, camera, routine.cursor());
    let outcome = pipeline::drive(&mut scheduler, &control_rx, |_, signal| report(signal))?;
    log::debug!("{} frames replaced before scoring", scheduler.frames_dropped());

    match outcome {
        SessionOutcome::Completed(summary) => {
            println!("\nRoutine '{}' complete", routine.name);
            for entry in &summary.entries {
                println!(
                    "  {:<16} {:>6.3}  {}",
                    entry.exercise.name,
                    entry.mean_score,
                    stars(star_rating(entry.mean_score))
                );
            }

            println!("  overall          {:>6.3}", summary.overall_mean());

            let mut history = ExerciseHistory::new();
            history.record(&summary);
            println!("\nBy exercise");
            for name in history.exercises() {
                println!(
                    "  {:<16} {:>6.3}  {}",
                    name,
                    history.average(name),
                    stars(history.stars(name))
                );
            }
        }
        SessionOutcome::Cancelled => println!("\nRoutine cancelled"),
    }

    Ok(())
}

fn report(signal: &SessionSignal) {
    match signal {
        SessionSignal::AttemptStarted {
            exercise,
            target_reps,
        } => println!("> {exercise}: {target_reps} reps"),
        SessionSignal::AttemptComplete {
            exercise,
            mean_score,
            next,
        } => println!("  {exercise} done (score {mean_score:.3}), next up: {next}"),
        SessionSignal::ExitPending => println!("exit this routine? [y/n]"),
        SessionSignal::Resumed => println!("resuming"),
        SessionSignal::RoutineComplete(_) | SessionSignal::Cancelled => {}
    }
}

fn stars(count: u8) -> String {
    (0..MAX_STARS)
        .map(|i| if i < count { '*' } else { '.' })
        .collect()
}

fn parse_exercise(spec: &str) -> Result<Exercise> {
    let parts: Vec<&str> = spec.split(':').collect();
    if !(3..=4).contains(&parts.len()) || parts[0].is_empty() {
        bail!("expected name:reps:sets[:angle], got '{spec}'");
    }

    let reps = parts[1]
        .parse()
        .with_context(|| format!("invalid reps in '{spec}'"))?;
    let sets = parts[2]
        .parse()
        .with_context(|| format!("invalid sets in '{spec}'"))?;
    let angles = match parts.get(3) {
        Some(angle) => vec![
            angle
                .parse()
                .with_context(|| format!("invalid angle in '{spec}'"))?,
        ],
        None => Vec::new(),
    };

    let exercise = Exercise::new(parts[0], reps, sets).with_targets(Vec::new(), angles);
    let predicate = BrightnessPredicate::for_exercise(&exercise);
    Ok(exercise.with_predicate(predicate))
}

fn build_routine(specs: &[String]) -> Result<Routine> {
    let mut routine = Routine::new("custom", "from the command line");
    let specs: Vec<&str> = if specs.is_empty() {
        routine.name = "demo".to_string();
        vec!["squat:5:2:90", "lunge:3:1:60"]
    } else {
        specs.iter().map(String::as_str).collect()
    };

    for spec in specs {
        routine.add_exercise(parse_exercise(spec)?);
    }
    Ok(routine)
}

fn select_camera(args: &Args) -> Result<Box<dyn CameraBackend>> {
    if let Some(dir) = &args.images {
        return Ok(Box::new(StillImageCamera::from_dir(dir)?));
    }
    if let Some(value) = args.synthetic {
        return Ok(Box::new(SyntheticCamera::new(320, 240, value)));
    }

    #[cfg(feature = "camera-nokhwa")]
    {
        Ok(Box::new(pipeline::NokhwaBackend))
    }
    #[cfg(not(feature = "camera-nokhwa"))]
    {
        Err(anyhow!(
            "built without camera support; use --images or --synthetic"
        ))
    }
}

fn list_cameras() -> Result<()> {
    #[cfg(feature = "camera-nokhwa")]
    {
        let cameras = pipeline::available_cameras()?;
        if cameras.is_empty() {
            println!("no cameras found");
        }
        for camera in cameras {
            println!("{}: {}", camera.index, camera.label);
        }
        Ok(())
    }
    #[cfg(not(feature = "camera-nokhwa"))]
    {
        Err(anyhow!("built without camera support"))
    }
}

fn spawn_stdin_controls(tx: Sender<Control>) -> Result<()> {
    thread::Builder::new()
        .name("fitquest-stdin".to_string())
        .spawn(move || {
            for line in io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                let control = match line.trim() {
                    "q" => Control::RequestExit,
                    "y" => Control::ConfirmExit,
                    "n" => Control::DeclineExit,
                    "a" => Control::Advance,
                    "" => continue,
                    other => {
                        log::warn!("unknown command '{other}'");
                        continue;
                    }
                };
                if tx.send(control).is_err() {
                    break;
                }
            }
        })
        .map_err(|err| anyhow!("failed to spawn stdin reader: {err}"))?;
    Ok(())
}
