use std::time::Instant;

use image::{RgbaImage, imageops};

#[derive(Clone, Debug)]
pub struct Frame {
    pub rgba: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Capture tick that produced this frame.
    pub tick: u64,
    pub timestamp: Instant,
}

impl Frame {
    pub fn new(rgba: Vec<u8>, width: u32, height: u32, tick: u64) -> Self {
        Self {
            rgba,
            width,
            height,
            tick,
            timestamp: Instant::now(),
        }
    }

    /// Uniform gray frame, handy for headless sources.
    pub fn filled(width: u32, height: u32, value: u8, tick: u64) -> Self {
        let mut rgba = vec![value; (width as usize) * (height as usize) * 4];
        for px in rgba.chunks_exact_mut(4) {
            px[3] = 255;
        }
        Self::new(rgba, width, height, tick)
    }

    pub fn pixel_count(&self) -> usize {
        (self.width as usize) * (self.height as usize)
    }

    /// Flips both axes, which is what a mirrored webcam feed needs before scoring.
    pub fn rotated_180(mut self) -> Self {
        if self.rgba.len() != self.pixel_count() * 4 {
            log::debug!(
                "frame buffer does not match {}x{}, skipping rotation",
                self.width,
                self.height
            );
            return self;
        }

        let rgba = std::mem::take(&mut self.rgba);
        if let Some(mut image) = RgbaImage::from_raw(self.width, self.height, rgba) {
            imageops::rotate180_in_place(&mut image);
            self.rgba = image.into_raw();
        }
        self
    }

    pub fn mean_brightness(&self) -> f32 {
        let total: f32 = self
            .rgba
            .chunks_exact(4)
            .map(|px| (px[0] as f32 + px[1] as f32 + px[2] as f32) / 3.0)
            .sum();
        total / (self.rgba.len() / 4).max(1) as f32
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReturnCode {
    Success,
    Failure,
    /// The body parts the exercise needs were not all visible.
    OutOfFrame,
}

impl ReturnCode {
    pub fn is_success(&self) -> bool {
        matches!(self, ReturnCode::Success)
    }
}

/// What a predicate reports for one frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Evaluation {
    pub code: ReturnCode,
    pub measured_angle: f64,
    pub ideal_angle: f64,
}

impl Evaluation {
    pub fn new(code: ReturnCode, measured_angle: f64, ideal_angle: f64) -> Self {
        Self {
            code,
            measured_angle,
            ideal_angle,
        }
    }
}

/// One scored frame, sent from the scoring worker to the tick thread.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScoreSample {
    pub attempt: u64,
    pub tick: u64,
    pub score: f64,
    pub success: bool,
}
