//! Frame-difference motion scoring
//!
//! The score is the mean squared difference of luma between the current
//! frame and the previous one, sampled on a coarse grid.

use crate::camera::driver::{Frame, MotionAnalyzer};

/// Sampling step in pixels along each axis
const GRID_STEP: u32 = 4;

/// Compares each frame with the one before it
#[derive(Debug, Default)]
pub struct FrameDiffAnalyzer {
    previous: Option<(u32, u32, Vec<u8>)>,
}

impl FrameDiffAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MotionAnalyzer for FrameDiffAnalyzer {
    fn score_frame(&mut self, frame: &Frame) -> f64 {
        let luma = sample_luma(frame);
        let score = match &self.previous {
            Some((w, h, prev)) if *w == frame.width && *h == frame.height => {
                mean_squared_error(prev, &luma)
            }
            _ => 0.0,
        };
        self.previous = Some((frame.width, frame.height, luma));
        score
    }

    fn reset(&mut self) {
        self.previous = None;
    }
}

fn sample_luma(frame: &Frame) -> Vec<u8> {
    let mut samples = Vec::new();
    let stride = frame.width as usize * 3;
    for y in (0..frame.height).step_by(GRID_STEP as usize) {
        for x in (0..frame.width).step_by(GRID_STEP as usize) {
            let offset = y as usize * stride + x as usize * 3;
            if let Some(px) = frame.data.get(offset..offset + 3) {
                let luma = (299 * px[0] as u32 + 587 * px[1] as u32 + 114 * px[2] as u32) / 1000;
                samples.push(luma as u8);
            }
        }
    }
    samples
}

fn mean_squared_error(a: &[u8], b: &[u8]) -> f64 {
    let n = a.len().min(b.len());
    if n == 0 {
        return 0.0;
    }
    let sum: f64 = a
        .iter()
        .zip(b)
        .map(|(x, y)| {
            let d = *x as f64 - *y as f64;
            d * d
        })
        .sum();
    sum / n as f64
}
