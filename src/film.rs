use serde::Serialize;

use crate::color::{DoubleRgb, RGBColor};

/// Flat row-major 2-d buffer, indexed `y * width + x`.
#[derive(Debug, Clone)]
pub struct Vec2D<T> {
    pub buffer: Vec<T>,
    pub width: usize,
    pub height: usize,
}

impl<T: Copy> Vec2D<T> {
    pub fn new(width: usize, height: usize, fill: T) -> Self {
        Vec2D {
            buffer: vec![fill; width * height],
            width,
            height,
        }
    }

    pub fn at(&self, x: usize, y: usize) -> T {
        self.buffer[y * self.width + x]
    }

    pub fn write_at(&mut self, x: usize, y: usize, value: T) {
        self.buffer[y * self.width + x] = value;
    }

    pub fn fill(&mut self, value: T) {
        self.buffer.fill(value);
    }
}

/// Metadata published next to every saved frame.
#[derive(Debug, Clone, Serialize)]
pub struct FrameMetadata {
    pub technique: String,
    pub num_samples: usize,
    pub resolution: (usize, usize),
    pub num_intersect_rays: usize,
    pub num_occluded_rays: usize,
    pub epsilon: f64,
    pub total_time: f64,
}

/// Per-frame accumulation state: the running average image, the working
/// eye/light buffers one frame writes into, and the RMS convergence delta
/// of the most recent commit.
pub struct Frame {
    pub accum: Vec2D<DoubleRgb>,
    pub eye_image: Vec2D<DoubleRgb>,
    pub light_image: Vec2D<DoubleRgb>,
    pub num_samples: usize,
    pub epsilon: f64,
}

impl Frame {
    pub fn new(width: usize, height: usize) -> Frame {
        Frame {
            accum: Vec2D::new(width, height, DoubleRgb::ZERO),
            eye_image: Vec2D::new(width, height, DoubleRgb::ZERO),
            light_image: Vec2D::new(width, height, DoubleRgb::ZERO),
            num_samples: 0,
            epsilon: f64::INFINITY,
        }
    }

    pub fn width(&self) -> usize {
        self.accum.width
    }

    pub fn height(&self) -> usize {
        self.accum.height
    }

    /// Fold the working buffers into the running average, update the RMS
    /// per-pixel delta, and zero the buffers for the next frame.
    pub fn commit(&mut self) {
        let n = self.num_samples as f64;
        let mut delta_squared_sum = 0.0f64;
        for index in 0..self.accum.buffer.len() {
            let previous = self.accum.buffer[index];
            let sample = self.eye_image.buffer[index] + self.light_image.buffer[index];
            let updated = (previous * n + sample) / (n + 1.0);
            let delta = (updated - previous).l1_norm();
            delta_squared_sum += delta * delta;
            self.accum.buffer[index] = updated;
        }
        self.eye_image.fill(DoubleRgb::ZERO);
        self.light_image.fill(DoubleRgb::ZERO);
        self.num_samples += 1;
        self.epsilon = (delta_squared_sum / self.accum.buffer.len() as f64).sqrt();
    }

    pub fn to_rgb(&self) -> Vec2D<RGBColor> {
        Vec2D {
            buffer: self.accum.buffer.iter().map(|c| c.to_rgb()).collect(),
            width: self.accum.width,
            height: self.accum.height,
        }
    }
}
