use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

#[derive(Debug, Copy, Clone)]
pub struct Sample1D {
    pub x: f32,
}

impl Sample1D {
    pub const fn new(x: f32) -> Self {
        Sample1D { x }
    }

    /// Split a uniform sample in two at `split`, reusing the remainder.
    pub fn choose<T>(mut self, split: f32, a: T, b: T) -> (Self, T) {
        debug_assert!((0.0..=1.0).contains(&split));
        if self.x < split {
            self.x /= split;
            (self, a)
        } else {
            self.x = (self.x - split) / (1.0 - split);
            (self, b)
        }
    }
}

#[derive(Debug, Copy, Clone)]
pub struct Sample2D {
    pub x: f32,
    pub y: f32,
}

impl Sample2D {
    pub const fn new(x: f32, y: f32) -> Self {
        Sample2D { x, y }
    }
}

pub trait Sampler {
    fn draw_1d(&mut self) -> Sample1D;
    fn draw_2d(&mut self) -> Sample2D;
}

/// Uniform pseudo-random stream. Seeded explicitly so per-tile and
/// per-photon streams stay reproducible across runs and worker counts.
pub struct RandomSampler {
    rng: SmallRng,
}

impl RandomSampler {
    pub fn new(seed: u64) -> RandomSampler {
        RandomSampler {
            rng: SmallRng::seed_from_u64(seed),
        }
    }
}

impl Sampler for RandomSampler {
    fn draw_1d(&mut self) -> Sample1D {
        Sample1D::new(self.rng.gen::<f32>())
    }
    fn draw_2d(&mut self) -> Sample2D {
        Sample2D::new(self.rng.gen::<f32>(), self.rng.gen::<f32>())
    }
}

/// Mix a stream id into a base seed. splitmix64 finalizer, which is enough
/// to decorrelate neighboring tile and photon indices.
pub fn derive_seed(base: u64, stream: u64) -> u64 {
    let mut z = base ^ stream.wrapping_mul(0x9e37_79b9_7f4a_7c15);
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}
