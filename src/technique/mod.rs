mod beta;
mod bpt;
mod pt;
mod upg;

pub use beta::{Beta, FixedBeta, VariableBeta};
pub use bpt::BptBase;
pub use pt::PathTracing;
pub use upg::{BiasedGather, GatherMode, UnbiasedGather, UpgBase};

use rayon::prelude::*;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use crate::camera::{Camera, RenderContext};
use crate::color::{DoubleRgb, RGBColor};
use crate::film::Frame;
use crate::geometry::Ray;
use crate::math::{derive_seed, RandomSampler, Sampler};
use crate::scene::Scene;

/// Hard cap on stored subpath vertices, matching the source.
pub const MAX_SUBPATH: usize = 1024;
/// Edge length of the square work tiles.
pub const TILE_SIZE: usize = 32;

/// A light-to-camera contribution routed into the light image.
#[derive(Debug, Copy, Clone)]
pub struct Splat {
    pub pixel: (usize, usize),
    pub value: RGBColor,
}

/// One member of the estimator family. The object is selected once at
/// startup; everything inside dispatches statically.
pub trait Technique: Send + Sync {
    fn name(&self) -> String;

    /// Per-frame setup (the VCM/UPG scatter phase). Default: nothing.
    fn preprocess(&mut self, _scene: &Scene, _seed: u64, _frame_index: usize) {}

    /// Estimate the radiance arriving along one primary ray, pushing any
    /// light-to-camera splats for the light image.
    fn trace_eye(
        &self,
        scene: &Scene,
        context: &RenderContext,
        sampler: &mut dyn Sampler,
        ray: Ray,
        splats: &mut Vec<Splat>,
    ) -> RGBColor;
}

/// Fixed-capacity vertex storage for one subpath; lives on the worker
/// stack so path sampling never touches the heap.
pub struct SubpathBuffer<T: Copy + Default> {
    items: [T; MAX_SUBPATH],
    len: usize,
}

impl<T: Copy + Default> SubpathBuffer<T> {
    pub fn new() -> Self {
        SubpathBuffer {
            items: [T::default(); MAX_SUBPATH],
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn push(&mut self, item: T) -> bool {
        if self.len == MAX_SUBPATH {
            return false;
        }
        self.items[self.len] = item;
        self.len += 1;
        true
    }

    pub fn pop(&mut self) {
        debug_assert!(self.len > 0);
        self.len -= 1;
    }

    pub fn truncate(&mut self, len: usize) {
        debug_assert!(len <= self.len);
        self.len = len;
    }

    pub fn as_slice(&self) -> &[T] {
        &self.items[..self.len]
    }
}

impl<T: Copy + Default> std::ops::Index<usize> for SubpathBuffer<T> {
    type Output = T;
    fn index(&self, index: usize) -> &T {
        debug_assert!(index < self.len);
        &self.items[index]
    }
}

impl<T: Copy + Default> std::ops::IndexMut<usize> for SubpathBuffer<T> {
    fn index_mut(&mut self, index: usize) -> &mut T {
        debug_assert!(index < self.len);
        &mut self.items[index]
    }
}

struct TileSpan {
    x0: usize,
    y0: usize,
    x1: usize,
    y1: usize,
}

fn generate_tiles(width: usize, height: usize, tile_size: usize) -> Vec<TileSpan> {
    let mut tiles = Vec::new();
    let mut y0 = 0;
    while y0 < height {
        let y1 = (y0 + tile_size).min(height);
        let mut x0 = 0;
        while x0 < width {
            let x1 = (x0 + tile_size).min(width);
            tiles.push(TileSpan { x0, y0, x1, y1 });
            x0 = x1;
        }
        y0 = y1;
    }
    tiles
}

struct TileResult {
    tile_index: usize,
    eye: Vec<DoubleRgb>,
    splats: Vec<Splat>,
}

/// Render one frame: fork-join over tiles, serpentine pixel order inside a
/// tile, one jittered path per pixel. Eye contributions go to the
/// tile-owned region; splats are buffered per tile and flushed into the
/// mutex-guarded light image in tile order after the join, so the result
/// is bit-identical for any worker count. Returns false when the frame
/// was cancelled between tiles (nothing is committed then).
pub fn render_frame(
    technique: &mut dyn Technique,
    scene: &Scene,
    camera: &Camera,
    frame: &mut Frame,
    seed: u64,
    cancel: &AtomicBool,
) -> bool {
    let frame_index = frame.num_samples;
    technique.preprocess(scene, seed, frame_index);

    let (width, height) = (frame.width(), frame.height());
    let context = RenderContext::new(camera, (width, height));
    let tiles = generate_tiles(width, height, TILE_SIZE);
    let technique: &dyn Technique = technique;

    let results: Vec<Option<TileResult>> = tiles
        .par_iter()
        .enumerate()
        .map(|(tile_index, tile)| {
            if cancel.load(Ordering::Relaxed) {
                return None;
            }
            let tile_seed = derive_seed(
                seed,
                (frame_index as u64) << 40 | (tile.y0 as u64) << 20 | tile.x0 as u64,
            );
            let mut sampler = RandomSampler::new(tile_seed);
            let mut context = context.clone();
            let tile_width = tile.x1 - tile.x0;
            let tile_height = tile.y1 - tile.y0;
            let mut eye = vec![DoubleRgb::ZERO; tile_width * tile_height];
            let mut splats = Vec::new();

            for row in 0..tile_height {
                let y = tile.y0 + row;
                // serpentine order for coherent rays
                for column in 0..tile_width {
                    let x = if row % 2 == 0 {
                        tile.x0 + column
                    } else {
                        tile.x1 - 1 - column
                    };
                    let jitter = sampler.draw_2d();
                    let pixel = (x as f32 + jitter.x, y as f32 + jitter.y);
                    context.pixel_position = pixel;
                    let ray = context.shoot(pixel.0, pixel.1);
                    let radiance =
                        technique.trace_eye(scene, &context, &mut sampler, ray, &mut splats);
                    debug_assert!(
                        radiance.is_finite(),
                        "non-finite radiance at {:?}: {:?}",
                        pixel,
                        radiance
                    );
                    eye[row * tile_width + (x - tile.x0)] += radiance.or_zero().into();
                }
            }
            Some(TileResult {
                tile_index,
                eye,
                splats,
            })
        })
        .collect();

    if results.iter().any(Option::is_none) {
        // cancelled mid-frame; drop partial results
        frame.eye_image.fill(DoubleRgb::ZERO);
        frame.light_image.fill(DoubleRgb::ZERO);
        return false;
    }

    {
        let light_image = Mutex::new(&mut frame.light_image);
        for result in results.into_iter().flatten() {
            let tile = &tiles[result.tile_index];
            let tile_width = tile.x1 - tile.x0;
            for (offset, value) in result.eye.iter().enumerate() {
                let x = tile.x0 + offset % tile_width;
                let y = tile.y0 + offset / tile_width;
                frame.eye_image.buffer[y * width + x] += *value;
            }
            let mut locked = light_image.lock().unwrap();
            for splat in &result.splats {
                let value = splat.value.or_zero();
                locked.buffer[splat.pixel.1 * width + splat.pixel.0] += value.into();
            }
        }
    }

    frame.commit();
    true
}
