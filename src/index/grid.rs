use super::Positioned;
use crate::math::Vec3;

use std::collections::HashMap;

/// Uniform hash grid with cell edge equal to the query radius, so a radius
/// query only has to visit the 27 surrounding cells.
pub struct HashGrid3D<T> {
    items: Vec<T>,
    cells: HashMap<(i32, i32, i32), Vec<u32>>,
    cell_size: f32,
}

impl<T: Positioned> HashGrid3D<T> {
    pub fn new(items: Vec<T>, cell_size: f32) -> Self {
        debug_assert!(cell_size > 0.0);
        let mut cells: HashMap<(i32, i32, i32), Vec<u32>> = HashMap::new();
        for (index, item) in items.iter().enumerate() {
            cells
                .entry(Self::cell_of(item.position(), cell_size))
                .or_default()
                .push(index as u32);
        }
        HashGrid3D {
            items,
            cells,
            cell_size,
        }
    }

    fn cell_of(p: Vec3, cell_size: f32) -> (i32, i32, i32) {
        (
            (p.x / cell_size).floor() as i32,
            (p.y / cell_size).floor() as i32,
            (p.z / cell_size).floor() as i32,
        )
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Invoke `visitor` for every stored item within `radius` of `center`.
    /// The radius must not exceed the construction cell size.
    pub fn query_within_radius<F: FnMut(&T)>(&self, center: Vec3, radius: f32, mut visitor: F) {
        debug_assert!(radius <= self.cell_size * (1.0 + 1e-4));
        let radius_squared = radius * radius;
        let (cx, cy, cz) = Self::cell_of(center, self.cell_size);
        for dx in -1..=1 {
            for dy in -1..=1 {
                for dz in -1..=1 {
                    let Some(bucket) = self.cells.get(&(cx + dx, cy + dy, cz + dz)) else {
                        continue;
                    };
                    for &index in bucket {
                        let item = &self.items[index as usize];
                        if item.position().distance_squared(center) <= radius_squared {
                            visitor(item);
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::math::{RandomSampler, Sampler};
    use proptest::prelude::*;

    fn brute_force(points: &[Vec3], center: Vec3, radius: f32) -> Vec<usize> {
        points
            .iter()
            .enumerate()
            .filter(|(_, p)| p.distance_squared(center) <= radius * radius)
            .map(|(i, _)| i)
            .collect()
    }

    #[test]
    fn test_completeness_against_brute_force() {
        let mut sampler = RandomSampler::new(13);
        let points: Vec<Vec3> = (0..500)
            .map(|_| {
                let s = sampler.draw_2d();
                let t = sampler.draw_1d();
                Vec3::new(s.x, s.y, t.x)
            })
            .collect();
        let radius = 0.09;
        let grid = HashGrid3D::new(points.clone(), radius);
        for _ in 0..100 {
            let s = sampler.draw_2d();
            let t = sampler.draw_1d();
            let center = Vec3::new(s.x, s.y, t.x);
            let mut found = Vec::new();
            grid.query_within_radius(center, radius, |p| {
                found.push(points.iter().position(|q| q == p).unwrap())
            });
            found.sort_unstable();
            assert_eq!(found, brute_force(&points, center, radius));
        }
    }

    proptest! {
        #[test]
        fn prop_grid_matches_brute_force(
            raw in prop::collection::vec((-10.0f32..10.0, -10.0f32..10.0, -10.0f32..10.0), 0..200),
            center in (-10.0f32..10.0, -10.0f32..10.0, -10.0f32..10.0),
            radius in 0.01f32..2.0,
        ) {
            let points: Vec<Vec3> = raw.iter().map(|&(x, y, z)| Vec3::new(x, y, z)).collect();
            let grid = HashGrid3D::new(points.clone(), radius);
            let mut count = 0usize;
            let center = Vec3::new(center.0, center.1, center.2);
            grid.query_within_radius(center, radius, |_| count += 1);
            prop_assert_eq!(count, brute_force(&points, center, radius).len());
        }
    }
}
