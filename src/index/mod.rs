mod grid;
mod kdtree;

pub use grid::HashGrid3D;
pub use kdtree::KdTree3D;

use crate::math::Vec3;

/// Items stored in a range-search structure expose a query position.
pub trait Positioned {
    fn position(&self) -> Vec3;
}

impl Positioned for Vec3 {
    fn position(&self) -> Vec3 {
        *self
    }
}
