use crate::geometry::{Ray, SurfacePoint};
use crate::math::*;

/// Pinhole camera: field of view along x, a view matrix, near/far planes.
/// The estimators only consume the rotation blocks and the focal factors
/// derived from `fov_x`, aspect ratio and resolution.
#[derive(Debug, Clone)]
pub struct Camera {
    pub position: Vec3,
    pub view_to_world: Mat3,
    pub fov_x: f32,
    pub near: f32,
    pub far: f32,
}

impl Camera {
    pub fn look_at(position: Vec3, target: Vec3, up: Vec3, fov_x: f32) -> Camera {
        let forward = (target - position).normalized();
        let right = up.cross(forward).normalized();
        let true_up = forward.cross(right);
        Camera {
            position,
            // camera frame: column 1 (the normal slot) is the optical axis
            view_to_world: Mat3::from_cols(right, forward, true_up),
            fov_x,
            near: 0.1,
            far: 100.0,
        }
    }
}

/// Per-tile rendering context: the camera blocks and focal factors for one
/// resolution, plus the pixel currently being traced.
#[derive(Debug, Clone)]
pub struct RenderContext {
    pub view_to_world: Mat3,
    pub world_to_view: Mat3,
    pub camera_position: Vec3,
    pub resolution: (usize, usize),
    pub tan_half_x: f32,
    pub tan_half_y: f32,
    pub focal_length_y: f32,
    pub focal_factor_y: f32,
    pub pixel_position: (f32, f32),
}

impl RenderContext {
    pub fn new(camera: &Camera, resolution: (usize, usize)) -> RenderContext {
        let aspect = resolution.0 as f32 / resolution.1 as f32;
        let tan_half_x = (camera.fov_x * 0.5).tan();
        let tan_half_y = tan_half_x / aspect;
        let focal_length_y = 1.0 / tan_half_y;
        RenderContext {
            view_to_world: camera.view_to_world,
            world_to_view: camera.view_to_world.transpose(),
            camera_position: camera.position,
            resolution,
            tan_half_x,
            tan_half_y,
            focal_length_y,
            // per-pixel importance over the image plane, folded together
            // with the one-light-path-per-pixel normalization: splats
            // scaled by this factor land in the same units as eye samples
            focal_factor_y: 1.0 / (4.0 * tan_half_x * tan_half_y),
            pixel_position: (0.0, 0.0),
        }
    }

    /// Primary ray through the (jittered) pixel position.
    pub fn shoot(&self, x: f32, y: f32) -> Ray {
        let (width, height) = (self.resolution.0 as f32, self.resolution.1 as f32);
        let ndc_x = 2.0 * x / width - 1.0;
        let ndc_y = 1.0 - 2.0 * y / height;
        let view = Vec3::new(
            ndc_x * self.tan_half_x,
            ndc_y * self.tan_half_y,
            1.0,
        );
        // view space is (right, up, forward); the frame stores forward in
        // the normal column, so reorder on the way out
        let world = self.view_to_world.to_world(Vec3::new(view.x, view.z, view.y));
        Ray::new(self.camera_position, world.normalized())
    }

    /// Project a world direction from the camera position onto the image.
    /// Returns the pixel coordinates and the cosine to the optical axis.
    pub fn project(&self, direction: Vec3) -> Option<((usize, usize), f32)> {
        let local = self.world_to_view.to_local(direction);
        // local y is the forward component
        if local.y <= 0.0 {
            return None;
        }
        let inv_forward = 1.0 / local.y;
        let ndc_x = local.x * inv_forward / self.tan_half_x;
        let ndc_y = local.z * inv_forward / self.tan_half_y;
        if !(-1.0..1.0).contains(&ndc_x) || !(-1.0..1.0).contains(&ndc_y) {
            return None;
        }
        let (width, height) = (self.resolution.0 as f32, self.resolution.1 as f32);
        let px = ((ndc_x + 1.0) * 0.5 * width) as usize;
        let py = ((1.0 - ndc_y) * 0.5 * height) as usize;
        let cos_theta = local.y / local.norm();
        Some((
            (px.min(self.resolution.0 - 1), py.min(self.resolution.1 - 1)),
            cos_theta,
        ))
    }

    /// The delta aperture as a surface point: position at the pinhole,
    /// normal along the optical axis.
    pub fn camera_surface(&self) -> SurfacePoint {
        SurfacePoint {
            position: self.camera_position,
            tangent: self.view_to_world,
            gnormal: self.view_to_world.cols[1],
            material_id: 0,
        }
    }
}

/// The canonical viewpoint for the built-in Cornell box.
pub fn cornell_camera() -> Camera {
    Camera::look_at(
        Vec3::new(0.28, 0.28, -0.8),
        Vec3::new(0.28, 0.28, 0.0),
        Vec3::Y,
        2.0 * (0.28f32 / 0.8).atan(),
    )
}
