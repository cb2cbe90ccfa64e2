use crate::math::*;

#[derive(Debug, Copy, Clone)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
}

impl Ray {
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Ray { origin, direction }
    }

    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }
}

#[derive(Debug, Copy, Clone)]
pub struct BoundingSphere {
    pub center: Vec3,
    pub radius: f32,
}

/// A point on scene geometry together with its shading frame.
///
/// `tangent` is orthonormal with column 1 holding the shading normal;
/// `gnormal` is the geometric normal. Both are flipped on intersection so
/// the incoming direction satisfies `dot(omega_in, gnormal) >= 0`.
/// Negative material ids designate emitters (`light_id = -id - 1`).
#[derive(Debug, Copy, Clone)]
pub struct SurfacePoint {
    pub position: Vec3,
    pub tangent: Mat3,
    pub gnormal: Vec3,
    pub material_id: i32,
}

impl SurfacePoint {
    pub fn normal(&self) -> Vec3 {
        self.tangent.cols[1]
    }

    pub fn is_light(&self) -> bool {
        self.material_id < 0
    }

    pub fn light_id(&self) -> usize {
        debug_assert!(self.is_light());
        (-self.material_id - 1) as usize
    }

    pub fn to_surface(&self, world: Vec3) -> Vec3 {
        self.tangent.to_local(world)
    }

    pub fn to_world(&self, local: Vec3) -> Vec3 {
        self.tangent.to_world(local)
    }
}

/// Geometry terms of a directed path edge `u -> v`.
///
/// `b_cos_theta` is measured at `u` (the vertex that sampled the edge) and
/// `f_cos_theta` at `v`; both use the magnitude of the cosine so delta
/// transmission through a surface keeps a nonzero edge. The two geometry
/// terms are numerically identical and named by the recurrence direction
/// that consumes them.
#[derive(Debug, Copy, Clone)]
pub struct Edge {
    pub f_cos_theta: f32,
    pub b_cos_theta: f32,
    pub f_geometry: f32,
    pub b_geometry: f32,
}

impl Edge {
    pub fn new(from: &SurfacePoint, to: &SurfacePoint, omega: Vec3) -> Edge {
        let distance_squared = from.position.distance_squared(to.position);
        let b_cos_theta = (omega * from.normal()).abs();
        let f_cos_theta = (omega * to.normal()).abs();
        let geometry = f_cos_theta * b_cos_theta / distance_squared;
        Edge {
            f_cos_theta,
            b_cos_theta,
            f_geometry: geometry,
            b_geometry: geometry,
        }
    }

    pub fn between(from: &SurfacePoint, to: &SurfacePoint) -> Edge {
        let omega = (to.position - from.position).normalized();
        Edge::new(from, to, omega)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn flat_point(position: Vec3, normal: Vec3) -> SurfacePoint {
        SurfacePoint {
            position,
            tangent: Mat3::from_normal(normal),
            gnormal: normal,
            material_id: 0,
        }
    }

    #[test]
    fn test_edge_between_parallel_planes() {
        let a = flat_point(Vec3::ZERO, Vec3::Y);
        let b = flat_point(Vec3::new(0.0, 2.0, 0.0), -Vec3::Y);
        let edge = Edge::between(&a, &b);
        assert!((edge.b_cos_theta - 1.0).abs() < 1e-6);
        assert!((edge.f_cos_theta - 1.0).abs() < 1e-6);
        assert!((edge.f_geometry - 0.25).abs() < 1e-6);
        assert_eq!(edge.f_geometry, edge.b_geometry);
    }

    #[test]
    fn test_edge_grazing_is_zero() {
        let a = flat_point(Vec3::ZERO, Vec3::Y);
        let b = flat_point(Vec3::new(1.0, 0.0, 0.0), Vec3::Y);
        let edge = Edge::between(&a, &b);
        assert_eq!(edge.b_cos_theta, 0.0);
        assert_eq!(edge.f_geometry, 0.0);
    }

    #[test]
    fn test_light_id_round_trip() {
        let mut p = flat_point(Vec3::ZERO, Vec3::Y);
        p.material_id = -3;
        assert!(p.is_light());
        assert_eq!(p.light_id(), 2);
    }
}
