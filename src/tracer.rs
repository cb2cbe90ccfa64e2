use crate::math::*;

/// Hit record in the intersector contract: parametric distance,
/// barycentrics, and the (geometry, primitive) pair. Geometry id 0 is
/// reserved for the area-light aggregate; ids >= 1 map to meshes.
#[derive(Debug, Copy, Clone)]
pub struct RayHit {
    pub t: f32,
    pub u: f32,
    pub v: f32,
    pub geom_id: u32,
    pub prim_id: u32,
}

#[derive(Debug, Copy, Clone)]
pub struct Triangle {
    pub a: Vec3,
    pub edge_ab: Vec3,
    pub edge_ac: Vec3,
}

impl Triangle {
    pub fn new(a: Vec3, b: Vec3, c: Vec3) -> Self {
        Triangle {
            a,
            edge_ab: b - a,
            edge_ac: c - a,
        }
    }

    /// Moller-Trumbore, two-sided.
    fn intersect(&self, origin: Vec3, direction: Vec3, tnear: f32, tfar: f32) -> Option<(f32, f32, f32)> {
        let pvec = direction.cross(self.edge_ac);
        let det = self.edge_ab * pvec;
        if det.abs() < 1e-12 {
            return None;
        }
        let inv_det = 1.0 / det;
        let tvec = origin - self.a;
        let u = (tvec * pvec) * inv_det;
        if !(0.0..=1.0).contains(&u) {
            return None;
        }
        let qvec = tvec.cross(self.edge_ab);
        let v = (direction * qvec) * inv_det;
        if v < 0.0 || u + v > 1.0 {
            return None;
        }
        let t = (self.edge_ac * qvec) * inv_det;
        if t < tnear || t > tfar {
            return None;
        }
        Some((t, u, v))
    }

    pub fn geometric_normal(&self) -> Vec3 {
        self.edge_ab.cross(self.edge_ac).normalized()
    }

    pub fn area(&self) -> f32 {
        0.5 * self.edge_ab.cross(self.edge_ac).norm()
    }
}

/// Brute-force triangle caster behind the scene facade. The facade is the
/// replaceable seam; a BVH or an external kernel slots in here without the
/// estimators noticing.
pub struct Tracer {
    geometries: Vec<Vec<Triangle>>,
}

impl Tracer {
    pub fn new(geometries: Vec<Vec<Triangle>>) -> Self {
        Tracer { geometries }
    }

    pub fn intersect(
        &self,
        origin: Vec3,
        direction: Vec3,
        tnear: f32,
        tfar: f32,
        skip_lights: bool,
    ) -> Option<RayHit> {
        let mut best: Option<RayHit> = None;
        let mut closest = tfar;
        let first_geom = usize::from(skip_lights);
        for (geom_id, triangles) in self.geometries.iter().enumerate().skip(first_geom) {
            for (prim_id, triangle) in triangles.iter().enumerate() {
                if let Some((t, u, v)) = triangle.intersect(origin, direction, tnear, closest) {
                    closest = t;
                    best = Some(RayHit {
                        t,
                        u,
                        v,
                        geom_id: geom_id as u32,
                        prim_id: prim_id as u32,
                    });
                }
            }
        }
        best
    }

    /// Any-hit test of the open segment `a -> b` against mesh geometry.
    /// Emitter faces do not occlude (the source's occluder mask).
    pub fn segment_occluded(&self, a: Vec3, b: Vec3) -> bool {
        let direction = b - a;
        for triangles in self.geometries.iter().skip(1) {
            for triangle in triangles {
                if triangle.intersect(a, direction, 0.0, 1.0).is_some() {
                    return true;
                }
            }
        }
        false
    }

    pub fn triangle(&self, geom_id: u32, prim_id: u32) -> &Triangle {
        &self.geometries[geom_id as usize][prim_id as usize]
    }
}
