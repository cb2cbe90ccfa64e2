mod lights;

pub use lights::{AreaLights, LightSample, LsdfQuery};

use std::sync::atomic::{AtomicUsize, Ordering};

use crate::bsdf::{BsdfEnum, BsdfQuery, BsdfSample, LambertianBsdf, LightBsdf, RayCaster};
use crate::geometry::{BoundingSphere, SurfacePoint};
use crate::math::*;
use crate::tracer::{RayHit, Tracer, Triangle};
use crate::RGBColor;

/// Self-intersection offset for ray origins, matching the source facade.
const RAY_EPSILON: f32 = 5e-4;
/// Shadow-segment endpoints are shifted this far along geometric normals.
pub const OCCLUSION_OFFSET: f32 = 1e-3;

pub struct Mesh {
    pub name: String,
    pub material_id: usize,
    pub vertices: Vec<Vec3>,
    pub tangents: Vec<Mat3>,
    pub indices: Vec<u32>,
}

/// Uniform interface over the ray caster, the emitters, and the material
/// table. Everything behind it is immutable during a frame and shared
/// read-only across workers; the two counters are relaxed atomics.
pub struct Scene {
    pub meshes: Vec<Mesh>,
    pub bsdfs: Vec<BsdfEnum>,
    pub lights: AreaLights,
    pub bounding_sphere: BoundingSphere,
    tracer: Tracer,
    light_bsdf: BsdfEnum,
    num_intersect_rays: AtomicUsize,
    num_occluded_rays: AtomicUsize,
    num_invariant_violations: AtomicUsize,
}

impl Scene {
    pub fn new(meshes: Vec<Mesh>, bsdfs: Vec<BsdfEnum>, lights: AreaLights) -> Scene {
        let mut geometries = vec![lights.triangles().to_vec()];
        let mut lower = Vec3::splat(INFINITY);
        let mut upper = Vec3::splat(-INFINITY);
        for mesh in &meshes {
            let mut triangles = Vec::with_capacity(mesh.indices.len() / 3);
            for face in mesh.indices.chunks_exact(3) {
                let (a, b, c) = (
                    mesh.vertices[face[0] as usize],
                    mesh.vertices[face[1] as usize],
                    mesh.vertices[face[2] as usize],
                );
                for p in [a, b, c] {
                    lower = lower.min(p);
                    upper = upper.max(p);
                }
                triangles.push(Triangle::new(a, b, c));
            }
            geometries.push(triangles);
        }
        let center = (lower + upper) * 0.5;
        let radius = (upper - lower).norm() * 0.5;
        Scene {
            meshes,
            bsdfs,
            lights,
            bounding_sphere: BoundingSphere {
                center,
                radius: radius.max(1.0),
            },
            tracer: Tracer::new(geometries),
            light_bsdf: BsdfEnum::Light(LightBsdf::new()),
            num_intersect_rays: AtomicUsize::new(0),
            num_occluded_rays: AtomicUsize::new(0),
            num_invariant_violations: AtomicUsize::new(0),
        }
    }

    /// Full intersection including emitters.
    pub fn intersect(&self, origin: Vec3, direction: Vec3) -> Option<SurfacePoint> {
        self.num_intersect_rays.fetch_add(1, Ordering::Relaxed);
        let hit = self
            .tracer
            .intersect(origin, direction, RAY_EPSILON, INFINITY, false)?;
        self.query_surface(&hit, origin, direction)
    }

    /// Intersection that skips emitter geometry; used for light subpaths
    /// so freshly emitted rays cannot re-hit their source.
    pub fn intersect_mesh_only(&self, origin: Vec3, direction: Vec3) -> Option<SurfacePoint> {
        self.num_intersect_rays.fetch_add(1, Ordering::Relaxed);
        let hit = self
            .tracer
            .intersect(origin, direction, RAY_EPSILON, INFINITY, true)?;
        self.query_surface(&hit, origin, direction)
    }

    /// Visibility factor of the open segment between two surface points:
    /// 1.0 when unobstructed, 0.0 otherwise.
    pub fn occluded(&self, a: &SurfacePoint, b: &SurfacePoint) -> f32 {
        self.num_occluded_rays.fetch_add(1, Ordering::Relaxed);
        let from = a.position + a.gnormal * OCCLUSION_OFFSET;
        let to = b.position + b.gnormal * OCCLUSION_OFFSET;
        if self.tracer.segment_occluded(from, to) {
            0.0
        } else {
            1.0
        }
    }

    fn query_surface(
        &self,
        hit: &RayHit,
        origin: Vec3,
        direction: Vec3,
    ) -> Option<SurfacePoint> {
        let position = origin + direction * hit.t;
        if hit.geom_id == 0 {
            return Some(self.lights.surface_at(hit.prim_id as usize, position));
        }

        let mesh = &self.meshes[hit.geom_id as usize - 1];
        let face = &mesh.indices[hit.prim_id as usize * 3..hit.prim_id as usize * 3 + 3];
        let (t0, t1, t2) = (
            mesh.tangents[face[0] as usize],
            mesh.tangents[face[1] as usize],
            mesh.tangents[face[2] as usize],
        );
        let w = 1.0 - hit.u - hit.v;
        let mut tangent = t0 * w + t1 * hit.u + t2 * hit.v;

        // re-orthonormalize the interpolated frame around its normal
        let normal = tangent.cols[1].normalized();
        let mut t = tangent.cols[0] - normal * (tangent.cols[0] * normal);
        if t.norm_squared() < 1e-12 {
            t = Mat3::from_normal(normal).cols[0];
        }
        let t = t.normalized();
        let mut b = tangent.cols[2] - normal * (tangent.cols[2] * normal) - t * (tangent.cols[2] * t);
        if b.norm_squared() < 1e-12 {
            b = normal.cross(t);
        }
        tangent = Mat3::from_cols(t, normal, b.normalized());

        if !tangent.is_orthonormal() {
            self.num_invariant_violations.fetch_add(1, Ordering::Relaxed);
            error!(
                "non-orthonormal frame on mesh {} prim {}; dropping hit",
                mesh.name, hit.prim_id
            );
            return None;
        }

        let mut gnormal = self
            .tracer
            .triangle(hit.geom_id, hit.prim_id)
            .geometric_normal();

        // flip both normals toward the incoming direction
        let toward_origin = -direction;
        if toward_origin * gnormal < 0.0 {
            gnormal = -gnormal;
        }
        if toward_origin * tangent.cols[1] < 0.0 {
            tangent = Mat3::from_cols(tangent.cols[0], -tangent.cols[1], -tangent.cols[2]);
        }

        Some(SurfacePoint {
            position,
            tangent,
            gnormal,
            material_id: mesh.material_id as i32,
        })
    }

    fn bsdf_for(&self, surface: &SurfacePoint) -> Option<&BsdfEnum> {
        if surface.is_light() {
            return Some(&self.light_bsdf);
        }
        let id = surface.material_id as usize;
        if id >= self.bsdfs.len() {
            self.num_invariant_violations.fetch_add(1, Ordering::Relaxed);
            error!("material id {} out of range", surface.material_id);
            return None;
        }
        Some(&self.bsdfs[id])
    }

    pub fn query_bsdf(&self, surface: &SurfacePoint, incident: Vec3, outgoing: Vec3) -> BsdfQuery {
        match self.bsdf_for(surface) {
            Some(bsdf) => bsdf.query(surface, incident, outgoing),
            None => BsdfQuery::default(),
        }
    }

    pub fn sample_bsdf(
        &self,
        sampler: &mut dyn Sampler,
        surface: &SurfacePoint,
        omega: Vec3,
    ) -> BsdfSample {
        match self.bsdf_for(surface) {
            Some(bsdf) => bsdf.sample(sampler, surface, omega),
            None => BsdfSample::terminated(),
        }
    }

    pub fn bsdf(&self, surface: &SurfacePoint) -> &BsdfEnum {
        self.bsdf_for(surface).unwrap_or(&self.light_bsdf)
    }

    pub fn sample_light(&self, sampler: &mut dyn Sampler) -> LightSample {
        self.lights.sample(sampler)
    }

    pub fn sample_light_on(&self, sampler: &mut dyn Sampler, receiver: Vec3) -> LightSample {
        self.lights.sample_on(sampler, receiver)
    }

    pub fn query_radiance(&self, surface: &SurfacePoint, omega: Vec3) -> RGBColor {
        self.lights.query_radiance(surface.light_id(), omega)
    }

    pub fn query_lsdf(&self, surface: &SurfacePoint, omega: Vec3) -> LsdfQuery {
        self.lights.query_lsdf(surface.light_id(), omega)
    }

    pub fn num_intersect_rays(&self) -> usize {
        self.num_intersect_rays.load(Ordering::Relaxed)
    }

    pub fn num_occluded_rays(&self) -> usize {
        self.num_occluded_rays.load(Ordering::Relaxed)
    }

    pub fn num_invariant_violations(&self) -> usize {
        self.num_invariant_violations.load(Ordering::Relaxed)
    }
}

impl RayCaster for Scene {
    fn cast(&self, origin: Vec3, direction: Vec3) -> Option<Vec3> {
        self.num_intersect_rays.fetch_add(1, Ordering::Relaxed);
        self.tracer
            .intersect(origin, direction, RAY_EPSILON, INFINITY, true)
            .map(|hit| origin + direction * hit.t)
    }
}

/// The canonical test scene: a 0.56 m box, white floor/ceiling/back wall,
/// red left wall, green right wall, and a 0.13 m square ceiling light of
/// radiance (17, 12, 4).
pub fn cornell_box() -> Scene {
    const S: f32 = 0.56;
    const WHITE: RGBColor = RGBColor::new(0.725, 0.71, 0.68);
    const RED: RGBColor = RGBColor::new(0.63, 0.065, 0.05);
    const GREEN: RGBColor = RGBColor::new(0.14, 0.45, 0.091);

    fn quad(name: &str, material_id: usize, p: [Vec3; 4]) -> Mesh {
        let normal = (p[1] - p[0]).cross(p[2] - p[0]).normalized();
        let frame = Mat3::from_normal(normal);
        Mesh {
            name: name.to_string(),
            material_id,
            vertices: p.to_vec(),
            tangents: vec![frame; 4],
            indices: vec![0, 1, 2, 0, 2, 3],
        }
    }

    let meshes = vec![
        // winding chosen so geometric normals face the interior
        quad(
            "floor",
            0,
            [
                Vec3::new(0.0, 0.0, 0.0),
                Vec3::new(0.0, 0.0, S),
                Vec3::new(S, 0.0, S),
                Vec3::new(S, 0.0, 0.0),
            ],
        ),
        quad(
            "ceiling",
            0,
            [
                Vec3::new(0.0, S, 0.0),
                Vec3::new(S, S, 0.0),
                Vec3::new(S, S, S),
                Vec3::new(0.0, S, S),
            ],
        ),
        quad(
            "back wall",
            0,
            [
                Vec3::new(0.0, 0.0, S),
                Vec3::new(0.0, S, S),
                Vec3::new(S, S, S),
                Vec3::new(S, 0.0, S),
            ],
        ),
        quad(
            "left wall",
            1,
            [
                Vec3::new(0.0, 0.0, 0.0),
                Vec3::new(0.0, S, 0.0),
                Vec3::new(0.0, S, S),
                Vec3::new(0.0, 0.0, S),
            ],
        ),
        quad(
            "right wall",
            2,
            [
                Vec3::new(S, 0.0, 0.0),
                Vec3::new(S, 0.0, S),
                Vec3::new(S, S, S),
                Vec3::new(S, S, 0.0),
            ],
        ),
    ];

    let bsdfs = vec![
        BsdfEnum::Lambertian(LambertianBsdf::new(WHITE)),
        BsdfEnum::Lambertian(LambertianBsdf::new(RED)),
        BsdfEnum::Lambertian(LambertianBsdf::new(GREEN)),
    ];

    // 0.13 m square light just below the ceiling, emitting downward
    let half = 0.13 / 2.0;
    let (cx, cz) = (S / 2.0, S / 2.0);
    let y = S - 1e-3;
    let lights = AreaLights::new(vec![(
        Vec3::new(cx - half, y, cz - half),
        Vec3::new(cx + half, y, cz - half),
        Vec3::new(cx + half, y, cz + half),
        Vec3::new(cx - half, y, cz + half),
        RGBColor::new(17.0, 12.0, 4.0),
    )]);

    Scene::new(meshes, bsdfs, lights)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_cornell_normals_face_interior() {
        let scene = cornell_box();
        let center = Vec3::splat(0.28);
        for direction in [Vec3::X, -Vec3::X, Vec3::Y, -Vec3::Y, Vec3::Z] {
            let surface = scene
                .intersect(center, direction)
                .expect("closed box, every axial ray hits");
            assert!(
                surface.gnormal * -direction > 0.0,
                "normal not facing interior for {:?}",
                direction
            );
            assert!(surface.tangent.is_orthonormal());
        }
    }

    #[test]
    fn test_ceiling_ray_hits_light_first() {
        let scene = cornell_box();
        let surface = scene
            .intersect(Vec3::new(0.28, 0.1, 0.28), Vec3::Y)
            .unwrap();
        assert!(surface.is_light(), "{:?}", surface);
        // the light emits downward
        assert!(scene.query_radiance(&surface, -Vec3::Y).r > 0.0);
        assert!(scene.query_radiance(&surface, Vec3::Y).is_zero());
    }

    #[test]
    fn test_mesh_only_skips_light() {
        let scene = cornell_box();
        let surface = scene
            .intersect_mesh_only(Vec3::new(0.28, 0.1, 0.28), Vec3::Y)
            .unwrap();
        assert!(!surface.is_light());
        assert!((surface.position.y - 0.56).abs() < 1e-4);
    }

    #[test]
    fn test_occlusion_between_walls() {
        let scene = cornell_box();
        let left = scene.intersect(Vec3::splat(0.28), -Vec3::X).unwrap();
        let right = scene.intersect(Vec3::splat(0.28), Vec3::X).unwrap();
        assert_eq!(scene.occluded(&left, &right), 1.0);

        // a point hidden behind the back wall
        let behind = SurfacePoint {
            position: Vec3::new(0.28, 0.28, 0.7),
            tangent: Mat3::from_normal(-Vec3::Z),
            gnormal: -Vec3::Z,
            material_id: 0,
        };
        assert_eq!(scene.occluded(&left, &behind), 0.0);
    }

    #[test]
    fn test_ray_counters_advance(){
        let scene = cornell_box();
        let before = scene.num_intersect_rays();
        let _ = scene.intersect(Vec3::splat(0.28), Vec3::Y);
        assert_eq!(scene.num_intersect_rays(), before + 1);
    }
}
