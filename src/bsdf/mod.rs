mod camera;
mod lambertian;
mod light;
mod phong;
mod specular;

pub use camera::CameraBsdf;
pub use lambertian::LambertianBsdf;
pub use light::LightBsdf;
pub use phong::PhongBsdf;
pub use specular::{ReflectionBsdf, TransmissionBsdf};

use crate::geometry::{BoundingSphere, SurfacePoint};
use crate::math::*;
use crate::RGBColor;

/// Result of evaluating a BSDF for a fixed pair of directions.
///
/// `throughput` is the plain BSDF value; foreshortening cosines live on the
/// path edge. `density` is the solid-angle pdf of choosing `outgoing` given
/// `incident`, `density_rev` the reverse. Delta lobes report both densities
/// as zero and `specular = 1`.
#[derive(Debug, Copy, Clone, Default)]
pub struct BsdfQuery {
    pub throughput: RGBColor,
    pub density: f32,
    pub density_rev: f32,
    pub specular: f32,
}

/// Result of importance-sampling an outgoing direction.
///
/// Zero throughput means the path is terminated. For a delta lobe both
/// densities are one and `throughput` carries the delta response, so the
/// walk update `throughput * b_cos_theta / density` needs no special case.
#[derive(Debug, Copy, Clone)]
pub struct BsdfSample {
    pub omega: Vec3,
    pub throughput: RGBColor,
    pub density: f32,
    pub density_rev: f32,
    pub specular: f32,
}

impl BsdfSample {
    pub fn terminated() -> BsdfSample {
        BsdfSample {
            omega: Vec3::ZERO,
            throughput: RGBColor::ZERO,
            density: 0.0,
            density_rev: 0.0,
            specular: 0.0,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.throughput.is_zero()
    }
}

/// Outgoing direction restricted to hit a bounding sphere, together with
/// the sampled solid-angle fraction relative to an unbounded sample.
#[derive(Debug, Copy, Clone)]
pub struct BsdfBoundedSample {
    pub omega: Vec3,
    pub adjust: f32,
}

/// The slice of the intersector `gathering_density` needs: cast a ray and
/// report the hit position on mesh geometry, if any.
pub trait RayCaster {
    fn cast(&self, origin: Vec3, direction: Vec3) -> Option<Vec3>;
}

/// Scattering models. Small and hot, so a sum type with inline dispatch
/// rather than a trait object.
#[derive(Debug, Clone)]
pub enum BsdfEnum {
    Lambertian(LambertianBsdf),
    Phong(PhongBsdf),
    Reflection(ReflectionBsdf),
    Transmission(TransmissionBsdf),
    Light(LightBsdf),
    Camera(CameraBsdf),
}

impl BsdfEnum {
    pub fn query(&self, point: &SurfacePoint, incident: Vec3, outgoing: Vec3) -> BsdfQuery {
        let incident = point.to_surface(incident);
        let outgoing = point.to_surface(outgoing);
        match self {
            BsdfEnum::Lambertian(b) => b.query(incident, outgoing),
            BsdfEnum::Phong(b) => b.query(incident, outgoing),
            BsdfEnum::Reflection(b) => b.query(incident, outgoing),
            BsdfEnum::Transmission(b) => b.query(incident, outgoing),
            BsdfEnum::Light(b) => b.query(incident, outgoing),
            BsdfEnum::Camera(b) => b.query(incident, outgoing),
        }
    }

    pub fn sample(
        &self,
        sampler: &mut dyn Sampler,
        point: &SurfacePoint,
        omega: Vec3,
    ) -> BsdfSample {
        let local = point.to_surface(omega);
        let mut sample = match self {
            BsdfEnum::Lambertian(b) => b.sample(sampler, local),
            BsdfEnum::Phong(b) => b.sample(sampler, local),
            BsdfEnum::Reflection(b) => b.sample(sampler, local),
            BsdfEnum::Transmission(b) => b.sample(sampler, local),
            BsdfEnum::Light(b) => b.sample(sampler, local),
            BsdfEnum::Camera(b) => b.sample(sampler, local),
        };
        sample.omega = point.to_world(sample.omega);
        sample
    }

    /// Sample a direction whose ray is guaranteed to reach `target`.
    /// Surface BSDFs decline; callers fall back to plain sampling.
    pub fn sample_bounded(
        &self,
        sampler: &mut dyn Sampler,
        point: &SurfacePoint,
        target: BoundingSphere,
        omega: Vec3,
    ) -> Option<BsdfBoundedSample> {
        match self {
            BsdfEnum::Camera(b) => {
                let local = point.to_surface(omega);
                let local_target = BoundingSphere {
                    center: point.to_surface(target.center - point.position),
                    radius: target.radius,
                };
                b.sample_bounded(sampler, local_target, local).map(|mut s| {
                    s.omega = point.to_world(s.omega);
                    s
                })
            }
            _ => None,
        }
    }

    /// Unbiased estimate of the reciprocal probability of reaching `target`
    /// by BSDF sampling followed by a ray cast: the number of independent
    /// trials until the first hit inside the sphere is an unbiased
    /// estimator of `1 / P` (geometric distribution). Capped; the cap is
    /// returned on exhaustion.
    pub fn gathering_density(
        &self,
        sampler: &mut dyn Sampler,
        caster: &dyn RayCaster,
        point: &SurfacePoint,
        target: BoundingSphere,
        omega: Vec3,
    ) -> f32 {
        const MAX_ATTEMPTS: u32 = 1 << 16;
        let radius_squared = target.radius * target.radius;
        let mut attempts = 0.0f32;
        for _ in 0..MAX_ATTEMPTS {
            match self.sample_bounded(sampler, point, target, omega) {
                Some(bounded) => {
                    if bounded.adjust <= 0.0 {
                        return 0.0;
                    }
                    attempts += 1.0 / bounded.adjust;
                    if let Some(hit) = caster.cast(point.position, bounded.omega) {
                        if hit.distance_squared(target.center) <= radius_squared {
                            return attempts;
                        }
                    }
                }
                None => {
                    attempts += 1.0;
                    let sample = self.sample(sampler, point, omega);
                    if sample.is_zero() || sample.density == 0.0 {
                        continue;
                    }
                    if let Some(hit) = caster.cast(point.position, sample.omega) {
                        if hit.distance_squared(target.center) <= radius_squared {
                            return attempts;
                        }
                    }
                }
            }
        }
        debug!(
            "gathering density trial cap reached near {:?}",
            target.center
        );
        attempts
    }
}

// local-frame helpers shared by the concrete models

pub(crate) fn cos_theta(omega: Vec3) -> f32 {
    omega.y
}

pub(crate) fn same_hemisphere(a: Vec3, b: Vec3) -> bool {
    a.y * b.y > 0.0
}

/// Mirror reflection about the local normal.
pub(crate) fn reflect_local(omega: Vec3) -> Vec3 {
    Vec3::new(-omega.x, omega.y, -omega.z)
}

#[cfg(test)]
pub(crate) mod testing {
    //! Monte-Carlo assertions shared by the per-material test modules.

    use super::*;
    use crate::geometry::SurfacePoint;

    pub fn surface_at_origin() -> SurfacePoint {
        SurfacePoint {
            position: Vec3::ZERO,
            tangent: Mat3::IDENTITY,
            gnormal: Vec3::Y,
            material_id: 0,
        }
    }

    /// Integral of `query().throughput * cos` over the outgoing hemisphere
    /// must not exceed one for any incident direction.
    pub fn assert_energy_conserving(bsdf: &BsdfEnum, samples: usize) {
        let surface = surface_at_origin();
        let mut sampler = RandomSampler::new(0x5eed);
        for trial in 0..4 {
            let incident = uniform_hemisphere(sampler.draw_2d());
            let mut sum = RGBColor::ZERO;
            for _ in 0..samples {
                let outgoing = uniform_hemisphere(sampler.draw_2d());
                let density = 0.5 * FRAC_1_PI;
                let query = bsdf.query(&surface, incident, outgoing);
                sum += query.throughput * (cos_theta(outgoing) / density / samples as f32);
            }
            for channel in [sum.r, sum.g, sum.b] {
                assert!(
                    channel <= 1.0 + 5e-3,
                    "reflected energy {} > 1 for incident {:?} (trial {})",
                    channel,
                    incident,
                    trial
                );
            }
        }
    }

    /// `E[throughput / density]` under BSDF sampling must match the
    /// uniform-hemisphere integral of `query().throughput * cos` to ~1%.
    pub fn assert_sampling_consistent(bsdf: &BsdfEnum, samples: usize) {
        let surface = surface_at_origin();
        let mut sampler = RandomSampler::new(0xbeef);
        let incident = Vec3::new(0.3, 0.8, 0.5).normalized();

        let mut by_query = RGBColor::ZERO;
        for _ in 0..samples {
            let outgoing = uniform_hemisphere(sampler.draw_2d());
            let density = 0.5 * FRAC_1_PI;
            let query = bsdf.query(&surface, incident, outgoing);
            by_query += query.throughput * (cos_theta(outgoing) / density / samples as f32);
        }

        let mut by_sample = RGBColor::ZERO;
        for _ in 0..samples {
            let sample = bsdf.sample(&mut sampler, &surface, incident);
            if sample.is_zero() || sample.density == 0.0 {
                continue;
            }
            by_sample +=
                sample.throughput * (cos_theta(sample.omega) / sample.density / samples as f32);
        }

        let scale = by_query.avg().max(1e-3);
        assert!(
            (by_query.avg() - by_sample.avg()).abs() / scale < 0.01,
            "sampling estimate {:?} deviates from query integral {:?}",
            by_sample,
            by_query
        );
    }

    /// `query(a, b) == query(b, a)` for non-delta materials.
    pub fn assert_reciprocal(bsdf: &BsdfEnum, samples: usize) {
        let surface = surface_at_origin();
        let mut sampler = RandomSampler::new(0xfeed);
        for _ in 0..samples {
            let a = uniform_hemisphere(sampler.draw_2d());
            let b = uniform_hemisphere(sampler.draw_2d());
            let forward = bsdf.query(&surface, a, b).throughput;
            let backward = bsdf.query(&surface, b, a).throughput;
            assert!(
                (forward - backward).l1_norm() < 1e-6,
                "reciprocity violated: {:?} vs {:?} for {:?} {:?}",
                forward,
                backward,
                a,
                b
            );
        }
    }

    /// The densities a sample reports must agree with what `query` returns
    /// for the same pair of directions, in both orders.
    pub fn assert_reverse_density_consistent(bsdf: &BsdfEnum, samples: usize) {
        let surface = surface_at_origin();
        let mut sampler = RandomSampler::new(0xdead);
        for _ in 0..samples {
            let incident = uniform_hemisphere(sampler.draw_2d());
            let sample = bsdf.sample(&mut sampler, &surface, incident);
            if sample.is_zero() || sample.specular == 1.0 {
                continue;
            }
            let forward = bsdf.query(&surface, incident, sample.omega);
            let backward = bsdf.query(&surface, sample.omega, incident);
            assert!(
                (forward.density - sample.density).abs() < 1e-4 * (1.0 + sample.density),
                "forward density mismatch: {} vs {}",
                forward.density,
                sample.density
            );
            assert!(
                (backward.density - sample.density_rev).abs() < 1e-4 * (1.0 + sample.density_rev),
                "reverse density mismatch: {} vs {}",
                backward.density,
                sample.density_rev
            );
            assert!(
                (forward.density_rev - sample.density_rev).abs()
                    < 1e-4 * (1.0 + sample.density_rev),
                "query density_rev mismatch: {} vs {}",
                forward.density_rev,
                sample.density_rev
            );
        }
    }
}
