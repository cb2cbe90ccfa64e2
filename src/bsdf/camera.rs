use super::*;

/// Pseudo-BSDF of the pinhole aperture. The aperture is a delta in
/// position but directionally continuous: querying a direction at angle
/// theta to the optical axis reports the `1/cos^3` importance falloff of a
/// planar sensor. The camera surface frame holds the optical axis in its
/// normal column, so the local `y` component is `cos(theta)`.
#[derive(Debug, Clone, Default)]
pub struct CameraBsdf;

impl CameraBsdf {
    pub fn new() -> Self {
        CameraBsdf
    }

    pub fn query(&self, incident: Vec3, _outgoing: Vec3) -> BsdfQuery {
        let cos = cos_theta(incident);
        if cos <= 0.0 {
            return BsdfQuery::default();
        }
        let falloff = 1.0 / (cos * cos * cos);
        BsdfQuery {
            throughput: RGBColor::splat(falloff),
            density: 0.0,
            // the eye-side recurrences carry the camera's directional
            // density as unity; the reverse density here must agree or the
            // splat strategy falls out of the MIS partition
            density_rev: 1.0,
            specular: 0.0,
        }
    }

    pub fn sample(&self, _sampler: &mut dyn Sampler, _omega: Vec3) -> BsdfSample {
        // primary rays come from the camera model, not from BSDF sampling
        BsdfSample::terminated()
    }

    /// Uniform direction in the cone subtended by `target`; `adjust` is the
    /// sampled solid angle as a fraction of the hemisphere.
    pub fn sample_bounded(
        &self,
        sampler: &mut dyn Sampler,
        target: BoundingSphere,
        _omega: Vec3,
    ) -> Option<BsdfBoundedSample> {
        let distance_squared = target.center.norm_squared();
        let radius_squared = target.radius * target.radius;
        if distance_squared <= radius_squared {
            return None;
        }
        let cos_theta_max = (1.0 - radius_squared / distance_squared).max(0.0).sqrt();
        let local = uniform_cone(sampler.draw_2d(), cos_theta_max);
        let omega = Mat3::from_normal(target.center.normalized()).to_world(local);
        Some(BsdfBoundedSample {
            omega,
            adjust: 0.5 * (1.0 - cos_theta_max),
        })
    }
}
