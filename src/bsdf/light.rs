use super::*;

/// Pseudo-BSDF attached to emitter surfaces. Sampling terminates the path
/// (emitters do not scatter); querying reports unit throughput on the
/// emitting hemisphere with the cosine densities the emitter sampler uses,
/// so stored on-light vertices take part in connections and MIS.
#[derive(Debug, Clone, Default)]
pub struct LightBsdf;

impl LightBsdf {
    pub fn new() -> Self {
        LightBsdf
    }

    pub fn query(&self, incident: Vec3, outgoing: Vec3) -> BsdfQuery {
        let throughput = if cos_theta(outgoing) > 0.0 {
            RGBColor::ONE
        } else {
            RGBColor::ZERO
        };
        BsdfQuery {
            throughput,
            density: cos_theta(outgoing).max(0.0) * FRAC_1_PI,
            density_rev: cos_theta(incident).max(0.0) * FRAC_1_PI,
            specular: 0.0,
        }
    }

    pub fn sample(&self, _sampler: &mut dyn Sampler, _omega: Vec3) -> BsdfSample {
        BsdfSample::terminated()
    }
}
