use super::*;

/// Perfect mirror. Delta lobe: densities of one, the delta response
/// carries the `1/|cos|` that cancels the edge cosine in the walk update.
#[derive(Debug, Clone, Default)]
pub struct ReflectionBsdf;

impl ReflectionBsdf {
    pub fn new() -> Self {
        ReflectionBsdf
    }

    pub fn query(&self, _incident: Vec3, _outgoing: Vec3) -> BsdfQuery {
        // a delta lobe has zero measure for any fixed direction pair
        BsdfQuery {
            throughput: RGBColor::ZERO,
            density: 0.0,
            density_rev: 0.0,
            specular: 1.0,
        }
    }

    pub fn sample(&self, _sampler: &mut dyn Sampler, omega: Vec3) -> BsdfSample {
        let cos = cos_theta(omega).abs();
        if cos == 0.0 {
            return BsdfSample::terminated();
        }
        BsdfSample {
            omega: reflect_local(omega),
            throughput: RGBColor::splat(1.0 / cos),
            density: 1.0,
            density_rev: 1.0,
            specular: 1.0,
        }
    }
}

/// Smooth dielectric. Samples reflection with the exact Fresnel
/// probability and refraction otherwise; the lobe-choice probability
/// cancels against the Fresnel weight, leaving `1/|cos|` either way.
#[derive(Debug, Clone)]
pub struct TransmissionBsdf {
    internal_ior: f32,
    external_ior: f32,
}

impl TransmissionBsdf {
    pub fn new(internal_ior: f32, external_ior: f32) -> Self {
        debug_assert!(internal_ior > 0.0 && external_ior > 0.0);
        TransmissionBsdf {
            internal_ior,
            external_ior,
        }
    }

    pub fn query(&self, _incident: Vec3, _outgoing: Vec3) -> BsdfQuery {
        BsdfQuery {
            throughput: RGBColor::ZERO,
            density: 0.0,
            density_rev: 0.0,
            specular: 1.0,
        }
    }

    pub fn sample(&self, sampler: &mut dyn Sampler, omega: Vec3) -> BsdfSample {
        let cos_i = cos_theta(omega).abs();
        if cos_i == 0.0 {
            return BsdfSample::terminated();
        }
        let entering = cos_theta(omega) > 0.0;
        let (eta_i, eta_t) = if entering {
            (self.external_ior, self.internal_ior)
        } else {
            (self.internal_ior, self.external_ior)
        };
        let eta = eta_i / eta_t;
        let sin_t_squared = eta * eta * (1.0 - cos_i * cos_i).max(0.0);

        if sin_t_squared >= 1.0 {
            // total internal reflection
            return BsdfSample {
                omega: reflect_local(omega),
                throughput: RGBColor::splat(1.0 / cos_i),
                density: 1.0,
                density_rev: 1.0,
                specular: 1.0,
            };
        }

        let cos_t = (1.0 - sin_t_squared).sqrt();
        let fresnel = fresnel_dielectric(cos_i, cos_t, eta_i, eta_t);

        let uniform = sampler.draw_1d();
        if uniform.x < fresnel {
            BsdfSample {
                omega: reflect_local(omega),
                throughput: RGBColor::splat(1.0 / cos_i),
                density: 1.0,
                density_rev: 1.0,
                specular: 1.0,
            }
        } else {
            let sign = if entering { -1.0 } else { 1.0 };
            let refracted = Vec3::new(-omega.x * eta, sign * cos_t, -omega.z * eta).normalized();
            BsdfSample {
                omega: refracted,
                throughput: RGBColor::splat(1.0 / cos_t),
                density: 1.0,
                density_rev: 1.0,
                specular: 1.0,
            }
        }
    }
}

/// Unpolarized dielectric Fresnel reflectance.
fn fresnel_dielectric(cos_i: f32, cos_t: f32, eta_i: f32, eta_t: f32) -> f32 {
    let parallel = (eta_t * cos_i - eta_i * cos_t) / (eta_t * cos_i + eta_i * cos_t);
    let perpendicular = (eta_i * cos_i - eta_t * cos_t) / (eta_i * cos_i + eta_t * cos_t);
    (0.5 * (parallel * parallel + perpendicular * perpendicular)).clamp(0.0, 1.0)
}
