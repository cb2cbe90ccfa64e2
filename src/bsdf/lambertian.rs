use super::*;

/// Ideal diffuse reflector, throughput `diffuse / pi` on the upper
/// hemisphere, cosine-weighted sampling.
#[derive(Debug, Clone)]
pub struct LambertianBsdf {
    diffuse: RGBColor,
}

impl LambertianBsdf {
    pub fn new(diffuse: RGBColor) -> Self {
        LambertianBsdf { diffuse }
    }

    pub fn query(&self, incident: Vec3, outgoing: Vec3) -> BsdfQuery {
        if cos_theta(incident) <= 0.0 || cos_theta(outgoing) <= 0.0 {
            return BsdfQuery::default();
        }
        BsdfQuery {
            throughput: self.diffuse * FRAC_1_PI,
            density: cos_theta(outgoing) * FRAC_1_PI,
            density_rev: cos_theta(incident) * FRAC_1_PI,
            specular: 0.0,
        }
    }

    pub fn sample(&self, sampler: &mut dyn Sampler, omega: Vec3) -> BsdfSample {
        if cos_theta(omega) <= 0.0 {
            return BsdfSample::terminated();
        }
        let outgoing = cosine_hemisphere(sampler.draw_2d());
        BsdfSample {
            omega: outgoing,
            throughput: self.diffuse * FRAC_1_PI,
            density: cos_theta(outgoing) * FRAC_1_PI,
            density_rev: cos_theta(omega) * FRAC_1_PI,
            specular: 0.0,
        }
    }
}
