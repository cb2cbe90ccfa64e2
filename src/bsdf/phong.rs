use super::*;

/// Modified Phong: a diffuse lobe plus a power-cosine glossy lobe around
/// the mirror direction. The sampled lobe is picked by the ratio of the
/// average diffuse and specular reflectances; both reported densities are
/// the full mixture density so MIS weights stay consistent.
#[derive(Debug, Clone)]
pub struct PhongBsdf {
    diffuse: RGBColor,
    specular: RGBColor,
    power: f32,
    diffuse_probability: f32,
}

impl PhongBsdf {
    pub fn new(diffuse: RGBColor, specular: RGBColor, power: f32) -> Self {
        let diffuse_avg = diffuse.avg();
        let specular_avg = specular.avg();
        let total = diffuse_avg + specular_avg;
        debug_assert!(total > 0.0, "phong material with no reflectance");
        PhongBsdf {
            diffuse,
            specular,
            power,
            diffuse_probability: if total > 0.0 { diffuse_avg / total } else { 1.0 },
        }
    }

    fn lobe_cos(&self, incident: Vec3, outgoing: Vec3) -> f32 {
        (reflect_local(incident) * outgoing).max(0.0)
    }

    /// Mixture density of choosing `outgoing` given `incident`.
    fn density(&self, incident: Vec3, outgoing: Vec3) -> f32 {
        if cos_theta(outgoing) <= 0.0 {
            return 0.0;
        }
        let diffuse = cos_theta(outgoing) * FRAC_1_PI;
        let glossy = self.lobe_cos(incident, outgoing).powf(self.power)
            * (self.power + 1.0)
            * (0.5 * FRAC_1_PI);
        self.diffuse_probability * diffuse + (1.0 - self.diffuse_probability) * glossy
    }

    pub fn query(&self, incident: Vec3, outgoing: Vec3) -> BsdfQuery {
        if cos_theta(incident) <= 0.0 || cos_theta(outgoing) <= 0.0 {
            return BsdfQuery::default();
        }
        let glossy = self.lobe_cos(incident, outgoing).powf(self.power)
            * (self.power + 2.0)
            * (0.5 * FRAC_1_PI);
        BsdfQuery {
            throughput: self.diffuse * FRAC_1_PI + self.specular * glossy,
            density: self.density(incident, outgoing),
            density_rev: self.density(outgoing, incident),
            specular: 0.0,
        }
    }

    pub fn sample(&self, sampler: &mut dyn Sampler, omega: Vec3) -> BsdfSample {
        if cos_theta(omega) <= 0.0 {
            return BsdfSample::terminated();
        }
        let (_, diffuse_lobe) = sampler
            .draw_1d()
            .choose(self.diffuse_probability, true, false);
        let outgoing = if diffuse_lobe {
            cosine_hemisphere(sampler.draw_2d())
        } else {
            let around_mirror = power_cosine_hemisphere(sampler.draw_2d(), self.power);
            Mat3::from_normal(reflect_local(omega)).to_world(around_mirror)
        };
        if cos_theta(outgoing) <= 0.0 {
            // glossy lobe dipped below the horizon
            return BsdfSample::terminated();
        }
        let query = self.query(omega, outgoing);
        BsdfSample {
            omega: outgoing,
            throughput: query.throughput,
            density: query.density,
            density_rev: query.density_rev,
            specular: 0.0,
        }
    }
}
