use crate::geometry::SurfacePoint;
use crate::math::*;
use crate::tracer::Triangle;
use crate::RGBColor;

/// A sampled emission event. `omega` is the emitted direction in world
/// space; the densities are the pair MIS needs: the area pdf of the origin
/// on the emitter and the solid-angle pdf of the direction.
#[derive(Debug, Copy, Clone)]
pub struct LightSample {
    pub surface: SurfacePoint,
    pub omega: Vec3,
    pub radiance: RGBColor,
    pub area_density: f32,
    pub omega_density: f32,
}

impl LightSample {
    pub fn density(&self) -> f32 {
        self.area_density * self.omega_density
    }
}

/// Reverse emission query for MIS when a light is hit by chance.
#[derive(Debug, Copy, Clone)]
pub struct LsdfQuery {
    pub radiance: RGBColor,
    pub area_density: f32,
    pub omega_density: f32,
}

/// The scene's area emitters, flattened to triangles (geometry id 0 in the
/// intersector). Lights are picked proportionally to power, positions
/// uniformly by area, directions cosine-weighted in the light frame, and
/// `query_lsdf` reports exactly the densities the samplers use.
pub struct AreaLights {
    triangles: Vec<Triangle>,
    frames: Vec<Mat3>,
    radiances: Vec<RGBColor>,
    areas: Vec<f32>,
    pick_cdf: Vec<f32>,
    pick_probability: Vec<f32>,
    total_power: f32,
}

impl AreaLights {
    pub fn new(quads: Vec<(Vec3, Vec3, Vec3, Vec3, RGBColor)>) -> AreaLights {
        let mut triangles = Vec::new();
        let mut frames = Vec::new();
        let mut radiances = Vec::new();
        for (p0, p1, p2, p3, radiance) in quads {
            for triangle in [Triangle::new(p0, p1, p2), Triangle::new(p0, p2, p3)] {
                frames.push(Mat3::from_normal(triangle.geometric_normal()));
                radiances.push(radiance);
                triangles.push(triangle);
            }
        }

        let areas: Vec<f32> = triangles.iter().map(Triangle::area).collect();
        let powers: Vec<f32> = radiances
            .iter()
            .zip(areas.iter())
            .map(|(radiance, area)| radiance.avg() * area * PI)
            .collect();
        let total_power: f32 = powers.iter().sum();
        debug_assert!(total_power > 0.0, "scene without emitted power");

        let pick_probability: Vec<f32> = powers.iter().map(|p| p / total_power).collect();
        let mut pick_cdf = Vec::with_capacity(powers.len());
        let mut acc = 0.0;
        for p in &pick_probability {
            acc += p;
            pick_cdf.push(acc);
        }
        if let Some(last) = pick_cdf.last_mut() {
            *last = 1.0;
        }

        AreaLights {
            triangles,
            frames,
            radiances,
            areas,
            pick_cdf,
            pick_probability,
            total_power,
        }
    }

    pub fn len(&self) -> usize {
        self.triangles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    pub fn triangles(&self) -> &[Triangle] {
        &self.triangles
    }

    pub fn total_power(&self) -> f32 {
        self.total_power
    }

    fn pick(&self, sample: Sample1D) -> usize {
        match self
            .pick_cdf
            .binary_search_by(|edge| edge.partial_cmp(&sample.x).unwrap())
        {
            Ok(index) | Err(index) => index.min(self.len() - 1),
        }
    }

    fn uniform_point(&self, light_id: usize, sample: Sample2D) -> Vec3 {
        let triangle = &self.triangles[light_id];
        let sqrt_u = sample.x.sqrt();
        let b0 = 1.0 - sqrt_u;
        let b1 = sample.y * sqrt_u;
        triangle.a + triangle.edge_ab * b1 + triangle.edge_ac * (1.0 - b0 - b1)
    }

    pub fn area_density(&self, light_id: usize) -> f32 {
        self.pick_probability[light_id] / self.areas[light_id]
    }

    /// Surface point on an emitter; the light frame is single sided and is
    /// never flipped toward the viewer.
    pub fn surface_at(&self, light_id: usize, position: Vec3) -> SurfacePoint {
        SurfacePoint {
            position,
            tangent: self.frames[light_id],
            gnormal: self.frames[light_id].cols[1],
            material_id: -(light_id as i32) - 1,
        }
    }

    /// Sample an emission origin and direction (cosine over the emitting
    /// hemisphere).
    pub fn sample(&self, sampler: &mut dyn Sampler) -> LightSample {
        let light_id = self.pick(sampler.draw_1d());
        let position = self.uniform_point(light_id, sampler.draw_2d());
        let local = cosine_hemisphere(sampler.draw_2d());
        let omega = self.frames[light_id].to_world(local);
        LightSample {
            surface: self.surface_at(light_id, position),
            omega,
            radiance: self.radiances[light_id],
            area_density: self.area_density(light_id),
            omega_density: local.y.max(0.0) * FRAC_1_PI,
        }
    }

    /// Sample an emission origin for next-event estimation; `omega` points
    /// from the light toward the receiver.
    pub fn sample_on(&self, sampler: &mut dyn Sampler, receiver: Vec3) -> LightSample {
        let light_id = self.pick(sampler.draw_1d());
        let position = self.uniform_point(light_id, sampler.draw_2d());
        let omega = (receiver - position).normalized();
        let cos = (omega * self.frames[light_id].cols[1]).max(0.0);
        let radiance = if cos > 0.0 {
            self.radiances[light_id]
        } else {
            RGBColor::ZERO
        };
        LightSample {
            surface: self.surface_at(light_id, position),
            omega,
            radiance,
            area_density: self.area_density(light_id),
            omega_density: cos * FRAC_1_PI,
        }
    }

    /// Emitted radiance toward `omega` (a direction away from the light).
    pub fn query_radiance(&self, light_id: usize, omega: Vec3) -> RGBColor {
        if omega * self.frames[light_id].cols[1] > 0.0 {
            self.radiances[light_id]
        } else {
            RGBColor::ZERO
        }
    }

    pub fn query_lsdf(&self, light_id: usize, omega: Vec3) -> LsdfQuery {
        let cos = (omega * self.frames[light_id].cols[1]).max(0.0);
        LsdfQuery {
            radiance: if cos > 0.0 {
                self.radiances[light_id]
            } else {
                RGBColor::ZERO
            },
            area_density: self.area_density(light_id),
            omega_density: cos * FRAC_1_PI,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn single_quad() -> AreaLights {
        AreaLights::new(vec![(
            Vec3::new(0.0, 1.0, 0.0),
            Vec3::new(0.0, 1.0, 1.0),
            Vec3::new(1.0, 1.0, 1.0),
            Vec3::new(1.0, 1.0, 0.0),
            RGBColor::new(17.0, 12.0, 4.0),
        )])
    }

    #[test]
    fn test_sample_density_pairs_match_lsdf() {
        let lights = single_quad();
        let mut sampler = RandomSampler::new(21);
        for _ in 0..1000 {
            let sample = lights.sample(&mut sampler);
            let lsdf = lights.query_lsdf(sample.surface.light_id(), sample.omega);
            assert!((sample.area_density - lsdf.area_density).abs() < 1e-7);
            assert!((sample.omega_density - lsdf.omega_density).abs() < 1e-5);
            assert!(sample.omega * sample.surface.normal() >= 0.0);
        }
    }

    #[test]
    fn test_area_density_integrates_to_one() {
        let lights = single_quad();
        // two triangles, combined area 1, total pick probability 1
        let total: f32 = (0..lights.len())
            .map(|i| lights.area_density(i) * lights.triangles()[i].area())
            .sum();
        assert!((total - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_sampled_points_lie_on_light() {
        let lights = single_quad();
        let mut sampler = RandomSampler::new(8);
        for _ in 0..2000 {
            let s = lights.sample(&mut sampler);
            let p = s.surface.position;
            assert!((p.y - 1.0).abs() < 1e-6);
            assert!((0.0..=1.0).contains(&p.x), "{:?}", p);
            assert!((0.0..=1.0).contains(&p.z), "{:?}", p);
        }
    }

    #[test]
    fn test_backside_emits_nothing() {
        let lights = single_quad();
        let below = -lights.frames[0].cols[1];
        assert!(lights.query_radiance(0, below).is_zero());
        let lsdf = lights.query_lsdf(0, below);
        assert!(lsdf.radiance.is_zero());
        assert_eq!(lsdf.omega_density, 0.0);
    }
}
