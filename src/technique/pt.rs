use super::{Splat, Technique};
use crate::camera::RenderContext;
use crate::geometry::{Edge, Ray};
use crate::math::Sampler;
use crate::scene::Scene;
use crate::RGBColor;

/// Unidirectional eye walk with next-event estimation. Emission is
/// accumulated only on the very first hit or after an unbroken delta
/// chain; every diffuse hit instead takes an explicit light sample, so
/// each light hit is claimed by exactly one strategy.
pub struct PathTracing {
    pub min_subpath: usize,
    pub roulette: f32,
}

impl PathTracing {
    pub fn new(min_subpath: usize, roulette: f32) -> Self {
        debug_assert!((0.0..=1.0).contains(&roulette) && roulette > 0.0);
        PathTracing {
            min_subpath,
            roulette,
        }
    }
}

impl Technique for PathTracing {
    fn name(&self) -> String {
        "Path Tracing".to_string()
    }

    fn trace_eye(
        &self,
        scene: &Scene,
        _context: &RenderContext,
        sampler: &mut dyn Sampler,
        mut ray: Ray,
        _splats: &mut Vec<Splat>,
    ) -> RGBColor {
        let mut throughput = RGBColor::ONE;
        let mut radiance = RGBColor::ZERO;
        let mut specular = 0.0f32;
        let mut bounce = 0usize;

        loop {
            let mut surface = scene.intersect(ray.origin, ray.direction);

            // pass through emitters, claiming their emission only when no
            // light sample could have found them
            while let Some(point) = surface.filter(|s| s.is_light()) {
                if bounce == 0 || specular == 1.0 {
                    radiance += (throughput * scene.query_radiance(&point, -ray.direction))
                        .or_zero();
                }
                ray.origin = point.position;
                surface = scene.intersect(ray.origin, ray.direction);
            }

            let Some(point) = surface else {
                break;
            };

            // next-event estimation
            let light = scene.sample_light_on(sampler, point.position);
            if !light.radiance.is_zero() && light.area_density > 0.0 {
                let bsdf = scene.query_bsdf(&point, -light.omega, -ray.direction);
                if !bsdf.throughput.is_zero() {
                    let edge = Edge::new(&light.surface, &point, light.omega);
                    let visible = scene.occluded(&light.surface, &point);
                    if visible > 0.0 {
                        radiance += (light.radiance
                            * throughput
                            * bsdf.throughput
                            * (visible * edge.f_geometry / light.area_density))
                            .or_zero();
                    }
                }
            }

            // continuation
            let sample = scene.sample_bsdf(sampler, &point, -ray.direction);
            if sample.is_zero() || sample.density == 0.0 {
                break;
            }

            specular = specular.max(sample.specular) * sample.specular;
            throughput *= sample.throughput
                * ((point.normal() * sample.omega).abs() / sample.density);
            if !throughput.is_finite() {
                break;
            }

            ray = Ray::new(point.position, sample.omega);

            let probability = if bounce > self.min_subpath {
                self.roulette
            } else {
                1.0
            };
            if probability < sampler.draw_1d().x {
                break;
            }
            throughput /= probability;

            bounce += 1;
        }

        radiance
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::camera::{cornell_camera, RenderContext};
    use crate::math::{RandomSampler, Vec3};
    use crate::scene::cornell_box;

    fn average_radiance(directions: &[(f32, f32)], samples: usize) -> RGBColor {
        let scene = cornell_box();
        let context = RenderContext::new(&cornell_camera(), (64, 64));
        let technique = PathTracing::new(3, 0.75);
        let mut sampler = RandomSampler::new(0xc0ffee);
        let mut splats = Vec::new();
        let mut sum = RGBColor::ZERO;
        for &(x, y) in directions {
            for _ in 0..samples {
                let ray = context.shoot(x, y);
                sum += technique.trace_eye(&scene, &context, &mut sampler, ray, &mut splats);
            }
        }
        sum / (samples * directions.len()) as f32
    }

    #[test]
    fn test_center_pixel_sees_light() {
        // rays through the image center reach the lit back wall
        let value = average_radiance(&[(32.0, 32.0)], 400);
        assert!(value.r > 0.02, "{:?}", value);
        assert!(value.is_finite());
    }

    #[test]
    fn test_direct_view_of_light_is_unclipped() {
        let scene = cornell_box();
        let context = RenderContext::new(&cornell_camera(), (64, 64));
        let technique = PathTracing::new(3, 0.75);
        let mut sampler = RandomSampler::new(7);
        let mut splats = Vec::new();
        // aim straight at the ceiling light
        let origin = Vec3::new(0.28, 0.1, 0.28);
        let ray = Ray::new(origin, Vec3::Y);
        let mut sum = RGBColor::ZERO;
        for _ in 0..16 {
            sum += technique.trace_eye(&scene, &context, &mut sampler, ray, &mut splats);
        }
        let value = sum / 16.0;
        // bounce-0 emission is (17, 12, 4) plus bounce light
        assert!(value.r >= 17.0, "{:?}", value);
        assert!(value.g >= 12.0, "{:?}", value);
    }

    #[test]
    fn test_energy_is_nonnegative_and_finite() {
        let value = average_radiance(&[(5.0, 5.0), (60.0, 60.0), (32.0, 5.0)], 200);
        assert!(value.r >= 0.0 && value.g >= 0.0 && value.b >= 0.0);
        assert!(value.is_finite());
    }
}
