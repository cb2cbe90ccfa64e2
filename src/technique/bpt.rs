use super::{Beta, Splat, SubpathBuffer, Technique};
use crate::camera::RenderContext;
use crate::geometry::{Edge, Ray, SurfacePoint};
use crate::math::{Mat3, Sampler, Vec3};
use crate::scene::Scene;
use crate::RGBColor;

#[derive(Debug, Copy, Clone)]
pub struct LightVertex {
    pub surface: SurfacePoint,
    pub omega: Vec3,
    pub throughput: RGBColor,
    pub specular: f32,
    pub a: f32,
    pub big_a: f32,
}

impl Default for LightVertex {
    fn default() -> Self {
        LightVertex {
            surface: SurfacePoint {
                position: Vec3::ZERO,
                tangent: Mat3::IDENTITY,
                gnormal: Vec3::Y,
                material_id: 0,
            },
            omega: Vec3::ZERO,
            throughput: RGBColor::ZERO,
            specular: 0.0,
            a: 0.0,
            big_a: 0.0,
        }
    }
}

#[derive(Debug, Copy, Clone)]
struct EyeVertex {
    surface: SurfacePoint,
    omega: Vec3,
    throughput: RGBColor,
    specular: f32,
    c: f32,
    big_c: f32,
}

/// Bidirectional path tracing with multiple-importance-sampled vertex
/// connection. The light subpath is stored (inline capacity, no heap);
/// the eye subpath is a two-vertex rolling window. At every eye vertex
/// three strategy families contribute: chance light hits (s = 0),
/// explicit next-event estimation (s = 1), and connections to each stored
/// light vertex (s >= 2). The per-vertex partial sums `a/A` and `c/C`
/// make every balance-heuristic weight O(1).
pub struct BptBase<B: Beta> {
    min_subpath: usize,
    roulette: f32,
    beta: B,
}

impl<B: Beta> BptBase<B> {
    pub fn new(min_subpath: usize, roulette: f32, beta: B) -> Self {
        debug_assert!((0.0..=1.0).contains(&roulette) && roulette > 0.0);
        BptBase {
            min_subpath,
            roulette,
            beta,
        }
    }

    /// Build the light subpath. Pure specular bounces overwrite their
    /// predecessor (a delta vertex cannot be connected to); the last
    /// stored vertex keeps its slot only if a probe sample of its BSDF
    /// comes out non-delta.
    pub(super) fn trace_light(
        &self,
        scene: &Scene,
        sampler: &mut dyn Sampler,
        path: &mut SubpathBuffer<LightVertex>,
    ) {
        let light = scene.sample_light(sampler);

        let Some(surface) = scene.intersect_mesh_only(light.surface.position, light.omega) else {
            return;
        };

        let edge = Edge::new(&light.surface, &surface, light.omega);
        let a = 1.0 / self.beta.beta(edge.f_geometry * light.omega_density);
        path.push(LightVertex {
            surface,
            omega: -light.omega,
            throughput: light.radiance * (edge.b_cos_theta / light.density()),
            specular: 0.0,
            a,
            big_a: self.beta.beta(edge.b_geometry) * a / self.beta.beta(light.area_density),
        });
        let mut prv = 0usize;

        let mut subpath_size = 2usize;
        let mut roulette = if subpath_size < self.min_subpath {
            1.0
        } else {
            self.roulette
        };
        let mut uniform = sampler.draw_1d().x;

        while uniform < roulette {
            let bsdf = scene.sample_bsdf(sampler, &path[prv].surface, path[prv].omega);
            if bsdf.is_zero() || bsdf.density == 0.0 {
                break;
            }

            let Some(surface) = scene.intersect_mesh_only(path[prv].surface.position, bsdf.omega)
            else {
                break;
            };

            let edge = Edge::new(&path[prv].surface, &surface, bsdf.omega);

            let previous = path[prv];
            // the chain-specular update lands on the previous vertex
            // before the recurrence reads it
            let specular_prev = previous.specular.max(bsdf.specular);
            let a = 1.0 / self.beta.beta(edge.f_geometry * bsdf.density);
            let vertex = LightVertex {
                surface,
                omega: -bsdf.omega,
                throughput: previous.throughput
                    * bsdf.throughput
                    * (edge.b_cos_theta / (bsdf.density * roulette)),
                specular: specular_prev * bsdf.specular,
                a,
                big_a: (previous.big_a * self.beta.beta(bsdf.density_rev)
                    + previous.a * (1.0 - specular_prev))
                    * self.beta.beta(edge.b_geometry)
                    * a,
            };
            path[prv].specular = specular_prev;

            if bsdf.specular == 1.0 {
                path[prv] = vertex;
            } else {
                if !path.push(vertex) {
                    break;
                }
                prv = path.len() - 1;
            }

            subpath_size += 1;
            roulette = if subpath_size < self.min_subpath {
                1.0
            } else {
                self.roulette
            };
            uniform = sampler.draw_1d().x;
        }

        // probe whether the tail vertex scatters as a delta; if so it
        // cannot take part in connections and is dropped
        let probe = scene.sample_bsdf(sampler, &path[prv].surface, path[prv].omega);
        if probe.specular == 1.0 {
            path.truncate(prv);
        } else {
            path.truncate(prv + 1);
        }
    }

    /// Strategy s = 0: extend the eye path by one BSDF sample and collect
    /// emission from every light surface the sampled ray passes through.
    fn connect0(
        &self,
        scene: &Scene,
        sampler: &mut dyn Sampler,
        eye: &EyeVertex,
    ) -> RGBColor {
        let mut radiance = RGBColor::ZERO;

        let bsdf = scene.sample_bsdf(sampler, &eye.surface, eye.omega);
        if bsdf.is_zero() || bsdf.density == 0.0 {
            return radiance;
        }

        let mut origin = eye.surface.position;
        let mut surface = scene.intersect(origin, bsdf.omega);

        while let Some(light_surface) = surface.filter(|s| s.is_light()) {
            let lsdf = scene.query_lsdf(&light_surface, -bsdf.omega);
            let edge = Edge::new(&eye.surface, &light_surface, bsdf.omega);

            let c = 1.0 / self.beta.beta(edge.f_geometry * bsdf.density);
            let big_c = (eye.big_c * self.beta.beta(bsdf.density_rev)
                + eye.c * (1.0 - eye.specular.max(bsdf.specular)))
                * self.beta.beta(edge.b_geometry)
                * c;

            let c_prime = (big_c * self.beta.beta(lsdf.omega_density)
                + c * (1.0 - bsdf.specular))
                * self.beta.beta(lsdf.area_density);

            let weight_inv = c_prime + 1.0;

            radiance += (lsdf.radiance
                * eye.throughput
                * bsdf.throughput
                * (edge.b_cos_theta / (bsdf.density * weight_inv)))
                .or_zero();

            origin = light_surface.position;
            surface = scene.intersect(origin, bsdf.omega);
        }

        radiance
    }

    /// Strategy s = 1: explicit next-event estimation.
    fn connect1(
        &self,
        scene: &Scene,
        sampler: &mut dyn Sampler,
        eye: &EyeVertex,
    ) -> RGBColor {
        let light = scene.sample_light_on(sampler, eye.surface.position);
        if light.radiance.is_zero() || light.area_density == 0.0 {
            return RGBColor::ZERO;
        }

        let bsdf = scene.query_bsdf(&eye.surface, -light.omega, eye.omega);
        if bsdf.specular == 1.0 || bsdf.throughput.is_zero() {
            return RGBColor::ZERO;
        }

        let edge = Edge::new(&light.surface, &eye.surface, light.omega);

        let weight_inv = self
            .beta
            .beta(bsdf.density_rev * edge.b_geometry / light.area_density)
            + 1.0
            + (eye.big_c * self.beta.beta(bsdf.density) + eye.c * (1.0 - eye.specular))
                * self.beta.beta(edge.f_geometry * light.omega_density);

        let visible = scene.occluded(&light.surface, &eye.surface);
        if visible == 0.0 {
            return RGBColor::ZERO;
        }

        (light.radiance
            * eye.throughput
            * bsdf.throughput
            * (visible * edge.f_geometry / (light.area_density * weight_inv)))
            .or_zero()
    }

    /// Strategies s >= 2: connect one stored light vertex to the eye
    /// vertex with the O(1) weight built from the stored partial sums.
    fn connect_vertex(&self, scene: &Scene, eye: &EyeVertex, light: &LightVertex) -> RGBColor {
        let omega = (eye.surface.position - light.surface.position).normalized();

        let light_bsdf = scene.query_bsdf(&light.surface, light.omega, omega);
        let eye_bsdf = scene.query_bsdf(&eye.surface, -omega, eye.omega);

        if eye_bsdf.specular == 1.0
            || light_bsdf.throughput.is_zero()
            || eye_bsdf.throughput.is_zero()
        {
            return RGBColor::ZERO;
        }

        let edge = Edge::new(&light.surface, &eye.surface, omega);

        let weight_inv = (light.big_a * self.beta.beta(light_bsdf.density_rev)
            + light.a * (1.0 - light.specular))
            * self.beta.beta(edge.b_geometry * eye_bsdf.density_rev)
            + 1.0
            + (eye.big_c * self.beta.beta(eye_bsdf.density) + eye.c * (1.0 - eye.specular))
                * self.beta.beta(edge.f_geometry * light_bsdf.density);

        let visible = scene.occluded(&eye.surface, &light.surface);
        if visible == 0.0 {
            return RGBColor::ZERO;
        }

        (light.throughput
            * light_bsdf.throughput
            * eye.throughput
            * eye_bsdf.throughput
            * (visible * edge.f_geometry / weight_inv))
            .or_zero()
    }

    fn connect_all(
        &self,
        scene: &Scene,
        sampler: &mut dyn Sampler,
        eye: &EyeVertex,
        path: &SubpathBuffer<LightVertex>,
    ) -> RGBColor {
        let mut radiance = self.connect0(scene, sampler, eye) + self.connect1(scene, sampler, eye);
        for light in path.as_slice() {
            radiance += self.connect_vertex(scene, eye, light);
        }
        radiance
    }
}

impl<B: Beta> Technique for BptBase<B> {
    fn name(&self) -> String {
        format!("BPT{}", self.beta.suffix())
    }

    fn trace_eye(
        &self,
        scene: &Scene,
        _context: &RenderContext,
        sampler: &mut dyn Sampler,
        ray: Ray,
        _splats: &mut Vec<Splat>,
    ) -> RGBColor {
        let mut path: SubpathBuffer<LightVertex> = SubpathBuffer::new();
        self.trace_light(scene, sampler, &mut path);

        let mut radiance = RGBColor::ZERO;

        let mut origin = ray.origin;
        let mut surface = scene.intersect(origin, ray.direction);

        // emitters met before the first scattering surface contribute in
        // full; no other strategy reaches a zero-bounce light hit
        while let Some(light_surface) = surface.filter(|s| s.is_light()) {
            radiance += (scene.query_radiance(&light_surface, -ray.direction)).or_zero();
            origin = light_surface.position;
            surface = scene.intersect(origin, ray.direction);
        }

        let Some(first_surface) = surface else {
            return radiance;
        };

        // the eye subpath is a rolling window: only the newest vertex is
        // ever connected
        let mut current = EyeVertex {
            surface: first_surface,
            omega: -ray.direction,
            throughput: RGBColor::ONE,
            specular: 1.0,
            c: 0.0,
            big_c: 0.0,
        };

        radiance += self.connect_all(scene, sampler, &current, &path);

        let mut subpath_size = 2usize;
        let mut roulette = if subpath_size < self.min_subpath {
            1.0
        } else {
            self.roulette
        };
        let mut uniform = sampler.draw_1d().x;

        while uniform < roulette {
            let bsdf = scene.sample_bsdf(sampler, &current.surface, current.omega);
            if bsdf.is_zero() || bsdf.density == 0.0 {
                return radiance;
            }

            let Some(surface) = scene.intersect_mesh_only(current.surface.position, bsdf.omega)
            else {
                return radiance;
            };

            let edge = Edge::new(&current.surface, &surface, bsdf.omega);

            // the chain-specular update lands on the previous vertex
            // before the recurrence reads it
            let specular_prev = current.specular.max(bsdf.specular);
            let c = 1.0 / self.beta.beta(edge.f_geometry * bsdf.density);
            current = EyeVertex {
                surface,
                omega: -bsdf.omega,
                throughput: current.throughput
                    * bsdf.throughput
                    * (edge.b_cos_theta / (bsdf.density * roulette)),
                specular: specular_prev * bsdf.specular,
                c,
                big_c: (current.big_c * self.beta.beta(bsdf.density_rev)
                    + current.c * (1.0 - specular_prev))
                    * self.beta.beta(edge.b_geometry)
                    * c,
            };

            subpath_size += 1;
            radiance += self.connect_all(scene, sampler, &current, &path);

            roulette = if subpath_size < self.min_subpath {
                1.0
            } else {
                self.roulette
            };
            uniform = sampler.draw_1d().x;
        }

        radiance
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::camera::{cornell_camera, RenderContext};
    use crate::math::RandomSampler;
    use crate::scene::cornell_box;
    use crate::technique::FixedBeta;

    #[test]
    fn test_light_subpath_vertices_lie_on_meshes() {
        let scene = cornell_box();
        let technique = BptBase::new(3, 0.75, FixedBeta::<1>);
        let mut sampler = RandomSampler::new(31);
        for _ in 0..200 {
            let mut path = SubpathBuffer::new();
            technique.trace_light(&scene, &mut sampler, &mut path);
            for vertex in path.as_slice() {
                assert!(!vertex.surface.is_light());
                assert!(vertex.throughput.is_finite());
                assert!(vertex.a.is_finite() && vertex.big_a.is_finite());
                assert!(vertex.a > 0.0);
            }
        }
    }

    #[test]
    fn test_first_light_vertex_partial_sums() {
        // for the first stored vertex, A = beta(bG) * a / beta(pA) exactly
        let scene = cornell_box();
        let technique = BptBase::new(100, 1.0, FixedBeta::<1>);
        let mut sampler = RandomSampler::new(77);
        for _ in 0..50 {
            let mut path = SubpathBuffer::new();
            technique.trace_light(&scene, &mut sampler, &mut path);
            if let Some(first) = path.as_slice().first() {
                // a = 1 / (fG * omega_density) is positive and finite, and
                // A inherits the area-density normalization
                assert!(first.big_a > 0.0);
            }
        }
    }

    #[test]
    fn test_trace_eye_produces_finite_radiance() {
        let scene = cornell_box();
        let context = RenderContext::new(&cornell_camera(), (64, 64));
        let technique = BptBase::new(3, 0.75, FixedBeta::<1>);
        let mut sampler = RandomSampler::new(5);
        let mut splats = Vec::new();
        let mut sum = RGBColor::ZERO;
        for i in 0..300 {
            let x = 8.0 + (i % 48) as f32;
            let y = 8.0 + (i / 48) as f32 * 7.0;
            let ray = context.shoot(x, y);
            let value = technique.trace_eye(&scene, &context, &mut sampler, ray, &mut splats);
            assert!(value.is_finite(), "{:?}", value);
            assert!(value.r >= 0.0 && value.g >= 0.0 && value.b >= 0.0);
            sum += value;
        }
        assert!(sum.avg() > 0.0, "cornell box renders black");
        assert!(splats.is_empty(), "BPT does not splat");
    }
}
