use std::marker::PhantomData;

use rayon::prelude::*;

use super::{Beta, Splat, SubpathBuffer, Technique};
use crate::bsdf::{BsdfEnum, BsdfQuery, CameraBsdf};
use crate::camera::RenderContext;
use crate::geometry::{BoundingSphere, Edge, Ray, SurfacePoint};
use crate::index::{HashGrid3D, KdTree3D, Positioned};
use crate::math::{derive_seed, Mat3, RandomSampler, Sampler, Vec3, PI};
use crate::scene::Scene;
use crate::RGBColor;

#[derive(Debug, Copy, Clone)]
pub struct UpgLightVertex {
    pub surface: SurfacePoint,
    pub omega: Vec3,
    pub throughput: RGBColor,
    pub specular: f32,
    pub a: f32,
    pub big_a: f32,
    pub big_b: f32,
}

impl Default for UpgLightVertex {
    fn default() -> Self {
        UpgLightVertex {
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
            big_b: 0.0,
        }
    }
}

impl Positioned for UpgLightVertex {
    fn position(&self) -> Vec3 {
        self.surface.position
    }
}

#[derive(Debug, Copy, Clone)]
struct UpgEyeVertex {
    surface: SurfacePoint,
    omega: Vec3,
    throughput: RGBColor,
    specular: f32,
    c: f32,
    big_c: f32,
    d: f32,
    big_d: f32,
}

/// Whether the gather step pays for its kernel with the unbiased
/// reciprocal-probability estimate or the fixed `1 / (pdf pi r^2)` photon
/// density.
pub trait GatherMode: Copy + Send + Sync + Default + 'static {
    const UNBIASED: bool;
    fn name() -> &'static str;
}

#[derive(Debug, Copy, Clone, Default)]
pub struct UnbiasedGather;

impl GatherMode for UnbiasedGather {
    const UNBIASED: bool = true;
    fn name() -> &'static str {
        "Unbiased Photon Gathering"
    }
}

#[derive(Debug, Copy, Clone, Default)]
pub struct BiasedGather;

impl GatherMode for BiasedGather {
    const UNBIASED: bool = false;
    fn name() -> &'static str {
        "Vertex Connection and Merging"
    }
}

/// Vertex connection and merging / unbiased photon gathering. Extends the
/// bidirectional estimator with a per-frame photon scatter phase and a
/// merging strategy over a range-search index; the additional partial sums
/// `B` and `d/D` fold the merging strategies into the O(1) MIS weights.
pub struct UpgBase<B: Beta, G: GatherMode> {
    min_subpath: usize,
    roulette: f32,
    num_photons: usize,
    num_gather: usize,
    radius: f32,
    beta: B,
    num_scattered: usize,
    grid: Option<HashGrid3D<UpgLightVertex>>,
    kdtree: Option<KdTree3D<UpgLightVertex>>,
    camera_bsdf: BsdfEnum,
    _mode: PhantomData<G>,
}

impl<B: Beta, G: GatherMode> UpgBase<B, G> {
    pub fn new(
        min_subpath: usize,
        roulette: f32,
        num_photons: usize,
        num_gather: usize,
        radius: f32,
        beta: B,
    ) -> Self {
        debug_assert!((0.0..=1.0).contains(&roulette) && roulette > 0.0);
        debug_assert!(radius > 0.0 && num_photons > 0);
        UpgBase {
            min_subpath,
            roulette,
            num_photons,
            num_gather,
            radius,
            beta,
            num_scattered: 0,
            grid: None,
            kdtree: None,
            camera_bsdf: BsdfEnum::Camera(CameraBsdf::new()),
            _mode: PhantomData,
        }
    }

    fn eta(&self, radius: f32) -> f32 {
        self.beta
            .beta(self.num_scattered as f32 * PI * radius * radius)
    }

    /// Build one light subpath. With `store_origin` the vertex on the
    /// emitter itself is kept as `path[0]` so the estimator can connect to
    /// it (the explicit next-event family); the scatter phase stores mesh
    /// vertices only.
    fn trace_light(
        &self,
        scene: &Scene,
        sampler: &mut dyn Sampler,
        path: &mut SubpathBuffer<UpgLightVertex>,
        store_origin: bool,
    ) {
        let light = scene.sample_light(sampler);

        if store_origin {
            path.push(UpgLightVertex {
                surface: light.surface,
                omega: Vec3::ZERO,
                throughput: light.radiance / light.area_density,
                specular: 0.0,
                a: 1.0 / self.beta.beta(light.area_density),
                big_a: 0.0,
                big_b: 0.0,
            });
        }

        let Some(surface) = scene.intersect_mesh_only(light.surface.position, light.omega) else {
            return;
        };

        let edge = Edge::new(&light.surface, &surface, light.omega);
        let a = 1.0 / self.beta.beta(edge.f_geometry * light.omega_density);
        if !path.push(UpgLightVertex {
            surface,
            omega: -light.omega,
            throughput: light.radiance * (edge.b_cos_theta / light.density()),
            specular: 0.0,
            a,
            big_a: self.beta.beta(edge.b_geometry) * a / self.beta.beta(light.area_density),
            big_b: 0.0,
        }) {
            return;
        }
        let mut prv = path.len() - 1;

        let mut path_size = 2usize;
        let mut roulette = if path_size < self.min_subpath {
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

            path_size += 1;

            let previous = path[prv];
            let specular_prev = previous.specular.max(bsdf.specular);
            let edge = Edge::new(&previous.surface, &surface, bsdf.omega);

            let a = 1.0 / self.beta.beta(edge.f_geometry * bsdf.density);
            let vertex = UpgLightVertex {
                surface,
                omega: -bsdf.omega,
                throughput: previous.throughput
                    * bsdf.throughput
                    * (edge.b_cos_theta / (bsdf.density * roulette)),
                specular: bsdf.specular,
                a,
                big_a: (previous.big_a * self.beta.beta(bsdf.density_rev)
                    + previous.a * (1.0 - specular_prev))
                    * self.beta.beta(edge.b_geometry)
                    * a,
                big_b: (previous.big_b * self.beta.beta(bsdf.density_rev)
                    + (1.0 - bsdf.specular))
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

            roulette = if path_size < self.min_subpath {
                1.0
            } else {
                self.roulette
            };
            uniform = sampler.draw_1d().x;
        }

        // a tail vertex that scatters as a delta cannot be connected to
        let probe = scene.sample_bsdf(sampler, &path[prv].surface, path[prv].omega);
        if probe.specular == 1.0 {
            path.pop();
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn weight_vc(
        &self,
        light: &UpgLightVertex,
        light_bsdf: &BsdfQuery,
        eye: &UpgEyeVertex,
        eye_bsdf: &BsdfQuery,
        edge: &Edge,
        radius: f32,
        skip_direct_vm: bool,
    ) -> f32 {
        let eta = self.eta(radius);

        let ap = (light.big_a * self.beta.beta(light_bsdf.density_rev)
            + light.a * (1.0 - light.specular))
            * self.beta.beta(edge.b_geometry * eye_bsdf.density_rev);

        let bp = light.big_b
            * self.beta.beta(light_bsdf.density_rev)
            * self.beta.beta(edge.b_geometry * eye_bsdf.density_rev);

        let cp = (eye.big_c * self.beta.beta(eye_bsdf.density) + eye.c * (1.0 - eye.specular))
            * self.beta.beta(edge.f_geometry * light_bsdf.density);

        let dp = (eye.big_d * self.beta.beta(eye_bsdf.density)
            + eye.d * (1.0 - eye_bsdf.specular))
            * self.beta.beta(edge.f_geometry * light_bsdf.density);

        // merging directly against the light source has no counterpart
        // strategy; its density is excluded rather than zeroed inside the
        // power so beta = 0 counts strategies correctly
        let vm = if skip_direct_vm {
            0.0
        } else {
            eta * self.beta.beta(edge.b_geometry * eye_bsdf.density_rev)
        };

        let weight_inv = ap + eta * bp + cp + eta * dp + vm + 1.0;
        1.0 / weight_inv
    }

    fn weight_vm(
        &self,
        light: &UpgLightVertex,
        light_bsdf: &BsdfQuery,
        eye: &UpgEyeVertex,
        eye_bsdf: &BsdfQuery,
        edge: &Edge,
        radius: f32,
    ) -> f32 {
        let weight = self.weight_vc(light, light_bsdf, eye, eye_bsdf, edge, radius, false);
        self.eta(radius) * self.beta.beta(edge.b_geometry * eye_bsdf.density_rev) * weight
    }

    /// Emission picked up when the eye walk runs into a light surface.
    fn connect_light(&self, scene: &Scene, eye: &UpgEyeVertex, radius: f32) -> RGBColor {
        if !eye.surface.is_light() {
            return RGBColor::ZERO;
        }
        let eta = self.eta(radius);
        let lsdf = scene.query_lsdf(&eye.surface, eye.omega);

        let cp = (eye.big_c * self.beta.beta(lsdf.omega_density)
            + eye.c * (1.0 - eye.specular))
            * self.beta.beta(lsdf.area_density);
        let dp = eye.big_d / eye.c * self.beta.beta(lsdf.omega_density);

        let weight_inv = cp + eta * dp + 1.0;

        (lsdf.radiance * eye.throughput / weight_inv).or_zero()
    }

    fn connect_vertex(
        &self,
        scene: &Scene,
        light: &UpgLightVertex,
        eye: &UpgEyeVertex,
        radius: f32,
        skip_direct_vm: bool,
    ) -> RGBColor {
        let omega = (eye.surface.position - light.surface.position).normalized();

        let light_bsdf = scene.query_bsdf(&light.surface, light.omega, omega);
        let eye_bsdf = scene.query_bsdf(&eye.surface, -omega, eye.omega);
        if light_bsdf.throughput.is_zero() || eye_bsdf.throughput.is_zero() {
            return RGBColor::ZERO;
        }

        let edge = Edge::new(&light.surface, &eye.surface, omega);
        let weight = self.weight_vc(light, &light_bsdf, eye, &eye_bsdf, &edge, radius, skip_direct_vm);

        let visible = scene.occluded(&eye.surface, &light.surface);
        if visible == 0.0 {
            return RGBColor::ZERO;
        }

        (light.throughput
            * light_bsdf.throughput
            * eye.throughput
            * eye_bsdf.throughput
            * (visible * edge.f_geometry * weight))
            .or_zero()
    }

    /// Connect the eye vertex to every stored light vertex. The on-light
    /// vertex `path[0]` skips the direct-merge strategy in its weight.
    fn connect_path(
        &self,
        scene: &Scene,
        eye: &UpgEyeVertex,
        path: &SubpathBuffer<UpgLightVertex>,
        radius: f32,
    ) -> RGBColor {
        let mut radiance = RGBColor::ZERO;
        for (index, light) in path.as_slice().iter().enumerate() {
            radiance += self.connect_vertex(scene, light, eye, radius, index == 0);
        }
        radiance
    }

    /// Splat every stored mesh vertex of the light subpath through the
    /// camera, with the adjoint shading-normal correction.
    fn connect_eye(
        &self,
        scene: &Scene,
        context: &RenderContext,
        eye: &UpgEyeVertex,
        path: &SubpathBuffer<UpgLightVertex>,
        radius: f32,
        splats: &mut Vec<Splat>,
    ) {
        for light in path.as_slice().iter().skip(1) {
            let towards = light.surface.position - eye.surface.position;
            let Some((pixel, _)) = context.project(towards) else {
                continue;
            };

            let omega = (eye.surface.position - light.surface.position).normalized();
            let light_bsdf = scene.query_bsdf(&light.surface, light.omega, omega);
            let eye_bsdf = self.camera_bsdf.query(&eye.surface, -omega, eye.omega);
            if light_bsdf.throughput.is_zero() || eye_bsdf.throughput.is_zero() {
                continue;
            }

            let edge = Edge::new(&light.surface, &eye.surface, omega);
            let weight =
                self.weight_vc(light, &light_bsdf, eye, &eye_bsdf, &edge, radius, true);

            let visible = scene.occluded(&eye.surface, &light.surface);
            if visible == 0.0 {
                continue;
            }

            let gnormal_cos = light.omega * light.surface.gnormal;
            if gnormal_cos == 0.0 {
                continue;
            }
            let correct_normal = ((light.omega * light.surface.normal()) / gnormal_cos).abs();

            let value = light.throughput
                * light_bsdf.throughput
                * eye.throughput
                * eye_bsdf.throughput
                * (visible * edge.f_geometry * weight * context.focal_factor_y * correct_normal);

            splats.push(Splat {
                pixel,
                value: value.or_zero(),
            });
        }
    }

    /// One merging step: BSDF-sample a tentative direction, range-search
    /// the photon map around the hit, and merge every vertex found.
    fn gather(
        &self,
        scene: &Scene,
        sampler: &mut dyn Sampler,
        eye: &UpgEyeVertex,
        radius: f32,
    ) -> RGBColor {
        if self.num_scattered == 0 {
            return RGBColor::ZERO;
        }
        let eye_sample = scene.sample_bsdf(sampler, &eye.surface, eye.omega);
        if eye_sample.is_zero() || eye_sample.density == 0.0 {
            return RGBColor::ZERO;
        }

        let Some(surface) = scene.intersect_mesh_only(eye.surface.position, eye_sample.omega)
        else {
            return RGBColor::ZERO;
        };

        let mut radiance = RGBColor::ZERO;

        if G::UNBIASED {
            let Some(grid) = self.grid.as_ref() else {
                return RGBColor::ZERO;
            };
            grid.query_within_radius(surface.position, radius, |light| {
                radiance += self.merge_unbiased(scene, &mut *sampler, light, eye, radius);
            });
        } else {
            let Some(kdtree) = self.kdtree.as_ref() else {
                return RGBColor::ZERO;
            };
            // the tentative sample stands in for the connection query with
            // its densities transposed (the connection runs the other way)
            let eye_query = BsdfQuery {
                throughput: eye_sample.throughput,
                density: eye_sample.density_rev,
                density_rev: eye_sample.density,
                specular: eye_sample.specular,
            };
            for light in kdtree.query_k(surface.position, self.num_gather, radius) {
                radiance += self.merge_biased(scene, &light, eye, &eye_query, radius);
            }
        }

        radiance / self.num_scattered as f32
    }

    fn merge_unbiased(
        &self,
        scene: &Scene,
        sampler: &mut dyn Sampler,
        light: &UpgLightVertex,
        eye: &UpgEyeVertex,
        radius: f32,
    ) -> RGBColor {
        let omega = (eye.surface.position - light.surface.position).normalized();

        let light_bsdf = scene.query_bsdf(&light.surface, light.omega, omega);
        let eye_bsdf = scene.query_bsdf(&eye.surface, -omega, eye.omega);

        let edge = Edge::new(&light.surface, &eye.surface, omega);

        let result = light.throughput
            * light_bsdf.throughput
            * eye.throughput
            * eye_bsdf.throughput
            * (scene.occluded(&eye.surface, &light.surface) * edge.f_geometry);

        if result.l1_norm() < f32::EPSILON {
            return RGBColor::ZERO;
        }

        let density = scene.bsdf(&eye.surface).gathering_density(
            sampler,
            scene,
            &eye.surface,
            BoundingSphere {
                center: light.surface.position,
                radius,
            },
            eye.omega,
        );

        let weight = self.weight_vm(light, &light_bsdf, eye, &eye_bsdf, &edge, radius);
        if density.is_finite() {
            (result * density * weight).or_zero()
        } else {
            RGBColor::ZERO
        }
    }

    fn merge_biased(
        &self,
        scene: &Scene,
        light: &UpgLightVertex,
        eye: &UpgEyeVertex,
        eye_query: &BsdfQuery,
        radius: f32,
    ) -> RGBColor {
        let omega = (eye.surface.position - light.surface.position).normalized();

        let light_bsdf = scene.query_bsdf(&light.surface, light.omega, omega);
        let edge = Edge::new(&light.surface, &eye.surface, omega);

        let weight = self.weight_vm(light, &light_bsdf, eye, eye_query, &edge, radius);
        let density = 1.0 / (edge.b_geometry * eye_query.density_rev * PI * radius * radius);

        let result = light.throughput
            * light_bsdf.throughput
            * eye.throughput
            * eye_query.throughput
            * (scene.occluded(&light.surface, &eye.surface) * edge.f_geometry);

        if density.is_finite() {
            (result * (density * weight)).or_zero()
        } else {
            RGBColor::ZERO
        }
    }
}

impl<B: Beta, G: GatherMode> Technique for UpgBase<B, G> {
    fn name(&self) -> String {
        format!("{} ({})", G::name(), self.beta.suffix())
    }

    /// The scatter phase: emit `num_photons` light subpaths in parallel
    /// with per-photon seeds and rebuild the range-search index over all
    /// their mesh vertices. Every attempt emits a subpath, so the
    /// attempted and emitted counts coincide.
    fn preprocess(&mut self, scene: &Scene, seed: u64, frame_index: usize) {
        let base = derive_seed(seed, 0x7068_6f74_6f6e ^ (frame_index as u64) << 24);
        let vertices: Vec<UpgLightVertex> = (0..self.num_photons)
            .into_par_iter()
            .map(|photon_index| {
                let mut sampler = RandomSampler::new(derive_seed(base, photon_index as u64));
                let mut path = SubpathBuffer::new();
                self.trace_light(scene, &mut sampler, &mut path, false);
                path.as_slice().to_vec()
            })
            .flatten()
            .collect();

        self.num_scattered = self.num_photons;
        info!(
            "scattered {} photon subpaths into {} stored vertices",
            self.num_scattered,
            vertices.len()
        );

        if G::UNBIASED {
            self.grid = Some(HashGrid3D::new(vertices, self.radius));
        } else {
            self.kdtree = Some(KdTree3D::new(vertices));
        }
    }

    fn trace_eye(
        &self,
        scene: &Scene,
        context: &RenderContext,
        sampler: &mut dyn Sampler,
        ray: Ray,
        splats: &mut Vec<Splat>,
    ) -> RGBColor {
        let radius = self.radius;
        let mut path: SubpathBuffer<UpgLightVertex> = SubpathBuffer::new();
        self.trace_light(scene, sampler, &mut path, true);

        let mut radiance = RGBColor::ZERO;

        let camera_vertex = UpgEyeVertex {
            surface: context.camera_surface(),
            omega: -ray.direction,
            throughput: RGBColor::ONE,
            specular: 0.0,
            c: 0.0,
            big_c: 0.0,
            d: 0.0,
            big_d: 0.0,
        };
        self.connect_eye(scene, context, &camera_vertex, &path, radius, splats);

        let mut origin = camera_vertex.surface.position;
        let mut surface_opt = scene.intersect(origin, ray.direction);

        while let Some(light_surface) = surface_opt.filter(|s| s.is_light()) {
            radiance += scene.query_radiance(&light_surface, -ray.direction).or_zero();
            origin = light_surface.position;
            surface_opt = scene.intersect(origin, ray.direction);
        }

        let Some(first_surface) = surface_opt else {
            return radiance;
        };

        let first_edge = Edge::new(&camera_vertex.surface, &first_surface, ray.direction);
        let mut current = UpgEyeVertex {
            surface: first_surface,
            omega: -ray.direction,
            throughput: RGBColor::ONE,
            specular: 0.0,
            c: 1.0 / self.beta.beta(first_edge.f_geometry),
            big_c: 0.0,
            d: 0.0,
            big_d: 0.0,
        };

        let mut path_size = 2usize;

        loop {
            radiance += self.gather(scene, sampler, &current, radius);
            radiance += self.connect_path(scene, &current, &path, radius);

            let bsdf = scene.sample_bsdf(sampler, &current.surface, current.omega);
            if bsdf.is_zero() || bsdf.density == 0.0 {
                return radiance;
            }

            let specular_prev = current.specular.max(bsdf.specular);
            let mut origin = current.surface.position;
            let next;

            // pass through emitter surfaces, collecting their emission as
            // the zero-connection strategy
            loop {
                let Some(surface) = scene.intersect(origin, bsdf.omega) else {
                    return radiance;
                };

                let edge = Edge::new(&current.surface, &surface, bsdf.omega);
                let c = 1.0 / self.beta.beta(edge.f_geometry * bsdf.density);
                let vertex = UpgEyeVertex {
                    surface,
                    omega: -bsdf.omega,
                    throughput: current.throughput
                        * bsdf.throughput
                        * (edge.b_cos_theta / bsdf.density),
                    specular: bsdf.specular,
                    c,
                    big_c: (current.big_c * self.beta.beta(bsdf.density_rev)
                        + current.c * (1.0 - specular_prev))
                        * self.beta.beta(edge.b_geometry)
                        * c,
                    d: 1.0,
                    big_d: (current.big_d * self.beta.beta(bsdf.density_rev)
                        + current.d * (1.0 - bsdf.specular))
                        * self.beta.beta(edge.b_geometry)
                        * c,
                };

                if surface.is_light() {
                    radiance += self.connect_light(scene, &vertex, radius);
                    origin = surface.position;
                } else {
                    next = vertex;
                    break;
                }
            }

            current = next;

            let roulette = if path_size < self.min_subpath {
                1.0
            } else {
                self.roulette
            };
            if roulette < sampler.draw_1d().x {
                return radiance;
            }
            current.throughput /= roulette;
            path_size += 1;
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::camera::{cornell_camera, RenderContext};
    use crate::scene::cornell_box;
    use crate::technique::FixedBeta;

    fn vcm1(num_photons: usize) -> UpgBase<FixedBeta<1>, BiasedGather> {
        UpgBase::new(3, 0.75, num_photons, 64, 0.02, FixedBeta::<1>)
    }

    fn upg1(num_photons: usize) -> UpgBase<FixedBeta<1>, UnbiasedGather> {
        UpgBase::new(3, 0.75, num_photons, 64, 0.02, FixedBeta::<1>)
    }

    #[test]
    fn test_scatter_fills_index() {
        let scene = cornell_box();
        let mut technique = vcm1(500);
        technique.preprocess(&scene, 42, 0);
        assert_eq!(technique.num_scattered, 500);
        let tree = technique.kdtree.as_ref().unwrap();
        assert!(tree.len() > 0, "no photons stored");
        // photons live on mesh surfaces inside the box
        let near = tree.query_k(Vec3::splat(0.28), 10_000, 1.0);
        assert_eq!(near.len(), tree.len().min(10_000));
    }

    #[test]
    fn test_scatter_is_deterministic() {
        let scene = cornell_box();
        let mut a = upg1(300);
        let mut b = upg1(300);
        a.preprocess(&scene, 9, 0);
        b.preprocess(&scene, 9, 0);
        assert_eq!(
            a.grid.as_ref().unwrap().len(),
            b.grid.as_ref().unwrap().len()
        );
    }

    #[test]
    fn test_trace_eye_finite_and_splatting() {
        let scene = cornell_box();
        let context = RenderContext::new(&cornell_camera(), (64, 64));
        let mut technique = vcm1(400);
        technique.preprocess(&scene, 3, 0);
        let mut sampler = RandomSampler::new(11);
        let mut splats = Vec::new();
        let mut sum = RGBColor::ZERO;
        for i in 0..200 {
            let ray = context.shoot(4.0 + (i % 56) as f32, 4.0 + (i / 56) as f32 * 13.0);
            let value = technique.trace_eye(&scene, &context, &mut sampler, ray, &mut splats);
            assert!(value.is_finite());
            assert!(value.r >= 0.0 && value.g >= 0.0 && value.b >= 0.0);
            sum += value;
        }
        assert!(sum.avg() > 0.0, "VCM renders black");
        assert!(!splats.is_empty(), "camera splats never produced");
        for splat in &splats {
            assert!(splat.value.is_finite());
            assert!(splat.pixel.0 < 64 && splat.pixel.1 < 64);
        }
    }

    #[test]
    fn test_unbiased_trace_eye_finite() {
        let scene = cornell_box();
        let context = RenderContext::new(&cornell_camera(), (48, 48));
        let mut technique = upg1(300);
        technique.preprocess(&scene, 5, 0);
        let mut sampler = RandomSampler::new(23);
        let mut splats = Vec::new();
        for i in 0..60 {
            let ray = context.shoot(6.0 + (i % 36) as f32, 6.0 + (i / 36) as f32 * 17.0);
            let value = technique.trace_eye(&scene, &context, &mut sampler, ray, &mut splats);
            assert!(value.is_finite());
        }
    }
}
