//! Partition-of-unity checks for the recursive MIS weights: for a fixed
//! transport path every strategy's balance/power weight is computed the way
//! the estimators compute it, and the weights must sum to one.

use candela::bsdf::{BsdfEnum, CameraBsdf, LambertianBsdf, LightBsdf};
use candela::geometry::{Edge, SurfacePoint};
use candela::math::{Mat3, Vec3, FRAC_1_PI, PI};
use candela::technique::{Beta, FixedBeta, VariableBeta};
use candela::RGBColor;

struct Path {
    light_frame: Mat3,
    y0: SurfacePoint,
    x1: SurfacePoint,
    x2: SurfacePoint,
    camera: SurfacePoint,
    lambert: BsdfEnum,
    light_bsdf: BsdfEnum,
    camera_bsdf: BsdfEnum,
    area_density: f32,
}

fn surface(position: Vec3, normal: Vec3, material_id: i32) -> SurfacePoint {
    SurfacePoint {
        position,
        tangent: Mat3::from_normal(normal),
        gnormal: normal,
        material_id,
    }
}

fn fixed_path() -> Path {
    let y0 = Vec3::new(0.4, 1.0, 0.3);
    let x1 = Vec3::new(0.6, 0.0, 0.35);
    let x2 = Vec3::new(0.0, 0.5, 0.0);
    let camera = Vec3::new(0.0, 0.5, -2.0);

    let light_frame = Mat3::from_normal(-Vec3::Y);
    let n2 = Vec3::new(0.3, -0.4, -0.85).normalized();
    let camera_axis = (x2 - camera).normalized();

    Path {
        light_frame,
        y0: SurfacePoint {
            position: y0,
            tangent: light_frame,
            gnormal: light_frame.cols[1],
            material_id: -1,
        },
        x1: surface(x1, Vec3::Y, 0),
        x2: surface(x2, n2, 0),
        camera: surface(camera, camera_axis, 0),
        lambert: BsdfEnum::Lambertian(LambertianBsdf::new(RGBColor::splat(0.65))),
        light_bsdf: BsdfEnum::Light(LightBsdf::new()),
        camera_bsdf: BsdfEnum::Camera(CameraBsdf::new()),
        area_density: 2.5,
    }
}

fn direction(from: &SurfacePoint, to: &SurfacePoint) -> Vec3 {
    (to.position - from.position).normalized()
}

/// Emission direction density at the light (cosine over the emitting
/// hemisphere), as the light sampler and the LSDF report it.
fn omega_density(path: &Path, towards: Vec3) -> f32 {
    (towards * path.light_frame.cols[1]).max(0.0) * FRAC_1_PI
}

/// The three-strategy family of the bidirectional estimator: a chance
/// light hit, explicit next-event estimation, and the stored-vertex
/// connection, for the path camera -> x2 -> x1 -> y0.
fn bpt_weights<B: Beta>(beta: B) -> Vec<f32> {
    let p = fixed_path();
    let b = |x: f32| beta.beta(x);

    let d01 = direction(&p.y0, &p.x1);
    let to_y0 = direction(&p.x1, &p.y0);
    let to_x2 = direction(&p.x1, &p.x2);
    let to_x1 = direction(&p.x2, &p.x1);
    let to_camera = direction(&p.x2, &p.camera);
    let d12 = direction(&p.x1, &p.x2);

    let p_omega = omega_density(&p, d01);
    let edge01 = Edge::new(&p.y0, &p.x1, d01);
    let edge12 = Edge::new(&p.x1, &p.x2, d12);
    let edge21 = Edge::new(&p.x2, &p.x1, to_x1);
    let edge10 = Edge::new(&p.x1, &p.y0, to_y0);

    // light subpath: y0 sampled, first hit x1 stored
    let a1 = 1.0 / b(edge01.f_geometry * p_omega);
    let big_a1 = b(edge01.b_geometry) * a1 / b(p.area_density);

    // eye subpath: first surface vertex x2 (c = C = 0, specular = 1),
    // walk step to x1
    let q_walk = p.lambert.query(&p.x2, to_camera, to_x1);
    let c1 = 1.0 / b(edge21.f_geometry * q_walk.density);
    let big_c1 = 0.0;

    // s = 2: connect stored x1 to eye vertex x2
    let lq = p.lambert.query(&p.x1, to_y0, d12);
    let eq = p.lambert.query(&p.x2, to_x1, to_camera);
    let w_inv_s2 = (big_a1 * b(lq.density_rev) + a1) * b(edge12.b_geometry * eq.density_rev)
        + 1.0
        + (0.0 * b(eq.density) + 0.0) * b(edge12.f_geometry * lq.density);

    // s = 1: next-event estimation at eye vertex x1 (specular = 0)
    let bq = p.lambert.query(&p.x1, to_y0, to_x2);
    let w_inv_s1 = b(bq.density_rev * edge01.b_geometry / p.area_density)
        + 1.0
        + (big_c1 * b(bq.density) + c1) * b(edge01.f_geometry * p_omega);

    // s = 0: BSDF-sampled light hit from x1
    let q10 = p.lambert.query(&p.x1, to_x2, to_y0);
    let c0 = 1.0 / b(edge10.f_geometry * q10.density);
    let big_c0 = (big_c1 * b(q10.density_rev) + c1) * b(edge10.b_geometry) * c0;
    let c_prime = (big_c0 * b(p_omega) + c0) * b(p.area_density);
    let w_inv_s0 = c_prime + 1.0;

    vec![1.0 / w_inv_s0, 1.0 / w_inv_s1, 1.0 / w_inv_s2]
}

/// The five-strategy family of the VCM/UPG estimator for the same path:
/// the eye walk reaching the light, connections to the on-light vertex and
/// to the stored mesh vertex, the camera splat, and the merge at x1.
fn upg_weights<B: Beta>(beta: B, num_scattered: f32, radius: f32) -> Vec<f32> {
    let p = fixed_path();
    let b = |x: f32| beta.beta(x);
    let eta = b(num_scattered * PI * radius * radius);

    let d01 = direction(&p.y0, &p.x1);
    let to_y0 = direction(&p.x1, &p.y0);
    let to_x2 = direction(&p.x1, &p.x2);
    let to_x1 = direction(&p.x2, &p.x1);
    let to_camera = direction(&p.x2, &p.camera);
    let o2c = direction(&p.x2, &p.camera);
    let d12 = direction(&p.x1, &p.x2);

    let p_omega = omega_density(&p, d01);
    let edge_c2 = Edge::new(&p.camera, &p.x2, -to_camera);
    let edge01 = Edge::new(&p.y0, &p.x1, d01);
    let edge12 = Edge::new(&p.x1, &p.x2, d12);
    let edge21 = Edge::new(&p.x2, &p.x1, to_x1);
    let edge10 = Edge::new(&p.x1, &p.y0, to_y0);
    let edge2c = Edge::new(&p.x2, &p.camera, o2c);

    // light subpath partial sums: path[0] on the light, x1, x2
    let a0 = 1.0 / b(p.area_density);
    let a1 = 1.0 / b(edge01.f_geometry * p_omega);
    let big_a1 = b(edge01.b_geometry) * a1 / b(p.area_density);
    let big_b1 = 0.0;

    let lq12 = p.lambert.query(&p.x1, to_y0, to_x2);
    let a2 = 1.0 / b(edge12.f_geometry * lq12.density);
    let big_a2 = (big_a1 * b(lq12.density_rev) + a1) * b(edge12.b_geometry) * a2;
    let big_b2 = (big_b1 * b(lq12.density_rev) + 1.0) * b(edge12.b_geometry) * a2;

    // eye subpath partial sums: camera (all zero), x2, x1, y0
    let c2 = 1.0 / b(edge_c2.f_geometry);
    let (big_c2, d2, big_d2) = (0.0, 0.0, 0.0);

    let q21 = p.lambert.query(&p.x2, to_camera, to_x1);
    let c1 = 1.0 / b(edge21.f_geometry * q21.density);
    let big_c1 = (big_c2 * b(q21.density_rev) + c2) * b(edge21.b_geometry) * c1;
    let d1 = 1.0;
    let big_d1 = (big_d2 * b(q21.density_rev) + d2) * b(edge21.b_geometry) * c1;

    let q10 = p.lambert.query(&p.x1, to_x2, to_y0);
    let c0 = 1.0 / b(edge10.f_geometry * q10.density);
    let big_c0 = (big_c1 * b(q10.density_rev) + c1) * b(edge10.b_geometry) * c0;
    let big_d0 = (big_d1 * b(q10.density_rev) + d1) * b(edge10.b_geometry) * c0;

    // 1: the eye walk runs into the light
    let w1 = {
        let cp = (big_c0 * b(p_omega) + c0) * b(p.area_density);
        let dp = big_d0 / c0 * b(p_omega);
        1.0 / (cp + eta * dp + 1.0)
    };

    // 2: connect the on-light vertex to x1 (direct merge skipped)
    let w2 = {
        let lq = p.light_bsdf.query(&p.y0, Vec3::ZERO, d01);
        let eq = p.lambert.query(&p.x1, to_y0, to_x2);
        let ap = (0.0 * b(lq.density_rev) + a0) * b(edge01.b_geometry * eq.density_rev);
        let cp = (big_c1 * b(eq.density) + c1) * b(edge01.f_geometry * lq.density);
        let dp = (big_d1 * b(eq.density) + d1) * b(edge01.f_geometry * lq.density);
        1.0 / (ap + cp + eta * dp + 1.0)
    };

    // 3: connect the stored mesh vertex x1 to the eye vertex x2
    let (w3, w3_eq_density_rev) = {
        let lq = p.lambert.query(&p.x1, to_y0, d12);
        let eq = p.lambert.query(&p.x2, to_x1, to_camera);
        let ap = (big_a1 * b(lq.density_rev) + a1) * b(edge12.b_geometry * eq.density_rev);
        let bp = big_b1 * b(lq.density_rev) * b(edge12.b_geometry * eq.density_rev);
        let cp = (big_c2 * b(eq.density) + c2) * b(edge12.f_geometry * lq.density);
        let dp = (big_d2 * b(eq.density) + d2 * 1.0) * b(edge12.f_geometry * lq.density);
        let vm = eta * b(edge12.b_geometry * eq.density_rev);
        (
            1.0 / (ap + eta * bp + cp + eta * dp + vm + 1.0),
            eq.density_rev,
        )
    };

    // 4: splat x2 through the camera (direct merge skipped)
    let w4 = {
        let lq = p.lambert.query(&p.x2, to_x1, o2c);
        let eq = p.camera_bsdf.query(&p.camera, -o2c, Vec3::Y);
        let ap = (big_a2 * b(lq.density_rev) + a2) * b(edge2c.b_geometry * eq.density_rev);
        let bp = big_b2 * b(lq.density_rev) * b(edge2c.b_geometry * eq.density_rev);
        1.0 / (ap + eta * bp + 1.0)
    };

    // 5: merge the photon at x1 with the eye walk through x2
    let w5 = eta * b(edge12.b_geometry * w3_eq_density_rev) * w3;

    vec![w1, w2, w3, w4, w5]
}

fn assert_partition(weights: &[f32], label: &str) {
    let sum: f32 = weights.iter().sum();
    assert!(
        (sum - 1.0).abs() < 1e-4,
        "{}: strategy weights {:?} sum to {}",
        label,
        weights,
        sum
    );
    for w in weights {
        assert!((0.0..=1.0 + 1e-5).contains(w), "{}: weight {} out of range", label, w);
    }
}

#[test]
fn test_bpt_partition_of_unity_beta_0() {
    assert_partition(&bpt_weights(FixedBeta::<0>), "BPT beta=0");
}

#[test]
fn test_bpt_partition_of_unity_beta_1() {
    assert_partition(&bpt_weights(FixedBeta::<1>), "BPT beta=1");
}

#[test]
fn test_bpt_partition_of_unity_beta_2() {
    assert_partition(&bpt_weights(FixedBeta::<2>), "BPT beta=2");
}

#[test]
fn test_bpt_partition_variable_beta_matches_fixed() {
    let fixed = bpt_weights(FixedBeta::<1>);
    let variable = bpt_weights(VariableBeta::new(1.0));
    for (f, v) in fixed.iter().zip(variable.iter()) {
        assert!((f - v).abs() < 1e-5);
    }
}

#[test]
fn test_upg_partition_of_unity_beta_0() {
    assert_partition(&upg_weights(FixedBeta::<0>, 50_000.0, 0.02), "UPG beta=0");
}

#[test]
fn test_upg_partition_of_unity_beta_1() {
    assert_partition(&upg_weights(FixedBeta::<1>, 50_000.0, 0.02), "UPG beta=1");
}

#[test]
fn test_upg_partition_of_unity_beta_2() {
    assert_partition(&upg_weights(FixedBeta::<2>, 50_000.0, 0.02), "UPG beta=2");
}

#[test]
fn test_upg_partition_over_radius_sweep() {
    // the eta balance between merging and connection strategies must not
    // disturb the partition for any photon count or radius
    for (n, r) in [(1e3, 0.005), (1e5, 0.02), (1e7, 0.1)] {
        assert_partition(
            &upg_weights(FixedBeta::<1>, n, r),
            &format!("UPG n={} r={}", n, r),
        );
    }
}
