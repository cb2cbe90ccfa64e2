use super::*;

// Directional samplers below are expressed in a local frame whose y axis is
// the surface normal (tangent frames store the shading normal in column 1).

/// Uniform direction on the full sphere, density 1 / 4pi.
pub fn uniform_sphere(s: Sample2D) -> Vec3 {
    let y = 2.0 * s.x - 1.0;
    let r = (1.0 - y * y).max(0.0).sqrt();
    let phi = TAU * s.y;
    let (sin_phi, cos_phi) = phi.sin_cos();
    Vec3::new(r * cos_phi, y, r * sin_phi)
}

/// Uniform direction on the upper hemisphere, density 1 / 2pi.
pub fn uniform_hemisphere(s: Sample2D) -> Vec3 {
    let y = s.x;
    let r = (1.0 - y * y).max(0.0).sqrt();
    let phi = TAU * s.y;
    let (sin_phi, cos_phi) = phi.sin_cos();
    Vec3::new(r * cos_phi, y, r * sin_phi)
}

/// Cosine-weighted direction on the upper hemisphere, density cos(theta)/pi.
pub fn cosine_hemisphere(s: Sample2D) -> Vec3 {
    let y = (1.0 - s.x).sqrt();
    let r = s.x.sqrt();
    let phi = TAU * s.y;
    let (sin_phi, cos_phi) = phi.sin_cos();
    Vec3::new(r * cos_phi, y, r * sin_phi)
}

/// Power-cosine direction around the y axis, density (n+1)/2pi * cos^n.
pub fn power_cosine_hemisphere(s: Sample2D, power: f32) -> Vec3 {
    let y = s.x.powf(1.0 / (power + 1.0));
    let r = (1.0 - y * y).max(0.0).sqrt();
    let phi = TAU * s.y;
    let (sin_phi, cos_phi) = phi.sin_cos();
    Vec3::new(r * cos_phi, y, r * sin_phi)
}

/// Uniform point in the unit disk (polar warp).
pub fn uniform_disk(s: Sample2D) -> (f32, f32) {
    let r = s.x.sqrt();
    let phi = TAU * s.y;
    (r * phi.cos(), r * phi.sin())
}

/// Uniform direction inside the cone of half-angle acos(cos_theta_max)
/// around the y axis, density 1 / (2pi (1 - cos_theta_max)).
pub fn uniform_cone(s: Sample2D, cos_theta_max: f32) -> Vec3 {
    let y = 1.0 + s.x * (cos_theta_max - 1.0);
    let r = (1.0 - y * y).max(0.0).sqrt();
    let phi = TAU * s.y;
    let (sin_phi, cos_phi) = phi.sin_cos();
    Vec3::new(r * cos_phi, y, r * sin_phi)
}
