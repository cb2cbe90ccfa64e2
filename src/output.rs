use std::error::Error;
use std::path::Path;

use exr::prelude::{read_first_rgba_layer_from_file, write_rgb_file};

use crate::color::RGBColor;
use crate::film::{FrameMetadata, Vec2D};

/// Write the frame as a 32-bit float RGB OpenEXR.
pub fn write_exr<P: AsRef<Path>>(path: P, image: &Vec2D<RGBColor>) -> Result<(), Box<dyn Error>> {
    write_rgb_file(path, image.width, image.height, |x, y| {
        let pixel = image.at(x, y);
        (pixel.r, pixel.g, pixel.b)
    })?;
    Ok(())
}

/// Read an RGB OpenEXR written by `write_exr` (alpha, if present, is
/// dropped).
pub fn read_exr<P: AsRef<Path>>(path: P) -> Result<Vec2D<RGBColor>, Box<dyn Error>> {
    let image = read_first_rgba_layer_from_file(
        path,
        |resolution, _| Vec2D::new(resolution.width(), resolution.height(), RGBColor::ZERO),
        |image: &mut Vec2D<RGBColor>, position, (r, g, b, _a): (f32, f32, f32, f32)| {
            image.write_at(position.x(), position.y(), RGBColor::new(r, g, b));
        },
    )?;
    Ok(image.layer_data.channel_data.pixels)
}

/// Publish the frame metadata as a TOML sidecar next to the image.
pub fn write_metadata<P: AsRef<Path>>(
    image_path: P,
    metadata: &FrameMetadata,
) -> Result<(), Box<dyn Error>> {
    let path = image_path.as_ref().with_extension("toml");
    let text = toml::to_string_pretty(metadata)?;
    std::fs::write(path, text)?;
    Ok(())
}

/// Per-channel average of an image.
pub fn channel_average(image: &Vec2D<RGBColor>) -> [f64; 3] {
    let mut sum = [0.0f64; 3];
    for pixel in &image.buffer {
        sum[0] += pixel.r as f64;
        sum[1] += pixel.g as f64;
        sum[2] += pixel.b as f64;
    }
    let n = image.buffer.len().max(1) as f64;
    [sum[0] / n, sum[1] / n, sum[2] / n]
}

/// Root-mean-square error between two images of equal resolution.
pub fn rms_error(a: &Vec2D<RGBColor>, b: &Vec2D<RGBColor>) -> Result<f64, Box<dyn Error>> {
    if a.width != b.width || a.height != b.height {
        return Err(format!(
            "resolution mismatch: {}x{} vs {}x{}",
            a.width, a.height, b.width, b.height
        )
        .into());
    }
    let mut sum = 0.0f64;
    for (pa, pb) in a.buffer.iter().zip(b.buffer.iter()) {
        let d = *pa - *pb;
        sum += (d.r as f64).powi(2) + (d.g as f64).powi(2) + (d.b as f64).powi(2);
    }
    Ok((sum / (3.0 * a.buffer.len() as f64)).sqrt())
}
