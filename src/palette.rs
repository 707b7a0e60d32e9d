//! Dominant-color extraction for the palette web service.
//!
//! Unrelated to the sorting pipeline; shares no state with it. Colors are
//! clustered with a small k-means over RGB pixels and returned as
//! `#rrggbb` hex strings.

use anyhow::{anyhow, Result};
use rand::seq::SliceRandom;
use rand::Rng;

/// Number of colors in every palette.
pub const PALETTE_SIZE: usize = 5;

const KMEANS_ITERATIONS: usize = 10;

/// An RGB color.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

/// Optional crop rectangle applied before extraction.
#[derive(Clone, Copy, Debug)]
pub struct CropRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl CropRect {
    /// Parse the `x,y,width,height` form used by the upload endpoint.
    pub fn parse(value: &str) -> Result<Self> {
        let parts: Vec<&str> = value.split(',').map(|p| p.trim()).collect();
        if parts.len() != 4 {
            return Err(anyhow!("crop must be x,y,width,height"));
        }
        let mut nums = [0u32; 4];
        for (slot, part) in nums.iter_mut().zip(&parts) {
            *slot = part
                .parse()
                .map_err(|_| anyhow!("crop coordinate {:?} is not an integer", part))?;
        }
        Ok(Self {
            x: nums[0],
            y: nums[1],
            width: nums[2],
            height: nums[3],
        })
    }
}

/// Generate a random palette.
pub fn random_palette() -> Vec<Rgb> {
    let mut rng = rand::thread_rng();
    (0..PALETTE_SIZE)
        .map(|_| Rgb {
            r: rng.gen(),
            g: rng.gen(),
            b: rng.gen(),
        })
        .collect()
}

/// Extract the dominant colors of an image, optionally cropped first.
pub fn extract_colors(image: &image::RgbImage, crop: Option<CropRect>) -> Result<Vec<Rgb>> {
    let view = match crop {
        Some(rect) => {
            if rect.width == 0 || rect.height == 0 {
                return Err(anyhow!("crop rectangle is empty"));
            }
            // Checked arithmetic: the rectangle comes straight from the
            // request query string and x + width can overflow u32.
            let x_end = rect.x.checked_add(rect.width);
            let y_end = rect.y.checked_add(rect.height);
            let in_bounds = matches!(
                (x_end, y_end),
                (Some(x), Some(y)) if x <= image.width() && y <= image.height()
            );
            if !in_bounds {
                return Err(anyhow!(
                    "crop {}x{}+{}+{} exceeds image bounds {}x{}",
                    rect.width,
                    rect.height,
                    rect.x,
                    rect.y,
                    image.width(),
                    image.height()
                ));
            }
            image::imageops::crop_imm(image, rect.x, rect.y, rect.width, rect.height).to_image()
        }
        None => image.clone(),
    };

    let pixels: Vec<[f32; 3]> = view
        .pixels()
        .map(|p| [p.0[0] as f32, p.0[1] as f32, p.0[2] as f32])
        .collect();
    if pixels.is_empty() {
        return Err(anyhow!("image has no pixels"));
    }

    Ok(kmeans(&pixels, PALETTE_SIZE))
}

/// Plain Lloyd's algorithm with random initialization.
fn kmeans(pixels: &[[f32; 3]], k: usize) -> Vec<Rgb> {
    let mut rng = rand::thread_rng();
    let mut centers: Vec<[f32; 3]> = pixels
        .choose_multiple(&mut rng, k.min(pixels.len()))
        .copied()
        .collect();
    // Fewer distinct pixels than clusters: pad with repeats.
    while centers.len() < k {
        centers.push(pixels[rng.gen_range(0..pixels.len())]);
    }

    let mut assignments = vec![0usize; pixels.len()];
    for _ in 0..KMEANS_ITERATIONS {
        for (pixel, slot) in pixels.iter().zip(assignments.iter_mut()) {
            *slot = nearest_center(pixel, &centers);
        }

        let mut sums = vec![[0.0f64; 3]; k];
        let mut counts = vec![0usize; k];
        for (pixel, &cluster) in pixels.iter().zip(&assignments) {
            for c in 0..3 {
                sums[cluster][c] += pixel[c] as f64;
            }
            counts[cluster] += 1;
        }
        for (center, (sum, count)) in centers.iter_mut().zip(sums.iter().zip(&counts)) {
            if *count > 0 {
                for c in 0..3 {
                    center[c] = (sum[c] / *count as f64) as f32;
                }
            }
        }
    }

    centers
        .into_iter()
        .map(|center| Rgb {
            r: center[0].round().clamp(0.0, 255.0) as u8,
            g: center[1].round().clamp(0.0, 255.0) as u8,
            b: center[2].round().clamp(0.0, 255.0) as u8,
        })
        .collect()
}

fn nearest_center(pixel: &[f32; 3], centers: &[[f32; 3]]) -> usize {
    let mut best = 0usize;
    let mut best_dist = f32::INFINITY;
    for (i, center) in centers.iter().enumerate() {
        let dist = (0..3)
            .map(|c| (pixel[c] - center[c]) * (pixel[c] - center[c]))
            .sum::<f32>();
        if dist < best_dist {
            best_dist = dist;
            best = i;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_image_yields_its_color() -> Result<()> {
        let image = image::RgbImage::from_pixel(16, 16, image::Rgb([200, 40, 10]));
        let palette = extract_colors(&image, None)?;
        assert_eq!(palette.len(), PALETTE_SIZE);
        for color in palette {
            assert_eq!(color, Rgb { r: 200, g: 40, b: 10 });
        }
        Ok(())
    }

    #[test]
    fn crop_restricts_extraction_region() -> Result<()> {
        // Left half red, right half blue; crop the right half.
        let mut image = image::RgbImage::from_pixel(16, 8, image::Rgb([255, 0, 0]));
        for y in 0..8 {
            for x in 8..16 {
                image.put_pixel(x, y, image::Rgb([0, 0, 255]));
            }
        }
        let crop = CropRect {
            x: 8,
            y: 0,
            width: 8,
            height: 8,
        };
        let palette = extract_colors(&image, Some(crop))?;
        for color in palette {
            assert_eq!(color, Rgb { r: 0, g: 0, b: 255 });
        }
        Ok(())
    }

    #[test]
    fn out_of_bounds_crop_is_rejected() {
        let image = image::RgbImage::from_pixel(4, 4, image::Rgb([0, 0, 0]));
        let crop = CropRect {
            x: 2,
            y: 2,
            width: 4,
            height: 4,
        };
        assert!(extract_colors(&image, Some(crop)).is_err());
    }

    #[test]
    fn overflowing_crop_coordinates_are_rejected() {
        // x + width wraps past u32::MAX; must fail cleanly, not wrap.
        let image = image::RgbImage::from_pixel(4, 4, image::Rgb([0, 0, 0]));
        let crop = CropRect {
            x: u32::MAX,
            y: 0,
            width: 2,
            height: 2,
        };
        assert!(extract_colors(&image, Some(crop)).is_err());

        let crop = CropRect {
            x: 0,
            y: u32::MAX,
            width: 2,
            height: 2,
        };
        assert!(extract_colors(&image, Some(crop)).is_err());
    }

    #[test]
    fn crop_parse_accepts_four_integers() {
        let rect = CropRect::parse("1, 2, 30, 40").unwrap();
        assert_eq!(rect.x, 1);
        assert_eq!(rect.height, 40);
        assert!(CropRect::parse("1,2,3").is_err());
        assert!(CropRect::parse("a,b,c,d").is_err());
    }

    #[test]
    fn random_palette_is_well_formed() {
        let palette = random_palette();
        assert_eq!(palette.len(), PALETTE_SIZE);
        for color in palette {
            let hex = color.to_hex();
            assert_eq!(hex.len(), 7);
            assert!(hex.starts_with('#'));
        }
    }
}
