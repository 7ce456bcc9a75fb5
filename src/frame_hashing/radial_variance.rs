use std::f64::consts::PI;

use image::DynamicImage;
use ndarray::prelude::*;

use super::{FrameHasher, HasherKind};
use crate::definitions::{
    RADIAL_VARIANCE_NUM_ANGLES, RADIAL_VARIANCE_NUM_COEFFS, RADIAL_VARIANCE_SIGMA,
};
use crate::utils::{dct_ops::dct_1d, image_ops::gaussian_blur};

/// A hash built from the variance of pixel values along lines through the centre
/// of the frame (a radon-style projection). The low frequency DCT coefficients of the
/// per-angle variances are scaled into 0..=255.
#[derive(Debug, Clone, Copy)]
pub struct RadialVarianceHasher {
    sigma: f64,
    num_angles: usize,
}

impl Default for RadialVarianceHasher {
    fn default() -> Self {
        Self {
            sigma: RADIAL_VARIANCE_SIGMA,
            num_angles: RADIAL_VARIANCE_NUM_ANGLES,
        }
    }
}

impl RadialVarianceHasher {
    fn radial_variances(&self, m: &Array2<f64>) -> Vec<f64> {
        let (rows, cols) = m.dim();
        let (cy, cx) = (rows as f64 / 2.0, cols as f64 / 2.0);
        let radius = rows.max(cols) as isize / 2;

        (0..self.num_angles)
            .map(|k| {
                let theta = k as f64 * PI / self.num_angles as f64;
                let (sin, cos) = theta.sin_cos();

                let (mut n, mut sum, mut sum_sq) = (0usize, 0f64, 0f64);
                for t in -radius..=radius {
                    let x = (cx + t as f64 * cos).floor();
                    let y = (cy + t as f64 * sin).floor();
                    if x < 0.0 || y < 0.0 || x >= cols as f64 || y >= rows as f64 {
                        continue;
                    }
                    let v = m[[y as usize, x as usize]];
                    n += 1;
                    sum += v;
                    sum_sq += v * v;
                }

                if n == 0 {
                    0.0
                } else {
                    let n = n as f64;
                    sum_sq / n - (sum / n) * (sum / n)
                }
            })
            .collect()
    }
}

impl FrameHasher for RadialVarianceHasher {
    fn kind(&self) -> HasherKind {
        HasherKind::RadialVariance
    }

    fn hash_pixels(&self, frame: &DynamicImage) -> Vec<f32> {
        let blurred = gaussian_blur(&frame.to_luma8(), self.sigma as f32);
        let mut features = self.radial_variances(&blurred);

        // standardize the features so the hash is insensitive to contrast.
        let n = features.len() as f64;
        let mean = features.iter().sum::<f64>() / n;
        let std_dev = (features.iter().map(|f| (f - mean) * (f - mean)).sum::<f64>() / n).sqrt();
        for f in &mut features {
            *f = if std_dev > 1e-9 { (*f - mean) / std_dev } else { 0.0 };
        }

        dct_1d(&mut features);
        let coeffs = &features[..RADIAL_VARIANCE_NUM_COEFFS];

        let (min, max) = coeffs
            .iter()
            .fold((f64::MAX, f64::MIN), |(min, max), c| (min.min(*c), max.max(*c)));
        let range = max - min;

        coeffs
            .iter()
            .map(|c| {
                if range > 1e-9 {
                    ((c - min) * 255.0 / range).round().clamp(0.0, 255.0) as f32
                } else {
                    0.0
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod test {
    use image::{GrayImage, Luma};

    use super::*;

    #[test]
    fn test_flat_frame_hashes_to_zeros() {
        let img = DynamicImage::ImageLuma8(GrayImage::from_pixel(20, 10, Luma([90])));
        let hash = RadialVarianceHasher::default().hash_pixels(&img);
        assert_eq!(hash, vec![0.0; RADIAL_VARIANCE_NUM_COEFFS]);
    }

    #[test]
    fn test_components_are_bytes() {
        let img = GrayImage::from_fn(48, 48, |x, y| Luma([((x * 7 + y * 3) % 256) as u8]));
        let hash = RadialVarianceHasher::default().hash_pixels(&DynamicImage::ImageLuma8(img));
        assert_eq!(hash.len(), RADIAL_VARIANCE_NUM_COEFFS);
        assert!(hash.iter().all(|v| (0.0..=255.0).contains(v)));
        assert!(hash.contains(&255.0));
    }
}
