use image::{imageops::FilterType, DynamicImage};
use ndarray::prelude::*;

use super::{unpacked_bits, FrameHasher, HasherKind};
use crate::definitions::{BIT_HASH_SIZE, WHASH_IMAGE_SIZE};
use crate::utils::image_ops::{grey_resized, median, to_matrix};

/// A Haar wavelet hash. The coarsest approximation of the frame is removed, and the
/// remaining low frequency approximation at 8x8 is compared against its median.
#[derive(Debug, Clone, Copy, Default)]
pub struct WHasher;

/// One level of the orthonormal 2D Haar transform, keeping only the approximation band.
fn haar_ll(m: &Array2<f64>) -> Array2<f64> {
    let (rows, cols) = m.dim();
    Array2::from_shape_fn((rows / 2, cols / 2), |(r, c)| {
        let (y, x) = (r * 2, c * 2);
        (m[[y, x]] + m[[y, x + 1]] + m[[y + 1, x]] + m[[y + 1, x + 1]]) / 2.0
    })
}

impl FrameHasher for WHasher {
    fn kind(&self) -> HasherKind {
        HasherKind::WHash
    }

    fn hash_pixels(&self, frame: &DynamicImage) -> Vec<f32> {
        let grey = grey_resized(frame, WHASH_IMAGE_SIZE, WHASH_IMAGE_SIZE, FilterType::Lanczos3);
        let mut pixels = to_matrix(&grey) / 255.0;

        // Zeroing the single coefficient left by a full decomposition and reconstructing
        // is the same as removing the mean.
        let mean = pixels.mean().unwrap_or_default();
        pixels -= mean;

        let levels = (WHASH_IMAGE_SIZE as usize / BIT_HASH_SIZE).trailing_zeros();
        let low = (0..levels).fold(pixels, |acc, _| haar_ll(&acc));
        debug_assert_eq!(low.dim(), (BIT_HASH_SIZE, BIT_HASH_SIZE));

        let values = low.iter().copied().collect::<Vec<_>>();
        let med = median(&values);
        unpacked_bits(values.iter().map(|v| *v > med))
    }
}

#[cfg(test)]
mod test {
    use image::{GrayImage, Luma};

    use super::*;

    #[test]
    fn test_haar_ll_of_flat_block() {
        let m = Array2::from_elem((4, 4), 1.0);
        let ll = haar_ll(&m);
        assert_eq!(ll, Array2::from_elem((2, 2), 2.0));
    }

    #[test]
    fn test_bright_bottom_half() {
        let img = GrayImage::from_fn(64, 64, |_x, y| Luma([if y >= 32 { 230 } else { 10 }]));
        let hash = WHasher.hash_pixels(&DynamicImage::ImageLuma8(img));

        let (top, bottom) = hash.split_at(32);
        assert!(top.iter().all(|b| *b == 0.0));
        assert!(bottom.iter().all(|b| *b == 1.0));
    }
}
