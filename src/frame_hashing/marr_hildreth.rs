use image::{imageops::FilterType, DynamicImage};
use ndarray::prelude::*;

use super::{packed_bytes, FrameHasher, HasherKind};
use crate::definitions::{
    MARR_HILDRETH_ALPHA, MARR_HILDRETH_BLOCK_SIZE, MARR_HILDRETH_IMAGE_SIZE, MARR_HILDRETH_SCALE,
};
use crate::utils::image_ops::filter_2d;

// Block sums are taken over a 31x31 grid of blocks. The hash is made of 3x3
// windows of blocks taken every 4 blocks, giving an 8x8 grid of windows.
const NUM_BLOCKS: usize = 31;
const WINDOW_STEP: usize = 4;
const WINDOWS_PER_SIDE: usize = (NUM_BLOCKS - 3) / WINDOW_STEP + 1;
pub(super) const HASH_BYTES: usize = WINDOWS_PER_SIDE * WINDOWS_PER_SIDE * 9 / 8;

/// A hash of the edge response of a frame under the Marr-Hildreth (Laplacian of
/// Gaussian) operator.
#[derive(Debug, Clone)]
pub struct MarrHildrethHasher {
    // row-major, kernel_side x kernel_side.
    kernel: Vec<f32>,
    kernel_side: u32,
}

impl Default for MarrHildrethHasher {
    fn default() -> Self {
        Self::new(MARR_HILDRETH_ALPHA, MARR_HILDRETH_SCALE)
    }
}

impl MarrHildrethHasher {
    pub fn new(alpha: f64, scale: f64) -> Self {
        let kernel = mh_kernel(alpha, scale);
        Self {
            kernel_side: kernel.nrows() as u32,
            kernel: kernel.iter().map(|k| *k as f32).collect(),
        }
    }
}

fn mh_kernel(alpha: f64, scale: f64) -> Array2<f64> {
    let sigma = (4.0 * alpha.powf(scale)) as usize;
    let size = 2 * sigma + 1;
    Array2::from_shape_fn((size, size), |(y, x)| {
        let xx = (x as f64 - sigma as f64) / scale;
        let yy = (y as f64 - sigma as f64) / scale;
        let pa = xx * xx + yy * yy;
        (2.0 - pa) * (-pa / 2.0).exp()
    })
}

impl FrameHasher for MarrHildrethHasher {
    fn kind(&self) -> HasherKind {
        HasherKind::MarrHildreth
    }

    fn hash_pixels(&self, frame: &DynamicImage) -> Vec<f32> {
        // 7x7 box blur.
        let blurred = imageproc::filter::box_filter(&frame.to_luma8(), 3, 3);
        let resized = image::imageops::resize(
            &blurred,
            MARR_HILDRETH_IMAGE_SIZE,
            MARR_HILDRETH_IMAGE_SIZE,
            FilterType::CatmullRom,
        );
        let equalized = imageproc::contrast::equalize_histogram(&resized);
        let response = filter_2d(&equalized, &self.kernel, self.kernel_side);

        let block = MARR_HILDRETH_BLOCK_SIZE as usize;
        let blocks = Array2::from_shape_fn((NUM_BLOCKS, NUM_BLOCKS), |(row, col)| {
            response
                .slice(s![row * block..(row + 1) * block, col * block..(col + 1) * block])
                .sum()
        });

        let mut bits = Vec::with_capacity(WINDOWS_PER_SIDE * WINDOWS_PER_SIDE * 9);
        for row in (0..=NUM_BLOCKS - 3).step_by(WINDOW_STEP) {
            for col in (0..=NUM_BLOCKS - 3).step_by(WINDOW_STEP) {
                let window = blocks.slice(s![row..row + 3, col..col + 3]);
                let avg = window.mean().unwrap_or_default();
                bits.extend(window.iter().map(|v| *v > avg));
            }
        }

        packed_bytes(bits)
    }
}

#[cfg(test)]
mod test {
    use image::{GrayImage, Luma};

    use super::*;

    #[test]
    fn test_hash_is_72_bytes() {
        assert_eq!(WINDOWS_PER_SIDE, 8);
        assert_eq!(HASH_BYTES, 72);
    }

    #[test]
    fn test_kernel_is_symmetric_with_positive_centre() {
        let k = mh_kernel(MARR_HILDRETH_ALPHA, MARR_HILDRETH_SCALE);
        let (rows, cols) = k.dim();
        assert_eq!((rows, cols), (17, 17));
        assert!(k[[8, 8]] > 0.0);
        assert_eq!(k[[0, 3]], k[[3, 0]]);
        assert_eq!(k[[2, 16]], k[[14, 0]]);

        let hasher = MarrHildrethHasher::default();
        assert_eq!(hasher.kernel_side, 17);
        assert_eq!(hasher.kernel[8 * 17 + 8], k[[8, 8]] as f32);
        assert_eq!(hasher.kernel[17 + 5], k[[1, 5]] as f32);
    }

    #[test]
    fn test_edges_set_bits() {
        // a bright square in the top left quarter of the frame.
        let img = GrayImage::from_fn(64, 64, |x, y| {
            Luma([if x < 32 && y < 32 { 220 } else { 30 }])
        });
        let hash = MarrHildrethHasher::default().hash_pixels(&DynamicImage::ImageLuma8(img));
        assert_eq!(hash.len(), HASH_BYTES);
        assert!(hash.iter().any(|b| *b != 0.0));
        assert!(hash.iter().all(|b| (0.0..=255.0).contains(b)));
    }
}
