use image::{imageops::FilterType, DynamicImage};

use super::{unpacked_bits, FrameHasher, HasherKind};
use crate::definitions::{BIT_HASH_SIZE, PHASH_IMAGE_SIZE};
use crate::utils::{dct_ops::dct_2d, image_ops::grey_resized, image_ops::median};

/// The classic DCT perceptual hash: the lowest 8x8 frequencies of a 32x32 greyscale
/// thumbnail, each compared against their median.
#[derive(Debug, Clone, Copy, Default)]
pub struct PHasher;

impl FrameHasher for PHasher {
    fn kind(&self) -> HasherKind {
        HasherKind::PHash
    }

    fn hash_pixels(&self, frame: &DynamicImage) -> Vec<f32> {
        let grey = grey_resized(frame, PHASH_IMAGE_SIZE, PHASH_IMAGE_SIZE, FilterType::Lanczos3);

        let dimension = PHASH_IMAGE_SIZE as usize;
        let mut raw = grey.pixels().map(|p| f64::from(p.0[0])).collect::<Vec<_>>();
        dct_2d(&mut raw, dimension);

        let low_freqs = raw
            .chunks_exact(dimension)
            .take(BIT_HASH_SIZE)
            .flat_map(|row| &row[..BIT_HASH_SIZE])
            .copied()
            .collect::<Vec<_>>();

        let med = median(&low_freqs);
        unpacked_bits(low_freqs.iter().map(|v| *v > med))
    }
}
