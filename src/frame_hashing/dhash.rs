use image::{imageops::FilterType, DynamicImage};
use itertools::Itertools;

use super::{unpacked_bits, FrameHasher, HasherKind};
use crate::definitions::BIT_HASH_SIZE;
use crate::utils::image_ops::grey_resized;

/// A difference hash: each bit records whether a pixel of a 9x8 thumbnail is
/// brighter than its left neighbour.
#[derive(Debug, Clone, Copy, Default)]
pub struct DHasher;

impl FrameHasher for DHasher {
    fn kind(&self) -> HasherKind {
        HasherKind::DHash
    }

    fn hash_pixels(&self, frame: &DynamicImage) -> Vec<f32> {
        let size = BIT_HASH_SIZE as u32;
        let grey = grey_resized(frame, size + 1, size, FilterType::Lanczos3);

        let bits = grey
            .rows()
            .flat_map(|row| row.map(|p| p.0[0]).tuple_windows().map(|(l, r)| r > l))
            .collect::<Vec<_>>();

        unpacked_bits(bits)
    }
}

#[cfg(test)]
mod test {
    use image::{GrayImage, Luma};

    use super::*;

    #[test]
    fn test_left_to_right_gradient_sets_all_bits() {
        let img = GrayImage::from_fn(9, 8, |x, _y| Luma([(x * 20 + 10) as u8]));
        let hash = DHasher.hash_pixels(&DynamicImage::ImageLuma8(img));
        assert_eq!(hash, vec![1.0; 64]);
    }

    #[test]
    fn test_right_to_left_gradient_clears_all_bits() {
        let img = GrayImage::from_fn(9, 8, |x, _y| Luma([(200 - x * 20) as u8]));
        let hash = DHasher.hash_pixels(&DynamicImage::ImageLuma8(img));
        assert_eq!(hash, vec![0.0; 64]);
    }
}
