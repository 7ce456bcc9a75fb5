use image::{imageops::FilterType, DynamicImage};

use super::{packed_bytes, FrameHasher, HasherKind};
use crate::definitions::{BLOCK_MEAN_BLOCK_SIZE, BLOCK_MEAN_IMAGE_SIZE};
use crate::utils::image_ops::{grey_resized, median};

/// How the blocks of the block mean hash are laid out.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum BlockMeanMode {
    /// Blocks tile the image without overlapping (16x16 blocks, 256 bits)
    NonOverlapping,
    /// Blocks step by half a block, so each overlaps its neighbours (31x31 blocks, 961 bits)
    Overlapping,
}

impl BlockMeanMode {
    const fn step(self) -> u32 {
        match self {
            Self::NonOverlapping => BLOCK_MEAN_BLOCK_SIZE,
            Self::Overlapping => BLOCK_MEAN_BLOCK_SIZE / 2,
        }
    }

    const fn blocks_per_side(self) -> u32 {
        (BLOCK_MEAN_IMAGE_SIZE - BLOCK_MEAN_BLOCK_SIZE) / self.step() + 1
    }

    pub(super) const fn hash_bytes(self) -> usize {
        let bits = (self.blocks_per_side() * self.blocks_per_side()) as usize;
        bits.div_ceil(8)
    }
}

/// Each bit records whether the mean luminance of a block is at or above the
/// median of all block means. Bits are packed into bytes, one byte per vector component.
#[derive(Debug, Clone, Copy)]
pub struct BlockMeanHasher {
    mode: BlockMeanMode,
}

impl BlockMeanHasher {
    pub fn new(mode: BlockMeanMode) -> Self {
        Self { mode }
    }
}

impl FrameHasher for BlockMeanHasher {
    fn kind(&self) -> HasherKind {
        match self.mode {
            BlockMeanMode::NonOverlapping => HasherKind::BlockMean0,
            BlockMeanMode::Overlapping => HasherKind::BlockMean1,
        }
    }

    fn hash_pixels(&self, frame: &DynamicImage) -> Vec<f32> {
        let grey = grey_resized(
            frame,
            BLOCK_MEAN_IMAGE_SIZE,
            BLOCK_MEAN_IMAGE_SIZE,
            FilterType::Triangle,
        );

        let step = self.mode.step();
        let per_side = self.mode.blocks_per_side();
        let block_area = f64::from(BLOCK_MEAN_BLOCK_SIZE * BLOCK_MEAN_BLOCK_SIZE);

        let mut means = Vec::with_capacity((per_side * per_side) as usize);
        for block_row in 0..per_side {
            for block_col in 0..per_side {
                let (x0, y0) = (block_col * step, block_row * step);
                let mut sum = 0u32;
                for y in y0..y0 + BLOCK_MEAN_BLOCK_SIZE {
                    for x in x0..x0 + BLOCK_MEAN_BLOCK_SIZE {
                        sum += u32::from(grey.get_pixel(x, y).0[0]);
                    }
                }
                means.push(f64::from(sum) / block_area);
            }
        }

        let median = median(&means);
        packed_bytes(means.iter().map(|m| *m >= median))
    }
}
