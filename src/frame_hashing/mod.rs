mod block_mean;
mod dhash;
mod marr_hildreth;
mod phash;
mod radial_variance;
mod whash;

use std::{fmt, str::FromStr, time::Instant};

use bitvec::prelude::*;
use image::DynamicImage;

pub use block_mean::{BlockMeanHasher, BlockMeanMode};
pub use dhash::DHasher;
pub use marr_hildreth::MarrHildrethHasher;
pub use phash::PHasher;
pub use radial_variance::RadialVarianceHasher;
pub use whash::WHasher;

use crate::{Error, FrameHash, VideoFingerprints, VideoHashResult};

/// One decoded frame of a video, with the time at which it was sampled.
#[derive(Clone, Debug)]
pub struct VideoKeyframe {
    pub frame: DynamicImage,
    /// Unit: Seconds
    pub timecode: f64,
}

impl VideoKeyframe {
    pub fn new(frame: DynamicImage, timecode: f64) -> Self {
        Self { frame, timecode }
    }
}

/// A transform from the pixels of one frame to a fingerprint vector of fixed length.
///
/// Implementors only need to supply [`FrameHasher::kind`] and [`FrameHasher::hash_pixels`].
/// The remaining methods validate input and apply the hasher to whole videos.
pub trait FrameHasher: Send + Sync {
    fn kind(&self) -> HasherKind;

    /// Compute the fingerprint of a non-empty frame. Must return exactly
    /// [`FrameHasher::dimensionality`] values.
    fn hash_pixels(&self, frame: &DynamicImage) -> Vec<f32>;

    fn name(&self) -> &'static str {
        self.kind().name()
    }

    fn dimensionality(&self) -> usize {
        self.kind().dimensionality()
    }

    /// Hash a single frame.
    ///
    /// # Errors
    /// Returns [`Error::Hashing`] if the frame has no pixels.
    fn process(&self, keyframe: &VideoKeyframe) -> VideoHashResult<FrameHash> {
        let (width, height) = (keyframe.frame.width(), keyframe.frame.height());
        if width == 0 || height == 0 {
            return Err(Error::Hashing(format!(
                "{}: frame at {}s is empty ({width}x{height})",
                self.name(),
                keyframe.timecode
            )));
        }

        if !keyframe.timecode.is_finite() || keyframe.timecode < 0.0 {
            return Err(Error::Hashing(format!(
                "{}: invalid timecode {}",
                self.name(),
                keyframe.timecode
            )));
        }

        let vec = self.hash_pixels(&keyframe.frame);
        debug_assert_eq!(vec.len(), self.dimensionality());

        Ok(FrameHash {
            vec,
            timecode: keyframe.timecode,
        })
    }

    /// Hash every frame of one video, in order. Stops at the first frame that cannot be
    /// hashed, so that no partial fingerprints are produced.
    fn process_frames(
        &self,
        frames: &[VideoKeyframe],
        video_id: &str,
    ) -> VideoHashResult<VideoFingerprints> {
        let start = Instant::now();
        let frames = frames
            .iter()
            .map(|f| self.process(f))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(VideoFingerprints::new(video_id, frames).with_elapsed(start.elapsed()))
    }
}

/// The available hashing algorithms. Used to select a hasher by name (e.g from configuration)
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum HasherKind {
    /// Block mean hash over 16x16 non-overlapping blocks
    BlockMean0,
    /// Block mean hash over 16x16 blocks overlapping by half a block
    BlockMean1,
    /// Edge response of the Marr-Hildreth operator
    MarrHildreth,
    /// Variance of pixels along radial projections
    RadialVariance,
    /// DCT based perceptual hash
    PHash,
    /// Haar wavelet hash
    WHash,
    /// Difference (gradient) hash
    DHash,
}

impl HasherKind {
    pub const ALL: [Self; 7] = [
        Self::MarrHildreth,
        Self::BlockMean0,
        Self::BlockMean1,
        Self::RadialVariance,
        Self::PHash,
        Self::WHash,
        Self::DHash,
    ];

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::BlockMean0 => "BlockMean0",
            Self::BlockMean1 => "BlockMean1",
            Self::MarrHildreth => "Marr-Hildreth",
            Self::RadialVariance => "RadialVariance",
            Self::PHash => "phash",
            Self::WHash => "whash",
            Self::DHash => "dhash",
        }
    }

    /// The length of every vector produced by this kind of hasher.
    #[must_use]
    pub const fn dimensionality(self) -> usize {
        match self {
            Self::BlockMean0 => BlockMeanMode::NonOverlapping.hash_bytes(),
            Self::BlockMean1 => BlockMeanMode::Overlapping.hash_bytes(),
            Self::MarrHildreth => marr_hildreth::HASH_BYTES,
            Self::RadialVariance => crate::definitions::RADIAL_VARIANCE_NUM_COEFFS,
            Self::PHash | Self::WHash | Self::DHash => {
                crate::definitions::BIT_HASH_SIZE * crate::definitions::BIT_HASH_SIZE
            }
        }
    }

    /// Construct the hasher.
    #[must_use]
    pub fn build(self) -> Box<dyn FrameHasher> {
        match self {
            Self::BlockMean0 => Box::new(BlockMeanHasher::new(BlockMeanMode::NonOverlapping)),
            Self::BlockMean1 => Box::new(BlockMeanHasher::new(BlockMeanMode::Overlapping)),
            Self::MarrHildreth => Box::new(MarrHildrethHasher::default()),
            Self::RadialVariance => Box::new(RadialVarianceHasher::default()),
            Self::PHash => Box::new(PHasher),
            Self::WHash => Box::new(WHasher),
            Self::DHash => Box::new(DHasher),
        }
    }
}

impl fmt::Display for HasherKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for HasherKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| Error::UnknownHasher(s.to_string()))
    }
}

// Pack bits LSB-first into bytes, and widen each byte into a vector component.
fn packed_bytes(bits: impl IntoIterator<Item = bool>) -> Vec<f32> {
    let bitvec = bits.into_iter().collect::<BitVec<u8, Lsb0>>();
    bitvec.into_vec().into_iter().map(f32::from).collect()
}

// One vector component per bit.
fn unpacked_bits(bits: impl IntoIterator<Item = bool>) -> Vec<f32> {
    bits.into_iter().map(|b| if b { 1.0 } else { 0.0 }).collect()
}
