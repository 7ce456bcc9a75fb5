/// The default number of random-projection trees built per index. More trees
/// improve recall at the cost of build time, artifact size and query latency.
///
/// Reccomended range: 10-1000.
pub const DEFAULT_NUM_TREES: usize = 1000;

/// The default seed for index construction. Two builds with the same seed over
/// fingerprints ingested in the same order produce identical forests.
pub const DEFAULT_INDEX_SEED: u64 = 42;

/// The default number of nearest neighbours fetched for each query frame.
pub const DEFAULT_NEIGHBOURS_PER_FRAME: usize = 10;

/// The default number of ranked matches returned from a search.
pub const DEFAULT_TOPK: usize = 10;

/// Votes whose implied offset is further than this many seconds *before* the
/// start of the reference video are discarded.
///
/// Unit: Seconds
pub const DEFAULT_OFFSET_LENIENCY: f64 = 1.5;

/// Width of each bin of the per-candidate offset histogram.
///
/// Unit: Seconds
pub const DEFAULT_BIN_WIDTH: f64 = 1.0;

/// Interval at which the keyframe collaborator samples frames from a video.
///
/// Unit: Seconds
pub const DEFAULT_KEYFRAME_INTERVAL: f64 = 0.5;

// Index artifact header.
pub const INDEX_MAGIC: [u8; 4] = *b"VCFI";
pub const INDEX_FORMAT_VERSION: u32 = 2;

// Block mean hash
pub const BLOCK_MEAN_IMAGE_SIZE: u32 = 256;
pub const BLOCK_MEAN_BLOCK_SIZE: u32 = 16;

// Marr-Hildreth hash
pub const MARR_HILDRETH_IMAGE_SIZE: u32 = 512;
pub const MARR_HILDRETH_BLOCK_SIZE: u32 = 16;
pub const MARR_HILDRETH_ALPHA: f64 = 2.0;
pub const MARR_HILDRETH_SCALE: f64 = 1.0;

// Radial variance hash
pub const RADIAL_VARIANCE_SIGMA: f64 = 1.0;
pub const RADIAL_VARIANCE_NUM_ANGLES: usize = 180;
pub const RADIAL_VARIANCE_NUM_COEFFS: usize = 40;

// phash / dhash / whash
pub const BIT_HASH_SIZE: usize = 8;
pub const PHASH_IMAGE_SIZE: u32 = 32;
pub const WHASH_IMAGE_SIZE: u32 = 64;
