#![allow(clippy::len_without_is_empty)]

//! # Overview
//! vid_copy_finder_lib finds the reference videos that a query clip was copied from, even when
//! the clip has been trimmed out of the middle of a longer video, and estimates where in the
//! reference the clip starts.
//!
//! # How it works
//! * Sampled frames of every video are turned into fixed-length fingerprint vectors by one of
//!   several perceptual hashers (see [`HasherKind`]).
//! * The fingerprints of the reference corpus are stored in a [`VectorIndex`], a forest of random
//!   projection trees answering approximate nearest neighbour queries.
//! * Each frame of a query is looked up in the index. Every neighbour found is a vote that the
//!   query is aligned with the neighbour's video at some time offset. A [`TemporalSearch`]
//!   histograms those votes per video and ranks the videos by the weight of their best offset.
//!
//! # High Level API
//! ```rust
//! use vid_copy_finder_lib::{
//!     FingerprintStore, FrameHash, IndexCfg, SearchCfg, TemporalSearch, VectorIndex,
//!     VideoFingerprints,
//! };
//!
//! // One reference video whose frames have 2-dimensional fingerprints, sampled each second.
//! let frames = (0..10)
//!     .map(|i| FrameHash { vec: vec![i as f32, 0.0], timecode: i as f64 })
//!     .collect();
//! let store: FingerprintStore = [VideoFingerprints::new("reference.mp4", frames)]
//!     .into_iter()
//!     .collect();
//!
//! // The corpus is tiny, so let every query consider every fingerprint.
//! let cfg = IndexCfg { num_trees: 10, search_k: Some(100), ..IndexCfg::default() };
//! let index = VectorIndex::build(&store, 2, cfg).unwrap();
//!
//! // A clip of frames 4..7 of the reference, starting at 0s.
//! let query = (4..7)
//!     .map(|i| FrameHash { vec: vec![i as f32, 0.0], timecode: (i - 4) as f64 })
//!     .collect::<Vec<_>>();
//!
//! let cfg = SearchCfg { neighbours_per_frame: 1, ..SearchCfg::default() };
//! let search = TemporalSearch::new(&index, cfg).unwrap();
//! let matches = search.search(&query, 10).unwrap();
//! assert_eq!(matches[0].video_id, "reference.mp4");
//! assert_eq!(matches[0].offset, 4.0);
//! ```
//!
//! # Persistence
//! Fingerprints are saved per video as JSON ([`VideoFingerprints::save`]) and read back a
//! directory at a time ([`FingerprintStore::load_dir`]). An index is saved to a single file
//! holding the trees, the vectors and the table mapping each vector back to its video and
//! timecode ([`VectorIndex::save`]).
//!
//! # Limitations
//! Decoding video is not part of this library. Callers supply decoded frames
//! ([`VideoKeyframe`]) sampled at their chosen interval (usually every half second).
//!
//! The index is built once and is immutable. Adding reference videos means building a new index.

mod definitions;
mod errors;
mod fingerprint_store;
mod frame_hashing;
mod index_set;
mod temporal_search;
mod utils;
mod vector_index;

pub use definitions::{
    DEFAULT_BIN_WIDTH, DEFAULT_INDEX_SEED, DEFAULT_KEYFRAME_INTERVAL,
    DEFAULT_NEIGHBOURS_PER_FRAME, DEFAULT_NUM_TREES, DEFAULT_OFFSET_LENIENCY, DEFAULT_TOPK,
};
pub use errors::Error;
pub use fingerprint_store::{
    fingerprint_path, FingerprintRecord, FingerprintStore, FrameHash, VideoFingerprints,
};
pub use frame_hashing::{
    BlockMeanHasher, BlockMeanMode, DHasher, FrameHasher, HasherKind, MarrHildrethHasher,
    PHasher, RadialVarianceHasher, VideoKeyframe, WHasher,
};
pub use index_set::IndexSet;
pub use temporal_search::{
    estimate_offset, vote_weight, MatchResult, OffsetEstimate, SearchCfg, TemporalSearch, Vote,
    VoteAccumulator,
};
pub use vector_index::{IndexBuilder, IndexCfg, Neighbour, VectorIndex};

pub type VideoHashResult<T> = Result<T, crate::Error>;
