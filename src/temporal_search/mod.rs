//! Temporal alignment search: finds the reference videos a query clip was copied from,
//! and where in each reference the clip starts.
//!
//! Each query frame is looked up in a [`VectorIndex`]. Every neighbour returned is a vote
//! that the query is aligned with the neighbour's video at an offset of
//! `neighbour.timecode - query.timecode`. A true copy produces many votes at (roughly)
//! the same offset, while chance matches are scattered. The votes for each candidate
//! video are histogrammed, and the heaviest bin gives the estimated offset and the
//! confidence of the match.

mod histogram;
mod votes;

use std::time::Instant;

use log::{debug, trace};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

pub use histogram::{estimate_offset, OffsetEstimate};
pub use votes::{vote_weight, Vote, VoteAccumulator};

use crate::{
    definitions::{
        DEFAULT_BIN_WIDTH, DEFAULT_NEIGHBOURS_PER_FRAME, DEFAULT_OFFSET_LENIENCY, DEFAULT_TOPK,
    },
    vector_index::VectorIndex,
    Error, FrameHash, VideoHashResult,
};

/// Options for a temporal alignment search.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchCfg {
    /// Nearest neighbours fetched for each query frame.
    ///
    /// Reccomended range: 5-50.
    pub neighbours_per_frame: usize,

    /// Number of ranked matches to return.
    pub topk: usize,

    /// Votes implying that the query starts more than this long before the reference
    /// video are discarded.
    ///
    /// Unit: Seconds
    pub offset_leniency: f64,

    /// Width of the bins of the offset histogram.
    ///
    /// Unit: Seconds
    /// Reccomended range: 0.5-5.0.
    pub bin_width: f64,
}

impl Default for SearchCfg {
    fn default() -> Self {
        Self {
            neighbours_per_frame: DEFAULT_NEIGHBOURS_PER_FRAME,
            topk: DEFAULT_TOPK,
            offset_leniency: DEFAULT_OFFSET_LENIENCY,
            bin_width: DEFAULT_BIN_WIDTH,
        }
    }
}

impl SearchCfg {
    fn validate(&self) -> VideoHashResult<()> {
        if !(self.bin_width.is_finite() && self.bin_width > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "histogram bin width must be positive, got {}",
                self.bin_width
            )));
        }
        if !(self.offset_leniency.is_finite() && self.offset_leniency >= 0.0) {
            return Err(Error::InvalidConfig(format!(
                "offset leniency must be non-negative, got {}",
                self.offset_leniency
            )));
        }
        Ok(())
    }
}

/// One reference video that the query appears to have been copied from.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct MatchResult {
    #[serde(rename = "filename")]
    pub video_id: String,

    /// Where the query starts within the reference video, to within one histogram bin.
    ///
    /// Unit: Seconds
    #[serde(rename = "timestamp_delta")]
    pub offset: f64,

    /// Total vote weight supporting the offset. Higher is more confident.
    pub weight: f64,
}

/// Searches one index for the videos a query was copied from.
#[derive(Debug, Clone, Copy)]
pub struct TemporalSearch<'a> {
    index: &'a VectorIndex,
    cfg: SearchCfg,
}

impl<'a> TemporalSearch<'a> {
    pub fn new(index: &'a VectorIndex, cfg: SearchCfg) -> VideoHashResult<Self> {
        cfg.validate()?;
        Ok(Self { index, cfg })
    }

    pub fn cfg(&self) -> &SearchCfg {
        &self.cfg
    }

    /// Rank the reference videos matching the query frames, best first. At most `topk`
    /// results are returned, and only videos with at least one vote appear.
    ///
    /// # Errors
    /// Returns [`Error::DimensionMismatch`] if a query vector does not match the index.
    pub fn search(&self, frames: &[FrameHash], topk: usize) -> VideoHashResult<Vec<MatchResult>> {
        self.search_until(frames, topk, None)
    }

    /// As [`TemporalSearch::search`], but once `deadline` has passed no further query frames
    /// are looked up. The votes gathered so far are still ranked.
    pub fn search_until(
        &self,
        frames: &[FrameHash],
        topk: usize,
        deadline: Option<Instant>,
    ) -> VideoHashResult<Vec<MatchResult>> {
        let accumulator = self.collect_votes(frames, deadline)?;

        debug!(
            target: "temporal_search",
            "{} of {} query frames gave {} votes for {} candidate videos",
            accumulator.queried_frames(),
            frames.len(),
            accumulator.num_votes(),
            accumulator.num_candidates()
        );

        Ok(self.rank(accumulator, topk))
    }

    /// Look up every query frame and gather the surviving votes.
    pub fn collect_votes(
        &self,
        frames: &[FrameHash],
        deadline: Option<Instant>,
    ) -> VideoHashResult<VoteAccumulator> {
        frames
            .par_iter()
            .try_fold(VoteAccumulator::new, |mut acc, frame| -> VideoHashResult<_> {
                if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                    return Ok(acc);
                }

                let neighbours = self
                    .index
                    .query(&frame.vec, self.cfg.neighbours_per_frame)?;
                acc.count_frame();

                for neighbour in &neighbours {
                    let vote = Vote::new(frame.timecode, neighbour);
                    if vote.offset >= -self.cfg.offset_leniency {
                        acc.add(neighbour.video, vote);
                    }
                }
                Ok(acc)
            })
            .try_reduce(VoteAccumulator::new, |a, b| Ok(a.merge(b)))
    }

    /// Turn the votes into one result per candidate, heaviest first. Equally weighted
    /// candidates keep the order of the reference corpus.
    pub fn rank(&self, accumulator: VoteAccumulator, topk: usize) -> Vec<MatchResult> {
        let mut results = accumulator
            .into_candidates()
            .filter_map(|(video, mut votes)| {
                let estimate = estimate_offset(&mut votes, self.cfg.bin_width)?;
                let video_id = self.index.video_id(video)?;

                trace!(
                    target: "temporal_search",
                    "{video_id}: {} votes, offset {:.2}s, weight {:.4}",
                    votes.len(),
                    estimate.offset,
                    estimate.weight
                );

                Some(MatchResult {
                    video_id: video_id.to_string(),
                    offset: estimate.offset,
                    weight: estimate.weight,
                })
            })
            .collect::<Vec<_>>();

        results.sort_by(|a, b| b.weight.total_cmp(&a.weight));
        results.truncate(topk);
        results
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{FingerprintStore, IndexCfg, VideoFingerprints};

    // Two videos with 1-d fingerprints, one frame per second. Every fingerprint is distinct,
    // so a query frame's nearest neighbour is always the frame it was copied from.
    fn two_video_index() -> VectorIndex {
        let video = |id: &str, base: f32| {
            let frames = (0..10)
                .map(|i| FrameHash {
                    vec: vec![base + i as f32 * 10.0],
                    timecode: f64::from(i),
                })
                .collect();
            VideoFingerprints::new(id, frames)
        };
        let store = [video("a", 0.0), video("b", 1000.0)]
            .into_iter()
            .collect::<FingerprintStore>();

        // the corpus is tiny, so every query can afford to see every item.
        let cfg = IndexCfg {
            num_trees: 4,
            threads: 1,
            search_k: Some(1000),
            ..IndexCfg::default()
        };
        VectorIndex::build(&store, 1, cfg).unwrap()
    }

    fn query_frame(vec: f32, timecode: f64) -> FrameHash {
        FrameHash {
            vec: vec![vec],
            timecode,
        }
    }

    fn nearest_only() -> SearchCfg {
        SearchCfg {
            neighbours_per_frame: 1,
            ..SearchCfg::default()
        }
    }

    #[test]
    fn test_votes_too_far_before_the_reference_are_dropped() {
        let index = two_video_index();
        let search = TemporalSearch::new(&index, nearest_only()).unwrap();

        // video "a" frame 1 (t=1.0) queried at t=3.0: offset -2.0 is beyond the 1.5s leniency.
        let results = search.search(&[query_frame(10.0, 3.0)], 10).unwrap();
        assert!(results.is_empty());

        // at t=2.0 the offset is -1.0, which is allowed.
        let results = search.search(&[query_frame(10.0, 2.0)], 10).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].video_id, "a");
        assert_eq!(results[0].offset, -1.0);
    }

    #[test]
    fn test_single_vote_fallback() {
        let index = two_video_index();
        let search = TemporalSearch::new(&index, nearest_only()).unwrap();

        // exact match with video "b" frame 4, queried at t=0.25.
        let results = search.search(&[query_frame(1040.0, 0.25)], 10).unwrap();
        assert_eq!(
            results,
            vec![MatchResult {
                video_id: "b".to_string(),
                offset: 3.75,
                weight: 1.0,
            }]
        );
    }

    #[test]
    fn test_ranked_by_weight() {
        let index = two_video_index();
        let search = TemporalSearch::new(&index, nearest_only()).unwrap();

        // three exact hits on "b", one exact hit on "a".
        let frames = [
            query_frame(1020.0, 0.0),
            query_frame(30.0, 1.0),
            query_frame(1040.0, 2.0),
            query_frame(1060.0, 4.0),
        ];
        let results = search.search(&frames, 10).unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].video_id, "b");
        assert_eq!(results[0].offset, 2.0);
        assert_eq!(results[0].weight, 3.0);
        assert_eq!(results[1].video_id, "a");

        let top1 = search.search(&frames, 1).unwrap();
        assert_eq!(top1, results[..1]);
    }

    #[test]
    fn test_merge_order_does_not_change_ranking() {
        let index = two_video_index();
        let search = TemporalSearch::new(&index, SearchCfg::default()).unwrap();

        let frames = (0..8)
            .map(|i| query_frame(i as f32 * 10.0 + 3.0, f64::from(i) + 0.3))
            .collect::<Vec<_>>();
        let expected = search.search(&frames, 10).unwrap();

        // accumulate each frame separately, then merge in reverse.
        let reversed = frames
            .iter()
            .rev()
            .map(|f| search.collect_votes(std::slice::from_ref(f), None).unwrap())
            .fold(VoteAccumulator::new(), VoteAccumulator::merge);
        assert_eq!(search.rank(reversed, 10), expected);
    }

    #[test]
    fn test_passed_deadline_queries_nothing() {
        let index = two_video_index();
        let search = TemporalSearch::new(&index, SearchCfg::default()).unwrap();

        let frames = [query_frame(0.0, 0.0), query_frame(10.0, 1.0)];
        let votes = search.collect_votes(&frames, Some(Instant::now())).unwrap();
        assert_eq!(votes.queried_frames(), 0);
        assert!(search
            .search_until(&frames, 10, Some(Instant::now()))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_dimension_mismatch_is_reported() {
        let index = two_video_index();
        let search = TemporalSearch::new(&index, SearchCfg::default()).unwrap();

        let bad = FrameHash {
            vec: vec![1.0, 2.0],
            timecode: 0.0,
        };
        assert!(matches!(
            search.search(&[bad], 10),
            Err(Error::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_invalid_bin_width() {
        let index = two_video_index();
        let cfg = SearchCfg {
            bin_width: 0.0,
            ..SearchCfg::default()
        };
        assert!(matches!(
            TemporalSearch::new(&index, cfg),
            Err(Error::InvalidConfig(_))
        ));
    }
}
