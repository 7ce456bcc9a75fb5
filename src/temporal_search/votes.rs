use std::collections::BTreeMap;

use crate::vector_index::Neighbour;

/// Evidence from one query frame that the query is aligned with a reference video
/// at `offset` seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vote {
    /// Reference timecode minus query timecode.
    ///
    /// Unit: Seconds
    pub offset: f64,
    pub weight: f64,
}

impl Vote {
    pub fn new(query_timecode: f64, neighbour: &Neighbour) -> Self {
        Self {
            offset: neighbour.timecode - query_timecode,
            weight: vote_weight(neighbour.distance),
        }
    }
}

/// Closer neighbours carry more weight. An exact match counts as 1.
pub fn vote_weight(distance: f32) -> f64 {
    if distance == 0.0 {
        1.0
    } else {
        1.0 / f64::from(distance)
    }
}

/// Votes grouped by candidate video. Accumulators built over disjoint sets of query
/// frames can be merged in any order.
#[derive(Debug, Clone, Default)]
pub struct VoteAccumulator {
    votes: BTreeMap<u32, Vec<Vote>>,
    queried_frames: usize,
}

impl VoteAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, video: u32, vote: Vote) {
        self.votes.entry(video).or_default().push(vote);
    }

    /// Record that one more query frame was looked up (whether or not it produced votes).
    pub fn count_frame(&mut self) {
        self.queried_frames += 1;
    }

    #[must_use]
    pub fn merge(mut self, other: Self) -> Self {
        for (video, votes) in other.votes {
            self.votes.entry(video).or_default().extend(votes);
        }
        self.queried_frames += other.queried_frames;
        self
    }

    pub fn num_candidates(&self) -> usize {
        self.votes.len()
    }

    pub fn num_votes(&self) -> usize {
        self.votes.values().map(Vec::len).sum()
    }

    pub fn queried_frames(&self) -> usize {
        self.queried_frames
    }

    /// The votes of every candidate, in ascending candidate order.
    pub fn into_candidates(self) -> impl Iterator<Item = (u32, Vec<Vote>)> {
        self.votes.into_iter()
    }
}
