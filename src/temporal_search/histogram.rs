use std::collections::BTreeMap;

use super::votes::Vote;

/// The best supported alignment of the query against one candidate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OffsetEstimate {
    /// Unit: Seconds
    pub offset: f64,
    pub weight: f64,
}

/// Histogram the votes' offsets, weighted by vote weight, and return the left edge and
/// total weight of the heaviest bin.
///
/// Bins span `floor(min_offset / bin_width) * bin_width` to
/// `ceil(max_offset / bin_width) * bin_width`. Every bin is half open
/// (`[edge, edge + bin_width)`) except the last, which also holds a vote sitting exactly
/// on the closing edge. Equally heavy bins resolve to the lowest edge. A single vote is
/// returned as is.
///
/// The votes are sorted before binning, so the result does not depend on the order in
/// which they were collected.
pub fn estimate_offset(votes: &mut [Vote], bin_width: f64) -> Option<OffsetEstimate> {
    votes.sort_by(|a, b| {
        a.offset
            .total_cmp(&b.offset)
            .then(a.weight.total_cmp(&b.weight))
    });

    match &*votes {
        [] => None,
        [only] => Some(OffsetEstimate {
            offset: only.offset,
            weight: only.weight,
        }),
        [first, .., last] => {
            let first_edge = (first.offset / bin_width).floor() * bin_width;

            //identical offsets on an edge span no bins, so they keep one of their own.
            let num_bins = (((last.offset - first_edge) / bin_width).ceil() as i64).max(1);

            let mut bins = BTreeMap::<i64, f64>::new();
            for vote in votes.iter() {
                let bin = ((vote.offset - first_edge) / bin_width).floor() as i64;
                let bin = bin.min(num_bins - 1);
                *bins.entry(bin).or_default() += vote.weight;
            }

            //strictly greater, so the first (lowest) of equal bins wins.
            let mut best: Option<(i64, f64)> = None;
            for (bin, weight) in bins {
                if best.map_or(true, |(_, best_weight)| weight > best_weight) {
                    best = Some((bin, weight));
                }
            }

            best.map(|(bin, weight)| OffsetEstimate {
                offset: first_edge + bin as f64 * bin_width,
                weight,
            })
        }
    }
}
