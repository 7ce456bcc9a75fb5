use std::{collections::HashMap, path::Path, time::Instant};

use crate::{
    temporal_search::{MatchResult, SearchCfg, TemporalSearch},
    Error, FrameHash, HasherKind, VectorIndex, VideoHashResult,
};

/// At most one loaded index per hasher, with searches dispatched by hasher.
#[derive(Debug, Default)]
pub struct IndexSet {
    indexes: HashMap<HasherKind, VectorIndex>,
}

impl IndexSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an index for `kind`, replacing (and returning) any previous one.
    ///
    /// # Errors
    /// Returns [`Error::HasherMismatch`] if the index records that it was built for another
    /// hasher, and [`Error::DimensionMismatch`] if its vectors cannot be `kind`'s.
    pub fn insert(
        &mut self,
        kind: HasherKind,
        index: VectorIndex,
    ) -> VideoHashResult<Option<VectorIndex>> {
        if let Some(built_for) = index.hasher() {
            if built_for != kind.name() {
                return Err(Error::HasherMismatch {
                    expected: kind.name().to_string(),
                    actual: built_for.to_string(),
                });
            }
        }
        if index.dimension() != kind.dimensionality() {
            return Err(Error::DimensionMismatch {
                expected: kind.dimensionality(),
                actual: index.dimension(),
            });
        }
        Ok(self.indexes.insert(kind, index))
    }

    /// Load a saved index for `kind`, collecting `search_k` candidates per query.
    /// See [`IndexSet::insert`] for the checks made before it is registered.
    pub fn load(
        &mut self,
        kind: HasherKind,
        path: &Path,
        search_k: Option<usize>,
    ) -> VideoHashResult<&VectorIndex> {
        let index = VectorIndex::load(path)?.with_search_k(search_k);
        self.insert(kind, index)?;
        self.get(kind)
    }

    /// # Errors
    /// Returns [`Error::IndexNotReady`] if no index has been built or loaded for `kind`.
    pub fn get(&self, kind: HasherKind) -> VideoHashResult<&VectorIndex> {
        self.indexes
            .get(&kind)
            .ok_or_else(|| Error::IndexNotReady(kind.name().to_string()))
    }

    /// Hashers with a ready index, in a stable order.
    pub fn kinds(&self) -> Vec<HasherKind> {
        let mut kinds = self.indexes.keys().copied().collect::<Vec<_>>();
        kinds.sort();
        kinds
    }

    /// Search the index of `kind` with fingerprints produced by the same hasher.
    pub fn search(
        &self,
        kind: HasherKind,
        frames: &[FrameHash],
        cfg: SearchCfg,
        deadline: Option<Instant>,
    ) -> VideoHashResult<Vec<MatchResult>> {
        let index = self.get(kind)?;
        TemporalSearch::new(index, cfg)?.search_until(frames, cfg.topk, deadline)
    }
}
