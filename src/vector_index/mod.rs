//! An approximate nearest neighbour index over the fingerprints of a reference corpus.
//!
//! The index is a forest of random projection trees. Each internal node splits its items
//! by the hyperplane equidistant from two randomly chosen items, and leaves hold at most
//! a handful of item ordinals. Queries explore the nodes of every tree best-first, then
//! rank the collected candidates by exact euclidean distance.
//!
//! Every item ordinal resolves through a lookup table to the video, frame number and
//! timecode it was hashed from. The table is saved in the same file as the trees, so a
//! loaded index can never disagree with itself.

mod forest;
mod lookup;
mod persistence;

use std::{path::Path, time::Instant};

use log::info;
use rand::prelude::*;
use rayon::prelude::*;

use self::{
    forest::{euclidean, Tree, Vectors},
    lookup::LookupTable,
    persistence::IndexHeader,
};
use crate::{
    definitions::{DEFAULT_INDEX_SEED, DEFAULT_NUM_TREES},
    fingerprint_store::{FingerprintRecord, FingerprintStore},
    Error, HasherKind, VideoHashResult,
};

/// Options for building and querying a [`VectorIndex`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexCfg {
    /// Number of random projection trees.
    ///
    /// Reccomended range: 10-1000.
    pub num_trees: usize,

    /// Seed from which the randomness of every tree is derived.
    pub seed: u64,

    /// Number of candidates collected before ranking a query. `None` collects
    /// `num_trees * k` candidates.
    pub search_k: Option<usize>,

    /// Number of worker threads used to build the trees. Does not affect the result.
    pub threads: usize,

    /// The hasher whose fingerprints are indexed. When set it is saved with the index,
    /// and the index can only be registered for that hasher.
    pub hasher: Option<HasherKind>,
}

impl Default for IndexCfg {
    fn default() -> Self {
        Self {
            num_trees: DEFAULT_NUM_TREES,
            seed: DEFAULT_INDEX_SEED,
            search_k: None,
            threads: rayon::current_num_threads(),
            hasher: None,
        }
    }
}

/// One result of a nearest neighbour query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbour {
    /// Position of the record in the index.
    pub ordinal: u32,
    /// The video the record belongs to. Resolve with [`VectorIndex::video_id`].
    pub video: u32,
    pub frame_ordinal: u32,
    /// Unit: Seconds
    pub timecode: f64,
    pub distance: f32,
}

// Each tree has its own stream of randomness, so the forest does not depend on which
// thread builds which tree.
fn tree_seed(seed: u64, tree_idx: usize) -> u64 {
    seed ^ (tree_idx as u64 + 1).wrapping_mul(0x9E37_79B9_7F4A_7C15)
}

/// Accumulates fingerprints until the index is built.
#[derive(Debug, Clone)]
pub struct IndexBuilder {
    cfg: IndexCfg,
    vectors: Vectors,
    lookup: LookupTable,
}

impl IndexBuilder {
    pub fn new(dimension: usize, cfg: IndexCfg) -> Self {
        Self {
            cfg,
            vectors: Vectors::new(dimension),
            lookup: LookupTable::default(),
        }
    }

    /// Add one fingerprint, returning its ordinal in the index.
    ///
    /// # Errors
    /// Returns [`Error::DimensionMismatch`] if the vector does not have the index's dimensionality.
    /// Returns [`Error::InvalidConfig`] if the builder was created with zero dimensions.
    pub fn add_item(&mut self, record: &FingerprintRecord<'_>) -> VideoHashResult<u32> {
        if self.vectors.dimension() == 0 {
            return Err(Error::InvalidConfig(
                "an index needs vectors of at least one dimension".to_string(),
            ));
        }
        if record.vec.len() != self.vectors.dimension() {
            return Err(Error::DimensionMismatch {
                expected: self.vectors.dimension(),
                actual: record.vec.len(),
            });
        }

        let ordinal = self.vectors.push(record.vec);
        let lookup_ordinal = self
            .lookup
            .push(record.video_id, record.frame_ordinal, record.timecode);
        debug_assert_eq!(ordinal, lookup_ordinal);

        Ok(ordinal)
    }

    /// Add every record of a store, in store order.
    pub fn add_store(&mut self, store: &FingerprintStore) -> VideoHashResult<()> {
        for record in store.records() {
            self.add_item(&record)?;
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn build(self) -> VideoHashResult<VectorIndex> {
        let Self {
            cfg,
            vectors,
            lookup,
        } = self;

        if cfg.num_trees == 0 {
            return Err(Error::InvalidConfig("an index needs at least one tree".to_string()));
        }
        if let Some(kind) = cfg.hasher {
            if kind.dimensionality() != vectors.dimension() {
                return Err(Error::DimensionMismatch {
                    expected: kind.dimensionality(),
                    actual: vectors.dimension(),
                });
            }
        }

        let start = Instant::now();
        let num_items = vectors.len() as u32;
        let leaf_size = vectors.dimension() + 2;

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(cfg.threads)
            .build()
            .map_err(|e| Error::ThreadPool(format!("{e}")))?;

        let trees = pool.install(|| {
            (0..cfg.num_trees)
                .into_par_iter()
                .map(|tree_idx| {
                    let mut rng = StdRng::seed_from_u64(tree_seed(cfg.seed, tree_idx));
                    Tree::build(&vectors, (0..num_items).collect(), leaf_size, &mut rng)
                })
                .collect::<Vec<_>>()
        });

        info!(
            target: "vector_index_build",
            "built {} trees over {} fingerprints from {} videos in {:.2}s",
            cfg.num_trees,
            num_items,
            lookup.num_videos(),
            start.elapsed().as_secs_f64()
        );

        Ok(VectorIndex {
            header: IndexHeader::new(vectors.dimension(), cfg.num_trees, cfg.seed, cfg.hasher),
            trees,
            vectors,
            lookup,
            search_k: cfg.search_k,
        })
    }
}

/// A built (or loaded) nearest neighbour index. Immutable: queries only need `&self`,
/// so one index can be shared between threads.
#[derive(Debug, Clone)]
pub struct VectorIndex {
    header: IndexHeader,
    trees: Vec<Tree>,
    vectors: Vectors,
    lookup: LookupTable,
    search_k: Option<usize>,
}

impl VectorIndex {
    /// Build an index over every record of `store`.
    pub fn build(
        store: &FingerprintStore,
        dimension: usize,
        cfg: IndexCfg,
    ) -> VideoHashResult<Self> {
        let mut builder = IndexBuilder::new(dimension, cfg);
        builder.add_store(store)?;
        builder.build()
    }

    /// Change the number of candidates collected per query. See [`IndexCfg::search_k`].
    #[must_use]
    pub fn with_search_k(mut self, search_k: Option<usize>) -> Self {
        self.search_k = search_k;
        self
    }

    pub fn dimension(&self) -> usize {
        self.vectors.dimension()
    }

    /// Number of fingerprints in the index.
    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn num_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn num_videos(&self) -> usize {
        self.lookup.num_videos()
    }

    pub fn seed(&self) -> u64 {
        self.header.seed
    }

    /// Name of the hasher the index was built for, if one was recorded.
    pub fn hasher(&self) -> Option<&str> {
        self.header.hasher.as_deref()
    }

    pub fn video_id(&self, video: u32) -> Option<&str> {
        self.lookup.video_id(video)
    }

    /// Return up to `k` nearest fingerprints to `vector`, nearest first. Equal distances
    /// are ordered by ordinal.
    ///
    /// # Errors
    /// Returns [`Error::DimensionMismatch`] if `vector` has the wrong length.
    pub fn query(&self, vector: &[f32], k: usize) -> VideoHashResult<Vec<Neighbour>> {
        if vector.len() != self.dimension() {
            return Err(Error::DimensionMismatch {
                expected: self.dimension(),
                actual: vector.len(),
            });
        }

        if k == 0 || self.is_empty() {
            return Ok(vec![]);
        }

        let search_k = self
            .search_k
            .unwrap_or_else(|| self.trees.len().saturating_mul(k))
            .max(k);

        let mut scored = forest::candidates(&self.trees, vector, search_k)
            .into_iter()
            .map(|ordinal| (ordinal, euclidean(vector, self.vectors.get(ordinal))))
            .collect::<Vec<_>>();
        scored.sort_by(|(o1, d1), (o2, d2)| d1.total_cmp(d2).then(o1.cmp(o2)));
        scored.truncate(k);

        scored
            .into_iter()
            .map(|(ordinal, distance)| {
                let record = self.lookup.get(ordinal).ok_or_else(|| {
                    Error::InconsistentLookup(format!("no record for ordinal {ordinal}"))
                })?;
                Ok(Neighbour {
                    ordinal,
                    video: record.video,
                    frame_ordinal: record.frame_ordinal,
                    timecode: record.timecode,
                    distance,
                })
            })
            .collect()
    }

    /// Save the trees, vectors and lookup table to a single file.
    pub fn save(&self, path: &Path) -> VideoHashResult<()> {
        persistence::save(path, &self.header, &self.trees, &self.vectors, &self.lookup)?;

        info!(
            target: "vector_index_build",
            "saved index of {} fingerprints to {}",
            self.len(),
            path.display()
        );
        Ok(())
    }

    /// Load an index saved by [`VectorIndex::save`].
    ///
    /// # Errors
    /// Returns [`Error::InconsistentLookup`] if any item held by a tree does not resolve to
    /// a record, and [`Error::Deserialization`] if the file is not a readable index.
    pub fn load(path: &Path) -> VideoHashResult<Self> {
        let start = Instant::now();
        let file = persistence::load(path)?;

        let index = Self {
            header: file.header,
            trees: file.trees,
            vectors: file.vectors,
            lookup: file.lookup,
            search_k: None,
        };
        index.check_consistency()?;

        info!(
            target: "vector_index_load",
            "loaded index of {} fingerprints from {} videos ({} trees) from {} in {:.2}s",
            index.len(),
            index.num_videos(),
            index.num_trees(),
            path.display(),
            start.elapsed().as_secs_f64()
        );

        Ok(index)
    }

    fn check_consistency(&self) -> VideoHashResult<()> {
        let inconsistent = |msg: String| Err(Error::InconsistentLookup(msg));

        if !self.vectors.is_consistent()
            || self.vectors.dimension() != self.header.dimension as usize
        {
            return inconsistent(format!(
                "vector storage does not match dimension {}",
                self.header.dimension
            ));
        }

        if self.trees.len() != self.header.num_trees as usize {
            return inconsistent(format!(
                "header declares {} trees but {} are stored",
                self.header.num_trees,
                self.trees.len()
            ));
        }

        if self.lookup.len() != self.vectors.len() {
            return inconsistent(format!(
                "{} vectors but {} lookup records",
                self.vectors.len(),
                self.lookup.len()
            ));
        }

        if let Some(record) = self.lookup.first_dangling_record() {
            return inconsistent(format!("record {record} refers to a missing video"));
        }

        let num_items = self.lookup.len();
        for (tree_idx, tree) in self.trees.iter().enumerate() {
            if !tree.child_links_are_valid() {
                return inconsistent(format!("tree {tree_idx} is malformed"));
            }
            if let Some(ordinal) = tree.leaf_items().find(|o| *o as usize >= num_items) {
                return inconsistent(format!(
                    "tree {tree_idx} holds ordinal {ordinal} but only {num_items} records exist"
                ));
            }
        }

        Ok(())
    }

    /// Check that the lookup table describes exactly the records of `store`, in order.
    /// Use this to detect that the fingerprint files have changed since the index was built.
    pub fn verify_against_store(&self, store: &FingerprintStore) -> VideoHashResult<()> {
        if store.len() != self.len() {
            return Err(Error::InconsistentLookup(format!(
                "index holds {} fingerprints but the store holds {}",
                self.len(),
                store.len()
            )));
        }

        for (record, ordinal) in store.records().zip(0u32..) {
            let indexed = self.lookup.get(ordinal);
            let indexed_video = indexed.and_then(|r| self.lookup.video_id(r.video));

            let matches = indexed.is_some_and(|r| {
                r.frame_ordinal == record.frame_ordinal && r.timecode == record.timecode
            }) && indexed_video == Some(record.video_id)
                && self.vectors.get(ordinal) == record.vec;

            if !matches {
                return Err(Error::InconsistentLookup(format!(
                    "record {ordinal} ({} frame {}) differs from the indexed fingerprint",
                    record.video_id, record.frame_ordinal
                )));
            }
        }

        Ok(())
    }
}
