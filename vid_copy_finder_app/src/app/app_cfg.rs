use std::{fmt, ops::Range, path::PathBuf};

use vid_copy_finder_lib::{HasherKind, IndexCfg, SearchCfg};

use crate::app::AppError;

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ReportVerbosity {
    Quiet,
    Default,
    Verbose,
}

/// One of several processes sharing a job. Each process handles a contiguous slice of
/// the (sorted) work items, and the slices of all buckets cover every item exactly once.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct BucketCfg {
    pub buckets: usize,
    pub bucket: usize,
}

impl Default for BucketCfg {
    fn default() -> Self {
        Self {
            buckets: 1,
            bucket: 0,
        }
    }
}

impl BucketCfg {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.buckets == 0 || self.bucket >= self.buckets {
            return Err(AppError::InvalidBucket {
                bucket: self.bucket,
                buckets: self.buckets,
            });
        }
        Ok(())
    }

    /// The items of `num_items` that belong to this bucket.
    pub fn slice(&self, num_items: usize) -> Range<usize> {
        let boundary = |bucket: usize| (num_items * bucket).div_ceil(self.buckets);
        let start = boundary(self.bucket).min(num_items);
        let end = boundary(self.bucket + 1).min(num_items);
        start..end
    }

    /// Split the cpus of the machine evenly between the buckets.
    pub fn threads(&self, num_cpus: usize) -> usize {
        (num_cpus / self.buckets.max(1)).max(1)
    }
}

impl fmt::Display for BucketCfg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[bucket={}/{}]", self.bucket + 1, self.buckets)
    }
}

#[derive(Debug, Clone)]
pub enum Command {
    /// Fingerprint directories of extracted frames.
    Hash {
        frames_dir: PathBuf,
        query: bool,
    },

    /// Build one index per hasher over the reference fingerprints.
    BuildIndex { index_cfg: IndexCfg },

    /// Search the query fingerprints against the indexes.
    Search {
        search_cfg: SearchCfg,
        search_k: Option<usize>,

        /// Unit: Seconds
        timeout: Option<f64>,
    },
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Hash { .. } => "hash",
            Self::BuildIndex { .. } => "build-index",
            Self::Search { .. } => "search",
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppCfg {
    pub command: Command,

    pub out_dir: PathBuf,
    pub hashers: Vec<HasherKind>,
    pub bucket_cfg: BucketCfg,
    pub threads: usize,

    pub verbosity: ReportVerbosity,
    pub log_to_file: bool,
}

impl AppCfg {
    pub fn hashes_dir(&self, kind: HasherKind) -> PathBuf {
        self.out_dir.join("hashes").join(kind.name())
    }

    pub fn query_hashes_dir(&self, kind: HasherKind) -> PathBuf {
        self.out_dir.join("query_hashes").join(kind.name())
    }

    pub fn index_path(&self, kind: HasherKind) -> PathBuf {
        self.hashes_dir(kind).join("index.vcfi")
    }

    pub fn results_dir(&self, kind: HasherKind) -> PathBuf {
        self.out_dir.join("temporal").join(kind.name())
    }

    pub fn log_path(&self) -> PathBuf {
        self.out_dir.join(format!(
            "{}_{}.log",
            self.command.name(),
            self.bucket_cfg.bucket
        ))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn bucket(bucket: usize, buckets: usize) -> BucketCfg {
        BucketCfg { buckets, bucket }
    }

    #[test]
    fn test_bucket_slices_cover_every_item_once() {
        for num_items in [0, 1, 7, 10, 101] {
            for buckets in 1..=6 {
                let mut covered = vec![];
                for b in 0..buckets {
                    covered.extend(bucket(b, buckets).slice(num_items));
                }
                assert_eq!(covered, (0..num_items).collect::<Vec<_>>());
            }
        }
    }

    #[test]
    fn test_bucket_slice_rounds_up() {
        // ceil(10 * 1 / 3) = 4, ceil(10 * 2 / 3) = 7
        assert_eq!(bucket(0, 3).slice(10), 0..4);
        assert_eq!(bucket(1, 3).slice(10), 4..7);
        assert_eq!(bucket(2, 3).slice(10), 7..10);

        // more buckets than items leaves some buckets empty.
        assert_eq!(bucket(3, 4).slice(2), 2..2);
    }

    #[test]
    fn test_bucket_validation() {
        assert!(bucket(0, 1).validate().is_ok());
        assert!(bucket(3, 4).validate().is_ok());
        assert!(bucket(4, 4).validate().is_err());
        assert!(bucket(0, 0).validate().is_err());
    }

    #[test]
    fn test_threads_per_bucket() {
        assert_eq!(bucket(0, 1).threads(8), 8);
        assert_eq!(bucket(0, 3).threads(8), 2);
        assert_eq!(bucket(0, 16).threads(8), 1);
    }

    #[test]
    fn test_log_path_names_subcommand_and_bucket() {
        let cfg = AppCfg {
            command: Command::BuildIndex {
                index_cfg: IndexCfg::default(),
            },
            out_dir: PathBuf::from("/out"),
            hashers: vec![HasherKind::PHash],
            bucket_cfg: bucket(2, 4),
            threads: 1,
            verbosity: ReportVerbosity::Default,
            log_to_file: true,
        };
        assert_eq!(cfg.log_path(), PathBuf::from("/out/build-index_2.log"));
        assert_eq!(
            cfg.index_path(HasherKind::PHash),
            PathBuf::from("/out/hashes/phash/index.vcfi")
        );
        assert_eq!(cfg.bucket_cfg.to_string(), "[bucket=3/4]");
    }
}
