use std::{
    io::{BufReader, Write},
    path::{Path, PathBuf},
    time::Duration,
};

use log::{info, trace};
use serde::{Deserialize, Serialize};

use crate::{utils::fs_ops::save_atomically, Error, VideoHashResult};

/// The fingerprint of a single frame.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct FrameHash {
    pub vec: Vec<f32>,
    /// Unit: Seconds
    pub timecode: f64,
}

/// The ordered frame fingerprints of one video, as produced by a single hasher.
///
/// On disk this is the JSON document `{"filename": .., "frames": [{"vec": .., "timecode": ..}]}`.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct VideoFingerprints {
    #[serde(rename = "filename")]
    video_id: String,
    frames: Vec<FrameHash>,

    //reporting only.
    #[serde(skip)]
    elapsed: Duration,
}

impl VideoFingerprints {
    pub fn new(video_id: impl Into<String>, frames: Vec<FrameHash>) -> Self {
        Self {
            video_id: video_id.into(),
            frames,
            elapsed: Duration::ZERO,
        }
    }

    #[must_use]
    pub fn with_elapsed(mut self, elapsed: Duration) -> Self {
        self.elapsed = elapsed;
        self
    }

    pub fn video_id(&self) -> &str {
        &self.video_id
    }

    pub fn frames(&self) -> &[FrameHash] {
        &self.frames
    }

    /// Wall clock time spent hashing the frames. Zero when loaded from disk.
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Write the fingerprints to `path` as JSON, replacing any existing file atomically.
    pub fn save(&self, path: &Path) -> VideoHashResult<()> {
        let io_err = |src| Error::FingerprintFileIo {
            src,
            path: path.to_path_buf(),
        };

        save_atomically(path, io_err, |buf| {
            serde_json::to_writer(&mut *buf, self).map_err(|e| Error::Serialization {
                src: format!("{e}"),
                path: path.to_path_buf(),
            })?;
            buf.flush().map_err(|src| Error::FingerprintFileIo {
                src,
                path: path.to_path_buf(),
            })
        })
    }

    pub fn load(path: &Path) -> VideoHashResult<Self> {
        let file = std::fs::File::open(path).map_err(|src| Error::FingerprintFileIo {
            src,
            path: path.to_path_buf(),
        })?;

        serde_json::from_reader(BufReader::new(file)).map_err(|e| Error::Deserialization {
            src: format!("{e}"),
            path: path.to_path_buf(),
        })
    }
}

/// One frame of the reference corpus, as seen by the vector index.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FingerprintRecord<'a> {
    pub video_id: &'a str,
    /// Position of the frame within its video.
    pub frame_ordinal: u32,
    /// Unit: Seconds
    pub timecode: f64,
    pub vec: &'a [f32],
}

/// The fingerprints of a whole reference corpus for one hasher. Videos are kept in the
/// order they were added, and frames in the order they were hashed, so the sequence of
/// records (and hence the index built from it) is reproducible.
#[derive(Clone, Debug, Default)]
pub struct FingerprintStore {
    videos: Vec<VideoFingerprints>,
}

impl FingerprintStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, video: VideoFingerprints) {
        self.videos.push(video);
    }

    /// Read every `*.json` fingerprint file in `dir`, in filename order. Other files
    /// (such as a saved index) are ignored.
    pub fn load_dir(dir: &Path) -> VideoHashResult<Self> {
        let entries = std::fs::read_dir(dir).map_err(|src| Error::FingerprintFileIo {
            src,
            path: dir.to_path_buf(),
        })?;

        let mut paths = vec![];
        for entry in entries {
            let entry = entry.map_err(|src| Error::FingerprintFileIo {
                src,
                path: dir.to_path_buf(),
            })?;
            let path = entry.path();
            if path.is_file() && path.extension().is_some_and(|ext| ext == "json") {
                paths.push(path);
            }
        }
        paths.sort();

        let mut store = Self::new();
        for path in &paths {
            trace!(target: "fingerprint_store", "loading {}", path.display());
            store.push(VideoFingerprints::load(path)?);
        }

        info!(
            target: "fingerprint_store",
            "loaded {} videos ({} frames) from {}",
            store.num_videos(),
            store.len(),
            dir.display()
        );

        Ok(store)
    }

    /// Every frame of every video, in store order.
    pub fn records(&self) -> impl Iterator<Item = FingerprintRecord<'_>> + '_ {
        self.videos.iter().flat_map(|video| {
            video
                .frames
                .iter()
                .zip(0u32..)
                .map(move |(frame, frame_ordinal)| FingerprintRecord {
                    video_id: &video.video_id,
                    frame_ordinal,
                    timecode: frame.timecode,
                    vec: &frame.vec,
                })
        })
    }

    pub fn videos(&self) -> &[VideoFingerprints] {
        &self.videos
    }

    pub fn num_videos(&self) -> usize {
        self.videos.len()
    }

    /// Total number of frame records.
    pub fn len(&self) -> usize {
        self.videos.iter().map(VideoFingerprints::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl FromIterator<VideoFingerprints> for FingerprintStore {
    fn from_iter<T: IntoIterator<Item = VideoFingerprints>>(iter: T) -> Self {
        Self {
            videos: iter.into_iter().collect(),
        }
    }
}

/// The file a video's fingerprints are stored in, within a fingerprint directory.
pub fn fingerprint_path(dir: &Path, video_id: &str) -> PathBuf {
    dir.join(format!("{video_id}.json"))
}

#[cfg(test)]
mod test {
    use super::*;

    fn video(id: &str, timecodes: &[f64]) -> VideoFingerprints {
        let frames = timecodes
            .iter()
            .map(|t| FrameHash {
                vec: vec![*t as f32, 1.0],
                timecode: *t,
            })
            .collect();
        VideoFingerprints::new(id, frames)
    }

    #[test]
    fn test_json_layout() {
        let json = serde_json::to_value(video("a.mp4", &[0.5])).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"filename": "a.mp4", "frames": [{"vec": [0.5, 1.0], "timecode": 0.5}]})
        );
    }

    #[test]
    fn test_integer_vectors_are_accepted() {
        let json = r#"{"filename": "x", "frames": [{"vec": [0, 255, 3], "timecode": 1}]}"#;
        let fp: VideoFingerprints = serde_json::from_str(json).unwrap();
        assert_eq!(fp.frames()[0].vec, vec![0.0, 255.0, 3.0]);
        assert_eq!(fp.frames()[0].timecode, 1.0);
    }

    #[test]
    fn test_load_dir_is_sorted_and_skips_other_files() {
        let dir = tempfile::tempdir().unwrap();
        video("b", &[0.0, 0.5]).save(&fingerprint_path(dir.path(), "b")).unwrap();
        video("a", &[0.0]).save(&fingerprint_path(dir.path(), "a")).unwrap();
        std::fs::write(dir.path().join("index.vcfi"), b"not json").unwrap();

        let store = FingerprintStore::load_dir(dir.path()).unwrap();
        assert_eq!(store.num_videos(), 2);
        assert_eq!(store.len(), 3);

        let records = store
            .records()
            .map(|r| (r.video_id, r.frame_ordinal, r.timecode))
            .collect::<Vec<_>>();
        assert_eq!(records, vec![("a", 0, 0.0), ("b", 0, 0.0), ("b", 1, 0.5)]);
    }

    #[test]
    fn test_corrupt_file_is_deserialization_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("bad.json"), b"{\"filename\": 3").unwrap();

        let res = FingerprintStore::load_dir(dir.path());
        assert!(matches!(res, Err(Error::Deserialization { .. })));
    }

    #[test]
    fn test_missing_dir_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let res = FingerprintStore::load_dir(&dir.path().join("nope"));
        assert!(matches!(res, Err(Error::FingerprintFileIo { .. })));
    }
}
