//! Frames are decoded from videos by an external tool, and laid out on disk as
//! `<frames_dir>/<video_id>/<timecode>.<ext>`, e.g `frames/ref_1.mp4/12.5.png`.

use std::path::{Path, PathBuf};

use image::ImageFormat;
use itertools::Itertools;
use vid_copy_finder_lib::VideoKeyframe;
use walkdir::WalkDir;

use crate::app::AppError;

/// The directory of every video under `frames_dir`, sorted by name.
pub fn video_dirs(frames_dir: &Path) -> Result<Vec<PathBuf>, AppError> {
    let mut dirs = vec![];
    for entry in WalkDir::new(frames_dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry?;
        if entry.file_type().is_dir() {
            dirs.push(entry.into_path());
        }
    }
    Ok(dirs)
}

/// The name of a video directory, which identifies the video.
pub fn video_id(video_dir: &Path) -> String {
    video_dir
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_default()
}

/// The frame files of one video with their timecodes, in timecode order. Files which are
/// not images, or whose name is not a timecode, are skipped.
pub fn frame_paths(video_dir: &Path) -> Result<Vec<(f64, PathBuf)>, AppError> {
    let mut frames = vec![];
    for entry in WalkDir::new(video_dir).min_depth(1).max_depth(1) {
        let entry = entry?;
        let path = entry.path();
        if !entry.file_type().is_file() || ImageFormat::from_path(path).is_err() {
            continue;
        }

        match parse_timecode(path) {
            Some(timecode) => frames.push((timecode, entry.into_path())),
            None => trace!(target: "frame_dir", "skipping {}", path.display()),
        }
    }

    Ok(frames
        .into_iter()
        .sorted_by(|(t1, _), (t2, _)| t1.total_cmp(t2))
        .collect())
}

fn parse_timecode(path: &Path) -> Option<f64> {
    let timecode = path.file_stem()?.to_str()?.parse::<f64>().ok()?;
    (timecode.is_finite() && timecode >= 0.0).then_some(timecode)
}

/// Decode every frame of one video.
pub fn read_keyframes(video_dir: &Path) -> Result<Vec<VideoKeyframe>, AppError> {
    let frames = frame_paths(video_dir)?;
    if frames.is_empty() {
        return Err(AppError::NoFrames(video_dir.to_path_buf()));
    }

    frames
        .into_iter()
        .map(|(timecode, path)| match image::open(&path) {
            Ok(frame) => Ok(VideoKeyframe::new(frame, timecode)),
            Err(src) => Err(AppError::FrameRead { src, path }),
        })
        .collect()
}
