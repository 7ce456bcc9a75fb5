use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Lib(#[from] vid_copy_finder_lib::Error),

    /////////////////////////////////
    //input problems
    #[error("Failed to read frame {path}: {src}")]
    FrameRead {
        src: image::ImageError,
        path: PathBuf,
    },

    #[error("No frames found in {0}")]
    NoFrames(PathBuf),

    #[error("Failed to list directory: {0}")]
    DirWalk(#[from] walkdir::Error),

    /////////////////////////////////
    //output problems
    #[error("Failed to write {path}: {src}")]
    OutputIo { src: std::io::Error, path: PathBuf },

    #[error("Failed to serialize search output {path}: {src}")]
    OutputJson {
        src: serde_json::Error,
        path: PathBuf,
    },

    /////////////////////////////////
    //configuration
    #[error("Invalid bucket {bucket}: must be less than the number of buckets ({buckets})")]
    InvalidBucket { bucket: usize, buckets: usize },

    #[error("Hashers have different numbers of queries: {0}")]
    QueryCountMismatch(String),
}

pub fn print_error_and_quit(e: eyre::Report) -> ! {
    #[allow(clippy::print_stderr)]
    let () = eprintln!("{:?}", e);
    std::process::exit(1);
}
