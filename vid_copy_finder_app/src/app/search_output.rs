use std::{
    fs::{self, File},
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use vid_copy_finder_lib::MatchResult;
use walkdir::WalkDir;

use crate::app::AppError;

/// The ranked matches for one query, as written to `<out>/temporal/<hasher>/<query>.json`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SearchOutput {
    pub filename_timestamp: String,
    pub results: Vec<MatchResult>,

    /// Unit: Seconds
    pub elapsed_time: f64,
}

impl SearchOutput {
    pub fn new(query_name: impl Into<String>, results: Vec<MatchResult>, elapsed_time: f64) -> Self {
        Self {
            filename_timestamp: query_name.into(),
            results,
            elapsed_time,
        }
    }

    pub fn save(&self, dir: &Path) -> Result<PathBuf, AppError> {
        let path = dir.join(format!("{}.json", self.filename_timestamp));
        let io_err = |src| AppError::OutputIo {
            src,
            path: path.clone(),
        };

        fs::create_dir_all(dir).map_err(io_err)?;
        let mut f = BufWriter::new(File::create(&path).map_err(io_err)?);
        serde_json::to_writer(&mut f, self).map_err(|src| AppError::OutputJson {
            src,
            path: path.clone(),
        })?;
        f.flush().map_err(io_err)?;

        Ok(path)
    }
}

/// The fingerprint files directly inside `dir`, sorted by name.
pub fn json_files(dir: &Path) -> Result<Vec<PathBuf>, AppError> {
    let mut files = vec![];
    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry?;
        let is_json = entry.path().extension().is_some_and(|ext| ext == "json");
        if entry.file_type().is_file() && is_json {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

/// The name a query is reported under: its fingerprint file name without the extension.
pub fn query_name(query_path: &Path) -> String {
    query_path
        .file_stem()
        .map(|stem| stem.to_string_lossy().to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_output_json_layout() {
        let output = SearchOutput::new(
            "query_7.mp4",
            vec![MatchResult {
                video_id: "ref_2.mp4".to_string(),
                offset: 3.0,
                weight: 5.5,
            }],
            0.25,
        );

        let json = serde_json::to_value(&output).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "filename_timestamp": "query_7.mp4",
                "results": [{"filename": "ref_2.mp4", "timestamp_delta": 3.0, "weight": 5.5}],
                "elapsed_time": 0.25,
            })
        );
    }

    #[test]
    fn test_save_names_file_after_query() {
        let dir = tempfile::tempdir().unwrap();
        let out_dir = dir.path().join("temporal").join("phash");

        let output = SearchOutput::new("query_1.mp4", vec![], 1.0);
        let path = output.save(&out_dir).unwrap();
        assert_eq!(path, out_dir.join("query_1.mp4.json"));

        let reloaded: SearchOutput =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(reloaded, output);
    }

    #[test]
    fn test_json_files_are_sorted_and_filtered() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.mp4.json", "a.mp4.json", "index.vcfi", "c.txt"] {
            fs::write(dir.path().join(name), "{}").unwrap();
        }

        let files = json_files(dir.path()).unwrap();
        let names = files.iter().map(|f| query_name(f)).collect::<Vec<_>>();
        assert_eq!(names, vec!["a.mp4", "b.mp4"]);
    }
}
