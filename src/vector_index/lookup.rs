use std::collections::HashMap;

use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub(super) struct LookupRecord {
    pub video: u32,
    pub frame_ordinal: u32,
    pub timecode: f64,
}

/// Maps each item ordinal of the index back to the frame it came from. Video
/// identifiers are stored once and referred to by their position in `videos`.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub(super) struct LookupTable {
    videos: Vec<String>,
    records: Vec<LookupRecord>,

    #[serde(skip)]
    interned: HashMap<String, u32>,
}

impl LookupTable {
    pub fn push(&mut self, video_id: &str, frame_ordinal: u32, timecode: f64) -> u32 {
        let video = match self.interned.get(video_id) {
            Some(video) => *video,
            None => {
                let video = self.videos.len() as u32;
                self.videos.push(video_id.to_string());
                self.interned.insert(video_id.to_string(), video);
                video
            }
        };

        self.records.push(LookupRecord {
            video,
            frame_ordinal,
            timecode,
        });
        (self.records.len() - 1) as u32
    }

    pub fn get(&self, ordinal: u32) -> Option<&LookupRecord> {
        self.records.get(ordinal as usize)
    }

    pub fn video_id(&self, video: u32) -> Option<&str> {
        self.videos.get(video as usize).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn num_videos(&self) -> usize {
        self.videos.len()
    }

    /// Index of the first record whose video does not exist, if any.
    pub fn first_dangling_record(&self) -> Option<usize> {
        let num_videos = self.videos.len();
        self.records
            .iter()
            .position(|r| r.video as usize >= num_videos)
    }
}
