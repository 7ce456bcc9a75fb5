use rand::prelude::*;
use vid_copy_finder_lib::*;

/// A reference corpus of videos with random fingerprints, sampled at a fixed interval.
struct SyntheticCorpus {
    store: FingerprintStore,
    dimension: usize,
}

impl SyntheticCorpus {
    fn new(
        num_videos: usize,
        frames_per_video: usize,
        dimension: usize,
        first_timecode: f64,
        interval: f64,
        rng: &mut StdRng,
    ) -> Self {
        let store = (1..=num_videos)
            .map(|v| {
                let frames = (0..frames_per_video)
                    .map(|i| FrameHash {
                        vec: (0..dimension).map(|_| rng.gen_range(0.0..255.0)).collect(),
                        timecode: first_timecode + i as f64 * interval,
                    })
                    .collect();
                VideoFingerprints::new(format!("ref_{v}.mp4"), frames)
            })
            .collect();

        Self { store, dimension }
    }

    fn video(&self, video_id: &str) -> &VideoFingerprints {
        self.store
            .videos()
            .iter()
            .find(|v| v.video_id() == video_id)
            .unwrap()
    }

    fn index(&self, num_trees: usize) -> VectorIndex {
        let cfg = IndexCfg {
            num_trees,
            ..IndexCfg::default()
        };
        VectorIndex::build(&self.store, self.dimension, cfg).unwrap()
    }
}

/// Copy frames of a reference video into a query clip which starts `delta` seconds into the
/// reference. Each component is perturbed by up to `noise`, as re-encoding would.
fn query_clip(
    source: &[FrameHash],
    delta: f64,
    noise: f32,
    rng: &mut StdRng,
) -> Vec<FrameHash> {
    source
        .iter()
        .map(|f| FrameHash {
            vec: f
                .vec
                .iter()
                .map(|v| if noise > 0.0 { v + rng.gen_range(-noise..noise) } else { *v })
                .collect(),
            timecode: f.timecode - delta,
        })
        .collect()
}

#[test]
// 3 reference videos of 5 fingerprints, each sampled from 2s onwards. The query is trimmed
// from the middle of the second video (its 2nd to 4th fingerprints, 3s to 5s) and starts
// at 0s, so it aligns with the reference at +3s.
fn test_query_of_known_video_ranks_it_first() {
    let mut rng = StdRng::seed_from_u64(1);
    let corpus = SyntheticCorpus::new(3, 5, 8, 2.0, 1.0, &mut rng);
    let index = corpus.index(10);
    assert_eq!(index.len(), 15);

    let trimmed = &corpus.video("ref_2.mp4").frames()[1..4];
    assert_eq!(trimmed[0].timecode, 3.0);
    let query = query_clip(trimmed, 3.0, 0.0, &mut rng);
    assert_eq!(query[0].timecode, 0.0);

    let search = TemporalSearch::new(&index, SearchCfg::default()).unwrap();
    let results = search.search(&query, 10).unwrap();

    assert_eq!(results[0].video_id, "ref_2.mp4");
    assert!(
        (results[0].offset - 3.0).abs() < 1e-9,
        "expected offset 3.0, got {}",
        results[0].offset
    );
    assert!(results[0].weight >= 3.0);
    assert!(results[1..].iter().all(|r| r.weight < results[0].weight));
}

#[test]
// A 10 frame slice from the middle of one reference, with noisy fingerprints. The estimate
// must be within one bin of the true offset.
fn test_ten_frame_slice_recovers_offset() {
    let mut rng = StdRng::seed_from_u64(2);
    let corpus = SyntheticCorpus::new(6, 40, 16, 0.0, 0.5, &mut rng);
    let index = corpus.index(20);

    let cfg = SearchCfg::default();
    let search = TemporalSearch::new(&index, cfg).unwrap();

    for (video_id, first_frame, delta) in [
        ("ref_4.mp4", 13, 6.25),
        ("ref_1.mp4", 0, 0.0),
        ("ref_6.mp4", 30, 14.5),
    ] {
        let slice = &corpus.video(video_id).frames()[first_frame..first_frame + 10];
        let query = query_clip(slice, delta, 2.0, &mut rng);

        let results = search.search(&query, cfg.topk).unwrap();
        assert_eq!(results[0].video_id, video_id);
        assert!(
            (results[0].offset - delta).abs() <= cfg.bin_width,
            "{video_id}: expected offset within {} of {delta}, got {}",
            cfg.bin_width,
            results[0].offset
        );
    }
}

#[test]
fn test_results_are_ranked_and_repeatable() {
    let mut rng = StdRng::seed_from_u64(3);
    let corpus = SyntheticCorpus::new(8, 20, 8, 0.0, 0.5, &mut rng);
    let index = corpus.index(10);
    let search = TemporalSearch::new(&index, SearchCfg::default()).unwrap();

    // frames borrowed from several references, so that many candidates receive votes.
    let mut query = vec![];
    for (i, video) in corpus.store.videos().iter().enumerate().take(4) {
        query.extend(query_clip(&video.frames()[i..i + 1 + i], 0.0, 5.0, &mut rng));
    }

    let results = search.search(&query, 10).unwrap();
    assert!(results.len() >= 4);
    assert!(results.len() <= 10);
    assert!(
        results.windows(2).all(|w| w[0].weight >= w[1].weight),
        "results not sorted: {results:?}"
    );

    assert_eq!(search.search(&query, 10).unwrap(), results);

    let top2 = search.search(&query, 2).unwrap();
    assert_eq!(top2, results[..2]);
}

#[test]
// A query that only ever matches frames earlier than itself by more than the leniency gives
// no results at all.
fn test_votes_before_the_reference_start_are_ignored() {
    let mut rng = StdRng::seed_from_u64(4);
    let corpus = SyntheticCorpus::new(2, 5, 8, 0.0, 1.0, &mut rng);
    let index = corpus.index(10);

    let cfg = SearchCfg {
        neighbours_per_frame: 1,
        ..SearchCfg::default()
    };
    let search = TemporalSearch::new(&index, cfg).unwrap();

    let query = query_clip(corpus.video("ref_1.mp4").frames(), -2.0, 0.0, &mut rng);
    assert!(search.search(&query, 10).unwrap().is_empty());

    let lenient = SearchCfg {
        offset_leniency: 2.5,
        ..cfg
    };
    let results = TemporalSearch::new(&index, lenient)
        .unwrap()
        .search(&query, 10)
        .unwrap();
    assert_eq!(results[0].video_id, "ref_1.mp4");
    assert_eq!(results[0].offset, -2.0);
}
