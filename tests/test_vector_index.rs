use itertools::Itertools;
use rand::prelude::*;
use vid_copy_finder_lib::*;

fn random_store(
    num_videos: usize,
    frames: usize,
    dimension: usize,
    rng: &mut StdRng,
) -> FingerprintStore {
    (0..num_videos)
        .map(|v| {
            let frames = (0..frames)
                .map(|i| FrameHash {
                    vec: (0..dimension).map(|_| rng.gen_range(0.0..1.0)).collect(),
                    timecode: i as f64 * 0.5,
                })
                .collect();
            VideoFingerprints::new(format!("video_{v:03}"), frames)
        })
        .collect()
}

fn cfg(num_trees: usize) -> IndexCfg {
    IndexCfg {
        num_trees,
        ..IndexCfg::default()
    }
}

fn brute_force(store: &FingerprintStore, query: &[f32], k: usize) -> Vec<u32> {
    store
        .records()
        .zip(0u32..)
        .map(|(r, ordinal)| {
            let dist = r
                .vec
                .iter()
                .zip(query)
                .map(|(a, b)| (a - b) * (a - b))
                .sum::<f32>();
            (ordinal, dist)
        })
        .sorted_by(|(o1, d1), (o2, d2)| d1.total_cmp(d2).then(o1.cmp(o2)))
        .take(k)
        .map(|(ordinal, _)| ordinal)
        .collect()
}

#[test]
fn test_every_fingerprint_finds_itself() {
    let mut rng = StdRng::seed_from_u64(1);
    let store = random_store(10, 50, 12, &mut rng);
    let index = VectorIndex::build(&store, 12, cfg(20)).unwrap();
    assert_eq!(index.len(), 500);
    assert_eq!(index.num_videos(), 10);

    for (record, ordinal) in store.records().zip(0u32..) {
        let neighbours = index.query(record.vec, 5).unwrap();
        let own = neighbours.iter().find(|n| n.ordinal == ordinal);
        assert!(
            own.is_some_and(|n| n.distance == 0.0),
            "{} frame {} did not find itself",
            record.video_id,
            record.frame_ordinal
        );
        assert_eq!(index.video_id(neighbours[0].video), Some(record.video_id));
        assert_eq!(neighbours[0].timecode, record.timecode);
    }
}

#[test]
fn test_deep_search_matches_brute_force() {
    let mut rng = StdRng::seed_from_u64(2);
    let store = random_store(5, 100, 12, &mut rng);
    let index = VectorIndex::build(&store, 12, cfg(20))
        .unwrap()
        .with_search_k(Some(2000));

    let k = 10;
    let mut hits = 0;
    let num_queries = 50;
    for _ in 0..num_queries {
        let query = (0..12).map(|_| rng.gen_range(0.0..1.0)).collect::<Vec<f32>>();
        let exact = brute_force(&store, &query, k);
        let approx = index
            .query(&query, k)
            .unwrap()
            .into_iter()
            .map(|n| n.ordinal)
            .collect::<Vec<_>>();
        hits += approx.iter().filter(|o| exact.contains(o)).count();
    }

    let recall = hits as f64 / (num_queries * k) as f64;
    assert!(recall > 0.9, "recall too low: {recall}");
}

#[test]
fn test_saved_index_answers_like_the_original() {
    let mut rng = StdRng::seed_from_u64(3);
    let store = random_store(4, 60, 8, &mut rng);

    let built = VectorIndex::build(&store, 8, cfg(15)).unwrap();
    let rebuilt = VectorIndex::build(&store, 8, cfg(15)).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("index.vcfi");
    built.save(&path).unwrap();
    let loaded = VectorIndex::load(&path).unwrap();

    assert_eq!(loaded.len(), built.len());
    assert_eq!(loaded.dimension(), 8);
    assert_eq!(loaded.num_trees(), 15);
    assert_eq!(loaded.seed(), DEFAULT_INDEX_SEED);

    for _ in 0..50 {
        let query = (0..8).map(|_| rng.gen_range(0.0..1.0)).collect::<Vec<f32>>();
        let expected = built.query(&query, 10).unwrap();
        assert_eq!(loaded.query(&query, 10).unwrap(), expected);
        assert_eq!(rebuilt.query(&query, 10).unwrap(), expected);

        for n in &expected {
            assert_eq!(loaded.video_id(n.video), built.video_id(n.video));
        }
    }
}

#[test]
fn test_loaded_index_detects_changed_fingerprint_files() {
    let mut rng = StdRng::seed_from_u64(4);
    let store = random_store(3, 10, 4, &mut rng);

    let dir = tempfile::tempdir().unwrap();
    for video in store.videos() {
        video
            .save(&fingerprint_path(dir.path(), video.video_id()))
            .unwrap();
    }

    let on_disk = FingerprintStore::load_dir(dir.path()).unwrap();
    let index = VectorIndex::build(&on_disk, 4, cfg(5)).unwrap();
    let index_path = dir.path().join("index.vcfi");
    index.save(&index_path).unwrap();

    let loaded = VectorIndex::load(&index_path).unwrap();
    loaded
        .verify_against_store(&FingerprintStore::load_dir(dir.path()).unwrap())
        .unwrap();

    // a new video sorts between the existing ones, shifting every later ordinal.
    let extra = random_store(1, 3, 4, &mut rng).videos()[0].clone();
    let extra = VideoFingerprints::new("video_000b", extra.frames().to_vec());
    extra
        .save(&fingerprint_path(dir.path(), extra.video_id()))
        .unwrap();

    let res = loaded.verify_against_store(&FingerprintStore::load_dir(dir.path()).unwrap());
    assert!(matches!(res, Err(Error::InconsistentLookup(_))));
}
