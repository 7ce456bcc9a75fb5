use std::{
    error::Error,
    fs::File,
    path::{Path, PathBuf},
    time::{Duration, Instant},
};

use itertools::Itertools;
use rayon::prelude::*;
use vid_copy_finder_lib::*;

use crate::app::{
    frame_dir,
    search_output::{json_files, query_name},
    *,
};

pub fn run_app() -> i32 {
    let cfg = arg_parse::parse_args();
    configure_logs(&cfg);

    let ret = match run_app_inner(&cfg) {
        Ok(()) => 0,
        Err(fatal_error) => {
            print_fatal_err(fatal_error, cfg.verbosity);
            1
        }
    };

    ret
}

fn run_app_inner(cfg: &AppCfg) -> eyre::Result<()> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(cfg.threads)
        .build_global()
        .map_err(eyre::Report::msg)?;

    info!(
        "{} {} with hashers {}, threads={}",
        cfg.bucket_cfg,
        cfg.command.name(),
        cfg.hashers.iter().join(", "),
        cfg.threads
    );

    match &cfg.command {
        Command::Hash { frames_dir, query } => hash_videos(cfg, frames_dir, *query),
        Command::BuildIndex { index_cfg } => build_indexes(cfg, *index_cfg),
        Command::Search {
            search_cfg,
            search_k,
            timeout,
        } => search_queries(cfg, *search_cfg, *search_k, *timeout),
    }?;

    info!("{} Done", cfg.bucket_cfg);
    Ok(())
}

fn hash_videos(cfg: &AppCfg, frames_dir: &Path, query: bool) -> eyre::Result<()> {
    if !frames_dir.is_dir() {
        return Err(eyre::Report::msg(format!(
            "frames directory not found: {}",
            frames_dir.to_string_lossy()
        )));
    }

    let out_dir = |kind: HasherKind| {
        if query {
            cfg.query_hashes_dir(kind)
        } else {
            cfg.hashes_dir(kind)
        }
    };

    let hashers = cfg.hashers.iter().map(|kind| kind.build()).collect::<Vec<_>>();

    let video_dirs = frame_dir::video_dirs(frames_dir)?;
    let range = cfg.bucket_cfg.slice(video_dirs.len());
    let first = range.start;
    info!(
        "{} hashing videos {}..{} of {}",
        cfg.bucket_cfg,
        range.start,
        range.end,
        video_dirs.len()
    );

    // A video which cannot be hashed is reported and skipped. The others carry on.
    let num_failed = video_dirs[range]
        .par_iter()
        .enumerate()
        .filter(|(i, video_dir)| {
            let video_id = frame_dir::video_id(video_dir);
            info!("{} i={} {video_id}", cfg.bucket_cfg, first + i);

            match hash_one_video(video_dir, &video_id, &hashers, out_dir) {
                Ok(()) => false,
                Err(e) => {
                    error!(target: "app-errorlog", "{} {video_id}: {e}", cfg.bucket_cfg);
                    true
                }
            }
        })
        .count();

    if num_failed > 0 {
        warn!("{} {num_failed} videos could not be hashed", cfg.bucket_cfg);
    }

    Ok(())
}

fn hash_one_video(
    video_dir: &Path,
    video_id: &str,
    hashers: &[Box<dyn FrameHasher>],
    out_dir: impl Fn(HasherKind) -> PathBuf,
) -> Result<(), AppError> {
    let load_start = Instant::now();
    let keyframes = frame_dir::read_keyframes(video_dir)?;
    let load_time = load_start.elapsed();

    for hasher in hashers {
        let fingerprints = hasher.process_frames(&keyframes, video_id)?;
        fingerprints.save(&fingerprint_path(&out_dir(hasher.kind()), video_id))?;

        debug!(
            "{video_id}: {} {} frames in {:.3}s (+{:.3}s to load frames)",
            hasher.name(),
            fingerprints.len(),
            fingerprints.elapsed().as_secs_f64(),
            load_time.as_secs_f64()
        );
    }

    Ok(())
}

fn build_indexes(cfg: &AppCfg, index_cfg: IndexCfg) -> eyre::Result<()> {
    for &kind in &cfg.hashers {
        let start = Instant::now();
        let store = FingerprintStore::load_dir(&cfg.hashes_dir(kind))?;
        if store.is_empty() {
            warn!("{kind}: no reference fingerprints, skipping index build");
            continue;
        }

        let index_cfg = IndexCfg {
            hasher: Some(kind),
            ..index_cfg
        };
        let index = VectorIndex::build(&store, kind.dimensionality(), index_cfg)?;
        let index_path = cfg.index_path(kind);
        index.save(&index_path)?;

        info!(
            "{kind}: indexed {} fingerprints of {} videos in {:.1}s",
            index.len(),
            index.num_videos(),
            start.elapsed().as_secs_f64()
        );
    }

    Ok(())
}

fn search_queries(
    cfg: &AppCfg,
    search_cfg: SearchCfg,
    search_k: Option<usize>,
    timeout: Option<f64>,
) -> eyre::Result<()> {
    let mut index_set = IndexSet::new();
    for &kind in &cfg.hashers {
        let index = index_set.load(kind, &cfg.index_path(kind), search_k)?;

        //reject bad search options before any query is read.
        TemporalSearch::new(index, search_cfg)?;
    }
    info!(
        "{} loaded indexes for {}",
        cfg.bucket_cfg,
        index_set.kinds().iter().join(", ")
    );

    let queries = list_queries(cfg)?;
    let num_queries = queries.first().map_or(0, |(_, files)| files.len());
    let range = cfg.bucket_cfg.slice(num_queries);
    info!(
        "{} searching queries {}..{} of {num_queries}",
        cfg.bucket_cfg, range.start, range.end
    );

    let mut num_failed = 0;
    for (kind, files) in &queries {
        for (i, query_path) in files.iter().enumerate().take(range.end).skip(range.start) {
            let name = query_name(query_path);
            info!("{} {kind} i={i} {name}", cfg.bucket_cfg);

            let res = search_one_query(cfg, &index_set, *kind, query_path, search_cfg, timeout);
            if let Err(e) = res {
                error!(target: "app-errorlog", "{} {kind} {name}: {e}", cfg.bucket_cfg);
                num_failed += 1;
            }
        }
    }

    if num_failed > 0 {
        warn!("{} {num_failed} searches failed", cfg.bucket_cfg);
    }

    Ok(())
}

// The query fingerprint files of each hasher. Every hasher must have fingerprinted the
// same queries, so that a bucket covers the same queries for all of them.
fn list_queries(cfg: &AppCfg) -> eyre::Result<Vec<(HasherKind, Vec<PathBuf>)>> {
    let queries = cfg
        .hashers
        .iter()
        .map(|&kind| Ok((kind, json_files(&cfg.query_hashes_dir(kind))?)))
        .collect::<Result<Vec<_>, AppError>>()?;

    if !queries.iter().map(|(_, files)| files.len()).all_equal() {
        let counts = queries
            .iter()
            .map(|(kind, files)| format!("{kind}={}", files.len()))
            .join(", ");
        return Err(AppError::QueryCountMismatch(counts).into());
    }

    Ok(queries)
}

fn search_one_query(
    cfg: &AppCfg,
    index_set: &IndexSet,
    kind: HasherKind,
    query_path: &Path,
    search_cfg: SearchCfg,
    timeout: Option<f64>,
) -> Result<(), AppError> {
    let query = VideoFingerprints::load(query_path)?;

    let start = Instant::now();
    let deadline = timeout.map(|secs| start + Duration::from_secs_f64(secs.max(0.0)));
    let results = index_set.search(kind, query.frames(), search_cfg, deadline)?;
    let elapsed_time = start.elapsed().as_secs_f64();

    if let Some(best) = results.first() {
        debug!(
            "{kind} {}: best match {} at {:.2}s (weight {:.3})",
            query.video_id(),
            best.video_id,
            best.offset,
            best.weight
        );
    }

    SearchOutput::new(query_name(query_path), results, elapsed_time)
        .save(&cfg.results_dir(kind))?;
    Ok(())
}

fn print_fatal_err(fatal_err: eyre::Report, verbosity: ReportVerbosity) {
    error!(target: "app-errorlog", "{}", fatal_err);

    if verbosity == ReportVerbosity::Verbose {
        let mut source: Option<&(dyn Error + 'static)> = fatal_err.source();
        while let Some(e) = source {
            error!(target: "app-errorlog", "    caused by: {}", e);
            source = e.source();
        }
    }
}

pub fn configure_logs(cfg: &AppCfg) {
    use simplelog::*;

    let log_cfg = simplelog::ConfigBuilder::new()
        .set_target_level(LevelFilter::Error)
        .build();

    let min_loglevel = match cfg.verbosity {
        ReportVerbosity::Quiet => LevelFilter::Warn,
        ReportVerbosity::Default => LevelFilter::Info,
        ReportVerbosity::Verbose => LevelFilter::Trace,
    };

    let mut loggers: Vec<Box<dyn SharedLogger>> = vec![TermLogger::new(
        min_loglevel,
        log_cfg.clone(),
        TerminalMode::Stderr,
        ColorChoice::Auto,
    )];

    //the log file always records at least Info, so that a quiet run still leaves a record of progress.
    let mut log_file_err = None;
    if cfg.log_to_file {
        let log_path = cfg.log_path();
        let log_file = std::fs::create_dir_all(&cfg.out_dir).and_then(|()| File::create(&log_path));
        match log_file {
            Ok(f) => loggers.push(WriteLogger::new(
                min_loglevel.max(LevelFilter::Info),
                log_cfg,
                f,
            )),
            Err(e) => log_file_err = Some((log_path, e)),
        }
    }

    CombinedLogger::init(loggers).unwrap_or_else(|e| print_error_and_quit(eyre::Report::new(e)));

    if let Some((log_path, e)) = log_file_err {
        warn!("Failed to create log file {}: {e}", log_path.to_string_lossy());
    }
}
