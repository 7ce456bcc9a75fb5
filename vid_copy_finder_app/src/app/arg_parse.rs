use std::path::{Path, PathBuf};

use clap::{value_parser, ArgAction::*};
use vid_copy_finder_lib::*;

use crate::app::*;

// subcommands
const HASH_CMD: &str = "hash";
const BUILD_INDEX_CMD: &str = "build-index";
const SEARCH_CMD: &str = "search";

// file locations
const OUT_DIR: &str = "Output directory";
const FRAMES_DIR: &str = "Frames directory";
const QUERY: &str = "Hash queries";

// hasher selection
const HASHERS: &str = "Hashers";

// partitioning
const BUCKETS: &str = "Number of buckets";
const BUCKET: &str = "Bucket";

// index configuration
const NUM_TREES: &str = "Number of trees";
const SEED: &str = "Index seed";
const THREADS: &str = "Threads";

// search configuration
const SEARCH_K: &str = "Search depth";
const TOPK: &str = "Number of results";
const NEIGHBOURS: &str = "Neighbours per frame";
const LENIENCY: &str = "Offset leniency";
const BIN_WIDTH: &str = "Bin width";
const TIMEOUT: &str = "Query timeout";

// logging
const NO_LOG_FILE: &str = "No log file";

// Arg replacement
const ARGS_FILE: &str = "Args file";

//Verbosity
const VERBOSITY_QUIET: &str = "Quiet";
const VERBOSITY_VERBOSE: &str = "Verbose";

const DISPLAY_ORDERING: [&str; 19] = [
    //
    // file locations
    OUT_DIR,
    FRAMES_DIR,
    QUERY,
    HASHERS,
    //
    //partitioning
    BUCKETS,
    BUCKET,
    THREADS,
    //
    //index
    NUM_TREES,
    SEED,
    //
    //search
    SEARCH_K,
    TOPK,
    NEIGHBOURS,
    LENIENCY,
    BIN_WIDTH,
    TIMEOUT,
    //
    //verbosity
    VERBOSITY_QUIET,
    VERBOSITY_VERBOSE,
    NO_LOG_FILE,
    //argument replacement
    ARGS_FILE,
];

fn get_ordering(arg_name: &str) -> usize {
    match DISPLAY_ORDERING.iter().position(|x| *x == arg_name) {
        Some(idx) => idx,
        None => {
            panic!("argument not assigned a display order: {arg_name:?}");
        }
    }
}

fn hasher_names() -> Vec<&'static str> {
    std::iter::once("all")
        .chain(HasherKind::ALL.iter().map(|kind| kind.name()))
        .collect()
}

fn build_app() -> clap::Command {
    //args are not added through method chaining because rustfmt struggles with very long expressions.
    let mut clap_app = clap::Command::new("Video copy finder")
        .version(clap::crate_version!())
        .about("Find the reference videos that query clips were copied from, and where in each reference the clip starts")
        .arg_required_else_help(true);

    clap_app = clap_app.arg(
        clap::Arg::new(OUT_DIR)
            .long("out")
            .short('o')
            .global(true)
            .value_parser(value_parser!(PathBuf))
            .help("Directory holding the fingerprints, indexes, search results and logs")
            .display_order(get_ordering(OUT_DIR)),
    );

    clap_app = clap_app.arg(
        clap::Arg::new(HASHERS)
            .long("hash")
            .global(true)
            .num_args(1..)
            .value_delimiter(',')
            .value_parser(hasher_names())
            .action(Append)
            .help("Hashers to use, or 'all'. Multiple hashers may be comma separated")
            .display_order(get_ordering(HASHERS)),
    );

    clap_app = clap_app.arg(
        clap::Arg::new(BUCKETS)
            .long("buckets")
            .short('B')
            .global(true)
            .value_parser(value_parser!(usize))
            .help("Split the work between this many processes. Default: 1")
            .display_order(get_ordering(BUCKETS)),
    );

    clap_app = clap_app.arg(
        clap::Arg::new(BUCKET)
            .long("bucket")
            .short('b')
            .global(true)
            .value_parser(value_parser!(usize))
            .help("Which share of the work this process performs, counting from 0. Default: 0")
            .display_order(get_ordering(BUCKET)),
    );

    clap_app = clap_app.arg(
        clap::Arg::new(THREADS)
            .long("threads")
            .global(true)
            .value_parser(value_parser!(usize))
            .help("Number of worker threads. Default: the number of cpus divided by the number of buckets")
            .display_order(get_ordering(THREADS)),
    );

    clap_app = clap_app.arg(
        clap::Arg::new(ARGS_FILE)
            .long("args-file")
            .value_parser(value_parser!(PathBuf))
            .help("Read arguments from a file instead of the command line. Lines starting with '#' are ignored")
            .display_order(get_ordering(ARGS_FILE)),
    );

    clap_app = clap_app.arg(
        clap::Arg::new(NO_LOG_FILE)
            .long("no-log-file")
            .global(true)
            .help("Do not write a log file into the output directory")
            .action(SetTrue)
            .display_order(get_ordering(NO_LOG_FILE)),
    );

    clap_app = clap_app.arg(
        clap::Arg::new(VERBOSITY_QUIET)
            .long("quiet")
            .global(true)
            .help("Reduced verbosity")
            .conflicts_with(VERBOSITY_VERBOSE)
            .action(SetTrue)
            .display_order(get_ordering(VERBOSITY_QUIET)),
    );

    clap_app = clap_app.arg(
        clap::Arg::new(VERBOSITY_VERBOSE)
            .long("verbose")
            .global(true)
            .help("Increased verbosity")
            .conflicts_with(VERBOSITY_QUIET)
            .action(SetTrue)
            .display_order(get_ordering(VERBOSITY_VERBOSE)),
    );

    clap_app
        .subcommand(build_hash_cmd())
        .subcommand(build_index_cmd())
        .subcommand(build_search_cmd())
}

fn build_hash_cmd() -> clap::Command {
    let mut cmd = clap::Command::new(HASH_CMD)
        .about("Fingerprint videos from directories of extracted frames, laid out as <frames>/<video>/<timecode>.<ext>");

    cmd = cmd.arg(
        clap::Arg::new(FRAMES_DIR)
            .long("frames")
            .short('i')
            .required(true)
            .value_parser(value_parser!(PathBuf))
            .help("Directory containing one subdirectory of frames per video")
            .display_order(get_ordering(FRAMES_DIR)),
    );

    cmd = cmd.arg(
        clap::Arg::new(QUERY)
            .long("query")
            .help("The videos are queries. Their fingerprints are written to <out>/query_hashes instead of <out>/hashes")
            .action(SetTrue)
            .display_order(get_ordering(QUERY)),
    );

    cmd
}

fn build_index_cmd() -> clap::Command {
    let mut cmd = clap::Command::new(BUILD_INDEX_CMD)
        .about("Build a nearest neighbour index over the reference fingerprints of each hasher");

    cmd = cmd.arg(
        clap::Arg::new(NUM_TREES)
            .long("trees")
            .value_parser(value_parser!(usize))
            .help(format!(
                "Number of random projection trees. Default: {DEFAULT_NUM_TREES}"
            ))
            .display_order(get_ordering(NUM_TREES)),
    );

    cmd = cmd.arg(
        clap::Arg::new(SEED)
            .long("seed")
            .value_parser(value_parser!(u64))
            .help(format!("Seed for tree construction. Default: {DEFAULT_INDEX_SEED}"))
            .display_order(get_ordering(SEED)),
    );

    cmd
}

fn build_search_cmd() -> clap::Command {
    let mut cmd = clap::Command::new(SEARCH_CMD)
        .about("Search the query fingerprints against the indexes, writing results to <out>/temporal");

    cmd = cmd.arg(
        clap::Arg::new(SEARCH_K)
            .long("search-k")
            .value_parser(value_parser!(usize))
            .help("Number of index items inspected per query frame. Default: unrestricted")
            .display_order(get_ordering(SEARCH_K)),
    );

    cmd = cmd.arg(
        clap::Arg::new(TOPK)
            .long("topk")
            .value_parser(value_parser!(usize))
            .help(format!("Number of matches kept per query. Default: {DEFAULT_TOPK}"))
            .display_order(get_ordering(TOPK)),
    );

    cmd = cmd.arg(
        clap::Arg::new(NEIGHBOURS)
            .long("neighbours")
            .value_parser(value_parser!(usize))
            .help(format!(
                "Nearest neighbours fetched per query frame. Default: {DEFAULT_NEIGHBOURS_PER_FRAME}"
            ))
            .display_order(get_ordering(NEIGHBOURS)),
    );

    cmd = cmd.arg(
        clap::Arg::new(LENIENCY)
            .long("leniency")
            .value_parser(value_parser!(f64))
            .help(format!(
                "Seconds that a query may start before its reference. Default: {DEFAULT_OFFSET_LENIENCY}"
            ))
            .display_order(get_ordering(LENIENCY)),
    );

    cmd = cmd.arg(
        clap::Arg::new(BIN_WIDTH)
            .long("bin-width")
            .value_parser(value_parser!(f64))
            .help(format!(
                "Width of the offset histogram bins, in seconds. Default: {DEFAULT_BIN_WIDTH}"
            ))
            .display_order(get_ordering(BIN_WIDTH)),
    );

    cmd = cmd.arg(
        clap::Arg::new(TIMEOUT)
            .long("timeout")
            .value_parser(value_parser!(f64))
            .help("Stop looking up the frames of a query after this many seconds, and rank the votes gathered so far")
            .display_order(get_ordering(TIMEOUT)),
    );

    cmd
}

pub fn parse_args() -> AppCfg {
    //Start by parsing the provided arguments from the commandline. If the --args-file
    //argument is provided, then we will ignore the true command line arguments and
    //take the arguments from the file instead.
    let args = get_args_from_cmdline_or_file();
    cfg_from_matches(&args).unwrap_or_else(|e| print_error_and_quit(e))
}

fn cfg_from_matches(args: &clap::ArgMatches) -> eyre::Result<AppCfg> {
    //capture the cwd once, to minimize the risk of working with two values if it is changed by the OS at runtime.
    let cwd = std::env::current_dir()?;

    let Some((cmd_name, cmd_args)) = args.subcommand() else {
        return Err(eyre::Report::msg("no subcommand given"));
    };

    //global args are propagated into the subcommand's matches.
    let out_dir = cmd_args
        .get_one::<PathBuf>(OUT_DIR)
        .map(|p| absolutify_path(&cwd, p))
        .ok_or_else(|| eyre::Report::msg("--out is required"))?;

    let hashers = parse_hashers(cmd_args)?;

    let bucket_cfg = BucketCfg {
        buckets: cmd_args.get_one::<usize>(BUCKETS).copied().unwrap_or(1),
        bucket: cmd_args.get_one::<usize>(BUCKET).copied().unwrap_or(0),
    };
    bucket_cfg.validate()?;

    let threads = match cmd_args.get_one::<usize>(THREADS) {
        Some(threads) => *threads,
        None => bucket_cfg.threads(
            std::thread::available_parallelism()
                .map(usize::from)
                .unwrap_or(1),
        ),
    };

    let command = match cmd_name {
        HASH_CMD => Command::Hash {
            frames_dir: cmd_args
                .get_one::<PathBuf>(FRAMES_DIR)
                .map(|p| absolutify_path(&cwd, p))
                .ok_or_else(|| eyre::Report::msg("--frames is required"))?,
            query: cmd_args.get_flag(QUERY),
        },

        BUILD_INDEX_CMD => {
            let defaults = IndexCfg::default();
            Command::BuildIndex {
                index_cfg: IndexCfg {
                    num_trees: *cmd_args
                        .get_one::<usize>(NUM_TREES)
                        .unwrap_or(&defaults.num_trees),
                    seed: *cmd_args.get_one::<u64>(SEED).unwrap_or(&defaults.seed),
                    threads,
                    ..defaults
                },
            }
        }

        SEARCH_CMD => {
            let timeout = cmd_args.get_one::<f64>(TIMEOUT).copied();
            if timeout.is_some_and(|t| !(t.is_finite() && t >= 0.0)) {
                return Err(eyre::Report::msg("--timeout must be a non-negative number of seconds"));
            }

            let defaults = SearchCfg::default();
            Command::Search {
                search_cfg: SearchCfg {
                    neighbours_per_frame: *cmd_args
                        .get_one::<usize>(NEIGHBOURS)
                        .unwrap_or(&defaults.neighbours_per_frame),
                    topk: *cmd_args.get_one::<usize>(TOPK).unwrap_or(&defaults.topk),
                    offset_leniency: *cmd_args
                        .get_one::<f64>(LENIENCY)
                        .unwrap_or(&defaults.offset_leniency),
                    bin_width: *cmd_args
                        .get_one::<f64>(BIN_WIDTH)
                        .unwrap_or(&defaults.bin_width),
                },
                search_k: cmd_args.get_one::<usize>(SEARCH_K).copied(),
                timeout,
            }
        }

        other => return Err(eyre::Report::msg(format!("unknown subcommand: {other}"))),
    };

    let verbosity = if cmd_args.get_flag(VERBOSITY_QUIET) {
        ReportVerbosity::Quiet
    } else if cmd_args.get_flag(VERBOSITY_VERBOSE) {
        ReportVerbosity::Verbose
    } else {
        ReportVerbosity::Default
    };

    let ret = AppCfg {
        command,
        out_dir,
        hashers,
        bucket_cfg,
        verbosity,
        log_to_file: !cmd_args.get_flag(NO_LOG_FILE),
        threads,
    };

    Ok(ret)
}

// With no --hash argument, every hasher is used.
fn parse_hashers(args: &clap::ArgMatches) -> eyre::Result<Vec<HasherKind>> {
    let names = match args.get_many::<String>(HASHERS) {
        Some(names) => names.map(String::as_str).collect::<Vec<_>>(),
        None => vec!["all"],
    };

    if names.contains(&"all") {
        return Ok(HasherKind::ALL.to_vec());
    }

    let mut kinds = names
        .into_iter()
        .map(str::parse::<HasherKind>)
        .collect::<Result<Vec<_>, _>>()?;
    kinds.sort();
    kinds.dedup();
    Ok(kinds)
}

// Arguments are always first read from the command line, but if --args-file
// is present, then arguments are actually located in a file on disk.
// This fn obtains the args from the correct location.
fn get_args_from_cmdline_or_file() -> clap::ArgMatches {
    let cmdline_args = build_app().get_matches();

    match cmdline_args.get_one::<PathBuf>(ARGS_FILE) {
        None => cmdline_args,
        Some(args_path) => get_argsfile_args(args_path),
    }
}

fn get_argsfile_args(argsfile_path: &Path) -> clap::ArgMatches {
    let args = std::fs::read_to_string(argsfile_path)
        .map_err(eyre::Report::msg)
        .and_then(|text| split_args_file(&text))
        .map_err(|e| {
            e.wrap_err(format!(
                "Failed to parse args file at location {}",
                argsfile_path.to_string_lossy()
            ))
        })
        .unwrap_or_else(|e| print_error_and_quit(e));

    //When parsing args from file, the binary name will not be present,
    // so update the parser that we use to not expect it.
    let matches = build_app().no_binary_name(true).get_matches_from(args);
    matches
}

//the arguments file needs to be split into args in the same way as the shell would do it,
//after dropping comment lines.
fn split_args_file(text: &str) -> eyre::Result<Vec<String>> {
    let contents = text
        .lines()
        .filter(|line| !line.trim_start().starts_with('#'))
        .collect::<Vec<_>>()
        .join("\n");

    shell_words::split(&contents).map_err(eyre::Report::msg)
}

fn absolutify_path(cwd: &Path, path: &Path) -> PathBuf {
    //get the absolute path if it is not absolute, by prepending the cwd.
    let path = if path.is_relative() {
        cwd.join(path)
    } else {
        path.to_path_buf()
    };

    //now try canonicalizing the path. If that fails then silently ignore the failure and carry on
    let p = path.canonicalize().unwrap_or(path);

    p
}
