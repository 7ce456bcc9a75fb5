mod app_cfg;
mod app_fns;
mod arg_parse;
mod errors;
mod frame_dir;
mod search_output;

pub(crate) use app_cfg::*;
pub(crate) use errors::*;

use search_output::SearchOutput;

pub use app_fns::run_app;
