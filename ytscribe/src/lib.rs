// Conditional logging macros for hot paths
#[cfg(debug_assertions)]
macro_rules! perf_debug {
    ($($arg:tt)*) => {
        log::debug!($($arg)*)
    };
}

#[cfg(not(debug_assertions))]
macro_rules! perf_debug {
    ($($arg:tt)*) => {};
}

#[cfg(debug_assertions)]
macro_rules! perf_trace {
    ($($arg:tt)*) => {
        log::trace!($($arg)*)
    };
}

#[cfg(not(debug_assertions))]
macro_rules! perf_trace {
    ($($arg:tt)*) => {};
}

// Make these macros available to other modules
pub(crate) use perf_debug;
pub(crate) use perf_trace;

pub mod audio;
pub mod cli;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod source;
pub mod transcription;
pub mod utils;
pub mod whisper_engine;

pub use config::TranscribeConfig;
pub use error::{ErrorKind, PipelineError};
pub use pipeline::{PipelineStage, TranscriptionResult, TranscriptionService};

use std::future::Future;
use std::time::Duration;

/// How long blocking work left behind by a cancelled run may hold up exit.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

/// Run the command-line front-end to completion on a fresh tokio runtime.
pub fn run(cli: cli::Cli) -> anyhow::Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    block_on_then_shutdown(runtime, cli::execute(cli))
}

/// Drive `future` to completion, then shut the runtime down without waiting
/// more than [`SHUTDOWN_GRACE`] for outstanding blocking tasks.
fn block_on_then_shutdown<F: Future>(runtime: tokio::runtime::Runtime, future: F) -> F::Output {
    let output = runtime.block_on(future);
    runtime.shutdown_timeout(SHUTDOWN_GRACE);
    output
}
