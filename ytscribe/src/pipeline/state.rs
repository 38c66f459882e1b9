// pipeline/state.rs
//
// Linear run state: Idle -> Resolving -> Fetching -> Transcoding -> Decoding
// -> Inferring -> Completed, with Failed reachable from any non-terminal stage.

use std::fmt;
use std::time::{Duration, Instant};

use crate::error::{ErrorKind, PipelineError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Idle,
    Resolving,
    Fetching,
    Transcoding,
    Decoding,
    Inferring,
    Completed,
    Failed(ErrorKind),
}

impl PipelineStage {
    /// The stage that follows on success, `None` for terminal stages.
    pub fn successor(self) -> Option<Self> {
        match self {
            Self::Idle => Some(Self::Resolving),
            Self::Resolving => Some(Self::Fetching),
            Self::Fetching => Some(Self::Transcoding),
            Self::Transcoding => Some(Self::Decoding),
            Self::Decoding => Some(Self::Inferring),
            Self::Inferring => Some(Self::Completed),
            Self::Completed | Self::Failed(_) => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        self.successor().is_none()
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Resolving => write!(f, "resolving"),
            Self::Fetching => write!(f, "fetching"),
            Self::Transcoding => write!(f, "transcoding"),
            Self::Decoding => write!(f, "decoding"),
            Self::Inferring => write!(f, "inferring"),
            Self::Completed => write!(f, "completed"),
            Self::Failed(kind) => write!(f, "failed ({:?})", kind),
        }
    }
}

/// Tracks and logs the stage of one run.
pub struct RunTracker {
    run_id: String,
    stage: PipelineStage,
    started: Instant,
}

impl RunTracker {
    pub fn new(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            stage: PipelineStage::Idle,
            started: Instant::now(),
        }
    }

    /// A tracker for a run whose earlier stages happened elsewhere; the first
    /// `advance` moves past `stage`.
    pub fn starting_at(run_id: impl Into<String>, stage: PipelineStage) -> Self {
        Self {
            stage,
            ..Self::new(run_id)
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn stage(&self) -> PipelineStage {
        self.stage
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Move to the next stage. Skipping or leaving a terminal stage is a bug.
    pub fn advance(&mut self) -> PipelineStage {
        let next = self.stage.successor();
        debug_assert!(next.is_some(), "advance from terminal stage {}", self.stage);
        if let Some(next) = next {
            log::debug!("[{}] {} -> {}", self.run_id, self.stage, next);
            self.stage = next;
        }
        self.stage
    }

    pub fn fail(&mut self, error: &PipelineError) {
        log::error!(
            "[{}] failed while {} after {:.1}s: {}",
            self.run_id,
            self.stage,
            self.elapsed().as_secs_f64(),
            error
        );
        self.stage = PipelineStage::Failed(error.kind());
    }
}
