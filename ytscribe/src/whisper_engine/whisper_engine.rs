// whisper_engine/whisper_engine.rs
//
// whisper.cpp backend for the transcription seam.

use std::path::Path;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use whisper_rs::{
    FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters, WhisperState,
};

use crate::transcription::{EngineError, Segment, Segments, SpeechContext, SpeechEngine};

/// Keep whisper.cpp and Metal from flooding stderr. Mutates the process
/// environment, so call it from `main` before any runtime threads exist.
pub fn quiet_native_logs() {
    std::env::set_var("GGML_METAL_LOG_LEVEL", "1"); // 0=off, 1=error, 2=warn, 3=info
    std::env::set_var("WHISPER_LOG_LEVEL", "1");
}

pub struct WhisperEngine {
    use_gpu: bool,
    n_threads: i32,
}

impl WhisperEngine {
    /// Detect available GPU acceleration capabilities
    fn detect_gpu_acceleration() -> bool {
        // On macOS, prefer Metal GPU acceleration
        if cfg!(target_os = "macos") {
            log::info!("macOS detected - attempting to enable Metal GPU acceleration");
            return true; // whisper-rs falls back to CPU if Metal is unavailable
        }

        if cfg!(feature = "cuda") {
            log::info!("CUDA feature enabled - attempting GPU acceleration");
            return true;
        }

        if cfg!(feature = "vulkan") {
            log::info!("Vulkan feature enabled - attempting GPU acceleration");
            return true;
        }

        if cfg!(feature = "hipblas") {
            log::info!("HIPBLAS feature enabled - attempting GPU acceleration");
            return true;
        }

        log::info!("No GPU acceleration features detected - using CPU processing");
        false
    }

    pub fn new() -> Self {
        let use_gpu = Self::detect_gpu_acceleration();
        log::info!(
            "Hardware acceleration support: {}",
            if use_gpu { "enabled" } else { "disabled" }
        );

        #[cfg(feature = "coreml")]
        log::info!("Apple CoreML support: enabled");

        #[cfg(feature = "openblas")]
        log::info!("OpenBLAS CPU optimization: enabled");

        #[cfg(feature = "openmp")]
        log::info!("OpenMP parallel processing: enabled");

        let n_threads = std::thread::available_parallelism()
            .map(|n| n.get().min(8))
            .unwrap_or(4) as i32;

        Self { use_gpu, n_threads }
    }

    /// Whether whisper.cpp knows `language` as a language code or name.
    pub fn is_supported_language(language: &str) -> bool {
        !language.contains('\0') && whisper_rs::get_lang_id(language).is_some()
    }
}

impl Default for WhisperEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl SpeechEngine for WhisperEngine {
    fn load(&self, model_path: &Path) -> Result<Box<dyn SpeechContext>, EngineError> {
        log::info!("Loading whisper model: {}", model_path.display());

        let params = WhisperContextParameters {
            use_gpu: self.use_gpu,
            ..Default::default()
        };

        let context = WhisperContext::new_with_params(&model_path.to_string_lossy(), params)
            .map_err(|e| EngineError::Load {
                path: model_path.to_path_buf(),
                message: e.to_string(),
            })?;

        log::info!("Successfully loaded model: {}", model_path.display());
        Ok(Box::new(WhisperSession {
            state: None,
            context,
            language: None,
            n_threads: self.n_threads,
        }))
    }

    fn engine_name(&self) -> &'static str {
        "Whisper"
    }
}

struct WhisperSession {
    state: Option<WhisperState>,
    context: WhisperContext,
    language: Option<String>,
    n_threads: i32,
}

impl SpeechContext for WhisperSession {
    fn set_language(&mut self, language: &str) -> Result<(), EngineError> {
        if !WhisperEngine::is_supported_language(language) {
            return Err(EngineError::UnsupportedLanguage(language.to_string()));
        }
        self.language = Some(language.to_string());
        Ok(())
    }

    fn process(
        &mut self,
        samples: &[f32],
        cancel: &CancellationToken,
    ) -> Result<Segments<'_>, EngineError> {
        let mut state = self
            .context
            .create_state()
            .map_err(|e| EngineError::Process(e.to_string()))?;

        let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });
        // None lets whisper detect the language itself
        params.set_language(self.language.as_deref());
        params.set_n_threads(self.n_threads);
        params.set_translate(false);
        params.set_print_special(false);
        params.set_print_progress(false);
        params.set_print_realtime(false);
        params.set_print_timestamps(false);
        params.set_suppress_blank(true);

        // Polled by whisper.cpp between decoder steps; true stops the run.
        let abort = cancel.clone();
        params.set_abort_callback_safe(move || abort.is_cancelled());

        if let Err(e) = state.full(params, samples) {
            if cancel.is_cancelled() {
                log::info!("Whisper inference aborted");
                return Err(EngineError::Aborted);
            }
            return Err(EngineError::Process(e.to_string()));
        }

        let count = state
            .full_n_segments()
            .map_err(|e| EngineError::Process(e.to_string()))?;

        let state = self.state.insert(state);
        Ok(Box::new(WhisperSegments {
            state,
            next: 0,
            count,
        }))
    }
}

/// Walks the segments of a finished `full` run, one FFI read per item.
struct WhisperSegments<'a> {
    state: &'a WhisperState,
    next: i32,
    count: i32,
}

impl WhisperSegments<'_> {
    fn read(&self, index: i32) -> Result<Segment, EngineError> {
        let text = self
            .state
            .full_get_segment_text_lossy(index)
            .map_err(|e| EngineError::Segment {
                index: index as usize,
                message: e.to_string(),
            })?;

        // Timestamps are in centiseconds
        let t0 = self.state.full_get_segment_t0(index).unwrap_or(0).max(0);
        let t1 = self.state.full_get_segment_t1(index).unwrap_or(0).max(0);

        Ok(Segment {
            text,
            start: Duration::from_millis(t0 as u64 * 10),
            end: Duration::from_millis(t1 as u64 * 10),
        })
    }
}

impl Iterator for WhisperSegments<'_> {
    type Item = Result<Segment, EngineError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.count {
            return None;
        }
        let index = self.next;
        self.next += 1;
        Some(self.read(index))
    }
}
