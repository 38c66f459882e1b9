// transcription/mod.rs
//
// Inference adapter: model check, engine setup, one-shot inference and the
// segment drain that assembles the transcript.

pub mod provider;

use std::path::Path;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::audio::SampleBuffer;
use crate::error::PipelineError;
use crate::perf_trace;
use crate::pipeline::PipelineStage;

pub use provider::{EngineError, Segment, Segments, SpeechContext, SpeechEngine};

/// Transcribe `samples` with the model at `model_path`.
///
/// Inference runs on the blocking pool. On cancellation this returns
/// immediately; the engine sees the same token and aborts its run, and the
/// drain stops at the next segment boundary.
pub async fn transcribe_samples(
    engine: Arc<dyn SpeechEngine>,
    model_path: &Path,
    language: Option<&str>,
    samples: SampleBuffer,
    cancel: &CancellationToken,
) -> Result<String, PipelineError> {
    if !model_path.exists() {
        return Err(PipelineError::ModelNotFound {
            path: model_path.to_path_buf(),
        });
    }
    if cancel.is_cancelled() {
        return Err(PipelineError::cancelled(PipelineStage::Inferring));
    }

    log::info!(
        "Starting {} transcription of {} samples ({:.1}s duration)",
        engine.engine_name(),
        samples.len(),
        samples.duration().as_secs_f64()
    );

    let model_path = model_path.to_path_buf();
    let language = language.map(str::to_owned);
    let task_cancel = cancel.clone();
    let task = tokio::task::spawn_blocking(move || {
        run_inference(
            engine.as_ref(),
            &model_path,
            language.as_deref(),
            &samples,
            &task_cancel,
        )
    });

    tokio::select! {
        joined = task => match joined {
            Ok(result) => result,
            Err(e) => Err(PipelineError::inference("inference task failed", e)),
        },
        _ = cancel.cancelled() => {
            log::warn!("Transcription cancelled, abandoning inference task");
            Err(PipelineError::cancelled(PipelineStage::Inferring))
        }
    }
}

fn run_inference(
    engine: &dyn SpeechEngine,
    model_path: &Path,
    language: Option<&str>,
    samples: &SampleBuffer,
    cancel: &CancellationToken,
) -> Result<String, PipelineError> {
    let mut context = engine
        .load(model_path)
        .map_err(|e| PipelineError::inference("failed to load whisper model", e))?;

    if let Some(language) = language.filter(|l| !l.is_empty()) {
        context
            .set_language(language)
            .map_err(|e| PipelineError::inference("failed to set language", e))?;
    }

    let segments = context
        .process(samples.as_slice(), cancel)
        .map_err(|e| match e {
            EngineError::Aborted => PipelineError::cancelled(PipelineStage::Inferring),
            e => PipelineError::inference("failed to process audio", e),
        })?;

    collect_transcript(segments, cancel)
}

/// Drain `segments` to the end, joining texts with newlines. Nothing partial
/// is returned: the first error discards everything drained so far.
pub fn collect_transcript(
    segments: impl Iterator<Item = Result<Segment, EngineError>>,
    cancel: &CancellationToken,
) -> Result<String, PipelineError> {
    let mut text = String::new();
    let mut count = 0usize;

    for segment in segments {
        if cancel.is_cancelled() {
            return Err(PipelineError::cancelled(PipelineStage::Inferring));
        }
        let segment = segment.map_err(|e| PipelineError::inference("failed to get segment", e))?;

        perf_trace!(
            "Segment {} ({:.2}s-{:.2}s): '{}'",
            count,
            segment.start.as_secs_f64(),
            segment.end.as_secs_f64(),
            segment.text
        );

        text.push_str(&segment.text);
        text.push('\n');
        count += 1;
    }

    log::info!("Transcription completed with {} segments", count);
    Ok(text.trim().to_string())
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    /// What the pipeline asked of a [`ScriptedEngine`].
    #[derive(Default)]
    pub struct EngineCalls {
        pub loads: AtomicUsize,
        pub processed: AtomicBool,
        pub processed_samples: AtomicUsize,
        /// Set once a held run saw the token fire and gave up.
        pub aborted: AtomicBool,
    }

    /// Replays fixed segment texts, optionally failing at one index.
    ///
    /// With `hold_until_cancelled` set, `process` behaves like a long native
    /// inference call that only returns once the token fires.
    #[derive(Default)]
    pub struct ScriptedEngine {
        pub texts: Vec<&'static str>,
        pub fail_at: Option<usize>,
        pub supported_languages: Vec<&'static str>,
        pub hold_until_cancelled: bool,
        pub calls: Arc<EngineCalls>,
    }

    impl ScriptedEngine {
        pub fn with_texts(texts: &[&'static str]) -> Self {
            Self {
                texts: texts.to_vec(),
                supported_languages: vec!["en", "de"],
                ..Default::default()
            }
        }
    }

    struct ScriptedContext {
        texts: Vec<&'static str>,
        fail_at: Option<usize>,
        supported_languages: Vec<&'static str>,
        hold_until_cancelled: bool,
        calls: Arc<EngineCalls>,
    }

    const HOLD_LIMIT: Duration = Duration::from_secs(30);

    impl SpeechEngine for ScriptedEngine {
        fn load(&self, _model_path: &Path) -> Result<Box<dyn SpeechContext>, EngineError> {
            self.calls.loads.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(ScriptedContext {
                texts: self.texts.clone(),
                fail_at: self.fail_at,
                supported_languages: self.supported_languages.clone(),
                hold_until_cancelled: self.hold_until_cancelled,
                calls: self.calls.clone(),
            }))
        }

        fn engine_name(&self) -> &'static str {
            "Scripted"
        }
    }

    impl SpeechContext for ScriptedContext {
        fn set_language(&mut self, language: &str) -> Result<(), EngineError> {
            if self.supported_languages.contains(&language) {
                Ok(())
            } else {
                Err(EngineError::UnsupportedLanguage(language.to_string()))
            }
        }

        fn process(
            &mut self,
            samples: &[f32],
            cancel: &CancellationToken,
        ) -> Result<Segments<'_>, EngineError> {
            self.calls.processed.store(true, Ordering::SeqCst);
            self.calls
                .processed_samples
                .store(samples.len(), Ordering::SeqCst);

            if self.hold_until_cancelled {
                let started = std::time::Instant::now();
                while !cancel.is_cancelled() {
                    if started.elapsed() > HOLD_LIMIT {
                        return Err(EngineError::Process("never cancelled".to_string()));
                    }
                    std::thread::sleep(Duration::from_millis(5));
                }
                self.calls.aborted.store(true, Ordering::SeqCst);
                return Err(EngineError::Aborted);
            }

            let fail_at = self.fail_at;
            Ok(Box::new(self.texts.iter().enumerate().map(move |(i, text)| {
                if Some(i) == fail_at {
                    return Err(EngineError::Segment {
                        index: i,
                        message: "decoder state lost".to_string(),
                    });
                }
                Ok(Segment {
                    text: text.to_string(),
                    start: Duration::from_secs(i as u64),
                    end: Duration::from_secs(i as u64 + 1),
                })
            })))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::ScriptedEngine;
    use super::*;
    use crate::audio::wav::{decode_wav, write_canonical_header};
    use crate::error::ErrorKind;
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    fn silence(samples: usize) -> SampleBuffer {
        let mut bytes = write_canonical_header((samples * 2) as u32).to_vec();
        bytes.resize(bytes.len() + samples * 2, 0);
        decode_wav(&bytes).unwrap()
    }

    fn model_file() -> tempfile::NamedTempFile {
        tempfile::NamedTempFile::new().unwrap()
    }

    #[test]
    fn test_collect_joins_with_newlines_and_trims() {
        let segments = vec![
            Ok(Segment {
                text: " Hello there.".to_string(),
                start: Duration::ZERO,
                end: Duration::from_secs(1),
            }),
            Ok(Segment {
                text: " General Kenobi. ".to_string(),
                start: Duration::from_secs(1),
                end: Duration::from_secs(2),
            }),
        ];
        let text = collect_transcript(segments.into_iter(), &CancellationToken::new()).unwrap();
        assert_eq!(text, "Hello there.\n General Kenobi.");
    }

    #[test]
    fn test_zero_segments_is_empty_transcript() {
        let text = collect_transcript(std::iter::empty(), &CancellationToken::new()).unwrap();
        assert_eq!(text, "");
    }

    #[tokio::test]
    async fn test_missing_model_skips_inference() {
        let engine = Arc::new(ScriptedEngine::with_texts(&["unused"]));
        let err = transcribe_samples(
            engine.clone(),
            Path::new("/nonexistent/ggml-base.bin"),
            None,
            silence(16),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::ModelNotFound);
        assert_eq!(engine.calls.loads.load(Ordering::SeqCst), 0);
        assert!(!engine.calls.processed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_transcribes_full_buffer() {
        let model = model_file();
        let engine = Arc::new(ScriptedEngine::with_texts(&[" One.", " Two."]));

        let text = transcribe_samples(
            engine.clone(),
            model.path(),
            Some("en"),
            silence(32_000),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(text, "One.\n Two.");
        assert_eq!(engine.calls.processed_samples.load(Ordering::SeqCst), 32_000);
    }

    #[tokio::test]
    async fn test_rejected_language_is_inference_failure() {
        let model = model_file();
        let engine = Arc::new(ScriptedEngine::with_texts(&["Hallo"]));

        let err = transcribe_samples(
            engine.clone(),
            model.path(),
            Some("tlh"),
            silence(16),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InferenceFailed);
        assert!(!engine.calls.processed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_mid_drain_error_discards_partial_text() {
        let model = model_file();
        let mut engine = ScriptedEngine::with_texts(&["first", "second", "third"]);
        engine.fail_at = Some(1);

        let err = transcribe_samples(
            Arc::new(engine),
            model.path(),
            None,
            silence(16),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InferenceFailed);
        assert!(!err.to_string().contains("first"));
    }

    #[tokio::test]
    async fn test_cancelled_before_inference() {
        let model = model_file();
        let engine = Arc::new(ScriptedEngine::with_texts(&["unused"]));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = transcribe_samples(engine.clone(), model.path(), None, silence(16), &cancel)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Cancelled);
        assert_eq!(engine.calls.loads.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_cancel_during_inference_aborts_engine() {
        let model = model_file();
        let engine = Arc::new(ScriptedEngine {
            hold_until_cancelled: true,
            ..ScriptedEngine::with_texts(&["unused"])
        });
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            trigger.cancel();
        });

        let err = transcribe_samples(engine.clone(), model.path(), None, silence(16), &cancel)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Cancelled);

        // The blocking task must wind down on its own, not run to completion.
        let deadline = std::time::Instant::now() + Duration::from_secs(2);
        while !engine.calls.aborted.load(Ordering::SeqCst) {
            assert!(std::time::Instant::now() < deadline, "engine kept running");
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    #[test]
    fn test_runtime_drop_is_prompt_after_cancelled_inference() {
        let model = model_file();
        let engine = Arc::new(ScriptedEngine {
            hold_until_cancelled: true,
            ..ScriptedEngine::with_texts(&["unused"])
        });
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .unwrap();
        let started = std::time::Instant::now();

        let cancel = CancellationToken::new();
        let result = runtime.block_on(async {
            let trigger = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(100)).await;
                trigger.cancel();
            });
            transcribe_samples(engine.clone(), model.path(), None, silence(16), &cancel).await
        });
        drop(runtime);

        assert_eq!(result.unwrap_err().kind(), ErrorKind::Cancelled);
        assert!(started.elapsed() < Duration::from_secs(2));
        assert!(engine.calls.aborted.load(Ordering::SeqCst));
    }
}
