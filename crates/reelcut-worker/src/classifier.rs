//! Frame classification with failure-safe defaults.

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use futures::FutureExt;
use tracing::{info, warn};

use reelcut_models::{ActionMap, ErrorEvent, Frame, FrameAnalysis, ProcessingStage};

use crate::config::AnalyzerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::events::EventSink;
use crate::gemini::GeminiClassifier;

/// Backend that turns one JPEG image into a classification.
#[async_trait]
pub trait FrameClassificationService: Send + Sync {
    async fn classify(&self, image: &[u8], frame_ordinal: u32) -> WorkerResult<FrameAnalysis>;
}

/// Classifies sampled frames in bounded batches.
///
/// Shared across jobs; holds no per-job state.
#[derive(Clone)]
pub struct FrameClassifier {
    service: Arc<dyn FrameClassificationService>,
    parallel_frames: usize,
    confidence_threshold: f64,
}

impl FrameClassifier {
    /// Validates `config` before accepting the service.
    pub fn new(
        config: &AnalyzerConfig,
        service: Arc<dyn FrameClassificationService>,
        parallel_frames: usize,
    ) -> WorkerResult<Self> {
        config.validate()?;
        Ok(Self {
            service,
            parallel_frames: parallel_frames.max(1),
            confidence_threshold: config.confidence_threshold,
        })
    }

    /// Classifier backed by Gemini.
    pub fn from_config(config: &AnalyzerConfig, parallel_frames: usize) -> WorkerResult<Self> {
        let service = GeminiClassifier::new(config)?;
        info!(model = service.model(), parallel_frames, "Frame classifier ready");
        Self::new(config, Arc::new(service), parallel_frames)
    }

    pub fn confidence_threshold(&self) -> f64 {
        self.confidence_threshold
    }

    pub fn parallel_frames(&self) -> usize {
        self.parallel_frames
    }

    /// Classify one image. Never fails: any error yields the keep fallback.
    pub async fn classify_frame(
        &self,
        image: &[u8],
        frame_ordinal: u32,
        events: &EventSink,
    ) -> FrameAnalysis {
        let result = AssertUnwindSafe(self.service.classify(image, frame_ordinal))
            .catch_unwind()
            .await
            .unwrap_or_else(|_| {
                Err(WorkerError::classification_failed(
                    "Classification service panicked",
                ))
            });

        match result {
            Ok(analysis) => analysis,
            Err(e) => fallback(frame_ordinal, &e, events),
        }
    }

    /// Classify `frames` in chunks of `parallel_frames`.
    ///
    /// Each chunk is awaited in full before the next starts. Progress is
    /// published after every finished frame.
    pub async fn classify_frames(&self, frames: &[Frame], events: &EventSink) -> ActionMap {
        let total = frames.len();
        let processed = AtomicUsize::new(0);
        let mut map = ActionMap::new();

        for chunk in frames.chunks(self.parallel_frames) {
            let processed = &processed;
            let results = join_all(chunk.iter().map(|frame| async move {
                let analysis = match tokio::fs::read(&frame.path).await {
                    Ok(image) => self.classify_frame(&image, frame.ordinal, events).await,
                    Err(e) => {
                        let err = WorkerError::classification_failed(format!(
                            "Failed to read frame {}: {}",
                            frame.path.display(),
                            e
                        ));
                        fallback(frame.ordinal, &err, events)
                    }
                };

                let done = processed.fetch_add(1, Ordering::SeqCst) + 1;
                events.stage(ProcessingStage::AnalyzingFrames {
                    processed: done,
                    total,
                    percentage: done as f64 / total as f64 * 100.0,
                });

                (frame.timestamp_ms, analysis)
            }))
            .await;

            for (timestamp_ms, analysis) in results {
                if let Err(e) = map.insert(timestamp_ms, analysis) {
                    warn!(timestamp_ms, "Ignoring frame: {}", e);
                }
            }
        }

        map
    }
}

fn fallback(frame_ordinal: u32, err: &WorkerError, events: &EventSink) -> FrameAnalysis {
    warn!(
        frame = frame_ordinal,
        video = events.video().unwrap_or("-"),
        "Classification failed, keeping frame: {}",
        err
    );
    let mut details = err.details();
    details["frame_ordinal"] = frame_ordinal.into();
    events.error(
        ErrorEvent::new(format!("Frame {} classification failed: {}", frame_ordinal, err))
            .with_details(details),
    );
    FrameAnalysis::fallback(frame_ordinal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use mockall::mock;
    use reelcut_models::FrameAction;

    mock! {
        Service {}

        #[async_trait]
        impl FrameClassificationService for Service {
            async fn classify(&self, image: &[u8], frame_ordinal: u32) -> WorkerResult<FrameAnalysis>;
        }
    }

    /// Records the peak number of concurrent calls.
    struct SlowService {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl FrameClassificationService for SlowService {
        async fn classify(&self, _image: &[u8], frame_ordinal: u32) -> WorkerResult<FrameAnalysis> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(FrameAnalysis::new(FrameAction::SpeedUp, 0.9, None, frame_ordinal))
        }
    }

    struct PanickingService;

    #[async_trait]
    impl FrameClassificationService for PanickingService {
        async fn classify(&self, _image: &[u8], _frame_ordinal: u32) -> WorkerResult<FrameAnalysis> {
            panic!("backend bug");
        }
    }

    fn write_frames(dir: &std::path::Path, count: u32) -> Vec<Frame> {
        (1..=count)
            .map(|ordinal| {
                let path = dir.join(format!("frame_{:05}.jpg", ordinal));
                std::fs::write(&path, b"jpeg").unwrap();
                Frame::new(ordinal, 1000, path)
            })
            .collect()
    }

    #[tokio::test]
    async fn test_failure_falls_back_to_keep() {
        let mut service = MockService::new();
        service
            .expect_classify()
            .returning(|_, _| Err(WorkerError::classification_status(500, "Gemini API returned 500")));

        let classifier =
            FrameClassifier::new(&AnalyzerConfig::new("key"), Arc::new(service), 4).unwrap();
        let (sink, mut rx) = EventSink::channels();

        let analysis = classifier.classify_frame(b"jpeg", 7, &sink).await;

        assert_eq!(analysis, FrameAnalysis::fallback(7));
        let error = rx.errors.recv().await.unwrap();
        assert_eq!(error.details.unwrap()["frame_ordinal"], 7);
    }

    #[tokio::test]
    async fn test_panic_falls_back_to_keep() {
        let classifier =
            FrameClassifier::new(&AnalyzerConfig::new("key"), Arc::new(PanickingService), 1)
                .unwrap();

        let analysis = classifier.classify_frame(b"jpeg", 2, &EventSink::new()).await;
        assert_eq!(analysis.action(), FrameAction::Keep);
        assert_eq!(analysis.confidence(), 1.0);
    }

    #[tokio::test]
    async fn test_batches_are_bounded_and_progress_reaches_total() {
        let dir = tempfile::tempdir().unwrap();
        let frames = write_frames(dir.path(), 7);
        let service = Arc::new(SlowService {
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        });
        let classifier =
            FrameClassifier::new(&AnalyzerConfig::new("key"), service.clone(), 3).unwrap();
        let (sink, mut rx) = EventSink::channels();

        let map = classifier.classify_frames(&frames, &sink).await;

        assert_eq!(map.len(), 7);
        assert_eq!(map.timestamps().collect::<Vec<_>>(), vec![0, 1000, 2000, 3000, 4000, 5000, 6000]);
        assert!(service.peak.load(Ordering::SeqCst) <= 3);

        let mut last = None;
        while let Ok(event) = rx.processing.try_recv() {
            last = Some(event.stage);
        }
        match last {
            Some(ProcessingStage::AnalyzingFrames { processed, total, percentage }) => {
                assert_eq!(processed, 7);
                assert_eq!(total, 7);
                assert_eq!(percentage, 100.0);
            }
            other => panic!("unexpected final stage: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unreadable_frame_falls_back() {
        let mut service = MockService::new();
        service.expect_classify().never();
        let classifier =
            FrameClassifier::new(&AnalyzerConfig::new("key"), Arc::new(service), 2).unwrap();
        let frames = vec![Frame::new(1, 1000, "/nonexistent/frame_00001.jpg")];

        let map = classifier.classify_frames(&frames, &EventSink::new()).await;
        assert_eq!(map.get(0), Some(&FrameAnalysis::fallback(1)));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_keeps_key_out_of_error_events() {
        let mut config = AnalyzerConfig::new("secret-key-123");
        config.endpoint = Some("http://127.0.0.1:1".to_string());
        let classifier = FrameClassifier::from_config(&config, 1).unwrap();
        let (sink, mut rx) = EventSink::channels();

        let analysis = classifier.classify_frame(b"jpeg", 1, &sink).await;

        assert_eq!(analysis, FrameAnalysis::fallback(1));
        let error = rx.errors.recv().await.unwrap();
        assert!(error.message.contains("Gemini API request failed"));
        assert!(!error.message.contains("secret-key-123"));
        assert!(!error.details.unwrap().to_string().contains("secret-key-123"));
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let mut config = AnalyzerConfig::new("key");
        config.confidence_threshold = 2.0;
        let service = MockService::new();

        assert!(FrameClassifier::new(&config, Arc::new(service), 2).is_err());
    }
}
