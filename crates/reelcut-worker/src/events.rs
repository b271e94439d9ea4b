//! Event publishing for the processing, error and debug channels.

use std::sync::Arc;

use serde_json::json;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, error, info};

use reelcut_media::CommandHook;
use reelcut_models::{DebugEvent, ErrorEvent, ProcessingEvent, ProcessingStage};

/// Publisher over three optional, independently registered channels.
///
/// A channel without a registered handler falls back to `tracing`. Sending
/// never fails the caller: a dropped receiver only loses the event.
#[derive(Debug, Clone, Default)]
pub struct EventSink {
    processing: Option<UnboundedSender<ProcessingEvent>>,
    errors: Option<UnboundedSender<ErrorEvent>>,
    debug: Option<UnboundedSender<DebugEvent>>,
    video: Option<String>,
}

/// Receiving halves created by [`EventSink::channels`].
#[derive(Debug)]
pub struct EventReceivers {
    pub processing: UnboundedReceiver<ProcessingEvent>,
    pub errors: UnboundedReceiver<ErrorEvent>,
    pub debug: UnboundedReceiver<DebugEvent>,
}

impl EventSink {
    /// A sink with no registered channels.
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink with all three channels registered.
    pub fn channels() -> (Self, EventReceivers) {
        let (processing_tx, processing) = mpsc::unbounded_channel();
        let (errors_tx, errors) = mpsc::unbounded_channel();
        let (debug_tx, debug) = mpsc::unbounded_channel();

        let sink = Self::new()
            .with_processing(processing_tx)
            .with_errors(errors_tx)
            .with_debug(debug_tx);

        (
            sink,
            EventReceivers {
                processing,
                errors,
                debug,
            },
        )
    }

    pub fn with_processing(mut self, tx: UnboundedSender<ProcessingEvent>) -> Self {
        self.processing = Some(tx);
        self
    }

    pub fn with_errors(mut self, tx: UnboundedSender<ErrorEvent>) -> Self {
        self.errors = Some(tx);
        self
    }

    pub fn with_debug(mut self, tx: UnboundedSender<DebugEvent>) -> Self {
        self.debug = Some(tx);
        self
    }

    /// A clone whose events carry `video`.
    pub fn for_job(&self, video: impl Into<String>) -> Self {
        Self {
            video: Some(video.into()),
            ..self.clone()
        }
    }

    pub fn video(&self) -> Option<&str> {
        self.video.as_deref()
    }

    /// Announce a stage transition.
    pub fn stage(&self, stage: ProcessingStage) {
        let event = ProcessingEvent::new(self.video.clone().unwrap_or_default(), stage);
        match &self.processing {
            Some(tx) => {
                let _ = tx.send(event);
            }
            None => info!(
                video = %event.video,
                stage = event.stage.name(),
                "{}",
                serde_json::to_string(&event.stage).unwrap_or_default()
            ),
        }
    }

    /// Publish an error event.
    pub fn error(&self, mut event: ErrorEvent) {
        if event.video.is_none() {
            event.video = self.video.clone();
        }
        match &self.errors {
            Some(tx) => {
                let _ = tx.send(event);
            }
            None => error!(
                video = event.video.as_deref().unwrap_or("-"),
                details = ?event.details,
                "{}",
                event.message
            ),
        }
    }

    /// Publish a debug event.
    pub fn debug(&self, mut event: DebugEvent) {
        if event.video.is_none() {
            event.video = self.video.clone();
        }
        match &self.debug {
            Some(tx) => {
                let _ = tx.send(event);
            }
            None => debug!(
                video = event.video.as_deref().unwrap_or("-"),
                payload = ?event.payload,
                "{}",
                event.message
            ),
        }
    }

    /// Hook that reports each transcoder command line on the debug channel.
    pub fn command_hook(&self) -> CommandHook {
        let sink = self.clone();
        Arc::new(move |line: &str| {
            sink.debug(
                DebugEvent::new("Invoking transcoder").with_payload(json!({ "command": line })),
            );
        })
    }
}
