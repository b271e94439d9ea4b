//! Batch video shortening binary.

use std::sync::Arc;

use anyhow::Context;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use reelcut_media::check_ffmpeg;
use reelcut_worker::{
    discover_videos, AnalyzerConfig, EventReceivers, EventSink, FfmpegTranscoder,
    FrameClassifier, JobScheduler, VideoProcessor, WorkerConfig,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing()?;

    info!("Starting reelcut");

    let config = WorkerConfig::from_env().context("Failed to load worker configuration")?;
    let analyzer = AnalyzerConfig::from_env().context("Failed to load analyzer configuration")?;
    info!("Worker config: {:?}", config);
    info!("Analyzer config: {:?}", analyzer);

    check_ffmpeg().context("ffmpeg must be installed and on PATH")?;

    let videos = discover_videos(&config.input_dir)
        .await
        .context("Failed to discover input videos")?;
    info!(count = videos.len(), input = %config.input_dir.display(), "Discovered videos");

    let classifier = Arc::new(
        FrameClassifier::from_config(&analyzer, config.parallel_frames)
            .context("Failed to initialize frame classifier")?,
    );

    let (events, receivers) = EventSink::channels();
    let presenters = spawn_presenters(receivers);

    let scheduler = JobScheduler::new(config.effective_jobs(), config.poll_interval, events.clone());
    let processor = VideoProcessor::new(
        config,
        classifier,
        Arc::new(FfmpegTranscoder::new()),
        events,
    );

    let report = scheduler
        .run(videos, |source| {
            let processor = processor.clone();
            async move { processor.process(&source).await }
        })
        .await;

    // Dropping the last senders lets the presenters drain and exit
    drop(scheduler);
    drop(processor);
    for presenter in presenters {
        presenter.await.ok();
    }

    info!(
        succeeded = report.succeeded.len(),
        failed = report.failed.len(),
        "Run complete"
    );
    for (source, message) in &report.failed {
        error!(source = %source.display(), "Failed: {}", message);
    }

    Ok(())
}

fn init_tracing() -> anyhow::Result<()> {
    // Colored output for dev, JSON for production
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env().add_directive("reelcut=info".parse()?);

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
    Ok(())
}

/// Render the three event channels through tracing.
fn spawn_presenters(receivers: EventReceivers) -> Vec<JoinHandle<()>> {
    let EventReceivers {
        mut processing,
        mut errors,
        debug: mut debug_rx,
    } = receivers;

    vec![
        tokio::spawn(async move {
            while let Some(event) = processing.recv().await {
                let payload = serde_json::to_string(&event.stage).unwrap_or_default();
                info!(video = %event.video, stage = event.stage.name(), "{}", payload);
            }
        }),
        tokio::spawn(async move {
            while let Some(event) = errors.recv().await {
                error!(
                    video = event.video.as_deref().unwrap_or("-"),
                    details = ?event.details,
                    "{}",
                    event.message
                );
            }
        }),
        tokio::spawn(async move {
            while let Some(event) = debug_rx.recv().await {
                debug!(
                    video = event.video.as_deref().unwrap_or("-"),
                    payload = ?event.payload,
                    "{}",
                    event.message
                );
            }
        }),
    ]
}
