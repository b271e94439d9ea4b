//! Run and analyzer configuration.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use reelcut_models::{FrameAction, TrimWindow};

use crate::error::{WorkerError, WorkerResult};

const DEFAULT_KEEP_CRITERIA: &str = "Meaningful content: a person speaking to the camera, \
    a demonstration, or anything a viewer would want to watch at normal speed.";
const DEFAULT_REMOVE_CRITERIA: &str = "Dead air: blank or loading screens, the presenter away \
    from the camera, or footage unrelated to the topic.";
const DEFAULT_SPEED_UP_CRITERIA: &str = "Slow or repetitive activity: typing, scrolling, \
    walking, or long transitions that are worth showing but not at normal speed.";

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Directory scanned for source videos
    pub input_dir: PathBuf,
    /// Directory receiving `<base>.mp4` outputs
    pub output_dir: PathBuf,
    /// Parent of the per-job temporary directories
    pub work_dir: PathBuf,
    /// Requested concurrent jobs, see [`WorkerConfig::effective_jobs`]
    pub requested_jobs: usize,
    /// Frames classified concurrently within one job
    pub parallel_frames: usize,
    /// Seconds between sampled frames
    pub sampling_interval_secs: f64,
    /// Explicit trim window; a window in the filename takes precedence
    pub window: Option<TrimWindow>,
    /// How often the scheduler checks for finished jobs
    pub poll_interval: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("."),
            output_dir: PathBuf::from("./output"),
            work_dir: std::env::temp_dir().join("reelcut"),
            requested_jobs: 1,
            parallel_frames: 10,
            sampling_interval_secs: 1.0,
            window: None,
            poll_interval: Duration::from_millis(250),
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> WorkerResult<Self> {
        let defaults = Self::default();

        let sampling_interval_secs =
            env_parse("REELCUT_SAMPLING_INTERVAL")?.unwrap_or(defaults.sampling_interval_secs);
        if !(sampling_interval_secs > 0.0) {
            return Err(WorkerError::config_error(format!(
                "REELCUT_SAMPLING_INTERVAL must be positive, got {}",
                sampling_interval_secs
            )));
        }

        let start = env_string("REELCUT_START");
        let end = env_string("REELCUT_END");
        let window = TrimWindow::parse(start.as_deref(), end.as_deref())
            .map_err(|e| WorkerError::config_error(format!("Invalid trim window: {}", e)))?;

        Ok(Self {
            input_dir: env_string("REELCUT_INPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.input_dir),
            output_dir: env_string("REELCUT_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.output_dir),
            work_dir: env_string("REELCUT_WORK_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.work_dir),
            requested_jobs: env_parse("REELCUT_JOBS")?.unwrap_or(defaults.requested_jobs),
            parallel_frames: env_parse::<usize>("REELCUT_PARALLEL_FRAMES")?
                .unwrap_or(defaults.parallel_frames)
                .max(1),
            sampling_interval_secs,
            window,
            poll_interval: env_parse("REELCUT_POLL_INTERVAL_MS")?
                .map(Duration::from_millis)
                .unwrap_or(defaults.poll_interval),
        })
    }

    /// Concurrent job bound: the request clamped to `[1, available cores]`.
    pub fn effective_jobs(&self) -> usize {
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        self.requested_jobs.clamp(1, cores)
    }
}

/// Natural-language description for each action.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CriteriaConfig {
    pub keep: Option<String>,
    pub remove: Option<String>,
    pub speed_up: Option<String>,
}

impl CriteriaConfig {
    /// Criteria text for `action`, falling back to the built-in description.
    pub fn text(&self, action: FrameAction) -> &str {
        let (custom, default) = match action {
            FrameAction::Keep => (&self.keep, DEFAULT_KEEP_CRITERIA),
            FrameAction::Remove => (&self.remove, DEFAULT_REMOVE_CRITERIA),
            FrameAction::SpeedUp => (&self.speed_up, DEFAULT_SPEED_UP_CRITERIA),
        };
        custom
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(default)
    }
}

/// Classifier settings.
#[derive(Clone)]
pub struct AnalyzerConfig {
    pub criteria: CriteriaConfig,
    /// Minimum confidence for a classification to be honored
    pub confidence_threshold: f64,
    pub api_key: String,
    /// Model override; the classifier default applies when unset
    pub model: Option<String>,
    /// API base URL override
    pub endpoint: Option<String>,
}

impl fmt::Debug for AnalyzerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalyzerConfig")
            .field("criteria", &self.criteria)
            .field("confidence_threshold", &self.confidence_threshold)
            .field("api_key", &"[redacted]")
            .field("model", &self.model)
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

impl AnalyzerConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            criteria: CriteriaConfig::default(),
            confidence_threshold: 0.7,
            api_key: api_key.into(),
            model: None,
            endpoint: None,
        }
    }

    /// Create config from environment variables.
    ///
    /// Values are not validated here; see [`AnalyzerConfig::validate`].
    pub fn from_env() -> WorkerResult<Self> {
        let mut config = Self::new(env_string("GEMINI_API_KEY").unwrap_or_default());
        if let Some(threshold) = env_parse("REELCUT_CONFIDENCE_THRESHOLD")? {
            config.confidence_threshold = threshold;
        }
        config.model = env_string("REELCUT_MODEL");
        config.endpoint = env_string("REELCUT_ENDPOINT");
        config.criteria = CriteriaConfig {
            keep: env_string("REELCUT_CRITERIA_KEEP"),
            remove: env_string("REELCUT_CRITERIA_REMOVE"),
            speed_up: env_string("REELCUT_CRITERIA_SPEED_UP"),
        };
        Ok(config)
    }

    pub fn validate(&self) -> WorkerResult<()> {
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(WorkerError::config_error(format!(
                "Confidence threshold must be within [0, 1], got {}",
                self.confidence_threshold
            )));
        }
        if self.api_key.trim().is_empty() {
            return Err(WorkerError::config_error(
                "GEMINI_API_KEY is not set or empty",
            ));
        }
        Ok(())
    }
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|s| !s.trim().is_empty())
}

fn env_parse<T>(key: &str) -> WorkerResult<Option<T>>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    env_string(key)
        .map(|raw| {
            raw.trim().parse::<T>().map_err(|e| {
                WorkerError::config_error(format!("Invalid {} value '{}': {}", key, raw, e))
            })
        })
        .transpose()
}
