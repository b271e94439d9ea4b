//! FFmpeg invocation: argument building and process supervision.

use std::collections::VecDeque;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{ChildStderr, Command};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::{MediaError, MediaResult};
use crate::progress::{parse_progress_line, FfmpegProgress};

/// Number of non-progress stderr lines kept for error reports.
const STDERR_TAIL_LINES: usize = 20;

/// Observer for the literal command line, invoked before spawning.
pub type CommandHook = Arc<dyn Fn(&str) + Send + Sync>;

/// One ffmpeg invocation with a single input and a single output.
///
/// Arguments are kept in two groups: options applied to the input (`-ss`,
/// `-t`) and options applied to the output (filters, maps, codecs).
#[derive(Debug, Clone)]
pub struct FfmpegCommand {
    input: PathBuf,
    output: PathBuf,
    before_input: Vec<String>,
    after_input: Vec<String>,
    log_level: &'static str,
}

impl FfmpegCommand {
    pub fn new(input: impl AsRef<Path>, output: impl AsRef<Path>) -> Self {
        Self {
            input: input.as_ref().to_path_buf(),
            output: output.as_ref().to_path_buf(),
            before_input: Vec::new(),
            after_input: Vec::new(),
            log_level: "error",
        }
    }

    fn input_option(mut self, flag: &str, value: impl Into<String>) -> Self {
        self.before_input.push(flag.to_string());
        self.before_input.push(value.into());
        self
    }

    fn output_option(mut self, flag: &str, value: impl Into<String>) -> Self {
        self.after_input.push(flag.to_string());
        self.after_input.push(value.into());
        self
    }

    /// Append raw output arguments.
    pub fn output_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.after_input.extend(args.into_iter().map(Into::into));
        self
    }

    /// Start reading the input at `seconds`.
    pub fn seek(self, seconds: f64) -> Self {
        self.input_option("-ss", format!("{:.3}", seconds))
    }

    /// Read at most `seconds` of input.
    pub fn duration(self, seconds: f64) -> Self {
        self.input_option("-t", format!("{:.3}", seconds))
    }

    pub fn video_filter(self, filter: impl Into<String>) -> Self {
        self.output_option("-vf", filter)
    }

    pub fn filter_complex(self, graph: impl Into<String>) -> Self {
        self.output_option("-filter_complex", graph)
    }

    /// Map a stream or graph label into the output.
    pub fn map(self, label: impl Into<String>) -> Self {
        self.output_option("-map", label)
    }

    pub fn video_codec(self, codec: impl Into<String>) -> Self {
        self.output_option("-c:v", codec)
    }

    pub fn audio_codec(self, codec: impl Into<String>) -> Self {
        self.output_option("-c:a", codec)
    }

    pub fn crf(self, crf: u8) -> Self {
        self.output_option("-crf", crf.to_string())
    }

    pub fn preset(self, preset: impl Into<String>) -> Self {
        self.output_option("-preset", preset)
    }

    pub fn audio_bitrate(self, bitrate: impl Into<String>) -> Self {
        self.output_option("-b:a", bitrate)
    }

    /// Verbosity passed to `-v`; `info` keeps the input dump on stderr.
    pub fn log_level(mut self, level: &'static str) -> Self {
        self.log_level = level;
        self
    }

    /// Full argument vector, excluding the program name.
    ///
    /// Output is always overwritten and key/value progress is written to
    /// stderr alongside diagnostics. `-nostats` keeps the `\r`-terminated
    /// stats line from merging into the first progress key of a block.
    pub fn build_args(&self) -> Vec<String> {
        let preamble = [
            "-y",
            "-hide_banner",
            "-nostats",
            "-v",
            self.log_level,
            "-progress",
            "pipe:2",
        ];

        preamble
            .iter()
            .map(|s| s.to_string())
            .chain(self.before_input.iter().cloned())
            .chain(["-i".to_string(), self.input.to_string_lossy().into_owned()])
            .chain(self.after_input.iter().cloned())
            .chain(std::iter::once(self.output.to_string_lossy().into_owned()))
            .collect()
    }

    /// The literal command line, as reported on the debug channel.
    pub fn command_line(&self) -> String {
        std::iter::once("ffmpeg".to_string())
            .chain(self.build_args().into_iter().map(|arg| shell_quote(&arg)))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

fn shell_quote(arg: &str) -> String {
    let needs_quotes =
        arg.is_empty() || arg.contains(|c: char| c.is_whitespace() || c == ';' || c == '\'');
    if needs_quotes {
        format!("\"{}\"", arg.replace('"', "\\\""))
    } else {
        arg.to_string()
    }
}

/// Spawns ffmpeg and follows its stderr until exit.
///
/// A started command runs until the process exits; there is no timeout.
#[derive(Clone, Default)]
pub struct FfmpegRunner {
    command_hook: Option<CommandHook>,
}

impl fmt::Debug for FfmpegRunner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FfmpegRunner")
            .field("command_hook", &self.command_hook.is_some())
            .finish()
    }
}

impl FfmpegRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report every command line to `hook` before it runs.
    pub fn with_command_hook(mut self, hook: CommandHook) -> Self {
        self.command_hook = Some(hook);
        self
    }

    pub async fn run(&self, cmd: &FfmpegCommand) -> MediaResult<()> {
        self.run_with_progress(cmd, |_| {}).await
    }

    /// Run `cmd`, calling `on_progress` for each telemetry snapshot.
    ///
    /// A non-zero exit becomes [`MediaError::FfmpegFailed`] carrying the last
    /// diagnostic lines from stderr.
    pub async fn run_with_progress<F>(&self, cmd: &FfmpegCommand, on_progress: F) -> MediaResult<()>
    where
        F: Fn(FfmpegProgress) + Send + 'static,
    {
        check_ffmpeg()?;

        let command_line = cmd.command_line();
        debug!(command = %command_line, "Spawning ffmpeg");
        if let Some(hook) = &self.command_hook {
            hook(&command_line);
        }

        let mut child = Command::new("ffmpeg")
            .args(cmd.build_args())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()?;

        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| MediaError::ffmpeg_failed("stderr not captured", None, None))?;
        let reader = follow_stderr(stderr, on_progress);

        let status = child.wait().await?;
        let tail = reader.await.unwrap_or_else(|e| {
            warn!("ffmpeg stderr reader ended abnormally: {}", e);
            Vec::new()
        });

        if status.success() {
            return Ok(());
        }
        Err(MediaError::ffmpeg_failed(
            "FFmpeg exited with non-zero status",
            (!tail.is_empty()).then(|| tail.join("\n")),
            status.code(),
        ))
    }
}

/// Parse progress from `stderr` and keep the trailing diagnostic lines.
fn follow_stderr<F>(stderr: ChildStderr, on_progress: F) -> JoinHandle<Vec<String>>
where
    F: Fn(FfmpegProgress) + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(stderr).lines();
        let mut state = FfmpegProgress::default();
        let mut tail: VecDeque<String> = VecDeque::with_capacity(STDERR_TAIL_LINES);

        while let Ok(Some(line)) = lines.next_line().await {
            if let Some(snapshot) = parse_progress_line(&line, &mut state) {
                on_progress(snapshot);
                continue;
            }
            if line.contains('=') || line.trim().is_empty() {
                continue;
            }
            if tail.len() == STDERR_TAIL_LINES {
                tail.pop_front();
            }
            tail.push_back(line);
        }

        tail.into()
    })
}

pub fn check_ffmpeg() -> MediaResult<PathBuf> {
    which::which("ffmpeg").map_err(|_| MediaError::FfmpegNotFound)
}

pub fn check_ffprobe() -> MediaResult<PathBuf> {
    which::which("ffprobe").map_err(|_| MediaError::FfprobeNotFound)
}
