//! Input discovery and per-video job derivation.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use tempfile::TempDir;
use tracing::warn;
use uuid::Uuid;

use reelcut_models::TrimWindow;

use crate::error::{WorkerError, WorkerResult};

/// Accepted source extensions, matched case-insensitively.
pub const VIDEO_EXTENSIONS: [&str; 3] = ["mp4", "avi", "mov"];

const FALLBACK_BASE_NAME: &str = "clip";

/// `HH:MM:SS-HH:MM:SS` span embedded in a file stem
static WINDOW_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d{2}:\d{2}:\d{2})-(\d{2}:\d{2}:\d{2})").expect("valid window regex")
});

/// List the videos directly inside `input`, sorted by path.
pub async fn discover_videos(input: &Path) -> WorkerResult<Vec<PathBuf>> {
    let metadata = tokio::fs::metadata(input).await.map_err(|e| {
        WorkerError::input_error(format!("Input path {} is not accessible: {}", input.display(), e))
    })?;
    if !metadata.is_dir() {
        return Err(WorkerError::input_error(format!(
            "Input path {} is not a directory",
            input.display()
        )));
    }

    let mut videos = Vec::new();
    let mut entries = tokio::fs::read_dir(input).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if entry.file_type().await?.is_file() && is_video(&path) {
            videos.push(path);
        }
    }

    if videos.is_empty() {
        return Err(WorkerError::input_error(format!(
            "No {} files found in {}",
            VIDEO_EXTENSIONS.join("/"),
            input.display()
        )));
    }

    videos.sort();
    for (base_name, sources) in output_collisions(&videos) {
        warn!(
            output = %format!("{}.mp4", base_name),
            sources = ?sources,
            "Inputs share an output name; later jobs overwrite earlier results"
        );
    }
    Ok(videos)
}

/// Groups of inputs that derive the same output base name.
pub fn output_collisions(videos: &[PathBuf]) -> BTreeMap<String, Vec<PathBuf>> {
    let mut by_name: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();
    for video in videos {
        let stem = video
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        by_name
            .entry(derive_base_name(&stem))
            .or_default()
            .push(video.clone());
    }
    by_name.retain(|_, sources| sources.len() > 1);
    by_name
}

fn derive_base_name(stem: &str) -> String {
    clean_base_name(&WINDOW_PATTERN.replace(stem, ""))
}

fn is_video(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| VIDEO_EXTENSIONS.iter().any(|v| v.eq_ignore_ascii_case(ext)))
        .unwrap_or(false)
}

/// One source video and everything derived from its name.
#[derive(Debug, Clone)]
pub struct VideoJob {
    pub id: Uuid,
    pub source: PathBuf,
    pub base_name: String,
    pub window: Option<TrimWindow>,
    pub output_path: PathBuf,
    pub work_dir: PathBuf,
}

impl VideoJob {
    /// Derive the job for `source`.
    ///
    /// A `HH:MM:SS-HH:MM:SS` span in the file stem replaces `explicit_window`
    /// and is removed from the base name.
    pub fn new(
        source: impl Into<PathBuf>,
        output_dir: &Path,
        work_dir: &Path,
        explicit_window: Option<TrimWindow>,
    ) -> WorkerResult<Self> {
        let source = source.into();
        let stem = source
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        let window = match WINDOW_PATTERN.captures(&stem) {
            Some(captures) => TrimWindow::parse(
                captures.get(1).map(|m| m.as_str()),
                captures.get(2).map(|m| m.as_str()),
            )?,
            None => explicit_window,
        };
        let base_name = derive_base_name(&stem);

        Ok(Self {
            id: Uuid::new_v4(),
            output_path: output_dir.join(format!("{}.mp4", base_name)),
            source,
            base_name,
            window,
            work_dir: work_dir.to_path_buf(),
        })
    }

    /// Scoped temp directory for this job, removed when dropped.
    pub fn create_temp_dir(&self) -> WorkerResult<TempDir> {
        Ok(tempfile::Builder::new()
            .prefix(&format!("{}-", self.base_name))
            .tempdir_in(&self.work_dir)?)
    }
}

fn clean_base_name(raw: &str) -> String {
    let trimmed = raw.trim_matches(|c: char| matches!(c, '-' | '_' | '.' | ' '));
    if trimmed.is_empty() {
        FALLBACK_BASE_NAME.to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_name() {
        let job = VideoJob::new("/in/talk.mp4", Path::new("/out"), Path::new("/tmp"), None).unwrap();
        assert_eq!(job.base_name, "talk");
        assert_eq!(job.output_path, PathBuf::from("/out/talk.mp4"));
        assert!(job.window.is_none());
    }

    #[test]
    fn test_filename_window_overrides_explicit() {
        let explicit = TrimWindow::new(0.0, Some(5.0)).unwrap();
        let job = VideoJob::new(
            "/in/talk_00:01:00-00:02:30.mov",
            Path::new("/out"),
            Path::new("/tmp"),
            Some(explicit),
        )
        .unwrap();

        assert_eq!(job.base_name, "talk");
        assert_eq!(job.output_path, PathBuf::from("/out/talk.mp4"));
        let window = job.window.unwrap();
        assert_eq!(window.start_secs, 60.0);
        assert_eq!(window.end_secs, Some(150.0));
    }

    #[test]
    fn test_explicit_window_applies_without_filename_span() {
        let explicit = TrimWindow::new(10.0, None).unwrap();
        let job = VideoJob::new("/in/demo.avi", Path::new("/out"), Path::new("/tmp"), Some(explicit))
            .unwrap();
        assert_eq!(job.window, Some(explicit));
    }

    #[test]
    fn test_window_only_name_becomes_clip() {
        let job = VideoJob::new(
            "/in/00:00:10-00:00:20.mp4",
            Path::new("/out"),
            Path::new("/tmp"),
            None,
        )
        .unwrap();
        assert_eq!(job.base_name, "clip");
    }

    #[test]
    fn test_inverted_filename_window_is_rejected() {
        let result = VideoJob::new(
            "/in/talk 00:02:00-00:01:00.mp4",
            Path::new("/out"),
            Path::new("/tmp"),
            None,
        );
        assert!(matches!(result, Err(WorkerError::Model(_))));
    }

    #[test]
    fn test_temp_dir_is_removed_on_drop() {
        let work = tempfile::tempdir().unwrap();
        let job = VideoJob::new("/in/talk.mp4", Path::new("/out"), work.path(), None).unwrap();

        let temp = job.create_temp_dir().unwrap();
        let path = temp.path().to_path_buf();
        assert!(path.exists());
        assert!(path.file_name().unwrap().to_string_lossy().starts_with("talk-"));

        drop(temp);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_discover_videos_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.MOV", "a.mp4", "notes.txt", "c.avi"] {
            std::fs::write(dir.path().join(name), b"").unwrap();
        }
        std::fs::create_dir(dir.path().join("nested.mp4")).unwrap();

        let videos = discover_videos(dir.path()).await.unwrap();
        let names: Vec<_> = videos
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.mp4", "b.MOV", "c.avi"]);
    }

    #[test]
    fn test_output_collisions_group_shared_base_names() {
        let videos: Vec<PathBuf> = [
            "/in/a_00:00:01-00:00:05.mp4",
            "/in/a_00:00:10-00:00:20.mp4",
            "/in/demo.avi",
            "/in/talk.mov",
            "/in/talk.mp4",
        ]
        .iter()
        .map(PathBuf::from)
        .collect();

        let collisions = output_collisions(&videos);

        assert_eq!(collisions.len(), 2);
        assert_eq!(collisions["a"].len(), 2);
        assert_eq!(
            collisions["talk"],
            vec![PathBuf::from("/in/talk.mov"), PathBuf::from("/in/talk.mp4")]
        );
        assert!(!collisions.contains_key("demo"));
    }

    #[tokio::test]
    async fn test_discover_videos_keeps_colliding_inputs() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["talk.mp4", "talk.mov"] {
            std::fs::write(dir.path().join(name), b"").unwrap();
        }

        let videos = discover_videos(dir.path()).await.unwrap();
        assert_eq!(videos.len(), 2);
        assert_eq!(output_collisions(&videos).len(), 1);
    }

    #[tokio::test]
    async fn test_discover_videos_input_errors() {
        let dir = tempfile::tempdir().unwrap();

        let missing = discover_videos(&dir.path().join("missing")).await.unwrap_err();
        assert!(matches!(missing, WorkerError::InputError(_)));

        let file = dir.path().join("talk.mp4");
        std::fs::write(&file, b"").unwrap();
        let not_dir = discover_videos(&file).await.unwrap_err();
        assert!(matches!(not_dir, WorkerError::InputError(_)));

        let empty = tempfile::tempdir().unwrap();
        let none = discover_videos(empty.path()).await.unwrap_err();
        assert!(matches!(none, WorkerError::InputError(_)));
    }
}
