use std::{
    path::{Path, PathBuf},
    process::Stdio,
    sync::LazyLock,
};

use regex::Regex;
use tempfile::TempDir;
use tokio::process::Command;

use crate::{types::Segment, yt::TranscriptSource};

static CUE_TIMING_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^((?:\d+:)?\d{2}:\d{2}\.\d{3})\s+-->\s+((?:\d+:)?\d{2}:\d{2}\.\d{3})").unwrap()
});

static CUE_TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").unwrap());

#[derive(Debug, thiserror::Error)]
pub enum CaptionsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("yt-dlp exited with {status:?}: {stderr}")]
    YtDlp { status: Option<i32>, stderr: String },
    #[error("No captions available for video {0}")]
    NoCaptions(String),
}

/// Fetches English captions through the `yt-dlp` CLI and parses the VTT output.
///
/// The child process is killed if the fetch future is dropped, so cancelling a
/// job releases the underlying connection.
#[derive(Debug, Clone)]
pub struct YtDlpCaptions {
    binary: PathBuf,
    workdir: PathBuf,
    cookies_path: Option<PathBuf>,
}

impl YtDlpCaptions {
    const BASE_URL: &str = "https://youtube.com/watch";

    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        YtDlpCaptions {
            binary: PathBuf::from("yt-dlp"),
            workdir: workdir.into(),
            cookies_path: None,
        }
    }

    pub fn with_binary(mut self, binary: impl Into<PathBuf>) -> Self {
        self.binary = binary.into();
        self
    }

    pub fn with_cookies(mut self, cookies_path: Option<PathBuf>) -> Self {
        self.cookies_path = cookies_path;
        self
    }

    /// Per-fetch directory under the workdir, removed when dropped. Dropping
    /// the fetch future midway therefore cleans up too.
    async fn scratch_dir(&self, video_id: &str) -> Result<TempDir, CaptionsError> {
        tokio::fs::create_dir_all(&self.workdir).await?;
        let scratch = tempfile::Builder::new()
            .prefix(&format!("{video_id}-"))
            .tempdir_in(&self.workdir)
            .inspect_err(|e| tracing::error!(error = %e, workdir = ?self.workdir, "Failed to create captions directory"))?;
        Ok(scratch)
    }

    async fn download_vtt(&self, video_id: &str, dir: &Path) -> Result<String, CaptionsError> {
        let video_url = format!("{}?v={}", Self::BASE_URL, video_id);

        let mut cmd = Command::new(&self.binary);
        cmd.args([
            "--skip-download",
            "--write-sub",
            "--write-auto-sub",
            "--sub-lang",
            "en.*,en",
            "--sub-format",
            "vtt",
            "--no-warnings",
            "--output",
        ])
        .arg(dir.join("%(id)s"));
        if let Some(cookies) = &self.cookies_path {
            cmd.arg("--cookies").arg(cookies);
        }

        let output = cmd
            .arg(&video_url)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .inspect_err(|e| tracing::error!(error = %e, binary = ?self.binary, "Failed to spawn yt-dlp"))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            tracing::error!(status = ?output.status.code(), %stderr, "yt-dlp failed to fetch captions");
            return Err(CaptionsError::YtDlp {
                status: output.status.code(),
                stderr,
            });
        }

        let mut entries = tokio::fs::read_dir(dir).await?;
        let mut vtt_files = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|s| s.to_str()) == Some("vtt") {
                vtt_files.push(path);
            }
        }

        // manual `.en.vtt` subs sort ahead of regional and auto variants
        vtt_files.sort_by_key(|p| {
            let name = p.file_name().map(|n| n.to_string_lossy().into_owned());
            (name.as_deref().map_or(true, |n| !n.ends_with(".en.vtt")), p.clone())
        });

        let Some(vtt_path) = vtt_files.first() else {
            return Err(CaptionsError::NoCaptions(video_id.to_string()));
        };
        tracing::debug!(path = ?vtt_path, "Reading captions");

        Ok(tokio::fs::read_to_string(vtt_path).await?)
    }
}

impl TranscriptSource for YtDlpCaptions {
    type Error = CaptionsError;

    #[tracing::instrument(skip(self))]
    async fn get_transcript(&self, video_id: &str) -> Result<Vec<Segment>, Self::Error> {
        let scratch = self.scratch_dir(video_id).await?;
        let vtt = self.download_vtt(video_id, scratch.path()).await?;

        let segments = parse_vtt(&vtt);
        if segments.is_empty() {
            return Err(CaptionsError::NoCaptions(video_id.to_string()));
        }
        Ok(segments)
    }
}

/// Parses WebVTT cues into segments.
///
/// Inline timing tags are stripped and, since auto-generated captions repeat
/// the previous line at the top of each cue, a line equal to the last emitted
/// one is dropped.
pub fn parse_vtt(content: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut cue: Option<(u64, u64)> = None;
    let mut last_line = String::new();

    for raw in content.lines() {
        let line = raw.trim();

        if let Some(cap) = CUE_TIMING_RE.captures(line) {
            cue = parse_timestamp_ms(&cap[1]).zip(parse_timestamp_ms(&cap[2]));
            continue;
        }

        if line.is_empty() {
            cue = None;
            continue;
        }

        let Some((start, end)) = cue else {
            continue;
        };

        let text = decode_entities(&CUE_TAG_RE.replace_all(line, ""));
        let text = text.trim();
        if text.is_empty() || text == last_line {
            continue;
        }

        last_line = text.to_string();
        segments.push(Segment {
            text: last_line.clone(),
            offset_ms: Some(start),
            duration_ms: Some(end.saturating_sub(start)),
        });
    }

    segments
}

fn parse_timestamp_ms(ts: &str) -> Option<u64> {
    let (hms, millis) = ts.split_once('.')?;
    let parts = hms
        .split(':')
        .map(|p| p.parse::<u64>().ok())
        .collect::<Option<Vec<_>>>()?;

    let seconds = match parts.as_slice() {
        [h, m, s] => h * 3600 + m * 60 + s,
        [m, s] => m * 60 + s,
        _ => return None,
    };
    Some(seconds * 1000 + millis.parse::<u64>().ok()?)
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&gt;", ">")
        .replace("&lt;", "<")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}
