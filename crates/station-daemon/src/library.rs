//! Media library loading: directory scan plus ffprobe duration probing.
//! Runs once at startup; the result is the immutable playlist.

use std::path::{Component, Path, PathBuf};

use anyhow::Context;
use station_proto::config::StationConfig;
use station_proto::platform;
use station_proto::playlist::Playlist;
use station_proto::protocol::Track;
use tracing::{debug, info, warn};

pub const AUDIO_EXTENSIONS: &[&str] = &["mp3", "wav", "ogg", "webm", "flac", "m4a", "aac", "opus"];

pub async fn load_playlist(config: &StationConfig) -> anyhow::Result<Playlist> {
    let root = &config.library_dir;
    let files = scan_library(root)
        .await
        .with_context(|| format!("failed to scan library {}", root.display()))?;

    let ffprobe = platform::find_ffprobe_binary(config.ffprobe_path.as_deref());
    if ffprobe.is_none() {
        warn!(
            "ffprobe not found; every track gets the fallback duration of {}s",
            config.fallback_duration_secs
        );
    }

    let mut tracks = Vec::with_capacity(files.len());
    for file in files {
        let Some(path) = relative_track_path(root, &file) else {
            warn!("Skipping non-UTF-8 path {:?}", file);
            continue;
        };

        let duration_secs = match &ffprobe {
            Some(bin) => match probe_duration(bin, &file).await {
                Ok(d) => d,
                Err(e) => {
                    warn!("Probe failed for {}: {:#}", path, e);
                    config.fallback_duration_secs
                }
            },
            None => config.fallback_duration_secs,
        };

        debug!(path = %path, duration_secs, "Track loaded");
        tracks.push(Track::new(path, duration_secs));
    }

    tracks.sort_by(|a, b| a.path.cmp(&b.path));

    let playlist = Playlist::new(tracks)
        .with_context(|| format!("no playable audio under {}", root.display()))?;
    info!(
        tracks = playlist.len(),
        total_secs = playlist.total_duration().round(),
        "Playlist loaded from {}",
        root.display()
    );
    Ok(playlist)
}

/// All audio files under `root`, recursively, in no particular order.
pub async fn scan_library(root: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut pending = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let mut entries = tokio::fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let file_type = entry.file_type().await?;
            let path = entry.path();
            if file_type.is_dir() {
                pending.push(path);
            } else if file_type.is_file() && is_audio_file(&path) {
                files.push(path);
            }
        }
    }

    Ok(files)
}

pub fn is_audio_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| AUDIO_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// `file` relative to `root`, joined with `/` whatever the platform.
fn relative_track_path(root: &Path, file: &Path) -> Option<String> {
    let rel = file.strip_prefix(root).ok()?;
    let parts: Option<Vec<&str>> = rel
        .components()
        .map(|c| match c {
            Component::Normal(s) => s.to_str(),
            _ => None,
        })
        .collect();
    Some(parts?.join("/"))
}

/// Duration in seconds as reported by ffprobe's container header.
pub async fn probe_duration(ffprobe: &Path, file: &Path) -> anyhow::Result<f64> {
    let output = tokio::process::Command::new(ffprobe)
        .args([
            "-v",
            "error",
            "-show_entries",
            "format=duration",
            "-of",
            "default=noprint_wrappers=1:nokey=1",
        ])
        .arg(file)
        .stdin(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .output()
        .await
        .context("failed to run ffprobe")?;

    if !output.status.success() {
        anyhow::bail!("ffprobe exited with {}", output.status);
    }

    parse_probe_output(&String::from_utf8_lossy(&output.stdout))
}

fn parse_probe_output(stdout: &str) -> anyhow::Result<f64> {
    let text = stdout.trim();
    let secs: f64 = text
        .parse()
        .with_context(|| format!("unparseable duration {:?}", text))?;
    if !secs.is_finite() || secs <= 0.0 {
        anyhow::bail!("unusable duration {}", secs);
    }
    Ok(secs)
}
