//! Media dimension and duration probing
//!
//! Shells out to ffprobe. A missing binary or an unparseable file degrades
//! to empty media info rather than failing the import.

use crate::error::{Error, Result};
use crate::services::scanner::MediaKind;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::Command;

#[derive(Debug, Clone, Copy, Default)]
pub struct MediaInfo {
    pub width: Option<i64>,
    pub height: Option<i64>,
    pub duration_secs: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    streams: Vec<FfprobeStream>,
    format: Option<FfprobeFormat>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    width: Option<i64>,
    height: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

#[derive(Debug, Clone)]
pub struct MediaProbe {
    binary: PathBuf,
}

impl Default for MediaProbe {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("ffprobe"),
        }
    }
}

impl MediaProbe {
    /// Probe a media file off the async runtime.
    pub async fn probe(&self, path: &Path, kind: MediaKind) -> Result<MediaInfo> {
        let binary = self.binary.clone();
        let path = path.to_path_buf();
        let info = tokio::task::spawn_blocking(move || run_ffprobe(&binary, &path))
            .await
            .map_err(|e| Error::ExternalService(format!("probe task: {}", e)))??;

        // images have no meaningful duration even when ffprobe reports one
        Ok(match kind {
            MediaKind::Image => MediaInfo {
                duration_secs: None,
                ..info
            },
            MediaKind::Video => info,
        })
    }
}

fn run_ffprobe(binary: &Path, path: &Path) -> Result<MediaInfo> {
    let output = Command::new(binary)
        .args([
            "-v",
            "error",
            "-print_format",
            "json",
            "-show_streams",
            "-show_format",
        ])
        .arg(path)
        .output()
        .map_err(|e| Error::ExternalService(format!("ffprobe spawn: {}", e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::ExternalService(format!(
            "ffprobe failed on {}: {}",
            path.display(),
            stderr.trim()
        )));
    }

    let parsed: FfprobeOutput = serde_json::from_slice(&output.stdout)
        .map_err(|e| Error::ExternalService(format!("ffprobe output: {}", e)))?;

    let (width, height) = parsed
        .streams
        .iter()
        .find(|s| s.width.is_some() && s.height.is_some())
        .map(|s| (s.width, s.height))
        .unwrap_or((None, None));

    let duration_secs = parsed
        .format
        .and_then(|f| f.duration)
        .and_then(|d| d.parse::<f64>().ok());

    Ok(MediaInfo {
        width,
        height,
        duration_secs,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ffprobe_json_parses() {
        let raw = r#"{
            "streams": [
                {"codec_type": "audio"},
                {"codec_type": "video", "width": 1920, "height": 1080}
            ],
            "format": {"duration": "12.500000"}
        }"#;
        let parsed: FfprobeOutput = serde_json::from_str(raw).unwrap();
        let stream = parsed
            .streams
            .iter()
            .find(|s| s.width.is_some())
            .unwrap();
        assert_eq!(stream.width, Some(1920));
        assert_eq!(
            parsed.format.unwrap().duration.unwrap().parse::<f64>().unwrap(),
            12.5
        );
    }

    #[tokio::test]
    async fn probe_missing_binary_degrades_to_error() {
        let probe = MediaProbe {
            binary: PathBuf::from("/nonexistent/ffprobe"),
        };
        let err = probe
            .probe(Path::new("/tmp/x.mp4"), MediaKind::Video)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ExternalService(_)));
    }
}
