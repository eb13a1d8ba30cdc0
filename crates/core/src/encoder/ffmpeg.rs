//! FFmpeg-based encoder strategy.

use async_trait::async_trait;
use regex_lite::Regex;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::config::EncoderConfig;
use super::error::EncodeError;
use super::traits::{EncoderStrategy, LogLineCallback, ProgressCallback};
use super::types::{AudioProfile, MediaInfo, MediaKind, VideoFormat, VideoProfile};
use crate::queue::Percent;

/// Encodes one file with ffmpeg according to a [`MediaKind`] profile.
///
/// Each instance owns a cancellation token; `terminate` cancels it and
/// the running `encode` kills the child process. Once terminated the
/// instance stays terminated.
pub struct FfmpegStrategy {
    config: Arc<EncoderConfig>,
    kind: MediaKind,
    cancel: CancellationToken,
}

enum Outcome {
    Exited(std::io::Result<std::process::ExitStatus>),
    Terminated,
    TimedOut,
}

impl FfmpegStrategy {
    pub fn new(config: Arc<EncoderConfig>, kind: MediaKind) -> Self {
        Self {
            config,
            kind,
            cancel: CancellationToken::new(),
        }
    }

    /// Builds the full ffmpeg argument list for one encode.
    fn build_args(&self, input_path: &Path, output_path: &Path) -> Vec<String> {
        let mut args = vec![
            "-hide_banner".to_string(),
            "-nostats".to_string(),
            "-y".to_string(), // Overwrite output
            "-i".to_string(),
            input_path.to_string_lossy().to_string(),
        ];

        match &self.kind {
            MediaKind::Audio(profile) => {
                args.push("-vn".to_string());
                push_audio_args(&mut args, profile);
            }
            MediaKind::Video(profile) => push_video_args(&mut args, profile),
        }

        // Log level and machine readable progress on stdout
        args.extend([
            "-loglevel".to_string(),
            self.config.ffmpeg_log_level.clone(),
            "-progress".to_string(),
            "pipe:1".to_string(),
        ]);

        args.extend(self.config.extra_ffmpeg_args.iter().cloned());
        args.push(output_path.to_string_lossy().to_string());

        args
    }

    /// Runs ffprobe on `path`.
    pub async fn probe(&self, path: &Path) -> Result<MediaInfo, EncodeError> {
        let output = Command::new(&self.config.ffprobe_path)
            .args([
                "-v",
                "quiet",
                "-print_format",
                "json",
                "-show_format",
                "-show_streams",
            ])
            .arg(path)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    EncodeError::ProbeNotFound {
                        path: self.config.ffprobe_path.clone(),
                    }
                } else {
                    EncodeError::Io(e)
                }
            })?;

        if !output.status.success() {
            return Err(EncodeError::probe_failed(format!(
                "ffprobe failed: {}",
                String::from_utf8_lossy(&output.stderr)
            )));
        }

        parse_probe_output(path, &String::from_utf8_lossy(&output.stdout))
    }
}

#[async_trait]
impl EncoderStrategy for FfmpegStrategy {
    fn name(&self) -> &str {
        match self.kind {
            MediaKind::Video(_) => "ffmpeg-video",
            MediaKind::Audio(_) => "ffmpeg-audio",
        }
    }

    fn destination(&self, source: &Path) -> PathBuf {
        output_path(&self.config, self.kind.extension(), source)
    }

    async fn encode(
        &self,
        source: &Path,
        on_log: LogLineCallback,
        on_progress: ProgressCallback,
    ) -> Result<PathBuf, EncodeError> {
        if self.cancel.is_cancelled() {
            return Err(EncodeError::Terminated);
        }

        if !tokio::fs::try_exists(source).await.unwrap_or(false) {
            return Err(EncodeError::InputNotFound {
                path: source.to_path_buf(),
            });
        }

        let output = self.destination(source);
        if let Some(parent) = output.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|_| {
                EncodeError::OutputDirectoryFailed {
                    path: parent.to_path_buf(),
                }
            })?;
        }

        // Without a duration only the final report is possible
        let duration_secs = match self.probe(source).await {
            Ok(info) => {
                debug!(
                    path = %info.path.display(),
                    format = %info.format,
                    duration_secs = info.duration_secs,
                    "Probed source"
                );
                Some(info.duration_secs).filter(|d| *d > 0.0)
            }
            Err(e) => {
                debug!(path = %source.display(), error = %e, "Probe failed, progress limited");
                None
            }
        };

        let args = self.build_args(source, &output);
        debug!(strategy = self.name(), ?args, "Spawning ffmpeg");

        let mut child = Command::new(&self.config.ffmpeg_path)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    EncodeError::EncoderNotFound {
                        path: self.config.ffmpeg_path.clone(),
                    }
                } else {
                    EncodeError::Io(e)
                }
            })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| EncodeError::encode_failed("ffmpeg stdout not captured", None))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| EncodeError::encode_failed("ffmpeg stderr not captured", None))?;

        // Split on raw bytes: ffmpeg echoes metadata tags in whatever
        // encoding the file used
        let mut progress_lines = BufReader::new(stdout).split(b'\n');
        let mut log_lines = BufReader::new(stderr).split(b'\n');
        let mut tracker = ProgressTracker::new(duration_secs);
        let mut error_output = String::new();

        let outcome = tokio::select! {
            status = async {
                let mut stdout_open = true;
                let mut stderr_open = true;
                while stdout_open || stderr_open {
                    tokio::select! {
                        line = progress_lines.next_segment(), if stdout_open => match line? {
                            Some(raw) => {
                                if let Some(percent) = tracker.update(&decode_line(&raw)) {
                                    on_progress(percent);
                                }
                            }
                            None => stdout_open = false,
                        },
                        line = log_lines.next_segment(), if stderr_open => match line? {
                            Some(raw) => {
                                let line = decode_line(&raw);
                                if line.to_ascii_lowercase().contains("error") {
                                    error_output.push_str(&line);
                                    error_output.push('\n');
                                }
                                on_log(line);
                            }
                            None => stderr_open = false,
                        },
                    }
                }
                child.wait().await
            } => Outcome::Exited(status),
            _ = self.cancel.cancelled() => Outcome::Terminated,
            _ = tokio::time::sleep(Duration::from_secs(self.config.timeout_secs)) => Outcome::TimedOut,
        };

        match outcome {
            Outcome::Exited(Ok(status)) if status.success() => {}
            Outcome::Exited(Ok(status)) => {
                return Err(EncodeError::encode_failed(
                    format!("FFmpeg exited with code: {:?}", status.code()),
                    if error_output.is_empty() {
                        None
                    } else {
                        Some(error_output)
                    },
                ));
            }
            Outcome::Exited(Err(e)) => {
                let _ = child.kill().await;
                return Err(EncodeError::Io(e));
            }
            Outcome::Terminated => {
                debug!(path = %source.display(), "Killing ffmpeg after terminate");
                let _ = child.kill().await;
                return Err(EncodeError::Terminated);
            }
            Outcome::TimedOut => {
                warn!(
                    path = %source.display(),
                    timeout_secs = self.config.timeout_secs,
                    "FFmpeg timed out"
                );
                let _ = child.kill().await;
                return Err(EncodeError::Timeout {
                    timeout_secs: self.config.timeout_secs,
                });
            }
        }

        tokio::fs::metadata(&output)
            .await
            .map_err(|_| EncodeError::encode_failed("Output file not created", None))?;

        if let Some(percent) = tracker.finish() {
            on_progress(percent);
        }

        Ok(output)
    }

    fn terminate(&self) {
        self.cancel.cancel();
    }
}

/// One output line without its line ending, invalid UTF-8 replaced.
fn decode_line(raw: &[u8]) -> String {
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    String::from_utf8_lossy(raw).into_owned()
}

/// `<output_dir or source dir>/<stem><suffix>.<extension>`
pub(crate) fn output_path(config: &EncoderConfig, extension: &str, source: &Path) -> PathBuf {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "output".to_string());
    let file_name = format!("{}{}.{}", stem, config.output_suffix, extension);

    match &config.output_dir {
        Some(dir) => dir.join(file_name),
        None => source
            .parent()
            .map(|p| p.join(&file_name))
            .unwrap_or_else(|| PathBuf::from(&file_name)),
    }
}

fn push_audio_args(args: &mut Vec<String>, profile: &AudioProfile) {
    args.extend(["-c:a".to_string(), profile.format.ffmpeg_codec().to_string()]);

    if profile.format.is_lossless() {
        if let Some(level) = profile.compression_level {
            args.extend(["-compression_level".to_string(), level.to_string()]);
        }
    } else if let Some(bitrate) = profile.bitrate_kbps {
        args.extend(["-b:a".to_string(), format!("{}k", bitrate)]);
    }

    if let Some(rate) = profile.sample_rate_hz {
        args.extend(["-ar".to_string(), rate.to_string()]);
    }

    if let Some(channels) = profile.channels {
        args.extend(["-ac".to_string(), channels.to_string()]);
    }
}

fn push_video_args(args: &mut Vec<String>, profile: &VideoProfile) {
    args.extend(["-c:v".to_string(), profile.format.ffmpeg_codec().to_string()]);

    if profile.format != VideoFormat::Copy {
        if let Some(crf) = profile.crf {
            args.extend(["-crf".to_string(), crf.to_string()]);
        } else if let Some(bitrate) = profile.bitrate_kbps {
            args.extend(["-b:v".to_string(), format!("{}k", bitrate)]);
        }

        if let Some(ref preset) = profile.preset {
            args.extend(["-preset".to_string(), preset.clone()]);
        }

        // Only downscale, keeping the aspect ratio
        if profile.max_width.is_some() || profile.max_height.is_some() {
            let width = profile.max_width.unwrap_or(u32::MAX);
            let height = profile.max_height.unwrap_or(u32::MAX);
            args.extend([
                "-vf".to_string(),
                format!(
                    "scale='min({},iw)':'min({},ih)':force_original_aspect_ratio=decrease",
                    width, height
                ),
            ]);
        }
    }

    match profile.audio {
        Some(ref audio) => push_audio_args(args, audio),
        None => args.extend(["-c:a".to_string(), "copy".to_string()]),
    }
}

/// Parses ffprobe JSON output into MediaInfo.
fn parse_probe_output(path: &Path, output: &str) -> Result<MediaInfo, EncodeError> {
    #[derive(Deserialize)]
    struct ProbeOutput {
        format: ProbeFormat,
    }

    #[derive(Deserialize)]
    struct ProbeFormat {
        format_name: String,
        duration: Option<String>,
    }

    let probe: ProbeOutput = serde_json::from_str(output).map_err(|e| EncodeError::ParseError {
        reason: format!("Failed to parse ffprobe output: {}", e),
    })?;

    let duration_secs = probe
        .format
        .duration
        .as_ref()
        .and_then(|d| d.parse::<f64>().ok())
        .unwrap_or(0.0);

    let format_name = probe
        .format
        .format_name
        .split(',')
        .next()
        .unwrap_or("unknown");

    Ok(MediaInfo {
        path: path.to_path_buf(),
        duration_secs,
        format: format_name.to_string(),
    })
}

/// Turns `-progress` key/value lines into non-decreasing percentages.
pub(crate) struct ProgressTracker {
    duration_secs: Option<f64>,
    last: Option<Percent>,
    out_time: Option<Regex>,
}

impl ProgressTracker {
    pub(crate) fn new(duration_secs: Option<f64>) -> Self {
        Self {
            duration_secs,
            last: None,
            out_time: Regex::new(r"^out_time_(?:ms|us)=(\d+)$").ok(),
        }
    }

    /// Returns a percentage when `line` moves progress forward.
    pub(crate) fn update(&mut self, line: &str) -> Option<Percent> {
        let line = line.trim();
        let candidate = if line == "progress=end" {
            Percent::COMPLETE
        } else {
            // out_time_ms is in microseconds despite the name
            let micros = self
                .out_time
                .as_ref()?
                .captures(line)?
                .get(1)?
                .as_str()
                .parse::<f64>()
                .ok()?;
            let duration = self.duration_secs?;
            Percent::from_f64(micros / 1_000_000.0 / duration * 100.0)
        };
        self.advance(candidate)
    }

    /// Final 100% report, if not already emitted.
    pub(crate) fn finish(&mut self) -> Option<Percent> {
        self.advance(Percent::COMPLETE)
    }

    fn advance(&mut self, candidate: Percent) -> Option<Percent> {
        if self.last.is_some_and(|last| candidate <= last) {
            return None;
        }
        self.last = Some(candidate);
        Some(candidate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::types::{AudioFormat, ContainerFormat};

    fn strategy(kind: MediaKind) -> FfmpegStrategy {
        FfmpegStrategy::new(Arc::new(EncoderConfig::default()), kind)
    }

    #[test]
    fn test_build_audio_args_mp3() {
        let s = strategy(MediaKind::Audio(AudioProfile {
            format: AudioFormat::Mp3,
            bitrate_kbps: Some(320),
            sample_rate_hz: Some(44100),
            channels: None,
            compression_level: None,
        }));

        let args = s.build_args(Path::new("/input.flac"), Path::new("/output.mp3"));

        assert!(args.contains(&"libmp3lame".to_string()));
        assert!(args.contains(&"320k".to_string()));
        assert!(args.contains(&"44100".to_string()));
        assert!(args.contains(&"-vn".to_string()));
        assert_eq!(args.last().map(String::as_str), Some("/output.mp3"));
    }

    #[test]
    fn test_build_audio_args_flac() {
        let s = strategy(MediaKind::Audio(AudioProfile {
            format: AudioFormat::Flac,
            bitrate_kbps: Some(999),
            sample_rate_hz: None,
            channels: None,
            compression_level: Some(8),
        }));

        let args = s.build_args(Path::new("/input.wav"), Path::new("/output.flac"));

        assert!(args.contains(&"-compression_level".to_string()));
        assert!(args.contains(&"8".to_string()));
        // No bitrate for lossless
        assert!(!args.contains(&"-b:a".to_string()));
    }

    #[test]
    fn test_build_video_args() {
        let s = strategy(MediaKind::Video(VideoProfile {
            format: VideoFormat::H264,
            container: ContainerFormat::Mp4,
            crf: Some(23),
            bitrate_kbps: None,
            preset: Some("slow".to_string()),
            max_width: Some(1920),
            max_height: None,
            audio: None,
        }));

        let args = s.build_args(Path::new("/input.mkv"), Path::new("/output.mp4"));

        assert!(args.contains(&"libx264".to_string()));
        assert!(args.contains(&"23".to_string()));
        assert!(args.contains(&"slow".to_string()));
        assert!(args
            .iter()
            .any(|a| a.starts_with("scale='min(1920,iw)'")));
        let ca = args.iter().position(|a| a == "-c:a").unwrap();
        assert_eq!(args[ca + 1], "copy");

        let progress = args.iter().position(|a| a == "-progress").unwrap();
        assert_eq!(args[progress + 1], "pipe:1");
    }

    #[test]
    fn test_copy_video_skips_quality_args() {
        let s = strategy(MediaKind::Video(VideoProfile {
            format: VideoFormat::Copy,
            crf: Some(18),
            ..VideoProfile::default()
        }));
        let args = s.build_args(Path::new("/in.mkv"), Path::new("/out.mkv"));
        assert!(!args.contains(&"-crf".to_string()));
        assert!(!args.contains(&"-preset".to_string()));
    }

    #[test]
    fn test_output_path_next_to_source() {
        let config = EncoderConfig::default();
        assert_eq!(
            output_path(&config, "mkv", Path::new("/media/show/ep1.mp4")),
            PathBuf::from("/media/show/ep1_converted.mkv")
        );
    }

    #[test]
    fn test_output_path_in_output_dir() {
        let config = EncoderConfig::default().with_output_dir(PathBuf::from("/srv/out"));
        let s = FfmpegStrategy::new(Arc::new(config), MediaKind::Audio(AudioProfile::default()));
        assert_eq!(
            s.destination(Path::new("/music/song.flac")),
            PathBuf::from("/srv/out/song_converted.mp3")
        );
    }

    #[test]
    fn test_progress_tracker() {
        let mut tracker = ProgressTracker::new(Some(200.0));
        assert_eq!(tracker.update("frame=12"), None);
        assert_eq!(
            tracker.update("out_time_ms=50000000"),
            Some(Percent::from_f64(25.0))
        );
        // Repeated and earlier times are dropped
        assert_eq!(tracker.update("out_time_ms=50000000"), None);
        assert_eq!(tracker.update("out_time_us=10000000"), None);
        assert_eq!(
            tracker.update("out_time_us=100000000"),
            Some(Percent::from_f64(50.0))
        );
        assert_eq!(tracker.update("progress=end"), Some(Percent::COMPLETE));
        assert_eq!(tracker.finish(), None);
    }

    #[test]
    fn test_progress_tracker_without_duration() {
        let mut tracker = ProgressTracker::new(None);
        assert_eq!(tracker.update("out_time_ms=50000000"), None);
        assert_eq!(tracker.finish(), Some(Percent::COMPLETE));
    }

    #[test]
    fn test_parse_probe_output() {
        let json = r#"{
            "format": {
                "filename": "test.flac",
                "format_name": "flac",
                "duration": "180.5",
                "size": "30000000"
            },
            "streams": [
                {
                    "codec_type": "audio",
                    "codec_name": "flac",
                    "sample_rate": "44100",
                    "channels": 2
                }
            ]
        }"#;

        let info = parse_probe_output(Path::new("test.flac"), json).unwrap();
        assert_eq!(info.format, "flac");
        assert!((info.duration_secs - 180.5).abs() < 0.01);
        assert_eq!(info.path, Path::new("test.flac"));
    }

    #[test]
    fn test_parse_probe_output_video() {
        let json = r#"{
            "format": {
                "filename": "test.mkv",
                "format_name": "matroska,webm",
                "duration": "7200.0"
            },
            "streams": [
                {"codec_type": "video", "codec_name": "h264", "width": 1920, "height": 1080},
                {"codec_type": "audio", "codec_name": "aac"}
            ]
        }"#;

        let info = parse_probe_output(Path::new("test.mkv"), json).unwrap();
        assert_eq!(info.format, "matroska");
        assert!((info.duration_secs - 7200.0).abs() < 0.01);
    }

    #[test]
    fn test_parse_probe_output_invalid() {
        let err = parse_probe_output(Path::new("x"), "not json").unwrap_err();
        assert!(matches!(err, EncodeError::ParseError { .. }));
    }

    #[tokio::test]
    async fn test_encode_after_terminate_returns_immediately() {
        let s = strategy(MediaKind::Audio(AudioProfile::default()));
        s.terminate();
        let result = s
            .encode(
                Path::new("/nonexistent/in.flac"),
                Arc::new(|_| {}),
                Arc::new(|_| {}),
            )
            .await;
        assert!(matches!(result, Err(EncodeError::Terminated)));
    }

    #[tokio::test]
    async fn test_encode_missing_input() {
        let s = strategy(MediaKind::Audio(AudioProfile::default()));
        let result = s
            .encode(
                Path::new("/nonexistent/in.flac"),
                Arc::new(|_| {}),
                Arc::new(|_| {}),
            )
            .await;
        assert!(matches!(result, Err(EncodeError::InputNotFound { .. })));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_encode_tolerates_non_utf8_log_lines() {
        use std::os::unix::fs::PermissionsExt;
        use std::sync::Mutex;

        let dir = tempfile::tempdir().unwrap();
        // Stands in for ffmpeg: Latin-1 metadata on stderr, then writes the
        // output (last argument) and exits cleanly
        let fake_ffmpeg = dir.path().join("ffmpeg");
        std::fs::write(
            &fake_ffmpeg,
            "#!/bin/sh\nprintf 'title : Caf\\351\\r\\n' >&2\nprintf 'progress=end\\n'\nfor arg; do out=\"$arg\"; done\n: > \"$out\"\n",
        )
        .unwrap();
        std::fs::set_permissions(&fake_ffmpeg, std::fs::Permissions::from_mode(0o755)).unwrap();

        let source = dir.path().join("song.flac");
        std::fs::write(&source, b"flac").unwrap();

        let config = EncoderConfig::with_paths(fake_ffmpeg, dir.path().join("no-ffprobe"));
        let s = FfmpegStrategy::new(Arc::new(config), MediaKind::Audio(AudioProfile::default()));

        let lines = Arc::new(Mutex::new(Vec::new()));
        let progress = Arc::new(Mutex::new(Vec::new()));
        let on_log: LogLineCallback = {
            let lines = Arc::clone(&lines);
            Arc::new(move |line| lines.lock().unwrap().push(line))
        };
        let on_progress: ProgressCallback = {
            let progress = Arc::clone(&progress);
            Arc::new(move |percent| progress.lock().unwrap().push(percent))
        };

        let output = s.encode(&source, on_log, on_progress).await.unwrap();

        assert_eq!(output, dir.path().join("song_converted.mp3"));
        assert!(output.exists());
        assert_eq!(*lines.lock().unwrap(), vec!["title : Caf\u{FFFD}".to_string()]);
        assert_eq!(progress.lock().unwrap().last(), Some(&Percent::COMPLETE));
    }

    #[test]
    fn test_decode_line_strips_carriage_return() {
        assert_eq!(decode_line(b"frame=1\r"), "frame=1");
        assert_eq!(decode_line(b"Caf\xe9"), "Caf\u{FFFD}");
    }
}
