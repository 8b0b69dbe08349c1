//! FFmpegTranscoder - HLS packaging and poster extraction through the ffmpeg CLI.

use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

use crate::error::TranscodeError;
use crate::video::ladder::Rendition;
use crate::video::transcoder::Transcoder;
use clipvault_core::constants::{MASTER_MANIFEST_NAME, VARIANT_MANIFEST_NAME};

/// Characters of stderr kept for error reports.
pub const STDERR_TAIL_CHARS: usize = 20_000;

#[derive(Debug, Clone)]
pub struct FFmpegTranscoder {
    ffmpeg_path: String,
    ffprobe_path: String,
    timeout: Option<Duration>,
}

impl FFmpegTranscoder {
    pub fn new(ffmpeg_path: impl Into<String>) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
            ffprobe_path: "ffprobe".to_string(),
            timeout: None,
        }
    }

    pub fn with_ffprobe(mut self, ffprobe_path: impl Into<String>) -> Self {
        self.ffprobe_path = ffprobe_path.into();
        self
    }

    /// Kill any single ffmpeg invocation that runs longer than `timeout`.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    fn poster_args(input: &Path, output: &Path, offset_secs: f64) -> Vec<String> {
        vec![
            "-y".to_string(),
            "-hide_banner".to_string(),
            "-ss".to_string(),
            format!("{}", offset_secs),
            "-i".to_string(),
            input.to_string_lossy().to_string(),
            "-frames:v".to_string(),
            "1".to_string(),
            "-q:v".to_string(),
            "2".to_string(),
            output.to_string_lossy().to_string(),
        ]
    }

    /// List the index of every audio stream, one per line.
    fn audio_stream_args(input: &Path) -> Vec<String> {
        vec![
            "-v".to_string(),
            "error".to_string(),
            "-select_streams".to_string(),
            "a".to_string(),
            "-show_entries".to_string(),
            "stream=index".to_string(),
            "-of".to_string(),
            "csv=p=0".to_string(),
            input.to_string_lossy().to_string(),
        ]
    }

    /// Single-pass multi-rendition encode. Paths are relative to the output directory,
    /// which becomes the process working directory.
    fn hls_args(
        input: &Path,
        ladder: &[Rendition],
        segment_duration: u64,
        has_audio: bool,
    ) -> Vec<String> {
        let mut filter = format!("[0:v]split={}", ladder.len());
        for index in 0..ladder.len() {
            filter.push_str(&format!("[v{}in]", index));
        }
        for (index, rendition) in ladder.iter().enumerate() {
            filter.push_str(&format!(
                ";[v{i}in]scale=w=-2:h={h}[v{i}out]",
                i = index,
                h = rendition.height
            ));
        }

        let mut args = vec![
            "-y".to_string(),
            "-hide_banner".to_string(),
            "-i".to_string(),
            input.to_string_lossy().to_string(),
            "-filter_complex".to_string(),
            filter,
        ];

        for (index, rendition) in ladder.iter().enumerate() {
            let bitrate = rendition.video_bitrate_kbps;
            args.extend([
                "-map".to_string(),
                format!("[v{}out]", index),
                format!("-c:v:{}", index),
                "libx264".to_string(),
                format!("-b:v:{}", index),
                format!("{}k", bitrate),
                format!("-maxrate:v:{}", index),
                format!("{}k", bitrate * 6 / 5),
                format!("-bufsize:v:{}", index),
                format!("{}k", bitrate * 2),
            ]);
        }

        // The variant map pairs every rendition with the first audio track.
        if has_audio {
            for (index, rendition) in ladder.iter().enumerate() {
                args.extend([
                    "-map".to_string(),
                    "a:0".to_string(),
                    format!("-c:a:{}", index),
                    "aac".to_string(),
                    format!("-b:a:{}", index),
                    format!("{}k", rendition.audio_bitrate_kbps),
                ]);
            }
            args.extend(["-ac".to_string(), "2".to_string()]);
        }

        let stream_map = ladder
            .iter()
            .enumerate()
            .map(|(index, rendition)| {
                if has_audio {
                    format!("v:{i},a:{i},name:{}", rendition.name, i = index)
                } else {
                    format!("v:{},name:{}", index, rendition.name)
                }
            })
            .collect::<Vec<_>>()
            .join(" ");

        args.extend([
            "-preset".to_string(),
            "fast".to_string(),
            "-profile:v".to_string(),
            "main".to_string(),
            "-force_key_frames".to_string(),
            format!("expr:gte(t,n_forced*{})", segment_duration),
            "-f".to_string(),
            "hls".to_string(),
            "-hls_time".to_string(),
            segment_duration.to_string(),
            "-hls_playlist_type".to_string(),
            "vod".to_string(),
            "-hls_flags".to_string(),
            "independent_segments".to_string(),
            "-hls_segment_filename".to_string(),
            "%v/segment_%03d.ts".to_string(),
            "-master_pl_name".to_string(),
            MASTER_MANIFEST_NAME.to_string(),
            "-var_stream_map".to_string(),
            stream_map,
            format!("%v/{}", VARIANT_MANIFEST_NAME),
        ]);

        args
    }

    /// Run ffmpeg to completion, racing the deadline and `cancel`.
    ///
    /// The child is killed on timeout, cancellation, or when this future is dropped.
    async fn run(
        &self,
        stage: &'static str,
        args: &[String],
        working_dir: Option<&Path>,
        cancel: &CancellationToken,
    ) -> Result<(), TranscodeError> {
        run_command(
            &self.ffmpeg_path,
            stage,
            args,
            working_dir,
            self.timeout,
            cancel,
        )
        .await
        .map(|_| ())
    }
}

#[async_trait]
impl Transcoder for FFmpegTranscoder {
    #[tracing::instrument(skip(self, input, output, cancel))]
    async fn extract_poster(
        &self,
        input: &Path,
        output: &Path,
        offset_secs: f64,
        cancel: &CancellationToken,
    ) -> Result<(), TranscodeError> {
        let args = Self::poster_args(input, output, offset_secs);
        self.run("poster", &args, None, cancel).await
    }

    async fn has_audio(
        &self,
        input: &Path,
        cancel: &CancellationToken,
    ) -> Result<bool, TranscodeError> {
        let args = Self::audio_stream_args(input);
        let stdout = run_command(
            &self.ffprobe_path,
            "inspect",
            &args,
            None,
            self.timeout,
            cancel,
        )
        .await?;
        let has_audio = lists_streams(&stdout);
        tracing::debug!(has_audio, "Inspected source streams");
        Ok(has_audio)
    }

    #[tracing::instrument(skip(self, input, output_dir, ladder, cancel), fields(renditions = ladder.len()))]
    async fn transcode_hls(
        &self,
        input: &Path,
        output_dir: &Path,
        ladder: &[Rendition],
        segment_duration: u64,
        has_audio: bool,
        cancel: &CancellationToken,
    ) -> Result<(), TranscodeError> {
        for rendition in ladder {
            tokio::fs::create_dir_all(output_dir.join(rendition.name)).await?;
        }
        let input = tokio::fs::canonicalize(input).await?;
        let args = Self::hls_args(&input, ladder, segment_duration, has_audio);
        self.run("hls", &args, Some(output_dir), cancel).await
    }
}

/// True when ffprobe printed at least one stream entry.
fn lists_streams(stdout: &str) -> bool {
    stdout.lines().any(|line| !line.trim().is_empty())
}

/// Spawn `program`, collect a bounded stderr tail and wait for it to exit.
///
/// Returns the (bounded) standard output on success.
pub(crate) async fn run_command(
    program: &str,
    stage: &'static str,
    args: &[String],
    working_dir: Option<&Path>,
    timeout: Option<Duration>,
    cancel: &CancellationToken,
) -> Result<String, TranscodeError> {
    let start = std::time::Instant::now();

    let mut command = Command::new(program);
    command
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(dir) = working_dir {
        command.current_dir(dir);
    }

    let mut child = command.spawn().map_err(|source| TranscodeError::Spawn {
        program: program.to_string(),
        source,
    })?;

    let stderr_reader = child
        .stderr
        .take()
        .map(|stderr| tokio::spawn(read_tail(stderr, STDERR_TAIL_CHARS)));
    let stdout_reader = child
        .stdout
        .take()
        .map(|stdout| tokio::spawn(read_tail(stdout, STDERR_TAIL_CHARS)));

    let deadline = async {
        match timeout {
            Some(after) => tokio::time::sleep(after).await,
            None => std::future::pending::<()>().await,
        }
    };

    let outcome = tokio::select! {
        status = child.wait() => status.map_err(TranscodeError::from),
        _ = deadline => Err(TranscodeError::TimedOut {
            stage,
            after: timeout.unwrap_or_default(),
        }),
        _ = cancel.cancelled() => Err(TranscodeError::Cancelled { stage }),
    };

    let status = match outcome {
        Ok(status) => status,
        Err(e) => {
            if let Err(kill_err) = child.kill().await {
                tracing::warn!(error = %kill_err, stage, "Failed to kill transcoder");
            }
            for reader in [stderr_reader, stdout_reader].into_iter().flatten() {
                reader.abort();
            }
            tracing::warn!(
                error = %e,
                stage,
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "Transcoder stopped"
            );
            return Err(e);
        }
    };

    let stderr_tail = match stderr_reader {
        Some(reader) => reader.await.unwrap_or_default(),
        None => String::new(),
    };
    let stdout = match stdout_reader {
        Some(reader) => reader.await.unwrap_or_default(),
        None => String::new(),
    };

    if status.success() {
        tracing::debug!(
            stage,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Transcoder finished"
        );
        Ok(stdout)
    } else {
        tracing::error!(
            stage,
            exit_code = ?status.code(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Transcoder failed"
        );
        Err(TranscodeError::Failed {
            stage,
            exit_code: status.code(),
            stderr_tail,
        })
    }
}

/// Drain `reader`, keeping only the last `max_chars` characters.
async fn read_tail<R>(mut reader: R, max_chars: usize) -> String
where
    R: AsyncRead + Unpin,
{
    // UTF-8 needs at most four bytes per character
    let max_bytes = max_chars * 4;
    let mut kept: Vec<u8> = Vec::new();
    let mut buf = [0u8; 8192];

    loop {
        match reader.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                kept.extend_from_slice(&buf[..n]);
                if kept.len() > max_bytes * 2 {
                    kept.drain(..kept.len() - max_bytes);
                }
            }
        }
    }

    tail_chars(&String::from_utf8_lossy(&kept), max_chars)
}

fn tail_chars(text: &str, max_chars: usize) -> String {
    let count = text.chars().count();
    if count <= max_chars {
        text.to_string()
    } else {
        text.chars().skip(count - max_chars).collect()
    }
}
