//! Raw PCM decoding through an ffmpeg subprocess.
//!
//! Samples are delivered through a bounded channel so a slow consumer
//! applies backpressure to the decoder instead of buffering the whole
//! track in memory.

use std::path::Path;
use std::process::Stdio;

use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::command::forward_lines;
use crate::config::MediaConfig;
use crate::error::{MediaError, MediaResult};
use crate::sink::SharedSink;

/// Bytes read from the decoder per chunk.
const READ_CHUNK_BYTES: usize = 16 * 1024;

/// Chunks buffered between decoder and consumer.
const CHANNEL_DEPTH: usize = 8;

/// A running decode. Chunks arrive in stream order.
pub struct PcmStream {
    rx: mpsc::Receiver<Vec<i16>>,
    task: JoinHandle<MediaResult<()>>,
}

impl PcmStream {
    /// Next chunk of interleaved samples, or `None` at end of stream.
    pub async fn next_chunk(&mut self) -> Option<Vec<i16>> {
        self.rx.recv().await
    }

    /// Wait for the decoder task to exit.
    pub async fn finish(self) -> MediaResult<()> {
        drop(self.rx);
        self.task
            .await
            .map_err(|e| MediaError::internal(format!("decode task panicked: {}", e)))?
    }
}

/// Start decoding `path` to signed 16-bit little-endian PCM.
///
/// Failing to spawn ffmpeg is an error. A non-zero exit after spawning is
/// logged to `sink` and ends the stream early; whatever was decoded so far
/// is still delivered.
pub fn decode_audio_pcm(
    config: &MediaConfig,
    path: impl AsRef<Path>,
    sample_rate: u32,
    channels: u16,
    sink: SharedSink,
) -> MediaResult<PcmStream> {
    let path = path.as_ref();
    let args = decode_args(path, sample_rate, channels);
    debug!("Decoding PCM: {} {}", config.ffmpeg_path, args.join(" "));
    metrics::counter!("beatcut_ffmpeg_invocations_total", "kind" => "decode").increment(1);

    let mut child = Command::new(&config.ffmpeg_path)
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| MediaError::spawn_failed(&config.ffmpeg_path, e))?;

    let mut stdout = child
        .stdout
        .take()
        .ok_or_else(|| MediaError::internal("decoder stdout not captured"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| MediaError::internal("decoder stderr not captured"))?;

    let (tx, rx) = mpsc::channel(CHANNEL_DEPTH);

    let task = tokio::spawn(async move {
        let stderr_sink = sink.clone();
        let drain = tokio::spawn(async move {
            forward_lines(stderr, stderr_sink.as_ref(), 0).await;
        });

        let mut buf = vec![0u8; READ_CHUNK_BYTES];
        let mut carry = None;
        loop {
            let n = stdout.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            let samples = bytes_to_samples(&mut carry, &buf[..n]);
            if !samples.is_empty() && tx.send(samples).await.is_err() {
                // Consumer went away; stop the decoder.
                let _ = child.start_kill();
                break;
            }
        }
        drop(tx);

        let _ = drain.await;
        let status = child.wait().await?;
        if !status.success() {
            warn!("PCM decoder exited with {}", status);
            sink.line(&format!("ffmpeg decode exited with {}", status));
        }
        Ok::<(), MediaError>(())
    });

    Ok(PcmStream { rx, task })
}

fn decode_args(path: &Path, sample_rate: u32, channels: u16) -> Vec<String> {
    vec![
        "-v".to_string(),
        "error".to_string(),
        "-i".to_string(),
        path.to_string_lossy().to_string(),
        "-vn".to_string(),
        "-ac".to_string(),
        channels.to_string(),
        "-ar".to_string(),
        sample_rate.to_string(),
        "-f".to_string(),
        "s16le".to_string(),
        "pipe:1".to_string(),
    ]
}

/// Convert little-endian bytes to samples. An odd trailing byte is held in
/// `carry` and joined with the first byte of the next chunk.
fn bytes_to_samples(carry: &mut Option<u8>, bytes: &[u8]) -> Vec<i16> {
    let mut out = Vec::with_capacity(bytes.len() / 2 + 1);
    let mut rest = bytes;

    if let Some(lo) = carry.take() {
        match rest.split_first() {
            Some((&hi, tail)) => {
                out.push(i16::from_le_bytes([lo, hi]));
                rest = tail;
            }
            None => {
                *carry = Some(lo);
                return out;
            }
        }
    }

    let mut pairs = rest.chunks_exact(2);
    out.extend(pairs.by_ref().map(|p| i16::from_le_bytes([p[0], p[1]])));
    if let [b] = pairs.remainder() {
        *carry = Some(*b);
    }
    out
}
