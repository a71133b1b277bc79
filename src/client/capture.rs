//! # Capture
//!
//! The client's audio source. A WAV file stands in for the microphone: its
//! samples are cut into capture frames and sent at real-time pace, one frame
//! per frame duration, exactly as a live input would produce them.
//!
//! ## Input format:
//! - 16 kHz (no resampling is done)
//! - 16-bit PCM or 32-bit float
//! - multi-channel files are averaged down to mono

use crate::audio::codec::{encode_frame, pcm16_to_float, CAPTURE_FRAME_SAMPLES, INPUT_SAMPLE_RATE};
use crate::client::transport::ClientTransport;
use anyhow::{bail, Context, Result};
use std::fs::File;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info};
use wav::BitDepth;

pub struct FrameCapture {
    samples: Vec<f32>,
    frame_interval: Duration,
}

impl FrameCapture {
    pub fn from_samples(samples: Vec<f32>) -> Self {
        Self {
            samples,
            frame_interval: Self::frame_duration(),
        }
    }

    pub fn from_wav_file(path: &Path) -> Result<Self> {
        let mut file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
        let (header, data) = wav::read(&mut file).with_context(|| format!("Failed to read WAV file {}", path.display()))?;

        if header.sampling_rate != INPUT_SAMPLE_RATE {
            bail!(
                "{} is {} Hz, capture input must be {} Hz",
                path.display(),
                header.sampling_rate,
                INPUT_SAMPLE_RATE
            );
        }

        let interleaved: Vec<f32> = match data {
            BitDepth::Sixteen(samples) => samples.into_iter().map(pcm16_to_float).collect(),
            BitDepth::ThirtyTwoFloat(samples) => samples,
            _ => bail!("{}: only 16-bit PCM and 32-bit float WAV files are supported", path.display()),
        };

        let channels = usize::from(header.channel_count.max(1));
        let samples = if channels == 1 {
            interleaved
        } else {
            interleaved
                .chunks_exact(channels)
                .map(|frame| frame.iter().sum::<f32>() / channels as f32)
                .collect()
        };

        info!(
            path = %path.display(),
            samples = samples.len(),
            channels,
            "Loaded capture input"
        );
        Ok(Self::from_samples(samples))
    }

    /// Append silence so the upstream voice-activity detection sees the end
    /// of the utterance.
    pub fn with_trailing_silence(mut self, silence: Duration) -> Self {
        let count = (silence.as_secs_f64() * INPUT_SAMPLE_RATE as f64).round() as usize;
        self.samples.resize(self.samples.len() + count, 0.0);
        self
    }

    /// Send frames faster or slower than real time.
    pub fn with_frame_interval(mut self, interval: Duration) -> Self {
        self.frame_interval = interval;
        self
    }

    /// Real-time length of one full frame (256 ms).
    pub fn frame_duration() -> Duration {
        Duration::from_secs_f64(CAPTURE_FRAME_SAMPLES as f64 / INPUT_SAMPLE_RATE as f64)
    }

    pub fn frames(&self) -> std::slice::Chunks<'_, f32> {
        self.samples.chunks(CAPTURE_FRAME_SAMPLES)
    }

    pub fn frame_count(&self) -> usize {
        self.samples.len().div_ceil(CAPTURE_FRAME_SAMPLES)
    }

    /// How long sending every frame takes at the configured pace.
    pub fn duration(&self) -> Duration {
        self.frame_interval * self.frame_count() as u32
    }

    /// Start sending frames through `transport`. Frames the transport
    /// refuses (socket not open) are dropped, not retried.
    pub fn start(self, transport: ClientTransport) -> CaptureHandle {
        let stop = Arc::new(AtomicBool::new(false));
        let task_stop = stop.clone();

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.frame_interval);
            let mut sent = 0;
            for frame in self.frames() {
                ticker.tick().await;
                if task_stop.load(Ordering::SeqCst) {
                    break;
                }
                if transport.send_audio_frame(encode_frame(frame)) {
                    sent += 1;
                }
            }
            debug!(sent, total = self.frame_count(), "Capture finished");
            sent
        });

        CaptureHandle { stop, task }
    }
}

/// A running capture.
pub struct CaptureHandle {
    stop: Arc<AtomicBool>,
    task: JoinHandle<usize>,
}

impl CaptureHandle {
    /// Stop after the frame in flight.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the capture to end; returns the number of frames sent.
    pub async fn finished(self) -> Result<usize> {
        self.task.await.context("Capture task failed")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wav::{Header, WAV_FORMAT_PCM};

    #[test]
    fn test_frames_and_trailing_silence() {
        let capture = FrameCapture::from_samples(vec![0.1; 10_000]);
        let sizes: Vec<usize> = capture.frames().map(<[f32]>::len).collect();
        assert_eq!(sizes, vec![4096, 4096, 1808]);

        let capture = capture.with_trailing_silence(FrameCapture::frame_duration());
        assert_eq!(capture.frame_count(), 4);
        assert_eq!(capture.frames().last().unwrap().iter().sum::<f32>(), 0.0);
    }

    #[test]
    fn test_reads_stereo_wav_as_mono() {
        let file = tempfile::Builder::new().suffix(".wav").tempfile().unwrap();
        let header = Header::new(WAV_FORMAT_PCM, 2, INPUT_SAMPLE_RATE, 16);
        let data = BitDepth::Sixteen(vec![16384, 0, -16384, -16384]);
        wav::write(header, &data, &mut File::create(file.path()).unwrap()).unwrap();

        let capture = FrameCapture::from_wav_file(file.path()).unwrap();
        let frame: Vec<f32> = capture.frames().next().unwrap().to_vec();
        assert_eq!(frame, vec![0.25, -0.5]);
    }

    #[test]
    fn test_rejects_wrong_sample_rate() {
        let file = tempfile::Builder::new().suffix(".wav").tempfile().unwrap();
        let header = Header::new(WAV_FORMAT_PCM, 1, 44_100, 16);
        wav::write(header, &BitDepth::Sixteen(vec![0; 8]), &mut File::create(file.path()).unwrap()).unwrap();

        let err = FrameCapture::from_wav_file(file.path()).err().unwrap();
        assert!(err.to_string().contains("44100 Hz"));
    }

    #[tokio::test]
    async fn test_frames_are_dropped_while_disconnected() {
        let capture = FrameCapture::from_samples(vec![0.0; CAPTURE_FRAME_SAMPLES * 3])
            .with_frame_interval(Duration::from_millis(1));

        let handle = capture.start(ClientTransport::new());
        assert_eq!(handle.finished().await.unwrap(), 0);
    }
}
