//! A `PlaybackSink` that "plays" into memory at real-time pace.
//!
//! Each started buffer is appended to the recording, and a timer reports
//! completion after the buffer's duration, like a speaker would. The owner
//! forwards those completions to `PlaybackQueue::on_finished`.

use crate::audio::codec::{float_to_pcm16, PlayableBuffer, OUTPUT_SAMPLE_RATE};
use crate::audio::playback::PlaybackSink;
use anyhow::{Context, Result};
use std::fs::File;
use std::path::Path;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info};
use wav::{BitDepth, Header, WAV_FORMAT_PCM};

pub struct PacedRecorder {
    samples: Vec<f32>,
    sample_rate: u32,
    finished: mpsc::UnboundedSender<()>,
    chunks: usize,
}

impl PacedRecorder {
    /// The recorder plus the receiver of its "chunk finished" signals.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<()>) {
        let (finished, finished_rx) = mpsc::unbounded_channel();
        (
            Self {
                samples: Vec::new(),
                sample_rate: OUTPUT_SAMPLE_RATE,
                finished,
                chunks: 0,
            },
            finished_rx,
        )
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn chunks(&self) -> usize {
        self.chunks
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.samples.len() as f64 / self.sample_rate as f64)
    }

    /// Write everything recorded so far as 16-bit mono PCM.
    pub fn write_wav(&self, path: &Path) -> Result<()> {
        let header = Header::new(WAV_FORMAT_PCM, 1, self.sample_rate, 16);
        let data = BitDepth::Sixteen(self.samples.iter().copied().map(float_to_pcm16).collect());

        let mut file = File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
        wav::write(header, &data, &mut file).with_context(|| format!("Failed to write {}", path.display()))?;

        info!(
            path = %path.display(),
            chunks = self.chunks,
            seconds = self.duration().as_secs_f32(),
            "Saved synthesized audio"
        );
        Ok(())
    }
}

impl PlaybackSink for PacedRecorder {
    fn start(&mut self, buffer: PlayableBuffer) {
        let length = buffer.duration();
        self.sample_rate = buffer.sample_rate;
        self.samples.extend_from_slice(&buffer.samples);
        self.chunks += 1;

        let finished = self.finished.clone();
        tokio::spawn(async move {
            tokio::time::sleep(length).await;
            let _ = finished.send(());
        });
    }

    fn close(&mut self) {
        debug!(chunks = self.chunks, "Recorder closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::playback::{PlaybackQueue, PlaybackState};

    fn chunk(samples: usize) -> PlayableBuffer {
        PlayableBuffer {
            samples: vec![0.5; samples],
            sample_rate: OUTPUT_SAMPLE_RATE,
        }
    }

    #[tokio::test]
    async fn test_queue_drains_through_recorder() {
        let (recorder, mut finished) = PacedRecorder::new();
        let mut queue = PlaybackQueue::new(recorder);

        // 10 ms each
        queue.enqueue(chunk(240));
        queue.enqueue(chunk(240));
        assert_eq!(queue.sink().chunks(), 1);

        finished.recv().await.unwrap();
        queue.on_finished();
        assert_eq!(queue.sink().chunks(), 2);

        finished.recv().await.unwrap();
        queue.on_finished();
        assert_eq!(queue.state(), PlaybackState::Idle);
        assert_eq!(queue.sink().samples().len(), 480);
    }

    #[tokio::test]
    async fn test_write_wav_round_trips_header() {
        let (mut recorder, _finished) = PacedRecorder::new();
        recorder.start(chunk(2400));

        let file = tempfile::Builder::new().suffix(".wav").tempfile().unwrap();
        recorder.write_wav(file.path()).unwrap();

        let (header, data) = wav::read(&mut File::open(file.path()).unwrap()).unwrap();
        assert_eq!(header.sampling_rate, OUTPUT_SAMPLE_RATE);
        assert_eq!(header.channel_count, 1);
        match data {
            BitDepth::Sixteen(samples) => {
                assert_eq!(samples.len(), 2400);
                assert_eq!(samples[0], float_to_pcm16(0.5));
            }
            other => panic!("unexpected bit depth: {:?}", other),
        }
    }
}
