//! # Playback Queue
//!
//! Synthesized speech arrives as many short chunks. Played as they arrive
//! they would overlap; the queue plays them strictly one after another.
//!
//! ## State machine:
//! - `Idle` + enqueue → start the chunk now, go `Playing`
//! - `Playing` + enqueue → append, never preempt
//! - `Playing` + finished → start the next pending chunk, or go `Idle`
//! - close → drop pending chunks, go `Idle`, close the sink
//!
//! The sink reports completion by the owner calling `on_finished`, so a
//! second `start` can never begin before the first one ends.

use crate::audio::codec::PlayableBuffer;
use std::collections::VecDeque;

/// Where decoded audio is played. Implemented by the client's recorder and
/// by test doubles.
pub trait PlaybackSink {
    /// Begin playing `buffer`. The owner calls `PlaybackQueue::on_finished`
    /// once it has finished.
    fn start(&mut self, buffer: PlayableBuffer);

    /// Release the output device.
    fn close(&mut self) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    Playing,
}

pub struct PlaybackQueue<S: PlaybackSink> {
    sink: S,
    pending: VecDeque<PlayableBuffer>,
    state: PlaybackState,
}

impl<S: PlaybackSink> PlaybackQueue<S> {
    pub fn new(sink: S) -> Self {
        Self {
            sink,
            pending: VecDeque::new(),
            state: PlaybackState::Idle,
        }
    }

    pub fn enqueue(&mut self, buffer: PlayableBuffer) {
        match self.state {
            PlaybackState::Idle => {
                self.state = PlaybackState::Playing;
                self.sink.start(buffer);
            }
            PlaybackState::Playing => self.pending.push_back(buffer),
        }
    }

    /// The chunk that was playing has ended.
    pub fn on_finished(&mut self) {
        match self.pending.pop_front() {
            Some(next) => {
                self.state = PlaybackState::Playing;
                self.sink.start(next);
            }
            None => self.state = PlaybackState::Idle,
        }
    }

    pub fn close(&mut self) {
        self.pending.clear();
        self.state = PlaybackState::Idle;
        self.sink.close();
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::codec::OUTPUT_SAMPLE_RATE;

    #[derive(Default)]
    struct RecordingSink {
        started: Vec<usize>,
        active: usize,
        max_active: usize,
        closed: bool,
    }

    impl PlaybackSink for RecordingSink {
        fn start(&mut self, buffer: PlayableBuffer) {
            self.active += 1;
            self.max_active = self.max_active.max(self.active);
            self.started.push(buffer.samples.len());
        }

        fn close(&mut self) {
            self.closed = true;
        }
    }

    fn chunk(len: usize) -> PlayableBuffer {
        PlayableBuffer {
            samples: vec![0.0; len],
            sample_rate: OUTPUT_SAMPLE_RATE,
        }
    }

    fn finish(queue: &mut PlaybackQueue<RecordingSink>) {
        queue.sink_mut().active -= 1;
        queue.on_finished();
    }

    #[test]
    fn test_chunks_play_in_arrival_order_without_overlap() {
        let mut queue = PlaybackQueue::new(RecordingSink::default());

        queue.enqueue(chunk(1));
        queue.enqueue(chunk(2));
        queue.enqueue(chunk(3));
        assert_eq!(queue.state(), PlaybackState::Playing);
        assert_eq!(queue.sink().started, vec![1]);
        assert_eq!(queue.pending(), 2);

        finish(&mut queue);
        finish(&mut queue);
        assert_eq!(queue.sink().started, vec![1, 2, 3]);

        finish(&mut queue);
        assert_eq!(queue.state(), PlaybackState::Idle);
        assert_eq!(queue.sink().max_active, 1);
    }

    #[test]
    fn test_enqueue_after_idle_starts_immediately() {
        let mut queue = PlaybackQueue::new(RecordingSink::default());
        queue.enqueue(chunk(4));
        finish(&mut queue);
        assert_eq!(queue.state(), PlaybackState::Idle);

        queue.enqueue(chunk(5));
        assert_eq!(queue.sink().started, vec![4, 5]);
        assert_eq!(queue.state(), PlaybackState::Playing);
    }

    #[test]
    fn test_close_drops_pending_and_closes_sink() {
        let mut queue = PlaybackQueue::new(RecordingSink::default());
        queue.enqueue(chunk(1));
        queue.enqueue(chunk(2));

        queue.close();
        assert_eq!(queue.state(), PlaybackState::Idle);
        assert_eq!(queue.pending(), 0);
        assert!(queue.sink().closed);
    }
}
