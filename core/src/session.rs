//! Host-facing decode lifecycle
//!
//! A [`DecodeSession`] holds at most one [`Robot36Decoder`] behind a single
//! lock, so an audio thread can feed while a UI thread polls progress.
//! Starting a new session swaps the old decoder out under the lock; a reader
//! never observes a decoder that is being torn down.

use parking_lot::Mutex;

use crate::decoder::{DecoderState, Robot36Decoder};

/// Point-in-time copy of decoder output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Progress {
    /// Scan lines decoded so far (0..=240)
    pub line: usize,
    /// 320x240 ARGB frame, top row first; undecoded rows are opaque black
    pub pixels: Vec<u32>,
    pub state: DecoderState,
    pub completed: bool,
}

impl Progress {
    pub fn state_name(&self) -> &'static str {
        self.state.name()
    }
}

#[derive(Default)]
pub struct DecodeSession {
    decoder: Mutex<Option<Robot36Decoder>>,
}

impl DecodeSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin a fresh decode, discarding any decode in progress
    pub fn start(&self, sample_rate: u32) {
        let decoder = Robot36Decoder::new(sample_rate);
        let previous = self.decoder.lock().replace(decoder);
        if let Some(previous) = previous {
            log::debug!(
                "Replaced active decoder at line {} ({})",
                previous.line(),
                previous.state()
            );
        }
    }

    /// Feed audio to the active decoder; a no-op when none is active
    pub fn feed(&self, samples: &[f32], rate_hint: u32) {
        if let Some(decoder) = self.decoder.lock().as_mut() {
            decoder.feed(samples, rate_hint);
        }
    }

    /// Snapshot of the active decoder, or `None` before `start` / after `stop`
    pub fn progress(&self) -> Option<Progress> {
        self.decoder.lock().as_ref().map(Robot36Decoder::progress)
    }

    /// End the session, returning the final decoder if one was active
    pub fn stop(&self) -> Option<Robot36Decoder> {
        self.decoder.lock().take()
    }

    pub fn is_active(&self) -> bool {
        self.decoder.lock().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{IMAGE_HEIGHT, IMAGE_WIDTH, OPAQUE_BLACK};

    #[test]
    fn test_operations_before_start_are_noops() {
        let session = DecodeSession::new();
        assert!(!session.is_active());
        session.feed(&[0.1, 0.2, 0.3], 48000);
        assert!(session.progress().is_none());
        assert!(session.stop().is_none());
    }

    #[test]
    fn test_start_exposes_black_frame() {
        let session = DecodeSession::new();
        session.start(48000);
        let progress = session.progress().unwrap();
        assert_eq!(progress.line, 0);
        assert_eq!(progress.state_name(), "Idle");
        assert!(!progress.completed);
        assert_eq!(progress.pixels.len(), IMAGE_WIDTH * IMAGE_HEIGHT);
        assert!(progress.pixels.iter().all(|&p| p == OPAQUE_BLACK));
    }

    #[test]
    fn test_restart_discards_previous_decoder() {
        let session = DecodeSession::new();
        session.start(44100);
        session.feed(&[0.0; 500], 0);
        session.start(44100);
        let decoder = session.stop().unwrap();
        assert_eq!(decoder.buffered(), 0);
        assert!(!session.is_active());
    }

    #[test]
    fn test_stop_returns_decoder() {
        let session = DecodeSession::new();
        session.start(22050);
        let decoder = session.stop().unwrap();
        assert_eq!(decoder.input_rate(), 22050);
        assert!(session.progress().is_none());
    }

    #[test]
    fn test_session_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<DecodeSession>();
    }
}
