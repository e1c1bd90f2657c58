use std::time::Duration;
use tokio::time::Instant;

/// True when any unsigned 8-bit time-domain sample strays more than
/// `threshold` from the 128 midpoint.
pub fn detect_speech(frame: &[u8], threshold: u8) -> bool {
    frame.iter().any(|&sample| sample.abs_diff(128) > threshold)
}

/// Debounces raw speech verdicts into the published speaking flag.
///
/// Speaking turns on with the first voiced frame and stays on for `hangover`
/// after the last one. Muting forces it off. Every method returns the new flag
/// only when it changed, so callers write presence on edges alone.
#[derive(Debug, Clone)]
pub struct SpeakingGate {
    hangover: Duration,
    muted: bool,
    published: bool,
    last_voiced: Option<Instant>,
}

impl SpeakingGate {
    pub fn new(hangover: Duration) -> Self {
        Self {
            hangover,
            muted: false,
            published: false,
            last_voiced: None,
        }
    }

    pub fn is_speaking(&self) -> bool {
        self.published
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    pub fn observe(&mut self, voiced: bool, now: Instant) -> Option<bool> {
        if voiced && !self.muted {
            self.last_voiced = Some(now);
            return self.publish(true);
        }
        self.refresh(now)
    }

    /// Re-evaluate without a new frame, e.g. when the hangover expires.
    pub fn refresh(&mut self, now: Instant) -> Option<bool> {
        let speaking = !self.muted
            && self
                .last_voiced
                .is_some_and(|at| now.saturating_duration_since(at) < self.hangover);
        self.publish(speaking)
    }

    pub fn set_muted(&mut self, muted: bool) -> Option<bool> {
        self.muted = muted;
        if muted {
            self.last_voiced = None;
            return self.publish(false);
        }
        None
    }

    /// When the published flag would drop if no further voice arrives. `None`
    /// without a hangover, where the next silent frame drops it.
    pub fn expiry(&self) -> Option<Instant> {
        if !self.published || self.hangover.is_zero() {
            return None;
        }
        self.last_voiced.map(|at| at + self.hangover)
    }

    fn publish(&mut self, speaking: bool) -> Option<bool> {
        if speaking == self.published {
            return None;
        }
        self.published = speaking;
        Some(speaking)
    }
}
