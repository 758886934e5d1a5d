//! Chord decoder
//!
//! Turns finger activations into chord codes. The first activation of a
//! chord is held until either a second activation arrives (double chord) or
//! the apply delay elapses (single chord). The decoder owns no timer: the
//! caller sleeps until [`ChordDecoder::deadline`] and then calls
//! [`ChordDecoder::poll_timeout`].

use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use super::code::{ChordCode, Finger, FingerVector};

/// Default disambiguation window
pub const DEFAULT_APPLY_DELAY: Duration = Duration::from_millis(1000);

/// Window during which a second activation extends a chord
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApplyDelay(Duration);

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("apply delay must be greater than zero")]
pub struct InvalidApplyDelay;

impl ApplyDelay {
    pub fn new(delay: Duration) -> Result<Self, InvalidApplyDelay> {
        if delay.is_zero() {
            return Err(InvalidApplyDelay);
        }
        Ok(Self(delay))
    }

    pub fn from_millis(millis: u64) -> Result<Self, InvalidApplyDelay> {
        Self::new(Duration::from_millis(millis))
    }

    pub fn duration(self) -> Duration {
        self.0
    }

    pub fn as_millis(self) -> u64 {
        self.0.as_millis() as u64
    }
}

impl Default for ApplyDelay {
    fn default() -> Self {
        Self(DEFAULT_APPLY_DELAY)
    }
}

/// First half of a chord waiting for its second finger or its deadline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PendingChord {
    first: Finger,
    deadline: Instant,
}

/// Stateful single-/double-chord disambiguator
#[derive(Debug, Default)]
pub struct ChordDecoder {
    apply_delay: ApplyDelay,
    pending: Option<PendingChord>,
}

impl ChordDecoder {
    pub fn new(apply_delay: ApplyDelay) -> Self {
        Self {
            apply_delay,
            pending: None,
        }
    }

    pub fn apply_delay(&self) -> ApplyDelay {
        self.apply_delay
    }

    /// Change the window used for the next chord.
    ///
    /// An already pending chord keeps the deadline it was armed with.
    pub fn set_apply_delay(&mut self, apply_delay: ApplyDelay) {
        self.apply_delay = apply_delay;
    }

    /// Deadline of the pending chord, if one is waiting
    pub fn deadline(&self) -> Option<Instant> {
        self.pending.map(|pending| pending.deadline)
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Feed a finger snapshot taken at `now`.
    ///
    /// Released snapshots (no active finger) are ignored. Returns the chord
    /// code when this activation completes a double chord.
    pub fn on_finger_event(&mut self, fingers: FingerVector, now: Instant) -> Option<ChordCode> {
        let active = fingers.first_active()?;

        match self.pending.take() {
            None => {
                self.arm(active, now);
                None
            }
            Some(pending) => {
                let code = ChordCode::double(pending.first, active);
                debug!(first = %pending.first, second = %active, %code, "double chord");
                Some(code)
            }
        }
    }

    /// Resolve the pending chord as a single chord if its deadline has passed
    pub fn poll_timeout(&mut self, now: Instant) -> Option<ChordCode> {
        let pending = self.pending.filter(|pending| now >= pending.deadline)?;
        self.pending = None;

        let code = ChordCode::single(pending.first);
        debug!(first = %pending.first, %code, "single chord timed out");
        Some(code)
    }

    /// Drop the pending chord without resolving it.
    ///
    /// Returns `true` if a chord was discarded.
    pub fn cancel(&mut self) -> bool {
        let discarded = self.pending.take();
        if let Some(pending) = discarded {
            debug!(first = %pending.first, "pending chord cancelled");
        }
        discarded.is_some()
    }

    fn arm(&mut self, first: Finger, now: Instant) {
        assert!(
            self.pending.is_none(),
            "chord decoder armed twice; finger events were mis-sequenced"
        );

        let deadline = now + self.apply_delay.duration();
        debug!(%first, delay_ms = self.apply_delay.as_millis(), "chord pending");
        self.pending = Some(PendingChord { first, deadline });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn finger(n: u8) -> Finger {
        Finger::new(n).unwrap()
    }

    fn press(n: u8) -> FingerVector {
        FingerVector::only(finger(n))
    }

    fn ms(millis: u64) -> Duration {
        Duration::from_millis(millis)
    }

    #[test]
    fn test_apply_delay_rejects_zero() {
        assert_eq!(ApplyDelay::from_millis(0), Err(InvalidApplyDelay));
        assert_eq!(ApplyDelay::default().as_millis(), 1000);
    }

    #[test]
    fn test_single_chord_resolves_after_delay() {
        let t0 = Instant::now();
        for f in 1..=5 {
            let mut decoder = ChordDecoder::default();
            assert_eq!(decoder.on_finger_event(press(f), t0), None);
            assert_eq!(decoder.deadline(), Some(t0 + ms(1000)));

            assert_eq!(decoder.poll_timeout(t0 + ms(999)), None);
            assert!(decoder.is_pending());

            let code = decoder.poll_timeout(t0 + ms(1000));
            assert_eq!(code.map(ChordCode::value), Some(f));
            assert!(!decoder.is_pending());
        }
    }

    #[test]
    fn test_double_chord_within_window() {
        let t0 = Instant::now();
        for f1 in 1..=5u8 {
            for f2 in 1..=5u8 {
                let mut decoder = ChordDecoder::default();
                assert_eq!(decoder.on_finger_event(press(f1), t0), None);

                let code = decoder.on_finger_event(press(f2), t0 + ms(400));
                assert_eq!(code.map(ChordCode::value), Some(f1 * 5 + f2));

                // The first finger's timer never fires afterwards.
                assert_eq!(decoder.deadline(), None);
                assert_eq!(decoder.poll_timeout(t0 + ms(10_000)), None);
            }
        }
    }

    #[test]
    fn test_released_vector_is_ignored() {
        let t0 = Instant::now();
        let mut decoder = ChordDecoder::default();

        assert_eq!(decoder.on_finger_event(FingerVector::default(), t0), None);
        assert!(!decoder.is_pending());

        decoder.on_finger_event(press(2), t0);
        assert_eq!(decoder.on_finger_event(FingerVector::default(), t0 + ms(10)), None);
        assert_eq!(decoder.deadline(), Some(t0 + ms(1000)));
    }

    #[test]
    fn test_multiple_active_fingers_use_lowest() {
        let t0 = Instant::now();
        let mut decoder = ChordDecoder::default();

        decoder.on_finger_event(FingerVector::new([false, true, false, true, false]), t0);
        let code = decoder.on_finger_event(FingerVector::new([false, false, true, true, true]), t0);
        assert_eq!(code.map(ChordCode::value), Some(2 * 5 + 3));
    }

    #[test]
    fn test_event_after_timeout_starts_new_chord() {
        let t0 = Instant::now();
        let mut decoder = ChordDecoder::default();

        decoder.on_finger_event(press(1), t0);
        assert_eq!(decoder.poll_timeout(t0 + ms(1000)).map(ChordCode::value), Some(1));

        // No rollover: the next activation is the first half of a new chord.
        assert_eq!(decoder.on_finger_event(press(3), t0 + ms(1500)), None);
        assert_eq!(decoder.deadline(), Some(t0 + ms(2500)));
    }

    #[test]
    fn test_delay_change_applies_to_next_chord_only() {
        let t0 = Instant::now();
        let mut decoder = ChordDecoder::default();

        decoder.on_finger_event(press(1), t0);
        decoder.set_apply_delay(ApplyDelay::from_millis(200).unwrap());
        assert_eq!(decoder.deadline(), Some(t0 + ms(1000)));
        assert_eq!(decoder.poll_timeout(t0 + ms(500)), None);
        assert!(decoder.poll_timeout(t0 + ms(1000)).is_some());

        decoder.on_finger_event(press(1), t0 + ms(2000));
        assert_eq!(decoder.deadline(), Some(t0 + ms(2200)));
    }

    #[test]
    fn test_cancel_discards_pending_chord() {
        let t0 = Instant::now();
        let mut decoder = ChordDecoder::default();

        assert!(!decoder.cancel());
        decoder.on_finger_event(press(4), t0);
        assert!(decoder.cancel());
        assert_eq!(decoder.poll_timeout(t0 + ms(5000)), None);
    }
}
