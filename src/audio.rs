//! Typed audio events and the sink they are dispatched into.
//!
//! The engine never calls into the audio layer directly; it queues events and
//! the orchestrator drains them into a sink once per frame, fire-and-forget.

use std::io::Write;
use std::time::{Duration, Instant};

/// Rotation direction carried by `AudioEvent::Rotate`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotateDir {
    Cw,
    Ccw,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioEvent {
    Move,
    Rotate(RotateDir),
    Kick,
    SoftDrop,
    HardDrop,
    Lock,
    /// Clear of 1..=3 lines; four lines is `Tetris`.
    Clear(u32),
    Tetris,
    Combo(u32),
    LevelUp,
    GameOver,
    TimerWarn,
    TimerCritical,
    TimerExpired,
}

/// Consumer of audio events. Implementations may throttle freely.
pub trait AudioSink {
    fn emit(&mut self, event: AudioEvent);
}

/// Terminal "audio": rings the bell for the weighty events, throttled so a
/// burst of locks does not spam the terminal.
#[derive(Debug)]
pub struct BellSink {
    last_bell: Option<Instant>,
    min_gap: Duration,
}

impl Default for BellSink {
    fn default() -> Self {
        Self {
            last_bell: None,
            min_gap: Duration::from_millis(BASE_GAP_MS),
        }
    }
}

/// Bell throttle at zero stack tension, ms.
const BASE_GAP_MS: u64 = 150;

impl BellSink {
    /// Ambient hook: stack tension (0..=5 occupied bottom rows) tightens the
    /// throttle so the bell keeps up as the board fills.
    pub fn set_tension(&mut self, level: u32) {
        let gap = BASE_GAP_MS.saturating_sub(u64::from(level) * 20);
        self.min_gap = Duration::from_millis(gap);
    }
}

impl AudioSink for BellSink {
    fn emit(&mut self, event: AudioEvent) {
        let audible = matches!(
            event,
            AudioEvent::Clear(_)
                | AudioEvent::Tetris
                | AudioEvent::LevelUp
                | AudioEvent::GameOver
                | AudioEvent::TimerCritical
                | AudioEvent::TimerExpired
        );
        if !audible {
            return;
        }
        let now = Instant::now();
        if self.last_bell.is_some_and(|t| now.duration_since(t) < self.min_gap) {
            return;
        }
        self.last_bell = Some(now);
        let mut out = std::io::stdout();
        let _ = out.write_all(b"\x07");
        let _ = out.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tension_tightens_bell_gap() {
        let mut sink = BellSink::default();
        let base = sink.min_gap;
        sink.set_tension(5);
        assert!(sink.min_gap < base);
        sink.set_tension(0);
        assert_eq!(sink.min_gap, base);
    }
}
