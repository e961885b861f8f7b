//! Session countdown timer: an explicit Stopped/Running/Paused/Expired machine.

use std::time::{Duration, Instant};

/// Discrete timer phase exposed to the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerPhase {
    Stopped,
    Running,
    Paused,
    Expired,
}

#[derive(Debug, Clone, Copy)]
enum State {
    Stopped,
    Running {
        t0: Instant,
        /// Accumulated time spent paused.
        paused: Duration,
    },
    Paused {
        t0: Instant,
        paused: Duration,
        entered: Instant,
    },
    Expired,
}

/// Countdown clock bounding a play session. Expiry is one-way until `reset`.
#[derive(Debug)]
pub struct SessionTimer {
    enabled: bool,
    duration: Duration,
    warn_30s: bool,
    warn_10s: bool,
    state: State,
}

impl SessionTimer {
    pub fn new(enabled: bool, duration_secs: u64, warn_30s: bool, warn_10s: bool) -> Self {
        Self {
            enabled,
            duration: Duration::from_secs(duration_secs),
            warn_30s,
            warn_10s,
            state: State::Stopped,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn phase(&self) -> TimerPhase {
        match self.state {
            State::Stopped => TimerPhase::Stopped,
            State::Running { .. } => TimerPhase::Running,
            State::Paused { .. } => TimerPhase::Paused,
            State::Expired => TimerPhase::Expired,
        }
    }

    pub fn start(&mut self, now: Instant) {
        match self.state {
            State::Stopped | State::Expired => {
                self.state = State::Running {
                    t0: now,
                    paused: Duration::ZERO,
                };
            }
            State::Paused { t0, paused, entered } => {
                self.state = State::Running {
                    t0,
                    paused: paused + now.duration_since(entered),
                };
            }
            State::Running { .. } => {}
        }
    }

    pub fn pause(&mut self, now: Instant) {
        if let State::Running { t0, paused } = self.state {
            self.state = State::Paused {
                t0,
                paused,
                entered: now,
            };
        }
    }

    pub fn resume(&mut self, now: Instant) {
        if let State::Paused { t0, paused, entered } = self.state {
            self.state = State::Running {
                t0,
                paused: paused + now.duration_since(entered),
            };
        }
    }

    pub fn reset(&mut self) {
        self.state = State::Stopped;
    }

    pub fn stop(&mut self) {
        if !matches!(self.state, State::Stopped) {
            self.state = State::Stopped;
        }
    }

    /// Flip the enable flag: enabling starts the clock, disabling stops it.
    pub fn toggle(&mut self, now: Instant) {
        if self.enabled {
            self.enabled = false;
            self.stop();
        } else {
            self.enabled = true;
            self.start(now);
        }
    }

    /// Follows the game's pause state so session time excludes pauses.
    pub fn set_game_paused(&mut self, paused: bool, now: Instant) {
        if paused {
            self.pause(now);
        } else {
            self.resume(now);
        }
    }

    /// Advance the clock. Returns true on the transition into Expired.
    pub fn tick(&mut self, now: Instant) -> bool {
        if matches!(self.state, State::Running { .. }) && self.remaining(now) == 0 {
            self.state = State::Expired;
            return true;
        }
        false
    }

    /// Whole seconds left. Frozen while paused, full duration while stopped.
    pub fn remaining(&self, now: Instant) -> u64 {
        let elapsed = match self.state {
            State::Stopped => return self.duration.as_secs(),
            State::Expired => return 0,
            State::Running { t0, paused } => now.duration_since(t0).saturating_sub(paused),
            State::Paused { t0, paused, entered } => {
                entered.duration_since(t0).saturating_sub(paused)
            }
        };
        self.duration.as_secs().saturating_sub(elapsed.as_millis() as u64 / 1000)
    }

    /// Warning band: remaining in (10, 30] seconds.
    pub fn is_warning(&self, now: Instant) -> bool {
        if !self.warn_30s || matches!(self.state, State::Stopped) {
            return false;
        }
        let r = self.remaining(now);
        r > 10 && r <= 30
    }

    /// Critical band: remaining at most 10 seconds.
    pub fn is_critical(&self, now: Instant) -> bool {
        if !self.warn_10s || matches!(self.state, State::Stopped) {
            return false;
        }
        self.remaining(now) <= 10
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(n: u64) -> Duration {
        Duration::from_secs(n)
    }

    #[test]
    fn test_stopped_until_started() {
        let now = Instant::now();
        let mut t = SessionTimer::new(true, 60, true, true);
        assert_eq!(t.phase(), TimerPhase::Stopped);
        assert_eq!(t.remaining(now), 60);
        assert!(!t.tick(now));
        t.start(now);
        assert_eq!(t.phase(), TimerPhase::Running);
    }

    #[test]
    fn test_countdown_and_expiry_once() {
        let now = Instant::now();
        let mut t = SessionTimer::new(true, 60, true, true);
        t.start(now);
        assert_eq!(t.remaining(now + secs(10)), 50);
        assert!(!t.tick(now + secs(59)));
        assert!(t.tick(now + secs(60)));
        assert_eq!(t.phase(), TimerPhase::Expired);
        // One-way: a later tick does not fire again.
        assert!(!t.tick(now + secs(61)));
        assert_eq!(t.remaining(now + secs(61)), 0);
    }

    #[test]
    fn test_pause_excludes_paused_time() {
        // D=60: run 10 s, pause 15 s, resume, run 50 s → expired exactly then.
        let now = Instant::now();
        let mut t = SessionTimer::new(true, 60, true, true);
        t.start(now);
        t.set_game_paused(true, now + secs(10));
        assert_eq!(t.phase(), TimerPhase::Paused);
        // Remaining holds at 50 for the whole pause.
        assert_eq!(t.remaining(now + secs(11)), 50);
        assert_eq!(t.remaining(now + secs(24)), 50);
        t.set_game_paused(false, now + secs(25));
        assert_eq!(t.remaining(now + secs(25)), 50);
        assert!(!t.tick(now + secs(74)));
        assert!(t.tick(now + secs(75)));
        assert_eq!(t.phase(), TimerPhase::Expired);
    }

    #[test]
    fn test_start_from_paused_accumulates() {
        let now = Instant::now();
        let mut t = SessionTimer::new(true, 30, true, true);
        t.start(now);
        t.pause(now + secs(5));
        t.start(now + secs(9));
        assert_eq!(t.phase(), TimerPhase::Running);
        assert_eq!(t.remaining(now + secs(9)), 25);
    }

    #[test]
    fn test_restart_after_expiry() {
        let now = Instant::now();
        let mut t = SessionTimer::new(true, 5, true, true);
        t.start(now);
        assert!(t.tick(now + secs(5)));
        t.start(now + secs(10));
        assert_eq!(t.phase(), TimerPhase::Running);
        assert_eq!(t.remaining(now + secs(12)), 3);
    }

    #[test]
    fn test_toggle_enables_and_disables() {
        let now = Instant::now();
        let mut t = SessionTimer::new(false, 60, true, true);
        t.toggle(now);
        assert!(t.is_enabled());
        assert_eq!(t.phase(), TimerPhase::Running);
        t.toggle(now + secs(1));
        assert!(!t.is_enabled());
        assert_eq!(t.phase(), TimerPhase::Stopped);
    }

    #[test]
    fn test_threshold_bands() {
        let now = Instant::now();
        let mut t = SessionTimer::new(true, 60, true, true);
        t.start(now);
        assert!(!t.is_warning(now + secs(29)));
        assert!(t.is_warning(now + secs(30)));
        assert!(t.is_warning(now + secs(49)));
        assert!(!t.is_warning(now + secs(50)));
        assert!(t.is_critical(now + secs(50)));
        assert!(!t.is_critical(now + secs(49)));
    }

    #[test]
    fn test_thresholds_respect_config() {
        let now = Instant::now();
        let mut t = SessionTimer::new(true, 60, false, false);
        t.start(now);
        assert!(!t.is_warning(now + secs(35)));
        assert!(!t.is_critical(now + secs(55)));
    }
}
