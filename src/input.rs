//! Input: key bindings and the DAS/ARR timing layer the engine consumes.
//!
//! The timing layer is pure over (active?, now, config, cell): the
//! orchestrator snapshots which actions are held once per frame and asks for
//! that frame's action edges, so a chord press behaves deterministically.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use std::collections::HashSet;
use std::time::{Duration, Instant};

/// Game action produced by the input layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    MoveLeft,
    MoveRight,
    SoftDrop,
    HardDrop,
    RotateCw,
    RotateCcw,
    Pause,
    Restart,
    ForceRestart,
    TimerToggle,
    DebugToggle,
    Screenshot,
    Quit,
}

/// Map a key event to an action. Normal (arrows, space) and vim rows both
/// work; `R` (shifted) is the force-restart distinct from `r`.
pub fn key_to_action(key: KeyEvent) -> Option<Action> {
    let KeyEvent { code, modifiers, .. } = key;
    let no_mod = modifiers.is_empty() || modifiers == KeyModifiers::SHIFT;
    if !no_mod {
        return None;
    }
    Some(match code {
        KeyCode::Char('q') | KeyCode::Esc => Action::Quit,
        KeyCode::Char('p') => Action::Pause,
        KeyCode::Left | KeyCode::Char('h') => Action::MoveLeft,
        KeyCode::Right | KeyCode::Char('l') => Action::MoveRight,
        KeyCode::Up | KeyCode::Char('k') | KeyCode::Char('i') => Action::RotateCw,
        KeyCode::Char('u') | KeyCode::Char('z') => Action::RotateCcw,
        KeyCode::Down | KeyCode::Char('j') => Action::SoftDrop,
        KeyCode::Enter | KeyCode::Char(' ') => Action::HardDrop,
        KeyCode::Char('r') => Action::Restart,
        KeyCode::Char('R') => Action::ForceRestart,
        KeyCode::Char('t') => Action::TimerToggle,
        KeyCode::Char('d') => Action::DebugToggle,
        KeyCode::Char('s') => Action::Screenshot,
        _ => return None,
    })
}

/// Which actions are held this frame; taken once at frame start.
#[derive(Debug, Default, Clone)]
pub struct InputSnapshot {
    held: HashSet<Action>,
}

impl InputSnapshot {
    pub fn set(&mut self, action: Action, active: bool) {
        if active {
            self.held.insert(action);
        } else {
            self.held.remove(&action);
        }
    }

    pub fn is_held(&self, action: Action) -> bool {
        self.held.contains(&action)
    }

    pub fn clear(&mut self) {
        self.held.clear();
    }
}

/// Per-action timer cell: press timestamp, last trigger, previous-frame flag.
#[derive(Debug, Default, Clone, Copy)]
pub struct RepeatCell {
    pressed_at: Option<Instant>,
    last_fire: Option<Instant>,
    was_active: bool,
}

impl RepeatCell {
    fn release(&mut self) {
        *self = Self::default();
    }
}

/// Auto-repeat decision. The rising edge fires immediately; while held, the
/// next fire comes once `das` has elapsed since the press, then every `arr`.
/// Every firing call advances the cell's last-trigger timestamp.
pub fn repeat_fire(
    cell: &mut RepeatCell,
    active: bool,
    now: Instant,
    das: Duration,
    arr: Duration,
) -> bool {
    if !active {
        cell.release();
        return false;
    }
    if !cell.was_active {
        cell.was_active = true;
        cell.pressed_at = Some(now);
        cell.last_fire = Some(now);
        return true;
    }
    let pressed = cell.pressed_at.unwrap_or(now);
    if now.duration_since(pressed) < das {
        return false;
    }
    let due = (cell.last_fire.unwrap_or(pressed) + arr).max(pressed + das);
    if now >= due {
        cell.last_fire = Some(now);
        true
    } else {
        false
    }
}

/// One-shot decision: fires only on the rising edge, never repeats while held.
pub fn edge_fire(cell: &mut RepeatCell, active: bool, now: Instant) -> bool {
    let fired = active && !cell.was_active;
    cell.was_active = active;
    if fired {
        cell.pressed_at = Some(now);
        cell.last_fire = Some(now);
    } else if !active {
        cell.release();
    }
    fired
}

/// All timing cells plus their configuration; owned by the orchestrator.
#[derive(Debug)]
pub struct InputTimers {
    das: Duration,
    arr: Duration,
    soft_drop: Duration,
    left: RepeatCell,
    right: RepeatCell,
    soft: RepeatCell,
    rotate_cw: RepeatCell,
    rotate_ccw: RepeatCell,
    hard_drop: RepeatCell,
    pause: RepeatCell,
    restart: RepeatCell,
    force_restart: RepeatCell,
    timer_toggle: RepeatCell,
    debug_toggle: RepeatCell,
    screenshot: RepeatCell,
    quit: RepeatCell,
}

impl InputTimers {
    pub fn new(das_ms: u64, arr_ms: u64, soft_drop_ms: u64) -> Self {
        Self {
            das: Duration::from_millis(das_ms),
            arr: Duration::from_millis(arr_ms),
            soft_drop: Duration::from_millis(soft_drop_ms),
            left: RepeatCell::default(),
            right: RepeatCell::default(),
            soft: RepeatCell::default(),
            rotate_cw: RepeatCell::default(),
            rotate_ccw: RepeatCell::default(),
            hard_drop: RepeatCell::default(),
            pause: RepeatCell::default(),
            restart: RepeatCell::default(),
            force_restart: RepeatCell::default(),
            timer_toggle: RepeatCell::default(),
            debug_toggle: RepeatCell::default(),
            screenshot: RepeatCell::default(),
            quit: RepeatCell::default(),
        }
    }

    /// Collect this frame's action edges into `out`, in the fixed order
    /// horizontals → soft drop → rotations → hard drop → one-shots. The
    /// buffer is reused by the caller so steady-state frames do not allocate.
    pub fn frame_actions(&mut self, snap: &InputSnapshot, now: Instant, out: &mut Vec<Action>) {
        out.clear();
        if repeat_fire(&mut self.left, snap.is_held(Action::MoveLeft), now, self.das, self.arr) {
            out.push(Action::MoveLeft);
        }
        if repeat_fire(&mut self.right, snap.is_held(Action::MoveRight), now, self.das, self.arr) {
            out.push(Action::MoveRight);
        }
        // Soft drop repeats on its own period with no DAS hold-off.
        if repeat_fire(
            &mut self.soft,
            snap.is_held(Action::SoftDrop),
            now,
            self.soft_drop,
            self.soft_drop,
        ) {
            out.push(Action::SoftDrop);
        }
        let one_shots = [
            (Action::RotateCw, &mut self.rotate_cw),
            (Action::RotateCcw, &mut self.rotate_ccw),
            (Action::HardDrop, &mut self.hard_drop),
            (Action::Pause, &mut self.pause),
            (Action::Restart, &mut self.restart),
            (Action::ForceRestart, &mut self.force_restart),
            (Action::TimerToggle, &mut self.timer_toggle),
            (Action::DebugToggle, &mut self.debug_toggle),
            (Action::Screenshot, &mut self.screenshot),
            (Action::Quit, &mut self.quit),
        ];
        for (action, cell) in one_shots {
            if edge_fire(cell, snap.is_held(action), now) {
                out.push(action);
            }
        }
    }
}
