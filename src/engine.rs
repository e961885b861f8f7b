//! Gameplay engine: active piece, rotation with wall kicks, gravity and
//! locking, line clears, scoring, levels, combo, piece statistics, and the
//! session timer. The engine owns all mutable game state; collaborators get
//! a read-only [`EngineView`] and a drained queue of [`AudioEvent`]s.

use crate::audio::{AudioEvent, RotateDir};
use crate::board::{ActivePiece, Board};
use crate::config::Config;
use crate::pieces::{Catalogue, Offset, PieceDef};
use crate::randomizer::{Randomizer, RandomizerError};
use crate::timer::{SessionTimer, TimerPhase};
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// A clearing lock within this window of the previous one extends the combo.
const COMBO_WINDOW: Duration = Duration::from_millis(2000);

/// Points for clearing 1..=4 lines, before the level multiplier.
const CLEAR_POINTS: [u64; 4] = [100, 300, 500, 800];

/// Upper bound on gravity ticks applied in one frame after a stall.
const MAX_CATCHUP_TICKS: u32 = 8;

/// Generic kick sequence tried when a piece defines no kick table.
const GENERIC_KICKS: [Offset; 10] = [
    (0, 0),
    (-1, 0),
    (1, 0),
    (0, -1),
    (-1, -1),
    (1, -1),
    (0, -2),
    (-2, 0),
    (2, 0),
    (0, 1),
];

pub struct Engine {
    catalogue: Catalogue,
    config: Config,
    board: Board,
    active: ActivePiece,
    /// Queued next piece index; spawned on the next lock.
    next_index: usize,
    randomizer: Randomizer,
    score: u64,
    lines: u32,
    level: u32,
    /// Current gravity interval, ms; recomputed with every lines change.
    tick_ms: u64,
    combo: u32,
    last_clear: Option<Instant>,
    /// Pieces spawned, by catalogue index.
    stats: HashMap<usize, u32>,
    timer: SessionTimer,
    timer_was_warning: bool,
    timer_was_critical: bool,
    paused: bool,
    game_over: bool,
    last_tick: Instant,
    /// Last committed kick offset; debug overlay only.
    last_kick: Option<Offset>,
    /// Row indices removed by the most recent lock; drives the clear flash.
    cleared_rows: Vec<usize>,
    events: Vec<AudioEvent>,
}

/// Read-only snapshot handed to the renderer; consistent for the frame.
pub struct EngineView<'a> {
    pub board: &'a Board,
    pub catalogue: &'a Catalogue,
    pub active: ActivePiece,
    pub active_def: &'a PieceDef,
    pub next_def: &'a PieceDef,
    pub paused: bool,
    pub game_over: bool,
    pub score: u64,
    pub lines: u32,
    pub level: u32,
    pub combo: u32,
    pub tick_ms: u64,
    pub stats: &'a HashMap<usize, u32>,
    pub timer_enabled: bool,
    pub timer_phase: TimerPhase,
    pub timer_remaining: u64,
    pub timer_warning: bool,
    pub timer_critical: bool,
    pub last_kick: Option<Offset>,
    pub cleared_rows: &'a [usize],
}

impl Engine {
    /// Construct with an entropy-seeded randomiser.
    pub fn new(catalogue: Catalogue, config: Config, now: Instant) -> Result<Self, RandomizerError> {
        let randomizer = Randomizer::new(config.rand_type, catalogue.len(), config.rand_bag_size)?;
        Ok(Self::build(catalogue, config, randomizer, now))
    }

    /// Deterministic variant for tests.
    pub fn with_seed(
        catalogue: Catalogue,
        config: Config,
        seed: u64,
        now: Instant,
    ) -> Result<Self, RandomizerError> {
        let randomizer =
            Randomizer::with_seed(config.rand_type, catalogue.len(), config.rand_bag_size, seed)?;
        Ok(Self::build(catalogue, config, randomizer, now))
    }

    fn build(catalogue: Catalogue, config: Config, mut randomizer: Randomizer, now: Instant) -> Self {
        let first = randomizer.next();
        let next_index = randomizer.next();
        let timer = SessionTimer::new(
            config.timer_enabled,
            config.timer_duration_seconds,
            config.timer_warn_30s,
            config.timer_warn_10s,
        );
        let mut engine = Self {
            catalogue,
            tick_ms: config.tick_ms_start,
            config,
            board: Board::new(),
            active: ActivePiece::spawn(first),
            next_index,
            randomizer,
            score: 0,
            lines: 0,
            level: 0,
            combo: 0,
            last_clear: None,
            stats: HashMap::new(),
            timer,
            timer_was_warning: false,
            timer_was_critical: false,
            paused: false,
            game_over: false,
            last_tick: now,
            last_kick: None,
            cleared_rows: Vec::new(),
            events: Vec::new(),
        };
        *engine.stats.entry(first).or_insert(0) += 1;
        if engine.timer.is_enabled() {
            engine.timer.start(now);
        }
        engine
    }

    /// Fresh board, score, stats, and a re-drawn piece stream. The session
    /// timer restarts when enabled.
    pub fn restart(&mut self, now: Instant) {
        self.board.clear();
        self.randomizer.reset();
        self.active = ActivePiece::spawn(self.randomizer.next());
        self.next_index = self.randomizer.next();
        self.score = 0;
        self.lines = 0;
        self.level = 0;
        self.tick_ms = self.config.tick_ms_start;
        self.combo = 0;
        self.last_clear = None;
        self.stats.clear();
        *self.stats.entry(self.active.index).or_insert(0) += 1;
        self.paused = false;
        self.game_over = false;
        self.last_tick = now;
        self.last_kick = None;
        self.cleared_rows.clear();
        self.timer_was_warning = false;
        self.timer_was_critical = false;
        self.timer.reset();
        if self.timer.is_enabled() {
            self.timer.start(now);
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn is_game_over(&self) -> bool {
        self.game_over
    }

    pub fn set_paused(&mut self, paused: bool, now: Instant) {
        if self.paused == paused {
            return;
        }
        self.paused = paused;
        self.timer.set_game_paused(paused, now);
        if !paused {
            // Paused time does not owe gravity ticks.
            self.last_tick = now;
        }
    }

    pub fn toggle_timer(&mut self, now: Instant) {
        self.timer.toggle(now);
        self.timer_was_warning = false;
        self.timer_was_critical = false;
    }

    fn active_def(&self) -> &PieceDef {
        self.catalogue.get(self.active.index)
    }

    pub fn move_left(&mut self) {
        self.shift(-1);
    }

    pub fn move_right(&mut self) {
        self.shift(1);
    }

    fn shift(&mut self, dx: i32) {
        if self.paused || self.game_over {
            return;
        }
        if self.board.can_place(self.active_def(), &self.active, dx, 0, 0) {
            self.active.x += dx;
            self.events.push(AudioEvent::Move);
        }
    }

    /// Rotate the active piece in direction `dir` (+1 CW, −1 CCW).
    ///
    /// The kick search is a priority chain: a per-transition table beats a
    /// legacy table; a piece with no table at all gets a wall-bounds
    /// correction, then the generic sequence, then the minimal one. If no
    /// candidate fits, the rotation is left unchanged.
    pub fn rotate(&mut self, dir: i8) {
        if self.paused || self.game_over {
            return;
        }
        let def = self.active_def();
        let committed = match &def.kicks {
            Some(table) => self.try_kicks(table.offsets(dir, self.active.rot), dir),
            None => self
                .boundary_kick(dir)
                .or_else(|| self.try_kicks(&GENERIC_KICKS, dir))
                .or_else(|| {
                    self.try_kicks(&[(0, 0), (i32::from(dir.signum()), 0), (0, -1)], dir)
                }),
        };
        let Some((dx, dy)) = committed else { return };
        self.active.x += dx;
        self.active.y += dy;
        self.active.rot = (i16::from(self.active.rot) + 4 + i16::from(dir)).rem_euclid(4) as u8;
        self.last_kick = Some((dx, dy));
        self.events.push(AudioEvent::Rotate(if dir > 0 {
            RotateDir::Cw
        } else {
            RotateDir::Ccw
        }));
        if (dx, dy) != (0, 0) {
            self.events.push(AudioEvent::Kick);
        }
    }

    /// If the target rotation would poke past the left or right wall at the
    /// current position, try the minimum correcting displacement, then that
    /// displacement with an upward nudge.
    fn boundary_kick(&self, dir: i8) -> Option<Offset> {
        let def = self.active_def();
        let target = (i16::from(self.active.rot) + 4 + i16::from(dir)).rem_euclid(4) as u8;
        let cells = def.cells(target);
        let min_x = cells.iter().map(|&(x, _)| self.active.x + x).min()?;
        let max_x = cells.iter().map(|&(x, _)| self.active.x + x).max()?;
        let correction = if min_x < 0 {
            -min_x
        } else if max_x >= crate::board::COLS as i32 {
            crate::board::COLS as i32 - 1 - max_x
        } else {
            return None;
        };
        self.try_kicks(&[(correction, 0), (correction, -1)], dir)
    }

    fn try_kicks(&self, offsets: &[Offset], dir: i8) -> Option<Offset> {
        let def = self.active_def();
        offsets
            .iter()
            .copied()
            .find(|&(dx, dy)| self.board.can_place(def, &self.active, dx, dy, dir))
    }

    /// Soft drop: one cell down when legal; locking is left to gravity.
    pub fn soft_drop(&mut self) {
        if self.paused || self.game_over {
            return;
        }
        if self.board.can_place(self.active_def(), &self.active, 0, 1, 0) {
            self.active.y += 1;
            self.events.push(AudioEvent::SoftDrop);
        }
    }

    /// Hard drop: fall to rest and lock immediately.
    pub fn hard_drop(&mut self, now: Instant) {
        if self.paused || self.game_over {
            return;
        }
        while self.board.can_place(self.active_def(), &self.active, 0, 1, 0) {
            self.active.y += 1;
        }
        self.events.push(AudioEvent::HardDrop);
        self.lock(now);
    }

    /// Advance gravity if its interval elapsed: at most one cell per elapsed
    /// interval, capped at [`MAX_CATCHUP_TICKS`] per call; any further debt
    /// is dropped.
    pub fn advance_gravity(&mut self, now: Instant) {
        if self.paused || self.game_over {
            return;
        }
        for _ in 0..MAX_CATCHUP_TICKS {
            let interval = Duration::from_millis(self.tick_ms);
            if now.duration_since(self.last_tick) < interval {
                return;
            }
            self.last_tick += interval;
            if self.board.can_place(self.active_def(), &self.active, 0, 1, 0) {
                self.active.y += 1;
            } else {
                self.lock(now);
            }
            if self.game_over {
                return;
            }
        }
        if now.duration_since(self.last_tick) >= Duration::from_millis(self.tick_ms) {
            self.last_tick = now;
        }
    }

    /// Lock the active piece: place, clear lines, score, combo, spawn next.
    /// Externally this is one atomic state change.
    fn lock(&mut self, now: Instant) {
        let def = self.catalogue.get(self.active.index);
        self.board.place(def, &self.active);
        self.events.push(AudioEvent::Lock);

        self.cleared_rows = self.board.full_rows();
        let cleared = self.board.clear_lines();
        if cleared > 0 {
            let within = self
                .last_clear
                .is_some_and(|t| now.duration_since(t) <= COMBO_WINDOW);
            self.combo = if within { self.combo + 1 } else { 1 };
            self.last_clear = Some(now);
            self.events.push(if cleared == 4 {
                AudioEvent::Tetris
            } else {
                AudioEvent::Clear(cleared)
            });
            self.events.push(AudioEvent::Combo(self.combo));

            let old_level = self.level;
            self.lines += cleared;
            self.recompute_level();
            let points = CLEAR_POINTS[(cleared.min(4) - 1) as usize];
            self.score += points * u64::from(self.level + 1);
            if self.level > old_level {
                self.events.push(AudioEvent::LevelUp);
            }
        } else {
            self.combo = 0;
        }

        self.spawn_next();
    }

    /// level and tickMs are derived from lines; always updated together.
    fn recompute_level(&mut self) {
        self.level = self.lines / self.config.level_step;
        self.tick_ms = self
            .config
            .tick_ms_start
            .saturating_sub(u64::from(self.level) * self.config.speed_acceleration)
            .max(self.config.tick_ms_min);
    }

    fn spawn_next(&mut self) {
        self.active = ActivePiece::spawn(self.next_index);
        *self.stats.entry(self.active.index).or_insert(0) += 1;
        self.next_index = self.randomizer.next();
        if self.board.is_game_over(self.active_def(), &self.active) {
            self.game_over = true;
            self.events.push(AudioEvent::GameOver);
        }
    }

    /// Advance the session timer; expiry is an engine-level game-over.
    pub fn update_timer(&mut self, now: Instant) {
        if !self.timer.is_enabled() {
            return;
        }
        if self.timer.tick(now) {
            self.events.push(AudioEvent::TimerExpired);
            if !self.game_over {
                self.game_over = true;
                self.events.push(AudioEvent::GameOver);
            }
            return;
        }
        let warning = self.timer.is_warning(now);
        if warning && !self.timer_was_warning {
            self.events.push(AudioEvent::TimerWarn);
        }
        self.timer_was_warning = warning;
        let critical = self.timer.phase() == TimerPhase::Running && self.timer.is_critical(now);
        if critical && !self.timer_was_critical {
            self.events.push(AudioEvent::TimerCritical);
        }
        self.timer_was_critical = critical;
    }

    /// Fire-and-forget hand-off of queued audio events.
    pub fn drain_events(&mut self) -> std::vec::Drain<'_, AudioEvent> {
        self.events.drain(..)
    }

    pub fn view(&self, now: Instant) -> EngineView<'_> {
        EngineView {
            board: &self.board,
            catalogue: &self.catalogue,
            active: self.active,
            active_def: self.active_def(),
            next_def: self.catalogue.get(self.next_index),
            paused: self.paused,
            game_over: self.game_over,
            score: self.score,
            lines: self.lines,
            level: self.level,
            combo: self.combo,
            tick_ms: self.tick_ms,
            stats: &self.stats,
            timer_enabled: self.timer.is_enabled(),
            timer_phase: self.timer.phase(),
            timer_remaining: self.timer.remaining(now),
            timer_warning: self.timer.is_warning(now),
            timer_critical: self.timer.is_critical(now),
            last_kick: self.last_kick,
            cleared_rows: &self.cleared_rows,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::{COLS, ROWS};
    use crate::config::RandType;
    use crate::pieces::Rgb;

    fn engine() -> (Engine, Instant) {
        let now = Instant::now();
        let e = Engine::with_seed(Catalogue::fallback(), Config::default(), 1, now).unwrap();
        (e, now)
    }

    fn fill_row(e: &mut Engine, y: usize, except: &[usize]) {
        for x in 0..COLS {
            if !except.contains(&x) {
                e.board.fill_cell(x, y, Rgb::new(5, 5, 5));
            }
        }
    }

    /// Horizontal I piece placed so a hard drop completes the bottom row.
    fn set_i_flat(e: &mut Engine) {
        e.active = ActivePiece { index: 0, rot: 0, x: 3, y: 0 };
    }

    #[test]
    fn test_single_clears_then_level_bump() {
        // Scenario: nine single clears at level 0, the tenth bumps to level 1.
        let (mut e, now) = engine();
        for i in 0..10u64 {
            fill_row(&mut e, ROWS - 1, &[3, 4, 5, 6]);
            set_i_flat(&mut e);
            e.hard_drop(now);
            assert_eq!(e.lines, i as u32 + 1);
        }
        assert_eq!(e.lines, 10);
        assert_eq!(e.level, 1);
        assert_eq!(e.tick_ms, 350);
        assert_eq!(e.score, 100 * 9 + 100 * 2);
    }

    #[test]
    fn test_tetris_scores_and_sounds_once() {
        let (mut e, now) = engine();
        for y in (ROWS - 4)..ROWS {
            fill_row(&mut e, y, &[9]);
        }
        // Vertical I down the open column.
        e.active = ActivePiece { index: 0, rot: 1, x: 7, y: 0 };
        e.hard_drop(now);
        assert_eq!(e.lines, 4);
        assert_eq!(e.score, 800);
        let events: Vec<AudioEvent> = e.drain_events().collect();
        let tetris = events.iter().filter(|&&ev| ev == AudioEvent::Tetris).count();
        assert_eq!(tetris, 1);
        assert!(!events.contains(&AudioEvent::Clear(4)));
    }

    #[test]
    fn test_combo_window() {
        let (mut e, t0) = engine();
        fill_row(&mut e, ROWS - 1, &[3, 4, 5, 6]);
        set_i_flat(&mut e);
        e.hard_drop(t0);
        assert_eq!(e.combo, 1);
        // Second clearing lock 1500 ms later extends the combo.
        fill_row(&mut e, ROWS - 1, &[3, 4, 5, 6]);
        set_i_flat(&mut e);
        e.hard_drop(t0 + Duration::from_millis(1500));
        assert_eq!(e.combo, 2);
        // 2500 ms gap falls outside the window: back to 1, not 0.
        fill_row(&mut e, ROWS - 1, &[3, 4, 5, 6]);
        set_i_flat(&mut e);
        e.hard_drop(t0 + Duration::from_millis(4000));
        assert_eq!(e.combo, 1);
        // A non-clearing lock resets to 0.
        e.active = ActivePiece { index: 1, rot: 0, x: 0, y: 0 };
        e.hard_drop(t0 + Duration::from_millis(4100));
        assert_eq!(e.combo, 0);
    }

    #[test]
    fn test_t_slot_kick_commits_first_feasible() {
        let (mut e, _) = engine();
        // T in rotation 2 at (4, 10); rotating CW to 3 at (0,0) is blocked,
        // the (1,0) kick from the 2→3 table is the first feasible one.
        e.active = ActivePiece { index: 2, rot: 2, x: 4, y: 10 };
        e.board.fill_cell(5, 10, Rgb::new(7, 7, 7));
        e.rotate(1);
        assert_eq!(e.active.rot, 3);
        assert_eq!((e.active.x, e.active.y), (5, 10));
        assert_eq!(e.last_kick, Some((1, 0)));
        let events: Vec<AudioEvent> = e.drain_events().collect();
        assert!(events.contains(&AudioEvent::Rotate(RotateDir::Cw)));
        assert!(events.contains(&AudioEvent::Kick));
    }

    #[test]
    fn test_rotation_round_trip_in_free_space() {
        let (mut e, _) = engine();
        e.active = ActivePiece { index: 2, rot: 0, x: 4, y: 8 };
        let before = e.active;
        e.rotate(1);
        e.rotate(1);
        e.rotate(-1);
        e.rotate(-1);
        assert_eq!(e.active, before);
    }

    #[test]
    fn test_failed_rotation_leaves_piece_unchanged() {
        let (mut e, _) = engine();
        // T at (4, 10); everything around its own four cells is filled, so
        // every entry in the 0→1 kick table collides.
        e.active = ActivePiece { index: 2, rot: 0, x: 4, y: 10 };
        let own: Vec<(i32, i32)> = e
            .catalogue
            .get(2)
            .cells(0)
            .iter()
            .map(|&(cx, cy)| (4 + cx, 10 + cy))
            .collect();
        for y in 8..=13 {
            for x in 0..COLS {
                if !own.contains(&(x as i32, y as i32)) {
                    e.board.fill_cell(x, y, Rgb::new(1, 1, 1));
                }
            }
        }
        let before = e.active;
        let before_events = e.events.len();
        e.rotate(1);
        assert_eq!(e.active, before);
        assert_eq!(e.events.len(), before_events);
    }

    #[test]
    fn test_gravity_descends_then_locks() {
        let (mut e, t0) = engine();
        let start_y = e.active.y;
        e.advance_gravity(t0 + Duration::from_millis(400));
        assert_eq!(e.active.y, start_y + 1);
        // Resting on the floor: the next due tick locks and spawns.
        e.active = ActivePiece { index: 1, rot: 0, x: 0, y: (ROWS - 2) as i32 };
        e.last_tick = t0;
        e.advance_gravity(t0 + Duration::from_millis(400));
        assert!(e.board.cell(1, ROWS - 1).is_filled());
        assert_eq!(e.active.y, 0);
    }

    #[test]
    fn test_gravity_catchup_capped() {
        let (mut e, t0) = engine();
        e.active = ActivePiece { index: 1, rot: 0, x: 0, y: 0 };
        // 5 seconds of debt at 400 ms per tick: only 8 ticks apply.
        e.advance_gravity(t0 + Duration::from_secs(5));
        assert_eq!(e.active.y, 8);
        // Debt beyond the cap was dropped, not banked.
        e.advance_gravity(t0 + Duration::from_secs(5));
        assert_eq!(e.active.y, 8);
    }

    #[test]
    fn test_spawn_collision_is_game_over() {
        let (mut e, now) = engine();
        // Column 9 stays open so these rows survive the lock's line scan.
        for y in 0..4 {
            fill_row(&mut e, y, &[9]);
        }
        e.active = ActivePiece { index: 1, rot: 0, x: 0, y: (ROWS - 2) as i32 };
        e.hard_drop(now);
        assert!(e.is_game_over());
        assert!(e.drain_events().any(|ev| ev == AudioEvent::GameOver));
        // Dead engine ignores inputs until restart.
        let frozen = e.active;
        e.move_left();
        e.rotate(1);
        assert_eq!(e.active, frozen);
        e.restart(now);
        assert!(!e.is_game_over());
        assert_eq!(e.score, 0);
    }

    #[test]
    fn test_stats_count_spawns() {
        let (mut e, now) = engine();
        let total: u32 = e.stats.values().sum();
        assert_eq!(total, 1);
        e.hard_drop(now);
        e.hard_drop(now);
        let total: u32 = e.stats.values().sum();
        assert_eq!(total, 3);
    }

    #[test]
    fn test_active_piece_never_overlaps() {
        let cfg = Config {
            rand_type: RandType::Bag,
            ..Config::default()
        };
        let now = Instant::now();
        let mut e = Engine::with_seed(Catalogue::fallback(), cfg, 99, now).unwrap();
        let mut t = now;
        for step in 0..600 {
            match step % 5 {
                0 => e.move_left(),
                1 => e.move_right(),
                2 => e.rotate(1),
                3 => e.soft_drop(),
                _ => {
                    t += Duration::from_millis(400);
                    e.advance_gravity(t);
                }
            }
            if e.is_game_over() {
                break;
            }
            let def = e.active_def();
            assert!(e.board.can_place(def, &e.active, 0, 0, 0));
        }
    }

    #[test]
    fn test_paused_engine_is_inert() {
        let (mut e, t0) = engine();
        let before = e.active;
        e.set_paused(true, t0);
        e.move_left();
        e.soft_drop();
        e.advance_gravity(t0 + Duration::from_secs(2));
        assert_eq!(e.active, before);
        // Unpausing owes no gravity debt.
        e.set_paused(false, t0 + Duration::from_secs(2));
        e.advance_gravity(t0 + Duration::from_secs(2));
        assert_eq!(e.active, before);
    }

    #[test]
    fn test_timer_expiry_sets_game_over() {
        let cfg = Config {
            timer_enabled: true,
            timer_duration_seconds: 60,
            ..Config::default()
        };
        let t0 = Instant::now();
        let mut e = Engine::with_seed(Catalogue::fallback(), cfg, 3, t0).unwrap();
        e.update_timer(t0 + Duration::from_secs(35));
        e.update_timer(t0 + Duration::from_secs(59));
        assert!(!e.is_game_over());
        e.update_timer(t0 + Duration::from_secs(60));
        assert!(e.is_game_over());
        let events: Vec<AudioEvent> = e.drain_events().collect();
        assert!(events.contains(&AudioEvent::TimerExpired));
        assert!(events.contains(&AudioEvent::TimerWarn));
        assert!(events.contains(&AudioEvent::TimerCritical));
    }

    #[test]
    fn test_score_never_negative_and_level_derived() {
        let (mut e, now) = engine();
        for _ in 0..3 {
            fill_row(&mut e, ROWS - 1, &[3, 4, 5, 6]);
            set_i_flat(&mut e);
            e.hard_drop(now);
        }
        assert_eq!(e.level, e.lines / e.config.level_step);
        assert!(e.tick_ms >= e.config.tick_ms_min);
    }
}
