//! App: terminal bring-up/teardown, frame loop, input edges, audio dispatch.

use crate::audio::{AudioEvent, AudioSink, BellSink};
use crate::config::Config;
use crate::engine::Engine;
use crate::input::{Action, InputSnapshot, InputTimers, key_to_action};
use crate::screenshot;
use anyhow::Result;
use crossterm::event::{self, Event, KeyEventKind};
use ratatui::DefaultTerminal;
use std::time::{Duration, Instant};
use tachyonfx::Effect;

/// Target frame period, ~60 fps.
const FRAME_DURATION: Duration = Duration::from_millis(16);

/// How long a transient status message stays on screen.
const NOTICE_DURATION: Duration = Duration::from_secs(3);

pub struct App {
    engine: Engine,
    timers: InputTimers,
    snapshot: InputSnapshot,
    actions: Vec<Action>,
    sink: BellSink,
    /// Startup warnings (config/catalogue) shown in the status line.
    warnings: Vec<String>,
    notice: Option<(String, Instant)>,
    preview_grid: u16,
    debug: bool,
    /// Whether the terminal reports key release events; without them every
    /// press is treated as a tap and the snapshot is cleared each frame.
    release_events: bool,
    flash: Option<Effect>,
    flash_time: Option<Instant>,
    flash_active: bool,
    quit: bool,
}

impl App {
    pub fn new(engine: Engine, config: &Config, warnings: Vec<String>) -> Self {
        Self {
            engine,
            timers: InputTimers::new(config.move_das, config.move_arr, config.soft_drop_delay),
            snapshot: InputSnapshot::default(),
            actions: Vec::new(),
            sink: BellSink::default(),
            warnings,
            notice: None,
            preview_grid: config.preview_grid,
            debug: false,
            release_events: false,
            flash: None,
            flash_time: None,
            flash_active: false,
            quit: false,
        }
    }

    pub fn run(&mut self) -> Result<()> {
        use crossterm::{
            event::{KeyboardEnhancementFlags, PopKeyboardEnhancementFlags, PushKeyboardEnhancementFlags},
            execute,
            terminal::{
                EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
                supports_keyboard_enhancement,
            },
        };

        enable_raw_mode()?;
        let mut stdout = std::io::stdout();
        execute!(stdout, EnterAlternateScreen)?;

        self.release_events = supports_keyboard_enhancement().unwrap_or(false);
        if self.release_events {
            let _ = execute!(
                stdout,
                PushKeyboardEnhancementFlags(KeyboardEnhancementFlags::REPORT_EVENT_TYPES)
            );
        }

        let mut terminal =
            ratatui::DefaultTerminal::new(ratatui::backend::CrosstermBackend::new(stdout))?;

        let result = self.run_loop(&mut terminal);

        if self.release_events {
            let _ = execute!(std::io::stdout(), PopKeyboardEnhancementFlags);
        }
        execute!(std::io::stdout(), LeaveAlternateScreen)?;
        disable_raw_mode()?;

        result
    }

    fn run_loop(&mut self, terminal: &mut DefaultTerminal) -> Result<()> {
        loop {
            let now = Instant::now();

            // Drain pending key events into the held-key snapshot.
            while event::poll(Duration::ZERO)? {
                match event::read()? {
                    Event::Key(key) => {
                        if let Some(action) = key_to_action(key) {
                            self.snapshot.set(action, key.kind != KeyEventKind::Release);
                        }
                    }
                    Event::FocusLost => self.snapshot.clear(),
                    _ => {}
                }
            }

            self.timers.frame_actions(&self.snapshot, now, &mut self.actions);
            if !self.release_events {
                // No release events: treat every press as a tap so pieces do
                // not run away; OS key repeat still auto-shifts.
                self.snapshot.clear();
            }
            for i in 0..self.actions.len() {
                let action = self.actions[i];
                self.apply_action(action, now);
            }

            self.engine.advance_gravity(now);
            self.engine.update_timer(now);

            let tension = self.engine.view(now).board.tension_level();
            self.sink.set_tension(tension);
            let mut clear_seen = false;
            for event in self.engine.drain_events() {
                if matches!(event, AudioEvent::Clear(_) | AudioEvent::Tetris) {
                    clear_seen = true;
                }
                self.sink.emit(event);
            }
            if clear_seen {
                self.flash = None;
                self.flash_time = None;
                self.flash_active = true;
            }

            if self.notice.as_ref().is_some_and(|(_, t)| now.duration_since(*t) > NOTICE_DURATION) {
                self.notice = None;
            }

            let view = self.engine.view(now);
            let notice = self.notice.as_ref().map(|(msg, _)| msg.as_str());
            terminal.draw(|f| {
                crate::ui::draw(
                    f,
                    &view,
                    self.preview_grid,
                    &self.warnings,
                    notice,
                    self.debug,
                    &mut self.flash,
                    &mut self.flash_time,
                    self.flash_active,
                    now,
                )
            })?;

            if self.flash_active && self.flash.as_ref().is_some_and(|e| e.done()) {
                self.flash = None;
                self.flash_time = None;
                self.flash_active = false;
            }

            if self.quit {
                return Ok(());
            }
            // Sleep out the frame; any event that arrives wakes the loop and
            // is read at the top of the next iteration.
            let _ = event::poll(FRAME_DURATION.saturating_sub(now.elapsed()))?;
        }
    }

    fn apply_action(&mut self, action: Action, now: Instant) {
        match action {
            Action::Quit => self.quit = true,
            Action::Pause => {
                let paused = self.engine.is_paused();
                self.engine.set_paused(!paused, now);
            }
            Action::Restart => {
                // Plain restart only works from the game-over screen.
                if self.engine.is_game_over() {
                    self.restart(now);
                }
            }
            Action::ForceRestart => self.restart(now),
            Action::TimerToggle => self.engine.toggle_timer(now),
            Action::DebugToggle => self.debug = !self.debug,
            Action::Screenshot => self.take_screenshot(now),
            Action::MoveLeft => self.engine.move_left(),
            Action::MoveRight => self.engine.move_right(),
            Action::SoftDrop => self.engine.soft_drop(),
            Action::HardDrop => self.engine.hard_drop(now),
            Action::RotateCw => self.engine.rotate(1),
            Action::RotateCcw => self.engine.rotate(-1),
        }
    }

    fn restart(&mut self, now: Instant) {
        self.engine.restart(now);
        self.flash = None;
        self.flash_time = None;
        self.flash_active = false;
    }

    fn take_screenshot(&mut self, now: Instant) {
        let view = self.engine.view(now);
        let msg = match screenshot::save(view.board, &view.active, view.active_def) {
            Ok(path) => format!("saved {}", path.display()),
            Err(err) => format!("screenshot failed: {err}"),
        };
        self.notice = Some((msg, now));
    }
}
