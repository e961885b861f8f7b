//! Configuration: `KEY=VALUE` .cfg parsing into a frozen record, with range clamping.

use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Randomiser policy selector (`RAND_TYPE=simple|bag`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RandType {
    #[default]
    Simple,
    Bag,
}

/// Frozen configuration record consumed by the engine and UI.
///
/// Values outside their allowed interval are clamped at load time and the
/// clamp is reported as a warning; the engine never sees an out-of-range
/// value.
#[derive(Debug, Clone)]
pub struct Config {
    /// Initial gravity interval, ms.
    pub tick_ms_start: u64,
    /// Floor for the gravity interval, ms.
    pub tick_ms_min: u64,
    /// Gravity interval decrement per level, ms.
    pub speed_acceleration: u64,
    /// Lines per level.
    pub level_step: u32,
    /// Cell count of the next-piece preview box.
    pub preview_grid: u16,
    pub rand_type: RandType,
    /// Bag size for bag mode; 0 means the full catalogue.
    pub rand_bag_size: usize,
    /// Piece catalogue path override.
    pub pieces_file: Option<PathBuf>,
    /// DAS: delay before horizontal auto-repeat starts, ms.
    pub move_das: u64,
    /// ARR: horizontal repeat period after DAS, ms.
    pub move_arr: u64,
    /// Soft-drop repeat period, ms.
    pub soft_drop_delay: u64,
    pub timer_enabled: bool,
    /// Session duration, seconds.
    pub timer_duration_seconds: u64,
    pub timer_warn_30s: bool,
    pub timer_warn_10s: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tick_ms_start: 400,
            tick_ms_min: 80,
            speed_acceleration: 50,
            level_step: 10,
            preview_grid: 6,
            rand_type: RandType::Simple,
            rand_bag_size: 0,
            pieces_file: None,
            move_das: 170,
            move_arr: 50,
            soft_drop_delay: 100,
            timer_enabled: false,
            timer_duration_seconds: 180,
            timer_warn_30s: true,
            timer_warn_10s: true,
        }
    }
}

impl Config {
    /// Load from a .cfg file. Unknown keys are ignored; malformed or
    /// out-of-range values are replaced/clamped and reported in the returned
    /// warning list.
    pub fn load(path: &Path) -> Result<(Self, Vec<String>), ConfigError> {
        let s = std::fs::read_to_string(path)?;
        Ok(Self::parse(&s))
    }

    /// Parse .cfg text. Never fails; problems become warnings.
    pub fn parse(s: &str) -> (Self, Vec<String>) {
        let mut cfg = Self::default();
        let mut warnings = Vec::new();
        for line in s.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
                continue;
            }
            let Some(eq) = line.find('=') else { continue };
            let key = line[..eq].trim().to_ascii_uppercase();
            let value = line[eq + 1..].trim();
            cfg.apply(&key, value, &mut warnings);
        }
        cfg.clamp(&mut warnings);
        (cfg, warnings)
    }

    fn apply(&mut self, key: &str, value: &str, warnings: &mut Vec<String>) {
        match key {
            "TICK_MS_START" => parse_into(&mut self.tick_ms_start, key, value, warnings),
            "TICK_MS_MIN" => parse_into(&mut self.tick_ms_min, key, value, warnings),
            "SPEED_ACCELERATION" => parse_into(&mut self.speed_acceleration, key, value, warnings),
            "LEVEL_STEP" => parse_into(&mut self.level_step, key, value, warnings),
            "PREVIEW_GRID" => parse_into(&mut self.preview_grid, key, value, warnings),
            "RAND_TYPE" => match value.to_ascii_lowercase().as_str() {
                "simple" => self.rand_type = RandType::Simple,
                "bag" => self.rand_type = RandType::Bag,
                other => warnings.push(format!("RAND_TYPE: unknown policy '{other}'")),
            },
            "RAND_BAG_SIZE" => parse_into(&mut self.rand_bag_size, key, value, warnings),
            "PIECES_FILE" => self.pieces_file = Some(PathBuf::from(value)),
            "MOVE_DAS" => parse_into(&mut self.move_das, key, value, warnings),
            "MOVE_ARR" => parse_into(&mut self.move_arr, key, value, warnings),
            "SOFT_DROP_DELAY" => parse_into(&mut self.soft_drop_delay, key, value, warnings),
            "TIMER_ENABLED" => parse_bool(&mut self.timer_enabled, key, value, warnings),
            "TIMER_DURATION_SECONDS" => {
                parse_into(&mut self.timer_duration_seconds, key, value, warnings);
            }
            "TIMER_WARN_30S" => parse_bool(&mut self.timer_warn_30s, key, value, warnings),
            "TIMER_WARN_10S" => parse_bool(&mut self.timer_warn_10s, key, value, warnings),
            // Renderer/audio keys are their collaborators' concern.
            _ => {}
        }
    }

    /// Clamp every value into its allowed interval, recording each clamp.
    fn clamp(&mut self, warnings: &mut Vec<String>) {
        clamp_into(&mut self.tick_ms_start, "TICK_MS_START", 50, 5000, warnings);
        clamp_into(&mut self.tick_ms_min, "TICK_MS_MIN", 16, 1000, warnings);
        clamp_into(
            &mut self.speed_acceleration,
            "SPEED_ACCELERATION",
            0,
            200,
            warnings,
        );
        clamp_into(&mut self.level_step, "LEVEL_STEP", 1, 100, warnings);
        clamp_into(&mut self.preview_grid, "PREVIEW_GRID", 4, 8, warnings);
        clamp_into(&mut self.rand_bag_size, "RAND_BAG_SIZE", 0, 64, warnings);
        clamp_into(&mut self.move_das, "MOVE_DAS", 0, 1000, warnings);
        clamp_into(&mut self.move_arr, "MOVE_ARR", 1, 500, warnings);
        clamp_into(&mut self.soft_drop_delay, "SOFT_DROP_DELAY", 1, 500, warnings);
        clamp_into(
            &mut self.timer_duration_seconds,
            "TIMER_DURATION_SECONDS",
            1,
            86_400,
            warnings,
        );
        if self.tick_ms_min > self.tick_ms_start {
            warnings.push(format!(
                "TICK_MS_MIN {} > TICK_MS_START {}; lowering to match",
                self.tick_ms_min, self.tick_ms_start
            ));
            self.tick_ms_min = self.tick_ms_start;
        }
    }
}

fn parse_into<T: std::str::FromStr + std::fmt::Display>(
    slot: &mut T,
    key: &str,
    value: &str,
    warnings: &mut Vec<String>,
) {
    match value.parse::<T>() {
        Ok(v) => *slot = v,
        Err(_) => warnings.push(format!("{key}: not a number: '{value}', keeping {slot}")),
    }
}

fn parse_bool(slot: &mut bool, key: &str, value: &str, warnings: &mut Vec<String>) {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => *slot = true,
        "false" | "0" | "no" | "off" => *slot = false,
        other => warnings.push(format!("{key}: not a boolean: '{other}'")),
    }
}

fn clamp_into<T: Ord + Copy + std::fmt::Display>(
    slot: &mut T,
    key: &str,
    lo: T,
    hi: T,
    warnings: &mut Vec<String>,
) {
    let clamped = (*slot).max(lo).min(hi);
    if clamped != *slot {
        warnings.push(format!("{key}: {slot} out of range [{lo}, {hi}], clamped"));
        *slot = clamped;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let c = Config::default();
        assert_eq!(c.tick_ms_start, 400);
        assert_eq!(c.tick_ms_min, 80);
        assert_eq!(c.speed_acceleration, 50);
        assert_eq!(c.level_step, 10);
        assert_eq!(c.move_das, 170);
        assert_eq!(c.move_arr, 50);
        assert!(!c.timer_enabled);
    }

    #[test]
    fn test_parse_basic() {
        let (c, warnings) = Config::parse(
            "TICK_MS_START=300\nRAND_TYPE=bag\nRAND_BAG_SIZE=5\nTIMER_ENABLED=yes\n; comment\n# comment\n",
        );
        assert!(warnings.is_empty());
        assert_eq!(c.tick_ms_start, 300);
        assert_eq!(c.rand_type, RandType::Bag);
        assert_eq!(c.rand_bag_size, 5);
        assert!(c.timer_enabled);
    }

    #[test]
    fn test_keys_case_insensitive() {
        let (c, _) = Config::parse("tick_ms_start = 250\nMove_Das=100\n");
        assert_eq!(c.tick_ms_start, 250);
        assert_eq!(c.move_das, 100);
    }

    #[test]
    fn test_out_of_range_clamped() {
        let (c, warnings) = Config::parse("TICK_MS_START=9\nMOVE_ARR=0\nPREVIEW_GRID=99\n");
        assert_eq!(c.tick_ms_start, 50);
        assert_eq!(c.move_arr, 1);
        assert_eq!(c.preview_grid, 8);
        // Clamping the start below the default min also trips the min>start
        // coupling, which lowers the min and adds a fourth warning.
        assert_eq!(c.tick_ms_min, 50);
        assert_eq!(warnings.len(), 4);
    }

    #[test]
    fn test_min_never_exceeds_start() {
        let (c, warnings) = Config::parse("TICK_MS_START=100\nTICK_MS_MIN=500\n");
        assert_eq!(c.tick_ms_min, c.tick_ms_start);
        assert!(!warnings.is_empty());
    }

    #[test]
    fn test_bad_value_keeps_default() {
        let (c, warnings) = Config::parse("TICK_MS_START=fast\n");
        assert_eq!(c.tick_ms_start, 400);
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn test_unknown_keys_ignored() {
        let (_, warnings) = Config::parse("SCANLINES=on\nFULLSCREEN=1\n");
        assert!(warnings.is_empty());
    }
}
