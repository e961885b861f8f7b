//! dropblocks — falling-block arcade game in the terminal.

mod app;
mod audio;
mod board;
mod config;
mod engine;
mod input;
mod pieces;
mod randomizer;
mod screenshot;
mod timer;
mod ui;

use anyhow::{Context, Result};
use app::App;
use clap::Parser;
use config::Config;
use engine::Engine;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Default config path tried when none is given.
const DEFAULT_CONFIG_PATH: &str = "dropblocks.cfg";

/// Falling-block arcade game in the terminal.
#[derive(Debug, Parser)]
#[command(
    name = "dropblocks",
    version,
    about = "Falling-block arcade game in the terminal: SRS rotation, DAS/ARR input, combos and an optional session timer.",
    long_about = "dropblocks is a terminal falling-block arcade game.\n\n\
        Stack the falling pieces; full horizontal lines clear and score. Speed rises \
        with every level, quick consecutive clears chain into combos, and an optional \
        session timer turns a run into a fixed-length round.\n\n\
        CONTROLS (normal):\n  Left/Right  Move    Up        Rotate CW   Down       Soft drop\n  Enter/Space Hard drop   P          Pause      Q / Esc    Quit\n\n\
        CONTROLS (vim):\n  h/l         Move    k or i     Rotate CW   u or z     Rotate CCW\n  j           Soft drop\n\n\
        EXTRAS:\n  r           Restart (game over)   R  Restart anytime   t  Timer on/off\n  d           Debug overlay          s  Screenshot (BMP)\n\n\
        Settings come from a KEY=VALUE .cfg file; DROPBLOCKS_CFG overrides the path, \
        DROPBLOCKS_PIECES overrides the piece catalogue."
)]
pub struct Args {
    /// Path to the config file (KEY=VALUE). Defaults to dropblocks.cfg when present.
    #[arg(value_name = "CONFIG")]
    pub config: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let mut warnings = Vec::new();

    let (mut config, config_warnings) = load_config(args.config.as_deref(), &mut warnings);
    warnings.extend(config_warnings);

    let (catalogue, rand_section, catalogue_warnings) =
        pieces::load_catalogue(config.pieces_file.as_deref());
    warnings.extend(catalogue_warnings);
    // The catalogue's [rand] section overrides the config.
    if let Some(rand_type) = rand_section.rand_type {
        config.rand_type = rand_type;
    }
    if let Some(bag_size) = rand_section.bag_size {
        config.rand_bag_size = bag_size;
    }

    let now = Instant::now();
    let engine =
        Engine::new(catalogue, config.clone(), now).context("failed to start the game engine")?;
    let mut app = App::new(engine, &config, warnings);
    app.run()?;
    Ok(())
}

/// Resolve and load the config: `DROPBLOCKS_CFG` beats the CLI path beats
/// `dropblocks.cfg` in the working directory. A missing or unreadable file is
/// a warning, not an error; the defaults carry the game.
fn load_config(cli_path: Option<&Path>, warnings: &mut Vec<String>) -> (Config, Vec<String>) {
    let env_path = std::env::var_os("DROPBLOCKS_CFG").map(PathBuf::from);
    let path = env_path
        .as_deref()
        .or(cli_path)
        .map(Path::to_path_buf)
        .or_else(|| {
            let fallback = PathBuf::from(DEFAULT_CONFIG_PATH);
            fallback.exists().then_some(fallback)
        });
    let Some(path) = path else {
        return (Config::default(), Vec::new());
    };
    match Config::load(&path) {
        Ok(loaded) => loaded,
        Err(err) => {
            warnings.push(format!("config {}: {err}; using defaults", path.display()));
            (Config::default(), Vec::new())
        }
    }
}
