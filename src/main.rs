// Entry point for the xtfade terminal Minesweeper
// Initializes logging, configuration and language settings, then launches the UI

use std::error::Error;
use tracing::info;

// Module declarations
mod xtf_board;  // Minefield generation and flood-fill reveal
mod xtf_color;  // Cross-platform color matching and blending
mod xtf_fx;     // Fading, spinning and veiled tile effects
mod xtf_game;   // Game session, levels and configuration
mod xtf_lang;   // Multi-language string resources
mod xtf_log;    // File logging setup
mod xtf_ticker; // Hard-mode reset ticker thread
mod xtf_ui;     // Terminal UI rendering and event handling

use xtf_game::load_or_create_config;
use xtf_lang::Lang;
use xtf_ui::run as run_ui;

fn main() -> Result<(), Box<dyn Error>> {
    // Logging first so configuration problems are recorded
    let log_path = xtf_log::init();

    // Load or create user configuration (level, board shape, preferences)
    // A broken config file is not overwritten
    let (cfg, persist) = load_or_create_config();
    info!(version = env!("CARGO_PKG_VERSION"), log = ?log_path, "starting");

    // Initialize language resources based on saved or system language
    let lang = Lang::new(&cfg.language);

    // Launch the main UI loop
    run_ui(cfg, lang, persist)
}
