// Game session and configuration management
// Handles levels, session state, timers and configuration persistence

use directories::ProjectDirs;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{info, warn};

use crate::xtf_board::{Board, BoardError, Reveal};

/// Difficulty levels offered in the start dialog
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Easy,   // fading numbers
    Normal, // fading + spinning numbers
    Hard,   // Normal + random tile resets
}

impl Serialize for Level {
    /// Serialize level as its display name (not an index)
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for Level {
    /// Accept the level name in any letter case
    fn deserialize<D>(deserializer: D) -> Result<Level, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Level::ALL
            .into_iter()
            .find(|l| l.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| serde::de::Error::custom(format!("unknown level '{}'", s)))
    }
}

impl Level {
    pub const ALL: [Level; 3] = [Level::Easy, Level::Normal, Level::Hard];

    /// Stable identifier used in the config file and logs
    pub fn name(&self) -> &'static str {
        match self {
            Level::Easy => "Easy",
            Level::Normal => "Normal",
            Level::Hard => "Hard",
        }
    }

    pub fn to_index(&self) -> usize {
        match self {
            Level::Easy => 0,
            Level::Normal => 1,
            Level::Hard => 2,
        }
    }

    pub fn from_index(i: usize) -> Level {
        match i {
            0 => Level::Easy,
            1 => Level::Normal,
            _ => Level::Hard,
        }
    }

    /// Numbers rotate on Normal and Hard
    pub fn spins(&self) -> bool {
        matches!(self, Level::Normal | Level::Hard)
    }

    /// Opened tiles get randomly reset on Hard
    pub fn resets(&self) -> bool {
        matches!(self, Level::Hard)
    }
}

pub const MIN_SIDE: usize = 2;
pub const MAX_WIDTH: usize = 40;
pub const MAX_HEIGHT: usize = 30;
pub const MAX_PROBABILITY: f64 = 0.9;
pub const MIN_RESET_INTERVAL_MS: u64 = 100;

/// User configuration, persisted to disk as TOML
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    pub level: Level, // Remembered level, preselected in the start dialog

    // Board shape
    pub width: usize,
    pub height: usize,
    pub mine_probability: f64,

    // Preferences
    pub animations: bool,  // Fade, spin and reset effects
    pub ascii_icons: bool, // Use ASCII fallback icons
    pub language: String,  // Language code ("en" or "zh")

    // Hard-mode reset timing
    pub reset_interval_ms: u64,
    pub reset_fade_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        // Auto-detect system language on first run
        let system_lang = sys_locale::get_locale().unwrap_or_else(|| "en".to_string());
        let language = if system_lang.to_lowercase().starts_with("zh") {
            "zh".to_string()
        } else {
            "en".to_string()
        };

        Config {
            level: Level::Easy,
            width: 20,
            height: 20,
            mine_probability: 0.2,
            animations: true,
            ascii_icons: false,
            language,
            reset_interval_ms: 1000,
            reset_fade_ms: 2000,
        }
    }
}

impl Config {
    /// Clamp out-of-range values, logging each correction
    pub fn sanitized(mut self) -> Self {
        let w = self.width.clamp(MIN_SIDE, MAX_WIDTH);
        if w != self.width {
            warn!("width {} out of range, using {}", self.width, w);
            self.width = w;
        }
        let h = self.height.clamp(MIN_SIDE, MAX_HEIGHT);
        if h != self.height {
            warn!("height {} out of range, using {}", self.height, h);
            self.height = h;
        }
        if !self.mine_probability.is_finite() {
            warn!("mine_probability is not a number, using default");
            self.mine_probability = Config::default().mine_probability;
        }
        let p = self.mine_probability.clamp(0.0, MAX_PROBABILITY);
        if p != self.mine_probability {
            warn!("mine_probability {} out of range, using {}", self.mine_probability, p);
            self.mine_probability = p;
        }
        if self.reset_interval_ms < MIN_RESET_INTERVAL_MS {
            warn!("reset_interval_ms {} too short, using {}", self.reset_interval_ms, MIN_RESET_INTERVAL_MS);
            self.reset_interval_ms = MIN_RESET_INTERVAL_MS;
        }
        self
    }

    pub fn reset_interval(&self) -> Duration {
        Duration::from_millis(self.reset_interval_ms)
    }

    pub fn reset_fade(&self) -> Duration {
        Duration::from_millis(self.reset_fade_ms)
    }
}

/// Outcome of the current session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Playing,
    Lost { at: (usize, usize) },
    Won,
}

/// One round of play: a board plus its level, cursor and timer
#[derive(Debug, Clone)]
pub struct Game {
    pub board: Board,
    pub level: Level,
    pub status: Status,
    pub cursor: (usize, usize),
    start_time: Option<Instant>,
    elapsed: Duration,
}

impl Game {
    /// Generate a fresh board for the configured shape
    pub fn new(cfg: &Config, level: Level) -> Result<Game, BoardError> {
        let board = Board::generate(cfg.width, cfg.height, cfg.mine_probability)?;
        info!(
            level = level.name(),
            width = cfg.width,
            height = cfg.height,
            mines = board.mine_count(),
            "new game"
        );
        Ok(Game::with_board(board, level))
    }

    /// Wrap a board in a session; a board without safe cells starts out won
    pub fn with_board(board: Board, level: Level) -> Game {
        let status = if board.is_cleared() {
            info!("no safe cells, field cleared");
            Status::Won
        } else {
            Status::Playing
        };
        Game {
            board,
            level,
            status,
            cursor: (0, 0),
            start_time: None,
            elapsed: Duration::ZERO,
        }
    }

    pub fn is_over(&self) -> bool {
        self.status != Status::Playing
    }

    /// Open a cell
    /// - The first effective open starts the timer
    /// - A mine ends the session as lost
    /// - Opening the last safe cell ends it as won
    pub fn open(&mut self, x: usize, y: usize) -> Result<Reveal, BoardError> {
        if self.is_over() {
            return Ok(Reveal::Ignored);
        }
        let reveal = self.board.open(x, y)?;
        match &reveal {
            Reveal::Ignored => {}
            Reveal::Exploded => {
                self.start_timer();
                self.stop_timer();
                self.status = Status::Lost { at: (x, y) };
                info!(x, y, opened = self.board.opened_count(), secs = self.elapsed.as_secs(), "game over");
            }
            Reveal::Opened(_) => {
                self.start_timer();
                if self.board.is_cleared() {
                    self.stop_timer();
                    self.status = Status::Won;
                    info!(secs = self.elapsed.as_secs(), "field cleared");
                }
            }
        }
        Ok(reveal)
    }

    pub fn toggle_flag(&mut self, x: usize, y: usize) -> Result<bool, BoardError> {
        if self.is_over() {
            return Ok(false);
        }
        self.board.toggle_flag(x, y)
    }

    fn start_timer(&mut self) {
        if self.start_time.is_none() {
            self.start_time = Some(Instant::now());
        }
    }

    fn stop_timer(&mut self) {
        if let Some(t0) = self.start_time {
            self.elapsed = t0.elapsed();
        }
    }

    /// Seconds shown in the status bar
    pub fn elapsed_secs(&self) -> u64 {
        match (self.status, self.start_time) {
            (Status::Playing, Some(t0)) => t0.elapsed().as_secs(),
            _ => self.elapsed.as_secs(),
        }
    }

    #[cfg(test)]
    pub fn is_timer_running(&self) -> bool {
        self.status == Status::Playing && self.start_time.is_some()
    }

    /// Mine counter display value (mines - flags), may go negative
    pub fn remaining_mines(&self) -> isize {
        self.board.mine_count() as isize - self.board.flag_count() as isize
    }

    pub fn step_cursor(&mut self, dx: isize, dy: isize) {
        let nx = (self.cursor.0 as isize + dx).clamp(0, (self.board.width() - 1) as isize) as usize;
        let ny = (self.cursor.1 as isize + dy).clamp(0, (self.board.height() - 1) as isize) as usize;
        self.cursor = (nx, ny);
    }
}

/// Get the configuration file path
/// Uses platform-specific config directory (e.g., ~/.config/xtfade/xtfade.toml on Linux)
/// Falls back to current directory if ProjectDirs is unavailable
pub fn config_path() -> Option<PathBuf> {
    let exe = env::current_exe().ok()?;
    let name = exe.file_stem().and_then(|s| s.to_str())?.to_string();
    if let Some(proj) = ProjectDirs::from("com", "xhbl", &name) {
        let mut path = proj.config_dir().to_path_buf();
        path.push(format!("{}.toml", name));
        return Some(path);
    }
    let mut path = env::current_dir().ok()?;
    path.push(format!("{}.toml", name));
    Some(path)
}

/// Parse a config file body; all missing keys take their defaults
pub fn parse_config(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s).map(Config::sanitized)
}

/// Load configuration from disk, or create default if not found
/// The flag tells whether the file may be written back: a file that exists
/// but cannot be read or parsed is left for the user to fix
pub fn load_or_create_config() -> (Config, bool) {
    match config_path() {
        Some(path) => load_or_create_config_at(&path),
        None => {
            warn!("no config location available, using defaults");
            (Config::default(), false)
        }
    }
}

pub fn load_or_create_config_at(path: &Path) -> (Config, bool) {
    if !path.exists() {
        let cfg = Config::default();
        write_config(path, &cfg);
        info!(path = %path.display(), "config created");
        return (cfg, true);
    }
    match fs::read_to_string(path) {
        Ok(s) => match parse_config(&s) {
            Ok(cfg) => {
                info!(path = %path.display(), "config loaded");
                return (cfg, true);
            }
            Err(e) => warn!(path = %path.display(), "invalid config, using defaults: {}", e),
        },
        Err(e) => warn!(path = %path.display(), "cannot read config, using defaults: {}", e),
    }
    (Config::default(), false)
}

/// Save configuration to disk as TOML
pub fn save_config(cfg: &Config) {
    if let Some(path) = config_path() {
        write_config(&path, cfg);
    }
}

fn write_config(path: &Path, cfg: &Config) {
    let s = match toml::to_string(cfg) {
        Ok(s) => s,
        Err(e) => {
            warn!("cannot serialize config: {}", e);
            return;
        }
    };
    if let Some(parent) = path.parent() {
        let _ = fs::create_dir_all(parent);
    }
    if let Err(e) = fs::write(path, s) {
        warn!(path = %path.display(), "cannot write config: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = env::temp_dir().join(format!("xtfade-{}-{}", name, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn test_config() -> Config {
        Config {
            language: "en".to_string(),
            ..Config::default()
        }
    }

    #[test]
    fn test_level_index_round_trip() {
        for level in Level::ALL {
            assert_eq!(Level::from_index(level.to_index()), level);
        }
        assert!(!Level::Easy.spins());
        assert!(Level::Normal.spins() && !Level::Normal.resets());
        assert!(Level::Hard.spins() && Level::Hard.resets());
    }

    #[test]
    fn test_config_toml_round_trip() {
        let cfg = Config {
            level: Level::Hard,
            width: 12,
            ascii_icons: true,
            ..test_config()
        };
        let s = toml::to_string(&cfg).unwrap();
        assert!(s.contains("level = \"Hard\""));
        assert_eq!(parse_config(&s).unwrap(), cfg);
    }

    #[test]
    fn test_config_defaults_fill_missing_keys() {
        let cfg = parse_config("level = \"normal\"\n").unwrap();
        assert_eq!(cfg.level, Level::Normal);
        assert_eq!((cfg.width, cfg.height), (20, 20));
        assert_eq!(cfg.mine_probability, 0.2);
        assert!(cfg.animations);
        assert_eq!(cfg.reset_interval(), Duration::from_millis(1000));
        assert_eq!(cfg.reset_fade(), Duration::from_millis(2000));
    }

    #[test]
    fn test_config_rejects_unknown_level() {
        assert!(parse_config("level = \"Insane\"\n").is_err());
    }

    #[test]
    fn test_config_sanitizes_ranges() {
        let cfg = parse_config(
            "width = 0\nheight = 500\nmine_probability = 3.0\nreset_interval_ms = 1\n",
        )
        .unwrap();
        assert_eq!(cfg.width, MIN_SIDE);
        assert_eq!(cfg.height, MAX_HEIGHT);
        assert_eq!(cfg.mine_probability, MAX_PROBABILITY);
        assert_eq!(cfg.reset_interval_ms, MIN_RESET_INTERVAL_MS);
    }

    #[test]
    fn test_new_game_uses_config_shape() {
        let cfg = Config { width: 7, height: 5, ..test_config() };
        let game = Game::new(&cfg, Level::Normal).unwrap();
        assert_eq!((game.board.width(), game.board.height()), (7, 5));
        assert_eq!(game.status, Status::Playing);
        assert_eq!(game.level, Level::Normal);
    }

    #[test]
    fn test_opening_mine_loses_and_freezes() {
        let board = Board::from_mines(3, 3, &[(0, 0)]).unwrap();
        let mut game = Game::with_board(board, Level::Easy);
        assert!(!game.is_timer_running());
        assert_eq!(game.open(0, 0).unwrap(), Reveal::Exploded);
        assert_eq!(game.status, Status::Lost { at: (0, 0) });
        assert!(!game.is_timer_running());
        // no further moves once lost
        assert_eq!(game.open(2, 2).unwrap(), Reveal::Ignored);
        assert!(!game.toggle_flag(2, 2).unwrap());
    }

    #[test]
    fn test_clearing_board_wins() {
        let board = Board::from_mines(3, 3, &[(0, 0)]).unwrap();
        let mut game = Game::with_board(board, Level::Easy);
        assert_eq!(game.open(1, 1).unwrap(), Reveal::Opened(vec![(1, 1)]));
        assert_eq!(game.status, Status::Playing);
        assert!(game.is_timer_running());
        // the far corner cascades over every remaining safe cell
        game.open(2, 2).unwrap();
        assert_eq!(game.status, Status::Won);
        assert!(!game.is_timer_running());
    }

    #[test]
    fn test_ignored_open_does_not_start_timer() {
        let board = Board::from_mines(2, 2, &[(0, 0)]).unwrap();
        let mut game = Game::with_board(board, Level::Easy);
        game.toggle_flag(1, 1).unwrap();
        assert_eq!(game.open(1, 1).unwrap(), Reveal::Ignored);
        assert!(!game.is_timer_running());
        assert_eq!(game.elapsed_secs(), 0);
    }

    #[test]
    fn test_remaining_mines_can_go_negative() {
        let board = Board::from_mines(3, 1, &[(0, 0)]).unwrap();
        let mut game = Game::with_board(board, Level::Easy);
        assert_eq!(game.remaining_mines(), 1);
        game.toggle_flag(1, 0).unwrap();
        game.toggle_flag(2, 0).unwrap();
        assert_eq!(game.remaining_mines(), -1);
    }

    #[test]
    fn test_step_cursor_clamps() {
        let board = Board::from_mines(3, 2, &[]).unwrap();
        let mut game = Game::with_board(board, Level::Easy);
        game.step_cursor(-1, -1);
        assert_eq!(game.cursor, (0, 0));
        game.step_cursor(5, 5);
        assert_eq!(game.cursor, (2, 1));
    }

    #[test]
    fn test_board_without_safe_cells_starts_won() {
        let board = Board::from_mines(2, 2, &[(0, 0), (1, 0), (0, 1), (1, 1)]).unwrap();
        let mut game = Game::with_board(board, Level::Hard);
        assert_eq!(game.status, Status::Won);
        assert!(game.is_over());
        assert_eq!(game.open(0, 0).unwrap(), Reveal::Ignored);
        assert_eq!(game.status, Status::Won);
        assert_eq!(game.elapsed_secs(), 0);
    }

    #[test]
    fn test_missing_config_is_created_with_defaults() {
        let dir = scratch_dir("missing");
        let path = dir.join("nested").join("xtfade.toml");
        let (cfg, persist) = load_or_create_config_at(&path);
        assert!(persist);
        assert_eq!(cfg, Config::default());
        let written = fs::read_to_string(&path).unwrap();
        assert_eq!(parse_config(&written).unwrap(), cfg);
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_invalid_config_falls_back_and_is_kept() {
        let dir = scratch_dir("invalid");
        let path = dir.join("xtfade.toml");
        fs::write(&path, "level = [oops\n").unwrap();
        let (cfg, persist) = load_or_create_config_at(&path);
        assert!(!persist);
        assert_eq!(cfg, Config::default());
        assert_eq!(fs::read_to_string(&path).unwrap(), "level = [oops\n");
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_unreadable_config_falls_back() {
        let dir = scratch_dir("unreadable");
        // a directory where the file should be cannot be read as text
        let path = dir.join("xtfade.toml");
        fs::create_dir_all(&path).unwrap();
        let (cfg, persist) = load_or_create_config_at(&path);
        assert!(!persist);
        assert_eq!(cfg, Config::default());
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_valid_config_values_are_kept() {
        let dir = scratch_dir("valid");
        let path = dir.join("xtfade.toml");
        fs::write(&path, "level = \"hard\"\nwidth = 9\nascii_icons = true\n").unwrap();
        let (cfg, persist) = load_or_create_config_at(&path);
        assert!(persist);
        assert_eq!(cfg.level, Level::Hard);
        assert_eq!(cfg.width, 9);
        assert!(cfg.ascii_icons);
        let _ = fs::remove_dir_all(&dir);
    }
}
