use crossterm::event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind, MouseButton, MouseEvent, MouseEventKind};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use crossterm::{cursor, execute, terminal};
use ratatui::backend::{Backend, CrosstermBackend};
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Span, Spans, Text};
use ratatui::widgets::{Block, Borders, Clear, Paragraph};
use ratatui::{Frame, Terminal};
use std::error::Error;
use std::io::{self, Write};
use std::time::{Duration, Instant};
use tracing::{debug, info};
use unicode_width::UnicodeWidthStr;

use crate::xtf_board::{BoardError, Reveal};
use crate::xtf_color::{blend, WTMatch};
use crate::xtf_fx::Effects;
use crate::xtf_game::{save_config, Config, Game, Level, Status};
use crate::xtf_lang::{fill, Lang};
use crate::xtf_ticker::{ResetEvent, ResetTicker};

/// Which dialog, if any, is covering the board
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Modal {
    None,
    /// Level choice; `restart_on_cancel` starts the remembered level when dismissed
    Level { selected: usize, restart_on_cancel: bool },
    Help,
    Options { focus: usize },
    Loss,
    Win,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MenuAction {
    Help,
    New,
    Level,
    Options,
}

const MENU: [(&str, MenuAction); 4] = [
    ("F1", MenuAction::Help),
    ("F2", MenuAction::New),
    ("F5", MenuAction::Level),
    ("F7", MenuAction::Options),
];

const OPTION_COUNT: usize = 3;

// Screen geometry recorded while drawing, used to map mouse positions back
#[derive(Debug, Default)]
struct UiState {
    board_inner: Option<Rect>,
    menu_rects: Vec<(Rect, MenuAction)>,
    exit_rect: Option<Rect>,
    modal_rect: Option<Rect>,
    modal_close_rect: Option<Rect>,
    modal_item_rects: Vec<Rect>,
    modal_close_hovered: bool,
    modal_close_pressed: bool,
    item_hover: Option<usize>,
    menu_hover: Option<usize>,
    exit_hovered: bool,
    left_press: Option<(usize, usize)>,
}

struct Glyphs {
    unopened: &'static str,
    mine: &'static str,
    flag: &'static str,
    spinner: [&'static str; 4],
}

fn glyphs(ascii: bool) -> Glyphs {
    if ascii {
        Glyphs { unopened: "#", mine: "X", flag: "F", spinner: ["|", "/", "-", "\\"] }
    } else {
        Glyphs { unopened: "■", mine: "X", flag: "⚑", spinner: ["│", "╱", "─", "╲"] }
    }
}

/// The whole interactive program: session, effects, ticker and dialogs
pub struct App {
    pub cfg: Config,
    pub lang: Lang,
    pub game: Game,
    pub fx: Effects,
    pub modal: Modal,
    pub exit_requested: bool,
    ticker: Option<ResetTicker>,
    persist: bool,
    ui: UiState,
}

impl App {
    /// Start up behind the level dialog, with the remembered level preselected
    pub fn new(cfg: Config, lang: Lang) -> Result<App, BoardError> {
        let game = Game::new(&cfg, cfg.level)?;
        let mut app = App::with_game(cfg, lang, game);
        app.persist = true;
        Ok(app)
    }

    /// Build around an existing session without touching the config file
    pub fn with_game(cfg: Config, lang: Lang, game: Game) -> App {
        let modal = Modal::Level { selected: cfg.level.to_index(), restart_on_cancel: true };
        let fx = Effects::new(game.board.width(), game.board.height(), cfg.reset_fade());
        App {
            cfg,
            lang,
            game,
            fx,
            modal,
            exit_requested: false,
            ticker: None,
            persist: false,
            ui: UiState::default(),
        }
    }

    fn save(&self) {
        if self.persist {
            save_config(&self.cfg);
        }
    }

    /// Generate a new board for `level` and remember the choice
    pub fn start_game(&mut self, level: Level) -> Result<(), BoardError> {
        info!(level = level.name(), "level chosen");
        self.cfg.level = level;
        self.save();
        let game = Game::new(&self.cfg, level)?;
        self.install(game);
        Ok(())
    }

    /// Replace the session, resetting effects and the ticker
    pub fn install(&mut self, game: Game) {
        // old ticker must stop before a board of another shape arrives
        self.ticker = None;
        self.fx = Effects::new(game.board.width(), game.board.height(), self.cfg.reset_fade());
        self.game = game;
        self.ui.left_press = None;
        if self.game.status == Status::Won {
            self.modal = Modal::Win;
        }
        self.sync_ticker();
    }

    /// Run the reset ticker exactly when a Hard session with animations is in play
    fn sync_ticker(&mut self) {
        let wanted = self.cfg.animations && self.game.level.resets() && !self.game.is_over();
        match (wanted, self.ticker.is_some()) {
            (true, false) => {
                self.ticker = Some(ResetTicker::spawn(
                    self.game.board.width(),
                    self.game.board.height(),
                    self.cfg.reset_interval(),
                ));
            }
            (false, true) => self.ticker = None,
            _ => {}
        }
    }

    #[cfg(test)]
    pub fn ticker_running(&self) -> bool {
        self.ticker.as_ref().is_some_and(|t| t.is_running())
    }

    /// Drain ticker events and advance veil transitions
    pub fn apply_resets(&mut self, now: Instant) {
        let events: Vec<ResetEvent> = match &self.ticker {
            Some(t) => t.events().collect(),
            None => Vec::new(),
        };
        for ev in events {
            self.apply_reset(ev, now);
        }
        self.fx.tick(now);
    }

    /// Veil the chosen tile if it is open; returns whether anything changed
    pub fn apply_reset(&mut self, ev: ResetEvent, now: Instant) -> bool {
        if self.game.is_over() || !self.cfg.animations {
            return false;
        }
        let opened = self.game.board.cell(ev.x, ev.y).is_some_and(|c| c.opened);
        let veiled = opened && self.fx.veil(ev.x, ev.y, now);
        if veiled {
            debug!(x = ev.x, y = ev.y, "tile reset");
        }
        veiled
    }

    /// Open a tile: lift a veil, or play it on the board
    pub fn open_cell(&mut self, x: usize, y: usize, now: Instant) -> Result<(), BoardError> {
        if self.game.is_over() {
            return Ok(());
        }
        let level = self.game.level;
        if self.game.board.cell(x, y).is_some_and(|c| c.opened) {
            if self.fx.lift(x, y) {
                self.fx.start(&[(x, y)], level, now, &mut rand::thread_rng());
            }
            return Ok(());
        }
        match self.game.open(x, y)? {
            Reveal::Ignored => {}
            Reveal::Opened(cells) => {
                self.fx.start(&cells, level, now, &mut rand::thread_rng());
                if self.game.status == Status::Won {
                    self.modal = Modal::Win;
                }
            }
            Reveal::Exploded => self.modal = Modal::Loss,
        }
        self.sync_ticker();
        Ok(())
    }

    pub fn flag_cell(&mut self, x: usize, y: usize) -> Result<(), BoardError> {
        self.game.toggle_flag(x, y)?;
        Ok(())
    }

    fn prompt_level(&mut self, restart_on_cancel: bool) {
        self.ui.item_hover = None;
        self.modal = Modal::Level { selected: self.cfg.level.to_index(), restart_on_cancel };
    }

    fn toggle_option(&mut self, i: usize) {
        match i {
            0 => {
                self.cfg.animations = !self.cfg.animations;
                self.sync_ticker();
            }
            1 => self.cfg.ascii_icons = !self.cfg.ascii_icons,
            _ => {
                let code = self.lang.next_code();
                self.lang.switch_to(code);
                self.cfg.language = self.lang.current_lang.clone();
            }
        }
    }

    /// Dismiss the current modal the way its CLOSE/OK button does
    fn confirm_modal(&mut self) -> Result<(), BoardError> {
        match self.modal {
            Modal::None => {}
            Modal::Level { selected, .. } => {
                self.modal = Modal::None;
                self.start_game(Level::from_index(selected))?;
            }
            Modal::Help => self.modal = Modal::None,
            Modal::Options { .. } => {
                self.modal = Modal::None;
                self.save();
            }
            // a finished round always leads back to the level choice
            Modal::Loss | Modal::Win => self.prompt_level(true),
        }
        Ok(())
    }

    fn cancel_modal(&mut self) -> Result<(), BoardError> {
        match self.modal {
            Modal::Level { restart_on_cancel: true, .. } => {
                self.modal = Modal::None;
                self.start_game(self.cfg.level)?;
            }
            Modal::Level { restart_on_cancel: false, .. } => self.modal = Modal::None,
            _ => self.confirm_modal()?,
        }
        Ok(())
    }

    fn menu_action(&mut self, action: MenuAction) {
        match action {
            MenuAction::Help => self.modal = Modal::Help,
            MenuAction::New => self.prompt_level(true),
            MenuAction::Level => self.prompt_level(false),
            MenuAction::Options => self.modal = Modal::Options { focus: 0 },
        }
    }

    pub fn handle_key(&mut self, code: KeyCode, now: Instant) -> Result<(), BoardError> {
        match self.modal {
            Modal::Level { selected, restart_on_cancel } => match code {
                KeyCode::Up => {
                    self.modal = Modal::Level { selected: selected.saturating_sub(1), restart_on_cancel }
                }
                KeyCode::Down => {
                    self.modal = Modal::Level { selected: (selected + 1).min(Level::ALL.len() - 1), restart_on_cancel }
                }
                KeyCode::Char(c @ '1'..='3') => {
                    self.modal = Modal::Level { selected: (c as u8 - b'1') as usize, restart_on_cancel };
                    self.confirm_modal()?;
                }
                KeyCode::Enter | KeyCode::Char(' ') => self.confirm_modal()?,
                KeyCode::Esc => self.cancel_modal()?,
                _ => {}
            },
            Modal::Options { focus } => match code {
                KeyCode::Up => self.modal = Modal::Options { focus: focus.saturating_sub(1) },
                KeyCode::Down => self.modal = Modal::Options { focus: (focus + 1).min(OPTION_COUNT - 1) },
                KeyCode::Enter | KeyCode::Char(' ') => self.toggle_option(focus),
                KeyCode::Esc | KeyCode::F(7) => self.confirm_modal()?,
                _ => {}
            },
            Modal::Help | Modal::Loss | Modal::Win => match code {
                KeyCode::Enter | KeyCode::Char(' ') | KeyCode::Esc => self.confirm_modal()?,
                _ => {}
            },
            Modal::None => match code {
                KeyCode::Left => self.game.step_cursor(-1, 0),
                KeyCode::Right => self.game.step_cursor(1, 0),
                KeyCode::Up => self.game.step_cursor(0, -1),
                KeyCode::Down => self.game.step_cursor(0, 1),
                KeyCode::Enter | KeyCode::Char(' ') => {
                    let (x, y) = self.game.cursor;
                    self.open_cell(x, y, now)?;
                }
                KeyCode::Char('f') | KeyCode::Char('F') => {
                    let (x, y) = self.game.cursor;
                    self.flag_cell(x, y)?;
                }
                KeyCode::F(1) => self.menu_action(MenuAction::Help),
                KeyCode::F(2) => self.menu_action(MenuAction::New),
                KeyCode::F(5) => self.menu_action(MenuAction::Level),
                KeyCode::F(7) => self.menu_action(MenuAction::Options),
                KeyCode::Esc | KeyCode::Char('q') => self.exit_requested = true,
                _ => {}
            },
        }
        Ok(())
    }

    /// Board cell under a screen position
    fn cell_at(&self, column: u16, row: u16) -> Option<(usize, usize)> {
        let inner = self.ui.board_inner?;
        if !contains(inner, column, row) {
            return None;
        }
        let x = ((column - inner.x) / 2) as usize;
        let y = (row - inner.y) as usize;
        (x < self.game.board.width() && y < self.game.board.height()).then_some((x, y))
    }

    pub fn handle_mouse(&mut self, me: MouseEvent, now: Instant) -> Result<(), BoardError> {
        if self.modal != Modal::None {
            return self.handle_modal_mouse(me);
        }
        let (col, row) = (me.column, me.row);
        match me.kind {
            MouseEventKind::Moved => {
                self.ui.menu_hover = self.ui.menu_rects.iter().position(|(r, _)| contains(*r, col, row));
                self.ui.exit_hovered = self.ui.exit_rect.is_some_and(|r| contains(r, col, row));
                if let Some(cell) = self.cell_at(col, row) {
                    self.game.cursor = cell;
                }
            }
            MouseEventKind::Down(MouseButton::Left) => {
                if let Some(&(_, action)) = self.ui.menu_rects.iter().find(|(r, _)| contains(*r, col, row)) {
                    self.menu_action(action);
                } else if self.ui.exit_rect.is_some_and(|r| contains(r, col, row)) {
                    self.exit_requested = true;
                } else if let Some(cell) = self.cell_at(col, row) {
                    self.game.cursor = cell;
                    self.ui.left_press = Some(cell);
                }
            }
            MouseEventKind::Up(MouseButton::Left) => {
                // open only when released over the pressed tile
                if let Some(cell) = self.ui.left_press.take() {
                    if self.cell_at(col, row) == Some(cell) {
                        self.open_cell(cell.0, cell.1, now)?;
                    }
                }
            }
            MouseEventKind::Down(MouseButton::Right) => {
                if let Some((x, y)) = self.cell_at(col, row) {
                    self.game.cursor = (x, y);
                    self.flag_cell(x, y)?;
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn handle_modal_mouse(&mut self, me: MouseEvent) -> Result<(), BoardError> {
        let (col, row) = (me.column, me.row);
        let Some(mrect) = self.ui.modal_rect else { return Ok(()) };
        let in_close = self.ui.modal_close_rect.is_some_and(|r| contains(r, col, row));
        let item = self.ui.modal_item_rects.iter().position(|r| contains(*r, col, row));
        match me.kind {
            MouseEventKind::Moved => {
                self.ui.modal_close_hovered = in_close;
                self.ui.item_hover = item;
                if let (Some(i), Modal::Options { .. }) = (item, self.modal) {
                    self.modal = Modal::Options { focus: i };
                }
            }
            MouseEventKind::Down(MouseButton::Left) => {
                // clicks outside the dialog are ignored
                if !contains(mrect, col, row) {
                    return Ok(());
                }
                if in_close {
                    self.ui.modal_close_pressed = true;
                } else if let Some(i) = item {
                    match self.modal {
                        Modal::Level { restart_on_cancel, .. } => {
                            self.modal = Modal::Level { selected: i, restart_on_cancel };
                            self.confirm_modal()?;
                        }
                        Modal::Options { .. } => {
                            self.modal = Modal::Options { focus: i };
                            self.toggle_option(i);
                        }
                        _ => {}
                    }
                }
            }
            MouseEventKind::Up(MouseButton::Left) => {
                if self.ui.modal_close_pressed && in_close {
                    self.confirm_modal()?;
                }
                self.ui.modal_close_pressed = false;
            }
            _ => {}
        }
        Ok(())
    }
}

/// Minimum terminal size for a board of `w` x `h` tiles
pub fn min_size(w: usize, h: usize) -> (u16, u16) {
    let board_w = (w * 2 + 3) as u16;
    (board_w.max(60) + 2, (h + 2 + 6) as u16)
}

pub fn draw<B: Backend>(f: &mut Frame<B>, app: &mut App, now: Instant) {
    let size = f.size();
    let a = app.lang.assets.clone();
    app.ui.board_inner = None;
    app.ui.menu_rects.clear();
    app.ui.exit_rect = None;
    app.ui.modal_rect = None;
    app.ui.modal_close_rect = None;
    app.ui.modal_item_rects.clear();

    let (min_twidth, min_theight) = min_size(app.game.board.width(), app.game.board.height());
    // If terminal too small, render a centered warning and skip normal UI
    if size.width < min_twidth || size.height < min_theight {
        let warn_lines = vec![
            Spans::from(Span::raw(a.tsmsg_line1)),
            Spans::from(Span::raw(fill(a.tsmsg_line2, &[&min_twidth, &min_theight]))),
        ];
        let warn = Paragraph::new(Text::from(warn_lines))
            .block(Block::default().borders(Borders::ALL).title(a.tsmsg_title))
            .alignment(Alignment::Center);
        f.render_widget(Clear, size);
        let w = 40u16.min(size.width.saturating_sub(2));
        let h = 5u16.min(size.height.saturating_sub(2));
        f.render_widget(warn, center_rect(w, h, size));
        return;
    }

    // layout: top menu row, center board, bottom status
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(0)
        .constraints([Constraint::Length(3), Constraint::Min(6), Constraint::Length(3)].as_ref())
        .split(size);

    draw_menu(f, app, chunks[0]);
    draw_status(f, app, chunks[2]);
    draw_board(f, app, chunks[1], now);

    let modal = app.modal;
    match modal {
        Modal::None => {}
        Modal::Level { selected, .. } => draw_level_dialog(f, app, selected, size),
        Modal::Help => {
            let lines = vec![
                Spans::from(Span::raw("")),
                Spans::from(Span::raw(a.help_controls)),
                Spans::from(Span::raw(a.help_move)),
                Spans::from(Span::raw(a.help_open)),
                Spans::from(Span::raw(a.help_flag)),
                Spans::from(Span::raw(a.help_levels)),
            ];
            draw_message(f, app, center_rect(52, 10, size), a.menu_help, lines, Alignment::Left);
        }
        Modal::Options { focus } => draw_options(f, app, focus, size),
        Modal::Loss => {
            let lines = vec![
                Spans::from(Span::raw("")),
                Spans::from(Span::styled(a.loss_header, Style::default().add_modifier(Modifier::BOLD))),
                Spans::from(Span::raw(a.loss_message)),
            ];
            draw_message(f, app, bottom_centered_block(44, 8, size), a.loss_title, lines, Alignment::Center);
        }
        Modal::Win => {
            let secs = app.game.elapsed_secs();
            let lines = vec![
                Spans::from(Span::raw("")),
                Spans::from(Span::styled(a.win_message, Style::default().add_modifier(Modifier::BOLD))),
                Spans::from(Span::raw(fill(a.win_time_fmt, &[&secs]))),
            ];
            draw_message(f, app, bottom_centered_block(44, 8, size), a.win_title, lines, Alignment::Center);
        }
    }

    // If no modal was rendered this frame, ensure close button state is cleared
    if app.ui.modal_rect.is_none() {
        app.ui.modal_close_hovered = false;
        app.ui.modal_close_pressed = false;
    }
}

fn key_styles(hovered: bool) -> (Style, Style) {
    if hovered {
        let bg = Color::LightBlue.wtmatch();
        let fg = Color::Black.wtmatch();
        (Style::default().bg(bg).fg(fg).add_modifier(Modifier::BOLD), Style::default().bg(bg).fg(fg))
    } else {
        (Style::default().fg(Color::Yellow.wtmatch()).add_modifier(Modifier::BOLD), Style::default())
    }
}

fn draw_menu<B: Backend>(f: &mut Frame<B>, app: &mut App, area: Rect) {
    let a = &app.lang.assets;
    // one-space padding left and right inside the menu block
    let mut spans_vec: Vec<Span> = vec![Span::raw(" ")];
    let mut x = area.x + 2;
    for (i, (key, action)) in MENU.iter().enumerate() {
        if i > 0 {
            spans_vec.push(Span::raw("   "));
            x += 3;
        }
        let rest = match action {
            MenuAction::Help => a.menu_help,
            MenuAction::New => a.menu_new,
            MenuAction::Level => a.menu_level,
            MenuAction::Options => a.menu_options,
        };
        let (key_style, rest_style) = key_styles(app.ui.menu_hover == Some(i));
        let label = format!(": {}", rest);
        let item_w = (key.width() + label.as_str().width()) as u16;
        app.ui.menu_rects.push((Rect::new(x, area.y + 1, item_w, 1), *action));
        x += item_w;
        spans_vec.push(Span::styled(key.to_string(), key_style));
        spans_vec.push(Span::styled(label, rest_style));
    }
    spans_vec.push(Span::raw(" "));
    let menu = Paragraph::new(Spans::from(spans_vec)).block(Block::default().borders(Borders::ALL)).alignment(Alignment::Left);
    f.render_widget(menu, area);
}

fn draw_status<B: Backend>(f: &mut Frame<B>, app: &mut App, area: Rect) {
    let a = &app.lang.assets;
    let left_text = fill(a.status_fmt, &[&app.game.remaining_mines(), &app.game.elapsed_secs()]);
    let right_key = "Esc";
    let right_rest = format!(": {}", a.menu_exit);
    let inner_w = area.width.saturating_sub(2) as usize;
    let left_w = left_text.as_str().width();
    let right_w = right_key.width() + right_rest.as_str().width();
    let mid_spaces = if inner_w > left_w + right_w + 1 { inner_w - left_w - right_w - 1 } else { 1 };
    let exit_x = area.x + 1 + (left_w + mid_spaces) as u16;
    app.ui.exit_rect = Some(Rect::new(exit_x, area.y + 1, right_w as u16, 1));
    let (key_style, rest_style) = key_styles(app.ui.exit_hovered);
    let status_spans = vec![
        Span::raw(left_text),
        Span::raw(" ".repeat(mid_spaces)),
        Span::styled(right_key, key_style),
        Span::styled(right_rest, rest_style),
        Span::raw(" "),
    ];
    let status = Paragraph::new(Text::from(Spans::from(status_spans)))
        .block(Block::default().borders(Borders::ALL))
        .alignment(Alignment::Left);
    f.render_widget(status, area);
}

fn draw_board<B: Backend>(f: &mut Frame<B>, app: &mut App, area: Rect, now: Instant) {
    let board = &app.game.board;
    let (w, h) = (board.width(), board.height());
    let board_area = centered_block((w * 2 + 3) as u16, (h + 2) as u16, area);
    app.ui.board_inner = Some(Rect::new(
        board_area.x + 1,
        board_area.y + 1,
        board_area.width.saturating_sub(2),
        board_area.height.saturating_sub(2),
    ));

    let g = glyphs(app.cfg.ascii_icons);
    let anim = app.cfg.animations;
    let board_bg = Color::DarkGray.wtmatch();
    let unopened_fg = Color::Gray.wtmatch();
    let opened_bg = Color::Cyan.wtmatch();
    let cursor_bg = Color::LightBlue.wtmatch();
    let press_bg = Color::Gray.wtmatch();
    let flag_fg = Color::Red.wtmatch();
    let mine_fg = Color::Black.wtmatch();
    let boom_bg = Color::Red.wtmatch();
    let lost_at = match app.game.status {
        Status::Lost { at } => Some(at),
        _ => None,
    };

    let mut lines = Vec::with_capacity(h);
    for y in 0..h {
        let mut spans = Vec::with_capacity(w * 2 + 1);
        for x in 0..w {
            let Some(cell) = board.cell(x, y) else { continue };
            let veiled = anim && app.fx.is_veiled(x, y);
            let mut marker = " ";
            let glyph: String;
            let mut style;
            if cell.opened && !veiled {
                let progress = if anim { app.fx.veil_progress(x, y, now).unwrap_or(0.0) } else { 0.0 };
                let bg = if progress > 0.0 { blend(Color::Cyan, Color::DarkGray, progress) } else { opened_bg };
                style = Style::default().bg(bg);
                if cell.adjacent > 0 {
                    let opacity = if anim { app.fx.opacity(x, y, now) } else { 1.0 };
                    style = style.fg(blend(Color::Black, Color::Cyan, 1.0 - opacity)).add_modifier(Modifier::BOLD);
                    glyph = cell.adjacent.to_string();
                    if anim {
                        if let Some(frame) = app.fx.spinner(x, y, now) {
                            marker = g.spinner[frame];
                        }
                    }
                } else {
                    glyph = " ".to_string();
                }
            } else if lost_at.is_some() && cell.mine {
                let bg = if lost_at == Some((x, y)) { boom_bg } else { board_bg };
                glyph = g.mine.to_string();
                style = Style::default().fg(mine_fg).bg(bg).add_modifier(Modifier::BOLD);
            } else if cell.flagged {
                glyph = g.flag.to_string();
                style = Style::default().fg(flag_fg).bg(board_bg);
            } else {
                glyph = g.unopened.to_string();
                style = Style::default().fg(unopened_fg).bg(board_bg);
                if app.ui.left_press == Some((x, y)) {
                    style = style.bg(press_bg).fg(press_bg);
                }
            }
            if app.game.cursor == (x, y) && !app.game.is_over() {
                style = style.bg(cursor_bg);
            }
            spans.push(Span::styled(marker, style));
            spans.push(Span::styled(glyph, style));
        }
        // one-character padding column so the right edge uses the board background
        spans.push(Span::styled(" ", Style::default().bg(board_bg)));
        lines.push(Spans::from(spans));
    }
    let title = app.lang.level_name(app.game.level.to_index());
    let paragraph = Paragraph::new(Text::from(lines))
        .block(Block::default().borders(Borders::ALL).title(title).title_alignment(Alignment::Center))
        .alignment(Alignment::Left);
    f.render_widget(paragraph, board_area);
}

fn button_style(app: &App) -> Style {
    if app.ui.modal_close_pressed {
        Style::default().bg(Color::Green).fg(Color::Black).add_modifier(Modifier::BOLD)
    } else if app.ui.modal_close_hovered {
        Style::default().bg(Color::White).fg(Color::Black).add_modifier(Modifier::BOLD)
    } else {
        Style::default().bg(Color::Gray).fg(Color::Black).add_modifier(Modifier::BOLD)
    }
}

/// Button on the last inner row of a dialog
fn draw_button<B: Backend>(f: &mut Frame<B>, app: &mut App, inner: Rect, label: &'static str) {
    let btn_w = label.width() as u16;
    let bx = inner.x + (inner.width.saturating_sub(btn_w)) / 2;
    let by = inner.y + inner.height.saturating_sub(1);
    let btn_rect = Rect::new(bx, by, btn_w, 1);
    app.ui.modal_close_rect = Some(btn_rect);
    let btn = Paragraph::new(Spans::from(Span::styled(label, button_style(app)))).alignment(Alignment::Center);
    f.render_widget(btn, btn_rect);
}

fn open_dialog<B: Backend>(f: &mut Frame<B>, app: &mut App, rect: Rect, title: &'static str) -> Rect {
    app.ui.modal_rect = Some(rect);
    f.render_widget(Clear, rect);
    f.render_widget(Block::default().borders(Borders::ALL).title(title), rect);
    Rect::new(rect.x + 1, rect.y + 1, rect.width.saturating_sub(2), rect.height.saturating_sub(2))
}

fn draw_message<B: Backend>(
    f: &mut Frame<B>,
    app: &mut App,
    rect: Rect,
    title: &'static str,
    lines: Vec<Spans<'static>>,
    alignment: Alignment,
) {
    let inner = open_dialog(f, app, rect, title);
    f.render_widget(Paragraph::new(Text::from(lines)).alignment(alignment), inner);
    let close = app.lang.assets.btn_close;
    draw_button(f, app, inner, close);
}

fn draw_level_dialog<B: Backend>(f: &mut Frame<B>, app: &mut App, selected: usize, size: Rect) {
    let a = app.lang.assets.clone();
    let inner = open_dialog(f, app, center_rect(40, 11, size), a.start_title);
    let mut lines = vec![
        Spans::from(Span::raw("")),
        Spans::from(Span::styled(format!(" {}", a.start_header), Style::default().add_modifier(Modifier::BOLD))),
        Spans::from(Span::raw(format!(" {}", a.start_prompt))),
        Spans::from(Span::raw("")),
    ];
    for (i, level) in Level::ALL.iter().enumerate() {
        let mark = if i == selected { "(•)" } else { "( )" };
        let style = if i == selected {
            Style::default().bg(Color::Yellow).fg(Color::Black)
        } else if app.ui.item_hover == Some(i) {
            Style::default().bg(Color::DarkGray)
        } else {
            Style::default()
        };
        app.ui.modal_item_rects.push(Rect::new(inner.x, inner.y + 4 + i as u16, inner.width, 1));
        lines.push(Spans::from(vec![
            Span::raw("   "),
            Span::styled(format!("{} {}", mark, app.lang.level_name(level.to_index())), style),
        ]));
    }
    f.render_widget(Paragraph::new(Text::from(lines)), inner);
    draw_button(f, app, inner, a.btn_ok);
}

fn draw_options<B: Backend>(f: &mut Frame<B>, app: &mut App, focus: usize, size: Rect) {
    let a = app.lang.assets.clone();
    let inner = open_dialog(f, app, center_rect(36, 8, size), a.menu_options);
    let check = |on: bool| if on { "[x]" } else { "[ ]" };
    let rows = [
        format!("{} {}", check(app.cfg.animations), a.opt_animations),
        format!("{} {}", check(app.cfg.ascii_icons), a.opt_ascii_icons),
        format!("{}: {}", a.opt_language, app.lang.language_name()),
    ];
    let mut lines = vec![Spans::from(Span::raw(""))];
    for (i, row) in rows.into_iter().enumerate() {
        let style = if i == focus { Style::default().bg(Color::Yellow).fg(Color::Black) } else { Style::default() };
        app.ui.modal_item_rects.push(Rect::new(inner.x, inner.y + 1 + i as u16, inner.width, 1));
        lines.push(Spans::from(vec![Span::raw(" "), Span::styled(row, style)]));
    }
    f.render_widget(Paragraph::new(Text::from(lines)), inner);
    draw_button(f, app, inner, a.btn_close);
}

/// Raw mode, mouse capture and the alternate screen, undone when dropped
struct TerminalGuard {
    active: bool,
}

impl TerminalGuard {
    fn enter() -> io::Result<TerminalGuard> {
        enable_raw_mode()?;
        // from here on any failure unwinds through Drop
        let guard = TerminalGuard { active: true };
        execute!(io::stdout(), EnableMouseCapture, terminal::EnterAlternateScreen)?;
        Ok(guard)
    }

    fn leave(mut self) -> io::Result<()> {
        self.active = false;
        restore_terminal(&mut io::stdout())
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        if self.active {
            let _ = restore_terminal(&mut io::stdout());
        }
    }
}

/// Leave raw mode and the alternate screen; the screen is left even if raw mode cannot be
fn restore_terminal<W: Write>(out: &mut W) -> io::Result<()> {
    let raw = disable_raw_mode();
    let screen = execute!(out, DisableMouseCapture, terminal::LeaveAlternateScreen, cursor::Show);
    raw.and(screen)
}

/// Set up the terminal, run the event loop, and restore the terminal even when the loop fails
/// `persist` is false when the config file must not be overwritten
pub fn run(cfg: Config, lang: Lang, persist: bool) -> Result<(), Box<dyn Error>> {
    let mut app = App::new(cfg, lang)?;
    app.persist = persist;

    let guard = TerminalGuard::enter()?;
    let backend = CrosstermBackend::new(io::stdout());
    let mut terminal = Terminal::new(backend)?;

    let result = event_loop(&mut terminal, &mut app);

    // Save current level and options before exiting
    app.save();

    drop(terminal);
    let restored = guard.leave();
    result?;
    restored?;
    Ok(())
}

fn event_loop<B: Backend>(terminal: &mut Terminal<B>, app: &mut App) -> Result<(), Box<dyn Error>> {
    // short frame interval keeps fades and spins smooth
    let tick_rate = Duration::from_millis(50);
    let mut last_tick = Instant::now();

    loop {
        let now = Instant::now();
        app.apply_resets(now);
        terminal.draw(|f| draw(f, app, now))?;
        if app.exit_requested {
            info!("exit requested");
            return Ok(());
        }

        let timeout = tick_rate.checked_sub(last_tick.elapsed()).unwrap_or(Duration::ZERO);
        if event::poll(timeout)? {
            match event::read()? {
                Event::Key(KeyEvent { code, kind: KeyEventKind::Press, .. }) => app.handle_key(code, Instant::now())?,
                Event::Mouse(me) => app.handle_mouse(me, Instant::now())?,
                _ => {}
            }
        }

        if last_tick.elapsed() >= tick_rate {
            last_tick = Instant::now();
        }
    }
}

fn contains(r: Rect, column: u16, row: u16) -> bool {
    column >= r.x && column < r.x + r.width && row >= r.y && row < r.y + r.height
}

fn center_rect(width: u16, height: u16, r: Rect) -> Rect {
    let width = width.min(r.width);
    let height = height.min(r.height);
    let x = r.x + (r.width.saturating_sub(width)) / 2;
    let y = r.y + (r.height.saturating_sub(height)) / 2;
    Rect::new(x, y, width, height)
}

fn centered_block(w: u16, h: u16, r: Rect) -> Rect {
    center_rect(w, h, r)
}

fn bottom_centered_block(width: u16, height: u16, r: Rect) -> Rect {
    let width = width.min(r.width);
    let height = height.min(r.height);
    let x = r.x + (r.width.saturating_sub(width)) / 2;
    let y = r.y + r.height.saturating_sub(height);
    Rect::new(x, y, width, height)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xtf_board::Board;
    use crossterm::event::KeyModifiers;
    use ratatui::backend::TestBackend;

    fn test_app(board: Board, level: Level) -> App {
        let cfg = Config { language: "en".to_string(), level, ..Config::default() };
        let game = Game::with_board(board, level);
        App::with_game(cfg, Lang::new("en"), game)
    }

    fn render(app: &mut App, w: u16, h: u16) -> String {
        let mut terminal = Terminal::new(TestBackend::new(w, h)).unwrap();
        terminal.draw(|f| draw(f, app, Instant::now())).unwrap();
        let buffer = terminal.backend().buffer().clone();
        buffer.content().iter().map(|c| c.symbol.as_str()).collect()
    }

    fn mouse(kind: MouseEventKind, column: u16, row: u16) -> MouseEvent {
        MouseEvent { kind, column, row, modifiers: KeyModifiers::NONE }
    }

    #[test]
    fn test_startup_prompts_for_remembered_level() {
        let app = test_app(Board::from_mines(3, 3, &[]).unwrap(), Level::Normal);
        assert_eq!(app.modal, Modal::Level { selected: 1, restart_on_cancel: true });
    }

    #[test]
    fn test_choosing_level_starts_new_game() {
        let mut app = test_app(Board::from_mines(3, 3, &[]).unwrap(), Level::Easy);
        let now = Instant::now();
        app.handle_key(KeyCode::Down, now).unwrap();
        app.handle_key(KeyCode::Enter, now).unwrap();
        assert_eq!(app.modal, Modal::None);
        assert_eq!(app.game.level, Level::Normal);
        assert_eq!(app.cfg.level, Level::Normal);
        assert_eq!((app.game.board.width(), app.game.board.height()), (20, 20));
        assert!(!app.ticker_running());
    }

    #[test]
    fn test_cancel_mid_game_keeps_board() {
        let mut app = test_app(Board::from_mines(3, 3, &[(0, 0)]).unwrap(), Level::Easy);
        app.modal = Modal::None;
        let now = Instant::now();
        app.open_cell(1, 1, now).unwrap();
        app.handle_key(KeyCode::F(5), now).unwrap();
        assert!(matches!(app.modal, Modal::Level { restart_on_cancel: false, .. }));
        app.handle_key(KeyCode::Esc, now).unwrap();
        assert_eq!(app.modal, Modal::None);
        assert_eq!(app.game.board.width(), 3);
    }

    #[test]
    fn test_mine_shows_loss_then_level_prompt() {
        let mut app = test_app(Board::from_mines(3, 3, &[(1, 1)]).unwrap(), Level::Easy);
        app.modal = Modal::None;
        let now = Instant::now();
        app.game.cursor = (1, 1);
        app.handle_key(KeyCode::Char(' '), now).unwrap();
        assert_eq!(app.modal, Modal::Loss);
        assert_eq!(app.game.status, Status::Lost { at: (1, 1) });
        app.handle_key(KeyCode::Enter, now).unwrap();
        assert!(matches!(app.modal, Modal::Level { restart_on_cancel: true, .. }));
        // dismissing regenerates the board
        app.handle_key(KeyCode::Esc, now).unwrap();
        assert_eq!(app.game.status, Status::Playing);
        assert_eq!(app.game.board.width(), 20);
    }

    #[test]
    fn test_clearing_board_shows_win() {
        let mut app = test_app(Board::from_mines(3, 3, &[]).unwrap(), Level::Easy);
        app.modal = Modal::None;
        app.open_cell(0, 0, Instant::now()).unwrap();
        assert_eq!(app.modal, Modal::Win);
    }

    #[test]
    fn test_flag_key_toggles_flag() {
        let mut app = test_app(Board::from_mines(3, 3, &[(0, 0)]).unwrap(), Level::Easy);
        app.modal = Modal::None;
        let now = Instant::now();
        app.handle_key(KeyCode::Char('f'), now).unwrap();
        assert!(app.game.board.cell(0, 0).unwrap().flagged);
        assert_eq!(app.game.remaining_mines(), 0);
        app.handle_key(KeyCode::Enter, now).unwrap();
        assert_eq!(app.game.status, Status::Playing);
    }

    #[test]
    fn test_hard_level_runs_ticker_until_round_ends() {
        let mut app = test_app(Board::from_mines(3, 3, &[(0, 0)]).unwrap(), Level::Hard);
        app.modal = Modal::None;
        app.install(Game::with_board(Board::from_mines(3, 3, &[(0, 0)]).unwrap(), Level::Hard));
        assert!(app.ticker_running());
        app.open_cell(0, 0, Instant::now()).unwrap();
        assert!(!app.ticker_running());

        app.install(Game::with_board(Board::from_mines(3, 3, &[(0, 0)]).unwrap(), Level::Hard));
        assert!(app.ticker_running());
        // turning animations off stops resets
        app.toggle_option(0);
        assert!(!app.ticker_running());
    }

    #[test]
    fn test_reset_veils_open_tile_until_reopened() {
        let mut app = test_app(Board::from_mines(3, 3, &[(0, 0)]).unwrap(), Level::Hard);
        app.modal = Modal::None;
        let t0 = Instant::now();
        app.open_cell(1, 1, t0).unwrap();
        // unopened tiles are left alone
        assert!(!app.apply_reset(ResetEvent { x: 2, y: 2 }, t0));
        assert!(app.apply_reset(ResetEvent { x: 1, y: 1 }, t0));
        app.fx.tick(t0 + app.cfg.reset_fade());
        assert!(app.fx.is_veiled(1, 1));
        // board state is untouched by the reset
        assert!(app.game.board.cell(1, 1).unwrap().opened);
        let first_open = app.fx.tile(1, 1).unwrap().opened_at;
        assert_eq!(first_open, t0);
        // reopening later restarts fade and spin from that moment
        let t1 = t0 + Duration::from_secs(5);
        app.open_cell(1, 1, t1).unwrap();
        assert!(!app.fx.is_veiled(1, 1));
        assert_eq!(app.fx.tile(1, 1).unwrap().opened_at, t1);
        assert_eq!(app.game.status, Status::Playing);
    }

    #[test]
    fn test_render_shows_board_and_status() {
        let mut app = test_app(Board::from_mines(4, 3, &[(0, 0)]).unwrap(), Level::Normal);
        app.modal = Modal::None;
        let screen = render(&mut app, 80, 24);
        assert!(screen.contains("Normal"));
        assert!(screen.contains("Mines: 1"));
        assert!(screen.contains("F2: New"));
        assert!(app.ui.board_inner.is_some());
    }

    #[test]
    fn test_render_level_dialog() {
        let mut app = test_app(Board::from_mines(4, 3, &[]).unwrap(), Level::Easy);
        let screen = render(&mut app, 80, 24);
        assert!(screen.contains("Easy, normal or hard?"));
        assert!(screen.contains("(•) Easy"));
        assert_eq!(app.ui.modal_item_rects.len(), 3);
    }

    #[test]
    fn test_render_too_small_terminal() {
        let mut app = test_app(Board::from_mines(20, 20, &[]).unwrap(), Level::Easy);
        let screen = render(&mut app, 40, 10);
        assert!(screen.contains("Resize needed"));
        assert!(app.ui.board_inner.is_none());
    }

    #[test]
    fn test_mouse_click_opens_tile() {
        let mut app = test_app(Board::from_mines(4, 3, &[(3, 0), (3, 2)]).unwrap(), Level::Easy);
        app.modal = Modal::None;
        render(&mut app, 80, 24);
        let inner = app.ui.board_inner.unwrap();
        let now = Instant::now();
        // tile (1, 0): second column pair of the first row
        let (col, row) = (inner.x + 2, inner.y);
        app.handle_mouse(mouse(MouseEventKind::Down(MouseButton::Left), col, row), now).unwrap();
        assert!(!app.game.board.cell(1, 0).unwrap().opened);
        app.handle_mouse(mouse(MouseEventKind::Up(MouseButton::Left), col, row), now).unwrap();
        assert!(app.game.board.cell(1, 0).unwrap().opened);
        // right click flags the mine
        let (mcol, mrow) = (inner.x + 6, inner.y + 2);
        app.handle_mouse(mouse(MouseEventKind::Down(MouseButton::Right), mcol, mrow), now).unwrap();
        assert!(app.game.board.cell(3, 2).unwrap().flagged);
    }

    #[test]
    fn test_mouse_picks_level_row() {
        let mut app = test_app(Board::from_mines(4, 3, &[]).unwrap(), Level::Easy);
        render(&mut app, 80, 24);
        let hard = app.ui.modal_item_rects[2];
        app.handle_mouse(mouse(MouseEventKind::Down(MouseButton::Left), hard.x + 4, hard.y), Instant::now())
            .unwrap();
        assert_eq!(app.modal, Modal::None);
        assert_eq!(app.game.level, Level::Hard);
        assert!(app.ticker_running());
    }

    #[test]
    fn test_menu_click_opens_help_and_close_button() {
        let mut app = test_app(Board::from_mines(4, 3, &[]).unwrap(), Level::Easy);
        app.modal = Modal::None;
        render(&mut app, 80, 24);
        let (help, _) = app.ui.menu_rects[0];
        let now = Instant::now();
        app.handle_mouse(mouse(MouseEventKind::Down(MouseButton::Left), help.x, help.y), now).unwrap();
        assert_eq!(app.modal, Modal::Help);
        render(&mut app, 80, 24);
        let close = app.ui.modal_close_rect.unwrap();
        app.handle_mouse(mouse(MouseEventKind::Down(MouseButton::Left), close.x, close.y), now).unwrap();
        app.handle_mouse(mouse(MouseEventKind::Up(MouseButton::Left), close.x, close.y), now).unwrap();
        assert_eq!(app.modal, Modal::None);
    }

    #[test]
    fn test_options_toggle_language_and_icons() {
        let mut app = test_app(Board::from_mines(4, 3, &[]).unwrap(), Level::Easy);
        app.modal = Modal::None;
        let now = Instant::now();
        app.handle_key(KeyCode::F(7), now).unwrap();
        app.handle_key(KeyCode::Down, now).unwrap();
        app.handle_key(KeyCode::Char(' '), now).unwrap();
        assert!(app.cfg.ascii_icons);
        app.handle_key(KeyCode::Down, now).unwrap();
        app.handle_key(KeyCode::Enter, now).unwrap();
        assert_eq!(app.cfg.language, "zh");
        app.handle_key(KeyCode::Esc, now).unwrap();
        assert_eq!(app.modal, Modal::None);
    }

    #[test]
    fn test_board_without_safe_cells_is_won_at_once() {
        let mut app = test_app(Board::from_mines(3, 3, &[(0, 0)]).unwrap(), Level::Hard);
        app.modal = Modal::None;
        let all = [(0, 0), (1, 0), (0, 1), (1, 1)];
        app.install(Game::with_board(Board::from_mines(2, 2, &all).unwrap(), Level::Hard));
        assert_eq!(app.modal, Modal::Win);
        assert!(!app.ticker_running());
        app.open_cell(0, 0, Instant::now()).unwrap();
        assert_eq!(app.game.status, Status::Won);
    }

    #[test]
    fn test_lost_board_shows_mines_as_x() {
        let mut app = test_app(Board::from_mines(3, 3, &[(0, 0), (2, 2)]).unwrap(), Level::Easy);
        app.modal = Modal::None;
        app.open_cell(2, 2, Instant::now()).unwrap();
        assert_eq!(app.modal, Modal::Loss);
        // look under the alert
        app.modal = Modal::None;
        let mut terminal = Terminal::new(TestBackend::new(80, 24)).unwrap();
        terminal.draw(|f| draw(f, &mut app, Instant::now())).unwrap();
        let inner = app.ui.board_inner.unwrap();
        let buffer = terminal.backend().buffer();
        // glyphs sit one column right of each tile's marker
        assert_eq!(buffer.get(inner.x + 1, inner.y).symbol, "X");
        assert_eq!(buffer.get(inner.x + 5, inner.y + 2).symbol, "X");
        assert_eq!(buffer.get(inner.x + 3, inner.y).symbol, "■");
    }

    #[test]
    fn test_restore_terminal_leaves_alternate_screen() {
        let mut out = Vec::new();
        restore_terminal(&mut out).unwrap();
        let written = String::from_utf8(out).unwrap();
        assert!(written.contains("\x1b[?1049l"));
        assert!(written.contains("\x1b[?25h"));
    }

    #[test]
    fn test_min_size() {
        assert_eq!(min_size(20, 20), (62, 28));
        assert_eq!(min_size(40, 30), (85, 38));
    }
}
