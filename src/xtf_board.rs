// Minefield model: generation, adjacency counts, flags and flood-fill reveal
// Pure data, no timing or rendering concerns

use rand::Rng;
use std::collections::VecDeque;
use thiserror::Error;

/// Errors raised when building or addressing a board
#[derive(Debug, Error, PartialEq)]
pub enum BoardError {
    #[error("board dimensions must be non-zero (got {width}x{height})")]
    EmptyDimensions { width: usize, height: usize },
    #[error("mine probability must be a number between 0 and 1 (got {0})")]
    InvalidProbability(f64),
    #[error("cell ({x}, {y}) is outside the board")]
    OutOfBounds { x: usize, y: usize },
}

/// A single tile on the board
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cell {
    pub x: usize,
    pub y: usize,
    pub mine: bool,
    pub opened: bool,
    pub flagged: bool,
    pub adjacent: u8, // Mines among the up-to-8 neighbours
}

/// Result of opening a cell
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reveal {
    /// Already opened or flagged, nothing changed
    Ignored,
    /// Newly opened cells, in the order they were opened
    Opened(Vec<(usize, usize)>),
    /// The cell held a mine
    Exploded,
}

#[derive(Debug, Clone)]
pub struct Board {
    width: usize,
    height: usize,
    cells: Vec<Cell>,
}

impl Board {
    /// Generate a board where each cell holds a mine with probability `p`
    pub fn generate(width: usize, height: usize, p: f64) -> Result<Board, BoardError> {
        Board::generate_with(width, height, p, &mut rand::thread_rng())
    }

    pub fn generate_with<R: Rng + ?Sized>(
        width: usize,
        height: usize,
        p: f64,
        rng: &mut R,
    ) -> Result<Board, BoardError> {
        check_dimensions(width, height)?;
        if !p.is_finite() || !(0.0..=1.0).contains(&p) {
            return Err(BoardError::InvalidProbability(p));
        }
        let mines: Vec<bool> = (0..width * height).map(|_| rng.gen_bool(p)).collect();
        Ok(Board::build(width, height, &mines))
    }

    /// Build a board with mines at exactly the given positions
    #[cfg(test)]
    pub fn from_mines(
        width: usize,
        height: usize,
        positions: &[(usize, usize)],
    ) -> Result<Board, BoardError> {
        check_dimensions(width, height)?;
        let mut mines = vec![false; width * height];
        for &(x, y) in positions {
            if x >= width || y >= height {
                return Err(BoardError::OutOfBounds { x, y });
            }
            mines[y * width + x] = true;
        }
        Ok(Board::build(width, height, &mines))
    }

    fn build(width: usize, height: usize, mines: &[bool]) -> Board {
        let mut cells = Vec::with_capacity(width * height);
        for y in 0..height {
            for x in 0..width {
                cells.push(Cell {
                    x,
                    y,
                    mine: mines[y * width + x],
                    opened: false,
                    flagged: false,
                    adjacent: 0,
                });
            }
        }
        let mut board = Board { width, height, cells };
        for i in 0..board.cells.len() {
            let (x, y) = (board.cells[i].x, board.cells[i].y);
            let adjacent = board
                .neighbors(x, y)
                .filter(|&(nx, ny)| mines[ny * width + nx])
                .count();
            board.cells[i].adjacent = adjacent as u8;
        }
        board
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Flat index for (x, y), or None when outside the board
    pub fn index(&self, x: usize, y: usize) -> Option<usize> {
        if x < self.width && y < self.height {
            Some(y * self.width + x)
        } else {
            None
        }
    }

    pub fn cell(&self, x: usize, y: usize) -> Option<&Cell> {
        self.index(x, y).map(|i| &self.cells[i])
    }

    #[cfg(test)]
    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    /// Positions of the up-to-8 cells around (x, y), clamped to the board
    pub fn neighbors(&self, x: usize, y: usize) -> impl Iterator<Item = (usize, usize)> {
        let xs = x.saturating_sub(1)..=(x + 1).min(self.width - 1);
        let ys = y.saturating_sub(1)..=(y + 1).min(self.height - 1);
        ys.flat_map(move |ny| xs.clone().map(move |nx| (nx, ny)))
            .filter(move |&(nx, ny)| !(nx == x && ny == y))
    }

    pub fn mine_count(&self) -> usize {
        self.cells.iter().filter(|c| c.mine).count()
    }

    pub fn flag_count(&self) -> usize {
        self.cells.iter().filter(|c| c.flagged).count()
    }

    pub fn opened_count(&self) -> usize {
        self.cells.iter().filter(|c| c.opened).count()
    }

    /// True once every cell without a mine has been opened
    pub fn is_cleared(&self) -> bool {
        self.cells.iter().all(|c| c.mine || c.opened)
    }

    /// Open a cell, cascading through zero-count neighbours
    pub fn open(&mut self, x: usize, y: usize) -> Result<Reveal, BoardError> {
        let idx = self.index(x, y).ok_or(BoardError::OutOfBounds { x, y })?;
        let cell = self.cells[idx];
        if cell.opened || cell.flagged {
            return Ok(Reveal::Ignored);
        }
        if cell.mine {
            return Ok(Reveal::Exploded);
        }

        let mut opened = Vec::new();
        let mut queue = VecDeque::from([(x, y)]);
        self.cells[idx].opened = true;
        while let Some((cx, cy)) = queue.pop_front() {
            opened.push((cx, cy));
            if self.cells[cy * self.width + cx].adjacent != 0 {
                continue;
            }
            let around: Vec<(usize, usize)> = self.neighbors(cx, cy).collect();
            for (nx, ny) in around {
                let n = &mut self.cells[ny * self.width + nx];
                // zero-count cells never border a mine
                if !n.opened && !n.flagged && !n.mine {
                    n.opened = true;
                    queue.push_back((nx, ny));
                }
            }
        }
        Ok(Reveal::Opened(opened))
    }

    /// Toggle the flag on an unopened cell, returns the new flag state
    pub fn toggle_flag(&mut self, x: usize, y: usize) -> Result<bool, BoardError> {
        let idx = self.index(x, y).ok_or(BoardError::OutOfBounds { x, y })?;
        let cell = &mut self.cells[idx];
        if cell.opened {
            return Ok(false);
        }
        cell.flagged = !cell.flagged;
        Ok(cell.flagged)
    }
}

fn check_dimensions(width: usize, height: usize) -> Result<(), BoardError> {
    if width == 0 || height == 0 {
        return Err(BoardError::EmptyDimensions { width, height });
    }
    Ok(())
}
