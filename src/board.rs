//! Board: fixed occupancy grid with per-cell colour, collision and line clear.

use crate::pieces::{PieceDef, Rgb};
use std::collections::VecDeque;

/// Grid height in rows; row 0 is the top.
pub const ROWS: usize = 20;
/// Grid width in columns.
pub const COLS: usize = 10;

/// Rows counted by `tension_level`.
const TENSION_ROWS: usize = 5;

/// One grid cell. Colour is meaningful only when the cell is filled; empty
/// cells read back as a neutral grey.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cell {
    Empty,
    Filled(Rgb),
}

impl Cell {
    pub fn is_filled(&self) -> bool {
        matches!(self, Self::Filled(_))
    }

    pub fn color(&self) -> Rgb {
        match self {
            Self::Filled(c) => *c,
            Self::Empty => Rgb::new(0x20, 0x20, 0x20),
        }
    }
}

/// Mutable active piece: catalogue index, rotation state, grid position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActivePiece {
    pub index: usize,
    pub rot: u8,
    pub x: i32,
    pub y: i32,
}

impl ActivePiece {
    /// Spawn at the fixed upper-centre location, rotation 0.
    pub fn spawn(index: usize) -> Self {
        Self {
            index,
            rot: 0,
            x: COLS as i32 / 2 - 2,
            y: 0,
        }
    }
}

/// The playfield. Rows are stored top-down in a `VecDeque` so a line clear is
/// a removal plus an empty row pushed on top.
#[derive(Debug, Clone)]
pub struct Board {
    rows: VecDeque<[Cell; COLS]>,
}

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}

impl Board {
    pub fn new() -> Self {
        Self {
            rows: (0..ROWS).map(|_| [Cell::Empty; COLS]).collect(),
        }
    }

    pub fn clear(&mut self) {
        for row in &mut self.rows {
            row.fill(Cell::Empty);
        }
    }

    pub fn cell(&self, x: usize, y: usize) -> Cell {
        self.rows[y][x]
    }

    /// True iff every block of `piece`, rotated by `drot` and translated by
    /// (dx, dy), lands above the grid (y < 0 is treated as empty, so spawns
    /// and upward kicks stay legal) or on an empty in-bounds cell.
    pub fn can_place(&self, def: &PieceDef, piece: &ActivePiece, dx: i32, dy: i32, drot: i8) -> bool {
        let rot = (i16::from(piece.rot) + 4 + i16::from(drot)).rem_euclid(4) as u8;
        for &(cx, cy) in def.cells(rot) {
            let x = piece.x + dx + cx;
            let y = piece.y + dy + cy;
            if x < 0 || x >= COLS as i32 || y >= ROWS as i32 {
                return false;
            }
            if y < 0 {
                continue;
            }
            if self.rows[y as usize][x as usize].is_filled() {
                return false;
            }
        }
        true
    }

    /// Copies the piece colour into every in-bounds cell it covers.
    pub fn place(&mut self, def: &PieceDef, piece: &ActivePiece) {
        for &(cx, cy) in def.cells(piece.rot) {
            let x = piece.x + cx;
            let y = piece.y + cy;
            if (0..COLS as i32).contains(&x) && (0..ROWS as i32).contains(&y) {
                self.rows[y as usize][x as usize] = Cell::Filled(def.color);
            }
        }
    }

    /// Indices of fully occupied rows, top-down.
    pub fn full_rows(&self) -> Vec<usize> {
        (0..ROWS)
            .filter(|&y| self.rows[y].iter().all(Cell::is_filled))
            .collect()
    }

    /// Removes every fully occupied row, inserting empty rows at the top.
    /// Returns the number of rows removed.
    pub fn clear_lines(&mut self) -> u32 {
        let mut cleared = 0u32;
        let mut y = ROWS;
        while y > 0 {
            y -= 1;
            if self.rows[y].iter().all(Cell::is_filled) {
                let _ = self.rows.remove(y);
                self.rows.push_front([Cell::Empty; COLS]);
                cleared += 1;
                // The removed row's replacement slid down into index y.
                y += 1;
            }
        }
        cleared
    }

    /// True iff the piece already collides at its spawn position.
    pub fn is_game_over(&self, def: &PieceDef, piece: &ActivePiece) -> bool {
        !self.can_place(def, piece, 0, 0, 0)
    }

    #[cfg(test)]
    pub fn fill_cell(&mut self, x: usize, y: usize, color: Rgb) {
        self.rows[y][x] = Cell::Filled(color);
    }

    /// Count of non-empty rows within the bottom five; ambient-audio hook.
    pub fn tension_level(&self) -> u32 {
        self.rows
            .iter()
            .skip(ROWS - TENSION_ROWS)
            .filter(|row| row.iter().any(Cell::is_filled))
            .count() as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pieces::Catalogue;

    fn fill_row(board: &mut Board, y: usize, except: &[usize]) {
        for x in 0..COLS {
            if !except.contains(&x) {
                board.rows[y][x] = Cell::Filled(Rgb::new(1, 2, 3));
            }
        }
    }

    #[test]
    fn test_can_place_above_grid() {
        let cat = Catalogue::fallback();
        let board = Board::new();
        let mut piece = ActivePiece::spawn(0);
        piece.y = -3;
        assert!(board.can_place(cat.get(0), &piece, 0, 0, 0));
    }

    #[test]
    fn test_can_place_rejects_walls_and_floor() {
        let cat = Catalogue::fallback();
        let board = Board::new();
        // I piece horizontal spans x..x+3.
        let piece = ActivePiece { index: 0, rot: 0, x: 0, y: 0 };
        assert!(board.can_place(cat.get(0), &piece, 0, 0, 0));
        assert!(!board.can_place(cat.get(0), &piece, -1, 0, 0));
        assert!(!board.can_place(cat.get(0), &piece, COLS as i32 - 3, 0, 0));
        assert!(!board.can_place(cat.get(0), &piece, 0, ROWS as i32, 0));
    }

    #[test]
    fn test_can_place_negative_drot_wraps() {
        let cat = Catalogue::fallback();
        let board = Board::new();
        let piece = ActivePiece { index: 2, rot: 0, x: 3, y: 5 };
        assert!(board.can_place(cat.get(2), &piece, 0, 0, -1));
        assert!(board.can_place(cat.get(2), &piece, 0, 0, -5));
    }

    #[test]
    fn test_place_copies_piece_colour() {
        let cat = Catalogue::fallback();
        let mut board = Board::new();
        let piece = ActivePiece { index: 4, rot: 0, x: 3, y: 5 };
        board.place(cat.get(4), &piece);
        for &(cx, cy) in cat.get(4).cells(0) {
            let cell = board.cell((3 + cx) as usize, (5 + cy) as usize);
            assert_eq!(cell, Cell::Filled(cat.get(4).color));
        }
    }

    #[test]
    fn test_clear_single_line() {
        let mut board = Board::new();
        fill_row(&mut board, ROWS - 1, &[]);
        board.rows[ROWS - 2][4] = Cell::Filled(Rgb::new(9, 9, 9));
        assert_eq!(board.clear_lines(), 1);
        // The survivor above the cleared row dropped by one.
        assert!(board.cell(4, ROWS - 1).is_filled());
        assert!(!board.cell(4, ROWS - 2).is_filled());
        assert!(board.rows[0].iter().all(|c| !c.is_filled()));
    }

    #[test]
    fn test_clear_four_lines_with_gap() {
        let mut board = Board::new();
        // Full, full, partial, full, full from the bottom.
        fill_row(&mut board, ROWS - 1, &[]);
        fill_row(&mut board, ROWS - 2, &[]);
        fill_row(&mut board, ROWS - 3, &[0]);
        fill_row(&mut board, ROWS - 4, &[]);
        fill_row(&mut board, ROWS - 5, &[]);
        assert_eq!(board.clear_lines(), 4);
        // No fully occupied row remains; the partial row sank to the bottom.
        for y in 0..ROWS {
            assert!(!board.rows[y].iter().all(Cell::is_filled));
        }
        assert!(board.cell(1, ROWS - 1).is_filled());
        assert!(!board.cell(0, ROWS - 1).is_filled());
    }

    #[test]
    fn test_game_over_on_blocked_spawn() {
        let cat = Catalogue::fallback();
        let mut board = Board::new();
        let piece = ActivePiece::spawn(2);
        assert!(!board.is_game_over(cat.get(2), &piece));
        fill_row(&mut board, 1, &[]);
        assert!(board.is_game_over(cat.get(2), &piece));
    }

    #[test]
    fn test_tension_level_counts_bottom_rows() {
        let mut board = Board::new();
        assert_eq!(board.tension_level(), 0);
        board.rows[ROWS - 1][0] = Cell::Filled(Rgb::new(1, 1, 1));
        board.rows[ROWS - 3][9] = Cell::Filled(Rgb::new(1, 1, 1));
        // A filled row above the bottom five does not count.
        board.rows[ROWS - 7][5] = Cell::Filled(Rgb::new(1, 1, 1));
        assert_eq!(board.tension_level(), 2);
    }
}
