use crate::constants::{MAX_OCCUPANTS, MAZE_MAX_SIZE, MAZE_MIN_SIZE};
use crate::error::MazeError;
use crate::types::Cell;

/// The shared grid one game is played on. Rectangular, exactly one exit,
/// never resized after construction; the only mutation is flipping a door
/// into a wall or back.
#[derive(Clone, Debug)]
pub struct Maze {
    name: String,
    grid: Vec<Vec<Cell>>,
    max_occupancy: usize,
}

impl Maze {
    /// Build a maze from its textual definition. Checks run in a fixed order
    /// and the first failure wins: alphabet, exit count, rectangularity,
    /// minimum size, maximum size. Spawn markers (`X`) are kept out of the
    /// grid: starting squares are drawn at random at join time, so markers
    /// become plain floor.
    pub fn parse(name: &str, content: &str) -> Result<Self, MazeError> {
        let content = content.to_ascii_uppercase();
        let mut grid: Vec<Vec<Cell>> = Vec::new();
        let mut exit_count = 0;
        for line in content.split('\n') {
            let mut row = Vec::with_capacity(line.len());
            for value in line.chars() {
                let cell = match value {
                    'X' => Cell::Floor,
                    _ => Cell::from_char(value).ok_or(MazeError::InvalidCharacter)?,
                };
                if cell == Cell::Exit {
                    exit_count += 1;
                }
                row.push(cell);
            }
            grid.push(row);
        }

        if exit_count != 1 {
            return Err(MazeError::ExitCount);
        }
        let width = grid[0].len();
        if grid.iter().any(|row| row.len() != width) {
            return Err(MazeError::NotRectangular);
        }
        let height = grid.len();
        if width < MAZE_MIN_SIZE || height < MAZE_MIN_SIZE {
            return Err(MazeError::TooSmall);
        }
        if width > MAZE_MAX_SIZE || height > MAZE_MAX_SIZE {
            return Err(MazeError::TooLarge);
        }

        let spawn_count = grid
            .iter()
            .flatten()
            .filter(|cell| **cell == Cell::Floor)
            .count();
        Ok(Self {
            name: name.to_string(),
            grid,
            max_occupancy: spawn_count.min(MAX_OCCUPANTS),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn width(&self) -> usize {
        self.grid[0].len()
    }

    pub fn height(&self) -> usize {
        self.grid.len()
    }

    /// How many occupants this maze can hold: one per spawnable square,
    /// capped by the single-digit identifier space.
    pub fn max_occupancy(&self) -> usize {
        self.max_occupancy
    }

    pub fn in_bounds(&self, row: isize, col: isize) -> bool {
        row >= 0 && col >= 0 && (row as usize) < self.height() && (col as usize) < self.width()
    }

    pub fn cell(&self, row: usize, col: usize) -> Cell {
        self.grid[row][col]
    }

    pub fn set_cell(&mut self, row: usize, col: usize, cell: Cell) {
        self.grid[row][col] = cell;
    }

    /// Squares eligible for random initial placement, in row-major order.
    pub fn spawn_cells(&self) -> Vec<(usize, usize)> {
        let mut cells = Vec::new();
        for (row, cells_in_row) in self.grid.iter().enumerate() {
            for (col, cell) in cells_in_row.iter().enumerate() {
                if *cell == Cell::Floor {
                    cells.push((row, col));
                }
            }
        }
        cells
    }

    /// Draw the grid with each marker's square overwritten by its one-digit
    /// identifier.
    pub fn render(&self, markers: &[(usize, usize, u8)]) -> String {
        let mut rows: Vec<Vec<char>> = self
            .grid
            .iter()
            .map(|row| row.iter().map(|cell| cell.to_char()).collect())
            .collect();
        for &(row, col, id) in markers {
            rows[row][col] = (b'0' + id) as char;
        }

        let mut out = String::from("\n");
        for row in rows {
            out.extend(row);
            out.push('\n');
        }
        out
    }
}
