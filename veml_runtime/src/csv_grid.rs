//! Text codec for terrain height grids and layer masks.
//!
//! A grid is `;`-separated rows of `,`-separated cells; layer masks are
//! several grids joined by `|`.

use std::num::ParseFloatError;

use thiserror::Error;

pub const ROW_SEPARATOR: char = ';';
pub const CELL_SEPARATOR: char = ',';
pub const GRID_SEPARATOR: char = '|';

#[derive(Debug, Error)]
pub enum GridError {
    #[error("invalid cell '{value}' at row {row}, column {column}: {source}")]
    InvalidCell {
        row: usize,
        column: usize,
        value: String,
        source: ParseFloatError,
    },
}

/// Row-major grid of samples.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Grid {
    width: usize,
    height: usize,
    values: Vec<f32>,
}

impl Grid {
    pub fn new(width: usize, height: usize, values: Vec<f32>) -> Self {
        debug_assert_eq!(values.len(), width * height);
        Self {
            width,
            height,
            values,
        }
    }

    /// Builds a grid as wide as the longest row; shorter rows are zero padded.
    pub fn from_rows(rows: Vec<Vec<f32>>) -> Self {
        let width = rows.iter().map(Vec::len).max().unwrap_or(0);
        let height = rows.len();
        let mut values = Vec::with_capacity(width * height);
        for mut row in rows {
            row.resize(width, 0.0);
            values.extend(row);
        }
        Self::new(width, height, values)
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    pub fn sample(&self, x: usize, y: usize) -> f32 {
        debug_assert!(x < self.width && y < self.height);
        self.values[y * self.width + x]
    }

    pub fn rows(&self) -> impl Iterator<Item = &[f32]> {
        // chunks() panics on zero; a zero-width grid has no cells to yield.
        self.values.chunks(self.width.max(1))
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

pub fn decode_grid(text: &str) -> Result<Grid, GridError> {
    let mut rows: Vec<&str> = text.split(ROW_SEPARATOR).collect();
    if rows.last().is_some_and(|row| row.trim().is_empty()) {
        rows.pop();
    }

    let parsed = rows
        .into_iter()
        .enumerate()
        .map(|(row, line)| parse_row(row, line))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Grid::from_rows(parsed))
}

fn parse_row(row: usize, line: &str) -> Result<Vec<f32>, GridError> {
    if line.trim().is_empty() {
        return Ok(Vec::new());
    }
    line.split(CELL_SEPARATOR)
        .enumerate()
        .map(|(column, cell)| {
            let cell = cell.trim();
            cell.parse::<f32>().map_err(|source| GridError::InvalidCell {
                row,
                column,
                value: cell.to_string(),
                source,
            })
        })
        .collect()
}

pub fn encode_grid(grid: &Grid) -> String {
    if grid.width == 0 {
        return String::new();
    }
    let mut out = String::new();
    for (index, row) in grid.rows().enumerate() {
        if index > 0 {
            out.push(ROW_SEPARATOR);
        }
        for (column, value) in row.iter().enumerate() {
            if column > 0 {
                out.push(CELL_SEPARATOR);
            }
            out.push_str(&value.to_string());
        }
    }
    out
}

pub fn decode_layer_masks(text: &str) -> Result<Vec<Grid>, GridError> {
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }
    text.split(GRID_SEPARATOR).map(decode_grid).collect()
}

pub fn encode_layer_masks(grids: &[Grid]) -> String {
    grids
        .iter()
        .map(encode_grid)
        .collect::<Vec<_>>()
        .join(&GRID_SEPARATOR.to_string())
}
