use glam::IVec2;

use crate::ui::color::{Color, TRANSPARENT, WHITE};

/// Character-cell renderer the simulation draws into each frame.
pub trait Renderer {
    fn set_cell(&mut self, position: IVec2, foreground: Color, background: Color);
    fn set_glyph(&mut self, position: IVec2, glyph: char, foreground: Color, background: Color);
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Cell {
    pub glyph: char,
    pub foreground: Color,
    pub background: Color,
}

impl Default for Cell {
    fn default() -> Self {
        Self { glyph: ' ', foreground: WHITE, background: TRANSPARENT }
    }
}

/// Software cell buffer. Writes outside the grid are dropped, since notes
/// spend most of their life scrolled off screen.
#[derive(Clone, Debug)]
pub struct CellGrid {
    width: i32,
    height: i32,
    cells: Vec<Cell>,
}

impl CellGrid {
    pub fn new(width: u16, height: u16) -> Self {
        let (width, height) = (i32::from(width), i32::from(height));
        Self { width, height, cells: vec![Cell::default(); (width * height) as usize] }
    }

    #[inline(always)]
    fn index(&self, position: IVec2) -> Option<usize> {
        if position.x < 0 || position.y < 0 || position.x >= self.width || position.y >= self.height {
            return None;
        }
        Some((position.y * self.width + position.x) as usize)
    }

    pub fn clear(&mut self) {
        self.cells.fill(Cell::default());
    }

    pub fn cell(&self, position: IVec2) -> Option<&Cell> {
        self.index(position).map(|i| &self.cells[i])
    }

    /// One string per row, glyphs only.
    pub fn rows(&self) -> impl Iterator<Item = String> + '_ {
        self.cells
            .chunks(self.width.max(1) as usize)
            .map(|row| row.iter().map(|c| c.glyph).collect())
    }
}

impl Renderer for CellGrid {
    fn set_cell(&mut self, position: IVec2, foreground: Color, background: Color) {
        if let Some(i) = self.index(position) {
            let cell = &mut self.cells[i];
            cell.foreground = foreground;
            cell.background = background;
        }
    }

    fn set_glyph(&mut self, position: IVec2, glyph: char, foreground: Color, background: Color) {
        if let Some(i) = self.index(position) {
            self.cells[i] = Cell { glyph, foreground, background };
        }
    }
}
