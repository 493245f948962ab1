use crate::shared::{Section, NUM_STEPS};

// state local to the tui: just where the cursor is
// everything else comes from DisplayState each frame
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TuiState {
    pub section: Section,
    pub row: usize,
    pub col: usize,
}

impl Default for TuiState {
    fn default() -> Self {
        Self { section: Section::Drum, row: 0, col: 0 }
    }
}

impl TuiState {
    pub fn move_by(&mut self, d_row: isize, d_col: isize) {
        let rows = self.section.rows() as isize;
        self.row = (self.row as isize + d_row).rem_euclid(rows) as usize;
        self.col = (self.col as isize + d_col).rem_euclid(NUM_STEPS as isize) as usize;
    }

    // jump to the other grid, keeping the column and clamping the row
    pub fn switch_section(&mut self) {
        self.section = self.section.other();
        self.row = self.row.min(self.section.rows() - 1);
    }
}
