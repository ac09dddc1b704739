/// Per-cell count of currently infectious agents on an L×L toroidal grid.
///
/// The engine maintains these counts incrementally as agents move and change
/// compartment; rebuilding the grid from the population every day would
/// dominate the runtime at realistic scales.
pub struct InfGrid {
    side: u16,
    count_vec: Vec<u32>,
}

impl InfGrid {
    pub fn new(side: u16) -> Self {
        Self {
            side,
            count_vec: vec![0; usize::from(side) * usize::from(side)],
        }
    }

    fn cell_idx(&self, x: u16, y: u16) -> usize {
        usize::from(x) * usize::from(self.side) + usize::from(y)
    }

    pub fn cell(&self, x: u16, y: u16) -> u32 {
        self.count_vec[self.cell_idx(x, y)]
    }

    pub fn incr(&mut self, x: u16, y: u16) {
        let idx = self.cell_idx(x, y);
        self.count_vec[idx] += 1;
    }

    /// Invariant: only called for a cell an infectious agent occupies, so the
    /// count is nonzero.
    pub fn decr(&mut self, x: u16, y: u16) {
        let idx = self.cell_idx(x, y);
        debug_assert!(self.count_vec[idx] > 0);
        self.count_vec[idx] -= 1;
    }

    /// Infection pressure at (x, y): the number of infectious agents in the
    /// Moore neighborhood plus the cell itself (9 cells), with toroidal
    /// wraparound on both axes.
    pub fn pressure(&self, x: u16, y: u16) -> u32 {
        let side = i32::from(self.side);
        let mut total = 0;
        for dx in -1..=1 {
            for dy in -1..=1 {
                let xx = (i32::from(x) + dx).rem_euclid(side) as u16;
                let yy = (i32::from(y) + dy).rem_euclid(side) as u16;
                total += self.cell(xx, yy);
            }
        }
        total
    }

    pub fn total(&self) -> u32 {
        self.count_vec.iter().sum()
    }
}
