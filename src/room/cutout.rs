//! # Solid Tile Cutouts
//!
//! Decides which solid tiles are left out of the rendered tilemap.
//!
//! - `CutoutMode::All` hides every solid tile.
//! - `CutoutMode::Boundary` floods inwards from the room edges through solid
//!   rock. With `refine` on, a solid tile that has open space on both sides
//!   within `SEARCH_DIST` along a row or column is held back so thin walls
//!   between two open areas stay visible.

use std::collections::VecDeque;

use super::tile::TileGrid;

/// Openings further than this on *both* sides do not protect a wall
pub const SEARCH_DIST: usize = 20;
/// Openings are not searched for beyond this distance
pub const SEARCH_MAX_DIST: usize = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CutoutMode {
    All,
    Boundary { refine: bool },
}

/// `true` where a solid tile is hidden. Same layout as the tile grid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CutoutMask {
    width: usize,
    height: usize,
    cells: Vec<bool>,
}

impl CutoutMask {
    pub fn new(width: usize, height: usize) -> Self {
        CutoutMask {
            width,
            height,
            cells: vec![false; width * height],
        }
    }

    #[inline]
    pub fn is_cut(&self, x: usize, y: usize) -> bool {
        x < self.width && y < self.height && self.cells[x * self.height + y]
    }

    #[inline]
    fn set(&mut self, x: usize, y: usize, value: bool) {
        self.cells[x * self.height + y] = value;
    }

    pub fn count(&self) -> usize {
        self.cells.iter().filter(|&&c| c).count()
    }
}

pub fn compute_cutouts(grid: &TileGrid, mode: CutoutMode) -> CutoutMask {
    match mode {
        CutoutMode::All => cut_all_solid(grid),
        CutoutMode::Boundary { refine } => BoundaryFlood::new(grid, refine).run(),
    }
}

fn cut_all_solid(grid: &TileGrid) -> CutoutMask {
    let mut mask = CutoutMask::new(grid.width(), grid.height());
    for (p, tile) in grid.iter_rows() {
        if tile.is_solid() {
            mask.set(p.x as usize, p.y as usize, true);
        }
    }
    mask
}

struct BoundaryFlood<'a> {
    grid: &'a TileGrid,
    refine: bool,
    cut: CutoutMask,
    /// Tiles held back by the visibility check until their row or column changes
    protected: CutoutMask,
    queue: VecDeque<(usize, usize)>,
}

impl<'a> BoundaryFlood<'a> {
    fn new(grid: &'a TileGrid, refine: bool) -> Self {
        let (w, h) = (grid.width(), grid.height());
        BoundaryFlood {
            grid,
            refine,
            cut: CutoutMask::new(w, h),
            protected: CutoutMask::new(w, h),
            queue: VecDeque::new(),
        }
    }

    /// Seeds the room edge: top row, left column, right column, bottom row.
    fn seed_edges(&mut self) {
        let (w, h) = (self.grid.width(), self.grid.height());
        if w == 0 || h == 0 {
            return;
        }
        for x in 0..w - 1 {
            self.queue.push_back((x, 0));
        }
        for y in 1..h {
            self.queue.push_back((0, y));
        }
        for y in 0..h - 1 {
            self.queue.push_back((w - 1, y));
        }
        for x in 1..w {
            self.queue.push_back((x, h - 1));
        }
    }

    fn run(mut self) -> CutoutMask {
        self.seed_edges();

        while let Some((x, y)) = self.queue.pop_front() {
            if self.cut.is_cut(x, y) || self.protected.is_cut(x, y) {
                continue;
            }

            if !self.is_solid(x, y) {
                // Enclosed air (4 solid neighbours) is left alone
                if self.grid.solid_neighbours(x, y) == 3 {
                    self.cut_pocket_walls(x, y);
                }
                continue;
            }

            if self.try_cut(x, y) {
                self.enqueue_neighbours(x, y);
            }
        }

        self.cut
    }

    fn is_solid(&self, x: usize, y: usize) -> bool {
        self.grid.get(x, y).map_or(false, |t| t.is_solid())
    }

    fn neighbours(&self, x: usize, y: usize) -> impl Iterator<Item = (usize, usize)> {
        let (w, h) = (self.grid.width(), self.grid.height());
        [
            (x.checked_sub(1), Some(y)),
            (Some(x + 1).filter(|&nx| nx < w), Some(y)),
            (Some(x), y.checked_sub(1)),
            (Some(x), Some(y + 1).filter(|&ny| ny < h)),
        ]
        .into_iter()
        .filter_map(|(nx, ny)| Some((nx?, ny?)))
    }

    fn enqueue_neighbours(&mut self, x: usize, y: usize) {
        let neighbours: Vec<_> = self.neighbours(x, y).collect();
        self.queue.extend(neighbours);
    }

    /// Next to a dead-end opening, solid neighbours that are themselves
    /// walled in on three sides are cut without the visibility check.
    fn cut_pocket_walls(&mut self, x: usize, y: usize) {
        let walls: Vec<_> = self
            .neighbours(x, y)
            .filter(|&(nx, ny)| {
                self.is_solid(nx, ny)
                    && !self.cut.is_cut(nx, ny)
                    && self.grid.solid_neighbours(nx, ny) == 3
            })
            .collect();

        for (nx, ny) in walls {
            self.mark_cut(nx, ny);
            self.enqueue_neighbours(nx, ny);
        }
    }

    fn mark_cut(&mut self, x: usize, y: usize) {
        self.cut.set(x, y, true);
        self.clear_protection(x, y);
    }

    /// A cut changes what is visible along its row and column, so tiles held
    /// back there get another chance.
    fn clear_protection(&mut self, x: usize, y: usize) {
        for i in 0..self.grid.width() {
            self.protected.set(i, y, false);
        }
        for j in 0..self.grid.height() {
            self.protected.set(x, j, false);
        }
    }

    fn try_cut(&mut self, x: usize, y: usize) -> bool {
        if self.refine && (self.row_is_see_through(x, y) || self.column_is_see_through(x, y)) {
            self.protected.set(x, y, true);
            return false;
        }
        self.mark_cut(x, y);
        true
    }

    fn row_is_see_through(&self, x: usize, y: usize) -> bool {
        let lo = x.saturating_sub(SEARCH_MAX_DIST);
        let hi = (x + SEARCH_MAX_DIST).min(self.grid.width());
        self.has_openings_both_sides(x, (lo..x).rev(), x + 1..hi, |i| (i, y))
    }

    fn column_is_see_through(&self, x: usize, y: usize) -> bool {
        let lo = y.saturating_sub(SEARCH_MAX_DIST);
        let hi = (y + SEARCH_MAX_DIST).min(self.grid.height());
        self.has_openings_both_sides(y, (lo..y).rev(), y + 1..hi, |j| (x, j))
    }

    /// Walks outwards from `centre` on the low side to the nearest open tile,
    /// then on the high side. A cut tile stops the walk on that side.
    /// Openings beyond `SEARCH_DIST` on both sides do not count.
    fn has_openings_both_sides(
        &self,
        centre: usize,
        low: impl Iterator<Item = usize>,
        high: impl Iterator<Item = usize>,
        cell: impl Fn(usize) -> (usize, usize),
    ) -> bool {
        let Some(low_far) = self.nearest_opening(low, &cell).map(|i| i + SEARCH_DIST < centre)
        else {
            return false;
        };

        match self.nearest_opening(high, &cell) {
            Some(i) => !(low_far && i > centre + SEARCH_DIST),
            None => false,
        }
    }

    fn nearest_opening(
        &self,
        mut range: impl Iterator<Item = usize>,
        cell: &impl Fn(usize) -> (usize, usize),
    ) -> Option<usize> {
        range
            .find_map(|i| {
                let (cx, cy) = cell(i);
                if self.cut.is_cut(cx, cy) {
                    Some(None)
                } else if self.is_solid(cx, cy) {
                    None
                } else {
                    Some(Some(i))
                }
            })
            .flatten()
    }
}
