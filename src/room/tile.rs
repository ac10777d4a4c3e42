//! # Room Tiles
//!
//! One `Tile` per grid cell. The grid is stored as a flat column-major arena
//! (`x * height + y`), which is also the order tile tokens appear in the
//! level text.

use bitflags::bitflags;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Point { x, y }
    }

    pub fn offset(self, (dx, dy): (i32, i32)) -> Self {
        Point::new(self.x + dx, self.y + dy)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum TerrainType {
    #[default]
    Air,
    Solid,
    Slope,
    Floor,
    ShortcutEntrance,
}

impl TerrainType {
    /// Unknown codes read as `Air`, they render and trace the same way.
    pub fn from_code(code: i32) -> Self {
        match code {
            1 => TerrainType::Solid,
            2 => TerrainType::Slope,
            3 => TerrainType::Floor,
            4 => TerrainType::ShortcutEntrance,
            _ => TerrainType::Air,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum ShortcutType {
    #[default]
    None,
    Normal,
    RoomExit,
    CreatureHole,
    NPCTransportation,
    RegionTransportation,
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct TileAttributes: u8 {
        const VERTICAL_BEAM   = 0b0000_0001;
        const HORIZONTAL_BEAM = 0b0000_0010;
        const WALL_BEHIND     = 0b0000_0100;
        const HIVE            = 0b0000_1000;
        const WATERFALL       = 0b0001_0000;
        const GARBAGE_HOLE    = 0b0010_0000;
        const WORM_GRASS      = 0b0100_0000;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Tile {
    pub terrain: TerrainType,
    pub shortcut: ShortcutType,
    pub attributes: TileAttributes,
}

impl Tile {
    pub fn is_solid(&self) -> bool {
        self.terrain == TerrainType::Solid
    }

    pub fn has_beam(&self) -> bool {
        self.attributes
            .intersects(TileAttributes::VERTICAL_BEAM | TileAttributes::HORIZONTAL_BEAM)
    }

    /// Applies one attribute/shortcut sub-token. Returns false for codes
    /// outside the table so callers can log them if they care.
    pub fn apply_code(&mut self, code: &str) -> bool {
        match code {
            "1" => self.attributes |= TileAttributes::VERTICAL_BEAM,
            "2" => self.attributes |= TileAttributes::HORIZONTAL_BEAM,
            "3" => {
                // A tunnel marker never downgrades an exit/hole/transport code
                if self.shortcut == ShortcutType::None {
                    self.shortcut = ShortcutType::Normal;
                }
            }
            "4" => self.shortcut = ShortcutType::RoomExit,
            "5" => self.shortcut = ShortcutType::CreatureHole,
            "6" => self.attributes |= TileAttributes::WALL_BEHIND,
            "7" => self.attributes |= TileAttributes::HIVE,
            "8" => self.attributes |= TileAttributes::WATERFALL,
            "9" => self.shortcut = ShortcutType::NPCTransportation,
            "10" => self.attributes |= TileAttributes::GARBAGE_HOLE,
            "11" => self.attributes |= TileAttributes::WORM_GRASS,
            "12" => self.shortcut = ShortcutType::RegionTransportation,
            _ => return false,
        }
        true
    }
}

/// Fixed-size tile arena, column-major.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TileGrid {
    width: usize,
    height: usize,
    tiles: Vec<Tile>,
}

impl TileGrid {
    /// A grid of `Air` tiles.
    pub fn new(width: usize, height: usize) -> Self {
        TileGrid {
            width,
            height,
            tiles: vec![Tile::default(); width * height],
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    #[inline]
    fn index(&self, x: usize, y: usize) -> usize {
        x * self.height + y
    }

    pub fn in_bounds(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && (x as usize) < self.width && (y as usize) < self.height
    }

    pub fn contains(&self, p: Point) -> bool {
        self.in_bounds(p.x, p.y)
    }

    pub fn get(&self, x: usize, y: usize) -> Option<&Tile> {
        if x < self.width && y < self.height {
            self.tiles.get(self.index(x, y))
        } else {
            None
        }
    }

    pub fn get_mut(&mut self, x: usize, y: usize) -> Option<&mut Tile> {
        if x < self.width && y < self.height {
            let idx = self.index(x, y);
            self.tiles.get_mut(idx)
        } else {
            None
        }
    }

    pub fn set(&mut self, x: usize, y: usize, tile: Tile) {
        if let Some(slot) = self.get_mut(x, y) {
            *slot = tile;
        }
    }

    /// Coordinates are clamped into the grid. An empty grid reads as `Air`.
    pub fn get_clamped(&self, x: i32, y: i32) -> Tile {
        if self.tiles.is_empty() {
            return Tile::default();
        }
        let x = x.clamp(0, self.width as i32 - 1) as usize;
        let y = y.clamp(0, self.height as i32 - 1) as usize;
        self.tiles[self.index(x, y)]
    }

    pub fn at(&self, p: Point) -> Option<&Tile> {
        if self.contains(p) {
            self.get(p.x as usize, p.y as usize)
        } else {
            None
        }
    }

    /// Out-of-bounds cells count as solid.
    pub fn is_solid_or_outside(&self, x: i32, y: i32) -> bool {
        match self.at(Point::new(x, y)) {
            Some(tile) => tile.is_solid(),
            None => true,
        }
    }

    /// Number of solid 4-neighbours, treating the outside of the room as solid.
    pub fn solid_neighbours(&self, x: usize, y: usize) -> u8 {
        let (x, y) = (x as i32, y as i32);
        [(x - 1, y), (x + 1, y), (x, y - 1), (x, y + 1)]
            .iter()
            .filter(|&&(nx, ny)| self.is_solid_or_outside(nx, ny))
            .count() as u8
    }

    /// Tiles in row-major order (`y` outer, `x` inner) with their position.
    pub fn iter_rows(&self) -> impl Iterator<Item = (Point, &Tile)> + '_ {
        (0..self.height).flat_map(move |y| {
            (0..self.width).map(move |x| {
                let tile = &self.tiles[self.index(x, y)];
                (Point::new(x as i32, y as i32), tile)
            })
        })
    }
}
