//! # Tilemap Rasterisation
//!
//! One RGBA texel per tile. Terrain picks a gray level which is blended from
//! black to the subregion background, water blends towards the water (or acid)
//! colour, deathpit rooms fade to black over the bottom rows, and shortcut
//! entrances can be overdrawn red.
//!
//! `TilemapCache` holds the last image with a dirty flag. Nothing is redrawn
//! until the owner asks for the image after marking it dirty.

use image::{Rgba, RgbaImage};
use serde::{Deserialize, Serialize};

use super::cutout::CutoutMask;
use super::parser::{find_effect, Effect};
use super::shortcuts::Shortcut;
use super::tile::{ShortcutType, TerrainType, Tile, TileAttributes, TileGrid};
use crate::palette::SubregionColours;

pub const TRANSPARENT: Rgba<u8> = Rgba([0, 0, 0, 0]);
pub const BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);
pub const MARKER_RED: Rgba<u8> = Rgba([255, 0, 0, 255]);

/// Rows above the floor covered by the deathpit fade
const DEATHPIT_ROWS: i32 = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderOptions {
    /// Weight of the terrain colour under water, 0 is solid water colour
    pub water_transparency: f32,
    /// Tint open tiles that have a wall behind them
    pub draw_tile_walls: bool,
    /// Draw shortcut entrances with the plain background colour
    pub region_bg_shortcuts: bool,
    pub mark_shortcuts: bool,
    pub mark_exits_only: bool,
    /// Ignore the cutout mask and draw every tile
    pub disable_room_cropping: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        RenderOptions {
            water_transparency: 0.3,
            draw_tile_walls: false,
            region_bg_shortcuts: false,
            mark_shortcuts: false,
            mark_exits_only: false,
            disable_room_cropping: false,
        }
    }
}

/// Everything the rasteriser reads from a room.
pub struct TilemapInputs<'a> {
    pub grid: &'a TileGrid,
    pub cutouts: Option<&'a CutoutMask>,
    pub shortcuts: &'a [Shortcut],
    pub effects: &'a [Effect],
    pub water_level: i32,
    pub deathpit: bool,
    /// Water colour already swapped for the acid colour where applicable
    pub colours: SubregionColours,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaterLine {
    pub level: i32,
    /// Water hangs from the ceiling down to `level`
    pub inverted: bool,
}

impl WaterLine {
    pub fn submerges(&self, row: i32, height: i32) -> bool {
        if self.inverted {
            row <= self.level
        } else {
            row >= height - self.level
        }
    }
}

/// Rooms without a declared level take the midpoint of their water flux range.
pub fn effective_water_line(water_level: i32, effects: &[Effect], height: usize) -> WaterLine {
    let inverted = find_effect(effects, "InvertedWater").is_some();
    let mut level = water_level;

    if level < 0 {
        let min = find_effect(effects, "WaterFluxMinLevel");
        let max = find_effect(effects, "WaterFluxMaxLevel");
        if let (Some(min), Some(max)) = (min, max) {
            let mid = 1.0 - (max.amount + min.amount) / 2.0 * (22.0 / 20.0);
            level = (mid * height as f32) as i32 + 2;
        }
    }

    WaterLine { level, inverted }
}

pub fn gray_level(tile: &Tile, options: &RenderOptions) -> f32 {
    let solid = tile.is_solid();
    let mut gray = match tile.terrain {
        TerrainType::Solid => 0.0,
        TerrainType::Floor => 0.35,
        TerrainType::Slope => 0.4,
        _ if options.draw_tile_walls && tile.attributes.contains(TileAttributes::WALL_BEHIND) => {
            0.75
        }
        _ => 1.0,
    };

    if options.region_bg_shortcuts && tile.terrain == TerrainType::ShortcutEntrance {
        gray = 1.0;
    } else if tile.has_beam() && !solid {
        gray = 0.35;
    }

    gray
}

/// Per-channel linear blend, `t` clamped to `[0, 1]`, truncating like the
/// game's own colour maths.
pub fn lerp_colour(a: Rgba<u8>, b: Rgba<u8>, t: f32) -> Rgba<u8> {
    let t = t.clamp(0.0, 1.0);
    let mix = |x: u8, y: u8| -> u8 {
        let v = x as f32 + (y as f32 - x as f32) * t;
        (v as i32).clamp(0, 255) as u8
    };
    Rgba([
        mix(a[0], b[0]),
        mix(a[1], b[1]),
        mix(a[2], b[2]),
        mix(a[3], b[3]),
    ])
}

/// Fills `scratch` row-major (`x + y * width`) and copies it into `out`,
/// which must already have the grid's dimensions.
pub fn rasterise(
    inputs: &TilemapInputs,
    options: &RenderOptions,
    scratch: &mut Vec<Rgba<u8>>,
    out: &mut RgbaImage,
) {
    let grid = inputs.grid;
    let (width, height) = (grid.width(), grid.height());
    let h = height as i32;

    scratch.clear();
    scratch.resize(width * height, TRANSPARENT);

    let water = effective_water_line(inputs.water_level, inputs.effects, height);
    let background = inputs.colours.background.to_rgba();
    let water_colour = inputs.colours.water.to_rgba();
    let cutouts = inputs.cutouts.filter(|_| !options.disable_room_cropping);

    for y in 0..height {
        for x in 0..width {
            if cutouts.map_or(false, |mask| mask.is_cut(x, y)) {
                continue;
            }

            let tile = grid.get_clamped(x as i32, y as i32);
            let mut colour = lerp_colour(BLACK, background, gray_level(&tile, options));

            let row = y as i32;
            if !tile.is_solid() && water.submerges(row, h) {
                colour = lerp_colour(water_colour, colour, options.water_transparency);
            }

            if inputs.deathpit
                && row >= h - DEATHPIT_ROWS
                && grid.get_clamped(x as i32, h - 1).terrain == TerrainType::Air
            {
                let fade = (h as f32 - row as f32 - 0.5) / DEATHPIT_ROWS as f32;
                colour = lerp_colour(BLACK, colour, fade);
            }

            scratch[x + y * width] = colour;
        }
    }

    if options.mark_shortcuts {
        for shortcut in inputs.shortcuts {
            if shortcut.kind == ShortcutType::None
                || (options.mark_exits_only && shortcut.kind != ShortcutType::RoomExit)
            {
                continue;
            }
            let p = shortcut.entrance;
            if grid.contains(p) {
                scratch[p.x as usize + p.y as usize * width] = MARKER_RED;
            }
        }
    }

    for (i, colour) in scratch.iter().enumerate() {
        out.put_pixel((i % width) as u32, (i / width) as u32, *colour);
    }
}

/// Lazily rebuilt tilemap. The scratch buffer is kept between rebuilds.
#[derive(Debug, Default)]
pub struct TilemapCache {
    image: Option<RgbaImage>,
    dirty: bool,
    scratch: Vec<Rgba<u8>>,
    /// Number of rebuilds so far
    pub(super) generation: u64,
}

impl TilemapCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn needs_update(&self) -> bool {
        self.dirty || self.image.is_none()
    }

    /// Redraws unconditionally and clears the dirty flag.
    pub fn update(&mut self, inputs: &TilemapInputs, options: &RenderOptions) {
        let dims = (inputs.grid.width() as u32, inputs.grid.height() as u32);
        let mut image = match self.image.take() {
            Some(img) if img.dimensions() == dims => img,
            _ => RgbaImage::new(dims.0, dims.1),
        };

        rasterise(inputs, options, &mut self.scratch, &mut image);

        self.image = Some(image);
        self.dirty = false;
        self.generation += 1;
    }

    pub fn get_or_update(&mut self, inputs: &TilemapInputs, options: &RenderOptions) -> &RgbaImage {
        if self.needs_update() {
            self.update(inputs, options);
        }
        self.image.get_or_insert_with(|| RgbaImage::new(0, 0))
    }
}
