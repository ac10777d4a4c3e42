pub mod cutout;
pub mod overrides;
pub mod parser;
pub mod render;
pub mod shortcuts;
pub mod tile;

use image::RgbaImage;
use serde::Serialize;

use crate::palette::{PaletteSource, Rgb, SubregionColours, DEFAULT_ACID_COLOUR};
use crate::placement::{resolve_placements, PlacedObject, PlacedObjectDecoder, PlacementContext, Vec2};

use cutout::{compute_cutouts, CutoutMask, CutoutMode};
use overrides::{GateData, Property, RoomOverrides};
use parser::{find_effect, parse_level, parse_settings, Effect};
use render::{RenderOptions, TilemapCache, TilemapInputs};
use shortcuts::{trace_room, Shortcut};
use tile::{Point, ShortcutType, TerrainType, TileGrid};

pub const GATE_PREFIX: &str = "GATE_";

/// Something placed on the map: an object from the room settings or a
/// generated label.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind")]
pub enum RoomChild {
    Object(PlacedObject),
    /// `align` is relative to the room, `(0, 0)` top left and `(1, 1)` bottom right
    Marker { name: String, align: Vec2 },
}

/// Sized node with children, in tile units.
pub trait MapNode {
    fn size(&self) -> Vec2;
    fn children(&self) -> &[RoomChild];
    fn add_child(&mut self, child: RoomChild);
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RoomRoles {
    pub gate: bool,
    pub shelter: bool,
}

pub struct Room {
    pub name: String,
    pub region_id: String,
    pub roles: RoomRoles,

    pub grid: TileGrid,
    pub water_in_front: bool,
    pub shortcuts: Vec<Shortcut>,
    /// Entrance-side end of each room exit chain
    pub exits: Vec<Point>,
    pub effects: Vec<Effect>,
    pub treasury: Option<Vec2>,
    pub outpost: Option<Vec2>,

    pub tiles_loaded: bool,
    /// Canonical 12-line level text from the last load
    pub data_string: Option<String>,

    pub gate_data: Option<GateData>,

    water_level: Property<i32>,
    subregion: Property<String>,
    deathpit: Property<bool>,
    better_cutout: Property<bool>,
    cut_all_solid: Property<bool>,
    in_room_shortcuts: Property<bool>,
    acid_water: Property<bool>,
    acid_colour: Property<Rgb>,

    children: Vec<RoomChild>,

    cutouts: Option<CutoutMask>,
    cutouts_dirty: bool,
    tilemap: TilemapCache,
    last_options: Option<RenderOptions>,
    last_colours: Option<SubregionColours>,
}

impl Room {
    pub fn new(name: &str, region_id: &str) -> Self {
        Room {
            name: name.to_string(),
            region_id: region_id.to_string(),
            roles: RoomRoles {
                gate: name.to_ascii_uppercase().starts_with(GATE_PREFIX),
                shelter: false,
            },
            grid: TileGrid::default(),
            water_in_front: false,
            shortcuts: Vec::new(),
            exits: Vec::new(),
            effects: Vec::new(),
            treasury: None,
            outpost: None,
            tiles_loaded: false,
            data_string: None,
            gate_data: None,
            water_level: Property::new(-1),
            subregion: Property::new(String::new()),
            deathpit: Property::new(false),
            better_cutout: Property::new(true),
            cut_all_solid: Property::new(false),
            in_room_shortcuts: Property::new(false),
            acid_water: Property::new(false),
            acid_colour: Property::new(DEFAULT_ACID_COLOUR),
            children: Vec::new(),
            cutouts: None,
            cutouts_dirty: true,
            tilemap: TilemapCache::new(),
            last_options: None,
            last_colours: None,
        }
    }

    /// Runs the whole pipeline over the room text. Never fails; a room without
    /// tile data gets an all-air grid and a message in `errors`.
    pub fn load(
        &mut self,
        data: &str,
        settings: Option<&str>,
        decoder: &dyn PlacedObjectDecoder,
        ctx: &PlacementContext,
        palette: &dyn PaletteSource,
        errors: &mut Vec<String>,
    ) {
        let parsed = parse_level(data);

        self.tiles_loaded = parsed.tiles_found;
        if !parsed.tiles_found {
            let msg = format!("Could not find tile data for room {}", self.name);
            log::warn!("{}", msg);
            errors.push(msg);
        }

        self.grid = parsed.grid;
        self.water_in_front = parsed.header.water_in_front;
        self.water_level.set_original(parsed.header.water_level);
        self.data_string = Some(parsed.data_string);

        let (shortcuts, exits) = trace_room(&self.grid);
        log::debug!(
            "{}: {} shortcuts, {} exits",
            self.name,
            shortcuts.len(),
            exits.len()
        );
        self.shortcuts = shortcuts;
        self.exits = exits;

        self.children.clear();
        self.effects.clear();
        self.treasury = None;
        self.outpost = None;
        if let Some(text) = settings {
            let settings = parse_settings(text);
            let placements = resolve_placements(
                settings.placed_objects.iter().map(String::as_str),
                decoder,
                ctx,
                self.grid.height(),
            );

            self.effects = settings.effects;
            self.treasury = placements.treasury;
            self.outpost = placements.outpost;
            self.children
                .extend(placements.objects.into_iter().map(RoomChild::Object));
        }
        self.add_markers();

        self.refresh_deathpit_default();

        if find_effect(&self.effects, "LethalWater").is_some() {
            if let Some(colour) = palette.acid_colour(&self.region_id) {
                self.acid_water.set_original(true);
                self.acid_colour.set_original(colour);
            }
        }

        self.cutouts_dirty = true;
        self.tilemap.mark_dirty();
    }

    fn add_markers(&mut self) {
        let centre = Vec2::new(0.5, 0.5);
        let size = self.size();
        let align = |pos: Option<Vec2>| match pos {
            Some(p) if size.x > 0.0 && size.y > 0.0 => Vec2::new(p.x / size.x, p.y / size.y),
            _ => centre,
        };

        if self.roles.shelter {
            self.add_child(RoomChild::Marker {
                name: "ShelterMarker".to_string(),
                align: centre,
            });
        }
        if self.outpost.is_some() {
            let align = align(self.outpost);
            self.add_child(RoomChild::Marker {
                name: "TollText".to_string(),
                align,
            });
        }
        if self.treasury.is_some() {
            let align = align(self.treasury);
            self.add_child(RoomChild::Marker {
                name: "TreasuryText".to_string(),
                align,
            });
        }
    }

    /// Open bottom edge, no water, not a shelter or gate.
    fn refresh_deathpit_default(&mut self) {
        let height = self.grid.height() as i32;
        let open_floor = height > 0
            && (0..self.grid.width() as i32)
                .any(|x| self.grid.get_clamped(x, height - 1).terrain == TerrainType::Air);

        let deathpit = !self.roles.shelter
            && !self.roles.gate
            && self.water_level.get() < 0
            && open_floor;

        if self.deathpit.set_original(deathpit) {
            self.tilemap.mark_dirty();
        }
    }

    pub fn water_level(&self) -> i32 {
        self.water_level.get()
    }

    pub fn set_water_level(&mut self, level: i32) {
        if self.water_level.set(level) {
            self.refresh_deathpit_default();
            self.tilemap.mark_dirty();
        }
    }

    pub fn subregion(&self) -> String {
        self.subregion.get()
    }

    pub fn set_subregion(&mut self, name: &str) {
        if self.subregion.set(name.to_string()) {
            self.tilemap.mark_dirty();
        }
    }

    pub fn deathpit(&self) -> bool {
        self.deathpit.get()
    }

    pub fn set_deathpit(&mut self, deathpit: bool) {
        if self.deathpit.set(deathpit) {
            self.tilemap.mark_dirty();
        }
    }

    pub fn better_cutout(&self) -> bool {
        self.better_cutout.get()
    }

    pub fn set_better_cutout(&mut self, on: bool) {
        if self.better_cutout.set(on) {
            self.cutouts_dirty = true;
        }
    }

    pub fn cut_all_solid(&self) -> bool {
        self.cut_all_solid.get()
    }

    pub fn set_cut_all_solid(&mut self, on: bool) {
        if self.cut_all_solid.set(on) {
            self.cutouts_dirty = true;
        }
    }

    pub fn in_room_shortcuts(&self) -> bool {
        self.in_room_shortcuts.get()
    }

    pub fn set_in_room_shortcuts(&mut self, on: bool) {
        self.in_room_shortcuts.set(on);
    }

    pub fn acid_water(&self) -> bool {
        self.acid_water.get()
    }

    pub fn set_acid_water(&mut self, on: bool) {
        if self.acid_water.set(on) {
            self.tilemap.mark_dirty();
        }
    }

    pub fn set_acid_colour(&mut self, colour: Rgb) {
        if self.acid_colour.set(colour) {
            self.tilemap.mark_dirty();
        }
    }

    pub fn cutout_mode(&self) -> CutoutMode {
        if self.cut_all_solid.get() {
            CutoutMode::All
        } else {
            CutoutMode::Boundary {
                refine: self.better_cutout.get(),
            }
        }
    }

    pub fn update_cutouts(&mut self) {
        let mask = compute_cutouts(&self.grid, self.cutout_mode());
        log::debug!("{}: {} solid tiles cut", self.name, mask.count());
        self.cutouts = Some(mask);
        self.cutouts_dirty = false;
        self.tilemap.mark_dirty();
    }

    pub fn cutouts(&mut self) -> &CutoutMask {
        if self.cutouts_dirty || self.cutouts.is_none() {
            self.update_cutouts();
        }
        self.cutouts
            .get_or_insert_with(|| CutoutMask::new(self.grid.width(), self.grid.height()))
    }

    pub fn colours(&self, palette: &dyn PaletteSource) -> SubregionColours {
        let mut colours = palette.resolve(&self.region_id, &self.subregion.get());
        if self.acid_water.get() {
            colours.water = self.acid_colour.get();
        }
        colours
    }

    /// Cached tilemap, rebuilt first if anything it depends on changed.
    /// Options and resolved colours are compared with the last build, so a
    /// different palette source is picked up too.
    pub fn tilemap(&mut self, palette: &dyn PaletteSource, options: &RenderOptions) -> &RgbaImage {
        if self.cutouts_dirty || self.cutouts.is_none() {
            self.update_cutouts();
        }
        if self.last_options.as_ref() != Some(options) {
            self.last_options = Some(options.clone());
            self.tilemap.mark_dirty();
        }
        let colours = self.colours(palette);
        if self.last_colours != Some(colours) {
            self.last_colours = Some(colours);
            self.tilemap.mark_dirty();
        }

        let inputs = TilemapInputs {
            grid: &self.grid,
            cutouts: self.cutouts.as_ref(),
            shortcuts: &self.shortcuts,
            effects: &self.effects,
            water_level: self.water_level.get(),
            deathpit: self.deathpit.get(),
            colours,
        };
        self.tilemap.get_or_update(&inputs, options)
    }

    /// Polylines of every complete shortcut, empty unless in-room shortcuts
    /// are switched on.
    pub fn shortcut_paths(&self) -> Vec<Vec<Point>> {
        if !self.in_room_shortcuts.get() {
            return Vec::new();
        }
        self.shortcuts
            .iter()
            .filter(|s| s.kind != ShortcutType::None)
            .map(Shortcut::path)
            .collect()
    }

    pub fn objects(&self) -> impl Iterator<Item = &PlacedObject> {
        self.children().iter().filter_map(|c| match c {
            RoomChild::Object(obj) => Some(obj),
            RoomChild::Marker { .. } => None,
        })
    }

    /// Names of the generated labels, in the order they were added
    pub fn markers(&self) -> Vec<&str> {
        self.children()
            .iter()
            .filter_map(|c| match c {
                RoomChild::Marker { name, .. } => Some(name.as_str()),
                RoomChild::Object(_) => None,
            })
            .collect()
    }

    pub fn apply_overrides(&mut self, overrides: &RoomOverrides) {
        if let Some(v) = overrides.deathpit {
            self.set_deathpit(v);
        }
        if let Some(v) = &overrides.subregion {
            self.set_subregion(v);
        }
        if let Some(v) = overrides.better_tile_cutout {
            self.set_better_cutout(v);
        }
        if let Some(v) = overrides.cut_all_solid {
            self.set_cut_all_solid(v);
        }
        if let Some(v) = overrides.water_level {
            self.set_water_level(v);
        }
        if let Some(v) = overrides.in_room_shortcuts {
            self.set_in_room_shortcuts(v);
        }
        if let Some(v) = overrides.acid_water {
            self.set_acid_water(v);
        }
        if let Some(v) = overrides.acid_colour {
            self.set_acid_colour(v);
        }
        if let Some(gate) = &overrides.gate_data {
            self.gate_data = Some(gate.clone());
        }
    }

    pub fn overrides(&self) -> RoomOverrides {
        RoomOverrides {
            deathpit: self.deathpit.saved(),
            subregion: self.subregion.saved(),
            better_tile_cutout: self.better_cutout.saved(),
            cut_all_solid: self.cut_all_solid.saved(),
            water_level: self.water_level.saved(),
            in_room_shortcuts: self.in_room_shortcuts.saved(),
            acid_water: self.acid_water.saved(),
            acid_colour: self.acid_colour.saved(),
            gate_data: self.gate_data.clone().filter(|_| self.roles.gate),
        }
    }
}

impl MapNode for Room {
    fn size(&self) -> Vec2 {
        Vec2::new(self.grid.width() as f32, self.grid.height() as f32)
    }

    fn children(&self) -> &[RoomChild] {
        &self.children
    }

    fn add_child(&mut self, child: RoomChild) {
        self.children.push(child);
    }
}
