//! # Level Text Parser
//!
//! Reads the line-oriented room format:
//!
//! - line 1: `WIDTH*HEIGHT|WATERLEVEL|WATERINFRONT`
//! - line 11: `|`-separated tile tokens, each `TERRAIN,CODE,CODE...`, column-major
//!
//! Nothing in here fails. Missing fields keep their defaults and the caller
//! finds out whether tile data was located through `ParsedLevel::tiles_found`.
//!
//! The settings text is a list of `Key: value` records, of which
//! `PlacedObjects` and `Effects` are read.

use serde::Serialize;

use super::tile::{TerrainType, Tile, TileGrid};

pub const HEADER_LINE: usize = 1;
pub const TILE_LINE: usize = 11;
/// Lines kept when the data string is reduced to its canonical form
const KEPT_LINES: [usize; 3] = [0, HEADER_LINE, TILE_LINE];
/// Headers declaring more cells than this are treated as malformed
pub const MAX_TILE_COUNT: usize = 1 << 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelHeader {
    pub width: usize,
    pub height: usize,
    /// `-1` when the room declares no water
    pub water_level: i32,
    pub water_in_front: bool,
}

impl Default for LevelHeader {
    fn default() -> Self {
        LevelHeader {
            width: 0,
            height: 0,
            water_level: -1,
            water_in_front: false,
        }
    }
}

impl LevelHeader {
    pub fn tile_count(&self) -> usize {
        self.width.saturating_mul(self.height)
    }
}

#[derive(Debug, Clone)]
pub struct ParsedLevel {
    pub header: LevelHeader,
    pub grid: TileGrid,
    pub tiles_found: bool,
    /// Round-trippable copy of the input holding only lines 0, 1 and 11
    pub data_string: String,
}

pub fn parse_level(data: &str) -> ParsedLevel {
    let lines: Vec<&str> = data.split('\n').map(|l| l.trim_end_matches('\r')).collect();

    let header = lines
        .get(HEADER_LINE)
        .map(|line| parse_header(line))
        .unwrap_or_default();

    // A zero-sized room has nothing to fill
    let tile_line = match header.tile_count() {
        0 => None,
        n => find_tile_line(&lines, n),
    };

    let grid = match tile_line {
        Some(line) => parse_tile_line(line, header.width, header.height),
        None => TileGrid::new(header.width, header.height),
    };

    ParsedLevel {
        header,
        grid,
        tiles_found: tile_line.is_some(),
        data_string: canonical_data_string(&lines, tile_line),
    }
}

/// Each segment is parsed independently; a bad segment leaves only its own
/// field at the default.
pub fn parse_header(line: &str) -> LevelHeader {
    let mut header = LevelHeader::default();
    let mut segments = line.split('|');

    if let Some(size) = segments.next() {
        let mut dims = size.split('*');
        if let Some(Ok(width)) = dims.next().map(|s| s.trim().parse::<usize>()) {
            header.width = width;
        }
        if let Some(Ok(height)) = dims.next().map(|s| s.trim().parse::<usize>()) {
            header.height = height;
        }
        if header.width.checked_mul(header.height).map_or(true, |n| n > MAX_TILE_COUNT) {
            log::warn!(
                "Room size {}*{} is out of range, ignoring it",
                header.width,
                header.height
            );
            header.width = 0;
            header.height = 0;
        }
    }
    if let Some(Ok(level)) = segments.next().map(|s| s.trim().parse::<i32>()) {
        header.water_level = level;
    }
    if let Some(front) = segments.next() {
        header.water_in_front = front.trim() == "1";
    }

    header
}

/// Line 11 when present, otherwise the last line whose `|`-token count is
/// within one of the cell count.
fn find_tile_line<'a>(lines: &[&'a str], tile_count: usize) -> Option<&'a str> {
    if let Some(line) = lines.get(TILE_LINE) {
        return Some(line);
    }

    let found = lines.iter().rev().find(|line| {
        let tokens = line.matches('|').count() + 1;
        tokens + 1 >= tile_count && tokens <= tile_count.saturating_add(1)
    });
    if let Some(line) = found {
        log::debug!(
            "Tile data not at line {}, using drifted line with {} tokens",
            TILE_LINE,
            line.matches('|').count() + 1
        );
    }
    found.copied()
}

/// Fills the grid column by column. Empty tokens are skipped without
/// consuming a cell; tokens past the last cell are ignored.
pub fn parse_tile_line(line: &str, width: usize, height: usize) -> TileGrid {
    let mut grid = TileGrid::new(width, height);
    let (mut x, mut y) = (0usize, 0usize);

    for token in line.split('|') {
        if token.is_empty() || x >= width || y >= height {
            continue;
        }

        grid.set(x, y, parse_tile_token(token));

        y += 1;
        if y >= height {
            x += 1;
            y = 0;
        }
    }

    grid
}

fn parse_tile_token(token: &str) -> Tile {
    let mut tile = Tile::default();
    let mut parts = token.split(',');

    if let Some(Ok(code)) = parts.next().map(|s| s.trim().parse::<i32>()) {
        tile.terrain = TerrainType::from_code(code);
    }
    for code in parts {
        tile.apply_code(code.trim());
    }

    tile
}

fn canonical_data_string(lines: &[&str], tile_line: Option<&str>) -> String {
    let mut kept: Vec<&str> = lines.to_vec();
    if kept.len() <= TILE_LINE {
        kept.resize(TILE_LINE + 1, "");
    }
    if let Some(line) = tile_line {
        kept[TILE_LINE] = line;
    }
    for (i, line) in kept.iter_mut().enumerate() {
        if !KEPT_LINES.contains(&i) {
            *line = "";
        }
    }
    kept.join("\n")
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Effect {
    pub name: String,
    pub amount: f32,
}

/// First effect with this name wins.
pub fn find_effect<'a>(effects: &'a [Effect], name: &str) -> Option<&'a Effect> {
    effects.iter().find(|e| e.name == name)
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoomSettings {
    /// Raw object tokens, decoded later by the placement resolver
    pub placed_objects: Vec<String>,
    pub effects: Vec<Effect>,
}

pub fn parse_settings(text: &str) -> RoomSettings {
    let mut settings = RoomSettings::default();

    for line in text.split('\n').map(str::trim) {
        let mut split = line.splitn(2, ':');
        let key = split.next().unwrap_or("").trim();
        let value = split.next().unwrap_or("").trim();

        match key {
            "PlacedObjects" => settings.placed_objects.extend(
                value
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(String::from),
            ),
            "Effects" => settings.effects = parse_effects(value),
            _ => {}
        }
    }

    settings
}

/// `name-amount-?-?` quads. Fewer than four segments drops the quad, a bad
/// amount reads as 0.
pub fn parse_effects(value: &str) -> Vec<Effect> {
    value
        .split(',')
        .map(str::trim)
        .filter_map(|quad| {
            let segments: Vec<&str> = quad.split('-').collect();
            if segments.len() < 4 {
                return None;
            }
            Some(Effect {
                name: segments[0].to_string(),
                amount: segments[1].trim().parse().unwrap_or(0.0),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::room::tile::{ShortcutType, TileAttributes};

    fn level(header: &str, tiles: &str) -> String {
        let mut lines = vec!["ROOM_NAME".to_string(), header.to_string()];
        lines.extend((2..11).map(|i| format!("junk line {}", i)));
        lines.push(tiles.to_string());
        lines.push("trailer".to_string());
        lines.join("\n")
    }

    #[test]
    fn test_header_fields() {
        let header = parse_header("48*35|12|1");
        assert_eq!(header.width, 48);
        assert_eq!(header.height, 35);
        assert_eq!(header.water_level, 12);
        assert!(header.water_in_front);
    }

    #[test]
    fn test_malformed_header_keeps_defaults() {
        let header = parse_header("abc*7|x");
        assert_eq!(header.width, 0);
        assert_eq!(header.height, 7);
        assert_eq!(header.water_level, -1);
        assert!(!header.water_in_front);

        assert_eq!(parse_header(""), LevelHeader::default());
    }

    #[test]
    fn test_oversized_header_is_rejected() {
        let header = parse_header("4294967296*4294967296|3|1");
        assert_eq!((header.width, header.height), (0, 0));
        assert_eq!(header.water_level, 3);
        assert!(header.water_in_front);

        let parsed = parse_level("NAME\n4294967296*4294967296|-1|0\n");
        assert!(!parsed.tiles_found);
        assert!(parsed.grid.is_empty());

        // No overflow, but far larger than any room
        let parsed = parse_level(&level("5000*5000|-1|0", "1|1|1"));
        assert!(!parsed.tiles_found);
        assert_eq!(parsed.header.tile_count(), 0);
        assert!(parsed.grid.is_empty());
    }

    #[test]
    fn test_column_major_fill() {
        // 2x3 grid: column 0 is Solid,Air,Floor; column 1 is Slope,Air,Air
        let parsed = parse_level(&level("2*3|-1|0", "1|0|3|2|0|0|"));
        assert!(parsed.tiles_found);
        let grid = &parsed.grid;
        assert_eq!(grid.get(0, 0).unwrap().terrain, TerrainType::Solid);
        assert_eq!(grid.get(0, 2).unwrap().terrain, TerrainType::Floor);
        assert_eq!(grid.get(1, 0).unwrap().terrain, TerrainType::Slope);
        assert_eq!(grid.get(1, 2).unwrap().terrain, TerrainType::Air);
    }

    #[test]
    fn test_tile_codes_and_unknown_codes() {
        let parsed = parse_level(&level("1*2|-1|0", "4,3,6,99|0,1,2,12"));
        let top = parsed.grid.get(0, 0).unwrap();
        assert_eq!(top.terrain, TerrainType::ShortcutEntrance);
        assert_eq!(top.shortcut, ShortcutType::Normal);
        assert_eq!(top.attributes, TileAttributes::WALL_BEHIND);

        let bottom = parsed.grid.get(0, 1).unwrap();
        assert!(bottom.has_beam());
        assert_eq!(bottom.shortcut, ShortcutType::RegionTransportation);
    }

    #[test]
    fn test_extra_tokens_are_skipped() {
        let parsed = parse_level(&level("1*1|-1|0", "1|1|1|1|1"));
        assert_eq!(parsed.grid.len(), 1);
        assert!(parsed.grid.get(0, 0).unwrap().is_solid());
    }

    #[test]
    fn test_drifted_tile_line_is_found() {
        let text = "NAME\n3*2|1|0\n\n1|1|1|1|1|1|\nnot tiles";
        let parsed = parse_level(text);
        assert!(parsed.tiles_found);
        assert!(parsed.grid.get(2, 1).unwrap().is_solid());
    }

    #[test]
    fn test_missing_tile_line_yields_air_grid() {
        let parsed = parse_level("NAME\n4*4|-1|0\nnothing here");
        assert!(!parsed.tiles_found);
        assert_eq!(parsed.grid.width(), 4);
        assert_eq!(parsed.grid.height(), 4);
        assert!(parsed
            .grid
            .iter_rows()
            .all(|(_, t)| t.terrain == TerrainType::Air));
    }

    #[test]
    fn test_canonical_string_round_trips() {
        let original = parse_level(&level("3*2|4|1", "1|0,1|4,3|2|1,6|3,4"));
        let lines: Vec<&str> = original.data_string.split('\n').collect();
        assert_eq!(lines.len(), 13);
        assert_eq!(lines[0], "ROOM_NAME");
        assert_eq!(lines[1], "3*2|4|1");
        assert_eq!(lines[5], "");
        assert_eq!(lines[12], "");

        let reparsed = parse_level(&original.data_string);
        assert_eq!(reparsed.header, original.header);
        assert_eq!(reparsed.grid, original.grid);
    }

    #[test]
    fn test_short_input_is_padded_to_tile_line() {
        let parsed = parse_level("NAME\n2*1|-1|0\n1|1");
        let lines: Vec<&str> = parsed.data_string.split('\n').collect();
        assert_eq!(lines.len(), 12);
        assert_eq!(lines[1], "2*1|-1|0");
        assert_eq!(lines[11], "1|1");

        let reparsed = parse_level(&parsed.data_string);
        assert_eq!(reparsed.grid, parsed.grid);
    }

    #[test]
    fn test_settings_records() {
        let text = "Effects: WaterFluxMinLevel-0.2-1-0, Broken-1, InvertedWater-x-0-0\n\
                    PlacedObjects: DataPearl><100><200><0~0, , Filter><20><20><40~0~White\n\
                    Unrelated: value";
        let settings = parse_settings(text);

        assert_eq!(settings.effects.len(), 2);
        assert_eq!(settings.effects[0].name, "WaterFluxMinLevel");
        assert!((settings.effects[0].amount - 0.2).abs() < 1e-6);
        assert_eq!(settings.effects[1].name, "InvertedWater");
        assert_eq!(settings.effects[1].amount, 0.0);

        assert_eq!(settings.placed_objects.len(), 2);
        assert!(settings.placed_objects[1].starts_with("Filter"));
    }

    #[test]
    fn test_first_effect_wins() {
        let effects = parse_effects("A-1-0-0, A-2-0-0");
        assert_eq!(find_effect(&effects, "A").unwrap().amount, 1.0);
        assert!(find_effect(&effects, "B").is_none());
    }
}
