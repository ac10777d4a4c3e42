use std::{
    collections::HashMap,
    fs::{self, File},
    hash::{Hash, Hasher},
    io::Cursor,
    path::{Path, PathBuf},
};

use image::{ImageOutputFormat, RgbaImage};
use serde::Serialize;
use twox_hash::XxHash64;

use crate::{
    error::{Result, RoomError},
    palette::PaletteSource,
    placement::{PlacedObject, PlacedObjectDecoder, PlacementContext, Vec2},
    progress::{BatchProgress, BatchStatus},
    room::{
        overrides::{load_overrides, overrides_path_for, RoomOverrides},
        parser::Effect,
        render::RenderOptions,
        shortcuts::Shortcut,
        tile::Point,
        Room,
    },
};

pub const SETTINGS_SUFFIX: &str = "_settings";
pub const INDEX_FILE: &str = "rooms.json";

/// One room as written to `rooms.json`
#[derive(Debug, Clone, Serialize)]
pub struct RoomIndexEntry {
    pub name: String,
    pub region: String,
    pub width: usize,
    pub height: usize,
    pub water_level: i32,
    pub water_in_front: bool,
    pub deathpit: bool,
    pub subregion: String,
    pub better_tile_cutout: bool,
    pub cut_all_solid: bool,
    pub in_room_shortcuts: bool,
    pub acid_water: bool,
    pub tiles_loaded: bool,
    /// PNG file name, shared by rooms that render identically
    pub image: Option<String>,
    /// Solid tiles left transparent in the image
    pub cut_tiles: usize,
    pub shortcuts: Vec<Shortcut>,
    pub shortcut_paths: Vec<Vec<Point>>,
    pub exits: Vec<Point>,
    pub effects: Vec<Effect>,
    pub objects: Vec<PlacedObject>,
    pub treasury: Option<Vec2>,
    pub outpost: Option<Vec2>,
    pub markers: Vec<String>,
    /// Values the user pinned, as they would be saved
    #[serde(skip_serializing_if = "RoomOverrides::is_empty")]
    pub overrides: RoomOverrides,
}

#[derive(Debug, Default)]
pub struct BatchReport {
    pub rooms: usize,
    pub images_written: usize,
    pub images_shared: usize,
    /// Non-fatal problems, in the order they were met
    pub errors: Vec<String>,
}

/// `SU_A01` -> `SU`, `GATE_SU_DS` -> `SU`
pub fn region_from_name(name: &str) -> &str {
    let rest = name
        .strip_prefix("GATE_")
        .or_else(|| name.strip_prefix("gate_"))
        .unwrap_or(name);
    rest.split('_').next().unwrap_or(rest)
}

pub fn settings_path_for(room_file: &Path) -> Option<PathBuf> {
    let stem = room_file.file_stem()?.to_str()?;
    Some(room_file.with_file_name(format!("{}{}.txt", stem, SETTINGS_SUFFIX)))
}

pub struct RoomExtractor<'a> {
    palette: &'a dyn PaletteSource,
    decoder: &'a dyn PlacedObjectDecoder,
    pub context: PlacementContext,
    pub options: RenderOptions,
    /// Region for every room; taken from the room name when unset
    pub region: Option<String>,
}

impl<'a> RoomExtractor<'a> {
    pub fn new(palette: &'a dyn PaletteSource, decoder: &'a dyn PlacedObjectDecoder) -> Self {
        RoomExtractor {
            palette,
            decoder,
            context: PlacementContext::default(),
            options: RenderOptions::default(),
            region: None,
        }
    }

    /// Loads a room file with its settings and override files when present.
    /// `overrides` replaces the default `<ROOM>.overrides.json` lookup.
    pub fn load_room(
        &self,
        path: &Path,
        overrides: Option<&Path>,
        errors: &mut Vec<String>,
    ) -> Result<Room> {
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_string();
        let region = self
            .region
            .clone()
            .unwrap_or_else(|| region_from_name(&name).to_string());

        let data = fs::read_to_string(path)?;
        let settings = match settings_path_for(path) {
            Some(p) if p.exists() => Some(fs::read_to_string(p)?),
            _ => None,
        };

        let mut room = Room::new(&name, &region);
        room.load(
            &data,
            settings.as_deref(),
            self.decoder,
            &self.context,
            self.palette,
            errors,
        );

        let overrides_path = overrides
            .map(Path::to_path_buf)
            .or_else(|| overrides_path_for(path).filter(|p| p.exists()));
        if let Some(p) = overrides_path {
            match load_overrides(&p) {
                Ok(o) => room.apply_overrides(&o),
                Err(e) => {
                    let msg = format!("Could not read overrides for room {}: {}", name, e);
                    log::warn!("{}", msg);
                    errors.push(msg);
                }
            }
        }

        Ok(room)
    }

    /// Renders every `*.txt` room in `input_dir` into `output_dir`, writing
    /// one PNG per distinct tilemap and a `rooms.json` index.
    pub fn extract_rooms(
        &self,
        input_dir: &Path,
        output_dir: &Path,
        progress_path: &Path,
    ) -> Result<BatchReport> {
        if !input_dir.is_dir() {
            return Err(RoomError::InvalidData(format!(
                "{} is not a directory",
                input_dir.display()
            )));
        }
        let room_files = list_room_files(input_dir)?;
        println!("Found {} rooms in {}", room_files.len(), input_dir.display());

        fs::create_dir_all(output_dir)?;

        let mut report = BatchReport::default();
        let mut index = Vec::new();
        let mut written: HashMap<u64, Vec<(String, RgbaImage)>> = HashMap::new();

        for (i, path) in room_files.iter().enumerate() {
            let mut room = match self.load_room(path, None, &mut report.errors) {
                Ok(room) => room,
                Err(e) => {
                    eprintln!("  -> Error loading {}: {}", path.display(), e);
                    report.errors.push(format!("{}: {}", path.display(), e));
                    continue;
                }
            };
            let name = room.name.clone();
            println!("Rendering room {}...", name);

            let image = if room.grid.is_empty() {
                None
            } else {
                let tilemap = room.tilemap(self.palette, &self.options);
                match self.write_deduped(tilemap, &name, output_dir, &mut written) {
                    Ok((filename, fresh)) => {
                        if fresh {
                            report.images_written += 1;
                            println!("  -> {}", filename);
                        } else {
                            report.images_shared += 1;
                            println!("  -> {} (shared)", filename);
                        }
                        Some(filename)
                    }
                    Err(e) => {
                        eprintln!("  -> Error saving room {}: {}", name, e);
                        report.errors.push(format!("{}: {}", name, e));
                        None
                    }
                }
            };

            let cut_tiles = room.cutouts().count();
            index.push(index_entry(&room, image, cut_tiles));
            report.rooms += 1;

            report
                .progress(Some(&name), i + 1, room_files.len(), BatchStatus::Running)
                .write(progress_path);
        }

        let index_path = output_dir.join(INDEX_FILE);
        println!("Writing index to {}...", index_path.display());
        let file = File::create(&index_path)?;
        serde_json::to_writer_pretty(file, &index)?;

        report
            .progress(None, room_files.len(), room_files.len(), BatchStatus::Done)
            .write(progress_path);

        Ok(report)
    }

    /// Returns the file name holding `image` and whether it was newly written.
    fn write_deduped(
        &self,
        image: &RgbaImage,
        name: &str,
        output_dir: &Path,
        written: &mut HashMap<u64, Vec<(String, RgbaImage)>>,
    ) -> Result<(String, bool)> {
        let hash = tilemap_hash(image);
        if let Some(existing) = written
            .get(&hash)
            .and_then(|seen| seen.iter().find(|(_, img)| tilemaps_are_identical(img, image)))
        {
            return Ok((existing.0.clone(), false));
        }

        let filename = format!("{}.png", name);
        save_tilemap_png(image, &output_dir.join(&filename))?;
        written
            .entry(hash)
            .or_default()
            .push((filename.clone(), image.clone()));
        Ok((filename, true))
    }
}

impl BatchReport {
    fn progress<'a>(
        &self,
        room: Option<&'a str>,
        current: usize,
        total: usize,
        status: BatchStatus,
    ) -> BatchProgress<'a> {
        BatchProgress {
            room,
            current,
            total,
            images_written: self.images_written,
            images_shared: self.images_shared,
            errors: self.errors.len(),
            status,
        }
    }
}

fn index_entry(room: &Room, image: Option<String>, cut_tiles: usize) -> RoomIndexEntry {
    RoomIndexEntry {
        name: room.name.clone(),
        region: room.region_id.clone(),
        width: room.grid.width(),
        height: room.grid.height(),
        water_level: room.water_level(),
        water_in_front: room.water_in_front,
        deathpit: room.deathpit(),
        subregion: room.subregion(),
        better_tile_cutout: room.better_cutout(),
        cut_all_solid: room.cut_all_solid(),
        in_room_shortcuts: room.in_room_shortcuts(),
        acid_water: room.acid_water(),
        tiles_loaded: room.tiles_loaded,
        image,
        cut_tiles,
        shortcuts: room.shortcuts.clone(),
        shortcut_paths: room.shortcut_paths(),
        exits: room.exits.clone(),
        effects: room.effects.clone(),
        objects: room.objects().cloned().collect(),
        treasury: room.treasury,
        outpost: room.outpost,
        markers: room.markers().into_iter().map(str::to_string).collect(),
        overrides: room.overrides(),
    }
}

/// Room files sorted by name, settings files excluded.
pub fn list_room_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let is_txt = path.extension().map_or(false, |ext| ext == "txt");
        let is_settings = path
            .file_stem()
            .and_then(|s| s.to_str())
            .map_or(false, |s| s.ends_with(SETTINGS_SUFFIX));
        if path.is_file() && is_txt && !is_settings {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn tilemap_hash(image: &RgbaImage) -> u64 {
    let mut hasher = XxHash64::default();
    image.dimensions().hash(&mut hasher);
    image.as_raw().hash(&mut hasher);
    hasher.finish()
}

fn tilemaps_are_identical(a: &RgbaImage, b: &RgbaImage) -> bool {
    a.dimensions() == b.dimensions() && a.as_raw() == b.as_raw()
}

/// Encodes the tilemap in memory and writes it once, optimised by oxipng
/// when possible. Tilemaps hold one pixel per tile so this stays small.
/// Cut tiles are transparent, the alpha channel is kept whenever one is used.
pub fn save_tilemap_png(image: &RgbaImage, path: &Path) -> Result<()> {
    let mut encoded = Vec::new();
    image.write_to(&mut Cursor::new(&mut encoded), ImageOutputFormat::Png)?;

    let mut options = oxipng::Options::from_preset(2);
    options.bit_depth_reduction = true;
    options.interlace = None;

    let bytes = match oxipng::optimize_from_memory(&encoded, &options) {
        Ok(optimised) if optimised.len() < encoded.len() => optimised,
        Ok(_) => encoded,
        Err(e) => {
            log::warn!(
                "Tilemap {} saved unoptimised, oxipng failed: {}",
                path.display(),
                e
            );
            encoded
        }
    };
    fs::write(path, bytes)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::palette::PaletteDatabase;
    use crate::placement::TokenDecoder;
    use crate::room::MapNode;
    use tempfile::TempDir;

    fn write_room(dir: &Path, name: &str, header: &str, tiles: &str) {
        let mut lines = vec![name.to_string(), header.to_string()];
        lines.extend((2..11).map(|_| String::new()));
        lines.push(tiles.to_string());
        fs::write(dir.join(format!("{}.txt", name)), lines.join("\n")).unwrap();
    }

    #[test]
    fn test_region_from_name() {
        assert_eq!(region_from_name("SU_A01"), "SU");
        assert_eq!(region_from_name("GATE_SU_DS"), "SU");
        assert_eq!(region_from_name("LONELY"), "LONELY");
    }

    #[test]
    fn test_list_room_files_skips_settings() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("SU_B01.txt"), "").unwrap();
        fs::write(dir.path().join("SU_A01.txt"), "").unwrap();
        fs::write(dir.path().join("SU_A01_settings.txt"), "").unwrap();
        fs::write(dir.path().join("notes.md"), "").unwrap();

        let files = list_room_files(dir.path()).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["SU_A01.txt", "SU_B01.txt"]);
    }

    #[test]
    fn test_batch_dedupes_and_reports() {
        let input = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        let tiles = vec!["1"; 4].join("|");
        write_room(input.path(), "SU_A01", "2*2|-1|0", &tiles);
        write_room(input.path(), "SU_A02", "2*2|-1|0", &tiles);
        fs::write(input.path().join("SU_BROKEN.txt"), "SU_BROKEN\n3*3|-1|0").unwrap();
        fs::write(
            input.path().join("SU_A02_settings.txt"),
            "PlacedObjects: Rock><10><10\nEffects: InvertedWater-1-0-0",
        )
        .unwrap();

        let palette = PaletteDatabase::default();
        let extractor = RoomExtractor::new(&palette, &TokenDecoder);
        let progress = output.path().join("progress.json");
        let report = extractor
            .extract_rooms(input.path(), output.path(), &progress)
            .unwrap();

        assert_eq!(report.rooms, 3);
        assert_eq!(report.images_written, 2);
        assert_eq!(report.images_shared, 1);
        assert_eq!(
            report.errors,
            vec!["Could not find tile data for room SU_BROKEN".to_string()]
        );

        assert!(output.path().join("SU_A01.png").exists());
        assert!(!output.path().join("SU_A02.png").exists());
        assert!(output.path().join("SU_BROKEN.png").exists());

        let text = fs::read_to_string(output.path().join(INDEX_FILE)).unwrap();
        let index: serde_json::Value = serde_json::from_str(&text).unwrap();
        let rooms = index.as_array().unwrap();
        assert_eq!(rooms.len(), 3);
        assert_eq!(rooms[1]["name"], "SU_A02");
        assert_eq!(rooms[1]["image"], "SU_A01.png");
        assert_eq!(rooms[1]["objects"][0]["type"], "Rock");
        assert_eq!(rooms[1]["effects"][0]["name"], "InvertedWater");
        assert_eq!(rooms[2]["tiles_loaded"], false);
        // All-solid 2x2 rooms lose every tile to the boundary flood
        assert_eq!(rooms[0]["cut_tiles"], 4);
        assert_eq!(rooms[0]["better_tile_cutout"], true);
        assert!(rooms[0].get("overrides").is_none());

        let progress: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(progress).unwrap()).unwrap();
        assert_eq!(progress["status"], "done");
        assert_eq!(progress["current"], 3);
        assert_eq!(progress["images_written"], 2);
        assert_eq!(progress["images_shared"], 1);
        assert_eq!(progress["errors"], 1);
    }

    #[test]
    fn test_index_carries_effective_settings() {
        let input = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        write_room(input.path(), "SU_A01", "2*2|-1|0", "0|0|0|0");
        fs::write(
            input.path().join("SU_A01.overrides.json"),
            r#"{ "subregion": "Outskirts", "cutAllSolid": true, "inRoomShortcuts": true }"#,
        )
        .unwrap();
        fs::write(
            input.path().join("SU_A01_settings.txt"),
            "PlacedObjects: ScavengerOutpost><20><20",
        )
        .unwrap();

        let palette = PaletteDatabase::default();
        let extractor = RoomExtractor::new(&palette, &TokenDecoder);
        extractor
            .extract_rooms(input.path(), output.path(), &output.path().join("p.json"))
            .unwrap();

        let text = fs::read_to_string(output.path().join(INDEX_FILE)).unwrap();
        let index: serde_json::Value = serde_json::from_str(&text).unwrap();
        let room = &index[0];
        assert_eq!(room["subregion"], "Outskirts");
        assert_eq!(room["cut_all_solid"], true);
        assert_eq!(room["in_room_shortcuts"], true);
        assert_eq!(room["cut_tiles"], 0);
        assert_eq!(room["markers"][0], "TollText");
        assert_eq!(room["overrides"]["subregion"], "Outskirts");
        assert_eq!(room["overrides"]["cutAllSolid"], true);
        assert!(room["overrides"].get("waterLevel").is_none());
    }

    #[test]
    fn test_saved_tilemap_keeps_transparency() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("SU_A01.png");
        let mut tilemap = RgbaImage::new(3, 2);
        tilemap.put_pixel(1, 0, image::Rgba([200, 100, 50, 255]));

        save_tilemap_png(&tilemap, &path).unwrap();

        let decoded = image::open(&path).unwrap().to_rgba8();
        assert_eq!(decoded, tilemap);
    }

    #[test]
    fn test_batch_rejects_missing_input() {
        let dir = TempDir::new().unwrap();
        let palette = PaletteDatabase::default();
        let extractor = RoomExtractor::new(&palette, &TokenDecoder);
        let result = extractor.extract_rooms(
            &dir.path().join("nowhere"),
            &dir.path().join("out"),
            &dir.path().join("progress.json"),
        );
        assert!(matches!(result, Err(RoomError::InvalidData(_))));
    }

    #[test]
    fn test_overrides_file_is_applied() {
        let dir = TempDir::new().unwrap();
        write_room(dir.path(), "SU_A01", "2*2|-1|0", "0|0|0|0");
        fs::write(
            dir.path().join("SU_A01.overrides.json"),
            r#"{ "waterLevel": 1, "deathpit": false }"#,
        )
        .unwrap();

        let palette = PaletteDatabase::default();
        let extractor = RoomExtractor::new(&palette, &TokenDecoder);
        let mut errors = Vec::new();
        let room = extractor
            .load_room(&dir.path().join("SU_A01.txt"), None, &mut errors)
            .unwrap();

        assert!(errors.is_empty());
        assert_eq!(room.water_level(), 1);
        assert!(!room.deathpit());
        assert_eq!(room.size(), Vec2::new(2.0, 2.0));
    }
}
