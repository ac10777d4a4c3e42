//! User overrides stored next to a room, merged on top of the parsed defaults.
//!
//! Only fields that were actually overridden are written, so an untouched
//! room saves as `{}`.

use std::{fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::palette::Rgb;

/// A value computed from the room data that the user may replace.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Property<T> {
    original: T,
    value: Option<T>,
}

impl<T: Clone + PartialEq> Property<T> {
    pub fn new(original: T) -> Self {
        Property {
            original,
            value: None,
        }
    }

    pub fn get(&self) -> T {
        self.value.clone().unwrap_or_else(|| self.original.clone())
    }

    /// Returns true if the effective value changed.
    pub fn set(&mut self, value: T) -> bool {
        let before = self.get();
        self.value = Some(value);
        before != self.get()
    }

    /// Replaces the computed default, keeping any override.
    pub fn set_original(&mut self, original: T) -> bool {
        let before = self.get();
        self.original = original;
        before != self.get()
    }

    /// Override value for persistence, `None` when untouched
    pub fn saved(&self) -> Option<T> {
        self.value.clone()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GateData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_region_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub left_region_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub right_region_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub left_karma: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub right_karma: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deathpit: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subregion: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub better_tile_cutout: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cut_all_solid: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub water_level: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_room_shortcuts: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acid_water: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acid_colour: Option<Rgb>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gate_data: Option<GateData>,
}

impl RoomOverrides {
    pub fn is_empty(&self) -> bool {
        *self == RoomOverrides::default()
    }
}

pub fn load_overrides(path: &Path) -> Result<RoomOverrides> {
    let text = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

pub fn save_overrides(overrides: &RoomOverrides, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(overrides)?;
    fs::write(path, json)?;
    Ok(())
}

/// `<ROOM>.overrides.json` beside the room file
pub fn overrides_path_for(room_file: &Path) -> Option<std::path::PathBuf> {
    let stem = room_file.file_stem()?.to_str()?;
    Some(room_file.with_file_name(format!("{}.overrides.json", stem)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_property_override() {
        let mut water = Property::new(3);
        assert_eq!(water.get(), 3);
        assert_eq!(water.saved(), None);

        assert!(water.set(7));
        assert_eq!(water.get(), 7);
        assert_eq!(water.original, 3);

        // Override survives a new default
        assert!(!water.set_original(5));
        assert_eq!(water.get(), 7);
        assert_eq!(water.saved(), Some(7));
    }

    #[test]
    fn test_setting_same_value_reports_no_change() {
        let mut flag = Property::new(true);
        assert!(!flag.set(true));
        // Still saved, the user pinned it
        assert_eq!(flag.saved(), Some(true));
    }

    #[test]
    fn test_json_keys() {
        let overrides = RoomOverrides {
            better_tile_cutout: Some(false),
            water_level: Some(4),
            gate_data: Some(GateData {
                left_region_id: Some("SU".to_string()),
                left_karma: Some("2".to_string()),
                ..GateData::default()
            }),
            ..RoomOverrides::default()
        };
        let value = serde_json::to_value(&overrides).unwrap();

        assert_eq!(value["betterTileCutout"], false);
        assert_eq!(value["waterLevel"], 4);
        assert_eq!(value["gateData"]["LeftRegionId"], "SU");
        assert_eq!(value["gateData"]["LeftKarma"], "2");
        assert!(value.get("deathpit").is_none());
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("SU_A01.overrides.json");

        let overrides = RoomOverrides {
            deathpit: Some(true),
            subregion: Some("Outskirts".to_string()),
            ..RoomOverrides::default()
        };
        save_overrides(&overrides, &path).unwrap();

        let loaded = load_overrides(&path).unwrap();
        assert_eq!(loaded, overrides);
        assert!(!loaded.is_empty());
    }

    #[test]
    fn test_missing_and_broken_files() {
        let dir = TempDir::new().unwrap();
        assert!(load_overrides(&dir.path().join("none.json")).is_err());

        let broken = dir.path().join("broken.json");
        fs::write(&broken, "{ nope").unwrap();
        assert!(load_overrides(&broken).is_err());
    }

    #[test]
    fn test_overrides_path() {
        let path = overrides_path_for(Path::new("rooms/SU_A01.txt")).unwrap();
        assert_eq!(path, Path::new("rooms/SU_A01.overrides.json"));
    }
}
