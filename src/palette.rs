//! # Subregion Palettes
//!
//! Background and water colours per region/subregion, plus named colours such
//! as the acid override `reg_<REGION>_acid`. Loaded from JSON:
//!
//! ```json
//! {
//!   "regions": {
//!     "SU": { "": { "background": {"r": 120, "g": 160, "b": 200}, "water": {"r": 0, "g": 60, "b": 120} } }
//!   },
//!   "colours": { "reg_SU_acid": {"r": 40, "g": 200, "b": 20} }
//! }
//! ```
//!
//! The empty subregion name is the region's main palette.

use std::{collections::HashMap, fs, path::Path};

use image::Rgba;
use serde::{Deserialize, Serialize};

use crate::error::Result;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Rgb { r, g, b }
    }

    pub fn to_rgba(self) -> Rgba<u8> {
        Rgba([self.r, self.g, self.b, 255])
    }
}

/// Used for any colour the database cannot supply
pub const NEUTRAL_COLOUR: Rgb = Rgb::new(128, 128, 128);
pub const DEFAULT_ACID_COLOUR: Rgb = Rgb::new(0, 0, 255);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubregionColours {
    pub background: Rgb,
    pub water: Rgb,
}

impl Default for SubregionColours {
    fn default() -> Self {
        SubregionColours {
            background: NEUTRAL_COLOUR,
            water: NEUTRAL_COLOUR,
        }
    }
}

/// Colour lookups the rasteriser depends on.
pub trait PaletteSource {
    fn subregion_colours(&self, region: &str, subregion: &str) -> Option<SubregionColours>;
    fn acid_colour(&self, region: &str) -> Option<Rgb>;

    /// Lookup with the neutral fallback applied.
    fn resolve(&self, region: &str, subregion: &str) -> SubregionColours {
        self.subregion_colours(region, subregion).unwrap_or_else(|| {
            log::debug!("No palette for {}/{:?}, using neutral", region, subregion);
            SubregionColours::default()
        })
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PaletteDatabase {
    #[serde(default)]
    pub regions: HashMap<String, HashMap<String, SubregionColours>>,
    #[serde(default)]
    pub colours: HashMap<String, Rgb>,
}

impl PaletteDatabase {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn acid_key(region: &str) -> String {
        format!("reg_{}_acid", region)
    }
}

impl PaletteSource for PaletteDatabase {
    fn subregion_colours(&self, region: &str, subregion: &str) -> Option<SubregionColours> {
        self.regions.get(region)?.get(subregion).copied()
    }

    fn acid_colour(&self, region: &str) -> Option<Rgb> {
        self.colours.get(&Self::acid_key(region)).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_and_fallback() {
        let json = r#"{
            "regions": {
                "SU": {
                    "": { "background": {"r": 10, "g": 20, "b": 30}, "water": {"r": 0, "g": 0, "b": 90} }
                }
            },
            "colours": { "reg_SU_acid": {"r": 1, "g": 2, "b": 3} }
        }"#;
        let db: PaletteDatabase = serde_json::from_str(json).unwrap();

        let main = db.resolve("SU", "");
        assert_eq!(main.background, Rgb::new(10, 20, 30));
        assert_eq!(db.acid_colour("SU"), Some(Rgb::new(1, 2, 3)));

        assert_eq!(db.resolve("SU", "Missing"), SubregionColours::default());
        assert_eq!(db.resolve("HI", "").water, NEUTRAL_COLOUR);
        assert!(db.acid_colour("HI").is_none());
    }

    #[test]
    fn test_empty_document() {
        let db: PaletteDatabase = serde_json::from_str("{}").unwrap();
        assert!(db.regions.is_empty());
    }
}
