//! # Placed Objects
//!
//! Decodes the `PlacedObjects` settings record and applies `Filter` objects,
//! which restrict which characters can see the objects around them.
//!
//! The default token layout is
//!
//! ```text
//! Type><x><y><handleX~handleY~White|Red
//! ```
//!
//! with positions in pixels (20 per tile). The handle stays in pixels; a
//! filter's radius in tiles is the handle length divided by 20.

use std::collections::BTreeSet;

use serde::Serialize;

pub const PIXELS_PER_TILE: f32 = 20.0;

/// Objects that stay visible whatever character is selected
pub const NON_PICKUP_OBJECTS: &[&str] = &[
    "GhostSpot",
    "BlueToken",
    "GoldToken",
    "PurpleToken",
    "RedToken",
    "WhiteToken",
    "DevToken",
    "GreenToken",
    "DataPearl",
    "UniqueDataPearl",
    "ScavengerOutpost",
    "HRGuard",
    "TempleGuard",
    "MoonCloak",
];

pub const DEFAULT_ROSTER: &[&str] = &[
    "White",
    "Yellow",
    "Red",
    "Gourmand",
    "Artificer",
    "Rivulet",
    "Spear",
    "Saint",
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub fn new(x: f32, y: f32) -> Self {
        Vec2 { x, y }
    }

    pub fn length(self) -> f32 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    pub fn distance(self, other: Vec2) -> f32 {
        Vec2::new(self.x - other.x, self.y - other.y).length()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlacedObject {
    #[serde(rename = "type")]
    pub kind: String,
    /// Tile units
    pub pos: Vec2,
    /// Pixel units, relative to `pos`
    pub handle: Vec2,
    pub availability: BTreeSet<String>,
    #[serde(skip)]
    pub remove_by_availability: bool,
}

impl PlacedObject {
    pub fn is_filter(&self) -> bool {
        self.kind == "Filter"
    }

    pub fn filter_radius(&self) -> f32 {
        self.handle.length() / PIXELS_PER_TILE
    }
}

/// Turns one settings token into an object, `None` if it can't be read.
pub trait PlacedObjectDecoder {
    fn decode(&self, token: &str) -> Option<PlacedObject>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TokenDecoder;

impl PlacedObjectDecoder for TokenDecoder {
    fn decode(&self, token: &str) -> Option<PlacedObject> {
        let mut parts = token.split("><");
        let kind = parts.next()?.trim();
        if kind.is_empty() {
            return None;
        }
        let x: f32 = parts.next()?.trim().parse().ok()?;
        let y: f32 = parts.next()?.trim().parse().ok()?;

        let mut handle = Vec2::default();
        let mut availability = BTreeSet::new();
        if let Some(data) = parts.next() {
            let mut fields = data.split('~');
            handle.x = fields.next().and_then(|v| v.trim().parse().ok()).unwrap_or(0.0);
            handle.y = fields.next().and_then(|v| v.trim().parse().ok()).unwrap_or(0.0);
            if let Some(list) = fields.next() {
                availability.extend(
                    list.split('|')
                        .map(str::trim)
                        .filter(|id| !id.is_empty())
                        .map(str::to_string),
                );
            }
        }

        Some(PlacedObject {
            kind: kind.to_string(),
            pos: Vec2::new(x / PIXELS_PER_TILE, y / PIXELS_PER_TILE),
            handle,
            availability,
            remove_by_availability: !NON_PICKUP_OBJECTS.contains(&kind),
        })
    }
}

/// Playable characters and the one currently being mapped, if any.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacementContext {
    pub playable: Vec<String>,
    pub selected: Option<String>,
}

impl Default for PlacementContext {
    fn default() -> Self {
        PlacementContext {
            playable: DEFAULT_ROSTER.iter().map(|s| s.to_string()).collect(),
            selected: None,
        }
    }
}

impl PlacementContext {
    pub fn with_selected(selected: Option<String>) -> Self {
        PlacementContext {
            selected,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResolvedPlacements {
    pub objects: Vec<PlacedObject>,
    /// Room tile position with y flipped to screen space
    pub treasury: Option<Vec2>,
    pub outpost: Option<Vec2>,
}

pub fn resolve_placements<'a, D, I>(
    tokens: I,
    decoder: &D,
    ctx: &PlacementContext,
    room_height: usize,
) -> ResolvedPlacements
where
    D: PlacedObjectDecoder + ?Sized,
    I: IntoIterator<Item = &'a str>,
{
    let height = room_height as f32;
    let mut resolved = ResolvedPlacements::default();
    let mut filters = Vec::new();

    for token in tokens {
        let Some(obj) = decoder.decode(token) else {
            log::warn!("Skipping unreadable placed object {:?}", token);
            continue;
        };

        let screen = Vec2::new(obj.pos.x, height - obj.pos.y);
        if obj.is_filter() {
            filters.push(obj);
        } else if obj.kind == "ScavengerTreasury" {
            resolved.treasury = Some(screen);
        } else {
            if obj.kind == "ScavengerOutpost" {
                resolved.outpost = Some(screen);
            }
            resolved.objects.push(obj);
        }
    }

    let mut touched = vec![false; resolved.objects.len()];
    for filter in &filters {
        let radius = filter.filter_radius();
        for (obj, touched) in resolved.objects.iter_mut().zip(touched.iter_mut()) {
            if obj.pos.distance(filter.pos) > radius {
                continue;
            }
            if obj.availability.is_empty() {
                obj.availability.extend(ctx.playable.iter().cloned());
            }
            obj.availability.retain(|id| filter.availability.contains(id));
            *touched = true;
        }
    }

    // Objects no filter reached are never removed
    let mut touched = touched.into_iter();
    let selected = ctx.selected.as_deref();
    resolved.objects.retain(|obj| {
        if !touched.next().unwrap_or(false) {
            return true;
        }
        if obj.availability.is_empty() {
            return false;
        }
        match selected {
            Some(id) if obj.remove_by_availability => obj.availability.contains(id),
            _ => true,
        }
    });

    log::debug!(
        "Resolved {} placed objects with {} filters",
        resolved.objects.len(),
        filters.len()
    );
    resolved
}
