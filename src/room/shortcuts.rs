//! # Shortcut Tracing
//!
//! Follows tunnel tiles from a starting cell to the far end of the chain.
//!
//! The walk keeps a committed direction and goes straight while the next cell
//! is a `Normal` tunnel tile. When it can't, the four neighbours are scanned in
//! the fixed order up, right, down, left (skipping the cell just left) and the
//! first tunnel tile wins. Any other shortcut type ends the walk on that cell.

use serde::Serialize;

use super::tile::{Point, ShortcutType, TerrainType, TileGrid};

/// Up, right, down, left. The order decides which branch a fork follows.
pub const DIRECTIONS: [(i32, i32); 4] = [(0, -1), (1, 0), (0, 1), (-1, 0)];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trace {
    pub target: Point,
    /// Cells where the walk changed direction, in walk order
    pub turns: Vec<Point>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Shortcut {
    pub entrance: Point,
    pub target: Point,
    #[serde(rename = "type")]
    pub kind: ShortcutType,
    pub turns: Vec<Point>,
}

impl Shortcut {
    /// Entrance, every turn, then the target.
    pub fn path(&self) -> Vec<Point> {
        let mut path = Vec::with_capacity(self.turns.len() + 2);
        path.push(self.entrance);
        path.extend_from_slice(&self.turns);
        path.push(self.target);
        path
    }
}

pub fn trace_shortcut(grid: &TileGrid, start: Point) -> Trace {
    let mut pos = start;
    let mut last = start;
    let mut dir: Option<usize> = None;
    let mut turns = Vec::new();

    // Straight runs and turns each cost a step; a closed loop of tunnel tiles
    // would otherwise never end.
    let max_steps = grid.len().saturating_mul(4).max(4);
    let mut steps = 0usize;

    'walk: loop {
        steps += 1;
        if steps > max_steps {
            log::warn!(
                "Shortcut trace from ({}, {}) did not terminate, stopping at ({}, {})",
                start.x,
                start.y,
                pos.x,
                pos.y
            );
            break;
        }

        if let Some(d) = dir {
            let next = pos.offset(DIRECTIONS[d]);
            if let Some(tile) = grid.at(next) {
                match tile.shortcut {
                    ShortcutType::Normal => {
                        last = pos;
                        pos = next;
                        continue 'walk;
                    }
                    ShortcutType::None => {}
                    _ => {
                        pos = next;
                        break 'walk;
                    }
                }
            }
        }

        let mut found = false;
        for (d, &delta) in DIRECTIONS.iter().enumerate() {
            let next = pos.offset(delta);
            if next == last {
                continue;
            }
            let Some(tile) = grid.at(next) else {
                continue;
            };

            match tile.shortcut {
                ShortcutType::Normal => {
                    if dir.is_some() {
                        turns.push(pos);
                    }
                    dir = Some(d);
                    found = true;
                    break;
                }
                ShortcutType::None => {}
                _ => {
                    pos = next;
                    break;
                }
            }
        }

        if !found {
            break;
        }
    }

    Trace { target: pos, turns }
}

/// Traces every `ShortcutEntrance` tile and every `RoomExit` tile, both
/// collected in row-major order. Returns the shortcuts and, per exit tile,
/// the entrance-side end of its chain.
pub fn trace_room(grid: &TileGrid) -> (Vec<Shortcut>, Vec<Point>) {
    let mut entrances = Vec::new();
    let mut exits = Vec::new();

    for (p, tile) in grid.iter_rows() {
        if tile.terrain == TerrainType::ShortcutEntrance {
            entrances.push(p);
        }
        if tile.shortcut == ShortcutType::RoomExit {
            exits.push(p);
        }
    }

    let exit_entrances = exits
        .into_iter()
        .map(|exit| trace_shortcut(grid, exit).target)
        .collect();

    let shortcuts = entrances
        .into_iter()
        .map(|entrance| {
            let trace = trace_shortcut(grid, entrance);
            let end = grid.get_clamped(trace.target.x, trace.target.y);

            // A chain ending on a bare tunnel tile is incomplete
            let kind = if end.shortcut == ShortcutType::Normal
                && end.terrain != TerrainType::ShortcutEntrance
            {
                ShortcutType::None
            } else {
                end.shortcut
            };

            Shortcut {
                entrance,
                target: trace.target,
                kind,
                turns: trace.turns,
            }
        })
        .collect();

    (shortcuts, exit_entrances)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::room::tile::Tile;

    fn tunnel() -> Tile {
        Tile {
            shortcut: ShortcutType::Normal,
            ..Tile::default()
        }
    }

    fn entrance() -> Tile {
        Tile {
            terrain: TerrainType::ShortcutEntrance,
            shortcut: ShortcutType::Normal,
            ..Tile::default()
        }
    }

    fn with_shortcut(kind: ShortcutType) -> Tile {
        Tile {
            shortcut: kind,
            ..Tile::default()
        }
    }

    /// Entrance at (0,1), tunnel right to (3,1), down to (3,3), exit at (3,4).
    fn l_shaped() -> TileGrid {
        let mut grid = TileGrid::new(5, 5);
        grid.set(0, 1, entrance());
        for x in 1..=3 {
            grid.set(x, 1, tunnel());
        }
        grid.set(3, 2, tunnel());
        grid.set(3, 3, tunnel());
        grid.set(3, 4, with_shortcut(ShortcutType::RoomExit));
        grid
    }

    #[test]
    fn test_trace_follows_turns_to_exit() {
        let grid = l_shaped();
        let trace = trace_shortcut(&grid, Point::new(0, 1));
        assert_eq!(trace.target, Point::new(3, 4));
        assert_eq!(trace.turns, vec![Point::new(3, 1)]);
    }

    #[test]
    fn test_trace_is_deterministic() {
        let grid = l_shaped();
        let a = trace_shortcut(&grid, Point::new(0, 1));
        let b = trace_shortcut(&grid, Point::new(0, 1));
        assert_eq!(a, b);
    }

    #[test]
    fn test_fork_takes_first_direction_in_scan_order() {
        // Start at (1,1) with tunnels both above and to the right. Up wins.
        let mut grid = TileGrid::new(3, 3);
        grid.set(1, 1, entrance());
        grid.set(1, 0, with_shortcut(ShortcutType::CreatureHole));
        grid.set(2, 1, with_shortcut(ShortcutType::RoomExit));
        let trace = trace_shortcut(&grid, Point::new(1, 1));
        assert_eq!(trace.target, Point::new(1, 0));
    }

    #[test]
    fn test_tunnel_fork_turns_up_before_down() {
        // Entrance at (0,2) runs right to (2,2), which splits up to an exit
        // at (2,0) and down to a creature hole at (2,4).
        let mut grid = TileGrid::new(5, 5);
        grid.set(0, 2, entrance());
        grid.set(1, 2, tunnel());
        grid.set(2, 2, tunnel());
        grid.set(2, 1, tunnel());
        grid.set(2, 0, with_shortcut(ShortcutType::RoomExit));
        grid.set(2, 3, tunnel());
        grid.set(2, 4, with_shortcut(ShortcutType::CreatureHole));

        let trace = trace_shortcut(&grid, Point::new(0, 2));
        assert_eq!(trace.target, Point::new(2, 0));
        assert_eq!(trace.turns, vec![Point::new(2, 2)]);

        let (shortcuts, _) = trace_room(&grid);
        assert_eq!(shortcuts[0].kind, ShortcutType::RoomExit);
        assert_eq!(
            shortcuts[0].path(),
            vec![Point::new(0, 2), Point::new(2, 2), Point::new(2, 0)]
        );
    }

    #[test]
    fn test_tunnel_fork_turns_right_before_left() {
        // Entrance at (2,4) runs up to (2,2), then splits left and right
        let mut grid = TileGrid::new(5, 5);
        grid.set(2, 4, entrance());
        grid.set(2, 3, tunnel());
        grid.set(2, 2, tunnel());
        grid.set(1, 2, tunnel());
        grid.set(0, 2, with_shortcut(ShortcutType::CreatureHole));
        grid.set(3, 2, tunnel());
        grid.set(4, 2, with_shortcut(ShortcutType::RoomExit));

        let trace = trace_shortcut(&grid, Point::new(2, 4));
        assert_eq!(trace.target, Point::new(4, 2));
        assert_eq!(trace.turns, vec![Point::new(2, 2)]);
    }

    #[test]
    fn test_dead_end_reports_last_cell() {
        let mut grid = TileGrid::new(4, 1);
        grid.set(0, 0, entrance());
        grid.set(1, 0, tunnel());
        grid.set(2, 0, tunnel());
        let trace = trace_shortcut(&grid, Point::new(0, 0));
        assert_eq!(trace.target, Point::new(2, 0));
        assert!(trace.turns.is_empty());
    }

    #[test]
    fn test_room_classification() {
        let mut grid = l_shaped();
        // Second, orphaned chain
        grid.set(0, 4, entrance());
        grid.set(1, 4, tunnel());

        let (shortcuts, exits) = trace_room(&grid);
        assert_eq!(shortcuts.len(), 2);

        assert_eq!(shortcuts[0].entrance, Point::new(0, 1));
        assert_eq!(shortcuts[0].kind, ShortcutType::RoomExit);
        assert_eq!(
            shortcuts[0].path(),
            vec![Point::new(0, 1), Point::new(3, 1), Point::new(3, 4)]
        );

        assert_eq!(shortcuts[1].entrance, Point::new(0, 4));
        assert_eq!(shortcuts[1].target, Point::new(1, 4));
        assert_eq!(shortcuts[1].kind, ShortcutType::None);

        assert_eq!(exits, vec![Point::new(0, 1)]);
    }

    #[test]
    fn test_entrance_to_entrance_keeps_normal_type() {
        let mut grid = TileGrid::new(4, 1);
        grid.set(0, 0, entrance());
        grid.set(1, 0, tunnel());
        grid.set(2, 0, tunnel());
        grid.set(3, 0, entrance());

        let (shortcuts, _) = trace_room(&grid);
        assert_eq!(shortcuts[0].target, Point::new(3, 0));
        assert_eq!(shortcuts[0].kind, ShortcutType::Normal);
        assert_eq!(shortcuts[1].target, Point::new(0, 0));
    }

    #[test]
    fn test_tunnel_loop_terminates() {
        let mut grid = TileGrid::new(2, 2);
        for (x, y) in [(0, 0), (1, 0), (0, 1), (1, 1)] {
            grid.set(x, y, tunnel());
        }
        // Only needs to return
        let _ = trace_shortcut(&grid, Point::new(0, 0));
    }
}
