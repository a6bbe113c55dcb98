use serde::Serialize;
use std::collections::HashMap;

// ---------------------------------------------
// SPAWN RESULT RETURNED TO PHYSICS + NET
// ---------------------------------------------
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayerSpawnInfo {
    pub player_id: String,
    pub slot: usize,
    pub position: [f32; 3],
}

// ---------------------------------------------
// STARTING GRID
// ---------------------------------------------
// Two columns, rows going back along +Z. Slots are reused lowest-first so a
// reconnecting player lands near the front.
#[derive(Debug)]
pub struct SpawnGrid {
    pub columns: usize,
    pub column_spacing: f32,   // meters between columns
    pub row_spacing: f32,      // meters between rows
    pub spawn_height: f32,     // chassis drop height
    occupied: HashMap<usize, String>,
}

impl Default for SpawnGrid {
    fn default() -> Self {
        Self::new(2, 5.0, 8.0, 1.3)
    }
}

impl SpawnGrid {
    pub fn new(columns: usize, column_spacing: f32, row_spacing: f32, spawn_height: f32) -> Self {
        Self {
            columns: columns.max(1),
            column_spacing,
            row_spacing,
            spawn_height,
            occupied: HashMap::new(),
        }
    }

    pub fn occupied(&self) -> usize {
        self.occupied.len()
    }

    // ---------------------------------------------------------
    // World position of a slot
    // ---------------------------------------------------------
    pub fn slot_position(&self, slot: usize) -> [f32; 3] {
        let col = slot % self.columns;
        let row = slot / self.columns;
        let half = (self.columns as f32 - 1.0) * 0.5;
        [
            (col as f32 - half) * self.column_spacing,
            self.spawn_height,
            row as f32 * self.row_spacing,
        ]
    }

    // ---------------------------------------------------------
    // Full allocation pipeline called when a player connects
    // ---------------------------------------------------------
    pub fn allocate_spawn(&mut self, player_id: &str) -> PlayerSpawnInfo {
        let slot = (0..).find(|s| !self.occupied.contains_key(s)).unwrap_or(0);
        self.occupied.insert(slot, player_id.to_string());

        PlayerSpawnInfo {
            player_id: player_id.to_string(),
            slot,
            position: self.slot_position(slot),
        }
    }

    pub fn release(&mut self, player_id: &str) -> Option<usize> {
        let slot = self
            .occupied
            .iter()
            .find_map(|(slot, id)| (id == player_id).then_some(*slot))?;
        self.occupied.remove(&slot);
        Some(slot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slots_fill_front_to_back() {
        let mut grid = SpawnGrid::default();
        let a = grid.allocate_spawn("a");
        let b = grid.allocate_spawn("b");
        let c = grid.allocate_spawn("c");
        assert_eq!((a.slot, b.slot, c.slot), (0, 1, 2));
        assert_eq!(a.position, [-2.5, 1.3, 0.0]);
        assert_eq!(b.position, [2.5, 1.3, 0.0]);
        assert_eq!(c.position, [-2.5, 1.3, 8.0]);
    }

    #[test]
    fn released_slot_is_reused() {
        let mut grid = SpawnGrid::default();
        grid.allocate_spawn("a");
        grid.allocate_spawn("b");
        assert_eq!(grid.release("a"), Some(0));
        assert_eq!(grid.release("a"), None);
        assert_eq!(grid.allocate_spawn("c").slot, 0);
        assert_eq!(grid.occupied(), 2);
    }
}
