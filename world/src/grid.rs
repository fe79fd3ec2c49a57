use std::collections::{BTreeSet, HashMap};

use crystal_defence_core::{EntityId, Position};

/// Uniform grid bucketing entity ids by the cell containing their position.
#[derive(Debug)]
pub(crate) struct SpatialGrid {
    cell_size: f64,
    cells: HashMap<(i32, i32), BTreeSet<EntityId>>,
}

impl SpatialGrid {
    pub(crate) fn new(cell_size: f64) -> Self {
        let cell_size = if cell_size.is_finite() && cell_size > 0.0 {
            cell_size
        } else {
            tracing::warn!(cell_size, "invalid grid cell size, using 100");
            100.0
        };
        Self {
            cell_size,
            cells: HashMap::new(),
        }
    }

    pub(crate) fn cell_size(&self) -> f64 {
        self.cell_size
    }

    fn cell_of(&self, position: Position) -> (i32, i32) {
        (
            (position.x / self.cell_size).floor() as i32,
            (position.y / self.cell_size).floor() as i32,
        )
    }

    pub(crate) fn insert(&mut self, id: EntityId, position: Position) {
        let cell = self.cell_of(position);
        let _ = self.cells.entry(cell).or_default().insert(id);
    }

    pub(crate) fn remove(&mut self, id: EntityId, position: Position) {
        let cell = self.cell_of(position);
        if let Some(bucket) = self.cells.get_mut(&cell) {
            let _ = bucket.remove(&id);
            if bucket.is_empty() {
                let _ = self.cells.remove(&cell);
            }
        }
    }

    pub(crate) fn relocate(&mut self, id: EntityId, from: Position, to: Position) {
        if self.cell_of(from) == self.cell_of(to) {
            return;
        }
        self.remove(id, from);
        self.insert(id, to);
    }

    /// Ids in every cell whose box intersects the circle. May contain ids
    /// outside the circle; never misses one inside it.
    pub(crate) fn candidates(&self, center: Position, radius: f64) -> BTreeSet<EntityId> {
        let radius = radius.max(0.0);
        let (min_x, min_y) = self.cell_of(center - Position::splat(radius));
        let (max_x, max_y) = self.cell_of(center + Position::splat(radius));
        let mut found = BTreeSet::new();
        for x in min_x..=max_x {
            for y in min_y..=max_y {
                if !self.cell_intersects((x, y), center, radius) {
                    continue;
                }
                if let Some(bucket) = self.cells.get(&(x, y)) {
                    found.extend(bucket.iter().copied());
                }
            }
        }
        found
    }

    fn cell_intersects(&self, cell: (i32, i32), center: Position, radius: f64) -> bool {
        let min = Position::new(f64::from(cell.0), f64::from(cell.1)) * self.cell_size;
        let max = min + Position::splat(self.cell_size);
        let closest = center.clamp(min, max);
        closest.distance_squared(center) <= radius * radius
    }

    pub(crate) fn clear(&mut self) {
        self.cells.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_coordinates_floor_into_their_own_cells() {
        let mut grid = SpatialGrid::new(100.0);
        grid.insert(EntityId::new(1), Position::new(-1.0, -1.0));
        grid.insert(EntityId::new(2), Position::new(1.0, 1.0));
        assert_eq!(grid.cells.len(), 2);
        assert!(grid.cells.contains_key(&(-1, -1)));
    }

    #[test]
    fn candidates_skip_cells_outside_the_circle() {
        let mut grid = SpatialGrid::new(100.0);
        grid.insert(EntityId::new(1), Position::new(195.0, 195.0));
        grid.insert(EntityId::new(2), Position::new(150.0, 50.0));
        let found = grid.candidates(Position::new(50.0, 50.0), 40.0);
        assert!(found.is_empty());
        let found = grid.candidates(Position::new(50.0, 50.0), 51.0);
        assert_eq!(found.into_iter().collect::<Vec<_>>(), vec![EntityId::new(2)]);
    }

    #[test]
    fn relocation_moves_ids_between_buckets() {
        let mut grid = SpatialGrid::new(50.0);
        let id = EntityId::new(9);
        grid.insert(id, Position::new(10.0, 10.0));
        grid.relocate(id, Position::new(10.0, 10.0), Position::new(260.0, 10.0));
        assert!(grid.candidates(Position::new(10.0, 10.0), 5.0).is_empty());
        assert!(grid
            .candidates(Position::new(260.0, 10.0), 5.0)
            .contains(&id));
    }
}
