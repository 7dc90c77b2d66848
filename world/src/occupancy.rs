//! Dense occupancy grid whose cells can hold several registrations.

use gridsweep_core::{CellCoord, EntityId};
use smallvec::SmallVec;

/// Registrations stored inside a single cell, oldest first.
pub(crate) type CellStack = SmallVec<[EntityId; 2]>;

/// Row-major occupancy grid. The last entry of each stack is the topmost
/// occupant of the cell.
#[derive(Clone, Debug)]
pub(crate) struct OccupancyGrid {
    columns: u32,
    rows: u32,
    cells: Vec<CellStack>,
}

impl OccupancyGrid {
    pub(crate) fn new(columns: u32, rows: u32) -> Self {
        let capacity_u64 = u64::from(columns) * u64::from(rows);
        let capacity = usize::try_from(capacity_u64).unwrap_or(0);
        Self {
            columns,
            rows,
            cells: vec![CellStack::new(); capacity],
        }
    }

    pub(crate) fn occupy(&mut self, entity: EntityId, cell: CellCoord) -> bool {
        let Some(index) = self.index(cell) else {
            return false;
        };
        match self.cells.get_mut(index) {
            Some(stack) => {
                if !stack.contains(&entity) {
                    stack.push(entity);
                }
                true
            }
            None => false,
        }
    }

    pub(crate) fn vacate(&mut self, entity: EntityId, cell: CellCoord) {
        if let Some(index) = self.index(cell) {
            if let Some(stack) = self.cells.get_mut(index) {
                stack.retain(|occupant| *occupant != entity);
            }
        }
    }

    pub(crate) fn top(&self, cell: CellCoord) -> Option<EntityId> {
        self.stack(cell).and_then(|stack| stack.last().copied())
    }

    pub(crate) fn stack(&self, cell: CellCoord) -> Option<&CellStack> {
        self.index(cell).and_then(|index| self.cells.get(index))
    }

    pub(crate) fn index(&self, cell: CellCoord) -> Option<usize> {
        if cell.within(self.columns, self.rows) {
            let row = usize::try_from(cell.row()).ok()?;
            let column = usize::try_from(cell.column()).ok()?;
            let width = usize::try_from(self.columns).ok()?;
            Some(row * width + column)
        } else {
            None
        }
    }

    pub(crate) fn dimensions(&self) -> (u32, u32) {
        (self.columns, self.rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stacked_registrations_report_latest_on_top() {
        let mut grid = OccupancyGrid::new(4, 3);
        let cell = CellCoord::new(2, 1);
        assert!(grid.occupy(EntityId::new(1), cell));
        assert!(grid.occupy(EntityId::new(2), cell));
        assert_eq!(grid.top(cell), Some(EntityId::new(2)));
        assert_eq!(grid.stack(cell).map(|stack| stack.len()), Some(2));

        grid.vacate(EntityId::new(2), cell);
        assert_eq!(grid.top(cell), Some(EntityId::new(1)));
    }

    #[test]
    fn out_of_bounds_cells_are_rejected() {
        let mut grid = OccupancyGrid::new(4, 3);
        assert!(!grid.occupy(EntityId::new(1), CellCoord::new(4, 0)));
        assert!(grid.top(CellCoord::new(4, 0)).is_none());
        assert_eq!(grid.index(CellCoord::new(3, 2)), Some(11));
    }

    #[test]
    fn duplicate_registration_is_collapsed() {
        let mut grid = OccupancyGrid::new(2, 2);
        let cell = CellCoord::new(0, 0);
        assert!(grid.occupy(EntityId::new(5), cell));
        assert!(grid.occupy(EntityId::new(5), cell));
        assert_eq!(grid.stack(cell).map(|stack| stack.len()), Some(1));
    }
}
