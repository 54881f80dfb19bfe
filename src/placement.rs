//! Placement of items on the discrete loading grid.
//!
//! The grid owns the selected container, the current uniform footprint and the
//! set of occupied cells. Items are placed in a fixed fill order: a layer is
//! completed before the next one starts, a row before the next row.
//!
//! Callers serialize access; nothing in here is shared between threads.

use std::collections::HashMap;

use serde::Serialize;
use utoipa::ToSchema;

use crate::geometry::{Cell, GridDims, cell_to_world, world_to_cell};
use crate::model::{ContainerSpec, ItemFootprint, ItemId, ValidationError};
use crate::types::{Dimensional, EPSILON_GENERAL, Positioned, Vec3};

/// How a dropped item is snapped back onto the grid.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum SnapMode {
    /// Snap to the next free cell in fill order, regardless of the drop position.
    #[default]
    NextFree,
    /// Snap to the free cell closest to the drop position.
    Nearest,
}

impl SnapMode {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "next-free" | "next_free" | "nextfree" => Some(SnapMode::NextFree),
            "nearest" => Some(SnapMode::Nearest),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SnapMode::NextFree => "next-free",
            SnapMode::Nearest => "nearest",
        }
    }
}

/// Configuration of the placement grid.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct PlacementConfig {
    pub snap_mode: SnapMode,
}

impl PlacementConfig {
    pub fn builder() -> PlacementConfigBuilder {
        PlacementConfigBuilder::default()
    }
}

#[derive(Clone, Debug, Default)]
pub struct PlacementConfigBuilder {
    config: PlacementConfig,
}

impl PlacementConfigBuilder {
    pub fn snap_mode(mut self, mode: SnapMode) -> Self {
        self.config.snap_mode = mode;
        self
    }

    pub fn build(self) -> PlacementConfig {
        self.config
    }
}

/// Errors reported by grid operations.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PlacementError {
    ContainerFull,
    /// Contract violation: the cell was handed out twice.
    DuplicateOccupy(Cell),
    CellOutOfBounds(Cell),
    UnknownItem(ItemId),
    DuplicateItem(ItemId),
}

impl std::fmt::Display for PlacementError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlacementError::ContainerFull => write!(f, "No free cell left in the container"),
            PlacementError::DuplicateOccupy(cell) => write!(f, "Cell {} is already occupied", cell),
            PlacementError::CellOutOfBounds(cell) => {
                write!(f, "Cell {} lies outside the container grid", cell)
            }
            PlacementError::UnknownItem(item) => write!(f, "Item {} is not placed", item),
            PlacementError::DuplicateItem(item) => write!(f, "Item {} is already placed", item),
        }
    }
}

impl std::error::Error for PlacementError {}

/// Reasons why an item received no cell during a reflow.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnplacedReason {
    ContainerFull,
    DuplicateItem,
}

impl UnplacedReason {
    pub fn code(&self) -> &'static str {
        match self {
            UnplacedReason::ContainerFull => "container_full",
            UnplacedReason::DuplicateItem => "duplicate_item",
        }
    }
}

impl std::fmt::Display for UnplacedReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UnplacedReason::ContainerFull => {
                write!(f, "Not enough space for this item in the current container")
            }
            UnplacedReason::DuplicateItem => {
                write!(f, "Item id appears more than once in the placement order")
            }
        }
    }
}

/// What sits in an occupied cell.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Occupant {
    /// `None` for cells reserved through [`PlacementGrid::occupy`].
    pub item: Option<ItemId>,
    /// Footprint in effect when the cell was taken.
    pub footprint: ItemFootprint,
}

/// An item with its cell and world position.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, ToSchema)]
pub struct Placement {
    pub item: ItemId,
    pub cell: Cell,
    pub position: Vec3,
    pub footprint: ItemFootprint,
}

impl Positioned for Placement {
    fn position(&self) -> Vec3 {
        self.position
    }
}

impl Dimensional for Placement {
    fn dimensions(&self) -> Vec3 {
        self.footprint.dimensions()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum PlacementOutcome {
    Placed(Placement),
    Unplaced(UnplacedReason),
}

/// Outcome of a single item during a reflow.
#[derive(Clone, Debug, PartialEq)]
pub struct ReflowEntry {
    pub item: ItemId,
    pub outcome: PlacementOutcome,
}

impl ReflowEntry {
    pub fn placement(&self) -> Option<&Placement> {
        match &self.outcome {
            PlacementOutcome::Placed(placement) => Some(placement),
            PlacementOutcome::Unplaced(_) => None,
        }
    }

    pub fn is_placed(&self) -> bool {
        self.placement().is_some()
    }
}

/// Events emitted during a reflow so a viewer can follow along live.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type")]
pub enum PlacementEvent {
    /// The grid was (re)configured and cleared.
    GridConfigured {
        container: ContainerSpec,
        footprint: ItemFootprint,
        columns: usize,
        layers: usize,
        rows: usize,
        capacity: usize,
    },
    /// An item received a cell.
    ItemPlaced {
        item: ItemId,
        cell: Cell,
        position: Vec3,
    },
    /// An item could not be placed.
    ItemUnplaced {
        item: ItemId,
        reason_code: String,
        reason_text: String,
    },
    /// Reflow finished.
    Finished { placed: usize, unplaced: usize },
}

/// Discrete occupancy model of one container.
#[derive(Clone, Debug)]
pub struct PlacementGrid {
    container: ContainerSpec,
    footprint: ItemFootprint,
    dims: GridDims,
    config: PlacementConfig,
    occupied: HashMap<Cell, Occupant>,
    item_cells: HashMap<ItemId, Cell>,
    order: Vec<ItemId>,
    /// Occupied cells are exactly the first `occupied.len()` cells in fill order.
    compact: bool,
}

impl PlacementGrid {
    pub fn new(
        container: ContainerSpec,
        footprint: ItemFootprint,
    ) -> Result<Self, ValidationError> {
        Self::with_config(container, footprint, PlacementConfig::default())
    }

    pub fn with_config(
        container: ContainerSpec,
        footprint: ItemFootprint,
        config: PlacementConfig,
    ) -> Result<Self, ValidationError> {
        let mut grid = Self {
            container,
            footprint,
            dims: GridDims::default(),
            config,
            occupied: HashMap::new(),
            item_cells: HashMap::new(),
            order: Vec::new(),
            compact: true,
        };
        grid.configure(container, footprint)?;
        Ok(grid)
    }

    /// Replaces container and footprint and clears all placements.
    ///
    /// A footprint that splits the container into too many cells is rejected
    /// and leaves the grid untouched.
    pub fn configure(
        &mut self,
        container: ContainerSpec,
        footprint: ItemFootprint,
    ) -> Result<(), ValidationError> {
        let dims = GridDims::for_container(&container, &footprint)?;
        self.container = container;
        self.footprint = footprint;
        self.dims = dims;
        self.clear();

        if !footprint.fits_in(&container.dimensions(), EPSILON_GENERAL) {
            tracing::warn!(?container, ?footprint, "footprint does not fit into the container");
        }
        tracing::debug!(
            columns = self.dims.columns,
            layers = self.dims.layers,
            rows = self.dims.rows,
            "placement grid configured"
        );
        Ok(())
    }

    pub fn container(&self) -> &ContainerSpec {
        &self.container
    }

    pub fn footprint(&self) -> &ItemFootprint {
        &self.footprint
    }

    pub fn dims(&self) -> GridDims {
        self.dims
    }

    pub fn capacity(&self) -> usize {
        self.dims.capacity()
    }

    pub fn occupied_count(&self) -> usize {
        self.occupied.len()
    }

    /// O(1) check used before any scan.
    #[inline]
    pub fn is_full(&self) -> bool {
        self.capacity() <= self.occupied_count()
    }

    pub fn occupant(&self, cell: &Cell) -> Option<&Occupant> {
        self.occupied.get(cell)
    }

    pub fn cell_of(&self, item: ItemId) -> Option<Cell> {
        self.item_cells.get(&item).copied()
    }

    /// Placed items in insertion order.
    pub fn items(&self) -> &[ItemId] {
        &self.order
    }

    /// World position of a cell for the current container and footprint.
    pub fn world_position(&self, cell: &Cell) -> Vec3 {
        cell_to_world(cell, &self.container, &self.footprint)
    }

    /// Returns the first free cell in fill order, `None` when the grid is full.
    pub fn find_next_free_cell(&self) -> Option<Cell> {
        if self.is_full() {
            return None;
        }
        if self.compact {
            return self.dims.cell_at(self.occupied.len());
        }
        self.dims
            .cells()
            .find(|cell| !self.occupied.contains_key(cell))
    }

    /// Marks a cell as occupied without attaching an item.
    pub fn occupy(&mut self, cell: Cell) -> Result<(), PlacementError> {
        self.insert(cell, None)
    }

    /// Frees a cell. Returns `false` if it was not occupied.
    ///
    /// An item sitting in the cell is removed from the grid entirely.
    pub fn release(&mut self, cell: &Cell) -> bool {
        match self.vacate(cell) {
            Some(occupant) => {
                if let Some(item) = occupant.item {
                    self.order.retain(|placed| *placed != item);
                }
                true
            }
            None => false,
        }
    }

    pub fn clear(&mut self) {
        self.occupied.clear();
        self.item_cells.clear();
        self.order.clear();
        self.compact = true;
    }

    /// Places an item in the next free cell.
    pub fn place_item(&mut self, item: ItemId) -> Result<Placement, PlacementError> {
        if self.item_cells.contains_key(&item) {
            return Err(PlacementError::DuplicateItem(item));
        }
        let cell = self
            .find_next_free_cell()
            .ok_or(PlacementError::ContainerFull)?;
        self.insert(cell, Some(item))?;
        self.order.push(item);
        Ok(self.placement_at(item, cell))
    }

    /// Removes an item, returning the cell it occupied.
    pub fn remove_item(&mut self, item: ItemId) -> Option<Cell> {
        let cell = self.cell_of(item)?;
        self.release(&cell);
        Some(cell)
    }

    pub fn placement(&self, item: ItemId) -> Option<Placement> {
        self.cell_of(item).map(|cell| self.placement_at(item, cell))
    }

    /// All placements in insertion order.
    pub fn placements(&self) -> Vec<Placement> {
        self.order
            .iter()
            .filter_map(|item| self.placement(*item))
            .collect()
    }

    /// Clears the grid and places the given items in order.
    ///
    /// Once the grid is full every remaining item is reported as unplaced;
    /// the batch itself never aborts. A repeated id is reported as a duplicate
    /// even when the grid is already full.
    pub fn reflow(&mut self, ordered_items: &[ItemId]) -> Vec<ReflowEntry> {
        self.reflow_with_progress(ordered_items, |_| {})
    }

    /// Like [`PlacementGrid::reflow`], calling `on_event` for every step.
    pub fn reflow_with_progress(
        &mut self,
        ordered_items: &[ItemId],
        mut on_event: impl FnMut(&PlacementEvent),
    ) -> Vec<ReflowEntry> {
        self.clear();
        on_event(&PlacementEvent::GridConfigured {
            container: self.container,
            footprint: self.footprint,
            columns: self.dims.columns,
            layers: self.dims.layers,
            rows: self.dims.rows,
            capacity: self.capacity(),
        });

        let mut entries = Vec::with_capacity(ordered_items.len());
        let mut unplaced = 0;

        for &item in ordered_items {
            let outcome = match self.place_item(item) {
                Ok(placement) => {
                    on_event(&PlacementEvent::ItemPlaced {
                        item,
                        cell: placement.cell,
                        position: placement.position,
                    });
                    PlacementOutcome::Placed(placement)
                }
                Err(err) => {
                    let reason = match err {
                        PlacementError::DuplicateItem(_) => UnplacedReason::DuplicateItem,
                        _ => UnplacedReason::ContainerFull,
                    };
                    unplaced += 1;
                    on_event(&PlacementEvent::ItemUnplaced {
                        item,
                        reason_code: reason.code().to_string(),
                        reason_text: reason.to_string(),
                    });
                    PlacementOutcome::Unplaced(reason)
                }
            };
            entries.push(ReflowEntry { item, outcome });
        }

        if unplaced > 0 {
            tracing::warn!(
                unplaced,
                capacity = self.capacity(),
                "not enough space for all items in the current container"
            );
        }
        on_event(&PlacementEvent::Finished {
            placed: entries.len() - unplaced,
            unplaced,
        });
        entries
    }

    /// Switches to another container and re-places all items in insertion order.
    pub fn resize(
        &mut self,
        container: ContainerSpec,
    ) -> Result<Vec<ReflowEntry>, ValidationError> {
        let items = self.order.clone();
        self.configure(container, self.footprint)?;
        Ok(self.reflow(&items))
    }

    /// Switches to another footprint and re-places all items in insertion order.
    pub fn set_footprint(
        &mut self,
        footprint: ItemFootprint,
    ) -> Result<Vec<ReflowEntry>, ValidationError> {
        let items = self.order.clone();
        self.configure(self.container, footprint)?;
        Ok(self.reflow(&items))
    }

    /// Picks the cell a dropped item snaps to.
    ///
    /// With [`SnapMode::NextFree`] the drop position is ignored and the next
    /// free cell in fill order is returned.
    pub fn find_nearest_free_cell_to(&self, position: &Vec3) -> Option<Cell> {
        match self.config.snap_mode {
            SnapMode::NextFree => self.find_next_free_cell(),
            SnapMode::Nearest => self.closest_free_cell(position),
        }
    }

    /// Moves an item to the cell it snaps to after being dropped at `position`.
    ///
    /// The item's previous cell is freed first, so it may snap right back.
    pub fn drop_item(
        &mut self,
        item: ItemId,
        position: &Vec3,
    ) -> Result<Placement, PlacementError> {
        let previous = self
            .cell_of(item)
            .ok_or(PlacementError::UnknownItem(item))?;
        self.vacate(&previous);

        let cell = self.find_nearest_free_cell_to(position).unwrap_or(previous);
        self.insert(cell, Some(item))?;
        tracing::debug!(item, from = %previous, to = %cell, "dropped item snapped");
        Ok(self.placement_at(item, cell))
    }

    fn closest_free_cell(&self, position: &Vec3) -> Option<Cell> {
        if self.is_full() {
            return None;
        }
        let estimate = world_to_cell(position, &self.dims, &self.container, &self.footprint)?;
        if !self.occupied.contains_key(&estimate) {
            return Some(estimate);
        }

        let mut best: Option<(f64, Cell)> = None;
        for cell in self.dims.cells() {
            if self.occupied.contains_key(&cell) {
                continue;
            }
            let distance = self.world_position(&cell).distance_squared(position);
            match best {
                Some((best_distance, _)) if distance >= best_distance => {}
                _ => best = Some((distance, cell)),
            }
        }
        best.map(|(_, cell)| cell)
    }

    fn placement_at(&self, item: ItemId, cell: Cell) -> Placement {
        let footprint = self
            .occupied
            .get(&cell)
            .map(|occupant| occupant.footprint)
            .unwrap_or(self.footprint);
        Placement {
            item,
            cell,
            position: cell_to_world(&cell, &self.container, &footprint),
            footprint,
        }
    }

    fn insert(&mut self, cell: Cell, item: Option<ItemId>) -> Result<(), PlacementError> {
        if !self.dims.contains(&cell) {
            return Err(PlacementError::CellOutOfBounds(cell));
        }
        if self.occupied.contains_key(&cell) {
            tracing::error!(%cell, ?item, "attempt to occupy an already occupied cell");
            return Err(PlacementError::DuplicateOccupy(cell));
        }

        if self.compact && self.dims.index_of(&cell) != Some(self.occupied.len()) {
            self.compact = false;
        }
        self.occupied.insert(
            cell,
            Occupant {
                item,
                footprint: self.footprint,
            },
        );
        if let Some(item) = item {
            self.item_cells.insert(item, cell);
        }
        Ok(())
    }

    /// Removes the occupant of a cell, leaving the insertion order untouched.
    fn vacate(&mut self, cell: &Cell) -> Option<Occupant> {
        if !self.occupied.contains_key(cell) {
            return None;
        }
        let is_last =
            self.dims.index_of(cell).map(|index| index + 1) == Some(self.occupied.len());
        if self.compact && !is_last {
            self.compact = false;
        }
        let occupant = self.occupied.remove(cell)?;
        if let Some(item) = occupant.item {
            self.item_cells.remove(&item);
        }
        Some(occupant)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{inside_container, intersects};

    fn cube(side: f64) -> ContainerSpec {
        ContainerSpec::new(side, side, side).unwrap()
    }

    fn unit_grid(side: f64) -> PlacementGrid {
        PlacementGrid::new(cube(side), ItemFootprint::UNIT).unwrap()
    }

    fn assert_no_overlap(grid: &PlacementGrid) {
        let placements = grid.placements();
        for (i, a) in placements.iter().enumerate() {
            assert!(inside_container(&a.position, &a.footprint, grid.container()));
            for b in &placements[i + 1..] {
                assert_ne!(a.cell, b.cell);
                assert!(
                    !intersects(&a.position, &a.footprint, &b.position, &b.footprint),
                    "items {} and {} overlap",
                    a.item,
                    b.item
                );
            }
        }
    }

    #[test]
    fn eight_cells_in_a_two_meter_cube() {
        let mut grid = unit_grid(2.0);
        assert_eq!(grid.capacity(), 8);

        let mut seen = Vec::new();
        for _ in 0..8 {
            let cell = grid.find_next_free_cell().expect("grid should not be full yet");
            assert!(!seen.contains(&cell));
            grid.occupy(cell).unwrap();
            seen.push(cell);
        }

        assert!(grid.is_full());
        assert_eq!(grid.find_next_free_cell(), None);
        assert_eq!(grid.occupied_count(), 8);
    }

    #[test]
    fn fills_layer_before_next_layer() {
        let mut grid = PlacementGrid::new(
            ContainerSpec::new(2.0, 2.0, 3.0).unwrap(),
            ItemFootprint::UNIT,
        )
        .unwrap();
        let cells: Vec<Cell> = (0..12)
            .map(|item| grid.place_item(item).unwrap().cell)
            .collect();

        assert_eq!(cells[0], Cell::new(0, 0, 0));
        assert_eq!(cells[2], Cell::new(2, 0, 0));
        assert_eq!(cells[3], Cell::new(0, 0, 1));
        assert_eq!(cells[5], Cell::new(2, 0, 1));
        assert_eq!(cells[6], Cell::new(0, 1, 0));
        assert_eq!(cells[11], Cell::new(2, 1, 1));
        assert_eq!(grid.place_item(12), Err(PlacementError::ContainerFull));
    }

    #[test]
    fn first_item_sits_in_the_back_corner_on_the_floor() {
        let mut grid = PlacementGrid::new(
            ContainerSpec::new(2.13, 2.13, 4.27).unwrap(),
            ItemFootprint::UNIT,
        )
        .unwrap();
        let placement = grid.place_item(1).unwrap();
        assert!((placement.position.x - (-4.27 / 2.0 + 0.5)).abs() < EPSILON_GENERAL);
        assert_eq!(placement.position.y, 0.0);
        assert!((placement.position.z - (-2.13 / 2.0 + 0.5)).abs() < EPSILON_GENERAL);
        assert_eq!(placement.position(), placement.position);
        assert_eq!(placement.volume(), 1.0);
    }

    #[test]
    fn duplicate_occupy_leaves_state_untouched() {
        let mut grid = unit_grid(2.0);
        let cell = Cell::new(1, 1, 1);
        grid.occupy(cell).unwrap();

        assert_eq!(grid.occupy(cell), Err(PlacementError::DuplicateOccupy(cell)));
        assert_eq!(grid.occupied_count(), 1);
        assert_eq!(grid.occupant(&cell).unwrap().item, None);
    }

    #[test]
    fn occupy_rejects_cells_outside_the_grid() {
        let mut grid = unit_grid(2.0);
        let cell = Cell::new(2, 0, 0);
        assert_eq!(grid.occupy(cell), Err(PlacementError::CellOutOfBounds(cell)));
        assert_eq!(grid.occupied_count(), 0);
    }

    #[test]
    fn release_is_a_noop_for_free_cells() {
        let mut grid = unit_grid(2.0);
        assert!(!grid.release(&Cell::new(0, 0, 0)));

        grid.place_item(7).unwrap();
        assert!(grid.release(&Cell::new(0, 0, 0)));
        assert!(grid.items().is_empty());
        assert_eq!(grid.cell_of(7), None);
        assert_eq!(grid.occupied_count(), 0);
    }

    #[test]
    fn released_gap_is_filled_first() {
        let mut grid = unit_grid(2.0);
        for item in 0..4 {
            grid.place_item(item).unwrap();
        }
        assert_eq!(grid.remove_item(1), Some(Cell::new(1, 0, 0)));
        assert_eq!(grid.remove_item(1), None);

        let refill = grid.place_item(10).unwrap();
        assert_eq!(refill.cell, Cell::new(1, 0, 0));
        let next = grid.place_item(11).unwrap();
        assert_eq!(next.cell, Cell::new(0, 1, 0));
        assert_eq!(grid.items(), &[0, 2, 3, 10, 11]);
        assert_no_overlap(&grid);
    }

    #[test]
    fn compact_fast_path_matches_full_scan() {
        let container = ContainerSpec::new(2.13, 2.13, 4.27).unwrap();
        let footprint = ItemFootprint::new(0.5, 0.3, 1.0).unwrap();
        let mut fast = PlacementGrid::new(container, footprint).unwrap();
        let mut slow = PlacementGrid::new(container, footprint).unwrap();
        slow.compact = false;

        for item in 0..200 {
            // drop every seventh item again to punch gaps into the fill order
            if item % 7 == 6 {
                let victim = fast.items()[fast.items().len() / 2];
                assert_eq!(fast.remove_item(victim), slow.remove_item(victim));
            }
            assert_eq!(fast.find_next_free_cell(), slow.find_next_free_cell());
            assert_eq!(fast.place_item(item).ok(), slow.place_item(item).ok());
        }
        assert_no_overlap(&fast);
    }

    #[test]
    fn removing_the_last_cell_keeps_the_grid_compact() {
        let mut grid = unit_grid(2.0);
        grid.place_item(0).unwrap();
        grid.place_item(1).unwrap();
        grid.remove_item(1);
        assert!(grid.compact);
        grid.remove_item(0);
        assert!(grid.compact);

        grid.place_item(2).unwrap();
        grid.place_item(3).unwrap();
        grid.remove_item(2);
        assert!(!grid.compact);
        assert_eq!(grid.find_next_free_cell(), Some(Cell::new(0, 0, 0)));
    }

    #[test]
    fn reflow_marks_overflow_as_unplaced() {
        let mut grid = unit_grid(2.0);
        let items: Vec<ItemId> = (100..110).collect();
        let entries = grid.reflow(&items);

        assert_eq!(entries.len(), 10);
        assert!(entries[..8].iter().all(ReflowEntry::is_placed));
        for entry in &entries[8..] {
            assert_eq!(
                entry.outcome,
                PlacementOutcome::Unplaced(UnplacedReason::ContainerFull)
            );
        }
        assert_eq!(grid.items(), &items[..8]);
        assert_no_overlap(&grid);
    }

    #[test]
    fn reflow_rejects_repeated_ids() {
        let mut grid = unit_grid(2.0);
        let entries = grid.reflow(&[1, 2, 1, 3]);
        assert_eq!(
            entries[2].outcome,
            PlacementOutcome::Unplaced(UnplacedReason::DuplicateItem)
        );
        assert_eq!(entries[3].placement().unwrap().cell, Cell::new(0, 0, 1));
        assert_eq!(grid.occupied_count(), 3);
    }

    #[test]
    fn repeated_id_in_a_full_grid_is_reported_as_duplicate() {
        let mut grid = unit_grid(1.0);
        let entries = grid.reflow(&[1, 2, 1]);
        assert_eq!(
            entries[1].outcome,
            PlacementOutcome::Unplaced(UnplacedReason::ContainerFull)
        );
        assert_eq!(
            entries[2].outcome,
            PlacementOutcome::Unplaced(UnplacedReason::DuplicateItem)
        );
    }

    #[test]
    fn reflow_is_deterministic() {
        let container = ContainerSpec::new(2.29, 2.13, 5.18).unwrap();
        let footprint = ItemFootprint::new(0.5, 0.5, 0.5).unwrap();
        let mut sequential = PlacementGrid::new(container, footprint).unwrap();
        let items: Vec<ItemId> = (0..60).collect();
        let expected: Vec<Placement> = items
            .iter()
            .map(|item| sequential.place_item(*item).unwrap())
            .collect();

        let mut reflowed = sequential.clone();
        reflowed.configure(container, footprint).unwrap();
        let entries = reflowed.reflow(&items);
        let actual: Vec<Placement> = entries
            .iter()
            .filter_map(|entry| entry.placement().copied())
            .collect();
        assert_eq!(actual, expected);
        assert_eq!(reflowed.reflow(&items), entries);
    }

    #[test]
    fn reflow_reports_progress_events() {
        let mut grid = unit_grid(1.0);
        let mut events = Vec::new();
        grid.reflow_with_progress(&[5, 6], |event| events.push(event.clone()));

        assert_eq!(events.len(), 4);
        assert!(matches!(events[0], PlacementEvent::GridConfigured { capacity: 1, .. }));
        assert!(matches!(events[1], PlacementEvent::ItemPlaced { item: 5, .. }));
        match &events[2] {
            PlacementEvent::ItemUnplaced {
                item, reason_code, ..
            } => {
                assert_eq!(*item, 6);
                assert_eq!(reason_code, "container_full");
            }
            other => panic!("unexpected event {:?}", other),
        }
        assert!(matches!(
            events[3],
            PlacementEvent::Finished {
                placed: 1,
                unplaced: 1
            }
        ));
    }

    #[test]
    fn resize_reflows_in_insertion_order() {
        let mut grid = PlacementGrid::new(
            ContainerSpec::new(2.13, 2.13, 4.27).unwrap(),
            ItemFootprint::UNIT,
        )
        .unwrap();
        for item in [30, 10, 20] {
            grid.place_item(item).unwrap();
        }
        grid.remove_item(10);
        grid.place_item(40).unwrap();

        let entries = grid
            .resize(ContainerSpec::new(2.44, 2.13, 9.75).unwrap())
            .unwrap();
        let order: Vec<ItemId> = entries.iter().map(|entry| entry.item).collect();
        assert_eq!(order, vec![30, 20, 40]);
        assert_eq!(grid.dims().columns, 9);
        assert_eq!(grid.placement(40).unwrap().cell, Cell::new(2, 0, 0));
        assert_no_overlap(&grid);
    }

    #[test]
    fn shrinking_the_container_leaves_overflow_unplaced() {
        let mut grid = PlacementGrid::new(
            ContainerSpec::new(2.44, 2.13, 9.75).unwrap(),
            ItemFootprint::UNIT,
        )
        .unwrap();
        for item in 0..30 {
            grid.place_item(item).unwrap();
        }

        let entries = grid
            .resize(ContainerSpec::new(2.13, 2.13, 4.27).unwrap())
            .unwrap();
        assert_eq!(entries.iter().filter(|entry| entry.is_placed()).count(), 16);
        assert!(entries[16..].iter().all(|entry| !entry.is_placed()));
        assert_eq!(grid.occupied_count(), 16);
    }

    #[test]
    fn set_footprint_regrids_the_container() {
        let mut grid = unit_grid(2.0);
        grid.place_item(1).unwrap();
        grid.place_item(2).unwrap();

        let entries = grid
            .set_footprint(ItemFootprint::new(0.5, 0.5, 0.5).unwrap())
            .unwrap();
        assert_eq!(grid.capacity(), 64);
        assert!(entries.iter().all(ReflowEntry::is_placed));
        assert_eq!(grid.placement(2).unwrap().cell, Cell::new(1, 0, 0));
        assert_eq!(grid.placement(2).unwrap().footprint.length, 0.5);
    }

    #[test]
    fn configure_clears_everything() {
        let mut grid = unit_grid(2.0);
        grid.place_item(1).unwrap();
        grid.occupy(Cell::new(1, 1, 1)).unwrap();

        grid.configure(cube(3.0), ItemFootprint::UNIT).unwrap();
        assert_eq!(grid.occupied_count(), 0);
        assert!(grid.items().is_empty());
        assert_eq!(grid.capacity(), 27);
    }

    #[test]
    fn oversized_footprint_has_no_cells() {
        let footprint = ItemFootprint::new(2.0, 2.0, 2.0).unwrap();
        let mut grid = PlacementGrid::new(cube(1.0), footprint).unwrap();
        assert_eq!(grid.capacity(), 0);
        assert!(grid.is_full());
        assert_eq!(grid.find_next_free_cell(), None);
        assert_eq!(grid.place_item(1), Err(PlacementError::ContainerFull));
        assert_eq!(grid.find_nearest_free_cell_to(&Vec3::zero()), None);
    }

    #[test]
    fn microscopic_footprint_is_rejected() {
        let truck = ContainerSpec::new(2.13, 2.13, 4.27).unwrap();
        let footprint = ItemFootprint::new(1e-10, 1e-10, 1e-10).unwrap();
        assert!(matches!(
            PlacementGrid::new(truck, footprint),
            Err(ValidationError::InvalidFootprint(_))
        ));

        let mut grid = unit_grid(2.0);
        grid.place_item(1).unwrap();
        assert!(grid.set_footprint(footprint).is_err());
        assert!(grid.configure(truck, footprint).is_err());
        assert_eq!(grid.capacity(), 8);
        assert_eq!(grid.footprint(), &ItemFootprint::UNIT);
        assert_eq!(grid.cell_of(1), Some(Cell::new(0, 0, 0)));
        assert_eq!(grid.reflow(&[1, 2])[1].placement().unwrap().cell, Cell::new(1, 0, 0));
    }

    #[test]
    fn drop_snaps_to_next_free_cell_by_default() {
        let mut grid = unit_grid(2.0);
        for item in 0..3 {
            grid.place_item(item).unwrap();
        }

        let far_corner = grid.world_position(&Cell::new(1, 1, 1));
        let dropped = grid.drop_item(2, &far_corner).unwrap();
        assert_eq!(dropped.cell, Cell::new(0, 0, 1));
        assert_eq!(grid.occupied_count(), 3);

        let dropped = grid.drop_item(0, &far_corner).unwrap();
        assert_eq!(dropped.cell, Cell::new(0, 0, 0));
        assert_eq!(grid.items(), &[0, 1, 2]);
        assert_no_overlap(&grid);
    }

    #[test]
    fn nearest_snap_uses_drop_position() {
        let config = PlacementConfig::builder()
            .snap_mode(SnapMode::Nearest)
            .build();
        let mut grid =
            PlacementGrid::with_config(cube(2.0), ItemFootprint::UNIT, config).unwrap();
        for item in 0..3 {
            grid.place_item(item).unwrap();
        }

        let far_corner = grid.world_position(&Cell::new(1, 1, 1));
        let beside_corner = Vec3::new(far_corner.x + 0.2, far_corner.y, far_corner.z);
        let dropped = grid.drop_item(0, &beside_corner).unwrap();
        assert_eq!(dropped.cell, Cell::new(1, 1, 1));

        // the estimated cell is taken, so the closest free neighbour wins
        let taken = grid.world_position(&Cell::new(1, 0, 0));
        let dropped = grid.drop_item(2, &taken).unwrap();
        assert_eq!(dropped.cell, Cell::new(0, 0, 0));
        assert_no_overlap(&grid);
    }

    #[test]
    fn drop_of_unknown_item_fails() {
        let mut grid = unit_grid(2.0);
        assert_eq!(
            grid.drop_item(9, &Vec3::zero()),
            Err(PlacementError::UnknownItem(9))
        );
    }

    #[test]
    fn snap_mode_parsing() {
        assert_eq!(SnapMode::parse("Nearest"), Some(SnapMode::Nearest));
        assert_eq!(SnapMode::parse(" next-free "), Some(SnapMode::NextFree));
        assert_eq!(SnapMode::parse("next_free"), Some(SnapMode::NextFree));
        assert_eq!(SnapMode::parse("closest"), None);
        assert_eq!(SnapMode::default().as_str(), "next-free");
    }

    #[test]
    fn errors_render_readable_messages() {
        assert_eq!(
            PlacementError::DuplicateOccupy(Cell::new(1, 2, 3)).to_string(),
            "Cell (1, 2, 3) is already occupied"
        );
        assert_eq!(UnplacedReason::DuplicateItem.code(), "duplicate_item");
    }
}
