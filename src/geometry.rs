//! Geometric helpers for the discrete loading grid.
//!
//! A container is split into a regular grid of cells sized by the current
//! item footprint. Indices run along three axes:
//! - `ix` over the container length (columns)
//! - `iy` over the container height (layers)
//! - `iz` over the container width (rows)
//!
//! World positions are centered on the container on the length and width axes
//! and measured from the container floor on the height axis.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::model::{ContainerSpec, ItemFootprint, ValidationError};
use crate::types::{BoundingBox, Vec3};

/// A discrete grid slot.
///
/// Ordering follows the fill order of the grid: layer first, then row, then column.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema,
)]
pub struct Cell {
    pub iy: usize,
    pub iz: usize,
    pub ix: usize,
}

impl Cell {
    #[inline]
    pub const fn new(ix: usize, iy: usize, iz: usize) -> Self {
        Self { iy, iz, ix }
    }
}

impl std::fmt::Display for Cell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {}, {})", self.ix, self.iy, self.iz)
    }
}

/// Number of cells along each container axis for a given footprint.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, ToSchema)]
pub struct GridDims {
    /// Cells along the container length.
    pub columns: usize,
    /// Cells along the container height.
    pub layers: usize,
    /// Cells along the container width.
    pub rows: usize,
}

impl GridDims {
    /// Upper bound on the number of cells of one grid.
    pub const MAX_CELLS: usize = 1 << 24;

    /// Derives the grid as `floor(containerDim / footprintDim)` per axis.
    ///
    /// Fails when the footprint splits the container into more than
    /// [`GridDims::MAX_CELLS`] cells.
    ///
    /// # Examples
    /// ```
    /// use load_planner::geometry::GridDims;
    /// use load_planner::model::{ContainerSpec, ItemFootprint};
    ///
    /// let container = ContainerSpec::new(2.13, 2.13, 4.27).unwrap();
    /// let dims = GridDims::for_container(&container, &ItemFootprint::UNIT).unwrap();
    /// assert_eq!((dims.columns, dims.layers, dims.rows), (4, 2, 2));
    /// assert_eq!(dims.capacity(), 16);
    /// ```
    pub fn for_container(
        container: &ContainerSpec,
        footprint: &ItemFootprint,
    ) -> Result<Self, ValidationError> {
        let dims = Self {
            columns: axis_count(container.length, footprint.length),
            layers: axis_count(container.height, footprint.height),
            rows: axis_count(container.width, footprint.width),
        };
        match dims.checked_capacity() {
            Some(cells) if cells <= Self::MAX_CELLS => Ok(dims),
            _ => Err(ValidationError::InvalidFootprint(format!(
                "footprint {}x{}x{} splits the container into more than {} cells",
                footprint.length,
                footprint.width,
                footprint.height,
                Self::MAX_CELLS
            ))),
        }
    }

    /// Total number of cells.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.columns
            .saturating_mul(self.layers)
            .saturating_mul(self.rows)
    }

    fn checked_capacity(&self) -> Option<usize> {
        self.columns
            .checked_mul(self.layers)?
            .checked_mul(self.rows)
    }

    /// Checks whether a cell lies inside `[0, columns) x [0, layers) x [0, rows)`.
    #[inline]
    pub fn contains(&self, cell: &Cell) -> bool {
        cell.ix < self.columns && cell.iy < self.layers && cell.iz < self.rows
    }

    /// Position of a cell in fill order, `None` for cells outside the grid.
    pub fn index_of(&self, cell: &Cell) -> Option<usize> {
        if !self.contains(cell) {
            return None;
        }
        cell.iy
            .checked_mul(self.rows)?
            .checked_add(cell.iz)?
            .checked_mul(self.columns)?
            .checked_add(cell.ix)
    }

    /// Closed-form inverse of [`GridDims::index_of`].
    ///
    /// Only equals "the next free cell" while no cell has been released out of order.
    pub fn cell_at(&self, index: usize) -> Option<Cell> {
        let per_layer = self.rows.checked_mul(self.columns)?;
        if per_layer == 0 || index >= self.checked_capacity()? {
            return None;
        }
        let iy = index / per_layer;
        let rest = index % per_layer;
        Some(Cell::new(rest % self.columns, iy, rest / self.columns))
    }

    /// Iterates all cells in fill order.
    pub fn cells(&self) -> impl Iterator<Item = Cell> + '_ {
        (0..self.layers).flat_map(move |iy| {
            (0..self.rows)
                .flat_map(move |iz| (0..self.columns).map(move |ix| Cell::new(ix, iy, iz)))
        })
    }
}

/// Number of whole items along one axis.
///
/// Invalid lengths yield zero instead of an error.
pub fn axis_count(container_len: f64, item_len: f64) -> usize {
    if !(item_len.is_finite() && item_len > 0.0) || !container_len.is_finite() {
        return 0;
    }
    // `as` saturates, negative ratios end up as 0
    (container_len / item_len).floor() as usize
}

/// Converts a cell to its world position.
///
/// `x` and `z` are the footprint center, `y` is the footprint bottom.
pub fn cell_to_world(cell: &Cell, container: &ContainerSpec, footprint: &ItemFootprint) -> Vec3 {
    Vec3::new(
        cell.ix as f64 * footprint.length - container.length / 2.0 + footprint.length / 2.0,
        cell.iy as f64 * footprint.height,
        cell.iz as f64 * footprint.width - container.width / 2.0 + footprint.width / 2.0,
    )
}

/// Maps an arbitrary world position onto the closest cell of the grid.
///
/// Positions outside the container clamp onto the border cells. Returns `None`
/// for an empty grid.
pub fn world_to_cell(
    position: &Vec3,
    dims: &GridDims,
    container: &ContainerSpec,
    footprint: &ItemFootprint,
) -> Option<Cell> {
    if dims.capacity() == 0 {
        return None;
    }
    let ix = nearest_index(
        (position.x + container.length / 2.0 - footprint.length / 2.0) / footprint.length,
        dims.columns,
    );
    let iy = nearest_index(position.y / footprint.height, dims.layers);
    let iz = nearest_index(
        (position.z + container.width / 2.0 - footprint.width / 2.0) / footprint.width,
        dims.rows,
    );
    Some(Cell::new(ix, iy, iz))
}

fn nearest_index(raw: f64, count: usize) -> usize {
    if !raw.is_finite() || raw <= 0.0 {
        return 0;
    }
    (raw.round() as usize).min(count.saturating_sub(1))
}

/// Bounding box of an item placed at `position` (see [`cell_to_world`]).
pub fn item_bounds(position: &Vec3, footprint: &ItemFootprint) -> BoundingBox {
    let min = Vec3::new(
        position.x - footprint.length / 2.0,
        position.y,
        position.z - footprint.width / 2.0,
    );
    BoundingBox::new(
        min,
        min + Vec3::new(footprint.length, footprint.height, footprint.width),
    )
}

/// Checks whether two placed items overlap in space.
///
/// Items sharing only a face do not overlap.
pub fn intersects(
    a_position: &Vec3,
    a_footprint: &ItemFootprint,
    b_position: &Vec3,
    b_footprint: &ItemFootprint,
) -> bool {
    item_bounds(a_position, a_footprint).intersects(&item_bounds(b_position, b_footprint))
}

/// Checks whether a placed item lies completely inside the container volume.
pub fn inside_container(
    position: &Vec3,
    footprint: &ItemFootprint,
    container: &ContainerSpec,
) -> bool {
    let bounds = item_bounds(position, footprint);
    let tolerance = crate::types::EPSILON_GENERAL;
    let shell = BoundingBox::new(
        Vec3::new(
            -container.length / 2.0 - tolerance,
            -tolerance,
            -container.width / 2.0 - tolerance,
        ),
        Vec3::new(
            container.length / 2.0 + tolerance,
            container.height + tolerance,
            container.width / 2.0 + tolerance,
        ),
    );
    shell.contains_point(&bounds.min) && shell.contains_point(&bounds.max)
}
