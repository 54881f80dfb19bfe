//! Capacity calculation for a single truck.
//!
//! Works out, per product row, how many units fit into the selected container
//! using independent per-axis floor division, caps the requested quantities
//! and sums up the occupied volume. When the accepted units exceed the
//! container volume a greedy reduction plan is produced, giving earlier rows
//! priority over later ones.
//!
//! Everything here is a pure function of its inputs.

use serde::Serialize;
use utoipa::ToSchema;

use crate::geometry::axis_count;
use crate::model::{ContainerSpec, ItemId, ProductSpec};
use crate::types::Dimensional;

/// Fit figures for a single product row.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, ToSchema)]
pub struct FitResult {
    /// Theoretical capacity ignoring all other products.
    pub max_fit_count: u64,
    /// `min(requested_quantity, max_fit_count)`
    pub accepted_quantity: u64,
    /// Unit volume times accepted quantity.
    pub occupied_volume: f64,
}

/// A product row together with its computed fit.
#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
pub struct ProductLoad {
    pub product: ProductSpec,
    pub fit: FitResult,
}

/// A suggested quantity reduction for one product.
#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
pub struct Remediation {
    pub product_id: ItemId,
    pub current_quantity: u64,
    pub suggested_quantity: u64,
}

/// Whole-container totals.
#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
pub struct LoadSummary {
    pub total_accepted_quantity: u64,
    pub total_occupied_volume: f64,
    pub container_volume: f64,
    /// Negative when over capacity.
    pub remaining_volume: f64,
    pub over_capacity: bool,
    /// Only present when `over_capacity` is set.
    #[schema(nullable = true)]
    pub remediation: Option<Vec<Remediation>>,
}

impl LoadSummary {
    fn empty(container_volume: f64) -> Self {
        Self {
            total_accepted_quantity: 0,
            total_occupied_volume: 0.0,
            container_volume,
            remaining_volume: container_volume,
            over_capacity: false,
            remediation: None,
        }
    }

    pub fn total_quantity_text(&self) -> String {
        format!("Total Quantity: {}", self.total_accepted_quantity)
    }

    pub fn remaining_space_text(&self) -> String {
        format!("Remaining Area in Truck: {:.2} m³", self.remaining_volume)
    }
}

/// Non-fatal notices raised while computing a load.
#[derive(Clone, Debug, PartialEq)]
pub enum CapacityNotice {
    /// The requested quantity was clamped to the max-fit count.
    CapacityCapped {
        product_id: ItemId,
        requested: u64,
        max_fit: u64,
    },
}

impl CapacityNotice {
    pub fn code(&self) -> &'static str {
        match self {
            CapacityNotice::CapacityCapped { .. } => "capacity_capped",
        }
    }

    pub fn product_id(&self) -> ItemId {
        match self {
            CapacityNotice::CapacityCapped { product_id, .. } => *product_id,
        }
    }
}

impl std::fmt::Display for CapacityNotice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CapacityNotice::CapacityCapped {
                requested, max_fit, ..
            } => write!(
                f,
                "The quantity of {} for this product exceeds truck capacity. Max fit is {}.",
                requested, max_fit
            ),
        }
    }
}

/// Result of a capacity calculation.
#[derive(Clone, Debug, PartialEq)]
pub struct LoadReport {
    pub products: Vec<ProductLoad>,
    pub summary: LoadSummary,
    pub notices: Vec<CapacityNotice>,
}

impl LoadReport {
    /// Returns whether every requested unit was accepted.
    pub fn is_complete(&self) -> bool {
        self.notices.is_empty() && !self.summary.over_capacity
    }

    /// Looks up the fit of a product row by id.
    pub fn fit_for(&self, product_id: ItemId) -> Option<&FitResult> {
        self.products
            .iter()
            .find(|entry| entry.product.id == product_id)
            .map(|entry| &entry.fit)
    }

    /// Human-readable reduction plan, `None` unless over capacity.
    pub fn adjustment_message(&self) -> Option<String> {
        let remediation = self.summary.remediation.as_ref()?;
        let mut message = String::from(
            "Total occupied dimensions exceed truck capacity. Suggested adjustments:\n",
        );
        for suggestion in remediation {
            let Some(entry) = self
                .products
                .iter()
                .find(|entry| entry.product.id == suggestion.product_id)
            else {
                continue;
            };
            let product = &entry.product;
            message.push_str(&format!(
                "- For product (W:{}, H:{}, L:{}), reduce quantity to {} (current: {}).\n",
                product.width.unwrap_or_default(),
                product.height.unwrap_or_default(),
                product.length.unwrap_or_default(),
                suggestion.suggested_quantity,
                suggestion.current_quantity
            ));
        }
        Some(message)
    }
}

/// Max-fit count of a product via independent per-axis floor division.
///
/// Rows with invalid dimensions fit zero times.
///
/// # Examples
/// ```
/// use load_planner::capacity::max_fit_count;
/// use load_planner::model::{ContainerSpec, ProductSpec};
///
/// let truck = ContainerSpec::new(2.13, 2.13, 4.27).unwrap();
/// let product = ProductSpec::new(1, 1.0, 1.0, 1.0, 0);
/// assert_eq!(max_fit_count(&truck, &product), 16);
/// ```
pub fn max_fit_count(container: &ContainerSpec, product: &ProductSpec) -> u64 {
    let Some(dims) = product.valid_dimensions() else {
        return 0;
    };
    let container_dims = container.dimensions();
    let fit_by_length = axis_count(container_dims.x, dims.x) as u64;
    let fit_by_height = axis_count(container_dims.y, dims.y) as u64;
    let fit_by_width = axis_count(container_dims.z, dims.z) as u64;
    fit_by_width
        .saturating_mul(fit_by_height)
        .saturating_mul(fit_by_length)
}

/// Computes the fit of a single product row.
pub fn fit_product(container: &ContainerSpec, product: &ProductSpec) -> FitResult {
    let Some(unit_volume) = product.unit_volume() else {
        return FitResult::default();
    };
    let max_fit_count = max_fit_count(container, product);
    let accepted_quantity = product.requested_quantity.min(max_fit_count);
    FitResult {
        max_fit_count,
        accepted_quantity,
        occupied_volume: unit_volume * accepted_quantity as f64,
    }
}

/// Main entry point: computes per-product fits and the container summary.
///
/// Products are processed in input order; the order matters only for the
/// reduction plan.
///
/// # Parameters
/// * `container` - The selected truck
/// * `products` - Product rows as entered by the user
///
/// # Returns
/// `LoadReport` with per-product fits, totals and capacity notices
pub fn compute_load(container: &ContainerSpec, products: &[ProductSpec]) -> LoadReport {
    let container_volume = container.volume();
    let mut summary = LoadSummary::empty(container_volume);
    let mut notices = Vec::new();
    let mut loads = Vec::with_capacity(products.len());

    for product in products {
        if product.valid_dimensions().is_none() {
            tracing::debug!(product_id = product.id, "skipping product with invalid dimensions");
        }

        let fit = fit_product(container, product);
        if product.requested_quantity > fit.max_fit_count && product.unit_volume().is_some() {
            notices.push(CapacityNotice::CapacityCapped {
                product_id: product.id,
                requested: product.requested_quantity,
                max_fit: fit.max_fit_count,
            });
        }

        summary.total_accepted_quantity = summary
            .total_accepted_quantity
            .saturating_add(fit.accepted_quantity);
        summary.total_occupied_volume += fit.occupied_volume;

        loads.push(ProductLoad {
            product: product.clone(),
            fit,
        });
    }

    summary.remaining_volume = container_volume - summary.total_occupied_volume;
    summary.over_capacity = summary.total_occupied_volume > container_volume;
    if summary.over_capacity {
        summary.remediation = Some(plan_remediation(container_volume, &loads));
    }

    LoadReport {
        products: loads,
        summary,
        notices,
    }
}

/// Greedy first-come-first-served allocation of the container volume.
fn plan_remediation(container_volume: f64, loads: &[ProductLoad]) -> Vec<Remediation> {
    let mut remaining_budget = container_volume;
    let mut plan = Vec::new();

    for entry in loads {
        let Some(unit_volume) = entry.product.unit_volume() else {
            continue;
        };
        let accepted = entry.fit.accepted_quantity;
        // `as` saturates, an exhausted budget allows nothing
        let max_allowed = (remaining_budget / unit_volume).floor().max(0.0) as u64;

        if accepted > max_allowed {
            plan.push(Remediation {
                product_id: entry.product.id,
                current_quantity: accepted,
                suggested_quantity: max_allowed,
            });
            remaining_budget -= unit_volume * max_allowed as f64;
        } else {
            remaining_budget -= unit_volume * accepted as f64;
        }
    }

    plan
}
