//! Price-change detection over the full observation history.
//!
//! Each product's state is the pair of its two highest-id observations,
//! built by folding observations one at a time. The report lists every
//! product whose latest price differs from the previous one, cheapest
//! movement first.

use std::collections::HashMap;

use tracing::{debug, info};

use crate::model::{Observation, PriceChange, Report};

/// The two most recent observations of one product.
#[derive(Debug, Clone, Copy)]
pub struct ProductState<'a> {
    pub latest: &'a Observation,
    pub previous: Option<&'a Observation>,
}

impl<'a> ProductState<'a> {
    pub fn new(first: &'a Observation) -> Self {
        ProductState {
            latest: first,
            previous: None,
        }
    }

    /// Fold one more observation of the same product into the state.
    pub fn observe(self, obs: &'a Observation) -> Self {
        if obs.id > self.latest.id {
            ProductState {
                latest: obs,
                previous: Some(self.latest),
            }
        } else if obs.id < self.latest.id && self.previous.map_or(true, |p| obs.id > p.id) {
            ProductState {
                latest: self.latest,
                previous: Some(obs),
            }
        } else {
            self
        }
    }

    /// `None` with a single observation or an unchanged price.
    pub fn change(&self) -> Option<PriceChange> {
        let previous = self.previous?;
        let price_difference = self.latest.price - previous.price;
        if price_difference.is_zero() {
            return None;
        }
        Some(PriceChange {
            name: self.latest.name.clone(),
            price_difference,
            detail_url: self.latest.detail_url.clone(),
        })
    }
}

/// Build the price-change report for a set of observations.
///
/// Input order does not matter: products are visited newest-first by their
/// latest id before the stable sort on the difference, so ties always come
/// out in the same order.
pub fn compute_changes(observations: &[Observation]) -> Report {
    if observations.len() < 2 {
        info!(
            observations = observations.len(),
            "Not enough data to calculate differences"
        );
        return Report::empty();
    }

    let mut states: HashMap<&str, ProductState<'_>> = HashMap::new();
    for obs in observations {
        states
            .entry(obs.name.as_str())
            .and_modify(|s| *s = s.observe(obs))
            .or_insert_with(|| ProductState::new(obs));
    }

    let mut products: Vec<ProductState<'_>> = states.into_values().collect();
    products.sort_by(|a, b| b.latest.id.cmp(&a.latest.id));

    let mut skipped = 0usize;
    let mut changes = Vec::new();
    for state in &products {
        if state.previous.is_none() {
            debug!(product = %state.latest.name, "single observation, nothing to compare");
            skipped += 1;
            continue;
        }
        if let Some(change) = state.change() {
            changes.push(change);
        }
    }
    if skipped > 0 {
        info!(skipped, "Products without a previous observation");
    }

    changes.sort_by(|a, b| a.price_difference.cmp(&b.price_difference));
    Report(changes)
}
