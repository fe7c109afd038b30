//! Trip cost aggregation.
//!
//! Everything here works on snapshots that were already loaded; nothing
//! touches the database and nothing can fail. Missing amounts count as zero.

use serde::Serialize;

use crate::models::stop::{JoinedStopActivity, StopWithActivities};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CostCategory {
    Accommodation,
    Transport,
    Activities,
}

impl CostCategory {
    pub const ALL: [CostCategory; 3] = [
        CostCategory::Accommodation,
        CostCategory::Transport,
        CostCategory::Activities,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            CostCategory::Accommodation => "Accommodation",
            CostCategory::Transport => "Transport",
            CostCategory::Activities => "Activities",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct CategoryBreakdown {
    pub accommodation: f64,
    pub transport: f64,
    pub activities: f64,
}

impl CategoryBreakdown {
    pub fn amount(&self, category: CostCategory) -> f64 {
        match category {
            CostCategory::Accommodation => self.accommodation,
            CostCategory::Transport => self.transport,
            CostCategory::Activities => self.activities,
        }
    }

    pub fn total(&self) -> f64 {
        self.accommodation + self.transport + self.activities
    }

    pub fn entries(&self) -> impl Iterator<Item = (CostCategory, f64)> + '_ {
        CostCategory::ALL
            .into_iter()
            .map(|category| (category, self.amount(category)))
    }

    /// Percentage of the total taken by `category`, or 0 when there is no
    /// total to divide by.
    pub fn share(&self, category: CostCategory) -> f64 {
        percentage(self.amount(category), self.total())
    }
}

pub fn percentage(amount: f64, total: f64) -> f64 {
    if total > 0.0 {
        amount / total * 100.0
    } else {
        0.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StopCost {
    pub stop_id: String,
    pub city_name: String,
    pub cost: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Budget {
    pub total_cost: f64,
    pub breakdown: CategoryBreakdown,
    pub per_stop: Vec<StopCost>,
}

impl Budget {
    pub fn per_stop_cost(&self, stop_id: &str) -> Option<f64> {
        self.per_stop
            .iter()
            .find(|entry| entry.stop_id == stop_id)
            .map(|entry| entry.cost)
    }

    pub fn is_empty(&self) -> bool {
        self.per_stop.is_empty()
    }
}

pub fn activities_cost(activities: &[JoinedStopActivity]) -> f64 {
    activities.iter().map(JoinedStopActivity::resolved_cost).sum()
}

/// Cost of one stop: accommodation, transport and every attached activity.
pub fn stop_cost(entry: &StopWithActivities) -> f64 {
    entry.stop.accommodation_cost() + entry.stop.transport_cost() + activities_cost(&entry.activities)
}

/// Folds a trip's stops into its budget. `per_stop` follows `order_index`;
/// stops sharing an index keep their input order.
pub fn compute_budget(stops: &[StopWithActivities]) -> Budget {
    let mut ordered: Vec<&StopWithActivities> = stops.iter().collect();
    ordered.sort_by_key(|entry| entry.stop.order_index);

    let mut breakdown = CategoryBreakdown::default();
    let mut per_stop = Vec::with_capacity(ordered.len());
    for entry in ordered {
        let accommodation = entry.stop.accommodation_cost();
        let transport = entry.stop.transport_cost();
        let activities = activities_cost(&entry.activities);

        breakdown.accommodation += accommodation;
        breakdown.transport += transport;
        breakdown.activities += activities;

        per_stop.push(StopCost {
            stop_id: entry.stop.id.clone(),
            city_name: entry.stop.city_name.clone(),
            cost: accommodation + transport + activities,
        });
    }

    Budget {
        total_cost: breakdown.total(),
        breakdown,
        per_stop,
    }
}
