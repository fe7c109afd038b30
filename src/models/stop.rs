use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::{
    error::AppError,
    models::{catalog::Activity, cost::cost_or_zero},
};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Stop {
    pub id: String,
    pub trip_id: String,
    pub city_id: Option<String>,
    pub city_name: String,
    pub country: Option<String>,
    pub arrival_date: NaiveDate,
    pub departure_date: NaiveDate,
    pub order_index: i64,
    pub notes: Option<String>,
    pub accommodation_cost: Option<f64>,
    pub transport_cost: Option<f64>,
    pub created_at: DateTime<Utc>,
}

impl Stop {
    pub fn new(input: NewStop, order_index: i64) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            trip_id: input.trip_id,
            city_id: input.city_id,
            city_name: input.city_name,
            country: input.country,
            arrival_date: input.arrival_date,
            departure_date: input.departure_date,
            order_index,
            notes: input.notes,
            accommodation_cost: input.accommodation_cost,
            transport_cost: input.transport_cost,
            created_at: Utc::now(),
        }
    }

    pub fn accommodation_cost(&self) -> f64 {
        cost_or_zero(self.accommodation_cost)
    }

    pub fn transport_cost(&self) -> f64 {
        cost_or_zero(self.transport_cost)
    }

    pub fn nights(&self) -> i64 {
        (self.departure_date - self.arrival_date).num_days()
    }

    pub fn apply(&mut self, update: StopUpdate) -> Result<(), AppError> {
        if let Some(city_id) = update.city_id {
            self.city_id = Some(city_id);
        }
        if let Some(city_name) = update.city_name {
            self.city_name = city_name;
        }
        if let Some(country) = update.country {
            self.country = Some(country);
        }
        if let Some(arrival_date) = update.arrival_date {
            self.arrival_date = arrival_date;
        }
        if let Some(departure_date) = update.departure_date {
            self.departure_date = departure_date;
        }
        if let Some(order_index) = update.order_index {
            self.order_index = order_index;
        }
        if let Some(notes) = update.notes {
            self.notes = Some(notes);
        }
        if let Some(cost) = update.accommodation_cost {
            self.accommodation_cost = Some(cost);
        }
        if let Some(cost) = update.transport_cost {
            self.transport_cost = Some(cost);
        }
        validate_stop_fields(&self.city_name, self.arrival_date, self.departure_date)
    }
}

#[derive(Debug, Clone)]
pub struct NewStop {
    pub trip_id: String,
    pub city_id: Option<String>,
    pub city_name: String,
    pub country: Option<String>,
    pub arrival_date: NaiveDate,
    pub departure_date: NaiveDate,
    pub accommodation_cost: Option<f64>,
    pub transport_cost: Option<f64>,
    pub notes: Option<String>,
    pub order_index: Option<i64>,
}

impl NewStop {
    pub fn validate(mut self) -> Result<Self, AppError> {
        self.city_name = self.city_name.trim().to_string();
        validate_stop_fields(&self.city_name, self.arrival_date, self.departure_date)?;
        Ok(self)
    }
}

#[derive(Debug, Clone, Default)]
pub struct StopUpdate {
    pub city_id: Option<String>,
    pub city_name: Option<String>,
    pub country: Option<String>,
    pub arrival_date: Option<NaiveDate>,
    pub departure_date: Option<NaiveDate>,
    pub accommodation_cost: Option<f64>,
    pub transport_cost: Option<f64>,
    pub notes: Option<String>,
    pub order_index: Option<i64>,
}

fn validate_stop_fields(
    city_name: &str,
    arrival: NaiveDate,
    departure: NaiveDate,
) -> Result<(), AppError> {
    if city_name.trim().is_empty() {
        return Err(AppError::validation("city name is required"));
    }
    if departure < arrival {
        return Err(AppError::validation(
            "departure date must not be before arrival date",
        ));
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct StopActivity {
    pub id: String,
    pub stop_id: String,
    pub activity_id: Option<String>,
    pub custom_name: Option<String>,
    pub custom_cost: Option<f64>,
    pub scheduled_date: Option<NaiveDate>,
    pub scheduled_time: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl StopActivity {
    pub fn new(stop_id: impl Into<String>, activity_id: Option<String>, custom_cost: Option<f64>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            stop_id: stop_id.into(),
            activity_id,
            custom_name: None,
            custom_cost,
            scheduled_date: None,
            scheduled_time: None,
            notes: None,
            created_at: Utc::now(),
        }
    }
}

/// A stop activity joined with the catalog row it points at, if that row
/// still exists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinedStopActivity {
    #[serde(flatten)]
    pub stop_activity: StopActivity,
    pub activity: Option<Activity>,
}

impl JoinedStopActivity {
    /// A positive custom cost wins, then the catalog estimate, then zero.
    ///
    /// A custom cost of exactly zero is treated as unset and falls back to
    /// the catalog estimate.
    pub fn resolved_cost(&self) -> f64 {
        let custom = cost_or_zero(self.stop_activity.custom_cost);
        if custom > 0.0 {
            return custom;
        }
        self.activity
            .as_ref()
            .map(Activity::estimated_cost)
            .unwrap_or(0.0)
    }

    pub fn display_name(&self) -> &str {
        self.stop_activity
            .custom_name
            .as_deref()
            .or_else(|| self.activity.as_ref().map(|a| a.name.as_str()))
            .unwrap_or("Custom activity")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StopWithActivities {
    #[serde(flatten)]
    pub stop: Stop,
    pub activities: Vec<JoinedStopActivity>,
}

/// Distributes joined activities onto their stops, keeping stop order and
/// the order activities were resolved in. Activities for unknown stops are
/// dropped.
pub fn attach_activities(
    stops: Vec<Stop>,
    activities: Vec<JoinedStopActivity>,
) -> Vec<StopWithActivities> {
    let mut by_stop: HashMap<String, Vec<JoinedStopActivity>> = HashMap::new();
    for joined in activities {
        by_stop
            .entry(joined.stop_activity.stop_id.clone())
            .or_default()
            .push(joined);
    }
    stops
        .into_iter()
        .map(|stop| {
            let activities = by_stop.remove(&stop.id).unwrap_or_default();
            StopWithActivities { stop, activities }
        })
        .collect()
}
