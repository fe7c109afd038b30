//! Display rows shared by several pages. Templates only see strings and
//! flags; all formatting happens here.

use chrono::NaiveDate;

use crate::{
    budget::Budget,
    models::{
        cost::format_amount,
        dates::display,
        stop::StopWithActivities,
        trip::Trip,
    },
};

pub fn money(amount: f64, currency: &str) -> String {
    format!("{} {currency}", format_amount(amount))
}

pub fn date_range(start: NaiveDate, end: NaiveDate) -> String {
    format!("{} – {}", display(start), display(end))
}

#[derive(Clone)]
pub struct TripCard {
    pub id: String,
    pub name: String,
    pub dates: String,
    pub days: i64,
    pub status: String,
    pub is_public: bool,
    pub has_budget: bool,
    pub budget: String,
}

impl TripCard {
    pub fn new(trip: &Trip, today: NaiveDate, currency: &str) -> Self {
        Self {
            id: trip.id.clone(),
            name: trip.name.clone(),
            dates: date_range(trip.start_date, trip.end_date),
            days: trip.duration_days(),
            status: trip.status(today).as_str().to_string(),
            is_public: trip.is_public,
            has_budget: trip.budget_hint() > 0.0,
            budget: money(trip.budget_hint(), currency),
        }
    }
}

#[derive(Clone)]
pub struct CategoryRow {
    pub label: String,
    pub amount: String,
    pub share: String,
}

pub fn category_rows(budget: &Budget, currency: &str) -> Vec<CategoryRow> {
    budget
        .breakdown
        .entries()
        .map(|(category, amount)| CategoryRow {
            label: category.label().to_string(),
            amount: money(amount, currency),
            share: format!("{:.0}", budget.breakdown.share(category)),
        })
        .collect()
}

#[derive(Clone)]
pub struct ActivityRow {
    pub id: String,
    pub name: String,
    pub cost: String,
    pub scheduled: String,
}

#[derive(Clone)]
pub struct StopRow {
    pub id: String,
    pub city_name: String,
    pub country: String,
    pub dates: String,
    pub nights: i64,
    pub accommodation: String,
    pub transport: String,
    pub cost: String,
    pub activities: Vec<ActivityRow>,
}

pub fn stop_rows(itinerary: &[StopWithActivities], budget: &Budget, currency: &str) -> Vec<StopRow> {
    itinerary
        .iter()
        .map(|entry| StopRow {
            id: entry.stop.id.clone(),
            city_name: entry.stop.city_name.clone(),
            country: entry.stop.country.clone().unwrap_or_default(),
            dates: date_range(entry.stop.arrival_date, entry.stop.departure_date),
            nights: entry.stop.nights(),
            accommodation: money(entry.stop.accommodation_cost(), currency),
            transport: money(entry.stop.transport_cost(), currency),
            cost: money(budget.per_stop_cost(&entry.stop.id).unwrap_or(0.0), currency),
            activities: entry
                .activities
                .iter()
                .map(|joined| ActivityRow {
                    id: joined.stop_activity.id.clone(),
                    name: joined.display_name().to_string(),
                    cost: money(joined.resolved_cost(), currency),
                    scheduled: joined
                        .stop_activity
                        .scheduled_date
                        .map(display)
                        .unwrap_or_default(),
                })
                .collect(),
        })
        .collect()
}
