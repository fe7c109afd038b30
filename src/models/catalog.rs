use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::models::cost::cost_or_zero;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct City {
    pub id: String,
    pub name: String,
    pub country: String,
    pub country_code: Option<String>,
    pub image_url: Option<String>,
    pub cost_index: f64,
    pub popularity: i64,
    pub description: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub created_at: DateTime<Utc>,
}

impl City {
    pub fn has_coordinates(&self) -> bool {
        self.latitude.is_some() && self.longitude.is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Activity {
    pub id: String,
    pub city_id: Option<String>,
    pub name: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub duration_hours: Option<f64>,
    pub estimated_cost: Option<f64>,
    pub image_url: Option<String>,
    pub rating: Option<f64>,
    pub created_at: DateTime<Utc>,
}

impl Activity {
    pub fn estimated_cost(&self) -> f64 {
        cost_or_zero(self.estimated_cost)
    }

    pub fn rating(&self) -> f64 {
        cost_or_zero(self.rating)
    }
}

/// In-memory narrowing of an already fetched catalog, as the explore page
/// does it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ActivityQuery {
    pub city_id: Option<String>,
    pub category: Option<String>,
    pub search: Option<String>,
}

impl ActivityQuery {
    /// The name search only applies while no city is selected.
    pub fn matches(&self, activity: &Activity) -> bool {
        let city_id = non_blank(self.city_id.as_deref());
        let matches_city = city_id
            .map(|id| activity.city_id.as_deref() == Some(id))
            .unwrap_or(true);
        let matches_category = non_blank(self.category.as_deref())
            .filter(|category| *category != "all")
            .map(|category| activity.category.as_deref() == Some(category))
            .unwrap_or(true);
        let matches_search = city_id.is_some()
            || non_blank(self.search.as_deref())
                .map(|needle| contains_ignore_case(&activity.name, needle))
                .unwrap_or(true);
        matches_city && matches_category && matches_search
    }
}

pub fn filter_cities<'a>(cities: &'a [City], query: &str) -> Vec<&'a City> {
    let needle = query.trim();
    cities
        .iter()
        .filter(|city| {
            needle.is_empty()
                || contains_ignore_case(&city.name, needle)
                || contains_ignore_case(&city.country, needle)
        })
        .collect()
}

pub fn filter_activities<'a>(activities: &'a [Activity], query: &ActivityQuery) -> Vec<&'a Activity> {
    activities
        .iter()
        .filter(|activity| query.matches(activity))
        .collect()
}

/// Distinct categories in first-seen order.
pub fn activity_categories(activities: &[Activity]) -> Vec<String> {
    let mut seen: Vec<String> = Vec::new();
    for category in activities.iter().filter_map(|a| a.category.as_deref()) {
        if !category.is_empty() && !seen.iter().any(|c| c == category) {
            seen.push(category.to_string());
        }
    }
    seen
}

pub fn average_rating(activities: &[&Activity]) -> Option<f64> {
    if activities.is_empty() {
        return None;
    }
    let sum: f64 = activities.iter().map(|a| a.rating()).sum();
    Some(sum / activities.len() as f64)
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}
