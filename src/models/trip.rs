use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::{error::AppError, models::cost::cost_or_zero};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Trip {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub description: Option<String>,
    pub cover_image: Option<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub is_public: bool,
    pub total_budget: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Trip {
    pub fn new(user_id: impl Into<String>, input: NewTrip) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            name: input.name,
            description: input.description,
            cover_image: input.cover_image,
            start_date: input.start_date,
            end_date: input.end_date,
            is_public: input.is_public,
            total_budget: input.total_budget,
            created_at: now,
            updated_at: now,
        }
    }

    /// Number of calendar days covered, both ends included.
    pub fn duration_days(&self) -> i64 {
        (self.end_date - self.start_date).num_days() + 1
    }

    pub fn budget_hint(&self) -> f64 {
        cost_or_zero(self.total_budget)
    }

    pub fn status(&self, today: NaiveDate) -> TripStatus {
        TripStatus::of(self, today)
    }

    pub fn is_owned_by(&self, user_id: &str) -> bool {
        self.user_id == user_id
    }

    pub fn span(&self) -> TripSpan {
        TripSpan {
            id: self.id.clone(),
            name: self.name.clone(),
            start_date: self.start_date.to_string(),
            end_date: self.end_date.to_string(),
        }
    }

    pub fn apply(&mut self, update: TripUpdate) -> Result<(), AppError> {
        if let Some(name) = update.name {
            self.name = name;
        }
        if let Some(description) = update.description {
            self.description = Some(description);
        }
        if let Some(cover_image) = update.cover_image {
            self.cover_image = Some(cover_image);
        }
        if let Some(start_date) = update.start_date {
            self.start_date = start_date;
        }
        if let Some(end_date) = update.end_date {
            self.end_date = end_date;
        }
        if let Some(is_public) = update.is_public {
            self.is_public = is_public;
        }
        if let Some(total_budget) = update.total_budget {
            self.total_budget = Some(total_budget);
        }
        validate_trip_fields(&self.name, self.start_date, self.end_date)?;
        self.updated_at = Utc::now();
        Ok(())
    }
}

/// Light projection used by the calendar. Dates stay as stored so the
/// calendar can reject rows it cannot read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct TripSpan {
    pub id: String,
    pub name: String,
    pub start_date: String,
    pub end_date: String,
}

#[derive(Debug, Clone)]
pub struct NewTrip {
    pub name: String,
    pub description: Option<String>,
    pub cover_image: Option<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub is_public: bool,
    pub total_budget: Option<f64>,
}

impl NewTrip {
    pub fn validate(mut self) -> Result<Self, AppError> {
        self.name = self.name.trim().to_string();
        validate_trip_fields(&self.name, self.start_date, self.end_date)?;
        Ok(self)
    }
}

#[derive(Debug, Clone, Default)]
pub struct TripUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub cover_image: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub is_public: Option<bool>,
    pub total_budget: Option<f64>,
}

fn validate_trip_fields(name: &str, start: NaiveDate, end: NaiveDate) -> Result<(), AppError> {
    if name.trim().is_empty() {
        return Err(AppError::validation("trip name is required"));
    }
    if end < start {
        return Err(AppError::validation("end date must not be before start date"));
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TripStatus {
    Upcoming,
    Past,
}

impl TripStatus {
    /// A trip counts as upcoming until its last day has gone by.
    pub fn of(trip: &Trip, today: NaiveDate) -> Self {
        if trip.end_date >= today {
            TripStatus::Upcoming
        } else {
            TripStatus::Past
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TripStatus::Upcoming => "upcoming",
            TripStatus::Past => "past",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TripStatusFilter {
    #[default]
    All,
    Upcoming,
    Past,
}

impl TripStatusFilter {
    pub fn matches(&self, trip: &Trip, today: NaiveDate) -> bool {
        match self {
            TripStatusFilter::All => true,
            TripStatusFilter::Upcoming => trip.status(today) == TripStatus::Upcoming,
            TripStatusFilter::Past => trip.status(today) == TripStatus::Past,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TripStatusFilter::All => "all",
            TripStatusFilter::Upcoming => "upcoming",
            TripStatusFilter::Past => "past",
        }
    }
}

pub fn filter_by_status(trips: Vec<Trip>, filter: TripStatusFilter, today: NaiveDate) -> Vec<Trip> {
    trips
        .into_iter()
        .filter(|trip| filter.matches(trip, today))
        .collect()
}

/// Case-insensitive substring match on the trip name. A blank query keeps
/// everything.
pub fn search_trips<'a>(trips: &'a [Trip], query: &str) -> Vec<&'a Trip> {
    let needle = query.trim().to_lowercase();
    trips
        .iter()
        .filter(|trip| needle.is_empty() || trip.name.to_lowercase().contains(&needle))
        .collect()
}

/// Trips that have not started yet, soonest first.
pub fn upcoming_trips<'a>(trips: &[&'a Trip], today: NaiveDate) -> Vec<&'a Trip> {
    let mut upcoming: Vec<&Trip> = trips
        .iter()
        .copied()
        .filter(|trip| trip.start_date >= today)
        .collect();
    upcoming.sort_by_key(|trip| trip.start_date);
    upcoming
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(raw: &str) -> NaiveDate {
        NaiveDate::parse_from_str(raw, "%Y-%m-%d").unwrap()
    }

    fn trip(name: &str, start: &str, end: &str) -> Trip {
        Trip::new(
            "user-1",
            NewTrip {
                name: name.into(),
                description: None,
                cover_image: None,
                start_date: date(start),
                end_date: date(end),
                is_public: false,
                total_budget: None,
            },
        )
    }

    #[test]
    fn duration_includes_both_ends() {
        assert_eq!(trip("Paris", "2024-03-01", "2024-03-03").duration_days(), 3);
        assert_eq!(trip("Day out", "2024-03-01", "2024-03-01").duration_days(), 1);
    }

    #[test]
    fn trip_on_its_last_day_is_still_upcoming() {
        let t = trip("Lisbon", "2024-05-01", "2024-05-10");
        assert_eq!(t.status(date("2024-05-10")), TripStatus::Upcoming);
        assert_eq!(t.status(date("2024-05-11")), TripStatus::Past);
    }

    #[test]
    fn new_trip_rejects_reversed_dates_and_blank_names() {
        let reversed = NewTrip {
            name: "Backwards".into(),
            description: None,
            cover_image: None,
            start_date: date("2024-05-10"),
            end_date: date("2024-05-01"),
            is_public: false,
            total_budget: None,
        };
        assert!(matches!(reversed.validate(), Err(AppError::Validation(_))));

        let blank = NewTrip {
            name: "   ".into(),
            description: None,
            cover_image: None,
            start_date: date("2024-05-01"),
            end_date: date("2024-05-01"),
            is_public: false,
            total_budget: None,
        };
        assert!(blank.validate().is_err());
    }

    #[test]
    fn update_keeps_unset_fields() {
        let mut t = trip("Kyoto", "2024-04-01", "2024-04-07");
        t.apply(TripUpdate {
            is_public: Some(true),
            ..TripUpdate::default()
        })
        .unwrap();
        assert!(t.is_public);
        assert_eq!(t.name, "Kyoto");

        let err = t.apply(TripUpdate {
            end_date: Some(date("2024-03-01")),
            ..TripUpdate::default()
        });
        assert!(err.is_err());
    }

    #[test]
    fn search_and_status_filters() {
        let trips = vec![
            trip("Summer in Lisbon", "2024-07-01", "2024-07-10"),
            trip("Paris weekend", "2024-02-01", "2024-02-03"),
        ];
        let found = search_trips(&trips, "LISBON");
        assert_eq!(found.len(), 1);
        assert_eq!(search_trips(&trips, "  ").len(), 2);

        let today = date("2024-03-01");
        let past = filter_by_status(trips.clone(), TripStatusFilter::Past, today);
        assert_eq!(past.len(), 1);
        assert_eq!(past[0].name, "Paris weekend");

        let all: Vec<&Trip> = trips.iter().collect();
        let upcoming = upcoming_trips(&all, today);
        assert_eq!(upcoming.len(), 1);
        assert_eq!(upcoming[0].name, "Summer in Lisbon");
    }
}
