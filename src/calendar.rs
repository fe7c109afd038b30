use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;

use crate::{
    error::AppError,
    models::{dates::parse_calendar_date, trip::TripSpan},
};

/// Which trips occupy which calendar days.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct CalendarOccupancy {
    by_date: BTreeMap<NaiveDate, Vec<String>>,
}

impl CalendarOccupancy {
    pub fn is_occupied(&self, date: NaiveDate) -> bool {
        self.by_date
            .get(&date)
            .map(|names| !names.is_empty())
            .unwrap_or(false)
    }

    pub fn trips_on(&self, date: NaiveDate) -> &[String] {
        self.by_date.get(&date).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn occupied_day_count(&self) -> usize {
        self.by_date.values().filter(|names| !names.is_empty()).count()
    }

    pub fn by_date(&self) -> &BTreeMap<NaiveDate, Vec<String>> {
        &self.by_date
    }

    /// Occupied days falling inside `[from, to]`.
    pub fn days_between(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> impl Iterator<Item = (&NaiveDate, &Vec<String>)> {
        self.by_date.range(from..=to)
    }
}

struct ParsedSpan<'a> {
    name: &'a str,
    start: NaiveDate,
    end: NaiveDate,
}

/// Expands every trip into the days it covers, both ends included.
///
/// All dates are parsed before anything is expanded, so one malformed row
/// fails the whole call. Trips are visited by ascending start date (ties
/// keep input order) which fixes the order of names inside a day. A trip
/// whose end lies before its start occupies nothing.
pub fn compute_calendar_occupancy(trips: &[TripSpan]) -> Result<CalendarOccupancy, AppError> {
    let mut spans = trips
        .iter()
        .map(|trip| {
            Ok::<_, AppError>(ParsedSpan {
                name: trip.name.as_str(),
                start: parse_calendar_date(&trip.start_date)?,
                end: parse_calendar_date(&trip.end_date)?,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    spans.sort_by_key(|span| span.start);

    let mut by_date: BTreeMap<NaiveDate, Vec<String>> = BTreeMap::new();
    for span in spans {
        for day in span.start.iter_days().take_while(|day| *day <= span.end) {
            by_date.entry(day).or_default().push(span.name.to_string());
        }
    }

    Ok(CalendarOccupancy { by_date })
}
