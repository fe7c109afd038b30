use std::collections::BTreeMap;

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::{
    auth::CurrentUser,
    budget::{compute_budget, Budget},
    calendar::compute_calendar_occupancy,
    error::AppError,
    models::{
        stop::StopWithActivities,
        trip::{Trip, TripSpan},
    },
    services::trips::TripQuery,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/trips", get(list_trips))
        .route("/trips/:id/itinerary", get(trip_itinerary))
        .route("/trips/:id/budget", get(trip_budget))
        .route("/calendar", get(calendar))
}

#[derive(Deserialize)]
struct TripListParams {
    #[serde(default)]
    upcoming: bool,
    #[serde(default)]
    past: bool,
    limit: Option<i64>,
    offset: Option<i64>,
}

async fn list_trips(
    State(state): State<AppState>,
    current: CurrentUser,
    Query(params): Query<TripListParams>,
) -> Result<Json<Vec<Trip>>, AppError> {
    let user = current.require_user()?;
    let query = TripQuery {
        upcoming: params.upcoming,
        past: params.past,
        today: Some(Local::now().date_naive()),
        limit: params.limit,
        offset: params.offset,
        ..TripQuery::for_user(&user.id)
    };
    Ok(Json(state.trips.list(&query).await?))
}

/// Owners always see their trip; everyone else only when it is public.
async fn visible_trip(state: &AppState, current: &CurrentUser, trip_id: &str) -> Result<Trip, AppError> {
    let trip = state.trips.get(trip_id).await?;
    let is_owner = current
        .0
        .as_ref()
        .map(|user| trip.is_owned_by(&user.id))
        .unwrap_or(false);
    if is_owner || trip.is_public {
        Ok(trip)
    } else if current.is_signed_in() {
        Err(AppError::Forbidden)
    } else {
        Err(AppError::Unauthorized)
    }
}

async fn trip_itinerary(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(trip_id): Path<String>,
) -> Result<Json<Vec<StopWithActivities>>, AppError> {
    let trip = visible_trip(&state, &current, &trip_id).await?;
    Ok(Json(state.stops.load_trip_itinerary(&trip.id).await?))
}

async fn trip_budget(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(trip_id): Path<String>,
) -> Result<Json<Budget>, AppError> {
    let trip = visible_trip(&state, &current, &trip_id).await?;
    let itinerary = state.stops.load_trip_itinerary(&trip.id).await?;
    Ok(Json(compute_budget(&itinerary)))
}

#[derive(Serialize)]
struct CalendarResponse {
    by_date: BTreeMap<NaiveDate, Vec<String>>,
    occupied_day_count: usize,
    trips: Vec<TripSpan>,
}

async fn calendar(
    State(state): State<AppState>,
    current: CurrentUser,
) -> Result<Json<CalendarResponse>, AppError> {
    let user = current.require_user()?;
    let trips = state.trips.list_spans(&user.id).await?;
    let occupancy = compute_calendar_occupancy(&trips)?;
    Ok(Json(CalendarResponse {
        occupied_day_count: occupancy.occupied_day_count(),
        by_date: occupancy.by_date().clone(),
        trips,
    }))
}
