use askama::Template;
use askama_axum::IntoResponse as AskamaTemplateResponse;
use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Redirect},
    routing::{get, post},
    Form, Router,
};
use chrono::{Datelike, Days, Local, Months, NaiveDate};
use serde::Deserialize;
use serde_with::{serde_as, NoneAsEmptyString};

use crate::{
    auth::CurrentUser,
    budget::compute_budget,
    calendar::{compute_calendar_occupancy, CalendarOccupancy},
    error::AppError,
    models::{
        dates::parse_calendar_date,
        profile::ProfileUpdate,
        stop::{NewStop, StopUpdate},
        trip::{filter_by_status, search_trips, upcoming_trips, NewTrip, TripStatusFilter, TripUpdate},
    },
    routes::views::{category_rows, date_range, money, stop_rows, CategoryRow, StopRow, TripCard},
    services::{
        catalog::{ActivityFilters, CityQuery},
        trips::TripQuery,
    },
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(dashboard))
        .route("/trips", get(trips_list))
        .route("/trips/new", get(trip_new_form).post(trip_new_submit))
        .route("/trips/:id", get(trip_detail).post(trip_update_submit))
        .route("/trips/:id/delete", post(trip_delete))
        .route("/trips/:id/stops", post(stop_new_submit))
        .route("/trips/:id/stops/:stop_id", post(stop_update_submit))
        .route("/trips/:id/stops/:stop_id/delete", post(stop_delete))
        .route("/trips/:id/stops/:stop_id/activities", post(stop_activity_add))
        .route("/trips/:id/activities/:activity_id/delete", post(stop_activity_remove))
        .route("/calendar", get(calendar_page))
        .route("/profile", get(profile_form).post(profile_submit))
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

#[derive(Deserialize)]
struct DashboardParams {
    q: Option<String>,
}

#[derive(Template)]
#[template(path = "user/dashboard.html")]
struct DashboardTemplate {
    display_name: String,
    query: String,
    trip_count: usize,
    upcoming: Vec<TripCard>,
    matches: Vec<TripCard>,
}

async fn dashboard(
    State(state): State<AppState>,
    current: CurrentUser,
    Query(params): Query<DashboardParams>,
) -> Result<impl IntoResponse, AppError> {
    let user = current.require_user()?;
    let profile = state.profiles.get_or_default(&user.id).await?;
    let trips = state
        .trips
        .list(&TripQuery::for_user(&user.id))
        .await?;
    let query = params.q.unwrap_or_default();
    let today = today();
    let currency = profile.preferred_currency.as_str();

    let matching = search_trips(&trips, &query);
    let upcoming = upcoming_trips(&matching, today)
        .into_iter()
        .take(3)
        .map(|trip| TripCard::new(trip, today, currency))
        .collect();
    let matches = matching
        .iter()
        .map(|trip| TripCard::new(trip, today, currency))
        .collect();

    Ok(AskamaTemplateResponse::into_response(DashboardTemplate {
        display_name: profile.display_name().to_string(),
        query,
        trip_count: trips.len(),
        upcoming,
        matches,
    }))
}

#[derive(Deserialize)]
struct TripsListParams {
    #[serde(default)]
    status: TripStatusFilter,
}

#[derive(Template)]
#[template(path = "user/trips_list.html")]
struct TripsListTemplate {
    status: String,
    trips: Vec<TripCard>,
}

async fn trips_list(
    State(state): State<AppState>,
    current: CurrentUser,
    Query(params): Query<TripsListParams>,
) -> Result<impl IntoResponse, AppError> {
    let user = current.require_user()?;
    let profile = state.profiles.get_or_default(&user.id).await?;
    let trips = state
        .trips
        .list(&TripQuery::for_user(&user.id))
        .await?;
    let today = today();
    let cards = filter_by_status(trips, params.status, today)
        .iter()
        .map(|trip| TripCard::new(trip, today, &profile.preferred_currency))
        .collect();
    Ok(AskamaTemplateResponse::into_response(TripsListTemplate {
        status: params.status.as_str().to_string(),
        trips: cards,
    }))
}

#[derive(Template)]
#[template(path = "user/trip_new.html")]
struct TripNewTemplate {
    show_error: bool,
    error_message: String,
    name: String,
    start_date: String,
    end_date: String,
}

async fn trip_new_form(current: CurrentUser) -> Result<impl IntoResponse, AppError> {
    current.require_user()?;
    Ok(AskamaTemplateResponse::into_response(TripNewTemplate {
        show_error: false,
        error_message: String::new(),
        name: String::new(),
        start_date: String::new(),
        end_date: String::new(),
    }))
}

#[serde_as]
#[derive(Deserialize)]
struct TripForm {
    name: String,
    #[serde_as(as = "NoneAsEmptyString")]
    #[serde(default)]
    description: Option<String>,
    #[serde_as(as = "NoneAsEmptyString")]
    #[serde(default)]
    cover_image: Option<String>,
    start_date: String,
    end_date: String,
    is_public: Option<String>,
    #[serde_as(as = "NoneAsEmptyString")]
    #[serde(default)]
    total_budget: Option<f64>,
}

impl TripForm {
    fn into_new_trip(self) -> Result<NewTrip, AppError> {
        Ok(NewTrip {
            start_date: parse_calendar_date(&self.start_date)?,
            end_date: parse_calendar_date(&self.end_date)?,
            name: self.name,
            description: normalize_optional(self.description),
            cover_image: normalize_optional(self.cover_image),
            is_public: self.is_public.is_some(),
            total_budget: self.total_budget,
        })
    }
}

async fn trip_new_submit(
    State(state): State<AppState>,
    current: CurrentUser,
    Form(form): Form<TripForm>,
) -> Result<axum::response::Response, AppError> {
    let user = current.require_user()?;
    let (name, start_date, end_date) = (
        form.name.clone(),
        form.start_date.clone(),
        form.end_date.clone(),
    );
    let created = match form.into_new_trip() {
        Ok(input) => state.trips.create(&user.id, input).await,
        Err(err) => Err(err),
    };
    match created {
        Ok(trip) => Ok(Redirect::to(&format!("/me/trips/{}", trip.id)).into_response()),
        Err(AppError::Validation(message)) => Ok((
            axum::http::StatusCode::BAD_REQUEST,
            AskamaTemplateResponse::into_response(TripNewTemplate {
                show_error: true,
                error_message: message,
                name,
                start_date,
                end_date,
            }),
        )
            .into_response()),
        Err(err) => Err(err),
    }
}

#[serde_as]
#[derive(Deserialize)]
struct TripUpdateForm {
    #[serde_as(as = "NoneAsEmptyString")]
    #[serde(default)]
    name: Option<String>,
    #[serde_as(as = "NoneAsEmptyString")]
    #[serde(default)]
    description: Option<String>,
    #[serde_as(as = "NoneAsEmptyString")]
    #[serde(default)]
    start_date: Option<String>,
    #[serde_as(as = "NoneAsEmptyString")]
    #[serde(default)]
    end_date: Option<String>,
    #[serde_as(as = "NoneAsEmptyString")]
    #[serde(default)]
    visibility: Option<String>,
    #[serde_as(as = "NoneAsEmptyString")]
    #[serde(default)]
    total_budget: Option<f64>,
}

async fn trip_update_submit(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(trip_id): Path<String>,
    Form(form): Form<TripUpdateForm>,
) -> Result<Redirect, AppError> {
    let user = current.require_user()?;
    let update = TripUpdate {
        name: normalize_optional(form.name),
        description: normalize_optional(form.description),
        cover_image: None,
        start_date: form.start_date.as_deref().map(parse_calendar_date).transpose()?,
        end_date: form.end_date.as_deref().map(parse_calendar_date).transpose()?,
        is_public: match form.visibility.as_deref() {
            Some("public") => Some(true),
            Some("private") => Some(false),
            Some(other) => {
                return Err(AppError::validation(format!("unknown visibility: {other}")))
            }
            None => None,
        },
        total_budget: form.total_budget,
    };
    state.trips.update(&trip_id, &user.id, update).await?;
    Ok(Redirect::to(&format!("/me/trips/{trip_id}")))
}

async fn trip_delete(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(trip_id): Path<String>,
) -> Result<Redirect, AppError> {
    let user = current.require_user()?;
    state.trips.delete(&trip_id, &user.id).await?;
    Ok(Redirect::to("/me/trips"))
}

#[derive(Clone)]
struct CatalogOption {
    id: String,
    label: String,
}

#[derive(Template)]
#[template(path = "user/trip_detail.html")]
struct TripDetailTemplate {
    id: String,
    name: String,
    description: String,
    dates: String,
    days: i64,
    is_public: bool,
    total: String,
    has_budget_hint: bool,
    budget_hint: String,
    over_budget: bool,
    categories: Vec<CategoryRow>,
    stops: Vec<StopRow>,
    cities: Vec<CatalogOption>,
    activities: Vec<CatalogOption>,
}

async fn trip_detail(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(trip_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let user = current.require_user()?;
    let trip = state.trips.get_owned(&trip_id, &user.id).await?;
    let profile = state.profiles.get_or_default(&user.id).await?;
    let currency = profile.preferred_currency.as_str();

    let itinerary = state.stops.load_trip_itinerary(&trip.id).await?;
    let budget = compute_budget(&itinerary);

    let cities = state
        .catalog
        .cities(&CityQuery::default())
        .await?
        .into_iter()
        .map(|city| CatalogOption {
            label: format!("{}, {}", city.name, city.country),
            id: city.id,
        })
        .collect();
    let activities = state
        .catalog
        .activities(&ActivityFilters::default())
        .await?
        .into_iter()
        .map(|activity| CatalogOption {
            label: format!("{} ({})", activity.name, money(activity.estimated_cost(), currency)),
            id: activity.id,
        })
        .collect();

    let hint = trip.budget_hint();
    Ok(AskamaTemplateResponse::into_response(TripDetailTemplate {
        id: trip.id.clone(),
        name: trip.name.clone(),
        description: trip.description.clone().unwrap_or_default(),
        dates: date_range(trip.start_date, trip.end_date),
        days: trip.duration_days(),
        is_public: trip.is_public,
        total: money(budget.total_cost, currency),
        has_budget_hint: hint > 0.0,
        budget_hint: money(hint, currency),
        over_budget: hint > 0.0 && budget.total_cost > hint,
        categories: category_rows(&budget, currency),
        stops: stop_rows(&itinerary, &budget, currency),
        cities,
        activities,
    }))
}

#[serde_as]
#[derive(Deserialize)]
struct StopForm {
    #[serde_as(as = "NoneAsEmptyString")]
    #[serde(default)]
    city_id: Option<String>,
    #[serde_as(as = "NoneAsEmptyString")]
    #[serde(default)]
    city_name: Option<String>,
    arrival_date: String,
    departure_date: String,
    #[serde_as(as = "NoneAsEmptyString")]
    #[serde(default)]
    accommodation_cost: Option<f64>,
    #[serde_as(as = "NoneAsEmptyString")]
    #[serde(default)]
    transport_cost: Option<f64>,
    #[serde_as(as = "NoneAsEmptyString")]
    #[serde(default)]
    notes: Option<String>,
}

async fn stop_new_submit(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(trip_id): Path<String>,
    Form(form): Form<StopForm>,
) -> Result<Redirect, AppError> {
    let user = current.require_user()?;
    let trip = state.trips.get_owned(&trip_id, &user.id).await?;

    // A catalog city fills in name and country; free text works without one.
    let (city_name, country) = match &form.city_id {
        Some(city_id) => {
            let city = state.catalog.city(city_id).await?;
            (city.name, Some(city.country))
        }
        None => (form.city_name.clone().unwrap_or_default(), None),
    };

    state
        .stops
        .create(NewStop {
            trip_id: trip.id.clone(),
            city_id: form.city_id,
            city_name,
            country,
            arrival_date: parse_calendar_date(&form.arrival_date)?,
            departure_date: parse_calendar_date(&form.departure_date)?,
            accommodation_cost: form.accommodation_cost,
            transport_cost: form.transport_cost,
            notes: normalize_optional(form.notes),
            order_index: None,
        })
        .await?;
    Ok(Redirect::to(&format!("/me/trips/{}", trip.id)))
}

#[serde_as]
#[derive(Deserialize)]
struct StopEditForm {
    #[serde_as(as = "NoneAsEmptyString")]
    #[serde(default)]
    city_name: Option<String>,
    #[serde_as(as = "NoneAsEmptyString")]
    #[serde(default)]
    arrival_date: Option<String>,
    #[serde_as(as = "NoneAsEmptyString")]
    #[serde(default)]
    departure_date: Option<String>,
    #[serde_as(as = "NoneAsEmptyString")]
    #[serde(default)]
    accommodation_cost: Option<f64>,
    #[serde_as(as = "NoneAsEmptyString")]
    #[serde(default)]
    transport_cost: Option<f64>,
    #[serde_as(as = "NoneAsEmptyString")]
    #[serde(default)]
    notes: Option<String>,
}

/// Blank fields leave the stop's current value in place.
async fn stop_update_submit(
    State(state): State<AppState>,
    current: CurrentUser,
    Path((trip_id, stop_id)): Path<(String, String)>,
    Form(form): Form<StopEditForm>,
) -> Result<Redirect, AppError> {
    let user = current.require_user()?;
    let trip = state.trips.get_owned(&trip_id, &user.id).await?;
    let stop = state.stops.get(&stop_id).await?;
    if stop.trip_id != trip.id {
        return Err(AppError::NotFound("trip stop"));
    }
    let update = StopUpdate {
        city_name: normalize_optional(form.city_name),
        arrival_date: form.arrival_date.as_deref().map(parse_calendar_date).transpose()?,
        departure_date: form.departure_date.as_deref().map(parse_calendar_date).transpose()?,
        accommodation_cost: form.accommodation_cost,
        transport_cost: form.transport_cost,
        notes: normalize_optional(form.notes),
        ..StopUpdate::default()
    };
    state.stops.update(&stop.id, update).await?;
    Ok(Redirect::to(&format!("/me/trips/{}", trip.id)))
}

async fn stop_delete(
    State(state): State<AppState>,
    current: CurrentUser,
    Path((trip_id, stop_id)): Path<(String, String)>,
) -> Result<Redirect, AppError> {
    let user = current.require_user()?;
    let trip = state.trips.get_owned(&trip_id, &user.id).await?;
    let stop = state.stops.get(&stop_id).await?;
    if stop.trip_id != trip.id {
        return Err(AppError::NotFound("trip stop"));
    }
    state.stops.delete(&stop.id).await?;
    Ok(Redirect::to(&format!("/me/trips/{}", trip.id)))
}

#[serde_as]
#[derive(Deserialize)]
struct StopActivityForm {
    #[serde_as(as = "NoneAsEmptyString")]
    #[serde(default)]
    activity_id: Option<String>,
    #[serde_as(as = "NoneAsEmptyString")]
    #[serde(default)]
    custom_cost: Option<f64>,
}

async fn stop_activity_add(
    State(state): State<AppState>,
    current: CurrentUser,
    Path((trip_id, stop_id)): Path<(String, String)>,
    Form(form): Form<StopActivityForm>,
) -> Result<Redirect, AppError> {
    let user = current.require_user()?;
    let trip = state.trips.get_owned(&trip_id, &user.id).await?;
    let stop = state.stops.get(&stop_id).await?;
    if stop.trip_id != trip.id {
        return Err(AppError::NotFound("trip stop"));
    }
    let Some(activity_id) = form.activity_id else {
        return Err(AppError::validation("pick an activity to add"));
    };
    state
        .stops
        .add_activity(&stop.id, Some(activity_id), form.custom_cost)
        .await?;
    Ok(Redirect::to(&format!("/me/trips/{}", trip.id)))
}

async fn stop_activity_remove(
    State(state): State<AppState>,
    current: CurrentUser,
    Path((trip_id, stop_activity_id)): Path<(String, String)>,
) -> Result<Redirect, AppError> {
    let user = current.require_user()?;
    let trip = state.trips.get_owned(&trip_id, &user.id).await?;
    let stop_activity = state.stops.get_activity(&stop_activity_id).await?;
    let stop = state.stops.get(&stop_activity.stop_id).await?;
    if stop.trip_id != trip.id {
        return Err(AppError::NotFound("stop activity"));
    }
    state.stops.remove_activity(&stop_activity.id).await?;
    Ok(Redirect::to(&format!("/me/trips/{}", trip.id)))
}

#[derive(Deserialize)]
struct CalendarParams {
    month: Option<String>,
}

#[derive(Clone)]
struct DayCell {
    day: u32,
    in_month: bool,
    booked: bool,
    trips: String,
}

#[derive(Clone)]
struct CalendarTripRow {
    name: String,
    dates: String,
    days: i64,
}

#[derive(Template)]
#[template(path = "user/calendar.html")]
struct CalendarTemplate {
    month_label: String,
    prev_month: String,
    next_month: String,
    weeks: Vec<Vec<DayCell>>,
    booked_day_count: usize,
    month_booked_days: usize,
    trips: Vec<CalendarTripRow>,
}

async fn calendar_page(
    State(state): State<AppState>,
    current: CurrentUser,
    Query(params): Query<CalendarParams>,
) -> Result<impl IntoResponse, AppError> {
    let user = current.require_user()?;
    let first = match params.month.as_deref() {
        Some(raw) => parse_month(raw)?,
        None => first_of_month(today()),
    };

    let spans = state.trips.list_spans(&user.id).await?;
    let occupancy = compute_calendar_occupancy(&spans)?;

    // Spans already passed validation above.
    let trips = spans
        .iter()
        .filter_map(|span| {
            let start = parse_calendar_date(&span.start_date).ok()?;
            let end = parse_calendar_date(&span.end_date).ok()?;
            Some(CalendarTripRow {
                name: span.name.clone(),
                dates: date_range(start, end),
                days: (end - start).num_days() + 1,
            })
        })
        .collect();

    let prev = first
        .checked_sub_months(Months::new(1))
        .ok_or_else(|| AppError::validation("month out of range"))?;
    let next = first
        .checked_add_months(Months::new(1))
        .ok_or_else(|| AppError::validation("month out of range"))?;
    let last = next.pred_opt().unwrap_or(first);

    Ok(AskamaTemplateResponse::into_response(CalendarTemplate {
        month_label: first.format("%B %Y").to_string(),
        prev_month: prev.format("%Y-%m").to_string(),
        next_month: next.format("%Y-%m").to_string(),
        weeks: month_grid(first, &occupancy),
        booked_day_count: occupancy.occupied_day_count(),
        month_booked_days: booked_days_in(&occupancy, first, last),
        trips,
    }))
}

fn first_of_month(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

fn parse_month(raw: &str) -> Result<NaiveDate, AppError> {
    parse_calendar_date(&format!("{}-01", raw.trim()))
        .map_err(|_| AppError::validation(format!("malformed month: {raw:?}")))
}

fn booked_days_in(occupancy: &CalendarOccupancy, first: NaiveDate, last: NaiveDate) -> usize {
    occupancy
        .days_between(first, last)
        .filter(|(_, names)| !names.is_empty())
        .count()
}

/// Monday-first weeks covering the whole month, padded with the
/// neighbouring months' days.
fn month_grid(first: NaiveDate, occupancy: &CalendarOccupancy) -> Vec<Vec<DayCell>> {
    let lead = u64::from(first.weekday().num_days_from_monday());
    let Some(mut day) = first.checked_sub_days(Days::new(lead)) else {
        return Vec::new();
    };
    let mut weeks = Vec::new();
    for _ in 0..6 {
        let mut week = Vec::with_capacity(7);
        for _ in 0..7 {
            week.push(DayCell {
                day: day.day(),
                in_month: day.month() == first.month(),
                booked: occupancy.is_occupied(day),
                trips: occupancy.trips_on(day).join(", "),
            });
            day = day + Days::new(1);
        }
        weeks.push(week);
        if day.month() != first.month() {
            break;
        }
    }
    weeks
}

#[derive(Template)]
#[template(path = "user/profile.html")]
struct ProfileTemplate {
    full_name: String,
    avatar_url: String,
    currency: String,
    calendar_link: String,
}

async fn profile_form(
    State(state): State<AppState>,
    current: CurrentUser,
) -> Result<impl IntoResponse, AppError> {
    let user = current.require_user()?;
    let profile = state.profiles.get_or_default(&user.id).await?;
    Ok(AskamaTemplateResponse::into_response(ProfileTemplate {
        full_name: profile.full_name.clone().unwrap_or_default(),
        avatar_url: profile.avatar_url.clone().unwrap_or_default(),
        currency: profile.preferred_currency.clone(),
        calendar_link: format!("/me/calendar?month={}", today().format("%Y-%m")),
    }))
}

#[serde_as]
#[derive(Deserialize)]
struct ProfileForm {
    #[serde_as(as = "NoneAsEmptyString")]
    #[serde(default)]
    full_name: Option<String>,
    #[serde_as(as = "NoneAsEmptyString")]
    #[serde(default)]
    avatar_url: Option<String>,
    #[serde_as(as = "NoneAsEmptyString")]
    #[serde(default)]
    preferred_currency: Option<String>,
}

async fn profile_submit(
    State(state): State<AppState>,
    current: CurrentUser,
    Form(form): Form<ProfileForm>,
) -> Result<Redirect, AppError> {
    let user = current.require_user()?;
    state
        .profiles
        .upsert(
            &user.id,
            ProfileUpdate {
                full_name: normalize_optional(form.full_name),
                avatar_url: normalize_optional(form.avatar_url),
                preferred_currency: normalize_optional(form.preferred_currency),
            },
        )
        .await?;
    Ok(Redirect::to("/me/profile"))
}

fn normalize_optional(input: Option<String>) -> Option<String> {
    input.and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}
