use askama::Template;
use askama_axum::IntoResponse as AskamaTemplateResponse;
use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::get,
    Router,
};
use serde::Deserialize;

use crate::{
    auth::CurrentUser,
    budget::compute_budget,
    error::AppError,
    models::{
        catalog::{activity_categories, average_rating, filter_activities, filter_cities, ActivityQuery},
        cost::format_amount,
    },
    routes::views::{category_rows, date_range, money, stop_rows, CategoryRow, StopRow},
    services::catalog::{ActivityFilters, CityQuery},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(landing))
        .route("/explore", get(explore))
        .route("/shared/:id", get(shared_itinerary))
}

#[derive(Template)]
#[template(path = "landing.html")]
struct LandingTemplate {
    logged_in: bool,
    cities: Vec<CityCard>,
}

#[derive(Clone)]
struct CityCard {
    id: String,
    name: String,
    country: String,
    description: String,
}

async fn landing(
    State(state): State<AppState>,
    current: CurrentUser,
) -> Result<impl IntoResponse, AppError> {
    let query = CityQuery {
        limit: Some(4),
        ..CityQuery::default()
    };
    let cities = state
        .catalog
        .cities(&query)
        .await?
        .into_iter()
        .map(|city| CityCard {
            id: city.id,
            name: city.name,
            country: city.country,
            description: city.description.unwrap_or_default(),
        })
        .collect();
    Ok(AskamaTemplateResponse::into_response(LandingTemplate {
        logged_in: current.is_signed_in(),
        cities,
    }))
}

#[derive(Deserialize)]
struct ExploreParams {
    q: Option<String>,
    city: Option<String>,
    category: Option<String>,
}

#[derive(Clone)]
struct ActivityCard {
    name: String,
    category: String,
    duration: String,
    cost: String,
    rating: String,
}

#[derive(Template)]
#[template(path = "explore.html")]
struct ExploreTemplate {
    query: String,
    selected_city: String,
    selected_category: String,
    cities: Vec<CityCard>,
    categories: Vec<String>,
    activities: Vec<ActivityCard>,
    activity_count: usize,
    has_rating: bool,
    average_rating: String,
}

async fn explore(
    State(state): State<AppState>,
    Query(params): Query<ExploreParams>,
) -> Result<impl IntoResponse, AppError> {
    let all_cities = state.catalog.cities(&CityQuery::default()).await?;
    let all_activities = state.catalog.activities(&ActivityFilters::default()).await?;

    let query_text = params.q.clone().unwrap_or_default();
    let cities = filter_cities(&all_cities, &query_text)
        .into_iter()
        .map(|city| CityCard {
            id: city.id.clone(),
            name: city.name.clone(),
            country: city.country.clone(),
            description: city.description.clone().unwrap_or_default(),
        })
        .collect();

    let activity_query = ActivityQuery {
        city_id: params.city.clone(),
        category: params.category.clone(),
        search: params.q.clone(),
    };
    let matching = filter_activities(&all_activities, &activity_query);
    let average = average_rating(&matching);
    let currency = state.config.default_currency.as_str();
    let activities: Vec<ActivityCard> = matching
        .iter()
        .map(|activity| ActivityCard {
            name: activity.name.clone(),
            category: activity.category.clone().unwrap_or_default(),
            duration: activity
                .duration_hours
                .map(|hours| format!("{}h", format_amount(hours)))
                .unwrap_or_default(),
            cost: money(activity.estimated_cost(), currency),
            rating: format!("{:.1}", activity.rating()),
        })
        .collect();

    Ok(AskamaTemplateResponse::into_response(ExploreTemplate {
        query: query_text,
        selected_city: params.city.unwrap_or_default(),
        selected_category: params.category.unwrap_or_else(|| "all".into()),
        cities,
        categories: activity_categories(&all_activities),
        activity_count: activities.len(),
        activities,
        has_rating: average.is_some(),
        average_rating: average.map(|avg| format!("{avg:.1}")).unwrap_or_default(),
    }))
}

#[derive(Template)]
#[template(path = "shared_trip.html")]
struct SharedTripTemplate {
    name: String,
    description: String,
    dates: String,
    days: i64,
    total: String,
    categories: Vec<CategoryRow>,
    stops: Vec<StopRow>,
}

/// Read-only itinerary for trips their owner made public.
async fn shared_itinerary(
    State(state): State<AppState>,
    Path(trip_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let trip = state.trips.get(&trip_id).await?;
    if !trip.is_public {
        return Err(AppError::NotFound("trip"));
    }
    let itinerary = state.stops.load_trip_itinerary(&trip.id).await?;
    let budget = compute_budget(&itinerary);
    let currency = state.config.default_currency.as_str();
    Ok(AskamaTemplateResponse::into_response(SharedTripTemplate {
        description: trip.description.clone().unwrap_or_default(),
        dates: date_range(trip.start_date, trip.end_date),
        days: trip.duration_days(),
        total: money(budget.total_cost, currency),
        categories: category_rows(&budget, currency),
        stops: stop_rows(&itinerary, &budget, currency),
        name: trip.name,
    }))
}
