use std::{collections::HashMap, fmt, net::SocketAddr};

use anyhow::Context;
use axum::{
    body::Body,
    http::{header::CONTENT_TYPE, Method, Request},
};
use chrono::NaiveDate;
use cucumber::{given, then, when, World as _};
use tempfile::TempDir;
use tower::ServiceExt;
use travia::{
    auth::USER_HEADER,
    budget::{compute_budget, Budget, CostCategory},
    calendar::compute_calendar_occupancy,
    config::{AppConfig, AppEnv},
    db::{init_pool, run_migrations},
    error::AppError,
    models::{
        dates::parse_calendar_date,
        profile::ProfileUpdate,
        stop::NewStop,
        trip::{NewTrip, Trip, TripUpdate},
    },
    routes::create_router,
    services::{
        catalog::{ActivityFilters, CityQuery},
        trips::TripQuery,
    },
    state::AppState,
};

#[derive(Debug, cucumber::World, Default)]
struct AppWorld {
    state: Option<TestState>,
    user: Option<String>,
    trips: HashMap<String, String>,
    stops: HashMap<String, String>,
    last_error: Option<AppError>,
    listed: Vec<Trip>,
    found: Vec<String>,
    last_status: Option<u16>,
}

impl AppWorld {
    fn app_state(&self) -> &AppState {
        self.state
            .as_ref()
            .expect("state must be initialised first")
            .app()
    }

    fn user(&self) -> String {
        self.user.clone().expect("sign in before touching trips")
    }

    fn trip_id(&self, name: &str) -> String {
        self.trips
            .get(name)
            .cloned()
            .unwrap_or_else(|| panic!("unknown trip {name}"))
    }

    fn stop_id(&self, city: &str) -> String {
        self.stops
            .get(city)
            .cloned()
            .unwrap_or_else(|| panic!("unknown stop {city}"))
    }

    async fn budget_for(&self, trip: &str) -> Budget {
        let itinerary = self
            .app_state()
            .stops
            .load_trip_itinerary(&self.trip_id(trip))
            .await
            .expect("load itinerary");
        compute_budget(&itinerary)
    }

    async fn create_trip(&mut self, owner: &str, name: &str, start: &str, end: &str) -> Result<Trip, AppError> {
        let input = NewTrip {
            name: name.to_string(),
            description: None,
            cover_image: None,
            start_date: parse_calendar_date(start)?,
            end_date: parse_calendar_date(end)?,
            is_public: false,
            total_budget: None,
        };
        let trip = self.app_state().trips.create(owner, input).await?;
        self.trips.insert(name.to_string(), trip.id.clone());
        Ok(trip)
    }
}

struct TestState {
    app: AppState,
    _root: TempDir,
}

impl fmt::Debug for TestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestState").finish()
    }
}

impl TestState {
    async fn new() -> anyhow::Result<Self> {
        let root = TempDir::new().context("create temp dir for bdd world")?;
        let db_path = root.path().join("bdd.sqlite");
        let database_url = format!("sqlite://{}", db_path.to_string_lossy());

        let config = AppConfig {
            database_url: database_url.clone(),
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            app_env: AppEnv::Development,
            default_currency: "EUR".into(),
        };

        let db = init_pool(&config.database_url).await?;
        run_migrations(&db).await?;

        let app = AppState::new(config, db);
        Ok(Self { app, _root: root })
    }

    fn app(&self) -> &AppState {
        &self.app
    }
}

fn date(raw: &str) -> NaiveDate {
    parse_calendar_date(raw).expect("valid date in feature file")
}

#[given("a fresh application state")]
async fn given_fresh_state(world: &mut AppWorld) {
    world.state = Some(TestState::new().await.expect("state"));
    world.user = None;
    world.trips.clear();
    world.stops.clear();
    world.last_error = None;
}

#[given(regex = r#"^I am signed in as \"([^\"]+)\"$"#)]
async fn given_signed_in(world: &mut AppWorld, user: String) {
    world.user = Some(user);
}

#[given(regex = r#"^I have a trip \"([^\"]+)\" from \"([^\"]+)\" to \"([^\"]+)\"$"#)]
async fn given_my_trip(world: &mut AppWorld, name: String, start: String, end: String) {
    let owner = world.user();
    world
        .create_trip(&owner, &name, &start, &end)
        .await
        .expect("create trip");
}

#[given(regex = r#"^\"([^\"]+)\" has a trip \"([^\"]+)\" from \"([^\"]+)\" to \"([^\"]+)\"$"#)]
async fn given_someone_elses_trip(world: &mut AppWorld, owner: String, name: String, start: String, end: String) {
    world
        .create_trip(&owner, &name, &start, &end)
        .await
        .expect("create trip");
}

#[given(regex = r#"^\"([^\"]+)\" shares the trip \"([^\"]+)\"$"#)]
async fn given_shared_trip(world: &mut AppWorld, owner: String, name: String) {
    let trip_id = world.trip_id(&name);
    let update = TripUpdate {
        is_public: Some(true),
        ..TripUpdate::default()
    };
    world
        .app_state()
        .trips
        .update(&trip_id, &owner, update)
        .await
        .expect("share trip");
}

#[given(regex = r#"^a stored trip \"([^\"]+)\" with start date \"([^\"]*)\"$"#)]
async fn given_raw_trip(world: &mut AppWorld, name: String, start: String) {
    let owner = world.user();
    sqlx::query(
        r#"INSERT INTO trips (id, user_id, name, start_date, end_date, is_public, created_at, updated_at)
           VALUES (?1, ?2, ?3, ?4, '2024-01-10', 0, '2024-01-01T00:00:00Z', '2024-01-01T00:00:00Z')"#,
    )
    .bind(format!("raw-{name}"))
    .bind(owner)
    .bind(&name)
    .bind(start)
    .execute(&world.app_state().db)
    .await
    .expect("insert raw trip");
}

#[given(
    regex = r#"^the trip \"([^\"]+)\" has a stop in \"([^\"]+)\" with accommodation (-?[\d.]+) and transport (-?[\d.]+)$"#
)]
async fn given_stop(world: &mut AppWorld, trip: String, city: String, accommodation: f64, transport: f64) {
    add_stop(world, &trip, &city, Some(accommodation), Some(transport)).await;
}

#[given(regex = r#"^the trip \"([^\"]+)\" has a stop in \"([^\"]+)\" without costs$"#)]
async fn given_stop_without_costs(world: &mut AppWorld, trip: String, city: String) {
    add_stop(world, &trip, &city, None, None).await;
}

async fn add_stop(
    world: &mut AppWorld,
    trip: &str,
    city: &str,
    accommodation: Option<f64>,
    transport: Option<f64>,
) {
    let trip_id = world.trip_id(trip);
    let stop = world
        .app_state()
        .stops
        .create(NewStop {
            trip_id,
            city_id: None,
            city_name: city.to_string(),
            country: None,
            arrival_date: date("2024-03-01"),
            departure_date: date("2024-03-03"),
            accommodation_cost: accommodation,
            transport_cost: transport,
            notes: None,
            order_index: None,
        })
        .await
        .expect("create stop");
    world.stops.insert(city.to_string(), stop.id);
}

#[given(regex = r#"^the stop \"([^\"]+)\" has the catalog activity \"([^\"]+)\"$"#)]
async fn given_catalog_activity(world: &mut AppWorld, city: String, activity_id: String) {
    let stop_id = world.stop_id(&city);
    world
        .app_state()
        .stops
        .add_activity(&stop_id, Some(activity_id), None)
        .await
        .expect("add activity");
}

#[given(
    regex = r#"^the stop \"([^\"]+)\" has the catalog activity \"([^\"]+)\" with custom cost (-?[\d.]+)$"#
)]
async fn given_catalog_activity_with_cost(world: &mut AppWorld, city: String, activity_id: String, cost: f64) {
    let stop_id = world.stop_id(&city);
    world
        .app_state()
        .stops
        .add_activity(&stop_id, Some(activity_id), Some(cost))
        .await
        .expect("add activity");
}

#[given(regex = r#"^the stop \"([^\"]+)\" has an unlisted activity$"#)]
async fn given_unlisted_activity(world: &mut AppWorld, city: String) {
    let stop_id = world.stop_id(&city);
    world
        .app_state()
        .stops
        .add_activity(&stop_id, None, None)
        .await
        .expect("add activity");
}

#[when(regex = r#"^the catalog activity \"([^\"]+)\" is withdrawn$"#)]
async fn when_activity_withdrawn(world: &mut AppWorld, activity_id: String) {
    sqlx::query("DELETE FROM activities WHERE id = ?1")
        .bind(activity_id)
        .execute(&world.app_state().db)
        .await
        .expect("delete catalog activity");
}

#[when(regex = r#"^I try to create a trip \"([^\"]+)\" from \"([^\"]+)\" to \"([^\"]+)\"$"#)]
async fn when_try_create(world: &mut AppWorld, name: String, start: String, end: String) {
    let owner = world.user();
    world.last_error = world.create_trip(&owner, &name, &start, &end).await.err();
}

#[when(regex = r#"^I try to delete the trip \"([^\"]+)\"$"#)]
async fn when_try_delete(world: &mut AppWorld, name: String) {
    let owner = world.user();
    let trip_id = world.trip_id(&name);
    world.last_error = world
        .app_state()
        .trips
        .delete(&trip_id, &owner)
        .await
        .err();
}

#[when(regex = r#"^I list my (upcoming|past) trips as of \"([^\"]+)\"$"#)]
async fn when_list_trips(world: &mut AppWorld, which: String, today: String) {
    let query = TripQuery {
        upcoming: which == "upcoming",
        past: which == "past",
        today: Some(date(&today)),
        ..TripQuery::for_user(world.user())
    };
    world.listed = world.app_state().trips.list(&query).await.expect("list trips");
}

#[then(regex = r#"^the budget for \"([^\"]+)\" totals (-?[\d.]+)$"#)]
async fn then_budget_total(world: &mut AppWorld, trip: String, expected: f64) {
    let budget = world.budget_for(&trip).await;
    assert_eq!(budget.total_cost, expected);
}

#[then(regex = r#"^the (accommodation|transport|activities) cost of \"([^\"]+)\" is (-?[\d.]+)$"#)]
async fn then_category(world: &mut AppWorld, category: String, trip: String, expected: f64) {
    let budget = world.budget_for(&trip).await;
    let category = match category.as_str() {
        "accommodation" => CostCategory::Accommodation,
        "transport" => CostCategory::Transport,
        _ => CostCategory::Activities,
    };
    assert_eq!(budget.breakdown.amount(category), expected);
}

#[then(regex = r#"^the budget total of \"([^\"]+)\" equals the sum of its categories$"#)]
async fn then_total_matches_categories(world: &mut AppWorld, trip: String) {
    let budget = world.budget_for(&trip).await;
    let sum = budget.breakdown.accommodation + budget.breakdown.transport + budget.breakdown.activities;
    assert_eq!(budget.total_cost, sum);
}

#[then(regex = r#"^the stop \"([^\"]+)\" of \"([^\"]+)\" costs (-?[\d.]+)$"#)]
async fn then_stop_cost(world: &mut AppWorld, city: String, trip: String, expected: f64) {
    let budget = world.budget_for(&trip).await;
    let stop_id = world.stop_id(&city);
    assert_eq!(budget.per_stop_cost(&stop_id), Some(expected));
}

#[then(regex = r#"^the stops of \"([^\"]+)\" are listed as \"([^\"]*)\"$"#)]
async fn then_stop_order(world: &mut AppWorld, trip: String, expected: String) {
    let budget = world.budget_for(&trip).await;
    let cities: Vec<&str> = budget.per_stop.iter().map(|s| s.city_name.as_str()).collect();
    assert_eq!(cities.join(", "), expected);
}

#[then(regex = r"^my calendar has (\d+) booked days?$")]
async fn then_booked_days(world: &mut AppWorld, expected: usize) {
    let spans = world
        .app_state()
        .trips
        .list_spans(&world.user())
        .await
        .expect("list spans");
    let calendar = compute_calendar_occupancy(&spans).expect("calendar");
    assert_eq!(calendar.occupied_day_count(), expected);
}

#[then(regex = r#"^\"([^\"]+)\" is booked by \"([^\"]+)\"$"#)]
async fn then_day_booked_by(world: &mut AppWorld, day: String, names: String) {
    let spans = world
        .app_state()
        .trips
        .list_spans(&world.user())
        .await
        .expect("list spans");
    let calendar = compute_calendar_occupancy(&spans).expect("calendar");
    assert_eq!(calendar.trips_on(date(&day)).join(", "), names);
}

#[then(regex = r#"^\"([^\"]+)\" is free$"#)]
async fn then_day_free(world: &mut AppWorld, day: String) {
    let spans = world
        .app_state()
        .trips
        .list_spans(&world.user())
        .await
        .expect("list spans");
    let calendar = compute_calendar_occupancy(&spans).expect("calendar");
    assert!(!calendar.is_occupied(date(&day)));
}

#[then("building my calendar fails with a validation error")]
async fn then_calendar_rejected(world: &mut AppWorld) {
    let spans = world
        .app_state()
        .trips
        .list_spans(&world.user())
        .await
        .expect("list spans");
    let err = compute_calendar_occupancy(&spans).expect_err("calendar should fail");
    assert!(matches!(err, AppError::Validation(_)), "unexpected error: {err:?}");
}

#[then(regex = r"^the request is rejected as (invalid|forbidden)$")]
async fn then_rejected(world: &mut AppWorld, kind: String) {
    let err = world.last_error.as_ref().expect("an error was expected");
    match kind.as_str() {
        "invalid" => assert!(matches!(err, AppError::Validation(_)), "got {err:?}"),
        _ => assert!(matches!(err, AppError::Forbidden), "got {err:?}"),
    }
}

#[then(regex = r#"^the trip \"([^\"]+)\" is gone along with its stops$"#)]
async fn then_trip_gone(world: &mut AppWorld, name: String) {
    assert!(world.last_error.is_none(), "delete failed: {:?}", world.last_error);
    let trip_id = world.trip_id(&name);
    let err = world.app_state().trips.get(&trip_id).await.expect_err("trip deleted");
    assert!(matches!(err, AppError::NotFound(_)));
    let stops = world
        .app_state()
        .stops
        .list_for_trip(&trip_id)
        .await
        .expect("list stops");
    assert!(stops.is_empty());
}

#[then(regex = r#"^the listing shows \"([^\"]*)\"$"#)]
async fn then_listing(world: &mut AppWorld, expected: String) {
    let names: Vec<&str> = world.listed.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names.join(", "), expected);
}

#[then(regex = r#"^fetching the budget of \"([^\"]+)\" as \"([^\"]*)\" answers (\d{3})$"#)]
async fn then_budget_status(world: &mut AppWorld, trip: String, viewer: String, expected: u16) {
    let app = create_router(world.app_state().clone());
    let mut request = Request::builder().uri(format!("/api/trips/{}/budget", world.trip_id(&trip)));
    if !viewer.is_empty() {
        request = request.header(USER_HEADER, viewer);
    }
    let response = app
        .oneshot(request.body(Body::empty()).expect("build request"))
        .await
        .expect("router response");
    assert_eq!(response.status().as_u16(), expected);
}

#[when(
    regex = r#"^\"([^\"]+)\" sets the accommodation of stop \"([^\"]+)\" in \"([^\"]+)\" to ([\d.]+)$"#
)]
async fn when_edit_stop(world: &mut AppWorld, editor: String, city: String, trip: String, amount: f64) {
    let app = create_router(world.app_state().clone());
    let uri = format!("/me/trips/{}/stops/{}", world.trip_id(&trip), world.stop_id(&city));
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(USER_HEADER, editor)
        .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(format!("accommodation_cost={amount}&city_name=")))
        .expect("build request");
    let response = app.oneshot(request).await.expect("router response");
    world.last_status = Some(response.status().as_u16());
}

#[then(regex = r"^the stop edit answers (\d{3})$")]
async fn then_stop_edit_status(world: &mut AppWorld, expected: u16) {
    assert_eq!(world.last_status, Some(expected));
}

#[given(regex = r"^the catalog has (\d+) extra cities$")]
async fn given_extra_cities(world: &mut AppWorld, count: usize) {
    for n in 0..count {
        sqlx::query(
            r#"INSERT INTO cities (id, name, country, popularity, created_at)
               VALUES (?1, ?2, 'Testland', 1, '2024-01-01T00:00:00Z')"#,
        )
        .bind(format!("city-extra-{n}"))
        .bind(format!("Extra {n:02}"))
        .execute(&world.app_state().db)
        .await
        .expect("insert city");
    }
}

async fn list_cities(world: &mut AppWorld, query: CityQuery) {
    world.found = world
        .app_state()
        .catalog
        .cities(&query)
        .await
        .expect("list cities")
        .into_iter()
        .map(|city| city.name)
        .collect();
}

#[when(regex = r#"^I search cities for \"([^\"]*)\"$"#)]
async fn when_search_cities(world: &mut AppWorld, search: String) {
    let query = CityQuery {
        search: Some(search),
        ..CityQuery::default()
    };
    list_cities(world, query).await;
}

#[when(regex = r"^I list cities with popularity of at least (\d+)$")]
async fn when_popular_cities(world: &mut AppWorld, min: i64) {
    let query = CityQuery {
        min_popularity: Some(min),
        ..CityQuery::default()
    };
    list_cities(world, query).await;
}

#[when(regex = r"^I list cities skipping the first (\d+)$")]
async fn when_skip_cities(world: &mut AppWorld, offset: i64) {
    let query = CityQuery {
        offset: Some(offset),
        ..CityQuery::default()
    };
    list_cities(world, query).await;
}

#[when(regex = r"^I list activities rated at least ([\d.]+)$")]
async fn when_rated_activities(world: &mut AppWorld, min: f64) {
    let filters = ActivityFilters {
        min_rating: Some(min),
        ..ActivityFilters::default()
    };
    world.found = world
        .app_state()
        .catalog
        .activities(&filters)
        .await
        .expect("list activities")
        .into_iter()
        .map(|activity| activity.name)
        .collect();
}

#[then(regex = r#"^the catalog lists \"([^\"]*)\"$"#)]
async fn then_catalog_lists(world: &mut AppWorld, expected: String) {
    assert_eq!(world.found.join(", "), expected);
}

#[then(regex = r"^the catalog returns (\d+) entries$")]
async fn then_catalog_count(world: &mut AppWorld, expected: usize) {
    assert_eq!(world.found.len(), expected);
}

#[when(regex = r#"^I set my preferred currency to \"([^\"]*)\"$"#)]
async fn when_set_currency(world: &mut AppWorld, currency: String) {
    let update = ProfileUpdate {
        full_name: None,
        avatar_url: None,
        preferred_currency: Some(currency),
    };
    world.last_error = world
        .app_state()
        .profiles
        .upsert(&world.user(), update)
        .await
        .err();
}

#[then(regex = r#"^my preferred currency is \"([^\"]+)\"$"#)]
async fn then_currency(world: &mut AppWorld, expected: String) {
    let profile = world
        .app_state()
        .profiles
        .get_or_default(&world.user())
        .await
        .expect("load profile");
    assert_eq!(profile.preferred_currency, expected);
}

#[then(regex = r"^my profile is (saved|not saved)$")]
async fn then_profile_saved(world: &mut AppWorld, state: String) {
    let stored = world
        .app_state()
        .profiles
        .get_by_user(&world.user())
        .await
        .expect("load profile");
    assert_eq!(stored.is_some(), state == "saved");
}

#[tokio::main]
async fn main() {
    AppWorld::cucumber()
        .fail_on_skipped()
        .with_default_cli()
        .run("tests/features")
        .await;
}
