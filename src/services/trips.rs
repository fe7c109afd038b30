use chrono::{NaiveDate, Utc};
use sqlx::{QueryBuilder, Sqlite};
use tracing::info;

use crate::{
    db::DbPool,
    error::AppError,
    models::trip::{NewTrip, Trip, TripSpan, TripUpdate},
    services::{logged, push_page},
};

const TRIP_COLUMNS: &str = "id, user_id, name, description, cover_image, start_date, end_date, \
     is_public, total_budget, created_at, updated_at";

#[derive(Debug, Clone, Default)]
pub struct TripQuery {
    pub user_id: Option<String>,
    pub is_public: Option<bool>,
    /// Only trips starting on or after `today`.
    pub upcoming: bool,
    /// Only trips that ended before `today`.
    pub past: bool,
    pub today: Option<NaiveDate>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl TripQuery {
    pub fn for_user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            ..Self::default()
        }
    }
}

#[derive(Clone)]
pub struct TripService {
    db: DbPool,
}

impl TripService {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }

    /// Newest start date first.
    pub async fn list(&self, query: &TripQuery) -> Result<Vec<Trip>, AppError> {
        logged("list_trips", self.fetch_list(query).await)
    }

    async fn fetch_list(&self, query: &TripQuery) -> Result<Vec<Trip>, AppError> {
        let today = query.today.unwrap_or_else(|| Utc::now().date_naive());
        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {TRIP_COLUMNS} FROM trips WHERE 1 = 1"));
        if let Some(user_id) = &query.user_id {
            builder.push(" AND user_id = ").push_bind(user_id.clone());
        }
        if let Some(is_public) = query.is_public {
            builder.push(" AND is_public = ").push_bind(is_public);
        }
        if query.upcoming {
            builder.push(" AND start_date >= ").push_bind(today);
        }
        if query.past {
            builder.push(" AND end_date < ").push_bind(today);
        }
        builder.push(" ORDER BY start_date DESC, created_at DESC");
        push_page(&mut builder, query.limit, query.offset);

        let trips = builder.build_query_as::<Trip>().fetch_all(&self.db).await?;
        Ok(trips)
    }

    /// Calendar projection of a user's trips, earliest start first.
    pub async fn list_spans(&self, user_id: &str) -> Result<Vec<TripSpan>, AppError> {
        let result = sqlx::query_as::<_, TripSpan>(
            "SELECT id, name, start_date, end_date FROM trips WHERE user_id = ?1 ORDER BY start_date ASC",
        )
        .bind(user_id)
        .fetch_all(&self.db)
        .await
        .map_err(AppError::from);
        logged("list_trip_spans", result)
    }

    pub async fn get(&self, id: &str) -> Result<Trip, AppError> {
        let result = sqlx::query_as::<_, Trip>(&format!("SELECT {TRIP_COLUMNS} FROM trips WHERE id = ?1"))
            .bind(id)
            .fetch_optional(&self.db)
            .await
            .map_err(AppError::from)
            .and_then(|row| row.ok_or(AppError::NotFound("trip")));
        logged("get_trip", result)
    }

    /// Loads a trip and checks that `user_id` owns it.
    pub async fn get_owned(&self, id: &str, user_id: &str) -> Result<Trip, AppError> {
        let trip = self.get(id).await?;
        if !trip.is_owned_by(user_id) {
            return Err(AppError::Forbidden);
        }
        Ok(trip)
    }

    pub async fn create(&self, user_id: &str, input: NewTrip) -> Result<Trip, AppError> {
        let trip = Trip::new(user_id, input.validate()?);
        let result = sqlx::query(
            r#"INSERT INTO trips (id, user_id, name, description, cover_image, start_date, end_date, is_public, total_budget, created_at, updated_at)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)"#,
        )
        .bind(&trip.id)
        .bind(&trip.user_id)
        .bind(&trip.name)
        .bind(&trip.description)
        .bind(&trip.cover_image)
        .bind(trip.start_date)
        .bind(trip.end_date)
        .bind(trip.is_public)
        .bind(trip.total_budget)
        .bind(trip.created_at)
        .bind(trip.updated_at)
        .execute(&self.db)
        .await
        .map_err(AppError::from);
        logged("create_trip", result)?;
        info!(trip_id = %trip.id, "trip created");
        Ok(trip)
    }

    pub async fn update(&self, id: &str, user_id: &str, update: TripUpdate) -> Result<Trip, AppError> {
        let mut trip = self.get_owned(id, user_id).await?;
        trip.apply(update)?;
        let result = sqlx::query(
            r#"UPDATE trips SET name = ?1, description = ?2, cover_image = ?3, start_date = ?4,
                   end_date = ?5, is_public = ?6, total_budget = ?7, updated_at = ?8
               WHERE id = ?9"#,
        )
        .bind(&trip.name)
        .bind(&trip.description)
        .bind(&trip.cover_image)
        .bind(trip.start_date)
        .bind(trip.end_date)
        .bind(trip.is_public)
        .bind(trip.total_budget)
        .bind(trip.updated_at)
        .bind(&trip.id)
        .execute(&self.db)
        .await
        .map_err(AppError::from);
        logged("update_trip", result)?;
        Ok(trip)
    }

    /// Removes the trip; its stops and their activities go with it.
    pub async fn delete(&self, id: &str, user_id: &str) -> Result<(), AppError> {
        self.get_owned(id, user_id).await?;
        let result = sqlx::query("DELETE FROM trips WHERE id = ?1")
            .bind(id)
            .execute(&self.db)
            .await
            .map_err(AppError::from);
        logged("delete_trip", result)?;
        info!(trip_id = %id, "trip deleted");
        Ok(())
    }
}
