use serde::Deserialize;
use sqlx::{QueryBuilder, Sqlite};

use crate::{
    db::DbPool,
    error::AppError,
    models::catalog::{Activity, City},
    services::{like_pattern, logged, push_page},
};

const CITY_COLUMNS: &str = "id, name, country, country_code, image_url, cost_index, popularity, \
     description, latitude, longitude, created_at";

const ACTIVITY_COLUMNS: &str = "id, city_id, name, description, category, duration_hours, \
     estimated_cost, image_url, rating, created_at";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CityQuery {
    pub country: Option<String>,
    pub search: Option<String>,
    pub min_popularity: Option<i64>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ActivityFilters {
    pub city_id: Option<String>,
    pub category: Option<String>,
    pub search: Option<String>,
    pub min_rating: Option<f64>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Read-only access to the city and activity catalog.
#[derive(Clone)]
pub struct CatalogService {
    db: DbPool,
}

impl CatalogService {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }

    /// Most popular first.
    pub async fn cities(&self, query: &CityQuery) -> Result<Vec<City>, AppError> {
        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {CITY_COLUMNS} FROM cities WHERE 1 = 1"));
        if let Some(country) = non_blank(&query.country) {
            builder.push(" AND country = ").push_bind(country);
        }
        if let Some(search) = non_blank(&query.search) {
            let pattern = like_pattern(&search);
            builder
                .push(" AND (name LIKE ")
                .push_bind(pattern.clone())
                .push(" OR country LIKE ")
                .push_bind(pattern)
                .push(")");
        }
        if let Some(min) = query.min_popularity {
            builder.push(" AND popularity >= ").push_bind(min);
        }
        builder.push(" ORDER BY popularity DESC, name ASC");
        push_page(&mut builder, query.limit, query.offset);

        let result = builder
            .build_query_as::<City>()
            .fetch_all(&self.db)
            .await
            .map_err(AppError::from);
        logged("list_cities", result)
    }

    pub async fn city(&self, id: &str) -> Result<City, AppError> {
        let result = sqlx::query_as::<_, City>(&format!("SELECT {CITY_COLUMNS} FROM cities WHERE id = ?1"))
            .bind(id)
            .fetch_optional(&self.db)
            .await
            .map_err(AppError::from)
            .and_then(|row| row.ok_or(AppError::NotFound("city")));
        logged("get_city", result)
    }

    /// Best rated first.
    pub async fn activities(&self, filters: &ActivityFilters) -> Result<Vec<Activity>, AppError> {
        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {ACTIVITY_COLUMNS} FROM activities WHERE 1 = 1"));
        if let Some(city_id) = non_blank(&filters.city_id) {
            builder.push(" AND city_id = ").push_bind(city_id);
        }
        if let Some(category) = non_blank(&filters.category) {
            builder.push(" AND category = ").push_bind(category);
        }
        if let Some(search) = non_blank(&filters.search) {
            builder.push(" AND name LIKE ").push_bind(like_pattern(&search));
        }
        if let Some(min) = filters.min_rating {
            builder.push(" AND rating >= ").push_bind(min);
        }
        builder.push(" ORDER BY rating DESC, name ASC");
        push_page(&mut builder, filters.limit, filters.offset);

        let result = builder
            .build_query_as::<Activity>()
            .fetch_all(&self.db)
            .await
            .map_err(AppError::from);
        logged("list_activities", result)
    }

    /// Catalog rows for the given ids. Unknown ids are simply absent.
    pub async fn activities_by_ids(&self, ids: &[String]) -> Result<Vec<Activity>, AppError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders = ids.iter().map(|_| "?").collect::<Vec<_>>().join(",");
        let query_str = format!("SELECT {ACTIVITY_COLUMNS} FROM activities WHERE id IN ({placeholders})");
        let mut query = sqlx::query_as::<_, Activity>(&query_str);
        for id in ids {
            query = query.bind(id);
        }
        let result = query.fetch_all(&self.db).await.map_err(AppError::from);
        logged("activities_by_ids", result)
    }
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
