use std::collections::HashMap;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::{
    db::DbPool,
    error::AppError,
    models::{
        catalog::Activity,
        stop::{
            attach_activities, JoinedStopActivity, NewStop, Stop, StopActivity, StopUpdate,
            StopWithActivities,
        },
    },
    services::{catalog::CatalogService, logged},
};

const STOP_COLUMNS: &str = "id, trip_id, city_id, city_name, country, arrival_date, departure_date, \
     order_index, notes, accommodation_cost, transport_cost, created_at";

const STOP_ACTIVITY_COLUMNS: &str = "id, stop_id, activity_id, custom_name, custom_cost, \
     scheduled_date, scheduled_time, notes, created_at";

/// Batch join of stop activities with the catalog rows they reference.
#[async_trait]
pub trait StopActivityResolver: Send + Sync {
    async fn resolve_stop_activities(
        &self,
        stop_ids: &[String],
    ) -> Result<Vec<JoinedStopActivity>, AppError>;
}

/// Stops of one trip with their activities resolved, in stop order.
pub async fn load_with_activities<R>(
    resolver: &R,
    stops: Vec<Stop>,
) -> Result<Vec<StopWithActivities>, AppError>
where
    R: StopActivityResolver + ?Sized,
{
    let stop_ids: Vec<String> = stops.iter().map(|stop| stop.id.clone()).collect();
    let activities = resolver.resolve_stop_activities(&stop_ids).await?;
    Ok(attach_activities(stops, activities))
}

#[derive(Clone)]
pub struct StopService {
    db: DbPool,
    catalog: CatalogService,
}

impl StopService {
    pub fn new(db: DbPool, catalog: CatalogService) -> Self {
        Self { db, catalog }
    }

    pub async fn list_for_trip(&self, trip_id: &str) -> Result<Vec<Stop>, AppError> {
        let result = sqlx::query_as::<_, Stop>(&format!(
            "SELECT {STOP_COLUMNS} FROM trip_stops WHERE trip_id = ?1 ORDER BY order_index ASC, created_at ASC"
        ))
        .bind(trip_id)
        .fetch_all(&self.db)
        .await
        .map_err(AppError::from);
        logged("list_stops", result)
    }

    pub async fn load_trip_itinerary(&self, trip_id: &str) -> Result<Vec<StopWithActivities>, AppError> {
        let stops = self.list_for_trip(trip_id).await?;
        load_with_activities(self, stops).await
    }

    pub async fn get(&self, id: &str) -> Result<Stop, AppError> {
        let result = sqlx::query_as::<_, Stop>(&format!("SELECT {STOP_COLUMNS} FROM trip_stops WHERE id = ?1"))
            .bind(id)
            .fetch_optional(&self.db)
            .await
            .map_err(AppError::from)
            .and_then(|row| row.ok_or(AppError::NotFound("trip stop")));
        logged("get_stop", result)
    }

    /// Appends a stop. Without an explicit `order_index` it goes after the
    /// trip's current last stop.
    pub async fn create(&self, input: NewStop) -> Result<Stop, AppError> {
        let input = input.validate()?;
        let order_index = match input.order_index {
            Some(index) => index,
            None => self.next_order_index(&input.trip_id).await?,
        };
        let stop = Stop::new(input, order_index);
        let result = sqlx::query(
            r#"INSERT INTO trip_stops (id, trip_id, city_id, city_name, country, arrival_date, departure_date, order_index, notes, accommodation_cost, transport_cost, created_at)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)"#,
        )
        .bind(&stop.id)
        .bind(&stop.trip_id)
        .bind(&stop.city_id)
        .bind(&stop.city_name)
        .bind(&stop.country)
        .bind(stop.arrival_date)
        .bind(stop.departure_date)
        .bind(stop.order_index)
        .bind(&stop.notes)
        .bind(stop.accommodation_cost)
        .bind(stop.transport_cost)
        .bind(stop.created_at)
        .execute(&self.db)
        .await
        .map_err(AppError::from);
        logged("create_stop", result)?;
        info!(stop_id = %stop.id, trip_id = %stop.trip_id, "stop created");
        Ok(stop)
    }

    async fn next_order_index(&self, trip_id: &str) -> Result<i64, AppError> {
        let result = sqlx::query_scalar::<_, Option<i64>>(
            "SELECT MAX(order_index) FROM trip_stops WHERE trip_id = ?1",
        )
        .bind(trip_id)
        .fetch_one(&self.db)
        .await
        .map_err(AppError::from);
        Ok(logged("next_order_index", result)?.map_or(0, |max| max + 1))
    }

    pub async fn update(&self, id: &str, update: StopUpdate) -> Result<Stop, AppError> {
        let mut stop = self.get(id).await?;
        stop.apply(update)?;
        let result = sqlx::query(
            r#"UPDATE trip_stops SET city_id = ?1, city_name = ?2, country = ?3, arrival_date = ?4,
                   departure_date = ?5, order_index = ?6, notes = ?7, accommodation_cost = ?8,
                   transport_cost = ?9
               WHERE id = ?10"#,
        )
        .bind(&stop.city_id)
        .bind(&stop.city_name)
        .bind(&stop.country)
        .bind(stop.arrival_date)
        .bind(stop.departure_date)
        .bind(stop.order_index)
        .bind(&stop.notes)
        .bind(stop.accommodation_cost)
        .bind(stop.transport_cost)
        .bind(&stop.id)
        .execute(&self.db)
        .await
        .map_err(AppError::from);
        logged("update_stop", result)?;
        Ok(stop)
    }

    pub async fn delete(&self, id: &str) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM trip_stops WHERE id = ?1")
            .bind(id)
            .execute(&self.db)
            .await
            .map_err(AppError::from);
        logged("delete_stop", result)?;
        Ok(())
    }

    pub async fn add_activity(
        &self,
        stop_id: &str,
        activity_id: Option<String>,
        custom_cost: Option<f64>,
    ) -> Result<StopActivity, AppError> {
        let stop_activity = StopActivity::new(stop_id, activity_id, custom_cost);
        let result = sqlx::query(
            r#"INSERT INTO stop_activities (id, stop_id, activity_id, custom_name, custom_cost, scheduled_date, scheduled_time, notes, created_at)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"#,
        )
        .bind(&stop_activity.id)
        .bind(&stop_activity.stop_id)
        .bind(&stop_activity.activity_id)
        .bind(&stop_activity.custom_name)
        .bind(stop_activity.custom_cost)
        .bind(stop_activity.scheduled_date)
        .bind(&stop_activity.scheduled_time)
        .bind(&stop_activity.notes)
        .bind(stop_activity.created_at)
        .execute(&self.db)
        .await
        .map_err(AppError::from);
        logged("add_activity_to_stop", result)?;
        Ok(stop_activity)
    }

    pub async fn get_activity(&self, id: &str) -> Result<StopActivity, AppError> {
        let result = sqlx::query_as::<_, StopActivity>(&format!(
            "SELECT {STOP_ACTIVITY_COLUMNS} FROM stop_activities WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .map_err(AppError::from)
        .and_then(|row| row.ok_or(AppError::NotFound("stop activity")));
        logged("get_stop_activity", result)
    }

    pub async fn remove_activity(&self, stop_activity_id: &str) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM stop_activities WHERE id = ?1")
            .bind(stop_activity_id)
            .execute(&self.db)
            .await
            .map_err(AppError::from);
        logged("remove_activity_from_stop", result)?;
        Ok(())
    }

    async fn fetch_stop_activities(&self, stop_ids: &[String]) -> Result<Vec<StopActivity>, AppError> {
        if stop_ids.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders = stop_ids.iter().map(|_| "?").collect::<Vec<_>>().join(",");
        let query_str = format!(
            "SELECT {STOP_ACTIVITY_COLUMNS} FROM stop_activities WHERE stop_id IN ({placeholders}) ORDER BY created_at ASC"
        );
        let mut query = sqlx::query_as::<_, StopActivity>(&query_str);
        for id in stop_ids {
            query = query.bind(id);
        }
        Ok(query.fetch_all(&self.db).await?)
    }
}

#[async_trait]
impl StopActivityResolver for StopService {
    async fn resolve_stop_activities(
        &self,
        stop_ids: &[String],
    ) -> Result<Vec<JoinedStopActivity>, AppError> {
        let stop_activities = logged(
            "resolve_stop_activities",
            self.fetch_stop_activities(stop_ids).await,
        )?;

        let mut activity_ids: Vec<String> = stop_activities
            .iter()
            .filter_map(|sa| sa.activity_id.clone())
            .collect();
        activity_ids.sort();
        activity_ids.dedup();

        let catalog: HashMap<String, Activity> = self
            .catalog
            .activities_by_ids(&activity_ids)
            .await?
            .into_iter()
            .map(|activity| (activity.id.clone(), activity))
            .collect();

        let joined: Vec<JoinedStopActivity> = stop_activities
            .into_iter()
            .map(|stop_activity| {
                let activity = stop_activity
                    .activity_id
                    .as_ref()
                    .and_then(|id| catalog.get(id).cloned());
                if stop_activity.activity_id.is_some() && activity.is_none() {
                    debug!(stop_activity_id = %stop_activity.id, "catalog activity missing, costing as zero");
                }
                JoinedStopActivity {
                    stop_activity,
                    activity,
                }
            })
            .collect();
        Ok(joined)
    }
}
