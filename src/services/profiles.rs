use crate::{
    db::DbPool,
    error::AppError,
    models::profile::{Profile, ProfileUpdate},
    services::logged,
};

const PROFILE_COLUMNS: &str =
    "id, user_id, full_name, avatar_url, preferred_currency, created_at, updated_at";

#[derive(Clone)]
pub struct ProfileService {
    db: DbPool,
    default_currency: String,
}

impl ProfileService {
    pub fn new(db: DbPool, default_currency: impl Into<String>) -> Self {
        Self {
            db,
            default_currency: default_currency.into(),
        }
    }

    pub async fn get_by_user(&self, user_id: &str) -> Result<Option<Profile>, AppError> {
        let result = sqlx::query_as::<_, Profile>(&format!(
            "SELECT {PROFILE_COLUMNS} FROM profiles WHERE user_id = ?1"
        ))
        .bind(user_id)
        .fetch_optional(&self.db)
        .await
        .map_err(AppError::from);
        logged("get_profile", result)
    }

    /// Existing profile, or a fresh unsaved one carrying the default currency.
    pub async fn get_or_default(&self, user_id: &str) -> Result<Profile, AppError> {
        Ok(self
            .get_by_user(user_id)
            .await?
            .unwrap_or_else(|| Profile::new(user_id, self.default_currency.clone())))
    }

    pub async fn upsert(&self, user_id: &str, update: ProfileUpdate) -> Result<Profile, AppError> {
        if let Some(currency) = &update.preferred_currency {
            if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_alphabetic()) {
                return Err(AppError::validation("currency must be a three letter code"));
            }
        }
        let mut profile = self.get_or_default(user_id).await?;
        profile.apply(update);
        let result = sqlx::query(
            r#"INSERT INTO profiles (id, user_id, full_name, avatar_url, preferred_currency, created_at, updated_at)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
               ON CONFLICT(user_id) DO UPDATE SET
                   full_name = excluded.full_name,
                   avatar_url = excluded.avatar_url,
                   preferred_currency = excluded.preferred_currency,
                   updated_at = excluded.updated_at"#,
        )
        .bind(&profile.id)
        .bind(&profile.user_id)
        .bind(&profile.full_name)
        .bind(&profile.avatar_url)
        .bind(&profile.preferred_currency)
        .bind(profile.created_at)
        .bind(profile.updated_at)
        .execute(&self.db)
        .await
        .map_err(AppError::from);
        logged("update_profile", result)?;
        Ok(profile)
    }
}
