pub mod catalog;
pub mod profiles;
pub mod stops;
pub mod trips;

use tracing::error;

use crate::error::AppError;

/// Offset without a limit still pages through results ten at a time.
pub(crate) const DEFAULT_PAGE_SIZE: i64 = 10;

/// Logs a failed storage call with the operation that issued it and hands
/// the error back unchanged.
pub(crate) fn logged<T>(operation: &'static str, result: Result<T, AppError>) -> Result<T, AppError> {
    if let Err(err) = &result {
        match err {
            AppError::NotFound(_) | AppError::Forbidden | AppError::Validation(_) => {}
            _ => error!(operation, "storage call failed: {err}"),
        }
    }
    result
}

/// Appends `LIMIT`/`OFFSET` the way the listing pages expect them.
pub(crate) fn push_page(
    builder: &mut sqlx::QueryBuilder<'_, sqlx::Sqlite>,
    limit: Option<i64>,
    offset: Option<i64>,
) {
    match (limit, offset) {
        (limit, Some(offset)) if offset > 0 => {
            builder
                .push(" LIMIT ")
                .push_bind(limit.unwrap_or(DEFAULT_PAGE_SIZE))
                .push(" OFFSET ")
                .push_bind(offset);
        }
        (Some(limit), _) => {
            builder.push(" LIMIT ").push_bind(limit);
        }
        (None, _) => {}
    }
}

pub(crate) fn like_pattern(search: &str) -> String {
    format!("%{}%", search.trim())
}
