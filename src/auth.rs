use async_trait::async_trait;
use axum::{extract::FromRequestParts, http::request::Parts};

use crate::error::AppError;

/// Header the upstream auth gateway fills with the signed-in user's id.
pub const USER_HEADER: &str = "x-travia-user";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub id: String,
}

#[derive(Debug, Clone, Default)]
pub struct CurrentUser(pub Option<AuthenticatedUser>);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<AuthenticatedUser>() {
            return Ok(Self(Some(user.clone())));
        }

        let from_header = parts
            .headers
            .get(USER_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(|id| AuthenticatedUser { id: id.to_string() });

        Ok(Self(from_header))
    }
}

impl CurrentUser {
    pub fn require_user(&self) -> Result<&AuthenticatedUser, AppError> {
        self.0.as_ref().ok_or(AppError::Unauthorized)
    }

    pub fn is_signed_in(&self) -> bool {
        self.0.is_some()
    }
}

#[cfg(test)]
mod tests {
    use axum::http::Request;

    use super::*;

    async fn extract(request: Request<()>) -> CurrentUser {
        let (mut parts, _) = request.into_parts();
        CurrentUser::from_request_parts(&mut parts, &()).await.unwrap()
    }

    #[tokio::test]
    async fn reads_user_from_gateway_header() {
        let request = Request::builder()
            .header(USER_HEADER, " user-42 ")
            .body(())
            .unwrap();
        let current = extract(request).await;
        assert_eq!(current.require_user().unwrap().id, "user-42");
    }

    #[tokio::test]
    async fn anonymous_requests_are_unauthorized() {
        let current = extract(Request::builder().body(()).unwrap()).await;
        assert!(matches!(current.require_user(), Err(AppError::Unauthorized)));

        let blank = extract(Request::builder().header(USER_HEADER, "  ").body(()).unwrap()).await;
        assert!(!blank.is_signed_in());
    }
}
