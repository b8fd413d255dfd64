use axum::{
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};

use crate::{models::Account, AppError};

use super::{bearer, Verifier};

/// The authenticated caller of a REST request.
pub struct CurrentUser(pub Account);

impl<S> FromRequestParts<S> for CurrentUser
where
    Verifier: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let verifier = Verifier::from_ref(state);
        let account = verifier.verify(bearer(&parts.headers)).await?;
        Ok(CurrentUser(account))
    }
}
