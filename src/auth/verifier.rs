use std::{sync::Arc, time::Duration};

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    models::{Account, AccountStatus},
    store::Store,
    AppResult,
};

use super::AuthError;

/// Claims as issued by the account service: the account id and an expiry.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub id: String,
    pub exp: i64,
}

struct Keys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

/// Turns a bearer credential into an active account. Used once per gateway
/// connection attempt and once per REST request.
#[derive(Clone)]
pub struct Verifier {
    keys: Arc<Keys>,
    store: Store,
}

impl Verifier {
    pub fn new(secret: &str, store: Store) -> Verifier {
        Verifier {
            keys: Arc::new(Keys {
                encoding: EncodingKey::from_secret(secret.as_bytes()),
                decoding: DecodingKey::from_secret(secret.as_bytes()),
                validation: Validation::new(Algorithm::HS256),
            }),
            store,
        }
    }

    pub fn issue(&self, account_id: Uuid, ttl: Duration) -> AppResult<String> {
        let claims = Claims {
            id: account_id.to_string(),
            exp: OffsetDateTime::now_utc().unix_timestamp() + ttl.as_secs() as i64,
        };
        Ok(encode(&Header::new(Algorithm::HS256), &claims, &self.keys.encoding)?)
    }

    pub async fn verify(&self, token: Option<&str>) -> Result<Account, AuthError> {
        let token = token
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::MissingToken)?;

        let claims = decode::<Claims>(token, &self.keys.decoding, &self.keys.validation)
            .map_err(|err| {
                tracing::debug!(error = %err, "token rejected");
                AuthError::InvalidOrExpiredToken
            })?
            .claims;
        let account_id =
            Uuid::parse_str(&claims.id).map_err(|_| AuthError::InvalidOrExpiredToken)?;

        let account = self
            .store
            .account(account_id)
            .await
            .map_err(|err| {
                tracing::error!(error = %err, account = %account_id, "account lookup failed");
                AuthError::LookupFailed
            })?
            .ok_or(AuthError::AccountNotFound)?;

        if account.status != AccountStatus::Active {
            return Err(AuthError::AccountInactive);
        }
        Ok(account)
    }
}
