pub mod appresult;
pub mod auth;
pub mod broadcast;
pub mod config;
pub mod conversations;
pub mod delivery;
pub mod extract;
pub mod gateway;
pub mod messages;
pub mod models;
pub mod store;

use std::sync::Arc;

use axum::{debug_handler, extract::FromRef, routing::get, Router};
use serde_json::Value;

pub use appresult::{AppError, AppResult};

use auth::Verifier;
use config::Heartbeat;
use delivery::Messenger;
use gateway::Hub;
use store::Store;

#[derive(Clone, FromRef)]
pub struct AppState {
    pub store: Store,
    pub verifier: Verifier,
    pub hub: Hub,
    pub messenger: Messenger,
    pub heartbeat: Heartbeat,
}

impl AppState {
    /// Spawns the hub, so this has to run inside a tokio runtime.
    pub fn new(store: Store, verifier: Verifier, heartbeat: Heartbeat) -> AppState {
        let hub = Hub::spawn();
        let messenger = Messenger::new(store.clone(), Arc::new(hub.clone()));
        AppState {
            store,
            verifier,
            hub,
            messenger,
            heartbeat,
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(health))
        .route("/ws", get(gateway::gateway_ws))
        .nest("/api/conversations", conversations::router())
        .nest("/api/messages", messages::router())
        .with_state(state)
}

#[debug_handler]
async fn health() -> &'static str {
    "API is running..."
}

pub trait GetField {
    fn get_str_field(&self, field: &str) -> AppResult<String>;
    fn get_opt_str_field(&self, field: &str) -> AppResult<Option<String>>;
}

impl GetField for serde_json::Value {
    fn get_str_field(&self, field: &str) -> AppResult<String> {
        Ok(self
            .get(field)
            .ok_or_else(|| AppError::validation(format!("expected {field} in {self}")))?
            .as_str()
            .ok_or_else(|| AppError::validation(format!("expected {field} in {self} to be string")))?
            .to_owned())
    }

    fn get_opt_str_field(&self, field: &str) -> AppResult<Option<String>> {
        match self.get(field) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(value)) => Ok(Some(value.clone())),
            Some(_) => Err(AppError::validation(format!(
                "expected {field} in {self} to be string"
            ))),
        }
    }
}
