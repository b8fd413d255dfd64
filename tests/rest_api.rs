mod common;

use std::time::Duration;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;
use tradewinds::{
    auth::Verifier,
    config::Heartbeat,
    models::{Account, AccountStatus},
    router,
    store::Store,
    AppState,
};

use common::{account, active};

struct Api {
    app: Router,
    store: Store,
    verifier: Verifier,
}

impl Api {
    async fn new() -> Api {
        let store = Store::memory().await.unwrap();
        let verifier = Verifier::new("rest-secret", store.clone());
        let state = AppState::new(store.clone(), verifier.clone(), Heartbeat::default());
        Api {
            app: router(state),
            store,
            verifier,
        }
    }

    fn token(&self, account: &Account) -> String {
        self.verifier.issue(account.id, Duration::from_secs(3600)).unwrap()
    }

    async fn call(
        &self,
        method: Method,
        uri: &str,
        caller: Option<&Account>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(caller) = caller {
            request = request.header(header::AUTHORIZATION, format!("Bearer {}", self.token(caller)));
        }
        let request = match body {
            Some(body) => request
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => request.body(Body::empty()).unwrap(),
        };

        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()));
        (status, body)
    }
}

#[tokio::test]
async fn health_check_answers_plain_text() {
    let api = Api::new().await;
    let (status, body) = api.call(Method::GET, "/", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "API is running...");
}

#[tokio::test]
async fn requests_without_a_valid_account_are_unauthorized() {
    let api = Api::new().await;

    let (status, body) = api.call(Method::GET, "/api/conversations", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "missing_token");

    let suspended = account(&api.store, "Sam", AccountStatus::Suspended).await;
    let (status, body) = api
        .call(Method::GET, "/api/conversations", Some(&suspended), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "account_inactive");
}

#[tokio::test]
async fn a_conversation_round_trip_over_rest() {
    let api = Api::new().await;
    let customer = active(&api.store, "Amira").await;
    let worker = active(&api.store, "Kofi").await;

    let (status, conversation) = api
        .call(
            Method::POST,
            "/api/conversations",
            Some(&customer),
            Some(json!({ "participantId": worker.id, "initialMessage": "Hello" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = conversation["_id"].as_str().unwrap().to_owned();
    assert_eq!(conversation["otherParticipants"][0]["_id"], worker.id.to_string());
    assert_eq!(conversation["lastMessage"]["content"], "Hello");

    let (status, message) = api
        .call(
            Method::POST,
            &format!("/api/messages/{id}"),
            Some(&customer),
            Some(json!({ "content": "Tomorrow at nine?" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(message["content"], "Tomorrow at nine?");
    assert_eq!(message["sender"]["firstName"], "Amira");

    let (status, listed) = api
        .call(Method::GET, "/api/conversations", Some(&worker), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed[0]["unread"], true);

    let (status, page) = api
        .call(Method::GET, &format!("/api/messages/{id}?page=1&limit=1"), Some(&worker), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["pagination"], json!({ "total": 2, "page": 1, "pages": 2 }));
    assert_eq!(page["messages"][0]["content"], "Tomorrow at nine?");

    let (status, read) = api
        .call(Method::PUT, &format!("/api/messages/{id}/read"), Some(&worker), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(read, json!({ "message": "Messages marked as read", "count": 1 }));

    let (status, detail) = api
        .call(Method::GET, &format!("/api/conversations/{id}"), Some(&worker), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(detail["messages"].as_array().unwrap().len(), 2);
    assert_eq!(detail["conversation"]["unread"], false);

    let (status, archived) = api
        .call(Method::PUT, &format!("/api/conversations/{id}/archive"), Some(&worker), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(archived["message"], "Conversation archived successfully");

    let (_, listed) = api
        .call(Method::GET, "/api/conversations", Some(&customer), None)
        .await;
    assert_eq!(listed, json!([]));
}

#[tokio::test]
async fn outsiders_and_bad_input_get_client_errors() {
    let api = Api::new().await;
    let customer = active(&api.store, "Amira").await;
    let worker = active(&api.store, "Kofi").await;
    let outsider = active(&api.store, "Lena").await;

    let (status, body) = api
        .call(Method::POST, "/api/conversations", Some(&customer), Some(json!({})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Participant ID is required");

    let (_, conversation) = api
        .call(
            Method::POST,
            "/api/conversations",
            Some(&customer),
            Some(json!({ "participantId": worker.id })),
        )
        .await;
    let id = conversation["_id"].as_str().unwrap().to_owned();

    let (status, body) = api
        .call(Method::GET, &format!("/api/conversations/{id}"), Some(&outsider), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "forbidden");

    let (status, _) = api
        .call(
            Method::POST,
            &format!("/api/messages/{id}"),
            Some(&customer),
            Some(json!({ "content": "   " })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = api
        .call(
            Method::POST,
            "/api/conversations",
            Some(&customer),
            Some(json!({ "participantId": uuid::Uuid::now_v7() })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "User not found");
}

#[tokio::test]
async fn malformed_ids_queries_and_bodies_are_json_validation_errors() {
    let api = Api::new().await;
    let customer = active(&api.store, "Amira").await;
    let worker = active(&api.store, "Kofi").await;

    let (status, body) = api
        .call(Method::GET, "/api/conversations/not-a-uuid", Some(&customer), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.is_object(), "{body}");
    assert_eq!(body["code"], "validation");

    let (status, body) = api
        .call(
            Method::POST,
            "/api/conversations",
            Some(&customer),
            Some(json!({ "participantId": "nope" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "validation");
    assert!(body["message"].is_string());

    let (_, conversation) = api
        .call(
            Method::POST,
            "/api/conversations",
            Some(&customer),
            Some(json!({ "participantId": worker.id })),
        )
        .await;
    let id = conversation["_id"].as_str().unwrap().to_owned();

    let (status, body) = api
        .call(Method::GET, &format!("/api/messages/{id}?page=first"), Some(&customer), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "validation");

    let (status, body) = api
        .call(
            Method::POST,
            &format!("/api/messages/{id}"),
            Some(&customer),
            Some(json!({ "content": 42 })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "validation");
}
