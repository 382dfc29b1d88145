use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use axum::{
    extract::{Path, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{delete, get, post, put},
    Json, Router,
};
use chrono::Utc;
use claims::{assert_err, assert_matches, assert_none, assert_ok, assert_some_eq};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use reqwest::StatusCode as ReplyStatus;
use serde_json::{json, Value};

use crate::{
    model::{Asset, AssetId, Profile, Session},
    session::{MemorySessionStore, SessionStore},
};

use super::{
    error_message, strip_quotes, wire, ApiError, AuthApi, AuthClient, Credentials, HierarchyApi,
    HierarchyClient, RestoreOutcome, UpdateAsset,
};

#[derive(Debug, Clone)]
struct Seen {
    path: String,
    authorization: Option<String>,
    body: Option<Value>,
}

type Recorder = Arc<Mutex<Vec<Seen>>>;

fn record(recorder: &Recorder, path: String, headers: &HeaderMap, body: Option<Value>) {
    recorder.lock().unwrap().push(Seen {
        path,
        authorization: headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned),
        body,
    });
}

async fn root_children(State(rec): State<Recorder>, headers: HeaderMap) -> impl IntoResponse {
    record(&rec, "GetByParentId".into(), &headers, None);
    Json(json!([{ "id": 1, "name": "Plant" }, { "Id": 2, "Name": "Depot" }]))
}

async fn children(
    State(rec): State<Recorder>,
    Path(id): Path<i64>,
    headers: HeaderMap,
) -> axum::response::Response {
    record(&rec, format!("GetByParentId/{id}"), &headers, None);
    match id {
        404 => StatusCode::NOT_FOUND.into_response(),
        400 => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "message": "\"Parent is gone\"" })),
        )
            .into_response(),
        409 => (StatusCode::CONFLICT, Json(json!({ "error": "busy" }))).into_response(),
        500 => (StatusCode::INTERNAL_SERVER_ERROR, "\"boom\"").into_response(),
        _ => Json(json!([{ "id": id * 10, "name": "Pump" }])).into_response(),
    }
}

async fn insert(
    State(rec): State<Recorder>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    record(&rec, "InsertAsset".into(), &headers, Some(body));
    (StatusCode::OK, "Asset created")
}

async fn update(
    State(rec): State<Recorder>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    record(&rec, "UpdateAsset".into(), &headers, Some(body.clone()));
    Json(json!({ "id": body["Id"], "name": body["NewName"] }))
}

async fn delete_asset(
    State(rec): State<Recorder>,
    Path(id): Path<i64>,
    headers: HeaderMap,
) -> axum::response::Response {
    record(&rec, format!("DeleteAsset/{id}"), &headers, None);
    if id == 13 {
        Json(json!(false)).into_response()
    } else {
        StatusCode::OK.into_response()
    }
}

async fn deleted(State(rec): State<Recorder>, headers: HeaderMap) -> impl IntoResponse {
    record(&rec, "GetAllDeletedAssets".into(), &headers, None);
    Json(json!({
        "DeletedAssets": [
            { "AssetId": 5, "Name": "Valve", "ParentIds": [3, 7], "Children": [{ "Id": 6, "Name": "Seal" }] },
            { "assetId": 8, "name": "Gauge", "parentIds": [] }
        ]
    }))
}

async fn restore(
    State(rec): State<Recorder>,
    Path(id): Path<i64>,
    headers: HeaderMap,
) -> axum::response::Response {
    record(&rec, format!("RetrieveDeletedAsset/{id}"), &headers, None);
    match id {
        1 => StatusCode::NO_CONTENT.into_response(),
        2 => Json(json!({
            "message": "Asset had several parents",
            "parentIds": [3, 7],
            "note": "Pick one manually"
        }))
        .into_response(),
        _ => Json(json!({ "id": id, "name": "Valve" })).into_response(),
    }
}

async fn combinations(State(rec): State<Recorder>, headers: HeaderMap) -> impl IntoResponse {
    record(&rec, "GetAllCombinationsCount".into(), &headers, None);
    Json(json!({ "totalCombinations": 42 }))
}

async fn average(
    State(rec): State<Recorder>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    record(&rec, "CalculateAverage".into(), &headers, Some(body));
    Json(json!({ "message": "Average calculation started" }))
}

async fn login(
    State(rec): State<Recorder>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> axum::response::Response {
    record(&rec, "login".into(), &headers, Some(body.clone()));
    if body["password"] == "secret1" {
        Json(json!({ "accessToken": "jwt-1", "userName": "ada", "user": { "role": "Admin" } }))
            .into_response()
    } else {
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "message": "Invalid email or password" })),
        )
            .into_response()
    }
}

async fn spawn_backend() -> (String, Recorder) {
    let recorder: Recorder = Default::default();
    let hierarchy = Router::new()
        .route("/GetByParentId", get(root_children))
        .route("/GetByParentId/:id", get(children))
        .route("/InsertAsset", post(insert))
        .route("/UpdateAsset", put(update))
        .route("/DeleteAsset/:id", delete(delete_asset))
        .route("/GetAllDeletedAssets", get(deleted))
        .route("/RetrieveDeletedAsset/:id", get(restore))
        .route("/GetAllCombinationsCount", get(combinations))
        .route("/CalculateAverage", post(average));
    let app = Router::new()
        .nest("/api/v1/AssetHierarchy", hierarchy)
        .route("/api/v1/Auth/login", post(login))
        .with_state(recorder.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{}/api/v1/", addr), recorder)
}

fn logged_in() -> Arc<dyn SessionStore> {
    Arc::new(MemorySessionStore::with_session(Session {
        token: Some("tok-123".into()),
        profile: Profile {
            email: "ada@example.com".into(),
            name: "Ada".into(),
            role: "Admin".into(),
        },
        issued_at: Utc::now(),
    }))
}

fn client(base_url: &str, session: Arc<dyn SessionStore>) -> HierarchyClient {
    assert_ok!(HierarchyClient::new(
        base_url,
        session,
        Duration::from_secs(5)
    ))
}

#[tokio::test]
async fn fetches_children_with_bearer_token() {
    let (base_url, recorder) = spawn_backend().await;
    let client = client(&base_url, logged_in());

    let top = assert_ok!(client.children_of(None).await);
    assert_eq!(top, vec![Asset::new(1, "Plant"), Asset::new(2, "Depot")]);
    let below = assert_ok!(client.children_of(Some(AssetId(3))).await);
    assert_eq!(below, vec![Asset::new(30, "Pump")]);

    let seen = recorder.lock().unwrap().clone();
    assert_eq!(seen[0].path, "GetByParentId");
    assert_eq!(seen[1].path, "GetByParentId/3");
    assert!(seen
        .iter()
        .all(|s| s.authorization.as_deref() == Some("Bearer tok-123")));
}

#[tokio::test]
async fn omits_authorization_without_session() {
    let (base_url, recorder) = spawn_backend().await;
    let client = client(&base_url, Arc::new(MemorySessionStore::new()));
    assert_ok!(client.children_of(None).await);
    assert_eq!(recorder.lock().unwrap()[0].authorization, None);
}

#[tokio::test]
async fn surfaces_server_error_messages() {
    let (base_url, _) = spawn_backend().await;
    let client = client(&base_url, logged_in());

    let err = assert_err!(client.children_of(Some(AssetId(400))).await);
    assert_eq!(err.to_string(), "Parent is gone");
    assert_eq!(err.status(), Some(400));

    let err = assert_err!(client.children_of(Some(AssetId(404))).await);
    assert_eq!(err.to_string(), "404 Not Found");
    assert_eq!(err.body_message(), None);

    let err = assert_err!(client.children_of(Some(AssetId(409))).await);
    assert_eq!(err.body_message(), Some("busy"));

    let err = assert_err!(client.children_of(Some(AssetId(500))).await);
    assert_eq!(err.to_string(), "boom");
}

#[tokio::test]
async fn text_success_bodies_are_wrapped_as_message() {
    let (base_url, recorder) = spawn_backend().await;
    let client = client(&base_url, logged_in());
    let reply = assert_ok!(client.insert(Some(AssetId(4)), "Pump").await);
    assert_eq!(reply.asset, None);
    assert_eq!(reply.message.as_deref(), Some("Asset created"));
    assert_eq!(
        recorder.lock().unwrap()[0].body,
        Some(json!({ "parentId": 4, "name": "Pump" }))
    );

    assert_ok!(client.insert(None, "Top").await);
    assert_eq!(
        recorder.lock().unwrap()[1].body,
        Some(json!({ "parentId": null, "name": "Top" }))
    );
}

#[tokio::test]
async fn update_sends_pascal_case_dto() {
    let (base_url, recorder) = spawn_backend().await;
    let client = client(&base_url, logged_in());
    let dto = UpdateAsset::rename(AssetId(9), Some(AssetId(2)), "Old", "New");
    let reply = assert_ok!(client.update(&dto).await);
    assert_eq!(reply.asset, Some(Asset::new(9, "New")));
    assert_eq!(
        recorder.lock().unwrap()[0].body,
        Some(json!({
            "Id": 9,
            "OldParentId": 2,
            "NewParentId": 2,
            "OldName": "Old",
            "NewName": "New"
        }))
    );
}

#[tokio::test]
async fn delete_treats_false_as_failure() {
    let (base_url, _) = spawn_backend().await;
    let client = client(&base_url, logged_in());
    assert_ok!(client.delete(AssetId(12)).await);
    assert_err!(client.delete(AssetId(13)).await);
}

#[tokio::test]
async fn restore_distinguishes_three_outcomes() {
    let (base_url, _) = spawn_backend().await;
    let client = client(&base_url, logged_in());

    assert_eq!(
        assert_ok!(client.restore(AssetId(1)).await),
        RestoreOutcome::NoContent
    );
    assert_eq!(
        assert_ok!(client.restore(AssetId(2)).await),
        RestoreOutcome::Notice {
            message: "Asset had several parents".into(),
            parent_ids: vec![AssetId(3), AssetId(7)],
            note: Some("Pick one manually".into()),
        }
    );
    assert_eq!(
        assert_ok!(client.restore(AssetId(5)).await),
        RestoreOutcome::Restored(Asset::new(5, "Valve"))
    );
}

#[tokio::test]
async fn deleted_assets_are_normalized() {
    let (base_url, _) = spawn_backend().await;
    let client = client(&base_url, logged_in());
    let deleted = assert_ok!(client.deleted().await);
    assert_eq!(deleted.len(), 2);
    assert_eq!(deleted[0].asset_id, AssetId(5));
    assert_eq!(deleted[0].parent_ids, vec![AssetId(3), AssetId(7)]);
    assert_eq!(deleted[0].children, vec![Asset::new(6, "Seal")]);
    assert_eq!(deleted[1].name, "Gauge");
    assert!(deleted[1].parent_ids.is_empty());
}

#[tokio::test]
async fn aggregates() {
    let (base_url, recorder) = spawn_backend().await;
    let client = client(&base_url, logged_in());
    assert_eq!(assert_ok!(client.combinations_count().await), Some(42));
    let reply = assert_ok!(client.average("temperature").await);
    assert_eq!(
        reply.message.as_deref(),
        Some("Average calculation started")
    );
    assert_eq!(
        recorder.lock().unwrap()[1].body,
        Some(json!("temperature"))
    );
}

#[tokio::test]
async fn unreachable_server_is_a_network_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let client = client(&format!("http://{}/api/v1", addr), logged_in());
    let err = assert_err!(client.children_of(None).await);
    assert_matches!(&err, ApiError::Network(_));
    assert_eq!(err.to_string(), "Network or server error");
}

#[tokio::test]
async fn login_returns_session_without_sending_token() {
    let (base_url, recorder) = spawn_backend().await;
    let auth = assert_ok!(AuthClient::new(&base_url, Duration::from_secs(5)));
    let session = assert_ok!(
        auth.login(&Credentials {
            email: "ada@example.com".into(),
            password: "secret1".into(),
        })
        .await
    );
    assert_eq!(session.token.as_deref(), Some("jwt-1"));
    assert_eq!(session.profile.name, "ada");
    assert_eq!(session.profile.role, "Admin");
    assert_eq!(recorder.lock().unwrap()[0].authorization, None);

    let err = assert_err!(
        auth.login(&Credentials {
            email: "ada@example.com".into(),
            password: "wrong".into(),
        })
        .await
    );
    assert_eq!(err.to_string(), "Invalid email or password");
}

#[test]
fn restore_notice_without_message_gets_default() {
    assert_eq!(
        wire::restore_outcome(&json!({})),
        RestoreOutcome::Notice {
            message: "Restore request completed".into(),
            parent_ids: vec![],
            note: None,
        }
    );
}

#[test]
fn push_payload_labels() {
    use wire::{asset_label, AssetLabel};

    assert_some_eq!(asset_label(&json!("Pump")), AssetLabel::Name("Pump".into()));
    assert_some_eq!(asset_label(&json!(7)), AssetLabel::Id(7));
    assert_some_eq!(
        asset_label(&json!([null, { "AssetId": 3 }])),
        AssetLabel::Id(3)
    );
    assert_some_eq!(
        asset_label(&json!({ "id": 5, "deviceName": "Fan" })),
        AssetLabel::Name("Fan".into())
    );
    assert_some_eq!(
        asset_label(&json!({ "id": "12", "device": { "Name": "Valve" } })),
        AssetLabel::Name("Valve".into())
    );
    assert_none!(asset_label(&json!({ "name": "  " })));
    assert_none!(asset_label(&Value::Null));
}

#[test]
fn session_falls_back_to_email_local_part() {
    let session = wire::session(&json!({}), "grace@example.com", None);
    assert_eq!(session.token, None);
    assert_eq!(session.profile.name, "grace");
    assert_eq!(session.profile.role, "User");
}

#[test]
fn empty_error_body_uses_status_line() {
    assert_eq!(
        error_message(ReplyStatus::SERVICE_UNAVAILABLE, "  "),
        "503 Service Unavailable"
    );
    // JSON without a usable field is treated like no body
    assert_eq!(
        error_message(ReplyStatus::BAD_REQUEST, r#"{"title":"x"}"#),
        "400 Bad Request"
    );
}

#[test]
fn only_wrapping_quotes_are_stripped() {
    assert_eq!(
        error_message(
            ReplyStatus::BAD_REQUEST,
            r#"{"message":"Duplicate name \"Pump\""}"#
        ),
        r#"Duplicate name "Pump""#
    );
    assert_eq!(
        error_message(ReplyStatus::CONFLICT, r#""'Line A' is in use""#),
        "'Line A' is in use"
    );
    assert_eq!(strip_quotes("'Pump'"), "Pump");
    assert_eq!(strip_quotes("\"Pump'"), "\"Pump'");
    assert_eq!(strip_quotes("\""), "\"");
}

proptest! {
    #[test]
    fn json_message_field_is_surfaced_without_quotes(
        code in 400u16..600,
        message in "[A-Za-z0-9][A-Za-z0-9 .,!-]{0,40}[A-Za-z0-9.!]",
        field in prop::sample::select(vec!["message", "error"]),
        quoted in any::<bool>(),
    ) {
        let status = ReplyStatus::from_u16(code).unwrap();
        let inner = if quoted { format!("\"{message}\"") } else { message.clone() };
        let body = json!({ field: inner }).to_string();
        prop_assert_eq!(error_message(status, &body), message);
    }

    #[test]
    fn missing_body_is_status_and_reason(code in 400u16..600) {
        let status = ReplyStatus::from_u16(code).unwrap();
        let expected = format!("{} {}", code, status.canonical_reason().unwrap_or("Unknown Status"));
        prop_assert_eq!(error_message(status, ""), expected);
    }
}
