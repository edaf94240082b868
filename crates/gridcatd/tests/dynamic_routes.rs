//! Dynamic route regression tests.
//!
//! Drives the full API router against an in-memory SQLite catalog:
//! registration, invocation, failure isolation and concurrent
//! registration.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use gridcat_api::{ApiState, build_router};
use gridcat_routes::{QueryPolicy, Registrar, RouteTable};
use gridcat_store::{QueryExecutor, SqliteExecutor};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

const ACTIVE_SUBS: &str = "SELECT substation_name FROM substations WHERE status = :status";

async fn test_router(policy: QueryPolicy) -> Router {
    let executor = SqliteExecutor::in_memory().await.unwrap();
    for statement in [
        "CREATE TABLE substations (
            substation_id INTEGER PRIMARY KEY,
            substation_name TEXT NOT NULL,
            voltage_level_kv REAL NOT NULL,
            status TEXT NOT NULL DEFAULT 'Active'
        )",
        "INSERT INTO substations (substation_name, voltage_level_kv, status) VALUES
            ('Central', 115.0, 'Active'),
            ('North', 69.0, 'Retired'),
            ('Eastside', 230.0, 'Active')",
    ] {
        executor.run_statement(statement).await.unwrap();
    }
    let executor: Arc<dyn QueryExecutor> = Arc::new(executor);
    let state = ApiState::new(executor, Registrar::new(RouteTable::new(), policy));
    build_router(state, Duration::from_secs(30))
}

async fn router() -> Router {
    test_router(QueryPolicy::Unrestricted).await
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn register(name: &str, sql: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/create-endpoint/")
        .header("content-type", "application/json")
        .body(Body::from(
            serde_json::to_vec(&json!({ "name": name, "sql": sql })).unwrap(),
        ))
        .unwrap()
}

async fn send_raw(router: &Router, req: Request<Body>) -> (StatusCode, String) {
    let resp = router.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    (status, String::from_utf8(bytes.to_vec()).unwrap())
}

async fn send(router: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let (status, text) = send_raw(router, req).await;
    let body = if text.is_empty() {
        Value::Null
    } else {
        serde_json::from_str(&text).unwrap()
    };
    (status, body)
}

fn sorted_names(body: &Value) -> Vec<String> {
    let mut names: Vec<String> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|row| row["substation_name"].as_str().unwrap().to_string())
        .collect();
    names.sort();
    names
}

#[tokio::test]
async fn root_reports_liveness() {
    let router = router().await;
    let (status, body) = send(&router, get("/")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "message": "Electric Network API is running" }));
}

#[tokio::test]
async fn active_subs_returns_matching_substations() {
    let router = router().await;

    let (status, body) = send(&router, register("active_subs", ACTIVE_SUBS)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({ "message": "Dynamic GET endpoint created at /api/custom/active_subs" })
    );

    let (status, body) = send(&router, get("/api/custom/active_subs?status=Active")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(sorted_names(&body), ["Central", "Eastside"]);
    for row in body.as_array().unwrap() {
        assert_eq!(row.as_object().unwrap().len(), 1);
    }
}

#[tokio::test]
async fn second_registration_is_rejected_and_original_kept() {
    let router = router().await;
    send(&router, register("active_subs", ACTIVE_SUBS)).await;

    let (status, body) = send(
        &router,
        register("active_subs", "SELECT substation_id FROM substations"),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "detail": "Endpoint already exists" }));

    let (status, body) = send(&router, get("/api/custom/active_subs?status=Retired")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([{ "substation_name": "North" }]));
}

#[tokio::test]
async fn route_without_parameters_runs_with_empty_set() {
    let router = router().await;
    send(&router, register("sub_count", "SELECT COUNT(*) AS n FROM substations")).await;

    let (status, body) = send(&router, get("/api/custom/sub_count")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([{ "n": 3 }]));
}

#[tokio::test]
async fn unknown_route_is_not_found() {
    let router = router().await;
    let (status, body) = send(&router, get("/api/custom/never_registered")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({ "detail": "Not Found" }));
}

#[tokio::test]
async fn broken_query_fails_per_request_only() {
    let router = router().await;
    send(&router, register("broken", "SELECT * FROM nonexistent_table")).await;
    send(&router, register("active_subs", ACTIVE_SUBS)).await;

    for _ in 0..2 {
        let (status, body) = send(&router, get("/api/custom/broken")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        let detail = body["detail"].as_str().unwrap();
        assert!(detail.starts_with("Database error: "), "{detail}");
        assert!(detail.contains("nonexistent_table"), "{detail}");
    }

    let (status, body) = send(&router, get("/api/custom/active_subs?status=Active")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 2);

    let (_, list) = send(&router, get("/api/endpoints/")).await;
    let names: Vec<_> = list
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["name"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(names, ["broken", "active_subs"]);
}

#[tokio::test]
async fn missing_parameter_is_database_error() {
    let router = router().await;
    send(&router, register("active_subs", ACTIVE_SUBS)).await;

    let (status, body) = send(&router, get("/api/custom/active_subs")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        body["detail"],
        "Database error: a value is required for bind parameter 'status'"
    );
}

#[tokio::test]
async fn extra_parameters_are_ignored_and_last_value_wins() {
    let router = router().await;
    send(&router, register("active_subs", ACTIVE_SUBS)).await;

    let (status, body) = send(
        &router,
        get("/api/custom/active_subs?status=Retired&unused=1&status=Active"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(sorted_names(&body), ["Central", "Eastside"]);
}

#[tokio::test]
async fn columns_keep_select_list_order() {
    let router = router().await;
    send(
        &router,
        register(
            "ordered",
            "SELECT status, substation_name, substation_id FROM substations WHERE substation_id = 1",
        ),
    )
    .await;

    let (status, text) = send_raw(&router, get("/api/custom/ordered")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        text,
        r#"[{"status":"Active","substation_name":"Central","substation_id":1}]"#
    );
}

#[tokio::test]
async fn casts_and_literals_are_not_parameters() {
    let router = router().await;
    send(
        &router,
        register(
            "next",
            "SELECT CAST(:n AS INTEGER) + 1 AS m, ':not_a_param' AS label",
        ),
    )
    .await;

    let (status, body) = send(&router, get("/api/custom/next?n=41")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([{ "m": 42, "label": ":not_a_param" }]));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn invocations_do_not_share_parameters() {
    let router = router().await;
    send(&router, register("active_subs", ACTIVE_SUBS)).await;

    let mut handles = Vec::new();
    for i in 0..20 {
        let router = router.clone();
        let status = if i % 2 == 0 { "Active" } else { "Retired" };
        handles.push(tokio::spawn(async move {
            let uri = format!("/api/custom/active_subs?status={status}");
            let (code, body) = send(&router, get(&uri)).await;
            (status, code, body)
        }));
    }

    for handle in handles {
        let (status, code, body) = handle.await.unwrap();
        assert_eq!(code, StatusCode::OK);
        let expected: &[&str] = if status == "Active" {
            &["Central", "Eastside"]
        } else {
            &["North"]
        };
        assert_eq!(sorted_names(&body), expected);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_same_name_registers_once() {
    let router = router().await;

    let handles: Vec<_> = (0..16)
        .map(|i| {
            let router = router.clone();
            tokio::spawn(async move {
                let sql = format!("SELECT {i} AS winner");
                send(&router, register("contested", &sql)).await.0
            })
        })
        .collect();

    let mut ok = 0;
    for handle in handles {
        let status = handle.await.unwrap();
        if status == StatusCode::OK {
            ok += 1;
        } else {
            assert_eq!(status, StatusCode::BAD_REQUEST);
        }
    }
    assert_eq!(ok, 1);

    let (status, body) = send(&router, get("/api/custom/contested")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_distinct_names_are_independent() {
    let router = router().await;

    let a = tokio::spawn({
        let router = router.clone();
        async move { send(&router, register("route_a", "SELECT 'a' AS v")).await.0 }
    });
    let b = tokio::spawn({
        let router = router.clone();
        async move { send(&router, register("route_b", "SELECT 'b' AS v")).await.0 }
    });
    assert_eq!(a.await.unwrap(), StatusCode::OK);
    assert_eq!(b.await.unwrap(), StatusCode::OK);

    let (_, body) = send(&router, get("/api/custom/route_a")).await;
    assert_eq!(body, json!([{ "v": "a" }]));
    let (_, body) = send(&router, get("/api/custom/route_b")).await;
    assert_eq!(body, json!([{ "v": "b" }]));
}

#[tokio::test]
async fn endpoint_listing_describes_routes() {
    let router = router().await;
    send(&router, register("active_subs", ACTIVE_SUBS)).await;

    let (status, body) = send(&router, get("/api/endpoints/")).await;
    assert_eq!(status, StatusCode::OK);
    let entry = &body[0];
    assert_eq!(entry["name"], "active_subs");
    assert_eq!(entry["path"], "/api/custom/active_subs");
    assert_eq!(entry["sql"], ACTIVE_SUBS);
    assert_eq!(entry["parameters"], json!(["status"]));
    assert!(entry["created_at"].is_string());
}

#[tokio::test]
async fn invalid_registrations_are_rejected() {
    let router = router().await;

    let (status, _) = send(&router, register("", "SELECT 1")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&router, register("a/b", "SELECT 1")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&router, register("blank", "   ")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let malformed = Request::builder()
        .method("POST")
        .uri("/api/create-endpoint/")
        .header("content-type", "application/json")
        .body(Body::from("{\"name\": \"x\""))
        .unwrap();
    let (status, _) = send_raw(&router, malformed).await;
    assert!(status.is_client_error());

    let (_, body) = send(&router, get("/api/endpoints/")).await;
    assert_eq!(body, json!([]));
}

#[tokio::test]
async fn read_only_policy_rejects_mutations() {
    let router = test_router(QueryPolicy::ReadOnly).await;

    let (status, body) = send(&router, register("wipe", "DELETE FROM substations")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"].as_str().unwrap().contains("DELETE"));

    let (status, _) = send(&router, register("active_subs", ACTIVE_SUBS)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn taken_name_reports_duplicate_for_any_sql() {
    let router = test_router(QueryPolicy::ReadOnly).await;
    send(&router, register("active_subs", ACTIVE_SUBS)).await;

    for sql in ["", "DELETE FROM substations"] {
        let (status, body) = send(&router, register("active_subs", sql)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({ "detail": "Endpoint already exists" }));
    }

    let (status, body) = send(&router, get("/api/custom/active_subs?status=Retired")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([{ "substation_name": "North" }]));
}

#[tokio::test]
async fn escaped_colon_reaches_the_store_unescaped() {
    let router = router().await;
    send(&router, register("clock", r"SELECT '10\:30' AS t, :x AS x")).await;

    let (status, body) = send(&router, get("/api/custom/clock?x=v")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([{ "t": "10:30", "x": "v" }]));
}
