//! HTTP tests for the access request API over the in-memory store.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code can use unwrap/expect/panic

use access_request_core::assets::AssetStatus;
use access_request_core::types::Principal;
use access_request_runtime::AccessRequestService;
use access_request_testing::{InMemoryAccessRequestStore, fixtures, test_clock};
use access_request_web::extractors::{
    PRINCIPAL_DEPARTMENT_HEADER, PRINCIPAL_ID_HEADER, PRINCIPAL_ROLE_HEADER,
};
use access_request_web::{AppState, CORRELATION_ID_HEADER, build_router};
use axum_test::{TestRequest, TestServer};
use http::{HeaderName, HeaderValue, StatusCode};
use serde_json::{Value, json};
use std::sync::Arc;

// ============================================================================
// Test Fixtures
// ============================================================================

fn server_with(store: &InMemoryAccessRequestStore) -> TestServer {
    let service = AccessRequestService::new(Arc::new(store.clone()), Arc::new(test_clock()));
    TestServer::new(build_router(AppState::new(service))).expect("Test server")
}

fn server() -> TestServer {
    server_with(&InMemoryAccessRequestStore::new())
}

fn header(name: &str, value: &str) -> (HeaderName, HeaderValue) {
    (
        HeaderName::from_bytes(name.as_bytes()).unwrap(),
        HeaderValue::from_str(value).unwrap(),
    )
}

trait AsPrincipal {
    fn as_principal(self, principal: &Principal) -> Self;
}

impl AsPrincipal for TestRequest {
    fn as_principal(self, principal: &Principal) -> Self {
        let (id_name, id_value) = header(PRINCIPAL_ID_HEADER, &principal.id.to_string());
        let (role_name, role_value) = header(PRINCIPAL_ROLE_HEADER, principal.role.as_str());
        let (dept_name, dept_value) = header(PRINCIPAL_DEPARTMENT_HEADER, &principal.department);
        self.add_header(id_name, id_value)
            .add_header(role_name, role_value)
            .add_header(dept_name, dept_value)
    }
}

fn finance_software() -> Value {
    serde_json::to_value(fixtures::software_request("Finance")).unwrap()
}

async fn create(server: &TestServer, principal: &Principal, body: Value) -> Value {
    let response = server
        .post("/api/access-requests")
        .as_principal(principal)
        .json(&body)
        .await;
    response.assert_status(StatusCode::CREATED);
    response.json::<Value>()
}

fn id_of(request: &Value) -> String {
    request["id"].as_str().unwrap().to_string()
}

// ============================================================================
// Health and authentication
// ============================================================================

#[tokio::test]
async fn health_needs_no_principal() {
    let response = server().get("/health").await;

    response.assert_status_ok();
    assert_eq!(response.json::<Value>(), json!({ "status": "ok" }));
}

#[tokio::test]
async fn api_without_principal_is_unauthorized() {
    let response = server().get("/api/access-requests").await;

    response.assert_status(StatusCode::UNAUTHORIZED);
    assert_eq!(response.json::<Value>()["code"], "unauthorized");
}

#[tokio::test]
async fn correlation_id_is_echoed() {
    let (name, value) = header(CORRELATION_ID_HEADER, "8f9c1d7e-2b4a-4c3d-9e8f-1a2b3c4d5e6f");

    let response = server().get("/health").add_header(name, value).await;

    assert_eq!(
        response.header("x-correlation-id"),
        "8f9c1d7e-2b4a-4c3d-9e8f-1a2b3c4d5e6f"
    );
}

// ============================================================================
// Create
// ============================================================================

#[tokio::test]
async fn create_returns_201_with_request_number() {
    let server = server();

    let request = create(&server, &fixtures::admin(), finance_software()).await;

    assert_eq!(request["request_number"], "SAR-2025-001");
    assert_eq!(request["status"], "pending");
    assert_eq!(request["request_type"], "software");
}

#[tokio::test]
async fn create_with_nothing_requested_is_422() {
    let body = serde_json::to_value(fixtures::employee("Finance")).unwrap();

    let response = server()
        .post("/api/access-requests")
        .as_principal(&fixtures::admin())
        .json(&body)
        .await;

    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(response.json::<Value>()["code"], "empty_request");
}

#[tokio::test]
async fn create_with_invalid_fields_lists_them() {
    let mut body = finance_software();
    body["email"] = json!("not-an-email");
    body["employee_first_name"] = json!("");

    let response = server()
        .post("/api/access-requests")
        .as_principal(&fixtures::admin())
        .json(&body)
        .await;

    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    let error = response.json::<Value>();
    assert_eq!(error["code"], "validation_error");
    let fields: Vec<&str> = error["fields"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f["field"].as_str().unwrap())
        .collect();
    assert!(fields.contains(&"email"));
    assert!(fields.contains(&"employee_first_name"));
}

#[tokio::test]
async fn malformed_json_is_422() {
    let response = server()
        .post("/api/access-requests")
        .as_principal(&fixtures::admin())
        .text("{ not json")
        .content_type("application/json")
        .await;

    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(response.json::<Value>()["code"], "validation_error");
}

#[tokio::test]
async fn manager_cannot_create_for_another_department() {
    let response = server()
        .post("/api/access-requests")
        .as_principal(&fixtures::manager("HR"))
        .json(&finance_software())
        .await;

    response.assert_status(StatusCode::FORBIDDEN);
    assert_eq!(
        response.json::<Value>()["message"],
        "Resource not in your department"
    );
}

// ============================================================================
// List and detail
// ============================================================================

#[tokio::test]
async fn manager_list_is_scoped_to_department() {
    let server = server();
    let admin = fixtures::admin();
    create(&server, &admin, finance_software()).await;
    create(
        &server,
        &admin,
        serde_json::to_value(fixtures::software_request("HR")).unwrap(),
    )
    .await;

    let response = server
        .get("/api/access-requests")
        .add_query_param("department", "HR")
        .as_principal(&fixtures::manager("Finance"))
        .await;

    response.assert_status_ok();
    let page = response.json::<Value>();
    assert_eq!(page["total"], 0);

    let page = server
        .get("/api/access-requests")
        .as_principal(&fixtures::manager("Finance"))
        .await
        .json::<Value>();
    assert_eq!(page["total"], 1);
    assert_eq!(page["items"][0]["department"], "Finance");
}

#[tokio::test]
async fn list_pages_newest_first() {
    let server = server();
    let admin = fixtures::admin();
    for _ in 0..3 {
        create(&server, &admin, finance_software()).await;
    }

    let page = server
        .get("/api/access-requests")
        .add_query_param("page", "1")
        .add_query_param("page_size", "2")
        .as_principal(&admin)
        .await
        .json::<Value>();

    assert_eq!(page["total"], 3);
    assert_eq!(page["total_pages"], 2);
    assert_eq!(page["items"][0]["request_number"], "SAR-2025-003");
    assert_eq!(page["items"][1]["request_number"], "SAR-2025-002");
}

#[tokio::test]
async fn list_with_unknown_status_is_422() {
    let response = server()
        .get("/api/access-requests")
        .add_query_param("status", "archived")
        .as_principal(&fixtures::admin())
        .await;

    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(response.json::<Value>()["code"], "invalid_status");
}

#[tokio::test]
async fn detail_respects_scope() {
    let server = server();
    let request = create(&server, &fixtures::admin(), finance_software()).await;
    let path = format!("/api/access-requests/{}", id_of(&request));

    let detail = server
        .get(&path)
        .as_principal(&fixtures::manager("Finance"))
        .await;
    detail.assert_status_ok();
    let detail = detail.json::<Value>();
    assert_eq!(detail["request_number"], "SAR-2025-001");
    assert_eq!(detail["history"].as_array().unwrap().len(), 1);

    let foreign = server.get(&path).as_principal(&fixtures::manager("HR")).await;
    foreign.assert_status(StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn unknown_and_malformed_ids_are_404() {
    let server = server();
    let admin = fixtures::admin();

    for id in ["6a1f3c2e-0000-4000-8000-000000000000", "42"] {
        let response = server
            .get(&format!("/api/access-requests/{id}"))
            .as_principal(&admin)
            .await;
        response.assert_status(StatusCode::NOT_FOUND);
        assert_eq!(response.json::<Value>()["code"], "not_found");
    }
}

// ============================================================================
// Lifecycle
// ============================================================================

#[tokio::test]
async fn approve_then_history_has_two_entries() {
    let server = server();
    let request = create(&server, &fixtures::admin(), finance_software()).await;
    let id = id_of(&request);
    let manager = fixtures::manager("Finance");

    let response = server
        .patch(&format!("/api/access-requests/{id}/status"))
        .as_principal(&manager)
        .json(&json!({ "status": "approved", "comments": "ok" }))
        .await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["status"], "approved");

    let history = server
        .get(&format!("/api/access-requests/{id}/history"))
        .as_principal(&manager)
        .await
        .json::<Value>();
    let actions: Vec<&str> = history
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["action"].as_str().unwrap())
        .collect();
    assert_eq!(actions, ["created", "approved"]);
}

#[tokio::test]
async fn user_cannot_approve() {
    let server = server();
    let request = create(&server, &fixtures::admin(), finance_software()).await;

    let response = server
        .patch(&format!("/api/access-requests/{}/status", id_of(&request)))
        .as_principal(&fixtures::user("Finance"))
        .json(&json!({ "status": "approved" }))
        .await;

    response.assert_status(StatusCode::FORBIDDEN);
    assert_eq!(
        response.json::<Value>()["message"],
        "You do not have permission to perform this action"
    );
}

#[tokio::test]
async fn reject_without_reason_is_422_and_terminal_is_409() {
    let server = server();
    let admin = fixtures::admin();
    let request = create(&server, &admin, finance_software()).await;
    let path = format!("/api/access-requests/{}/status", id_of(&request));

    let response = server
        .patch(&path)
        .as_principal(&admin)
        .json(&json!({ "status": "rejected" }))
        .await;
    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);

    server
        .patch(&path)
        .as_principal(&admin)
        .json(&json!({ "status": "rejected", "rejection_reason": "Duplicate request" }))
        .await
        .assert_status_ok();

    let response = server
        .patch(&path)
        .as_principal(&admin)
        .json(&json!({ "status": "approved" }))
        .await;
    response.assert_status(StatusCode::CONFLICT);
    assert_eq!(response.json::<Value>()["code"], "terminal_state");
}

// ============================================================================
// Grant provisioning
// ============================================================================

#[tokio::test]
async fn admin_marks_grant_provisioned() {
    let server = server();
    let admin = fixtures::admin();
    let request = create(&server, &admin, finance_software()).await;
    let path = format!("/api/access-requests/{}/grants/erp", id_of(&request));

    let response = server
        .patch(&path)
        .as_principal(&admin)
        .json(&json!({ "status": "provisioned" }))
        .await;
    response.assert_status_ok();
    let updated = response.json::<Value>();
    assert_eq!(updated["grants"]["erp"]["status"], "provisioned");
    assert_eq!(updated["grants"]["erp"]["provisioned_by"], json!(admin.id));
    assert_eq!(updated["grants"]["network_email"]["status"], "pending");

    let history = server
        .get(&format!("/api/access-requests/{}/history", id_of(&request)))
        .as_principal(&admin)
        .await
        .json::<Value>();
    let last = history.as_array().unwrap().last().unwrap().clone();
    assert_eq!(last["action"], "status_changed");
    assert_eq!(last["metadata"]["grant"], "erp");
}

#[tokio::test]
async fn grant_update_rejects_managers_unknown_systems_and_statuses() {
    let server = server();
    let admin = fixtures::admin();
    let request = create(&server, &admin, finance_software()).await;
    let id = id_of(&request);

    let response = server
        .patch(&format!("/api/access-requests/{id}/grants/erp"))
        .as_principal(&fixtures::manager("Finance"))
        .json(&json!({ "status": "provisioned" }))
        .await;
    response.assert_status(StatusCode::FORBIDDEN);

    let response = server
        .patch(&format!("/api/access-requests/{id}/grants/vpn"))
        .as_principal(&admin)
        .json(&json!({ "status": "provisioned" }))
        .await;
    response.assert_status(StatusCode::NOT_FOUND);

    let response = server
        .patch(&format!("/api/access-requests/{id}/grants/time_attendance"))
        .as_principal(&admin)
        .json(&json!({ "status": "provisioned" }))
        .await;
    response.assert_status(StatusCode::NOT_FOUND);

    let response = server
        .patch(&format!("/api/access-requests/{id}/grants/erp"))
        .as_principal(&admin)
        .json(&json!({ "status": "done" }))
        .await;
    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(response.json::<Value>()["code"], "validation_error");
}

// ============================================================================
// Asset linking
// ============================================================================

#[tokio::test]
async fn link_available_asset_and_refuse_checked_out_one() {
    let available = fixtures::asset("Laptop", AssetStatus::Available);
    let checked_out = fixtures::asset("Laptop", AssetStatus::CheckedOut);
    let store = InMemoryAccessRequestStore::new().with_assets([available.clone(), checked_out.clone()]);
    let server = server_with(&store);
    let admin = fixtures::admin();

    let body = serde_json::to_value(fixtures::hardware_request("Finance", &["Laptop"])).unwrap();
    let request = create(&server, &admin, body).await;
    let item_id = request["handover_items"][0]["id"].as_str().unwrap().to_string();
    let path = format!(
        "/api/access-requests/{}/handover-items/{item_id}/asset",
        id_of(&request)
    );

    let response = server
        .put(&path)
        .as_principal(&admin)
        .json(&json!({ "asset_id": checked_out.id }))
        .await;
    response.assert_status(StatusCode::CONFLICT);
    assert_eq!(response.json::<Value>()["code"], "asset_unavailable");

    let response = server
        .put(&path)
        .as_principal(&admin)
        .json(&json!({ "asset_id": available.id }))
        .await;
    response.assert_status_ok();
    let item = response.json::<Value>();
    assert_eq!(item["linked_asset_id"], json!(available.id));
    assert_eq!(item["serial_number"], json!(available.serial_number));
}
