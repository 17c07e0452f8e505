//! HTTP routes.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::Value;
use taleweaver_domain::{
    AgentConfig, Arc as StoryArc, CampaignPlan, Character, Item, Location, ObjId, Objective, Point,
    Rule, Segment,
};
use taleweaver_shared::{ErrorBody, ErrorCode, ExportBundle, ImportSummary, ListResponse};

use super::owner::OwnerScope;
use crate::app::App;
use crate::use_cases::{Managed, ManagementError, TransferError};

/// Create all HTTP routes.
pub fn routes() -> Router<Arc<App>> {
    Router::new()
        .route("/", get(health))
        .route("/api/health", get(health))
        .route("/api/export", get(export))
        .route("/api/import", post(import))
        .merge(object_routes::<Rule>("rules"))
        .merge(object_routes::<Objective>("objectives"))
        .merge(object_routes::<Point>("points"))
        .merge(object_routes::<Segment>("segments"))
        .merge(object_routes::<StoryArc>("arcs"))
        .merge(object_routes::<Item>("items"))
        .merge(object_routes::<Character>("characters"))
        .merge(object_routes::<Location>("locations"))
        .merge(object_routes::<CampaignPlan>("campaign-plans"))
        .merge(object_routes::<AgentConfig>("agent-configs"))
}

/// CRUD routes for one standalone type under `/api/{kind}`.
fn object_routes<T: Managed>(kind: &str) -> Router<Arc<App>> {
    Router::new()
        .route(
            &format!("/api/{kind}"),
            get(list_objects::<T>).post(create_object::<T>),
        )
        .route(&format!("/api/{kind}/ids"), get(list_object_ids::<T>))
        .route(
            &format!("/api/{kind}/{{id}}"),
            get(get_object::<T>)
                .put(update_object::<T>)
                .delete(delete_object::<T>),
        )
}

async fn health() -> &'static str {
    "OK"
}

// =============================================================================
// Objects
// =============================================================================

fn parse_id(raw: &str) -> Result<ObjId, ApiError> {
    ObjId::parse(raw).map_err(|e| ApiError::Unprocessable(e.to_string()))
}

fn parse_body<T: Managed>(body: Value) -> Result<T, ApiError> {
    T::from_value(body).map_err(|e| ApiError::Unprocessable(e.to_string()))
}

async fn create_object<T: Managed>(
    State(app): State<Arc<App>>,
    OwnerScope(owner): OwnerScope,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<(StatusCode, Json<T>), ApiError> {
    let Json(body) = body?;
    let object = parse_body::<T>(body)?;
    let persisted = T::crud(&app.use_cases.management)
        .create(object, owner)
        .await?;
    let status = if persisted.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(persisted.object)))
}

async fn get_object<T: Managed>(
    State(app): State<Arc<App>>,
    OwnerScope(owner): OwnerScope,
    Path(id): Path<String>,
) -> Result<Json<T>, ApiError> {
    let id = parse_id(&id)?;
    let object = T::crud(&app.use_cases.management)
        .get(&id, owner)
        .await?
        .ok_or(ApiError::NotFound)?;
    Ok(Json(object))
}

async fn update_object<T: Managed>(
    State(app): State<Arc<App>>,
    OwnerScope(owner): OwnerScope,
    Path(id): Path<String>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<T>, ApiError> {
    let id = parse_id(&id)?;
    let Json(body) = body?;
    let object = parse_body::<T>(body)?;
    let updated = T::crud(&app.use_cases.management)
        .update(&id, object, owner)
        .await?;
    Ok(Json(updated))
}

async fn delete_object<T: Managed>(
    State(app): State<Arc<App>>,
    OwnerScope(owner): OwnerScope,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_id(&id)?;
    T::crud(&app.use_cases.management)
        .delete(&id, owner)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_objects<T: Managed>(
    State(app): State<Arc<App>>,
    OwnerScope(owner): OwnerScope,
) -> Result<Json<ListResponse<T>>, ApiError> {
    let objects = T::crud(&app.use_cases.management).list(owner).await?;
    Ok(Json(ListResponse::new(objects)))
}

async fn list_object_ids<T: Managed>(
    State(app): State<Arc<App>>,
    OwnerScope(owner): OwnerScope,
) -> Result<Json<ListResponse<String>>, ApiError> {
    let ids = T::crud(&app.use_cases.management)
        .list_ids(owner)
        .await?
        .iter()
        .map(ObjId::to_string)
        .collect();
    Ok(Json(ListResponse::new(ids)))
}

// =============================================================================
// Import / export
// =============================================================================

async fn export(
    State(app): State<Arc<App>>,
    OwnerScope(owner): OwnerScope,
) -> Result<Json<ExportBundle>, ApiError> {
    Ok(Json(app.use_cases.transfer.export(owner).await?))
}

async fn import(
    State(app): State<Arc<App>>,
    OwnerScope(owner): OwnerScope,
    bundle: Result<Json<ExportBundle>, JsonRejection>,
) -> Result<Json<ImportSummary>, ApiError> {
    let Json(bundle) = bundle?;
    Ok(Json(app.use_cases.transfer.import(bundle, owner).await?))
}

// =============================================================================
// Errors
// =============================================================================

#[derive(Debug)]
pub enum ApiError {
    NotFound,
    BadRequest(String),
    Unprocessable(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::NotFound => (
                StatusCode::NOT_FOUND,
                ErrorBody::new(ErrorCode::NotFound, "Not found"),
            ),
            ApiError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, ErrorBody::new(ErrorCode::BadRequest, msg))
            }
            ApiError::Unprocessable(msg) => {
                tracing::warn!(reason = %msg, "Rejected request");
                (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    ErrorBody::new(ErrorCode::ValidationError, msg),
                )
            }
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "Request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorBody::new(ErrorCode::InternalError, "Internal error"),
                )
            }
        };
        (status, Json(body)).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<ManagementError> for ApiError {
    fn from(e: ManagementError) -> Self {
        match e {
            ManagementError::NotFound => ApiError::NotFound,
            ManagementError::InvalidInput(msg) => ApiError::Unprocessable(msg),
            ManagementError::Repo(e) => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<TransferError> for ApiError {
    fn from(e: TransferError) -> Self {
        match e {
            TransferError::Repo(e) => ManagementError::from(e).into(),
            e => ApiError::Unprocessable(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::Request;
    use serde_json::json;
    use tower::ServiceExt;

    use super::*;
    use crate::infrastructure::clock::SystemClock;
    use crate::infrastructure::id_allocator::IdAllocator;
    use crate::infrastructure::persistence::{SqliteObjectRepo, SqliteStore};

    async fn test_router() -> Router {
        let store = SqliteStore::in_memory().await.expect("store");
        let repo = SqliteObjectRepo::new(store, Arc::new(IdAllocator::default()))
            .await
            .expect("repo");
        let app = App::new(Arc::new(repo), Arc::new(SystemClock::new()));
        routes().with_state(Arc::new(app))
    }

    async fn call(
        router: &Router,
        method: &str,
        uri: &str,
        owner: Option<i64>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(owner) = owner {
            request = request.header("X-User-Id", owner.to_string());
        }
        let request = match body {
            Some(body) => request
                .header("content-type", "application/json")
                .body(Body::from(body.to_string())),
            None => request.body(Body::empty()),
        }
        .expect("request");

        let response = router.clone().oneshot(request).await.expect("response");
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("json")
        };
        (status, value)
    }

    #[tokio::test]
    async fn health_is_ok() {
        let router = test_router().await;
        let response = router
            .oneshot(
                Request::builder()
                    .uri("/api/health")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn rule_crud_over_http() {
        let router = test_router().await;
        let rule = json!({
            "description": "Fire damage",
            "effect": "+2 dmg",
            "components": ["fire"]
        });

        let (status, created) = call(&router, "POST", "/api/rules", None, Some(rule)).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["obj_id"], json!({"prefix": "R", "numeric": 1}));

        let mut changed = created.clone();
        changed["effect"] = json!("+3 dmg");
        let (status, updated) =
            call(&router, "PUT", "/api/rules/R-0001", None, Some(changed)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["effect"], json!("+3 dmg"));

        let (status, loaded) = call(&router, "GET", "/api/rules/R-0001", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(loaded["description"], json!("Fire damage"));

        let (status, _) = call(&router, "DELETE", "/api/rules/R-0001", None, None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, body) = call(&router, "GET", "/api/rules/R-0001", None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], json!("NOT_FOUND"));

        let (status, _) = call(&router, "DELETE", "/api/rules/R-0001", None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn repeated_create_with_identifier_is_ok_not_created() {
        let router = test_router().await;
        let item = json!({
            "obj_id": {"prefix": "I", "numeric": 7},
            "name": "Lamp",
            "description": "d"
        });

        let (status, _) = call(&router, "POST", "/api/items", None, Some(item.clone())).await;
        assert_eq!(status, StatusCode::CREATED);
        let (status, body) = call(&router, "POST", "/api/items", None, Some(item)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["quantity"], json!(1));
    }

    #[tokio::test]
    async fn other_owners_get_not_found() {
        let router = test_router().await;
        let point = json!({"title": "Secret", "description": "d"});
        let (status, _) = call(&router, "POST", "/api/points", Some(1), Some(point)).await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, _) = call(&router, "GET", "/api/points/P-0001", Some(2), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (_, listed) = call(&router, "GET", "/api/points", Some(2), None).await;
        assert_eq!(listed["count"], json!(0));
        let (_, listed) = call(&router, "GET", "/api/points", Some(1), None).await;
        assert_eq!(listed["count"], json!(1));
    }

    #[tokio::test]
    async fn bad_identifiers_are_unprocessable() {
        let router = test_router().await;
        for uri in ["/api/rules/C-0001", "/api/rules/R-", "/api/rules/R-0000"] {
            let (status, body) = call(&router, "GET", uri, None, None).await;
            assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "{uri}");
            assert_eq!(body["code"], json!("VALIDATION_ERROR"));
        }
    }

    #[tokio::test]
    async fn update_with_mismatched_body_is_unprocessable() {
        let router = test_router().await;
        for _ in 0..2 {
            call(
                &router,
                "POST",
                "/api/rules",
                None,
                Some(json!({"description": "d", "effect": "e"})),
            )
            .await;
        }
        let body = json!({
            "obj_id": {"prefix": "R", "numeric": 2},
            "description": "d",
            "effect": "x"
        });
        let (status, _) = call(&router, "PUT", "/api/rules/R-0001", None, Some(body)).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn dangling_link_is_unprocessable() {
        let router = test_router().await;
        let character = json!({
            "name": "Ghost",
            "description": "d",
            "inventory": [{"prefix": "I", "numeric": 9}]
        });
        let (status, body) = call(&router, "POST", "/api/characters", None, Some(character)).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["code"], json!("VALIDATION_ERROR"));
    }

    #[tokio::test]
    async fn list_ids_uses_text_form() {
        let router = test_router().await;
        for title in ["a", "b"] {
            call(
                &router,
                "POST",
                "/api/segments",
                None,
                Some(json!({"title": title, "description": "d"})),
            )
            .await;
        }
        let (status, body) = call(&router, "GET", "/api/segments/ids", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["items"], json!(["S-0001", "S-0002"]));
    }

    #[tokio::test]
    async fn export_then_import_into_a_fresh_store() {
        let source = test_router().await;
        call(
            &source,
            "POST",
            "/api/items",
            Some(3),
            Some(json!({"name": "Key", "description": "d"})),
        )
        .await;
        call(
            &source,
            "POST",
            "/api/characters",
            Some(3),
            Some(json!({
                "name": "Warden",
                "description": "d",
                "inventory": [{"prefix": "I", "numeric": 1}]
            })),
        )
        .await;
        call(
            &source,
            "POST",
            "/api/arcs",
            Some(3),
            Some(json!({
                "title": "Arc",
                "description": "d",
                "segments": [{"title": "S", "description": "d"}]
            })),
        )
        .await;

        let (status, bundle) = call(&source, "GET", "/api/export", Some(3), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(bundle["format_version"], json!(1));
        assert_eq!(bundle["objects"]["C"][0]["name"], json!("Warden"));

        let target = test_router().await;
        let (status, summary) = call(
            &target,
            "POST",
            "/api/import",
            Some(5),
            Some(bundle.clone()),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(summary, json!({"created": 3, "unchanged": 0}));

        let (_, warden) = call(&target, "GET", "/api/characters/C-0001", Some(5), None).await;
        assert_eq!(warden["inventory"], json!([{"prefix": "I", "numeric": 1}]));
        let (status, _) = call(&target, "GET", "/api/segments/S-0001", Some(5), None).await;
        assert_eq!(status, StatusCode::OK);

        let (_, again) = call(&target, "POST", "/api/import", Some(5), Some(bundle)).await;
        assert_eq!(again, json!({"created": 0, "unchanged": 3}));

        // New objects continue after the imported identifiers.
        let (_, next) = call(
            &target,
            "POST",
            "/api/items",
            Some(5),
            Some(json!({"name": "Coin", "description": "d"})),
        )
        .await;
        assert_eq!(next["obj_id"], json!({"prefix": "I", "numeric": 2}));
    }

    #[tokio::test]
    async fn malformed_json_is_a_bad_request() {
        let router = test_router().await;
        let request = Request::builder()
            .method("POST")
            .uri("/api/rules")
            .header("content-type", "application/json")
            .body(Body::from("{not json"))
            .expect("request");
        let response = router.oneshot(request).await.expect("response");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn import_with_unknown_version_is_unprocessable() {
        let router = test_router().await;
        let bundle = json!({
            "format_version": 7,
            "exported_at": "2024-01-01T00:00:00Z",
            "objects": {}
        });
        let (status, _) = call(&router, "POST", "/api/import", None, Some(bundle)).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }
}
