//! REST API for Service Dispatch.
//!
//! Provides endpoints for:
//! - Demo data retrieval
//! - Dispatch plan jobs (create, get, status, stop)
//! - Synchronous solving and assignment analysis
//! - Swagger UI at /q/swagger-ui

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;
use uuid::Uuid;

use crate::cost::Euclidean;
use crate::demo_data::{self, generate_by_name};
use crate::domain::{DispatchProblem, Schedule};
use crate::dto::{
    AnalyzeResponse, DispatchPlanDto, ErrorResponse, HealthResponse, InfoResponse, SolverConfigDto,
    StatusResponse, TaskDto, WorkerDto, WorkerLoadDto,
};
use crate::error::{DispatchError, InvalidInstanceError};
use crate::solver::{self, SolverConfig, SolverService, SolverStatus, Strategy};

/// Application state shared across handlers.
pub struct AppState {
    pub solver: SolverService,
}

impl AppState {
    pub fn new() -> Self {
        Self {
            solver: SolverService::new(),
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

/// Creates the API router with CORS and Swagger UI enabled.
pub fn create_router() -> Router {
    let state = Arc::new(AppState::new());

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health & Info
        .route("/health", get(health))
        .route("/info", get(info))
        // Demo data
        .route("/demo-data", get(list_demo_data))
        .route("/demo-data/{name}", get(get_demo_data))
        // Dispatch plans
        .route("/dispatch-plans", post(create_dispatch_plan).get(list_dispatch_plans))
        .route("/dispatch-plans/solve", post(solve_dispatch_plan))
        .route("/dispatch-plans/analyze", put(analyze_dispatch_plan))
        .route("/dispatch-plans/{id}", get(get_dispatch_plan).delete(stop_solving))
        .route("/dispatch-plans/{id}/status", get(get_dispatch_plan_status))
        // Swagger UI at /q/swagger-ui (Quarkus-style path)
        .merge(SwaggerUi::new("/q/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(cors)
        .with_state(state)
}

// ============================================================================
// Errors
// ============================================================================

type ApiError = (StatusCode, Json<ErrorResponse>);

fn error_response(status: StatusCode, kind: &str, message: String) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            kind: kind.to_string(),
            message,
        }),
    )
}

fn invalid(err: InvalidInstanceError) -> ApiError {
    error_response(StatusCode::BAD_REQUEST, "INVALID_INSTANCE", err.to_string())
}

impl From<DispatchError> for ErrorResponse {
    fn from(err: DispatchError) -> Self {
        let kind = match &err {
            DispatchError::InvalidInstance(_) => "INVALID_INSTANCE",
            DispatchError::Infeasible(_) => "INFEASIBLE",
            DispatchError::Cancelled => "CANCELLED",
        };
        ErrorResponse {
            kind: kind.to_string(),
            message: err.to_string(),
        }
    }
}

fn dispatch_error(err: DispatchError) -> ApiError {
    let status = match &err {
        DispatchError::InvalidInstance(_) => StatusCode::BAD_REQUEST,
        DispatchError::Infeasible(_) => StatusCode::UNPROCESSABLE_ENTITY,
        DispatchError::Cancelled => StatusCode::CONFLICT,
    };
    (status, Json(ErrorResponse::from(err)))
}

// ============================================================================
// Health & Info
// ============================================================================

/// GET /health - Health check endpoint.
#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service is healthy", body = HealthResponse))
)]
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "UP" })
}

/// GET /info - Application info endpoint.
#[utoipa::path(
    get,
    path = "/info",
    responses((status = 200, description = "Application info", body = InfoResponse))
)]
async fn info() -> Json<InfoResponse> {
    Json(InfoResponse {
        name: "Service Dispatch",
        version: env!("CARGO_PKG_VERSION"),
        solver_engine: "Hungarian / min-cost flow",
    })
}

// ============================================================================
// Demo Data
// ============================================================================

/// GET /demo-data - List available demo datasets.
#[utoipa::path(
    get,
    path = "/demo-data",
    responses((status = 200, description = "List of demo dataset names", body = Vec<String>))
)]
async fn list_demo_data() -> Json<Vec<&'static str>> {
    Json(demo_data::list_demo_data())
}

/// GET /demo-data/{name} - Get a specific demo dataset.
#[utoipa::path(
    get,
    path = "/demo-data/{name}",
    params(("name" = String, Path, description = "Demo dataset name")),
    responses(
        (status = 200, description = "Demo data retrieved", body = DispatchPlanDto),
        (status = 404, description = "Dataset not found")
    )
)]
async fn get_demo_data(Path(name): Path<String>) -> Result<Json<DispatchPlanDto>, StatusCode> {
    match generate_by_name(&name) {
        Some(problem) => Ok(Json(DispatchPlanDto::from_problem(&problem, None, None))),
        None => Err(StatusCode::NOT_FOUND),
    }
}

// ============================================================================
// Dispatch Plans
// ============================================================================

/// POST /dispatch-plans - Validate a plan and start solving it in the background.
#[utoipa::path(
    post,
    path = "/dispatch-plans",
    request_body = DispatchPlanDto,
    responses(
        (status = 200, description = "Job ID", body = String),
        (status = 400, description = "Invalid instance", body = ErrorResponse)
    )
)]
async fn create_dispatch_plan(
    State(state): State<Arc<AppState>>,
    Json(dto): Json<DispatchPlanDto>,
) -> Result<String, ApiError> {
    let problem = dto.to_domain().map_err(invalid)?;
    solver::validate(&problem).map_err(invalid)?;

    let id = Uuid::new_v4().to_string();
    let job = state
        .solver
        .create_job_with_config(id.clone(), problem, dto.solver_config());
    state.solver.start_solving(job);
    Ok(id)
}

/// POST /dispatch-plans/solve - Solve a plan and return it with assignments.
#[utoipa::path(
    post,
    path = "/dispatch-plans/solve",
    request_body = DispatchPlanDto,
    responses(
        (status = 200, description = "Solved plan", body = DispatchPlanDto),
        (status = 400, description = "Invalid instance", body = ErrorResponse),
        (status = 422, description = "No feasible assignment", body = ErrorResponse),
        (status = 409, description = "Solving was cancelled", body = ErrorResponse)
    )
)]
async fn solve_dispatch_plan(Json(dto): Json<DispatchPlanDto>) -> Result<Json<DispatchPlanDto>, ApiError> {
    let problem = dto.to_domain().map_err(invalid)?;
    let (problem, schedule) = solve_until_dropped(problem, dto.solver_config(), CancellationToken::new()).await?;
    Ok(Json(DispatchPlanDto::from_problem(
        &problem,
        Some(&schedule),
        Some(SolverStatus::NotSolving),
    )))
}

/// Solves on the blocking pool; dropping the returned future (client
/// disconnect) cancels `token` and with it the solve.
async fn solve_until_dropped(
    problem: DispatchProblem,
    config: SolverConfig,
    token: CancellationToken,
) -> Result<(DispatchProblem, Schedule), ApiError> {
    let _guard = token.clone().drop_guard();
    let config = config.with_cancel(token);

    let (problem, result) = tokio::task::spawn_blocking(move || {
        let result = solver::solve(&problem, &config);
        (problem, result)
    })
    .await
    .map_err(|e| error_response(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL", e.to_string()))?;

    let schedule = result.map_err(dispatch_error)?;
    Ok((problem, schedule))
}

/// GET /dispatch-plans - List all dispatch plan IDs.
#[utoipa::path(
    get,
    path = "/dispatch-plans",
    responses((status = 200, description = "List of job IDs", body = Vec<String>))
)]
async fn list_dispatch_plans(State(state): State<Arc<AppState>>) -> Json<Vec<String>> {
    Json(state.solver.list_jobs())
}

/// GET /dispatch-plans/{id} - Get current dispatch plan state.
#[utoipa::path(
    get,
    path = "/dispatch-plans/{id}",
    params(("id" = String, Path, description = "Dispatch plan ID")),
    responses(
        (status = 200, description = "Dispatch plan retrieved", body = DispatchPlanDto),
        (status = 404, description = "Not found")
    )
)]
async fn get_dispatch_plan(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<DispatchPlanDto>, StatusCode> {
    match state.solver.get_job(&id) {
        Some(job) => {
            let guard = job.read();
            Ok(Json(
                DispatchPlanDto::from_problem(&guard.problem, guard.schedule.as_ref(), Some(guard.status))
                    .with_error(guard.error.clone()),
            ))
        }
        None => Err(StatusCode::NOT_FOUND),
    }
}

/// GET /dispatch-plans/{id}/status - Get dispatch plan status only.
#[utoipa::path(
    get,
    path = "/dispatch-plans/{id}/status",
    params(("id" = String, Path, description = "Dispatch plan ID")),
    responses(
        (status = 200, description = "Status retrieved", body = StatusResponse),
        (status = 404, description = "Not found")
    )
)]
async fn get_dispatch_plan_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<StatusResponse>, StatusCode> {
    match state.solver.get_job(&id) {
        Some(job) => {
            let guard = job.read();
            Ok(Json(StatusResponse {
                total_cost: guard.schedule.as_ref().map(|s| s.total_cost),
                solver_status: guard.status.as_str().to_string(),
                error: guard.error.clone(),
            }))
        }
        None => Err(StatusCode::NOT_FOUND),
    }
}

/// DELETE /dispatch-plans/{id} - Stop solving and get the last state.
#[utoipa::path(
    delete,
    path = "/dispatch-plans/{id}",
    params(("id" = String, Path, description = "Dispatch plan ID")),
    responses(
        (status = 200, description = "Solving stopped", body = DispatchPlanDto),
        (status = 404, description = "Not found")
    )
)]
async fn stop_solving(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<DispatchPlanDto>, StatusCode> {
    state.solver.stop_solving(&id);
    match state.solver.remove_job(&id) {
        Some(job) => {
            let guard = job.read();
            Ok(Json(
                DispatchPlanDto::from_problem(
                    &guard.problem,
                    guard.schedule.as_ref(),
                    Some(SolverStatus::NotSolving),
                )
                .with_error(guard.error.clone()),
            ))
        }
        None => Err(StatusCode::NOT_FOUND),
    }
}

/// PUT /dispatch-plans/analyze - Check and cost the plan's current assignments.
#[utoipa::path(
    put,
    path = "/dispatch-plans/analyze",
    request_body = DispatchPlanDto,
    responses(
        (status = 200, description = "Assignment analysis", body = AnalyzeResponse),
        (status = 400, description = "Invalid instance", body = ErrorResponse)
    )
)]
async fn analyze_dispatch_plan(Json(dto): Json<DispatchPlanDto>) -> Result<Json<AnalyzeResponse>, ApiError> {
    let problem = dto.to_domain().map_err(invalid)?;
    let schedule = dto.to_schedule(&problem);
    let analysis = solver::analyze(&problem, &schedule, &Euclidean);
    Ok(Json(AnalyzeResponse::from(analysis)))
}

// ============================================================================
// OpenAPI Documentation
// ============================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        health,
        info,
        list_demo_data,
        get_demo_data,
        create_dispatch_plan,
        solve_dispatch_plan,
        list_dispatch_plans,
        get_dispatch_plan,
        get_dispatch_plan_status,
        stop_solving,
        analyze_dispatch_plan,
    ),
    components(schemas(
        HealthResponse,
        InfoResponse,
        WorkerDto,
        TaskDto,
        SolverConfigDto,
        Strategy,
        DispatchPlanDto,
        StatusResponse,
        ErrorResponse,
        WorkerLoadDto,
        AnalyzeResponse,
    ))
)]
struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demo_data::generate_citywide;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use serde_json::{json, Value};
    use std::time::Duration;
    use tower::ServiceExt;

    async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Vec<u8>) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, bytes.to_vec())
    }

    fn scenario() -> Value {
        json!({
            "name": "scenario",
            "slots": ["9 AM"],
            "workers": [
                {"id": "W0", "location": [0.0, 0.0]},
                {"id": "W1", "location": [10.0, 0.0]}
            ],
            "tasks": [
                {"id": "A", "location": [1.0, 0.0], "slot": "9 AM"},
                {"id": "B", "location": [9.0, 0.0], "slot": "9 AM"}
            ]
        })
    }

    #[tokio::test]
    async fn test_health_and_demo_data() {
        let app = create_router();

        let (status, body) = send(&app, "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        let json: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "UP");

        let (status, body) = send(&app, "GET", "/demo-data", None).await;
        assert_eq!(status, StatusCode::OK);
        let json: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json, json!(["DOWNTOWN", "CITYWIDE"]));

        let (status, body) = send(&app, "GET", "/demo-data/downtown", None).await;
        assert_eq!(status, StatusCode::OK);
        let json: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["tasks"].as_array().unwrap().len(), 8);

        let (status, _) = send(&app, "GET", "/demo-data/nowhere", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_solve_synchronously() {
        let app = create_router();
        let (status, body) = send(&app, "POST", "/dispatch-plans/solve", Some(scenario())).await;
        assert_eq!(status, StatusCode::OK);

        let json: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["totalCost"], 2.0);
        assert_eq!(json["tasks"][0]["worker"], "W0");
        assert_eq!(json["tasks"][1]["worker"], "W1");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_solve_maps_errors_to_status() {
        let app = create_router();

        let mut crowded = scenario();
        crowded["tasks"]
            .as_array_mut()
            .unwrap()
            .push(json!({"id": "C", "location": [5.0, 0.0], "slot": "9 AM"}));
        let (status, body) = send(&app, "POST", "/dispatch-plans/solve", Some(crowded)).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        let json: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["kind"], "INFEASIBLE");

        let mut unknown = scenario();
        unknown["tasks"][0]["slot"] = json!("noon");
        let (status, body) = send(&app, "POST", "/dispatch-plans/solve", Some(unknown)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let json: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["kind"], "INVALID_INSTANCE");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_job_lifecycle() {
        let app = create_router();

        let (status, body) = send(&app, "POST", "/dispatch-plans", Some(scenario())).await;
        assert_eq!(status, StatusCode::OK);
        let id = String::from_utf8(body).unwrap();

        let mut solved = false;
        for _ in 0..100 {
            let (status, body) = send(&app, "GET", &format!("/dispatch-plans/{id}/status"), None).await;
            assert_eq!(status, StatusCode::OK);
            let json: Value = serde_json::from_slice(&body).unwrap();
            if json["solverStatus"] == "NOT_SOLVING" {
                assert_eq!(json["totalCost"], 2.0);
                solved = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(solved, "job did not finish");

        let (_, body) = send(&app, "GET", "/dispatch-plans", None).await;
        let ids: Vec<String> = serde_json::from_slice(&body).unwrap();
        assert_eq!(ids, vec![id.clone()]);

        let (status, body) = send(&app, "DELETE", &format!("/dispatch-plans/{id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        let json: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["tasks"][1]["worker"], "W1");

        let (status, _) = send(&app, "GET", &format!("/dispatch-plans/{id}"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_cancelled_solve_is_conflict() {
        let token = CancellationToken::new();
        token.cancel();
        let (status, Json(body)) = solve_until_dropped(generate_citywide(), SolverConfig::default(), token)
            .await
            .unwrap_err();
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body.kind, "CANCELLED");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_dropped_solve_cancels_token() {
        let token = CancellationToken::new();
        let solving = solve_until_dropped(generate_citywide(), SolverConfig::default(), token.clone());
        let _ = tokio::time::timeout(Duration::ZERO, solving).await;
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn test_create_rejects_invalid_instance() {
        let app = create_router();
        let mut empty = scenario();
        empty["workers"] = json!([]);
        let (status, _) = send(&app, "POST", "/dispatch-plans", Some(empty)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (_, body) = send(&app, "GET", "/dispatch-plans", None).await;
        let ids: Vec<String> = serde_json::from_slice(&body).unwrap();
        assert!(ids.is_empty());
    }

    #[tokio::test]
    async fn test_analyze_reports_conflicts() {
        let app = create_router();
        let mut plan = scenario();
        plan["tasks"][0]["worker"] = json!("W0");
        plan["tasks"][1]["worker"] = json!("W0");

        let (status, body) = send(&app, "PUT", "/dispatch-plans/analyze", Some(plan)).await;
        assert_eq!(status, StatusCode::OK);
        let json: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["feasible"], false);
        assert_eq!(json["totalCost"], 10.0);
        assert_eq!(json["workers"][0]["tasks"], json!(["A", "B"]));
        assert_eq!(json["violations"].as_array().unwrap().len(), 1);
    }
}
