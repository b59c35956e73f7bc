use axum::{
    Router,
    body::{Body, Bytes},
    extract::{Path, State},
    http::{HeaderValue, Request, StatusCode},
    middleware::{Next, from_fn},
    response::{Json, Response},
    routing::{get, post},
};
use dashmap::DashMap;
use recipe_flow::{
    DemographicsInput, ProgressAnimator, Readiness, SnapshotStorage, Step, StepOutcome,
    StepScreen, Wizard, WizardError, WizardScreens, WizardSessions, WorkflowApi,
    progress::default_phases,
};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{Instrument, error, info, warn};
use uuid::Uuid;

use crate::models::{
    AgeCategoryRequest, GenderRequest, HealthConcernRequest, ProgressResponse, SelectionRequest,
    SessionResponse, StepResponse,
};

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<Value>)>;
type ApiError = (StatusCode, Json<Value>);

fn bad_request_error(message: &str) -> ApiError {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": message })))
}

fn not_found_error(message: &str, id: &str) -> ApiError {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": message,
            "session_id": id
        })),
    )
}

fn internal_error(message: &str, id: &str) -> ApiError {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({
            "error": message,
            "session_id": id
        })),
    )
}

fn not_ready_error(err: &WizardError, id: &str) -> ApiError {
    (
        StatusCode::CONFLICT,
        Json(json!({
            "error": err.to_string(),
            "session_id": id
        })),
    )
}

struct ProgressTrack {
    started: Instant,
    animator: ProgressAnimator,
}

#[derive(Clone)]
pub struct AppState {
    pub sessions: WizardSessions,
    pub screens: WizardScreens,
    progress: Arc<DashMap<String, ProgressTrack>>,
}

impl AppState {
    pub fn new(storage: Arc<dyn SnapshotStorage>, api: Arc<dyn WorkflowApi>) -> Self {
        Self {
            sessions: WizardSessions::new(storage),
            screens: WizardScreens::new(api),
            progress: Arc::new(DashMap::new()),
        }
    }

    /// Evict sessions idle for `max_idle` along with their progress animation.
    pub fn sweep(&self, max_idle: Duration) -> usize {
        let evicted = self.sessions.evict_idle(max_idle);
        self.progress
            .retain(|session_id, _| self.sessions.contains(session_id));
        evicted
    }
}

/// Live session, or one restored from its snapshot. Anything else is a 404.
async fn load(state: &AppState, session_id: &str) -> Result<Wizard, ApiError> {
    match state.sessions.resume(session_id).await {
        Ok(Some(wizard)) => Ok(wizard),
        Ok(None) => Err(not_found_error("Session not found", session_id)),
        Err(e) => {
            error!(session_id = %session_id, error = %e, "Failed to load wizard session");
            Err(internal_error("Failed to load session", session_id))
        }
    }
}

/// Tag every request with a correlation id and run it inside a span carrying it.
async fn correlation_id_middleware(mut request: Request<Body>, next: Next) -> Response {
    let correlation_id = Uuid::new_v4().to_string();
    let header = HeaderValue::from_str(&correlation_id).ok();

    if let Some(value) = header.clone() {
        request.headers_mut().insert("x-correlation-id", value);
    }

    let span = tracing::info_span!("http_request", correlation_id = %correlation_id);
    let mut response = next.run(request).instrument(span).await;

    if let Some(value) = header {
        response.headers_mut().insert("x-correlation-id", value);
    }
    response
}

pub fn build_router(app_state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .route("/create-recipe", post(create_session))
        .route(
            "/create-recipe/{session_id}",
            get(get_session).delete(close_session),
        )
        .route("/create-recipe/{session_id}/reset", post(reset_session))
        .route("/create-recipe/{session_id}/progress", get(get_progress))
        .route(
            "/create-recipe/{session_id}/{step}",
            get(enter_step).post(submit_step),
        )
        .route(
            "/create-recipe/{session_id}/{step}/selection",
            post(toggle_selection),
        )
        .route("/create-recipe/{session_id}/{step}/draft", post(edit_draft))
        .route(
            "/create-recipe/{session_id}/{step}/age-category",
            post(select_age_category),
        )
        .route("/create-recipe/{session_id}/{step}/gender", post(select_gender))
        .layer(
            ServiceBuilder::new()
                .layer(from_fn(correlation_id_middleware))
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(app_state)
}

async fn root() -> Json<Value> {
    Json(json!({
        "service": "Recipe Wizard Service",
        "version": "0.1.0",
        "endpoints": {
            "POST /create-recipe": "Start a new wizard session",
            "GET /create-recipe/{session_id}": "Current wizard state",
            "DELETE /create-recipe/{session_id}": "Close the live session (snapshot is kept)",
            "POST /create-recipe/{session_id}/reset": "Discard all answers",
            "GET /create-recipe/{session_id}/progress": "Progress while a step is loading",
            "GET /create-recipe/{session_id}/{step}": "Enter a step",
            "POST /create-recipe/{session_id}/{step}": "Submit a step",
            "POST /create-recipe/{session_id}/{step}/selection": "Toggle a cause, symptom, property or oil",
            "POST /create-recipe/{session_id}/health-concern/draft": "Validate the concern typed so far",
            "POST /create-recipe/{session_id}/demographics/age-category": "Pick an age category",
            "POST /create-recipe/{session_id}/demographics/gender": "Pick a gender",
            "GET /health": "Health check"
        }
    }))
}

async fn health_check(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "live_sessions": state.sessions.len(),
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

fn parse_step(raw: &str, session_id: &str) -> Result<Step, ApiError> {
    raw.parse::<Step>()
        .map_err(|e| not_found_error(&e, session_id))
}

fn require_step(raw: &str, expected: Step, session_id: &str) -> Result<(), ApiError> {
    if parse_step(raw, session_id)? == expected {
        Ok(())
    } else {
        Err(not_found_error(
            &format!("No such action on step {raw}"),
            session_id,
        ))
    }
}

fn parse_body<T: DeserializeOwned>(body: &Bytes) -> Result<T, ApiError> {
    serde_json::from_slice(body)
        .map_err(|e| bad_request_error(&format!("Invalid request body: {e}")))
}

async fn session_response(session_id: String, wizard: &Wizard) -> Json<SessionResponse> {
    Json(SessionResponse {
        session_id,
        state: wizard.state().await,
    })
}

async fn create_session(State(state): State<AppState>) -> ApiResult<SessionResponse> {
    let session_id = Uuid::new_v4().to_string();
    let wizard = state.sessions.open(&session_id).await;

    state
        .screens
        .enter(Step::HealthConcern, &wizard)
        .await
        .map_err(|e| not_ready_error(&e, &session_id))?;

    info!(session_id = %session_id, "Recipe wizard session created");
    Ok(session_response(session_id, &wizard).await)
}

async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<SessionResponse> {
    let wizard = load(&state, &session_id).await?;
    Ok(session_response(session_id, &wizard).await)
}

async fn close_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Json<Value> {
    let closed = state.sessions.close(&session_id);
    state.progress.remove(&session_id);
    info!(session_id = %session_id, closed, "Recipe wizard session closed");
    Json(json!({ "session_id": session_id, "closed": closed }))
}

async fn reset_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<SessionResponse> {
    let wizard = load(&state, &session_id).await?;
    wizard.reset_form_data().await;
    state.progress.remove(&session_id);
    state
        .screens
        .enter(Step::HealthConcern, &wizard)
        .await
        .map_err(|e| not_ready_error(&e, &session_id))?;

    info!(session_id = %session_id, "Recipe wizard reset");
    Ok(session_response(session_id, &wizard).await)
}

/// The animation starts with the first poll of a loading session and is
/// dropped once nothing is loading.
async fn get_progress(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<ProgressResponse> {
    let wizard = load(&state, &session_id).await?;
    let loading = wizard.state().await.any_loading();

    let frame = if loading {
        let mut track = state
            .progress
            .entry(session_id.clone())
            .or_insert_with(|| ProgressTrack {
                started: Instant::now(),
                animator: ProgressAnimator::new(default_phases()),
            });
        let elapsed = track.started.elapsed();
        Some(track.animator.tick(elapsed))
    } else {
        state.progress.remove(&session_id);
        None
    };

    Ok(Json(ProgressResponse {
        session_id,
        loading,
        frame,
    }))
}

async fn enter_step(
    State(state): State<AppState>,
    Path((session_id, step)): Path<(String, String)>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let step = parse_step(&step, &session_id)?;
    let wizard = load(&state, &session_id).await?;

    let readiness = state.screens.enter(step, &wizard).await.map_err(|e| {
        warn!(session_id = %session_id, step = %step, "Step entered before its data exists");
        not_ready_error(&e, &session_id)
    })?;

    let (status, readiness) = match readiness {
        Readiness::Ready => (StatusCode::OK, "ready"),
        Readiness::Loading => (StatusCode::ACCEPTED, "loading"),
        Readiness::Unavailable => (StatusCode::CONFLICT, "unavailable"),
    };

    let mut body = json!({
        "session_id": session_id,
        "step": step,
        "readiness": readiness,
    });
    if let (Value::Object(map), Ok(Value::Object(view))) =
        (&mut body, serde_json::to_value(wizard.state().await))
    {
        map.extend(view);
    }
    Ok((status, Json(body)))
}

async fn submit_step(
    State(state): State<AppState>,
    Path((session_id, step)): Path<(String, String)>,
    body: Bytes,
) -> Result<(StatusCode, Json<StepResponse>), ApiError> {
    let step = parse_step(&step, &session_id)?;
    let wizard = load(&state, &session_id).await?;
    let screens = &state.screens;

    info!(session_id = %session_id, step = %step, "Submitting step");
    let outcome = match step {
        Step::HealthConcern => {
            let request: HealthConcernRequest = parse_body(&body)?;
            screens
                .health_concern
                .submit(&wizard, request.health_concern)
                .await
        }
        Step::Demographics => {
            let input: DemographicsInput = parse_body(&body)?;
            screens.demographics.submit(&wizard, input).await
        }
        Step::Causes => screens.causes.submit(&wizard, ()).await,
        Step::Symptoms => screens.symptoms.submit(&wizard, ()).await,
        Step::Properties => screens.properties.submit(&wizard, ()).await,
        Step::Oils => screens.oils.submit(&wizard, ()).await,
    };

    let (status, outcome, next) = match outcome {
        StepOutcome::Advanced(next) => (StatusCode::OK, "advanced", Some(next)),
        // The fetch keeps running detached; its result lands in the wizard.
        StepOutcome::Loading { step, fetch: _ } => (StatusCode::ACCEPTED, "loading", Some(step)),
        StepOutcome::Complete => (StatusCode::OK, "complete", None),
        StepOutcome::Halted => (StatusCode::UNPROCESSABLE_ENTITY, "halted", None),
        StepOutcome::Superseded => (StatusCode::CONFLICT, "superseded", None),
    };

    Ok((
        status,
        Json(StepResponse {
            session_id,
            outcome,
            step: next,
            state: wizard.state().await,
        }),
    ))
}

async fn toggle_selection(
    State(state): State<AppState>,
    Path((session_id, step)): Path<(String, String)>,
    body: Bytes,
) -> ApiResult<SessionResponse> {
    let step = parse_step(&step, &session_id)?;
    let request: SelectionRequest = parse_body(&body)?;
    let wizard = load(&state, &session_id).await?;
    let screens = &state.screens;

    let toggled = match step {
        Step::Causes => screens.causes.toggle_cause(&wizard, &request.id).await,
        Step::Symptoms => screens.symptoms.toggle_symptom(&wizard, &request.id).await,
        Step::Properties => {
            screens
                .properties
                .toggle_property(&wizard, &request.id)
                .await
        }
        Step::Oils => screens.oils.toggle_oil(&wizard, &request.id).await,
        Step::HealthConcern | Step::Demographics => {
            return Err(not_found_error(
                &format!("Step {step} has no selection"),
                &session_id,
            ));
        }
    };
    toggled.map_err(|e| bad_request_error(&e.to_string()))?;

    Ok(session_response(session_id, &wizard).await)
}

async fn edit_draft(
    State(state): State<AppState>,
    Path((session_id, step)): Path<(String, String)>,
    body: Bytes,
) -> ApiResult<SessionResponse> {
    require_step(&step, Step::HealthConcern, &session_id)?;
    let request: HealthConcernRequest = parse_body(&body)?;
    let wizard = load(&state, &session_id).await?;

    state
        .screens
        .health_concern
        .edit(&wizard, &request.health_concern)
        .await;
    Ok(session_response(session_id, &wizard).await)
}

async fn select_age_category(
    State(state): State<AppState>,
    Path((session_id, step)): Path<(String, String)>,
    body: Bytes,
) -> ApiResult<SessionResponse> {
    require_step(&step, Step::Demographics, &session_id)?;
    let request: AgeCategoryRequest = parse_body(&body)?;
    let wizard = load(&state, &session_id).await?;

    let age = state
        .screens
        .demographics
        .select_age_category(&wizard, request.age_category)
        .await;
    info!(session_id = %session_id, category = %request.age_category, age = %age, "Age category selected");
    Ok(session_response(session_id, &wizard).await)
}

async fn select_gender(
    State(state): State<AppState>,
    Path((session_id, step)): Path<(String, String)>,
    body: Bytes,
) -> ApiResult<SessionResponse> {
    require_step(&step, Step::Demographics, &session_id)?;
    let request: GenderRequest = parse_body(&body)?;
    let wizard = load(&state, &session_id).await?;

    state
        .screens
        .demographics
        .select_gender(&wizard, request.gender)
        .await;
    Ok(session_response(session_id, &wizard).await)
}
