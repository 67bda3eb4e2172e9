//! Application service routes

use axum::{
    Extension, Json, Router,
    extract::{Query, State},
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::get,
};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
};
use serde::Serialize;
use serde_json::json;
use tracing::{error, info};

use crate::{
    dashboard::{ContributionFilter, DashboardQuery, filter_contributions, summarize},
    error::{ApiError, ApiResult},
    guard::require_admin,
    middleware::{CurrentUser, auth_middleware, resolve_bearer},
    models::{
        UpdateProfileRequest,
        contribution::{
            ContributionType, MemberContribution, NewContributionRequest, validate_amount,
        },
    },
    state::AppState,
};

/// Response for the admin contributions dashboard
#[derive(Serialize)]
pub struct DashboardResponse {
    pub contributions: Vec<MemberContribution>,
    pub total_count: usize,
    pub total_amount: f64,
    pub unique_members: usize,
}

/// Create the router for the application service
pub fn create_router(state: AppState) -> Router {
    let protected_routes = Router::new()
        .route(
            "/contributions",
            get(contribution_history).post(submit_contribution),
        )
        .route("/profile", get(get_profile).put(update_profile))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let admin_routes = Router::new()
        .route("/admin/contributions", get(admin_contributions))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_admin));

    Router::new()
        .route("/", get(landing))
        .route("/health", get(health_check))
        .merge(protected_routes)
        .merge(admin_routes)
        .fallback(not_found)
        .with_state(state)
}

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "api-service"
    }))
}

/// Landing summary. Works signed out; with a valid token it greets the
/// member and advertises the admin dashboard to admins only.
pub async fn landing(
    State(state): State<AppState>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
) -> impl IntoResponse {
    let snapshot = resolve_bearer(&state, bearer.as_ref().map(|h| &h.0)).await;

    match snapshot.user() {
        Some(user) => Json(json!({
            "service": "offertory",
            "message": format!(
                "You are logged in as {}",
                snapshot.display_name().unwrap_or_else(|| user.email.clone())
            ),
            "user": {
                "id": user.id,
                "email": user.email,
            },
            "profile": snapshot.profile.clone(),
            "roles": snapshot.roles.clone(),
            "is_admin": snapshot.is_admin(),
        })),
        None => Json(json!({
            "service": "offertory",
            "message": "Giving made simple. Please sign in to continue.",
        })),
    }
}

/// Submit a contribution
pub async fn submit_contribution(
    State(state): State<AppState>,
    Extension(CurrentUser(snapshot)): Extension<CurrentUser>,
    Json(payload): Json<NewContributionRequest>,
) -> ApiResult<impl IntoResponse> {
    let user = snapshot.user().ok_or(ApiError::Unauthorized)?;

    // Rejected amounts never reach the store
    validate_amount(payload.amount).map_err(ApiError::BadRequest)?;

    let contribution_type = payload.contribution_type.unwrap_or(ContributionType::Tithe);

    let contribution = state
        .contributions
        .create(user.id, payload.amount, contribution_type)
        .await
        .map_err(|e| {
            error!("Failed to record contribution: {}", e);
            ApiError::InternalServerError
        })?;

    info!(
        "Recorded {} contribution of {} for user {}",
        contribution_type, payload.amount, user.id
    );

    Ok((StatusCode::CREATED, Json(contribution)))
}

/// The caller's own contribution history, newest first
pub async fn contribution_history(
    State(state): State<AppState>,
    Extension(CurrentUser(snapshot)): Extension<CurrentUser>,
) -> ApiResult<impl IntoResponse> {
    let user = snapshot.user().ok_or(ApiError::Unauthorized)?;

    let contributions = state
        .contributions
        .history_for_user(user.id)
        .await
        .map_err(|e| {
            error!("Failed to load contribution history: {}", e);
            ApiError::InternalServerError
        })?;

    Ok(Json(contributions))
}

/// The caller's own profile
pub async fn get_profile(
    Extension(CurrentUser(snapshot)): Extension<CurrentUser>,
) -> ApiResult<impl IntoResponse> {
    let profile = snapshot
        .profile
        .ok_or_else(|| ApiError::NotFound("Profile not found".to_string()))?;

    Ok(Json(profile))
}

/// Update the caller's own profile
pub async fn update_profile(
    State(state): State<AppState>,
    Extension(CurrentUser(snapshot)): Extension<CurrentUser>,
    Json(payload): Json<UpdateProfileRequest>,
) -> ApiResult<impl IntoResponse> {
    let user = snapshot.user().ok_or(ApiError::Unauthorized)?;

    let profile = state
        .profiles
        .update(
            user.id,
            payload.first_name.as_deref(),
            payload.last_name.as_deref(),
        )
        .await
        .map_err(|e| {
            error!("Failed to update profile: {}", e);
            ApiError::InternalServerError
        })?
        .ok_or_else(|| ApiError::NotFound("Profile not found".to_string()))?;

    Ok(Json(profile))
}

/// Aggregated contributions view for admins
pub async fn admin_contributions(
    State(state): State<AppState>,
    Extension(CurrentUser(snapshot)): Extension<CurrentUser>,
    Query(query): Query<DashboardQuery>,
) -> ApiResult<impl IntoResponse> {
    let filter = ContributionFilter::from_query(&query).map_err(ApiError::BadRequest)?;

    let rows = state.contributions.all_with_members().await.map_err(|e| {
        error!("Failed to load contributions: {}", e);
        ApiError::InternalServerError
    })?;

    let contributions = filter_contributions(&rows, &filter);
    let summary = summarize(&contributions);

    if let Some(user) = snapshot.user() {
        info!("Admin dashboard viewed by user {}", user.id);
    }

    Ok(Json(DashboardResponse {
        contributions,
        total_count: summary.total_count,
        total_amount: summary.total_amount,
        unique_members: summary.unique_members,
    }))
}

/// Catch-all for unknown routes
pub async fn not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({"error": "Not found"})),
    )
}
