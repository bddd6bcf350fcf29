use crate::errors::{AppError, FeedbackError};
use crate::models::{
    FeedbackItem, FeedbackView, ListQuery, LoginRequest, MessageResponse, NewFeedback,
    SessionResponse, StatsResponse, Status, StatusUpdateRequest, SubmitFeedbackRequest,
    SubmitResponse, VoteDirection, VoteRequest, VoteResponse,
};
use crate::session::{classify, expired_session_cookie, session_cookie, session_token, Viewer};
use crate::state::AppState;
use crate::stats::build_stats;
use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use std::collections::HashMap;
use tracing::{info, warn};

pub async fn submit_feedback(
    State(state): State<AppState>,
    body: Result<Json<SubmitFeedbackRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<SubmitResponse>), AppError> {
    let feedback = NewFeedback::try_from(payload(body)?)?;
    let id = state
        .store
        .lock()
        .await
        .submit(&feedback, Utc::now().naive_utc())?;
    info!(id, rating = feedback.rating, "feedback submitted");

    Ok((
        StatusCode::CREATED,
        Json(SubmitResponse {
            message: "Feedback sent successfully".to_string(),
            id,
        }),
    ))
}

pub async fn list_feedback(
    State(state): State<AppState>,
    viewer: Viewer,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<FeedbackView>>, AppError> {
    let status = match query.status.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(raw) => match Status::parse(raw) {
            Ok(status) => Some(status),
            // unknown statuses match no rows
            Err(_) => return Ok(Json(Vec::new())),
        },
    };

    let store = state.store.lock().await;
    let items = store.list(status)?;
    let mine = match viewer.identity() {
        Some(identity) => store.votes_for_user(identity.id())?,
        None => HashMap::new(),
    };
    drop(store);

    Ok(Json(
        items.into_iter().map(|item| annotate(item, &mine)).collect(),
    ))
}

pub async fn get_feedback(
    State(state): State<AppState>,
    viewer: Viewer,
    Path(id): Path<i64>,
) -> Result<Json<FeedbackView>, AppError> {
    let store = state.store.lock().await;
    let item = store.get(id)?.ok_or(FeedbackError::NotFound(id))?;
    let mine = match viewer.identity() {
        Some(identity) => store.votes_for_user(identity.id())?,
        None => HashMap::new(),
    };

    Ok(Json(annotate(item, &mine)))
}

pub async fn get_stats(State(state): State<AppState>) -> Result<Json<StatsResponse>, AppError> {
    let items = state.store.lock().await.list(None)?;
    Ok(Json(build_stats(&items)))
}

pub async fn update_status(
    State(state): State<AppState>,
    viewer: Viewer,
    Path(id): Path<i64>,
    body: Result<Json<StatusUpdateRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, AppError> {
    if let Err(err) = viewer.require_admin() {
        warn!(id, "status update rejected for non-admin session");
        return Err(err.into());
    }

    let status = Status::parse(payload(body)?.status.trim())?;
    state.store.lock().await.update_status(id, status)?;
    info!(id, status = status.as_str(), "status updated");

    Ok(Json(MessageResponse {
        message: "Status updated".to_string(),
    }))
}

pub async fn cast_vote(
    State(state): State<AppState>,
    viewer: Viewer,
    Path(id): Path<i64>,
    body: Result<Json<VoteRequest>, JsonRejection>,
) -> Result<Json<VoteResponse>, AppError> {
    let user_id = match viewer.require_identified() {
        Ok(user_id) => user_id,
        Err(err) => {
            warn!(id, "vote rejected for anonymous session");
            return Err(err.into());
        }
    };

    let direction = VoteDirection::parse(&payload(body)?.vote)?;
    let votes = state.store.lock().await.cast_vote(id, user_id, direction)?;
    info!(id, user_id, votes, "vote recorded");

    Ok(Json(VoteResponse {
        message: "Vote recorded".to_string(),
        votes,
        my_vote: direction.value(),
    }))
}

pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let identity = classify(&payload(body)?.id)?;

    if let Some(previous) = session_token(&headers) {
        state.sessions.logout(&previous).await;
    }
    let token = state.sessions.login(identity.clone()).await;
    info!(role = identity.role(), "logged in");

    Ok((
        [(header::SET_COOKIE, session_cookie(&token))],
        Json(SessionResponse {
            message: Some("Logged in".to_string()),
            role: identity.role().to_string(),
            id: Some(identity.id().to_string()),
        }),
    ))
}

pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    if let Some(token) = session_token(&headers) {
        state.sessions.logout(&token).await;
    }

    (
        [(header::SET_COOKIE, expired_session_cookie())],
        Json(MessageResponse {
            message: "Logged out".to_string(),
        }),
    )
}

pub async fn current_session(viewer: Viewer) -> Json<SessionResponse> {
    let identity = viewer.identity();
    Json(SessionResponse {
        message: None,
        role: identity.map_or("anonymous", |identity| identity.role()).to_string(),
        id: identity.map(|identity| identity.id().to_string()),
    })
}

fn payload<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    body.map(|Json(value)| value)
        .map_err(|rejection| AppError::bad_request(rejection.body_text()))
}

fn annotate(item: FeedbackItem, mine: &HashMap<i64, VoteDirection>) -> FeedbackView {
    let my_vote = mine.get(&item.id).map(|direction| direction.value());
    FeedbackView { item, my_vote }
}
