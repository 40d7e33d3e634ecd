//! Project invitation handlers.
//!
//! - Create and list invitations (project leads, liaisons, super-admins)
//! - Fetch an invitation by id and token
//! - Accept, update and delete

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use service_core::error::AppError;

use crate::dtos::{
    invitations::{
        AcceptInvitationResponse, CreateInvitationRequest, InvitationResponse,
        InvitationTokenQuery, ListInvitationsQuery, UpdateInvitationRequest,
    },
    Envelope, MessageResponse,
};
use crate::middleware::AuthUser;
use crate::services::InvitationPage;
use crate::utils::ValidatedJson;
use crate::AppState;

fn required_token(query: InvitationTokenQuery) -> Result<String, AppError> {
    query
        .token
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::BadRequest(anyhow::anyhow!("Invitation token is required")))
}

/// POST /projects/:projectID/invitations
#[tracing::instrument(skip(state, user, req))]
pub async fn create_invitation(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(project_id): Path<String>,
    ValidatedJson(req): ValidatedJson<CreateInvitationRequest>,
) -> Result<(StatusCode, Json<Envelope<InvitationResponse>>), AppError> {
    let invitation = state
        .invitations
        .create(&user.user_id, &project_id, &req.email, req.role)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(Envelope::ok(InvitationResponse { invitation })),
    ))
}

/// GET /projects/:projectID/invitations?page=&limit=
#[tracing::instrument(skip(state, user, query))]
pub async fn list_invitations(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(project_id): Path<String>,
    Query(query): Query<ListInvitationsQuery>,
) -> Result<Json<Envelope<InvitationPage>>, AppError> {
    let page = state
        .invitations
        .list(&user.user_id, &project_id, query.page, query.limit)
        .await?;
    Ok(Json(Envelope::ok(page)))
}

/// GET /projects/invitations/:inviteID?token=
#[tracing::instrument(skip(state, query))]
pub async fn get_invitation(
    State(state): State<AppState>,
    Path(invite_id): Path<String>,
    Query(query): Query<InvitationTokenQuery>,
) -> Result<Json<Envelope<InvitationResponse>>, AppError> {
    let token = required_token(query)?;
    let invitation = state.invitations.get(&invite_id, &token).await?;
    Ok(Json(Envelope::ok(InvitationResponse { invitation })))
}

/// POST /projects/invitations/:inviteID/accept?token=
#[tracing::instrument(skip(state, user, query))]
pub async fn accept_invitation(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(invite_id): Path<String>,
    Query(query): Query<InvitationTokenQuery>,
) -> Result<Json<Envelope<AcceptInvitationResponse>>, AppError> {
    let token = required_token(query)?;
    let accepted = state
        .invitations
        .accept(&invite_id, &token, &user.user_id)
        .await?;

    Ok(Json(Envelope::ok(AcceptInvitationResponse {
        msg: accepted.outcome.message(),
        project_id: accepted.project_id,
        outcome: accepted.outcome,
    })))
}

/// PUT /projects/invitations/:inviteID
#[tracing::instrument(skip(state, user, req))]
pub async fn update_invitation(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(invite_id): Path<String>,
    Json(req): Json<UpdateInvitationRequest>,
) -> Result<Json<Envelope<InvitationResponse>>, AppError> {
    let invitation = state
        .invitations
        .update(&user.user_id, &invite_id, req.role)
        .await?;
    Ok(Json(Envelope::ok(InvitationResponse { invitation })))
}

/// DELETE /projects/invitations/:inviteID
#[tracing::instrument(skip(state, user))]
pub async fn delete_invitation(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(invite_id): Path<String>,
) -> Result<Json<Envelope<MessageResponse>>, AppError> {
    state.invitations.delete(&user.user_id, &invite_id).await?;
    Ok(Json(Envelope::ok(MessageResponse::new("Invitation deleted"))))
}
