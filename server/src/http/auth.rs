use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use entity::{employee, refresh_token, role, user};
use platform_api::{ApiError, ApiResponse, ApiResult};
use platform_authn::{generate_refresh_token, hash_refresh_token, issue_access_token, verify_password};
use sea_orm::{ActiveModelTrait, ColumnTrait, Condition, EntityTrait, QueryFilter, Set};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use super::{
    AppState,
    access::CurrentUser,
    support::{normalize_email, now},
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
        .route("/auth/logout", post(logout))
        .route("/auth/me", get(me))
}

#[derive(Debug, Deserialize)]
struct LoginRequest {
    email: String,
    password: String,
}

#[derive(Debug, Deserialize)]
struct RefreshRequest {
    refresh_token: String,
}

#[derive(Debug, Serialize)]
struct TokenPair {
    access_token: String,
    token_type: &'static str,
    expires_at: DateTime<Utc>,
    refresh_token: String,
    refresh_expires_at: DateTime<Utc>,
    user: user::Model,
}

#[derive(Debug, Serialize)]
struct MeResponse {
    user: user::Model,
    role: Option<role::Model>,
    employee: Option<employee::Model>,
    menus: Vec<String>,
}

async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> ApiResult<ApiResponse<TokenPair>> {
    let invalid = || ApiError::unauthorized("invalid email or password");
    let email = normalize_email(&body.email).map_err(|_| invalid())?;
    let account = user::Entity::find()
        .filter(user::Column::Email.eq(email))
        .one(&state.db)
        .await?
        .ok_or_else(invalid)?;
    let matches = verify_password(&body.password, &account.password_hash).map_err(ApiError::internal)?;
    if !matches {
        return Err(invalid());
    }
    if !account.is_active {
        return Err(ApiError::forbidden("account disabled"));
    }

    let mut active: user::ActiveModel = account.into();
    active.last_login_at = Set(Some(now()));
    let account = active.update(&state.db).await?;
    let pair = issue_pair(&state, account).await?;
    info!(user_id = %pair.user.id, "user logged in");
    Ok(ApiResponse::ok("login successful", pair))
}

async fn refresh(
    State(state): State<AppState>,
    Json(body): Json<RefreshRequest>,
) -> ApiResult<ApiResponse<TokenPair>> {
    let stale = || ApiError::unauthorized("invalid or expired refresh token");
    let stored = refresh_token::Entity::find()
        .filter(refresh_token::Column::TokenHash.eq(hash_refresh_token(&body.refresh_token)))
        .one(&state.db)
        .await?
        .ok_or_else(stale)?;
    if stored.revoked_at.is_some() || stored.expires_at.with_timezone(&Utc) <= Utc::now() {
        return Err(stale());
    }
    let account = user::Entity::find_by_id(stored.user_id)
        .one(&state.db)
        .await?
        .filter(|account| account.is_active)
        .ok_or_else(stale)?;

    let mut revoked: refresh_token::ActiveModel = stored.into();
    revoked.revoked_at = Set(Some(now()));
    revoked.update(&state.db).await?;

    let pair = issue_pair(&state, account).await?;
    Ok(ApiResponse::ok("token refreshed", pair))
}

async fn logout(
    State(state): State<AppState>,
    Json(body): Json<RefreshRequest>,
) -> ApiResult<ApiResponse<()>> {
    let stored = refresh_token::Entity::find()
        .filter(refresh_token::Column::TokenHash.eq(hash_refresh_token(&body.refresh_token)))
        .one(&state.db)
        .await?;
    if let Some(stored) = stored.filter(|t| t.revoked_at.is_none()) {
        let user_id = stored.user_id;
        let mut revoked: refresh_token::ActiveModel = stored.into();
        revoked.revoked_at = Set(Some(now()));
        revoked.update(&state.db).await?;
        info!(%user_id, "user logged out");
    }
    Ok(ApiResponse::message("logged out"))
}

async fn me(State(state): State<AppState>, current: CurrentUser) -> ApiResult<ApiResponse<MeResponse>> {
    let employee = match current.user.employee_id {
        Some(id) => employee::Entity::find_by_id(id).one(&state.db).await?,
        None => None,
    };
    let menus = current.grant_list();
    Ok(ApiResponse::ok(
        "current user",
        MeResponse {
            user: current.user,
            role: current.role,
            employee,
            menus,
        },
    ))
}

async fn issue_pair(state: &AppState, account: user::Model) -> ApiResult<TokenPair> {
    let access = issue_access_token(account.id, account.role_id, account.employee_id, &state.auth)
        .map_err(ApiError::internal)?;
    prune_refresh_tokens(state, account.id).await?;
    let minted = generate_refresh_token(&state.auth);
    refresh_token::ActiveModel {
        id: Set(Uuid::new_v4()),
        user_id: Set(account.id),
        token_hash: Set(minted.hash),
        expires_at: Set(minted.expires_at.into()),
        revoked_at: Set(None),
        created_at: Set(now()),
    }
    .insert(&state.db)
    .await?;
    Ok(TokenPair {
        access_token: access.token,
        token_type: "Bearer",
        expires_at: access.expires_at,
        refresh_token: minted.token,
        refresh_expires_at: minted.expires_at,
        user: account,
    })
}

/// Drops the user's revoked and expired refresh tokens.
async fn prune_refresh_tokens(state: &AppState, user_id: Uuid) -> ApiResult<u64> {
    let pruned = refresh_token::Entity::delete_many()
        .filter(refresh_token::Column::UserId.eq(user_id))
        .filter(
            Condition::any()
                .add(refresh_token::Column::RevokedAt.is_not_null())
                .add(refresh_token::Column::ExpiresAt.lte(now())),
        )
        .exec(&state.db)
        .await?
        .rows_affected;
    if pruned > 0 {
        debug!(%user_id, pruned, "stale refresh tokens removed");
    }
    Ok(pruned)
}
