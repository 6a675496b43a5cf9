//! services/api/src/web/auth.rs
//!
//! Account endpoints: OTP-gated signup, login, and profile management.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Extension, Json};
use serde::{Deserialize, Serialize};
use shop_core::{Account, AuthenticatedAccount, RegistrationOutcome};
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::ApiError;
use crate::web::middleware::AuthContext;
use crate::web::rest::MessageResponse;
use crate::web::state::AppState;

//=========================================================================================
// Request/Response Types
//=========================================================================================

/// Missing fields decode as empty strings so they fail validation with a 400.
#[derive(Deserialize, ToSchema, Default)]
#[serde(default)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Deserialize, ToSchema, Default)]
#[serde(default)]
pub struct VerifyOtpRequest {
    pub email: String,
    pub otp: String,
}

#[derive(Deserialize, ToSchema, Default)]
#[serde(default)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize, ToSchema)]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
}

#[derive(Deserialize, ToSchema, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

/// The public view of an account. Never carries the password hash.
#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: String,
    pub is_verified: bool,
}

impl From<Account> for UserResponse {
    fn from(account: Account) -> Self {
        Self {
            id: account.id,
            name: account.name,
            email: account.email,
            role: account.role.as_str().to_string(),
            is_verified: account.is_verified,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct AuthResponse {
    pub success: bool,
    pub message: String,
    pub token: String,
    pub user: UserResponse,
}

impl AuthResponse {
    fn new(message: &str, authenticated: AuthenticatedAccount) -> Self {
        Self {
            success: true,
            message: message.to_string(),
            token: authenticated.token,
            user: authenticated.account.into(),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct UserEnvelope {
    pub success: bool,
    pub user: UserResponse,
}

//=========================================================================================
// Handlers
//=========================================================================================

/// POST /api/auth/register - Start a signup and email a one-time code
#[utoipa::path(
    post,
    path = "/api/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "OTP sent for a new signup", body = MessageResponse),
        (status = 200, description = "OTP re-sent for a signup already in progress", body = MessageResponse),
        (status = 400, description = "Invalid input or email already registered"),
        (status = 500, description = "Failed to send the verification email")
    ),
    tag = "auth"
)]
pub async fn register_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let outcome = state
        .registration
        .submit_registration(&req.name, &req.email, &req.password)
        .await?;

    let status = match outcome {
        RegistrationOutcome::Issued => StatusCode::CREATED,
        RegistrationOutcome::Resent => StatusCode::OK,
    };
    Ok((status, Json(MessageResponse::ok(outcome.message()))))
}

/// POST /api/auth/verify-otp - Confirm the emailed code and create the account
#[utoipa::path(
    post,
    path = "/api/auth/verify-otp",
    request_body = VerifyOtpRequest,
    responses(
        (status = 200, description = "Account created and signed in", body = AuthResponse),
        (status = 400, description = "No pending signup, or the code is wrong or expired")
    ),
    tag = "auth"
)]
pub async fn verify_otp_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<VerifyOtpRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let authenticated = state.registration.verify_otp(&req.email, &req.otp).await?;
    Ok(Json(AuthResponse::new(
        "Email verified successfully",
        authenticated,
    )))
}

/// POST /api/auth/login - Exchange email and password for a session token
#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 401, description = "Invalid credentials or email not verified")
    ),
    tag = "auth"
)]
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let authenticated = state.accounts.login(&req.email, &req.password).await?;
    Ok(Json(AuthResponse::new("Login successful", authenticated)))
}

/// GET /api/auth/me - The signed-in account
#[utoipa::path(
    get,
    path = "/api/auth/me",
    responses(
        (status = 200, description = "Current account", body = UserEnvelope),
        (status = 401, description = "Not authenticated")
    ),
    security(("bearer" = [])),
    tag = "auth"
)]
pub async fn me_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
) -> Result<impl IntoResponse, ApiError> {
    let account = state.accounts.me(auth.account_id).await?;
    Ok(Json(UserEnvelope {
        success: true,
        user: account.into(),
    }))
}

/// PUT /api/auth/profile - Update the signed-in account's display name
#[utoipa::path(
    put,
    path = "/api/auth/profile",
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Profile updated", body = UserEnvelope),
        (status = 400, description = "Invalid name"),
        (status = 401, description = "Not authenticated")
    ),
    security(("bearer" = [])),
    tag = "auth"
)]
pub async fn update_profile_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let account = state
        .accounts
        .update_profile(auth.account_id, req.name.as_deref())
        .await?;
    Ok(Json(UserEnvelope {
        success: true,
        user: account.into(),
    }))
}

/// PUT /api/auth/change-password - Replace the password after re-checking the current one
#[utoipa::path(
    put,
    path = "/api/auth/change-password",
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "Password changed", body = MessageResponse),
        (status = 400, description = "New password too short"),
        (status = 401, description = "Current password is wrong or not authenticated")
    ),
    security(("bearer" = [])),
    tag = "auth"
)]
pub async fn change_password_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<ChangePasswordRequest>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .accounts
        .change_password(auth.account_id, &req.current_password, &req.new_password)
        .await?;
    Ok(Json(MessageResponse::ok("Password changed successfully")))
}
