use axum::{
    extract::{FromRef, State},
    http::{header, StatusCode},
    response::{AppendHeaders, IntoResponse},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use tracing::{error, info, instrument, warn};

use crate::{
    auth::{
        dto::{
            AuthResponse, ForgotPasswordRequest, LoginRequest, PublicUser, RegisterRequest,
            ResetPasswordRequest,
        },
        repo,
        services::{
            clear_session_cookie, hash_password, is_valid_email, is_valid_identity_number,
            session_cookie, verify_password, JwtKeys,
        },
    },
    error::AppError,
    state::AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/logout", get(logout))
        .route("/forgot-password", post(forgot_password))
        .route("/reset-password", post(reset_password))
}

fn issue_session(
    state: &AppState,
    user: crate::auth::repo_types::User,
) -> Result<impl IntoResponse, AppError> {
    let keys = JwtKeys::from_ref(state);
    let token = keys.sign(user.id)?;
    let cookie = session_cookie(&token, keys.ttl, state.config.secure_cookies);
    Ok((
        AppendHeaders([(header::SET_COOKIE, cookie)]),
        Json(AuthResponse {
            token,
            user: PublicUser::from(user),
        }),
    ))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(mut payload): Json<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.email = payload.email.trim().to_lowercase();
    payload.name = payload.name.trim().to_string();

    if payload.name.is_empty() {
        return Err(AppError::Validation("Name is required".into()));
    }
    if !is_valid_email(&payload.email) {
        warn!(email = %payload.email, "invalid email");
        return Err(AppError::Validation("Invalid email".into()));
    }
    if payload.password.is_empty() {
        return Err(AppError::Validation("Password is required".into()));
    }
    if !is_valid_identity_number(&payload.identity_number) {
        warn!("invalid identity number");
        return Err(AppError::Validation(
            "Invalid identity number (12 digits required)".into(),
        ));
    }

    if repo::exists(&state.db, &payload.email, &payload.identity_number).await? {
        warn!(email = %payload.email, "duplicate registration");
        return Err(AppError::Duplicate("User already exists".into()));
    }

    let hash = hash_password(&payload.password)?;
    let user = repo::create(
        &state.db,
        &payload.name,
        &payload.email,
        &hash,
        &payload.identity_number,
    )
    .await
    .map_err(|e| AppError::duplicate_on_conflict(e, "User already exists"))?;

    info!(user_id = %user.id, email = %user.email, "user registered");
    // Auto-login: session issued immediately after registration.
    issue_session(&state, user)
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(mut payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.email = payload.email.trim().to_lowercase();

    // Unknown email and wrong password fall through to the same error.
    let user = match repo::find_by_email(&state.db, &payload.email).await? {
        Some(u) => u,
        None => {
            warn!(email = %payload.email, "login unknown email");
            return Err(AppError::InvalidCredentials);
        }
    };

    if !verify_password(&payload.password, &user.password_hash)? {
        warn!(user_id = %user.id, "login invalid password");
        return Err(AppError::InvalidCredentials);
    }

    info!(user_id = %user.id, email = %user.email, "user logged in");
    issue_session(&state, user)
}

#[instrument]
pub async fn logout() -> impl IntoResponse {
    (
        AppendHeaders([(header::SET_COOKIE, clear_session_cookie())]),
        Json(json!({ "message": "Logged out" })),
    )
}

#[instrument(skip(state, payload))]
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(mut payload): Json<ForgotPasswordRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.email = payload.email.trim().to_lowercase();

    // The response never reveals whether the account exists.
    if let Some(user) = repo::find_by_email(&state.db, &payload.email).await? {
        let code = state.otp.generate(&user.email, user.id);
        if let Err(e) = state.mailer.send_otp_email(&user.email, &code).await {
            error!(error = %e, user_id = %user.id, "otp email failed");
        }
        state.otp.cleanup();
    }

    Ok((
        StatusCode::OK,
        Json(json!({ "message": "If the account exists, an OTP has been sent" })),
    ))
}

#[instrument(skip(state, payload))]
pub async fn reset_password(
    State(state): State<AppState>,
    Json(mut payload): Json<ResetPasswordRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.email = payload.email.trim().to_lowercase();

    if payload.new_password.is_empty() {
        return Err(AppError::Validation("Password is required".into()));
    }

    let user_id = state
        .otp
        .verify_and_consume(&payload.email, &payload.otp)
        .ok_or_else(|| AppError::Unauthorized("OTP expired or invalid".into()))?;

    let hash = hash_password(&payload.new_password)?;
    repo::update_password(&state.db, user_id, &hash).await?;

    info!(user_id = %user_id, "password reset via otp");
    Ok((
        StatusCode::OK,
        Json(json!({ "message": "Password changed successfully" })),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    // Short passwords are valid: registration enforces presence only, no
    // minimum length.
    #[tokio::test]
    async fn register_accepts_short_passwords() {
        let state = AppState::fake();
        let result = register(
            State(state),
            Json(RegisterRequest {
                name: "Alice".into(),
                email: "alice@x.com".into(),
                password: "pw1".into(),
                identity_number: "123456789012".into(),
            }),
        )
        .await;

        // The fake pool cannot serve the duplicate check, so the call
        // fails later. All that matters here is that validation let the
        // three-character password through.
        match result {
            Err(AppError::Validation(msg)) => panic!("password rejected: {msg}"),
            _ => {}
        }
    }

    #[tokio::test]
    async fn reset_password_accepts_short_passwords() {
        let state = AppState::fake();
        let result = reset_password(
            State(state),
            Json(ResetPasswordRequest {
                email: "alice@x.com".into(),
                otp: "123456".into(),
                new_password: "pw2".into(),
            }),
        )
        .await;

        // No pending OTP: the request must reach the OTP check, not die
        // on password validation.
        match result {
            Err(AppError::Unauthorized(_)) => {}
            Err(e) => panic!("expected otp rejection, got {e}"),
            Ok(_) => panic!("reset succeeded without a pending otp"),
        }
    }

    #[tokio::test]
    async fn register_requires_a_password() {
        let state = AppState::fake();
        let result = register(
            State(state),
            Json(RegisterRequest {
                name: "Alice".into(),
                email: "alice@x.com".into(),
                password: "".into(),
                identity_number: "123456789012".into(),
            }),
        )
        .await;

        match result {
            Err(AppError::Validation(msg)) => assert_eq!(msg, "Password is required"),
            _ => panic!("empty password accepted"),
        }
    }

    #[test]
    fn auth_response_hides_password_hash() {
        let user = crate::auth::repo_types::User {
            id: uuid::Uuid::new_v4(),
            name: "Alice".into(),
            email: "alice@x.com".into(),
            password_hash: "secret-hash".into(),
            identity_number: "123456789012".into(),
            created_at: time::OffsetDateTime::now_utc(),
        };
        let json = serde_json::to_string(&PublicUser::from(user)).unwrap();
        assert!(json.contains("alice@x.com"));
        assert!(json.contains("123456789012"));
        assert!(!json.contains("secret-hash"));
    }
}
