use axum::{
    Json,
    extract::State,
    http::{HeaderMap, header},
};
use garde::Validate;
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::extractors::{JsonBody, ValidatedJson};
use crate::handlers::MessageResponse;
use crate::services::PasswordResetService;
use crate::state::AppState;

// === リセットトークン発行 ===

#[derive(Debug, Deserialize, Validate)]
pub struct ResetTokenRequest {
    #[serde(default)]
    #[garde(email)]
    pub email: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetTokenResponse {
    pub success: bool,
    pub message: String,
    /// false の場合トークンは発行済み。再リクエストで再送できる
    pub email_sent: bool,
}

/// POST /api/v1/auth/reset-password-token
pub async fn request_password_reset(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<ResetTokenRequest>,
) -> Result<Json<ResetTokenResponse>, AppError> {
    let password_reset_service = password_reset_service(&state);
    let delivery = password_reset_service.request_reset(&request.email).await?;

    let (email_sent, message) = if delivery.reported_as_sent() {
        (true, "Password reset link has been sent to your email")
    } else {
        (
            false,
            "Password reset link was created but the email could not be sent, please try again",
        )
    };

    Ok(Json(ResetTokenResponse {
        success: true,
        message: message.to_string(),
        email_sent,
    }))
}

// === パスワードリセット実行 ===

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    /// ボディ以外（Cookie / Authorization）から渡される場合もある
    #[serde(default)]
    #[garde(skip)]
    pub token: Option<String>,
    #[serde(default)]
    #[garde(required, length(min = 8, max = 128))]
    pub password: Option<String>,
    #[serde(default)]
    #[garde(required)]
    pub confirm_password: Option<String>,
}

/// リセットトークンの受け取り元（優先順）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenSource {
    Body,
    Cookie,
    Bearer,
}

impl TokenSource {
    pub const PRECEDENCE: [TokenSource; 3] = [Self::Body, Self::Cookie, Self::Bearer];
}

/// 受け取り元を解決済みのリセットトークン
#[derive(Debug, PartialEq, Eq)]
pub struct ResetToken {
    pub value: String,
    pub source: TokenSource,
}

/// POST /api/v1/auth/reset-password
///
/// # Security
/// - token, password はログに出力しない
pub async fn reset_password(
    State(state): State<AppState>,
    headers: HeaderMap,
    JsonBody(request): JsonBody<ResetPasswordRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    request.validate()?;

    let token = resolve_reset_token(request.token.as_deref(), &headers);
    if let Some(token) = &token {
        tracing::debug!(source = ?token.source, "リセットトークン受領");
    }

    let password_reset_service = password_reset_service(&state);
    password_reset_service
        .reset_password(
            token.as_ref().map(|t| t.value.as_str()).unwrap_or_default(),
            request.password.as_deref().unwrap_or_default(),
            request.confirm_password.as_deref().unwrap_or_default(),
        )
        .await?;

    Ok(Json(MessageResponse::ok("Password reset successful")))
}

fn password_reset_service(state: &AppState) -> PasswordResetService {
    PasswordResetService::new(
        state.accounts.clone(),
        state.email_service.clone(),
        state.clock.clone(),
        state.config.clone(),
    )
}

/// 優先順に従ってトークンを取り出す（空文字は無視）
pub fn resolve_reset_token(body_token: Option<&str>, headers: &HeaderMap) -> Option<ResetToken> {
    TokenSource::PRECEDENCE.iter().find_map(|&source| {
        let value = match source {
            TokenSource::Body => body_token.map(str::to_string),
            TokenSource::Cookie => cookie_value(headers, "token"),
            TokenSource::Bearer => bearer_token(headers),
        }?;
        let value = value.trim();
        (!value.is_empty()).then(|| ResetToken {
            value: value.to_string(),
            source,
        })
    })
}

fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.to_string())
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::to_string)
}
