use axum::{Json, extract::State};
use garde::Validate;
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::extractors::ValidatedJson;
use crate::models::Account;
use crate::services::AuthService;
use crate::state::AppState;

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[serde(default)]
    #[garde(email)]
    pub email: String,
    #[serde(default)]
    #[garde(length(min = 8, max = 128))]
    pub password: String, // SecretBox不要（Deserialize後すぐハッシュ化）
    #[serde(default)]
    #[garde(matches(password))]
    pub confirm_password: String,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub success: bool,
    pub message: String,
    pub account: Account,
}

/// アカウント登録ハンドラー
///
/// POST /api/v1/auth/signup
///
/// # Security
/// - パスワードはログに出力しない
pub async fn register(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<RegisterRequest>,
) -> Result<Json<RegisterResponse>, AppError> {
    let auth_service = AuthService::new(state.accounts.clone());
    let account = auth_service
        .register(&request.email, &request.password)
        .await?;

    Ok(Json(RegisterResponse {
        success: true,
        message: "Account created successfully".to_string(),
        account,
    }))
}
