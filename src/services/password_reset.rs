use std::sync::Arc;

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::RngCore;
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};
use time::Duration;

use crate::config::Config;
use crate::error::AppError;
use crate::repositories::AccountStore;
use crate::services::auth::hash_password;
use crate::services::clock::Clock;
use crate::services::email::{EmailService, MailError};

/// 生成するトークンのバイト長
const TOKEN_BYTES: usize = 32;

/// リセットメールの送信結果
///
/// トークンの保存は送信結果に関わらず確定している。
#[derive(Debug)]
pub enum MailDelivery {
    Sent,
    /// 保存済みだが送信に失敗（再送は呼び出し側が判断）
    Failed(MailError),
    /// 未登録メールアドレスを秘匿した（何も保存・送信していない）
    Concealed,
}

impl MailDelivery {
    /// 呼び出し元に「送信した」と見せるか
    pub fn reported_as_sent(&self) -> bool {
        !matches!(self, Self::Failed(_))
    }
}

/// パスワードリセットサービス
#[derive(Clone)]
pub struct PasswordResetService {
    accounts: Arc<dyn AccountStore>,
    email_service: EmailService,
    clock: Arc<dyn Clock>,
    config: Arc<Config>,
}

impl PasswordResetService {
    /// 新しい PasswordResetService を作成
    pub fn new(
        accounts: Arc<dyn AccountStore>,
        email_service: EmailService,
        clock: Arc<dyn Clock>,
        config: Arc<Config>,
    ) -> Self {
        Self {
            accounts,
            email_service,
            clock,
            config,
        }
    }

    /// パスワードリセットをリクエスト
    ///
    /// # Security
    /// - トークン（平文）はログに出力しない
    /// - 未登録メールアドレスは `EmailNotRegistered`（秘匿設定時は `Concealed`）
    pub async fn request_reset(&self, email: &str) -> Result<MailDelivery, AppError> {
        let Some(account) = self.accounts.find_by_email(email).await? else {
            if self.config.password_reset_conceal_unknown_email {
                tracing::info!("パスワードリセット: アカウント不在（秘匿して成功扱い）");
                return Ok(MailDelivery::Concealed);
            }
            tracing::info!("パスワードリセット: アカウント不在");
            return Err(AppError::EmailNotRegistered);
        };

        let token = generate_token();
        let token_hash = hash_token(&token);
        let expires_at = self
            .clock
            .now()
            .checked_add(self.token_ttl())
            .ok_or_else(|| anyhow::anyhow!("reset token expiry is out of range"))?;

        // 既存トークンは上書きされる
        self.accounts
            .set_reset_token(account.id, &token_hash, expires_at)
            .await?;

        let reset_url = self.build_reset_url(&token);

        // 送信失敗でもトークンは保存済みのまま
        let delivery = match self
            .email_service
            .send_password_reset_email(&account.email, &reset_url, self.token_ttl().whole_minutes())
            .await
        {
            Ok(()) => {
                tracing::info!(account_id = %account.id, "パスワードリセットメール送信完了");
                MailDelivery::Sent
            }
            Err(e) => {
                tracing::error!(account_id = %account.id, error = %e, "パスワードリセットメール送信失敗");
                MailDelivery::Failed(e)
            }
        };

        Ok(delivery)
    }

    /// パスワードをリセット
    ///
    /// # Security
    /// - トークン・新パスワードはログに出力しない
    /// - 不一致と期限切れは同じエラーを返す
    pub async fn reset_password(
        &self,
        token: &str,
        new_password: &str,
        confirm_password: &str,
    ) -> Result<(), AppError> {
        validate_reset_input(token, new_password, confirm_password)?;

        let token_hash = hash_token(token);

        let account = self
            .accounts
            .find_by_valid_reset_token(&token_hash, self.clock.now())
            .await?
            .ok_or(AppError::InvalidResetToken)?;

        let password_hash = hash_password(new_password)?;

        // パスワード更新とトークン消去を1回の更新で行う
        // ハッシュ計算中に期限切れになったトークンは受け付けない
        let updated = self
            .accounts
            .complete_password_reset(account.id, &token_hash, &password_hash, self.clock.now())
            .await?;
        if !updated {
            tracing::warn!(account_id = %account.id, "リセットトークンが同時に消費された");
            return Err(AppError::InvalidResetToken);
        }

        tracing::info!(account_id = %account.id, "パスワードリセット完了");

        if self.config.password_reset_notify_on_change {
            let email_service = self.email_service.clone();
            let to = account.email.clone();
            tokio::spawn(async move {
                if let Err(e) = email_service.send_password_changed_email(&to).await {
                    tracing::warn!(error = %e, "パスワード変更通知の送信失敗");
                }
            });
        }

        Ok(())
    }

    /// 期限切れのリセットトークンを消去
    pub async fn clear_expired_tokens(&self) -> Result<u64, AppError> {
        let cleared = self
            .accounts
            .clear_expired_reset_tokens(self.clock.now())
            .await?;
        if cleared > 0 {
            tracing::info!(cleared, "期限切れリセットトークンを消去");
        }
        Ok(cleared)
    }

    fn token_ttl(&self) -> Duration {
        Duration::seconds(self.config.password_reset_token_ttl_secs)
    }

    /// リセットURLを構築
    fn build_reset_url(&self, token: &str) -> String {
        format!(
            "{}?token={}",
            self.config.password_reset_url_base,
            urlencoding::encode(token)
        )
    }
}

/// 32バイトのランダムトークンを生成（Base64URL、パディングなし）
pub fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// トークンをSHA256でハッシュ化（16進小文字）
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn validate_reset_input(
    token: &str,
    new_password: &str,
    confirm_password: &str,
) -> Result<(), AppError> {
    if token.trim().is_empty() {
        return Err(AppError::Validation("token is required".to_string()));
    }
    if new_password.is_empty() {
        return Err(AppError::Validation("password is required".to_string()));
    }
    if confirm_password.is_empty() {
        return Err(AppError::Validation(
            "confirmPassword is required".to_string(),
        ));
    }
    if new_password != confirm_password {
        return Err(AppError::Validation("Passwords do not match".to_string()));
    }
    Ok(())
}
