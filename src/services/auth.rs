use std::sync::Arc;

use argon2::password_hash::SaltString;
use argon2::password_hash::rand_core::OsRng;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};

use crate::error::AppError;
use crate::models::Account;
use crate::repositories::AccountStore;

/// タイミング攻撃対策用のダミーハッシュ（どの入力とも一致しない）
const DUMMY_HASH: &str =
    "$argon2id$v=19$m=19456,t=2,p=1$c29tZXNhbHRzb21lc2FsdA$3+9qz1ChqFPFMJmCP6S0G5ouSs2p2W/uQ0XqIXtNJwE";

/// パスワードをargon2idでハッシュ化
pub fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| {
            tracing::error!(error = ?e, "パスワードハッシュ生成エラー");
            AppError::Internal(anyhow::anyhow!("password hash error"))
        })?;
    Ok(hash.to_string())
}

/// パスワードを検証
pub fn verify_password(password: &str, hash: &str) -> Result<bool, AppError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|e| {
        tracing::error!(error = ?e, "パスワードハッシュのパースエラー");
        AppError::Internal(anyhow::anyhow!("password hash parse error"))
    })?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

/// 認証サービス
#[derive(Clone)]
pub struct AuthService {
    accounts: Arc<dyn AccountStore>,
}

impl AuthService {
    /// 新しい AuthService を作成
    pub fn new(accounts: Arc<dyn AccountStore>) -> Self {
        Self { accounts }
    }

    /// アカウントを登録
    pub async fn register(&self, email: &str, password: &str) -> Result<Account, AppError> {
        // パスワードハッシュ化
        let password_hash = hash_password(password)?;

        let account = self.accounts.create(email, &password_hash).await?;

        tracing::info!(account_id = %account.id, "アカウント登録成功");

        Ok(account)
    }

    /// ユーザー認証を実行
    ///
    /// タイミング攻撃対策: アカウントが存在しない場合もダミーのパスワード検証を実行
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<Account, AppError> {
        let account = self.accounts.find_by_email(email).await?;

        match account {
            Some(account) => {
                if verify_password(password, &account.password_hash)? {
                    tracing::info!(account_id = %account.id, "認証成功");
                    Ok(account)
                } else {
                    Err(AppError::Authentication("password_mismatch".to_string()))
                }
            }
            None => {
                let _ = verify_password(password, DUMMY_HASH);
                Err(AppError::Authentication("unknown_account".to_string()))
            }
        }
    }
}
