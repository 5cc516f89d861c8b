use async_trait::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use super::{AccountStore, StoreError};
use crate::models::Account;

const ACCOUNT_COLUMNS: &str = "id, email, password_hash, reset_password_token_hash, \
     reset_password_expires_at, created_at, updated_at";

/// PostgreSQL 上のアカウントリポジトリ
#[derive(Clone)]
pub struct PgAccountRepository {
    pool: PgPool,
}

impl PgAccountRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AccountStore for PgAccountRepository {
    fn backend(&self) -> &'static str {
        "postgres"
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, StoreError> {
        let account = sqlx::query_as::<_, Account>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(account)
    }

    async fn create(&self, email: &str, password_hash: &str) -> Result<Account, StoreError> {
        sqlx::query_as::<_, Account>(&format!(
            "INSERT INTO accounts (id, email, password_hash) VALUES ($1, $2, $3) \
             RETURNING {ACCOUNT_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(email)
        .bind(password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            // UNIQUE制約違反チェック
            if let sqlx::Error::Database(db_err) = &e
                && db_err.constraint() == Some("accounts_email_key")
            {
                return StoreError::EmailTaken;
            }
            StoreError::Database(e)
        })
    }

    async fn set_reset_token(
        &self,
        account_id: Uuid,
        token_hash: &str,
        expires_at: OffsetDateTime,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE accounts
            SET reset_password_token_hash = $2,
                reset_password_expires_at = $3,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(account_id)
        .bind(token_hash)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_by_valid_reset_token(
        &self,
        token_hash: &str,
        now: OffsetDateTime,
    ) -> Result<Option<Account>, StoreError> {
        let account = sqlx::query_as::<_, Account>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts \
             WHERE reset_password_token_hash = $1 AND reset_password_expires_at > $2"
        ))
        .bind(token_hash)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        Ok(account)
    }

    async fn complete_password_reset(
        &self,
        account_id: Uuid,
        token_hash: &str,
        new_password_hash: &str,
        now: OffsetDateTime,
    ) -> Result<bool, StoreError> {
        // password_hash はログに出力しないこと
        let result = sqlx::query(
            r#"
            UPDATE accounts
            SET password_hash = $3,
                reset_password_token_hash = NULL,
                reset_password_expires_at = NULL,
                updated_at = NOW()
            WHERE id = $1
              AND reset_password_token_hash = $2
              AND reset_password_expires_at > $4
            "#,
        )
        .bind(account_id)
        .bind(token_hash)
        .bind(new_password_hash)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn clear_expired_reset_tokens(&self, now: OffsetDateTime) -> Result<u64, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE accounts
            SET reset_password_token_hash = NULL,
                reset_password_expires_at = NULL,
                updated_at = NOW()
            WHERE reset_password_expires_at <= $1
            "#,
        )
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}
