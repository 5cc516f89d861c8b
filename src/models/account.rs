use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// アカウント
///
/// リセットトークンは平文を保存せず、SHA256ハッシュと有効期限のみ保持する。
/// 未発行の間は両方とも NULL。
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: Uuid,
    pub email: String,
    #[serde(skip)]
    pub password_hash: String,
    #[serde(skip)]
    pub reset_password_token_hash: Option<String>,
    #[serde(skip)]
    pub reset_password_expires_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl Account {
    /// 指定時刻において有効なリセットトークンを保持しているか
    pub fn has_outstanding_reset(&self, now: OffsetDateTime) -> bool {
        matches!(
            (&self.reset_password_token_hash, self.reset_password_expires_at),
            (Some(_), Some(expires_at)) if expires_at > now
        )
    }
}
