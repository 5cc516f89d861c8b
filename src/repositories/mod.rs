pub mod account;
pub mod memory;

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::models::Account;

pub use account::PgAccountRepository;
pub use memory::InMemoryAccountStore;

/// ストア層のエラー
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("メールアドレスが既に登録されている")]
    EmailTaken,

    #[error("データベースエラー")]
    Database(#[from] sqlx::Error),
}

/// アカウントの永続化
///
/// 各操作は1アカウントに対する単一の更新で完結する。
/// ロックはストア側の行単位の原子性に任せる。
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// ストア種別（ヘルスチェック表示用）
    fn backend(&self) -> &'static str;

    /// メールアドレス（大文字小文字を区別）でアカウントを検索
    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, StoreError>;

    /// 新しいアカウントを作成
    ///
    /// # Errors
    /// メールアドレス重複時は `StoreError::EmailTaken`
    async fn create(&self, email: &str, password_hash: &str) -> Result<Account, StoreError>;

    /// リセットトークンのハッシュと有効期限を保存（既存のトークンは上書き）
    async fn set_reset_token(
        &self,
        account_id: Uuid,
        token_hash: &str,
        expires_at: OffsetDateTime,
    ) -> Result<(), StoreError>;

    /// ハッシュが一致し、有効期限が `now` より後のアカウントを検索
    async fn find_by_valid_reset_token(
        &self,
        token_hash: &str,
        now: OffsetDateTime,
    ) -> Result<Option<Account>, StoreError>;

    /// パスワードを更新し、リセットトークンを同一更新内で消去
    ///
    /// トークンがまだ一致・有効な場合のみ更新する。
    /// 更新できなかった（先に消費された・期限切れ）場合は `false`。
    async fn complete_password_reset(
        &self,
        account_id: Uuid,
        token_hash: &str,
        new_password_hash: &str,
        now: OffsetDateTime,
    ) -> Result<bool, StoreError>;

    /// 期限切れ（expires_at <= now）のリセットトークンを消去
    ///
    /// # Returns
    /// 消去したアカウント数
    async fn clear_expired_reset_tokens(&self, now: OffsetDateTime) -> Result<u64, StoreError>;
}
