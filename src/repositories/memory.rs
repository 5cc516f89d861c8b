use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{AccountStore, StoreError};
use crate::models::Account;
use crate::services::clock::{Clock, SystemClock};

/// インメモリのアカウントストア
///
/// DATABASE_URL 未設定時（開発環境）とテストで使用する。
/// 各操作は書き込みロック1回の中で完結する。
/// `created_at` / `updated_at` は注入された時計で記録する。
#[derive(Clone)]
pub struct InMemoryAccountStore {
    accounts: Arc<RwLock<HashMap<Uuid, Account>>>,
    clock: Arc<dyn Clock>,
}

impl Default for InMemoryAccountStore {
    fn default() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }
}

impl InMemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            accounts: Arc::default(),
            clock,
        }
    }

    /// 全アカウントのスナップショット（作成日時順）
    pub async fn accounts(&self) -> Vec<Account> {
        let accounts = self.accounts.read().await;
        let mut list: Vec<Account> = accounts.values().cloned().collect();
        list.sort_by_key(|a| a.created_at);
        list
    }
}

#[async_trait]
impl AccountStore for InMemoryAccountStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, StoreError> {
        let accounts = self.accounts.read().await;
        Ok(accounts.values().find(|a| a.email == email).cloned())
    }

    async fn create(&self, email: &str, password_hash: &str) -> Result<Account, StoreError> {
        let mut accounts = self.accounts.write().await;
        if accounts.values().any(|a| a.email == email) {
            return Err(StoreError::EmailTaken);
        }

        let now = self.clock.now();
        let account = Account {
            id: Uuid::new_v4(),
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            reset_password_token_hash: None,
            reset_password_expires_at: None,
            created_at: now,
            updated_at: now,
        };
        accounts.insert(account.id, account.clone());

        Ok(account)
    }

    async fn set_reset_token(
        &self,
        account_id: Uuid,
        token_hash: &str,
        expires_at: OffsetDateTime,
    ) -> Result<(), StoreError> {
        let mut accounts = self.accounts.write().await;
        if let Some(account) = accounts.get_mut(&account_id) {
            account.reset_password_token_hash = Some(token_hash.to_string());
            account.reset_password_expires_at = Some(expires_at);
            account.updated_at = self.clock.now();
        }
        Ok(())
    }

    async fn find_by_valid_reset_token(
        &self,
        token_hash: &str,
        now: OffsetDateTime,
    ) -> Result<Option<Account>, StoreError> {
        let accounts = self.accounts.read().await;
        Ok(accounts
            .values()
            .find(|a| {
                a.reset_password_token_hash.as_deref() == Some(token_hash)
                    && a.has_outstanding_reset(now)
            })
            .cloned())
    }

    async fn complete_password_reset(
        &self,
        account_id: Uuid,
        token_hash: &str,
        new_password_hash: &str,
        now: OffsetDateTime,
    ) -> Result<bool, StoreError> {
        let mut accounts = self.accounts.write().await;
        let Some(account) = accounts.get_mut(&account_id) else {
            return Ok(false);
        };

        if account.reset_password_token_hash.as_deref() != Some(token_hash)
            || !account.has_outstanding_reset(now)
        {
            return Ok(false);
        }

        account.password_hash = new_password_hash.to_string();
        account.reset_password_token_hash = None;
        account.reset_password_expires_at = None;
        account.updated_at = self.clock.now();

        Ok(true)
    }

    async fn clear_expired_reset_tokens(&self, now: OffsetDateTime) -> Result<u64, StoreError> {
        let mut accounts = self.accounts.write().await;
        let updated_at = self.clock.now();
        let mut cleared = 0;
        for account in accounts.values_mut() {
            if matches!(account.reset_password_expires_at, Some(expires_at) if expires_at <= now) {
                account.reset_password_token_hash = None;
                account.reset_password_expires_at = None;
                account.updated_at = updated_at;
                cleared += 1;
            }
        }
        Ok(cleared)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ManualClock;
    use time::Duration;

    #[tokio::test]
    async fn test_create_rejects_duplicate_email() {
        let store = InMemoryAccountStore::new();
        store.create("user@example.com", "hash").await.unwrap();

        let result = store.create("user@example.com", "hash").await;
        assert!(matches!(result, Err(StoreError::EmailTaken)));
    }

    #[tokio::test]
    async fn test_email_lookup_is_case_sensitive() {
        let store = InMemoryAccountStore::new();
        store.create("User@example.com", "hash").await.unwrap();

        assert!(store.find_by_email("User@example.com").await.unwrap().is_some());
        assert!(store.find_by_email("user@example.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_set_reset_token_overwrites_previous() {
        let store = InMemoryAccountStore::new();
        let account = store.create("user@example.com", "hash").await.unwrap();
        let now = OffsetDateTime::now_utc();
        let expires_at = now + Duration::minutes(15);

        store.set_reset_token(account.id, "first", expires_at).await.unwrap();
        store.set_reset_token(account.id, "second", expires_at).await.unwrap();

        assert!(store.find_by_valid_reset_token("first", now).await.unwrap().is_none());
        assert!(store.find_by_valid_reset_token("second", now).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_complete_password_reset_consumes_once() {
        let store = InMemoryAccountStore::new();
        let account = store.create("user@example.com", "old").await.unwrap();
        let now = OffsetDateTime::now_utc();
        store
            .set_reset_token(account.id, "hash", now + Duration::minutes(15))
            .await
            .unwrap();

        assert!(store.complete_password_reset(account.id, "hash", "new", now).await.unwrap());
        assert!(!store.complete_password_reset(account.id, "hash", "newer", now).await.unwrap());

        let stored = store.find_by_email("user@example.com").await.unwrap().unwrap();
        assert_eq!(stored.password_hash, "new");
        assert!(stored.reset_password_token_hash.is_none());
        assert!(stored.reset_password_expires_at.is_none());
    }

    #[tokio::test]
    async fn test_complete_password_reset_refuses_expired() {
        let store = InMemoryAccountStore::new();
        let account = store.create("user@example.com", "old").await.unwrap();
        let now = OffsetDateTime::now_utc();
        store.set_reset_token(account.id, "hash", now).await.unwrap();

        assert!(!store.complete_password_reset(account.id, "hash", "new", now).await.unwrap());
        let stored = store.find_by_email("user@example.com").await.unwrap().unwrap();
        assert_eq!(stored.password_hash, "old");
    }

    #[tokio::test]
    async fn test_clear_expired_reset_tokens() {
        let store = InMemoryAccountStore::new();
        let expired = store.create("a@example.com", "hash").await.unwrap();
        let live = store.create("b@example.com", "hash").await.unwrap();
        let now = OffsetDateTime::now_utc();
        store
            .set_reset_token(expired.id, "old", now - Duration::minutes(1))
            .await
            .unwrap();
        store
            .set_reset_token(live.id, "new", now + Duration::minutes(10))
            .await
            .unwrap();

        assert_eq!(store.clear_expired_reset_tokens(now).await.unwrap(), 1);

        let expired = store.find_by_email("a@example.com").await.unwrap().unwrap();
        assert!(expired.reset_password_token_hash.is_none());
        let live = store.find_by_email("b@example.com").await.unwrap().unwrap();
        assert_eq!(live.reset_password_token_hash.as_deref(), Some("new"));
    }

    #[tokio::test]
    async fn test_timestamps_follow_injected_clock() {
        let start = OffsetDateTime::UNIX_EPOCH + Duration::days(20_000);
        let clock = ManualClock::new(start);
        let store = InMemoryAccountStore::with_clock(Arc::new(clock.clone()));

        let account = store.create("user@example.com", "old").await.unwrap();
        assert_eq!(account.created_at, start);
        assert_eq!(account.updated_at, start);

        clock.advance(Duration::minutes(1));
        let expires_at = clock.now() + Duration::minutes(15);
        store.set_reset_token(account.id, "hash", expires_at).await.unwrap();
        let stored = store.find_by_email("user@example.com").await.unwrap().unwrap();
        assert_eq!(stored.updated_at, start + Duration::minutes(1));

        clock.advance(Duration::minutes(1));
        assert!(
            store
                .complete_password_reset(account.id, "hash", "new", clock.now())
                .await
                .unwrap()
        );
        let stored = store.find_by_email("user@example.com").await.unwrap().unwrap();
        assert_eq!(stored.created_at, start);
        assert_eq!(stored.updated_at, start + Duration::minutes(2));
    }

    #[tokio::test]
    async fn test_clear_expired_reset_tokens_touches_updated_at() {
        let start = OffsetDateTime::UNIX_EPOCH + Duration::days(20_000);
        let clock = ManualClock::new(start);
        let store = InMemoryAccountStore::with_clock(Arc::new(clock.clone()));
        let account = store.create("user@example.com", "hash").await.unwrap();
        store
            .set_reset_token(account.id, "old", start + Duration::minutes(15))
            .await
            .unwrap();

        clock.advance(Duration::minutes(20));
        assert_eq!(store.clear_expired_reset_tokens(clock.now()).await.unwrap(), 1);

        let stored = store.find_by_email("user@example.com").await.unwrap().unwrap();
        assert!(stored.reset_password_expires_at.is_none());
        assert_eq!(stored.updated_at, start + Duration::minutes(20));
    }
}
