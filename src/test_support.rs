//! テスト用の差し替え実装

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::config::Config;
use crate::models::Account;
use crate::repositories::{AccountStore, InMemoryAccountStore, StoreError};
use crate::services::clock::Clock;
use crate::services::email::{EmailService, MailError, Mailer, OutgoingEmail};
use crate::state::AppState;

/// 手動で進める時計
#[derive(Clone)]
pub struct ManualClock {
    now: Arc<Mutex<OffsetDateTime>>,
}

impl ManualClock {
    pub fn new(now: OffsetDateTime) -> Self {
        Self {
            now: Arc::new(Mutex::new(now)),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap();
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> OffsetDateTime {
        *self.now.lock().unwrap()
    }
}

/// 読むたびに `step` だけ進む時計
pub struct SteppingClock {
    now: Mutex<OffsetDateTime>,
    step: Duration,
}

impl SteppingClock {
    pub fn new(start: OffsetDateTime, step: Duration) -> Self {
        Self {
            now: Mutex::new(start),
            step,
        }
    }
}

impl Clock for SteppingClock {
    fn now(&self) -> OffsetDateTime {
        let mut now = self.now.lock().unwrap();
        let current = *now;
        *now += self.step;
        current
    }
}

/// 全操作がデータベースエラーになるストア
pub struct FailingStore;

fn pool_timed_out<T>() -> Result<T, StoreError> {
    Err(StoreError::Database(sqlx::Error::PoolTimedOut))
}

#[async_trait]
impl AccountStore for FailingStore {
    fn backend(&self) -> &'static str {
        "failing"
    }

    async fn find_by_email(&self, _email: &str) -> Result<Option<Account>, StoreError> {
        pool_timed_out()
    }

    async fn create(&self, _email: &str, _password_hash: &str) -> Result<Account, StoreError> {
        pool_timed_out()
    }

    async fn set_reset_token(
        &self,
        _account_id: Uuid,
        _token_hash: &str,
        _expires_at: OffsetDateTime,
    ) -> Result<(), StoreError> {
        pool_timed_out()
    }

    async fn find_by_valid_reset_token(
        &self,
        _token_hash: &str,
        _now: OffsetDateTime,
    ) -> Result<Option<Account>, StoreError> {
        pool_timed_out()
    }

    async fn complete_password_reset(
        &self,
        _account_id: Uuid,
        _token_hash: &str,
        _new_password_hash: &str,
        _now: OffsetDateTime,
    ) -> Result<bool, StoreError> {
        pool_timed_out()
    }

    async fn clear_expired_reset_tokens(&self, _now: OffsetDateTime) -> Result<u64, StoreError> {
        pool_timed_out()
    }
}

/// 送信内容を記録するメーラー
#[derive(Clone, Default)]
pub struct RecordingMailer {
    sent: Arc<Mutex<Vec<OutgoingEmail>>>,
}

impl RecordingMailer {
    pub fn sent(&self) -> Vec<OutgoingEmail> {
        self.sent.lock().unwrap().clone()
    }

    /// 最後に送信したメール本文からリセットトークンを取り出す
    pub fn last_reset_token(&self) -> Option<String> {
        let sent = self.sent();
        let body = &sent.last()?.body;
        let start = body.find("?token=")? + "?token=".len();
        let token: String = body[start..]
            .chars()
            .take_while(|c| !c.is_whitespace())
            .collect();
        urlencoding::decode(&token).ok().map(|t| t.into_owned())
    }

    /// 指定件数に達するまで待つ（バックグラウンド送信用）
    pub async fn wait_for(&self, count: usize) -> Vec<OutgoingEmail> {
        for _ in 0..100 {
            if self.sent.lock().unwrap().len() >= count {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        self.sent()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), MailError> {
        self.sent.lock().unwrap().push(email.clone());
        Ok(())
    }
}

/// 常に失敗するメーラー
pub struct FailingMailer;

#[async_trait]
impl Mailer for FailingMailer {
    async fn send(&self, _email: &OutgoingEmail) -> Result<(), MailError> {
        Err(MailError::Transport("connection refused".to_string()))
    }
}

/// 応答しないメーラー
pub struct StalledMailer;

#[async_trait]
impl Mailer for StalledMailer {
    async fn send(&self, _email: &OutgoingEmail) -> Result<(), MailError> {
        std::future::pending::<()>().await;
        Ok(())
    }
}

/// テスト用の設定
pub fn test_config(overrides: &[(&str, &str)]) -> Config {
    Config::from_pairs(overrides.iter().map(|(k, v)| (*k, *v))).unwrap()
}

/// インメモリストアと差し替え部品で組み立てた AppState
pub struct TestApp {
    pub state: AppState,
    pub store: InMemoryAccountStore,
    pub mailer: RecordingMailer,
    pub clock: ManualClock,
}

impl TestApp {
    pub fn new(overrides: &[(&str, &str)]) -> Self {
        let clock = ManualClock::new(OffsetDateTime::now_utc());
        let store = InMemoryAccountStore::with_clock(Arc::new(clock.clone()));
        let mailer = RecordingMailer::default();
        let state = app_state(
            test_config(overrides),
            Arc::new(store.clone()),
            Arc::new(mailer.clone()),
            Arc::new(clock.clone()),
        );

        Self {
            state,
            store,
            mailer,
            clock,
        }
    }
}

/// 任意のストア・メーラー・時計で AppState を組み立てる
pub fn app_state(
    config: Config,
    accounts: Arc<dyn AccountStore>,
    mailer: Arc<dyn Mailer>,
    clock: Arc<dyn Clock>,
) -> AppState {
    let email_service = EmailService::new(
        mailer,
        std::time::Duration::from_secs(config.mail_timeout_secs),
    );
    AppState::new(config, accounts, email_service, clock)
}
