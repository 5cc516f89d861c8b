use std::sync::Arc;

use crate::config::Config;
use crate::repositories::AccountStore;
use crate::services::{Clock, EmailService};

/// アプリケーション共有状態
///
/// axum の State として全ハンドラーで共有される。
/// Clone は必須（axum が内部で clone するため）。
#[derive(Clone)]
pub struct AppState {
    /// アプリケーション設定（Arc で共有）
    pub config: Arc<Config>,
    /// アカウントストア（PostgreSQL またはインメモリ）
    pub accounts: Arc<dyn AccountStore>,
    /// メールサービス
    pub email_service: EmailService,
    /// 時刻の取得元
    pub clock: Arc<dyn Clock>,
}

impl AppState {
    /// 新しい AppState を作成
    pub fn new(
        config: Config,
        accounts: Arc<dyn AccountStore>,
        email_service: EmailService,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            accounts,
            email_service,
            clock,
        }
    }
}
