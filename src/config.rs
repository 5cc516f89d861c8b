use secrecy::SecretBox;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,

    // 未設定の場合はインメモリストアで起動（開発用）
    #[serde(default)]
    pub database_url: Option<SecretBox<String>>,
    #[serde(default = "default_database_max_connections")]
    pub database_max_connections: u32,

    /// フロントエンドのオリジン（未設定時は全許可）
    #[serde(default)]
    pub cors_allowed_origin: Option<String>,

    // SMTP設定（オプション - email機能有効時のみ使用）
    #[serde(default)]
    pub smtp_host: Option<String>,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    #[serde(default)]
    pub smtp_username: Option<SecretBox<String>>,
    #[serde(default)]
    pub smtp_password: Option<SecretBox<String>>,
    #[serde(default = "default_mail_from_address")]
    pub mail_from_address: String,
    #[serde(default = "default_mail_timeout_secs")]
    pub mail_timeout_secs: u64,

    // パスワードリセット設定
    #[serde(default = "default_password_reset_url_base")]
    pub password_reset_url_base: String,
    #[serde(default = "default_password_reset_token_ttl_secs")]
    pub password_reset_token_ttl_secs: i64,
    /// true の場合、未登録メールアドレスにも送信成功と同じ応答を返す
    #[serde(default)]
    pub password_reset_conceal_unknown_email: bool,
    #[serde(default = "default_true")]
    pub password_reset_notify_on_change: bool,
    /// 期限切れトークン掃除の間隔（0 で無効）
    #[serde(default = "default_password_reset_sweep_interval_secs")]
    pub password_reset_sweep_interval_secs: u64,
}

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 4000;
const DEFAULT_DATABASE_MAX_CONNECTIONS: u32 = 5;
const DEFAULT_SMTP_PORT: u16 = 587;
const DEFAULT_MAIL_FROM_ADDRESS: &str = "Skillora <no-reply@skillora.local>";
const DEFAULT_MAIL_TIMEOUT_SECS: u64 = 10;
const DEFAULT_PASSWORD_RESET_URL_BASE: &str = "http://localhost:3000/update-password";
const DEFAULT_PASSWORD_RESET_TOKEN_TTL_SECS: i64 = 15 * 60;
const DEFAULT_PASSWORD_RESET_SWEEP_INTERVAL_SECS: u64 = 300;
/// リセットトークン有効期限の上限（7日）
pub const MAX_PASSWORD_RESET_TOKEN_TTL_SECS: i64 = 7 * 24 * 60 * 60;

/// 設定読み込みエラー
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("環境変数の読み込みに失敗: {0}")]
    Env(#[from] envy::Error),

    #[error("設定値が不正: {0}")]
    Invalid(String),
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_database_max_connections() -> u32 {
    DEFAULT_DATABASE_MAX_CONNECTIONS
}

fn default_smtp_port() -> u16 {
    DEFAULT_SMTP_PORT
}

fn default_mail_from_address() -> String {
    DEFAULT_MAIL_FROM_ADDRESS.to_string()
}

fn default_mail_timeout_secs() -> u64 {
    DEFAULT_MAIL_TIMEOUT_SECS
}

fn default_password_reset_url_base() -> String {
    DEFAULT_PASSWORD_RESET_URL_BASE.to_string()
}

fn default_password_reset_token_ttl_secs() -> i64 {
    DEFAULT_PASSWORD_RESET_TOKEN_TTL_SECS
}

fn default_password_reset_sweep_interval_secs() -> u64 {
    DEFAULT_PASSWORD_RESET_SWEEP_INTERVAL_SECS
}

fn default_true() -> bool {
    true
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        envy::from_env::<Self>()?.validated()
    }

    /// 任意のキー/値の組から読み込む（テスト・ツール用）
    pub fn from_pairs<I, K, V>(pairs: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        envy::from_iter::<_, Self>(pairs.into_iter().map(|(k, v)| (k.into(), v.into())))?
            .validated()
    }

    fn validated(self) -> Result<Self, ConfigError> {
        let ttl = self.password_reset_token_ttl_secs;
        if !(1..=MAX_PASSWORD_RESET_TOKEN_TTL_SECS).contains(&ttl) {
            return Err(ConfigError::Invalid(format!(
                "PASSWORD_RESET_TOKEN_TTL_SECS must be between 1 and {MAX_PASSWORD_RESET_TOKEN_TTL_SECS} (got {ttl})"
            )));
        }
        Ok(self)
    }
}
