use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::config::Config;
use crate::error::AppError;

/// メール送信エラー
///
/// HTTP エラーには変換しない。呼び出し側でログ出力・再送判断を行う。
#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("メール送信がタイムアウト ({0:?})")]
    Timeout(Duration),

    #[error("無効なメールアドレス: {0}")]
    InvalidAddress(String),

    #[error("メール送信エラー: {0}")]
    Transport(String),
}

/// 送信するメール
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// メール送信の下位トランスポート
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), MailError>;
}

/// 開発用: 送信せず宛先と件名のみログ出力
///
/// 本文にはリセットURL（平文トークン）が含まれるため出力しない。
#[derive(Debug, Clone, Copy, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), MailError> {
        tracing::info!(
            to = %email.to,
            subject = %email.subject,
            "メール送信（開発モード）"
        );
        Ok(())
    }
}

#[cfg(feature = "email")]
pub use smtp::SmtpMailer;

#[cfg(feature = "email")]
mod smtp {
    use async_trait::async_trait;
    use lettre::message::{Mailbox, header::ContentType};
    use lettre::transport::smtp::authentication::Credentials;
    use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

    use super::{MailError, Mailer, OutgoingEmail};

    /// lettre による SMTP 送信
    pub struct SmtpMailer {
        transport: AsyncSmtpTransport<Tokio1Executor>,
        from: Mailbox,
    }

    impl SmtpMailer {
        pub fn new(
            host: &str,
            port: u16,
            credentials: Option<(String, String)>,
            from: &str,
        ) -> Result<Self, MailError> {
            let from: Mailbox = from
                .parse()
                .map_err(|_| MailError::InvalidAddress(from.to_string()))?;

            let transport = match credentials {
                Some((username, password)) => {
                    AsyncSmtpTransport::<Tokio1Executor>::relay(host)
                        .map_err(|e| MailError::Transport(e.to_string()))?
                        .port(port)
                        .credentials(Credentials::new(username, password))
                        .build()
                }
                // 認証なし（ローカルの MailHog 等）
                None => AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host)
                    .port(port)
                    .build(),
            };

            Ok(Self { transport, from })
        }
    }

    #[async_trait]
    impl Mailer for SmtpMailer {
        async fn send(&self, email: &OutgoingEmail) -> Result<(), MailError> {
            let to: Mailbox = email
                .to
                .parse()
                .map_err(|_| MailError::InvalidAddress(email.to.clone()))?;

            let message = Message::builder()
                .from(self.from.clone())
                .to(to)
                .subject(email.subject.clone())
                .header(ContentType::TEXT_PLAIN)
                .body(email.body.clone())
                .map_err(|e| MailError::Transport(e.to_string()))?;

            self.transport
                .send(message)
                .await
                .map_err(|e| MailError::Transport(e.to_string()))?;

            Ok(())
        }
    }
}

/// メール送信サービス
///
/// テンプレートの組み立てと送信タイムアウトを担当する。
#[derive(Clone)]
pub struct EmailService {
    mailer: Arc<dyn Mailer>,
    timeout: Duration,
}

impl EmailService {
    /// 新しい EmailService を作成
    pub fn new(mailer: Arc<dyn Mailer>, timeout: Duration) -> Self {
        Self { mailer, timeout }
    }

    /// 設定から EmailService を作成
    ///
    /// email 機能が有効かつ SMTP_HOST 設定時は SMTP、それ以外はログ出力のみ。
    pub fn from_config(config: &Config) -> Result<Self, AppError> {
        let timeout = Duration::from_secs(config.mail_timeout_secs);
        Ok(Self::new(build_mailer(config)?, timeout))
    }

    /// パスワードリセットメールを送信
    pub async fn send_password_reset_email(
        &self,
        to: &str,
        reset_url: &str,
        valid_minutes: i64,
    ) -> Result<(), MailError> {
        let body = format!(
            "We received a request to reset the password for your Skillora account.\n\
             \n\
             Open the link below to choose a new password:\n\
             \n\
             {reset_url}\n\
             \n\
             This link is valid for {valid_minutes} minutes. \
             If you did not request a reset, you can ignore this email.\n\
             \n\
             -- Skillora\n"
        );

        self.deliver(OutgoingEmail {
            to: to.to_string(),
            subject: "Password reset link - Skillora".to_string(),
            body,
        })
        .await
    }

    /// パスワード変更通知を送信
    pub async fn send_password_changed_email(&self, to: &str) -> Result<(), MailError> {
        let body = format!(
            "The password for your Skillora account ({to}) was just changed.\n\
             \n\
             If you did not make this change, reset your password immediately \
             and contact support.\n\
             \n\
             -- Skillora\n"
        );

        self.deliver(OutgoingEmail {
            to: to.to_string(),
            subject: "Your password was changed - Skillora".to_string(),
            body,
        })
        .await
    }

    async fn deliver(&self, email: OutgoingEmail) -> Result<(), MailError> {
        tokio::time::timeout(self.timeout, self.mailer.send(&email))
            .await
            .map_err(|_| MailError::Timeout(self.timeout))?
    }
}

#[cfg(feature = "email")]
fn build_mailer(config: &Config) -> Result<Arc<dyn Mailer>, AppError> {
    use secrecy::ExposeSecret;

    let Some(host) = &config.smtp_host else {
        tracing::info!("SMTP 未設定（ログ出力のみ）");
        return Ok(Arc::new(LogMailer));
    };

    let credentials = match (&config.smtp_username, &config.smtp_password) {
        (Some(username), Some(password)) => Some((
            username.expose_secret().clone(),
            password.expose_secret().clone(),
        )),
        _ => None,
    };

    let mailer = SmtpMailer::new(
        host,
        config.smtp_port,
        credentials,
        &config.mail_from_address,
    )
    .map_err(|e| AppError::Internal(anyhow::anyhow!("SMTP initialization failed: {e}")))?;

    tracing::info!(smtp_host = %host, smtp_port = config.smtp_port, "SMTP メーラーを初期化");

    Ok(Arc::new(mailer))
}

#[cfg(not(feature = "email"))]
fn build_mailer(config: &Config) -> Result<Arc<dyn Mailer>, AppError> {
    if config.smtp_host.is_some() {
        tracing::warn!("SMTP_HOST が設定されていますが email 機能が無効です（ログ出力のみ）");
    }
    Ok(Arc::new(LogMailer))
}
