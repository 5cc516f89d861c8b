pub mod health;
pub mod login;
pub mod password_reset;
pub mod register;

use serde::Serialize;

pub use health::health_check;
pub use login::login;
pub use password_reset::{request_password_reset, reset_password};
pub use register::register;

/// `{ success, message }` 形式の共通レスポンス
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

impl MessageResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }
}
