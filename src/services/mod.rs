pub mod auth;
pub mod clock;
pub mod email;
pub mod password_reset;

pub use auth::AuthService;
pub use clock::{Clock, SystemClock};
pub use email::{EmailService, LogMailer, MailError, Mailer};
pub use password_reset::{MailDelivery, PasswordResetService};
