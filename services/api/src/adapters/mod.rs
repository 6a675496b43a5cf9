pub mod db;
pub mod mailer;
pub mod otp;
pub mod password;
pub mod pending;
pub mod token;

pub use db::DbAdapter;
pub use mailer::{LogMailer, SmtpMailer};
pub use otp::RandomOtpGenerator;
pub use password::Argon2Hasher;
pub use pending::MokaPendingStore;
pub use token::HmacTokenService;
