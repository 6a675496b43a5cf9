//! crates/shop_core/src/registration.rs
//!
//! Signup with email confirmation by one-time code.
//!
//! A submission parks the signup in the pending store and mails a code. Only a
//! matching, unexpired code promotes it into a durable, verified account. A
//! repeated submission for the same email rotates the code instead of creating
//! a second record. Abandoned records are left to the store's TTL.

use std::sync::{Arc, LazyLock};

use chrono::Duration;
use regex::Regex;
use tracing::{error, info, warn};

use crate::domain::{AuthenticatedAccount, NewAccount, PendingRegistration, Role};
use crate::error::{CoreError, CoreResult};
use crate::ports::{
    Clock, CredentialHasher, DatabaseService, MailService, OtpGenerator, OutgoingMail,
    PendingRegistrationStore, PortError, TokenService,
};

pub const MIN_PASSWORD_LEN: usize = 6;

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is valid")
});

/// Lower-cased, trimmed form used as the pending-store and account key.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub fn validate_email(email: &str) -> CoreResult<()> {
    if EMAIL_RE.is_match(email) {
        Ok(())
    } else {
        Err(CoreError::Validation("Please provide a valid email".to_string()))
    }
}

pub fn validate_password(password: &str) -> CoreResult<()> {
    if password.chars().count() >= MIN_PASSWORD_LEN {
        Ok(())
    } else {
        Err(CoreError::Validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )))
    }
}

/// Whether a submission started a new signup or re-sent a code for an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationOutcome {
    Issued,
    Resent,
}

impl RegistrationOutcome {
    pub fn message(&self) -> &'static str {
        match self {
            RegistrationOutcome::Issued => {
                "OTP sent to your email. Please verify to activate your account."
            }
            RegistrationOutcome::Resent => {
                "OTP resent to your email. Please verify to activate your account."
            }
        }
    }
}

#[derive(Clone)]
pub struct RegistrationService {
    pub db: Arc<dyn DatabaseService>,
    pub pending: Arc<dyn PendingRegistrationStore>,
    pub mailer: Arc<dyn MailService>,
    pub hasher: Arc<dyn CredentialHasher>,
    pub otp: Arc<dyn OtpGenerator>,
    pub tokens: Arc<dyn TokenService>,
    pub clock: Arc<dyn Clock>,
    pub otp_ttl: Duration,
}

impl RegistrationService {
    /// Parks a signup and mails it a fresh code.
    ///
    /// Exactly one email is dispatched per call. If the dispatch fails, the
    /// pending store is put back the way it was before the call.
    pub async fn submit_registration(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> CoreResult<RegistrationOutcome> {
        let name = name.trim();
        let email = normalize_email(email);
        if name.is_empty() {
            return Err(CoreError::Validation("Name is required".to_string()));
        }
        validate_email(&email)?;
        validate_password(password)?;

        if self.db.find_account_by_email(&email).await?.is_some() {
            return Err(CoreError::DuplicateAccount);
        }

        let now = self.clock.now();
        let otp = self.otp.generate();
        let otp_expiry = now + self.otp_ttl;

        let previous = self.pending.get(&email).await?;
        let (pending, outcome) = match &previous {
            Some(existing) => (
                PendingRegistration {
                    otp,
                    otp_expiry,
                    ..existing.clone()
                },
                RegistrationOutcome::Resent,
            ),
            None => (
                PendingRegistration {
                    email: email.clone(),
                    name: name.to_string(),
                    password_hash: self.hasher.hash(password)?,
                    otp,
                    otp_expiry,
                },
                RegistrationOutcome::Issued,
            ),
        };

        let mail = otp_mail(&email, &pending.otp, self.otp_ttl.num_minutes());
        self.pending.put(pending).await?;

        if let Err(e) = self.mailer.send_mail(mail).await {
            error!(email = %email, error = %e, "Failed to send OTP email");
            self.roll_back(&email, previous).await;
            return Err(CoreError::EmailDispatchFailure(e));
        }

        info!(email = %email, outcome = ?outcome, "OTP issued");
        Ok(outcome)
    }

    /// Promotes a pending signup into a verified account and issues a session token.
    ///
    /// A failed attempt leaves the pending record untouched.
    pub async fn verify_otp(&self, email: &str, otp: &str) -> CoreResult<AuthenticatedAccount> {
        let email = normalize_email(email);
        let pending = self
            .pending
            .get(&email)
            .await?
            .ok_or(CoreError::NoPendingRegistration)?;

        if !pending.accepts(otp.trim(), self.clock.now()) {
            info!(email = %email, "Rejected OTP");
            return Err(CoreError::InvalidOrExpiredOtp);
        }

        let created = self
            .db
            .create_account(NewAccount {
                name: pending.name,
                email: pending.email,
                password_hash: pending.password_hash,
                role: Role::User,
                is_verified: true,
            })
            .await;

        let account = match created {
            Ok(account) => account,
            Err(PortError::Conflict(_)) => {
                // Someone else verified this email first.
                self.pending.remove(&email).await?;
                return Err(CoreError::DuplicateAccount);
            }
            Err(e) => return Err(e.into()),
        };

        self.pending.remove(&email).await?;
        let token = self.tokens.issue(account.id, account.role)?;

        info!(account_id = %account.id, email = %account.email, "Account verified");
        Ok(AuthenticatedAccount { token, account })
    }

    async fn roll_back(&self, email: &str, previous: Option<PendingRegistration>) {
        let restored = match previous {
            Some(previous) => self.pending.put(previous).await,
            None => self.pending.remove(email).await.map(|_| ()),
        };
        if let Err(e) = restored {
            warn!(email = %email, error = %e, "Could not restore pending registration");
        }
    }
}

fn otp_mail(to: &str, otp: &str, ttl_minutes: i64) -> OutgoingMail {
    let text = format!(
        "Your OTP for email verification is: {otp}. It will expire in {ttl_minutes} minutes."
    );
    let html = format!(
        r#"<div style="font-family: Arial, sans-serif; padding: 32px; max-width: 480px; margin: 0 auto;">
  <h2 style="text-align: center;">Welcome to ModernShop!</h2>
  <p style="text-align: center;">Thank you for registering. Please use the OTP below to verify your email address:</p>
  <div style="font-size: 32px; font-weight: bold; letter-spacing: 8px; padding: 16px; text-align: center;">{otp}</div>
  <p style="text-align: center;">This OTP will expire in <b>{ttl_minutes} minutes</b>.</p>
  <p style="font-size: 13px; color: #888; text-align: center;">If you did not request this, you can safely ignore this email.</p>
</div>"#
    );
    OutgoingMail {
        to: to.to_string(),
        subject: "Your OTP for Email Verification".to_string(),
        text,
        html,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{
        InMemoryDatabase, InMemoryPendingStore, ManualClock, PlainHasher, RecordingMailer,
        ScriptedOtpGenerator, UnsignedTokens,
    };

    struct Harness {
        service: RegistrationService,
        db: Arc<InMemoryDatabase>,
        pending: Arc<InMemoryPendingStore>,
        mailer: Arc<RecordingMailer>,
        clock: Arc<ManualClock>,
    }

    fn harness(codes: &[&str]) -> Harness {
        let db = Arc::new(InMemoryDatabase::default());
        let pending = Arc::new(InMemoryPendingStore::default());
        let mailer = Arc::new(RecordingMailer::default());
        let clock = Arc::new(ManualClock::default());
        let service = RegistrationService {
            db: db.clone(),
            pending: pending.clone(),
            mailer: mailer.clone(),
            hasher: Arc::new(PlainHasher),
            otp: Arc::new(ScriptedOtpGenerator::new(codes)),
            tokens: Arc::new(UnsignedTokens),
            clock: clock.clone(),
            otp_ttl: Duration::minutes(10),
        };
        Harness {
            service,
            db,
            pending,
            mailer,
            clock,
        }
    }

    #[tokio::test]
    async fn register_then_verify_creates_verified_account() {
        let h = harness(&["123456"]);

        let outcome = h
            .service
            .submit_registration("Jane", "jane@x.com", "secret1")
            .await
            .unwrap();
        assert_eq!(outcome, RegistrationOutcome::Issued);

        let sent = h.mailer.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "jane@x.com");
        assert!(sent[0].text.contains("123456"));
        assert!(sent[0].html.contains("123456"));

        let auth = h.service.verify_otp("jane@x.com", "123456").await.unwrap();
        assert!(!auth.token.is_empty());
        assert_eq!(auth.account.email, "jane@x.com");
        assert_eq!(auth.account.name, "Jane");
        assert!(auth.account.is_verified);
        assert_eq!(auth.account.role, Role::User);

        assert!(h.pending.get("jane@x.com").await.unwrap().is_none());
        assert!(h.db.find_account_by_email("jane@x.com").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn verification_succeeds_only_once() {
        let h = harness(&["123456"]);
        h.service
            .submit_registration("Jane", "jane@x.com", "secret1")
            .await
            .unwrap();

        h.service.verify_otp("jane@x.com", "123456").await.unwrap();
        let second = h.service.verify_otp("jane@x.com", "123456").await;
        assert!(matches!(second, Err(CoreError::NoPendingRegistration)));
    }

    #[tokio::test]
    async fn pending_password_is_hashed() {
        let h = harness(&["123456"]);
        h.service
            .submit_registration("Jane", "jane@x.com", "secret1")
            .await
            .unwrap();

        let pending = h.pending.get("jane@x.com").await.unwrap().unwrap();
        assert_ne!(pending.password_hash, "secret1");
        assert!(PlainHasher.verify("secret1", &pending.password_hash).unwrap());
    }

    #[tokio::test]
    async fn resubmission_rotates_code() {
        let h = harness(&["111111", "222222"]);
        h.service
            .submit_registration("Jane", "jane@x.com", "secret1")
            .await
            .unwrap();
        let outcome = h
            .service
            .submit_registration("Jane", "jane@x.com", "secret1")
            .await
            .unwrap();
        assert_eq!(outcome, RegistrationOutcome::Resent);
        assert_eq!(h.mailer.sent().len(), 2);
        assert_eq!(h.pending.len(), 1);

        let stale = h.service.verify_otp("jane@x.com", "111111").await;
        assert!(matches!(stale, Err(CoreError::InvalidOrExpiredOtp)));

        h.service.verify_otp("jane@x.com", "222222").await.unwrap();
    }

    #[tokio::test]
    async fn rotation_refreshes_expiry() {
        let h = harness(&["111111", "222222"]);
        h.service
            .submit_registration("Jane", "jane@x.com", "secret1")
            .await
            .unwrap();
        h.clock.advance(Duration::minutes(8));
        h.service
            .submit_registration("Jane", "jane@x.com", "secret1")
            .await
            .unwrap();
        h.clock.advance(Duration::minutes(8));

        h.service.verify_otp("jane@x.com", "222222").await.unwrap();
    }

    #[tokio::test]
    async fn wrong_code_keeps_pending_registration() {
        let h = harness(&["123456"]);
        h.service
            .submit_registration("Jane", "jane@x.com", "secret1")
            .await
            .unwrap();

        let wrong = h.service.verify_otp("jane@x.com", "000000").await;
        assert!(matches!(wrong, Err(CoreError::InvalidOrExpiredOtp)));
        assert!(h.pending.get("jane@x.com").await.unwrap().is_some());

        h.service.verify_otp("jane@x.com", "123456").await.unwrap();
    }

    #[tokio::test]
    async fn expired_code_is_rejected_even_when_correct() {
        let h = harness(&["123456"]);
        h.service
            .submit_registration("Jane", "jane@x.com", "secret1")
            .await
            .unwrap();

        // the expiry instant itself is still valid
        h.clock.advance(Duration::minutes(10));
        assert!(h.service.verify_otp("jane@x.com", "123456").await.is_ok());

        let h = harness(&["123456"]);
        h.service
            .submit_registration("Jane", "jane@x.com", "secret1")
            .await
            .unwrap();
        h.clock.advance(Duration::minutes(10) + Duration::seconds(1));
        let late = h.service.verify_otp("jane@x.com", "123456").await;
        assert!(matches!(late, Err(CoreError::InvalidOrExpiredOtp)));
    }

    #[tokio::test]
    async fn verify_without_registration_fails() {
        let h = harness(&[]);
        let result = h.service.verify_otp("nobody@x.com", "123456").await;
        assert!(matches!(result, Err(CoreError::NoPendingRegistration)));
    }

    #[tokio::test]
    async fn existing_account_blocks_registration() {
        let h = harness(&["123456", "654321"]);
        h.service
            .submit_registration("Jane", "jane@x.com", "secret1")
            .await
            .unwrap();
        h.service.verify_otp("jane@x.com", "123456").await.unwrap();

        let again = h
            .service
            .submit_registration("Jane", "JANE@x.com ", "secret1")
            .await;
        assert!(matches!(again, Err(CoreError::DuplicateAccount)));
        assert_eq!(h.mailer.sent().len(), 1);
    }

    #[tokio::test]
    async fn email_is_normalized() {
        let h = harness(&["123456"]);
        h.service
            .submit_registration("Jane", "  Jane@X.com", "secret1")
            .await
            .unwrap();
        let auth = h.service.verify_otp("JANE@x.COM", "123456").await.unwrap();
        assert_eq!(auth.account.email, "jane@x.com");
    }

    #[tokio::test]
    async fn invalid_input_is_rejected_before_any_mail() {
        let h = harness(&["123456"]);
        for (name, email, password) in [
            ("", "jane@x.com", "secret1"),
            ("Jane", "not-an-email", "secret1"),
            ("Jane", "jane@x.com", "short"),
        ] {
            let result = h.service.submit_registration(name, email, password).await;
            assert!(matches!(result, Err(CoreError::Validation(_))));
        }
        assert!(h.mailer.sent().is_empty());
        assert_eq!(h.pending.len(), 0);
    }

    #[tokio::test]
    async fn dispatch_failure_discards_new_registration() {
        let h = harness(&["123456"]);
        h.mailer.fail_next();

        let result = h
            .service
            .submit_registration("Jane", "jane@x.com", "secret1")
            .await;
        assert!(matches!(result, Err(CoreError::EmailDispatchFailure(_))));
        assert!(h.pending.get("jane@x.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn dispatch_failure_on_rotation_restores_previous_code() {
        let h = harness(&["111111", "222222"]);
        h.service
            .submit_registration("Jane", "jane@x.com", "secret1")
            .await
            .unwrap();

        h.mailer.fail_next();
        let result = h
            .service
            .submit_registration("Jane", "jane@x.com", "secret1")
            .await;
        assert!(matches!(result, Err(CoreError::EmailDispatchFailure(_))));

        let pending = h.pending.get("jane@x.com").await.unwrap().unwrap();
        assert_eq!(pending.otp, "111111");
        h.service.verify_otp("jane@x.com", "111111").await.unwrap();
    }

    #[tokio::test]
    async fn concurrent_verification_reports_duplicate() {
        let h = harness(&["123456"]);
        h.service
            .submit_registration("Jane", "jane@x.com", "secret1")
            .await
            .unwrap();
        h.db.create_account(NewAccount {
            name: "Other".into(),
            email: "jane@x.com".into(),
            password_hash: "x".into(),
            role: Role::User,
            is_verified: true,
        })
        .await
        .unwrap();

        let result = h.service.verify_otp("jane@x.com", "123456").await;
        assert!(matches!(result, Err(CoreError::DuplicateAccount)));
        assert!(h.pending.get("jane@x.com").await.unwrap().is_none());
    }
}
