//! crates/shop_core/src/accounts.rs
//!
//! Login and self-service profile operations for verified accounts.

use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use crate::domain::{Account, AuthenticatedAccount};
use crate::error::{CoreError, CoreResult};
use crate::ports::{CredentialHasher, DatabaseService, TokenService};
use crate::registration::{normalize_email, validate_password};

#[derive(Clone)]
pub struct AccountService {
    pub db: Arc<dyn DatabaseService>,
    pub hasher: Arc<dyn CredentialHasher>,
    pub tokens: Arc<dyn TokenService>,
}

impl AccountService {
    pub async fn login(&self, email: &str, password: &str) -> CoreResult<AuthenticatedAccount> {
        let email = normalize_email(email);
        if email.is_empty() || password.is_empty() {
            return Err(CoreError::Validation(
                "Please provide email and password".to_string(),
            ));
        }

        let credentials = self
            .db
            .find_account_by_email(&email)
            .await?
            .ok_or(CoreError::InvalidCredentials)?;

        if !credentials.account.is_verified {
            return Err(CoreError::EmailNotVerified);
        }
        if !self.hasher.verify(password, &credentials.password_hash)? {
            return Err(CoreError::InvalidCredentials);
        }

        let account = credentials.account;
        let token = self.tokens.issue(account.id, account.role)?;
        info!(account_id = %account.id, "Logged in");
        Ok(AuthenticatedAccount { token, account })
    }

    pub async fn me(&self, account_id: Uuid) -> CoreResult<Account> {
        Ok(self.db.get_account_by_id(account_id).await?)
    }

    /// Only the display name is editable; email changes would bypass verification.
    pub async fn update_profile(&self, account_id: Uuid, name: Option<&str>) -> CoreResult<Account> {
        match name.map(str::trim) {
            Some("") => Err(CoreError::Validation("Name cannot be empty".to_string())),
            Some(name) => Ok(self.db.update_account_name(account_id, name).await?),
            None => self.me(account_id).await,
        }
    }

    pub async fn change_password(
        &self,
        account_id: Uuid,
        current_password: &str,
        new_password: &str,
    ) -> CoreResult<()> {
        validate_password(new_password)?;

        let credentials = self.db.get_credentials_by_id(account_id).await?;
        if !self
            .hasher
            .verify(current_password, &credentials.password_hash)?
        {
            return Err(CoreError::InvalidCredentials);
        }

        let password_hash = self.hasher.hash(new_password)?;
        self.db
            .update_password_hash(account_id, &password_hash)
            .await?;
        info!(account_id = %account_id, "Password changed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{NewAccount, Role};
    use crate::memory::{InMemoryDatabase, PlainHasher, UnsignedTokens};

    async fn setup(verified: bool) -> (AccountService, Uuid) {
        let db = Arc::new(InMemoryDatabase::default());
        let account = db
            .create_account(NewAccount {
                name: "Jane".into(),
                email: "jane@x.com".into(),
                password_hash: PlainHasher.hash("secret1").unwrap(),
                role: Role::User,
                is_verified: verified,
            })
            .await
            .unwrap();
        let service = AccountService {
            db,
            hasher: Arc::new(PlainHasher),
            tokens: Arc::new(UnsignedTokens),
        };
        (service, account.id)
    }

    #[tokio::test]
    async fn login_issues_token() {
        let (service, id) = setup(true).await;
        let auth = service.login("Jane@X.com", "secret1").await.unwrap();
        assert_eq!(auth.account.id, id);
        assert!(!auth.token.is_empty());
    }

    #[tokio::test]
    async fn login_rejects_bad_password_and_unknown_email() {
        let (service, _) = setup(true).await;
        assert!(matches!(
            service.login("jane@x.com", "nope123").await,
            Err(CoreError::InvalidCredentials)
        ));
        assert!(matches!(
            service.login("who@x.com", "secret1").await,
            Err(CoreError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn login_requires_verified_email() {
        let (service, _) = setup(false).await;
        assert!(matches!(
            service.login("jane@x.com", "secret1").await,
            Err(CoreError::EmailNotVerified)
        ));
    }

    #[tokio::test]
    async fn profile_name_can_change() {
        let (service, id) = setup(true).await;
        let account = service.update_profile(id, Some(" Janet ")).await.unwrap();
        assert_eq!(account.name, "Janet");
        assert_eq!(service.me(id).await.unwrap().name, "Janet");

        assert!(matches!(
            service.update_profile(id, Some("  ")).await,
            Err(CoreError::Validation(_))
        ));
        assert_eq!(service.update_profile(id, None).await.unwrap().name, "Janet");
    }

    #[tokio::test]
    async fn password_change_requires_current_password() {
        let (service, id) = setup(true).await;
        assert!(matches!(
            service.change_password(id, "wrong12", "newpass1").await,
            Err(CoreError::InvalidCredentials)
        ));
        assert!(matches!(
            service.change_password(id, "secret1", "short").await,
            Err(CoreError::Validation(_))
        ));

        service
            .change_password(id, "secret1", "newpass1")
            .await
            .unwrap();
        assert!(service.login("jane@x.com", "newpass1").await.is_ok());
        assert!(service.login("jane@x.com", "secret1").await.is_err());
    }
}
