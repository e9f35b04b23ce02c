use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;
use validator::Validate;

use crate::database::models::{NewUser, Profile, User, UserChanges, UserFilter};
use crate::error::ApiError;
use crate::middleware::Identity;
use crate::state::AppState;
use crate::types::Role;

#[derive(Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    #[validate(length(min = 2, max = 100, message = "Name must be 2 to 100 characters long."))]
    pub name: String,
    #[validate(email(message = "Email must be formatted."))]
    pub email: String,
    #[validate(length(min = 6, max = 128, message = "Password must contain at least 6 characters."))]
    pub password: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub nationality: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    #[validate(email(message = "Email must be formatted."))]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required."))]
    pub password: String,
}

/// Self-service profile edit. Absent fields keep their stored value.
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct ProfileUpdate {
    #[validate(length(min = 2, max = 100, message = "Name must be 2 to 100 characters long."))]
    pub name: Option<String>,
    #[validate(length(max = 32))]
    pub phone: Option<String>,
    #[validate(length(max = 64))]
    pub nationality: Option<String>,
    #[validate(length(min = 5, max = 20, message = "Passport number must be 5 to 20 characters long."))]
    pub passport_number: Option<String>,
    #[validate(length(max = 255))]
    pub address: Option<String>,
    #[validate(length(min = 6, max = 128, message = "Password must contain at least 6 characters."))]
    pub password: Option<String>,
}

/// Admin-only account changes
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AdminUserUpdate {
    #[validate(length(min = 2, max = 100, message = "Name must be 2 to 100 characters long."))]
    pub name: Option<String>,
    pub role: Option<Role>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct AuthSession {
    pub token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
    pub user: User,
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn session(state: &AppState, user: User) -> Result<AuthSession, ApiError> {
    Ok(AuthSession {
        token: state.tokens.issue(user.id)?,
        token_type: "Bearer",
        expires_in: state.tokens.expires_in(),
        user,
    })
}

/// Create a `non-subscriber` account and sign it in
pub async fn register(state: &AppState, req: RegisterRequest) -> Result<AuthSession, ApiError> {
    let email = normalize_email(&req.email);
    if state.store.find_user_by_email(&email).await?.is_some() {
        return Err(ApiError::conflict("An account with this email already exists"));
    }

    let password_hash = state.passwords.hash(req.password).await?;
    let user = state
        .store
        .insert_user(NewUser {
            name: req.name.trim().to_string(),
            email,
            password_hash,
            role: Role::NonSubscriber,
            profile: Profile {
                phone: req.phone,
                nationality: req.nationality,
                ..Profile::default()
            },
        })
        .await?;

    info!(user_id = %user.id, "registered new account");
    session(state, user)
}

pub async fn login(state: &AppState, req: LoginRequest) -> Result<AuthSession, ApiError> {
    let email = normalize_email(&req.email);
    let Some(user) = state.store.find_user_by_email(&email).await? else {
        warn!("login attempt for unknown account");
        return Err(state.passwords.verify_absent(req.password).await.into());
    };

    if let Err(err) = state.passwords.verify(req.password, user.password_hash.clone()).await {
        warn!(user_id = %user.id, "failed login");
        return Err(err.into());
    }

    if !user.is_active {
        warn!(user_id = %user.id, "login attempt on deactivated account");
        return Err(ApiError::unauthorized("Account is deactivated"));
    }

    session(state, user)
}

pub async fn update_profile(state: &AppState, identity: &Identity, req: ProfileUpdate) -> Result<User, ApiError> {
    let password_hash = match req.password {
        Some(password) => Some(state.passwords.hash(password).await?),
        None => None,
    };

    // Merged field by field inside the store so concurrent edits to different fields both land
    let user = state
        .store
        .update_user(
            identity.id(),
            UserChanges {
                name: req.name.map(|n| n.trim().to_string()),
                password_hash,
                phone: req.phone,
                nationality: req.nationality,
                passport_number: req.passport_number,
                address: req.address,
                ..UserChanges::default()
            },
        )
        .await?;
    Ok(user)
}

pub async fn list_users(state: &AppState, filter: UserFilter) -> Result<Vec<User>, ApiError> {
    Ok(state.store.list_users(&filter).await?)
}

/// Role and activation changes. An admin cannot demote or deactivate themselves.
pub async fn admin_update(
    state: &AppState,
    actor: &Identity,
    user_id: Uuid,
    req: AdminUserUpdate,
) -> Result<User, ApiError> {
    if user_id == actor.id() {
        let demotes = req.role.map_or(false, |role| role != Role::Admin);
        let deactivates = req.is_active == Some(false);
        if demotes || deactivates {
            return Err(ApiError::forbidden("Administrators cannot demote or deactivate themselves"));
        }
    }

    let user = state
        .store
        .update_user(
            user_id,
            UserChanges {
                name: req.name,
                role: req.role,
                is_active: req.is_active,
                ..UserChanges::default()
            },
        )
        .await?;

    info!(actor = %actor.id(), user_id = %user.id, role = %user.role, active = user.is_active, "admin updated account");
    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::TestContext;

    fn alice() -> RegisterRequest {
        RegisterRequest {
            name: "Alice".to_string(),
            email: "alice@example.com".to_string(),
            password: "secret1".to_string(),
            phone: None,
            nationality: None,
        }
    }

    #[tokio::test]
    async fn registration_starts_as_non_subscriber() {
        let ctx = TestContext::new().await;
        let session = register(&ctx.state, alice()).await.unwrap();
        assert_eq!(session.user.role, Role::NonSubscriber);
        assert!(session.user.is_active);
        assert!(ctx.state.tokens.verify(&session.token).is_ok());
    }

    #[tokio::test]
    async fn duplicate_registration_conflicts_and_adds_nothing() {
        let ctx = TestContext::new().await;
        register(&ctx.state, alice()).await.unwrap();

        let mut again = alice();
        again.email = "Alice@Example.com ".to_string();
        let err = register(&ctx.state, again).await.unwrap_err();
        assert_eq!(err.status_code(), 409);

        let users = ctx.state.store.list_users(&UserFilter::default()).await.unwrap();
        assert_eq!(users.iter().filter(|u| u.email == "alice@example.com").count(), 1);
    }

    #[tokio::test]
    async fn login_checks_password_and_activation() {
        let ctx = TestContext::new().await;
        let session = register(&ctx.state, alice()).await.unwrap();

        let ok = login(
            &ctx.state,
            LoginRequest { email: "ALICE@example.com".into(), password: "secret1".into() },
        )
        .await;
        assert!(ok.is_ok());

        let bad = login(
            &ctx.state,
            LoginRequest { email: "alice@example.com".into(), password: "wrong".into() },
        )
        .await
        .unwrap_err();
        assert_eq!(bad.status_code(), 401);

        ctx.state
            .store
            .update_user(session.user.id, UserChanges { is_active: Some(false), ..Default::default() })
            .await
            .unwrap();
        let inactive = login(
            &ctx.state,
            LoginRequest { email: "alice@example.com".into(), password: "secret1".into() },
        )
        .await
        .unwrap_err();
        assert_eq!(inactive.status_code(), 401);
    }

    #[tokio::test]
    async fn admin_cannot_demote_themselves() {
        let ctx = TestContext::new().await;
        let (admin, _) = ctx.user(Role::Admin).await;
        let identity = Identity { user: admin.clone() };

        let err = admin_update(
            &ctx.state,
            &identity,
            admin.id,
            AdminUserUpdate { role: Some(Role::Subscriber), ..Default::default() },
        )
        .await
        .unwrap_err();
        assert_eq!(err.status_code(), 403);

        let (member, _) = ctx.user(Role::NonSubscriber).await;
        let promoted = admin_update(
            &ctx.state,
            &identity,
            member.id,
            AdminUserUpdate { role: Some(Role::Subscriber), ..Default::default() },
        )
        .await
        .unwrap();
        assert_eq!(promoted.role, Role::Subscriber);
    }

    #[tokio::test]
    async fn profile_update_keeps_unset_fields() {
        let ctx = TestContext::new().await;
        let (user, _) = ctx.user(Role::NonSubscriber).await;
        let identity = Identity { user };

        let first = update_profile(
            &ctx.state,
            &identity,
            ProfileUpdate { phone: Some("+33 1 23 45 67 89".into()), ..Default::default() },
        )
        .await
        .unwrap();
        let identity = Identity { user: first };
        let second = update_profile(
            &ctx.state,
            &identity,
            ProfileUpdate { nationality: Some("French".into()), ..Default::default() },
        )
        .await
        .unwrap();

        assert_eq!(second.profile.phone.as_deref(), Some("+33 1 23 45 67 89"));
        assert_eq!(second.profile.nationality.as_deref(), Some("French"));
        assert_eq!(second.role, Role::NonSubscriber);
    }

    #[tokio::test]
    async fn concurrent_profile_edits_both_land() {
        let ctx = TestContext::new().await;
        let (user, _) = ctx.user(Role::NonSubscriber).await;
        // Both requests carry the same snapshot taken at gate time
        let identity = Identity { user };

        let (a, b) = tokio::join!(
            update_profile(
                &ctx.state,
                &identity,
                ProfileUpdate { phone: Some("+33 1 23 45 67 89".into()), ..Default::default() },
            ),
            update_profile(
                &ctx.state,
                &identity,
                ProfileUpdate { address: Some("12 Rue de Rivoli".into()), ..Default::default() },
            ),
        );
        a.unwrap();
        b.unwrap();

        let stored = ctx.state.store.find_user(identity.id()).await.unwrap().unwrap();
        assert_eq!(stored.profile.phone.as_deref(), Some("+33 1 23 45 67 89"));
        assert_eq!(stored.profile.address.as_deref(), Some("12 Rue de Rivoli"));
    }

    #[tokio::test]
    async fn unknown_email_fails_like_a_wrong_password() {
        let ctx = TestContext::new().await;
        register(&ctx.state, alice()).await.unwrap();

        let wrong = login(
            &ctx.state,
            LoginRequest { email: "alice@example.com".into(), password: "wrong".into() },
        )
        .await
        .unwrap_err();
        let unknown = login(
            &ctx.state,
            LoginRequest { email: "nobody@example.com".into(), password: "wrong".into() },
        )
        .await
        .unwrap_err();

        assert_eq!(unknown.status_code(), 401);
        assert_eq!(unknown.message(), wrong.message());
        assert_eq!(unknown.to_json(), wrong.to_json());
    }
}
