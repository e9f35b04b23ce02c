use tracing::{info, warn};
use validator::Validate;

use super::catalog::VisaTypeInput;
use super::users::normalize_email;
use crate::database::models::{NewUser, Profile, User, UserChanges, VisaTypeQuery};
use crate::error::ApiError;
use crate::state::AppState;
use crate::types::Role;

const BUILTIN_CATALOG: &str = include_str!("../../seed/catalog.yaml");

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("catalog is not valid YAML: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("catalog entry {index} ({name}) is invalid: {reason}")]
    Invalid { index: usize, name: String, reason: String },
}

/// Parse and validate a catalog document
pub fn parse_catalog(yaml: &str) -> Result<Vec<VisaTypeInput>, CatalogError> {
    let entries: Vec<VisaTypeInput> = serde_yaml::from_str(yaml)?;
    for (index, entry) in entries.iter().enumerate() {
        entry.validate().map_err(|err| CatalogError::Invalid {
            index,
            name: entry.name.clone(),
            reason: err.to_string(),
        })?;
    }
    Ok(entries)
}

pub fn builtin_catalog() -> Result<Vec<VisaTypeInput>, CatalogError> {
    parse_catalog(BUILTIN_CATALOG)
}

/// Make sure an active admin account exists for `email`.
///
/// An existing account is promoted and reactivated; its password is left alone.
pub async fn ensure_admin(state: &AppState, email: &str, password: &str, name: &str) -> Result<User, ApiError> {
    let email = normalize_email(email);

    if let Some(existing) = state.store.find_user_by_email(&email).await? {
        if existing.role == Role::Admin && existing.is_active {
            return Ok(existing);
        }
        let user = state
            .store
            .update_user(
                existing.id,
                UserChanges {
                    role: Some(Role::Admin),
                    is_active: Some(true),
                    ..UserChanges::default()
                },
            )
            .await?;
        warn!(user_id = %user.id, "promoted existing account to admin");
        return Ok(user);
    }

    let password_hash = state.passwords.hash(password.to_string()).await?;
    let user = state
        .store
        .insert_user(NewUser {
            name: name.to_string(),
            email,
            password_hash,
            role: Role::Admin,
            profile: Profile::default(),
        })
        .await?;
    info!(user_id = %user.id, "provisioned admin account");
    Ok(user)
}

/// Insert `entries` only when the catalog holds nothing yet. Returns how many were added.
pub async fn seed_catalog(state: &AppState, entries: Vec<VisaTypeInput>) -> Result<usize, ApiError> {
    let existing = state
        .store
        .list_visa_types(&VisaTypeQuery {
            include_inactive: true,
            ..VisaTypeQuery::default()
        })
        .await?;
    if !existing.is_empty() {
        info!(count = existing.len(), "catalog already populated, skipping seed");
        return Ok(0);
    }

    let count = entries.len();
    for entry in entries {
        state.store.insert_visa_type(entry.into_visa_type(None)).await?;
    }
    info!(count, "seeded visa catalog");
    Ok(count)
}

/// Startup provisioning driven by configuration
pub async fn run(state: &AppState) -> anyhow::Result<()> {
    let bootstrap = &state.config.bootstrap;
    if let (Some(email), Some(password)) = (&bootstrap.admin_email, &bootstrap.admin_password) {
        ensure_admin(state, email, password, &bootstrap.admin_name)
            .await
            .map_err(|err| anyhow::anyhow!("admin bootstrap failed: {}", err))?;
    }

    if bootstrap.seed_catalog {
        seed_catalog(state, builtin_catalog()?)
            .await
            .map_err(|err| anyhow::anyhow!("catalog seed failed: {}", err))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::catalog::{resolve_requirements, RequirementsView, GENERIC_REQUIREMENTS};
    use crate::testing::TestContext;
    use crate::types::VisaCategory;

    #[test]
    fn builtin_catalog_parses_with_derived_totals() {
        let entries = builtin_catalog().unwrap();
        assert!(entries.len() >= 4);
        let visa = entries[0].clone().into_visa_type(None);
        assert_eq!(visa.fees.total_fee, visa.fees.consulate_fee + visa.fees.service_fee);
    }

    #[test]
    fn submitted_totals_are_rejected() {
        let yaml = r#"
- country: Spain
  country_code: ES
  name: Tourist Visa
  category: tourism
  fees: { consulate_fee: "80", service_fee: "10", total_fee: "1", currency: EUR }
  processing_time: 10 days
  validity: 90 days
  max_stay: 90 days
"#;
        assert!(matches!(parse_catalog(yaml), Err(CatalogError::Parse(_))));
    }

    #[tokio::test]
    async fn tourism_entry_without_public_list_falls_back() {
        let ctx = TestContext::new().await;
        seed_catalog(&ctx.state, builtin_catalog().unwrap()).await.unwrap();

        let catalog = ctx.state.store.list_visa_types(&VisaTypeQuery::default()).await.unwrap();
        let tourism = catalog
            .iter()
            .find(|v| v.category == VisaCategory::Tourism && v.public_requirements.is_empty())
            .unwrap();

        match resolve_requirements(tourism, Role::NonSubscriber) {
            RequirementsView::Public(view) => {
                assert!(view.is_generic);
                assert_eq!(view.requirements, GENERIC_REQUIREMENTS.map(String::from).to_vec());
                assert!(!view.upgrade_message.is_empty());
            }
            RequirementsView::Detailed(_) => panic!("detailed tier leaked"),
        }
    }

    #[tokio::test]
    async fn seeding_twice_adds_nothing() {
        let ctx = TestContext::new().await;
        let first = seed_catalog(&ctx.state, builtin_catalog().unwrap()).await.unwrap();
        let second = seed_catalog(&ctx.state, builtin_catalog().unwrap()).await.unwrap();
        assert!(first > 0);
        assert_eq!(second, 0);
    }

    #[tokio::test]
    async fn ensure_admin_is_idempotent_and_promotes() {
        let ctx = TestContext::new().await;
        let first = ensure_admin(&ctx.state, "Root@Example.com", "secret1", "Root").await.unwrap();
        let again = ensure_admin(&ctx.state, "root@example.com", "other", "Root").await.unwrap();
        assert_eq!(first.id, again.id);
        assert_eq!(again.role, Role::Admin);

        let (member, _) = ctx.user(Role::NonSubscriber).await;
        let promoted = ensure_admin(&ctx.state, &member.email, "ignored", "x").await.unwrap();
        assert_eq!(promoted.id, member.id);
        assert_eq!(promoted.role, Role::Admin);
    }
}
