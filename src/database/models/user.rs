use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::types::{Role, UnknownVariant};

/// Optional contact details a user maintains on their profile
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub phone: Option<String>,
    pub nationality: Option<String>,
    pub passport_number: Option<String>,
    pub address: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(skip)]
    pub password_hash: String,
    pub role: Role,
    pub is_active: bool,
    #[serde(flatten)]
    pub profile: Profile,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields required to persist a brand new account
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub profile: Profile,
}

impl NewUser {
    pub fn into_user(self, now: DateTime<Utc>) -> User {
        User {
            id: Uuid::new_v4(),
            name: self.name,
            email: self.email,
            password_hash: self.password_hash,
            role: self.role,
            is_active: true,
            profile: self.profile,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Partial update. `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default)]
pub struct UserChanges {
    pub name: Option<String>,
    pub role: Option<Role>,
    pub is_active: Option<bool>,
    pub password_hash: Option<String>,
    /// Profile fields are merged one by one against the stored record
    pub phone: Option<String>,
    pub nationality: Option<String>,
    pub passport_number: Option<String>,
    pub address: Option<String>,
}

impl UserChanges {
    pub fn apply(self, user: &mut User, now: DateTime<Utc>) {
        if let Some(name) = self.name {
            user.name = name;
        }
        if let Some(role) = self.role {
            user.role = role;
        }
        if let Some(active) = self.is_active {
            user.is_active = active;
        }
        if let Some(hash) = self.password_hash {
            user.password_hash = hash;
        }
        let profile = &mut user.profile;
        for (slot, value) in [
            (&mut profile.phone, self.phone),
            (&mut profile.nationality, self.nationality),
            (&mut profile.passport_number, self.passport_number),
            (&mut profile.address, self.address),
        ] {
            if value.is_some() {
                *slot = value;
            }
        }
        user.updated_at = now;
    }
}

#[derive(Debug, Clone, Default)]
pub struct UserFilter {
    pub role: Option<Role>,
    pub is_active: Option<bool>,
}

impl UserFilter {
    pub fn matches(&self, user: &User) -> bool {
        self.role.map_or(true, |r| user.role == r)
            && self.is_active.map_or(true, |a| user.is_active == a)
    }
}

/// Row shape of the `users` table
#[derive(Debug, Clone, FromRow)]
pub struct UserRow {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: String,
    pub is_active: bool,
    pub phone: Option<String>,
    pub nationality: Option<String>,
    pub passport_number: Option<String>,
    pub address: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = UnknownVariant;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        Ok(User {
            id: row.id,
            name: row.name,
            email: row.email,
            password_hash: row.password_hash,
            role: row.role.parse()?,
            is_active: row.is_active,
            profile: Profile {
                phone: row.phone,
                nationality: row.nationality,
                passport_number: row.passport_number,
                address: row.address,
            },
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_hash_never_serializes() {
        let user = NewUser {
            name: "Alice".to_string(),
            email: "alice@example.com".to_string(),
            password_hash: "$argon2id$v=19$secret".to_string(),
            role: Role::NonSubscriber,
            profile: Profile::default(),
        }
        .into_user(Utc::now());

        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["role"], "non-subscriber");
        assert_eq!(json["is_active"], true);
    }

    #[test]
    fn changes_only_touch_given_fields() {
        let mut user = NewUser {
            name: "Bob".to_string(),
            email: "bob@example.com".to_string(),
            password_hash: "hash".to_string(),
            role: Role::NonSubscriber,
            profile: Profile::default(),
        }
        .into_user(Utc::now());

        UserChanges {
            role: Some(Role::Subscriber),
            ..Default::default()
        }
        .apply(&mut user, Utc::now());

        assert_eq!(user.role, Role::Subscriber);
        assert_eq!(user.name, "Bob");
        assert!(user.is_active);

        UserChanges {
            phone: Some("+33 1 23 45 67 89".to_string()),
            ..Default::default()
        }
        .apply(&mut user, Utc::now());
        UserChanges {
            address: Some("12 Rue de Rivoli".to_string()),
            ..Default::default()
        }
        .apply(&mut user, Utc::now());

        assert_eq!(user.profile.phone.as_deref(), Some("+33 1 23 45 67 89"));
        assert_eq!(user.profile.address.as_deref(), Some("12 Rue de Rivoli"));
        assert_eq!(user.profile.nationality, None);
    }
}
