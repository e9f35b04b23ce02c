/// Shared enums used across the codebase

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Error returned when a stored or submitted enum value is not recognised
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} '{value}'")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

macro_rules! string_enum {
    ($name:ident, $kind:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(UnknownVariant { kind: $kind, value: other.to_string() }),
                }
            }
        }
    };
}

/// User role. Only an admin action may change it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    NonSubscriber,
    Subscriber,
    Admin,
}

string_enum!(Role, "role", {
    NonSubscriber => "non-subscriber",
    Subscriber => "subscriber",
    Admin => "admin",
});

impl Role {
    /// Subscribers and admins see the detailed catalog tier
    pub fn has_subscriber_access(&self) -> bool {
        matches!(self, Role::Subscriber | Role::Admin)
    }
}

impl Default for Role {
    fn default() -> Self {
        Role::NonSubscriber
    }
}

/// Access level a route or operation requires
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Authenticated,
    Subscriber,
    Admin,
}

impl Access {
    pub fn permits(&self, role: Role) -> bool {
        match self {
            Access::Authenticated => true,
            Access::Subscriber => role.has_subscriber_access(),
            Access::Admin => role == Role::Admin,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VisaCategory {
    Tourism,
    Business,
    ShortStay,
    LongStay,
}

string_enum!(VisaCategory, "visa category", {
    Tourism => "tourism",
    Business => "business",
    ShortStay => "short_stay",
    LongStay => "long_stay",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    Draft,
    Submitted,
    UnderReview,
    Approved,
    Rejected,
    Completed,
}

string_enum!(ApplicationStatus, "application status", {
    Draft => "draft",
    Submitted => "submitted",
    UnderReview => "under_review",
    Approved => "approved",
    Rejected => "rejected",
    Completed => "completed",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Scheduled,
    Completed,
    Cancelled,
}

string_enum!(AppointmentStatus, "appointment status", {
    Scheduled => "scheduled",
    Completed => "completed",
    Cancelled => "cancelled",
});

/// What an uploaded file is attached to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadPurpose {
    /// Applicant document, private to its owner and admins
    Document,
    /// Requirement PDF attached to a visa type, subscriber tier
    Requirement,
}

string_enum!(UploadPurpose, "upload purpose", {
    Document => "document",
    Requirement => "requirement",
});
