use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::Role;

/// Stored user account. Never serialized to clients directly, see [`UserView`].
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: Uuid,
    pub uid: Option<String>,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub profile: Profile,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub picture: Option<Picture>,
}

/// Uploaded profile picture metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Picture {
    /// File name as uploaded by the client
    pub alias: String,
    /// Stored file name
    pub name: String,
    /// Path relative to the uploads root
    pub path: String,
    pub size: u64,
}

impl User {
    pub fn new(email: impl Into<String>, password_hash: impl Into<String>, role: Role, profile: Profile) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            uid: None,
            email: email.into(),
            password_hash: password_hash.into(),
            role,
            profile,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_uid(mut self, uid: impl Into<String>) -> Self {
        self.uid = Some(uid.into());
        self
    }

    pub fn display_name(&self) -> String {
        format!("{} {}", self.profile.first_name, self.profile.last_name)
            .trim()
            .to_string()
    }
}

/// Client-facing user representation. Carries no password and hides the
/// uid from viewers who are neither the subject nor elevated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub uid: Option<String>,
    pub email: String,
    pub role: Role,
    pub profile: Profile,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserView {
    pub fn for_viewer(user: &User, viewer: &User) -> Self {
        let uid_visible = viewer.id == user.id || viewer.role.is_elevated();
        Self {
            id: user.id,
            uid: if uid_visible { user.uid.clone() } else { None },
            email: user.email.clone(),
            role: user.role,
            profile: user.profile.clone(),
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }

    /// View of an account as seen by its owner.
    pub fn own(user: &User) -> Self {
        Self::for_viewer(user, user)
    }
}
