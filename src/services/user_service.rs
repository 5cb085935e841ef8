use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::auth::password::{hash_password_async, verify_password_async};
use crate::database::models::{Profile, User, UserView};
use crate::database::{StoreError, UserQuery};
use crate::error::ApiError;
use crate::state::AppState;
use crate::types::Role;

/// Partial update of a user record; absent fields keep their stored value
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// `null` never clears a stored uid
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<ProfileUpdate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_password: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
}

/// Reasons an update is refused. Each maps to its own client-facing error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UpdateRejection {
    #[error("Invalid role: {0}")]
    InvalidRole(String),

    #[error("You can't change your own role")]
    SelfRoleChange,

    #[error("Invalid email address")]
    InvalidEmail,

    #[error("This mail address is already in use")]
    DuplicateEmail,

    #[error("You don't have the privileges to edit this user")]
    InsufficientPrivilege,

    #[error("Only users with admin privileges can change roles or uids")]
    RoleOrUidChange,

    #[error("Invalid previous password")]
    InvalidPreviousPassword,
}

/// True when `actor` may modify `target` at all.
pub fn can_edit(actor: &User, target: &User) -> bool {
    actor.id == target.id || actor.role.is_admin() || actor.role.edit_level() > target.role.edit_level()
}

fn is_plausible_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.') && !email.contains(char::is_whitespace),
        None => false,
    }
}

/// Check `update` against the edit rules and produce the record to store.
///
/// `email_in_use` reports whether the requested email belongs to another
/// user, `previous_password_valid` whether `current_password` matches the
/// stored hash. A new password is left unhashed in `update`; the caller
/// hashes it.
pub fn apply_update(
    actor: &User,
    existing: &User,
    update: &UserUpdate,
    email_in_use: bool,
    previous_password_valid: bool,
) -> Result<User, UpdateRejection> {
    let role = match update.role.as_deref() {
        Some(requested) => requested
            .parse::<Role>()
            .map_err(|_| UpdateRejection::InvalidRole(requested.to_string()))?,
        None => existing.role,
    };

    let is_self = actor.id == existing.id;
    if is_self && role != existing.role {
        return Err(UpdateRejection::SelfRoleChange);
    }

    let email = match update.email.as_deref().map(str::trim) {
        Some(requested) if requested != existing.email => {
            if !is_plausible_email(requested) {
                return Err(UpdateRejection::InvalidEmail);
            }
            if email_in_use {
                return Err(UpdateRejection::DuplicateEmail);
            }
            requested.to_string()
        }
        _ => existing.email.clone(),
    };

    let uid = match update.uid.as_deref().map(str::trim).filter(|u| !u.is_empty()) {
        Some(requested) => Some(requested.to_string()),
        None => existing.uid.clone(),
    };

    if !actor.role.is_admin() {
        if !can_edit(actor, existing) {
            return Err(UpdateRejection::InsufficientPrivilege);
        }
        if role != existing.role || uid != existing.uid {
            return Err(UpdateRejection::RoleOrUidChange);
        }
    }

    if update.password.as_deref().is_some_and(|p| !p.is_empty()) && !previous_password_valid {
        return Err(UpdateRejection::InvalidPreviousPassword);
    }

    let mut updated = existing.clone();
    updated.role = role;
    updated.email = email;
    updated.uid = uid;
    if let Some(profile) = &update.profile {
        if let Some(first_name) = &profile.first_name {
            updated.profile.first_name = first_name.trim().to_string();
        }
        if let Some(last_name) = &profile.last_name {
            updated.profile.last_name = last_name.trim().to_string();
        }
    }
    updated.updated_at = Utc::now();
    Ok(updated)
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchParams {
    pub role: Option<String>,
    pub query: Option<String>,
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchMeta {
    /// Number of users holding the searched role, ignoring the query
    pub count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub meta: SearchMeta,
    pub users: Vec<UserView>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub uid: Option<String>,
    #[serde(default)]
    pub profile: ProfileUpdate,
}

pub struct UserService<'a> {
    state: &'a AppState,
}

impl<'a> UserService<'a> {
    pub fn new(state: &'a AppState) -> Self {
        Self { state }
    }

    async fn find(&self, id: Uuid) -> Result<User, ApiError> {
        self.state
            .users
            .find_by_id(id)
            .await?
            .ok_or_else(|| ApiError::not_found(format!("User {} not found", id)))
    }

    async fn hash(&self, password: &str) -> Result<String, ApiError> {
        hash_password_async(password, self.state.config.security.bcrypt_cost)
            .await
            .map_err(|e| {
                tracing::error!("Password hashing failed: {}", e);
                ApiError::internal_server_error("Failed to store password")
            })
    }

    pub async fn list(&self, viewer: &User) -> Result<Vec<UserView>, ApiError> {
        let users = self.state.users.list().await?;
        Ok(users.iter().map(|u| UserView::for_viewer(u, viewer)).collect())
    }

    pub async fn get(&self, viewer: &User, id: Uuid) -> Result<UserView, ApiError> {
        let user = self.find(id).await?;
        Ok(UserView::for_viewer(&user, viewer))
    }

    pub async fn search(&self, viewer: &User, params: &SearchParams) -> Result<SearchResult, ApiError> {
        let query = params.query.as_deref().map(str::trim).unwrap_or_default();
        if query.is_empty() {
            return Err(ApiError::bad_request_with_code("Query was empty", "EMPTY_QUERY"));
        }

        let role: Role = params
            .role
            .as_deref()
            .ok_or_else(|| ApiError::bad_request("Search requires a role"))?
            .parse()
            .map_err(|e: crate::types::UnknownRole| ApiError::bad_request_with_code(e.to_string(), "INVALID_ROLE"))?;

        let api = &self.state.config.api;
        let limit = params
            .limit
            .unwrap_or(api.search_default_limit)
            .clamp(1, api.search_max_limit.max(1));

        let found = self.state.users.search(&UserQuery::new(role, query, limit)).await?;
        let count = self.state.users.count_by_role(role).await?;

        Ok(SearchResult {
            meta: SearchMeta { count },
            users: found.iter().map(|u| UserView::for_viewer(u, viewer)).collect(),
        })
    }

    pub async fn update(&self, actor: &User, id: Uuid, update: UserUpdate) -> Result<UserView, ApiError> {
        let existing = self.find(id).await?;

        let email_in_use = match update.email.as_deref().map(str::trim) {
            Some(email) if email != existing.email => self.state.users.email_in_use(email, Some(existing.id)).await?,
            _ => false,
        };

        let previous_password_valid = match update.password.as_deref().filter(|p| !p.is_empty()) {
            Some(_) => {
                let current = update.current_password.as_deref().unwrap_or_default();
                verify_password_async(current, &existing.password_hash).await
            }
            None => false,
        };

        let mut updated = apply_update(actor, &existing, &update, email_in_use, previous_password_valid)
            .map_err(|rejection| {
                tracing::warn!("User {} update of {} rejected: {}", actor.id, existing.id, rejection);
                ApiError::from(rejection)
            })?;

        if let Some(password) = update.password.as_deref().filter(|p| !p.is_empty()) {
            updated.password_hash = self.hash(password).await?;
        }

        self.state.users.update(&updated).await?;
        tracing::info!("User {} updated by {}", updated.id, actor.id);
        Ok(UserView::for_viewer(&updated, actor))
    }

    /// Removes a user unless it is the last remaining admin.
    pub async fn delete(&self, actor: &User, id: Uuid) -> Result<(), ApiError> {
        let target = self.find(id).await?;

        if target.role.is_admin() && self.state.users.count_by_role(Role::Admin).await? <= 1 {
            return Err(ApiError::bad_request_with_code(
                "There are no other users with admin privileges",
                "LAST_ADMIN",
            ));
        }

        if !self.state.users.delete(id).await? {
            return Err(ApiError::not_found(format!("User {} not found", id)));
        }
        if let Some(picture) = &target.profile.picture {
            self.state.uploads.remove(&picture.path).await;
        }

        tracing::info!("User {} ({}) deleted by {}", target.id, target.email, actor.id);
        Ok(())
    }

    pub async fn set_picture(
        &self,
        actor: &User,
        id: Uuid,
        original_name: &str,
        bytes: Vec<u8>,
    ) -> Result<UserView, ApiError> {
        let mut target = self.find(id).await?;
        if !can_edit(actor, &target) {
            return Err(ApiError::forbidden_with_code(
                UpdateRejection::InsufficientPrivilege.to_string(),
                "INSUFFICIENT_PRIVILEGE",
            ));
        }

        let max_dimension = self.state.config.uploads.picture_max_dimension;
        let picture = self
            .state
            .uploads
            .store_picture(target.id, original_name, bytes, max_dimension)
            .await?;

        let stored_path = picture.path.clone();
        let previous = target.profile.picture.replace(picture);
        target.updated_at = Utc::now();

        if let Err(e) = self.state.users.update(&target).await {
            if previous.as_ref().map(|p| p.path.as_str()) != Some(stored_path.as_str()) {
                self.state.uploads.remove(&stored_path).await;
            }
            return Err(e.into());
        }

        // The previous picture is always dropped once the new one is recorded.
        if let Some(previous) = previous.filter(|p| p.path != stored_path) {
            self.state.uploads.remove(&previous.path).await;
        }
        Ok(UserView::for_viewer(&target, actor))
    }

    /// Self-service sign-up; always creates a student.
    pub async fn register(&self, request: RegisterRequest) -> Result<UserView, ApiError> {
        let email = request.email.trim();
        if !is_plausible_email(email) {
            return Err(UpdateRejection::InvalidEmail.into());
        }
        if request.password.is_empty() {
            return Err(ApiError::bad_request("Password must not be empty"));
        }
        if self.state.users.email_in_use(email, None).await? {
            return Err(UpdateRejection::DuplicateEmail.into());
        }

        let profile = Profile {
            first_name: request.profile.first_name.unwrap_or_default().trim().to_string(),
            last_name: request.profile.last_name.unwrap_or_default().trim().to_string(),
            picture: None,
        };
        let mut user = User::new(email, self.hash(&request.password).await?, Role::Student, profile);
        user.uid = request.uid.map(|u| u.trim().to_string()).filter(|u| !u.is_empty());

        self.state.users.insert(&user).await.map_err(|e| match e {
            StoreError::Conflict(_) => ApiError::bad_request_with_code("Email or uid already registered", "DUPLICATE_EMAIL"),
            other => other.into(),
        })?;

        tracing::info!("Registered student {} ({})", user.id, user.email);
        Ok(UserView::own(&user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::password::hash_password;
    use crate::auth::NoDirectory;
    use crate::config::AppConfig;
    use crate::database::{MemoryStore, UserStore};
    use async_trait::async_trait;
    use image::{DynamicImage, ImageBuffer, ImageFormat, Rgba};
    use std::io::Cursor;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    fn user(role: Role) -> User {
        User::new(
            format!("{}-{}@example.org", role, Uuid::new_v4().simple()),
            hash_password("old-password", 4).unwrap(),
            role,
            Profile::default(),
        )
    }

    fn role_update(role: &str) -> UserUpdate {
        UserUpdate {
            role: Some(role.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn unknown_role_is_rejected() {
        let admin = user(Role::Admin);
        let target = user(Role::Student);
        assert_eq!(
            apply_update(&admin, &target, &role_update("superuser"), false, false),
            Err(UpdateRejection::InvalidRole("superuser".to_string()))
        );
    }

    #[test]
    fn nobody_changes_their_own_role() {
        let student = user(Role::Student);
        assert_eq!(
            apply_update(&student, &student, &role_update("admin"), false, false),
            Err(UpdateRejection::SelfRoleChange)
        );
        let admin = user(Role::Admin);
        assert_eq!(
            apply_update(&admin, &admin, &role_update("teacher"), false, false),
            Err(UpdateRejection::SelfRoleChange)
        );
    }

    #[test]
    fn student_may_edit_own_profile() {
        let student = user(Role::Student);
        let update = UserUpdate {
            role: Some("student".to_string()),
            profile: Some(ProfileUpdate {
                first_name: Some(" Sam ".to_string()),
                last_name: None,
            }),
            ..Default::default()
        };
        let updated = apply_update(&student, &student, &update, false, false).unwrap();
        assert_eq!(updated.profile.first_name, "Sam");
        assert_eq!(updated.role, Role::Student);
    }

    #[test]
    fn duplicate_email_is_rejected() {
        let admin = user(Role::Admin);
        let target = user(Role::Student);
        let update = UserUpdate {
            email: Some("taken@example.org".to_string()),
            ..Default::default()
        };
        assert_eq!(apply_update(&admin, &target, &update, true, false), Err(UpdateRejection::DuplicateEmail));
        assert!(apply_update(&admin, &target, &update, false, false).is_ok());
    }

    #[test]
    fn non_admin_needs_higher_edit_level() {
        let teacher = user(Role::Teacher);
        let other_teacher = user(Role::Teacher);
        let student = user(Role::Student);
        let rename = UserUpdate {
            profile: Some(ProfileUpdate {
                first_name: Some("Renamed".to_string()),
                last_name: None,
            }),
            ..Default::default()
        };
        assert_eq!(
            apply_update(&teacher, &other_teacher, &rename, false, false),
            Err(UpdateRejection::InsufficientPrivilege)
        );
        assert!(apply_update(&teacher, &student, &rename, false, false).is_ok());
        assert_eq!(
            apply_update(&student, &teacher, &rename, false, false),
            Err(UpdateRejection::InsufficientPrivilege)
        );
    }

    #[test]
    fn only_admins_change_roles_and_uids() {
        let teacher = user(Role::Teacher);
        let admin = user(Role::Admin);
        let student = user(Role::Student).with_uid("s1");
        let new_uid = UserUpdate {
            uid: Some("s2".to_string()),
            ..Default::default()
        };

        assert_eq!(
            apply_update(&teacher, &student, &new_uid, false, false),
            Err(UpdateRejection::RoleOrUidChange)
        );
        assert_eq!(
            apply_update(&teacher, &student, &role_update("tutor"), false, false),
            Err(UpdateRejection::RoleOrUidChange)
        );
        assert_eq!(apply_update(&admin, &student, &new_uid, false, false).unwrap().uid.as_deref(), Some("s2"));
        assert_eq!(apply_update(&admin, &student, &role_update("tutor"), false, false).unwrap().role, Role::Tutor);
    }

    #[test]
    fn null_uid_preserves_stored_uid() {
        let admin = user(Role::Admin);
        let student = user(Role::Student).with_uid("s1");
        let clear: UserUpdate = serde_json::from_str(r#"{ "uid": null }"#).unwrap();
        assert_eq!(apply_update(&admin, &student, &clear, false, false).unwrap().uid.as_deref(), Some("s1"));
        // the same payload is not a uid change for a teacher either
        let teacher = user(Role::Teacher);
        assert!(apply_update(&teacher, &student, &clear, false, false).is_ok());
    }

    #[test]
    fn password_change_requires_previous_password() {
        let student = user(Role::Student);
        let mut update = UserUpdate {
            password: Some("new-password".to_string()),
            current_password: Some("wrong".to_string()),
            ..Default::default()
        };
        assert_eq!(
            apply_update(&student, &student, &update, false, false),
            Err(UpdateRejection::InvalidPreviousPassword)
        );
        update.current_password = Some("old-password".to_string());
        assert!(apply_update(&student, &student, &update, false, true).is_ok());
        // without a new password the previous one is never consulted
        update.password = None;
        assert!(apply_update(&student, &student, &update, false, false).is_ok());
    }

    /// Memory store whose updates can be switched off.
    struct FlakyUsers {
        inner: MemoryStore,
        fail_updates: AtomicBool,
    }

    #[async_trait]
    impl UserStore for FlakyUsers {
        async fn list(&self) -> Result<Vec<User>, StoreError> {
            self.inner.list().await
        }
        async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
            self.inner.find_by_id(id).await
        }
        async fn find_by_login(&self, login: &str) -> Result<Option<User>, StoreError> {
            self.inner.find_by_login(login).await
        }
        async fn email_in_use(&self, email: &str, exclude: Option<Uuid>) -> Result<bool, StoreError> {
            self.inner.email_in_use(email, exclude).await
        }
        async fn search(&self, query: &UserQuery) -> Result<Vec<User>, StoreError> {
            self.inner.search(query).await
        }
        async fn count_by_role(&self, role: Role) -> Result<i64, StoreError> {
            self.inner.count_by_role(role).await
        }
        async fn insert(&self, user: &User) -> Result<(), StoreError> {
            self.inner.insert(user).await
        }
        async fn update(&self, user: &User) -> Result<(), StoreError> {
            if self.fail_updates.load(Ordering::SeqCst) {
                return Err(StoreError::ConnectionError("store offline".to_string()));
            }
            self.inner.update(user).await
        }
        async fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
            self.inner.delete(id).await
        }
        async fn ping(&self) -> Result<(), StoreError> {
            self.inner.ping().await
        }
    }

    fn png() -> Vec<u8> {
        let buffer = ImageBuffer::from_pixel(8, 8, Rgba([200u8, 10, 10, 255]));
        let mut bytes = Vec::new();
        DynamicImage::ImageRgba8(buffer)
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        bytes
    }

    #[tokio::test]
    async fn failed_picture_update_keeps_current_picture() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AppConfig::development();
        config.uploads.dir = dir.path().to_path_buf();

        let users = Arc::new(FlakyUsers {
            inner: MemoryStore::new(),
            fail_updates: AtomicBool::new(false),
        });
        let state = AppState::new(config, users.clone(), Arc::new(MemoryStore::new()), Arc::new(NoDirectory));
        let student = user(Role::Student);
        state.users.insert(&student).await.unwrap();
        let service = UserService::new(&state);

        let first = service.set_picture(&student, student.id, "me.png", png()).await.unwrap();
        let current = first.profile.picture.unwrap().path;
        assert!(state.uploads.resolve(&current).exists());

        users.fail_updates.store(true, Ordering::SeqCst);
        let err = service.set_picture(&student, student.id, "new.png", png()).await.unwrap_err();
        assert_eq!(err.status_code(), 503);

        let stored = state.users.find_by_id(student.id).await.unwrap().unwrap();
        assert_eq!(stored.profile.picture.map(|p| p.path), Some(current.clone()));
        assert!(state.uploads.resolve(&current).exists());
        // only the recorded picture is left on disk
        let on_disk = std::fs::read_dir(dir.path().join("users")).unwrap().count();
        assert_eq!(on_disk, 1);
    }

    #[test]
    fn email_plausibility() {
        assert!(is_plausible_email("a@b.org"));
        assert!(!is_plausible_email("a@b"));
        assert!(!is_plausible_email("@b.org"));
        assert!(!is_plausible_email("a b@c.org"));
    }
}
