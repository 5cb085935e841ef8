use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use super::models::{Directory, MediaFile, User};
use crate::types::Role;

/// Errors surfaced by store implementations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid stored record: {0}")]
    InvalidRecord(String),

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// Role-scoped free-text member search
#[derive(Debug, Clone, PartialEq)]
pub struct UserQuery {
    pub role: Role,
    /// Whitespace-separated terms, any of which may match
    pub terms: Vec<String>,
    pub limit: u32,
}

impl UserQuery {
    pub fn new(role: Role, query: &str, limit: u32) -> Self {
        Self {
            role,
            terms: query.split_whitespace().map(str::to_string).collect(),
            limit,
        }
    }

    /// True when any term occurs case-insensitively in one of the searchable fields.
    pub fn matches(&self, user: &User) -> bool {
        let fields = [
            user.uid.as_deref().unwrap_or_default(),
            user.email.as_str(),
            user.profile.first_name.as_str(),
            user.profile.last_name.as_str(),
        ];
        self.terms.iter().any(|term| {
            let term = term.to_lowercase();
            fields.iter().any(|field| field.to_lowercase().contains(&term))
        })
    }

    /// Case-insensitive alternation of the escaped terms, for `~*` matching.
    pub fn pattern(&self) -> String {
        self.terms
            .iter()
            .map(|term| escape_regex(term))
            .collect::<Vec<_>>()
            .join("|")
    }
}

fn escape_regex(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if "\\.+*?()|[]{}^$#&-~".contains(c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn list(&self) -> Result<Vec<User>, StoreError>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError>;
    /// Looks a user up by email or uid.
    async fn find_by_login(&self, login: &str) -> Result<Option<User>, StoreError>;
    async fn email_in_use(&self, email: &str, exclude: Option<Uuid>) -> Result<bool, StoreError>;
    async fn search(&self, query: &UserQuery) -> Result<Vec<User>, StoreError>;
    async fn count_by_role(&self, role: Role) -> Result<i64, StoreError>;
    async fn insert(&self, user: &User) -> Result<(), StoreError>;
    async fn update(&self, user: &User) -> Result<(), StoreError>;
    /// Returns false when no such user existed.
    async fn delete(&self, id: Uuid) -> Result<bool, StoreError>;
    async fn ping(&self) -> Result<(), StoreError>;
}

#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Returns the course root, inserting `candidate` if none exists yet.
    async fn root_for_course(&self, course_id: &str, candidate: Directory) -> Result<Directory, StoreError>;
    async fn find_directory(&self, id: Uuid) -> Result<Option<Directory>, StoreError>;
    async fn child_directories(&self, parent: Uuid) -> Result<Vec<Directory>, StoreError>;
    async fn insert_directory(&self, directory: &Directory) -> Result<(), StoreError>;
    async fn rename_directory(&self, id: Uuid, name: &str) -> Result<bool, StoreError>;
    /// Deletes the directory row and the rows of the files it directly holds.
    async fn delete_directory(&self, id: Uuid) -> Result<bool, StoreError>;
    async fn files_in(&self, directory: Uuid) -> Result<Vec<MediaFile>, StoreError>;
    async fn find_file(&self, id: Uuid) -> Result<Option<MediaFile>, StoreError>;
    async fn insert_file(&self, file: &MediaFile) -> Result<(), StoreError>;
    async fn rename_file(&self, id: Uuid, name: &str) -> Result<bool, StoreError>;
    async fn delete_file(&self, id: Uuid) -> Result<bool, StoreError>;
}
