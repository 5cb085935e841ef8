use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::models::{Directory, MediaFile, User};
use super::store::{MediaStore, StoreError, UserQuery, UserStore};
use crate::types::Role;

/// Process-local store used when no database is configured, and by tests
#[derive(Default)]
pub struct MemoryStore {
    users: RwLock<HashMap<Uuid, User>>,
    directories: RwLock<HashMap<Uuid, Directory>>,
    files: RwLock<HashMap<Uuid, MediaFile>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn list(&self) -> Result<Vec<User>, StoreError> {
        let users = self.users.read().await;
        let mut list: Vec<User> = users.values().cloned().collect();
        list.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.email.cmp(&b.email)));
        Ok(list)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn find_by_login(&self, login: &str) -> Result<Option<User>, StoreError> {
        let users = self.users.read().await;
        let found = users
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(login))
            .or_else(|| users.values().find(|u| u.uid.as_deref() == Some(login)));
        Ok(found.cloned())
    }

    async fn email_in_use(&self, email: &str, exclude: Option<Uuid>) -> Result<bool, StoreError> {
        let users = self.users.read().await;
        Ok(users
            .values()
            .any(|u| Some(u.id) != exclude && u.email.eq_ignore_ascii_case(email)))
    }

    async fn search(&self, query: &UserQuery) -> Result<Vec<User>, StoreError> {
        let users = self.users.read().await;
        let mut found: Vec<User> = users
            .values()
            .filter(|u| u.role == query.role && query.matches(u))
            .cloned()
            .collect();
        found.sort_by_cached_key(|u| (u.profile.last_name.to_lowercase(), u.profile.first_name.to_lowercase()));
        found.truncate(query.limit as usize);
        Ok(found)
    }

    async fn count_by_role(&self, role: Role) -> Result<i64, StoreError> {
        let users = self.users.read().await;
        Ok(users.values().filter(|u| u.role == role).count() as i64)
    }

    async fn insert(&self, user: &User) -> Result<(), StoreError> {
        let mut users = self.users.write().await;
        if users.values().any(|u| u.email.eq_ignore_ascii_case(&user.email)) {
            return Err(StoreError::Conflict(format!("email {} already exists", user.email)));
        }
        if user.uid.is_some() && users.values().any(|u| u.uid == user.uid) {
            return Err(StoreError::Conflict(format!("uid of {} already exists", user.email)));
        }
        users.insert(user.id, user.clone());
        Ok(())
    }

    async fn update(&self, user: &User) -> Result<(), StoreError> {
        let mut users = self.users.write().await;
        match users.get_mut(&user.id) {
            Some(existing) => {
                *existing = user.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound(format!("user {}", user.id))),
        }
    }

    async fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        Ok(self.users.write().await.remove(&id).is_some())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[async_trait]
impl MediaStore for MemoryStore {
    async fn root_for_course(&self, course_id: &str, candidate: Directory) -> Result<Directory, StoreError> {
        let mut directories = self.directories.write().await;
        if let Some(root) = directories
            .values()
            .find(|d| d.is_root() && d.course_id.as_deref() == Some(course_id))
        {
            return Ok(root.clone());
        }
        directories.insert(candidate.id, candidate.clone());
        Ok(candidate)
    }

    async fn find_directory(&self, id: Uuid) -> Result<Option<Directory>, StoreError> {
        Ok(self.directories.read().await.get(&id).cloned())
    }

    async fn child_directories(&self, parent: Uuid) -> Result<Vec<Directory>, StoreError> {
        let directories = self.directories.read().await;
        Ok(directories
            .values()
            .filter(|d| d.parent == Some(parent))
            .cloned()
            .collect())
    }

    async fn insert_directory(&self, directory: &Directory) -> Result<(), StoreError> {
        self.directories.write().await.insert(directory.id, directory.clone());
        Ok(())
    }

    async fn rename_directory(&self, id: Uuid, name: &str) -> Result<bool, StoreError> {
        let mut directories = self.directories.write().await;
        Ok(match directories.get_mut(&id) {
            Some(directory) => {
                directory.name = name.to_string();
                true
            }
            None => false,
        })
    }

    async fn delete_directory(&self, id: Uuid) -> Result<bool, StoreError> {
        let removed = self.directories.write().await.remove(&id).is_some();
        if removed {
            self.files.write().await.retain(|_, f| f.directory != id);
        }
        Ok(removed)
    }

    async fn files_in(&self, directory: Uuid) -> Result<Vec<MediaFile>, StoreError> {
        let files = self.files.read().await;
        Ok(files.values().filter(|f| f.directory == directory).cloned().collect())
    }

    async fn find_file(&self, id: Uuid) -> Result<Option<MediaFile>, StoreError> {
        Ok(self.files.read().await.get(&id).cloned())
    }

    async fn insert_file(&self, file: &MediaFile) -> Result<(), StoreError> {
        // Held across the insert so the directory cannot be deleted in between.
        let directories = self.directories.read().await;
        if !directories.contains_key(&file.directory) {
            return Err(StoreError::NotFound(format!("directory {}", file.directory)));
        }
        self.files.write().await.insert(file.id, file.clone());
        Ok(())
    }

    async fn rename_file(&self, id: Uuid, name: &str) -> Result<bool, StoreError> {
        let mut files = self.files.write().await;
        Ok(match files.get_mut(&id) {
            Some(file) => {
                file.name = name.to_string();
                true
            }
            None => false,
        })
    }

    async fn delete_file(&self, id: Uuid) -> Result<bool, StoreError> {
        Ok(self.files.write().await.remove(&id).is_some())
    }
}
