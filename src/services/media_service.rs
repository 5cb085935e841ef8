use chrono::Utc;
use thiserror::Error;
use uuid::Uuid;

use crate::database::models::{Directory, DirectoryListing, MediaFile};
use crate::database::{MediaStore, StoreError};
use crate::uploads::{UploadError, Uploads};

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    InvalidName(String),

    #[error("{0}")]
    InvalidCourse(String),

    #[error("Course root directories cannot be deleted")]
    RootDeletion,

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Upload(#[from] UploadError),
}

/// One file received from a multipart upload
#[derive(Debug, Clone)]
pub struct IncomingFile {
    pub name: String,
    pub mime_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// Per-course media tree operations
pub struct MediaService<'a> {
    store: &'a dyn MediaStore,
    uploads: &'a Uploads,
}

impl<'a> MediaService<'a> {
    pub fn new(store: &'a dyn MediaStore, uploads: &'a Uploads) -> Self {
        Self { store, uploads }
    }

    /// Listing of a course's root directory, created on first access.
    pub async fn course_root(&self, course_id: &str) -> Result<DirectoryListing, MediaError> {
        validate_course_id(course_id)?;
        let root = self.store.root_for_course(course_id, Directory::root(course_id)).await?;
        self.listing_of(root).await
    }

    pub async fn listing(&self, id: Uuid) -> Result<DirectoryListing, MediaError> {
        let directory = self.directory(id).await?;
        self.listing_of(directory).await
    }

    async fn listing_of(&self, directory: Directory) -> Result<DirectoryListing, MediaError> {
        let sub_directories = self.store.child_directories(directory.id).await?;
        let files = self.store.files_in(directory.id).await?;
        Ok(DirectoryListing::new(directory, sub_directories, files))
    }

    async fn directory(&self, id: Uuid) -> Result<Directory, MediaError> {
        self.store
            .find_directory(id)
            .await?
            .ok_or_else(|| MediaError::NotFound(format!("Directory {} not found", id)))
    }

    async fn file(&self, id: Uuid) -> Result<MediaFile, MediaError> {
        self.store
            .find_file(id)
            .await?
            .ok_or_else(|| MediaError::NotFound(format!("File {} not found", id)))
    }

    pub async fn create_directory(&self, parent: Uuid, name: &str) -> Result<Directory, MediaError> {
        let name = validate_name(name)?;
        self.directory(parent).await?;

        let directory = Directory::child(parent, name);
        self.store.insert_directory(&directory).await?;
        tracing::info!("Created directory {} '{}' under {}", directory.id, directory.name, parent);
        Ok(directory)
    }

    pub async fn rename_directory(&self, id: Uuid, name: &str) -> Result<Directory, MediaError> {
        let name = validate_name(name)?;
        if !self.store.rename_directory(id, &name).await? {
            return Err(MediaError::NotFound(format!("Directory {} not found", id)));
        }
        self.directory(id).await
    }

    /// Deletes a directory subtree. Stored files are removed best-effort;
    /// returns the number of files dropped.
    pub async fn delete_directory(&self, id: Uuid) -> Result<usize, MediaError> {
        let directory = self.directory(id).await?;
        if directory.is_root() {
            return Err(MediaError::RootDeletion);
        }

        // Breadth-first walk; deleting in reverse removes children before parents.
        let mut subtree = vec![directory.id];
        let mut next = 0;
        while next < subtree.len() {
            let children = self.store.child_directories(subtree[next]).await?;
            subtree.extend(children.into_iter().map(|d| d.id));
            next += 1;
        }

        let mut removed_files = 0;
        for directory_id in subtree.iter().rev() {
            for file in self.store.files_in(*directory_id).await? {
                self.uploads.remove(&file.link).await;
                removed_files += 1;
            }
            self.store.delete_directory(*directory_id).await?;
        }

        tracing::info!(
            "Deleted directory {} with {} subdirectories and {} files",
            id,
            subtree.len() - 1,
            removed_files
        );
        Ok(removed_files)
    }

    /// Stores every file or none of them: names are checked up front and a
    /// failed write removes what this call already stored.
    pub async fn upload(&self, directory: Uuid, incoming: Vec<IncomingFile>) -> Result<Vec<MediaFile>, MediaError> {
        self.directory(directory).await?;
        if incoming.is_empty() {
            return Err(MediaError::InvalidName("No file was uploaded".to_string()));
        }
        let names = incoming
            .iter()
            .map(|upload| validate_name(&upload.name))
            .collect::<Result<Vec<_>, _>>()?;

        let mut stored: Vec<MediaFile> = Vec::with_capacity(incoming.len());
        for (upload, name) in incoming.into_iter().zip(names) {
            if let Err(e) = self.store_one(directory, upload, name, &mut stored).await {
                self.roll_back(&stored).await;
                return Err(e);
            }
        }
        Ok(stored)
    }

    async fn store_one(
        &self,
        directory: Uuid,
        upload: IncomingFile,
        name: String,
        stored: &mut Vec<MediaFile>,
    ) -> Result<(), MediaError> {
        let link = self.uploads.store_media(&name, &upload.bytes).await?;
        let file = MediaFile {
            id: Uuid::new_v4(),
            name,
            link,
            size: upload.bytes.len() as i64,
            mime_type: upload.mime_type,
            directory,
            created_at: Utc::now(),
        };
        if let Err(e) = self.store.insert_file(&file).await {
            self.uploads.remove(&file.link).await;
            return Err(e.into());
        }
        stored.push(file);
        Ok(())
    }

    async fn roll_back(&self, stored: &[MediaFile]) {
        for file in stored {
            if let Err(e) = self.store.delete_file(file.id).await {
                tracing::warn!("Failed to roll back upload {}: {}", file.id, e);
            }
            self.uploads.remove(&file.link).await;
        }
    }

    pub async fn rename_file(&self, id: Uuid, name: &str) -> Result<MediaFile, MediaError> {
        let name = validate_name(name)?;
        if !self.store.rename_file(id, &name).await? {
            return Err(MediaError::NotFound(format!("File {} not found", id)));
        }
        self.file(id).await
    }

    pub async fn delete_file(&self, id: Uuid) -> Result<(), MediaError> {
        let file = self.file(id).await?;
        self.store.delete_file(id).await?;
        self.uploads.remove(&file.link).await;
        Ok(())
    }
}

fn validate_name(name: &str) -> Result<String, MediaError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(MediaError::InvalidName("Name must not be empty".to_string()));
    }
    if name.len() > 255 {
        return Err(MediaError::InvalidName("Name must be at most 255 characters".to_string()));
    }
    if name.contains(['/', '\\']) || name == "." || name == ".." {
        return Err(MediaError::InvalidName(format!("Invalid name '{}'", name)));
    }
    Ok(name.to_string())
}

fn validate_course_id(course_id: &str) -> Result<(), MediaError> {
    if course_id.is_empty() || course_id.len() > 64 {
        return Err(MediaError::InvalidCourse("Course id must be 1 to 64 characters".to_string()));
    }
    if !course_id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
        return Err(MediaError::InvalidCourse(
            "Course id can only contain letters, numbers, hyphens, and underscores".to_string(),
        ));
    }
    Ok(())
}
