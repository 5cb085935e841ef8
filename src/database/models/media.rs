use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A folder in a course's media tree. Root directories carry the course id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Directory {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub name: String,
    pub parent: Option<Uuid>,
    pub course_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct MediaFile {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub name: String,
    /// Path relative to the uploads root
    pub link: String,
    pub size: i64,
    pub mime_type: Option<String>,
    pub directory: Uuid,
    pub created_at: DateTime<Utc>,
}

/// A directory together with its immediate children.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryListing {
    #[serde(flatten)]
    pub directory: Directory,
    pub sub_directories: Vec<Directory>,
    pub files: Vec<MediaFile>,
}

impl Directory {
    pub fn root(course_id: impl Into<String>) -> Self {
        let course_id = course_id.into();
        Self {
            id: Uuid::new_v4(),
            name: course_id.clone(),
            parent: None,
            course_id: Some(course_id),
            created_at: Utc::now(),
        }
    }

    pub fn child(parent: Uuid, name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            parent: Some(parent),
            course_id: None,
            created_at: Utc::now(),
        }
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }
}

impl DirectoryListing {
    pub fn new(directory: Directory, sub_directories: Vec<Directory>, files: Vec<MediaFile>) -> Self {
        Self { directory, sub_directories, files }.sorted()
    }

    pub fn sorted(mut self) -> Self {
        sort_by_name(&mut self.sub_directories);
        sort_by_name(&mut self.files);
        self
    }

    pub fn file(&self, id: Uuid) -> Option<&MediaFile> {
        self.files.iter().find(|f| f.id == id)
    }
}

pub trait Named {
    fn name(&self) -> &str;
}

impl Named for Directory {
    fn name(&self) -> &str {
        &self.name
    }
}

impl Named for MediaFile {
    fn name(&self) -> &str {
        &self.name
    }
}

/// Case-insensitive ordering by name. Names differing only in case fall
/// back to byte order so the result does not depend on input order.
pub fn sort_by_name<T: Named>(items: &mut [T]) {
    items.sort_by(|a, b| {
        a.name()
            .to_lowercase()
            .cmp(&b.name().to_lowercase())
            .then_with(|| a.name().cmp(b.name()))
    });
}
