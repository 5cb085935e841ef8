//! Client-side media browsing.
//!
//! [`MediaBrowser`] keeps the currently open directory, a breadcrumb trail
//! and a selection of files. Listings are fetched on each navigation and
//! always re-sorted by name, case-insensitively.

use async_trait::async_trait;
use std::collections::BTreeSet;
use uuid::Uuid;

use super::ClientError;
use crate::database::models::{Directory, DirectoryListing, MediaFile};

/// Remote media operations the browser is driven by
#[async_trait]
pub trait MediaService: Send + Sync {
    async fn course_root(&self, course: &str) -> Result<DirectoryListing, ClientError>;
    async fn directory(&self, id: Uuid) -> Result<DirectoryListing, ClientError>;
    async fn create_directory(&self, parent: Uuid, name: &str) -> Result<Directory, ClientError>;
    async fn rename_directory(&self, id: Uuid, name: &str) -> Result<Directory, ClientError>;
    async fn delete_directory(&self, id: Uuid) -> Result<(), ClientError>;
    async fn upload(&self, directory: Uuid, file_name: &str, bytes: Vec<u8>) -> Result<Vec<MediaFile>, ClientError>;
    async fn rename_file(&self, id: Uuid, name: &str) -> Result<MediaFile, ClientError>;
    async fn delete_file(&self, id: Uuid) -> Result<(), ClientError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct FailedDeletion {
    pub name: String,
    pub reason: String,
}

/// Outcome of a bulk delete
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeletionSummary {
    pub deleted: Vec<String>,
    pub failed: Vec<FailedDeletion>,
    /// Set when the listing could not be refreshed afterwards
    pub reload_error: Option<String>,
}

impl DeletionSummary {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    /// Message for the user when some files could not be deleted. Names only
    /// the failed files; `None` when everything went through.
    pub fn notification(&self) -> Option<String> {
        if self.failed.is_empty() {
            return None;
        }
        let total = self.deleted.len() + self.failed.len();
        let names: Vec<&str> = self.failed.iter().map(|f| f.name.as_str()).collect();
        Some(format!(
            "Could not delete {} of {} files: {}",
            self.failed.len(),
            total,
            names.join(", ")
        ))
    }
}

pub struct MediaBrowser<S: MediaService> {
    service: S,
    current: Option<DirectoryListing>,
    trail: Vec<Directory>,
    selection: BTreeSet<Uuid>,
}

impl<S: MediaService> MediaBrowser<S> {
    pub fn new(service: S) -> Self {
        Self {
            service,
            current: None,
            trail: Vec::new(),
            selection: BTreeSet::new(),
        }
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    pub fn current(&self) -> Option<&DirectoryListing> {
        self.current.as_ref()
    }

    /// Names from the course root down to the open directory
    pub fn breadcrumbs(&self) -> Vec<&str> {
        self.trail
            .iter()
            .map(|d| d.name.as_str())
            .chain(self.current.iter().map(|l| l.directory.name.as_str()))
            .collect()
    }

    fn show(&mut self, listing: DirectoryListing) -> &DirectoryListing {
        self.selection.clear();
        self.current.insert(listing.sorted())
    }

    fn current_id(&self) -> Result<Uuid, ClientError> {
        self.current
            .as_ref()
            .map(|l| l.directory.id)
            .ok_or_else(|| ClientError::Api {
                status: reqwest::StatusCode::BAD_REQUEST,
                code: "NO_DIRECTORY".to_string(),
                message: "No directory is open".to_string(),
            })
    }

    pub async fn open_course(&mut self, course: &str) -> Result<&DirectoryListing, ClientError> {
        let listing = self.service.course_root(course).await?;
        self.trail.clear();
        Ok(self.show(listing))
    }

    /// Opens a directory by id, remembering the current one for [`up`](Self::up).
    pub async fn open(&mut self, id: Uuid) -> Result<&DirectoryListing, ClientError> {
        let listing = self.service.directory(id).await?;
        if let Some(previous) = self.current.take() {
            if previous.directory.id != id {
                self.trail.push(previous.directory);
            }
        }
        Ok(self.show(listing))
    }

    /// Returns to the previous directory; `false` at the top of the trail.
    pub async fn up(&mut self) -> Result<bool, ClientError> {
        let Some(parent) = self.trail.last() else {
            return Ok(false);
        };
        let listing = self.service.directory(parent.id).await?;
        self.trail.pop();
        self.show(listing);
        Ok(true)
    }

    /// Directories above the open one, course root first
    pub fn trail(&self) -> &[Directory] {
        &self.trail
    }

    /// Reopens a directory reached earlier through `trail`.
    pub async fn resume(&mut self, trail: Vec<Directory>, id: Uuid) -> Result<&DirectoryListing, ClientError> {
        let listing = self.service.directory(id).await?;
        self.trail = trail;
        Ok(self.show(listing))
    }

    pub async fn reload(&mut self) -> Result<&DirectoryListing, ClientError> {
        let listing = self.service.directory(self.current_id()?).await?;
        Ok(self.show(listing))
    }

    /// Flips selection of a file in the open directory. Returns whether it
    /// is selected afterwards; unknown ids are never selected.
    pub fn toggle(&mut self, file_id: Uuid) -> bool {
        let known = self
            .current
            .as_ref()
            .is_some_and(|l| l.file(file_id).is_some());
        if !known {
            return false;
        }
        if self.selection.remove(&file_id) {
            false
        } else {
            self.selection.insert(file_id)
        }
    }

    pub fn select_all(&mut self) {
        if let Some(listing) = &self.current {
            self.selection = listing.files.iter().map(|f| f.id).collect();
        }
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    pub fn is_selected(&self, file_id: Uuid) -> bool {
        self.selection.contains(&file_id)
    }

    /// Selected files in listing order
    pub fn selected(&self) -> Vec<&MediaFile> {
        self.current
            .iter()
            .flat_map(|l| l.files.iter())
            .filter(|f| self.selection.contains(&f.id))
            .collect()
    }

    /// Deletes every selected file one after another. Failures are collected
    /// and never stop the remaining deletions; the directory is reloaded
    /// afterwards. If that reload fails the deleted files are dropped from
    /// the listing held locally.
    pub async fn delete_selected(&mut self) -> DeletionSummary {
        let targets: Vec<(Uuid, String)> = self.selected().into_iter().map(|f| (f.id, f.name.clone())).collect();

        let mut summary = DeletionSummary::default();
        let mut removed = BTreeSet::new();
        for (id, name) in targets {
            match self.service.delete_file(id).await {
                Ok(()) => {
                    removed.insert(id);
                    summary.deleted.push(name);
                }
                Err(e) => {
                    tracing::warn!("Failed to delete {}: {}", name, e);
                    summary.failed.push(FailedDeletion {
                        name,
                        reason: e.to_string(),
                    });
                }
            }
        }

        if let Err(e) = self.reload().await {
            tracing::warn!("Failed to reload directory after deletion: {}", e);
            if let Some(listing) = self.current.as_mut() {
                listing.files.retain(|f| !removed.contains(&f.id));
            }
            self.selection.clear();
            summary.reload_error = Some(e.to_string());
        }
        summary
    }

    pub async fn upload(&mut self, file_name: &str, bytes: Vec<u8>) -> Result<Vec<MediaFile>, ClientError> {
        let stored = self.service.upload(self.current_id()?, file_name, bytes).await?;
        self.reload().await?;
        Ok(stored)
    }

    pub async fn create_directory(&mut self, name: &str) -> Result<Directory, ClientError> {
        let directory = self.service.create_directory(self.current_id()?, name).await?;
        self.reload().await?;
        Ok(directory)
    }

    pub async fn rename_directory(&mut self, id: Uuid, name: &str) -> Result<Directory, ClientError> {
        let directory = self.service.rename_directory(id, name).await?;
        self.reload().await?;
        Ok(directory)
    }

    pub async fn delete_directory(&mut self, id: Uuid) -> Result<(), ClientError> {
        self.service.delete_directory(id).await?;
        self.reload().await?;
        Ok(())
    }

    pub async fn rename_file(&mut self, id: Uuid, name: &str) -> Result<MediaFile, ClientError> {
        let file = self.service.rename_file(id, name).await?;
        self.reload().await?;
        Ok(file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    /// In-process stand-in for the server's media tree
    #[derive(Default)]
    struct FakeMedia {
        directories: Mutex<HashMap<Uuid, Directory>>,
        files: Mutex<HashMap<Uuid, MediaFile>>,
        undeletable: Mutex<BTreeSet<String>>,
        listing_unavailable: AtomicBool,
    }

    fn not_found(what: &str) -> ClientError {
        ClientError::Api {
            status: reqwest::StatusCode::NOT_FOUND,
            code: "NOT_FOUND".to_string(),
            message: format!("{} not found", what),
        }
    }

    impl FakeMedia {
        fn add_file(&self, directory: Uuid, name: &str) -> Uuid {
            let file = MediaFile {
                id: Uuid::new_v4(),
                name: name.to_string(),
                link: format!("media/{}", name),
                size: 1,
                mime_type: None,
                directory,
                created_at: Utc::now(),
            };
            let id = file.id;
            self.files.lock().unwrap().insert(id, file);
            id
        }

        fn listing(&self, directory: Directory) -> DirectoryListing {
            let subs = self
                .directories
                .lock()
                .unwrap()
                .values()
                .filter(|d| d.parent == Some(directory.id))
                .cloned()
                .collect();
            let files = self
                .files
                .lock()
                .unwrap()
                .values()
                .filter(|f| f.directory == directory.id)
                .cloned()
                .collect();
            // Deliberately unsorted; the browser sorts.
            DirectoryListing {
                directory,
                sub_directories: subs,
                files,
            }
        }
    }

    #[async_trait]
    impl MediaService for FakeMedia {
        async fn course_root(&self, course: &str) -> Result<DirectoryListing, ClientError> {
            let existing = self
                .directories
                .lock()
                .unwrap()
                .values()
                .find(|d| d.course_id.as_deref() == Some(course))
                .cloned();
            let root = match existing {
                Some(root) => root,
                None => {
                    let root = Directory::root(course);
                    self.directories.lock().unwrap().insert(root.id, root.clone());
                    root
                }
            };
            Ok(self.listing(root))
        }

        async fn directory(&self, id: Uuid) -> Result<DirectoryListing, ClientError> {
            if self.listing_unavailable.load(Ordering::SeqCst) {
                return Err(ClientError::Api {
                    status: reqwest::StatusCode::SERVICE_UNAVAILABLE,
                    code: "SERVICE_UNAVAILABLE".to_string(),
                    message: "Database temporarily unavailable".to_string(),
                });
            }
            let directory = self.directories.lock().unwrap().get(&id).cloned();
            directory.map(|d| self.listing(d)).ok_or_else(|| not_found("directory"))
        }

        async fn create_directory(&self, parent: Uuid, name: &str) -> Result<Directory, ClientError> {
            let directory = Directory::child(parent, name);
            self.directories.lock().unwrap().insert(directory.id, directory.clone());
            Ok(directory)
        }

        async fn rename_directory(&self, id: Uuid, name: &str) -> Result<Directory, ClientError> {
            let mut directories = self.directories.lock().unwrap();
            let directory = directories.get_mut(&id).ok_or_else(|| not_found("directory"))?;
            directory.name = name.to_string();
            Ok(directory.clone())
        }

        async fn delete_directory(&self, id: Uuid) -> Result<(), ClientError> {
            self.directories.lock().unwrap().remove(&id).map(|_| ()).ok_or_else(|| not_found("directory"))
        }

        async fn upload(&self, directory: Uuid, file_name: &str, _bytes: Vec<u8>) -> Result<Vec<MediaFile>, ClientError> {
            let id = self.add_file(directory, file_name);
            Ok(vec![self.files.lock().unwrap()[&id].clone()])
        }

        async fn rename_file(&self, id: Uuid, name: &str) -> Result<MediaFile, ClientError> {
            let mut files = self.files.lock().unwrap();
            let file = files.get_mut(&id).ok_or_else(|| not_found("file"))?;
            file.name = name.to_string();
            Ok(file.clone())
        }

        async fn delete_file(&self, id: Uuid) -> Result<(), ClientError> {
            let mut files = self.files.lock().unwrap();
            let name = files.get(&id).map(|f| f.name.clone()).ok_or_else(|| not_found("file"))?;
            if self.undeletable.lock().unwrap().contains(&name) {
                return Err(ClientError::Api {
                    status: reqwest::StatusCode::INTERNAL_SERVER_ERROR,
                    code: "INTERNAL_SERVER_ERROR".to_string(),
                    message: "disk failure".to_string(),
                });
            }
            files.remove(&id);
            Ok(())
        }
    }

    fn file_names(listing: &DirectoryListing) -> Vec<&str> {
        listing.files.iter().map(|f| f.name.as_str()).collect()
    }

    #[tokio::test]
    async fn listings_are_sorted_case_insensitively() {
        let mut browser = MediaBrowser::new(FakeMedia::default());
        let root = browser.open_course("course").await.unwrap().directory.id;
        for name in ["zeta.txt", "Alpha.txt", "beta.txt", "Gamma.txt"] {
            browser.service().add_file(root, name);
        }

        let listing = browser.reload().await.unwrap();
        assert_eq!(file_names(listing), vec!["Alpha.txt", "beta.txt", "Gamma.txt", "zeta.txt"]);
    }

    #[tokio::test]
    async fn partial_failure_names_only_failed_files() {
        let mut browser = MediaBrowser::new(FakeMedia::default());
        let root = browser.open_course("course").await.unwrap().directory.id;
        for name in ["a.pdf", "b.pdf", "c.pdf"] {
            browser.service().add_file(root, name);
        }
        browser.service().undeletable.lock().unwrap().insert("b.pdf".to_string());
        browser.reload().await.unwrap();

        browser.select_all();
        let summary = browser.delete_selected().await;

        assert!(!summary.is_complete());
        assert_eq!(summary.deleted, vec!["a.pdf", "c.pdf"]);
        assert_eq!(summary.failed.len(), 1);
        assert_eq!(summary.failed[0].name, "b.pdf");

        let notification = summary.notification().unwrap();
        assert!(notification.contains("b.pdf"));
        assert!(!notification.contains("a.pdf") && !notification.contains("c.pdf"));

        let listing = browser.current().unwrap();
        assert_eq!(file_names(listing), vec!["b.pdf"]);
        assert!(browser.selected().is_empty());
    }

    #[tokio::test]
    async fn complete_deletion_has_no_notification() {
        let mut browser = MediaBrowser::new(FakeMedia::default());
        let root = browser.open_course("course").await.unwrap().directory.id;
        let id = browser.service().add_file(root, "only.txt");
        browser.reload().await.unwrap();

        assert!(browser.toggle(id));
        let summary = browser.delete_selected().await;
        assert!(summary.is_complete());
        assert_eq!(summary.notification(), None);
    }

    #[tokio::test]
    async fn summary_survives_failed_reload() {
        let mut browser = MediaBrowser::new(FakeMedia::default());
        let root = browser.open_course("course").await.unwrap().directory.id;
        browser.service().add_file(root, "a.txt");
        browser.service().add_file(root, "keep.txt");
        browser.reload().await.unwrap();

        let target = browser.current().unwrap().files[0].id;
        assert!(browser.toggle(target));
        browser.service().listing_unavailable.store(true, Ordering::SeqCst);

        let summary = browser.delete_selected().await;
        assert_eq!(summary.deleted, vec!["a.txt"]);
        assert!(summary.is_complete());
        assert!(summary.reload_error.as_deref().is_some_and(|e| e.contains("unavailable")));
        assert_eq!(file_names(browser.current().unwrap()), vec!["keep.txt"]);
        assert!(browser.selected().is_empty());
    }

    #[tokio::test]
    async fn navigation_clears_selection_and_tracks_breadcrumbs() {
        let mut browser = MediaBrowser::new(FakeMedia::default());
        let root = browser.open_course("info-101").await.unwrap().directory.id;
        let file = browser.service().add_file(root, "syllabus.pdf");
        let week = browser.create_directory("Week 1").await.unwrap();

        assert!(browser.toggle(file));
        assert!(browser.is_selected(file));
        browser.open(week.id).await.unwrap();
        assert!(!browser.is_selected(file));
        assert_eq!(browser.breadcrumbs(), vec!["info-101", "Week 1"]);

        assert!(browser.up().await.unwrap());
        assert_eq!(browser.breadcrumbs(), vec!["info-101"]);
        assert!(!browser.up().await.unwrap());
    }

    #[tokio::test]
    async fn resume_restores_breadcrumbs() {
        let mut browser = MediaBrowser::new(FakeMedia::default());
        browser.open_course("info-101").await.unwrap();
        let week = browser.create_directory("Week 1").await.unwrap();
        browser.open(week.id).await.unwrap();
        let slides = browser.create_directory("Slides").await.unwrap();
        browser.open(slides.id).await.unwrap();
        let trail = browser.trail().to_vec();

        let mut later = MediaBrowser::new(browser.service);
        later.resume(trail, slides.id).await.unwrap();
        assert_eq!(later.breadcrumbs(), vec!["info-101", "Week 1", "Slides"]);
        assert!(later.up().await.unwrap());
        assert_eq!(later.breadcrumbs(), vec!["info-101", "Week 1"]);
    }

    #[tokio::test]
    async fn toggle_ignores_files_outside_current_directory() {
        let mut browser = MediaBrowser::new(FakeMedia::default());
        browser.open_course("course").await.unwrap();
        let id = Uuid::new_v4();
        assert!(!browser.toggle(id));
        assert!(!browser.is_selected(id));
    }
}
