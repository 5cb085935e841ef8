mod common;

use anyhow::Result;
use reqwest::{Method, StatusCode};
use serde_json::json;

use common::TestServer;
use lms_api::client::{MediaBrowser, MediaService};

#[tokio::test]
async fn course_root_is_created_lazily_once() -> Result<()> {
    let server = TestServer::start().await?;
    let student = server.client_for(&server.accounts.student).await?;

    let first = student.course_root("info-101").await?;
    let second = student.course_root("info-101").await?;
    assert_eq!(first.directory.id, second.directory.id);
    assert_eq!(first.directory.name, "info-101");
    assert!(first.files.is_empty() && first.sub_directories.is_empty());
    Ok(())
}

#[tokio::test]
async fn listings_are_sorted_case_insensitively() -> Result<()> {
    let server = TestServer::start().await?;
    let teacher = server.client_for(&server.accounts.teacher).await?;
    let root = teacher.course_root("sorting").await?.directory.id;

    for name in ["zeta", "Alpha", "beta"] {
        teacher.create_directory(root, name).await?;
    }
    for name in ["Notes.txt", "agenda.txt", "Zoo.txt", "minutes.txt"] {
        teacher.upload(root, name, name.as_bytes().to_vec()).await?;
    }

    let listing = teacher.directory(root).await?;
    let directories: Vec<_> = listing.sub_directories.iter().map(|d| d.name.as_str()).collect();
    let files: Vec<_> = listing.files.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(directories, vec!["Alpha", "beta", "zeta"]);
    assert_eq!(files, vec!["agenda.txt", "minutes.txt", "Notes.txt", "Zoo.txt"]);
    Ok(())
}

#[tokio::test]
async fn students_can_read_but_not_write() -> Result<()> {
    let server = TestServer::start().await?;
    let token = server.token_for(&server.accounts.student).await?;
    let (status, body) = server.send(Method::GET, "/api/media/course/bio", Some(&token), None).await?;
    assert_eq!(status, StatusCode::OK);
    let root = body["data"]["_id"].as_str().unwrap_or_default().to_string();

    let (status, _) = server
        .send(
            Method::POST,
            &format!("/api/media/directory/{}", root),
            Some(&token),
            Some(json!({ "name": "mine" })),
        )
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    Ok(())
}

#[tokio::test]
async fn uploads_are_stored_served_and_removed() -> Result<()> {
    let server = TestServer::start().await?;
    let tutor = server.client_for(&server.accounts.tutor).await?;
    let root = tutor.course_root("chem").await?.directory.id;

    let stored = tutor.upload(root, "Lab Report.PDF", b"%PDF-1.4".to_vec()).await?;
    assert_eq!(stored.len(), 1);
    let file = &stored[0];
    assert_eq!(file.name, "Lab Report.PDF");
    assert!(file.link.starts_with("media/") && file.link.ends_with(".pdf"));

    let served = reqwest::get(server.url(&format!("/uploads/{}", file.link))).await?;
    assert_eq!(served.status(), StatusCode::OK);
    assert_eq!(served.bytes().await?.as_ref(), b"%PDF-1.4");

    let renamed = tutor.rename_file(file.id, "Final.pdf").await?;
    assert_eq!(renamed.name, "Final.pdf");

    tutor.delete_file(file.id).await?;
    assert!(!server.state.uploads.resolve(&file.link).exists());
    assert!(tutor.directory(root).await?.files.is_empty());
    Ok(())
}

#[tokio::test]
async fn directories_can_be_renamed_and_deleted_but_not_roots() -> Result<()> {
    let server = TestServer::start().await?;
    let teacher = server.client_for(&server.accounts.teacher).await?;
    let root = teacher.course_root("hist").await?.directory.id;

    let week = teacher.create_directory(root, "week 1").await?;
    let nested = teacher.create_directory(week.id, "slides").await?;
    let stored = teacher.upload(nested.id, "deck.txt", b"deck".to_vec()).await?;

    let renamed = teacher.rename_directory(week.id, "Week 1").await?;
    assert_eq!(renamed.name, "Week 1");

    teacher.delete_directory(week.id).await?;
    assert!(teacher.directory(root).await?.sub_directories.is_empty());
    assert_eq!(
        teacher.directory(nested.id).await.err().and_then(|e| e.status()),
        Some(StatusCode::NOT_FOUND)
    );
    assert!(!server.state.uploads.resolve(&stored[0].link).exists());

    let err = teacher.delete_directory(root).await.err().and_then(|e| e.status());
    assert_eq!(err, Some(StatusCode::BAD_REQUEST));
    Ok(())
}

#[tokio::test]
async fn invalid_names_and_courses_are_rejected() -> Result<()> {
    let server = TestServer::start().await?;
    let teacher = server.client_for(&server.accounts.teacher).await?;
    let root = teacher.course_root("c1").await?.directory.id;

    for name in ["", "   ", "a/b"] {
        let status = teacher.create_directory(root, name).await.err().and_then(|e| e.status());
        assert_eq!(status, Some(StatusCode::BAD_REQUEST), "{:?}", name);
    }

    let token = server.token_for(&server.accounts.teacher).await?;
    let (status, _) = server.send(Method::GET, "/api/media/course/bad%20course", Some(&token), None).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn browser_bulk_delete_against_live_server() -> Result<()> {
    let server = TestServer::start().await?;
    let teacher = server.client_for(&server.accounts.teacher).await?;
    let mut browser = MediaBrowser::new(teacher);

    browser.open_course("live").await?;
    for name in ["b.txt", "A.txt", "c.txt"] {
        browser.upload(name, name.as_bytes().to_vec()).await?;
    }
    let names: Vec<_> = browser
        .current()
        .map(|l| l.files.iter().map(|f| f.name.clone()).collect())
        .unwrap_or_default();
    assert_eq!(names, vec!["A.txt", "b.txt", "c.txt"]);

    // Remove one file behind the browser's back so its deletion fails.
    let listing = browser.current().cloned().expect("open listing");
    let vanished = listing.files[1].clone();
    browser.service().delete_file(vanished.id).await?;

    browser.select_all();
    let summary = browser.delete_selected().await;
    assert_eq!(summary.deleted, vec!["A.txt", "c.txt"]);
    assert_eq!(summary.failed.len(), 1);
    let notification = summary.notification().unwrap_or_default();
    assert!(notification.contains("b.txt"));
    assert!(!notification.contains("A.txt"));
    assert!(browser.current().is_some_and(|l| l.files.is_empty()));
    Ok(())
}
