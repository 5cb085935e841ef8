use clap::Subcommand;
use serde_json::json;
use std::path::PathBuf;
use uuid::Uuid;

use crate::cli::config::{load_session, save_session, SessionConfig};
use crate::cli::utils::{human_size, output_json, output_success};
use crate::cli::OutputFormat;
use crate::client::{ApiClient, MediaBrowser};
use crate::database::models::DirectoryListing;

#[derive(Subcommand)]
pub enum MediaCommands {
    #[command(about = "List the current directory, or open a course root")]
    Ls {
        #[arg(long, help = "Course to open")]
        course: Option<String>,
    },

    #[command(about = "Change directory: a subdirectory name, '..' or '/'")]
    Cd {
        #[arg(help = "Target directory")]
        target: String,
    },

    #[command(about = "Delete files in the current directory")]
    Rm {
        #[arg(required = true, help = "File names")]
        names: Vec<String>,
    },

    #[command(about = "Upload files into the current directory")]
    Upload {
        #[arg(required = true, help = "Local files")]
        paths: Vec<PathBuf>,
    },

    #[command(about = "Create a subdirectory")]
    Mkdir {
        #[arg(help = "Directory name")]
        name: String,
    },

    #[command(about = "Rename a file or subdirectory of the current directory")]
    Rename {
        #[arg(help = "Current name")]
        from: String,
        #[arg(help = "New name")]
        to: String,
    },
}

pub async fn handle(cmd: MediaCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    let mut session = load_session()?;
    let mut browser = MediaBrowser::new(session.authenticated_client()?);

    match cmd {
        MediaCommands::Ls { course } => {
            if let Some(course) = course {
                session.media.course = Some(course);
                session.media.directory = None;
            }
            open_position(&mut browser, &session).await?;
        }
        MediaCommands::Cd { target } => {
            let listing = open_position(&mut browser, &session).await?.clone();
            match target.as_str() {
                "/" => {
                    browser.open_course(course_of(&session)?).await?;
                }
                ".." => {
                    if !browser.up().await? {
                        if let Some(parent) = listing.directory.parent {
                            browser.open(parent).await?;
                        }
                    }
                }
                name => {
                    browser.open(find_subdirectory(&listing, name)?).await?;
                }
            }
        }
        MediaCommands::Rm { names } => {
            let listing = open_position(&mut browser, &session).await?.clone();
            for name in &names {
                let id = find_file(&listing, name)?;
                browser.toggle(id);
            }
            let summary = browser.delete_selected().await;
            if let Some(notification) = summary.notification() {
                eprintln!("{}", notification);
            }
            if let Some(reason) = &summary.reload_error {
                eprintln!("Listing may be stale: {}", reason);
            }
            output_success(
                &output_format,
                &format!("Deleted {} file(s)", summary.deleted.len()),
                Some(json!({
                    "deleted": summary.deleted,
                    "failed": summary.failed.iter().map(|f| json!({ "name": f.name, "reason": f.reason })).collect::<Vec<_>>(),
                })),
            )?;
        }
        MediaCommands::Upload { paths } => {
            open_position(&mut browser, &session).await?;
            for path in paths {
                let bytes = tokio::fs::read(&path).await?;
                let file_name = path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .ok_or_else(|| anyhow::anyhow!("Invalid file name: {}", path.display()))?
                    .to_string();
                browser.upload(&file_name, bytes).await?;
                output_success(&output_format, &format!("Uploaded {}", file_name), None)?;
            }
        }
        MediaCommands::Mkdir { name } => {
            open_position(&mut browser, &session).await?;
            let directory = browser.create_directory(&name).await?;
            output_success(
                &output_format,
                &format!("Created directory {}", directory.name),
                Some(json!({ "id": directory.id })),
            )?;
        }
        MediaCommands::Rename { from, to } => {
            let listing = open_position(&mut browser, &session).await?.clone();
            if let Ok(id) = find_file(&listing, &from) {
                browser.rename_file(id, &to).await?;
            } else {
                let id = find_subdirectory(&listing, &from)?;
                browser.rename_directory(id, &to).await?;
            }
            output_success(&output_format, &format!("Renamed {} to {}", from, to), None)?;
        }
    }

    if let Some(listing) = browser.current() {
        session.media.directory = Some(listing.directory.id);
        session.media.trail = browser.trail().to_vec();
        print_listing(listing, &browser.breadcrumbs(), &output_format)?;
    }
    save_session(&session)?;
    Ok(())
}

fn course_of(session: &SessionConfig) -> anyhow::Result<&str> {
    session
        .media
        .course
        .as_deref()
        .ok_or_else(|| anyhow::anyhow!("No course selected. Run 'lms media ls --course <course>' first"))
}

async fn open_position<'a>(
    browser: &'a mut MediaBrowser<ApiClient>,
    session: &SessionConfig,
) -> anyhow::Result<&'a DirectoryListing> {
    let course = course_of(session)?;
    let listing = match session.media.directory {
        Some(id) => browser.resume(session.media.trail.clone(), id).await?,
        None => browser.open_course(course).await?,
    };
    Ok(listing)
}

fn find_subdirectory(listing: &DirectoryListing, name: &str) -> anyhow::Result<Uuid> {
    if let Ok(id) = name.parse::<Uuid>() {
        return Ok(id);
    }
    listing
        .sub_directories
        .iter()
        .find(|d| d.name.eq_ignore_ascii_case(name))
        .map(|d| d.id)
        .ok_or_else(|| anyhow::anyhow!("No directory named '{}'", name))
}

fn find_file(listing: &DirectoryListing, name: &str) -> anyhow::Result<Uuid> {
    listing
        .files
        .iter()
        .find(|f| f.name == name)
        .or_else(|| listing.files.iter().find(|f| f.name.eq_ignore_ascii_case(name)))
        .map(|f| f.id)
        .ok_or_else(|| anyhow::anyhow!("No file named '{}'", name))
}

fn print_listing(listing: &DirectoryListing, breadcrumbs: &[&str], output_format: &OutputFormat) -> anyhow::Result<()> {
    if let OutputFormat::Json = output_format {
        return output_json(listing);
    }

    println!("/{}", breadcrumbs.join("/"));
    for directory in &listing.sub_directories {
        println!("  {}/", directory.name);
    }
    for file in &listing.files {
        println!("  {:<40} {:>10}", file.name, human_size(file.size));
    }
    if listing.sub_directories.is_empty() && listing.files.is_empty() {
        println!("  (empty)");
    }
    Ok(())
}
