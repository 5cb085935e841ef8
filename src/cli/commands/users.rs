use clap::Subcommand;
use serde_json::json;
use uuid::Uuid;

use crate::cli::config::load_session;
use crate::cli::utils::{output_empty_collection, output_json, output_success, user_line};
use crate::cli::OutputFormat;
use crate::types::Role;

#[derive(Subcommand)]
pub enum UsersCommands {
    #[command(about = "List all users (teacher, admin)")]
    List,

    #[command(about = "Show one user")]
    Get {
        #[arg(help = "User id")]
        id: Uuid,
    },

    #[command(about = "Search members of a role by name, email or uid")]
    Search {
        #[arg(help = "Role to search within")]
        role: Role,
        #[arg(help = "Search text")]
        query: String,
        #[arg(long, help = "Maximum number of results")]
        limit: Option<u32>,
    },

    #[command(about = "List assignable roles")]
    Roles,

    #[command(about = "Delete a user (admin)")]
    Delete {
        #[arg(help = "User id")]
        id: Uuid,
    },
}

pub async fn handle(cmd: UsersCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    let client = load_session()?.authenticated_client()?;

    match cmd {
        UsersCommands::List => {
            let users = client.list_users().await?;
            if users.is_empty() {
                return output_empty_collection(&output_format, "users", "No users found");
            }
            match output_format {
                OutputFormat::Json => output_json(&users),
                OutputFormat::Text => {
                    users.iter().for_each(|u| println!("{}", user_line(u)));
                    Ok(())
                }
            }
        }
        UsersCommands::Get { id } => {
            let user = client.get_user(id).await?;
            match output_format {
                OutputFormat::Json => output_json(&user),
                OutputFormat::Text => {
                    println!("{}", user_line(&user));
                    Ok(())
                }
            }
        }
        UsersCommands::Search { role, query, limit } => {
            let result = client.search_users(role, &query, limit).await?;
            match output_format {
                OutputFormat::Json => output_json(&result),
                OutputFormat::Text => {
                    println!("{} of {} {}s match '{}'", result.users.len(), result.meta.count, role, query);
                    result.users.iter().for_each(|u| println!("{}", user_line(u)));
                    Ok(())
                }
            }
        }
        UsersCommands::Roles => {
            let roles = client.roles().await?;
            match output_format {
                OutputFormat::Json => output_json(&roles),
                OutputFormat::Text => {
                    roles.iter().for_each(|r| println!("{}", r));
                    Ok(())
                }
            }
        }
        UsersCommands::Delete { id } => {
            client.delete_user(id).await?;
            output_success(&output_format, &format!("User {} deleted", id), Some(json!({ "id": id })))
        }
    }
}
