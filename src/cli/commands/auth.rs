use chrono::Utc;
use clap::Subcommand;
use serde_json::json;

use crate::cli::config::{load_session, save_session};
use crate::cli::utils::{output_json, output_success, resolve_password, user_line};
use crate::cli::OutputFormat;
use crate::client::ApiClient;

#[derive(Subcommand)]
pub enum AuthCommands {
    #[command(about = "Login with email or directory uid")]
    Login {
        #[arg(help = "Email address or uid")]
        login: String,
        #[arg(long, help = "Password (LMS_PASSWORD or prompt if not provided)")]
        password: Option<String>,
        #[arg(long, help = "Server URL, remembered for later commands")]
        server: Option<String>,
    },

    #[command(about = "Forget the stored token")]
    Logout,

    #[command(about = "Show current user information")]
    Whoami,
}

pub async fn handle(cmd: AuthCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    let mut session = load_session()?;

    match cmd {
        AuthCommands::Login { login, password, server } => {
            if let Some(server) = server {
                session.server = server;
            }
            let password = resolve_password(password)?;

            let mut client = ApiClient::new(&session.server)?;
            let response = client.login(&login, &password).await?;

            session.clear_login();
            session.token = Some(response.token);
            session.login = Some(login);
            session.logged_in_at = Some(Utc::now());
            save_session(&session)?;

            output_success(
                &output_format,
                &format!("Logged in as {} ({})", response.user.email, response.user.role),
                Some(json!({ "user": response.user })),
            )
        }
        AuthCommands::Logout => {
            session.clear_login();
            save_session(&session)?;
            output_success(&output_format, "Logged out", None)
        }
        AuthCommands::Whoami => {
            let user = session.authenticated_client()?.whoami().await?;
            match output_format {
                OutputFormat::Json => output_json(&user),
                OutputFormat::Text => {
                    println!("{}", user_line(&user));
                    Ok(())
                }
            }
        }
    }
}
