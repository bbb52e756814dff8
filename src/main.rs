use anyhow::{bail, Context, Result};
use chrono::{Duration, Utc};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use shareflow::api::{decode_claims, Access, ApiClient};
use shareflow::config::ClientConfig;
use shareflow::session::{FileSetManager, TracingObserver};

#[derive(Parser)]
#[command(name = "shareflow", version, about = "Upload, share and download files")]
struct Cli {
    /// JSON config file. Without it, SHAREFLOW_* environment variables are used
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Access token for authenticated requests
    #[arg(long, env = "SHAREFLOW_TOKEN", global = true, hide_env_values = true)]
    token: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Log in and print the access token
    Login {
        username: String,
        #[arg(long, env = "SHAREFLOW_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Upload files, to your own space or to a shared folder
    Upload {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        #[arg(long)]
        folder_id: Option<String>,
    },
    /// Manage shared folders
    #[command(subcommand)]
    Share(ShareCommand),
    /// Download one file, or the whole folder as a zip
    Download {
        folder_id: String,
        #[arg(long)]
        file: Option<String>,
        #[arg(long)]
        out: PathBuf,
    },
    /// Print the claims carried by an access token
    Claims { token: String },
}

#[derive(Subcommand)]
enum ShareCommand {
    /// Create a shared folder protected by a one-time password
    Create {
        folder_name: String,
        #[arg(long)]
        otp: String,
        #[arg(long, default_value = "rw")]
        access: Access,
        #[arg(long, default_value_t = 24)]
        expires_in_hours: i64,
    },
    /// Unlock a shared folder link and print its access token
    Auth {
        link_url: String,
        #[arg(long)]
        otp: String,
    },
    /// List the files in a shared folder
    List { folder_id: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    shareflow::metrics::init_metrics();

    let cli = Cli::parse();

    run(cli.command, cli.config.as_deref(), cli.token).await
}

async fn run(command: Command, config_path: Option<&Path>, token: Option<String>) -> Result<()> {
    // Offline; no config needed.
    if let Command::Claims { token } = &command {
        let claims = decode_claims(token).context("token does not carry valid claims")?;
        println!("{}", serde_json::to_string_pretty(&claims)?);
        return Ok(());
    }

    let config = match config_path {
        Some(path) => ClientConfig::from_json_file(path)?,
        None => ClientConfig::from_env()?,
    };
    config.validate()?;

    let api = ApiClient::new(&config)?;
    if let Some(token) = token {
        api.tokens().set(token);
    }

    match command {
        Command::Login { username, password } => {
            let token = api.login(&username, &password).await?;
            println!("{}", token.access_token);
        }
        Command::Upload { paths, folder_id } => {
            upload(&config, &api, paths, folder_id.as_deref()).await?;
        }
        Command::Share(ShareCommand::Create {
            folder_name,
            otp,
            access,
            expires_in_hours,
        }) => {
            let expiration = Utc::now() + Duration::hours(expires_in_hours);
            let share = api.create_share(access, &folder_name, &otp, expiration).await?;
            println!("link:      {}", share.link_url);
            println!("folder id: {}", share.folder_id);
        }
        Command::Share(ShareCommand::Auth { link_url, otp }) => {
            let auth = api.authenticate_share(&link_url, &otp).await?;
            println!("folder id: {}", auth.folder_id);
            println!("token:     {}", auth.access_token);
        }
        Command::Share(ShareCommand::List { folder_id }) => {
            for file in api.list_shared_files(&folder_id).await? {
                println!("{:>12}  {}", file.file_size, file.display_name());
            }
        }
        Command::Download {
            folder_id,
            file,
            out,
        } => {
            let written = match file {
                Some(file) => api.download_file_to(&folder_id, &file, &out).await?,
                None => {
                    let data = api.download_zip(&folder_id).await?;
                    tokio::fs::write(&out, &data).await?;
                    data.len() as u64
                }
            };
            println!("{} bytes written to {}", written, out.display());
        }
        Command::Claims { .. } => {}
    }

    Ok(())
}

async fn upload(
    config: &ClientConfig,
    api: &ApiClient,
    paths: Vec<PathBuf>,
    folder_id: Option<&str>,
) -> Result<()> {
    let transport = Arc::new(api.chunk_transport());
    let manager = FileSetManager::from_config(config, transport, Arc::new(TracingObserver))?;

    for path in &paths {
        manager
            .add_path(path)
            .await
            .with_context(|| format!("cannot stage {}", path.display()))?;
    }
    manager.wait_for_hashes().await;

    if !manager.is_ready() {
        bail!("some files could not be prepared for upload");
    }

    let summary = manager.upload_files(folder_id).await?;
    println!(
        "{} uploaded, {} failed, {}/{} bytes ({:.1}%)",
        summary.uploaded.len(),
        summary.failed.len(),
        summary.bytes_sent,
        summary.bytes_total,
        summary.progress_percent
    );
    for (file_id, error) in &summary.failed {
        println!("  {file_id}: {error}");
    }

    if !summary.is_complete() {
        bail!("upload incomplete");
    }
    Ok(())
}
