use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pmpd_client::{commands, Configuration, Connection, FailureResponse, Fields, Payload, Response};
use pmpd_core::{init_logging, AppDirs, Config, CredentialStore, ServerConfig};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Parser)]
#[command(name = "pmpd", version, about = "Send commands to a music player daemon")]
struct Cli {
    /// Daemon host (takes precedence over config)
    #[arg(long, global = true)]
    host: Option<String>,
    /// Daemon port (takes precedence over config)
    #[arg(long, global = true)]
    port: Option<u16>,
    /// Daemon password (takes precedence over config and keyring)
    #[arg(long, global = true)]
    password: Option<String>,
    /// Use this directory for config.toml and logs
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,
    /// Print replies as JSON
    #[arg(long, global = true)]
    json: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Send a raw command with optional arguments
    Send {
        command: String,
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        arguments: Vec<String>,
    },
    /// Show player status
    Status,
    /// Show the song that is playing
    Current,
    /// List the songs of a stored playlist
    Playlist { name: String },
    /// Manage the password kept in the OS keyring for this daemon
    #[command(subcommand)]
    Password(PasswordCommand),
    /// List command names the client knows about
    Commands,
}

#[derive(Debug, Subcommand)]
enum PasswordCommand {
    /// Store a password for the target daemon
    Set { password: String },
    /// Forget the stored password
    Clear,
}

#[derive(Debug, Error)]
enum CliError {
    #[error("ACK [{}@{}] {{{}}} {}", .0.error_code, .0.line_number, .0.command, .0.message)]
    Rejected(FailureResponse),
}

impl Command {
    /// The protocol request this subcommand stands for, if any.
    fn request(&self) -> Option<(&str, Vec<&str>)> {
        match self {
            Command::Send { command, arguments } => Some((
                command.as_str(),
                arguments.iter().map(String::as_str).collect(),
            )),
            Command::Status => Some((commands::STATUS, Vec::new())),
            Command::Current => Some((commands::CURRENT_SONG, Vec::new())),
            Command::Playlist { name } => Some((commands::LIST_PLAYLIST_INFO, vec![name.as_str()])),
            Command::Password(_) | Command::Commands => None,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let dirs = match &cli.config_dir {
        Some(root) => AppDirs::rooted_at(root),
        None => AppDirs::discover()?,
    };
    let config = Config::load_or_default(&dirs)?;
    let _logging = init_logging(&config.logging, &dirs)?;

    let server = server_config(&config, cli.host.as_deref(), cli.port);

    if let Command::Password(action) = &cli.command {
        let store = CredentialStore::new();
        match action {
            PasswordCommand::Set { password } => {
                store.store_password(&server.host, server.port, password)?;
                println!("Password stored for {}:{}", server.host, server.port);
            }
            PasswordCommand::Clear => {
                store.delete_password(&server.host, server.port)?;
                println!("Password cleared for {}:{}", server.host, server.port);
            }
        }
        return Ok(());
    }

    let Some((command, arguments)) = cli.command.request() else {
        for name in commands::ALL {
            println!("{name}");
        }
        return Ok(());
    };

    let configuration = configuration(&server, cli.password.as_deref());
    tracing::info!(server = %configuration, command, "sending command");

    let mut connection = Connection::new(configuration);
    let response = connection
        .open()
        .with_context(|| format!("could not open mpd://{}:{}", server.host, server.port))?
        .send(command, &arguments)?;
    connection.close();

    match response {
        Response::Success(success) => {
            if cli.json {
                println!("{}", serde_json::to_string_pretty(success.payload())?);
            } else {
                print!("{}", render_payload(success.payload()));
            }
            Ok(())
        }
        Response::Failure(failure) => {
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&failure)?);
            }
            Err(CliError::Rejected(failure).into())
        }
    }
}

fn server_config(config: &Config, host: Option<&str>, port: Option<u16>) -> ServerConfig {
    let mut server = config.server.clone();
    if let Some(host) = host {
        server.host = host.to_string();
    }
    if let Some(port) = port {
        server.port = port;
    }
    server
}

/// Flag first, then config.toml, then the keyring.
fn configuration(server: &ServerConfig, password: Option<&str>) -> Configuration {
    if password.is_some() || server.password.is_some() {
        return server.to_configuration(password);
    }
    let stored = CredentialStore::new()
        .find_password(&server.host, server.port)
        .unwrap_or_else(|err| {
            tracing::debug!(error = %err, "keyring lookup failed, continuing without password");
            None
        });
    server.to_configuration(stored.as_deref())
}

fn render_payload(payload: &Payload) -> String {
    match payload {
        Payload::Fields(fields) => render_fields(fields),
        Payload::Records(records) => records
            .iter()
            .map(render_fields)
            .collect::<Vec<_>>()
            .join("\n"),
    }
}

fn render_fields(fields: &Fields) -> String {
    let mut out = String::new();
    for (key, value) in fields {
        for item in value.values() {
            out.push_str(key);
            out.push_str(": ");
            out.push_str(item);
            out.push('\n');
        }
    }
    out
}
