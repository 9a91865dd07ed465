// src/cli.rs
use crate::backup;
use crate::config::{load_config, load_config_from, Config};
use crate::db::FileBackend;
use crate::error::{AppError, AppResult, BackupError};
use crate::generator::{generate_password, PasswordCriteria, MAX_PASSWORD_LENGTH};
use crate::lock::{AppLockGate, LockState, Pin, PinInput};
use crate::models::AccountRecord;
use crate::settings::{SettingsStore, TomlPreferences};
use crate::store::RecordStore;
use chrono::{Local, TimeZone};
use clap::{Parser, Subcommand};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

/// A local credential manager.
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
pub struct Cli {
    /// Use this config file instead of the one in the platform config directory
    #[clap(long, value_parser, global = true)]
    pub config: Option<PathBuf>,

    #[clap(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List accounts, optionally only those matching a search query
    List {
        /// Matches service name, login id or email (case-insensitive)
        query: Option<String>,
    },
    /// Show one account
    Show {
        id: i64,
        /// Print the password instead of masking it
        #[clap(long)]
        reveal: bool,
    },
    /// Add an account
    Add {
        #[clap(short, long)]
        service: String,
        #[clap(short, long, default_value = "")]
        login: String,
        #[clap(short, long, default_value = "")]
        email: String,
        /// Password to store; prompted for when neither this nor --generate is given
        #[clap(short, long, conflicts_with = "generate")]
        password: Option<String>,
        /// Store a freshly generated password
        #[clap(short, long)]
        generate: bool,
        #[clap(short, long, default_value = "")]
        note: String,
    },
    /// Edit an existing account; omitted fields keep their value
    Edit {
        id: i64,
        #[clap(short, long)]
        service: Option<String>,
        #[clap(short, long)]
        login: Option<String>,
        #[clap(short, long)]
        email: Option<String>,
        #[clap(short, long, conflicts_with = "generate")]
        password: Option<String>,
        #[clap(short, long)]
        generate: bool,
        #[clap(short, long)]
        note: Option<String>,
    },
    /// Delete an account
    Delete { id: i64 },
    /// Generate a random password
    Generate {
        #[clap(short, long)]
        length: Option<usize>,
        /// Include symbols (!@#$%^&*())
        #[clap(short, long)]
        symbols: bool,
    },
    /// Write all accounts to a JSON backup file
    Backup {
        /// Destination file (defaults to a timestamped name in the current directory)
        file: Option<PathBuf>,
    },
    /// Replace all accounts with the contents of a backup file
    Restore {
        file: PathBuf,
        /// Skip the confirmation prompt
        #[clap(short, long)]
        yes: bool,
    },
    /// Manage the PIN app lock
    Lock {
        #[clap(subcommand)]
        action: LockAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum LockAction {
    /// Show whether the app lock is on
    Status,
    /// Set or change the 6-digit PIN
    SetPin,
    /// Require the PIN before accessing accounts
    Enable,
    /// Stop asking for the PIN
    Disable,
}

struct Session {
    config: Config,
    records: RecordStore,
    settings: SettingsStore,
}

impl Session {
    async fn open(config: Config) -> AppResult<Self> {
        let database_path = config.database_path();
        let settings_path = config.settings_path();
        log::debug!("Database: {:?}, settings: {:?}", database_path, settings_path);
        let records = RecordStore::open(Arc::new(FileBackend::new(database_path))).await?;
        let settings = SettingsStore::open(Arc::new(TomlPreferences::new(settings_path))).await?;
        Ok(Session { config, records, settings })
    }

    /// Passes when the gate is open, otherwise asks for the PIN once.
    fn unlock(&self) -> AppResult<()> {
        let gate = AppLockGate::new(&self.settings);
        if !gate.is_locked() {
            return Ok(());
        }
        let pin = prompt_pin("Enter PIN: ")?;
        match gate.submit_pin(pin.as_str()) {
            LockState::Authenticated => Ok(()),
            LockState::Unauthenticated => Err(AppError::Locked("Incorrect PIN.".to_string())),
        }
    }
}

fn prompt_line(prompt: &str) -> AppResult<String> {
    print!("{}", prompt);
    io::stdout().flush().map_err(|e| {
        log::error!("Failed to flush stdout: {}", e);
        AppError::Cli(format!("Failed to flush stdout: {}", e))
    })?;
    let mut line = String::new();
    io::stdin().read_line(&mut line).map_err(|e| {
        log::error!("Failed to read from stdin: {}", e);
        AppError::Cli(format!("Failed to read input: {}", e))
    })?;
    Ok(line.trim().to_string())
}

fn confirm(prompt: &str) -> AppResult<bool> {
    Ok(prompt_line(&format!("{} (y/N): ", prompt))?.to_lowercase() == "y")
}

fn prompt_secret(prompt: &str) -> AppResult<String> {
    rpassword::prompt_password(prompt).map_err(|e| {
        log::error!("Failed to read secret input: {}", e);
        AppError::Cli(format!("Failed to read input: {}", e))
    })
}

fn prompt_pin(prompt: &str) -> AppResult<Pin> {
    let mut input = PinInput::new();
    input.push_str(&prompt_secret(prompt)?);
    Ok(input.submit()?)
}

fn mask(secret: &str) -> String {
    "*".repeat(secret.chars().count().min(12))
}

fn print_summary(records: &[AccountRecord]) {
    if records.is_empty() {
        println!("No accounts found.");
        return;
    }
    for record in records {
        println!(
            "{:>5}  {:<24} {:<20} {}",
            record.id, record.service_name, record.login_id, record.email
        );
    }
}

fn format_timestamp(millis: i64) -> String {
    Local
        .timestamp_millis_opt(millis)
        .single()
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| millis.to_string())
}

fn password_from_flags(password: Option<String>, generate: bool, criteria: &PasswordCriteria) -> Option<String> {
    if generate {
        let generated = generate_password(criteria);
        println!("Generated password: {}", generated);
        Some(generated)
    } else {
        password
    }
}

/// Handles the parsed CLI command.
pub async fn handle_cli_command(cli: Cli) -> AppResult<()> {
    log::debug!("Handling CLI command: {:?}", cli.command);
    let config = match &cli.config {
        Some(path) => load_config_from(path),
        None => load_config(),
    };
    let command = cli.command.unwrap_or(Commands::List { query: None });

    if let Commands::Generate { length, symbols } = command {
        let length = length.unwrap_or(config.generator.length);
        if length > MAX_PASSWORD_LENGTH {
            return Err(AppError::Cli(format!(
                "Password length may not exceed {}.",
                MAX_PASSWORD_LENGTH
            )));
        }
        let criteria = PasswordCriteria {
            length,
            include_symbols: symbols || config.generator.include_symbols,
        };
        println!("{}", generate_password(&criteria));
        return Ok(());
    }

    let session = Session::open(config).await?;

    if let Commands::Lock { action: LockAction::Status } = command {
        let enabled = session.settings.app_lock_enabled().get();
        let has_pin = session.settings.app_lock_pin().get().is_some();
        println!(
            "App lock: {} (PIN {})",
            if enabled { "enabled" } else { "disabled" },
            if has_pin { "set" } else { "not set" }
        );
        return Ok(());
    }

    session.unlock()?;

    match command {
        Commands::List { query } => {
            let records = match query.as_deref() {
                Some(q) => session.records.search(q).get(),
                None => session.records.list().get(),
            };
            print_summary(&records);
            log::info!("Listed {} accounts.", records.len());
        }
        Commands::Show { id, reveal } => {
            let record = session
                .records
                .get_by_id(id)
                .get()
                .ok_or_else(|| AppError::Cli(format!("No account with id {}.", id)))?;
            println!("Service:  {}", record.service_name);
            println!("Login ID: {}", record.login_id);
            println!("Email:    {}", record.email);
            println!(
                "Password: {}",
                if reveal { record.password.clone() } else { mask(&record.password) }
            );
            if !record.note.is_empty() {
                println!("Note:     {}", record.note);
            }
            println!("Created:  {}", format_timestamp(record.created_at));
            println!("Updated:  {}", format_timestamp(record.updated_at));
        }
        Commands::Add {
            service,
            login,
            email,
            password,
            generate,
            note,
        } => {
            let criteria = session.config.generator.criteria();
            let password = match password_from_flags(password, generate, &criteria) {
                Some(password) => password,
                None => prompt_secret("Password: ")?,
            };
            let id = session
                .records
                .insert(AccountRecord::new(service, login, email, password, note))
                .await?;
            println!("Added account {}.", id);
        }
        Commands::Edit {
            id,
            service,
            login,
            email,
            password,
            generate,
            note,
        } => {
            let mut record = session
                .records
                .get_by_id(id)
                .get()
                .ok_or_else(|| AppError::Cli(format!("No account with id {}.", id)))?;
            let criteria = session.config.generator.criteria();
            if let Some(service) = service {
                record.service_name = service;
            }
            if let Some(login) = login {
                record.login_id = login;
            }
            if let Some(email) = email {
                record.email = email;
            }
            if let Some(password) = password_from_flags(password, generate, &criteria) {
                record.password = password;
            }
            if let Some(note) = note {
                record.note = note;
            }
            if session.records.update(record).await? {
                println!("Updated account {}.", id);
            } else {
                println!("Account {} no longer exists.", id);
            }
        }
        Commands::Delete { id } => {
            if session.records.delete(id).await? {
                println!("Deleted account {}.", id);
            } else {
                println!("No account with id {}.", id);
            }
        }
        Commands::Backup { file } => {
            let file = file.unwrap_or_else(|| PathBuf::from(backup::suggested_file_name()));
            let mut sink = tokio::fs::File::create(&file).await.map_err(|e| {
                log::error!("Failed to create backup file {:?}: {}", file, e);
                BackupError::Io(e)
            })?;
            let count = backup::export_store(&session.records, &mut sink).await?;
            println!("Backed up {} accounts to {:?}.", count, file);
        }
        Commands::Restore { file, yes } => {
            let mut source = tokio::fs::File::open(&file).await.map_err(|e| {
                log::error!("Failed to open backup file {:?}: {}", file, e);
                BackupError::Io(e)
            })?;
            if !yes
                && !confirm(&format!(
                    "This deletes all {} stored accounts and replaces them with the backup. Continue?",
                    session.records.len()
                ))?
            {
                println!("Restore cancelled.");
                log::info!("Restore cancelled by user.");
                return Ok(());
            }
            let count = backup::restore_into(&session.records, &mut source).await?;
            println!("Restored {} accounts from {:?}.", count, file);
        }
        Commands::Lock { action } => match action {
            LockAction::SetPin => {
                let pin = prompt_pin("New 6-digit PIN: ")?;
                let again = prompt_pin("Confirm PIN: ")?;
                if pin != again {
                    log::warn!("PIN confirmation failed: PINs do not match.");
                    return Err(AppError::Cli("PINs do not match.".to_string()));
                }
                session.settings.set_app_lock_pin(&pin).await?;
                println!("PIN saved.");
            }
            LockAction::Enable => {
                if session.settings.app_lock_pin().get().is_none() {
                    return Err(AppError::Cli(
                        "Set a PIN first with `acctkeep lock set-pin`.".to_string(),
                    ));
                }
                session.settings.set_app_lock_enabled(true).await?;
                println!("App lock enabled.");
            }
            LockAction::Disable => {
                session.settings.set_app_lock_enabled(false).await?;
                println!("App lock disabled.");
            }
            LockAction::Status => {}
        },
        Commands::Generate { .. } => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing() {
        assert!(Cli::try_parse_from(["acctkeep", "list"]).is_ok());
        assert!(Cli::try_parse_from(["acctkeep", "list", "git"]).is_ok());
        assert!(Cli::try_parse_from(["acctkeep", "generate", "-l", "20", "-s"]).is_ok());
        assert!(Cli::try_parse_from(["acctkeep", "lock", "set-pin"]).is_ok());
        assert!(Cli::try_parse_from(["acctkeep", "restore", "b.json", "--yes"]).is_ok());
        assert!(Cli::try_parse_from(["acctkeep"]).is_ok());
    }

    #[test]
    fn test_password_and_generate_conflict() {
        let parsed = Cli::try_parse_from(["acctkeep", "add", "-s", "x", "-p", "pw", "-g"]);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_mask_hides_length_beyond_twelve() {
        assert_eq!(mask("abc"), "***");
        assert_eq!(mask(&"x".repeat(40)).len(), 12);
    }

    #[tokio::test]
    async fn test_generate_rejects_oversized_length() {
        let dir = tempfile::tempdir().unwrap();
        let cli = Cli::try_parse_from([
            "acctkeep",
            "--config",
            dir.path().join("c.toml").to_str().unwrap(),
            "generate",
            "-l",
            "101",
        ])
        .unwrap();
        assert!(matches!(handle_cli_command(cli).await, Err(AppError::Cli(_))));
    }
}
