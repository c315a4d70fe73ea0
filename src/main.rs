use std::{
    path::{Path, PathBuf},
    process::ExitCode,
    sync::Arc,
};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use desk365::{
    audit::{AuditStore, SqliteAuditStore},
    config::load_config,
    executor::{print_audit_records, print_outcome, Fields},
    ApiConfig, Attachments, Desk365, FileInput, Method,
};
use serde_json::Value;
use tracing_subscriber::EnvFilter;

const DEFAULT_AUDIT_DB: &str = "desk365-audit.sqlite";

#[derive(Parser, Debug)]
#[command(
    name = "desk365",
    version,
    about = "Audited Desk365 API client",
    disable_help_subcommand = true
)]
struct Cli {
    /// JSON config file, or a directory containing desk365.json
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// SQLite database holding the audit trail
    #[arg(long, global = true, env = "DESK365_AUDIT_DB")]
    audit_db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Send one request and print the normalized outcome
    Call {
        /// HTTP method (GET, POST, PUT, PATCH, DELETE)
        #[arg(value_name = "METHOD")]
        method: String,
        /// Resource path under the API version, e.g. tickets/42
        #[arg(value_name = "PATH")]
        path: String,
        /// Query parameter as key=value
        #[arg(short = 'q', long = "query")]
        query: Vec<String>,
        /// Body field as key=value
        #[arg(short = 'd', long = "data")]
        data: Vec<String>,
        /// Local file to attach (repeatable)
        #[arg(short = 'f', long = "file")]
        files: Vec<PathBuf>,
        /// Operation label stored with the audit record
        #[arg(long, default_value = "cliCall")]
        operation: String,
    },
    /// Show recent audit records
    Audit {
        /// Number of rows to show
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
        /// Only rows for this operation
        #[arg(long)]
        operation: Option<String>,
        /// Create the audit table and exit
        #[arg(long)]
        init: bool,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let audit_db = cli
        .audit_db
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_AUDIT_DB));

    match cli.command {
        Commands::Call {
            method,
            path,
            query,
            data,
            files,
            operation,
        } => {
            let config = resolve_config(cli.config.as_deref())?;
            let store = SqliteAuditStore::open(&audit_db)
                .with_context(|| format!("opening audit database {}", audit_db.display()))?;
            let client = Desk365::with_audit_store(config, Arc::new(store));

            let method: Method = method.parse()?;
            let query = parse_pairs(&query)?;
            let query: Vec<(&str, String)> =
                query.iter().map(|(k, v)| (k.as_str(), v.clone())).collect();
            let fields: Fields = parse_pairs(&data)?
                .into_iter()
                .map(|(k, v)| (k, Value::String(v)))
                .collect();
            let url = if files.is_empty() {
                client.request_url(method, &path, &query, &fields)
            } else {
                client.endpoint(&path, &query)
            };

            let outcome = if files.is_empty() {
                client
                    .send(method, &path, &query, fields, &operation, "call API")
                    .await
            } else {
                client
                    .upload(
                        method,
                        &path,
                        &query,
                        fields,
                        attachments_for(files),
                        &operation,
                        "call API",
                    )
                    .await
            };

            print_outcome(method, &url, &outcome);
            Ok(if outcome.is_success() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Commands::Audit {
            limit,
            operation,
            init,
        } => {
            let store = SqliteAuditStore::open(&audit_db)
                .with_context(|| format!("opening audit database {}", audit_db.display()))?;

            if init {
                store.migrate().context("creating audit table")?;
                println!("Audit table ready in {}", audit_db.display());
                return Ok(ExitCode::SUCCESS);
            }

            if !store.is_provisioned()? {
                bail!(
                    "audit table missing in {}; run `desk365 audit --init` first",
                    audit_db.display()
                );
            }

            let records = store.recent(limit, operation.as_deref())?;
            print_audit_records(&records);
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn resolve_config(explicit: Option<&Path>) -> Result<ApiConfig> {
    if let Some(target) = explicit {
        return load_config(target)
            .context("loading configuration")?
            .map(|loaded| loaded.config)
            .with_context(|| format!("no configuration found at {}", target.display()));
    }

    let cwd = std::env::current_dir()?;
    if let Some(loaded) = load_config(&cwd).context("loading configuration")? {
        return Ok(loaded.config);
    }
    ApiConfig::from_env()
}

fn attachments_for(files: Vec<PathBuf>) -> Attachments {
    let mut inputs: Vec<FileInput> = files.into_iter().map(FileInput::Path).collect();
    if inputs.len() == 1 {
        Attachments::One(inputs.remove(0))
    } else {
        Attachments::Many(inputs)
    }
}

fn parse_pairs(values: &[String]) -> Result<Vec<(String, String)>> {
    values
        .iter()
        .map(|raw| match raw.split_once('=') {
            Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
            _ => bail!("expected key=value, got {raw:?}"),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_pairs_splits_on_first_equals() -> Result<()> {
        let pairs = parse_pairs(&["subject=a=b".to_string(), "empty=".to_string()])?;
        assert_eq!(
            pairs,
            vec![
                ("subject".to_string(), "a=b".to_string()),
                ("empty".to_string(), String::new()),
            ]
        );
        Ok(())
    }

    #[test]
    fn parse_pairs_rejects_missing_key() {
        assert!(parse_pairs(&["novalue".to_string()]).is_err());
        assert!(parse_pairs(&["=value".to_string()]).is_err());
    }

    #[test]
    fn attachments_for_single_file_is_one() {
        let single = attachments_for(vec![PathBuf::from("a.txt")]);
        assert!(matches!(single, Attachments::One(_)));

        let many = attachments_for(vec![PathBuf::from("a.txt"), PathBuf::from("b.txt")]);
        assert_eq!(many.field_name(), "files");
    }

    #[test]
    fn cli_parses_call_arguments() {
        let cli = Cli::parse_from([
            "desk365", "call", "post", "tickets/create", "-d", "subject=Hi", "-f", "log.txt",
            "--operation", "createTicket",
        ]);
        match cli.command {
            Commands::Call {
                method,
                data,
                files,
                operation,
                ..
            } => {
                assert_eq!(method, "post");
                assert_eq!(data, vec!["subject=Hi".to_string()]);
                assert_eq!(files, vec![PathBuf::from("log.txt")]);
                assert_eq!(operation, "createTicket");
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
