//! asksql - ask questions of a PostgreSQL warehouse in plain language.

use ask_sql::audit::AuditLog;
use ask_sql::cli::{AskArgs, Cli, Command};
use ask_sql::config::Config;
use ask_sql::db::PostgresExecutor;
use ask_sql::error::Result;
use ask_sql::health;
use ask_sql::logging;
use ask_sql::output;
use ask_sql::pipeline::Pipeline;
use ask_sql::retrieval::ChromaIndex;
use ask_sql::safety::SqlValidator;
use std::path::Path;
use std::process::ExitCode;
use tracing::{error, info};

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();

    let cli = Cli::parse_args();

    let log_to_file = cli.log_to_file;
    if log_to_file {
        logging::init_file_logging();
    } else {
        logging::init_stderr_logging();
    }

    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(2),
        Err(e) => {
            error!("{}: {}", e.category(), e);
            if let Some(message) = output::format_fatal_error(&e, log_to_file) {
                eprint!("{message}");
            }
            ExitCode::FAILURE
        }
    }
}

/// Dispatches the subcommand. `Ok(false)` means the command ran but the answer was "no".
async fn run(cli: Cli) -> Result<bool> {
    let config_path = cli.config_path();

    match cli.command {
        Command::Ask(args) => {
            ask(&args, load_config(&config_path, Some(&args))?).await?;
            Ok(true)
        }
        Command::Validate { sql } => {
            let verdict = SqlValidator::new().check(&sql);
            print!("{}", output::format_verdict(&verdict));
            Ok(verdict.is_accepted())
        }
        Command::Check => {
            let config = load_config(&config_path, None)?;
            let checks = [
                health::check_database(
                    &PostgresExecutor::new(&config.database)?,
                    &config.database.display_string(),
                )
                .await,
                health::check_index(&ChromaIndex::new(&config.index)?).await,
            ];
            print!("{}", output::format_checks(&checks));
            Ok(checks.iter().all(|check| check.ok))
        }
        Command::Logs { limit, audit_log } => {
            let path = match audit_log {
                Some(path) => path,
                None => load_config(&config_path, None)?.audit.path,
            };
            let entries = AuditLog::new(path).tail(limit).await?;
            print!("{}", output::format_log_entries(&entries));
            Ok(true)
        }
    }
}

/// Loads the config file, applies command-line overrides, then environment defaults.
fn load_config(path: &Path, overrides: Option<&AskArgs>) -> Result<Config> {
    info!("Loading config from: {}", path.display());
    let mut config = Config::load_from_file(path)?;
    if let Some(args) = overrides {
        args.apply_overrides(&mut config)?;
    }
    config.apply_env_defaults();
    Ok(config)
}

async fn ask(args: &AskArgs, config: Config) -> Result<()> {
    info!("Database: {}", config.database.display_string());

    let pipeline = Pipeline::from_config(&config)?;
    let outcome = pipeline.run(&args.question_text()).await?;

    print!("{}", output::format_outcome(&outcome, args.show));
    Ok(())
}
