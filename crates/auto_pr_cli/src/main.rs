use std::path::PathBuf;

use auto_pr_core::{
    AutoPrCreator, LayeredSecretResolver, RunMode, RunOptions, RunOutcome, DEFAULT_CONFIG_PATH,
};
use clap::{Parser, ValueEnum};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter, Registry};

mod errors;
use errors::Error;

#[cfg(test)]
#[path = "main_tests.rs"]
mod tests;

/// Environment variable holding an explicit log filter.
const LOG_ENV_VAR: &str = "AUTO_PR_LOG";

/// Auto PR: push automated changes and open, label and merge a pull request for them
#[derive(Parser, Debug)]
#[command(name = "auto-pr", version)]
#[command(
    about = "Create, label and merge automated GitHub pull requests",
    long_about = None
)]
struct Cli {
    /// Log what would happen without changing anything
    #[arg(long)]
    dry_run: bool,

    /// Path to the JSON configuration file
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    /// How the branch content is produced
    #[arg(long, value_enum, default_value_t = ModeArg::Single)]
    mode: ModeArg,

    /// Optional dotenv file with GITHUB_TOKEN, DISCORD_WEBHOOK and SLACK_WEBHOOK
    #[arg(long, default_value = ".env")]
    env_file: PathBuf,

    /// Commits made by each simulated collaborator (collaborator mode only)
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    commits_per_collaborator: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ModeArg {
    Single,
    Collaborator,
}

impl From<ModeArg> for RunMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Single => RunMode::Single,
            ModeArg::Collaborator => RunMode::Collaborator,
        }
    }
}

impl Cli {
    fn run_options(&self) -> Result<RunOptions, Error> {
        let mode = RunMode::from(self.mode);
        if self.commits_per_collaborator.is_some() && mode != RunMode::Collaborator {
            return Err(Error::InvalidArguments(
                "--commits-per-collaborator requires --mode collaborator".to_string(),
            ));
        }

        Ok(RunOptions {
            mode,
            dry_run: self.dry_run,
            commits_per_collaborator: self.commits_per_collaborator,
        })
    }

    fn log_settings(&self) -> LogSettings {
        LogSettings {
            verbose: self.verbose,
            env_filter: std::env::var(LOG_ENV_VAR).ok(),
        }
    }
}

/// Logging setup for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct LogSettings {
    verbose: bool,
    /// Filter directives from the environment. `--verbose` takes precedence.
    env_filter: Option<String>,
}

impl LogSettings {
    fn filter_directives(&self) -> String {
        if self.verbose {
            return "debug".to_string();
        }
        match &self.env_filter {
            Some(directives) if !directives.trim().is_empty() => directives.clone(),
            _ => "info".to_string(),
        }
    }

    fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_new(self.filter_directives()).unwrap_or_else(|_| EnvFilter::new("info"))
    }

    fn subscriber(&self) -> impl tracing::Subscriber + Send + Sync {
        Registry::default()
            .with(fmt::layer().with_target(false))
            .with(self.env_filter())
    }
}

async fn run(cli: &Cli) -> Result<RunOutcome, Error> {
    let options = cli.run_options()?;
    let resolver = LayeredSecretResolver::environment_with_file(&cli.env_file);
    let creator = AutoPrCreator::initialize(&cli.config, &resolver)?;
    Ok(creator.run(&options).await)
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let subscriber = cli.log_settings().subscriber();
    let _guard = tracing::subscriber::set_default(subscriber);

    let code = match run(&cli).await {
        Ok(outcome) => {
            match &outcome {
                RunOutcome::Completed { pull_request } => {
                    info!(
                        number = pull_request.number,
                        url = pull_request.html_url.as_str(),
                        "Auto PR completed"
                    );
                }
                RunOutcome::DryRun { branch } => {
                    info!(branch = branch.as_str(), "Dry run completed");
                }
                RunOutcome::NothingToDo => {
                    error!("Nothing to do: no files configured to modify");
                }
                RunOutcome::Failed(e) => {
                    error!("Auto PR failed: {e}");
                }
            }
            outcome.exit_code()
        }
        Err(e) => {
            error!("{e}");
            1
        }
    };

    std::process::exit(code);
}
