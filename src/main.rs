/// envgate
use clap::{Args, Parser, Subcommand};
use log::{error, info, warn};
use thiserror::Error;
use envgate::config::runtime::SecretsBackend;
use envgate::keyvault::KeyVault;
use envgate::output::{self, Format};
use envgate::resolver::{self, Failure, FailureKind, ResolutionResult};
use envgate::secrets::{EnvSecrets, StaticSecrets};
use envgate::trigger::{self, EventKind, TriggerContext};
use envgate::{audit, config};

/// Decide where this pipeline run deploys, and hand the answer to the steps that follow.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Root of the repository.
    #[arg(default_value = ".")]
    source_directory: String,

    /// Path to the envgate configuration file.
    #[arg(long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Resolve the target environment and its infrastructure coordinates.
    Resolve(ResolveArgs),
    /// Print the configured environments.
    Profiles,
    /// Validate the configuration and exit.
    Check,
}

#[derive(Debug, Args)]
struct ResolveArgs {
    /// Git ref to resolve. Without it, the trigger is read from the GitHub Actions environment.
    #[arg(long = "ref")]
    git_ref: Option<String>,

    #[arg(long, value_enum)]
    event: Option<EventKind>,

    /// Requested environment, as given to a manual dispatch.
    #[arg(long)]
    environment: Option<String>,

    /// Skip branch validation and deploy to `--environment`.
    #[arg(long)]
    override_validation: bool,

    /// Justification, required when overriding into production.
    #[arg(long)]
    override_notes: Option<String>,

    #[arg(long)]
    actor: Option<String>,

    #[arg(long, value_enum, default_value_t = Format::Github)]
    format: Format,
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("configuration file: {0}")]
    ConfigParse(#[from] config::file::Error),

    #[error("configuration: {0}")]
    Config(#[from] config::runtime::Error),

    #[error("trigger: {0}")]
    Trigger(#[from] trigger::Error),

    #[error("output: {0}")]
    Output(#[from] output::Error),

    #[error("yaml: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("{0}")]
    Resolution(Failure),
}

/// Read configuration file from disk and merge it with the
/// `default.toml` built-in config.
///
/// If a configuration file name is not set explicitly, `envgate.toml` in the
/// source directory is used when it exists.
fn read_config(args: &Cli) -> Result<config::file::File, Error> {
    const DEFAULT_CONFIG_FILE: &str = "envgate.toml";

    let config_path = format!("{}/{}", args.source_directory, DEFAULT_CONFIG_FILE);

    let config_file = match &args.config {
        None => {
            if std::fs::metadata(&config_path)
                .map(|metadata| metadata.is_file())
                .unwrap_or(false)
            {
                Some(config_path)
            } else {
                None
            }
        }
        Some(c) => Some(c.clone()),
    };

    Ok(if let Some(config_file) = config_file {
        info!("Using configuration file {config_file}");
        config::file::File::default_with_user_config_file(&config_file)?
    } else {
        config::file::File::default()
    })
}

#[tokio::main]
async fn main() {
    match run().await {
        Ok(_) => std::process::exit(0),
        Err(err) => {
            error!("fatal: {}", err);
            std::process::exit(1)
        }
    }
}

async fn run() -> Result<(), Error> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Cli::parse();
    let cfg_file = read_config(&args)?;
    let cfg = config::runtime::Config::new(&cfg_file)?;

    match args.command {
        Commands::Check => {
            info!("Configuration is valid: {} environments", cfg.profiles.iter().count());
            Ok(())
        }
        Commands::Profiles => {
            print!("{}", serde_yaml::to_string(&cfg.profiles)?);
            Ok(())
        }
        Commands::Resolve(resolve_args) => {
            let context = trigger_context(&resolve_args)?;
            let result = resolve(&context, &cfg).await;

            audit::log(result.audit_record());
            let github_output = std::env::var("GITHUB_OUTPUT").ok().filter(|path| !path.is_empty());
            let audit_log = cfg.audit_path.as_ref().map(audit::AuditLog::new);
            output::publish(
                &result,
                resolve_args.format,
                github_output.as_deref(),
                audit_log.as_ref(),
            )?;

            match result.failure() {
                None => Ok(()),
                Some(failure) if failure.kind() == FailureKind::NoEnvironmentMatched => Ok(()),
                Some(failure) => Err(Error::Resolution(failure.clone())),
            }
        }
    }
}

fn trigger_context(args: &ResolveArgs) -> Result<TriggerContext, Error> {
    let mut context = match &args.git_ref {
        Some(git_ref) => TriggerContext::new(git_ref.clone(), EventKind::Push),
        None => TriggerContext::from_github_env(args.event)?,
    };

    if let Some(event) = args.event {
        context.event_kind = event;
    }
    if let Some(environment) = &args.environment {
        context.manual_environment = Some(environment.clone());
    }
    if args.override_validation {
        context.override_validation = true;
    }
    if let Some(notes) = &args.override_notes {
        context.override_notes = Some(notes.clone());
    }
    if let Some(actor) = &args.actor {
        context.actor = actor.clone();
    }

    Ok(context)
}

async fn resolve(context: &TriggerContext, cfg: &config::runtime::Config) -> ResolutionResult {
    match &cfg.secrets {
        SecretsBackend::Env { prefix } => {
            resolver::resolve(context, &cfg.profiles, &EnvSecrets::new(prefix.clone()))
        }
        SecretsBackend::KeyVault { vault } => {
            resolver::resolve_prefetched(context, &cfg.profiles, |keys| async move {
                match KeyVault::connect(vault).await {
                    Ok(key_vault) => key_vault.prefetch(&keys).await,
                    Err(err) => {
                        warn!("Key vault {vault} is unavailable: {err}");
                        StaticSecrets::default()
                    }
                }
            })
            .await
        }
    }
}
