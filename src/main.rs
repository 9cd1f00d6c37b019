use clap::{Args, Parser, Subcommand, builder::styling};
use data_warehouse::cli::{
    self, deploy::DeployEnvironment, ingestion::IngestionRequest, ingestion::IngestionSource,
    ingestion::IngestionTarget, monitor::JobStatusFilter,
};
use data_warehouse::config::Settings;
use data_warehouse::error::{self, WarehouseError};
use data_warehouse::orchestration::DagsterCommand;
use eyre::Result;
use owo_colors::OwoColorize;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

// CLI Styling
const STYLES: styling::Styles = styling::Styles::styled()
    .header(styling::AnsiColor::BrightWhite.on_default())
    .usage(styling::AnsiColor::BrightWhite.on_default())
    .literal(styling::AnsiColor::Green.on_default())
    .placeholder(styling::AnsiColor::Cyan.on_default());

/// Data Warehouse: load raw data into PostgreSQL, transform it with dbt and keep an eye on the results
#[derive(Parser)]
#[command(name = "dw", version, styles = STYLES)]
struct Cli {
    /// The dotenv file to source settings from
    #[arg(long, global = true, default_value = ".env")]
    env: String,

    /// Debug logging and full error chains
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Command to execute
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Storage components (PostgreSQL, MinIO, DuckDB)
    #[command(subcommand)]
    Storage(StorageCommands),

    /// Load data from a source into the raw layer
    #[command(subcommand)]
    Ingestion(IngestionCommands),

    /// dbt transformations
    #[command(subcommand)]
    Transforms(TransformCommands),

    /// Dagster orchestration
    #[command(subcommand)]
    Dagster(DagsterCommands),

    /// Docker compose deployments
    #[command(subcommand)]
    Deploy(DeployCommands),

    /// System status, dbt test results and workflow runs
    #[command(subcommand)]
    Monitor(MonitorCommands),

    /// Declarative YAML workflows
    #[command(subcommand)]
    Workflow(WorkflowCommands),

    /// MkDocs documentation
    #[command(subcommand)]
    Docs(DocsCommands),

    /// Show version information
    Version,

    /// Show the resolved configuration
    Info,

    /// Run diagnostic checks
    Doctor,
}

#[derive(Subcommand)]
enum StorageCommands {
    /// Create the data directory and the warehouse schemas
    Init {
        /// Re-run initialization over existing storage
        #[arg(long)]
        force: bool,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Check connectivity of every storage component
    Status,
}

#[derive(Subcommand)]
enum IngestionCommands {
    /// List available source types
    ListSources,

    /// Extract from a source and load into the raw layer
    Run(IngestionArgs),
}

#[derive(Args)]
struct IngestionArgs {
    /// Source type
    #[arg(value_enum)]
    source: IngestionSource,

    /// Input file for csv, json and ndjson sources
    #[arg(long)]
    file: Option<PathBuf>,

    /// Table to read for the postgres source
    #[arg(long)]
    table: Option<String>,

    /// Full URL for the api source
    #[arg(long)]
    endpoint: Option<String>,

    /// Key of the records array in API responses
    #[arg(long)]
    records_key: Option<String>,

    /// Where the raw records are written
    #[arg(long, value_enum, default_value_t)]
    target: IngestionTarget,

    /// Raw table or raw zone name
    #[arg(long)]
    name: Option<String>,
}

impl From<IngestionArgs> for IngestionRequest {
    fn from(args: IngestionArgs) -> Self {
        Self {
            source: args.source,
            file: args.file,
            table: args.table,
            endpoint: args.endpoint,
            records_key: args.records_key,
            target: args.target,
            name: args.name,
        }
    }
}

#[derive(Subcommand)]
enum TransformCommands {
    /// List dbt models
    List,

    /// Run dbt models
    Run {
        /// Single model to run
        model: Option<String>,

        /// Rebuild incremental models from scratch
        #[arg(long)]
        full_refresh: bool,
    },

    /// Run dbt tests
    Test {
        /// Single model to test
        model: Option<String>,

        /// Record results in the monitoring schema
        #[arg(long)]
        log_results: bool,
    },

    /// Scaffold dbt projects for PostgreSQL and DuckDB
    InitDbtProjects {
        #[arg(long, default_value = "dbt_postgres")]
        postgres_name: String,

        #[arg(long, default_value = "dbt_duckdb")]
        duckdb_name: String,

        /// Shared macros and tests directory
        #[arg(long, default_value = "dbt_common")]
        common_name: String,
    },
}

#[derive(Subcommand)]
enum DagsterCommands {
    /// Start the Dagster UI
    Ui {
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        #[arg(long, default_value_t = 3000)]
        port: u16,

        /// Disable auto-reload on code changes
        #[arg(long)]
        no_reload: bool,
    },

    /// Start the Dagster daemon
    Daemon,

    /// Materialize assets
    Materialize {
        /// Asset names
        assets: Vec<String>,

        /// Materialize every asset
        #[arg(long)]
        all: bool,

        /// Run tags as JSON
        #[arg(long)]
        tags: Option<String>,
    },

    /// Execute a job
    Run {
        job: String,

        /// Run tags as JSON
        #[arg(long)]
        tags: Option<String>,

        /// YAML run config file
        #[arg(long)]
        config: Option<String>,
    },

    /// List assets
    ListAssets,

    /// List jobs
    ListJobs,

    /// List schedules
    ListSchedules,

    /// Delete all Dagster run history
    Wipe {
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
enum DeployCommands {
    /// Bring up the stack for an environment
    Init {
        #[arg(short, long, value_enum, default_value = "development")]
        environment: DeployEnvironment,
    },

    /// Show the state of the deployed services
    Status {
        #[arg(short, long, value_enum)]
        environment: Option<DeployEnvironment>,
    },

    /// Pull and restart services at a version
    Upgrade {
        #[arg(short, long, value_enum)]
        environment: Option<DeployEnvironment>,

        /// Target version, latest when absent
        #[arg(long)]
        version: Option<String>,
    },

    /// Restart services at an earlier version
    Rollback {
        version: String,

        #[arg(short, long, value_enum)]
        environment: Option<DeployEnvironment>,

        /// Skip the production confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
enum MonitorCommands {
    /// Overall system status
    Status,

    /// Record dbt test results and alert on failures
    DbtResults {
        /// Path to run_results.json
        #[arg(long, conflicts_with = "target_dir")]
        results_path: Option<PathBuf>,

        /// dbt target directory containing run_results.json
        #[arg(long)]
        target_dir: Option<PathBuf>,

        /// Database URL overriding the configured PostgreSQL settings
        #[arg(long)]
        db_url: Option<String>,
    },

    /// Show the latest failing dbt tests
    Failures {
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
    },

    /// List recent workflow runs
    Jobs {
        #[arg(short, long, value_enum, default_value_t)]
        status: JobStatusFilter,

        #[arg(short, long, default_value_t = 10)]
        limit: usize,
    },
}

#[derive(Subcommand)]
enum WorkflowCommands {
    /// List discovered workflows
    List,

    /// Validate every workflow definition
    Validate,

    /// Run one workflow by id (`domain.name`)
    Run { id: String },

    /// Run every workflow in a domain
    RunDomain { domain: String },

    /// Reload workflow definitions as they change
    Watch {
        /// Polling interval in seconds
        #[arg(long, default_value_t = 5)]
        interval: u64,
    },
}

#[derive(Subcommand)]
enum DocsCommands {
    /// Serve the documentation site
    Serve {
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        #[arg(long, default_value_t = 8000)]
        port: u16,
    },

    /// Build the static documentation site
    Build,

    /// Generate Markdown docs for the workflow definitions
    Workflows {
        /// Output directory, the docs directory when absent
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let dotenv = dotenvy::from_filename(&cli.env);

    let env = env_logger::Env::default().filter_or("LOG_LEVEL", "info");
    let mut logger = env_logger::Builder::from_env(env);
    if cli.verbose {
        logger.filter_level(log::LevelFilter::Debug);
    }
    logger.format_timestamp_millis().init();

    match dotenv {
        Ok(path) => log::debug!("Sourced settings from {}", path.display()),
        Err(e) if e.not_found() => log::debug!("No dotenv file at {}", cli.env),
        Err(e) => log::warn!("Could not read {}: {}", cli.env, e),
    }

    let verbose = cli.verbose;
    match run(cli.command).await {
        Ok(code) => code,
        Err(report) => {
            let label = report
                .downcast_ref::<WarehouseError>()
                .map(WarehouseError::label)
                .unwrap_or("Error");
            eprintln!("{} {}", "✗".red(), label.red().bold());
            if verbose {
                eprintln!("{:?}", report);
            } else {
                eprintln!("{:#}", report);
            }
            ExitCode::from(error::exit_code(&report) as u8)
        }
    }
}

async fn run(command: Commands) -> Result<ExitCode> {
    let settings = Settings::from_env()?;
    log::debug!("Environment: {}", settings.environment.cyan());

    match command {
        Commands::Storage(command) => match command {
            StorageCommands::Init { force, yes } => {
                cli::storage::init_storage(&settings, force, yes).await?;
            }
            StorageCommands::Status => {
                if !cli::storage::storage_status(&settings).await.all_healthy() {
                    return Ok(ExitCode::FAILURE);
                }
            }
        },

        Commands::Ingestion(command) => match command {
            IngestionCommands::ListSources => cli::ingestion::list_sources(),
            IngestionCommands::Run(args) => {
                let request = IngestionRequest::from(args);
                let report = cli::ingestion::run_ingestion(&settings, &request).await?;
                println!(
                    "{} {} records from {} in {:.2?}",
                    "✓ Loaded".green(),
                    report.loaded,
                    report.extractor.cyan(),
                    report.elapsed
                );
            }
        },

        Commands::Transforms(command) => match command {
            TransformCommands::List => {
                let models = cli::transforms::list_models(&settings.dbt_project_dir)?;
                println!("Available transformation models:");
                for model in models {
                    println!("- {}", model.cyan());
                }
            }
            TransformCommands::Run {
                model,
                full_refresh,
            } => cli::transforms::run_models(&settings, model, full_refresh).await?,
            TransformCommands::Test { model, log_results } => {
                cli::transforms::test_models(&settings, model, log_results).await?
            }
            TransformCommands::InitDbtProjects {
                postgres_name,
                duckdb_name,
                common_name,
            } => {
                let profiles = cli::transforms::init_dbt_projects(
                    &std::env::current_dir()?,
                    &postgres_name,
                    &duckdb_name,
                    &common_name,
                )?;
                println!("Add the following to your profiles.yml:\n");
                println!("{}", profiles);
            }
        },

        Commands::Dagster(command) => {
            let (command, yes) = match command {
                DagsterCommands::Ui {
                    host,
                    port,
                    no_reload,
                } => (
                    DagsterCommand::Ui {
                        host,
                        port,
                        reload: !no_reload,
                    },
                    false,
                ),
                DagsterCommands::Daemon => (DagsterCommand::Daemon, false),
                DagsterCommands::Materialize { assets, all, tags } => (
                    cli::dagster::materialize_command(assets, all, tags)?,
                    false,
                ),
                DagsterCommands::Run { job, tags, config } => {
                    (DagsterCommand::Run { job, tags, config }, false)
                }
                DagsterCommands::ListAssets => (DagsterCommand::ListAssets, false),
                DagsterCommands::ListJobs => (DagsterCommand::ListJobs, false),
                DagsterCommands::ListSchedules => (DagsterCommand::ListSchedules, false),
                DagsterCommands::Wipe { yes } => (DagsterCommand::Wipe, yes),
            };
            cli::dagster::run_dagster(&settings, command, yes).await?;
        }

        Commands::Deploy(command) => match command {
            DeployCommands::Init { environment } => {
                cli::deploy::init(&settings, environment).await?
            }
            DeployCommands::Status { environment } => {
                cli::deploy::status(&settings, environment).await?
            }
            DeployCommands::Upgrade {
                environment,
                version,
            } => cli::deploy::upgrade(&settings, environment, version).await?,
            DeployCommands::Rollback {
                version,
                environment,
                yes,
            } => cli::deploy::rollback(&settings, &version, environment, yes).await?,
        },

        Commands::Monitor(command) => match command {
            MonitorCommands::Status => {
                if !cli::monitor::system_status(&settings).await {
                    return Ok(ExitCode::FAILURE);
                }
            }
            MonitorCommands::DbtResults {
                results_path,
                target_dir,
                db_url,
            } => {
                let summary =
                    cli::monitor::log_dbt_results(&settings, results_path, target_dir, db_url)
                        .await?;
                if summary.failed > 0 {
                    println!(
                        "{}",
                        format!("{} of {} dbt tests failed", summary.failed, summary.total).red()
                    );
                    return Ok(ExitCode::FAILURE);
                }
                println!("{} {} dbt test results recorded", "✓".green(), summary.total);
            }
            MonitorCommands::Failures { limit } => {
                cli::monitor::show_failures(&settings, limit).await?;
            }
            MonitorCommands::Jobs { status, limit } => {
                cli::monitor::list_jobs(&settings, status, limit)?;
            }
        },

        Commands::Workflow(command) => match command {
            WorkflowCommands::List => {
                cli::workflow::list_workflows(&settings)?;
            }
            WorkflowCommands::Validate => {
                let count = cli::workflow::validate_workflows(&settings)?;
                println!("{} {} workflow(s) valid", "✓".green(), count);
            }
            WorkflowCommands::Run { id } => {
                let ctx = cli::workflow::run_workflow(&settings, &id).await?;
                println!("{} {} ({} loaded)", "✓".green(), id, ctx.loaded);
            }
            WorkflowCommands::RunDomain { domain } => {
                cli::workflow::run_domain(&settings, &domain).await?;
            }
            WorkflowCommands::Watch { interval } => {
                cli::workflow::watch_workflows(&settings, Duration::from_secs(interval.max(1)))
                    .await?
            }
        },

        Commands::Docs(command) => match command {
            DocsCommands::Serve { host, port } => cli::docs::serve(&settings, &host, port).await?,
            DocsCommands::Build => cli::docs::build(&settings).await?,
            DocsCommands::Workflows { output } => {
                cli::docs::workflows(&settings, output)?;
            }
        },

        Commands::Version => cli::system::version(&settings),
        Commands::Info => cli::system::info(&settings),
        Commands::Doctor => {
            if !cli::system::doctor(&settings).healthy() {
                return Ok(ExitCode::FAILURE);
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}
