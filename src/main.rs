use anyhow::Result;
use clap::Parser;

mod cli;

use cli::commands::case::{CreateCommand, TransitionCommand};
use cli::commands::department::{AddDepartmentCommand, ListDepartmentsCommand};
use cli::commands::init::InitCommand;
use cli::commands::query::{HistoryCommand, ListCommand, ShowCommand, SignaturesCommand};
use cli::{Cli, Commands, DepartmentCommands};
use docket::{init_telemetry, DocketConfig, ErrorResponse, WorkflowError};
use tracing::warn;

fn main() {
    let cli = Cli::parse();

    if let Err(error) = run(cli) {
        // workflow failures keep their machine-readable shape
        match error.downcast_ref::<WorkflowError>() {
            Some(workflow_error) => {
                let response = ErrorResponse::from(workflow_error);
                match serde_json::to_string_pretty(&response) {
                    Ok(body) => eprintln!("{body}"),
                    Err(_) => eprintln!("❌ {workflow_error}"),
                }
            }
            None => eprintln!("❌ {error:#}"),
        }
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    // .env feeds the config layers, so it loads before logging is up
    let env_file = DocketConfig::load_env_file();
    let config = match &cli.config {
        Some(path) => DocketConfig::load_from(path)?,
        None => DocketConfig::load()?,
    };
    init_telemetry(&config.observability)?;
    if let Err(e) = env_file {
        warn!("Skipping unreadable .env file: {e:#}");
    }

    let database = cli.database.as_deref();
    let runtime = tokio::runtime::Runtime::new()?;

    match cli.command {
        Commands::Init { write_config, force } => runtime.block_on(async {
            InitCommand::new(write_config, force).execute(database, &config).await
        }),
        Commands::Department(DepartmentCommands::Add { id, name, code, inactive }) => {
            runtime.block_on(async {
                AddDepartmentCommand::new(id, name, code, inactive)
                    .execute(database, &config)
                    .await
            })
        }
        Commands::Department(DepartmentCommands::List) => runtime.block_on(async {
            ListDepartmentsCommand.execute(database, &config).await
        }),
        Commands::Create {
            kind,
            subject,
            reference,
            target,
            escalate,
            actor,
        } => runtime.block_on(async {
            CreateCommand::new(actor.actor(), kind, subject, reference, target, escalate)
                .execute(database, &config)
                .await
        }),
        Commands::Transition {
            case_id,
            action,
            target,
            remarks,
            actor,
        } => runtime.block_on(async {
            TransitionCommand::new(case_id, action, actor.actor())
                .with_target(target)
                .with_remarks(remarks)
                .execute(database, &config)
                .await
        }),
        Commands::Show { case_id, include_deleted } => runtime.block_on(async {
            ShowCommand { case_id, include_deleted }
                .execute(database, &config)
                .await
        }),
        Commands::History { case_id } => runtime.block_on(async {
            HistoryCommand { case_id }.execute(database, &config).await
        }),
        Commands::Signatures { case_id } => runtime.block_on(async {
            SignaturesCommand { case_id }.execute(database, &config).await
        }),
        Commands::List {
            kind,
            status,
            holder,
            include_deleted,
        } => {
            let list = ListCommand::new(kind, status, holder, include_deleted)?;
            runtime.block_on(async { list.execute(database, &config).await })
        }
    }
}
