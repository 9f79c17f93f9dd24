use std::path::PathBuf;

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};

use backend_application::{commands, queries, AppState};
use backend_bootstrap::AppContext;

#[derive(Parser, Debug)]
#[command(name = "caseline-backend")]
#[command(about = "Caseline forensic analytics backend", long_about = None)]
struct Args {
    /// Path to config file
    #[arg(short, long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Case lifecycle operations
    Case {
        #[command(subcommand)]
        action: CaseAction,
    },
    /// Normalize an upload into a case
    Ingest {
        #[arg(long)]
        case_id: String,
        #[arg(long)]
        file: PathBuf,
    },
    /// Run rules, anomaly scoring, graph analysis, and risk aggregation
    Analyze {
        #[arg(long)]
        case_id: String,
    },
    /// Train and publish the shared baseline anomaly model
    Train {
        #[arg(long)]
        dataset: Option<String>,
    },
    /// List rule findings for a case
    Findings {
        #[arg(long)]
        case_id: String,
    },
    /// List anomaly results for a case
    Anomalies {
        #[arg(long)]
        case_id: String,
    },
    /// Show the persisted relationship graph for a case
    Graph {
        #[arg(long)]
        case_id: String,
    },
    /// Show the case risk score
    Risk {
        #[arg(long)]
        case_id: String,
        /// Use the forensic policy with itemized justifications
        #[arg(long)]
        forensic: bool,
    },
    /// Dump process metrics in Prometheus text format
    Metrics,
}

#[derive(Subcommand, Debug)]
enum CaseAction {
    Create {
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "")]
        description: String,
    },
    List,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    if let Some(config) = args.config {
        std::env::set_var("CASELINE_CONFIG", config);
    }

    let context = AppContext::new().await?;
    run_command(&context.state, args.command).await
}

async fn run_command(state: &AppState, command: Command) -> Result<()> {
    match command {
        Command::Case { action } => match action {
            CaseAction::Create { name, description } => {
                let case = commands::create_case(state, name, description)
                    .await
                    .map_err(|err| anyhow!(err))?;
                print_json(&case)
            }
            CaseAction::List => {
                let cases = queries::list_cases(state).await.map_err(|err| anyhow!(err))?;
                print_json(&cases)
            }
        },
        Command::Ingest { case_id, file } => {
            let filename = file
                .file_name()
                .map(|name| name.to_string_lossy().to_string())
                .ok_or_else(|| anyhow!("invalid file path"))?;
            let content = tokio::fs::read(&file).await?;
            let report = commands::process_upload(state, &case_id, &filename, &content)
                .await
                .map_err(|err| anyhow!(err))?;
            print_json(&report)
        }
        Command::Analyze { case_id } => {
            let report = commands::run_analysis(state, &case_id)
                .await
                .map_err(|err| anyhow!(err))?;
            print_json(&report)
        }
        Command::Train { dataset } => {
            let report = commands::train_baseline_model(state, dataset.as_deref())
                .await
                .map_err(|err| anyhow!(err))?;
            print_json(&report)
        }
        Command::Findings { case_id } => {
            let findings = queries::list_findings(state, &case_id)
                .await
                .map_err(|err| anyhow!(err))?;
            print_json(&findings)
        }
        Command::Anomalies { case_id } => {
            let results = queries::list_anomaly_results(state, &case_id)
                .await
                .map_err(|err| anyhow!(err))?;
            print_json(&results)
        }
        Command::Graph { case_id } => {
            let graph = queries::get_graph(state, &case_id)
                .await
                .map_err(|err| anyhow!(err))?;
            print_json(&graph)
        }
        Command::Risk { case_id, forensic } => {
            if forensic {
                let report = queries::forensic_report(state, &case_id)
                    .await
                    .map_err(|err| anyhow!(err))?;
                print_json(&report)
            } else {
                let snapshot = queries::latest_snapshot(state, &case_id)
                    .await
                    .map_err(|err| anyhow!(err))?;
                print_json(&snapshot)
            }
        }
        Command::Metrics => {
            print!("{}", state.metrics.render_prometheus());
            Ok(())
        }
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
