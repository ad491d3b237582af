use anyhow::{bail, Context, Result};
use base64::prelude::*;
use clap::{Parser, Subcommand};
use playground::{config, health, ChatMessage, GuardStep, Playground, RunOutcome};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "lab", about = "Drive the Lab Playground from the command line")]
struct Args {
    /// Base URL of the execution service (overrides config).
    #[arg(long)]
    execution_url: Option<String>,

    /// Base URL of the agent service (overrides config).
    #[arg(long)]
    agent_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Probe both backend services.
    Health {
        /// Keep polling on the configured interval.
        #[arg(long)]
        watch: bool,
    },
    /// Run a file of code as a single cell.
    Exec { path: PathBuf },
    /// Upload a dataset and run the analysis stage.
    Analyze {
        path: PathBuf,
        /// Target column for supervised tasks.
        #[arg(long)]
        target: Option<String>,
    },
    /// Send a free-text message to the agent.
    Chat { message: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut config = config::load_config();
    if let Some(url) = args.execution_url {
        config.execution_url = url;
    }
    if let Some(url) = args.agent_url {
        config.agent_url = url;
    }

    let health_interval = Duration::from_secs(config.health_interval_secs);
    let mut playground = Playground::new(config);

    match args.command {
        Command::Health { watch } => {
            let health =
                health::check(playground.execution_client(), playground.agent_client()).await;
            println!("execution: {}", health.execution);
            println!("agent:     {}", health.agent);
            if watch {
                let mut rx = health::spawn_monitor(
                    playground.execution_client().clone(),
                    playground.agent_client().clone(),
                    health_interval,
                );
                loop {
                    rx.changed().await?;
                    let health = *rx.borrow();
                    println!("execution: {} | agent: {}", health.execution, health.agent);
                }
            }
            if !health.all_online() {
                std::process::exit(1);
            }
        }

        Command::Exec { path } => {
            let code = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            let cell_id = playground.cells().cells()[0].id;
            playground.update_cell_code(cell_id, &code);

            match playground.run_cell(cell_id).await {
                RunOutcome::Completed | RunOutcome::Rejected => print_cells(&playground)?,
                outcome => bail!("cell did not run: {outcome:?}"),
            }
        }

        Command::Analyze { path, target } => {
            let contents = std::fs::read(&path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            let filename = path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("dataset.csv")
                .to_string();

            playground.upload(&filename, contents).await?;
            playground.analyze(target.as_deref()).await?;
            playground.save_history();

            print_transcript(&playground);
            print_cells(&playground)?;
        }

        Command::Chat { message } => {
            playground.ask(&message).await?;
            playground.save_history();
            print_transcript(&playground);
            print_cells(&playground)?;
        }
    }

    Ok(())
}

fn print_transcript(playground: &Playground) {
    for entry in playground.transcript().entries() {
        match &entry.message {
            ChatMessage::Status { text } => println!("* {text}"),
            ChatMessage::Analysis { report } => {
                println!("analysis:");
                println!(
                    "{}",
                    serde_json_pretty(report).unwrap_or_else(|| report.to_string())
                );
            }
            ChatMessage::FeatureEngineering { summary } => println!("features: {summary}"),
            ChatMessage::ModelSuggestions { models } => {
                println!("suggested models:");
                for model in models {
                    let label = if model.display_name.is_empty() {
                        &model.name
                    } else {
                        &model.display_name
                    };
                    println!("  {}. {} ({})", model.rank, label, model.name);
                    if !model.reasoning.is_empty() {
                        println!("     {}", model.reasoning);
                    }
                }
            }
            ChatMessage::Reasoning { text } => println!("~ {text}"),
            ChatMessage::Guard { step, text, .. } => {
                println!("[guard:{}] {text}", guard_tag(*step));
            }
            ChatMessage::PredictionForm { columns } => {
                println!("prediction inputs: {}", columns.join(", "));
            }
            ChatMessage::User { text } => println!("> {text}"),
            ChatMessage::Reply { text } => println!("{text}"),
            ChatMessage::Error { text } => eprintln!("error: {text}"),
        }
    }
}

fn guard_tag(step: GuardStep) -> &'static str {
    match step {
        GuardStep::Analyzing => "analyzing",
        GuardStep::WebSearching => "searching",
        GuardStep::FixAttempt => "fix",
        GuardStep::FixSuccess => "fixed",
        GuardStep::GiveUp => "gave-up",
    }
}

fn serde_json_pretty(value: &serde_json::Value) -> Option<String> {
    serde_json::to_string_pretty(value).ok()
}

/// Print every cell that has output, saving charts next to the cwd.
fn print_cells(playground: &Playground) -> Result<()> {
    for cell in playground.cells().cells() {
        let Some(output) = &cell.output else {
            continue;
        };
        let label = cell
            .execution_index
            .map(|i| i.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!("--- cell [{label}] ---");
        println!("{}", cell.code.trim_end());
        if !output.stdout.is_empty() {
            println!("{}", output.stdout.trim_end());
        }
        if let Some(error) = &output.error {
            eprintln!("error: {error}");
        }
        for (i, chart) in output.charts.iter().enumerate() {
            let path = format!("chart-{label}-{i}.png");
            let bytes = BASE64_STANDARD
                .decode(chart)
                .with_context(|| format!("invalid chart data on cell {label}"))?;
            std::fs::write(&path, bytes)?;
            println!("saved {path}");
        }
    }
    Ok(())
}
