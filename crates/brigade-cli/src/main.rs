mod config;

use anyhow::Context;
use brigade_agent::create_backend;
use brigade_orchestrator::{builtin, builtin_names, RunUpdate, Scenario, ScenarioExecutor};
use clap::{Parser, Subcommand};
use config::BrigadeConfig;
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "brigade", about = "Brigade: kitchen coordination benchmark for LLM agents")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "brigade.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one scenario and stream updates as JSON lines on stdout
    Run {
        /// Built-in scenario name or path to a scenario TOML file
        #[arg(short, long, default_value = "lunch_service")]
        scenario: String,
        /// Model name from the config (defaults to `default_model`)
        #[arg(short, long)]
        model: Option<String>,
        /// Only print the final snapshot
        #[arg(long)]
        summary: bool,
    },
    /// List built-in scenarios
    Scenarios,
    /// List configured models
    Models,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .json()
        .init();

    let cli = Cli::parse();
    let config = BrigadeConfig::load(&cli.config)
        .await
        .with_context(|| format!("loading {}", cli.config.display()))?;

    match cli.command {
        Commands::Run {
            scenario,
            model,
            summary,
        } => {
            let scenario = resolve_scenario(&scenario).await?;
            let model = config.model(model.as_deref())?;
            let backend = create_backend(&model)?;

            let mut executor =
                ScenarioExecutor::new(scenario, model.name.clone(), backend, config.kitchen.clone())?;
            if let Some(dir) = &config.memory_dir {
                executor = executor.with_memory_dir(dir.clone());
            }

            let (tx, mut rx) = mpsc::unbounded_channel::<RunUpdate>();
            let printer = tokio::spawn(async move {
                let stdout = std::io::stdout();
                while let Some(update) = rx.recv().await {
                    if summary && matches!(update, RunUpdate::Tick { .. }) {
                        continue;
                    }
                    let mut out = stdout.lock();
                    serde_json::to_writer(&mut out, &update)?;
                    writeln!(out)?;
                    out.flush()?;
                }
                anyhow::Ok(())
            });

            let snapshot = executor.run(&tx).await;
            drop(tx);
            printer.await??;
            info!(
                model = %snapshot.model,
                scenario = %snapshot.scenario,
                completion = snapshot.task_completion_rate,
                coordination = snapshot.coordination.score,
                degraded = snapshot.degraded,
                "Run complete"
            );
        }
        Commands::Scenarios => {
            println!("Built-in scenarios:");
            for name in builtin_names() {
                if let Some(s) = builtin(name) {
                    let crisis = s
                        .crisis
                        .as_ref()
                        .map(|c| format!(", crisis at tick {}: {}", c.at_tick, c.kind))
                        .unwrap_or_default();
                    println!(
                        "  {name}: {} ticks, {} orders{crisis}",
                        s.duration_ticks, s.order_volume
                    );
                    if !s.description.is_empty() {
                        println!("    {}", s.description);
                    }
                }
            }
        }
        Commands::Models => {
            println!("Configured models:");
            for model in &config.models {
                let marker = if config.default_model.as_deref() == Some(model.name.as_str()) {
                    " (default)"
                } else {
                    ""
                };
                println!("  {}{marker}: {:?}", model.name, model.provider);
                for fallback in &model.fallback_models {
                    println!("    fallback: {}", fallback.name);
                }
            }
        }
    }

    Ok(())
}

/// A built-in scenario by name, otherwise a scenario file.
async fn resolve_scenario(arg: &str) -> anyhow::Result<Scenario> {
    if let Some(scenario) = builtin(arg) {
        return Ok(scenario);
    }
    let path = Path::new(arg);
    let text = tokio::fs::read_to_string(path).await.with_context(|| {
        format!(
            "'{arg}' is not a built-in scenario ({}) nor a readable file",
            builtin_names().join(", ")
        )
    })?;
    let scenario: Scenario =
        toml::from_str(&text).with_context(|| format!("parsing {}", path.display()))?;
    Ok(scenario)
}
