use anyhow::{bail, Context};
use confluence::services::SqliteStore;
use confluence::{
    AggregationInput, Config, PartialPersonality, SignalEngine, SignalWeights, TraderPersonality,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const USAGE: &str = "\
Usage:
  confluence analyze <trader> <input.json>
  confluence history <trader> [limit]
  confluence weights <trader> <weights.json>
  confluence personality <trader> [preset | patch.json]";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "confluence=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = Config::from_env();
    let args: Vec<String> = std::env::args().skip(1).collect();

    let (command, trader_id) = match (args.first(), args.get(1)) {
        (Some(command), Some(trader_id)) => (command.as_str(), trader_id.as_str()),
        _ => {
            eprintln!("{}", USAGE);
            std::process::exit(2);
        }
    };

    let store = Arc::new(
        SqliteStore::new(&config.database_path)
            .with_context(|| format!("opening database {}", config.database_path))?,
    );
    info!("Using database {}", config.database_path);
    let engine = SignalEngine::new(store, &config);

    match command {
        "analyze" => {
            let path = args.get(2).context("missing input file")?;
            let input: AggregationInput = read_json(path)?;
            let result = engine.analyze(trader_id, &input).await;
            print_json(&result)?;
        }
        "history" => {
            let limit = match args.get(2) {
                Some(s) => s.parse().with_context(|| format!("invalid limit: {}", s))?,
                None => config.history_limit,
            };
            let history = engine.weight_history(trader_id, limit)?;
            print_json(&history)?;
        }
        "weights" => {
            let path = args.get(2).context("missing weights file")?;
            let weights: SignalWeights = read_json(path)?;
            let entry = engine.set_weights(trader_id, weights).await?;
            print_json(&entry)?;
        }
        "personality" => {
            let personality = match args.get(2) {
                None => engine.personality(trader_id).await,
                Some(arg) => match TraderPersonality::preset(arg) {
                    Some(preset) => engine.register_trader(trader_id, preset).await?,
                    None => {
                        let patch: PartialPersonality = read_json(arg)?;
                        engine.update_personality(trader_id, &patch).await?
                    }
                },
            };
            print_json(&*personality)?;
        }
        other => bail!("unknown command '{}'\n{}", other, USAGE),
    }

    Ok(())
}

fn read_json<T: serde::de::DeserializeOwned>(path: &str) -> anyhow::Result<T> {
    let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path))?;
    serde_json::from_str(&text).with_context(|| format!("parsing {}", path))
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
