//! LOOTSPLIT — hunt loot settlement engine
//!
//! Entry point. Loads configuration, initialises structured logging,
//! builds the market client and dispatches one of three commands:
//! a one-shot settlement from pasted logs, a price lookup, or the
//! HTTP API server.

use anyhow::{bail, Context, Result};
use std::sync::Arc;
use tracing::info;

use lootsplit::api::{self, routes::ApiState};
use lootsplit::config;
use lootsplit::engine::Settler;
use lootsplit::gold::parse_gold;
use lootsplit::market::TibiaMarketClient;
use lootsplit::report::{render_price, render_report};
use lootsplit::types::Gold;

const BANNER: &str = r#"
 _             _            _ _ _
| | ___   ___ | |_ ___ _ __| (_) |_
| |/ _ \ / _ \| __/ __| '_ \ | | __|
| | (_) | (_) | |_\__ \ |_) | | | |_
|_|\___/ \___/ \__|___/ .__/|_|_|\__|
                      |_|
  Hunt loot settlement
"#;

const USAGE: &str = "usage: lootsplit <settle <roster.txt> <name=loot.txt>... [--supplies name=amount]... [--json] | price <item> [--json] | serve>";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Settle {
        roster: String,
        loot: Vec<(String, String)>,
        supplies: Vec<(String, Gold)>,
        json: bool,
    },
    Price {
        item: String,
        json: bool,
    },
    Serve,
}

fn parse_command(args: &[String]) -> Result<Command> {
    let mut json = false;
    let mut supplies = Vec::new();
    let mut rest: Vec<&String> = Vec::new();
    let mut tail = args.iter().skip(2);
    while let Some(arg) = tail.next() {
        match arg.as_str() {
            "--json" => json = true,
            "--supplies" => {
                let pair = tail.next().with_context(|| format!("--supplies needs name=amount\n{USAGE}"))?;
                supplies.push(parse_supply_override(pair)?);
            }
            _ => rest.push(arg),
        }
    }

    match args.get(1).map(String::as_str) {
        Some("settle") => {
            let Some((roster, pastes)) = rest.split_first() else {
                bail!("settle needs a roster file\n{USAGE}");
            };
            let loot = pastes
                .iter()
                .map(|arg| {
                    arg.split_once('=')
                        .map(|(name, path)| (name.trim().to_string(), path.to_string()))
                        .with_context(|| format!("Expected name=path, got '{arg}'"))
                })
                .collect::<Result<Vec<_>>>()?;
            Ok(Command::Settle { roster: roster.to_string(), loot, supplies, json })
        }
        Some("price") => {
            if rest.is_empty() {
                bail!("price needs an item name\n{USAGE}");
            }
            let item = rest.iter().map(|s| s.as_str()).collect::<Vec<_>>().join(" ");
            Ok(Command::Price { item, json })
        }
        Some("serve") => Ok(Command::Serve),
        _ => bail!("{USAGE}"),
    }
}

/// `Eryn=12k` → `("Eryn", 12_000)`.
fn parse_supply_override(pair: &str) -> Result<(String, Gold)> {
    let (name, amount) = pair
        .split_once('=')
        .with_context(|| format!("Expected name=amount, got '{pair}'"))?;
    let gold = parse_gold(amount).with_context(|| format!("Invalid supplies amount for {name}: '{amount}'"))?;
    Ok((name.trim().to_string(), gold))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let args: Vec<String> = std::env::args().collect();
    let command = parse_command(&args)?;

    // Defaults apply when there is no config file
    let cfg = config::AppConfig::load_or_default("config.toml")?;

    init_logging();

    let client = TibiaMarketClient::new(&cfg.market, cfg.market_api_token())?;
    info!(world = %client.world(), base_url = %cfg.market.base_url, "Market client ready");
    let settler = Settler::new(Arc::new(client), cfg.valuation.clone());

    match command {
        Command::Settle { roster, loot, supplies, json } => {
            let roster_text = std::fs::read_to_string(&roster)
                .with_context(|| format!("Failed to read roster file: {roster}"))?;
            let mut logs = Vec::with_capacity(loot.len());
            for (name, path) in loot {
                let text = std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read loot file for {name}: {path}"))?;
                logs.push((name, text));
            }

            let result = settler
                .settle_text_with_overrides(&roster_text, &logs, &supplies)
                .await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                print!("{}", render_report(&result));
            }
        }
        Command::Price { item, json } => {
            let report = settler.price_lookup(&item).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print!("{}", render_price(&report));
            }
        }
        Command::Serve => {
            println!("{BANNER}");
            let state = Arc::new(ApiState { settler });
            api::serve(state, cfg.server.port).await?;
        }
    }

    Ok(())
}

/// Initialise the `tracing` subscriber.
///
/// Logs go to stderr so report output on stdout stays clean.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("lootsplit=info"));

    let json_logging = std::env::var("LOOTSPLIT_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .with_writer(std::io::stderr)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .init();
    }
}
