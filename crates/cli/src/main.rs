use anyhow::Context;
use auto_trade_advisory::GeminiAdvisor;
use auto_trade_capital::{CapitalClient, CapitalGateway, PaperGateway, PriceFeed, PriceFeedConfig};
use auto_trade_core::{
    AppConfig, ConfigLoader, MarketGateway, NotifyLevel, Notifier, QuoteCache, SignalTier,
};
use auto_trade_engine::{
    FanoutNotifier, LogNotifier, SettingsStore, TelegramNotifier, TradingContext, TradingRuntime,
};
use auto_trade_signals::{RsiThresholds, SignalEngine};
use clap::{Parser, Subcommand};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "auto-trade")]
#[command(about = "Signal-driven CFD trading with trailing-stop and stop-loss monitoring", long_about = None)]
struct Cli {
    /// Config file path
    #[arg(short, long, global = true, default_value = "config/Config.toml")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the entry scheduler and position monitors until interrupted
    Run {
        /// Simulate orders in memory while reading live prices
        #[arg(long)]
        paper: bool,
    },
    /// Evaluate the entry signal for one instrument and exit
    Signal {
        /// Instrument name or id (e.g. "Gold" or "GOLD")
        instrument: String,
        /// Signal tier; defaults to the persisted setting
        #[arg(short, long)]
        tier: Option<SignalTier>,
    },
    /// List open positions at the brokerage
    Positions,
    /// Print the persisted trading settings
    Settings {
        /// Restore defaults (drops the cached positions)
        #[arg(long)]
        reset: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = ConfigLoader::load_from(&cli.config)
        .with_context(|| format!("loading config from {}", cli.config))?;

    match cli.command {
        Commands::Run { paper } => run_engine(config, paper).await?,
        Commands::Signal { instrument, tier } => run_signal(&config, &instrument, tier).await?,
        Commands::Positions => run_positions(&config).await?,
        Commands::Settings { reset } => run_settings(&config, reset).await?,
    }

    Ok(())
}

fn settings_store(config: &AppConfig) -> Arc<SettingsStore> {
    Arc::new(SettingsStore::open(
        &config.storage.settings_path,
        config.instruments.clone(),
    ))
}

fn notifier(config: &AppConfig) -> anyhow::Result<Arc<dyn Notifier>> {
    let mut fanout = FanoutNotifier::new(vec![Arc::new(LogNotifier)]);
    if let Some(telegram) = TelegramNotifier::from_config(&config.notifications)? {
        tracing::info!("Telegram notifications enabled");
        fanout.push(Arc::new(telegram));
    }
    Ok(Arc::new(fanout))
}

async fn connected_gateway(config: &AppConfig) -> anyhow::Result<CapitalGateway> {
    let client = Arc::new(CapitalClient::from_config(&config.capital)?);
    let gateway = CapitalGateway::new(client, QuoteCache::new());
    gateway.login().await.context("gateway login failed")?;
    Ok(gateway)
}

async fn run_engine(config: AppConfig, paper: bool) -> anyhow::Result<()> {
    tracing::info!(
        account = ?config.capital.account,
        paper,
        instruments = config.instruments.len(),
        "Starting trading engine"
    );

    let tz = config.market.tz()?;
    let store = settings_store(&config);
    let mut ctx = TradingContext::new(
        config.engine.clone(),
        config.instruments.clone(),
        tz,
        store,
        notifier(&config)?,
    );
    match GeminiAdvisor::from_config(&config.advisory)? {
        Some(advisor) => ctx = ctx.with_advisory(Arc::new(advisor)),
        None => tracing::warn!("No advisory API key configured; advisory gates will reject"),
    }

    let client = Arc::new(CapitalClient::from_config(&config.capital)?);
    let quotes = QuoteCache::new();
    let live = CapitalGateway::new(Arc::clone(&client), quotes.clone())
        .with_max_quote_age(Duration::from_secs(config.capital.quote_max_age_secs));
    let gateway: Arc<dyn MarketGateway> = if paper {
        Arc::new(PaperGateway::new(live))
    } else {
        Arc::new(live)
    };

    let mut runtime = TradingRuntime::new(Arc::new(ctx));
    runtime.connect(gateway).await?;
    runtime.start();

    // The feed blocks on the socket, so it is stopped and aborted rather than joined
    let epics = config.instruments.iter().map(|i| i.id.clone()).collect();
    let feed = Arc::new(PriceFeed::new(
        PriceFeedConfig::from_capital(&config.capital, epics),
        client,
        quotes,
    ));
    let feed_stop = feed.stop_handle();
    let feed_handle = tokio::spawn(async move { feed.run().await });

    runtime
        .context()
        .notify(
            if paper {
                "Engine started (paper trading)"
            } else {
                "Engine started"
            },
            NotifyLevel::Info,
        )
        .await;

    shutdown_signal().await?;

    feed_stop.store(true, Ordering::SeqCst);
    feed_handle.abort();
    runtime.shutdown().await;

    tracing::info!("Trading engine stopped");
    Ok(())
}

/// Waits for SIGINT or SIGTERM.
async fn shutdown_signal() -> anyhow::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate()).context("installing SIGTERM handler")?;
    let mut sigint = signal(SignalKind::interrupt()).context("installing SIGINT handler")?;

    tokio::select! {
        _ = sigterm.recv() => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown");
        }
        _ = sigint.recv() => {
            tracing::info!("Received SIGINT (Ctrl+C), initiating graceful shutdown");
        }
    }
    Ok(())
}

async fn run_signal(
    config: &AppConfig,
    instrument: &str,
    tier: Option<SignalTier>,
) -> anyhow::Result<()> {
    let target = config
        .instruments
        .iter()
        .find(|i| i.name.eq_ignore_ascii_case(instrument) || i.id.eq_ignore_ascii_case(instrument))
        .with_context(|| format!("unknown instrument {instrument}"))?;

    let settings = settings_store(config).get_settings().await;
    let tier = tier.unwrap_or(settings.signal_tier);
    let engine = SignalEngine::new(RsiThresholds {
        buy_below: settings.rsi_buy_level,
        sell_above: settings.rsi_sell_level,
    });

    let gateway = connected_gateway(config).await?;
    let outcome = engine
        .evaluate(&gateway, &target.id, tier, &settings.enabled_indicators)
        .await;
    let quote = gateway.get_prices(&target.id).await?;

    println!("{} ({}) tier {tier}", target.name, target.id);
    match outcome.direction {
        Some(direction) => println!("  signal: {direction}"),
        None => println!("  signal: none"),
    }
    if let Some(resolution) = outcome.resolution {
        println!("  bars: {} at {resolution}", outcome.bars);
    }
    println!(
        "  votes: {} buy / {} sell of {}",
        outcome.tally.buy, outcome.tally.sell, outcome.tally.eligible
    );
    if let Some(snapshot) = outcome.snapshot {
        println!("  indicators: {}", serde_json::to_string(&snapshot)?);
    }
    match quote {
        Some(q) => println!("  quote: buy {} / sell {}", q.buy, q.sell),
        None => println!("  quote: unavailable"),
    }
    Ok(())
}

async fn run_positions(config: &AppConfig) -> anyhow::Result<()> {
    let gateway = connected_gateway(config).await?;
    let positions = gateway.get_open_positions().await?;

    if positions.is_empty() {
        println!("No open positions");
        return Ok(());
    }
    for p in positions {
        println!(
            "{:<24} {:<12} {:<4} size {:>10} @ {}",
            p.deal_id, p.instrument_id, p.direction, p.size, p.open_price
        );
    }
    Ok(())
}

async fn run_settings(config: &AppConfig, reset: bool) -> anyhow::Result<()> {
    let store = settings_store(config);
    if reset {
        store.reset().await?;
        tracing::info!(path = %config.storage.settings_path.display(), "Settings reset to defaults");
    }
    let settings = store.get_settings().await;
    println!("{}", serde_json::to_string_pretty(&settings)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_run_paper() {
        let cli = Cli::try_parse_from(["auto-trade", "run", "--paper"]).unwrap();
        assert_eq!(cli.config, "config/Config.toml");
        assert!(matches!(cli.command, Commands::Run { paper: true }));
    }

    #[test]
    fn test_parse_signal_tier() {
        let cli = Cli::try_parse_from([
            "auto-trade",
            "--config",
            "other.toml",
            "signal",
            "Gold",
            "--tier",
            "weak",
        ])
        .unwrap();
        assert_eq!(cli.config, "other.toml");
        match cli.command {
            Commands::Signal { instrument, tier } => {
                assert_eq!(instrument, "Gold");
                assert_eq!(tier, Some(SignalTier::Weak));
            }
            _ => panic!("expected signal command"),
        }
    }

    #[test]
    fn test_unknown_tier_is_rejected() {
        assert!(Cli::try_parse_from(["auto-trade", "signal", "Gold", "--tier", "wild"]).is_err());
    }
}
