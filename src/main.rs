use anyhow::Context;
use chrono::{Duration as ChronoDuration, Utc};
use clap::Parser;
use std::path::PathBuf;
use trendbot::runner::{EntryOutcome, TradingEngine};
use trendbot::sim::PaperBroker;
use trendbot::Settings;

/// Intraday trend/momentum bot running against the paper broker
#[derive(Parser, Debug)]
#[command(name = "trendbot", version, about)]
struct Args {
    /// TOML config file layered over the defaults
    #[arg(long)]
    config: Option<PathBuf>,

    /// Seed for the synthetic price stream
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Stop after this many cycles (runs until Ctrl+C otherwise)
    #[arg(long)]
    cycles: Option<u64>,

    /// Don't sleep between cycles
    #[arg(long, default_value_t = false)]
    fast: bool,

    /// Print the effective configuration as JSON and exit
    #[arg(long, default_value_t = false)]
    print_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    setup_logging();

    let args = Args::parse();
    let settings = Settings::load(args.config.as_deref()).context("failed to load settings")?;

    if args.print_config {
        println!("{}", serde_json::to_string_pretty(&settings)?);
        return Ok(());
    }

    tracing::info!(
        "🚀 trendbot starting: {} entry {:?} / trend {:?}, seed {}",
        settings.instrument.symbol,
        settings.instrument.entry_timeframe,
        settings.instrument.trend_timeframe,
        args.seed
    );

    let mut engine = TradingEngine::new(&settings)?;
    let mut broker = PaperBroker::new(
        &settings.instrument.symbol,
        settings.paper.clone(),
        args.seed,
        Utc::now(),
    );

    // Simulated minutes per cycle; the paper market moves in one-minute bars
    let step_minutes = 1;
    let mut cycle: u64 = 0;

    loop {
        if args.cycles.is_some_and(|max| cycle >= max) {
            break;
        }
        cycle += 1;

        broker.advance(step_minutes);
        let now = broker.now();
        let report = engine.run_cycle(&mut broker, now);

        match &report.entry {
            EntryOutcome::Filled { order, receipt } => tracing::info!(
                "[cycle {}] ✓ {:?} {:.2} lots filled as ticket {}",
                cycle,
                order.direction,
                order.volume,
                receipt.ticket
            ),
            EntryOutcome::Rejected { error, .. } => {
                tracing::warn!("[cycle {}] ✗ entry rejected: {}", cycle, error)
            }
            EntryOutcome::Declined(e) => tracing::info!("[cycle {}] entry declined: {}", cycle, e),
            EntryOutcome::Blocked(_) | EntryOutcome::NoSignal => tracing::debug!(
                "[cycle {}] {} position action(s), signal {:?}",
                cycle,
                report.position_actions.len(),
                report.signal.map(|s| s.direction)
            ),
        }

        if args.fast {
            continue;
        }

        tokio::select! {
            _ = tokio::time::sleep(engine.next_delay()) => {}
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Ctrl+C received, shutting down");
                break;
            }
        }
    }

    print_summary(&broker, cycle, settings.paper.initial_balance, step_minutes);
    Ok(())
}

fn setup_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("trendbot=info")),
        )
        .init();
}

fn print_summary(broker: &PaperBroker, cycles: u64, initial_balance: f64, step_minutes: i64) {
    let trades = broker.closed_trades();
    let wins = trades.iter().filter(|t| t.pnl > 0.0).count();
    let total_pnl: f64 = trades.iter().map(|t| t.pnl).sum();
    let win_rate = if trades.is_empty() {
        0.0
    } else {
        wins as f64 / trades.len() as f64 * 100.0
    };

    println!("\n╔═══════════════════════════════════════════════════════╗");
    println!("║                 PAPER SESSION SUMMARY                 ║");
    println!("╚═══════════════════════════════════════════════════════╝");
    println!(
        "Cycles:          {} ({} simulated)",
        cycles,
        format_duration(ChronoDuration::minutes(cycles as i64 * step_minutes))
    );
    println!("Closed trades:   {}", trades.len());
    println!("Open positions:  {}", broker.open_position_count());
    println!("Win rate:        {:.1}%", win_rate);
    println!("Realised P&L:    ${:.2}", total_pnl);
    println!(
        "Balance:         ${:.2} ({:+.2}%)",
        broker.balance(),
        (broker.balance() - initial_balance) / initial_balance * 100.0
    );
}

fn format_duration(duration: ChronoDuration) -> String {
    format!("{}h{:02}m", duration.num_hours(), duration.num_minutes() % 60)
}
