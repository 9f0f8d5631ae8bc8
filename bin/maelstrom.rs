use std::sync::Arc;

use alloy::primitives::Address;
use anyhow::Context;
use chrono::Utc;
use jemallocator::Jemalloc;
use log::{error, info, warn, LevelFilter};
use simple_logger::SimpleLogger;
use tokio_util::sync::CancellationToken;

#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use maelstrom::{
    market::LoadOutcome,
    utils::{format_units, u256_to_f64},
    Market, RpcClient, Settings,
};

#[tokio::main()]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let settings = Arc::new(
        Settings::new()
            .context("Failed to load config.yaml. Please ensure it exists and is valid")?,
    );

    let level = settings
        .log_level
        .parse::<LevelFilter>()
        .unwrap_or(LevelFilter::Info);
    SimpleLogger::new()
        .with_level(level)
        .init()
        .context("Failed to initialize logger")?;

    let client = Arc::new(RpcClient::new(&settings.rpc).context("Failed to create RPC client")?);
    info!("Reading exchange {}", client.exchange_address());
    let market = Market::new(client, &settings.market).context("Invalid market settings")?;

    let cancellation_token = CancellationToken::new();

    let report_token = cancellation_token.child_token();
    let report_settings = settings.clone();
    let mut report_handle = tokio::spawn(async move {
        if let Err(e) = run_report(market, report_settings, report_token).await {
            error!("Report failed: {:#}", e);
        }
    });

    #[cfg(unix)]
    let mut sigterm_stream = {
        use tokio::signal::unix::{signal, SignalKind};
        signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?
    };

    #[cfg(unix)]
    let finished = tokio::select! {
        _ = &mut report_handle => true,
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal (Ctrl+C), cancelling report...");
            false
        },
        _ = sigterm_stream.recv() => {
            info!("Received SIGTERM, cancelling report...");
            false
        },
    };

    #[cfg(not(unix))]
    let finished = tokio::select! {
        _ = &mut report_handle => true,
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal (Ctrl+C), cancelling report...");
            false
        },
    };

    if !finished {
        cancellation_token.cancel();
        let _ = report_handle.await;
    }

    info!("Done");
    Ok(())
}

async fn run_report(
    market: Market,
    settings: Arc<Settings>,
    cancellation_token: CancellationToken,
) -> anyhow::Result<()> {
    let report = &settings.report;
    let decimals = settings.market.native_decimals;

    let token_address: Address = report
        .token
        .parse()
        .context("report.token is not a valid address")?;
    let user: Address = match &report.user {
        Some(user) => user.parse().context("report.user is not a valid address")?,
        None => Address::ZERO,
    };

    // Pool directory
    let rows = market
        .pools()
        .pools(0, report.pool_page_size)
        .await
        .context("Failed to list pools")?;
    info!("{} pools listed", rows.len());
    for row in &rows {
        info!(
            "  - {} ({}): buy {} sell {} liquidity {}",
            row.token.symbol,
            row.token.address,
            format_units(row.buy_price, decimals, 8),
            format_units(row.sell_price, decimals, 8),
            format_units(row.total_liquidity, decimals, 4),
        );
    }

    // Snapshot
    let snapshot = market
        .snapshots()
        .build(token_address, user)
        .await
        .context("Failed to build pool snapshot")?;
    match snapshot.apr.ratio() {
        Some(apr) => info!("{} APR: {}", snapshot.token.symbol, apr),
        None => warn!("{} APR undefined: pool has no liquidity", snapshot.token.symbol),
    }
    println!(
        "{}",
        serde_json::to_string_pretty(&snapshot).context("Failed to serialize snapshot")?
    );

    if report.user.is_some() {
        let user_pools = market
            .pools()
            .user_pools(user, 0, report.pool_page_size)
            .await
            .context("Failed to list user pools")?;
        info!("User {} is in {} pools", user, user_pools.len());
    }

    // Chart
    let chart = market
        .chart(snapshot.token.clone())
        .context("Failed to create chart loader")?;
    for _ in 0..report.chart_pages {
        match chart.load_more_with_cancel(&cancellation_token).await? {
            LoadOutcome::Loaded { .. } | LoadOutcome::InFlight => {},
            LoadOutcome::Exhausted => break,
            LoadOutcome::Cancelled => return Ok(()),
        }
    }

    let series = chart.series();
    let now_ms = Utc::now().timestamp_millis().max(0) as u64;
    let points = series.display(snapshot.buy_price, snapshot.sell_price, now_ms, decimals);
    let stats = series.stats(snapshot.buy_price, snapshot.sell_price, decimals);

    info!(
        "Chart: {} data points, avg buy {:.8}, avg sell {:.8}, spread {:.2}%",
        stats.data_points,
        stats
            .avg_buy_price
            .unwrap_or_else(|| u256_to_f64(snapshot.buy_price, decimals)),
        stats
            .avg_sell_price
            .unwrap_or_else(|| u256_to_f64(snapshot.sell_price, decimals)),
        stats.spread_pct.unwrap_or_default(),
    );
    println!(
        "{}",
        serde_json::to_string_pretty(&points).context("Failed to serialize chart")?
    );

    Ok(())
}
