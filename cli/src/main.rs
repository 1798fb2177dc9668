pub mod cli;

use std::sync::Arc;

use clap::Parser;
use tokio::sync::mpsc;
use tracing::{info, warn};

use adapters::SymbolMap;
use adapters::binance::BinanceClient;
use cli::Cli;
use common::logger::init_logger;
use common::time::{elapsed_ms, now_ms};
use corelib::IndicatorSet;
use market::{FeedConfig, FeedManager, InsightContext, WindowSnapshot};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let is_production = std::env::var("APP_ENV").unwrap_or_default() == "production";
    init_logger("candlewire", cli.json || is_production);

    let config = cli.feed_config(FeedConfig::from_env());
    let loader = Arc::new(BinanceClient::new(config.rest_url.clone())?);
    let manager = FeedManager::new(loader, SymbolMap::binance_default(), config);

    let instrument = cli.instrument();
    info!(instrument = %instrument, interval = %cli.interval, "starting candlewire");

    let (tx, mut rx) = mpsc::unbounded_channel();
    let handle = manager
        .subscribe(
            instrument.clone(),
            cli.interval,
            move |window: WindowSnapshot, indicators: IndicatorSet| {
                let _ = tx.send((window, indicators));
            },
        )
        .await?;

    let started = now_ms();
    let mut received = 0u64;

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);
    let closed = handle.closed();
    tokio::pin!(closed);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("shutdown signal received");
                break;
            }
            reason = &mut closed => {
                warn!(reason = ?reason, "feed closed");
                break;
            }
            next = rx.recv() => {
                let Some((window, indicators)) = next else { break };
                received += 1;

                if let Some(bar) = window.last() {
                    info!(
                        start_time = bar.start_time,
                        close = bar.close,
                        volume = bar.volume,
                        bars = window.len(),
                        rsi = indicators.rsi,
                        sma20 = indicators.sma20,
                        sma50 = indicators.sma50,
                        macd = indicators.macd.value,
                        volatility = indicators.volatility,
                        "update"
                    );
                }

                if cli.updates.is_some_and(|limit| received >= limit) {
                    info!(received, "update budget reached");
                    break;
                }
            }
        }
    }

    handle.unsubscribe();

    if let Some(ctx) = InsightContext::from_snapshot(
        instrument,
        &handle.snapshot(),
        handle.indicators(),
        cli.headlines(),
    ) {
        info!(
            instrument = %ctx.instrument,
            price = ctx.price,
            position = ?ctx.position,
            rsi = ctx.indicators.rsi,
            headlines = %ctx.news_lines(),
            "insight context"
        );
    }

    info!(
        received,
        elapsed_ms = elapsed_ms(started, now_ms()),
        "candlewire stopped"
    );

    Ok(())
}
