//! Command line front end that acquires and prints one IOK waste collection schedule.

use std::io::{self, Write};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{Days, Local, NaiveDate};
use clap::Parser;
use kliko_core::{Address, AddressPort, DateRange, SchedulePort, ScheduleService, WasteDay};
use kliko_provider_iok::{PortalConfig, provider};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Print the waste collection schedule of an address served by the IOK portal.
#[derive(Debug, Parser)]
#[command(name = "kliko", version)]
struct Cli {
    /// Municipality as listed by the portal, e.g. "Geel".
    city: String,

    /// Street as listed by the portal, e.g. "Markt".
    street: String,

    /// Number of consecutive months to fetch, starting with the current one.
    #[arg(long)]
    months: NonZeroU32,

    /// Only print the pickups of the next N days.
    #[arg(long, default_value_t = 60)]
    days: u32,

    /// Per-request timeout in seconds.
    #[arg(long, default_value_t = 30)]
    timeout_secs: u64,

    /// Portal host, for mirrors or local test servers.
    #[arg(long)]
    base_url: Option<String>,

    /// Only check whether the portal accepts the address.
    #[arg(long)]
    validate: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logging: default info, RUST_LOG overrides
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().with_writer(io::stderr))
        .init();

    let cli = Cli::parse();

    let mut config =
        PortalConfig::default().with_request_timeout(Duration::from_secs(cli.timeout_secs));
    if let Some(base_url) = cli.base_url {
        config = config.with_base_url(base_url);
    }

    let iok = provider(config, cli.months);
    let service = ScheduleService::new(
        Address::new(cli.city, cli.street),
        Arc::clone(&iok) as Arc<dyn AddressPort>,
        iok as Arc<dyn SchedulePort>,
    );

    if cli.validate {
        let valid = service.validate_address().await;
        info!(address = %service.address(), valid, "address validated");
        let verdict = if valid { "valid" } else { "not found" };
        writeln!(io::stdout(), "{}: {verdict}", service.address())?;
        return Ok(());
    }

    service
        .refresh()
        .await
        .with_context(|| format!("failed to load schedule for {}", service.address()))?;

    let range = upcoming(Local::now().date_naive(), cli.days)?;
    let pickups = service.events_in(range).await;
    print_pickups(&mut io::stdout().lock(), &pickups)?;

    Ok(())
}

fn upcoming(today: NaiveDate, days: u32) -> Result<DateRange> {
    let end = today
        .checked_add_days(Days::new(u64::from(days)))
        .with_context(|| format!("--days {days} reaches past the last representable date"))?;
    Ok(DateRange { start: today, end })
}

fn print_pickups<W: Write>(out: &mut W, pickups: &[WasteDay]) -> io::Result<()> {
    if pickups.is_empty() {
        return writeln!(out, "No pickups scheduled in this period.");
    }

    for pickup in pickups {
        writeln!(
            out,
            "{}  {}",
            pickup.date.format("%a %d %b %Y"),
            pickup.summary()
        )?;
    }
    Ok(())
}
