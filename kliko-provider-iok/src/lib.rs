//! Provider implementation for the IOK afvalkalender portal.
//!
//! The portal has no API. A schedule is obtained by replaying the address form
//! of the website in a cookie session, then scraping the calendar page month
//! by month.

use std::num::NonZeroU32;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Local;
use tracing::{debug, info};

use kliko_core::{
    model::{Address, ScheduleSnapshot, YearMonth},
    ports::{AddressPort, PortError, PortalSession, SchedulePort, SessionPort},
};

/// Month-by-month traversal and merging.
pub mod aggregator;
/// Immutable portal settings.
pub mod config;
/// Calendar page retrieval.
pub mod fetcher;
/// Calendar page parsing.
pub mod parser;
/// Address form protocol.
pub mod resolver;
/// Reqwest-backed sessions.
pub mod session;

#[cfg(test)]
mod testing;

pub use aggregator::ScheduleAggregator;
pub use config::PortalConfig;
pub use fetcher::CalendarFetcher;
pub use parser::{MonthCalendar, parse_calendar};
pub use resolver::{AddressResolver, BoundSession, CorrelationToken, FormCommand};
pub use session::{HttpSession, SessionClient};

/// Schedule acquisition for the IOK portal over sessions from `C`.
pub struct IokProvider<C = SessionClient> {
    sessions: C,
    config: PortalConfig,
    window: NonZeroU32,
}

impl IokProvider<SessionClient> {
    /// Provider using real HTTP sessions, visiting `window` months per run.
    #[must_use]
    pub fn new(config: PortalConfig, window: NonZeroU32) -> Self {
        Self::with_sessions(SessionClient::new(&config), config, window)
    }
}

impl<C: SessionPort> IokProvider<C> {
    /// Provider drawing its sessions from `sessions`.
    #[must_use]
    pub fn with_sessions(sessions: C, config: PortalConfig, window: NonZeroU32) -> Self {
        Self {
            sessions,
            config,
            window,
        }
    }

    /// Settings this provider talks to the portal with.
    #[must_use]
    pub fn config(&self) -> &PortalConfig {
        &self.config
    }

    /// Run one acquisition starting at `start`.
    ///
    /// # Errors
    ///
    /// Returns the [`PortError`] of the first failing step.
    pub async fn snapshot_from(
        &self,
        address: &Address,
        start: YearMonth,
    ) -> Result<ScheduleSnapshot, PortError> {
        let aggregator = ScheduleAggregator::new(&self.config, self.window);
        let mut session = self.bind(address).await?;
        let result = aggregator.build_snapshot(&mut session, start).await;
        session.close().await;

        if let Ok(snapshot) = &result {
            info!(%address, %start, days = snapshot.len(), "schedule acquired");
        }
        result
    }

    /// Check the address by binding it and parsing the calendar of `month`.
    ///
    /// Every failure collapses to `false`.
    pub async fn validate_at(&self, address: &Address, month: YearMonth) -> bool {
        let outcome = match self.bind(address).await {
            Ok(mut session) => {
                let aggregator = ScheduleAggregator::new(&self.config, self.window);
                let parsed = aggregator.fetch_month(&mut session, month).await;
                session.close().await;
                parsed.map(|_calendar| ())
            }
            Err(err) => Err(err),
        };

        match outcome {
            Ok(()) => true,
            Err(err) => {
                info!(%address, error = %err, "address validation failed");
                false
            }
        }
    }

    async fn bind(&self, address: &Address) -> Result<BoundSession<C::Session>, PortError> {
        let session = self.sessions.open()?;
        debug!(%address, "session opened");
        AddressResolver::new(&self.config)
            .resolve(session, address)
            .await
    }
}

fn current_month() -> YearMonth {
    YearMonth::from_date(Local::now().date_naive())
}

#[async_trait]
impl<C> SchedulePort for IokProvider<C>
where
    C: SessionPort,
    C::Session: PortalSession + 'static,
{
    async fn snapshot(&self, address: &Address) -> Result<ScheduleSnapshot, PortError> {
        self.snapshot_from(address, current_month()).await
    }
}

#[async_trait]
impl<C> AddressPort for IokProvider<C>
where
    C: SessionPort,
    C::Session: PortalSession + 'static,
{
    async fn validate(&self, address: &Address) -> bool {
        self.validate_at(address, current_month()).await
    }
}

/// Build the shared provider handle used for both ports of a service.
#[must_use]
pub fn provider(config: PortalConfig, window: NonZeroU32) -> Arc<IokProvider> {
    Arc::new(IokProvider::new(config, window))
}
