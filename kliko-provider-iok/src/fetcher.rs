//! Calendar page retrieval for a bound session.

use tracing::debug;

use kliko_core::model::YearMonth;
use kliko_core::ports::{PortError, PortalSession, Step};

use crate::config::PortalConfig;
use crate::resolver::BoundSession;

/// Requests the calendar page of one month.
#[derive(Debug, Clone, Copy)]
pub struct CalendarFetcher<'cfg> {
    config: &'cfg PortalConfig,
}

impl<'cfg> CalendarFetcher<'cfg> {
    /// Create a fetcher for the portal described by `config`.
    #[must_use]
    pub fn new(config: &'cfg PortalConfig) -> Self {
        Self { config }
    }

    /// Fetch the raw calendar markup for `month`.
    ///
    /// # Errors
    ///
    /// Returns [`PortError::Connection`] or [`PortError::Timeout`] on transport
    /// failure, and [`PortError::Protocol`] when the portal answers with a
    /// non-2xx status.
    pub async fn fetch<S: PortalSession>(
        &self,
        session: &mut BoundSession<S>,
        month: YearMonth,
    ) -> Result<String, PortError> {
        let year = month.year.to_string();
        let month_number = month.month.to_string();

        let page = session
            .session_mut()
            .get(
                &self.config.calendar_url(),
                &[("year", year.as_str()), ("month", month_number.as_str())],
            )
            .await?
            .require_success(Step::Calendar {
                year: month.year,
                month: month.month,
            })?;

        debug!(%month, bytes = page.body.len(), "calendar page fetched");
        Ok(page.body)
    }
}
