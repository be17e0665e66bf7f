//! Month-by-month traversal that merges calendar pages into one snapshot.

use std::num::NonZeroU32;

use tracing::debug;

use kliko_core::model::{ScheduleSnapshot, WasteDay, YearMonth};
use kliko_core::ports::{ParseError, PortError, PortalSession};

use crate::config::PortalConfig;
use crate::fetcher::CalendarFetcher;
use crate::parser::{MonthCalendar, parse_calendar};
use crate::resolver::BoundSession;

/// Walks a window of consecutive months on a bound session.
#[derive(Debug, Clone, Copy)]
pub struct ScheduleAggregator<'cfg> {
    fetcher: CalendarFetcher<'cfg>,
    window: NonZeroU32,
}

impl<'cfg> ScheduleAggregator<'cfg> {
    /// Create an aggregator covering `window` months per run.
    #[must_use]
    pub fn new(config: &'cfg PortalConfig, window: NonZeroU32) -> Self {
        Self {
            fetcher: CalendarFetcher::new(config),
            window,
        }
    }

    /// Number of months visited per run.
    #[must_use]
    pub fn window(&self) -> NonZeroU32 {
        self.window
    }

    /// Fetch and parse every month of the window starting at `start`.
    ///
    /// Months are visited in increasing order, so entries are collected in
    /// chronological order. The first failing month aborts the whole run.
    ///
    /// # Errors
    ///
    /// Returns the [`PortError`] of the first month that could not be fetched
    /// or parsed. No snapshot is produced in that case.
    pub async fn build_snapshot<S: PortalSession>(
        &self,
        session: &mut BoundSession<S>,
        start: YearMonth,
    ) -> Result<ScheduleSnapshot, PortError> {
        let mut days = Vec::new();

        for month in start.span(self.window.get()) {
            let calendar = self.fetch_month(session, month).await?;
            days.extend(waste_days(month, calendar)?);
        }

        debug!(%start, window = self.window.get(), days = days.len(), "schedule window aggregated");
        Ok(ScheduleSnapshot::new(days))
    }

    /// Fetch and parse a single month.
    ///
    /// # Errors
    ///
    /// Returns a [`PortError`] when the page cannot be fetched or parsed.
    pub async fn fetch_month<S: PortalSession>(
        &self,
        session: &mut BoundSession<S>,
        month: YearMonth,
    ) -> Result<MonthCalendar, PortError> {
        let document = self.fetcher.fetch(session, month).await?;
        Ok(parse_calendar(&document)?)
    }
}

/// Turn one month's mapping into dated pickups, dropping days without waste types.
fn waste_days(month: YearMonth, calendar: MonthCalendar) -> Result<Vec<WasteDay>, ParseError> {
    calendar
        .into_iter()
        .filter(|(_, waste_types)| !waste_types.is_empty())
        .map(|(day, waste_types)| {
            let date = month.date(day).ok_or(ParseError::InvalidDate {
                year: month.year,
                month: month.month,
                day,
            })?;
            Ok(WasteDay { date, waste_types })
        })
        .collect()
}
