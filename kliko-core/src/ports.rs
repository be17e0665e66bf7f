//! Traits describing provider capabilities and the shared error taxonomy.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Error as ReqwestError;

use crate::model::{Address, ScheduleSnapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Request step of an acquisition run, used to label failures.
pub enum Step {
    /// Fetching the landing page that carries the initial form token.
    BasePage,
    /// Ajax submission selecting the city.
    CitySelection,
    /// Ajax submission selecting the street.
    StreetSelection,
    /// Final form submission binding the address to the session.
    Save,
    /// Fetching the calendar page of one month.
    Calendar {
        /// Requested year.
        year: i32,
        /// Requested month.
        month: u32,
    },
}

impl fmt::Display for Step {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::BasePage => write!(formatter, "base page"),
            Step::CitySelection => write!(formatter, "city selection"),
            Step::StreetSelection => write!(formatter, "street selection"),
            Step::Save => write!(formatter, "address save"),
            Step::Calendar { year, month } => write!(formatter, "calendar {year:04}-{month:02}"),
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
/// Markup returned by the portal did not have the expected structure.
pub enum ParseError {
    /// The landing page has no usable form token field.
    #[error("form token field `{0}` not found")]
    MissingFormToken(String),
    /// No calendar container on the page.
    #[error("calendar container not found")]
    MissingCalendar,
    /// Calendar container without a table.
    #[error("calendar table not found")]
    MissingTable,
    /// Calendar table without rows.
    #[error("calendar table has no rows")]
    MissingRows,
    /// Calendar table without a single weekday or weekend cell.
    #[error("calendar table has no day cells")]
    MissingDayCells,
    /// Day cell without any text.
    #[error("day cell without a day number")]
    MissingDayNumber,
    /// Day cell text that is not a day of month.
    #[error("invalid day number: {0:?}")]
    InvalidDayNumber(String),
    /// The same day appears in two cells of one page.
    #[error("day {0} listed twice")]
    DuplicateDay(u32),
    /// A waste type entry without a label.
    #[error("empty waste type label on day {0}")]
    EmptyWasteLabel(u32),
    /// A day number that does not exist in the requested month.
    #[error("day {day} does not exist in {year:04}-{month:02}")]
    InvalidDate {
        /// Requested year.
        year: i32,
        /// Requested month.
        month: u32,
        /// Day number found on the page.
        day: u32,
    },
}

#[derive(thiserror::Error, Debug)]
/// Errors that can occur while talking to the portal.
pub enum PortError {
    /// Network layer failed.
    #[error("Network error: {0}")]
    Connection(#[from] ReqwestError),
    /// A request did not complete within the configured timeout.
    #[error("Request to {url} timed out after {after:?}")]
    Timeout {
        /// Requested URL.
        url: String,
        /// Timeout that elapsed.
        after: Duration,
    },
    /// The portal answered, but not in the way the protocol requires.
    #[error("Protocol error during {step}: {reason}")]
    Protocol {
        /// Step that failed.
        step: Step,
        /// What was wrong with the response.
        reason: String,
    },
    /// Returned markup did not have the expected structure.
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),
}

impl PortError {
    /// Shorthand for a [`PortError::Protocol`].
    #[must_use]
    pub fn protocol<R: Into<String>>(step: Step, reason: R) -> Self {
        PortError::Protocol {
            step,
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Raw response from the portal. The status is data, not an error.
pub struct PortalResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body as text.
    pub body: String,
}

impl PortalResponse {
    /// Whether the status is in the 2xx range.
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Return the response unless its status is outside the 2xx range.
    ///
    /// # Errors
    ///
    /// Returns [`PortError::Protocol`] for `step` when the status is not 2xx.
    pub fn require_success(self, step: Step) -> Result<Self, PortError> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(PortError::protocol(
                step,
                format!("unexpected HTTP status {}", self.status),
            ))
        }
    }
}

#[async_trait]
/// Cookie-bearing transport owned by exactly one acquisition run.
pub trait PortalSession: Send {
    /// Issue a GET request with query parameters.
    ///
    /// # Errors
    ///
    /// Returns [`PortError::Connection`] or [`PortError::Timeout`] on transport failure.
    async fn get(&mut self, url: &str, query: &[(&str, &str)]) -> Result<PortalResponse, PortError>;

    /// Issue a form-encoded POST request.
    ///
    /// # Errors
    ///
    /// Returns [`PortError::Connection`] or [`PortError::Timeout`] on transport failure.
    async fn post_form(
        &mut self,
        url: &str,
        form: &[(&str, &str)],
    ) -> Result<PortalResponse, PortError>;

    /// Release the underlying connections.
    async fn close(self);
}

/// Factory handing out fresh, unshared sessions.
pub trait SessionPort: Send + Sync {
    /// Session type produced by this factory.
    type Session: PortalSession;

    /// Open a new session with an empty cookie jar.
    ///
    /// # Errors
    ///
    /// Returns a [`PortError`] when the transport cannot be built.
    fn open(&self) -> Result<Self::Session, PortError>;
}

#[async_trait]
/// Trait for provider-specific address validation.
pub trait AddressPort: Send + Sync {
    /// Check whether the portal accepts the address and serves a calendar for it.
    ///
    /// Every failure collapses to `false`.
    async fn validate(&self, address: &Address) -> bool;
}

#[async_trait]
/// Trait for provider-specific pickup schedule backends.
pub trait SchedulePort: Send + Sync {
    /// Run one complete acquisition for the address.
    ///
    /// # Errors
    ///
    /// Returns a [`PortError`] when any step of the run fails. No partial
    /// snapshot is produced in that case.
    async fn snapshot(&self, address: &Address) -> Result<ScheduleSnapshot, PortError>;
}
