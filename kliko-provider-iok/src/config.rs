//! Immutable portal settings injected into every component.

use std::time::Duration;

use serde::Deserialize;

const BASE_URL: &str = "https://www.iok.be";

/// Endpoints, form identifiers and transport settings of the IOK portal.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PortalConfig {
    /// Scheme and host every path is appended to.
    pub base_url: String,
    /// Landing page, also the calendar page when given `year`/`month`.
    pub calendar_path: String,
    /// Ajax endpoint for the city selection step.
    pub city_ajax_path: String,
    /// Ajax endpoint for the street selection step.
    ///
    /// The portal's own form script posts here with a differently ordered
    /// query string than for the city step, repeating `_wrapper_format`.
    pub street_ajax_path: String,
    /// Form endpoint for the final save step.
    pub address_save_path: String,
    /// Name of the hidden field carrying the form token.
    pub token_field: String,
    /// Fixed `form_id` of the address form.
    pub form_id: String,
    /// Value of the `op` field that commits the address.
    pub save_marker: String,
    /// User agent sent with every request.
    pub user_agent: String,
    /// Upper bound for each individual request.
    #[serde(with = "seconds")]
    pub request_timeout: Duration,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            base_url: BASE_URL.to_owned(),
            calendar_path: "/afvalkalender".to_owned(),
            city_ajax_path:
                "/adres-kiezen?return=/afvalkalender&ajax_form=1&_wrapper_format=drupal_ajax"
                    .to_owned(),
            street_ajax_path: "/adres-kiezen?_wrapper_format=drupal_ajax&ajax_form=1&return=/afvalkalender&_wrapper_format=drupal_ajax".to_owned(),
            address_save_path: "/adres-kiezen?return=/afvalkalender".to_owned(),
            token_field: "form_build_id".to_owned(),
            form_id: "e2e_iok_address_form".to_owned(),
            save_marker: "Opslaan".to_owned(),
            user_agent: concat!("kliko/", env!("CARGO_PKG_VERSION")).to_owned(),
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl PortalConfig {
    /// Same settings against a different host, e.g. a mirror or a test server.
    #[must_use]
    pub fn with_base_url<U: Into<String>>(mut self, base_url: U) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Same settings with a different per-request timeout.
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub(crate) fn calendar_url(&self) -> String {
        self.url(&self.calendar_path)
    }

    pub(crate) fn city_ajax_url(&self) -> String {
        self.url(&self.city_ajax_path)
    }

    pub(crate) fn street_ajax_url(&self) -> String {
        self.url(&self.street_ajax_path)
    }

    pub(crate) fn address_save_url(&self) -> String {
        self.url(&self.address_save_path)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url.trim_end_matches('/'))
    }
}

mod seconds {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}
