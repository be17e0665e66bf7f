//! Binds an anonymous portal session to a city and street.
//!
//! The portal's address form is a Drupal ajax form. Every submission must echo
//! the most recent `form_build_id`, and ajax responses may hand out a new one
//! through an `update_build_id` command.

use std::sync::LazyLock;

use scraper::{Html, Selector};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};

use kliko_core::model::Address;
use kliko_core::ports::{ParseError, PortError, PortalSession, Step};

use crate::config::PortalConfig;

static INPUT: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("input").expect("static selector"));

const UPDATE_BUILD_ID: &str = "update_build_id";

/// Server-issued form token that correlates the steps of one resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorrelationToken(String);

impl CorrelationToken {
    /// Wrap a token value.
    #[must_use]
    pub fn new<T: Into<String>>(value: T) -> Self {
        Self(value.into())
    }

    /// Raw token value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Token to use for the next request after a response carrying `commands`.
    ///
    /// The last `update_build_id` command wins; without one the token is kept.
    #[must_use]
    pub fn adopt(self, commands: &[FormCommand]) -> Self {
        commands
            .iter()
            .rev()
            .find_map(|command| match command {
                FormCommand::UpdateBuildId(new) => Some(Self(new.clone())),
                FormCommand::Other(_) => None,
            })
            .unwrap_or(self)
    }
}

/// One instruction of an ajax response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormCommand {
    /// Replace the form token with the contained value.
    UpdateBuildId(String),
    /// Any other client-side instruction, by command name.
    Other(String),
}

// `new` is only meaningful for token updates, so its type is checked there.
#[derive(Debug, Deserialize)]
struct RawCommand {
    command: String,
    #[serde(default)]
    new: Option<Value>,
}

/// Decode an ajax response body into its instruction sequence.
///
/// # Errors
///
/// Returns [`PortError::Protocol`] for `step` when the body is not a JSON array
/// of command objects, or when a token update carries no string token.
pub fn parse_commands(step: Step, body: &str) -> Result<Vec<FormCommand>, PortError> {
    let raw: Vec<RawCommand> = serde_json::from_str(body)
        .map_err(|err| PortError::protocol(step, format!("malformed instruction array: {err}")))?;

    raw.into_iter()
        .map(|RawCommand { command, new }| {
            if command != UPDATE_BUILD_ID {
                return Ok(FormCommand::Other(command));
            }
            match new {
                Some(Value::String(token)) => Ok(FormCommand::UpdateBuildId(token)),
                Some(_) => Err(PortError::protocol(
                    step,
                    "update_build_id command with a non-string token",
                )),
                None => Err(PortError::protocol(
                    step,
                    "update_build_id command without a new token",
                )),
            }
        })
        .collect()
}

/// Read the initial form token from the landing page markup.
///
/// # Errors
///
/// Returns [`ParseError::MissingFormToken`] when no non-empty `field` input exists.
pub fn extract_form_token(document: &str, field: &str) -> Result<CorrelationToken, ParseError> {
    let html = Html::parse_document(document);
    html.select(&INPUT)
        .filter(|input| input.attr("name") == Some(field))
        .find_map(|input| input.attr("value"))
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(CorrelationToken::new)
        .ok_or_else(|| ParseError::MissingFormToken(field.to_owned()))
}

/// Session whose cookies bind it to a committed address.
///
/// Only [`AddressResolver::resolve`] hands these out, so calendar pages can
/// never be requested from an unbound session.
#[derive(Debug)]
pub struct BoundSession<S> {
    session: S,
    address: Address,
}

impl<S: PortalSession> BoundSession<S> {
    /// Address the session is bound to.
    #[must_use]
    pub fn address(&self) -> &Address {
        &self.address
    }

    pub(crate) fn session_mut(&mut self) -> &mut S {
        &mut self.session
    }

    /// Release the session.
    pub async fn close(self) {
        self.session.close().await;
    }
}

#[derive(Debug)]
enum ResolveState {
    New,
    BaseFetched(CorrelationToken),
    CitySelected(CorrelationToken),
    StreetSelected(CorrelationToken),
    Committed,
}

impl ResolveState {
    fn name(&self) -> &'static str {
        match self {
            ResolveState::New => "new",
            ResolveState::BaseFetched(_) => "base_fetched",
            ResolveState::CitySelected(_) => "city_selected",
            ResolveState::StreetSelected(_) => "street_selected",
            ResolveState::Committed => "committed",
        }
    }
}

/// Drives the four-step address form protocol.
#[derive(Debug, Clone, Copy)]
pub struct AddressResolver<'cfg> {
    config: &'cfg PortalConfig,
}

impl<'cfg> AddressResolver<'cfg> {
    /// Create a resolver for the portal described by `config`.
    #[must_use]
    pub fn new(config: &'cfg PortalConfig) -> Self {
        Self { config }
    }

    /// Bind `session` to `address`.
    ///
    /// The session is consumed. On failure it is closed before the error is
    /// returned and a new run has to start from a fresh session.
    ///
    /// # Errors
    ///
    /// Returns the [`PortError`] of the first step that failed.
    pub async fn resolve<S: PortalSession>(
        &self,
        mut session: S,
        address: &Address,
    ) -> Result<BoundSession<S>, PortError> {
        match self.bind(&mut session, address).await {
            Ok(()) => {
                info!(%address, "address bound to session");
                Ok(BoundSession {
                    session,
                    address: address.clone(),
                })
            }
            Err(err) => {
                debug!(%address, error = %err, "address resolution failed");
                session.close().await;
                Err(err)
            }
        }
    }

    async fn bind<S: PortalSession>(
        &self,
        session: &mut S,
        address: &Address,
    ) -> Result<(), PortError> {
        let mut state = ResolveState::New;
        loop {
            state = match state {
                ResolveState::New => ResolveState::BaseFetched(self.fetch_token(session).await?),
                ResolveState::BaseFetched(token) => {
                    ResolveState::CitySelected(self.select_city(session, address, token).await?)
                }
                ResolveState::CitySelected(token) => {
                    ResolveState::StreetSelected(self.select_street(session, address, token).await?)
                }
                ResolveState::StreetSelected(token) => {
                    self.save(session, address, &token).await?;
                    ResolveState::Committed
                }
                ResolveState::Committed => return Ok(()),
            };
            debug!(state = state.name(), "address resolution advanced");
        }
    }

    async fn fetch_token<S: PortalSession>(
        &self,
        session: &mut S,
    ) -> Result<CorrelationToken, PortError> {
        let page = session
            .get(&self.config.calendar_url(), &[])
            .await?
            .require_success(Step::BasePage)?;
        Ok(extract_form_token(&page.body, &self.config.token_field)?)
    }

    async fn select_city<S: PortalSession>(
        &self,
        session: &mut S,
        address: &Address,
        token: CorrelationToken,
    ) -> Result<CorrelationToken, PortError> {
        let form = [
            ("city", address.city.as_str()),
            (self.config.token_field.as_str(), token.as_str()),
            ("form_id", self.config.form_id.as_str()),
            ("_triggering_element_name", "city"),
            ("_drupal_ajax", "1"),
        ];
        let commands = self
            .submit_ajax(session, Step::CitySelection, &self.config.city_ajax_url(), &form)
            .await?;
        Ok(token.adopt(&commands))
    }

    async fn select_street<S: PortalSession>(
        &self,
        session: &mut S,
        address: &Address,
        token: CorrelationToken,
    ) -> Result<CorrelationToken, PortError> {
        let form = [
            ("city", address.city.as_str()),
            (self.config.token_field.as_str(), token.as_str()),
            ("form_id", self.config.form_id.as_str()),
            ("street", address.street.as_str()),
            ("_triggering_element_name", "street"),
            ("_drupal_ajax", "1"),
        ];
        let commands = self
            .submit_ajax(session, Step::StreetSelection, &self.config.street_ajax_url(), &form)
            .await?;
        Ok(token.adopt(&commands))
    }

    async fn save<S: PortalSession>(
        &self,
        session: &mut S,
        address: &Address,
        token: &CorrelationToken,
    ) -> Result<(), PortError> {
        let form = [
            ("city", address.city.as_str()),
            (self.config.token_field.as_str(), token.as_str()),
            ("form_id", self.config.form_id.as_str()),
            ("street", address.street.as_str()),
            ("op", self.config.save_marker.as_str()),
        ];
        session
            .post_form(&self.config.address_save_url(), &form)
            .await?
            .require_success(Step::Save)?;
        Ok(())
    }

    async fn submit_ajax<S: PortalSession>(
        &self,
        session: &mut S,
        step: Step,
        url: &str,
        form: &[(&str, &str)],
    ) -> Result<Vec<FormCommand>, PortError> {
        let response = session
            .post_form(url, form)
            .await?
            .require_success(step)?;
        parse_commands(step, &response.body)
    }
}
