//! Scripted in-memory sessions for unit tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use kliko_core::model::Address;
use kliko_core::ports::{PortError, PortalResponse, PortalSession, SessionPort};

use crate::config::PortalConfig;
use crate::resolver::{AddressResolver, BoundSession};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Request {
    Get {
        url: String,
        query: Vec<(String, String)>,
    },
    Post {
        url: String,
        form: Vec<(String, String)>,
    },
}

impl Request {
    pub(crate) fn field(&self, name: &str) -> Option<&str> {
        let pairs = match self {
            Request::Get { query, .. } => query,
            Request::Post { form, .. } => form,
        };
        pairs
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

pub(crate) type Outcome = Result<PortalResponse, PortError>;

pub(crate) fn ok(body: &str) -> Outcome {
    Ok(PortalResponse {
        status: 200,
        body: body.to_owned(),
    })
}

pub(crate) fn status(code: u16) -> Outcome {
    Ok(PortalResponse {
        status: code,
        body: String::new(),
    })
}

pub(crate) fn base_page(token: &str) -> Outcome {
    ok(&format!(
        r#"<html><body><form id="e2e-iok-address-form">
            <input type="hidden" name="form_id" value="e2e_iok_address_form">
            <input type="hidden" name="form_build_id" value="{token}">
        </form></body></html>"#
    ))
}

pub(crate) fn token_update(token: &str) -> Outcome {
    ok(&format!(
        r#"[{{"command":"settings","merge":true}},{{"command":"update_build_id","old":"stale","new":"{token}"}}]"#
    ))
}

/// Responses of a successful four-step address binding.
pub(crate) fn binding_script() -> Vec<Outcome> {
    vec![
        base_page("abc123"),
        token_update("xyz789"),
        token_update("street-token"),
        ok("<html>saved</html>"),
    ]
}

/// A session already bound to a test address, followed by `after_binding`.
pub(crate) async fn bound_session(
    config: &PortalConfig,
    after_binding: Vec<Outcome>,
) -> (BoundSession<ScriptedSession>, Recorder) {
    let mut script = binding_script();
    script.extend(after_binding);
    let (session, recorder) = ScriptedSession::new(script);
    let bound = AddressResolver::new(config)
        .resolve(session, &Address::new("Geel", "Markt"))
        .await
        .expect("scripted binding succeeds");
    (bound, recorder)
}

/// Shared view on what a scripted session saw.
#[derive(Debug, Clone, Default)]
pub(crate) struct Recorder {
    requests: Arc<Mutex<Vec<Request>>>,
    closed: Arc<AtomicUsize>,
}

impl Recorder {
    pub(crate) fn requests(&self) -> Vec<Request> {
        self.requests.lock().expect("request log").clone()
    }

    pub(crate) fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Replays canned responses in order and records every request.
#[derive(Debug)]
pub(crate) struct ScriptedSession {
    outcomes: VecDeque<Outcome>,
    recorder: Recorder,
}

impl ScriptedSession {
    pub(crate) fn new(outcomes: Vec<Outcome>) -> (Self, Recorder) {
        let recorder = Recorder::default();
        let session = Self {
            outcomes: outcomes.into(),
            recorder: recorder.clone(),
        };
        (session, recorder)
    }

    fn next(&mut self, request: Request) -> Outcome {
        self.recorder
            .requests
            .lock()
            .expect("request log")
            .push(request);
        self.outcomes
            .pop_front()
            .unwrap_or_else(|| panic!("no scripted response left"))
    }
}

fn owned(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
    pairs
        .iter()
        .map(|(key, value)| ((*key).to_owned(), (*value).to_owned()))
        .collect()
}

#[async_trait]
impl PortalSession for ScriptedSession {
    async fn get(&mut self, url: &str, query: &[(&str, &str)]) -> Result<PortalResponse, PortError> {
        self.next(Request::Get {
            url: url.to_owned(),
            query: owned(query),
        })
    }

    async fn post_form(
        &mut self,
        url: &str,
        form: &[(&str, &str)],
    ) -> Result<PortalResponse, PortError> {
        self.next(Request::Post {
            url: url.to_owned(),
            form: owned(form),
        })
    }

    async fn close(self) {
        self.recorder.closed.fetch_add(1, Ordering::SeqCst);
    }
}

/// Session factory handing out one scripted session.
pub(crate) struct ScriptedClient {
    script: Mutex<Option<ScriptedSession>>,
}

impl ScriptedClient {
    pub(crate) fn new(outcomes: Vec<Outcome>) -> (Self, Recorder) {
        let (session, recorder) = ScriptedSession::new(outcomes);
        let client = Self {
            script: Mutex::new(Some(session)),
        };
        (client, recorder)
    }
}

impl SessionPort for ScriptedClient {
    type Session = ScriptedSession;

    fn open(&self) -> Result<ScriptedSession, PortError> {
        Ok(self
            .script
            .lock()
            .expect("script lock")
            .take()
            .unwrap_or_else(|| panic!("scripted client opened twice")))
    }
}
