//! Cookie-bearing HTTP sessions backed by reqwest.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Error as ReqwestError, RequestBuilder};
use tracing::debug;

use kliko_core::ports::{PortError, PortalResponse, PortalSession, SessionPort};

use crate::config::PortalConfig;

/// Opens a fresh reqwest session, with its own cookie jar, per acquisition run.
#[derive(Debug, Clone)]
pub struct SessionClient {
    user_agent: String,
    request_timeout: Duration,
}

impl SessionClient {
    /// Create a session factory using the transport settings of `config`.
    #[must_use]
    pub fn new(config: &PortalConfig) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            request_timeout: config.request_timeout,
        }
    }
}

impl SessionPort for SessionClient {
    type Session = HttpSession;

    fn open(&self) -> Result<HttpSession, PortError> {
        let client = Client::builder()
            .user_agent(self.user_agent.as_str())
            .cookie_store(true)
            .timeout(self.request_timeout)
            .build()?;

        Ok(HttpSession {
            client,
            request_timeout: self.request_timeout,
        })
    }
}

/// One open session. Never shared between runs.
#[derive(Debug)]
pub struct HttpSession {
    client: Client,
    request_timeout: Duration,
}

#[async_trait]
impl PortalSession for HttpSession {
    async fn get(&mut self, url: &str, query: &[(&str, &str)]) -> Result<PortalResponse, PortError> {
        debug!(url, ?query, "GET");
        let req = self.client.get(url).query(query);
        with_timeout(url, self.request_timeout, send(req)).await
    }

    async fn post_form(
        &mut self,
        url: &str,
        form: &[(&str, &str)],
    ) -> Result<PortalResponse, PortError> {
        debug!(url, "POST");
        let req = self.client.post(url).form(form);
        with_timeout(url, self.request_timeout, send(req)).await
    }

    async fn close(self) {
        // Dropping the last client handle shuts its connection pool down.
        drop(self.client);
        debug!("session closed");
    }
}

// Non-2xx statuses are returned as data for the protocol layer to judge.
async fn send(req: RequestBuilder) -> Result<PortalResponse, ReqwestError> {
    let resp = req.send().await?;
    let status = resp.status().as_u16();
    let body = resp.text().await?;
    Ok(PortalResponse { status, body })
}

async fn with_timeout<F>(url: &str, after: Duration, request: F) -> Result<PortalResponse, PortError>
where
    F: Future<Output = Result<PortalResponse, ReqwestError>>,
{
    match tokio::time::timeout(after, request).await {
        Ok(Ok(response)) => Ok(response),
        Ok(Err(err)) if err.is_timeout() => Err(PortError::Timeout {
            url: url.to_owned(),
            after,
        }),
        Ok(Err(err)) => Err(PortError::from(err)),
        Err(_elapsed) => Err(PortError::Timeout {
            url: url.to_owned(),
            after,
        }),
    }
}
