//! Shared ureq plumbing: one agent per client, a fixed auth header, and
//! mapping of ureq failures onto [`RemoteError`].

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;

use tracklink_core::RemoteError;

/// Longest response body kept in an error message.
const MAX_ERROR_BODY: usize = 512;

pub(crate) struct Http {
    agent: ureq::Agent,
    authorization: String,
}

impl Http {
    pub(crate) fn new(authorization: String, timeout: Duration) -> Self {
        Self {
            agent: ureq::AgentBuilder::new().timeout(timeout).build(),
            authorization,
        }
    }

    fn request(&self, method: &str, url: &str, query: &[(&str, &str)]) -> ureq::Request {
        let mut request = self
            .agent
            .request(method, url)
            .set("Authorization", &self.authorization)
            .set("Accept", "application/json");
        for (key, value) in query {
            request = request.query(key, value);
        }
        request
    }

    pub(crate) fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<T, RemoteError> {
        tracing::debug!(url, "GET");
        let response = self
            .request("GET", url, query)
            .call()
            .map_err(|e| map_error(url, e))?;
        decode(url, response)
    }

    pub(crate) fn send_json<B: Serialize, T: DeserializeOwned>(
        &self,
        method: &str,
        url: &str,
        body: &B,
    ) -> Result<T, RemoteError> {
        tracing::debug!(url, method, "sending");
        let response = self
            .request(method, url, &[])
            .send_json(body)
            .map_err(|e| map_error(url, e))?;
        decode(url, response)
    }

    /// Like [`Http::send_json`] for endpoints whose response body is ignored.
    pub(crate) fn send(&self, method: &str, url: &str, body: &impl Serialize) -> Result<(), RemoteError> {
        tracing::debug!(url, method, "sending");
        self.request(method, url, &[])
            .send_json(body)
            .map(|_| ())
            .map_err(|e| map_error(url, e))
    }
}

fn decode<T: DeserializeOwned>(url: &str, response: ureq::Response) -> Result<T, RemoteError> {
    response.into_json::<T>().map_err(|e| RemoteError::Decode {
        url: url.to_string(),
        message: e.to_string(),
    })
}

pub(crate) fn map_error(url: &str, error: ureq::Error) -> RemoteError {
    match error {
        ureq::Error::Status(status, response) => {
            let mut body = response.into_string().unwrap_or_default();
            truncate(&mut body, MAX_ERROR_BODY);
            RemoteError::Http {
                url: url.to_string(),
                status,
                body,
            }
        }
        ureq::Error::Transport(transport) => RemoteError::Transport {
            url: url.to_string(),
            message: transport.to_string(),
        },
    }
}

fn truncate(s: &mut String, max: usize) {
    if s.len() > max {
        let mut end = max;
        while !s.is_char_boundary(end) {
            end -= 1;
        }
        s.truncate(end);
        s.push_str("...");
    }
}

/// Join a site root and an API path without doubling or dropping slashes.
pub(crate) fn join(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}
