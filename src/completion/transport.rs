//! Fetching suggestion responses.

use crate::config;
use crate::error::Result;
use reqwest::blocking::Client;
use std::time::Duration;
use url::Url;

/// Fetches a suggest URL. Called on the network lane, may block.
pub trait SuggestTransport: Send + Sync {
    fn fetch(&self, url: &Url) -> Result<Vec<u8>>;
}

#[derive(Clone)]
pub struct HttpTransport {
    http: Client,
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport").finish_non_exhaustive()
    }
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .user_agent(config::USER_AGENT)
            .timeout(timeout)
            .build()?;
        Ok(Self { http })
    }
}

impl SuggestTransport for HttpTransport {
    fn fetch(&self, url: &Url) -> Result<Vec<u8>> {
        let response = self.http.get(url.as_str()).send()?.error_for_status()?;
        Ok(response.bytes()?.to_vec())
    }
}
