use crate::models::OnlineRequest;
use anyhow::{Context, Result};
use reqwest::Client;
use std::time::Duration;
use url::Url;

/// What happened to one outbound call to the coordination service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostOutcome {
    /// The server answered, with any status.
    Responded { code: u16, body: String },
    /// The request could not be built (bad URL or scheme).
    BeginFailed(String),
    /// Connect, timeout or transport failure.
    PostFailed(String),
}

#[derive(Clone)]
pub struct ServerApi {
    client: Client,
}

impl ServerApi {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("build heartbeat http client")?;
        Ok(Self { client })
    }

    pub async fn post_online(&self, url: &str, request: &OnlineRequest) -> PostOutcome {
        let url = match Url::parse(url) {
            Ok(url) => url,
            Err(err) => return PostOutcome::BeginFailed(format!("invalid url: {}", err)),
        };
        if url.scheme() != "http" && url.scheme() != "https" {
            return PostOutcome::BeginFailed(format!("unsupported scheme {}", url.scheme()));
        }

        let response = match self.client.post(url).json(request).send().await {
            Ok(response) => response,
            Err(err) => return PostOutcome::PostFailed(err.to_string()),
        };
        let code = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        PostOutcome::Responded { code, body }
    }
}
