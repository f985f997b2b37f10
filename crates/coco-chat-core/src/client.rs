use futures_util::Stream;
use reqwest::Client;
use serde::Serialize;
use tracing::debug;

use crate::config::Config;
use crate::error::{CocoError, Result};

#[derive(Serialize)]
struct AskRequest {
    /// The question, itself JSON-encoded as the assistant API expects
    message: String,
}

#[derive(Clone)]
pub struct CocoClient {
    client: Client,
    base_url: String,
    api_token: Option<String>,
    access_token: Option<String>,
    integration_id: Option<String>,
}

impl CocoClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_token: None,
            access_token: None,
            integration_id: None,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        let mut client = Self::new(config.server_url());
        client.api_token = config.api_token.clone();
        client.access_token = config.access_token.clone();
        client.integration_id = config.integration_id.clone();
        client
    }

    /// Sent as `X-API-TOKEN`
    pub fn with_api_token(mut self, token: &str) -> Self {
        self.api_token = Some(token.to_string());
        self
    }

    /// Sent as `Authorization: Bearer ...`
    pub fn with_access_token(mut self, token: &str) -> Self {
        self.access_token = Some(token.to_string());
        self
    }

    /// Sent as `APP-INTEGRATION-ID`
    pub fn with_integration_id(mut self, id: &str) -> Self {
        self.integration_id = Some(id.to_string());
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Ask an assistant a question and return the streamed NDJSON body.
    ///
    /// A non-success status is an error carrying the response text.
    pub async fn ask(
        &self,
        assistant_id: &str,
        question: &str,
    ) -> Result<impl Stream<Item = reqwest::Result<impl AsRef<[u8]>>>> {
        let url = format!("{}/assistant/{}/_ask", self.base_url, assistant_id);

        let request = AskRequest {
            message: serde_json::to_string(question)?,
        };

        let mut builder = self.client.post(&url).json(&request);
        if let Some(token) = &self.api_token {
            builder = builder.header("X-API-TOKEN", token);
        }
        if let Some(token) = &self.access_token {
            builder = builder.bearer_auth(token);
        }
        if let Some(id) = &self.integration_id {
            builder = builder.header("APP-INTEGRATION-ID", id);
        }

        debug!(%url, "asking assistant");
        let response = builder.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(CocoError::Status { status, body });
        }

        Ok(response.bytes_stream())
    }
}
