use std::time::Duration;

use async_trait::async_trait;
use protocol::{Collection, CollectionEnvelope, QueryParams};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, de::DeserializeOwned};
use tracing::warn;

use crate::error::FetchError;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Anything that can answer a listing request for one collection.
#[async_trait]
pub trait CollectionSource<R>: Send + Sync {
    async fn fetch(&self, params: QueryParams) -> Result<CollectionEnvelope<R>, FetchError>;
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

/// `GET {base_url}/api/{collection}` over reqwest.
#[derive(Debug, Clone)]
pub struct HttpSource {
    client: Client,
    base_url: String,
    collection: Collection,
    token: Option<String>,
    timeout: Duration,
}

impl HttpSource {
    pub fn new(base_url: impl Into<String>, collection: Collection) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            collection,
            token: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn url(&self) -> String {
        format!("{}/api/{}", self.base_url, self.collection)
    }
}

#[async_trait]
impl<R> CollectionSource<R> for HttpSource
where
    R: DeserializeOwned + Send + 'static,
{
    async fn fetch(&self, params: QueryParams) -> Result<CollectionEnvelope<R>, FetchError> {
        let mut request = self
            .client
            .get(self.url())
            .query(params.pairs())
            .timeout(self.timeout);

        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| {
            warn!("Request to {} failed: {e}", self.url());
            FetchError::Execution(e.to_string())
        })?;

        let status = response.status();
        if status.is_success() {
            return response
                .json()
                .await
                .map_err(|e| FetchError::Execution(format!("Undecodable envelope: {e}")));
        }

        let message = match response.json::<ErrorBody>().await {
            Ok(body) => body.error,
            Err(_) => status.to_string(),
        };

        Err(match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => FetchError::Authorization {
                status: status.as_u16(),
                message,
            },
            _ => FetchError::Execution(message),
        })
    }
}
