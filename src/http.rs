//! Thin HTTP layer used by both fetch paths.
use crate::error::{FetchError, Outcome};
use async_trait::async_trait;
use log::debug;
use std::time::Duration;

#[async_trait]
pub trait HttpTransport: Send + Sync + 'static {
    /// GET `url` and return the body. Non-success status is an error.
    async fn get(&self, url: &str) -> Outcome<Vec<u8>>;

    /// POST `body` as JSON with a bearer token and return the response body.
    async fn post_json(
        &self,
        url: &str,
        bearer_token: &str,
        body: &serde_json::Value,
    ) -> Outcome<Vec<u8>>;
}

pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> Outcome<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("quanquan-vfp/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get(&self, url: &str) -> Outcome<Vec<u8>> {
        debug!("GET {}", url);
        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(FetchError::Http {
                status: response.status(),
            });
        }
        Ok(response.bytes().await?.to_vec())
    }

    async fn post_json(
        &self,
        url: &str,
        bearer_token: &str,
        body: &serde_json::Value,
    ) -> Outcome<Vec<u8>> {
        debug!("POST {}", url);
        let response = self
            .client
            .post(url)
            .bearer_auth(bearer_token)
            .json(body)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(FetchError::Http {
                status: response.status(),
            });
        }
        Ok(response.bytes().await?.to_vec())
    }
}
