use crate::error::Result;
use async_trait::async_trait;
use std::time::Duration;

/// Page-fetching capability: given a listing URL, return rendered page
/// markup ready for structured-data extraction.
///
/// Implementations must bound the navigation/read time and send a stable
/// identifying header; a rendering-engine-backed implementation can slot in
/// behind this trait without touching the pipeline.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String>;
}

/// Plain HTTP fetcher. Good enough for sources that ship their JSON-LD in
/// the initial document rather than injecting it client-side.
pub struct ReqwestFetcher {
    client: reqwest::Client,
}

impl ReqwestFetcher {
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl PageFetcher for ReqwestFetcher {
    async fn fetch(&self, url: &str) -> Result<String> {
        let response = self.client.get(url).send().await?;
        let body = response.error_for_status()?.text().await?;
        Ok(body)
    }
}
