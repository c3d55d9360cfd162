use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use fake_user_agent::get_rua;
use reqwest::Client;

use crate::domain::page::Page;

use super::scrape::PageFetcher;

/// Plain HTTP fetcher for sites that render listings server-side.
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .user_agent(get_rua())
            .read_timeout(Duration::from_secs(30))
            .build()?;

        Ok(HttpFetcher { client })
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str, _keywords: &[String]) -> Result<Page> {
        let response = self.client.get(url).send().await?.error_for_status()?;
        let source = response.text().await?;

        Ok(Page::new(url, source))
    }
}
