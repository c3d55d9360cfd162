use std::time::{Duration, Instant};

use anyhow::Result;
use async_trait::async_trait;
use thirtyfour::{error::WebDriverResult, By, DesiredCapabilities, WebDriver};

use crate::domain::page::Page;

use super::scrape::{politeness_delay, DelayBounds, PageFetcher};

const POLL_INTERVAL: Duration = Duration::from_millis(500);
const MAX_SCROLLS: u32 = 100;
const SCROLL_WAIT: Duration = Duration::from_secs(15);
const NO_CHANGE_THRESHOLD: u32 = 3;

/// One WebDriver session, shared by every fetch of an aggregation run.
/// Acquire before aggregating, quit exactly once afterwards.
pub struct Droid {
    pub driver: WebDriver,
}

impl Droid {
    pub async fn new(webdriver_url: &str) -> Result<Self> {
        let caps = DesiredCapabilities::chrome();
        let driver = WebDriver::new(webdriver_url, caps).await?;
        driver.maximize_window().await?;

        Ok(Droid { driver })
    }

    pub async fn quit(self) {
        match self.driver.quit().await {
            Ok(()) => log::info!("Browser closed"),
            Err(e) => log::warn!("Error closing driver: {:?}", e),
        }
    }
}

/// In-page search form: where to type the keyword, what to click, and
/// the marker that tells a no-results page apart from a slow one.
pub struct SearchBox {
    pub input_id: String,
    pub button_id: String,
    pub no_results_id: String,
}

/// Browser-session fetcher for sites that render listings client-side.
/// Optionally drives an in-page search form (sites with an empty keyword
/// parameter) and scrolls a grid container until no new rows load.
pub struct BrowserFetcher<'a> {
    droid: &'a Droid,
    wait_selector: String,
    wait_timeout: Duration,
    settle: DelayBounds,
    search_box: Option<SearchBox>,
    scroll_container_id: Option<String>,
}

impl<'a> BrowserFetcher<'a> {
    pub fn new(
        droid: &'a Droid,
        wait_selector: &str,
        wait_timeout: Duration,
        settle: DelayBounds,
    ) -> Self {
        BrowserFetcher {
            droid,
            wait_selector: wait_selector.to_string(),
            wait_timeout,
            settle,
            search_box: None,
            scroll_container_id: None,
        }
    }

    pub fn with_search_box(mut self, search_box: SearchBox) -> Self {
        self.search_box = Some(search_box);
        self
    }

    pub fn with_scroll_container(mut self, container_id: &str) -> Self {
        self.scroll_container_id = Some(container_id.to_string());
        self
    }

    async fn wait_for_results(&self) {
        let deadline = Instant::now() + self.wait_timeout;
        loop {
            if self
                .droid
                .driver
                .find(By::Css(self.wait_selector.as_str()))
                .await
                .is_ok()
            {
                return;
            }
            if Instant::now() >= deadline {
                log::warn!("Timeout waiting for {}", self.wait_selector);
                return;
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    /// Types the keyword, clicks search, then races the result records
    /// against the no-results marker. Returns whether results appeared.
    async fn search_with_box(&self, search_box: &SearchBox, keyword: &str) -> WebDriverResult<bool> {
        log::info!("Searching for: {}", keyword);
        let driver = &self.droid.driver;

        let input = driver.find(By::Id(search_box.input_id.as_str())).await?;
        input.clear().await?;
        input.send_keys(keyword).await?;
        driver
            .find(By::Id(search_box.button_id.as_str()))
            .await?
            .click()
            .await?;

        let deadline = Instant::now() + self.wait_timeout;
        loop {
            if driver
                .find(By::Id(search_box.no_results_id.as_str()))
                .await
                .is_ok()
            {
                log::info!("No results found for {}", keyword);
                return Ok(false);
            }
            if driver
                .find(By::Css(self.wait_selector.as_str()))
                .await
                .is_ok()
            {
                return Ok(true);
            }
            if Instant::now() >= deadline {
                log::warn!("Neither results nor no-results marker appeared. Treating as no results.");
                return Ok(false);
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn content_length(&self, container_id: &str) -> WebDriverResult<i64> {
        let script = format!(
            "var elem = document.getElementById('{}'); \
             return elem ? elem.innerHTML.length : document.documentElement.innerHTML.length;",
            container_id
        );
        let ret = self.droid.driver.execute(&script, vec![]).await?;
        let value: &serde_json::Value = ret.json();

        Ok(value.as_i64().unwrap_or(0))
    }

    /// Scrolls the container (or the page, if the container is missing)
    /// until content stops growing for a few rounds.
    async fn scroll_to_load_all(&self, container_id: &str) -> WebDriverResult<()> {
        let scroll_script = format!(
            "var elem = document.getElementById('{}'); \
             if (elem) {{ elem.scrollTop = elem.scrollHeight; }} \
             else {{ window.scrollTo(0, document.body.scrollHeight); }}",
            container_id
        );

        let mut previous_length = self.content_length(container_id).await?;
        let mut no_change_count: u32 = 0;

        for _ in 0..MAX_SCROLLS {
            self.droid.driver.execute(&scroll_script, vec![]).await?;

            let deadline = Instant::now() + SCROLL_WAIT;
            let mut changed = false;
            while Instant::now() < deadline {
                tokio::time::sleep(POLL_INTERVAL).await;
                let length = self.content_length(container_id).await?;
                if length > previous_length {
                    previous_length = length;
                    changed = true;
                    break;
                }
            }

            match changed {
                true => no_change_count = 0,
                false => {
                    no_change_count += 1;
                    if no_change_count >= NO_CHANGE_THRESHOLD {
                        break;
                    }
                }
            }
        }

        log::info!("Finished loading, content length {}", previous_length);
        Ok(())
    }
}

#[async_trait]
impl PageFetcher for BrowserFetcher<'_> {
    async fn fetch(&self, url: &str, keywords: &[String]) -> Result<Page> {
        let driver = &self.droid.driver;
        driver.goto(url).await?;
        self.wait_for_results().await;

        if let Some(search_box) = &self.search_box {
            if let Some(keyword) = keywords.first() {
                match self.search_with_box(search_box, keyword).await {
                    Ok(true) => {}
                    Ok(false) => {
                        // No results for this keyword; hand back the page
                        // as-is so the parser finds nothing.
                        let source = driver.source().await?;
                        return Ok(Page::new(url, source));
                    }
                    Err(e) => {
                        log::warn!("Search did not work: {:?}", e);
                        let source = driver.source().await?;
                        return Ok(Page::new(url, source));
                    }
                }
            }
        }

        match &self.scroll_container_id {
            Some(container_id) => {
                if let Err(e) = self.scroll_to_load_all(container_id).await {
                    log::warn!("Scroll error: {:?}", e);
                }
            }
            None => politeness_delay(self.settle).await,
        }

        let source = driver.source().await?;
        Ok(Page::new(url, source))
    }
}
