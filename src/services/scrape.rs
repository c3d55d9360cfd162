use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use rand::Rng;
use scraper::{Html, Selector};
use url::Url;

use crate::domain::{
    page::Page,
    record::{JobRecord, ResultTable},
};

/// Fetch strategy for one site. `keywords` carries the current search
/// terms so that form-driven fetchers can inject them when the job's
/// keyword parameter name is empty.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str, keywords: &[String]) -> Result<Page>;
}

/// Parse strategy for one site. Pure functions over the fetched page
/// source, no I/O.
pub trait PageParser: Send + Sync {
    fn parse_page(&self, page: &Page) -> Vec<JobRecord>;

    /// Default continuation check: a rel="next" anchor on the page.
    fn has_next_page(&self, page: &Page) -> bool {
        let document = Html::parse_document(&page.source);
        let next_link = Selector::parse(r#"a[rel="next"]"#).unwrap();
        document.select(&next_link).next().is_some()
    }
}

/// Uniform inter-page delay bounds in seconds. Zero bounds skip the
/// delay entirely, which is how tests run.
#[derive(Debug, Clone, Copy)]
pub struct DelayBounds {
    pub min_secs: f64,
    pub max_secs: f64,
}

impl DelayBounds {
    pub const NONE: DelayBounds = DelayBounds {
        min_secs: 0.0,
        max_secs: 0.0,
    };
}

impl Default for DelayBounds {
    fn default() -> Self {
        DelayBounds {
            min_secs: 1.5,
            max_secs: 3.0,
        }
    }
}

/// One site search: where to search, how keywords enter the query, and
/// the fixed output column order.
#[derive(Debug, Clone)]
pub struct ScrapeJob {
    pub base_url: String,
    pub kw_param_name: String,
    pub kw_join: String,
    pub out_cols: Vec<String>,
    pub delay: DelayBounds,
}

/// Merges the joined keywords into the base URL's query under
/// `kw_param_name`, replacing an existing value in place and preserving
/// every other URL component. An empty parameter name leaves the URL
/// untouched; keyword injection is then the fetch strategy's job.
pub fn build_search_url(
    base_url: &str,
    keywords: &[String],
    kw_param_name: &str,
    kw_join: &str,
) -> Result<String> {
    if kw_param_name.is_empty() {
        return Ok(base_url.to_string());
    }

    let mut url = Url::parse(base_url)?;
    let search_string = keywords.join(kw_join);

    let existing: Vec<(String, String)> = url
        .query_pairs()
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();

    let mut merged: Vec<(String, String)> = Vec::with_capacity(existing.len() + 1);
    let mut replaced = false;
    for (key, value) in existing {
        match key == kw_param_name && !replaced {
            true => {
                merged.push((key, search_string.clone()));
                replaced = true;
            }
            false => merged.push((key, value)),
        }
    }
    if !replaced {
        merged.push((kw_param_name.to_string(), search_string));
    }

    {
        let mut pairs = url.query_pairs_mut();
        pairs.clear();
        pairs.extend_pairs(merged.iter().map(|(k, v)| (k.as_str(), v.as_str())));
    }

    Ok(url.to_string())
}

pub async fn politeness_delay(bounds: DelayBounds) {
    if bounds.max_secs <= 0.0 {
        return;
    }
    let secs = rand::thread_rng().gen_range(bounds.min_secs..=bounds.max_secs);
    tokio::time::sleep(Duration::from_secs_f64(secs)).await;
}

/// Paginated scrape loop: fetch, parse, accumulate, paginate until a
/// page comes back empty or the site reports no next page. A fetch
/// failure ends pagination with the rows collected so far; it never
/// escapes to the caller.
pub async fn scrape(
    job: &ScrapeJob,
    keywords: &[String],
    fetcher: &dyn PageFetcher,
    parser: &dyn PageParser,
) -> ResultTable {
    let search_url =
        match build_search_url(&job.base_url, keywords, &job.kw_param_name, &job.kw_join) {
            Ok(url) => url,
            Err(e) => {
                log::error!("Could not build search url from {}: {:?}", job.base_url, e);
                return ResultTable::empty(job.out_cols.clone());
            }
        };

    let mut collected: Vec<JobRecord> = vec![];
    let mut page_index: u32 = 0;

    loop {
        let url = match page_index {
            0 => search_url.clone(),
            _ => format!("{}&page={}", search_url, page_index),
        };
        log::info!("Fetching page {}", page_index + 1);

        let page = match fetcher.fetch(&url, keywords).await {
            Ok(page) => page,
            Err(e) => {
                log::error!("Failed to fetch {}: {:?}", url, e);
                break;
            }
        };

        let jobs_on_page = parser.parse_page(&page);
        if jobs_on_page.is_empty() {
            log::info!("No jobs found. Stopping.");
            break;
        }
        collected.extend(jobs_on_page);

        if !parser.has_next_page(&page) {
            log::info!("Reached last page.");
            break;
        }

        page_index += 1;
        politeness_delay(job.delay).await;
    }

    log::info!("Collected {} jobs from search", collected.len());
    ResultTable::from_records(collected, &job.out_cols)
}
