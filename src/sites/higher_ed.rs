use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use scraper::{Html, Selector};
use url::Url;

use crate::configuration::{Profile, Settings};
use crate::domain::{
    keywords::KeywordGroup,
    page::Page,
    record::{JobRecord, ResultTable, SortKey},
};
use crate::services::aggregate::aggregate;
use crate::services::droid::{BrowserFetcher, Droid};
use crate::services::export::write_csv;
use crate::services::scrape::{PageParser, ScrapeJob};

use super::{element_text, join_url};

const REMOTE_BASE_URL: &str = "https://www.higheredjobs.com/search/remote.cfm";
const LAB_BASE_URL: &str =
    "https://www.higheredjobs.com/admin/search.cfm?JobCat=150&CatName=Laboratory%20and%20Research";
const WAIT_SELECTORS: &str = ".record, .row.record, div[class*='record']";

const OUT_COLS: [&str; 9] = [
    "title",
    "organization",
    "location",
    "url",
    "salary",
    "category",
    "posted_date",
    "priority",
    "job_code",
];

/// higheredjobs.com renders each posting as a row/record div with a
/// left column (title link, organization, location, salary) and a right
/// column (category, posted date).
pub struct HigherEdParser {
    base_url: String,
}

impl HigherEdParser {
    pub fn new(base_url: &str) -> Self {
        HigherEdParser {
            base_url: base_url.to_string(),
        }
    }
}

fn job_code_from_url(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    parsed
        .query_pairs()
        .find(|(key, _)| key == "JobCode")
        .map(|(_, value)| value.into_owned())
}

impl PageParser for HigherEdParser {
    fn parse_page(&self, page: &Page) -> Vec<JobRecord> {
        let document = Html::parse_document(&page.source);
        let record_selector = Selector::parse("div.row.record").unwrap();
        let left_selector = Selector::parse("div.col-sm-7").unwrap();
        let right_selector = Selector::parse("div.col-sm-5").unwrap();
        let link_selector = Selector::parse("a").unwrap();
        let salary_selector = Selector::parse("span.job-salary").unwrap();
        let marker_selector = Selector::parse("span.addon-marker").unwrap();

        let records: Vec<_> = document.select(&record_selector).collect();
        if records.is_empty() {
            log::info!("No more job listings found.");
            return vec![];
        }
        log::info!("Found {} jobs on this page", records.len());

        let mut jobs_on_page = vec![];
        for record in records {
            let mut job = JobRecord::new();
            for col in OUT_COLS {
                job.set(col, "");
            }

            if let Some(left) = record.select(&left_selector).next() {
                if let Some(link) = left.select(&link_selector).next() {
                    job.set("title", element_text(&link));
                    if let Some(url) = link
                        .value()
                        .attr("href")
                        .and_then(|href| join_url(&self.base_url, href))
                    {
                        if let Some(code) = job_code_from_url(&url) {
                            job.set("job_code", code);
                        }
                        job.set("url", url);
                    }
                }

                // Direct text nodes between the <br> tags hold the
                // organization and location lines.
                let text_parts: Vec<&str> = left
                    .children()
                    .filter_map(|child| child.value().as_text())
                    .map(|text| text.trim())
                    .filter(|text| !text.is_empty())
                    .collect();
                if let Some(organization) = text_parts.first() {
                    job.set("organization", *organization);
                }
                if let Some(location) = text_parts.get(1) {
                    job.set("location", *location);
                }

                if let Some(salary) = left.select(&salary_selector).next() {
                    job.set("salary", element_text(&salary));
                }
            }

            if let Some(right) = record.select(&right_selector).next() {
                let parts: Vec<&str> = right
                    .text()
                    .map(str::trim)
                    .filter(|text| !text.is_empty())
                    .collect();
                if let Some(category) = parts.first() {
                    job.set("category", *category);
                }
                if let Some(posted) = parts.iter().find(|part| part.contains("Posted")) {
                    job.set("posted_date", posted.replace("Posted", "").trim());
                }
            }

            let priority = record
                .select(&marker_selector)
                .next()
                .is_some_and(|marker| element_text(&marker).contains("Priority"));
            job.set(
                "priority",
                match priority {
                    true => "Yes",
                    false => "No",
                },
            );

            match job.has_value("title") || job.has_value("job_code") {
                true => jobs_on_page.push(job),
                false => log::warn!("Skipping job record with no title or job code"),
            }
        }

        jobs_on_page
    }
}

pub async fn run(settings: &Settings, profile: &Profile) -> Result<ResultTable> {
    log::info!("Running HigherEd scraper");

    let remote_jobs = scrape_category(
        settings,
        profile,
        REMOTE_BASE_URL,
        &profile.search_kw_highered_remote,
        "higher_ed_remote_jobs.csv",
    )
    .await?
    .with_constant_column("remote_or_lab", "remote")
    .with_constant_column("remote", "True");

    let lab_jobs = scrape_category(
        settings,
        profile,
        LAB_BASE_URL,
        &profile.search_kw_highered_lab,
        "higher_ed_lab_jobs.csv",
    )
    .await?
    .with_constant_column("remote_or_lab", "lab")
    .with_constant_column("remote", "");

    let jobs = ResultTable::concat(vec![remote_jobs, lab_jobs]).sort_by(&[SortKey::ascending("kw")]);

    let staging = Path::new(&settings.output.unify_dir).join("higher_ed_jobs.csv");
    if let Err(e) = write_csv(&jobs, &staging) {
        log::error!("Error saving to CSV: {:?}", e);
    }

    Ok(jobs)
}

/// One search category: its own browser session for the whole
/// aggregation, released exactly once when the aggregation returns.
async fn scrape_category(
    settings: &Settings,
    profile: &Profile,
    base_url: &str,
    groups: &[KeywordGroup],
    file_name: &str,
) -> Result<ResultTable> {
    let droid = Droid::new(&settings.application.webdriver_url).await?;
    let fetcher = BrowserFetcher::new(
        &droid,
        WAIT_SELECTORS,
        Duration::from_secs(settings.application.wait_timeout_secs),
        settings.politeness.bounds(),
    );
    let parser = HigherEdParser::new(base_url);
    let job = ScrapeJob {
        base_url: base_url.to_string(),
        kw_param_name: "keywordFilter".to_string(),
        kw_join: " OR ".to_string(),
        out_cols: OUT_COLS.iter().map(|col| col.to_string()).collect(),
        delay: settings.politeness.bounds(),
    };

    let jobs = aggregate(
        &job,
        groups,
        &profile.exclusion_role_kw,
        "job_code",
        " | ",
        &fetcher,
        &parser,
    )
    .await;
    droid.quit().await;

    let path = Path::new(&settings.output.local_dir)
        .join("higher_ed")
        .join(file_name);
    if let Err(e) = write_csv(&jobs, &path) {
        log::error!("Error saving to CSV: {:?}", e);
    }

    Ok(jobs)
}

#[cfg(test)]
mod tests {
    use super::*;

    const RECORD: &str = r#"
        <div class="row record">
          <div class="col-sm-7">
            <a href="/details.cfm?JobCode=179000&Title=Research%20Analyst">Research Analyst</a><br>
            Example University<br>
            Anytown, CA<br>
            <span class="job-salary">$55,000</span>
          </div>
          <div class="col-sm-5">
            Research &amp; Development<br>
            Posted 11/01/25
          </div>
          <span class="addon-marker">Priority</span>
        </div>
    "#;

    fn parser() -> HigherEdParser {
        HigherEdParser::new("https://www.higheredjobs.com/search/remote.cfm")
    }

    #[test]
    fn parses_record_fields() {
        let page = Page::new("u", RECORD);

        let jobs = parser().parse_page(&page);

        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].get("title"), Some("Research Analyst"));
        assert_eq!(jobs[0].get("job_code"), Some("179000"));
        assert_eq!(jobs[0].get("organization"), Some("Example University"));
        assert_eq!(jobs[0].get("location"), Some("Anytown, CA"));
        assert_eq!(jobs[0].get("salary"), Some("$55,000"));
        assert_eq!(jobs[0].get("category"), Some("Research & Development"));
        assert_eq!(jobs[0].get("posted_date"), Some("11/01/25"));
        assert_eq!(jobs[0].get("priority"), Some("Yes"));
        assert!(jobs[0]
            .get("url")
            .is_some_and(|url| url.starts_with("https://www.higheredjobs.com/details.cfm")));
    }

    #[test]
    fn record_without_marker_is_not_priority() {
        let page = Page::new(
            "u",
            r#"<div class="row record">
                 <div class="col-sm-7"><a href="/details.cfm?JobCode=5">RA</a></div>
               </div>"#,
        );

        let jobs = parser().parse_page(&page);

        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].get("priority"), Some("No"));
    }

    #[test]
    fn record_without_title_or_code_is_skipped() {
        let page = Page::new(
            "u",
            r#"<div class="row record"><div class="col-sm-5">Posted 01/01/25</div></div>"#,
        );

        assert!(parser().parse_page(&page).is_empty());
    }

    #[test]
    fn job_code_comes_from_url_query() {
        assert_eq!(
            job_code_from_url("https://www.higheredjobs.com/details.cfm?JobCode=42&x=1"),
            Some("42".to_string())
        );
        assert_eq!(
            job_code_from_url("https://www.higheredjobs.com/details.cfm?x=1"),
            None
        );
    }
}
