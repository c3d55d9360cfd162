use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use scraper::{Html, Selector};

use crate::configuration::{Profile, Settings};
use crate::domain::{
    keywords::KeywordGroup,
    page::Page,
    record::{JobRecord, ResultTable},
};
use crate::services::aggregate::aggregate;
use crate::services::droid::{BrowserFetcher, Droid, SearchBox};
use crate::services::export::write_csv;
use crate::services::scrape::{PageParser, ScrapeJob};

use super::element_text;

const BASE_URL: &str = "https://www.idealist.org/en/jobs";
const WAIT_SELECTOR: &str = "span.ps_box-value[id^='HRS_APP_JBSCH_I_HRS_JOB_OPENING_ID']";
const WAIT_TIMEOUT: Duration = Duration::from_secs(10);

const SEARCH_INPUT_ID: &str = "HRS_SCH_WRK_HRS_SCH_TEXT100";
const SEARCH_BUTTON_ID: &str = "HRS_SCH_WRK_FLU_HRS_SEARCH_BTN";
const NO_RESULTS_ID: &str = "win0divHRS_SCH_WRK_HRS_CC_NO_RSLT";
const SCROLL_CONTAINER_ID: &str = "win0divHRS_AGNT_RSLT_I$grid$0";

const OUT_COLS: [&str; 6] = [
    "title",
    "department",
    "location",
    "url",
    "posted_date",
    "job_id",
];

/// The portal renders listings as a PeopleSoft grid: one li per posting
/// with id-prefixed spans for each field. Search runs through the
/// in-page form, so the scrape job carries no keyword parameter.
pub struct IdealistParser {
    base_url: String,
}

impl IdealistParser {
    pub fn new(base_url: &str) -> Self {
        IdealistParser {
            base_url: base_url.to_string(),
        }
    }
}

/// Some grid titles embed the identifier, e.g.
/// "Data Analyst - Davis, CA, Job ID 82838".
fn split_job_id_suffix(full_title: &str) -> Option<(String, String)> {
    let (title, id) = full_title.rsplit_once(", Job ID ")?;
    let id = id.trim();
    match !id.is_empty() && id.chars().all(|c| c.is_ascii_digit()) {
        true => Some((title.trim().to_string(), id.to_string())),
        false => None,
    }
}

impl PageParser for IdealistParser {
    fn parse_page(&self, page: &Page) -> Vec<JobRecord> {
        let document = Html::parse_document(&page.source);
        let record_selector = Selector::parse("li.ps_grid-row[id^='HRS_AGNT_RSLT_I']").unwrap();
        let title_selector = Selector::parse("span[id^='SCH_JOB_TITLE']").unwrap();
        let id_selector =
            Selector::parse("span[id^='HRS_APP_JBSCH_I_HRS_JOB_OPENING_ID']").unwrap();
        let location_selector = Selector::parse("span[id^='LOCATION']").unwrap();
        let department_selector =
            Selector::parse("span[id^='HRS_APP_JBSCH_I_HRS_DEPT_DESCR']").unwrap();
        let opened_selector = Selector::parse("span[id^='SCH_OPENED']").unwrap();

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

            if let Some(title_span) = record.select(&title_selector).next() {
                let full_title = element_text(&title_span);
                match split_job_id_suffix(&full_title) {
                    Some((title, job_id)) => {
                        job.set("title", title);
                        job.set("job_id", job_id);
                    }
                    None => job.set("title", full_title),
                }
            }

            // The dedicated identifier field wins over one parsed out of
            // the title.
            if let Some(id_span) = record.select(&id_selector).next() {
                let id = element_text(&id_span);
                if !id.is_empty() {
                    job.set("job_id", id);
                }
            }

            if let Some(location) = record.select(&location_selector).next() {
                job.set("location", element_text(&location));
            }
            if let Some(department) = record.select(&department_selector).next() {
                job.set("department", element_text(&department));
            }
            if let Some(opened) = record.select(&opened_selector).next() {
                job.set("posted_date", element_text(&opened));
            }

            // Rows are clickable rather than linked; reconstruct a detail
            // URL from the identifier.
            if record.value().attr("onclick").is_some() && job.has_value("job_id") {
                let url = format!(
                    "{}?JobCode={}",
                    self.base_url,
                    job.get("job_id").unwrap_or_default()
                );
                job.set("url", url);
            }

            match job.has_value("title") || job.has_value("job_id") {
                true => jobs_on_page.push(job),
                false => log::warn!("Skipping job record with no title or job ID"),
            }
        }

        jobs_on_page
    }
}

pub async fn run(settings: &Settings, profile: &Profile) -> Result<ResultTable> {
    log::info!("Running Idealist scraper");

    let droid = Droid::new(&settings.application.webdriver_url).await?;
    let fetcher = BrowserFetcher::new(
        &droid,
        WAIT_SELECTOR,
        WAIT_TIMEOUT,
        settings.politeness.bounds(),
    )
    .with_search_box(SearchBox {
        input_id: SEARCH_INPUT_ID.to_string(),
        button_id: SEARCH_BUTTON_ID.to_string(),
        no_results_id: NO_RESULTS_ID.to_string(),
    })
    .with_scroll_container(SCROLL_CONTAINER_ID);
    let parser = IdealistParser::new(BASE_URL);
    let job = ScrapeJob {
        base_url: BASE_URL.to_string(),
        kw_param_name: String::new(),
        kw_join: " OR ".to_string(),
        out_cols: OUT_COLS.iter().map(|col| col.to_string()).collect(),
        delay: settings.politeness.bounds(),
    };
    let groups = KeywordGroup::singles(&profile.search_kw_idealist);

    let jobs = aggregate(
        &job,
        &groups,
        &profile.exclusion_role_kw,
        "job_id",
        " + ",
        &fetcher,
        &parser,
    )
    .await;
    droid.quit().await;

    let local = Path::new(&settings.output.local_dir)
        .join("idealist")
        .join("idealist_lab_jobs.csv");
    if let Err(e) = write_csv(&jobs, &local) {
        log::error!("Error saving to CSV: {:?}", e);
    }
    let staging = Path::new(&settings.output.unify_dir).join("idealist_jobs.csv");
    if let Err(e) = write_csv(&jobs, &staging) {
        log::error!("Error saving to CSV: {:?}", e);
    }

    Ok(jobs)
}

#[cfg(test)]
mod tests {
    use super::*;

    const GRID: &str = r#"
        <ul>
        <li class="ps_grid-row" id="HRS_AGNT_RSLT_I$0_row_0" onclick="rowClick()">
          <span class="ps_box-value" id="SCH_JOB_TITLE$0">Data Analyst - Davis, CA, Job ID 82838</span>
          <span class="ps_box-value" id="HRS_APP_JBSCH_I_HRS_JOB_OPENING_ID$0">82838</span>
          <span id="LOCATION$0">Davis, CA</span>
          <span id="HRS_APP_JBSCH_I_HRS_DEPT_DESCR$0">Statistics</span>
          <span id="SCH_OPENED$0">11/01/2025</span>
        </li>
        </ul>
    "#;

    fn parser() -> IdealistParser {
        IdealistParser::new(BASE_URL)
    }

    #[test]
    fn parses_grid_row_and_cleans_title() {
        let page = Page::new("u", GRID);

        let jobs = parser().parse_page(&page);

        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].get("title"), Some("Data Analyst - Davis, CA"));
        assert_eq!(jobs[0].get("job_id"), Some("82838"));
        assert_eq!(jobs[0].get("location"), Some("Davis, CA"));
        assert_eq!(jobs[0].get("department"), Some("Statistics"));
        assert_eq!(jobs[0].get("posted_date"), Some("11/01/2025"));
        assert_eq!(
            jobs[0].get("url"),
            Some("https://www.idealist.org/en/jobs?JobCode=82838")
        );
    }

    #[test]
    fn no_next_page_on_grid_listings() {
        let page = Page::new("u", GRID);

        assert!(!parser().has_next_page(&page));
    }

    #[test]
    fn title_suffix_split_requires_numeric_id() {
        assert_eq!(
            split_job_id_suffix("RA - Davis, CA, Job ID 82838"),
            Some(("RA - Davis, CA".to_string(), "82838".to_string()))
        );
        assert_eq!(split_job_id_suffix("RA, Job ID pending"), None);
        assert_eq!(split_job_id_suffix("Plain title"), None);
    }

    #[test]
    fn grid_without_rows_parses_empty() {
        let page = Page::new("u", "<ul><li class=\"other\">nope</li></ul>");

        assert!(parser().parse_page(&page).is_empty());
    }
}
