use std::path::Path;

use anyhow::Result;
use scraper::{Html, Selector};

use crate::configuration::{Profile, Settings};
use crate::domain::{
    keywords::KeywordGroup,
    page::Page,
    record::{JobRecord, ResultTable, SortKey},
};
use crate::services::aggregate::aggregate;
use crate::services::export::write_csv;
use crate::services::fetcher::HttpFetcher;
use crate::services::scrape::{PageParser, ScrapeJob};

use super::{element_text, join_url};

const BASE_URL: &str = "https://careers.umich.edu/search-jobs?career_interest=All&work_location=All&field_job_modes_of_work_target_id=All&position=All&regular_temporary=All&job_id=&department=&title=&keyword=";
const SITE_URL: &str = "https://careers.umich.edu";

const OUT_COLS: [&str; 7] = [
    "title",
    "department",
    "location",
    "posting_date",
    "employment_type",
    "url",
    "job_id",
];

/// careers.umich.edu renders listings as a five-column table.
pub struct UMichParser;

impl PageParser for UMichParser {
    fn parse_page(&self, page: &Page) -> Vec<JobRecord> {
        let document = Html::parse_document(&page.source);
        let row_selector = Selector::parse("table.cols-5 tbody tr").unwrap();
        let cell_selector = Selector::parse("td").unwrap();
        let time_selector = Selector::parse("time").unwrap();
        let link_selector = Selector::parse("a").unwrap();

        let rows: Vec<_> = document.select(&row_selector).collect();
        if rows.is_empty() {
            return vec![];
        }
        log::info!("{} results", rows.len());

        let mut jobs_on_page = vec![];
        for row in rows {
            let cells: Vec<_> = row.select(&cell_selector).collect();
            if cells.len() < 5 {
                log::warn!("Row has fewer than 5 cells, skipping");
                continue;
            }

            let mut job = JobRecord::new();
            let posting_date = cells[0]
                .select(&time_selector)
                .next()
                .map(|time| element_text(&time))
                .unwrap_or_default();
            job.set("posting_date", posting_date);

            match cells[1].select(&link_selector).next() {
                Some(link) => {
                    job.set("title", element_text(&link));
                    let url = link
                        .value()
                        .attr("href")
                        .and_then(|href| join_url(SITE_URL, href))
                        .unwrap_or_default();
                    job.set("url", url);
                }
                None => {
                    job.set("title", "");
                    job.set("url", "");
                }
            }

            job.set("job_id", element_text(&cells[2]));
            job.set("department", element_text(&cells[3]));
            job.set("location", element_text(&cells[4]));
            job.set("employment_type", "");

            match job.has_value("title") || job.has_value("job_id") {
                true => jobs_on_page.push(job),
                false => log::warn!("Skipping job row with no title or job ID"),
            }
        }

        jobs_on_page
    }
}

pub async fn run(settings: &Settings, profile: &Profile) -> Result<ResultTable> {
    log::info!("Running UMich scraper");

    let job = ScrapeJob {
        base_url: BASE_URL.to_string(),
        kw_param_name: "keyword".to_string(),
        kw_join: " OR ".to_string(),
        out_cols: OUT_COLS.iter().map(|col| col.to_string()).collect(),
        delay: settings.politeness.bounds(),
    };
    let groups = KeywordGroup::singles(&profile.search_kw_individual);
    let fetcher = HttpFetcher::new()?;

    let jobs = aggregate(
        &job,
        &groups,
        &profile.exclusion_role_kw,
        "job_id",
        " + ",
        &fetcher,
        &UMichParser,
    )
    .await;
    let jobs = jobs.sort_by(&[SortKey::ascending("kw_idx"), SortKey::ascending("department")]);

    let staging = Path::new(&settings.output.unify_dir).join("umich_jobs.csv");
    if let Err(e) = write_csv(&jobs, &staging) {
        log::error!("Error saving to CSV: {:?}", e);
    }
    // Backup copy next to the binary, same as the combined output.
    if let Err(e) = write_csv(&jobs, Path::new("umich_jobs.csv")) {
        log::error!("Error saving backup CSV: {:?}", e);
    }

    Ok(jobs)
}
