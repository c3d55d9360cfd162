use crate::domain::{
    keywords::KeywordGroup,
    record::{ResultTable, SortKey},
};

use super::scrape::{scrape, PageFetcher, PageParser, ScrapeJob};

/// Runs the scrape loop once per keyword group in ascending rank order,
/// tags each group's rows with `kw` and `kw_idx`, unions the results,
/// collapses duplicate postings by `id_column`, drops titles matching an
/// exclusion keyword, and sorts ascending by the concatenated `kw_idx`
/// tag. String sort is deliberate: the tag can hold several ranks.
pub async fn aggregate(
    job: &ScrapeJob,
    keyword_groups: &[KeywordGroup],
    exclusion_keywords: &[String],
    id_column: &str,
    kw_separator: &str,
    fetcher: &dyn PageFetcher,
    parser: &dyn PageParser,
) -> ResultTable {
    let mut per_group: Vec<ResultTable> = vec![];

    for group in KeywordGroup::ranked(keyword_groups.to_vec()) {
        log::info!("Search #{}: {}", group.rank, group.keywords.join(", "));

        let table = scrape(job, &group.keywords, fetcher, parser).await;
        if table.is_empty() {
            log::info!("No results for keyword group {}. Skipping.", group.rank);
            continue;
        }

        let table = table
            .with_constant_column("kw", &group.keywords.join(kw_separator))
            .with_constant_column("kw_idx", &group.rank.to_string());
        per_group.push(table);
    }

    if per_group.is_empty() {
        let mut columns = job.out_cols.clone();
        columns.push("kw".to_string());
        columns.push("kw_idx".to_string());
        return ResultTable::empty(columns);
    }

    let unioned = ResultTable::concat(per_group);
    log::info!("Total jobs scraped: {}", unioned.len());

    let deduped = unioned.group_by_first(id_column, &[("kw_idx", ", "), ("kw", kw_separator)]);
    let filtered = deduped.filter_out_titles(exclusion_keywords);
    log::info!("Total jobs after filtering: {}", filtered.len());

    filtered.sort_by(&[SortKey::ascending("kw_idx")])
}
