use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::domain::record::{JobRecord, ResultTable};

/// Canonical column superset for the combined output. Per-site tables
/// are standardized to this before concatenation.
pub const EXPECTED_COLUMNS: [&str; 14] = [
    "title",
    "organization",
    "department",
    "location",
    "remote",
    "posted_date",
    "kw",
    "kw_idx",
    "url",
    "salary",
    "category",
    "employment_type",
    "job_id",
    "remote_or_lab",
];

pub fn expected_columns() -> Vec<String> {
    EXPECTED_COLUMNS.iter().map(|col| col.to_string()).collect()
}

/// Writes a table as CSV, nulls as empty strings, columns in table
/// order. Parent directories are created as needed.
pub fn write_csv(table: &ResultTable, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(table.columns())?;
    for row in table.iter_rows() {
        writer.write_record(row.iter().map(|value| value.as_deref().unwrap_or("")))?;
    }
    writer.flush()?;

    log::info!("Saved {} rows to {}", table.len(), path.display());
    Ok(())
}

/// Reads a CSV back into a table. Empty cells become nulls.
pub fn read_csv(path: &Path) -> Result<ResultTable> {
    let mut reader = csv::Reader::from_path(path)?;
    let headers: Vec<String> = reader.headers()?.iter().map(|h| h.to_string()).collect();

    let mut records = vec![];
    for row in reader.records() {
        let row = row?;
        let mut record = JobRecord::new();
        for (header, value) in headers.iter().zip(row.iter()) {
            if !value.is_empty() {
                record.set(header, value);
            }
        }
        records.push(record);
    }

    Ok(ResultTable::from_records(records, &headers))
}

fn csv_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = vec![];
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let is_csv = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
        if path.is_file() && is_csv {
            files.push(path);
        }
    }
    files.sort();

    Ok(files)
}

/// Reads every per-site CSV from the staging directory into one table:
/// column names normalized (`job_code`→`job_id`, `posting_date`→
/// `posted_date`), columns standardized to the canonical superset, each
/// row tagged with its source file, and `kw_num`/`kw_idx1` derived from
/// the `kw_idx` tag. An unreadable file is logged and skipped.
pub fn combine_csvs(dir: &Path) -> Result<ResultTable> {
    let files = csv_files(dir)?;
    if files.is_empty() {
        log::error!("No CSV files found in {}", dir.display());
        return Ok(ResultTable::empty(expected_columns()));
    }

    let expected = expected_columns();
    let mut tables = vec![];
    for path in files.iter() {
        let table = match read_csv(path) {
            Ok(table) => table,
            Err(e) => {
                log::error!("Error reading {}: {:?}", path.display(), e);
                continue;
            }
        };
        if table.is_empty() {
            log::info!("Skipping empty file {}", path.display());
            continue;
        }

        let table = table
            .rename_column("job_code", "job_id")
            .rename_column("posting_date", "posted_date")
            .standardize(&expected)
            .with_constant_column("scraper", &path.to_string_lossy());
        tables.push(table);
    }

    let file_count = tables.len();
    let combined = ResultTable::concat(tables)
        .with_derived_column("kw_num", "kw_idx", |kw_idx| {
            kw_idx.map(|value| (value.matches(',').count() + 1).to_string())
        })
        .with_derived_column("kw_idx1", "kw_idx", |kw_idx| {
            kw_idx
                .and_then(|value| value.split(", ").next())
                .and_then(|first| first.trim().parse::<i64>().ok())
                .map(|rank| rank.to_string())
        });

    log::info!("Combined {} files into {} rows", file_count, combined.len());
    Ok(combined)
}

#[cfg(test)]
mod tests {
    use crate::domain::record::SortKey;

    use super::*;

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    fn table(columns: &[&str], rows: &[&[(&str, &str)]]) -> ResultTable {
        let records = rows
            .iter()
            .map(|fields| {
                let mut record = JobRecord::new();
                for (field, value) in fields.iter() {
                    record.set(field, *value);
                }
                record
            })
            .collect();
        ResultTable::from_records(records, &cols(columns))
    }

    #[test]
    fn csv_round_trip_keeps_nulls_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("jobs.csv");
        let original = table(
            &["title", "salary"],
            &[&[("title", "RA")], &[("title", "TA"), ("salary", "50k")]],
        );

        write_csv(&original, &path).unwrap();
        let restored = read_csv(&path).unwrap();

        assert_eq!(restored.columns(), &cols(&["title", "salary"]));
        assert_eq!(restored.value(0, "salary"), None);
        assert_eq!(restored.value(1, "salary"), Some("50k"));
    }

    #[test]
    fn combine_standardizes_renames_and_derives_rank_columns() {
        let dir = tempfile::tempdir().unwrap();
        write_csv(
            &table(
                &["title", "job_code", "kw_idx"],
                &[&[("title", "A"), ("job_code", "7"), ("kw_idx", "1, 2")]],
            ),
            &dir.path().join("a.csv"),
        )
        .unwrap();
        write_csv(
            &table(
                &["title", "posting_date", "job_id", "kw_idx"],
                &[&[
                    ("title", "B"),
                    ("posting_date", "01/02/2026"),
                    ("job_id", "9"),
                    ("kw_idx", "2"),
                ]],
            ),
            &dir.path().join("b.csv"),
        )
        .unwrap();

        let combined = combine_csvs(dir.path()).unwrap();

        assert_eq!(combined.len(), 2);
        assert_eq!(combined.value(0, "job_id"), Some("7"));
        assert_eq!(combined.value(1, "posted_date"), Some("01/02/2026"));
        assert_eq!(combined.value(0, "kw_num"), Some("2"));
        assert_eq!(combined.value(1, "kw_num"), Some("1"));
        assert_eq!(combined.value(0, "kw_idx1"), Some("1"));
        assert_eq!(combined.value(1, "kw_idx1"), Some("2"));
        assert!(combined
            .value(0, "scraper")
            .is_some_and(|source| source.ends_with("a.csv")));
        // organization was in neither file; standardization null-fills it
        assert_eq!(combined.value(0, "organization"), None);
    }

    #[test]
    fn combined_sort_is_numeric_on_first_rank() {
        let dir = tempfile::tempdir().unwrap();
        write_csv(
            &table(
                &["title", "job_id", "kw_idx"],
                &[
                    &[("title", "low"), ("job_id", "1"), ("kw_idx", "10")],
                    &[("title", "high"), ("job_id", "2"), ("kw_idx", "2, 3")],
                    &[("title", "untagged"), ("job_id", "3")],
                ],
            ),
            &dir.path().join("a.csv"),
        )
        .unwrap();

        let combined = combine_csvs(dir.path()).unwrap();
        let sorted = combined.sort_by(&[
            SortKey {
                column: "kw_idx1",
                descending: false,
                numeric: true,
                nulls_last: true,
            },
            SortKey {
                column: "kw_num",
                descending: true,
                numeric: true,
                nulls_last: true,
            },
        ]);

        assert_eq!(sorted.value(0, "title"), Some("high"));
        assert_eq!(sorted.value(1, "title"), Some("low"));
        assert_eq!(sorted.value(2, "title"), Some("untagged"));
    }

    #[test]
    fn combine_with_no_files_returns_empty_table() {
        let dir = tempfile::tempdir().unwrap();

        let combined = combine_csvs(dir.path()).unwrap();

        assert!(combined.is_empty());
    }
}
