use std::cmp::Ordering;
use std::collections::HashMap;

use itertools::Itertools;

/// One job posting as extracted by a site parser. Field names are
/// site-dependent; values are raw strings straight from the page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobRecord {
    fields: HashMap<String, String>,
}

impl JobRecord {
    pub fn new() -> Self {
        JobRecord::default()
    }

    pub fn set(&mut self, field: &str, value: impl Into<String>) {
        self.fields.insert(field.to_string(), value.into());
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }

    pub fn has_value(&self, field: &str) -> bool {
        self.get(field).is_some_and(|v| !v.is_empty())
    }
}

/// Sort instruction for [`ResultTable::sort_by`]. String comparison by
/// default; `numeric` parses cells as integers and treats unparsable
/// cells as nulls.
#[derive(Debug, Clone, Copy)]
pub struct SortKey<'a> {
    pub column: &'a str,
    pub descending: bool,
    pub numeric: bool,
    pub nulls_last: bool,
}

impl<'a> SortKey<'a> {
    pub fn ascending(column: &'a str) -> Self {
        SortKey {
            column,
            descending: false,
            numeric: false,
            nulls_last: false,
        }
    }
}

/// An ordered table of job rows sharing one column set. Cells are
/// nullable strings; a column missing from a source record is null, not
/// an error.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultTable {
    columns: Vec<String>,
    rows: Vec<Vec<Option<String>>>,
}

impl ResultTable {
    pub fn empty(columns: Vec<String>) -> Self {
        ResultTable {
            columns,
            rows: vec![],
        }
    }

    /// Builds a table with the caller's fixed column order. Fields absent
    /// from a record become nulls.
    pub fn from_records(records: Vec<JobRecord>, out_cols: &[String]) -> Self {
        let rows = records
            .iter()
            .map(|record| {
                out_cols
                    .iter()
                    .map(|col| record.get(col).map(str::to_string))
                    .collect()
            })
            .collect();

        ResultTable {
            columns: out_cols.to_vec(),
            rows,
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter_rows(&self) -> impl Iterator<Item = &[Option<String>]> {
        self.rows.iter().map(|row| row.as_slice())
    }

    fn column_index(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }

    pub fn value(&self, row: usize, column: &str) -> Option<&str> {
        let idx = self.column_index(column)?;
        self.rows.get(row)?.get(idx)?.as_deref()
    }

    /// Sets every row's `column` to `value`, appending the column if the
    /// table does not have it yet.
    pub fn with_constant_column(mut self, column: &str, value: &str) -> Self {
        match self.column_index(column) {
            Some(idx) => {
                for row in self.rows.iter_mut() {
                    row[idx] = Some(value.to_string());
                }
            }
            None => {
                self.columns.push(column.to_string());
                for row in self.rows.iter_mut() {
                    row.push(Some(value.to_string()));
                }
            }
        }
        self
    }

    /// Appends a column computed row-by-row from an existing one.
    pub fn with_derived_column(
        mut self,
        column: &str,
        source: &str,
        derive: impl Fn(Option<&str>) -> Option<String>,
    ) -> Self {
        let source_idx = self.column_index(source);
        self.columns.push(column.to_string());
        for row in self.rows.iter_mut() {
            let input = source_idx.and_then(|idx| row[idx].as_deref());
            row.push(derive(input));
        }
        self
    }

    pub fn rename_column(mut self, old: &str, new: &str) -> Self {
        if self.column_index(new).is_none() {
            if let Some(idx) = self.column_index(old) {
                self.columns[idx] = new.to_string();
            }
        }
        self
    }

    /// Reorders to exactly `expected`, null-filling columns the table
    /// lacks and dropping columns not listed.
    pub fn standardize(&self, expected: &[String]) -> Self {
        let indices: Vec<Option<usize>> = expected
            .iter()
            .map(|col| self.column_index(col))
            .collect();
        let rows = self
            .rows
            .iter()
            .map(|row| {
                indices
                    .iter()
                    .map(|idx| idx.and_then(|i| row[i].clone()))
                    .collect()
            })
            .collect();

        ResultTable {
            columns: expected.to_vec(),
            rows,
        }
    }

    /// Vertically concatenates tables. The column set is the union in
    /// first-seen order; rows are null-filled for columns their source
    /// table lacks.
    pub fn concat(tables: Vec<ResultTable>) -> Self {
        let mut columns: Vec<String> = vec![];
        for table in tables.iter() {
            for col in table.columns.iter() {
                if !columns.contains(col) {
                    columns.push(col.clone());
                }
            }
        }

        let mut rows = vec![];
        for table in tables.iter() {
            let indices: Vec<Option<usize>> = columns
                .iter()
                .map(|col| table.column_index(col))
                .collect();
            for row in table.rows.iter() {
                rows.push(
                    indices
                        .iter()
                        .map(|idx| idx.and_then(|i| row[i].clone()))
                        .collect(),
                );
            }
        }

        ResultTable { columns, rows }
    }

    /// Collapses rows sharing the same `id_column` value into one row
    /// per identifier, preserving first-seen identifier order. Columns
    /// listed in `concat_columns` get their non-null values joined with
    /// the given separator in row order; every other column keeps the
    /// value from the first row of the group.
    pub fn group_by_first(&self, id_column: &str, concat_columns: &[(&str, &str)]) -> Self {
        let Some(id_idx) = self.column_index(id_column) else {
            return self.clone();
        };

        let mut group_of: HashMap<Option<String>, usize> = HashMap::new();
        let mut groups: Vec<Vec<usize>> = vec![];
        for (row_idx, row) in self.rows.iter().enumerate() {
            let key = row[id_idx].clone();
            match group_of.get(&key) {
                Some(&group_idx) => groups[group_idx].push(row_idx),
                None => {
                    group_of.insert(key, groups.len());
                    groups.push(vec![row_idx]);
                }
            }
        }

        let rows = groups
            .iter()
            .map(|members| {
                self.columns
                    .iter()
                    .enumerate()
                    .map(|(col_idx, col)| {
                        match concat_columns.iter().find(|(name, _)| name == col) {
                            Some((_, separator)) => {
                                let joined = members
                                    .iter()
                                    .filter_map(|&row_idx| self.rows[row_idx][col_idx].as_deref())
                                    .join(separator);
                                match joined.is_empty() {
                                    true => None,
                                    false => Some(joined),
                                }
                            }
                            None => self.rows[members[0]][col_idx].clone(),
                        }
                    })
                    .collect()
            })
            .collect();

        ResultTable {
            columns: self.columns.clone(),
            rows,
        }
    }

    /// Drops rows whose `title` contains any exclusion keyword,
    /// case-insensitive substring match. Rows with a null title are kept.
    pub fn filter_out_titles(&self, exclusion_keywords: &[String]) -> Self {
        let Some(title_idx) = self.column_index("title") else {
            return self.clone();
        };
        let exclusions: Vec<String> = exclusion_keywords
            .iter()
            .map(|kw| kw.to_lowercase())
            .collect();

        let rows = self
            .rows
            .iter()
            .filter(|row| match row[title_idx].as_deref() {
                Some(title) => {
                    let title = title.to_lowercase();
                    !exclusions.iter().any(|kw| title.contains(kw))
                }
                None => true,
            })
            .cloned()
            .collect();

        ResultTable {
            columns: self.columns.clone(),
            rows,
        }
    }

    /// Stable multi-key sort. A key naming a column the table lacks
    /// compares all rows as null.
    pub fn sort_by(&self, keys: &[SortKey]) -> Self {
        let indices: Vec<Option<usize>> = keys
            .iter()
            .map(|key| self.column_index(key.column))
            .collect();

        let mut rows = self.rows.clone();
        rows.sort_by(|a, b| {
            for (key, idx) in keys.iter().zip(indices.iter()) {
                let left = idx.and_then(|i| a[i].as_deref());
                let right = idx.and_then(|i| b[i].as_deref());
                let ordering = compare_cells(left, right, key);
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            Ordering::Equal
        });

        ResultTable {
            columns: self.columns.clone(),
            rows,
        }
    }
}

fn compare_cells(left: Option<&str>, right: Option<&str>, key: &SortKey) -> Ordering {
    match key.numeric {
        true => compare_options(
            left.and_then(|v| v.trim().parse::<i64>().ok()),
            right.and_then(|v| v.trim().parse::<i64>().ok()),
            key,
        ),
        false => compare_options(left, right, key),
    }
}

fn compare_options<T: Ord>(left: Option<T>, right: Option<T>, key: &SortKey) -> Ordering {
    match (left, right) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => match key.nulls_last {
            true => Ordering::Greater,
            false => Ordering::Less,
        },
        (Some(_), None) => match key.nulls_last {
            true => Ordering::Less,
            false => Ordering::Greater,
        },
        (Some(a), Some(b)) => {
            let ordering = a.cmp(&b);
            match key.descending {
                true => ordering.reverse(),
                false => ordering,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{JobRecord, ResultTable, SortKey};

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    fn record(fields: &[(&str, &str)]) -> JobRecord {
        let mut rec = JobRecord::new();
        for (field, value) in fields {
            rec.set(field, *value);
        }
        rec
    }

    #[test]
    fn from_records_fills_absent_columns_with_null() {
        let records = vec![record(&[("title", "RA"), ("job_id", "1")])];
        let table = ResultTable::from_records(records, &cols(&["title", "location", "job_id"]));

        assert_eq!(table.columns(), &cols(&["title", "location", "job_id"]));
        assert_eq!(table.value(0, "title"), Some("RA"));
        assert_eq!(table.value(0, "location"), None);
    }

    #[test]
    fn concat_unions_columns_null_safe() {
        let left = ResultTable::from_records(
            vec![record(&[("title", "A"), ("url", "u1")])],
            &cols(&["title", "url"]),
        );
        let right = ResultTable::from_records(
            vec![record(&[("title", "B"), ("salary", "50k")])],
            &cols(&["title", "salary"]),
        );

        let combined = ResultTable::concat(vec![left, right]);

        assert_eq!(combined.columns(), &cols(&["title", "url", "salary"]));
        assert_eq!(combined.value(0, "salary"), None);
        assert_eq!(combined.value(1, "url"), None);
        assert_eq!(combined.value(1, "salary"), Some("50k"));
    }

    #[test]
    fn group_by_first_keeps_earliest_fields_and_concats_tags() {
        let records = vec![
            record(&[("job_id", "J1"), ("title", "First"), ("kw_idx", "1"), ("kw", "R")]),
            record(&[("job_id", "J2"), ("title", "Other"), ("kw_idx", "1"), ("kw", "R")]),
            record(&[("job_id", "J1"), ("title", "Second"), ("kw_idx", "2"), ("kw", "Python")]),
        ];
        let table = ResultTable::from_records(records, &cols(&["job_id", "title", "kw_idx", "kw"]));

        let grouped = table.group_by_first("job_id", &[("kw_idx", ", "), ("kw", " + ")]);

        assert_eq!(grouped.len(), 2);
        assert_eq!(grouped.value(0, "title"), Some("First"));
        assert_eq!(grouped.value(0, "kw_idx"), Some("1, 2"));
        assert_eq!(grouped.value(0, "kw"), Some("R + Python"));
        assert_eq!(grouped.value(1, "job_id"), Some("J2"));
    }

    #[test]
    fn filter_out_titles_is_case_insensitive_substring() {
        let records = vec![
            record(&[("title", "Senior Research Assistant")]),
            record(&[("title", "Research Assistant")]),
        ];
        let table = ResultTable::from_records(records, &cols(&["title"]));

        let filtered = table.filter_out_titles(&["senior".to_string()]);

        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered.value(0, "title"), Some("Research Assistant"));
    }

    #[test]
    fn sort_by_string_is_lexicographic() {
        let records = vec![
            record(&[("kw_idx", "2")]),
            record(&[("kw_idx", "10")]),
        ];
        let table = ResultTable::from_records(records, &cols(&["kw_idx"]));

        let sorted = table.sort_by(&[SortKey::ascending("kw_idx")]);

        assert_eq!(sorted.value(0, "kw_idx"), Some("10"));
        assert_eq!(sorted.value(1, "kw_idx"), Some("2"));
    }

    #[test]
    fn sort_by_numeric_descending_with_nulls_last() {
        let records = vec![
            record(&[("kw_num", "2")]),
            record(&[("title", "no count")]),
            record(&[("kw_num", "10")]),
        ];
        let table = ResultTable::from_records(records, &cols(&["title", "kw_num"]));

        let sorted = table.sort_by(&[SortKey {
            column: "kw_num",
            descending: true,
            numeric: true,
            nulls_last: true,
        }]);

        assert_eq!(sorted.value(0, "kw_num"), Some("10"));
        assert_eq!(sorted.value(1, "kw_num"), Some("2"));
        assert_eq!(sorted.value(2, "kw_num"), None);
    }

    #[test]
    fn standardize_and_rename() {
        let records = vec![record(&[("job_code", "77"), ("title", "RA")])];
        let table = ResultTable::from_records(records, &cols(&["job_code", "title"]))
            .rename_column("job_code", "job_id");

        let standardized = table.standardize(&cols(&["title", "job_id", "location"]));

        assert_eq!(standardized.columns(), &cols(&["title", "job_id", "location"]));
        assert_eq!(standardized.value(0, "job_id"), Some("77"));
        assert_eq!(standardized.value(0, "location"), None);
    }
}
