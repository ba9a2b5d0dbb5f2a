//! Query view over the record list.
//!
//! Pure projections for display: filter, date range, sort, paginate. None of
//! them mutate their input, and [`RecordQuery::apply`] always composes them in
//! that order.

use std::cmp::Ordering;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::RecordEntry;

/// Default number of records per page.
pub const DEFAULT_PAGE_SIZE: usize = 10;

/// Query errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    #[error("Unknown column: {0}")]
    UnknownColumn(String),

    #[error("Unknown sort direction: {0}")]
    UnknownDirection(String),
}

/// A record column that can be searched or sorted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Column {
    Id,
    Age,
    Date,
    Disease,
    Hospital,
    Doctor,
    FileRef,
    CreatedAt,
}

impl Column {
    /// Columns an "all" search looks at: the values the user entered.
    pub const SEARCHABLE: [Column; 6] = [
        Column::Age,
        Column::Date,
        Column::Disease,
        Column::Hospital,
        Column::Doctor,
        Column::FileRef,
    ];

    /// String form of this column's value, None if the field is absent.
    fn value(self, entry: &RecordEntry) -> Option<String> {
        match self {
            Column::Id => Some(entry.id.clone()),
            Column::Age => Some(entry.age.to_string()),
            Column::Date => Some(entry.date.clone()),
            Column::Disease => Some(entry.disease.clone()),
            Column::Hospital => Some(entry.hospital.clone()),
            Column::Doctor => Some(entry.doctor.clone()),
            Column::FileRef => entry.file_ref.clone(),
            Column::CreatedAt => Some(entry.created_at.clone()),
        }
    }

    fn compare(self, a: &RecordEntry, b: &RecordEntry) -> Ordering {
        match self {
            Column::Age => a.age.cmp(&b.age),
            _ => self.value(a).cmp(&self.value(b)),
        }
    }
}

impl FromStr for Column {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "id" => Ok(Column::Id),
            "age" => Ok(Column::Age),
            "date" => Ok(Column::Date),
            "disease" => Ok(Column::Disease),
            "hospital" => Ok(Column::Hospital),
            "doctor" => Ok(Column::Doctor),
            "fileRef" | "file" => Ok(Column::FileRef),
            "createdAt" => Ok(Column::CreatedAt),
            other => Err(QueryError::UnknownColumn(other.to_string())),
        }
    }
}

/// Which fields a search term is matched against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SearchColumn {
    #[default]
    All,
    Only(Column),
}

impl FromStr for SearchColumn {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" | "" => Ok(SearchColumn::All),
            other => Ok(SearchColumn::Only(other.parse()?)),
        }
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Direction {
    #[default]
    Ascending,
    Descending,
}

impl Direction {
    /// The opposite direction, as a column header toggle.
    pub fn toggled(self) -> Self {
        match self {
            Direction::Ascending => Direction::Descending,
            Direction::Descending => Direction::Ascending,
        }
    }
}

impl FromStr for Direction {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ascending" | "asc" => Ok(Direction::Ascending),
            "descending" | "desc" => Ok(Direction::Descending),
            other => Err(QueryError::UnknownDirection(other.to_string())),
        }
    }
}

/// Keep entries containing `term` (case-insensitive) in the searched column(s).
pub fn filter(entries: &[RecordEntry], term: &str, column: SearchColumn) -> Vec<RecordEntry> {
    if term.is_empty() {
        return entries.to_vec();
    }
    let needle = term.to_lowercase();
    let hit = |col: Column, entry: &RecordEntry| {
        col.value(entry)
            .is_some_and(|v| v.to_lowercase().contains(&needle))
    };

    entries
        .iter()
        .filter(|entry| match column {
            SearchColumn::All => Column::SEARCHABLE.iter().any(|&col| hit(col, entry)),
            SearchColumn::Only(col) => hit(col, entry),
        })
        .cloned()
        .collect()
}

/// Keep entries whose date lies within the inclusive bounds. Absent bounds are open.
pub fn filter_by_date_range(
    entries: &[RecordEntry],
    start: Option<&str>,
    end: Option<&str>,
) -> Vec<RecordEntry> {
    entries
        .iter()
        .filter(|e| start.map_or(true, |s| e.date.as_str() >= s))
        .filter(|e| end.map_or(true, |end| e.date.as_str() <= end))
        .cloned()
        .collect()
}

/// Stable sort on `key`; equal keys keep their relative order.
pub fn sort(entries: &[RecordEntry], key: Column, direction: Direction) -> Vec<RecordEntry> {
    let mut sorted = entries.to_vec();
    sorted.sort_by(|a, b| match direction {
        Direction::Ascending => key.compare(a, b),
        Direction::Descending => key.compare(b, a),
    });
    sorted
}

/// Slice out a 1-indexed page. Out-of-range pages are empty.
pub fn paginate(entries: &[RecordEntry], page: usize, page_size: usize) -> Vec<RecordEntry> {
    if page == 0 || page_size == 0 {
        return Vec::new();
    }
    let start = (page - 1).saturating_mul(page_size);
    if start >= entries.len() {
        return Vec::new();
    }
    let end = start.saturating_add(page_size).min(entries.len());
    entries[start..end].to_vec()
}

/// Number of pages needed for `count` entries.
pub fn total_pages(count: usize, page_size: usize) -> usize {
    if page_size == 0 {
        0
    } else {
        count.div_ceil(page_size)
    }
}

/// Full display query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordQuery {
    pub term: String,
    pub column: SearchColumn,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub sort: Option<(Column, Direction)>,
    pub page: usize,
    pub page_size: usize,
}

impl Default for RecordQuery {
    fn default() -> Self {
        Self {
            term: String::new(),
            column: SearchColumn::All,
            start_date: None,
            end_date: None,
            sort: None,
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

/// One page of query results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryPage {
    pub items: Vec<RecordEntry>,
    /// Entries matching before pagination
    pub total_matches: usize,
    pub total_pages: usize,
    pub page: usize,
}

impl RecordQuery {
    /// Run filter, date range, sort and paginate, in that order.
    pub fn apply(&self, entries: &[RecordEntry]) -> QueryPage {
        let matched = filter(entries, &self.term, self.column);
        let matched = filter_by_date_range(
            &matched,
            self.start_date.as_deref(),
            self.end_date.as_deref(),
        );
        let matched = match self.sort {
            Some((key, direction)) => sort(&matched, key, direction),
            None => matched,
        };

        QueryPage {
            items: paginate(&matched, self.page, self.page_size),
            total_matches: matched.len(),
            total_pages: total_pages(matched.len(), self.page_size),
            page: self.page,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewRecord;

    fn record(date: &str, disease: &str, hospital: &str, age: &str) -> RecordEntry {
        RecordEntry::new_local(
            NewRecord::new(age, date, disease, hospital, "Dr. A")
                .validate()
                .unwrap(),
            None,
        )
    }

    fn sample() -> Vec<RecordEntry> {
        vec![
            record("2024-01-01", "Flu", "City", "30"),
            record("2024-02-01", "Asthma", "North", "9"),
            record("2024-03-01", "Flu", "South", "100"),
        ]
    }

    fn diseases(entries: &[RecordEntry]) -> Vec<&str> {
        entries.iter().map(|e| e.disease.as_str()).collect()
    }

    #[test]
    fn test_filter_all_columns_case_insensitive() {
        let entries = sample();
        assert_eq!(diseases(&filter(&entries, "nORTH", SearchColumn::All)), vec!["Asthma"]);
        assert_eq!(filter(&entries, "flu", SearchColumn::All).len(), 2);
        assert_eq!(filter(&entries, "100", SearchColumn::Only(Column::Age)).len(), 1);
    }

    #[test]
    fn test_filter_all_ignores_ids_and_timestamps() {
        let entries: Vec<RecordEntry> = (0..20)
            .map(|_| {
                RecordEntry::new_local(
                    NewRecord::new("30", "2024-01-05", "Flu", "City", "Dr. A")
                        .validate()
                        .unwrap(),
                    None,
                )
            })
            .collect();

        for term in ["b", "e", "local", "+00:00"] {
            assert!(filter(&entries, term, SearchColumn::All).is_empty(), "{}", term);
        }
        assert_eq!(
            filter(&entries, "local", SearchColumn::Only(Column::Id)).len(),
            20
        );
    }

    #[test]
    fn test_filter_single_column() {
        let entries = sample();
        let by_hospital = filter(&entries, "flu", SearchColumn::Only(Column::Hospital));
        assert!(by_hospital.is_empty());

        let by_disease = filter(&entries, "flu", SearchColumn::Only(Column::Disease));
        assert_eq!(by_disease.len(), 2);
    }

    #[test]
    fn test_filter_absent_file_ref() {
        let mut entries = sample();
        entries[0].file_ref = Some("blood-test.pdf".into());

        let found = filter(&entries, "pdf", SearchColumn::Only(Column::FileRef));
        assert_eq!(found.len(), 1);
        assert_eq!(filter(&entries, "", SearchColumn::Only(Column::FileRef)).len(), 3);
    }

    #[test]
    fn test_filter_empty_term_is_identity() {
        let entries = sample();
        let once = filter(&entries, "", SearchColumn::All);
        assert_eq!(filter(&once, "", SearchColumn::All), entries);
    }

    #[test]
    fn test_date_range() {
        let entries = vec![
            record("2024-01-01", "Flu", "City", "30"),
            record("2024-02-01", "Cold", "City", "30"),
        ];

        let after = filter_by_date_range(&entries, Some("2024-01-15"), None);
        assert_eq!(diseases(&after), vec!["Cold"]);

        let inclusive = filter_by_date_range(&entries, Some("2024-01-01"), Some("2024-02-01"));
        assert_eq!(inclusive.len(), 2);

        let before = filter_by_date_range(&entries, None, Some("2024-01-31"));
        assert_eq!(diseases(&before), vec!["Flu"]);

        assert_eq!(filter_by_date_range(&entries, None, None), entries);
    }

    #[test]
    fn test_sort_numeric_age() {
        let entries = sample();
        let sorted = sort(&entries, Column::Age, Direction::Ascending);
        let ages: Vec<u32> = sorted.iter().map(|e| e.age).collect();
        assert_eq!(ages, vec![9, 30, 100]);

        let sorted = sort(&entries, Column::Age, Direction::Descending);
        assert_eq!(sorted[0].age, 100);
    }

    #[test]
    fn test_sort_stable_on_ties() {
        let entries = sample();
        let sorted = sort(&entries, Column::Disease, Direction::Ascending);
        assert_eq!(diseases(&sorted), vec!["Asthma", "Flu", "Flu"]);
        assert_eq!(sorted[1].hospital, "City");
        assert_eq!(sorted[2].hospital, "South");

        let sorted = sort(&entries, Column::Disease, Direction::Descending);
        assert_eq!(sorted[0].hospital, "City");
        assert_eq!(sorted[1].hospital, "South");
    }

    #[test]
    fn test_sort_does_not_mutate_input() {
        let entries = sample();
        let before = entries.clone();
        let _ = sort(&entries, Column::Date, Direction::Descending);
        assert_eq!(entries, before);
    }

    #[test]
    fn test_paginate() {
        let entries: Vec<_> = (0..12)
            .map(|i| record(&format!("2024-01-{:02}", i + 1), "Flu", "City", "30"))
            .collect();

        let page2 = paginate(&entries, 2, 10);
        assert_eq!(page2.len(), 2);
        assert_eq!(page2[0].date, "2024-01-11");
        assert_eq!(page2[1].date, "2024-01-12");

        assert_eq!(paginate(&entries, 1, 10).len(), 10);
        assert!(paginate(&entries, 3, 10).is_empty());
        assert!(paginate(&entries, 0, 10).is_empty());
        assert!(paginate(&entries, 1, 0).is_empty());
        assert!(paginate(&entries, usize::MAX, usize::MAX).is_empty());
    }

    #[test]
    fn test_total_pages() {
        assert_eq!(total_pages(0, 10), 0);
        assert_eq!(total_pages(10, 10), 1);
        assert_eq!(total_pages(12, 10), 2);
        assert_eq!(total_pages(12, 0), 0);
    }

    #[test]
    fn test_parse_columns() {
        assert_eq!("all".parse::<SearchColumn>().unwrap(), SearchColumn::All);
        assert_eq!(
            "hospital".parse::<SearchColumn>().unwrap(),
            SearchColumn::Only(Column::Hospital)
        );
        assert_eq!("file".parse::<Column>().unwrap(), Column::FileRef);
        assert_eq!(
            "syncState".parse::<Column>(),
            Err(QueryError::UnknownColumn("syncState".into()))
        );
        assert_eq!("desc".parse::<Direction>().unwrap(), Direction::Descending);
        assert_eq!(Direction::Ascending.toggled(), Direction::Descending);
    }

    #[test]
    fn test_query_composes_in_order() {
        let mut entries: Vec<_> = (0..15)
            .map(|i| record(&format!("2024-01-{:02}", i + 1), "Flu", "City", "30"))
            .collect();
        entries.push(record("2024-01-20", "Cold", "City", "30"));

        let query = RecordQuery {
            term: "flu".into(),
            start_date: Some("2024-01-03".into()),
            sort: Some((Column::Date, Direction::Descending)),
            page: 2,
            ..RecordQuery::default()
        };
        let page = query.apply(&entries);

        // 13 flu records from 01-03 to 01-15, newest first
        assert_eq!(page.total_matches, 13);
        assert_eq!(page.total_pages, 2);
        assert_eq!(page.items.len(), 3);
        assert_eq!(page.items[0].date, "2024-01-05");
        assert_eq!(page.items[2].date, "2024-01-03");
    }
}
