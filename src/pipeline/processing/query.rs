// Query engine: search, filter, sort and paginate over a record set

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::constants::DEFAULT_PAGE_SIZE;
use crate::domain::{fold_text, ContractStatus, Record};
use crate::observability::metrics;

/// Status predicate; `All` bypasses it
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusFilter {
    #[default]
    All,
    Only(ContractStatus),
}

/// Bank predicate, compared case-insensitively after trimming
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BankFilter {
    #[default]
    All,
    Only(String),
}

/// Inclusive range on the registration date; either end may be open
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl DateRange {
    pub fn new(from: Option<NaiveDate>, to: Option<NaiveDate>) -> Self {
        Self { from, to }
    }

    pub fn is_unbounded(&self) -> bool {
        self.from.is_none() && self.to.is_none()
    }

    /// Same range with reversed bounds swapped
    pub fn normalized(self) -> Self {
        match (self.from, self.to) {
            (Some(from), Some(to)) if from > to => Self { from: Some(to), to: Some(from) },
            _ => self,
        }
    }

    /// Undated records never fall inside a bounded range
    pub fn contains(&self, date: Option<NaiveDate>) -> bool {
        if self.is_unbounded() {
            return true;
        }
        let Some(date) = date else {
            return false;
        };
        self.from.map_or(true, |from| date >= from) && self.to.map_or(true, |to| date <= to)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    Id,
    RegisteredAt,
    Bank,
    Consultant,
    Status,
    OutstandingBalance,
    CommissionExpected,
    CommissionReceived,
    PaidAt,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
    pub field: SortField,
    #[serde(default)]
    pub direction: SortDirection,
}

impl SortSpec {
    pub fn asc(field: SortField) -> Self {
        Self { field, direction: SortDirection::Asc }
    }

    pub fn desc(field: SortField) -> Self {
        Self { field, direction: SortDirection::Desc }
    }

    fn compare(&self, a: &Record, b: &Record) -> Ordering {
        let ordering = match self.field {
            SortField::Id => a.id.cmp(&b.id),
            SortField::RegisteredAt => a.registered_at.cmp(&b.registered_at),
            SortField::Bank => fold_text(&a.bank).cmp(&fold_text(&b.bank)),
            SortField::Consultant => fold_text(&a.consultant).cmp(&fold_text(&b.consultant)),
            SortField::Status => a.status.cmp(&b.status),
            SortField::OutstandingBalance => a.outstanding_balance.cmp(&b.outstanding_balance),
            SortField::CommissionExpected => a.commission_expected.cmp(&b.commission_expected),
            SortField::CommissionReceived => a.commission_received.cmp(&b.commission_received),
            SortField::PaidAt => a.paid_at.cmp(&b.paid_at),
        };
        let ordering = match self.direction {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        };
        // Ties always resolve by id ascending, whatever the direction
        ordering.then_with(|| a.id.cmp(&b.id))
    }
}

/// Query parameters owned by the caller for the duration of one query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterSpec {
    /// Free-text search over id, consultant and bank; empty bypasses it
    pub search: String,
    pub status: StatusFilter,
    pub bank: BankFilter,
    pub date_range: DateRange,
    /// 1-based
    pub page: usize,
    pub page_size: usize,
    pub sort: Option<SortSpec>,
}

impl Default for FilterSpec {
    fn default() -> Self {
        Self {
            search: String::new(),
            status: StatusFilter::All,
            bank: BankFilter::All,
            date_range: DateRange::default(),
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
            sort: None,
        }
    }
}

impl FilterSpec {
    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            page_size,
            ..Self::default()
        }
    }

    /// Clamp page and page size to at least 1 and swap a reversed date range
    pub fn normalized(&self) -> FilterSpec {
        FilterSpec {
            page: self.page.max(1),
            page_size: self.page_size.max(1),
            date_range: self.date_range.normalized(),
            ..self.clone()
        }
    }

    /// Whether a record satisfies every active predicate
    pub fn matches(&self, record: &Record) -> bool {
        let needle = fold_text(&self.search);
        matches_prepared(self, &needle, record)
    }
}

fn matches_prepared(spec: &FilterSpec, needle: &str, record: &Record) -> bool {
    if !needle.is_empty() {
        let hit = fold_text(&record.id).contains(needle)
            || fold_text(&record.consultant).contains(needle)
            || fold_text(&record.bank).contains(needle);
        if !hit {
            return false;
        }
    }

    if let StatusFilter::Only(status) = spec.status {
        if record.status != Some(status) {
            return false;
        }
    }

    if let BankFilter::Only(bank) = &spec.bank {
        if fold_text(bank) != fold_text(&record.bank) {
            return false;
        }
    }

    spec.date_range.contains(record.registered_at)
}

/// One page of query results, borrowing from the queried records
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryPage<'a> {
    pub records: Vec<&'a Record>,
    /// Size of the filtered set before pagination
    pub total_matching: usize,
    pub page: usize,
    pub page_size: usize,
    pub total_pages: usize,
}

impl QueryPage<'_> {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn has_next(&self) -> bool {
        self.page < self.total_pages
    }
}

/// Filter, optionally sort, then paginate.
///
/// Without a sort the filtered records keep their original relative order. A
/// page past the end comes back empty.
pub fn query<'a>(records: &'a [Record], spec: &FilterSpec) -> QueryPage<'a> {
    let spec = spec.normalized();
    let needle = fold_text(&spec.search);

    let mut matching: Vec<&Record> = records
        .iter()
        .filter(|record| matches_prepared(&spec, &needle, record))
        .collect();

    if let Some(sort) = spec.sort {
        // stable sort plus id tie-break keeps the output deterministic
        matching.sort_by(|a, b| sort.compare(a, b));
    }

    let total_matching = matching.len();
    let total_pages = total_matching.div_ceil(spec.page_size);
    let start = (spec.page - 1).saturating_mul(spec.page_size).min(total_matching);
    let end = start.saturating_add(spec.page_size).min(total_matching);
    let page_records = matching[start..end].to_vec();

    metrics::query::executed(total_matching);

    QueryPage {
        records: page_records,
        total_matching,
        page: spec.page,
        page_size: spec.page_size,
        total_pages,
    }
}

/// Distinct non-empty bank names, first-seen order, compared case-insensitively
pub fn distinct_banks(records: &[Record]) -> Vec<String> {
    distinct_by(records, |r| r.bank.as_str())
}

/// Distinct non-empty consultant names, first-seen order
pub fn distinct_consultants(records: &[Record]) -> Vec<String> {
    distinct_by(records, |r| r.consultant.as_str())
}

fn distinct_by<F>(records: &[Record], field: F) -> Vec<String>
where
    F: Fn(&Record) -> &str,
{
    let mut seen = std::collections::HashSet::new();
    let mut values = Vec::new();
    for record in records {
        let value = field(record).trim();
        if value.is_empty() {
            continue;
        }
        if seen.insert(fold_text(value)) {
            values.push(value.to_string());
        }
    }
    values
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, bank: &str, consultant: &str, status: ContractStatus, day: u32) -> Record {
        let mut r = Record::new(id, 2);
        r.bank = bank.to_string();
        r.consultant = consultant.to_string();
        r.status = Some(status);
        r.registered_at = NaiveDate::from_ymd_opt(2024, 8, day);
        r
    }

    fn sample() -> Vec<Record> {
        vec![
            record("CORB-000001", "Banco do Brasil", "João Silva", ContractStatus::Paid, 15),
            record("CORB-000002", "Caixa Econômica", "Maria Santos", ContractStatus::Booked, 16),
            record("CORB-000003", "Itaú", "Pedro Costa", ContractStatus::Registered, 17),
            record("CORB-000004", "Bradesco", "Ana Oliveira", ContractStatus::Paid, 18),
            record("CORB-000005", "Santander", "Carlos Lima", ContractStatus::Cancelled, 19),
            record("CORB-000006", "Banco do Brasil", "Maria Santos", ContractStatus::Paid, 20),
        ]
    }

    fn ids(page: &QueryPage<'_>) -> Vec<String> {
        page.records.iter().map(|r| r.id.clone()).collect()
    }

    #[test]
    fn test_default_spec_returns_first_page_in_order() {
        let records = sample();
        let page = query(&records, &FilterSpec::with_page_size(4));
        assert_eq!(page.total_matching, 6);
        assert_eq!(page.total_pages, 2);
        assert_eq!(ids(&page), vec!["CORB-000001", "CORB-000002", "CORB-000003", "CORB-000004"]);
        assert!(page.has_next());
    }

    #[test]
    fn test_search_is_case_and_accent_insensitive() {
        let records = sample();
        let spec = FilterSpec {
            search: "MARIA".to_string(),
            ..FilterSpec::default()
        };
        assert_eq!(query(&records, &spec).total_matching, 2);

        let spec = FilterSpec {
            search: "joao".to_string(),
            ..FilterSpec::default()
        };
        assert_eq!(ids(&query(&records, &spec)), vec!["CORB-000001"]);

        let spec = FilterSpec {
            search: "itau".to_string(),
            ..FilterSpec::default()
        };
        assert_eq!(ids(&query(&records, &spec)), vec!["CORB-000003"]);
    }

    #[test]
    fn test_search_folds_capitals_outside_portuguese() {
        let mut records = sample();
        records.push(record("CORB-000007", "Itaú", "ÑUÑEZ Ødegaard", ContractStatus::Booked, 21));
        for term in ["ñuñez", "ødegaard", "Ñuñez ØDEGAARD"] {
            let spec = FilterSpec {
                search: term.to_string(),
                ..FilterSpec::default()
            };
            assert_eq!(ids(&query(&records, &spec)), vec!["CORB-000007"], "search '{}'", term);
        }
    }

    #[test]
    fn test_predicates_are_and_combined() {
        let records = sample();
        let spec = FilterSpec {
            status: StatusFilter::Only(ContractStatus::Paid),
            bank: BankFilter::Only("  banco do brasil ".to_string()),
            ..FilterSpec::default()
        };
        let page = query(&records, &spec);
        assert_eq!(ids(&page), vec!["CORB-000001", "CORB-000006"]);
    }

    #[test]
    fn test_total_matching_is_independent_of_pagination() {
        let records = sample();
        let base = FilterSpec {
            status: StatusFilter::Only(ContractStatus::Paid),
            ..FilterSpec::default()
        };
        let expected = records.iter().filter(|r| base.matches(r)).count();
        for page in 1..=4 {
            for page_size in 1..=7 {
                let spec = FilterSpec { page, page_size, ..base.clone() };
                let result = query(&records, &spec);
                assert_eq!(result.total_matching, expected);
                assert!(result.records.len() <= page_size);
                let past_end = (page - 1) * page_size >= expected;
                assert_eq!(result.is_empty(), past_end);
            }
        }
    }

    #[test]
    fn test_page_beyond_end_is_empty() {
        let records = sample();
        let spec = FilterSpec { page: 10, page_size: 5, ..FilterSpec::default() };
        let page = query(&records, &spec);
        assert!(page.is_empty());
        assert_eq!(page.total_matching, 6);
        assert_eq!(page.total_pages, 2);
    }

    #[test]
    fn test_malformed_spec_is_normalized() {
        let records = sample();
        let spec = FilterSpec {
            page: 0,
            page_size: 0,
            date_range: DateRange::new(NaiveDate::from_ymd_opt(2024, 8, 17), NaiveDate::from_ymd_opt(2024, 8, 16)),
            ..FilterSpec::default()
        };
        let page = query(&records, &spec);
        assert_eq!(page.page, 1);
        assert_eq!(page.page_size, 1);
        assert_eq!(page.total_matching, 2);
        assert_eq!(ids(&page), vec!["CORB-000002"]);
    }

    #[test]
    fn test_date_range_is_inclusive_and_skips_undated() {
        let mut records = sample();
        records[0].registered_at = None;
        let spec = FilterSpec {
            date_range: DateRange::new(NaiveDate::from_ymd_opt(2024, 8, 15), NaiveDate::from_ymd_opt(2024, 8, 17)),
            ..FilterSpec::default()
        };
        assert_eq!(ids(&query(&records, &spec)), vec!["CORB-000002", "CORB-000003"]);

        let open_ended = FilterSpec {
            date_range: DateRange::new(NaiveDate::from_ymd_opt(2024, 8, 19), None),
            ..FilterSpec::default()
        };
        assert_eq!(query(&records, &open_ended).total_matching, 2);
    }

    #[test]
    fn test_sort_breaks_ties_by_id() {
        let records = sample();
        let spec = FilterSpec {
            sort: Some(SortSpec::desc(SortField::Bank)),
            ..FilterSpec::default()
        };
        let page = query(&records, &spec);
        assert_eq!(
            ids(&page),
            vec!["CORB-000005", "CORB-000003", "CORB-000002", "CORB-000004", "CORB-000001", "CORB-000006"]
        );
    }

    #[test]
    fn test_query_is_deterministic() {
        let records = sample();
        let spec = FilterSpec {
            search: "a".to_string(),
            sort: Some(SortSpec::asc(SortField::Status)),
            page_size: 3,
            ..FilterSpec::default()
        };
        assert_eq!(query(&records, &spec), query(&records, &spec));
    }

    #[test]
    fn test_distinct_values_keep_first_seen_order() {
        let records = sample();
        assert_eq!(
            distinct_banks(&records),
            vec!["Banco do Brasil", "Caixa Econômica", "Itaú", "Bradesco", "Santander"]
        );
        assert_eq!(distinct_consultants(&records).len(), 5);
    }

    #[test]
    fn test_filter_spec_round_trips_through_json() {
        let spec = FilterSpec {
            status: StatusFilter::Only(ContractStatus::Booked),
            sort: Some(SortSpec::asc(SortField::RegisteredAt)),
            ..FilterSpec::default()
        };
        let json = serde_json::to_string(&spec).unwrap();
        let back: FilterSpec = serde_json::from_str(&json).unwrap();
        assert_eq!(back, spec);
    }
}
