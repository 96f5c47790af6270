use chrono::NaiveDate;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::constants::*;
use crate::domain::{format_local_date, is_recognized_id, CellDefectKind, LifecycleViolation, Record};

/// Grouping shown on the quality screen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CheckCategory {
    Integrity,
    Temporal,
    Financial,
}

impl CheckCategory {
    pub fn label_pt(&self) -> &'static str {
        match self {
            CheckCategory::Integrity => "Integridade dos Dados",
            CheckCategory::Temporal => "Validação Temporal",
            CheckCategory::Financial => "Validação Financeira",
        }
    }
}

/// The fixed battery of quality checks, in run order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckKind {
    RequiredFields,
    DuplicateIds,
    TypeConsistency,
    ChronologicalDates,
    LocalDateFormat,
    FutureDates,
    ValidNumbers,
    CommissionRate,
    CommissionConsistency,
}

impl CheckKind {
    pub const ALL: [CheckKind; 9] = [
        CheckKind::RequiredFields,
        CheckKind::DuplicateIds,
        CheckKind::TypeConsistency,
        CheckKind::ChronologicalDates,
        CheckKind::LocalDateFormat,
        CheckKind::FutureDates,
        CheckKind::ValidNumbers,
        CheckKind::CommissionRate,
        CheckKind::CommissionConsistency,
    ];

    pub fn category(&self) -> CheckCategory {
        match self {
            CheckKind::RequiredFields | CheckKind::DuplicateIds | CheckKind::TypeConsistency => {
                CheckCategory::Integrity
            }
            CheckKind::ChronologicalDates | CheckKind::LocalDateFormat | CheckKind::FutureDates => {
                CheckCategory::Temporal
            }
            CheckKind::ValidNumbers | CheckKind::CommissionRate | CheckKind::CommissionConsistency => {
                CheckCategory::Financial
            }
        }
    }

    /// Display name
    pub fn name(&self) -> &'static str {
        match self {
            CheckKind::RequiredFields => "Campos obrigatórios preenchidos",
            CheckKind::DuplicateIds => "Duplicatas por ID",
            CheckKind::TypeConsistency => "Consistência de tipos",
            CheckKind::ChronologicalDates => "Datas em ordem cronológica",
            CheckKind::LocalDateFormat => "Formato de datas PT-BR",
            CheckKind::FutureDates => "Datas futuras inválidas",
            CheckKind::ValidNumbers => "Valores numéricos válidos",
            CheckKind::CommissionRate => "Percentuais dentro do range",
            CheckKind::CommissionConsistency => "Comissões consistentes",
        }
    }

    /// Stable machine key, used as a metric label
    pub fn key(&self) -> &'static str {
        match self {
            CheckKind::RequiredFields => "required_fields",
            CheckKind::DuplicateIds => "duplicate_ids",
            CheckKind::TypeConsistency => "type_consistency",
            CheckKind::ChronologicalDates => "chronological_dates",
            CheckKind::LocalDateFormat => "local_date_format",
            CheckKind::FutureDates => "future_dates",
            CheckKind::ValidNumbers => "valid_numbers",
            CheckKind::CommissionRate => "commission_rate",
            CheckKind::CommissionConsistency => "commission_consistency",
        }
    }
}

/// Kind of problem behind a detail row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueType {
    MissingValue,
    Duplicate,
    InvalidType,
    ChronologyViolation,
    NonLocalDateFormat,
    FutureDate,
    NegativeValue,
    RateOutOfRange,
    InconsistentCommission,
}

/// A single problem found by one check
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Finding {
    /// Position of the record in the analyzed slice
    pub position: usize,
    pub issue_type: IssueType,
    pub column: String,
    pub row_index: usize,
    pub value: String,
    pub description: String,
}

/// Units examined and problems found by one check
#[derive(Debug, Clone, Default)]
pub(crate) struct CheckOutcome {
    pub checked: usize,
    /// Failing units; a unit may carry several detail rows in `findings`
    pub issues: usize,
    pub findings: Vec<Finding>,
}

/// Inputs a check may read besides the records
#[derive(Debug, Clone, Copy)]
pub(crate) struct CheckContext {
    pub as_of: NaiveDate,
    pub min_commission_rate: f64,
    pub max_commission_rate: f64,
}

const NULL_DISPLAY: &str = "NULL";

impl CheckOutcome {
    /// Count a failing unit and record its detail row
    fn push(&mut self, position: usize, record: &Record, issue_type: IssueType, column: &str, value: String, description: String) {
        self.issues += 1;
        self.push_detail(position, record, issue_type, column, value, description);
    }

    /// Another detail row for a unit already counted
    fn push_detail(&mut self, position: usize, record: &Record, issue_type: IssueType, column: &str, value: String, description: String) {
        self.findings.push(Finding {
            position,
            issue_type,
            column: column.to_string(),
            row_index: record.row_index,
            value,
            description,
        });
    }
}

pub(crate) fn run_check(kind: CheckKind, records: &[Record], ctx: &CheckContext) -> CheckOutcome {
    match kind {
        CheckKind::RequiredFields => required_fields(records),
        CheckKind::DuplicateIds => duplicate_ids(records),
        CheckKind::TypeConsistency => type_consistency(records),
        CheckKind::ChronologicalDates => chronological_dates(records),
        CheckKind::LocalDateFormat => local_date_format(records),
        CheckKind::FutureDates => future_dates(records, ctx.as_of),
        CheckKind::ValidNumbers => valid_numbers(records),
        CheckKind::CommissionRate => commission_rate(records, ctx.min_commission_rate, ctx.max_commission_rate),
        CheckKind::CommissionConsistency => commission_consistency(records),
    }
}

fn has_defect(record: &Record, column: &str) -> bool {
    record.defects.iter().any(|d| d.column == column)
}

// A cell that failed to parse is reported by the type check, not as missing
fn required_fields(records: &[Record]) -> CheckOutcome {
    let mut outcome = CheckOutcome::default();
    for (position, record) in records.iter().enumerate() {
        let fields: [(&str, bool); 6] = [
            (COL_ID, !record.id.trim().is_empty()),
            (COL_REGISTERED_AT, record.registered_at.is_some()),
            (COL_BANK, !record.bank.trim().is_empty()),
            (COL_CONSULTANT, !record.consultant.trim().is_empty()),
            (COL_STATUS, record.status.is_some()),
            (COL_OUTSTANDING_BALANCE, record.outstanding_balance.is_some()),
        ];
        for (column, present) in fields {
            outcome.checked += 1;
            if !present && !has_defect(record, column) {
                outcome.push(
                    position,
                    record,
                    IssueType::MissingValue,
                    column,
                    NULL_DISPLAY.to_string(),
                    "Campo obrigatório vazio".to_string(),
                );
            }
        }
    }
    outcome
}

fn duplicate_ids(records: &[Record]) -> CheckOutcome {
    let mut outcome = CheckOutcome::default();
    let mut seen = HashSet::new();
    for (position, record) in records.iter().enumerate() {
        let id = record.id.trim();
        if id.is_empty() {
            continue;
        }
        outcome.checked += 1;
        if !seen.insert(id) {
            outcome.push(
                position,
                record,
                IssueType::Duplicate,
                COL_ID,
                id.to_string(),
                "ID duplicado encontrado".to_string(),
            );
        }
    }
    outcome
}

// id, two dates, three amounts, status
const TYPED_COLUMNS: usize = 7;

fn type_consistency(records: &[Record]) -> CheckOutcome {
    let mut outcome = CheckOutcome {
        checked: records.len() * TYPED_COLUMNS,
        ..CheckOutcome::default()
    };
    for (position, record) in records.iter().enumerate() {
        let id = record.id.trim();
        if !id.is_empty() && !is_recognized_id(id) {
            outcome.push(
                position,
                record,
                IssueType::InvalidType,
                COL_ID,
                id.to_string(),
                "ID fora do padrão CORB-NNNNNN ou numérico".to_string(),
            );
        }
        for defect in &record.defects {
            let description = match defect.kind {
                CellDefectKind::InvalidDate => "Data com formato inválido",
                CellDefectKind::InvalidNumber => "Valor não numérico em coluna monetária",
                CellDefectKind::UnknownStatus => "Status fora do ciclo de vida conhecido",
                CellDefectKind::NonLocalDateFormat => continue,
            };
            outcome.push(
                position,
                record,
                IssueType::InvalidType,
                &defect.column,
                defect.value.clone(),
                description.to_string(),
            );
        }
    }
    outcome
}

fn chronological_dates(records: &[Record]) -> CheckOutcome {
    let mut outcome = CheckOutcome::default();
    for (position, record) in records.iter().enumerate() {
        let (Some(registered), Some(paid)) = (record.registered_at, record.paid_at) else {
            continue;
        };
        outcome.checked += 1;
        if paid < registered {
            outcome.push(
                position,
                record,
                IssueType::ChronologyViolation,
                COL_PAID_AT,
                format_local_date(paid),
                format!("Pagamento anterior ao cadastro ({})", format_local_date(registered)),
            );
        }
    }
    outcome
}

fn dated_cells(record: &Record) -> [(&'static str, Option<NaiveDate>); 2] {
    [(COL_REGISTERED_AT, record.registered_at), (COL_PAID_AT, record.paid_at)]
}

fn local_date_format(records: &[Record]) -> CheckOutcome {
    let mut outcome = CheckOutcome::default();
    for (position, record) in records.iter().enumerate() {
        outcome.checked += dated_cells(record).iter().filter(|(_, d)| d.is_some()).count();
        for defect in record.defects.iter().filter(|d| d.kind == CellDefectKind::NonLocalDateFormat) {
            outcome.push(
                position,
                record,
                IssueType::NonLocalDateFormat,
                &defect.column,
                defect.value.clone(),
                "Data fora do formato DD/MM/AAAA".to_string(),
            );
        }
    }
    outcome
}

fn future_dates(records: &[Record], as_of: NaiveDate) -> CheckOutcome {
    let mut outcome = CheckOutcome::default();
    for (position, record) in records.iter().enumerate() {
        for (column, date) in dated_cells(record) {
            let Some(date) = date else { continue };
            outcome.checked += 1;
            if date > as_of {
                outcome.push(
                    position,
                    record,
                    IssueType::FutureDate,
                    column,
                    format_local_date(date),
                    format!("Data posterior a {}", format_local_date(as_of)),
                );
            }
        }
    }
    outcome
}

fn amount_cells(record: &Record) -> [(&'static str, Option<Decimal>); 3] {
    [
        (COL_OUTSTANDING_BALANCE, record.outstanding_balance),
        (COL_COMMISSION_EXPECTED, record.commission_expected),
        (COL_COMMISSION_RECEIVED, record.commission_received),
    ]
}

fn valid_numbers(records: &[Record]) -> CheckOutcome {
    let mut outcome = CheckOutcome::default();
    for (position, record) in records.iter().enumerate() {
        for (column, amount) in amount_cells(record) {
            let Some(amount) = amount else { continue };
            outcome.checked += 1;
            if amount.is_sign_negative() && !amount.is_zero() {
                outcome.push(
                    position,
                    record,
                    IssueType::NegativeValue,
                    column,
                    amount.to_string(),
                    "Valor monetário negativo".to_string(),
                );
            }
        }
    }
    outcome
}

fn commission_rate(records: &[Record], min_rate: f64, max_rate: f64) -> CheckOutcome {
    let mut outcome = CheckOutcome::default();
    for (position, record) in records.iter().enumerate() {
        let Some(rate) = record.commission_rate().and_then(|r| r.to_f64()) else {
            continue;
        };
        outcome.checked += 1;
        if rate < min_rate || rate > max_rate {
            let value = record
                .commission_expected
                .map(|c| c.to_string())
                .unwrap_or_default();
            outcome.push(
                position,
                record,
                IssueType::RateOutOfRange,
                COL_COMMISSION_EXPECTED,
                value,
                format!(
                    "Comissão de {:.2}% fora do intervalo {:.2}%–{:.2}%",
                    rate * 100.0,
                    min_rate * 100.0,
                    max_rate * 100.0
                ),
            );
        }
    }
    outcome
}

fn commission_consistency(records: &[Record]) -> CheckOutcome {
    let mut outcome = CheckOutcome::default();
    for (position, record) in records.iter().enumerate() {
        if record.status.is_none() {
            continue;
        }
        outcome.checked += 1;
        // One failing record, one detail row per broken rule
        for (nth, violation) in record.lifecycle_violations().into_iter().enumerate() {
            let (column, value, description) = match violation {
                LifecycleViolation::CommissionBeforePayment => (
                    COL_COMMISSION_RECEIVED,
                    display_amount(record.commission_received),
                    "Comissão recebida em contrato não pago",
                ),
                LifecycleViolation::MissingPaymentDate => (
                    COL_PAID_AT,
                    NULL_DISPLAY.to_string(),
                    "Contrato pago sem data de pagamento",
                ),
                LifecycleViolation::UnexpectedPaymentDate => (
                    COL_PAID_AT,
                    record.paid_at.map(format_local_date).unwrap_or_default(),
                    "Data de pagamento em contrato não pago",
                ),
                LifecycleViolation::CommissionOverpaid => (
                    COL_COMMISSION_RECEIVED,
                    display_amount(record.commission_received),
                    "Comissão recebida acima da prevista",
                ),
            };
            if nth == 0 {
                outcome.push(position, record, IssueType::InconsistentCommission, column, value, description.to_string());
            } else {
                outcome.push_detail(position, record, IssueType::InconsistentCommission, column, value, description.to_string());
            }
        }
    }
    outcome
}

fn display_amount(amount: Option<Decimal>) -> String {
    amount.map(|a| a.to_string()).unwrap_or_else(|| NULL_DISPLAY.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CellDefect, ContractStatus};

    fn ctx() -> CheckContext {
        CheckContext {
            as_of: NaiveDate::from_ymd_opt(2024, 12, 31).unwrap(),
            min_commission_rate: 0.0,
            max_commission_rate: 0.15,
        }
    }

    fn paid(id: &str) -> Record {
        let mut r = Record::new(id, 2);
        r.bank = "Itaú".to_string();
        r.consultant = "Pedro Costa".to_string();
        r.status = Some(ContractStatus::Paid);
        r.registered_at = NaiveDate::from_ymd_opt(2024, 8, 15);
        r.paid_at = NaiveDate::from_ymd_opt(2024, 8, 20);
        r.outstanding_balance = Some(Decimal::new(1000000, 2));
        r.commission_expected = Some(Decimal::new(50000, 2));
        r.commission_received = Some(Decimal::new(50000, 2));
        r
    }

    #[test]
    fn test_duplicates_flag_later_occurrences() {
        let records = vec![paid("A"), paid("B"), paid("A"), paid("A")];
        let outcome = run_check(CheckKind::DuplicateIds, &records, &ctx());
        assert_eq!(outcome.checked, 4);
        let positions: Vec<usize> = outcome.findings.iter().map(|f| f.position).collect();
        assert_eq!(positions, vec![2, 3]);
    }

    #[test]
    fn test_unparseable_cell_is_a_type_issue_not_a_missing_one() {
        let mut record = paid("CORB-000001");
        record.registered_at = None;
        record.defects.push(CellDefect {
            column: COL_REGISTERED_AT.to_string(),
            value: "32/08/2024".to_string(),
            kind: CellDefectKind::InvalidDate,
        });
        let records = vec![record];
        assert!(run_check(CheckKind::RequiredFields, &records, &ctx()).findings.is_empty());

        let types = run_check(CheckKind::TypeConsistency, &records, &ctx());
        assert_eq!(types.checked, TYPED_COLUMNS);
        assert_eq!(types.findings.len(), 1);
        assert_eq!(types.findings[0].value, "32/08/2024");
    }

    #[test]
    fn test_unknown_id_shape_is_a_type_issue() {
        let records = vec![paid("CORB-000001"), paid("123"), paid("X-9")];
        let outcome = run_check(CheckKind::TypeConsistency, &records, &ctx());
        assert_eq!(outcome.findings.len(), 1);
        assert_eq!(outcome.findings[0].value, "X-9");
    }

    #[test]
    fn test_chronology_and_future_dates() {
        let mut backwards = paid("A");
        backwards.paid_at = NaiveDate::from_ymd_opt(2024, 8, 1);
        let mut future = paid("B");
        future.registered_at = NaiveDate::from_ymd_opt(2025, 3, 1);
        future.paid_at = NaiveDate::from_ymd_opt(2025, 3, 5);
        let records = vec![backwards, future];

        let chrono = run_check(CheckKind::ChronologicalDates, &records, &ctx());
        assert_eq!(chrono.checked, 2);
        assert_eq!(chrono.findings.len(), 1);
        assert_eq!(chrono.findings[0].value, "01/08/2024");

        let future = run_check(CheckKind::FutureDates, &records, &ctx());
        assert_eq!(future.checked, 4);
        assert_eq!(future.findings.len(), 2);
    }

    #[test]
    fn test_commission_rate_range() {
        let mut high = paid("A");
        high.commission_expected = Some(Decimal::new(200000, 2));
        high.commission_received = Some(Decimal::new(200000, 2));
        let mut zero_balance = paid("B");
        zero_balance.outstanding_balance = Some(Decimal::ZERO);
        let records = vec![high, zero_balance, paid("C")];

        let outcome = run_check(CheckKind::CommissionRate, &records, &ctx());
        assert_eq!(outcome.checked, 2);
        assert_eq!(outcome.findings.len(), 1);
        assert_eq!(outcome.findings[0].column, COL_COMMISSION_EXPECTED);
    }

    #[test]
    fn test_negative_amounts() {
        let mut record = paid("A");
        record.outstanding_balance = Some(Decimal::new(-100, 0));
        let outcome = run_check(CheckKind::ValidNumbers, &[record], &ctx());
        assert_eq!(outcome.checked, 3);
        assert_eq!(outcome.findings.len(), 1);
        assert_eq!(outcome.findings[0].value, "-100");
    }

    #[test]
    fn test_commission_consistency_reports_each_violation() {
        let mut booked = paid("A");
        booked.status = Some(ContractStatus::Booked);
        let outcome = run_check(CheckKind::CommissionConsistency, &[booked], &ctx());
        assert_eq!(outcome.checked, 1);
        assert_eq!(outcome.issues, 1);
        let columns: Vec<&str> = outcome.findings.iter().map(|f| f.column.as_str()).collect();
        assert_eq!(columns, vec![COL_COMMISSION_RECEIVED, COL_PAID_AT]);
    }

    #[test]
    fn test_record_breaking_several_rules_counts_once() {
        let mut booked = paid("CORB-000004");
        booked.status = Some(ContractStatus::Booked);
        booked.commission_received = Some(Decimal::new(90000, 2));
        let records = vec![paid("CORB-000001"), paid("CORB-000002"), paid("CORB-000003"), booked];

        let outcome = run_check(CheckKind::CommissionConsistency, &records, &ctx());
        assert_eq!(outcome.checked, 4);
        assert_eq!(outcome.issues, 1);
        assert_eq!(outcome.findings.len(), 3);
        assert!(outcome.findings.iter().all(|f| f.position == 3));
    }
}
