use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use std::str::FromStr;
use tracing::{debug, warn};

use crate::constants::*;
use crate::domain::{fold_text, CellDefect, CellDefectKind, ContractStatus, Record};
use crate::error::{NavigatorError, Result};
use crate::pipeline::ingestion::workbook::Sheet;

/// Record fields a sheet column can feed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordField {
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

impl RecordField {
    /// Canonical column name used in issue drill-down
    pub fn column_name(&self) -> &'static str {
        match self {
            RecordField::Id => COL_ID,
            RecordField::RegisteredAt => COL_REGISTERED_AT,
            RecordField::Bank => COL_BANK,
            RecordField::Consultant => COL_CONSULTANT,
            RecordField::Status => COL_STATUS,
            RecordField::OutstandingBalance => COL_OUTSTANDING_BALANCE,
            RecordField::CommissionExpected => COL_COMMISSION_EXPECTED,
            RecordField::CommissionReceived => COL_COMMISSION_RECEIVED,
            RecordField::PaidAt => COL_PAID_AT,
        }
    }

    /// Match a header against known pt-BR and English aliases
    pub fn from_header(header: &str) -> Option<Self> {
        let key: String = fold_text(header)
            .chars()
            .map(|c| if c == ' ' || c == '-' || c == '.' { '_' } else { c })
            .collect();
        match key.as_str() {
            "id" | "contrato" | "contract_id" => Some(RecordField::Id),
            "data_cadastro" | "registered_at" | "registration_date" => Some(RecordField::RegisteredAt),
            "banco" | "bank" => Some(RecordField::Bank),
            "consultor" | "consultant" | "agent" => Some(RecordField::Consultant),
            "status" | "situacao" => Some(RecordField::Status),
            "saldo_devedor" | "outstanding_balance" => Some(RecordField::OutstandingBalance),
            "comissao_prevista" | "commission_expected" => Some(RecordField::CommissionExpected),
            "comissao_recebida" | "commission_received" => Some(RecordField::CommissionReceived),
            "data_pago" | "data_pagamento" | "paid_at" => Some(RecordField::PaidAt),
            _ => None,
        }
    }
}

/// Column positions of the recognised fields in a sheet
#[derive(Debug, Clone, Default)]
pub struct ColumnMapping {
    columns: Vec<(RecordField, usize)>,
}

impl ColumnMapping {
    /// Build the mapping; the first column matching a field wins
    pub fn from_headers(headers: &[String]) -> Result<Self> {
        let mut columns: Vec<(RecordField, usize)> = Vec::new();
        for (index, header) in headers.iter().enumerate() {
            if let Some(field) = RecordField::from_header(header) {
                if columns.iter().any(|(f, _)| *f == field) {
                    warn!("Duplicate column for '{}' ignored at position {}", field.column_name(), index);
                    continue;
                }
                columns.push((field, index));
            }
        }
        if !columns.iter().any(|(f, _)| *f == RecordField::Id) {
            return Err(NavigatorError::Parse(
                "no identifier column found (expected 'id')".to_string(),
            ));
        }
        debug!("Mapped {} of {} columns", columns.len(), headers.len());
        Ok(Self { columns })
    }

    pub fn position(&self, field: RecordField) -> Option<usize> {
        self.columns.iter().find(|(f, _)| *f == field).map(|(_, i)| *i)
    }

    pub fn mapped_fields(&self) -> impl Iterator<Item = RecordField> + '_ {
        self.columns.iter().map(|(f, _)| *f)
    }
}

/// Convert a sheet into records; unreadable cells become defects, never errors
pub fn map_sheet(sheet: &Sheet) -> Result<Vec<Record>> {
    let mapping = ColumnMapping::from_headers(&sheet.headers)?;
    let records = sheet
        .rows
        .iter()
        .enumerate()
        .map(|(i, row)| map_row(&mapping, row, sheet.line_of(i)))
        .collect();
    Ok(records)
}

fn cell_text<'a>(mapping: &ColumnMapping, row: &'a [String], field: RecordField) -> &'a str {
    mapping
        .position(field)
        .and_then(|i| row.get(i))
        .map(|s| s.trim())
        .unwrap_or("")
}

fn map_row(mapping: &ColumnMapping, row: &[String], row_index: usize) -> Record {
    let cell = |field: RecordField| cell_text(mapping, row, field);

    let mut record = Record::new(cell(RecordField::Id), row_index);
    record.bank = cell(RecordField::Bank).to_string();
    record.consultant = cell(RecordField::Consultant).to_string();
    record.registered_at = read_date(RecordField::RegisteredAt, cell(RecordField::RegisteredAt), &mut record.defects);
    record.paid_at = read_date(RecordField::PaidAt, cell(RecordField::PaidAt), &mut record.defects);
    record.outstanding_balance =
        read_amount(RecordField::OutstandingBalance, cell(RecordField::OutstandingBalance), &mut record.defects);
    record.commission_expected =
        read_amount(RecordField::CommissionExpected, cell(RecordField::CommissionExpected), &mut record.defects);
    record.commission_received =
        read_amount(RecordField::CommissionReceived, cell(RecordField::CommissionReceived), &mut record.defects);

    let status_text = cell(RecordField::Status);
    if !status_text.is_empty() {
        match ContractStatus::from_str(status_text) {
            Ok(status) => record.status = Some(status),
            Err(_) => record.defects.push(CellDefect {
                column: COL_STATUS.to_string(),
                value: status_text.to_string(),
                kind: CellDefectKind::UnknownStatus,
            }),
        }
    }

    record
}

fn is_null_text(text: &str) -> bool {
    text.is_empty() || text.eq_ignore_ascii_case("null") || text == "-"
}

fn read_date(field: RecordField, text: &str, defects: &mut Vec<CellDefect>) -> Option<NaiveDate> {
    if is_null_text(text) {
        return None;
    }
    match parse_date(text) {
        Some((date, true)) => Some(date),
        Some((date, false)) => {
            defects.push(CellDefect {
                column: field.column_name().to_string(),
                value: text.to_string(),
                kind: CellDefectKind::NonLocalDateFormat,
            });
            Some(date)
        }
        None => {
            defects.push(CellDefect {
                column: field.column_name().to_string(),
                value: text.to_string(),
                kind: CellDefectKind::InvalidDate,
            });
            None
        }
    }
}

fn read_amount(field: RecordField, text: &str, defects: &mut Vec<CellDefect>) -> Option<Decimal> {
    if is_null_text(text) {
        return None;
    }
    match parse_amount(text) {
        Some(amount) => Some(amount),
        None => {
            defects.push(CellDefect {
                column: field.column_name().to_string(),
                value: text.to_string(),
                kind: CellDefectKind::InvalidNumber,
            });
            None
        }
    }
}

/// Parse a date, returning whether it was written in the local DD/MM/YYYY format
pub fn parse_date(text: &str) -> Option<(NaiveDate, bool)> {
    let text = text.trim();
    if let Ok(date) = NaiveDate::parse_from_str(text, LOCAL_DATE_FORMAT) {
        return Some((date, true));
    }
    NaiveDate::parse_from_str(text, ISO_DATE_FORMAT)
        .ok()
        .map(|date| (date, false))
}

// pt-BR: '.' groups thousands, ',' marks decimals
static LOCAL_AMOUNT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{1,3}(?:\.\d{3})*(?:,\d+)?$").expect("Invalid local amount pattern"));
static PLAIN_AMOUNT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d+(?:\.\d+)?$").expect("Invalid plain amount pattern"));
// US export: ',' groups thousands and the decimal part is mandatory
static GROUPED_AMOUNT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{1,3}(?:,\d{3})+\.\d+$").expect("Invalid grouped amount pattern"));

/// Parse `1234.56`, `1.234,56`, `R$ 1.234` or `1,234.56` into a decimal amount.
///
/// A lone dot followed by exactly three digits reads as a thousands separator,
/// so `1.234` is one thousand two hundred thirty-four. Anything else is rejected.
pub fn parse_amount(text: &str) -> Option<Decimal> {
    let text = text.trim();
    let (negative, text) = match text.strip_prefix('-') {
        Some(rest) => (true, rest.trim_start()),
        None => (false, text),
    };
    let digits: String = text
        .trim_start_matches("R$")
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();

    let normalized = if LOCAL_AMOUNT.is_match(&digits) && (digits.contains(',') || digits.contains('.')) {
        digits.replace('.', "").replace(',', ".")
    } else if PLAIN_AMOUNT.is_match(&digits) {
        digits
    } else if GROUPED_AMOUNT.is_match(&digits) {
        digits.replace(',', "")
    } else {
        return None;
    };

    let amount = Decimal::from_str(&normalized).ok()?;
    Some(if negative { -amount } else { amount })
}
