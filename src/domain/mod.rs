use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::constants::*;

/// Lifecycle state of a contract
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ContractStatus {
    /// Cadastrado
    Registered,
    /// Averbado
    Booked,
    /// Pago
    Paid,
    /// Cancelado
    Cancelled,
}

impl ContractStatus {
    pub const ALL: [ContractStatus; 4] = [
        ContractStatus::Registered,
        ContractStatus::Booked,
        ContractStatus::Paid,
        ContractStatus::Cancelled,
    ];

    /// Label used in the source spreadsheets
    pub fn label_pt(&self) -> &'static str {
        match self {
            ContractStatus::Registered => "Cadastrado",
            ContractStatus::Booked => "Averbado",
            ContractStatus::Paid => "Pago",
            ContractStatus::Cancelled => "Cancelado",
        }
    }

    /// Display tone used by presentation layers
    pub fn tone(&self) -> StatusTone {
        match self {
            ContractStatus::Paid => StatusTone::Success,
            ContractStatus::Booked => StatusTone::Primary,
            ContractStatus::Registered => StatusTone::Warning,
            ContractStatus::Cancelled => StatusTone::Danger,
        }
    }

    /// Whether this status is terminal
    pub fn is_terminal(&self) -> bool {
        matches!(self, ContractStatus::Paid | ContractStatus::Cancelled)
    }

    /// Contracts only move forward; cancellation is reachable from any open state.
    pub fn can_transition_to(&self, next: ContractStatus) -> bool {
        match (self, next) {
            (ContractStatus::Registered, ContractStatus::Booked)
            | (ContractStatus::Registered, ContractStatus::Paid)
            | (ContractStatus::Booked, ContractStatus::Paid) => true,
            (ContractStatus::Registered, ContractStatus::Cancelled)
            | (ContractStatus::Booked, ContractStatus::Cancelled) => true,
            _ => false,
        }
    }
}

impl fmt::Display for ContractStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ContractStatus::Registered => "registered",
            ContractStatus::Booked => "booked",
            ContractStatus::Paid => "paid",
            ContractStatus::Cancelled => "cancelled",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for ContractStatus {
    type Err = String;

    /// Accepts pt-BR and English labels, ignoring case and accents
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match fold_text(s).as_str() {
            "cadastrado" | "registered" => Ok(ContractStatus::Registered),
            "averbado" | "booked" => Ok(ContractStatus::Booked),
            "pago" | "paid" => Ok(ContractStatus::Paid),
            "cancelado" | "cancelled" | "canceled" => Ok(ContractStatus::Cancelled),
            other => Err(format!("unknown contract status '{}'", other)),
        }
    }
}

/// Visual tone for a status badge
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum StatusTone {
    Success,
    Primary,
    Warning,
    Danger,
}

/// Kind of problem found while reading a single cell
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum CellDefectKind {
    /// Date text that could not be read in any accepted format
    InvalidDate,
    /// Valid date written in ISO instead of DD/MM/YYYY
    NonLocalDateFormat,
    /// Non-numeric text in a monetary column
    InvalidNumber,
    /// Status text outside the known lifecycle
    UnknownStatus,
}

/// A cell that could not be interpreted during import
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CellDefect {
    pub column: String,
    pub value: String,
    pub kind: CellDefectKind,
}

/// One contract entry as loaded from a workbook
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Record {
    pub id: String,
    /// 1-based source row (header is row 1)
    pub row_index: usize,
    pub registered_at: Option<NaiveDate>,
    pub bank: String,
    pub consultant: String,
    pub status: Option<ContractStatus>,
    pub outstanding_balance: Option<Decimal>,
    pub commission_expected: Option<Decimal>,
    pub commission_received: Option<Decimal>,
    pub paid_at: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub defects: Vec<CellDefect>,
}

/// A breach of the contract lifecycle invariants
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum LifecycleViolation {
    /// Commission received while the contract is not paid
    CommissionBeforePayment,
    /// Paid contract without a payment date
    MissingPaymentDate,
    /// Payment date on a contract that is not paid
    UnexpectedPaymentDate,
    /// Received commission exceeds the expected amount
    CommissionOverpaid,
}

impl Record {
    /// Start a record with only its identity; everything else empty
    pub fn new(id: impl Into<String>, row_index: usize) -> Self {
        Self {
            id: id.into(),
            row_index,
            registered_at: None,
            bank: String::new(),
            consultant: String::new(),
            status: None,
            outstanding_balance: None,
            commission_expected: None,
            commission_received: None,
            paid_at: None,
            defects: Vec::new(),
        }
    }

    pub fn is_paid(&self) -> bool {
        self.status == Some(ContractStatus::Paid)
    }

    /// Days from registration to payment, when both dates are known
    pub fn days_to_payment(&self) -> Option<i64> {
        match (self.registered_at, self.paid_at) {
            (Some(registered), Some(paid)) => Some((paid - registered).num_days()),
            _ => None,
        }
    }

    /// Expected commission as a fraction of the outstanding balance
    pub fn commission_rate(&self) -> Option<Decimal> {
        let balance = self.outstanding_balance?;
        let expected = self.commission_expected?;
        if balance.is_zero() {
            return None;
        }
        Some(expected / balance)
    }

    /// Checks the lifecycle invariants of the record; only meaningful when status is known
    pub fn lifecycle_violations(&self) -> Vec<LifecycleViolation> {
        let mut violations = Vec::new();
        let Some(status) = self.status else {
            return violations;
        };
        let received = self.commission_received.unwrap_or(Decimal::ZERO);

        if received > Decimal::ZERO && status != ContractStatus::Paid {
            violations.push(LifecycleViolation::CommissionBeforePayment);
        }
        match (status == ContractStatus::Paid, self.paid_at.is_some()) {
            (true, false) => violations.push(LifecycleViolation::MissingPaymentDate),
            (false, true) => violations.push(LifecycleViolation::UnexpectedPaymentDate),
            _ => {}
        }
        if let Some(expected) = self.commission_expected {
            if received > expected {
                violations.push(LifecycleViolation::CommissionOverpaid);
            }
        }
        violations
    }
}

/// Lowercase, trim and strip Portuguese diacritics for tolerant comparisons
pub fn fold_text(s: &str) -> String {
    s.trim()
        .chars()
        .map(|c| match c {
            'á' | 'à' | 'â' | 'ã' | 'ä' | 'Á' | 'À' | 'Â' | 'Ã' | 'Ä' => 'a',
            'é' | 'è' | 'ê' | 'ë' | 'É' | 'È' | 'Ê' | 'Ë' => 'e',
            'í' | 'ì' | 'î' | 'ï' | 'Í' | 'Ì' | 'Î' | 'Ï' => 'i',
            'ó' | 'ò' | 'ô' | 'õ' | 'ö' | 'Ó' | 'Ò' | 'Ô' | 'Õ' | 'Ö' => 'o',
            'ú' | 'ù' | 'û' | 'ü' | 'Ú' | 'Ù' | 'Û' | 'Ü' => 'u',
            'ç' | 'Ç' => 'c',
            other => other,
        })
        .flat_map(char::to_lowercase)
        .collect()
}

static CONTRACT_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:CORB-\d{6}|\d+)$").expect("Invalid contract id pattern"));

/// Whether an id follows one of the known shapes: `CORB-NNNNNN` or a plain numeric sequence
pub fn is_recognized_id(id: &str) -> bool {
    CONTRACT_ID.is_match(id.trim())
}

/// Formats a date the way the source spreadsheets do
pub fn format_local_date(date: NaiveDate) -> String {
    date.format(LOCAL_DATE_FORMAT).to_string()
}
