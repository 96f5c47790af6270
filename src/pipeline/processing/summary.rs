// Portfolio KPIs plus bank and consultant insights

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::domain::{fold_text, ContractStatus, Record};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusCount {
    pub status: ContractStatus,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BankInsight {
    pub bank: String,
    /// Number of contracts
    pub volume: usize,
    pub outstanding_balance: Decimal,
    /// Mean days from registration to payment over paid contracts with both dates
    pub avg_days_to_payment: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsultantInsight {
    pub consultant: String,
    pub contracts: usize,
    pub paid_contracts: usize,
    /// paid / total * 100
    pub conversion_rate: f64,
    pub avg_commission_expected: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioSummary {
    pub total_records: usize,
    pub total_outstanding_balance: Decimal,
    pub total_commission_expected: Decimal,
    pub total_commission_received: Decimal,
    /// In lifecycle order, zero counts included
    pub status_counts: Vec<StatusCount>,
    /// Records whose status could not be read
    pub unknown_status: usize,
    pub banks: Vec<BankInsight>,
    pub consultants: Vec<ConsultantInsight>,
    /// Share of contracts held by the two largest banks, in percent
    pub top_bank_concentration: f64,
}

impl PortfolioSummary {
    pub fn count_of(&self, status: ContractStatus) -> usize {
        self.status_counts
            .iter()
            .find(|s| s.status == status)
            .map(|s| s.count)
            .unwrap_or(0)
    }
}

#[derive(Default)]
struct BankAcc {
    name: String,
    volume: usize,
    outstanding: Decimal,
    days_total: i64,
    days_samples: usize,
}

#[derive(Default)]
struct ConsultantAcc {
    name: String,
    contracts: usize,
    paid: usize,
    commission_total: Decimal,
    commission_samples: usize,
}

/// Group key: names are compared ignoring case and accents; the first spelling wins
fn group<'a, T: Default>(
    order: &'a mut Vec<T>,
    index: &mut HashMap<String, usize>,
    name: &str,
) -> Option<(&'a mut T, bool)> {
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    let key = fold_text(name);
    let (position, fresh) = match index.get(&key) {
        Some(&i) => (i, false),
        None => {
            order.push(T::default());
            index.insert(key, order.len() - 1);
            (order.len() - 1, true)
        }
    };
    order.get_mut(position).map(|acc| (acc, fresh))
}

pub fn summarize(records: &[Record]) -> PortfolioSummary {
    let mut total_outstanding = Decimal::ZERO;
    let mut total_expected = Decimal::ZERO;
    let mut total_received = Decimal::ZERO;
    let mut per_status: HashMap<ContractStatus, usize> = HashMap::new();
    let mut unknown_status = 0;

    let mut banks: Vec<BankAcc> = Vec::new();
    let mut bank_index = HashMap::new();
    let mut consultants: Vec<ConsultantAcc> = Vec::new();
    let mut consultant_index = HashMap::new();

    for record in records {
        total_outstanding += record.outstanding_balance.unwrap_or_default();
        total_expected += record.commission_expected.unwrap_or_default();
        total_received += record.commission_received.unwrap_or_default();

        match record.status {
            Some(status) => *per_status.entry(status).or_insert(0) += 1,
            None => unknown_status += 1,
        }

        if let Some((acc, fresh)) = group(&mut banks, &mut bank_index, &record.bank) {
            if fresh {
                acc.name = record.bank.trim().to_string();
            }
            acc.volume += 1;
            acc.outstanding += record.outstanding_balance.unwrap_or_default();
            if record.is_paid() {
                if let Some(days) = record.days_to_payment() {
                    acc.days_total += days;
                    acc.days_samples += 1;
                }
            }
        }

        if let Some((acc, fresh)) = group(&mut consultants, &mut consultant_index, &record.consultant) {
            if fresh {
                acc.name = record.consultant.trim().to_string();
            }
            acc.contracts += 1;
            if record.is_paid() {
                acc.paid += 1;
            }
            if let Some(expected) = record.commission_expected {
                acc.commission_total += expected;
                acc.commission_samples += 1;
            }
        }
    }

    let status_counts = ContractStatus::ALL
        .iter()
        .map(|status| StatusCount {
            status: *status,
            count: per_status.get(status).copied().unwrap_or(0),
        })
        .collect();

    let top_bank_concentration = concentration(&banks, records.len());

    let banks = banks
        .into_iter()
        .map(|acc| BankInsight {
            bank: acc.name,
            volume: acc.volume,
            outstanding_balance: acc.outstanding,
            avg_days_to_payment: (acc.days_samples > 0)
                .then(|| acc.days_total as f64 / acc.days_samples as f64),
        })
        .collect();

    let consultants = consultants
        .into_iter()
        .map(|acc| ConsultantInsight {
            conversion_rate: acc.paid as f64 / acc.contracts as f64 * 100.0,
            avg_commission_expected: (acc.commission_samples > 0)
                .then(|| (acc.commission_total / Decimal::from(acc.commission_samples)).round_dp(2)),
            consultant: acc.name,
            contracts: acc.contracts,
            paid_contracts: acc.paid,
        })
        .collect();

    PortfolioSummary {
        total_records: records.len(),
        total_outstanding_balance: total_outstanding,
        total_commission_expected: total_expected,
        total_commission_received: total_received,
        status_counts,
        unknown_status,
        banks,
        consultants,
        top_bank_concentration,
    }
}

fn concentration(banks: &[BankAcc], total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let mut volumes: Vec<usize> = banks.iter().map(|b| b.volume).collect();
    volumes.sort_unstable_by(|a, b| b.cmp(a));
    let top: usize = volumes.iter().take(2).sum();
    top as f64 / total as f64 * 100.0
}

/// Expected commission as a share of outstanding balance over the whole portfolio, in percent
pub fn portfolio_commission_rate(summary: &PortfolioSummary) -> Option<f64> {
    if summary.total_outstanding_balance.is_zero() {
        return None;
    }
    (summary.total_commission_expected / summary.total_outstanding_balance * Decimal::ONE_HUNDRED).to_f64()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn record(id: &str, bank: &str, consultant: &str, status: ContractStatus, balance: i64, commission: i64) -> Record {
        let mut r = Record::new(id, 2);
        r.bank = bank.to_string();
        r.consultant = consultant.to_string();
        r.status = Some(status);
        r.registered_at = NaiveDate::from_ymd_opt(2024, 8, 10);
        r.outstanding_balance = Some(Decimal::new(balance, 2));
        r.commission_expected = Some(Decimal::new(commission, 2));
        if status == ContractStatus::Paid {
            r.paid_at = NaiveDate::from_ymd_opt(2024, 8, 20);
            r.commission_received = Some(Decimal::new(commission, 2));
        }
        r
    }

    fn sample() -> Vec<Record> {
        vec![
            record("1", "Banco do Brasil", "João Silva", ContractStatus::Paid, 1_000_000, 50_000),
            record("2", "banco do brasil", "João Silva", ContractStatus::Booked, 2_000_000, 100_000),
            record("3", "Itaú", "Maria Santos", ContractStatus::Paid, 500_000, 25_000),
            record("4", "Caixa Econômica", "Maria Santos", ContractStatus::Cancelled, 300_000, 15_000),
            record("5", "Banco do Brasil", "Pedro Costa", ContractStatus::Registered, 200_000, 10_000),
        ]
    }

    #[test]
    fn test_totals_match_record_sums() {
        let records = sample();
        let summary = summarize(&records);
        assert_eq!(summary.total_records, 5);
        assert_eq!(summary.total_outstanding_balance, Decimal::new(4_000_000, 2));
        assert_eq!(summary.total_commission_expected, Decimal::new(200_000, 2));
        assert_eq!(summary.total_commission_received, Decimal::new(75_000, 2));
        assert_eq!(portfolio_commission_rate(&summary), Some(5.0));
    }

    #[test]
    fn test_status_counts_in_lifecycle_order() {
        let summary = summarize(&sample());
        let statuses: Vec<ContractStatus> = summary.status_counts.iter().map(|s| s.status).collect();
        assert_eq!(statuses, ContractStatus::ALL.to_vec());
        assert_eq!(summary.count_of(ContractStatus::Paid), 2);
        assert_eq!(summary.count_of(ContractStatus::Cancelled), 1);
        assert_eq!(summary.unknown_status, 0);
    }

    #[test]
    fn test_bank_insights_group_case_insensitively() {
        let summary = summarize(&sample());
        let names: Vec<&str> = summary.banks.iter().map(|b| b.bank.as_str()).collect();
        assert_eq!(names, vec!["Banco do Brasil", "Itaú", "Caixa Econômica"]);
        assert_eq!(summary.banks[0].volume, 3);
        assert_eq!(summary.banks[0].avg_days_to_payment, Some(10.0));
        assert_eq!(summary.banks[2].avg_days_to_payment, None);
        assert!((summary.top_bank_concentration - 80.0).abs() < 1e-9);
    }

    #[test]
    fn test_consultant_conversion_and_average_commission() {
        let summary = summarize(&sample());
        let joao = &summary.consultants[0];
        assert_eq!(joao.consultant, "João Silva");
        assert_eq!(joao.contracts, 2);
        assert_eq!(joao.paid_contracts, 1);
        assert!((joao.conversion_rate - 50.0).abs() < 1e-9);
        assert_eq!(joao.avg_commission_expected, Some(Decimal::new(75_000, 2)));
    }

    #[test]
    fn test_empty_portfolio() {
        let summary = summarize(&[]);
        assert_eq!(summary.total_records, 0);
        assert!(summary.banks.is_empty());
        assert_eq!(summary.top_bank_concentration, 0.0);
        assert_eq!(portfolio_commission_rate(&summary), None);
    }
}
