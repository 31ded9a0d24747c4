//! Earnings/spending aggregation (§4.8): bucket a set of Payments or
//! Purchases into the three-category (primary/refund/pending) ×
//! three-granularity (daily/monthly/total) matrix §6 exposes as
//! `POST /payment/income` and `POST /purchase/spending`.

use chrono_tz::Tz;
use escrow_core::error::OrchestratorError;
use escrow_core::model::{OnChainState, Payment, Purchase};
use escrow_core::money::{Lovelace, UnitValue};
use escrow_core::time::{to_datetime, TimestampMs};
use serde::Serialize;
use std::collections::BTreeMap;
use std::str::FromStr;

pub struct EarningsQuery {
    pub agent_identifier: Option<String>,
    pub start: Option<TimestampMs>,
    pub end: Option<TimestampMs>,
    pub time_zone: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CategoryTotal {
    pub units: Vec<UnitValue>,
    pub blockchain_fees: Lovelace,
}

impl CategoryTotal {
    fn zero() -> Self {
        Self { units: Vec::new(), blockchain_fees: Lovelace::zero() }
    }

    fn add(&mut self, units: &[UnitValue], fees: &Lovelace) {
        merge_units(&mut self.units, units);
        self.blockchain_fees = self.blockchain_fees.checked_add(fees);
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CategoryBucket {
    pub date: String,
    pub units: Vec<UnitValue>,
    pub blockchain_fees: Lovelace,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IncomeReport {
    pub daily_income: Vec<CategoryBucket>,
    pub monthly_income: Vec<CategoryBucket>,
    pub total_income: CategoryTotal,
    pub daily_refund: Vec<CategoryBucket>,
    pub monthly_refund: Vec<CategoryBucket>,
    pub total_refund: CategoryTotal,
    pub daily_pending: Vec<CategoryBucket>,
    pub monthly_pending: Vec<CategoryBucket>,
    pub total_pending: CategoryTotal,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpendingReport {
    pub daily_spend: Vec<CategoryBucket>,
    pub monthly_spend: Vec<CategoryBucket>,
    pub total_spend: CategoryTotal,
    pub daily_refund: Vec<CategoryBucket>,
    pub monthly_refund: Vec<CategoryBucket>,
    pub total_refund: CategoryTotal,
    pub daily_pending: Vec<CategoryBucket>,
    pub monthly_pending: Vec<CategoryBucket>,
    pub total_pending: CategoryTotal,
}

enum Category {
    Primary,
    Refund,
    Pending,
}

fn merge_units(acc: &mut Vec<UnitValue>, new: &[UnitValue]) {
    for entry in new {
        if let Some(existing) = acc.iter_mut().find(|u| u.unit == entry.unit) {
            existing.amount = existing.amount.checked_add(&entry.amount);
        } else {
            acc.push(entry.clone());
        }
    }
}

/// §4.8's category rule, specialized for a Payment (seller side):
/// `Withdrawn` counts its full `RequestedFunds` as income; `RefundWithdrawn`
/// counts the same as a refund; `DisputedWithdrawn` splits — only the
/// seller's observed share (`WithdrawnForSeller`) counts as income;
/// `FundsOrDatumInvalid` is ignored; anything else still open is pending.
fn categorize_payment(payment: &Payment) -> Option<(Category, &[UnitValue], &Lovelace)> {
    match payment.on_chain_state? {
        OnChainState::Withdrawn => Some((Category::Primary, payment.requested_funds.as_slice(), &payment.total_seller_cardano_fees)),
        OnChainState::RefundWithdrawn => Some((Category::Refund, payment.requested_funds.as_slice(), &payment.total_seller_cardano_fees)),
        OnChainState::DisputedWithdrawn => Some((Category::Primary, &payment.withdrawn_for_seller, &payment.total_seller_cardano_fees)),
        OnChainState::FundsOrDatumInvalid => None,
        _ => Some((Category::Pending, payment.requested_funds.as_slice(), &payment.total_seller_cardano_fees)),
    }
}

/// §4.8's category rule for a Purchase (buyer side): `Withdrawn` is the
/// normal spend; `RefundWithdrawn` is a refund; `DisputedWithdrawn`
/// counts only the buyer's observed share (`WithdrawnForBuyer`) as a
/// refund (the rest went to the seller, reflected on that Payment's own
/// report); `FundsOrDatumInvalid` is ignored; otherwise pending.
fn categorize_purchase(purchase: &Purchase) -> Option<(Category, &[UnitValue], &Lovelace)> {
    match purchase.on_chain_state? {
        OnChainState::Withdrawn => Some((Category::Primary, &purchase.paid_funds, &purchase.total_buyer_cardano_fees)),
        OnChainState::RefundWithdrawn => Some((Category::Refund, &purchase.paid_funds, &purchase.total_buyer_cardano_fees)),
        OnChainState::DisputedWithdrawn => Some((Category::Refund, &purchase.withdrawn_for_buyer, &purchase.total_buyer_cardano_fees)),
        OnChainState::FundsOrDatumInvalid => None,
        _ => Some((Category::Pending, &purchase.paid_funds, &purchase.total_buyer_cardano_fees)),
    }
}

struct Buckets {
    daily: BTreeMap<String, CategoryTotal>,
    monthly: BTreeMap<String, CategoryTotal>,
    total: CategoryTotal,
}

impl Buckets {
    fn new() -> Self {
        Self { daily: BTreeMap::new(), monthly: BTreeMap::new(), total: CategoryTotal::zero() }
    }

    fn add(&mut self, day: &str, month: &str, units: &[UnitValue], fees: &Lovelace) {
        self.daily.entry(day.to_string()).or_insert_with(CategoryTotal::zero).add(units, fees);
        self.monthly.entry(month.to_string()).or_insert_with(CategoryTotal::zero).add(units, fees);
        self.total.add(units, fees);
    }

    fn into_daily_vec(daily: BTreeMap<String, CategoryTotal>) -> Vec<CategoryBucket> {
        daily
            .into_iter()
            .map(|(date, t)| CategoryBucket { date, units: t.units, blockchain_fees: t.blockchain_fees })
            .collect()
    }
}

fn within_range(pay_by_time: TimestampMs, query: &EarningsQuery) -> bool {
    query.start.is_none_or_default(|s| pay_by_time >= s) && query.end.is_none_or_default(|e| pay_by_time <= e)
}

trait OptionBoundExt {
    fn is_none_or_default(self, f: impl FnOnce(TimestampMs) -> bool) -> bool;
}

impl OptionBoundExt for Option<TimestampMs> {
    fn is_none_or_default(self, f: impl FnOnce(TimestampMs) -> bool) -> bool {
        match self {
            Some(v) => f(v),
            None => true,
        }
    }
}

fn day_and_month(pay_by_time: TimestampMs, tz: Tz) -> Option<(String, String)> {
    let utc = to_datetime(pay_by_time)?;
    let local = utc.with_timezone(&tz);
    Some((local.format("%Y-%m-%d").to_string(), local.format("%Y-%m").to_string()))
}

fn parse_time_zone(time_zone: &str) -> Result<Tz, OrchestratorError> {
    Tz::from_str(time_zone).map_err(|_| OrchestratorError::invalid_argument(format!("unknown IANA time zone {time_zone:?}")))
}

pub fn aggregate_payment_income(payments: &[Payment], query: &EarningsQuery) -> Result<IncomeReport, OrchestratorError> {
    let tz = parse_time_zone(&query.time_zone)?;
    let mut primary = Buckets::new();
    let mut refund = Buckets::new();
    let mut pending = Buckets::new();

    for payment in payments {
        if let Some(agent) = &query.agent_identifier {
            if &payment.agent_identifier != agent {
                continue;
            }
        }
        if !within_range(payment.pay_by_time, query) {
            continue;
        }
        let Some((category, units, fees)) = categorize_payment(payment) else { continue };
        let Some((day, month)) = day_and_month(payment.pay_by_time, tz) else { continue };
        match category {
            Category::Primary => primary.add(&day, &month, units, fees),
            Category::Refund => refund.add(&day, &month, units, fees),
            Category::Pending => pending.add(&day, &month, units, fees),
        }
    }

    Ok(IncomeReport {
        daily_income: Buckets::into_daily_vec(primary.daily),
        monthly_income: Buckets::into_daily_vec(primary.monthly),
        total_income: primary.total,
        daily_refund: Buckets::into_daily_vec(refund.daily),
        monthly_refund: Buckets::into_daily_vec(refund.monthly),
        total_refund: refund.total,
        daily_pending: Buckets::into_daily_vec(pending.daily),
        monthly_pending: Buckets::into_daily_vec(pending.monthly),
        total_pending: pending.total,
    })
}

pub fn aggregate_purchase_spending(purchases: &[Purchase], query: &EarningsQuery) -> Result<SpendingReport, OrchestratorError> {
    let tz = parse_time_zone(&query.time_zone)?;
    let mut primary = Buckets::new();
    let mut refund = Buckets::new();
    let mut pending = Buckets::new();

    for purchase in purchases {
        if let Some(agent) = &query.agent_identifier {
            if &purchase.agent_identifier != agent {
                continue;
            }
        }
        if !within_range(purchase.pay_by_time, query) {
            continue;
        }
        let Some((category, units, fees)) = categorize_purchase(purchase) else { continue };
        let Some((day, month)) = day_and_month(purchase.pay_by_time, tz) else { continue };
        match category {
            Category::Primary => primary.add(&day, &month, units, fees),
            Category::Refund => refund.add(&day, &month, units, fees),
            Category::Pending => pending.add(&day, &month, units, fees),
        }
    }

    Ok(SpendingReport {
        daily_spend: Buckets::into_daily_vec(primary.daily),
        monthly_spend: Buckets::into_daily_vec(primary.monthly),
        total_spend: primary.total,
        daily_refund: Buckets::into_daily_vec(refund.daily),
        monthly_refund: Buckets::into_daily_vec(refund.monthly),
        total_refund: refund.total,
        daily_pending: Buckets::into_daily_vec(pending.daily),
        monthly_pending: Buckets::into_daily_vec(pending.monthly),
        total_pending: pending.total,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use escrow_core::money::RequestedFunds;
    use escrow_core::state::PaymentNextAction;
    use uuid::Uuid;

    fn sample_payment(on_chain_state: OnChainState, pay_by_time: TimestampMs) -> Payment {
        Payment {
            id: Uuid::new_v4(),
            blockchain_identifier: "id".into(),
            agent_identifier: "agent".into(),
            input_hash: "a".repeat(64),
            pay_by_time,
            submit_result_time: pay_by_time + 1,
            unlock_time: pay_by_time + 2,
            external_dispute_unlock_time: pay_by_time + 3,
            requested_funds: RequestedFunds::new(vec![UnitValue::lovelace(5_000_000)]).unwrap(),
            on_chain_state: Some(on_chain_state),
            next_action: PaymentNextAction::None,
            next_action_error_type: None,
            next_action_error_note: None,
            current_transaction_id: None,
            transaction_history: Vec::new(),
            withdrawn_for_seller: Vec::new(),
            withdrawn_for_buyer: Vec::new(),
            total_seller_cardano_fees: Lovelace::from_u64(170_000),
            total_buyer_cardano_fees: Lovelace::zero(),
            result_hash: String::new(),
            created_at: pay_by_time,
            updated_at: pay_by_time,
            next_action_last_changed_at: pay_by_time,
            on_chain_state_or_result_last_changed_at: pay_by_time,
            next_action_or_on_chain_state_or_result_last_changed_at: pay_by_time,
            requested_by_id: Uuid::new_v4(),
            metadata: None,
            payment_source_id: Uuid::new_v4(),
            seller_wallet_id: Uuid::new_v4(),
        }
    }

    #[test]
    fn scenario_6_income_bucketing() {
        // 2024-03-15T10:00:00Z
        let pay_by_time = 1_710_496_800_000;
        let payment = sample_payment(OnChainState::Withdrawn, pay_by_time);
        let query = EarningsQuery {
            agent_identifier: None,
            start: None,
            end: None,
            time_zone: "Etc/UTC".to_string(),
        };

        let report = aggregate_payment_income(std::slice::from_ref(&payment), &query).unwrap();

        assert_eq!(report.daily_income.len(), 1);
        assert_eq!(report.daily_income[0].date, "2024-03-15");
        assert_eq!(report.daily_income[0].units, vec![UnitValue::lovelace(5_000_000)]);
        assert_eq!(report.daily_income[0].blockchain_fees, Lovelace::from_u64(170_000));

        assert_eq!(report.monthly_income.len(), 1);
        assert_eq!(report.monthly_income[0].date, "2024-03");

        assert_eq!(report.total_income.units, vec![UnitValue::lovelace(5_000_000)]);
        assert_eq!(report.total_income.blockchain_fees, Lovelace::from_u64(170_000));

        assert!(report.daily_refund.is_empty());
        assert!(report.daily_pending.is_empty());
    }

    #[test]
    fn funds_or_datum_invalid_is_ignored() {
        let payment = sample_payment(OnChainState::FundsOrDatumInvalid, 1_710_496_800_000);
        let query = EarningsQuery {
            agent_identifier: None,
            start: None,
            end: None,
            time_zone: "Etc/UTC".to_string(),
        };
        let report = aggregate_payment_income(std::slice::from_ref(&payment), &query).unwrap();
        assert!(report.daily_income.is_empty());
        assert!(report.daily_refund.is_empty());
        assert!(report.daily_pending.is_empty());
    }

    #[test]
    fn rejects_unknown_time_zones() {
        let payment = sample_payment(OnChainState::Withdrawn, 1_710_496_800_000);
        let query = EarningsQuery {
            agent_identifier: None,
            start: None,
            end: None,
            time_zone: "Not/AZone".to_string(),
        };
        assert!(aggregate_payment_income(std::slice::from_ref(&payment), &query).is_err());
    }
}
