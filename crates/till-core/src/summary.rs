//! # Session Summary
//!
//! Totals recomputed from scratch over a session's transactions, next to the
//! incrementally maintained balance stored on the session row. The two must
//! agree; `consistent` says whether they do.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use ts_rs::TS;

use crate::money::Money;
use crate::types::{
    CashSession, CashTransaction, PaymentMethod, SessionStatus, TransactionCategory,
    TransactionStatus, TransactionType,
};

/// Active totals for one category and direction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CategoryBreakdown {
    pub category: TransactionCategory,
    pub transaction_type: TransactionType,
    pub count: i64,
    pub total_cents: i64,
}

/// Active income per payment method. `None` covers manual postings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct MethodBreakdown {
    pub payment_method: Option<PaymentMethod>,
    pub count: i64,
    pub total_cents: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SessionSummary {
    pub session_id: String,
    pub user_id: String,
    pub status: SessionStatus,
    pub initial_cents: i64,
    pub total_income_cents: i64,
    pub total_expense_cents: i64,
    /// `initial + income − expense` over active transactions.
    pub calculated_balance_cents: i64,
    /// Running balance as stored on the session.
    pub recorded_balance_cents: i64,
    pub consistent: bool,
    pub active_count: i64,
    pub income_count: i64,
    pub expense_count: i64,
    pub cancelled_count: i64,
    pub by_category: Vec<CategoryBreakdown>,
    pub income_by_method: Vec<MethodBreakdown>,
}

impl SessionSummary {
    /// Replays `transactions` (any order, any status) for `session`.
    ///
    /// Transactions belonging to other sessions are ignored.
    pub fn from_transactions(session: &CashSession, transactions: &[CashTransaction]) -> Self {
        let mut income = Money::zero();
        let mut expense = Money::zero();
        let mut active_count = 0;
        let mut income_count = 0;
        let mut expense_count = 0;
        let mut cancelled_count = 0;
        let mut categories: BTreeMap<(TransactionCategory, TransactionType), (i64, Money)> =
            BTreeMap::new();
        let mut methods: BTreeMap<Option<PaymentMethod>, (i64, Money)> = BTreeMap::new();

        for tx in transactions.iter().filter(|tx| tx.session_id == session.id) {
            match tx.status {
                TransactionStatus::Active => {}
                TransactionStatus::Cancelled => {
                    cancelled_count += 1;
                    continue;
                }
                TransactionStatus::Pending => continue,
            }

            active_count += 1;
            match tx.transaction_type {
                TransactionType::Income => {
                    income += tx.amount();
                    income_count += 1;
                    let entry = methods.entry(tx.payment_method).or_default();
                    entry.0 += 1;
                    entry.1 += tx.amount();
                }
                TransactionType::Expense => {
                    expense += tx.amount();
                    expense_count += 1;
                }
            }

            let entry = categories
                .entry((tx.category, tx.transaction_type))
                .or_default();
            entry.0 += 1;
            entry.1 += tx.amount();
        }

        let calculated = session.initial_amount() + income - expense;

        SessionSummary {
            session_id: session.id.clone(),
            user_id: session.user_id.clone(),
            status: session.status,
            initial_cents: session.initial_cents,
            total_income_cents: income.cents(),
            total_expense_cents: expense.cents(),
            calculated_balance_cents: calculated.cents(),
            recorded_balance_cents: session.calculated_balance_cents,
            consistent: calculated.cents() == session.calculated_balance_cents
                && income.cents() == session.total_income_cents
                && expense.cents() == session.total_expense_cents,
            active_count,
            income_count,
            expense_count,
            cancelled_count,
            by_category: categories
                .into_iter()
                .map(|((category, transaction_type), (count, total))| CategoryBreakdown {
                    category,
                    transaction_type,
                    count,
                    total_cents: total.cents(),
                })
                .collect(),
            income_by_method: methods
                .into_iter()
                .map(|(payment_method, (count, total))| MethodBreakdown {
                    payment_method,
                    count,
                    total_cents: total.cents(),
                })
                .collect(),
        }
    }

    pub fn calculated_balance(&self) -> Money {
        Money::from_cents(self.calculated_balance_cents)
    }

    /// Breakdown entry for a category/direction pair, if any.
    pub fn category(
        &self,
        category: TransactionCategory,
        transaction_type: TransactionType,
    ) -> Option<&CategoryBreakdown> {
        self.by_category
            .iter()
            .find(|b| b.category == category && b.transaction_type == transaction_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn tx(
        n: i64,
        transaction_type: TransactionType,
        category: TransactionCategory,
        amount: i64,
        method: Option<PaymentMethod>,
    ) -> CashTransaction {
        CashTransaction {
            seq: n,
            id: format!("tx-{}", n),
            session_id: "s-1".to_string(),
            transaction_type,
            category,
            amount_cents: amount,
            concept: "movimiento".to_string(),
            payment_method: method,
            patient_id: None,
            professional_id: None,
            liquidation_id: None,
            service_request_id: None,
            original_transaction_id: None,
            user_id: "cashier-1".to_string(),
            status: TransactionStatus::Active,
            cancellation_reason: None,
            cancelled_by: None,
            cancelled_at: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_summary_matches_incremental_balance() {
        let mut session =
            CashSession::open("s-1", "cashier-1", Money::from_cents(100_000), None, Utc::now());
        let txs = vec![
            tx(
                1,
                TransactionType::Income,
                TransactionCategory::ServicePayment,
                50_000,
                Some(PaymentMethod::Cash),
            ),
            tx(
                2,
                TransactionType::Income,
                TransactionCategory::ServicePayment,
                30_000,
                Some(PaymentMethod::Card),
            ),
            tx(
                3,
                TransactionType::Expense,
                TransactionCategory::SupplierPayment,
                20_000,
                None,
            ),
        ];
        for t in &txs {
            session.apply_posting(t.transaction_type, t.amount()).unwrap();
        }

        let summary = SessionSummary::from_transactions(&session, &txs);
        assert_eq!(summary.total_income_cents, 80_000);
        assert_eq!(summary.total_expense_cents, 20_000);
        assert_eq!(summary.calculated_balance_cents, 160_000);
        assert!(summary.consistent);
        assert_eq!(summary.active_count, 3);
        assert_eq!(summary.income_count, 2);
        assert_eq!(summary.expense_count, 1);

        let services = summary
            .category(TransactionCategory::ServicePayment, TransactionType::Income)
            .unwrap();
        assert_eq!(services.count, 2);
        assert_eq!(services.total_cents, 80_000);
        assert_eq!(summary.income_by_method.len(), 2);
    }

    #[test]
    fn test_cancelled_transactions_excluded() {
        let session =
            CashSession::open("s-1", "cashier-1", Money::from_cents(10_000), None, Utc::now());
        let mut cancelled = tx(
            1,
            TransactionType::Income,
            TransactionCategory::Other,
            5_000,
            None,
        );
        cancelled.status = TransactionStatus::Cancelled;

        let summary = SessionSummary::from_transactions(&session, &[cancelled]);
        assert_eq!(summary.active_count, 0);
        assert_eq!(summary.cancelled_count, 1);
        assert_eq!(summary.calculated_balance_cents, 10_000);
        assert!(summary.by_category.is_empty());
        assert!(summary.consistent);
    }

    #[test]
    fn test_inconsistency_detected() {
        let mut session =
            CashSession::open("s-1", "cashier-1", Money::from_cents(10_000), None, Utc::now());
        session
            .apply_posting(TransactionType::Income, Money::from_cents(1_000))
            .unwrap();

        let summary = SessionSummary::from_transactions(&session, &[]);
        assert!(!summary.consistent);
        assert_eq!(summary.recorded_balance_cents, 11_000);
        assert_eq!(summary.calculated_balance_cents, 10_000);
    }
}
