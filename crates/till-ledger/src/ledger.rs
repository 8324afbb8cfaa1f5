//! # Cash Ledger Service
//!
//! Every cash operation of the clinic, each one a single SQLite transaction.
//!
//! ## Operation Shape
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      One Ledger Operation                               │
//! │                                                                         │
//! │  1. Validate input (till-core)           → Validation, nothing written │
//! │                                                                         │
//! │  2. BEGIN                                                              │
//! │     UPDATE cash_sessions ... RETURNING *  → write lock + fresh totals   │
//! │                                                                         │
//! │  3. Rule checks on the locked rows        → State / Validation /       │
//! │     (session open? request payable?          NotFound, tx dropped      │
//! │      refund within bounds?)                                            │
//! │                                                                         │
//! │  4. INSERT cash_transactions              → seq assigned               │
//! │     UPDATE cash_sessions totals                                         │
//! │     UPDATE service_requests paid state                                  │
//! │                                                                         │
//! │  5. COMMIT                                                             │
//! │                                                                         │
//! │  6. AuditSink::emit(LedgerEvent)          → after commit only          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Authorization is the caller's job; user ids are trusted as given.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqliteConnection;
use tracing::{debug, info, warn};
use uuid::Uuid;

use till_core::payment::{
    check_payment, check_payment_reversal, check_refund, check_refund_restore, refundable_amount,
};
use till_core::reconcile::check_close;
use till_core::validation::{
    normalize_notes, validate_amount, validate_cash_count, validate_concept, validate_id,
    validate_reason, validate_text,
};
use till_core::{
    CashSession, CashTransaction, CoreError, DiscrepancyReport, LedgerEvent, Money, PaymentMethod,
    PaymentStatus, RequestSummary, ServiceRequest, SessionStatus, SessionSummary,
    TransactionCategory, TransactionLinks, TransactionStatus, TransactionType, ValidationError,
    MAX_CONCEPT_LEN,
};
use till_db::{Database, ServiceRequestRepository, SessionRepository, TransactionRepository};

use crate::audit::{AuditSink, NoopAuditSink};
use crate::config::CashSettings;
use crate::error::{LedgerError, LedgerResult};

// =============================================================================
// Inputs & Outputs
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenSession {
    pub user_id: String,
    pub initial_amount: Money,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloseSession {
    pub session_id: String,
    /// Physically counted cash.
    pub final_amount: Money,
    pub authorized_by: Option<String>,
    pub justification: Option<String>,
    pub notes: Option<String>,
}

/// A manual movement (supplier payment, liquidation, petty cash...).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostTransaction {
    pub session_id: String,
    pub transaction_type: TransactionType,
    pub category: TransactionCategory,
    pub amount: Money,
    pub concept: String,
    pub payment_method: Option<PaymentMethod>,
    #[serde(default)]
    pub links: TransactionLinks,
    pub user_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServicePayment {
    pub service_request_id: String,
    pub amount: Money,
    pub method: PaymentMethod,
    pub user_id: String,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceRefund {
    pub service_request_id: String,
    pub original_transaction_id: String,
    pub amount: Money,
    pub reason: String,
    pub user_id: String,
    /// Refund to zero and mark the request cancelled.
    #[serde(default)]
    pub cancel_service_request: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewServiceRequest {
    pub patient_id: Option<String>,
    pub professional_id: Option<String>,
    pub description: String,
    pub total: Money,
}

/// Result of a service payment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentReceipt {
    pub transaction: CashTransaction,
    pub request: RequestSummary,
}

// =============================================================================
// Cash Ledger
// =============================================================================

/// Cash-register sessions and their transactions.
///
/// Cheap to clone; clones share the pool and the audit sink.
#[derive(Clone)]
pub struct CashLedger {
    db: Database,
    settings: CashSettings,
    audit: Arc<dyn AuditSink>,
}

impl std::fmt::Debug for CashLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CashLedger")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl CashLedger {
    /// Creates a ledger that does not audit.
    pub fn new(db: Database, settings: CashSettings) -> Self {
        CashLedger {
            db,
            settings,
            audit: Arc::new(NoopAuditSink),
        }
    }

    /// Replaces the audit sink.
    pub fn with_audit(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn settings(&self) -> &CashSettings {
        &self.settings
    }

    // =========================================================================
    // Session Lifecycle
    // =========================================================================

    /// Opens a session for `user_id` with the counted starting cash.
    ///
    /// A second open session for the same user is a `Conflict`; the partial
    /// unique index decides, so two terminals racing each other cannot both
    /// win.
    pub async fn open_session(&self, input: OpenSession) -> LedgerResult<CashSession> {
        validate_id("user_id", &input.user_id)?;
        validate_cash_count("initial amount", input.initial_amount)?;
        let notes = normalize_notes(input.notes.as_deref())?;

        let session = CashSession::open(
            Uuid::new_v4().to_string(),
            input.user_id.trim(),
            input.initial_amount,
            notes,
            Utc::now(),
        );

        let mut tx = self.db.begin().await?;
        match SessionRepository::insert(&mut tx, &session).await {
            Ok(()) => {}
            Err(e) if e.is_unique_violation_on("cash_sessions.user_id") => {
                tx.rollback().await?;
                let existing = self.db.sessions().find_open_for_user(&session.user_id).await?;
                return Err(reject(
                    "open_session",
                    CoreError::SessionAlreadyOpen {
                        user_id: session.user_id.clone(),
                        session_id: existing.map(|s| s.id).unwrap_or_default(),
                    },
                ));
            }
            Err(e) => return Err(e.into()),
        }
        tx.commit().await?;

        info!(
            session_id = %session.id,
            user_id = %session.user_id,
            initial_cents = session.initial_cents,
            "Cash session opened"
        );
        self.audit.emit(LedgerEvent::SessionOpened {
            session: session.clone(),
        });

        Ok(session)
    }

    /// Closes a session against the physically counted cash.
    ///
    /// A difference above the configured threshold needs a justification
    /// (and an authorizer when configured). Closing is irreversible.
    pub async fn close_session(&self, input: CloseSession) -> LedgerResult<CashSession> {
        let notes = normalize_notes(input.notes.as_deref())?;
        let policy = self.settings.close_policy();
        let now = Utc::now();

        let mut tx = self.db.begin().await?;
        let mut session = SessionRepository::lock(&mut tx, &input.session_id, now)
            .await?
            .ok_or_else(|| reject("close_session", session_not_found(&input.session_id)))?;

        let decision = check_close(
            &session,
            input.final_amount,
            input.justification.as_deref(),
            input.authorized_by.as_deref(),
            &policy,
        )
        .map_err(|e| reject("close_session", e))?;

        session.status = SessionStatus::Closed;
        session.closed_at = Some(now);
        session.final_cents = Some(input.final_amount.cents());
        session.difference_cents = Some(decision.discrepancy.difference.cents());
        session.difference_justification = decision.justification;
        session.authorized_by = decision.authorized_by;
        session.closing_notes = notes;
        session.updated_at = now;

        SessionRepository::close(&mut tx, &session).await?;
        tx.commit().await?;

        info!(
            session_id = %session.id,
            calculated_cents = session.calculated_balance_cents,
            final_cents = input.final_amount.cents(),
            difference_cents = decision.discrepancy.difference.cents(),
            classification = ?decision.discrepancy.class,
            "Cash session closed"
        );
        self.audit.emit(LedgerEvent::SessionClosed {
            session: session.clone(),
            classification: decision.discrepancy.class,
        });

        Ok(session)
    }

    /// The user's open session, if any.
    pub async fn get_active_session(&self, user_id: &str) -> LedgerResult<Option<CashSession>> {
        Ok(self.db.sessions().find_open_for_user(user_id).await?)
    }

    pub async fn get_session(&self, session_id: &str) -> LedgerResult<CashSession> {
        self.db
            .sessions()
            .get_by_id(session_id)
            .await?
            .ok_or_else(|| session_not_found(session_id).into())
    }

    /// Sessions of a user, most recent first. `None` uses the configured
    /// history limit.
    pub async fn get_user_session_history(
        &self,
        user_id: &str,
        limit: Option<i64>,
    ) -> LedgerResult<Vec<CashSession>> {
        let limit = limit.unwrap_or(self.settings.history_limit).max(1);
        Ok(self.db.sessions().history_for_user(user_id, limit).await?)
    }

    // =========================================================================
    // Posting
    // =========================================================================

    /// Posts a manual movement into an open session.
    ///
    /// Service payments carry paid-state bookkeeping on their request and go
    /// through [`Self::process_service_payment`] instead; a request link here
    /// is rejected.
    pub async fn post_transaction(&self, input: PostTransaction) -> LedgerResult<CashTransaction> {
        validate_amount(input.amount)?;
        let concept = validate_concept(&input.concept)?;
        validate_id("user_id", &input.user_id)?;
        if input.links.service_request_id.is_some() {
            return Err(ValidationError::InvalidFormat {
                field: "service_request_id".to_string(),
                reason: "service payments are posted with process_service_payment".to_string(),
            }
            .into());
        }

        let now = Utc::now();
        let mut tx = self.db.begin().await?;
        let mut session = SessionRepository::lock(&mut tx, &input.session_id, now)
            .await?
            .ok_or_else(|| reject("post_transaction", session_not_found(&input.session_id)))?;
        session
            .ensure_open()
            .map_err(|e| reject("post_transaction", e))?;

        let draft = CashTransaction {
            seq: 0,
            id: Uuid::new_v4().to_string(),
            session_id: session.id.clone(),
            transaction_type: input.transaction_type,
            category: input.category,
            amount_cents: input.amount.cents(),
            concept,
            payment_method: input.payment_method,
            patient_id: input.links.patient_id,
            professional_id: input.links.professional_id,
            liquidation_id: input.links.liquidation_id,
            service_request_id: None,
            original_transaction_id: None,
            user_id: input.user_id.trim().to_string(),
            status: TransactionStatus::Active,
            cancellation_reason: None,
            cancelled_by: None,
            cancelled_at: None,
            created_at: now,
        };
        let stored = append(&mut tx, &mut session, draft, now).await?;
        tx.commit().await?;

        info!(
            transaction_id = %stored.id,
            session_id = %session.id,
            transaction_type = %stored.transaction_type,
            category = %stored.category,
            amount_cents = stored.amount_cents,
            balance_cents = session.calculated_balance_cents,
            "Transaction posted"
        );
        self.audit.emit(LedgerEvent::TransactionPosted {
            transaction: stored.clone(),
            session,
        });

        Ok(stored)
    }

    pub async fn get_transaction(&self, transaction_id: &str) -> LedgerResult<CashTransaction> {
        self.db
            .transactions()
            .get_by_id(transaction_id)
            .await?
            .ok_or_else(|| transaction_not_found(transaction_id).into())
    }

    /// All transactions of a session in posting order, cancelled included.
    pub async fn list_session_transactions(
        &self,
        session_id: &str,
    ) -> LedgerResult<Vec<CashTransaction>> {
        if self.db.sessions().get_by_id(session_id).await?.is_none() {
            return Err(session_not_found(session_id).into());
        }
        Ok(self.db.transactions().list_for_session(session_id).await?)
    }

    // =========================================================================
    // Service Payments & Refunds
    // =========================================================================

    /// Collects `amount` against a service request into the paying user's
    /// open session.
    ///
    /// Overpayment is rejected, never clamped.
    pub async fn process_service_payment(
        &self,
        input: ServicePayment,
    ) -> LedgerResult<PaymentReceipt> {
        validate_amount(input.amount)?;
        validate_id("user_id", &input.user_id)?;
        let notes = normalize_notes(input.notes.as_deref())?;

        let now = Utc::now();
        let mut tx = self.db.begin().await?;
        let mut session = SessionRepository::lock_open_for_user(&mut tx, &input.user_id, now)
            .await?
            .ok_or_else(|| reject("process_service_payment", no_active_session(&input.user_id)))?;

        let request = ServiceRequestRepository::get_in(&mut tx, &input.service_request_id)
            .await?
            .ok_or_else(|| {
                reject(
                    "process_service_payment",
                    request_not_found(&input.service_request_id),
                )
            })?;
        let update =
            check_payment(&request, input.amount).map_err(|e| reject("process_service_payment", e))?;

        let concept = truncate_chars(
            &notes.unwrap_or_else(|| format!("Service payment: {}", request.description)),
            MAX_CONCEPT_LEN,
        );
        let draft = CashTransaction {
            seq: 0,
            id: Uuid::new_v4().to_string(),
            session_id: session.id.clone(),
            transaction_type: TransactionType::Income,
            category: TransactionCategory::ServicePayment,
            amount_cents: input.amount.cents(),
            concept,
            payment_method: Some(input.method),
            patient_id: request.patient_id.clone(),
            professional_id: request.professional_id.clone(),
            liquidation_id: None,
            service_request_id: Some(request.id.clone()),
            original_transaction_id: None,
            user_id: input.user_id.trim().to_string(),
            status: TransactionStatus::Active,
            cancellation_reason: None,
            cancelled_by: None,
            cancelled_at: None,
            created_at: now,
        };
        let stored = append(&mut tx, &mut session, draft, now).await?;
        let updated = ServiceRequestRepository::update_paid(
            &mut tx,
            &request.id,
            update.paid.cents(),
            update.status,
            now,
        )
        .await?;
        tx.commit().await?;

        let summary = updated.summary();
        info!(
            transaction_id = %stored.id,
            session_id = %session.id,
            request_id = %updated.id,
            amount_cents = stored.amount_cents,
            paid_cents = updated.paid_cents,
            payment_status = %updated.payment_status,
            "Service payment processed"
        );
        self.audit.emit(LedgerEvent::PaymentProcessed {
            transaction: stored.clone(),
            request: summary.clone(),
        });

        Ok(PaymentReceipt {
            transaction: stored,
            request: summary,
        })
    }

    /// Gives back part or all of a service payment as an expense in the
    /// refunding user's open session.
    ///
    /// The original transaction is left untouched. Its session may already
    /// be closed; the refund always lands in the session open now.
    pub async fn refund_service_payment(
        &self,
        input: ServiceRefund,
    ) -> LedgerResult<CashTransaction> {
        validate_amount(input.amount)?;
        let reason = validate_reason(&input.reason)?;
        validate_id("user_id", &input.user_id)?;

        let now = Utc::now();
        let mut tx = self.db.begin().await?;
        let mut session = SessionRepository::lock_open_for_user(&mut tx, &input.user_id, now)
            .await?
            .ok_or_else(|| reject("refund_service_payment", no_active_session(&input.user_id)))?;

        let request = ServiceRequestRepository::get_in(&mut tx, &input.service_request_id)
            .await?
            .ok_or_else(|| {
                reject(
                    "refund_service_payment",
                    request_not_found(&input.service_request_id),
                )
            })?;
        let original = TransactionRepository::get_in(&mut tx, &input.original_transaction_id)
            .await?
            .ok_or_else(|| {
                reject(
                    "refund_service_payment",
                    transaction_not_found(&input.original_transaction_id),
                )
            })?;
        let already = TransactionRepository::refunded_total_in(&mut tx, &original.id).await?;

        let update = check_refund(
            &request,
            &original,
            Money::from_cents(already),
            input.amount,
            input.cancel_service_request,
        )
        .map_err(|e| reject("refund_service_payment", e))?;

        let draft = CashTransaction {
            seq: 0,
            id: Uuid::new_v4().to_string(),
            session_id: session.id.clone(),
            transaction_type: TransactionType::Expense,
            category: TransactionCategory::Other,
            amount_cents: input.amount.cents(),
            concept: truncate_chars(&format!("Refund: {}", reason), MAX_CONCEPT_LEN),
            payment_method: original.payment_method,
            patient_id: original.patient_id.clone(),
            professional_id: original.professional_id.clone(),
            liquidation_id: None,
            service_request_id: Some(request.id.clone()),
            original_transaction_id: Some(original.id.clone()),
            user_id: input.user_id.trim().to_string(),
            status: TransactionStatus::Active,
            cancellation_reason: None,
            cancelled_by: None,
            cancelled_at: None,
            created_at: now,
        };
        let stored = append(&mut tx, &mut session, draft, now).await?;
        let updated = ServiceRequestRepository::update_paid(
            &mut tx,
            &request.id,
            update.paid.cents(),
            update.status,
            now,
        )
        .await?;
        tx.commit().await?;

        if original.session_id != session.id {
            debug!(
                original_session_id = %original.session_id,
                refund_session_id = %session.id,
                "Refund posted into a different session than the payment"
            );
        }
        info!(
            transaction_id = %stored.id,
            original_transaction_id = %original.id,
            request_id = %updated.id,
            amount_cents = stored.amount_cents,
            paid_cents = updated.paid_cents,
            payment_status = %updated.payment_status,
            "Service payment refunded"
        );
        self.audit.emit(LedgerEvent::PaymentRefunded {
            transaction: stored.clone(),
            original_transaction_id: original.id,
            request: updated.summary(),
        });

        Ok(stored)
    }

    /// What is still refundable from a service payment.
    pub async fn get_refundable_amount(&self, transaction_id: &str) -> LedgerResult<Money> {
        let original = self.get_transaction(transaction_id).await?;
        if !original.is_service_payment() {
            return Err(CoreError::NotRefundable {
                transaction_id: original.id,
            }
            .into());
        }
        if !original.is_active() {
            return Ok(Money::zero());
        }

        let already = self.db.transactions().refunded_total(&original.id).await?;
        Ok(refundable_amount(&original, Money::from_cents(already)))
    }

    // =========================================================================
    // Cancellation
    // =========================================================================

    /// Voids an active transaction of an open session.
    ///
    /// The session totals and, for request-linked rows, the request's paid
    /// state are rolled back in the same database transaction. A payment
    /// with active refunds must have those refunds cancelled first.
    pub async fn cancel_transaction(
        &self,
        transaction_id: &str,
        reason: &str,
        user_id: &str,
    ) -> LedgerResult<CashTransaction> {
        let reason = validate_reason(reason)?;
        validate_id("user_id", user_id)?;

        // Which session to lock; re-read under the lock below.
        let session_id = self
            .db
            .transactions()
            .get_by_id(transaction_id)
            .await?
            .map(|t| t.session_id)
            .ok_or_else(|| reject("cancel_transaction", transaction_not_found(transaction_id)))?;

        let now = Utc::now();
        let mut tx = self.db.begin().await?;
        let mut session = SessionRepository::lock(&mut tx, &session_id, now)
            .await?
            .ok_or_else(|| reject("cancel_transaction", session_not_found(&session_id)))?;
        let current = TransactionRepository::get_in(&mut tx, transaction_id)
            .await?
            .ok_or_else(|| reject("cancel_transaction", transaction_not_found(transaction_id)))?;

        current
            .ensure_active()
            .map_err(|e| reject("cancel_transaction", e))?;
        session
            .ensure_open()
            .map_err(|e| reject("cancel_transaction", e))?;

        let request_update = match current.service_request_id.as_deref() {
            Some(request_id) => {
                let request = ServiceRequestRepository::get_in(&mut tx, request_id)
                    .await?
                    .ok_or_else(|| reject("cancel_transaction", request_not_found(request_id)))?;
                let update = if current.is_reversal() {
                    check_refund_restore(&request, current.amount())
                } else {
                    let refunded =
                        TransactionRepository::refunded_total_in(&mut tx, &current.id).await?;
                    if refunded > 0 {
                        Err(CoreError::HasActiveRefunds {
                            transaction_id: current.id.clone(),
                        })
                    } else {
                        check_payment_reversal(&request, current.amount())
                    }
                }
                .map_err(|e| reject("cancel_transaction", e))?;
                Some((request, update))
            }
            None => None,
        };

        session
            .revert_posting(current.transaction_type, current.amount())
            .map_err(|e| reject("cancel_transaction", e))?;

        let cancelled =
            TransactionRepository::mark_cancelled(&mut tx, &current.id, &reason, user_id.trim(), now)
                .await?
                .ok_or_else(|| {
                    reject(
                        "cancel_transaction",
                        CoreError::TransactionNotActive {
                            transaction_id: current.id.clone(),
                            status: current.status.to_string(),
                        },
                    )
                })?;

        session.updated_at = now;
        SessionRepository::save_totals(&mut tx, &session).await?;

        if let Some((request, update)) = &request_update {
            ServiceRequestRepository::update_paid(
                &mut tx,
                &request.id,
                update.paid.cents(),
                update.status,
                now,
            )
            .await?;
        }
        tx.commit().await?;

        info!(
            transaction_id = %cancelled.id,
            session_id = %session.id,
            amount_cents = cancelled.amount_cents,
            balance_cents = session.calculated_balance_cents,
            cancelled_by = %user_id.trim(),
            "Transaction cancelled"
        );
        self.audit.emit(LedgerEvent::TransactionCancelled {
            transaction: cancelled.clone(),
            session,
        });

        Ok(cancelled)
    }

    // =========================================================================
    // Reports
    // =========================================================================

    /// Post-close discrepancy report. `None` uses the configured threshold.
    pub async fn check_discrepancies(
        &self,
        session_id: &str,
        threshold: Option<Money>,
    ) -> LedgerResult<DiscrepancyReport> {
        let session = self.get_session(session_id).await?;
        let threshold = threshold.unwrap_or_else(|| self.settings.threshold());
        if threshold.is_negative() {
            return Err(ValidationError::MustNotBeNegative {
                field: "threshold".to_string(),
            }
            .into());
        }

        Ok(DiscrepancyReport::for_session(&session, threshold)?)
    }

    /// Totals and breakdowns recomputed from the session's transactions.
    ///
    /// Session and transactions are read in one snapshot so the
    /// `consistent` flag never trips on a concurrent posting.
    pub async fn get_session_summary(&self, session_id: &str) -> LedgerResult<SessionSummary> {
        let mut tx = self.db.begin().await?;
        let session = SessionRepository::get_in(&mut tx, session_id)
            .await?
            .ok_or_else(|| LedgerError::from(session_not_found(session_id)))?;
        let transactions = TransactionRepository::list_for_session_in(&mut tx, session_id).await?;
        tx.commit().await?;

        let summary = SessionSummary::from_transactions(&session, &transactions);
        if !summary.consistent {
            warn!(
                session_id = %session.id,
                recorded_cents = summary.recorded_balance_cents,
                calculated_cents = summary.calculated_balance_cents,
                "Session totals disagree with its transactions"
            );
        }

        Ok(summary)
    }

    // =========================================================================
    // Service Requests
    // =========================================================================

    /// Registers a service request so it can be paid at the till.
    pub async fn create_service_request(
        &self,
        input: NewServiceRequest,
    ) -> LedgerResult<ServiceRequest> {
        let description = validate_text("description", &input.description, MAX_CONCEPT_LEN)?;
        validate_amount(input.total)?;

        let now = Utc::now();
        let request = ServiceRequest {
            id: Uuid::new_v4().to_string(),
            patient_id: clean_id(input.patient_id),
            professional_id: clean_id(input.professional_id),
            description,
            total_cents: input.total.cents(),
            paid_cents: 0,
            payment_status: PaymentStatus::Pending,
            created_at: now,
            updated_at: now,
        };
        self.db.service_requests().insert(&request).await?;

        info!(request_id = %request.id, total_cents = request.total_cents, "Service request created");
        Ok(request)
    }

    pub async fn get_service_request(&self, request_id: &str) -> LedgerResult<ServiceRequest> {
        self.db
            .service_requests()
            .get_by_id(request_id)
            .await?
            .ok_or_else(|| request_not_found(request_id).into())
    }

    /// Payments and refunds linked to a service request, in posting order,
    /// cancelled included.
    pub async fn list_request_transactions(
        &self,
        request_id: &str,
    ) -> LedgerResult<Vec<CashTransaction>> {
        let request = self.get_service_request(request_id).await?;
        Ok(self.db.transactions().list_for_request(&request.id).await?)
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// Books `draft` into the locked `session`, then inserts it.
///
/// Totals are checked before the insert so an out-of-range posting writes
/// nothing.
async fn append(
    conn: &mut SqliteConnection,
    session: &mut CashSession,
    draft: CashTransaction,
    now: DateTime<Utc>,
) -> LedgerResult<CashTransaction> {
    session
        .apply_posting(draft.transaction_type, draft.amount())
        .map_err(|e| reject("append", e))?;
    let stored = TransactionRepository::insert(conn, &draft).await?;
    session.updated_at = now;
    SessionRepository::save_totals(conn, session).await?;
    Ok(stored)
}

fn reject(operation: &'static str, err: CoreError) -> LedgerError {
    warn!(operation, kind = ?err.kind(), error = %err, "Ledger operation rejected");
    LedgerError::Core(err)
}

fn session_not_found(id: &str) -> CoreError {
    CoreError::not_found("CashSession", id)
}

fn transaction_not_found(id: &str) -> CoreError {
    CoreError::not_found("CashTransaction", id)
}

fn request_not_found(id: &str) -> CoreError {
    CoreError::not_found("ServiceRequest", id)
}

fn no_active_session(user_id: &str) -> CoreError {
    CoreError::NoActiveSession {
        user_id: user_id.to_string(),
    }
}

fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

fn clean_id(id: Option<String>) -> Option<String> {
    id.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_chars_counts_characters() {
        assert_eq!(truncate_chars("ñandú", 3), "ñan");
        assert_eq!(truncate_chars("abc", 10), "abc");
    }

    #[test]
    fn test_clean_id() {
        assert_eq!(clean_id(Some("  pat-1 ".into())), Some("pat-1".to_string()));
        assert_eq!(clean_id(Some("   ".into())), None);
        assert_eq!(clean_id(None), None);
    }
}
