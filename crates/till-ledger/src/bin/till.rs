//! # till: Cash Register Command Line
//!
//! Operator tool over [`CashLedger`] for the front desk and for support.
//!
//! ## Usage
//! ```bash
//! # Start the day with 1.000,00 in the drawer
//! till open cashier-1 1000
//!
//! # Collect a consultation
//! till request 150 "Consulta general" --patient pat-17
//! till pay <request-id> cashier-1 150 cash
//!
//! # Close with what was counted
//! till close <session-id> 1145 --justification "Cambio mal entregado"
//!
//! # Point at another database / config
//! till --db ./clinic.db --config ./till.toml summary <session-id>
//! ```
//!
//! Amounts are decimal major units (`150`, `150.50`, `150,50`).
//! `till help <command>` lists the options of each command.

use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::{debug, warn};

use till_core::currency::CurrencyFormat;
use till_core::reconcile::DiscrepancyClass;
use till_core::{
    CashSession, CashTransaction, DiscrepancyReport, Money, PaymentMethod, ServiceRequest,
    SessionSummary, TransactionCategory, TransactionLinks, TransactionType,
};
use till_db::Database;
use till_ledger::{
    init_tracing, AuditListener, CashLedger, CloseSession, LedgerConfig, LedgerResult,
    NewServiceRequest, OpenSession, PostTransaction, ServicePayment, ServiceRefund,
};

// =============================================================================
// Arguments
// =============================================================================

/// till - clinic cash register
#[derive(Parser, Debug)]
#[command(name = "till")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to till.toml (defaults to the platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// SQLite database path, overriding the configuration
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    // === Sessions ===
    /// Open a session with the counted starting cash
    Open {
        user: String,
        initial: Money,
        #[arg(long)]
        notes: Option<String>,
    },

    /// Close a session against the counted cash
    Close {
        session: String,
        counted: Money,
        /// Required when the difference exceeds the threshold
        #[arg(long)]
        justification: Option<String>,
        #[arg(long)]
        authorized_by: Option<String>,
        #[arg(long)]
        notes: Option<String>,
    },

    /// Show the user's open session
    Active { user: String },

    /// Sessions of a user, most recent first
    History {
        user: String,
        #[arg(long)]
        limit: Option<i64>,
    },

    // === Postings ===
    /// Post a manual income or expense
    Post {
        session: String,
        user: String,
        /// income | expense
        transaction_type: TransactionType,
        /// service_payment, supplier_payment, commission_liquidation,
        /// cash_difference, other
        category: TransactionCategory,
        amount: Money,
        concept: String,
        #[arg(long)]
        method: Option<PaymentMethod>,
    },

    /// Cancel an active transaction of an open session
    Cancel {
        transaction: String,
        user: String,
        reason: String,
    },

    // === Service requests ===
    /// Register a service request to be paid at the till
    Request {
        total: Money,
        description: String,
        #[arg(long)]
        patient: Option<String>,
        #[arg(long)]
        professional: Option<String>,
    },

    /// Collect a payment against a service request
    Pay {
        request: String,
        user: String,
        amount: Money,
        /// cash | card | transfer
        method: PaymentMethod,
        #[arg(long)]
        notes: Option<String>,
    },

    /// Refund part or all of a service payment
    Refund {
        request: String,
        payment: String,
        user: String,
        amount: Money,
        reason: String,
        /// Refund to zero and mark the request cancelled
        #[arg(long)]
        cancel_request: bool,
    },

    /// What is still refundable from a payment
    Refundable { payment: String },

    /// Payments and refunds of a service request
    Payments { request: String },

    // === Reports ===
    /// Totals and breakdowns of a session
    Summary { session: String },

    /// All transactions of a session in posting order
    Transactions { session: String },

    /// Discrepancy report of a closed session
    Check {
        session: String,
        #[arg(long)]
        threshold: Option<Money>,
    },
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing();

    if let Err(e) = run(cli).await {
        eprintln!("✗ [{:?}] {}", e.kind(), e);
        process::exit(1);
    }
}

async fn run(cli: Cli) -> LedgerResult<()> {
    let mut config = LedgerConfig::load(cli.config)?;
    if let Some(path) = cli.db {
        config.database.path = path;
    }

    let db = Database::new(config.db_config()).await?;

    let (listener, publisher) = AuditListener::new(db.clone());
    let audit_task = tokio::spawn(listener.run());

    let ledger =
        CashLedger::new(db.clone(), config.cash.clone()).with_audit(Arc::new(publisher.clone()));
    let result = dispatch(&ledger, &config.currency, cli.command).await;
    drop(ledger);

    if let Err(e) = publisher.shutdown().await {
        warn!(error = %e, "Audit listener was not running");
    }
    drop(publisher);
    match audit_task.await {
        Ok(written) => debug!(written, "Audit records flushed"),
        Err(e) => warn!(error = %e, "Audit listener task failed"),
    }
    db.close().await;

    result
}

async fn dispatch(
    ledger: &CashLedger,
    fmt: &CurrencyFormat,
    command: Commands,
) -> LedgerResult<()> {
    match command {
        Commands::Open {
            user,
            initial,
            notes,
        } => {
            let session = ledger
                .open_session(OpenSession {
                    user_id: user,
                    initial_amount: initial,
                    notes,
                })
                .await?;
            println!("✓ Session opened");
            print_session(fmt, &session);
        }

        Commands::Close {
            session,
            counted,
            justification,
            authorized_by,
            notes,
        } => {
            let session = ledger
                .close_session(CloseSession {
                    session_id: session,
                    final_amount: counted,
                    authorized_by,
                    justification,
                    notes,
                })
                .await?;
            println!("✓ Session closed");
            print_session(fmt, &session);
        }

        Commands::Active { user } => match ledger.get_active_session(&user).await? {
            Some(session) => print_session(fmt, &session),
            None => println!("No open session"),
        },

        Commands::History { user, limit } => {
            let sessions = ledger.get_user_session_history(&user, limit).await?;
            if sessions.is_empty() {
                println!("No sessions");
            }
            for session in &sessions {
                print_session(fmt, session);
                println!();
            }
        }

        Commands::Post {
            session,
            user,
            transaction_type,
            category,
            amount,
            concept,
            method,
        } => {
            let posted = ledger
                .post_transaction(PostTransaction {
                    session_id: session,
                    transaction_type,
                    category,
                    amount,
                    concept,
                    payment_method: method,
                    links: TransactionLinks::default(),
                    user_id: user,
                })
                .await?;
            println!("✓ Transaction posted");
            print_transaction(fmt, &posted);
        }

        Commands::Cancel {
            transaction,
            user,
            reason,
        } => {
            let cancelled = ledger
                .cancel_transaction(&transaction, &reason, &user)
                .await?;
            println!("✓ Transaction cancelled");
            print_transaction(fmt, &cancelled);
        }

        Commands::Request {
            total,
            description,
            patient,
            professional,
        } => {
            let request = ledger
                .create_service_request(NewServiceRequest {
                    patient_id: patient,
                    professional_id: professional,
                    description,
                    total,
                })
                .await?;
            println!("✓ Service request created");
            print_request(fmt, &request);
        }

        Commands::Pay {
            request,
            user,
            amount,
            method,
            notes,
        } => {
            let receipt = ledger
                .process_service_payment(ServicePayment {
                    service_request_id: request,
                    amount,
                    method,
                    user_id: user,
                    notes,
                })
                .await?;
            println!("✓ Payment processed");
            print_transaction(fmt, &receipt.transaction);
            println!(
                "  Request {}: paid {} of {}, remaining {} ({})",
                receipt.request.request_id,
                fmt.format(Money::from_cents(receipt.request.paid_cents)),
                fmt.format(Money::from_cents(receipt.request.total_cents)),
                fmt.format(Money::from_cents(receipt.request.remaining_cents)),
                receipt.request.payment_status
            );
            if receipt.request.fully_paid {
                println!("  Fully paid; ready for fulfillment");
            }
        }

        Commands::Refund {
            request,
            payment,
            user,
            amount,
            reason,
            cancel_request,
        } => {
            let refund = ledger
                .refund_service_payment(ServiceRefund {
                    service_request_id: request,
                    original_transaction_id: payment,
                    amount,
                    reason,
                    user_id: user,
                    cancel_service_request: cancel_request,
                })
                .await?;
            println!("✓ Refund posted");
            print_transaction(fmt, &refund);
        }

        Commands::Refundable { payment } => {
            let refundable = ledger.get_refundable_amount(&payment).await?;
            println!("Refundable from {}: {}", payment, fmt.format(refundable));
        }

        Commands::Payments { request } => {
            let request = ledger.get_service_request(&request).await?;
            print_request(fmt, &request);
            for transaction in &ledger.list_request_transactions(&request.id).await? {
                print_transaction(fmt, transaction);
            }
        }

        Commands::Summary { session } => {
            let summary = ledger.get_session_summary(&session).await?;
            print_summary(fmt, &summary);
        }

        Commands::Transactions { session } => {
            let transactions = ledger.list_session_transactions(&session).await?;
            if transactions.is_empty() {
                println!("No transactions");
            }
            for transaction in &transactions {
                print_transaction(fmt, transaction);
            }
        }

        Commands::Check { session, threshold } => {
            let report = ledger.check_discrepancies(&session, threshold).await?;
            print_report(fmt, &report);
        }
    }

    Ok(())
}

// =============================================================================
// Output
// =============================================================================

fn print_session(fmt: &CurrencyFormat, session: &CashSession) {
    println!("Session   {} ({})", session.id, session.status);
    println!("  User      {}", session.user_id);
    println!("  Opened    {}", session.opened_at.format("%Y-%m-%d %H:%M"));
    println!("  Initial   {}", fmt.format(session.initial_amount()));
    println!("  Income    {}", fmt.format(session.total_income()));
    println!("  Expenses  {}", fmt.format(session.total_expenses()));
    println!("  Balance   {}", fmt.format(session.calculated_balance()));

    if let Some(closed_at) = session.closed_at {
        println!("  Closed    {}", closed_at.format("%Y-%m-%d %H:%M"));
    }
    if let Some(counted) = session.final_amount() {
        println!("  Counted   {}", fmt.format(counted));
    }
    if let Some(difference) = session.difference() {
        println!("  Diff      {}", fmt.format(difference));
    }
    if let Some(justification) = &session.difference_justification {
        println!("  Reason    {}", justification);
    }
}

fn print_transaction(fmt: &CurrencyFormat, tx: &CashTransaction) {
    let method = tx
        .payment_method
        .map(|m| m.to_string())
        .unwrap_or_else(|| "-".to_string());
    println!(
        "  #{:<5} {} {:<8} {:<22} {:>16} {:<9} {} [{}]",
        tx.seq,
        tx.id,
        tx.transaction_type,
        tx.category,
        fmt.format(tx.signed_amount()),
        method,
        tx.concept,
        tx.status
    );
    if let Some(original) = &tx.original_transaction_id {
        println!("         refund of {}", original);
    }
    if let Some(reason) = &tx.cancellation_reason {
        println!("         cancelled: {}", reason);
    }
}

fn print_summary(fmt: &CurrencyFormat, summary: &SessionSummary) {
    println!("Session   {} ({})", summary.session_id, summary.status);
    println!("  Initial   {}", fmt.format(Money::from_cents(summary.initial_cents)));
    println!(
        "  Income    {} ({} tx)",
        fmt.format(Money::from_cents(summary.total_income_cents)),
        summary.income_count
    );
    println!(
        "  Expenses  {} ({} tx)",
        fmt.format(Money::from_cents(summary.total_expense_cents)),
        summary.expense_count
    );
    println!("  Balance   {}", fmt.format(summary.calculated_balance()));
    println!(
        "  Active    {}, cancelled {}",
        summary.active_count, summary.cancelled_count
    );
    if !summary.consistent {
        println!(
            "  ⚠ Recorded balance {} differs from transactions",
            fmt.format(Money::from_cents(summary.recorded_balance_cents))
        );
    }

    if !summary.by_category.is_empty() {
        println!("  By category:");
        for row in &summary.by_category {
            println!(
                "    {:<8} {:<22} {:>4} {:>16}",
                row.transaction_type,
                row.category,
                row.count,
                fmt.format(Money::from_cents(row.total_cents))
            );
        }
    }
    if !summary.income_by_method.is_empty() {
        println!("  Income by method:");
        for row in &summary.income_by_method {
            let method = row
                .payment_method
                .map(|m| m.to_string())
                .unwrap_or_else(|| "-".to_string());
            println!(
                "    {:<10} {:>4} {:>16}",
                method,
                row.count,
                fmt.format(Money::from_cents(row.total_cents))
            );
        }
    }
}

fn print_report(fmt: &CurrencyFormat, report: &DiscrepancyReport) {
    let class = match report.classification {
        DiscrepancyClass::None => "none",
        DiscrepancyClass::Shortage => "shortage",
        DiscrepancyClass::Overage => "overage",
    };
    println!("Session   {}", report.session_id);
    println!(
        "  Calculated {}",
        fmt.format(Money::from_cents(report.calculated_balance_cents))
    );
    println!("  Counted    {}", fmt.format(Money::from_cents(report.final_cents)));
    println!("  Difference {} ({})", fmt.format(report.difference()), class);
    println!(
        "  Threshold  {} → {}",
        fmt.format(Money::from_cents(report.threshold_cents)),
        if report.has_discrepancy {
            "DISCREPANCY"
        } else {
            "within tolerance"
        }
    );
    if let Some(justification) = &report.justification {
        println!("  Reason     {}", justification);
    }
    if let Some(authorized_by) = &report.authorized_by {
        println!("  Authorized {}", authorized_by);
    }
}

fn print_request(fmt: &CurrencyFormat, request: &ServiceRequest) {
    println!("Request   {} ({})", request.id, request.payment_status);
    println!("  {}", request.description);
    println!("  Total     {}", fmt.format(request.total()));
    println!("  Paid      {}", fmt.format(request.paid()));
    println!("  Remaining {}", fmt.format(request.remaining()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_pay() {
        let cli = Cli::try_parse_from([
            "till", "--db", "t.db", "pay", "req-1", "cashier-1", "150,50", "card",
        ])
        .unwrap();
        assert_eq!(cli.db, Some(PathBuf::from("t.db")));
        match cli.command {
            Commands::Pay { amount, method, .. } => {
                assert_eq!(amount, Money::from_cents(15_050));
                assert_eq!(method, PaymentMethod::Card);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_rejects_bad_values() {
        // three decimals, unknown method, unknown category
        let bad: [&[&str]; 3] = [
            &["till", "pay", "req-1", "cashier-1", "1.505", "cash"],
            &["till", "pay", "req-1", "cashier-1", "10", "cheque"],
            &["till", "post", "s-1", "u-1", "income", "rent", "10", "x"],
        ];
        for args in bad {
            assert!(Cli::try_parse_from(args).is_err(), "accepted {:?}", args);
        }
    }

    #[test]
    fn test_global_options_after_command() {
        let cli = Cli::try_parse_from([
            "till",
            "check",
            "s-1",
            "--threshold",
            "25",
            "--config",
            "till.toml",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("till.toml")));
        match cli.command {
            Commands::Check { threshold, .. } => {
                assert_eq!(threshold, Some(Money::from_cents(2_500)));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
