//! # Commission Ledger
//!
//! State machine for payout status, plus the decision table used when a
//! ledger entry is recomputed from its invoice.
//!
//! ## State Machine
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │    ┌─────────┐  approve   ┌──────────┐                                  │
//! │    │ PENDING │ ─────────► │ APPROVED │                                  │
//! │    └─────────┘            └──────────┘                                  │
//! │      ▲    │                    │                                        │
//! │      │    │ mark_paid(ref)     │ mark_paid(ref)                         │
//! │      │    ▼                    ▼                                        │
//! │      │  ┌────────────────────────┐                                      │
//! │      └──│          PAID          │   revert: clears ref + paid_at       │
//! │         └────────────────────────┘                                      │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Recompute Decision Table
//! ```text
//! existing   data vs computed      action
//! ────────   ───────────────────   ──────────────────────────────────────
//! none       -                     insert PENDING
//! any        identical             nothing (unchanged)
//! PENDING/   changed               update, status back to PENDING
//! APPROVED
//! PAID       only metadata         update, stays PAID
//! PAID       money changed         discrepancy (update only if overwrite_paid)
//! ```

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::commission::{commission_amount, InvoiceContext, ResolvedRate};
use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::{CommissionLedgerEntry, CommissionStatus};
use crate::validation::validate_payment_reference;

// =============================================================================
// Status Changes
// =============================================================================

/// An operator-requested status change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum StatusChange {
    Approve,
    MarkPaid {
        reference: String,
        notes: Option<String>,
    },
    RevertToPending,
}

impl StatusChange {
    pub fn target(&self) -> CommissionStatus {
        match self {
            StatusChange::Approve => CommissionStatus::Approved,
            StatusChange::MarkPaid { .. } => CommissionStatus::Paid,
            StatusChange::RevertToPending => CommissionStatus::Pending,
        }
    }

    /// Whether `from` has an edge for this change.
    pub fn allowed_from(&self, from: CommissionStatus) -> bool {
        use CommissionStatus::*;
        matches!(
            (self, from),
            (StatusChange::Approve, Pending)
                | (StatusChange::MarkPaid { .. }, Pending | Approved)
                | (StatusChange::RevertToPending, Paid)
        )
    }
}

/// Applies `change` to a copy of `entry`.
///
/// The input is never modified; on error there is nothing to roll back.
pub fn apply_status_change(
    entry: &CommissionLedgerEntry,
    change: &StatusChange,
    now: DateTime<Utc>,
) -> CoreResult<CommissionLedgerEntry> {
    if !change.allowed_from(entry.status) {
        return Err(CoreError::InvalidTransition {
            entry_id: entry.id,
            from: entry.status,
            to: change.target(),
        });
    }

    if let StatusChange::MarkPaid { reference, .. } = change {
        if reference.trim().is_empty() {
            return Err(CoreError::MissingPaymentReference { entry_id: entry.id });
        }
        validate_payment_reference(reference)?;
    }

    let mut next = entry.clone();
    next.status = change.target();
    next.updated_at = now;

    match change {
        StatusChange::Approve => {}
        StatusChange::MarkPaid { reference, notes } => {
            next.payment_reference = Some(reference.trim().to_string());
            next.paid_at = Some(now);
            if let Some(notes) = notes.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
                next.notes = Some(notes.to_string());
            }
        }
        StatusChange::RevertToPending => {
            next.payment_reference = None;
            next.paid_at = None;
        }
    }

    Ok(next)
}

// =============================================================================
// Recompute Planning
// =============================================================================

/// Freshly computed commission for one invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ComputedCommission {
    pub invoice_id: i64,
    pub salesperson_user_id: Option<i64>,
    pub base: Money,
    pub rate: ResolvedRate,
    pub amount: Money,
}

impl ComputedCommission {
    pub fn new(ctx: &InvoiceContext, base: Money, rate: ResolvedRate) -> Self {
        ComputedCommission {
            invoice_id: ctx.invoice_id,
            salesperson_user_id: ctx.salesperson_user_id,
            base,
            rate,
            amount: commission_amount(base, rate.pct),
        }
    }

    fn same_money(&self, entry: &CommissionLedgerEntry) -> bool {
        entry.base_amount_paise == self.base.paise()
            && entry.pct_bps == self.rate.pct.bps()
            && entry.amount_paise == self.amount.paise()
    }

    fn same_metadata(&self, entry: &CommissionLedgerEntry) -> bool {
        entry.salesperson_user_id == self.salesperson_user_id
            && entry.scope == self.rate.scope
            && entry.rate_id == self.rate.rate_id
    }
}

/// A PAID entry whose stored figures no longer match the invoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Discrepancy {
    pub entry_id: i64,
    pub invoice_id: i64,
    pub stored_base: Money,
    pub computed_base: Money,
    pub stored_pct_bps: u32,
    pub computed_pct_bps: u32,
    pub stored_amount: Money,
    pub computed_amount: Money,
}

impl Discrepancy {
    fn between(entry: &CommissionLedgerEntry, computed: &ComputedCommission) -> Self {
        Discrepancy {
            entry_id: entry.id,
            invoice_id: entry.invoice_id,
            stored_base: entry.base_amount(),
            computed_base: computed.base,
            stored_pct_bps: entry.pct_bps,
            computed_pct_bps: computed.rate.pct.bps(),
            stored_amount: entry.amount(),
            computed_amount: computed.amount,
        }
    }
}

/// What recompute should do for one invoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SyncAction {
    Insert,
    Unchanged,
    Update { reset_to_pending: bool },
    Discrepancy(Discrepancy),
}

impl SyncAction {
    /// True when the action writes a row.
    pub fn writes(&self) -> bool {
        matches!(self, SyncAction::Insert | SyncAction::Update { .. })
    }
}

/// Options for recompute / sync.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct RecomputeOptions {
    /// Rewrite PAID entries whose amounts drifted (they stay PAID).
    pub overwrite_paid: bool,
}

/// Decides the action for one invoice.
pub fn plan_sync(
    existing: Option<&CommissionLedgerEntry>,
    computed: &ComputedCommission,
    options: RecomputeOptions,
) -> SyncAction {
    let Some(entry) = existing else {
        return SyncAction::Insert;
    };

    let same_money = computed.same_money(entry);
    if same_money && computed.same_metadata(entry) {
        return SyncAction::Unchanged;
    }

    match entry.status {
        CommissionStatus::Paid if same_money || options.overwrite_paid => SyncAction::Update {
            reset_to_pending: false,
        },
        CommissionStatus::Paid => SyncAction::Discrepancy(Discrepancy::between(entry, computed)),
        CommissionStatus::Pending | CommissionStatus::Approved => SyncAction::Update {
            reset_to_pending: true,
        },
    }
}

// =============================================================================
// Summaries
// =============================================================================

/// Outcome of a recompute over a date range.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct RecomputeSummary {
    #[ts(as = "Option<String>")]
    pub from: Option<NaiveDate>,
    #[ts(as = "Option<String>")]
    pub to: Option<NaiveDate>,
    /// Invoices in range.
    pub total: usize,
    /// Entries inserted or updated.
    pub synced: usize,
    pub unchanged: usize,
    pub discrepancies: Vec<Discrepancy>,
    /// Set when processing stopped early; counts cover committed work only.
    pub first_error: Option<String>,
    pub failed_invoice_id: Option<i64>,
}

impl RecomputeSummary {
    pub fn record(&mut self, action: &SyncAction) {
        match action {
            SyncAction::Insert | SyncAction::Update { .. } => self.synced += 1,
            SyncAction::Unchanged => self.unchanged += 1,
            SyncAction::Discrepancy(d) => self.discrepancies.push(d.clone()),
        }
    }

    #[inline]
    pub fn is_complete(&self) -> bool {
        self.first_error.is_none()
    }
}

/// Per-status totals for a ledger listing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct LedgerTotals {
    pub entries: usize,
    pub total: Money,
    pub pending: Money,
    pub approved: Money,
    pub paid: Money,
}

impl LedgerTotals {
    pub fn from_entries<'a>(entries: impl IntoIterator<Item = &'a CommissionLedgerEntry>) -> Self {
        entries.into_iter().fold(LedgerTotals::default(), |mut acc, e| {
            acc.entries += 1;
            acc.total += e.amount();
            match e.status {
                CommissionStatus::Pending => acc.pending += e.amount(),
                CommissionStatus::Approved => acc.approved += e.amount(),
                CommissionStatus::Paid => acc.paid += e.amount(),
            }
            acc
        })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
