//! # Commission Rate Resolver
//!
//! Picks the commission percentage for an invoice and computes the amount.
//!
//! ## Precedence
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  1. INVOICE override     scope_id = invoice.id                          │
//! │  2. QUOTATION override   scope_id = invoice.quotation_id                │
//! │  3. USER rate            user_id  = invoice.salesperson_user_id         │
//! │  4. GLOBAL rate                                                         │
//! │  5. configured default   (0% unless configured)                         │
//! │                                                                         │
//! │  Only active rows count. Within one scope key the highest id wins.      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Base
//! Commission is paid on COST, not revenue: `Σ qty × cost_per_unit_at_sale`.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;
use crate::types::{CommissionRate, Invoice, Percent, RateScope};

/// The invoice attributes rate resolution looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct InvoiceContext {
    pub invoice_id: i64,
    pub quotation_id: Option<i64>,
    pub salesperson_user_id: Option<i64>,
}

impl From<&Invoice> for InvoiceContext {
    fn from(invoice: &Invoice) -> Self {
        InvoiceContext {
            invoice_id: invoice.id,
            quotation_id: invoice.quotation_id,
            salesperson_user_id: invoice.salesperson_user_id,
        }
    }
}

/// Result of rate resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ResolvedRate {
    pub scope: RateScope,
    pub pct: Percent,
    /// `None` when the configured default was used.
    pub rate_id: Option<i64>,
}

impl ResolvedRate {
    pub fn default_rate(pct: Percent) -> Self {
        ResolvedRate {
            scope: RateScope::Default,
            pct,
            rate_id: None,
        }
    }
}

/// Resolves the applicable rate from a set of candidate rows.
///
/// `rates` may hold rows for unrelated invoices or users; only the ones
/// matching `ctx` are considered.
pub fn resolve_rate(
    ctx: &InvoiceContext,
    rates: &[CommissionRate],
    default_pct: Percent,
) -> ResolvedRate {
    let found = latest(rates, RateScope::Invoice, |r| r.scope_id == Some(ctx.invoice_id))
        .or_else(|| {
            ctx.quotation_id
                .and_then(|qid| latest(rates, RateScope::Quotation, |r| r.scope_id == Some(qid)))
        })
        .or_else(|| {
            ctx.salesperson_user_id
                .and_then(|uid| latest(rates, RateScope::User, |r| r.user_id == Some(uid)))
        })
        .or_else(|| latest(rates, RateScope::Global, |_| true));

    match found {
        Some(rate) => ResolvedRate {
            scope: rate.scope,
            pct: rate.pct(),
            rate_id: Some(rate.id),
        },
        None => ResolvedRate::default_rate(default_pct),
    }
}

fn latest(
    rates: &[CommissionRate],
    scope: RateScope,
    matches: impl Fn(&CommissionRate) -> bool,
) -> Option<&CommissionRate> {
    rates
        .iter()
        .filter(|r| r.active && r.scope == scope && matches(*r))
        .max_by_key(|r| r.id)
}

/// `Σ qty × unit_cost`, rounded once to the paisa.
pub fn commission_base(lines: impl IntoIterator<Item = (f64, f64)>) -> Money {
    let total: f64 = lines.into_iter().map(|(qty, unit_cost)| qty * unit_cost).sum();
    Money::from_rupees(total)
}

/// `base × pct / 100`, rounded half up to the paisa.
#[inline]
pub fn commission_amount(base: Money, pct: Percent) -> Money {
    base.percent_of(pct)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn rate(id: i64, scope: RateScope, scope_id: Option<i64>, user_id: Option<i64>, bps: u32) -> CommissionRate {
        CommissionRate {
            id,
            scope,
            scope_id,
            user_id,
            pct_bps: bps,
            active: true,
            created_at: Utc::now(),
        }
    }

    fn ctx() -> InvoiceContext {
        InvoiceContext {
            invoice_id: 10,
            quotation_id: Some(3),
            salesperson_user_id: Some(7),
        }
    }

    fn all_scopes() -> Vec<CommissionRate> {
        vec![
            rate(1, RateScope::Global, None, None, 250),
            rate(2, RateScope::User, None, Some(7), 300),
            rate(3, RateScope::Quotation, Some(3), None, 400),
            rate(4, RateScope::Invoice, Some(10), None, 500),
        ]
    }

    #[test]
    fn test_invoice_override_beats_everything() {
        let resolved = resolve_rate(&ctx(), &all_scopes(), Percent::zero());
        assert_eq!(resolved.scope, RateScope::Invoice);
        assert_eq!(resolved.pct.bps(), 500);
        assert_eq!(resolved.rate_id, Some(4));
    }

    #[test]
    fn test_precedence_walks_down_as_rows_disappear() {
        let mut rates = all_scopes();
        rates.retain(|r| r.scope != RateScope::Invoice);
        assert_eq!(resolve_rate(&ctx(), &rates, Percent::zero()).scope, RateScope::Quotation);

        rates.retain(|r| r.scope != RateScope::Quotation);
        assert_eq!(resolve_rate(&ctx(), &rates, Percent::zero()).scope, RateScope::User);

        rates.retain(|r| r.scope != RateScope::User);
        let global = resolve_rate(&ctx(), &rates, Percent::zero());
        assert_eq!(global.scope, RateScope::Global);
        assert_eq!(global.pct.bps(), 250);

        rates.clear();
        let fallback = resolve_rate(&ctx(), &rates, Percent::from_bps(100));
        assert_eq!(fallback.scope, RateScope::Default);
        assert_eq!(fallback.pct.bps(), 100);
        assert_eq!(fallback.rate_id, None);
    }

    #[test]
    fn test_latest_active_row_wins_within_scope() {
        let mut rates = vec![
            rate(1, RateScope::Global, None, None, 200),
            rate(5, RateScope::Global, None, None, 275),
            rate(9, RateScope::Global, None, None, 999),
        ];
        rates[2].active = false;
        let resolved = resolve_rate(&ctx(), &rates, Percent::zero());
        assert_eq!(resolved.rate_id, Some(5));
        assert_eq!(resolved.pct.bps(), 275);
    }

    #[test]
    fn test_overrides_for_other_documents_ignored() {
        let rates = vec![
            rate(1, RateScope::Global, None, None, 250),
            rate(2, RateScope::Invoice, Some(11), None, 900),
            rate(3, RateScope::User, None, Some(8), 800),
            rate(4, RateScope::Quotation, Some(4), None, 700),
        ];
        assert_eq!(resolve_rate(&ctx(), &rates, Percent::zero()).scope, RateScope::Global);
    }

    #[test]
    fn test_invoice_without_quotation_or_salesperson() {
        let bare = InvoiceContext {
            invoice_id: 10,
            quotation_id: None,
            salesperson_user_id: None,
        };
        let mut rates = all_scopes();
        rates.retain(|r| r.scope != RateScope::Invoice);
        assert_eq!(resolve_rate(&bare, &rates, Percent::zero()).scope, RateScope::Global);
    }

    #[test]
    fn test_base_and_amount() {
        // ₹50,000 of cost at the 2.5% global rate
        let base = commission_base([(100.0, 300.0), (50.0, 400.0)]);
        assert_eq!(base, Money::from_rupees(50_000.0));
        let amount = commission_amount(base, Percent::from_bps(250));
        assert_eq!(amount.paise(), 125_000);
    }

    #[test]
    fn test_base_of_no_lines_is_zero() {
        assert!(commission_base(std::iter::empty()).is_zero());
    }
}
