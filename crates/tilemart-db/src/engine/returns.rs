//! Return posting.
//!
//! Requested quantities are clamped to what is left on each sale line.
//! Lines that clamp to zero produce no row; if none survive, nothing is
//! written.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use ts_rs::TS;

use super::Engine;
use crate::error::{DbError, DbResult};
use tilemart_core::returns::{plan_return, return_totals};
use tilemart_core::validation::validate_document_number;
use tilemart_core::{CoreError, ReturnHeader, ReturnLine};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ReturnLineRequest {
    pub sale_line_id: i64,
    pub qty: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ReturnRequest {
    pub invoice_id: i64,
    #[ts(as = "String")]
    pub return_date: NaiveDate,
    pub notes: Option<String>,
    pub lines: Vec<ReturnLineRequest>,
}

/// What a return request produced.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ReturnOutcome {
    /// `None` when every line clamped to zero.
    pub header: Option<ReturnHeader>,
    pub lines: Vec<ReturnLine>,
    /// Requested sale lines that had nothing left to return.
    pub skipped: Vec<i64>,
}

impl ReturnOutcome {
    pub fn is_empty(&self) -> bool {
        self.header.is_none()
    }
}

impl Engine {
    /// Posts a sales return against an invoice in one transaction.
    ///
    /// A request naming a sale line of another invoice fails with
    /// `ForeignSaleLine` and writes nothing.
    pub async fn create_return(&self, request: &ReturnRequest) -> DbResult<ReturnOutcome> {
        let returns = self.db.returns();
        let mut tx = self.db.pool().begin().await?;

        let invoice = self
            .db
            .invoices()
            .get(&mut *tx, request.invoice_id)
            .await?
            .ok_or_else(|| DbError::not_found("Invoice", request.invoice_id))?;

        let returnable = returns.returnable_lines(&mut *tx, invoice.id).await?;
        let requests: Vec<(i64, f64)> = request.lines.iter().map(|l| (l.sale_line_id, l.qty)).collect();
        let (accepted, unknown) = plan_return(&returnable, &requests);

        if let Some(&sale_line_id) = unknown.first() {
            return Err(CoreError::ForeignSaleLine {
                sale_line_id,
                invoice_id: invoice.id,
            }
            .into());
        }

        let mut skipped: Vec<i64> = request
            .lines
            .iter()
            .map(|l| l.sale_line_id)
            .filter(|id| !accepted.iter().any(|a| a.sale_line_id == *id))
            .collect();
        skipped.sort_unstable();
        skipped.dedup();

        if accepted.is_empty() {
            debug!(invoice_id = invoice.id, ?skipped, "Nothing to return");
            return Ok(ReturnOutcome {
                skipped,
                ..Default::default()
            });
        }

        let totals = return_totals(&accepted, invoice.gst_mode, invoice.gst_rate());
        let sequence = returns.count_for_invoice(&mut *tx, invoice.id).await? + 1;
        let return_no = format!("RET-{}-{:02}", invoice.invoice_no, sequence);
        validate_document_number("return_no", &return_no)?;

        let header = returns
            .insert_header(
                &mut *tx,
                &ReturnHeader {
                    id: 0,
                    return_no,
                    invoice_id: invoice.id,
                    return_date: request.return_date,
                    notes: request
                        .notes
                        .as_deref()
                        .map(str::trim)
                        .filter(|n| !n.is_empty())
                        .map(str::to_string),
                    gst_mode: invoice.gst_mode,
                    gst_rate_bps: invoice.gst_rate_bps,
                    subtotal_paise: totals.subtotal.paise(),
                    gst_paise: totals.gst.paise(),
                    total_paise: totals.total.paise(),
                },
            )
            .await?;

        let mut lines = Vec::with_capacity(accepted.len());
        for line in &accepted {
            lines.push(returns.insert_line(&mut *tx, header.id, line).await?);
        }
        tx.commit().await?;

        info!(
            return_no = %header.return_no,
            invoice_id = invoice.id,
            lines = lines.len(),
            total = %totals.total,
            "Return posted"
        );
        Ok(ReturnOutcome {
            header: Some(header),
            lines,
            skipped,
        })
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::super::fixtures::*;
    use super::*;
    use crate::repository::DocumentLine;
    use tilemart_core::{GstMode, Money, Percent};

    async fn sold_invoice(engine: &Engine) -> (i64, i64, i64) {
        let a = tile(engine, "A").await;
        let b = tile(engine, "B").await;
        receive(engine, reference_receipt(a.id)).await;
        receive(engine, reference_receipt(b.id)).await;
        let posted = engine
            .post_invoice(&invoice(
                "INV-7",
                date(2024, 2, 1),
                None,
                vec![DocumentLine::new(a.id, 10.0, 300.0), DocumentLine::new(b.id, 4.0, 250.0)],
            ))
            .await
            .unwrap();
        (posted.invoice.id, posted.lines[0].id, posted.lines[1].id)
    }

    fn request(invoice_id: i64, lines: &[(i64, f64)]) -> ReturnRequest {
        ReturnRequest {
            invoice_id,
            return_date: date(2024, 2, 10),
            notes: Some(" cracked ".to_string()),
            lines: lines
                .iter()
                .map(|&(sale_line_id, qty)| ReturnLineRequest { sale_line_id, qty })
                .collect(),
        }
    }

    #[tokio::test]
    async fn test_return_with_gst() {
        let engine = engine().await;
        let (invoice_id, line_a, _) = sold_invoice(&engine).await;

        let outcome = engine.create_return(&request(invoice_id, &[(line_a, 3.0)])).await.unwrap();
        let header = outcome.header.unwrap();
        assert_eq!(header.return_no, "RET-INV-7-01");
        assert_eq!(header.notes.as_deref(), Some("cracked"));
        assert_eq!(header.subtotal_paise, Money::from_rupees(900.0).paise());
        assert_eq!(header.gst_paise, Money::from_rupees(162.0).paise());
        assert_eq!(header.total(), Money::from_rupees(1_062.0));
        assert_eq!(outcome.lines.len(), 1);
        assert_eq!(outcome.lines[0].qty, 3.0);
    }

    #[tokio::test]
    async fn test_return_clamps_and_skips() {
        let engine = engine().await;
        let (invoice_id, line_a, line_b) = sold_invoice(&engine).await;

        let outcome = engine
            .create_return(&request(invoice_id, &[(line_a, 25.0), (line_b, -2.0)]))
            .await
            .unwrap();
        assert_eq!(outcome.lines.len(), 1);
        assert_eq!(outcome.lines[0].qty, 10.0);
        assert_eq!(outcome.skipped, vec![line_b]);

        let second = engine.create_return(&request(invoice_id, &[(line_a, 10.0)])).await.unwrap();
        assert!(second.is_empty());
        assert!(second.lines.is_empty());
        assert_eq!(second.skipped, vec![line_a]);

        let headers = engine
            .database()
            .returns()
            .headers_for_invoice(engine.database().pool(), invoice_id)
            .await
            .unwrap();
        assert_eq!(headers.len(), 1);

        let third = engine.create_return(&request(invoice_id, &[(line_b, 1.0)])).await.unwrap();
        assert_eq!(third.header.unwrap().return_no, "RET-INV-7-02");
    }

    #[tokio::test]
    async fn test_skipped_lines_reported_once() {
        let engine = engine().await;
        let (invoice_id, line_a, line_b) = sold_invoice(&engine).await;

        let outcome = engine
            .create_return(&request(invoice_id, &[(line_a, 0.0), (line_b, 1.0), (line_a, 0.0)]))
            .await
            .unwrap();
        assert_eq!(outcome.lines.len(), 1);
        assert_eq!(outcome.lines[0].sale_line_id, line_b);
        assert_eq!(outcome.skipped, vec![line_a]);

        let nothing = engine
            .create_return(&request(invoice_id, &[(line_b, 0.0), (line_a, -1.0), (line_b, 0.0), (line_a, 0.0)]))
            .await
            .unwrap();
        assert!(nothing.is_empty());
        assert_eq!(nothing.skipped, vec![line_a, line_b]);
    }

    #[tokio::test]
    async fn test_included_gst_is_not_added() {
        let engine = engine().await;
        let sku = tile(&engine, "A").await;
        receive(&engine, reference_receipt(sku.id)).await;
        let mut new_invoice = invoice("INV-9", date(2024, 2, 1), None, vec![DocumentLine::new(sku.id, 5.0, 118.0)]);
        new_invoice.gst_mode = GstMode::Include;
        new_invoice.gst_rate = Percent::from_percentage(18.0);
        let posted = engine.post_invoice(&new_invoice).await.unwrap();

        let outcome = engine
            .create_return(&request(posted.invoice.id, &[(posted.lines[0].id, 5.0)]))
            .await
            .unwrap();
        let header = outcome.header.unwrap();
        assert_eq!(header.gst_paise, 0);
        assert_eq!(header.total(), Money::from_rupees(590.0));
    }

    #[tokio::test]
    async fn test_foreign_sale_line_writes_nothing() {
        let engine = engine().await;
        let (invoice_id, line_a, _) = sold_invoice(&engine).await;

        let err = engine
            .create_return(&request(invoice_id, &[(line_a, 1.0), (9_999, 1.0)]))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::ForeignSaleLine { sale_line_id: 9_999, .. })
        ));

        let availability = engine.resolve_availability(posted_sku(&engine).await).await.unwrap();
        assert_eq!(availability.returned, 0.0);

        let err = engine.create_return(&request(404, &[(line_a, 1.0)])).await.unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }

    async fn posted_sku(engine: &Engine) -> i64 {
        engine
            .database()
            .skus()
            .get_by_code(engine.database().pool(), "A")
            .await
            .unwrap()
            .unwrap()
            .id
    }
}
