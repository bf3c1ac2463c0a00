//! # Seed Data Generator
//!
//! Populates a showroom database with demo stock, sales and commission
//! rates, then recomputes the commission ledger and prints the result.
//!
//! ## Usage
//! ```bash
//! # Use engine.toml from the platform config dir (or defaults)
//! cargo run -p tilemart-db --bin seed
//!
//! # Explicit config file and database path
//! cargo run -p tilemart-db --bin seed -- --config ./engine.toml --db ./data/tilemart.db
//! ```
//!
//! ## Generated Data
//! - Tiles at 10-16 sqft per box and a couple of misc items
//! - Two receipts per SKU (one with damage and transport)
//! - A global 2% rate and a 3% rate for salesperson 2
//! - One quotation and a month of invoices across three salespeople
//!
//! Set `RUST_LOG` to adjust logging (default `info,tilemart=debug,sqlx=warn`).

use chrono::{Duration, NaiveDate, Utc};
use std::env;
use std::path::PathBuf;
use tilemart_core::ledger::RecomputeOptions;
use tilemart_core::{GstMode, Percent, Receipt, Sku, SkuKind};
use tilemart_db::{AppConfig, DocumentLine, Engine, LedgerFilter, NewInvoice, NewQuotation};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Catalogue: (code, name, kind, sqft per box, ₹ per box)
const CATALOGUE: &[(&str, &str, SkuKind, f64, f64)] = &[
    ("GVT-600", "Glazed Vitrified 600x600", SkuKind::Tile, 15.5, 620.0),
    ("GVT-800", "Glazed Vitrified 800x800", SkuKind::Tile, 13.8, 910.0),
    ("CER-300", "Ceramic Wall 300x450", SkuKind::Tile, 10.0, 280.0),
    ("PRC-1200", "Porcelain Slab 600x1200", SkuKind::Tile, 15.5, 1450.0),
    ("ADH-20", "Tile Adhesive 20kg", SkuKind::Misc, 1.0, 390.0),
    ("GRT-1", "Epoxy Grout 1kg", SkuKind::Misc, 1.0, 240.0),
];

/// Salesperson user ids that invoices rotate through.
const SALESPEOPLE: &[i64] = &[1, 2, 3];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,tilemart=debug,sqlx=warn")),
        )
        .init();

    let args: Vec<String> = env::args().collect();
    let mut config_path: Option<PathBuf> = None;
    let mut db_path: Option<PathBuf> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    config_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Tilemart Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --config <PATH>  Config file (default: platform config dir)");
                println!("  -d, --db <PATH>      Database file path (overrides config)");
                println!("  -h, --help           Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    let mut config = AppConfig::load(config_path)?;
    if let Some(path) = db_path {
        config.database.path = path;
    }
    info!(db = ?config.database.path, schema = config.schema.version, "Starting seed");

    let engine = Engine::from_config(&config).await?;
    let db = engine.database();

    let existing = db.skus().list(db.pool()).await?;
    if existing.is_empty() {
        seed(&engine).await?;
    } else {
        info!(skus = existing.len(), "Database already has stock; skipping seed");
    }

    let summary = engine
        .recompute_commissions(None, None, RecomputeOptions::default())
        .await?;
    let ledger = engine.list_commissions(&LedgerFilter::default()).await?;

    println!("{}", serde_json::to_string_pretty(&summary)?);
    println!("{}", serde_json::to_string_pretty(&ledger.totals)?);

    db.close().await;
    Ok(())
}

async fn seed(engine: &Engine) -> Result<(), Box<dyn std::error::Error>> {
    let db = engine.database();
    let today = Utc::now().date_naive();
    let start = today - Duration::days(45);

    let mut skus = Vec::with_capacity(CATALOGUE.len());
    for (idx, (code, name, kind, factor, price)) in CATALOGUE.iter().enumerate() {
        let sku = db
            .skus()
            .insert(db.pool(), &Sku::new(0, *kind, *code, *name, *factor))
            .await?;

        for receipt in receipts_for(&sku, *price, start, idx) {
            let recorded = engine.record_receipt(&receipt, today).await?;
            for warning in &recorded.warnings {
                info!(sku = %sku.code, ?warning, "Receipt warning");
            }
        }
        skus.push((sku, *price));
    }
    info!(skus = skus.len(), "Stock received");

    engine.set_global_rate(Percent::from_percentage(2.0)).await?;
    engine.set_user_rate(2, Percent::from_percentage(3.0)).await?;

    let quotation = engine
        .create_quotation(&NewQuotation {
            quote_no: "Q-0001".to_string(),
            quote_date: start + Duration::days(14),
            salesperson_user_id: Some(SALESPEOPLE[0]),
            lines: vec![
                DocumentLine::new(skus[0].0.id, 40.0, skus[0].1 * 1.35),
                DocumentLine::new(skus[4].0.id, 10.0, skus[4].1 * 1.25),
            ],
        })
        .await?;

    for day in 0..30 {
        let invoice_date = start + Duration::days(15 + day);
        let (sku, price) = &skus[day as usize % skus.len()];
        let (other, other_price) = &skus[(day as usize + 3) % skus.len()];
        let markup = 1.2 + (day % 4) as f64 * 0.05;

        let posted = engine
            .post_invoice(&NewInvoice {
                invoice_no: format!("INV-{:04}", day + 1),
                invoice_date,
                quotation_id: (day == 0).then_some(quotation.id),
                salesperson_user_id: Some(SALESPEOPLE[day as usize % SALESPEOPLE.len()]),
                gst_mode: if day % 5 == 0 { GstMode::Include } else { GstMode::Exclude },
                gst_rate: Percent::from_percentage(18.0),
                lines: vec![
                    DocumentLine::new(sku.id, 2.0 + (day % 7) as f64, price * markup),
                    DocumentLine::new(other.id, 1.0, other_price * 1.3),
                ],
            })
            .await?;

        if day == 0 {
            engine
                .set_invoice_override(posted.invoice.id, Percent::from_percentage(5.0))
                .await?;
        }
    }
    info!("Invoices posted");

    Ok(())
}

/// An opening receipt plus a later one with damage and transport.
fn receipts_for(sku: &Sku, price: f64, start: NaiveDate, idx: usize) -> [Receipt; 2] {
    let opening = Receipt {
        receipt_date: Some(start),
        vendor: Some("Morbi Ceramics".to_string()),
        quantity_in: 120.0,
        per_unit_value: price,
        transport_pct: 3.0,
        ..Receipt::for_sku(sku.id)
    };
    let restock = Receipt {
        receipt_date: Some(start + Duration::days(15)),
        vendor: Some("Kajaria Depot".to_string()),
        quantity_in: 80.0,
        damaged_units: (idx % 3) as f64,
        per_unit_value: price * 1.04,
        transport_per_unit: 4.0,
        transport_total: 1500.0,
        ..Receipt::for_sku(sku.id)
    };
    [opening, restock]
}
