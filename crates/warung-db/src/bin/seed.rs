//! # Seed Data Generator
//!
//! Populates the database with warung shelf stock for development.
//!
//! ## Usage
//! ```bash
//! # Default database path
//! cargo run -p warung-db --bin seed
//!
//! # Specify database path
//! cargo run -p warung-db --bin seed -- --db ./data/warung.db
//! ```
//!
//! ## Generated Data
//! - Unit-tracked products (bottled drinks, cigarettes) with tagged
//!   units ready to sell
//! - Manual-stock products (rice, eggs, instant noodles) with counted
//!   opening stock

use std::env;

use warung_core::StockMode;
use warung_db::service::stock::NewProduct;
use warung_db::{Database, DbConfig};

/// Unit-tracked shelf items: (name, category, price_cents, min_stock, units)
const UNIT_TRACKED: &[(&str, &str, i64, i64, usize)] = &[
    ("Teh Botol Sosro 450ml", "minuman", 500_000, 3, 12),
    ("Aqua 600ml", "minuman", 400_000, 5, 24),
    ("Kopi Kapal Api Botol", "minuman", 700_000, 2, 8),
    ("Gudang Garam Surya 12", "rokok", 3_200_000, 2, 10),
    ("Sampoerna Mild 16", "rokok", 3_500_000, 2, 10),
    ("Pocari Sweat 500ml", "minuman", 800_000, 3, 6),
];

/// Manual-stock items: (name, category, price_cents, min_stock, stock)
const MANUAL: &[(&str, &str, i64, i64, i64)] = &[
    ("Beras Ramos 5kg", "sembako", 7_000_000, 4, 15),
    ("Telur Ayam (per butir)", "sembako", 250_000, 20, 90),
    ("Indomie Goreng", "makanan", 350_000, 10, 48),
    ("Minyak Goreng 1L", "sembako", 1_800_000, 3, 12),
    ("Gula Pasir 1kg", "sembako", 1_600_000, 5, 20),
    ("Kecap Bango 220ml", "bumbu", 1_200_000, 2, 9),
    ("Sabun Lifebuoy", "kebersihan", 450_000, 5, 18),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .init();

    let args: Vec<String> = env::args().collect();
    let mut db_path = String::from("./warung_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Warung POS Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>    Database file path (default: ./warung_dev.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("🌱 Warung POS Seed Data Generator");
    println!("=================================");
    println!("Database: {}", db_path);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;

    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    let existing = db.products().count().await?;
    if existing > 0 {
        println!("⚠ Database already has {} products", existing);
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    println!();
    println!("Generating products...");

    let stock = db.stock();
    let start = std::time::Instant::now();
    let mut products = 0usize;
    let mut units = 0usize;

    for (idx, (name, category, price_cents, min_stock, unit_count)) in
        UNIT_TRACKED.iter().enumerate()
    {
        let product = stock
            .create_product(NewProduct {
                name: name.to_string(),
                category: category.to_string(),
                price_cents: *price_cents,
                min_stock: *min_stock,
                stock_mode: StockMode::UnitTracked,
                initial_stock: 0,
            })
            .await?;
        products += 1;

        // Tags shaped like real barcode payloads, unique store-wide
        for unit_idx in 0..*unit_count {
            let tag = format!("899{:04}{:06}", idx, unit_idx);
            stock.assign_tag(&product.id, &tag).await?;
            units += 1;
        }
    }

    for (name, category, price_cents, min_stock, stock_level) in MANUAL {
        stock
            .create_product(NewProduct {
                name: name.to_string(),
                category: category.to_string(),
                price_cents: *price_cents,
                min_stock: *min_stock,
                stock_mode: StockMode::Manual,
                initial_stock: *stock_level,
            })
            .await?;
        products += 1;
    }

    let elapsed = start.elapsed();
    println!();
    println!(
        "✓ Generated {} products ({} tagged units) in {:?}",
        products, units, elapsed
    );

    // Verify the aggregator sees everything
    println!();
    println!("Verifying stock view...");
    let view = stock.products_with_stock().await?;
    for entry in &view {
        println!(
            "  {:<28} ready {:>3}  tagged {:>3}",
            entry.product.name, entry.ready_stock, entry.barcode_count
        );
    }

    println!();
    println!("✓ Seed complete!");

    Ok(())
}
