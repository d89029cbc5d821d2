use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rusqlite::{Connection, params};
use sqlpilot_common::{Error, Result};
use tracing::info;

const USER_COUNT: usize = 20;
const PRODUCT_COUNT: usize = 50;
const ORDER_COUNT: usize = 100;
const SEED: u64 = 42;

const CITIES: [&str; 5] = ["Beijing", "Shanghai", "Guangzhou", "Shenzhen", "Hangzhou"];
const CATEGORIES: [&str; 5] = ["Electronics", "Clothing", "Books", "Home", "Sports"];
const STATUSES: [&str; 3] = ["completed", "pending", "cancelled"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeedReport {
    pub users: usize,
    pub products: usize,
    pub orders: usize,
    pub order_items: usize,
}

/// Build the demo commerce database: users, products, orders, order_items.
///
/// The fill is pseudo-random from a fixed seed, so repeated runs produce
/// byte-identical databases and evaluation against the demo schema stays
/// reproducible. Existing tables are dropped first.
pub fn seed_demo(conn: &Connection) -> Result<SeedReport> {
    conn.execute_batch(
        "DROP TABLE IF EXISTS order_items;
         DROP TABLE IF EXISTS orders;
         DROP TABLE IF EXISTS products;
         DROP TABLE IF EXISTS users;

         CREATE TABLE users (
             id INTEGER PRIMARY KEY,
             username TEXT NOT NULL UNIQUE,
             email TEXT,
             city TEXT,
             created_at TEXT
         );
         CREATE TABLE products (
             id INTEGER PRIMARY KEY,
             name TEXT NOT NULL,
             category TEXT,
             price REAL NOT NULL,
             stock INTEGER DEFAULT 0
         );
         CREATE TABLE orders (
             id INTEGER PRIMARY KEY,
             user_id INTEGER REFERENCES users(id),
             order_date TEXT,
             total_amount REAL DEFAULT 0.0,
             status TEXT DEFAULT 'completed'
         );
         CREATE TABLE order_items (
             id INTEGER PRIMARY KEY,
             order_id INTEGER REFERENCES orders(id),
             product_id INTEGER REFERENCES products(id),
             quantity INTEGER DEFAULT 1,
             price_at_purchase REAL
         );",
    )
    .map_err(|e| Error::Database(format!("failed to create demo schema: {e}")))?;

    let mut rng = StdRng::seed_from_u64(SEED);

    for i in 0..USER_COUNT {
        let city = CITIES[rng.random_range(0..CITIES.len())];
        let age_days = rng.random_range(1..=365);
        conn.execute(
            "INSERT INTO users (id, username, email, city, created_at)
             VALUES (?, ?, ?, ?, datetime('now', ?))",
            params![
                (i + 1) as i64,
                format!("user_{}", i + 1),
                format!("user_{}@example.com", i + 1),
                city,
                format!("-{age_days} days"),
            ],
        )
        .map_err(|e| Error::Database(format!("failed to insert user: {e}")))?;
    }

    let mut prices = Vec::with_capacity(PRODUCT_COUNT);
    for i in 0..PRODUCT_COUNT {
        let category = CATEGORIES[rng.random_range(0..CATEGORIES.len())];
        let price = (rng.random_range(1000..100_000) as f64) / 100.0;
        let stock = rng.random_range(10..=200);
        prices.push(price);
        conn.execute(
            "INSERT INTO products (id, name, category, price, stock) VALUES (?, ?, ?, ?, ?)",
            params![
                (i + 1) as i64,
                format!("{category} Product {}", i + 1),
                category,
                price,
                stock as i64,
            ],
        )
        .map_err(|e| Error::Database(format!("failed to insert product: {e}")))?;
    }

    let mut order_items = 0usize;
    let mut item_id = 0i64;
    for order_idx in 0..ORDER_COUNT {
        let order_id = (order_idx + 1) as i64;
        let user_id = rng.random_range(1..=USER_COUNT) as i64;
        let status = STATUSES[rng.random_range(0..STATUSES.len())];
        let age_days = rng.random_range(0..=60);

        let mut total = 0.0f64;
        let item_count = rng.random_range(1..=5);
        let mut pending = Vec::with_capacity(item_count);
        for _ in 0..item_count {
            let product_idx = rng.random_range(0..PRODUCT_COUNT);
            let quantity = rng.random_range(1..=3);
            let price = prices[product_idx];
            total += price * quantity as f64;
            pending.push((product_idx, quantity, price));
        }

        conn.execute(
            "INSERT INTO orders (id, user_id, order_date, total_amount, status)
             VALUES (?, ?, datetime('now', ?), ?, ?)",
            params![
                order_id,
                user_id,
                format!("-{age_days} days"),
                total,
                status,
            ],
        )
        .map_err(|e| Error::Database(format!("failed to insert order: {e}")))?;

        for (product_idx, quantity, price) in pending {
            item_id += 1;
            conn.execute(
                "INSERT INTO order_items (id, order_id, product_id, quantity, price_at_purchase)
                 VALUES (?, ?, ?, ?, ?)",
                params![
                    item_id,
                    order_id,
                    (product_idx + 1) as i64,
                    quantity as i64,
                    price,
                ],
            )
            .map_err(|e| Error::Database(format!("failed to insert order item: {e}")))?;
            order_items += 1;
        }
    }

    let report = SeedReport {
        users: USER_COUNT,
        products: PRODUCT_COUNT,
        orders: ORDER_COUNT,
        order_items,
    };
    info!(
        "seeded demo database: {} users, {} products, {} orders, {} order items",
        report.users, report.products, report.orders, report.order_items
    );
    Ok(report)
}
