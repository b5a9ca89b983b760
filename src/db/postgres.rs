use crate::config::DatabaseSettings;
use crate::models::{Order, OrderSide, PriceAnchor};
use crate::persistence::{InsertOutcome, OrderFilter, Store};
use crate::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::{postgres::PgPoolOptions, PgPool, Row};
use std::str::FromStr;
use std::time::Duration;

/// Postgres-backed ledger
///
/// Uniqueness of anchors and orders is enforced by composite primary keys,
/// so concurrent loops cannot create duplicates even when they race.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Connect to Postgres and run pending migrations
    ///
    /// # Arguments
    /// * `settings` - connection URL and pool size
    pub async fn connect(settings: &DatabaseSettings) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(settings.max_connections)
            .acquire_timeout(Duration::from_secs(5))
            .connect(&settings.url)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        tracing::info!("Connected to Postgres ({} max connections)", settings.max_connections);

        Ok(Self { pool })
    }

    /// Delete everything (testing only)
    #[cfg(test)]
    pub async fn clear_all(&self) -> Result<()> {
        sqlx::query("DELETE FROM orders").execute(&self.pool).await?;
        sqlx::query("DELETE FROM price_anchors")
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl Store for PostgresStore {
    async fn upsert_price_anchor(&self, symbol: &str, exchange: &str, price: &str) -> Result<()> {
        let price = Decimal::from_str(price)?;

        sqlx::query(
            r#"
            INSERT INTO price_anchors (symbol, exchange, anchor_price, last_transaction_time)
            VALUES ($1, $2, $3, 0)
            ON CONFLICT (symbol, exchange) DO UPDATE SET
                anchor_price = EXCLUDED.anchor_price,
                updated_at = NOW()
            "#,
        )
        .bind(symbol)
        .bind(exchange)
        .bind(price)
        .execute(&self.pool)
        .await?;

        tracing::debug!("Upserted anchor {}/{} = {}", symbol, exchange, price);

        Ok(())
    }

    async fn find_price_anchor(
        &self,
        symbol: &str,
        exchange: &str,
    ) -> Result<Option<PriceAnchor>> {
        let row = sqlx::query(
            r#"
            SELECT symbol, exchange, anchor_price, last_transaction_time
            FROM price_anchors
            WHERE symbol = $1 AND exchange = $2
            "#,
        )
        .bind(symbol)
        .bind(exchange)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| {
            let anchor_price: Decimal = row.get("anchor_price");
            PriceAnchor {
                symbol: row.get("symbol"),
                exchange: row.get("exchange"),
                anchor_price: anchor_price.to_string(),
                last_transaction_time: row.get("last_transaction_time"),
            }
        }))
    }

    async fn update_anchor_cooldown(
        &self,
        symbol: &str,
        exchange: &str,
        timestamp: i64,
    ) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE price_anchors
            SET last_transaction_time = $3, updated_at = NOW()
            WHERE symbol = $1 AND exchange = $2
            "#,
        )
        .bind(symbol)
        .bind(exchange)
        .bind(timestamp)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            tracing::warn!("No anchor {}/{} to update cooldown on", symbol, exchange);
        }

        Ok(())
    }

    async fn insert_order_if_absent(&self, order: &Order) -> Result<InsertOutcome> {
        let price = Decimal::from_str(&order.price)?;
        let quantity = Decimal::from_str(&order.quantity)?;

        let result = sqlx::query(
            r#"
            INSERT INTO orders (order_id, exchange, symbol, price, quantity, side, resolved)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (order_id, exchange) DO NOTHING
            "#,
        )
        .bind(order.order_id)
        .bind(&order.exchange)
        .bind(&order.symbol)
        .bind(price)
        .bind(quantity)
        .bind(order.side.as_str())
        .bind(order.resolved)
        .execute(&self.pool)
        .await?;

        Ok(if result.rows_affected() == 0 {
            InsertOutcome::AlreadyExists
        } else {
            InsertOutcome::Inserted
        })
    }

    async fn find_orders(&self, filter: &OrderFilter) -> Result<Vec<Order>> {
        let rows = sqlx::query(
            r#"
            SELECT order_id, exchange, symbol, price, quantity, side, resolved
            FROM orders
            WHERE ($1::TEXT IS NULL OR side = $1)
              AND ($2::TEXT IS NULL OR exchange = $2)
              AND ($3::BOOLEAN IS NULL OR resolved = $3)
            ORDER BY created_at ASC, order_id ASC
            "#,
        )
        .bind(filter.side.map(|s| s.as_str()))
        .bind(filter.exchange.as_deref())
        .bind(filter.resolved)
        .fetch_all(&self.pool)
        .await?;

        let mut orders = Vec::with_capacity(rows.len());

        for row in rows {
            let side_str: String = row.get("side");
            let side = OrderSide::parse(&side_str)
                .ok_or_else(|| format!("Invalid order side in ledger: {}", side_str))?;
            let price: Decimal = row.get("price");
            let quantity: Decimal = row.get("quantity");

            orders.push(Order {
                order_id: row.get("order_id"),
                symbol: row.get("symbol"),
                price: price.to_string(),
                quantity: quantity.to_string(),
                exchange: row.get("exchange"),
                side,
                resolved: row.get("resolved"),
            });
        }

        Ok(orders)
    }

    async fn mark_order_resolved(&self, order_id: i64, exchange: &str) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE orders
            SET resolved = TRUE, updated_at = NOW()
            WHERE order_id = $1 AND exchange = $2 AND resolved = FALSE
            "#,
        )
        .bind(order_id)
        .bind(exchange)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
