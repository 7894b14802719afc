//! # Order Line Item Model
//!
//! Line items capture the unit price at add time; they are not repriced when
//! the catalog changes. The `(order_id, product_id)` pair is unique, so adding
//! a product that is already in the cart increments its quantity instead of
//! inserting a second row.
//!
//! ## Database Schema
//!
//! Maps to the `order_items` table:
//! ```sql
//! CREATE TABLE order_items (
//!   id BIGSERIAL PRIMARY KEY,
//!   order_id BIGINT NOT NULL REFERENCES orders(id),
//!   product_id BIGINT NOT NULL REFERENCES products(id),
//!   quantity INTEGER NOT NULL CHECK (quantity > 0),
//!   unit_price NUMERIC(12,2) NOT NULL,
//!   UNIQUE (order_id, product_id)
//! );
//! ```

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct OrderItem {
    pub id: i64,
    pub order_id: i64,
    pub product_id: i64,
    pub quantity: i32,
    pub unit_price: Decimal,
}

impl OrderItem {
    /// Line total at the captured unit price
    pub fn line_total(&self) -> Decimal {
        Decimal::from(self.quantity) * self.unit_price
    }

    /// Add one unit of a product to an order.
    ///
    /// Upsert on the `(order_id, product_id)` uniqueness constraint: a product
    /// already present in the cart gets its quantity incremented, keeping the
    /// unit price captured on first add.
    pub async fn add_one(
        pool: &PgPool,
        order_id: i64,
        product_id: i64,
        unit_price: Decimal,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO order_items (order_id, product_id, quantity, unit_price)
            VALUES ($1, $2, 1, $3)
            ON CONFLICT (order_id, product_id)
            DO UPDATE SET quantity = order_items.quantity + 1
            RETURNING id, order_id, product_id, quantity, unit_price
            "#,
        )
        .bind(order_id)
        .bind(product_id)
        .bind(unit_price)
        .fetch_one(pool)
        .await
    }

    pub async fn for_order(pool: &PgPool, order_id: i64) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r#"
            SELECT id, order_id, product_id, quantity, unit_price
            FROM order_items
            WHERE order_id = $1
            ORDER BY id
            "#,
        )
        .bind(order_id)
        .fetch_all(pool)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn item(quantity: i32, unit_price: Decimal) -> OrderItem {
        OrderItem {
            id: 1,
            order_id: 1,
            product_id: 1,
            quantity,
            unit_price,
        }
    }

    #[test]
    fn test_line_total() {
        let item = item(3, Decimal::new(1250, 2)); // 3 x 12.50
        assert_eq!(item.line_total(), Decimal::new(3750, 2));
    }

    #[test]
    fn test_order_total_from_items() {
        // Two line items: product A 2 x 100.00, product B 1 x 50.00
        let a = item(2, Decimal::new(10000, 2));
        let b = item(1, Decimal::new(5000, 2));
        let total: Decimal = a.line_total() + b.line_total();
        assert_eq!(total, Decimal::new(25000, 2)); // 250.00
    }
}
