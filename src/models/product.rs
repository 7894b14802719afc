//! # Product Model
//!
//! Catalog read access plus the guarded stock decrement used by checkout.
//!
//! ## Overview
//!
//! The catalog is an external collaborator: this crate never creates or edits
//! products, it only reads them for pricing and decrements stock when an order
//! is finalized. The `is_in_stock` flag is derived from `quantity` and kept in
//! step on every decrement.
//!
//! ## Database Schema
//!
//! Maps to the `products` table:
//! ```sql
//! CREATE TABLE products (
//!   id BIGSERIAL PRIMARY KEY,
//!   name VARCHAR NOT NULL,
//!   price NUMERIC(12,2) NOT NULL,
//!   quantity INTEGER NOT NULL DEFAULT 0,
//!   is_in_stock BOOLEAN NOT NULL DEFAULT true,
//!   created_at TIMESTAMP NOT NULL DEFAULT NOW(),
//!   updated_at TIMESTAMP NOT NULL DEFAULT NOW()
//! );
//! ```

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgConnection, PgPool};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub price: Decimal,
    pub quantity: i32,
    pub is_in_stock: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Product {
    pub async fn find_by_id(pool: &PgPool, id: i64) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r#"
            SELECT id, name, price, quantity, is_in_stock, created_at, updated_at
            FROM products
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    /// List products currently available for sale
    pub async fn list_in_stock(pool: &PgPool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r#"
            SELECT id, name, price, quantity, is_in_stock, created_at, updated_at
            FROM products
            WHERE quantity > 0
            ORDER BY id
            "#,
        )
        .fetch_all(pool)
        .await
    }

    /// Decrement stock inside an existing transaction.
    ///
    /// The `quantity >= $2` predicate is the negative-stock guard: when it
    /// fails the update matches zero rows, this returns `false`, and the
    /// caller must abort the surrounding transaction.
    pub async fn decrement_stock(
        conn: &mut PgConnection,
        product_id: i64,
        quantity: i32,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE products
            SET quantity = quantity - $2,
                is_in_stock = (quantity - $2) > 0,
                updated_at = NOW()
            WHERE id = $1 AND quantity >= $2
            "#,
        )
        .bind(product_id)
        .bind(quantity)
        .execute(&mut *conn)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}
