use async_trait::async_trait;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};

use crate::{Money, Product, ProductId, Result, StockLevels, StockStore, StoreError};

const PRODUCT_COLUMNS: &str = "product_id, name, price_cents, stock, created_at, updated_at";

/// PostgreSQL-backed stock store implementation.
#[derive(Clone)]
pub struct PostgresStockStore {
    pool: PgPool,
}

impl PostgresStockStore {
    /// Creates a new PostgreSQL stock store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects a new pool to the given database URL.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self::new(pool))
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }

    fn row_to_product(row: PgRow) -> Result<Product> {
        Ok(Product {
            product_id: ProductId::new(row.try_get::<String, _>("product_id")?),
            name: row.try_get("name")?,
            price: Money::from_cents(row.try_get("price_cents")?),
            stock: row.try_get("stock")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

#[async_trait]
impl StockStore for PostgresStockStore {
    async fn create(&self, product: Product) -> Result<Product> {
        let query = format!(
            r#"
            INSERT INTO products ({PRODUCT_COLUMNS})
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (product_id) DO NOTHING
            RETURNING {PRODUCT_COLUMNS}
            "#
        );

        let row = sqlx::query(&query)
            .bind(product.product_id.as_str())
            .bind(&product.name)
            .bind(product.price.cents())
            .bind(product.stock)
            .bind(product.created_at)
            .bind(product.updated_at)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Self::row_to_product(row),
            None => Err(StoreError::AlreadyExists(product.product_id)),
        }
    }

    async fn get(&self, product_id: &ProductId) -> Result<Product> {
        let query = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE product_id = $1");

        let row = sqlx::query(&query)
            .bind(product_id.as_str())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Self::row_to_product(row),
            None => Err(StoreError::NotFound(product_id.clone())),
        }
    }

    async fn deduct_stock(&self, product_id: &ProductId, quantity: i64) -> Result<StockLevels> {
        if quantity <= 0 {
            return Err(StoreError::InvalidQuantity(quantity));
        }

        // The comparison and the write are one statement; Postgres row locking
        // serializes concurrent decrements of the same product.
        let new_stock: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE products
            SET stock = stock - $2, updated_at = NOW()
            WHERE product_id = $1 AND stock >= $2
            RETURNING stock
            "#,
        )
        .bind(product_id.as_str())
        .bind(quantity)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(new_stock) = new_stock {
            return Ok(StockLevels {
                previous_stock: new_stock + quantity,
                new_stock,
            });
        }

        // Condition failed: distinguish a missing row from low stock.
        let available: Option<i64> =
            sqlx::query_scalar("SELECT stock FROM products WHERE product_id = $1")
                .bind(product_id.as_str())
                .fetch_optional(&self.pool)
                .await?;

        match available {
            Some(available) => {
                tracing::debug!(
                    %product_id,
                    available,
                    requested = quantity,
                    "conditional decrement rejected"
                );
                Err(StoreError::InsufficientStock {
                    product_id: product_id.clone(),
                    available,
                    requested: quantity,
                })
            }
            None => Err(StoreError::NotFound(product_id.clone())),
        }
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
