use async_trait::async_trait;

use crate::{
    error::AppError,
    models::product::{normalize_coupon_code, Coupon, Product},
    repositories::{is_unique_violation, PgStore},
};

const PRODUCT_COLUMNS: &str =
    "key, name, monthly_price, yearly_price, active, created_at, updated_at";
const COUPON_COLUMNS: &str =
    "code, percent_off, max_redemptions, redemptions, expires_at, active, created_at";

#[async_trait]
pub trait CatalogRepository: Send + Sync {
    /// All products ordered by key, including inactive ones.
    async fn list_products(&self) -> Result<Vec<Product>, AppError>;

    /// Inserts or replaces a product, keeping its original `created_at`.
    async fn upsert_product(&self, product: &Product) -> Result<Product, AppError>;

    async fn find_coupon(&self, code: &str) -> Result<Option<Coupon>, AppError>;

    async fn list_coupons(&self) -> Result<Vec<Coupon>, AppError>;

    /// Fails with `Conflict` when the code already exists.
    async fn create_coupon(&self, coupon: &Coupon) -> Result<(), AppError>;
}

#[async_trait]
impl CatalogRepository for PgStore {
    async fn list_products(&self) -> Result<Vec<Product>, AppError> {
        let query = format!("SELECT {} FROM products ORDER BY key", PRODUCT_COLUMNS);
        let products = sqlx::query_as::<_, Product>(&query)
            .fetch_all(&self.pool)
            .await?;
        Ok(products)
    }

    async fn upsert_product(&self, product: &Product) -> Result<Product, AppError> {
        let query = format!(
            "INSERT INTO products ({cols}) VALUES ($1, $2, $3, $4, $5, $6, $7) \
             ON CONFLICT (key) DO UPDATE SET name = EXCLUDED.name, \
             monthly_price = EXCLUDED.monthly_price, yearly_price = EXCLUDED.yearly_price, \
             active = EXCLUDED.active, updated_at = EXCLUDED.updated_at \
             RETURNING {cols}",
            cols = PRODUCT_COLUMNS
        );
        let stored = sqlx::query_as::<_, Product>(&query)
            .bind(&product.key)
            .bind(&product.name)
            .bind(product.monthly_price)
            .bind(product.yearly_price)
            .bind(product.active)
            .bind(product.created_at)
            .bind(product.updated_at)
            .fetch_one(&self.pool)
            .await?;
        Ok(stored)
    }

    async fn find_coupon(&self, code: &str) -> Result<Option<Coupon>, AppError> {
        let query = format!("SELECT {} FROM coupons WHERE code = $1", COUPON_COLUMNS);
        let coupon = sqlx::query_as::<_, Coupon>(&query)
            .bind(normalize_coupon_code(code))
            .fetch_optional(&self.pool)
            .await?;
        Ok(coupon)
    }

    async fn list_coupons(&self) -> Result<Vec<Coupon>, AppError> {
        let query = format!(
            "SELECT {} FROM coupons ORDER BY created_at DESC",
            COUPON_COLUMNS
        );
        let coupons = sqlx::query_as::<_, Coupon>(&query)
            .fetch_all(&self.pool)
            .await?;
        Ok(coupons)
    }

    async fn create_coupon(&self, coupon: &Coupon) -> Result<(), AppError> {
        let query = format!(
            "INSERT INTO coupons ({}) VALUES ($1, $2, $3, $4, $5, $6, $7)",
            COUPON_COLUMNS
        );
        sqlx::query(&query)
            .bind(&coupon.code)
            .bind(coupon.percent_off)
            .bind(coupon.max_redemptions)
            .bind(coupon.redemptions)
            .bind(coupon.expires_at)
            .bind(coupon.active)
            .bind(coupon.created_at)
            .execute(&self.pool)
            .await
            .map_err(|err| {
                if is_unique_violation(&err) {
                    AppError::Conflict("Coupon code already exists".to_string())
                } else {
                    AppError::from(err)
                }
            })?;
        Ok(())
    }
}
