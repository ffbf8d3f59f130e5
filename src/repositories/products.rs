use sqlx::{PgExecutor, PgPool};

use crate::db::models::Product;

const COLUMNS: &str = "\
    id, title, description, category, price, file_url, is_active, created_by, \
    created_at, updated_at";

pub(crate) struct CreateProduct<'a> {
    pub(crate) id: &'a str,
    pub(crate) title: &'a str,
    pub(crate) description: &'a str,
    pub(crate) category: &'a str,
    pub(crate) price: f64,
    pub(crate) file_url: Option<&'a str>,
    pub(crate) is_active: bool,
    pub(crate) created_by: &'a str,
    pub(crate) created_at: time::PrimitiveDateTime,
    pub(crate) updated_at: time::PrimitiveDateTime,
}

pub(crate) struct UpdateProduct {
    pub(crate) title: Option<String>,
    pub(crate) description: Option<String>,
    pub(crate) category: Option<String>,
    pub(crate) price: Option<f64>,
    pub(crate) file_url: Option<String>,
    pub(crate) is_active: Option<bool>,
    pub(crate) updated_at: time::PrimitiveDateTime,
}

pub(crate) async fn create(
    pool: &PgPool,
    params: CreateProduct<'_>,
) -> Result<Product, sqlx::Error> {
    sqlx::query_as::<_, Product>(&format!(
        "INSERT INTO products (
            id, title, description, category, price, file_url, is_active,
            created_by, created_at, updated_at
         ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10)
         RETURNING {COLUMNS}",
    ))
    .bind(params.id)
    .bind(params.title)
    .bind(params.description)
    .bind(params.category)
    .bind(params.price)
    .bind(params.file_url)
    .bind(params.is_active)
    .bind(params.created_by)
    .bind(params.created_at)
    .bind(params.updated_at)
    .fetch_one(pool)
    .await
}

pub(crate) async fn find_by_id<'e>(
    executor: impl PgExecutor<'e>,
    product_id: &str,
) -> Result<Option<Product>, sqlx::Error> {
    sqlx::query_as::<_, Product>(&format!("SELECT {COLUMNS} FROM products WHERE id = $1"))
        .bind(product_id)
        .fetch_optional(executor)
        .await
}

pub(crate) async fn fetch_one_by_id(
    pool: &PgPool,
    product_id: &str,
) -> Result<Product, sqlx::Error> {
    sqlx::query_as::<_, Product>(&format!("SELECT {COLUMNS} FROM products WHERE id = $1"))
        .bind(product_id)
        .fetch_one(pool)
        .await
}

pub(crate) async fn update(
    pool: &PgPool,
    product_id: &str,
    params: UpdateProduct,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE products SET
            title = COALESCE($1, title),
            description = COALESCE($2, description),
            category = COALESCE($3, category),
            price = COALESCE($4, price),
            file_url = COALESCE($5, file_url),
            is_active = COALESCE($6, is_active),
            updated_at = $7
         WHERE id = $8",
    )
    .bind(params.title)
    .bind(params.description)
    .bind(params.category)
    .bind(params.price)
    .bind(params.file_url)
    .bind(params.is_active)
    .bind(params.updated_at)
    .bind(product_id)
    .execute(pool)
    .await?;
    Ok(())
}

pub(crate) async fn delete(pool: &PgPool, product_id: &str) -> Result<bool, sqlx::Error> {
    let result =
        sqlx::query("DELETE FROM products WHERE id = $1").bind(product_id).execute(pool).await?;
    Ok(result.rows_affected() > 0)
}
