use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

use crate::db::models::Cart;

const COLUMNS: &str = "id, student_id, created_at, updated_at";

/// Flattened cart item with the referenced product populated.
#[derive(Debug, Clone, sqlx::FromRow)]
pub(crate) struct CartItemView {
    pub(crate) item_id: String,
    pub(crate) product_id: String,
    pub(crate) product_title: String,
    pub(crate) product_category: String,
    pub(crate) product_price: f64,
    pub(crate) product_file_url: Option<String>,
    pub(crate) added_at: time::PrimitiveDateTime,
}

pub(crate) async fn find_by_student(
    pool: &PgPool,
    student_id: &str,
) -> Result<Option<Cart>, sqlx::Error> {
    sqlx::query_as::<_, Cart>(&format!("SELECT {COLUMNS} FROM carts WHERE student_id = $1"))
        .bind(student_id)
        .fetch_optional(pool)
        .await
}

/// The cart document is created lazily on first access and reused forever;
/// clearing empties the item list but keeps the row.
pub(crate) async fn find_or_create(
    pool: &PgPool,
    student_id: &str,
    now: time::PrimitiveDateTime,
) -> Result<Cart, sqlx::Error> {
    if let Some(cart) = find_by_student(pool, student_id).await? {
        return Ok(cart);
    }

    sqlx::query_as::<_, Cart>(&format!(
        "INSERT INTO carts (id, student_id, created_at, updated_at)
         VALUES ($1,$2,$3,$3)
         ON CONFLICT (student_id) DO UPDATE SET updated_at = carts.updated_at
         RETURNING {COLUMNS}",
    ))
    .bind(Uuid::new_v4().to_string())
    .bind(student_id)
    .bind(now)
    .fetch_one(pool)
    .await
}

pub(crate) async fn item_exists(
    pool: &PgPool,
    cart_id: &str,
    product_id: &str,
) -> Result<bool, sqlx::Error> {
    let found: Option<i32> =
        sqlx::query_scalar("SELECT 1 FROM cart_items WHERE cart_id = $1 AND product_id = $2")
            .bind(cart_id)
            .bind(product_id)
            .fetch_optional(pool)
            .await?;
    Ok(found.is_some())
}

pub(crate) async fn add_item(
    pool: &PgPool,
    cart_id: &str,
    product_id: &str,
    added_at: time::PrimitiveDateTime,
) -> Result<(), sqlx::Error> {
    sqlx::query("INSERT INTO cart_items (id, cart_id, product_id, added_at) VALUES ($1,$2,$3,$4)")
        .bind(Uuid::new_v4().to_string())
        .bind(cart_id)
        .bind(product_id)
        .bind(added_at)
        .execute(pool)
        .await?;
    Ok(())
}

/// Removing an item that is not present is a no-op, not an error.
pub(crate) async fn remove_item(
    pool: &PgPool,
    cart_id: &str,
    product_id: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM cart_items WHERE cart_id = $1 AND product_id = $2")
        .bind(cart_id)
        .bind(product_id)
        .execute(pool)
        .await?;
    Ok(())
}

pub(crate) async fn clear<'e>(
    executor: impl PgExecutor<'e>,
    cart_id: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM cart_items WHERE cart_id = $1").bind(cart_id).execute(executor).await?;
    Ok(())
}

pub(crate) async fn touch(
    pool: &PgPool,
    cart_id: &str,
    now: time::PrimitiveDateTime,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE carts SET updated_at = $1 WHERE id = $2")
        .bind(now)
        .bind(cart_id)
        .execute(pool)
        .await?;
    Ok(())
}

pub(crate) async fn list_items_with_products<'e>(
    executor: impl PgExecutor<'e>,
    cart_id: &str,
) -> Result<Vec<CartItemView>, sqlx::Error> {
    sqlx::query_as::<_, CartItemView>(
        "SELECT
            ci.id AS item_id,
            p.id AS product_id,
            p.title AS product_title,
            p.category AS product_category,
            p.price AS product_price,
            p.file_url AS product_file_url,
            ci.added_at
         FROM cart_items ci
         JOIN products p ON p.id = ci.product_id
         WHERE ci.cart_id = $1
         ORDER BY ci.added_at",
    )
    .bind(cart_id)
    .fetch_all(executor)
    .await
}
