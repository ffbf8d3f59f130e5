use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

use crate::db::models::Purchase;
use crate::db::types::PaymentStatus;

const COLUMNS: &str =
    "id, student_id, total_amount, card_masked, name_on_card, payment_status, created_at";

pub(crate) struct CreatePurchase<'a> {
    pub(crate) id: &'a str,
    pub(crate) student_id: &'a str,
    pub(crate) total_amount: f64,
    pub(crate) card_masked: &'a str,
    pub(crate) name_on_card: &'a str,
    pub(crate) payment_status: PaymentStatus,
    pub(crate) created_at: time::PrimitiveDateTime,
}

/// Flattened purchase item with product populated, ordered newest purchase
/// first.
#[derive(Debug, Clone, sqlx::FromRow)]
pub(crate) struct PurchasedProductView {
    pub(crate) purchase_id: String,
    pub(crate) product_id: String,
    pub(crate) product_title: String,
    pub(crate) product_category: String,
    pub(crate) product_price: f64,
    pub(crate) product_file_url: Option<String>,
    pub(crate) purchased_at: time::PrimitiveDateTime,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub(crate) struct PurchaseWithStudentView {
    pub(crate) id: String,
    pub(crate) student_id: String,
    pub(crate) student_email: String,
    pub(crate) student_name: String,
    pub(crate) total_amount: f64,
    pub(crate) card_masked: String,
    pub(crate) payment_status: PaymentStatus,
    pub(crate) created_at: time::PrimitiveDateTime,
}

pub(crate) async fn create<'e>(
    executor: impl PgExecutor<'e>,
    params: CreatePurchase<'_>,
) -> Result<Purchase, sqlx::Error> {
    sqlx::query_as::<_, Purchase>(&format!(
        "INSERT INTO purchases (
            id, student_id, total_amount, card_masked, name_on_card, payment_status, created_at
         ) VALUES ($1,$2,$3,$4,$5,$6,$7)
         RETURNING {COLUMNS}",
    ))
    .bind(params.id)
    .bind(params.student_id)
    .bind(params.total_amount)
    .bind(params.card_masked)
    .bind(params.name_on_card)
    .bind(params.payment_status)
    .bind(params.created_at)
    .fetch_one(executor)
    .await
}

pub(crate) async fn add_item<'e>(
    executor: impl PgExecutor<'e>,
    purchase_id: &str,
    product_id: &str,
    purchased_at: time::PrimitiveDateTime,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO purchase_items (id, purchase_id, product_id, purchased_at)
         VALUES ($1,$2,$3,$4)",
    )
    .bind(Uuid::new_v4().to_string())
    .bind(purchase_id)
    .bind(product_id)
    .bind(purchased_at)
    .execute(executor)
    .await?;
    Ok(())
}

pub(crate) async fn list_items_with_products(
    pool: &PgPool,
    purchase_id: &str,
) -> Result<Vec<PurchasedProductView>, sqlx::Error> {
    sqlx::query_as::<_, PurchasedProductView>(
        "SELECT
            pi.purchase_id,
            p.id AS product_id,
            p.title AS product_title,
            p.category AS product_category,
            p.price AS product_price,
            p.file_url AS product_file_url,
            pi.purchased_at
         FROM purchase_items pi
         JOIN products p ON p.id = pi.product_id
         WHERE pi.purchase_id = $1
         ORDER BY pi.purchased_at",
    )
    .bind(purchase_id)
    .fetch_all(pool)
    .await
}

/// Every product the student ever bought, across all purchase records,
/// newest purchase first.
pub(crate) async fn list_purchased_products(
    pool: &PgPool,
    student_id: &str,
) -> Result<Vec<PurchasedProductView>, sqlx::Error> {
    sqlx::query_as::<_, PurchasedProductView>(
        "SELECT
            pi.purchase_id,
            p.id AS product_id,
            p.title AS product_title,
            p.category AS product_category,
            p.price AS product_price,
            p.file_url AS product_file_url,
            pi.purchased_at
         FROM purchase_items pi
         JOIN purchases pu ON pu.id = pi.purchase_id
         JOIN products p ON p.id = pi.product_id
         WHERE pu.student_id = $1
         ORDER BY pu.created_at DESC, pi.purchased_at",
    )
    .bind(student_id)
    .fetch_all(pool)
    .await
}

pub(crate) async fn list_all_with_students(
    pool: &PgPool,
) -> Result<Vec<PurchaseWithStudentView>, sqlx::Error> {
    sqlx::query_as::<_, PurchaseWithStudentView>(
        "SELECT
            pu.id,
            s.id AS student_id,
            s.email AS student_email,
            s.full_name AS student_name,
            pu.total_amount,
            pu.card_masked,
            pu.payment_status,
            pu.created_at
         FROM purchases pu
         JOIN students s ON s.id = pu.student_id
         ORDER BY pu.created_at DESC",
    )
    .fetch_all(pool)
    .await
}

pub(crate) async fn list_items_for_purchases(
    pool: &PgPool,
    purchase_ids: &[String],
) -> Result<Vec<PurchasedProductView>, sqlx::Error> {
    sqlx::query_as::<_, PurchasedProductView>(
        "SELECT
            pi.purchase_id,
            p.id AS product_id,
            p.title AS product_title,
            p.category AS product_category,
            p.price AS product_price,
            p.file_url AS product_file_url,
            pi.purchased_at
         FROM purchase_items pi
         JOIN products p ON p.id = pi.product_id
         WHERE pi.purchase_id = ANY($1)
         ORDER BY pi.purchased_at",
    )
    .bind(purchase_ids)
    .fetch_all(pool)
    .await
}
