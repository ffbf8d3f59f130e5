use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::core::time::format_primitive;
use crate::db::models::Purchase;
use crate::db::types::PaymentStatus;
use crate::repositories::purchases::{PurchaseWithStudentView, PurchasedProductView};
use crate::schemas::product::ProductSummary;

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct CheckoutRequest {
    #[serde(alias = "cardNumber")]
    #[validate(length(min = 12, max = 19, message = "card_number must be 12 to 19 characters"))]
    pub(crate) card_number: String,
    #[serde(alias = "nameOnCard")]
    #[validate(length(min = 1, message = "name_on_card must not be empty"))]
    pub(crate) name_on_card: String,
    #[serde(alias = "expiryDate")]
    #[validate(length(min = 1, message = "expiry_date must not be empty"))]
    pub(crate) expiry_date: String,
    #[validate(length(min = 3, max = 4, message = "cvv must be 3 or 4 digits"))]
    pub(crate) cvv: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct PurchaseResponse {
    pub(crate) id: String,
    pub(crate) total_amount: f64,
    pub(crate) card_masked: String,
    pub(crate) payment_status: PaymentStatus,
    pub(crate) items: Vec<PurchasedProductResponse>,
    pub(crate) created_at: String,
}

impl PurchaseResponse {
    pub(crate) fn from_db(purchase: Purchase, items: Vec<PurchasedProductView>) -> Self {
        Self {
            id: purchase.id,
            total_amount: purchase.total_amount,
            card_masked: purchase.card_masked,
            payment_status: purchase.payment_status,
            items: items.into_iter().map(PurchasedProductResponse::from_view).collect(),
            created_at: format_primitive(purchase.created_at),
        }
    }
}

/// One bought product in the student's flattened purchase history.
#[derive(Debug, Serialize)]
pub(crate) struct PurchasedProductResponse {
    pub(crate) purchase_id: String,
    pub(crate) product: ProductSummary,
    pub(crate) purchased_at: String,
}

impl PurchasedProductResponse {
    pub(crate) fn from_view(view: PurchasedProductView) -> Self {
        Self {
            purchase_id: view.purchase_id,
            product: ProductSummary {
                id: view.product_id,
                title: view.product_title,
                category: view.product_category,
                price: view.product_price,
                file_url: view.product_file_url,
            },
            purchased_at: format_primitive(view.purchased_at),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct AdminPurchaseResponse {
    pub(crate) id: String,
    pub(crate) student_id: String,
    pub(crate) student_email: String,
    pub(crate) student_name: String,
    pub(crate) total_amount: f64,
    pub(crate) card_masked: String,
    pub(crate) payment_status: PaymentStatus,
    pub(crate) items: Vec<PurchasedProductResponse>,
    pub(crate) created_at: String,
}

impl AdminPurchaseResponse {
    pub(crate) fn from_view(
        view: PurchaseWithStudentView,
        items: Vec<PurchasedProductResponse>,
    ) -> Self {
        Self {
            id: view.id,
            student_id: view.student_id,
            student_email: view.student_email,
            student_name: view.student_name,
            total_amount: view.total_amount,
            card_masked: view.card_masked,
            payment_status: view.payment_status,
            items,
            created_at: format_primitive(view.created_at),
        }
    }
}
