use serde::Serialize;

use crate::core::time::format_primitive;
use crate::repositories::carts::CartItemView;
use crate::schemas::product::ProductSummary;

#[derive(Debug, Serialize)]
pub(crate) struct CartItemResponse {
    pub(crate) id: String,
    pub(crate) product: ProductSummary,
    pub(crate) added_at: String,
}

impl CartItemResponse {
    pub(crate) fn from_view(view: CartItemView) -> Self {
        Self {
            id: view.item_id,
            product: ProductSummary {
                id: view.product_id,
                title: view.product_title,
                category: view.product_category,
                price: view.product_price,
                file_url: view.product_file_url,
            },
            added_at: format_primitive(view.added_at),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct CartResponse {
    pub(crate) id: String,
    pub(crate) items: Vec<CartItemResponse>,
    pub(crate) subtotal: f64,
}
