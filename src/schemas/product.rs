use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::core::time::format_primitive;
use crate::db::models::Product;

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct ProductCreate {
    #[validate(length(min = 1, message = "title must not be empty"))]
    pub(crate) title: String,
    #[validate(length(min = 1, message = "description must not be empty"))]
    pub(crate) description: String,
    #[validate(length(min = 1, message = "category must not be empty"))]
    pub(crate) category: String,
    #[validate(range(min = 0.0, message = "price must be non-negative"))]
    pub(crate) price: f64,
    #[serde(default)]
    #[serde(alias = "fileUrl")]
    pub(crate) file_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ProductUpdate {
    #[serde(default)]
    pub(crate) title: Option<String>,
    #[serde(default)]
    pub(crate) description: Option<String>,
    #[serde(default)]
    pub(crate) category: Option<String>,
    #[serde(default)]
    pub(crate) price: Option<f64>,
    #[serde(default)]
    #[serde(alias = "fileUrl")]
    pub(crate) file_url: Option<String>,
    #[serde(default)]
    #[serde(alias = "isActive")]
    pub(crate) is_active: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ProductListQuery {
    #[serde(default)]
    pub(crate) category: Option<String>,
    #[serde(default)]
    pub(crate) search: Option<String>,
    #[serde(default)]
    pub(crate) skip: i64,
    #[serde(default = "crate::schemas::course::default_limit")]
    pub(crate) limit: i64,
}

#[derive(Debug, Serialize)]
pub(crate) struct ProductResponse {
    pub(crate) id: String,
    pub(crate) title: String,
    pub(crate) description: String,
    pub(crate) category: String,
    pub(crate) price: f64,
    pub(crate) file_url: Option<String>,
    pub(crate) is_active: bool,
    pub(crate) created_at: String,
}

impl ProductResponse {
    pub(crate) fn from_db(product: Product) -> Self {
        Self {
            id: product.id,
            title: product.title,
            description: product.description,
            category: product.category,
            price: product.price,
            file_url: product.file_url,
            is_active: product.is_active,
            created_at: format_primitive(product.created_at),
        }
    }
}

/// Short product shape embedded in cart and purchase payloads.
#[derive(Debug, Serialize)]
pub(crate) struct ProductSummary {
    pub(crate) id: String,
    pub(crate) title: String,
    pub(crate) category: String,
    pub(crate) price: f64,
    pub(crate) file_url: Option<String>,
}
