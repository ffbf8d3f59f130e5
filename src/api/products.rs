use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;

use crate::api::errors::ApiError;
use crate::api::guards::CurrentAdmin;
use crate::api::validation::validate_payload;
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::db::models::Product;
use crate::repositories;
use crate::schemas::product::{ProductCreate, ProductListQuery, ProductResponse, ProductUpdate};
use crate::schemas::Envelope;

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_products).post(create_product))
        .route(
            "/:product_id",
            get(get_product).patch(update_product).delete(delete_product),
        )
}

async fn list_products(
    Query(params): Query<ProductListQuery>,
    State(state): State<AppState>,
) -> Result<Json<Envelope<Vec<ProductResponse>>>, ApiError> {
    let mut builder = QueryBuilder::<Postgres>::new(
        "SELECT id, title, description, category, price, file_url, is_active, created_by,
                created_at, updated_at
         FROM products WHERE is_active = TRUE",
    );

    if let Some(category) = params.category.as_ref() {
        builder.push(" AND category = ");
        builder.push_bind(category);
    }
    if let Some(search) = params.search.as_ref() {
        let pattern = format!("%{search}%");
        builder.push(" AND (title ILIKE ");
        builder.push_bind(pattern.clone());
        builder.push(" OR description ILIKE ");
        builder.push_bind(pattern);
        builder.push(")");
    }

    builder.push(" ORDER BY created_at DESC");
    builder.push(" OFFSET ");
    builder.push_bind(params.skip.max(0));
    builder.push(" LIMIT ");
    builder.push_bind(params.limit.clamp(1, 1000));

    let products = builder
        .build_query_as::<Product>()
        .fetch_all(state.db())
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list products"))?;

    let responses: Vec<ProductResponse> =
        products.into_iter().map(ProductResponse::from_db).collect();
    let count = responses.len();
    Ok(Json(Envelope::ok(responses).with_count(count)))
}

async fn get_product(
    Path(product_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<Envelope<ProductResponse>>, ApiError> {
    let product = repositories::products::find_by_id(state.db(), &product_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch product"))?;

    // Deactivated products are invisible on the public surface.
    let product = match product {
        Some(product) if product.is_active => product,
        _ => return Err(ApiError::NotFound("Product not found".to_string())),
    };

    Ok(Json(Envelope::ok(ProductResponse::from_db(product))))
}

async fn create_product(
    CurrentAdmin(admin): CurrentAdmin,
    State(state): State<AppState>,
    Json(payload): Json<ProductCreate>,
) -> Result<(StatusCode, Json<Envelope<ProductResponse>>), ApiError> {
    validate_payload(&payload)?;

    let now = primitive_now_utc();
    let product = repositories::products::create(
        state.db(),
        repositories::products::CreateProduct {
            id: &Uuid::new_v4().to_string(),
            title: &payload.title,
            description: &payload.description,
            category: &payload.category,
            price: payload.price,
            file_url: payload.file_url.as_deref(),
            is_active: true,
            created_by: &admin.id,
            created_at: now,
            updated_at: now,
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to create product"))?;

    tracing::info!(admin_id = %admin.id, product_id = %product.id, action = "product_create", "Product created");

    Ok((StatusCode::CREATED, Json(Envelope::ok(ProductResponse::from_db(product)))))
}

async fn update_product(
    Path(product_id): Path<String>,
    CurrentAdmin(_admin): CurrentAdmin,
    State(state): State<AppState>,
    Json(payload): Json<ProductUpdate>,
) -> Result<Json<Envelope<ProductResponse>>, ApiError> {
    repositories::products::find_by_id(state.db(), &product_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch product"))?
        .ok_or_else(|| ApiError::NotFound("Product not found".to_string()))?;

    if let Some(price) = payload.price {
        if price < 0.0 {
            return Err(ApiError::BadRequest("price must be non-negative".to_string()));
        }
    }

    repositories::products::update(
        state.db(),
        &product_id,
        repositories::products::UpdateProduct {
            title: payload.title,
            description: payload.description,
            category: payload.category,
            price: payload.price,
            file_url: payload.file_url,
            is_active: payload.is_active,
            updated_at: primitive_now_utc(),
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to update product"))?;

    let updated = repositories::products::fetch_one_by_id(state.db(), &product_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch updated product"))?;

    Ok(Json(Envelope::ok(ProductResponse::from_db(updated))))
}

async fn delete_product(
    Path(product_id): Path<String>,
    CurrentAdmin(admin): CurrentAdmin,
    State(state): State<AppState>,
) -> Result<Json<Envelope<()>>, ApiError> {
    let deleted = repositories::products::delete(state.db(), &product_id).await.map_err(|e| {
        ApiError::conflict_on_fk(
            e,
            "Product appears in carts or purchases and cannot be deleted",
            "Failed to delete product",
        )
    })?;

    if !deleted {
        return Err(ApiError::NotFound("Product not found".to_string()));
    }

    tracing::info!(admin_id = %admin.id, product_id = %product_id, action = "product_delete", "Product deleted");

    Ok(Json(Envelope::ok(()).with_message("Product deleted")))
}
