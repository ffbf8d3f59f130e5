use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::api::errors::ApiError;
use crate::api::guards::CurrentStudent;
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::repositories;
use crate::services::payments;
use crate::schemas::cart::{CartItemResponse, CartResponse};
use crate::schemas::Envelope;

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(get_cart).delete(clear_cart))
        .route("/:product_id", post(add_to_cart).delete(remove_from_cart))
}

async fn load_cart_response(state: &AppState, cart_id: String) -> Result<CartResponse, ApiError> {
    let items = repositories::carts::list_items_with_products(state.db(), &cart_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list cart items"))?;

    let subtotal = payments::subtotal(items.iter().map(|item| item.product_price));

    Ok(CartResponse {
        id: cart_id,
        items: items.into_iter().map(CartItemResponse::from_view).collect(),
        subtotal,
    })
}

async fn get_cart(
    CurrentStudent(student): CurrentStudent,
    State(state): State<AppState>,
) -> Result<Json<Envelope<CartResponse>>, ApiError> {
    let cart = repositories::carts::find_or_create(state.db(), &student.id, primitive_now_utc())
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load cart"))?;

    let response = load_cart_response(&state, cart.id).await?;
    let count = response.items.len();
    Ok(Json(Envelope::ok(response).with_count(count)))
}

async fn add_to_cart(
    Path(product_id): Path<String>,
    CurrentStudent(student): CurrentStudent,
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<Envelope<CartResponse>>), ApiError> {
    let product = repositories::products::find_by_id(state.db(), &product_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch product"))?;

    let product = match product {
        Some(product) if product.is_active => product,
        _ => return Err(ApiError::NotFound("Product not found".to_string())),
    };

    let now = primitive_now_utc();
    let cart = repositories::carts::find_or_create(state.db(), &student.id, now)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load cart"))?;

    let already_there = repositories::carts::item_exists(state.db(), &cart.id, &product.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to check cart item"))?;
    if already_there {
        return Err(ApiError::Conflict("Product is already in the cart".to_string()));
    }

    repositories::carts::add_item(state.db(), &cart.id, &product.id, now)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to add cart item"))?;
    repositories::carts::touch(state.db(), &cart.id, now)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to touch cart"))?;

    let response = load_cart_response(&state, cart.id).await?;
    let count = response.items.len();
    Ok((StatusCode::CREATED, Json(Envelope::ok(response).with_count(count))))
}

async fn remove_from_cart(
    Path(product_id): Path<String>,
    CurrentStudent(student): CurrentStudent,
    State(state): State<AppState>,
) -> Result<Json<Envelope<CartResponse>>, ApiError> {
    let now = primitive_now_utc();
    let cart = repositories::carts::find_by_student(state.db(), &student.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load cart"))?
        .ok_or_else(|| ApiError::NotFound("Cart not found".to_string()))?;

    // Removing an absent product from an existing cart is a no-op, not an error.
    repositories::carts::remove_item(state.db(), &cart.id, &product_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to remove cart item"))?;
    repositories::carts::touch(state.db(), &cart.id, now)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to touch cart"))?;

    let response = load_cart_response(&state, cart.id).await?;
    let count = response.items.len();
    Ok(Json(Envelope::ok(response).with_count(count)))
}

async fn clear_cart(
    CurrentStudent(student): CurrentStudent,
    State(state): State<AppState>,
) -> Result<Json<Envelope<CartResponse>>, ApiError> {
    let now = primitive_now_utc();
    let cart = repositories::carts::find_by_student(state.db(), &student.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load cart"))?
        .ok_or_else(|| ApiError::NotFound("Cart not found".to_string()))?;

    repositories::carts::clear(state.db(), &cart.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to clear cart"))?;
    repositories::carts::touch(state.db(), &cart.id, now)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to touch cart"))?;

    let response = load_cart_response(&state, cart.id).await?;
    Ok(Json(Envelope::ok(response).with_message("Cart cleared")))
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use tower::ServiceExt;

    use crate::test_support;

    #[tokio::test]
    async fn cart_add_remove_and_subtotal() {
        let ctx = test_support::setup_test_context().await;

        let admin = test_support::insert_admin(ctx.state.db(), "root@test.local").await;
        let student =
            test_support::insert_student(ctx.state.db(), "buyer@test.local", "pass-word").await;
        let token = test_support::bearer_token(&student.id, ctx.state.settings());

        let ebook = test_support::insert_product(ctx.state.db(), &admin.id, "Ebook", 9.99).await;
        let video = test_support::insert_product(ctx.state.db(), &admin.id, "Video", 20.0).await;

        for product in [&ebook, &video] {
            let response = ctx
                .app
                .clone()
                .oneshot(test_support::json_request(
                    Method::POST,
                    &format!("/api/cart/{}", product.id),
                    Some(&token),
                    None,
                ))
                .await
                .expect("add to cart");
            assert_eq!(response.status(), StatusCode::CREATED);
        }

        let response = ctx
            .app
            .clone()
            .oneshot(test_support::json_request(Method::GET, "/api/cart", Some(&token), None))
            .await
            .expect("get cart");
        let body = test_support::read_json(response).await;
        assert_eq!(body["count"], 2);
        assert!((body["data"]["subtotal"].as_f64().expect("subtotal") - 29.99).abs() < 1e-9);

        let response = ctx
            .app
            .clone()
            .oneshot(test_support::json_request(
                Method::DELETE,
                &format!("/api/cart/{}", ebook.id),
                Some(&token),
                None,
            ))
            .await
            .expect("remove from cart");
        let body = test_support::read_json(response).await;
        assert_eq!(body["count"], 1);

        // Removing again is still 200.
        let response = ctx
            .app
            .oneshot(test_support::json_request(
                Method::DELETE,
                &format!("/api/cart/{}", ebook.id),
                Some(&token),
                None,
            ))
            .await
            .expect("remove absent item");
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn remove_and_clear_require_an_existing_cart() {
        let ctx = test_support::setup_test_context().await;

        let admin = test_support::insert_admin(ctx.state.db(), "root@test.local").await;
        let student =
            test_support::insert_student(ctx.state.db(), "buyer@test.local", "pass-word").await;
        let token = test_support::bearer_token(&student.id, ctx.state.settings());
        let product = test_support::insert_product(ctx.state.db(), &admin.id, "Ebook", 9.99).await;

        // The student has never touched their cart, so there is none to
        // remove from or clear.
        let response = ctx
            .app
            .clone()
            .oneshot(test_support::json_request(
                Method::DELETE,
                &format!("/api/cart/{}", product.id),
                Some(&token),
                None,
            ))
            .await
            .expect("remove without cart");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = ctx
            .app
            .oneshot(test_support::json_request(Method::DELETE, "/api/cart", Some(&token), None))
            .await
            .expect("clear without cart");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn duplicate_add_is_conflict_and_unknown_product_is_not_found() {
        let ctx = test_support::setup_test_context().await;

        let admin = test_support::insert_admin(ctx.state.db(), "root@test.local").await;
        let student =
            test_support::insert_student(ctx.state.db(), "buyer@test.local", "pass-word").await;
        let token = test_support::bearer_token(&student.id, ctx.state.settings());
        let product = test_support::insert_product(ctx.state.db(), &admin.id, "Ebook", 9.99).await;

        let request = |path: String| {
            test_support::json_request(Method::POST, &path, Some(&token), None)
        };

        let response =
            ctx.app.clone().oneshot(request(format!("/api/cart/{}", product.id))).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let response =
            ctx.app.clone().oneshot(request(format!("/api/cart/{}", product.id))).await.unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let response =
            ctx.app.oneshot(request("/api/cart/no-such-product".to_string())).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
