use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use uuid::Uuid;

use crate::api::errors::ApiError;
use crate::api::guards::{CurrentAdmin, CurrentStudent};
use crate::api::validation::validate_payload;
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::repositories;
use crate::schemas::purchase::{
    AdminPurchaseResponse, CheckoutRequest, PurchaseResponse, PurchasedProductResponse,
};
use crate::schemas::Envelope;
use crate::services::payments;

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(checkout).get(list_my_purchases))
        .route("/all", get(list_all_purchases))
}

async fn checkout(
    CurrentStudent(student): CurrentStudent,
    State(state): State<AppState>,
    Json(payload): Json<CheckoutRequest>,
) -> Result<(StatusCode, Json<Envelope<PurchaseResponse>>), ApiError> {
    validate_payload(&payload)?;

    let now = primitive_now_utc();
    let cart = repositories::carts::find_or_create(state.db(), &student.id, now)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load cart"))?;

    let items = repositories::carts::list_items_with_products(state.db(), &cart.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list cart items"))?;

    if items.is_empty() {
        return Err(ApiError::BadRequest("Cart is empty".to_string()));
    }

    let payment = payments::PaymentRecord::simulated(payments::subtotal(
        items.iter().map(|item| item.product_price),
    ));
    let card_masked = payments::mask_card_number(&payload.card_number);

    let purchase_id = Uuid::new_v4().to_string();

    // Purchase row, item rows and the cart wipe land atomically; a failed
    // checkout leaves the cart untouched.
    let mut tx = state
        .db()
        .begin()
        .await
        .map_err(|e| ApiError::internal(e, "Failed to begin checkout transaction"))?;

    let purchase = repositories::purchases::create(
        &mut *tx,
        repositories::purchases::CreatePurchase {
            id: &purchase_id,
            student_id: &student.id,
            total_amount: payment.amount,
            card_masked: &card_masked,
            name_on_card: &payload.name_on_card,
            payment_status: payment.status,
            created_at: now,
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to create purchase"))?;

    for item in &items {
        repositories::purchases::add_item(&mut *tx, &purchase_id, &item.product_id, now)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to record purchase item"))?;
    }

    repositories::carts::clear(&mut *tx, &cart.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to clear cart"))?;

    tx.commit().await.map_err(|e| ApiError::internal(e, "Failed to commit checkout"))?;

    metrics::counter!("checkouts_total").increment(1);
    tracing::info!(student_id = %student.id, purchase_id = %purchase.id, total = purchase.total_amount, action = "checkout", "Checkout completed");

    let purchased = repositories::purchases::list_items_with_products(state.db(), &purchase.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list purchase items"))?;

    Ok((
        StatusCode::CREATED,
        Json(Envelope::ok(PurchaseResponse::from_db(purchase, purchased)).with_message("Purchase completed")),
    ))
}

/// Flattened history: every product the student ever bought, newest purchase
/// first.
async fn list_my_purchases(
    CurrentStudent(student): CurrentStudent,
    State(state): State<AppState>,
) -> Result<Json<Envelope<Vec<PurchasedProductResponse>>>, ApiError> {
    let purchased = repositories::purchases::list_purchased_products(state.db(), &student.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list purchased products"))?;

    let responses: Vec<PurchasedProductResponse> =
        purchased.into_iter().map(PurchasedProductResponse::from_view).collect();
    let count = responses.len();
    Ok(Json(Envelope::ok(responses).with_count(count)))
}

async fn list_all_purchases(
    CurrentAdmin(_admin): CurrentAdmin,
    State(state): State<AppState>,
) -> Result<Json<Envelope<Vec<AdminPurchaseResponse>>>, ApiError> {
    let purchases = repositories::purchases::list_all_with_students(state.db())
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list purchases"))?;

    let purchase_ids: Vec<String> = purchases.iter().map(|purchase| purchase.id.clone()).collect();
    let mut items_by_purchase: std::collections::HashMap<String, Vec<PurchasedProductResponse>> =
        std::collections::HashMap::new();

    if !purchase_ids.is_empty() {
        let items = repositories::purchases::list_items_for_purchases(state.db(), &purchase_ids)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to list purchase items"))?;
        for item in items {
            items_by_purchase
                .entry(item.purchase_id.clone())
                .or_default()
                .push(PurchasedProductResponse::from_view(item));
        }
    }

    let responses: Vec<AdminPurchaseResponse> = purchases
        .into_iter()
        .map(|purchase| {
            let items = items_by_purchase.remove(&purchase.id).unwrap_or_default();
            AdminPurchaseResponse::from_view(purchase, items)
        })
        .collect();
    let count = responses.len();
    Ok(Json(Envelope::ok(responses).with_count(count)))
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use serde_json::json;
    use tower::ServiceExt;

    use crate::test_support;

    fn checkout_payload() -> serde_json::Value {
        json!({
            "card_number": "4242424242424242",
            "name_on_card": "Ada Lovelace",
            "expiry_date": "12/29",
            "cvv": "123"
        })
    }

    #[tokio::test]
    async fn checkout_masks_card_and_empties_cart() {
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
            .oneshot(test_support::json_request(
                Method::POST,
                "/api/purchases",
                Some(&token),
                Some(checkout_payload()),
            ))
            .await
            .expect("checkout");

        let status = response.status();
        let body = test_support::read_json(response).await;
        assert_eq!(status, StatusCode::CREATED, "response: {body}");
        assert_eq!(body["data"]["card_masked"], "****4242");
        assert_eq!(body["data"]["payment_status"], "completed");
        assert!((body["data"]["total_amount"].as_f64().expect("total") - 29.99).abs() < 1e-9);
        assert_eq!(body["data"]["items"].as_array().expect("items").len(), 2);

        let response = ctx
            .app
            .clone()
            .oneshot(test_support::json_request(Method::GET, "/api/cart", Some(&token), None))
            .await
            .expect("get cart");
        let cart = test_support::read_json(response).await;
        assert_eq!(cart["count"], 0);

        let response = ctx
            .app
            .oneshot(test_support::json_request(Method::GET, "/api/purchases", Some(&token), None))
            .await
            .expect("list purchases");
        let history = test_support::read_json(response).await;
        assert_eq!(history["count"], 2);
    }

    #[tokio::test]
    async fn history_spans_checkouts_newest_first() {
        let ctx = test_support::setup_test_context().await;

        let admin = test_support::insert_admin(ctx.state.db(), "root@test.local").await;
        let student =
            test_support::insert_student(ctx.state.db(), "buyer@test.local", "pass-word").await;
        let token = test_support::bearer_token(&student.id, ctx.state.settings());

        let first_batch = [
            test_support::insert_product(ctx.state.db(), &admin.id, "Ebook", 9.99).await,
            test_support::insert_product(ctx.state.db(), &admin.id, "Video", 20.0).await,
        ];
        let second_batch = [
            test_support::insert_product(ctx.state.db(), &admin.id, "Audio", 5.0).await,
            test_support::insert_product(ctx.state.db(), &admin.id, "Slides", 3.0).await,
        ];

        let mut purchase_ids = Vec::new();
        for batch in [&first_batch, &second_batch] {
            for product in batch {
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
                .oneshot(test_support::json_request(
                    Method::POST,
                    "/api/purchases",
                    Some(&token),
                    Some(checkout_payload()),
                ))
                .await
                .expect("checkout");
            let status = response.status();
            let body = test_support::read_json(response).await;
            assert_eq!(status, StatusCode::CREATED, "response: {body}");
            purchase_ids.push(body["data"]["id"].as_str().expect("purchase id").to_string());
        }

        let response = ctx
            .app
            .oneshot(test_support::json_request(Method::GET, "/api/purchases", Some(&token), None))
            .await
            .expect("list purchases");
        let body = test_support::read_json(response).await;
        assert_eq!(body["count"], 4);

        let entries = body["data"].as_array().expect("entries");
        for entry in &entries[..2] {
            assert_eq!(entry["purchase_id"], purchase_ids[1].as_str());
        }
        for entry in &entries[2..] {
            assert_eq!(entry["purchase_id"], purchase_ids[0].as_str());
        }

        fn titles(slice: &[serde_json::Value]) -> Vec<&str> {
            let mut titles: Vec<&str> = slice
                .iter()
                .map(|entry| entry["product"]["title"].as_str().expect("title"))
                .collect();
            titles.sort_unstable();
            titles
        }
        assert_eq!(titles(&entries[..2]), vec!["Audio", "Slides"]);
        assert_eq!(titles(&entries[2..]), vec!["Ebook", "Video"]);
    }

    #[tokio::test]
    async fn checkout_with_empty_cart_is_rejected() {
        let ctx = test_support::setup_test_context().await;

        let student =
            test_support::insert_student(ctx.state.db(), "buyer@test.local", "pass-word").await;
        let token = test_support::bearer_token(&student.id, ctx.state.settings());

        let response = ctx
            .app
            .oneshot(test_support::json_request(
                Method::POST,
                "/api/purchases",
                Some(&token),
                Some(checkout_payload()),
            ))
            .await
            .expect("checkout");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn admin_sees_all_purchases_with_students() {
        let ctx = test_support::setup_test_context().await;

        let admin = test_support::insert_admin(ctx.state.db(), "root@test.local").await;
        let admin_token = test_support::bearer_token(&admin.id, ctx.state.settings());
        let student =
            test_support::insert_student(ctx.state.db(), "buyer@test.local", "pass-word").await;
        let token = test_support::bearer_token(&student.id, ctx.state.settings());
        let product = test_support::insert_product(ctx.state.db(), &admin.id, "Ebook", 9.99).await;

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

        let response = ctx
            .app
            .clone()
            .oneshot(test_support::json_request(
                Method::POST,
                "/api/purchases",
                Some(&token),
                Some(checkout_payload()),
            ))
            .await
            .expect("checkout");
        assert_eq!(response.status(), StatusCode::CREATED);

        let response = ctx
            .app
            .clone()
            .oneshot(test_support::json_request(
                Method::GET,
                "/api/purchases/all",
                Some(&admin_token),
                None,
            ))
            .await
            .expect("admin list");
        let body = test_support::read_json(response).await;
        assert_eq!(body["count"], 1);
        assert_eq!(body["data"][0]["student_email"], "buyer@test.local");
        assert_eq!(body["data"][0]["items"].as_array().expect("items").len(), 1);

        let response = ctx
            .app
            .oneshot(test_support::json_request(
                Method::GET,
                "/api/purchases/all",
                Some(&token),
                None,
            ))
            .await
            .expect("student hits admin list");
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }
}
