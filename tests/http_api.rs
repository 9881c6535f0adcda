mod common;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode, header},
};
use common::{JWT_SECRET, SHOP, create_business, create_user, memory_state, north_of};
use review_rewards_api::{
    models::{Role, User},
    routes::build_app,
    services::auth_service::issue_token,
    store::MemoryStore,
};
use serde_json::{Value, json};
use tower::ServiceExt;

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    user: Option<&User>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    if let Some(user) = user {
        let token = issue_token(JWT_SECRET, user).unwrap();
        request = request.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(body) => request
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

fn review_body(business_id: impl ToString, latitude: f64, longitude: f64) -> Value {
    json!({
        "businessId": business_id.to_string(),
        "rating": 5,
        "text": "Lovely ginger tea",
        "latitude": latitude,
        "longitude": longitude,
    })
}

#[tokio::test]
async fn review_to_redemption_over_http() {
    let store = MemoryStore::new();
    let app = build_app(memory_state(&store));
    let (owner, business) = create_business(&store).await;
    let customer = create_user(&store, Role::User).await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/coupons/template",
        Some(&owner),
        Some(json!({ "rewardType": "percentage", "percent": 15, "maxDiscountAmount": 20000 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["terms"]["percent"], 15);

    let here = north_of(SHOP, 40.0);
    let (status, body) = send(
        &app,
        Method::POST,
        "/api/reviews",
        Some(&customer),
        Some(review_body(business.id, here.latitude, here.longitude)),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["data"]["couponPending"], false);
    let coupon_id = body["data"]["coupon"]["id"].as_str().unwrap().to_string();

    let (status, body) = send(
        &app,
        Method::GET,
        &format!("/api/coupons/{coupon_id}/qr"),
        Some(&customer),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let qr_code_data = body["data"]["qrCodeData"].as_str().unwrap().to_string();

    let scan = json!({ "qrCodeData": qr_code_data });
    let (status, body) = send(
        &app,
        Method::POST,
        "/api/business-coupons/scan-redeem",
        Some(&owner),
        Some(scan.clone()),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["couponKind"], "review");
    assert_eq!(body["data"]["coupon"]["status"], "redeemed");

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/business-coupons/scan-redeem",
        Some(&owner),
        Some(scan),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["data"]["code"], "already_redeemed");

    let (status, body) = send(
        &app,
        Method::GET,
        &format!("/api/coupons/{coupon_id}"),
        Some(&customer),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["state"], "redeemed");

    let actions: Vec<String> = store
        .audit_entries()
        .unwrap()
        .into_iter()
        .map(|entry| entry.action)
        .collect();
    assert!(actions.contains(&"coupon_template_replace".to_string()));
    assert!(actions.contains(&"review_submit".to_string()));
}

#[tokio::test]
async fn review_outside_geofence_is_forbidden() {
    let store = MemoryStore::new();
    let app = build_app(memory_state(&store));
    let (_, business) = create_business(&store).await;
    let customer = create_user(&store, Role::User).await;

    let far = north_of(SHOP, 200.0);
    let (status, body) = send(
        &app,
        Method::POST,
        "/api/reviews",
        Some(&customer),
        Some(review_body(business.id, far.latitude, far.longitude)),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["data"]["code"], "out_of_geofence");
}

#[tokio::test]
async fn malformed_qr_is_a_bad_request() {
    let store = MemoryStore::new();
    let app = build_app(memory_state(&store));
    let (owner, business) = create_business(&store).await;

    for qr_code_data in [
        "not json".to_string(),
        json!({ "type": "coupon" }).to_string(),
        json!({ "type": "business", "id": business.id }).to_string(),
    ] {
        let (status, body) = send(
            &app,
            Method::POST,
            "/api/business-coupons/scan-redeem",
            Some(&owner),
            Some(json!({ "qrCodeData": qr_code_data })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{qr_code_data}");
        assert_eq!(body["data"]["code"], "invalid_qr_payload");
    }
}

#[tokio::test]
async fn customers_cannot_redeem_and_anonymous_callers_are_rejected() {
    let store = MemoryStore::new();
    let app = build_app(memory_state(&store));
    let customer = create_user(&store, Role::User).await;
    let scan = json!({ "qrCodeData": "{}" });

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/business-coupons/scan-redeem",
        None,
        Some(scan.clone()),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/business-coupons/scan-redeem",
        Some(&customer),
        Some(scan),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn promotional_code_redeems_until_the_limit() {
    let store = MemoryStore::new();
    let app = build_app(memory_state(&store));
    let (owner, _) = create_business(&store).await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/business-coupons",
        Some(&owner),
        Some(json!({
            "code": "chai-2",
            "title": "Two free chai",
            "rewardType": "free_drink",
            "item": "Masala chai",
            "usageLimit": 1,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let promo_id = body["data"]["id"].as_str().unwrap().to_string();
    let scan = json!({ "qrCodeData": json!({ "type": "coupon", "couponId": promo_id }).to_string() });

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/business-coupons/scan-redeem",
        Some(&owner),
        Some(scan.clone()),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["couponKind"], "promotional");
    assert_eq!(body["data"]["coupon"]["usageCount"], 1);

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/business-coupons/scan-redeem",
        Some(&owner),
        Some(scan),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["data"]["code"], "usage_limit_reached");

    let (status, body) = send(
        &app,
        Method::GET,
        "/api/business-coupons/events",
        Some(&owner),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["items"].as_array().unwrap().len(), 2);

    let (status, body) = send(
        &app,
        Method::GET,
        "/api/business-coupons",
        Some(&owner),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["items"][0]["usageCount"], 1);
    assert_eq!(body["data"]["items"][0]["remainingUses"], 0);
}

#[tokio::test]
async fn unknown_paths_fall_back_to_not_found() {
    let store = MemoryStore::new();
    let app = build_app(memory_state(&store));

    let (status, body) = send(&app, Method::GET, "/api/nowhere", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["data"]["path"], "/api/nowhere");
}
