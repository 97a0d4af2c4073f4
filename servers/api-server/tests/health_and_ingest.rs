//! Integration tests driving the router directly with
//! `tower::ServiceExt::oneshot`, against a real database when one is
//! configured. Skips (rather than fails) otherwise, matching the
//! convention used across the workspace's repository tests.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::CoreConfig;
use core_engine::Engine;
use db::{create_pool, run_migrations, DbPool};
use tower::ServiceExt;

async fn test_pool() -> Option<DbPool> {
    let url = std::env::var("TEST_DATABASE_URL").ok()?;
    let pool = create_pool(&url).await.expect("connect to test database");
    run_migrations(&pool).await.expect("run migrations");
    Some(pool)
}

fn router_for(pool: DbPool) -> axum::Router {
    let engine = Engine::new(pool, CoreConfig::default());
    let state = api_server::state::AppState::new(engine);
    api_server::create_router(state)
}

#[tokio::test]
async fn health_reports_ok_with_reachable_database() {
    let Some(pool) = test_pool().await else {
        eprintln!("skipping: TEST_DATABASE_URL not set");
        return;
    };
    let app = router_for(pool);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn ingest_listing_rejects_malformed_body() {
    let Some(pool) = test_pool().await else {
        eprintln!("skipping: TEST_DATABASE_URL not set");
        return;
    };
    let app = router_for(pool);

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/ingest/listing")
                .header("content-type", "application/json")
                .body(Body::from("{}"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn ingest_listing_creates_building_and_property() {
    let Some(pool) = test_pool().await else {
        eprintln!("skipping: TEST_DATABASE_URL not set");
        return;
    };
    let app = router_for(pool);

    let payload = serde_json::json!({
        "source_site": "example-portal",
        "site_property_id": "P-1",
        "url": "https://example.test/listing/1",
        "listing_building_name": "Riverside Tower",
        "listing_address": "1 River Road",
        "listing_total_floors": 20,
        "listing_basement_floors": 1,
        "listing_built_year": 2010,
        "listing_built_month": 6,
        "listing_total_units": 120,
        "floor_number": 5,
        "area_m2": "84.5",
        "layout": "3LDK",
        "direction": "south",
        "room_number": "501",
        "balcony_area_m2": "8.0",
        "current_price": 45_000_000,
        "management_fee": 15_000,
        "repair_fund": 8_000,
        "is_resale": true,
        "transaction_type": "sale",
        "published_at": "2026-01-01T00:00:00Z",
        "first_published_at": "2026-01-01T00:00:00Z",
        "observed_at": "2026-01-02T00:00:00Z",
    });

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/ingest/listing")
                .header("content-type", "application/json")
                .body(Body::from(payload.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}
