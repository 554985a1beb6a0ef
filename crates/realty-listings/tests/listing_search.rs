//! End-to-end tests for `ListingSearch` against a wiremock Bright Data API.

use std::time::Duration;

use realty_core::builtin_fallback_listings;
use realty_listings::{
    BrightDataClient, ListingSearch, PollBudget, RequestTimeouts, SearchOutcome, SearchQuery,
};
use serde_json::json;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const JOB_ID: &str = "s_test";

fn fast_budget() -> PollBudget {
    PollBudget {
        max_wait: Duration::from_millis(15_000),
        poll_interval: Duration::from_millis(10),
        max_attempts: 10,
    }
}

fn live_search(server: &MockServer, budget: PollBudget) -> ListingSearch {
    let client = BrightDataClient::with_base_url("test-key", &server.uri(), RequestTimeouts::default())
        .expect("client construction should not fail");
    ListingSearch::new(
        Some(client),
        builtin_fallback_listings().expect("builtin dataset"),
        budget,
        3,
    )
}

fn price_query(min_price: u64, max_price: u64) -> SearchQuery {
    SearchQuery {
        min_price,
        max_price,
        ..SearchQuery::default()
    }
}

async fn mount_trigger(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/datasets/v3/trigger"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "snapshot_id": JOB_ID })))
        .mount(server)
        .await;
}

async fn mount_progress(server: &MockServer, status: &str) {
    Mock::given(method("GET"))
        .and(path(format!("/datasets/v3/progress/{JOB_ID}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": status })))
        .mount(server)
        .await;
}

async fn mount_snapshot(server: &MockServer, body: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path(format!("/datasets/v3/snapshot/{JOB_ID}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

fn eight_records() -> serde_json::Value {
    let prices = [
        750_000, 1_250_000, 2_100_000, 895_000, 3_500_000, 1_100_000, 4_200_000, 950_000,
    ];
    let records: Vec<serde_json::Value> = prices
        .iter()
        .enumerate()
        .map(|(i, price)| {
            json!({
                "zpid": format!("z{i}"),
                "address": format!("{i} Ocean Dr"),
                "city": "Miami Beach",
                "state": "FL",
                "zipcode": "33139",
                "price": price,
                "bedrooms": 3,
                "bathrooms": 2
            })
        })
        .collect();
    json!({ "data": records })
}

#[tokio::test]
async fn completed_job_returns_lowest_index_matches() {
    let server = MockServer::start().await;
    mount_trigger(&server).await;
    mount_progress(&server, "ready").await;
    mount_snapshot(&server, eight_records()).await;

    let report = live_search(&server, fast_budget())
        .run(&price_query(1, 1_000_000))
        .await;

    assert_eq!(report.outcome, SearchOutcome::Found);
    assert!(!report.used_fallback);
    assert_eq!(report.total_matched, 3);
    let ids: Vec<&str> = report.records.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, ["z0", "z3", "z7"]);
}

#[tokio::test]
async fn total_matched_reports_full_count_before_limit() {
    let server = MockServer::start().await;
    mount_trigger(&server).await;
    mount_progress(&server, "done").await;
    mount_snapshot(&server, eight_records()).await;

    let report = live_search(&server, fast_budget())
        .run(&price_query(1, 5_000_000))
        .await;

    assert_eq!(report.records.len(), 3);
    assert_eq!(report.total_matched, 8);
}

#[tokio::test]
async fn empty_result_array_is_no_data_not_fallback() {
    let server = MockServer::start().await;
    mount_trigger(&server).await;
    mount_progress(&server, "ready").await;
    mount_snapshot(&server, json!([])).await;

    let report = live_search(&server, fast_budget())
        .run(&SearchQuery::default())
        .await;

    assert_eq!(report.outcome, SearchOutcome::NoData);
    assert!(!report.used_fallback);
    assert!(report.records.is_empty());
    assert_eq!(report.total_matched, 0);
}

#[tokio::test]
async fn records_outside_range_are_no_matches() {
    let server = MockServer::start().await;
    mount_trigger(&server).await;
    mount_progress(&server, "ready").await;
    mount_snapshot(&server, eight_records()).await;

    let report = live_search(&server, fast_budget())
        .run(&price_query(5_000_000, 9_000_000))
        .await;

    assert_eq!(report.outcome, SearchOutcome::NoMatchesInRange);
    assert!(!report.used_fallback);
}

#[tokio::test]
async fn never_terminal_job_polls_max_attempts_then_falls_back() {
    let server = MockServer::start().await;
    mount_trigger(&server).await;

    Mock::given(method("GET"))
        .and(path(format!("/datasets/v3/progress/{JOB_ID}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "running" })))
        .expect(10)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/datasets/v3/snapshot/{JOB_ID}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(eight_records()))
        .expect(0)
        .mount(&server)
        .await;

    let report = live_search(&server, fast_budget())
        .run(&SearchQuery::default())
        .await;

    assert!(report.used_fallback);
    assert_eq!(report.outcome, SearchOutcome::Found);
    let fallback = builtin_fallback_listings().unwrap();
    assert_eq!(report.records, fallback);
    server.verify().await;
}

#[tokio::test]
async fn failed_job_falls_back() {
    let server = MockServer::start().await;
    mount_trigger(&server).await;
    mount_progress(&server, "failed").await;

    let report = live_search(&server, fast_budget())
        .run(&SearchQuery::default())
        .await;

    assert!(report.used_fallback);
    assert_eq!(report.records.len(), 3);
}

#[tokio::test]
async fn trigger_failure_falls_back_without_polling() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/datasets/v3/trigger"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid token"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let report = live_search(&server, fast_budget())
        .run(&SearchQuery::default())
        .await;

    assert!(report.used_fallback);
    assert_eq!(report.outcome, SearchOutcome::Found);
    server.verify().await;
}

#[tokio::test]
async fn unrecognized_payload_falls_back() {
    let server = MockServer::start().await;
    mount_trigger(&server).await;
    mount_progress(&server, "ready").await;
    mount_snapshot(&server, json!({ "listings": [{ "zpid": "1" }] })).await;

    let report = live_search(&server, fast_budget())
        .run(&SearchQuery::default())
        .await;

    assert!(report.used_fallback);
}

#[tokio::test]
async fn pending_404_then_ready_uses_remote_data() {
    let server = MockServer::start().await;
    mount_trigger(&server).await;

    Mock::given(method("GET"))
        .and(path(format!("/datasets/v3/progress/{JOB_ID}")))
        .respond_with(ResponseTemplate::new(404))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    mount_progress(&server, "ready").await;
    mount_snapshot(&server, eight_records()).await;

    let report = live_search(&server, fast_budget())
        .run(&price_query(1, 1_000_000))
        .await;

    assert!(!report.used_fallback);
    assert_eq!(report.records.len(), 3);
}

#[tokio::test]
async fn direct_property_url_is_submitted_as_is() {
    let server = MockServer::start().await;
    let property_url = "https://www.zillow.com/homedetails/1200-Brickell-Bay-Dr/43215_zpid/";

    Mock::given(method("POST"))
        .and(path("/datasets/v3/trigger"))
        .and(body_json(json!([{ "url": property_url }])))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "snapshot_id": JOB_ID })))
        .expect(1)
        .mount(&server)
        .await;
    mount_progress(&server, "ready").await;
    mount_snapshot(&server, json!([{ "zpid": "43215", "price": 895_000 }])).await;

    let query = SearchQuery {
        property_url: Some(property_url.to_string()),
        ..SearchQuery::default()
    };
    let report = live_search(&server, fast_budget()).run(&query).await;

    assert_eq!(report.records.len(), 1);
    assert_eq!(report.records[0].id, "43215");
    server.verify().await;
}

#[tokio::test]
async fn constructed_search_url_is_submitted_by_default() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/datasets/v3/trigger"))
        .and(body_json(json!([{
            "url": "https://www.zillow.com/homes/for_sale/Miami%2C%20FL_rb/?home_type=house&price_min=1&price_max=10000000"
        }])))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "snapshot_id": JOB_ID })))
        .expect(1)
        .mount(&server)
        .await;
    mount_progress(&server, "ready").await;
    mount_snapshot(&server, eight_records()).await;

    let report = live_search(&server, fast_budget())
        .run(&SearchQuery::default())
        .await;

    assert!(!report.used_fallback);
    server.verify().await;
}

#[tokio::test]
async fn without_client_every_search_uses_fallback() {
    let search = ListingSearch::new(
        None,
        builtin_fallback_listings().unwrap(),
        PollBudget::default(),
        2,
    );

    assert!(!search.is_live());
    let report = search.run(&price_query(700_000, 900_000)).await;

    assert!(report.used_fallback);
    assert_eq!(report.outcome, SearchOutcome::Found);
    assert_eq!(report.total_matched, 2);
    let ids: Vec<&str> = report.records.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, ["234567", "567890"]);
}

#[tokio::test]
async fn fallback_outside_range_is_no_matches() {
    let search = ListingSearch::new(
        None,
        builtin_fallback_listings().unwrap(),
        PollBudget::default(),
        3,
    );

    let report = search.run(&price_query(2_000_000, 3_000_000)).await;

    assert_eq!(report.outcome, SearchOutcome::NoMatchesInRange);
    assert!(report.used_fallback);
}
