use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use watch_engine::{
    collect_feed, ContactEnricher, ContactLookup, ContactSettings, FailureKind, FeedQuery,
    FeedSettings, FeedSource, PhoneCache, ReqwestContactLookup, ReqwestFeedSource, RetryPolicy,
};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn quick_retry() -> RetryPolicy {
    RetryPolicy {
        max_retries: 2,
        retry_delay: Duration::from_millis(10),
    }
}

fn settings(server: &MockServer) -> FeedSettings {
    FeedSettings {
        base_url: format!("{}/feed", server.uri()),
        fixed_params: vec![("city".into(), "8300".into())],
        retry: quick_retry(),
        ..FeedSettings::default()
    }
}

fn query() -> FeedQuery {
    FeedQuery {
        profile: "three rooms".into(),
        params: vec![("maxPrice".into(), "2350000".into())],
    }
}

fn page(tokens: &[&str], total_pages: u32) -> Value {
    let records: Vec<Value> = tokens.iter().map(|t| json!({ "token": t })).collect();
    json!({
        "data": { "private": records, "yad1": [{ "token": "promoted" }] },
        "pagination": { "totalPages": total_pages }
    })
}

fn tokens(records: &[Value]) -> Vec<&str> {
    records.iter().filter_map(|r| r["token"].as_str()).collect()
}

#[tokio::test]
async fn fetches_every_page_in_order_and_skips_promoted() {
    let server = MockServer::start().await;
    for (number, body) in [
        ("1", page(&["a", "b"], 3)),
        ("2", page(&["c"], 3)),
        ("3", page(&["d"], 3)),
    ] {
        Mock::given(method("GET"))
            .and(path("/feed"))
            .and(query_param("page", number))
            .and(query_param("city", "8300"))
            .and(query_param("maxPrice", "2350000"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .expect(1)
            .mount(&server)
            .await;
    }

    let source = ReqwestFeedSource::new(settings(&server)).unwrap();
    let records = source.fetch_query(&query()).await.unwrap();
    assert_eq!(tokens(&records), vec!["a", "b", "c", "d"]);
}

#[tokio::test]
async fn retries_html_bot_check_then_succeeds() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/feed"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("<html>captcha</html>", "text/html"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/feed"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(&["a"], 1)))
        .mount(&server)
        .await;

    let source = ReqwestFeedSource::new(settings(&server)).unwrap();
    let records = source.fetch_query(&query()).await.unwrap();
    assert_eq!(tokens(&records), vec!["a"]);
}

#[tokio::test]
async fn client_errors_are_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/feed"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let source = ReqwestFeedSource::new(settings(&server)).unwrap();
    let err = source.fetch_query(&query()).await.unwrap_err();
    assert_eq!(err.kind, FailureKind::HttpStatus(404));
}

#[tokio::test]
async fn server_errors_exhaust_retries() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/feed"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let source = ReqwestFeedSource::new(settings(&server)).unwrap();
    let err = source.fetch_query(&query()).await.unwrap_err();
    assert_eq!(err.kind, FailureKind::HttpStatus(503));
}

#[tokio::test]
async fn slow_provider_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/feed"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_millis(250))
                .set_body_json(page(&["a"], 1)),
        )
        .mount(&server)
        .await;

    let source = ReqwestFeedSource::new(FeedSettings {
        request_timeout: Duration::from_millis(50),
        retry: RetryPolicy {
            max_retries: 0,
            retry_delay: Duration::ZERO,
        },
        ..settings(&server)
    })
    .unwrap();
    let err = source.fetch_query(&query()).await.unwrap_err();
    assert_eq!(err.kind, FailureKind::Timeout);
}

#[tokio::test]
async fn one_failing_profile_does_not_sink_the_batch() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/feed"))
        .and(query_param("maxPrice", "1"))
        .respond_with(ResponseTemplate::new(400))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/feed"))
        .and(query_param("maxPrice", "2350000"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(&["a"], 1)))
        .mount(&server)
        .await;

    let source = ReqwestFeedSource::new(settings(&server)).unwrap();
    let broken = FeedQuery {
        profile: "broken".into(),
        params: vec![("maxPrice".into(), "1".into())],
    };

    let records = collect_feed(&source, &[broken.clone(), query()]).await.unwrap();
    assert_eq!(tokens(&records), vec!["a"]);

    let err = collect_feed(&source, &[broken]).await.unwrap_err();
    assert_eq!(err.kind, FailureKind::HttpStatus(400));
}

#[tokio::test]
async fn contact_lookup_prefers_broker_phone() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/item/t1/customer"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "brokerPhone": "03-5555555", "phone": "050-1111111" }
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/item/t2/customer"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "brokerPhone": "", "phone": "050-2222222" }
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/item/t3/customer"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": {} })))
        .mount(&server)
        .await;

    let lookup = ReqwestContactLookup::new(ContactSettings {
        url_template: format!("{}/item/{{token}}/customer", server.uri()),
        retry: quick_retry(),
        ..ContactSettings::default()
    })
    .unwrap();

    assert_eq!(lookup.phone("t1").await.unwrap().as_deref(), Some("03-5555555"));
    assert_eq!(lookup.phone("t2").await.unwrap().as_deref(), Some("050-2222222"));
    assert_eq!(lookup.phone("t3").await.unwrap(), None);
}

#[tokio::test]
async fn enricher_injects_phones_and_caches_lookups() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/item/t1/customer"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "data": { "phone": "050-1" } })),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/item/t2/customer"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let temp = tempfile::TempDir::new().unwrap();
    let cache_path = temp.path().join("phones.json");
    let lookup = ReqwestContactLookup::new(ContactSettings {
        url_template: format!("{}/item/{{token}}/customer", server.uri()),
        retry: RetryPolicy {
            max_retries: 0,
            retry_delay: Duration::ZERO,
        },
        ..ContactSettings::default()
    })
    .unwrap();
    let cache = PhoneCache::load(cache_path.clone());
    let mut enricher = ContactEnricher::new(Box::new(lookup), cache, 2);

    let mut records = vec![
        json!({ "token": "t1" }),
        json!({ "token": "t2" }),
        json!({ "token": "t1", "price": 5 }),
    ];
    enricher.enrich(&mut records).await;
    assert_eq!(records[0]["contactPhone"], json!("050-1"));
    assert_eq!(records[2]["contactPhone"], json!("050-1"));
    assert!(records[1].get("contactPhone").is_none());

    // A second pass answers t1 from the cache.
    let mut again = vec![json!({ "token": "t1" })];
    enricher.enrich(&mut again).await;
    assert_eq!(again[0]["contactPhone"], json!("050-1"));

    enricher.save_cache().unwrap();
    let reloaded = PhoneCache::load(cache_path);
    assert_eq!(reloaded.get("t1"), Some(Some("050-1")));
    assert_eq!(reloaded.get("t2"), None);
}
