//! 🎬 Scroll scenarios — the whole stream, end to end, against scripted and mocked clusters.
//!
//! Every test here drives a real [`ScrollStream`] from the outside, the way a consumer
//! would: pull, pull, pull, until the stream says it's done (or says something worse).

use std::sync::Arc;
use std::time::Duration;

use esscroll::app_config::{AppConfig, RuntimeConfig, SinkConfig, StreamConfig};
use esscroll::backends::in_mem::numbered_hits;
use esscroll::backends::{
    ElasticsearchScrollClient, ElasticsearchSourceConfig, FileSink, FileSinkConfig,
    InMemoryScrollClient, SinkBackend,
};
use esscroll::scroll::RetryDelay;
use esscroll::{Hit, Pull, ScrollError, ScrollQuery, ScrollStream, StreamPhase};
use futures::{StreamExt, TryStreamExt};
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn query() -> ScrollQuery {
    ScrollQuery::new(Some("test-index".to_string()), json!({}), "30s")
        .expect("💀 valid query rejected")
}

fn stream_over(client: &Arc<InMemoryScrollClient>) -> ScrollStream {
    ScrollStream::builder()
        .client(client.clone())
        .query(query())
        .build()
        .expect("💀 stream refused to build")
}

/// 🔁 Pull until the stream stops handing out records. Returns the hits and how it ended.
async fn drain(stream: &mut ScrollStream, n: usize) -> (Vec<Hit>, Result<Pull, ScrollError>) {
    let mut hits = Vec::new();
    loop {
        match stream.pull(n).await {
            Ok(Pull::Records(batch)) => {
                assert!(!batch.is_empty() && batch.len() <= n, "💀 bad batch size");
                hits.extend(batch);
            }
            ending => return (hits, ending),
        }
    }
}

#[tokio::test]
async fn the_one_where_5000_hits_take_exactly_seven_pages() {
    let client = Arc::new(InMemoryScrollClient::new(numbered_hits(5000), 750));
    let mut stream = stream_over(&client);

    let (hits, ending) = drain(&mut stream, 1000).await;

    assert_eq!(hits, numbered_hits(5000));
    assert_eq!(ending.expect("💀 stream errored"), Pull::EndOfStream);
    assert_eq!(client.search_calls(), 1);
    assert_eq!(client.fetch_next_calls(), 6);
    // 🏁 the end is announced once. after that, only silence.
    assert_eq!(stream.pull(10).await.expect("💀 closed stream errored"), Pull::Closed);
    assert_eq!(stream.phase(), StreamPhase::Ended);
    assert_eq!(stream.declared_total(), Some(5000));
}

#[tokio::test]
async fn the_one_where_nothing_matches_and_that_is_fine() {
    let client = Arc::new(InMemoryScrollClient::new(Vec::new(), 10));
    let mut stream = stream_over(&client);

    assert_eq!(stream.pull(5).await.expect("💀 empty scroll errored"), Pull::EndOfStream);
    assert_eq!(stream.pull(5).await.expect("💀 closed stream errored"), Pull::Closed);
    assert_eq!(client.search_calls(), 1);
    assert_eq!(client.fetch_next_calls(), 0);
}

#[tokio::test]
async fn the_one_where_the_first_request_fails_and_nobody_retries() {
    let client = Arc::new(InMemoryScrollClient::new(numbered_hits(10), 5).failing_search());
    let stream = stream_over(&client);

    let outcomes: Vec<Result<Vec<Hit>, ScrollError>> = stream.into_batches().collect().await;

    assert_eq!(outcomes.len(), 1);
    assert!(matches!(outcomes[0], Err(ScrollError::InitialFetch { .. })));
    assert_eq!(client.search_calls(), 1);
    assert_eq!(client.fetch_next_calls(), 0);
}

#[tokio::test]
async fn the_one_where_only_one_fetch_is_ever_in_flight() {
    let client = Arc::new(
        InMemoryScrollClient::new(numbered_hits(2000), 100)
            .with_latency(Duration::from_millis(2)),
    );
    let mut stream = ScrollStream::builder()
        .client(client.clone())
        .query(query())
        .low_water_mark(400)
        .high_water_mark(400)
        .build()
        .expect("💀 stream refused to build");

    // 🐢 a slow consumer, so prefetches pile up behind it if anything lets them
    let mut hits = Vec::new();
    loop {
        match stream.pull(37).await.expect("💀 stream errored") {
            Pull::Records(batch) => {
                hits.extend(batch);
                tokio::task::yield_now().await;
            }
            Pull::EndOfStream => break,
            Pull::Closed => panic!("💀 closed before end of stream"),
        }
    }

    assert_eq!(hits, numbered_hits(2000));
    assert_eq!(client.max_in_flight(), 1);
    assert_eq!(client.search_calls() + client.fetch_next_calls(), 20);
}

#[tokio::test(start_paused = true)]
async fn the_one_where_two_failures_cost_exactly_two_and_a_half_seconds() {
    let client = Arc::new(InMemoryScrollClient::new(numbered_hits(20), 10).failing_at(10, 2));
    let mut stream = stream_over(&client);

    let started = tokio::time::Instant::now();
    let (hits, ending) = drain(&mut stream, 20).await;
    let elapsed = started.elapsed();

    assert_eq!(hits, numbered_hits(20));
    assert_eq!(ending.expect("💀 retried stream errored"), Pull::EndOfStream);
    // ⏱️ 1² × 500ms + 2² × 500ms
    assert!(elapsed >= Duration::from_millis(2500), "{elapsed:?}");
    assert!(elapsed < Duration::from_millis(2600), "{elapsed:?}");
    assert_eq!(client.fetch_next_calls(), 3);
}

#[tokio::test(start_paused = true)]
async fn the_one_where_the_retries_run_out_and_the_error_arrives_once() {
    let client = Arc::new(InMemoryScrollClient::new(numbered_hits(20), 10).failing_at(10, 3));
    let stream = stream_over(&client);

    let outcomes: Vec<Result<Vec<Hit>, ScrollError>> = stream.into_batches().collect().await;

    let errors: Vec<&ScrollError> = outcomes.iter().filter_map(|o| o.as_ref().err()).collect();
    assert_eq!(errors.len(), 1);
    assert!(matches!(
        errors[0],
        ScrollError::RetriesExhausted { attempts: 3, .. }
    ));
    assert!(outcomes.last().is_some_and(|last| last.is_err()));
    assert_eq!(client.fetch_next_calls(), 3);
}

#[tokio::test]
async fn the_one_where_a_custom_backoff_is_actually_consulted() {
    let client = Arc::new(InMemoryScrollClient::new(numbered_hits(4), 2).failing_at(2, 1));
    let asked = Arc::new(std::sync::Mutex::new(Vec::new()));
    let recorder = asked.clone();
    let delay: RetryDelay = Arc::new(move |attempt| {
        if let Ok(mut asked) = recorder.lock() {
            asked.push(attempt);
        }
        Duration::ZERO
    });
    let stream = ScrollStream::builder()
        .client(client.clone())
        .query(query())
        .retry_delay(delay)
        .build()
        .expect("💀 stream refused to build");

    let hits: Vec<Hit> = stream.into_hits().try_collect().await.expect("💀 stream errored");

    assert_eq!(hits, numbered_hits(4));
    assert_eq!(*asked.lock().expect("💀 poisoned"), vec![1]);
}

#[tokio::test]
async fn the_one_where_destroy_is_said_twice_and_heard_once() {
    let client = Arc::new(InMemoryScrollClient::new(numbered_hits(100), 10));
    let mut stream = ScrollStream::builder()
        .client(client.clone())
        .query(query())
        .low_water_mark(5)
        .high_water_mark(10)
        .build()
        .expect("💀 stream refused to build");

    let first = stream.pull(3).await.expect("💀 stream errored");
    assert_eq!(first, Pull::Records(numbered_hits(3)));

    stream.destroy();
    stream.destroy();

    assert_eq!(stream.phase(), StreamPhase::Destroyed);
    assert_eq!(stream.buffered(), 0);
    assert_eq!(stream.pull(3).await.expect("💀 destroyed stream errored"), Pull::Closed);
    assert!(client.search_calls() + client.fetch_next_calls() <= 2);
}

#[tokio::test]
async fn the_one_where_a_missing_cursor_is_fatal_on_the_spot() {
    let client = Arc::new(InMemoryScrollClient::new(numbered_hits(30), 10).without_cursor_at(10));
    let mut stream = stream_over(&client);

    let (hits, ending) = drain(&mut stream, 10).await;

    assert_eq!(hits, numbered_hits(10));
    assert!(matches!(ending, Err(ScrollError::Protocol { .. })));
    assert_eq!(client.fetch_next_calls(), 1);
    assert_eq!(stream.pull(10).await.expect("💀 failed stream errored twice"), Pull::Closed);
}

#[tokio::test]
async fn the_one_where_stalled_pages_are_just_slow_pages() {
    let client = Arc::new(InMemoryScrollClient::new(numbered_hits(20), 10).stalling_at(10, 2));
    let mut stream = stream_over(&client);

    let (hits, ending) = drain(&mut stream, 5).await;

    assert_eq!(hits, numbered_hits(20));
    assert_eq!(ending.expect("💀 stream errored"), Pull::EndOfStream);
    assert_eq!(client.fetch_next_calls(), 3);
}

#[tokio::test]
async fn the_one_where_the_real_client_scrolls_a_mock_cluster() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/logs/_search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "_scroll_id": "page-2",
            "hits": { "total": { "value": 3 }, "hits": [ { "n": 1 }, { "n": 2 } ] }
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/_search/scroll"))
        .and(body_partial_json(json!({ "scroll_id": "page-2" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "_scroll_id": "page-3",
            "hits": { "total": { "value": 3 }, "hits": [ { "n": 3 } ] }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut source_config = ElasticsearchSourceConfig::new(server.uri());
    source_config.index = Some("logs".to_string());
    let client = ElasticsearchScrollClient::new(source_config.clone())
        .expect("💀 client refused to be born");
    let stream = ScrollStream::builder()
        .client(Arc::new(client))
        .query(source_config.scroll_query().expect("💀 default query rejected"))
        .build()
        .expect("💀 stream refused to build");

    let hits: Vec<Hit> = stream.into_hits().try_collect().await.expect("💀 stream errored");
    let docs: Vec<&str> = hits.iter().map(Hit::as_str).collect();
    assert_eq!(docs, vec![r#"{"n":1}"#, r#"{"n":2}"#, r#"{"n":3}"#]);
}

#[tokio::test]
async fn the_one_where_the_pipeline_writes_ndjson_to_disk() {
    let dir = tempfile::tempdir().expect("💀 no temp dir for us");
    let out = dir.path().join("hits.ndjson");
    let app_config = AppConfig {
        source_config: ElasticsearchSourceConfig::new("http://localhost:9200"),
        sink_config: SinkConfig::File(FileSinkConfig {
            file_name: out.display().to_string(),
        }),
        stream: StreamConfig {
            low_water_mark: 8,
            high_water_mark: 16,
            ..StreamConfig::default()
        },
        runtime: RuntimeConfig { queue_capacity: 2 },
    };
    let sink = FileSink::new(FileSinkConfig {
        file_name: out.display().to_string(),
    })
    .await
    .expect("💀 sink creation failed");
    let client = Arc::new(InMemoryScrollClient::new(numbered_hits(50), 7));

    let written = esscroll::run_with(app_config, client, SinkBackend::File(sink))
        .await
        .expect("💀 pipeline failed");

    assert_eq!(written, 50);
    let lines: Vec<String> = std::fs::read_to_string(&out)
        .expect("💀 output vanished")
        .lines()
        .map(str::to_string)
        .collect();
    let expected: Vec<String> = numbered_hits(50)
        .iter()
        .map(|hit| hit.as_str().to_string())
        .collect();
    assert_eq!(lines, expected);
}

#[tokio::test]
async fn the_one_where_the_declared_total_is_the_finish_line() {
    // 📊 the service holds ten hits but promised three. the promise wins.
    let client = Arc::new(InMemoryScrollClient::new(numbered_hits(10), 2).with_declared_total(3));
    let mut stream = stream_over(&client);

    let (hits, ending) = drain(&mut stream, 10).await;

    // 📦 pages are never split, so the page that crosses the line arrives whole
    assert_eq!(hits, numbered_hits(4));
    assert_eq!(ending.expect("💀 stream errored"), Pull::EndOfStream);
    assert_eq!(client.fetch_next_calls(), 1);
    // ⏳ every follow-up renews the cursor with the query's lifetime
    assert_eq!(client.scroll_lifetimes_seen(), vec!["30s".to_string()]);
}
