// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! End-to-end caching behavior with `InMemoryBackend`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use httpcache::testing::RecordingListener;
use httpcache::{CACHE_EXPIRATION_HEADER, Error, HttpCache, HttpRequest, HttpResponse};
use httpcache_memory::InMemoryBackend;
use layered::{Execute, Layer, Service};
use tick::ClockControl;

const MINUTE: Duration = Duration::from_secs(60);
const HOUR: Duration = Duration::from_secs(3_600);

/// Counts calls per path and answers `METHOD:count:path`.
#[derive(Clone, Default)]
struct Origin {
    calls: Arc<Mutex<HashMap<String, usize>>>,
    total: Arc<AtomicUsize>,
}

impl Origin {
    fn service(&self, status: http::StatusCode) -> impl Service<HttpRequest, Out = Result<HttpResponse, Error>> + 'static {
        let origin = self.clone();
        Execute::new(move |request: HttpRequest| {
            let path = request.uri().path().to_string();
            let count = {
                let mut calls = origin.calls.lock().unwrap();
                let count = calls.entry(path.clone()).or_default();
                *count += 1;
                *count - 1
            };
            origin.total.fetch_add(1, Ordering::SeqCst);

            async move {
                tokio::time::sleep(Duration::from_millis(10)).await;
                let mut response = HttpResponse::new(Bytes::from(format!("{}:{count}:{path}", request.method())));
                *response.status_mut() = status;
                Ok::<_, Error>(response)
            }
        })
    }

    fn total(&self) -> usize {
        self.total.load(Ordering::SeqCst)
    }
}

fn request(path: &str, expiration: Option<&str>) -> HttpRequest {
    let mut builder = http::Request::get(format!("http://example.com{path}"));
    if let Some(expiration) = expiration {
        builder = builder.header(CACHE_EXPIRATION_HEADER, expiration);
    }
    builder.body(Bytes::new()).unwrap()
}

async fn fetch(cache: &impl Service<HttpRequest, Out = Result<HttpResponse, Error>>, path: &str, expiration: Option<&str>) -> String {
    let response = cache.execute(request(path, expiration)).await.unwrap();
    String::from_utf8(response.into_body().to_vec()).unwrap()
}

#[tokio::test]
async fn entries_expire_per_key() {
    let control = ClockControl::new();
    let clock = control.to_clock();
    let origin = Origin::default();
    let listener = Arc::new(RecordingListener::new());
    let cache = HttpCache::layer(InMemoryBackend::new(clock.clone()), clock)
        .listener(Arc::clone(&listener))
        .layer(origin.service(http::StatusCode::OK));

    assert_eq!(fetch(&cache, "/one", Some("1h")).await, "GET:0:/one");
    assert_eq!((listener.hits(), listener.misses()), (0, 1));

    control.advance(30 * MINUTE);
    assert_eq!(fetch(&cache, "/one", Some("1h")).await, "GET:0:/one");
    assert_eq!(fetch(&cache, "/two", Some("1h")).await, "GET:0:/two");
    assert_eq!((listener.hits(), listener.misses()), (1, 2));

    control.advance(45 * MINUTE);
    assert_eq!(fetch(&cache, "/one", Some("1h")).await, "GET:1:/one");
    assert_eq!(fetch(&cache, "/two", Some("1h")).await, "GET:0:/two");
    assert_eq!((listener.hits(), listener.misses()), (2, 3));

    assert_eq!(origin.total(), 3);
}

#[tokio::test]
async fn header_changes_expiration_of_one_request() {
    let control = ClockControl::new();
    let clock = control.to_clock();
    let origin = Origin::default();
    let cache = HttpCache::layer(InMemoryBackend::new(clock.clone()), clock)
        .default_expiration(10 * MINUTE)
        .layer(origin.service(http::StatusCode::OK));

    assert_eq!(fetch(&cache, "/one", Some("1h")).await, "GET:0:/one");
    control.advance(30 * MINUTE);

    assert_eq!(fetch(&cache, "/one", Some("1h")).await, "GET:0:/one");
    assert_eq!(fetch(&cache, "/one", None).await, "GET:1:/one");
}

#[tokio::test]
async fn default_expiration_applies_without_header() {
    let control = ClockControl::new();
    let clock = control.to_clock();
    let origin = Origin::default();
    let cache = HttpCache::layer(InMemoryBackend::new(clock.clone()), clock)
        .default_expiration(HOUR)
        .layer(origin.service(http::StatusCode::OK));

    assert_eq!(fetch(&cache, "/one", None).await, "GET:0:/one");
    control.advance(59 * MINUTE);
    assert_eq!(fetch(&cache, "/one", None).await, "GET:0:/one");
    control.advance(MINUTE);
    assert_eq!(fetch(&cache, "/one", None).await, "GET:1:/one");
}

#[tokio::test]
async fn requests_without_expiration_are_not_cached() {
    let clock = ClockControl::new().to_clock();
    let backend = InMemoryBackend::new(clock.clone());
    let origin = Origin::default();
    let cache = HttpCache::layer(backend.clone(), clock).layer(origin.service(http::StatusCode::OK));

    assert_eq!(fetch(&cache, "/one", None).await, "GET:0:/one");
    assert_eq!(fetch(&cache, "/one", None).await, "GET:1:/one");
    assert!(backend.is_empty());
}

#[tokio::test]
async fn error_statuses_are_not_cached() {
    for status in [http::StatusCode::BAD_REQUEST, http::StatusCode::INTERNAL_SERVER_ERROR] {
        let clock = ClockControl::new().to_clock();
        let backend = InMemoryBackend::new(clock.clone());
        let origin = Origin::default();
        let cache = HttpCache::layer(backend.clone(), clock)
            .default_expiration(HOUR)
            .layer(origin.service(status));

        let response = cache.execute(request("/one", None)).await.unwrap();
        assert_eq!(response.status(), status);
        assert_eq!(fetch(&cache, "/one", None).await, "GET:1:/one");

        assert!(backend.is_empty());
        assert_eq!(origin.total(), 2);
    }
}

#[tokio::test]
async fn binary_bodies_survive_storage() {
    let clock = ClockControl::new().to_clock();
    let payload: Vec<u8> = (0..=255).collect();
    let body = Bytes::from(payload.clone());
    let origin = Execute::new(move |_request: HttpRequest| {
        let body = body.clone();
        async move {
            let mut response = HttpResponse::new(body);
            response
                .headers_mut()
                .insert(http::header::CONTENT_TYPE, http::HeaderValue::from_static("application/octet-stream"));
            Ok::<_, Error>(response)
        }
    });
    let cache = HttpCache::layer(InMemoryBackend::new(clock.clone()), clock)
        .default_expiration(HOUR)
        .layer(origin);

    cache.execute(request("/blob", None)).await.unwrap();
    let hit = cache.execute(request("/blob", None)).await.unwrap();

    assert_eq!(hit.body().as_ref(), payload.as_slice());
    assert_eq!(hit.headers().get(http::header::CONTENT_TYPE).unwrap(), "application/octet-stream");
    assert_eq!(hit.headers().get(http::header::CONTENT_LENGTH).unwrap(), "256");
}

#[tokio::test]
async fn concurrent_misses_reach_origin_once() {
    let clock = ClockControl::new().to_clock();
    let origin = Origin::default();
    let listener = Arc::new(RecordingListener::new());
    let cache = HttpCache::layer(InMemoryBackend::new(clock.clone()), clock)
        .default_expiration(HOUR)
        .listener(Arc::clone(&listener))
        .layer(origin.service(http::StatusCode::OK));

    let bodies = futures::future::join_all((0..10).map(|_| fetch(&cache, "/busy", None))).await;

    assert!(bodies.iter().all(|body| body == "GET:0:/busy"));
    assert_eq!(origin.total(), 1);
    assert_eq!(listener.misses(), 10);

    assert_eq!(fetch(&cache, "/busy", None).await, "GET:0:/busy");
    assert_eq!(listener.hits(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_misses_across_threads_reach_origin_once() {
    let clock = ClockControl::new().to_clock();
    let origin = Origin::default();
    let cache = HttpCache::layer(InMemoryBackend::new(clock.clone()), clock)
        .default_expiration(HOUR)
        .layer(origin.service(http::StatusCode::OK));

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let cache = cache.clone();
            tokio::spawn(async move { fetch(&cache, "/shared", None).await })
        })
        .collect();

    for task in tasks {
        let body = task.await.unwrap();
        assert_eq!(body, "GET:0:/shared");
    }

    assert_eq!(origin.total(), 1);
}
