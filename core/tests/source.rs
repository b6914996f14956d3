//! HTTP fetcher tests against a local server.
//!
//! Tests verify:
//! 1. A successful response body is returned as text
//! 2. Non-success statuses fail with the status code
//! 3. Bodies over `max_response_bytes` are rejected
//! 4. A handler slower than `timeout_ms` fails with `Timeout`
//! 5. Bodies that are not UTF-8 fail to parse

use prison_covid_core::{
    config::HttpConfig,
    error::PipelineError,
    source::{HttpFetcher, SourceFetcher},
    types::Dataset,
};
use std::thread;
use std::time::Duration;
use tiny_http::{Response, Server};

/// Serve exactly one request, answering after `delay`.
fn serve_once(status: u16, body: Vec<u8>, delay: Duration) -> (String, thread::JoinHandle<()>) {
    let server = Server::http("127.0.0.1:0").unwrap();
    let addr = server.server_addr().to_ip().unwrap();
    let handle = thread::spawn(move || {
        if let Ok(request) = server.recv() {
            thread::sleep(delay);
            let _ = request.respond(Response::from_data(body).with_status_code(status));
        }
    });
    (format!("http://{addr}/12-15-2020.csv"), handle)
}

fn fetcher(config: HttpConfig) -> HttpFetcher {
    HttpFetcher::new(config).unwrap()
}

#[test]
fn body_is_returned_as_text() {
    let (url, handle) = serve_once(200, b"name,n\nA,1\n".to_vec(), Duration::ZERO);
    let body = fetcher(HttpConfig::default())
        .fetch(Dataset::StateCovid, &url)
        .unwrap();
    handle.join().unwrap();
    assert_eq!(body, "name,n\nA,1\n");
}

#[test]
fn missing_report_fails_with_http_status() {
    let (url, handle) = serve_once(404, b"Not Found".to_vec(), Duration::ZERO);
    let err = fetcher(HttpConfig::default())
        .fetch(Dataset::StateCovid, &url)
        .unwrap_err();
    handle.join().unwrap();
    assert!(
        matches!(err, PipelineError::HttpStatus { dataset: Dataset::StateCovid, status: 404, .. }),
        "{err}"
    );
}

#[test]
fn oversized_body_is_rejected() {
    let (url, handle) = serve_once(200, vec![b'x'; 64], Duration::ZERO);
    let config = HttpConfig {
        max_response_bytes: 16,
        ..HttpConfig::default()
    };
    let err = fetcher(config).fetch(Dataset::PrisonCovid, &url).unwrap_err();
    handle.join().unwrap();
    assert!(
        matches!(err, PipelineError::ResponseTooLarge { dataset: Dataset::PrisonCovid, limit: 16 }),
        "{err}"
    );
}

#[test]
fn slow_server_times_out() {
    let (url, handle) = serve_once(200, b"late".to_vec(), Duration::from_millis(1_000));
    let config = HttpConfig {
        timeout_ms: 100,
        ..HttpConfig::default()
    };
    let err = fetcher(config)
        .fetch(Dataset::PrisonPopulation, &url)
        .unwrap_err();
    handle.join().unwrap();
    assert!(
        matches!(
            err,
            PipelineError::Timeout { dataset: Dataset::PrisonPopulation, timeout_ms: 100, .. }
        ),
        "{err}"
    );
    assert_eq!(err.dataset(), Some(Dataset::PrisonPopulation));
}

#[test]
fn non_utf8_body_is_a_parse_error() {
    let (url, handle) = serve_once(200, vec![0xff, 0xfe, b'a', 0x80], Duration::ZERO);
    let err = fetcher(HttpConfig::default())
        .fetch(Dataset::StateCovid, &url)
        .unwrap_err();
    handle.join().unwrap();
    assert!(
        matches!(err, PipelineError::Parse { dataset: Dataset::StateCovid, .. }),
        "{err}"
    );
}
