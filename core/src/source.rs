//! Fetching upstream CSV text.
//!
//! RULE: Only this module performs I/O. Loaders receive text and are pure.

use crate::{
    config::HttpConfig,
    error::{PipelineError, PipelineResult},
    types::Dataset,
};
use reqwest::blocking::{Client, Response};
use std::collections::HashMap;
use std::io::Read;
use std::time::Duration;

/// The seam between the pipeline and the network.
pub trait SourceFetcher {
    /// Return the full body of `url`. Any failure is fatal to the run.
    fn fetch(&self, dataset: Dataset, url: &str) -> PipelineResult<String>;
}

/// Blocking HTTP(S) fetcher with a per-request timeout and a size cap.
pub struct HttpFetcher {
    config: HttpConfig,
    client: Client,
}

impl HttpFetcher {
    pub fn new(config: HttpConfig) -> PipelineResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| anyhow::anyhow!("http client build failed: {e}"))?;
        Ok(Self { config, client })
    }

    fn request_error(&self, dataset: Dataset, url: &str, e: reqwest::Error) -> PipelineError {
        if e.is_timeout() {
            PipelineError::Timeout {
                dataset,
                url: url.to_string(),
                timeout_ms: self.config.timeout_ms,
            }
        } else {
            PipelineError::Fetch {
                dataset,
                url: url.to_string(),
                message: e.to_string(),
            }
        }
    }
}

impl SourceFetcher for HttpFetcher {
    fn fetch(&self, dataset: Dataset, url: &str) -> PipelineResult<String> {
        log::info!("Fetching {dataset} from {url}");
        let mut response = self
            .client
            .get(url)
            .send()
            .map_err(|e| self.request_error(dataset, url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PipelineError::HttpStatus {
                dataset,
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = read_limited(&mut response, self.config.max_response_bytes)
            .map_err(|e| match e {
                ReadFailure::TooLarge => PipelineError::ResponseTooLarge {
                    dataset,
                    limit: self.config.max_response_bytes,
                },
                ReadFailure::Io(e) => PipelineError::Fetch {
                    dataset,
                    url: url.to_string(),
                    message: e.to_string(),
                },
            })?;

        String::from_utf8(body).map_err(|e| PipelineError::Parse {
            dataset,
            message: format!("response is not UTF-8: {e}"),
        })
    }
}

enum ReadFailure {
    TooLarge,
    Io(std::io::Error),
}

fn read_limited(response: &mut Response, max_bytes: usize) -> Result<Vec<u8>, ReadFailure> {
    if let Some(expected) = response.content_length() {
        if expected > max_bytes as u64 {
            return Err(ReadFailure::TooLarge);
        }
    }
    let mut buf = Vec::new();
    response
        .by_ref()
        .take(max_bytes as u64 + 1)
        .read_to_end(&mut buf)
        .map_err(ReadFailure::Io)?;
    if buf.len() > max_bytes {
        return Err(ReadFailure::TooLarge);
    }
    Ok(buf)
}

/// In-memory fetcher for tests and offline runs. Counts requests so
/// memoization is observable.
#[derive(Debug, Default)]
pub struct StaticFetcher {
    bodies: HashMap<String, String>,
    requests: std::cell::RefCell<Vec<String>>,
}

impl StaticFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, url: impl Into<String>, body: impl Into<String>) -> Self {
        self.bodies.insert(url.into(), body.into());
        self
    }

    /// Every URL requested so far, in order.
    pub fn requests(&self) -> Vec<String> {
        self.requests.borrow().clone()
    }
}

impl SourceFetcher for StaticFetcher {
    fn fetch(&self, dataset: Dataset, url: &str) -> PipelineResult<String> {
        self.requests.borrow_mut().push(url.to_string());
        self.bodies
            .get(url)
            .cloned()
            .ok_or_else(|| PipelineError::HttpStatus {
                dataset,
                url: url.to_string(),
                status: 404,
            })
    }
}

impl<F: SourceFetcher + ?Sized> SourceFetcher for &F {
    fn fetch(&self, dataset: Dataset, url: &str) -> PipelineResult<String> {
        (**self).fetch(dataset, url)
    }
}
