//! Client for the Content Delivery Service (CDS).
//!
//! Pulls translated strings per locale (with ETag validation), pushes source
//! strings, and reads the status of push jobs. Retrying pulls is the client's
//! job; polling a push job until it settles is [`JobPoller`]'s.

mod job;
mod transport;

use std::{
    collections::{BTreeMap, BTreeSet},
    sync::Arc,
    time::Duration,
};

use futures::future::join_all;
use serde::Deserialize;

pub use job::{JobPoller, PollState};
pub use transport::{HttpMethod, HttpRequest, HttpResponse, ReqwestTransport, Transport};

use crate::{
    config::Config,
    error::Error,
    plural_rules::retain_valid_plurals,
    traits::Parser,
    types::{
        JobDetails, JobError, JobState, LocaleDocument, PullOutcome, PullResponse, PushPayload,
        PushResponse, TxJobStatus,
    },
};

const SDK_VERSION: &str = concat!("rust/", env!("CARGO_PKG_VERSION"));

/// Retry budget for pulls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `retry` (1-based), doubling each time.
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = 1u32 << retry.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

#[derive(Deserialize)]
struct PushResponseBody {
    data: PushResponseData,
}

#[derive(Deserialize)]
struct PushResponseData {
    id: String,
    links: PushResponseLinks,
}

#[derive(Deserialize)]
struct PushResponseLinks {
    job: String,
}

#[derive(Deserialize)]
struct JobStatusBody {
    data: JobStatusData,
}

#[derive(Deserialize)]
struct JobStatusData {
    status: JobState,
    #[serde(default)]
    details: JobDetails,
    #[serde(default)]
    errors: Vec<JobError>,
}

#[derive(Clone)]
pub struct CdsClient {
    host: String,
    token: String,
    secret: Option<String>,
    tags: Vec<String>,
    retry: RetryPolicy,
    transport: Arc<dyn Transport>,
}

impl std::fmt::Debug for CdsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CdsClient")
            .field("host", &self.host)
            .field("has_secret", &self.secret.is_some())
            .field("tags", &self.tags)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl CdsClient {
    pub fn new(
        host: impl Into<String>,
        token: impl Into<String>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            host: host.into().trim_end_matches('/').to_string(),
            token: token.into(),
            secret: None,
            tags: Vec::new(),
            retry: RetryPolicy::default(),
            transport,
        }
    }

    /// Builds a client with a `reqwest` transport from `config`.
    pub fn from_config(config: &Config) -> Result<Self, Error> {
        let transport = ReqwestTransport::new(config.http.timeout())?;
        Ok(Self::from_config_with_transport(config, Arc::new(transport)))
    }

    pub fn from_config_with_transport(config: &Config, transport: Arc<dyn Transport>) -> Self {
        let mut client = Self::new(&config.cds_host, &config.token, transport)
            .with_tags(config.tags.iter().cloned())
            .with_retry(RetryPolicy {
                max_retries: config.http.max_retries,
                base_delay: config.http.retry_delay(),
                ..RetryPolicy::default()
            });
        client.secret = config.secret.clone();
        client
    }

    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = Some(secret.into());
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    fn authorization(&self, with_secret: bool) -> Result<String, Error> {
        if !with_secret {
            return Ok(format!("Bearer {}", self.token));
        }
        match self.secret.as_deref() {
            Some(secret) if !secret.is_empty() => Ok(format!("Bearer {}:{}", self.token, secret)),
            _ => Err(Error::config_error(
                "a secret is required to push source strings",
            )),
        }
    }

    fn request(&self, request: HttpRequest, with_secret: bool) -> Result<HttpRequest, Error> {
        Ok(request
            .header("Authorization", self.authorization(with_secret)?)
            .header("Accept-version", "v2")
            .header("X-NATIVE-SDK", SDK_VERSION)
            .header("Content-Type", "application/json; charset=utf-8"))
    }

    fn content_url(&self, locale: &str) -> Result<String, Error> {
        let mut url = reqwest::Url::parse(&format!("{}/content/{}", self.host, locale))
            .map_err(|e| Error::InvalidUrl(format!("{}: {}", self.host, e)))?;
        if !self.tags.is_empty() {
            url.query_pairs_mut()
                .append_pair("filter[tags]", &self.tags.join(","));
        }
        Ok(url.to_string())
    }

    fn job_url(&self, link: &str) -> String {
        if link.starts_with("http://") || link.starts_with("https://") {
            link.to_string()
        } else if link.starts_with('/') {
            format!("{}{}", self.host, link)
        } else {
            format!("{}/{}", self.host, link)
        }
    }

    /// Pulls every locale concurrently.
    ///
    /// `tokens` holds the last validation token per locale; a locale with a
    /// matching token on the server comes back as [`PullOutcome::NotModified`].
    pub async fn pull(
        &self,
        locales: &[String],
        tokens: &BTreeMap<String, String>,
    ) -> BTreeMap<String, Result<PullOutcome, Error>> {
        let unique: BTreeSet<&String> = locales.iter().collect();
        let pulls = unique.into_iter().map(|locale| async move {
            let token = tokens.get(locale).map(String::as_str);
            (locale.clone(), self.pull_locale(locale, token).await)
        });
        join_all(pulls).await.into_iter().collect()
    }

    /// Pulls one locale, retrying while the content is being prepared or the
    /// server/network fails.
    pub async fn pull_locale(&self, locale: &str, token: Option<&str>) -> Result<PullOutcome, Error> {
        let url = self.content_url(locale)?;
        let mut retry = 0;
        loop {
            let mut request = self.request(HttpRequest::get(url.clone()), false)?;
            if let Some(token) = token {
                request = request.header("If-None-Match", token);
            }

            let failure = match self.transport.execute(request).await {
                Ok(response) => match response.status {
                    200 => return self.parse_pull(locale, response),
                    304 => {
                        tracing::debug!(locale, "Translations not modified");
                        return Ok(PullOutcome::NotModified);
                    }
                    202 => Error::network(format!("content for {} is still being prepared", locale)),
                    status if status >= 500 => {
                        Error::network(format!("server error (HTTP {}): {}", status, response.text()))
                    }
                    status => return Err(Error::rejection(status, response.text())),
                },
                Err(e) if e.is_retryable() => e,
                Err(e) => return Err(e),
            };

            if retry >= self.retry.max_retries {
                tracing::warn!(locale, attempts = retry + 1, "Giving up pull: {}", failure);
                return Err(failure);
            }
            retry += 1;
            let delay = self.retry.delay_for(retry);
            tracing::debug!(locale, attempt = retry, ?delay, "Retrying pull: {}", failure);
            tokio::time::sleep(delay).await;
        }
    }

    fn parse_pull(&self, locale: &str, response: HttpResponse) -> Result<PullOutcome, Error> {
        let mut strings = LocaleDocument::from_bytes(&response.body)?.data;
        retain_valid_plurals(locale, &mut strings);
        tracing::debug!(locale, strings = strings.len(), "Pulled translations");
        Ok(PullOutcome::Updated(PullResponse {
            locale: locale.to_string(),
            strings,
            token: response.header("etag").map(str::to_string),
        }))
    }

    /// Uploads source strings. Requires a secret.
    pub async fn push(&self, payload: &PushPayload) -> Result<PushResponse, Error> {
        let body = serde_json::to_vec(payload)?;
        let request = self.request(HttpRequest::post(format!("{}/content", self.host), body), true)?;
        let response = self.transport.execute(request).await?;
        match response.status {
            200 | 202 => {
                let body: PushResponseBody = serde_json::from_slice(&response.body)?;
                tracing::info!(job_id = %body.data.id, strings = payload.data.len(), "Push accepted");
                Ok(PushResponse {
                    job_id: body.data.id,
                    job_link: body.data.links.job,
                })
            }
            409 => Err(Error::rejection(
                409,
                "another content upload is already in progress",
            )),
            status => Err(Error::rejection(status, response.text())),
        }
    }

    /// Reads the status of a push job once.
    pub async fn poll_job(&self, link: &str) -> Result<TxJobStatus, Error> {
        let request = self.request(HttpRequest::get(self.job_url(link)), true)?;
        let response = self.transport.execute(request).await?;
        match response.status {
            200 => {
                let body: JobStatusBody = serde_json::from_slice(&response.body)?;
                let job_id = link
                    .trim_end_matches('/')
                    .rsplit('/')
                    .next()
                    .unwrap_or(link)
                    .to_string();
                Ok(TxJobStatus {
                    job_id,
                    state: body.data.status,
                    details: body.data.details,
                    errors: body.data.errors,
                })
            }
            status if status >= 500 => Err(Error::network(format!(
                "server error (HTTP {}): {}",
                status,
                response.text()
            ))),
            status => Err(Error::rejection(status, response.text())),
        }
    }

    /// Pushes `payload` and polls the created job until it settles.
    pub async fn push_and_wait(
        &self,
        payload: &PushPayload,
        poller: &JobPoller,
        cancel: &tokio_util::sync::CancellationToken,
    ) -> Result<TxJobStatus, Error> {
        let response = self.push(payload).await?;
        poller.run(self, &response.job_link, cancel).await
    }
}
