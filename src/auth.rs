use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use reqwest::{Method, RequestBuilder};
use tracing::{debug, warn};

use crate::config::Credentials;
use crate::logger::{record, TrafficLog};
use crate::portal::{classify_login, LOGIN_PATH};
use crate::{Error, Result};

pub const DEFAULT_MAX_AUTH_ATTEMPTS: u32 = 100;

/// Login retry schedule: `unit * 2^i` after failed attempt `i`, no ceiling.
#[derive(Debug, Clone, Copy)]
pub(crate) struct BackoffPolicy {
    pub max_attempts: u32,
    pub unit: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_AUTH_ATTEMPTS,
            unit: Duration::from_secs(1),
        }
    }
}

impl BackoffPolicy {
    pub fn delay(&self, attempt: u32) -> Duration {
        if self.unit.is_zero() {
            return Duration::ZERO;
        }
        match 2u32.checked_pow(attempt) {
            Some(factor) => self.unit.saturating_mul(factor),
            None => Duration::MAX,
        }
    }
}

/// An authenticated portal session. Every request carries basic credentials
/// and the cookies handed out at login.
pub(crate) struct Session {
    http: reqwest::Client,
    credentials: Credentials,
    pub location_id: u64,
}

impl Session {
    pub fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.http
            .request(method, url)
            .basic_auth(&self.credentials.username, Some(&self.credentials.password))
    }
}

/// Runs `attempt` until it succeeds, fails terminally, or the policy runs out.
/// Only retryable errors (see [`Error::is_retryable`]) lead to `sleep`.
pub(crate) async fn retry_with_backoff<T, A, AF, S, SF>(
    policy: &BackoffPolicy,
    mut attempt: A,
    mut sleep: S,
) -> Result<T>
where
    A: FnMut(u32) -> AF,
    AF: Future<Output = Result<T>>,
    S: FnMut(Duration) -> SF,
    SF: Future<Output = ()>,
{
    for i in 0..policy.max_attempts {
        debug!(attempt = i + 1, "starting authentication attempt");
        match attempt(i).await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() => {
                warn!(attempt = i + 1, error = %e, "unable to authenticate at this moment");
                if i + 1 < policy.max_attempts {
                    let delay = policy.delay(i);
                    debug!(?delay, "backing off before next login attempt");
                    sleep(delay).await;
                }
            }
            Err(e) => return Err(e),
        }
    }

    Err(Error::Authentication(format!(
        "ran out of tries after {} attempts",
        policy.max_attempts
    )))
}

/// One login attempt on a fresh cookie jar.
pub(crate) async fn login(
    base_url: &str,
    credentials: &Credentials,
    traffic: Option<&Mutex<TrafficLog>>,
) -> Result<Session> {
    let http = reqwest::Client::builder().cookie_store(true).build()?;
    debug!(user = %credentials.username, "attempting authentication");

    // The form body holds the password; log the request without it.
    record(traffic, |log| log.log_request("POST", LOGIN_PATH, None));
    let resp = http
        .post(format!("{base_url}{LOGIN_PATH}"))
        .basic_auth(&credentials.username, Some(&credentials.password))
        .form(&[
            ("UserName", credentials.username.as_str()),
            ("Password", credentials.password.as_str()),
        ])
        .send()
        .await?;

    let status = resp.status().as_u16();
    let url = resp.url().to_string();
    let body = resp.text().await?;
    record(traffic, |log| log.log_response(status, &url, &body));
    debug!(%url, status, "resulting url from authentication");

    let location_id = classify_login(status, &url, &body)?;
    debug!(location_id, "authenticated");

    Ok(Session {
        http,
        credentials: credentials.clone(),
        location_id,
    })
}
