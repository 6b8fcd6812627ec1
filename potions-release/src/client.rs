//! Release-store REST client: bearer auth, retrying POST/GET, rate-limit
//! header inspection, RFC-6570 upload-URL handling.

use std::sync::Mutex;

use reqwest::{header, Response, StatusCode};
use tokio::time::sleep;

use crate::error::{Error, Result};
use crate::model::{Asset, CreateReleaseParams, RateLimit, Release};
use crate::retry::{delay_for_attempt, is_retryable_status, MAX_ATTEMPTS};

const USER_AGENT: &str = "potions/0.1";

pub struct ReleaseClient {
    http: reqwest::Client,
    api_base: String,
    token: String,
    last_rate_limit: Mutex<Option<RateLimit>>,
}

impl ReleaseClient {
    pub fn new(token: impl Into<String>) -> Result<Self> {
        Self::with_api_base(token, "https://api.github.com")
    }

    pub fn with_api_base(token: impl Into<String>, api_base: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder().user_agent(USER_AGENT).build()?;
        Ok(ReleaseClient {
            http,
            api_base: api_base.into(),
            token: token.into(),
            last_rate_limit: Mutex::new(None),
        })
    }

    /// Rate-limit headers observed on the most recent response, if any.
    /// Used by the batch orchestrator to size a run before it starts.
    pub fn last_rate_limit(&self) -> Option<RateLimit> {
        self.last_rate_limit.lock().expect("rate limit mutex poisoned").clone()
    }

    fn auth_header(&self) -> String {
        format!("Bearer {}", self.token)
    }

    async fn send_with_retry(
        &self,
        build: impl Fn() -> reqwest::RequestBuilder,
    ) -> Result<Response> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let result = build()
                .header(header::AUTHORIZATION, self.auth_header())
                .send()
                .await;

            let response = match result {
                Ok(resp) => resp,
                Err(e) => {
                    if attempt >= MAX_ATTEMPTS {
                        return Err(Error::RequestFailed {
                            attempts: attempt,
                            message: e.to_string(),
                        });
                    }
                    tracing::warn!("release request network error (attempt {attempt}): {e}");
                    sleep(delay_for_attempt(attempt)).await;
                    continue;
                }
            };

            if let Some(rate_limit) = read_rate_limit(&response) {
                *self.last_rate_limit.lock().expect("rate limit mutex poisoned") = Some(rate_limit);
                if rate_limit.remaining == 0 {
                    return Err(Error::RateLimitExhausted {
                        reset: rate_limit.reset.to_string(),
                    });
                }
            }

            let status = response.status();
            if status.is_success() {
                return Ok(response);
            }
            if status == StatusCode::NOT_FOUND {
                return Err(Error::ReleaseNotFound(status.to_string()));
            }
            if is_retryable_status(status.as_u16()) && attempt < MAX_ATTEMPTS {
                tracing::warn!("release request returned {status} (attempt {attempt}), retrying");
                sleep(delay_for_attempt(attempt)).await;
                continue;
            }

            let message = response.text().await.unwrap_or_default();
            return Err(Error::RequestFailed {
                attempts: attempt,
                message: format!("{status}: {message}"),
            });
        }
    }

    pub async fn create_release(&self, owner: &str, repo: &str, params: &CreateReleaseParams) -> Result<Release> {
        let url = format!("{}/repos/{owner}/{repo}/releases", self.api_base);
        let body = serde_json::json!({
            "tag_name": params.tag,
            "name": params.name,
            "body": params.body,
            "draft": params.draft,
            "prerelease": params.prerelease,
        });
        let resp = self.send_with_retry(|| self.http.post(&url).json(&body)).await?;
        Ok(resp.json().await?)
    }

    pub async fn get_release(&self, owner: &str, repo: &str, tag: &str) -> Result<Release> {
        let url = format!("{}/repos/{owner}/{repo}/releases/tags/{tag}", self.api_base);
        let resp = self.send_with_retry(|| self.http.get(&url)).await?;
        Ok(resp.json().await?)
    }

    pub async fn list_releases(&self, owner: &str, repo: &str) -> Result<Vec<Release>> {
        let url = format!("{}/repos/{owner}/{repo}/releases", self.api_base);
        let resp = self.send_with_retry(|| self.http.get(&url)).await?;
        Ok(resp.json().await?)
    }

    pub async fn list_release_assets(&self, owner: &str, repo: &str, release_id: u64) -> Result<Vec<Asset>> {
        let url = format!("{}/repos/{owner}/{repo}/releases/{release_id}/assets", self.api_base);
        let resp = self.send_with_retry(|| self.http.get(&url)).await?;
        Ok(resp.json().await?)
    }

    pub async fn upload_asset(&self, upload_url: &str, filename: &str, content: Vec<u8>) -> Result<Asset> {
        let url = resolve_upload_url(upload_url, filename)?;
        let content_len = content.len();
        let resp = self
            .send_with_retry(|| {
                self.http
                    .post(&url)
                    .header(header::CONTENT_TYPE, "application/octet-stream")
                    .body(content.clone())
            })
            .await
            .map_err(|e| Error::UploadFailed(format!("{filename} ({content_len} bytes): {e}")))?;
        Ok(resp.json().await?)
    }
}

fn read_rate_limit(response: &Response) -> Option<RateLimit> {
    let remaining = response
        .headers()
        .get("x-ratelimit-remaining")?
        .to_str()
        .ok()?
        .parse()
        .ok()?;
    let reset = response
        .headers()
        .get("x-ratelimit-reset")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);
    Some(RateLimit { remaining, reset })
}

/// Strip an RFC-6570 template suffix (e.g. `{?name,label}`), add `?name=<filename>`,
/// and substitute a known API host for an uploads host if needed.
fn resolve_upload_url(upload_url: &str, filename: &str) -> Result<String> {
    let base = match upload_url.find('{') {
        Some(idx) => &upload_url[..idx],
        None => upload_url,
    };
    if base.is_empty() {
        return Err(Error::InvalidUploadUrl(upload_url.to_string()));
    }

    let encoded = urlencode(filename);
    let base = base.replace("api.github.com/repos", "uploads.github.com/repos");
    Ok(format!("{base}?name={encoded}"))
}

fn urlencode(s: &str) -> String {
    s.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '~') {
                c.to_string()
            } else {
                format!("%{:02X}", c as u32)
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_rfc6570_template_and_adds_name_param() {
        let url = resolve_upload_url(
            "https://uploads.github.com/repos/o/r/releases/1/assets{?name,label}",
            "tool.tar.gz",
        )
        .unwrap();
        assert_eq!(url, "https://uploads.github.com/repos/o/r/releases/1/assets?name=tool.tar.gz");
    }

    #[test]
    fn substitutes_api_host_for_uploads_host() {
        let url = resolve_upload_url(
            "https://api.github.com/repos/o/r/releases/1/assets{?name}",
            "a b.tar.gz",
        )
        .unwrap();
        assert!(url.starts_with("https://uploads.github.com/"));
        assert!(url.contains("name=a%20b.tar.gz"));
    }

    #[test]
    fn rejects_empty_base_url() {
        assert!(resolve_upload_url("{?name}", "tool.tar.gz").is_err());
    }
}
