//! Minimal GitHub REST client.

use crate::Result;
use crate::governor::{Metered, QuotaExhausted, QuotaStatus};
use ohno::{EnrichableExt, IntoAppError, app_err};
use reqwest::StatusCode;
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue, LINK};
use url::Url;

const LOG_TARGET: &str = "    github";

pub const DEFAULT_API_URL: &str = "https://api.github.com";

/// Outcome of one API call.
#[derive(Debug)]
pub enum ApiResult<T> {
    Success(T, Option<QuotaStatus>),

    /// 404, or 409 for an empty repository.
    NotFound(Option<QuotaStatus>),

    /// 403 or 429 with the quota used up.
    RateLimited(Option<QuotaStatus>),

    Failed(ohno::AppError, Option<QuotaStatus>),
}

impl<T> ApiResult<T> {
    /// Fold into a metered result, where `None` means the resource does not exist.
    pub fn into_metered(self, what: impl FnOnce() -> String) -> Result<Metered<Option<T>>> {
        match self {
            Self::Success(value, quota) => Ok(Metered::new(Some(value), quota)),
            Self::NotFound(quota) => Ok(Metered::new(None, quota)),
            Self::RateLimited(Some(quota)) => Err(ohno::AppError::new(QuotaExhausted { quota }).enrich_with(|| format!("GitHub refused {}", what()))),
            Self::RateLimited(None) => Err(app_err!("GitHub rate limit exhausted while {}, quota resets at an unknown time", what())),
            Self::Failed(e, _) => Err(e.enrich_with(what)),
        }
    }
}

/// A page of results and the URL of the next page, if any.
#[derive(Debug)]
pub struct Page<T> {
    pub items: T,
    pub next: Option<Url>,
    pub last: Option<Url>,
}

/// GitHub API client. Every method issues exactly one request.
#[derive(Debug, Clone)]
#[expect(clippy::struct_field_names, reason = "client field stores the underlying HTTP client")]
pub struct GitHubClient {
    client: reqwest::Client,
    base_url: Url,
}

impl GitHubClient {
    /// Create a client with an optional token, against `base_url` (normally [`DEFAULT_API_URL`]).
    pub fn new(token: Option<&str>, base_url: &str) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let _ = headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));

        if let Some(t) = token {
            let mut auth_val = HeaderValue::from_str(&format!("token {t}")).into_app_err("invalid characters in GitHub token")?;
            auth_val.set_sensitive(true);
            let _ = headers.insert(AUTHORIZATION, auth_val);
        }

        let client = reqwest::Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .build()
            .into_app_err("unable to create HTTP client")?;

        let base = format!("{}/", base_url.trim_end_matches('/'));
        let base_url = Url::parse(&base).into_app_err_with(|| format!("invalid GitHub API URL '{base_url}'"))?;

        Ok(Self { client, base_url })
    }

    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Build an API URL from path segments and query pairs. Segments are percent-encoded.
    pub fn endpoint<'a>(&self, segments: impl IntoIterator<Item = &'a str>, query: &[(&str, &str)]) -> Result<Url> {
        let mut url = self.base_url.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|()| app_err!("GitHub API URL '{}' cannot take a path", self.base_url))?;
            let _ = path.pop_if_empty();
            let _ = path.extend(segments);
        }

        if !query.is_empty() {
            let _ = url.query_pairs_mut().extend_pairs(query);
        }

        Ok(url)
    }

    /// GET `url` and classify the response.
    pub async fn api_call(&self, url: &Url) -> ApiResult<reqwest::Response> {
        log::debug!(target: LOG_TARGET, "GET {url}");

        let resp = match self.client.get(url.clone()).send().await {
            Ok(r) => r,
            Err(e) => return ApiResult::Failed(ohno::AppError::new(e).enrich(format!("requesting {url}")), None),
        };

        let quota = QuotaStatus::from_headers(resp.headers());
        let status = resp.status();

        if status.is_success() {
            return ApiResult::Success(resp, quota);
        }

        if matches!(status, StatusCode::NOT_FOUND | StatusCode::CONFLICT) {
            return ApiResult::NotFound(quota);
        }

        if status == StatusCode::TOO_MANY_REQUESTS || (status == StatusCode::FORBIDDEN && quota.is_some_and(|q| q.remaining == 0)) {
            log::warn!(target: LOG_TARGET, "Rate limited by GitHub on {url}");
            return ApiResult::RateLimited(quota);
        }

        ApiResult::Failed(app_err!("GitHub returned {status} for {url}"), quota)
    }

    /// GET `url` and decode a JSON body, keeping the pagination links.
    pub async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &Url) -> ApiResult<Page<T>> {
        let (resp, quota) = match self.api_call(url).await {
            ApiResult::Success(resp, quota) => (resp, quota),
            ApiResult::NotFound(quota) => return ApiResult::NotFound(quota),
            ApiResult::RateLimited(quota) => return ApiResult::RateLimited(quota),
            ApiResult::Failed(e, quota) => return ApiResult::Failed(e, quota),
        };

        let link = resp.headers().get(LINK).and_then(|h| h.to_str().ok()).map(str::to_string);

        match resp.json::<T>().await {
            Ok(items) => ApiResult::Success(
                Page {
                    items,
                    next: link.as_deref().and_then(|l| link_for(l, "next")),
                    last: link.as_deref().and_then(|l| link_for(l, "last")),
                },
                quota,
            ),
            Err(e) => ApiResult::Failed(ohno::AppError::new(e).enrich(format!("decoding response from {url}")), quota),
        }
    }
}

/// Find the URL with relation `rel` in an RFC 8288 `Link` header.
fn link_for(header: &str, rel: &str) -> Option<Url> {
    let wanted = format!("rel=\"{rel}\"");
    header.split(',').find_map(|part| {
        let (target, params) = part.split_once(';')?;
        if !params.split(';').any(|p| p.trim() == wanted) {
            return None;
        }

        let target = target.trim().strip_prefix('<')?.strip_suffix('>')?;
        Url::parse(target).ok()
    })
}
