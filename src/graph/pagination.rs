//! Cursor-following pagination
//!
//! List endpoints answer with
//!
//! ```text
//! { "data": [ ... ], "paging": { "next": "https://graph.facebook.com/v2.11/...&after=..." } }
//! ```
//!
//! The walk below fetches pages one after the other, since the next cursor
//! is only known once the previous page arrived, and returns every item in
//! page order. It is bounded twice: a cursor that was already visited ends
//! the walk with `PaginationLoop`, and more than `max_pages` pages ends it
//! with `PageLimitExceeded`. Any error discards what was accumulated so far.

use std::collections::HashSet;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info, instrument};
use url::Url;

use crate::error::{Error, GraphApiError, PaginationError, Result};
use crate::graph::config::{GraphConfig, OperationClass};
use crate::graph::transport::Transport;

const ACCESS_TOKEN_PARAM: &str = "access_token";

/// Fetch every page of a list endpoint and return the items in order.
///
/// `path` is either relative to the API root (`/me/custom_labels?fields=name`)
/// or an absolute URL under it.
#[instrument(skip(transport, config, access_token), fields(max_pages = config.max_pages))]
pub async fn fetch_all<T, R>(
    transport: &R,
    config: &GraphConfig,
    path: &str,
    access_token: &str,
) -> Result<Vec<T>>
where
    T: DeserializeOwned,
    R: Transport + ?Sized,
{
    let first = relativize(config, path)
        .map_err(|reason| Error::config(format!("request path {path}: {reason}")))?;
    let timeout = config.timeout_for(OperationClass::Read);

    let mut items = Vec::new();
    let mut visited = HashSet::new();
    let mut next = Some(resolve(config, &first)?);
    let mut page = 0;

    while let Some(url) = next.take() {
        if page == config.max_pages {
            return Err(PaginationError::PageLimitExceeded {
                limit: config.max_pages,
            }
            .into());
        }
        page += 1;

        let key = url.to_string();
        if !visited.insert(key.clone()) {
            return Err(PaginationError::PaginationLoop { cursor: key }.into());
        }

        let body = transport
            .get(with_access_token(url, access_token), timeout)
            .await?;
        if let Some(err) = GraphApiError::from_body(&body) {
            return Err(err.into());
        }

        let (data, cursor) = split_page::<T>(body, page)?;
        debug!(page, items = data.len(), has_next = cursor.is_some(), "Page fetched");
        items.extend(data);

        next = match cursor {
            Some(cursor) => {
                let relative = relativize(config, &cursor)
                    .map_err(|reason| PaginationError::MalformedPage { page, reason })?;
                Some(resolve(config, &relative)?)
            }
            None => None,
        };
    }

    info!(pages = page, items = items.len(), "Pagination complete");
    Ok(items)
}

/// Split a page body into its typed items and the continuation cursor
fn split_page<T: DeserializeOwned>(body: Value, page: usize) -> Result<(Vec<T>, Option<String>)> {
    let Value::Object(mut body) = body else {
        return Err(malformed(page, "page body is not an object"));
    };

    let data = match body.remove("data") {
        Some(data @ Value::Array(_)) => data,
        Some(_) => return Err(malformed(page, "`data` is not an array")),
        None => return Err(malformed(page, "missing `data`")),
    };
    let data: Vec<T> = serde_json::from_value(data)
        .map_err(|e| malformed(page, &format!("invalid item in `data`: {e}")))?;

    let cursor = body
        .get("paging")
        .and_then(|paging| paging.get("next"))
        .and_then(Value::as_str)
        .filter(|next| !next.is_empty())
        .map(str::to_string);

    Ok((data, cursor))
}

fn malformed(page: usize, reason: &str) -> Error {
    PaginationError::MalformedPage {
        page,
        reason: reason.to_string(),
    }
    .into()
}

/// Express a cursor relative to the configured API root.
///
/// Absolute cursors lose their scheme and host. Every cursor must live under
/// the root's path, and a relative one naming another API version is
/// rejected; `https://graph.facebook.com/v2.11/me/labels?after=x` becomes
/// `/me/labels?after=x` for a root of `.../v2.11`.
pub fn relativize(config: &GraphConfig, cursor: &str) -> std::result::Result<String, String> {
    let root_path = config.root_path();

    let (path, query) = match Url::parse(cursor) {
        Ok(url) => (url.path().to_string(), url.query().map(str::to_string)),
        Err(url::ParseError::RelativeUrlWithoutBase) => match cursor.split_once('?') {
            Some((path, query)) => (path.to_string(), Some(query.to_string())),
            None => (cursor.to_string(), None),
        },
        Err(e) => return Err(format!("invalid cursor {cursor}: {e}")),
    };
    let path = if path.starts_with('/') {
        path
    } else {
        format!("/{path}")
    };

    let relative = if root_path.is_empty() {
        path.as_str()
    } else if path == root_path {
        "/"
    } else if let Some(rest) = path.strip_prefix(root_path).filter(|rest| rest.starts_with('/')) {
        rest
    } else if cursor.contains("://") || starts_with_version(&path) {
        return Err(format!("cursor {cursor} is outside the API root {root_path}"));
    } else {
        path.as_str()
    };

    Ok(match query {
        Some(query) => format!("{relative}?{query}"),
        None => relative.to_string(),
    })
}

/// Whether the first path segment is an API version such as `v9.0`
fn starts_with_version(path: &str) -> bool {
    let segment = path.trim_start_matches('/').split('/').next().unwrap_or_default();
    segment.strip_prefix('v').is_some_and(|rest| {
        rest.starts_with(|c: char| c.is_ascii_digit())
            && rest.chars().all(|c| c.is_ascii_digit() || c == '.')
    })
}

/// Join a relative path onto the API root, dropping any access token it carries
pub fn resolve(config: &GraphConfig, relative: &str) -> Result<Url> {
    let base = config.api_root.as_str().trim_end_matches('/');
    let url = Url::parse(&format!("{base}{relative}"))
        .map_err(|e| Error::config(format!("cannot resolve {relative}: {e}")))?;
    Ok(strip_access_token(url))
}

fn strip_access_token(mut url: Url) -> Url {
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| key != ACCESS_TOKEN_PARAM)
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();

    if kept.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(kept);
    }
    url
}

/// Set the `access_token` query parameter, replacing one already present
pub fn with_access_token(url: Url, access_token: &str) -> Url {
    let mut url = strip_access_token(url);
    url.query_pairs_mut()
        .append_pair(ACCESS_TOKEN_PARAM, access_token);
    url
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> GraphConfig {
        GraphConfig::default()
    }

    #[test]
    fn test_relativize_absolute_cursor() {
        let relative = relativize(
            &config(),
            "https://graph.facebook.com/v2.11/me/custom_labels?fields=name&limit=25&after=QVFIU",
        )
        .unwrap();
        assert_eq!(relative, "/me/custom_labels?fields=name&limit=25&after=QVFIU");
    }

    #[test]
    fn test_relativize_ignores_upstream_host() {
        let relative =
            relativize(&config(), "https://other.example.com/v2.11/me/x?after=1").unwrap();
        assert_eq!(relative, "/me/x?after=1");
    }

    #[test]
    fn test_relativize_relative_paths() {
        assert_eq!(
            relativize(&config(), "/me/custom_labels?fields=name").unwrap(),
            "/me/custom_labels?fields=name"
        );
        assert_eq!(
            relativize(&config(), "me/custom_labels").unwrap(),
            "/me/custom_labels"
        );
        assert_eq!(
            relativize(&config(), "/v2.11/me/custom_labels").unwrap(),
            "/me/custom_labels"
        );
    }

    #[test]
    fn test_relativize_rejects_foreign_root() {
        let err = relativize(&config(), "https://graph.facebook.com/v3.2/me/x").unwrap_err();
        assert!(err.contains("outside the API root"));

        let err = relativize(&config(), "https://graph.facebook.com/v2.110/me/x").unwrap_err();
        assert!(err.contains("outside the API root"));
    }

    #[test]
    fn test_relativize_rejects_foreign_root_in_relative_cursor() {
        let err = relativize(&config(), "/v9.0/me/x?after=B").unwrap_err();
        assert!(err.contains("outside the API root"));

        assert!(relativize(&config(), "v2.110/me/x").is_err());
        assert_eq!(relativize(&config(), "/videos/me").unwrap(), "/videos/me");
        assert_eq!(relativize(&config(), "/v2.11?after=B").unwrap(), "/?after=B");
    }

    #[test]
    fn test_resolve_onto_root() {
        let url = resolve(&config(), "/me/custom_labels?fields=name").unwrap();
        assert_eq!(
            url.as_str(),
            "https://graph.facebook.com/v2.11/me/custom_labels?fields=name"
        );
    }

    #[test]
    fn test_access_token_replaced() {
        let url =
            Url::parse("https://graph.facebook.com/v2.11/me/x?access_token=old&after=A").unwrap();
        let url = with_access_token(url, "new");

        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        assert_eq!(
            pairs,
            vec![
                ("after".to_string(), "A".to_string()),
                ("access_token".to_string(), "new".to_string()),
            ]
        );
    }

    #[test]
    fn test_resolve_drops_token_from_cursor() {
        let url = resolve(&config(), "/me/x?access_token=abc").unwrap();
        assert_eq!(url.query(), None);
    }

    #[test]
    fn test_split_page_requires_data() {
        let err = split_page::<Value>(serde_json::json!({"paging": {}}), 2).unwrap_err();
        assert!(matches!(
            err,
            Error::Pagination(PaginationError::MalformedPage { page: 2, .. })
        ));
    }

    #[test]
    fn test_split_page_empty_next_is_end() {
        let (data, cursor) = split_page::<Value>(
            serde_json::json!({"data": [1, 2], "paging": {"next": ""}}),
            1,
        )
        .unwrap();
        assert_eq!(data.len(), 2);
        assert_eq!(cursor, None);
    }
}
