//! Shared HTTP plumbing for the REST drivers.

use std::fmt;

use reqwest::{Client, Response, StatusCode, Url};
use serde::Deserialize;

use crate::error::{Result, TransferError};

/// OAuth bearer token. Never printed.
#[derive(Clone)]
pub struct AccessToken(String);

impl AccessToken {
    /// Wrap a token value.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Read the token from an environment variable.
    ///
    /// A missing or empty variable is an authorization error.
    pub fn from_env(var: &str) -> Result<Self> {
        match std::env::var(var) {
            Ok(token) if !token.trim().is_empty() => Ok(Self(token.trim().to_string())),
            _ => Err(TransferError::Authorization(format!(
                "no access token: environment variable {} is not set",
                var
            ))),
        }
    }

    pub(crate) fn bearer(&self) -> String {
        format!("Bearer {}", self.0)
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken([REDACTED])")
    }
}

/// Build a URL from a base and path segments, percent-encoding each segment.
pub(crate) fn endpoint(base: &str, segments: &[&str]) -> Result<Url> {
    let mut url = Url::parse(base)
        .map_err(|e| TransferError::Config(format!("Invalid base URL {:?}: {}", base, e)))?;
    url.path_segments_mut()
        .map_err(|_| TransferError::Config(format!("Base URL {:?} cannot have a path", base)))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

/// Build the shared HTTP client.
pub(crate) fn build_client(timeout: std::time::Duration) -> Result<Client> {
    Ok(Client::builder().timeout(timeout).build()?)
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: ErrorDetail,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    message: String,
    #[serde(default)]
    errors: Vec<ErrorItem>,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorItem {
    #[serde(default)]
    reason: String,
}

/// Map a transport failure to the error taxonomy.
pub(crate) fn transport_error(context: &str, err: reqwest::Error) -> TransferError {
    if err.is_connect() || err.is_timeout() {
        TransferError::Connectivity(format!("{}: {}", context, err))
    } else {
        TransferError::Http(err)
    }
}

/// Pass through successful responses; turn error statuses into errors.
pub(crate) async fn check_status(context: &str, response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body: ErrorBody = response.json().await.unwrap_or_default();
    let message = if body.error.message.is_empty() {
        status.to_string()
    } else {
        body.error.message
    };
    let reason = body
        .error
        .errors
        .first()
        .map(|e| e.reason.clone())
        .unwrap_or_default();

    Err(match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            TransferError::Authorization(format!("{}: {}", context, message))
        }
        StatusCode::NOT_FOUND => TransferError::reference(format!("{}: {}", context, message)),
        _ => TransferError::job(context, reason_or_status(&reason, status), message),
    })
}

fn reason_or_status(reason: &str, status: StatusCode) -> String {
    if reason.is_empty() {
        format!("http {}", status.as_u16())
    } else {
        reason.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_debug_is_redacted() {
        let token = AccessToken::new("ya29.super-secret");
        let debug_output = format!("{:?}", token);
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("super-secret"));
        assert_eq!(token.bearer(), "Bearer ya29.super-secret");
    }

    #[test]
    fn test_missing_token_env() {
        let err = AccessToken::from_env("BQ_TRANSFER_TEST_TOKEN_THAT_IS_NEVER_SET").unwrap_err();
        assert!(matches!(err, TransferError::Authorization(_)));
    }

    #[test]
    fn test_endpoint_encodes_segments() {
        let url = endpoint(
            "https://storage.googleapis.com",
            &["storage", "v1", "b", "bucket", "o", "dir/file name.csv"],
        )
        .unwrap();
        assert_eq!(
            url.as_str(),
            "https://storage.googleapis.com/storage/v1/b/bucket/o/dir%2Ffile%20name.csv"
        );

        let url = endpoint("http://127.0.0.1:9000/", &["bigquery", "v2"]).unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:9000/bigquery/v2");
    }

    #[test]
    fn test_bad_base_url() {
        assert!(endpoint("not a url", &["x"]).is_err());
    }
}
