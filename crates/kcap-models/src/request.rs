//! Capture request and webhook descriptor models.
//!
//! A request is validated in full before any job is submitted; a single
//! invalid field rejects the whole request.

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use url::Url;
use validator::{Validate, ValidationError};

/// Character set accepted by the cluster for label values.
pub const K8S_LABEL_PATTERN: &str = "^(([A-Za-z0-9][-A-Za-z0-9_.]*)?[A-Za-z0-9])?$";

static K8S_LABEL_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(K8S_LABEL_PATTERN).expect("valid label pattern"));

/// Maximum URL length accepted in a capture request.
const MAX_URL_LENGTH: usize = 2048;

/// Digest algorithms accepted for webhook signing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SigningAlgorithm {
    Sha1,
    Sha224,
    Sha256,
    Sha384,
    Sha512,
}

impl SigningAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            SigningAlgorithm::Sha1 => "sha1",
            SigningAlgorithm::Sha224 => "sha224",
            SigningAlgorithm::Sha256 => "sha256",
            SigningAlgorithm::Sha384 => "sha384",
            SigningAlgorithm::Sha512 => "sha512",
        }
    }
}

/// A callback to notify when a capture job completes.
///
/// Consumed read-only by the worker; the orchestration core passes the
/// serialized list through in the worker environment and never stores it.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
#[validate(schema(function = validate_signing_fields))]
pub struct Webhook {
    /// URL to notify when the capture job is complete.
    #[validate(url(message = "callbackUrl must be a valid URL"))]
    pub callback_url: String,

    /// Key to use when signing the webhook notification.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signing_key: Option<String>,

    /// Algorithm to use when signing the webhook notification.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signing_key_algorithm: Option<SigningAlgorithm>,

    /// Opaque user data echoed back verbatim in the notification.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_data_field: Option<String>,
}

/// Signing key and algorithm go together or not at all.
fn validate_signing_fields(webhook: &Webhook) -> Result<(), ValidationError> {
    if webhook.signing_key.is_some() != webhook.signing_key_algorithm.is_some() {
        let mut err = ValidationError::new("signing_fields");
        err.message = Some(Cow::from(
            "Please specify both signingKey and signingKeyAlgorithm.",
        ));
        return Err(err);
    }
    Ok(())
}

/// A request to capture one or more target URLs.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CaptureRequest {
    /// URLs to capture. Permitted schemes: http or https.
    #[validate(
        length(min = 1, message = "at least one URL is required"),
        custom(function = validate_capture_urls)
    )]
    pub urls: Vec<String>,

    /// Username or user id labeling the launched jobs, for filtered listing.
    #[serde(default)]
    #[validate(regex(
        path = *K8S_LABEL_REGEX,
        message = "userid must consist of alphanumeric characters, '-', '_' or '.', and must start and end with an alphanumeric character"
    ))]
    pub userid: String,

    /// Free-text tag annotating the launched jobs.
    #[serde(default)]
    pub tag: String,

    /// Capture the auxiliary embed view of each URL as well.
    #[serde(default)]
    pub embeds: bool,

    /// Callbacks to notify when each capture job completes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(nested)]
    pub webhooks: Option<Vec<Webhook>>,
}

fn validate_capture_urls(urls: &Vec<String>) -> Result<(), ValidationError> {
    for raw in urls {
        if raw.len() > MAX_URL_LENGTH {
            let mut err = ValidationError::new("url_too_long");
            err.message = Some(Cow::from(format!(
                "URL exceeds maximum length of {} characters",
                MAX_URL_LENGTH
            )));
            return Err(err);
        }
        let parsed = Url::parse(raw).map_err(|_| {
            let mut err = ValidationError::new("malformed_url");
            err.message = Some(Cow::from(format!("'{}' is not a valid URL", raw)));
            err
        })?;
        if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
            let mut err = ValidationError::new("unsupported_url");
            err.message = Some(Cow::from(format!(
                "'{}' must be an absolute http or https URL",
                raw
            )));
            return Err(err);
        }
    }
    Ok(())
}

impl CaptureRequest {
    /// Convenience constructor for a single-URL request.
    pub fn single(url: impl Into<String>) -> Self {
        Self {
            urls: vec![url.into()],
            userid: String::new(),
            tag: String::new(),
            embeds: false,
            webhooks: None,
        }
    }

    /// Serialize the webhook list for the worker environment, if any.
    pub fn webhook_payload(&self) -> Option<String> {
        self.webhooks
            .as_ref()
            .filter(|hooks| !hooks.is_empty())
            .and_then(|hooks| serde_json::to_string(hooks).ok())
    }
}

/// Check a value against the cluster label character set.
pub fn is_label_safe(value: &str) -> bool {
    K8S_LABEL_REGEX.is_match(value)
}
