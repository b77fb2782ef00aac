//! Controller configuration, read from environment variables at start-up.

use crate::error::ControllerError;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Default prefix of pod annotations naming a claim: `<prefix>/<port-name>: <claim>`
pub const DEFAULT_CLAIM_ANNOTATION_PREFIX: &str = "claim.hostport.microscaler.io";
/// Default prefix of pod annotations recording an injected port
pub const DEFAULT_PORT_ANNOTATION_PREFIX: &str = "port.hostport.microscaler.io";

/// Pod annotation prefixes used by the pod webhook and the claim reconciler
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotationPrefixes {
    /// Prefix of annotations naming a claim
    pub claim: String,
    /// Prefix of annotations recording an injected port number
    pub port: String,
}

impl Default for AnnotationPrefixes {
    fn default() -> Self {
        Self {
            claim: DEFAULT_CLAIM_ANNOTATION_PREFIX.to_string(),
            port: DEFAULT_PORT_ANNOTATION_PREFIX.to_string(),
        }
    }
}

/// TLS material for the webhook server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsPaths {
    pub cert: PathBuf,
    pub key: PathBuf,
}

/// Runtime configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub annotations: AnnotationPrefixes,
    pub webhook_enabled: bool,
    pub webhook_addr: SocketAddr,
    /// `None` serves plain HTTP (TLS terminated in front of the pod)
    pub webhook_tls: Option<TlsPaths>,
    /// Concurrent reconciles per kind
    pub concurrency: u16,
    pub backoff_min_seconds: u64,
    pub backoff_max_seconds: u64,
    /// Requeue delay after an optimistic concurrency conflict
    pub conflict_requeue: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            annotations: AnnotationPrefixes::default(),
            webhook_enabled: true,
            webhook_addr: SocketAddr::from(([0, 0, 0, 0], 9443)),
            webhook_tls: None,
            concurrency: 3,
            backoff_min_seconds: 5,
            backoff_max_seconds: 300,
            conflict_requeue: Duration::from_secs(1),
        }
    }
}

impl Config {
    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self, ControllerError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through `lookup`, falling back to defaults
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ControllerError> {
        let defaults = Self::default();

        let annotations = AnnotationPrefixes {
            claim: lookup("CLAIM_ANNOTATION_PREFIX").unwrap_or(defaults.annotations.claim),
            port: lookup("PORT_ANNOTATION_PREFIX").unwrap_or(defaults.annotations.port),
        };
        if annotations.claim == annotations.port {
            return Err(ControllerError::InvalidConfig(
                "CLAIM_ANNOTATION_PREFIX and PORT_ANNOTATION_PREFIX must differ".to_string(),
            ));
        }

        let webhook_tls = match (lookup("WEBHOOK_CERT_PATH"), lookup("WEBHOOK_KEY_PATH")) {
            (Some(cert), Some(key)) => Some(TlsPaths {
                cert: cert.into(),
                key: key.into(),
            }),
            (None, None) => None,
            _ => {
                return Err(ControllerError::InvalidConfig(
                    "WEBHOOK_CERT_PATH and WEBHOOK_KEY_PATH must be set together".to_string(),
                ));
            }
        };

        let backoff_min_seconds = parse(&lookup, "BACKOFF_MIN_SECONDS", defaults.backoff_min_seconds)?;
        let backoff_max_seconds = parse(&lookup, "BACKOFF_MAX_SECONDS", defaults.backoff_max_seconds)?;
        if backoff_min_seconds == 0 || backoff_min_seconds > backoff_max_seconds {
            return Err(ControllerError::InvalidConfig(format!(
                "backoff bounds must satisfy 0 < min <= max (got {backoff_min_seconds}..{backoff_max_seconds})"
            )));
        }

        Ok(Self {
            annotations,
            webhook_enabled: parse(&lookup, "WEBHOOK_ENABLED", defaults.webhook_enabled)?,
            webhook_addr: parse(&lookup, "WEBHOOK_ADDR", defaults.webhook_addr)?,
            webhook_tls,
            concurrency: parse(&lookup, "RECONCILE_CONCURRENCY", defaults.concurrency)?,
            backoff_min_seconds,
            backoff_max_seconds,
            conflict_requeue: Duration::from_secs(parse(
                &lookup,
                "CONFLICT_REQUEUE_SECONDS",
                defaults.conflict_requeue.as_secs(),
            )?),
        })
    }
}

fn parse<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T, ControllerError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| ControllerError::InvalidConfig(format!("{key}={raw}: {e}"))),
        None => Ok(default),
    }
}
