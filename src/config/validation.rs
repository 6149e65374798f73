//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Detect half-configured TLS and duplicate bind addresses
//! - Validate value ranges (shutdown timeout > 0)
//! - Reject malformed trusted proxies when the policy says to abort
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServiceConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;

use ipnet::IpNet;

use crate::config::schema::{InvalidTrustPolicy, ServiceConfig};

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("listener #{index} has an empty address")]
    EmptyAddress { index: usize },

    #[error("listener {address} sets only one of tls_cert_path / tls_key_path")]
    PartialTls { address: String },

    #[error("listener address {address} is configured more than once")]
    DuplicateAddress { address: String },

    #[error("listener {address} has invalid trusted proxy {cidr:?}")]
    InvalidTrustedProxy { address: String, cidr: String },

    #[error("shutdown.timeout_secs must be greater than zero")]
    ZeroShutdownTimeout,
}

/// Check `config` and collect every problem found.
pub fn validate_config(config: &ServiceConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let mut seen = HashSet::new();

    for (index, listener) in config.listeners.iter().enumerate() {
        let address = listener.address.trim();
        if address.is_empty() {
            errors.push(ValidationError::EmptyAddress { index });
            continue;
        }

        if !seen.insert(address) {
            errors.push(ValidationError::DuplicateAddress {
                address: address.to_string(),
            });
        }

        let has_cert = listener.tls_cert_path.as_ref().is_some_and(|p| !p.as_os_str().is_empty());
        let has_key = listener.tls_key_path.as_ref().is_some_and(|p| !p.as_os_str().is_empty());
        if has_cert != has_key {
            errors.push(ValidationError::PartialTls {
                address: address.to_string(),
            });
        }

        if config.trust.on_invalid == InvalidTrustPolicy::Abort {
            for cidr in &listener.trusted_proxies {
                if cidr.trim().parse::<IpNet>().is_err() {
                    errors.push(ValidationError::InvalidTrustedProxy {
                        address: address.to_string(),
                        cidr: cidr.clone(),
                    });
                }
            }
        }
    }

    if config.shutdown.timeout_secs == 0 {
        errors.push(ValidationError::ZeroShutdownTimeout);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
