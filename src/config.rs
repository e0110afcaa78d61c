//! `ContextConfig` — a `serde`/`toml`-deserializable snapshot used to seed a
//! fresh [`crate::context::Context`] with transport, timeout, and option
//! defaults (spec.md §4.1 "additional notes" — "an optional `ContextConfig`
//! snapshot used only to seed defaults; once a `Context` is built, further
//! changes go through the §4.1 setters, not the config").
//!
//! Grounded on this crate's own teacher-lineage `policy_loader`'s
//! load-from-file shape: a `thiserror` error enum wrapping IO and parse
//! failures, and a `load` entry point that reads the whole file before
//! handing it to the format parser. This engine reads TOML rather than
//! JSON, matching the teacher's own `toml = "0.8"` dependency.

use crate::context::{Context, PopoMethod};
use crate::protect::pbmac::DigestAlg;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Failures loading or parsing a [`ContextConfig`] file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error reading config: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// A host application's CMP client profile, the way it would appear on disk
/// as e.g. `cmp-client.toml`. Every field is optional or carries a default
/// matching [`Context`]'s own `Default` impl, so a profile only needs to
/// name the settings it wants to override.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    // --- transport ---
    pub server_name: Option<String>,
    pub server_port: Option<u16>,
    pub server_path: Option<String>,
    pub proxy_name: Option<String>,
    pub proxy_port: Option<u16>,
    pub msg_timeout_secs: Option<u64>,
    pub total_timeout_secs: Option<u64>,

    // --- server authentication ---
    pub unprotected_errors: bool,
    pub ignore_key_usage: bool,
    pub permit_ta_in_extra_certs_for_ir: bool,

    // --- client protection ---
    pub unprotected_send: bool,

    // --- header/session options ---
    pub implicit_confirm: bool,
    pub disable_confirm: bool,

    // --- certificate template options ---
    pub validity_days: Option<u32>,
    pub subject_alt_name_nodefault: bool,
    pub subject_alt_name_critical: bool,
    pub policies_critical: bool,
    pub popo_method: PopoMethod,
    pub digest_alg: Option<DigestAlg>,

    // --- revocation ---
    pub revocation_reason: Option<i32>,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            server_name: None,
            server_port: None,
            server_path: None,
            proxy_name: None,
            proxy_port: None,
            msg_timeout_secs: None,
            total_timeout_secs: None,
            unprotected_errors: false,
            ignore_key_usage: false,
            permit_ta_in_extra_certs_for_ir: false,
            unprotected_send: false,
            implicit_confirm: false,
            disable_confirm: false,
            validity_days: None,
            subject_alt_name_nodefault: false,
            subject_alt_name_critical: false,
            policies_critical: false,
            popo_method: PopoMethod::default(),
            digest_alg: None,
            revocation_reason: None,
        }
    }
}

impl ContextConfig {
    /// Parse a profile from its TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Read and parse a profile from `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Seed a fresh [`Context`] with this profile's settings.
    pub fn into_context(self) -> Context {
        let mut ctx = Context::new();
        match (self.server_name, self.server_port, self.server_path) {
            (Some(name), Some(port), Some(path)) => ctx = ctx.set_server(name, port, path),
            (name, port, path) => {
                ctx.server_name = name;
                ctx.server_port = port;
                ctx.server_path = path;
            }
        }
        ctx.proxy_name = self.proxy_name;
        ctx.proxy_port = self.proxy_port;
        ctx.msg_timeout = self.msg_timeout_secs.map(Duration::from_secs);
        ctx.total_timeout = self.total_timeout_secs.map(Duration::from_secs);

        ctx.unprotected_errors = self.unprotected_errors;
        ctx.ignore_key_usage = self.ignore_key_usage;
        ctx.permit_ta_in_extra_certs_for_ir = self.permit_ta_in_extra_certs_for_ir;

        ctx.unprotected_send = self.unprotected_send;

        ctx.implicit_confirm = self.implicit_confirm;
        ctx.disable_confirm = self.disable_confirm;

        ctx.days = self.validity_days;
        ctx.subject_alt_name_nodefault = self.subject_alt_name_nodefault;
        ctx.set_subject_alt_name_critical = self.subject_alt_name_critical;
        ctx.policies_critical = self.policies_critical;
        ctx.popo_method = self.popo_method;
        ctx.digest_alg = self.digest_alg;

        ctx.revocation_reason = self.revocation_reason;

        ctx
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_round_trips_through_toml() {
        let config = ContextConfig::default();
        let text = toml::to_string(&config).unwrap();
        let parsed = ContextConfig::from_toml_str(&text).unwrap();
        assert_eq!(parsed.implicit_confirm, config.implicit_confirm);
        assert_eq!(parsed.popo_method, config.popo_method);
    }

    #[test]
    fn partial_profile_overrides_only_named_fields() {
        let text = r#"
            server_name = "ca.example.com"
            server_port = 8443
            server_path = "/cmp"
            implicit_confirm = true
            msg_timeout_secs = 30
        "#;
        let config = ContextConfig::from_toml_str(text).unwrap();
        let ctx = config.into_context();
        assert_eq!(ctx.server_name.as_deref(), Some("ca.example.com"));
        assert_eq!(ctx.server_port, Some(8443));
        assert!(ctx.implicit_confirm);
        assert_eq!(ctx.msg_timeout, Some(Duration::from_secs(30)));
        assert!(!ctx.disable_confirm);
    }

    #[test]
    fn load_reports_io_error_for_missing_file() {
        let err = ContextConfig::load("/nonexistent/path/to/cmp-client.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
