//! Session configuration and running state shared across one CMP
//! transaction (grounded on `OSSL_CMP_CTX` /
//! `examples/original_source/crypto/cmp/cmp_int.h`, restructured into
//! owned Rust fields instead of a C struct of raw pointers and int flags).
//!
//! OpenSSL's `OSSL_CMP_CTX_set1_*` / `OSSL_CMP_CTX_set0_*` naming
//! distinction — `set1` clones its input, `set0` takes ownership — maps
//! directly onto Rust's move vs. `Clone` semantics, so the builder methods
//! below just take owned values; callers `clone()` up front if they still
//! need their own copy, same as a `set1_*` caller would.

use crate::asn1::body::{PkiFailureInfo, PkiStatus};
use crate::asn1::header::{GeneralName, InfoTypeAndValue};
use crate::error::{CmpError, Result};
use der::asn1::OctetString;
use std::time::Duration;
use x509_cert::Certificate;

/// Proof-of-possession mechanism selected for certificate requests
/// (`popoMethod` in `cmp_int.h`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PopoMethod {
    #[default]
    Signature,
    RaVerified,
    KeyEncipherment,
    KeyAgreement,
}

/// Which protection kind the context is configured to use. Mirrors the
/// OpenSSL distinction between `MSG_MAC_ALG` (PBM) and `MSG_SIG_ALG`
/// (signature), but as a typed enum rather than inferring it from which
/// optional fields happen to be set.
#[derive(Clone, Debug)]
pub enum ProtectionMethod {
    /// PBMAC using a shared secret (RFC 4210 §5.1.3.1 `PasswordBasedMac`).
    Pbmac {
        reference_value: OctetString,
        secret_value: Vec<u8>,
        salt_len: usize,
        owf: crate::protect::pbmac::DigestAlg,
        iteration_count: u32,
        mac: crate::protect::pbmac::MacAlg,
    },
    /// Signature using the client's own key pair and certificate.
    Signature {
        client_cert: Certificate,
        signing_key: crate::protect::signature::SigningKeyHandle,
    },
}

/// The enumerated options of spec.md §4.1's option table, as a typed enum
/// rather than an `(id, value)` pair — `OSSL_CMP_CTX_set_option` took an
/// integer id and an integer value; this replaces that with a closed set of
/// variants so a caller can't pass an id/value pair that doesn't exist.
#[derive(Clone, Copy, Debug)]
pub enum CmpOption {
    ImplicitConfirm(bool),
    DisableConfirm(bool),
    UnprotectedSend(bool),
    UnprotectedErrors(bool),
    ValidityDays(u32),
    SubjectAltNameNoDefault(bool),
    SubjectAltNameCritical(bool),
    PoliciesCritical(bool),
    IgnoreKeyUsage(bool),
    PopoMethod(PopoMethod),
    DigestAlg(crate::protect::pbmac::DigestAlg),
    MsgTimeout(u64),
    TotalTimeout(u64),
    PermitTaInExtraCertsForIr(bool),
    RevocationReason(i32),
}

/// Cached results of the last IP/CP/KUP/RP exchange (`lastPKIStatus`,
/// `lastStatusString`, `failInfoCode`, `newClCert`, `caPubs`,
/// `extraCertsIn` in `cmp_int.h`).
#[derive(Clone, Debug, Default)]
pub struct LastResponse {
    pub status: Option<PkiStatus>,
    pub status_string: Option<Vec<String>>,
    pub fail_info: Option<PkiFailureInfo>,
    pub new_cert: Option<Certificate>,
    pub ca_pubs: Option<Vec<Certificate>>,
    pub extra_certs_in: Option<Vec<Certificate>>,
}

/// The running context for one CMP transaction (spec.md §2, §6).
///
/// `Context` is the single mutable object threaded through header
/// construction, protection, transfer, and verification; a fresh
/// `transaction_id`/nonce pair starts a new transaction, so a `Context` is
/// normally built once per enrollment/revocation/general-message exchange
/// and then dropped.
#[derive(Clone, Debug, Default)]
pub struct Context {
    // --- transport ---
    pub server_path: Option<String>,
    pub server_name: Option<String>,
    pub server_port: Option<u16>,
    pub proxy_name: Option<String>,
    pub proxy_port: Option<u16>,
    pub msg_timeout: Option<Duration>,
    pub total_timeout: Option<Duration>,

    // --- server authentication ---
    pub unprotected_errors: bool,
    pub server_cert: Option<Certificate>,
    pub expected_sender: Option<GeneralName>,
    pub untrusted_certs: Vec<Certificate>,
    pub ignore_key_usage: bool,
    pub permit_ta_in_extra_certs_for_ir: bool,
    /// Trust anchors plus whatever path-validation/revocation logic the
    /// embedding application provides (spec.md §4.5's "trust store").
    pub trust_store: Option<std::sync::Arc<dyn crate::trust::TrustStore>>,
    /// Cached sender certificate from the last successful signature
    /// validation in this transaction (spec.md §3 "`validated_server_cert`
    /// cache"); cleared whenever its own acceptability re-check next fails.
    pub validated_server_cert: Option<Certificate>,

    // --- client authentication / protection ---
    pub unprotected_send: bool,
    pub protection: Option<ProtectionMethod>,

    // --- header state ---
    pub recipient: Option<GeneralName>,
    pub transaction_id: Option<OctetString>,
    pub last_sender_nonce: Option<OctetString>,
    pub recip_nonce: Option<OctetString>,
    pub geninfo_itavs: Vec<InfoTypeAndValue>,
    pub implicit_confirm: bool,
    pub disable_confirm: bool,
    pub extra_certs_out: Vec<Certificate>,

    // --- certificate template ---
    pub new_key: Option<crate::protect::signature::SigningKeyHandle>,
    pub issuer: Option<x509_cert::name::Name>,
    pub days: Option<u32>,
    pub subject_name: Option<x509_cert::name::Name>,
    pub subject_alt_names: Vec<GeneralName>,
    pub subject_alt_name_nodefault: bool,
    pub set_subject_alt_name_critical: bool,
    pub req_extensions: Option<x509_cert::ext::Extensions>,
    pub popo_method: PopoMethod,
    pub old_client_cert: Option<Certificate>,
    pub policies_critical: bool,
    pub cert_policies: Vec<der::asn1::ObjectIdentifier>,
    pub digest_alg: Option<crate::protect::pbmac::DigestAlg>,
    /// Raw DER of a PKCS#10 `CertificationRequest`, embedded verbatim by
    /// P10CR (spec.md §4.3).
    pub pkcs10_csr: Option<Vec<u8>>,

    // --- misc body contents ---
    pub revocation_reason: Option<i32>,
    pub genm_itavs: Vec<InfoTypeAndValue>,

    // --- result of last exchange ---
    pub last_response: LastResponse,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// `OSSL_CMP_CTX_set1_serverPath`/`set1_serverName`/`set_serverPort`.
    pub fn set_server(mut self, name: impl Into<String>, port: u16, path: impl Into<String>) -> Self {
        self.server_name = Some(name.into());
        self.server_port = Some(port);
        self.server_path = Some(path.into());
        self
    }

    pub fn set_proxy(mut self, name: impl Into<String>, port: u16) -> Self {
        self.proxy_name = Some(name.into());
        self.proxy_port = Some(port);
        self
    }

    pub fn set_msg_timeout(mut self, d: Duration) -> Self {
        self.msg_timeout = Some(d);
        self
    }

    pub fn set_total_timeout(mut self, d: Duration) -> Self {
        self.total_timeout = Some(d);
        self
    }

    /// `OSSL_CMP_CTX_set1_srvCert`.
    pub fn set_server_cert(mut self, cert: Certificate) -> Self {
        self.server_cert = Some(cert);
        self
    }

    pub fn set_expected_sender(mut self, name: GeneralName) -> Self {
        self.expected_sender = Some(name);
        self
    }

    pub fn add_untrusted_cert(mut self, cert: Certificate) -> Self {
        self.untrusted_certs.push(cert);
        self
    }

    /// Configure PBM-based protection (`OSSL_CMP_CTX_set1_referenceValue` +
    /// `set1_secretValue` + `set1_pbmac_params`).
    pub fn set_pbmac(
        mut self,
        reference_value: impl Into<Vec<u8>>,
        secret_value: impl Into<Vec<u8>>,
        owf: crate::protect::pbmac::DigestAlg,
        mac: crate::protect::pbmac::MacAlg,
        iteration_count: u32,
    ) -> Result<Self> {
        let reference_value = OctetString::new(reference_value.into())
            .map_err(|e| CmpError::InvalidArgs(e.to_string()))?;
        self.protection = Some(ProtectionMethod::Pbmac {
            reference_value,
            secret_value: secret_value.into(),
            salt_len: 16,
            owf,
            iteration_count,
            mac,
        });
        Ok(self)
    }

    /// Configure signature-based protection (`OSSL_CMP_CTX_set1_clCert` +
    /// `set1_pkey`).
    pub fn set_signature_protection(
        mut self,
        client_cert: Certificate,
        signing_key: crate::protect::signature::SigningKeyHandle,
    ) -> Self {
        self.protection = Some(ProtectionMethod::Signature {
            client_cert,
            signing_key,
        });
        self
    }

    pub fn set_recipient(mut self, name: GeneralName) -> Self {
        self.recipient = Some(name);
        self
    }

    pub fn set_implicit_confirm(mut self, enabled: bool) -> Self {
        self.implicit_confirm = enabled;
        self
    }

    pub fn set_disable_confirm(mut self, enabled: bool) -> Self {
        self.disable_confirm = enabled;
        self
    }

    pub fn add_extra_cert_out(mut self, cert: Certificate) -> Self {
        self.extra_certs_out.push(cert);
        self
    }

    pub fn set_new_key(mut self, key: crate::protect::signature::SigningKeyHandle) -> Self {
        self.new_key = Some(key);
        self
    }

    pub fn set_subject(mut self, name: x509_cert::name::Name) -> Self {
        self.subject_name = Some(name);
        self
    }

    pub fn set_issuer(mut self, name: x509_cert::name::Name) -> Self {
        self.issuer = Some(name);
        self
    }

    pub fn add_subject_alt_name(mut self, san: GeneralName) -> Self {
        self.subject_alt_names.push(san);
        self
    }

    pub fn set_popo_method(mut self, method: PopoMethod) -> Self {
        self.popo_method = method;
        self
    }

    pub fn set_old_client_cert(mut self, cert: Certificate) -> Self {
        self.old_client_cert = Some(cert);
        self
    }

    pub fn set_revocation_reason(mut self, reason: i32) -> Self {
        self.revocation_reason = Some(reason);
        self
    }

    pub fn set_trust_store(mut self, store: std::sync::Arc<dyn crate::trust::TrustStore>) -> Self {
        self.trust_store = Some(store);
        self
    }

    pub fn set_pkcs10_csr(mut self, der: impl Into<Vec<u8>>) -> Self {
        self.pkcs10_csr = Some(der.into());
        self
    }

    pub fn add_cert_policy(mut self, oid: der::asn1::ObjectIdentifier) -> Self {
        self.cert_policies.push(oid);
        self
    }

    /// `OSSL_CMP_CTX_set1_reqExtensions`: fails with
    /// [`CmpError::MultipleSanSources`] when both a SAN list and a
    /// `subjectAltName` extension are supplied, per spec.md §4.1's
    /// inconsistent-combination rule.
    pub fn set_req_extensions(mut self, extensions: x509_cert::ext::Extensions) -> Result<Self> {
        const OID_SUBJECT_ALT_NAME: &str = "2.5.29.17";
        let has_san_extension = extensions
            .iter()
            .any(|e| e.extn_id.to_string() == OID_SUBJECT_ALT_NAME);
        if has_san_extension && !self.subject_alt_names.is_empty() {
            return Err(CmpError::MultipleSanSources(
                "both a SAN list and a subjectAltName extension were configured".into(),
            ));
        }
        self.req_extensions = Some(extensions);
        Ok(self)
    }

    /// Apply a single enumerated option (spec.md §4.1's option table).
    pub fn set_option(mut self, option: CmpOption) -> Self {
        match option {
            CmpOption::ImplicitConfirm(v) => self.implicit_confirm = v,
            CmpOption::DisableConfirm(v) => self.disable_confirm = v,
            CmpOption::UnprotectedSend(v) => self.unprotected_send = v,
            CmpOption::UnprotectedErrors(v) => self.unprotected_errors = v,
            CmpOption::ValidityDays(v) => self.days = Some(v),
            CmpOption::SubjectAltNameNoDefault(v) => self.subject_alt_name_nodefault = v,
            CmpOption::SubjectAltNameCritical(v) => self.set_subject_alt_name_critical = v,
            CmpOption::PoliciesCritical(v) => self.policies_critical = v,
            CmpOption::IgnoreKeyUsage(v) => self.ignore_key_usage = v,
            CmpOption::PopoMethod(v) => self.popo_method = v,
            CmpOption::DigestAlg(v) => self.digest_alg = Some(v),
            CmpOption::MsgTimeout(secs) => {
                self.msg_timeout = if secs == 0 { None } else { Some(Duration::from_secs(secs)) }
            }
            CmpOption::TotalTimeout(secs) => {
                self.total_timeout = if secs == 0 { None } else { Some(Duration::from_secs(secs)) }
            }
            CmpOption::PermitTaInExtraCertsForIr(v) => self.permit_ta_in_extra_certs_for_ir = v,
            CmpOption::RevocationReason(v) => self.revocation_reason = Some(v),
        }
        self
    }

    pub fn add_geninfo_itav(mut self, itav: InfoTypeAndValue) -> Self {
        self.geninfo_itavs.push(itav);
        self
    }

    pub fn add_genm_itav(mut self, itav: InfoTypeAndValue) -> Self {
        self.genm_itavs.push(itav);
        self
    }

    /// Called at the start of each new transaction (`OSSL_CMP_CTX_reinit`
    /// in spirit): clears per-transaction nonces/transactionID and the
    /// previous exchange's cached response, but keeps server/auth
    /// configuration intact for reuse across a new request.
    pub fn start_new_transaction(&mut self, transaction_id: OctetString, sender_nonce: OctetString) {
        self.transaction_id = Some(transaction_id);
        self.last_sender_nonce = Some(sender_nonce);
        self.recip_nonce = None;
        self.last_response = LastResponse::default();
    }

    /// Whether the context has enough configured to protect an outbound
    /// message, per spec.md §4.4's precondition
    /// (`unprotectedSend` is the only way to skip this).
    pub fn has_protection_material(&self) -> bool {
        self.unprotected_send || self.protection.is_some()
    }
}
