//! `certConf`/`pkiConf` body builders (spec.md §4.3), grounded on
//! `ossl_cmp_certConf_new` in
//! `examples/original_source/crypto/cmp/cmp_msg.c`.

use crate::asn1::body::{CertStatus, PkiBody, PkiBodyType, PkiFailureInfo, PkiStatusInfo};
use crate::asn1::message::PkiMessage;
use crate::certutil;
use crate::context::Context;
use crate::error::Result;
use x509_cert::Certificate;

/// Build and protect a `certConf` for `new_cert`, with `certReqId` matching
/// the `CertResponse` it confirms (`0` for every body type except a learned
/// `rid` from P10CR) and `certHash` computed with the certificate's own
/// signature-digest algorithm (spec.md §4.3). `fail_info` empty means
/// accepted; non-empty means a rejection carrying `text` as the single
/// `statusString`.
pub fn create_cert_conf(
    ctx: &mut Context,
    cert_req_id: i32,
    new_cert: &Certificate,
    fail_info: PkiFailureInfo,
    text: &str,
) -> Result<PkiMessage> {
    let cert_hash = certutil::hash_with_own_signature_digest(new_cert)?;
    let cert_hash = der::asn1::OctetString::new(cert_hash)
        .map_err(|e| crate::error::CmpError::InvalidArgs(e.to_string()))?;
    let status_info = if fail_info.is_empty() {
        PkiStatusInfo::accepted()
    } else {
        PkiStatusInfo::rejection(fail_info, text)
    };
    let status = CertStatus {
        cert_hash,
        cert_req_id,
        status_info: Some(status_info),
    };
    let shell = super::msg_create(ctx, PkiBodyType::CertConf)?;
    super::finish(ctx, shell, PkiBody::CertConf(vec![status]))
}

/// Build and protect a bare `pkiConf` (a `NULL` body; spec.md §4.3).
pub fn create_pki_conf(ctx: &mut Context) -> Result<PkiMessage> {
    let shell = super::msg_create(ctx, PkiBodyType::PkiConf)?;
    super::finish(ctx, shell, PkiBody::PkiConf)
}
