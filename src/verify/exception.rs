//! The 3GPP TS 33.310 discovery exception (spec.md §4.5.3), grounded on
//! `ossl_cmp_X509_STORE_add1_certs(..., self_signed = 1)`'s use in
//! `examples/original_source/crypto/cmp/cmp_vfy.c` to build a one-shot
//! trust store out of a message's own `extraCerts`.

use crate::asn1::body::{PkiBody, PkiBodyType};
use crate::asn1::message::PkiMessage;
use crate::context::Context;
use crate::error::{CmpError, Result};
use crate::trust::{ExtraCertsTrustStore, TrustStore};
use crate::verify::discovery::{sender_dn, try_candidate};
use x509_cert::Certificate;

/// Attempt the exception path: only applies to `IP` messages with
/// `permit_ta_in_extra_certs_for_ir` set. Builds an ephemeral trust store
/// from self-signed certs in `msg.extra_certs`, re-attempts candidate
/// discovery against it, and additionally requires the newly enrolled
/// certificate (`certReqId = 0`) in this same `IP` to validate against that
/// same ephemeral store. Returns `Ok(None)` when the exception doesn't
/// apply or doesn't succeed, never widening the caller's error.
pub fn try_3gpp_exception(ctx: &mut Context, msg: &PkiMessage) -> Result<Option<Certificate>> {
    if !ctx.permit_ta_in_extra_certs_for_ir || msg.body_type() != PkiBodyType::Ip {
        return Ok(None);
    }
    let extra_certs = match &msg.extra_certs {
        Some(certs) if !certs.is_empty() => certs.clone(),
        _ => return Ok(None),
    };
    let ephemeral = ExtraCertsTrustStore::from_self_signed(&extra_certs);

    let sender = sender_dn(msg)?;
    let mut candidates = extra_certs.clone();
    candidates.extend(ctx.untrusted_certs.iter().cloned());

    let sender_cert = candidates.iter().find(|c| {
        c.tbs_certificate.subject == sender
            && try_candidate(msg, c, &extra_certs, &ephemeral).is_ok()
    });
    let Some(sender_cert) = sender_cert else {
        return Ok(None);
    };

    let new_cert = match &msg.body {
        PkiBody::Ip(rep) => rep
            .response
            .iter()
            .find(|r| r.cert_req_id == 0)
            .and_then(|r| r.certified_key_pair.clone()),
        _ => None,
    };
    let Some(new_cert) = new_cert else {
        return Ok(None);
    };
    if ephemeral.validate_path(&new_cert, &extra_certs).is_err() {
        let err = CmpError::PotentiallyInvalidCertificate(
            "newly enrolled certificate did not validate against the 3GPP exception store".into(),
        );
        crate::queue::push_err(&err, None);
        return Ok(None);
    }

    ctx.validated_server_cert = Some(sender_cert.clone());
    Ok(Some(sender_cert.clone()))
}
