//! Sender-certificate discovery (spec.md §4.5.3), grounded on
//! `ossl_cmp_msg_check_received`/`find_srvcert` in
//! `examples/original_source/crypto/cmp/cmp_vfy.c`.

use crate::asn1::message::PkiMessage;
use crate::context::Context;
use crate::error::{CmpError, Result};
use crate::protect;
use crate::protect::signature::VerifyingKeyHandle;
use crate::{certutil, queue};
use x509_cert::name::Name;
use x509_cert::Certificate;

pub(super) fn sender_dn(msg: &PkiMessage) -> Result<Name> {
    msg.header
        .sender
        .as_directory_name()
        .cloned()
        .ok_or_else(|| CmpError::UnexpectedSender("sender GeneralName is not a directoryName".into()))
}

/// Candidate-acceptability filter: not expired, subject DN equal to the
/// message's sender, senderKID (if present) matches, and — unless
/// `ignore_key_usage` — KeyUsage doesn't explicitly deny digitalSignature.
fn is_acceptable(
    ctx: &Context,
    msg: &PkiMessage,
    candidate: &Certificate,
    sender: &Name,
) -> Result<bool> {
    if candidate.tbs_certificate.subject != *sender {
        return Ok(false);
    }
    if !certutil::is_currently_valid(candidate)? {
        return Ok(false);
    }
    if let Some(sender_kid) = &msg.header.sender_kid {
        match certutil::subject_key_identifier(candidate)? {
            Some(ski) if ski.as_slice() == sender_kid.as_bytes() => {}
            _ => return Ok(false),
        }
    }
    if !ctx.ignore_key_usage {
        if let Some(false) = certutil::has_digital_signature_key_usage(candidate)? {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Verify `msg`'s signature against `candidate`'s public key, then path-
/// validate `candidate` against `trust_store`/`untrusted`. Both must
/// succeed for `candidate` to be accepted.
pub(super) fn try_candidate(
    msg: &PkiMessage,
    candidate: &Certificate,
    untrusted: &[Certificate],
    trust_store: &dyn crate::trust::TrustStore,
) -> Result<()> {
    let verifying_key = VerifyingKeyHandle::from_spki(&candidate.tbs_certificate.subject_public_key)?;
    protect::verify_signature(msg, &verifying_key)?;
    trust_store.validate_path(candidate, untrusted)
}

/// Full candidate search (spec.md §4.5.3): the cached validated cert first,
/// then the untrusted pool (extraCerts are expected to already have been
/// merged in by [`super::verify_message`] before this runs, so they are
/// tried first by construction). Enumerating the trust store's own root
/// certificates individually isn't attempted here — [`crate::trust::TrustStore`]
/// deliberately doesn't expose its anchor set (spec.md §1's "no CA/RA
/// business logic" extends to not re-implementing `X509_STORE`'s internals);
/// a deployment whose sender cert IS one of its own trust anchors should
/// also place it in `untrusted_certs` so it's reachable as a candidate here.
pub fn discover_sender_cert(ctx: &mut Context, msg: &PkiMessage) -> Result<Certificate> {
    let sender = sender_dn(msg)?;

    if let Some(expected) = &ctx.expected_sender {
        if expected.as_directory_name() != Some(&sender) {
            let err = CmpError::UnexpectedSender("sender DN does not match ctx.expected_sender".into());
            queue::push_err(&err, None);
            return Err(err);
        }
    }

    if let Some(pinned) = ctx.server_cert.clone() {
        crate::cmp_log!(crate::log::Severity::Info, "verifying signature against pinned server certificate");
        let verifying_key = VerifyingKeyHandle::from_spki(&pinned.tbs_certificate.subject_public_key)?;
        protect::verify_signature(msg, &verifying_key)?;
        return Ok(pinned);
    }

    let mark = queue::mark();
    let mut candidates: Vec<Certificate> = Vec::new();
    if let Some(cached) = ctx.validated_server_cert.clone() {
        candidates.push(cached);
    }
    candidates.extend(ctx.untrusted_certs.iter().cloned());

    if let Some(trust_store) = ctx.trust_store.clone() {
        for candidate in &candidates {
            match is_acceptable(ctx, msg, candidate, &sender) {
                Ok(true) => {
                    match try_candidate(msg, candidate, &ctx.untrusted_certs, trust_store.as_ref()) {
                        Ok(()) => {
                            queue::pop_to_mark(mark);
                            ctx.validated_server_cert = Some(candidate.clone());
                            return Ok(candidate.clone());
                        }
                        Err(e) => queue::push_err(&e, None),
                    }
                }
                Ok(false) => {}
                Err(e) => queue::push_err(&e, None),
            }
        }
    }

    ctx.validated_server_cert = None;
    let err = CmpError::NoValidServerCertFound;
    queue::push_err(&err, None);
    Err(err)
}
