//! Received-message verification (spec.md §4.5), grounded on
//! `ossl_cmp_msg_check_received` in
//! `examples/original_source/crypto/cmp/cmp_vfy.c`: merge inbound
//! `extraCerts` into the untrusted pool, then dispatch on the message's
//! `protectionAlg` — PBMAC, signature, or (if allowed) unprotected.

pub mod discovery;
pub mod exception;

use crate::asn1::body::{PkiBody, PkiBodyType};
use crate::asn1::message::PkiMessage;
use crate::context::{Context, ProtectionMethod};
use crate::error::{CmpError, Result};
use crate::log::Severity;
use crate::{protect, queue};

const MAX_REASONABLE_EXTRA_CERTS: usize = 10;

/// Merge a received message's `extraCerts` into `ctx.untrusted_certs`,
/// de-duplicated by DER encoding, warning if the combined pool grows
/// suspiciously large (a peer flooding `extraCerts` to slow down path
/// building).
fn merge_extra_certs(ctx: &mut Context, msg: &PkiMessage) -> Result<()> {
    use der::Encode;

    let Some(incoming) = &msg.extra_certs else {
        return Ok(());
    };
    let mut seen: Vec<Vec<u8>> = ctx
        .untrusted_certs
        .iter()
        .map(|c| c.to_der().map_err(CmpError::Der))
        .collect::<Result<_>>()?;
    for cert in incoming {
        let der = cert.to_der().map_err(CmpError::Der)?;
        if !seen.contains(&der) {
            seen.push(der);
            ctx.untrusted_certs.push(cert.clone());
        }
    }
    if ctx.untrusted_certs.len() > MAX_REASONABLE_EXTRA_CERTS {
        crate::cmp_log!(
            Severity::Warn,
            format!(
                "untrusted certificate pool has grown to {} entries",
                ctx.untrusted_certs.len()
            )
        );
    }
    Ok(())
}

/// Whether an unprotected message of this body is one of the exceptions
/// spec.md §4.5.4 allows through without protection at all: error
/// responses, a revocation response carrying only rejections, `pkiConf`,
/// or an IP/CP/KUP whose every `CertResponse` is itself a rejection —
/// gated on `ctx.unprotected_errors`.
fn unprotected_exception_applies(ctx: &Context, body: &PkiBody) -> bool {
    if !ctx.unprotected_errors {
        return false;
    }
    use crate::asn1::body::PkiStatus;
    let all_rejected = |statuses: &[crate::asn1::body::PkiStatusInfo]| {
        !statuses.is_empty() && statuses.iter().all(|s| s.status == PkiStatus::Rejection)
    };
    match body {
        PkiBody::Error(_) => true,
        PkiBody::PkiConf => true,
        PkiBody::Rp(rep) => all_rejected(&rep.status),
        PkiBody::Ip(rep) | PkiBody::Cp(rep) | PkiBody::Kup(rep) => {
            !rep.response.is_empty()
                && rep
                    .response
                    .iter()
                    .all(|r| r.status.status == PkiStatus::Rejection)
        }
        _ => false,
    }
}

/// Verify `msg`'s protection against `ctx` (spec.md §4.5). On success, the
/// sender certificate used (if any) is cached in `ctx.validated_server_cert`
/// for reuse by the next message in the same transaction.
pub fn verify_message(ctx: &mut Context, msg: &PkiMessage) -> Result<()> {
    merge_extra_certs(ctx, msg)?;

    let Some(alg) = msg.header.protection_alg.clone() else {
        if msg.protection.is_some() {
            let err = CmpError::MissingProtection;
            queue::push_err(&err, None);
            return Err(err);
        }
        if unprotected_exception_applies(ctx, &msg.body) {
            crate::cmp_log!(
                Severity::Warn,
                format!("accepting unprotected {} per the §4.5.4 exception table", msg.body_type().name())
            );
            return Ok(());
        }
        let err = CmpError::MissingProtection;
        queue::push_err(&err, None);
        return Err(err);
    };

    if protect::is_pbmac_algorithm(&alg) {
        let secret_value = match &ctx.protection {
            Some(ProtectionMethod::Pbmac { secret_value, .. }) => secret_value.clone(),
            _ => {
                let err = CmpError::InvalidArgs(
                    "received PBMAC-protected message but context has no shared secret configured"
                        .into(),
                );
                queue::push_err(&err, None);
                return Err(err);
            }
        };
        return protect::verify_pbmac(msg, &secret_value);
    }

    match discovery::discover_sender_cert(ctx, msg) {
        Ok(_) => Ok(()),
        Err(discovery_err) => {
            if ctx.permit_ta_in_extra_certs_for_ir && msg.body_type() == PkiBodyType::Ip {
                match exception::try_3gpp_exception(ctx, msg) {
                    Ok(Some(_)) => {
                        crate::cmp_log!(
                            Severity::Info,
                            "accepted sender certificate via the 3GPP TS 33.310 discovery exception"
                        );
                        Ok(())
                    }
                    Ok(None) => Err(discovery_err),
                    Err(e) => {
                        queue::push_err(&e, None);
                        Err(discovery_err)
                    }
                }
            } else {
                Err(discovery_err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asn1::body::{ErrorMsgContent, PkiStatusInfo};

    #[test]
    fn unprotected_error_allowed_when_configured() {
        let mut ctx = Context::default();
        ctx = ctx.set_option(crate::context::CmpOption::UnprotectedErrors(true));
        let body = PkiBody::Error(ErrorMsgContent {
            status: PkiStatusInfo::rejection(
                crate::asn1::body::PkiFailureInfo::BAD_REQUEST,
                "no",
            ),
            error_code: None,
            error_details: None,
        });
        assert!(unprotected_exception_applies(&ctx, &body));
    }

    #[test]
    fn unprotected_error_rejected_when_not_configured() {
        let ctx = Context::default();
        let body = PkiBody::PkiConf;
        assert!(!unprotected_exception_applies(&ctx, &body));
    }
}
