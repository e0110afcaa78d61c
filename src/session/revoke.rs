//! `exec_RR` (spec.md §4.7's revocation specialization), grounded on
//! `ossl_cmp_exec_RR_ses` in `examples/original_source/crypto/cmp/cmp_ses.c`.
//!
//! Unlike the enrollment skeleton, `rr` never polls and its status table is
//! narrower: `waiting` has no meaning for a revocation request, and
//! `keyUpdateWarning` can never legitimately appear. A successful `rp`
//! carries one `PKIStatusInfo` per requested `RevDetails` (this engine
//! requests exactly one), optionally followed by `revCerts` confirming
//! which certificate was actually revoked.

use crate::asn1::body::{CertId, PkiBody, PkiBodyType, PkiStatus};
use crate::context::Context;
use crate::error::{CmpError, Result};
use crate::factory;
use crate::log::Severity;
use crate::transfer::Transfer;

use super::Deadline;

fn matches_old_cert(ctx: &Context, cert_id: &CertId) -> bool {
    let Some(old) = &ctx.old_client_cert else {
        return false;
    };
    let issuer_matches = match cert_id.issuer.as_directory_name() {
        Some(name) => *name == old.tbs_certificate.issuer,
        None => false,
    };
    issuer_matches && cert_id.serial_number == old.tbs_certificate.serial_number.as_bytes()
}

/// Run a full Revocation Request transaction: `rr` → `rp`. Returns the
/// `PKIStatusInfo` the CA returned for the (sole) requested `RevDetails`.
pub async fn exec_rr<T: Transfer>(ctx: &mut Context, transfer: &T) -> Result<crate::asn1::body::PkiStatusInfo> {
    let deadline = Deadline::start(ctx);
    ctx.last_response = Default::default();

    deadline.check_not_expired()?;
    let request = factory::revocation::create_rr(ctx)?;
    let timeout = deadline.effective_msg_timeout(ctx.msg_timeout);
    let response = transfer.transfer(ctx, &request, timeout).await.map_err(CmpError::from)?;
    crate::check::check_received(ctx, &response)?;

    let rp = match &response.body {
        PkiBody::Rp(rp) => rp.clone(),
        other => {
            let err = CmpError::UnexpectedPkiBody {
                expected: PkiBodyType::Rp.name(),
                got: other.body_type().name().to_string(),
            };
            crate::queue::push_err(&err, None);
            return Err(err);
        }
    };

    if rp.status.len() > 1 {
        let err = CmpError::MultipleResponsesNotSupported;
        crate::queue::push_err(&err, None);
        return Err(err);
    }
    let status_info = rp
        .status
        .first()
        .cloned()
        .ok_or_else(|| CmpError::UnexpectedPkiStatus("empty RevRepContent".into()))?;

    ctx.last_response.status = Some(status_info.status);
    ctx.last_response.status_string = status_info.status_string.clone();
    ctx.last_response.fail_info = status_info.fail_info;

    match status_info.status {
        PkiStatus::Accepted
        | PkiStatus::GrantedWithMods
        | PkiStatus::RevocationWarning
        | PkiStatus::RevocationNotification => {}
        PkiStatus::Waiting => {
            let err = CmpError::EncounteredWaiting;
            crate::queue::push_err(&err, None);
            return Err(err);
        }
        PkiStatus::KeyUpdateWarning => {
            let err = CmpError::EncounteredKeyUpdateWarning;
            crate::queue::push_err(&err, None);
            return Err(err);
        }
        PkiStatus::Rejection => {
            let text = status_info.status_string.clone().unwrap_or_default().join("; ");
            let err = CmpError::RequestRejectedByCa(text);
            crate::queue::push_err(&err, None);
            return Err(err);
        }
    }

    if let Some(rev_certs) = &rp.rev_certs {
        if !rev_certs.iter().any(|id| matches_old_cert(ctx, id)) {
            crate::cmp_log!(
                Severity::Warn,
                "rp's revCerts did not include the certificate this rr requested revoking"
            );
        }
    }

    Ok(status_info)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protect::signature::SigningKeyHandle;
    use crate::transfer::fake::ScriptedTransfer;
    use ed25519_dalek::SigningKey as EdSigningKey;
    use rand::rngs::OsRng;
    use x509_cert::name::Name;

    fn ctx_without_old_cert() -> Context {
        let mut rng = OsRng;
        let key = EdSigningKey::generate(&mut rng);
        Context::new()
            .set_subject(Name::default())
            .set_new_key(SigningKeyHandle::from_ed25519(key))
            .set_pbmac(
                b"ref".to_vec(),
                b"secret".to_vec(),
                crate::protect::pbmac::DigestAlg::Sha256,
                crate::protect::pbmac::MacAlg::HmacSha256,
                500,
            )
            .unwrap()
    }

    #[tokio::test]
    async fn exec_rr_requires_old_client_cert_before_any_transfer() {
        let mut ctx = ctx_without_old_cert();
        let transfer = ScriptedTransfer::new(vec![]);
        let err = exec_rr(&mut ctx, &transfer).await.unwrap_err();
        assert!(matches!(err, CmpError::InvalidArgs(_)));
        assert!(transfer.sent.lock().unwrap().is_empty());
    }
}
