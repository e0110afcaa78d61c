//! `exec_GENM` (spec.md §4.7's general-message specialization), grounded on
//! `ossl_cmp_exec_GENM_ses` in `examples/original_source/crypto/cmp/cmp_ses.c`.
//!
//! `genM`/`genP` carry an open-ended bag of `InfoTypeAndValue` items — there
//! is no status to dispatch on, so this is a single request/response
//! exchange with no polling and no `certConf` follow-up.

use crate::asn1::body::{PkiBody, PkiBodyType};
use crate::asn1::header::InfoTypeAndValue;
use crate::context::Context;
use crate::error::{CmpError, Result};
use crate::factory;
use crate::transfer::Transfer;

use super::Deadline;

/// Run a full General Message transaction: `genM` → `genP`. Returns the
/// `InfoTypeAndValue` items the CA/RA sent back, verbatim and in order.
pub async fn exec_genm<T: Transfer>(ctx: &mut Context, transfer: &T) -> Result<Vec<InfoTypeAndValue>> {
    let deadline = Deadline::start(ctx);
    ctx.last_response = Default::default();

    deadline.check_not_expired()?;
    let request = factory::general::create_genm(ctx)?;
    let timeout = deadline.effective_msg_timeout(ctx.msg_timeout);
    let response = transfer.transfer(ctx, &request, timeout).await.map_err(CmpError::from)?;
    crate::check::check_received(ctx, &response)?;

    match response.body {
        PkiBody::GenP(itavs) => Ok(itavs),
        other => {
            let err = CmpError::UnexpectedPkiBody {
                expected: PkiBodyType::GenP.name(),
                got: other.body_type().name().to_string(),
            };
            crate::queue::push_err(&err, None);
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protect::signature::SigningKeyHandle;
    use crate::transfer::fake::ScriptedTransfer;
    use ed25519_dalek::SigningKey as EdSigningKey;
    use rand::rngs::OsRng;
    use x509_cert::name::Name;

    fn base_ctx() -> Context {
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
    async fn exec_genm_returns_the_itavs_from_genp() {
        let mut ctx = base_ctx();

        let mut server_ctx = ctx.clone();
        let probe = factory::general::create_genm(&mut server_ctx).unwrap();
        ctx.transaction_id = Some(probe.header.transaction_id.clone());
        server_ctx.recip_nonce = Some(probe.header.sender_nonce.clone());
        let itav = InfoTypeAndValue {
            info_type: der::asn1::ObjectIdentifier::new_unwrap("1.3.6.1.5.5.7.4.1"),
            info_value: None,
        };
        let genp = factory::general::create_genp(&mut server_ctx, vec![itav.clone()]).unwrap();

        let transfer = ScriptedTransfer::new(vec![Ok(genp)]);
        let result = exec_genm(&mut ctx, &transfer).await.unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].info_type, itav.info_type);
    }

    #[tokio::test]
    async fn exec_genm_rejects_an_ip_where_a_genp_was_expected() {
        use crate::asn1::body::CertRepMessage;

        let mut ctx = base_ctx();

        let mut server_ctx = ctx.clone();
        let probe = factory::general::create_genm(&mut server_ctx).unwrap();
        ctx.transaction_id = Some(probe.header.transaction_id.clone());
        server_ctx.recip_nonce = Some(probe.header.sender_nonce.clone());
        let shell = factory::msg_create(&mut server_ctx, PkiBodyType::Ip).unwrap();
        let wrong_reply = factory::finish(
            &server_ctx,
            shell,
            PkiBody::Ip(CertRepMessage { ca_pubs: None, response: Vec::new() }),
        )
        .unwrap();

        let transfer = ScriptedTransfer::new(vec![Ok(wrong_reply)]);
        let err = exec_genm(&mut ctx, &transfer).await.unwrap_err();
        assert!(matches!(err, CmpError::UnexpectedPkiBody { .. }));
    }
}
