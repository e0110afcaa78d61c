//! `exec_IR`/`exec_CR`/`exec_KUR`/`exec_P10CR` (spec.md §4.7
//! specializations), each just binding `req_type`/`rep_type` and the right
//! [`crate::factory::enroll`] builder into [`super::do_certreq_seq`].

use crate::asn1::body::PkiBodyType;
use crate::context::Context;
use crate::error::Result;
use crate::factory;
use crate::transfer::Transfer;
use x509_cert::Certificate;

use super::{do_certreq_seq, CertConfirmCallback};

/// Run a full Initialization Request transaction: `ir` → (poll)* → `ip` →
/// `certConf` → `pkiConf`.
pub async fn exec_ir<T: Transfer>(
    ctx: &mut Context,
    transfer: &T,
    cert_confirm: &dyn CertConfirmCallback,
) -> Result<Certificate> {
    do_certreq_seq(ctx, transfer, cert_confirm, PkiBodyType::Ir, PkiBodyType::Ip, factory::enroll::create_ir).await
}

/// Run a full Certification Request transaction: `cr` → (poll)* → `cp` →
/// `certConf` → `pkiConf`.
pub async fn exec_cr<T: Transfer>(
    ctx: &mut Context,
    transfer: &T,
    cert_confirm: &dyn CertConfirmCallback,
) -> Result<Certificate> {
    do_certreq_seq(ctx, transfer, cert_confirm, PkiBodyType::Cr, PkiBodyType::Cp, factory::enroll::create_cr).await
}

/// Run a full Key Update Request transaction: `kur` → (poll)* → `kup` →
/// `certConf` → `pkiConf`. Unlike IR/CR, a `keyUpdateWarning` status is
/// accepted as a successful extraction (spec.md §4.7's status table).
pub async fn exec_kur<T: Transfer>(
    ctx: &mut Context,
    transfer: &T,
    cert_confirm: &dyn CertConfirmCallback,
) -> Result<Certificate> {
    do_certreq_seq(ctx, transfer, cert_confirm, PkiBodyType::Kur, PkiBodyType::Kup, factory::enroll::create_kur).await
}

/// Run a full PKCS#10 Certification Request transaction: `p10cr` →
/// (poll)* → `cp` → `certConf` → `pkiConf` (RFC 4210 §5.3.4's note that
/// `p10cr` is answered with a `cp`, reusing the enrollment response shape).
pub async fn exec_p10cr<T: Transfer>(
    ctx: &mut Context,
    transfer: &T,
    cert_confirm: &dyn CertConfirmCallback,
) -> Result<Certificate> {
    do_certreq_seq(ctx, transfer, cert_confirm, PkiBodyType::P10cr, PkiBodyType::Cp, factory::enroll::create_p10cr).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asn1::body::PkiBody;
    use crate::context::Context;
    use crate::error::CmpError;
    use crate::protect::signature::SigningKeyHandle;
    use crate::session::AcceptAll;
    use crate::transfer::fake::ScriptedTransfer;
    use ed25519_dalek::SigningKey as EdSigningKey;
    use rand::rngs::OsRng;
    use x509_cert::name::Name;

    fn ctx_with_new_key_only() -> Context {
        let mut rng = OsRng;
        let key = EdSigningKey::generate(&mut rng);
        Context::new()
            .set_subject(Name::default())
            .set_new_key(SigningKeyHandle::from_ed25519(key))
    }

    #[tokio::test]
    async fn exec_ir_fails_before_any_transfer_without_protection_material() {
        let mut ctx = ctx_with_new_key_only();
        let transfer = ScriptedTransfer::new(vec![]);
        let err = exec_ir(&mut ctx, &transfer, &AcceptAll).await.unwrap_err();
        assert!(matches!(err, CmpError::MissingKeyInputForCreatingProtection));
        assert!(transfer.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn exec_cr_rejects_a_pkiconf_where_a_cp_was_expected() {
        let mut ctx = ctx_with_new_key_only()
            .set_pbmac(
                b"ref".to_vec(),
                b"secret".to_vec(),
                crate::protect::pbmac::DigestAlg::Sha256,
                crate::protect::pbmac::MacAlg::HmacSha256,
                500,
            )
            .unwrap();

        // Mint the transactionID/senderNonce the way exec_cr's own request
        // will, then script a mismatched reply bearing them.
        let mut server_ctx = ctx.clone();
        let probe = factory::enroll::create_cr(&mut server_ctx).unwrap();
        ctx.transaction_id = Some(probe.header.transaction_id.clone());
        server_ctx.recip_nonce = Some(probe.header.sender_nonce.clone());
        let shell = factory::msg_create(&mut server_ctx, PkiBodyType::PkiConf).unwrap();
        let wrong_reply = factory::finish(&server_ctx, shell, PkiBody::PkiConf).unwrap();

        let transfer = ScriptedTransfer::new(vec![Ok(wrong_reply)]);
        let err = exec_cr(&mut ctx, &transfer, &AcceptAll).await.unwrap_err();
        assert!(matches!(err, CmpError::UnexpectedPkiBody { .. }));
    }
}
