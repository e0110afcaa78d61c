//! `PKIHeader` construction (spec.md §4.2), grounded on
//! `OSSL_CMP_HDR_init`/`ossl_cmp_hdr_generalInfo_push` in
//! `examples/original_source/crypto/cmp/cmp_hdr.c`.

use crate::asn1::body::PkiBodyType;
use crate::asn1::header::{GeneralName, InfoTypeAndValue, PkiHeader};
use crate::context::{Context, ProtectionMethod};
use crate::error::{CmpError, Result};
use crate::protect::pbmac::random_salt;
use der::asn1::OctetString;

fn fresh_nonce() -> Result<OctetString> {
    OctetString::new(random_salt(16)).map_err(|e| CmpError::InvalidArgs(e.to_string()))
}

fn current_message_time() -> Result<der::asn1::GeneralizedTime> {
    let dt = der::asn1::DateTime::try_from(std::time::SystemTime::now())
        .map_err(|e| CmpError::InvalidArgs(e.to_string()))?;
    Ok(der::asn1::GeneralizedTime::from(dt))
}

/// `sender`: the client cert subject when protecting by signature, else the
/// configured request-template subject, else NULL-DN (valid only when
/// protecting by PBM with a reference value — `cmp_hdr.c`'s fallback when
/// no certificate identity has been established yet).
fn choose_sender(ctx: &Context) -> GeneralName {
    if let Some(ProtectionMethod::Signature { client_cert, .. }) = &ctx.protection {
        return GeneralName::DirectoryName(client_cert.tbs_certificate.subject.clone());
    }
    if let Some(subject) = &ctx.subject_name {
        return GeneralName::DirectoryName(subject.clone());
    }
    GeneralName::null_dn()
}

/// `recipient` precedence (`cmp_hdr.c`'s `set1_recipient` fallback chain):
/// pinned server cert subject, then an explicitly configured recipient,
/// then a configured issuer, then the old cert's issuer (KUR/RR), then the
/// client cert's issuer (self-signed client certs have no useful answer
/// here), else NULL-DN.
fn choose_recipient(ctx: &Context) -> GeneralName {
    if let Some(server_cert) = &ctx.server_cert {
        return GeneralName::DirectoryName(server_cert.tbs_certificate.subject.clone());
    }
    if let Some(recipient) = &ctx.recipient {
        return recipient.clone();
    }
    if let Some(issuer) = &ctx.issuer {
        return GeneralName::DirectoryName(issuer.clone());
    }
    if let Some(old_cert) = &ctx.old_client_cert {
        return GeneralName::DirectoryName(old_cert.tbs_certificate.issuer.clone());
    }
    if let Some(ProtectionMethod::Signature { client_cert, .. }) = &ctx.protection {
        return GeneralName::DirectoryName(client_cert.tbs_certificate.issuer.clone());
    }
    GeneralName::null_dn()
}

/// Build a fresh `PKIHeader` for an outbound message of `body_type`
/// (`OSSL_CMP_HDR_init`). Ensures the context has a `transactionID` (minting
/// one on the first call of a transaction), always mints a fresh
/// `senderNonce`, and carries over `recipNonce` if the context has one from
/// a previous exchange.
///
/// `body_type` only affects sender/recipient selection via `ctx`'s own
/// state, not the header layout itself; factory builders add body-specific
/// `generalInfo` items (e.g. `implicitConfirm`) afterwards with
/// [`generalinfo_push`].
pub fn header_init(ctx: &mut Context, _body_type: PkiBodyType) -> Result<PkiHeader> {
    if ctx.transaction_id.is_none() {
        ctx.transaction_id =
            Some(OctetString::new(random_salt(16)).map_err(|e| CmpError::InvalidArgs(e.to_string()))?);
    }
    let sender_nonce = fresh_nonce()?;
    ctx.last_sender_nonce = Some(sender_nonce.clone());

    Ok(PkiHeader {
        pvno: PkiHeader::PVNO_CMP2000,
        sender: choose_sender(ctx),
        recipient: choose_recipient(ctx),
        message_time: Some(current_message_time()?),
        protection_alg: None,
        sender_kid: None,
        recip_kid: None,
        transaction_id: ctx
            .transaction_id
            .clone()
            .expect("transaction_id minted above"),
        sender_nonce,
        recip_nonce: ctx.recip_nonce.clone(),
        free_text: None,
        general_info: if ctx.geninfo_itavs.is_empty() {
            None
        } else {
            Some(ctx.geninfo_itavs.clone())
        },
    })
}

/// Push `itav` into `header.general_info`, replacing any existing entry
/// with the same `infoType` OID (`ossl_cmp_hdr_generalInfo_push` enforces
/// per-OID uniqueness so a later `set_option` call can't silently duplicate
/// e.g. `implicitConfirm`).
pub fn generalinfo_push(header: &mut PkiHeader, itav: InfoTypeAndValue) {
    let items = header.general_info.get_or_insert_with(Vec::new);
    items.retain(|existing| existing.info_type != itav.info_type);
    items.push(itav);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asn1::body::PkiBodyType;

    #[test]
    fn mints_transaction_id_once_and_fresh_nonce_every_call() {
        let mut ctx = Context::new();
        let h1 = header_init(&mut ctx, PkiBodyType::Ir).unwrap();
        let h2 = header_init(&mut ctx, PkiBodyType::CertConf).unwrap();
        assert_eq!(h1.transaction_id, h2.transaction_id);
        assert_ne!(h1.sender_nonce, h2.sender_nonce);
    }

    #[test]
    fn recip_nonce_carries_over_from_context() {
        let mut ctx = Context::new();
        let nonce = OctetString::new(vec![7u8; 16]).unwrap();
        ctx.recip_nonce = Some(nonce.clone());
        let h = header_init(&mut ctx, PkiBodyType::Cr).unwrap();
        assert_eq!(h.recip_nonce, Some(nonce));
    }

    #[test]
    fn generalinfo_push_deduplicates_by_oid() {
        let mut header = header_init(&mut Context::new(), PkiBodyType::Ir).unwrap();
        let oid = der::asn1::ObjectIdentifier::new_unwrap("1.3.6.1.5.5.7.4.13");
        generalinfo_push(&mut header, InfoTypeAndValue::flag(oid.clone()));
        generalinfo_push(&mut header, InfoTypeAndValue::flag(oid));
        assert_eq!(header.general_info.unwrap().len(), 1);
    }

    #[test]
    fn sender_falls_back_to_null_dn_with_no_identity_configured() {
        let mut ctx = Context::new();
        let h = header_init(&mut ctx, PkiBodyType::Ir).unwrap();
        assert_eq!(h.sender, GeneralName::null_dn());
    }
}
