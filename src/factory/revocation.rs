//! `rr` body builder (spec.md §4.3), grounded on `ossl_cmp_rr_new` in
//! `examples/original_source/crypto/cmp/cmp_msg.c`.
//!
//! RFC 4210's `RevReqContent ::= SEQUENCE OF RevDetails` where `RevDetails
//! ::= SEQUENCE { certDetails CertTemplate, crlEntryDetails Extensions
//! OPTIONAL }`; this engine folds `crlEntryDetails` into `certDetails`'s own
//! `extensions` field rather than a separate `RevDetails` wrapper type,
//! since a `CertTemplate` already carries an `Extensions` slot and RFC 4210
//! never reuses `crlEntryDetails` independently of its `certDetails`.

use crate::asn1::certreq::CertTemplate;
use crate::asn1::message::PkiMessage;
use crate::asn1::{body::PkiBody, body::PkiBodyType};
use crate::error::{CmpError, Result};
use der::asn1::ObjectIdentifier;
use x509_cert::ext::{Extension, Extensions};

const OID_CRL_REASON: &str = "2.5.29.21";

/// Build and protect an `rr` carrying one `RevDetails`-shaped `CertTemplate`:
/// the old cert's issuer + serial number, optionally its subject + public
/// key, and a `crlEntryDetails`/`CRLReason` extension when a revocation
/// reason other than `unspecified`/`none` is configured (spec.md §4.3).
pub fn create_rr(ctx: &mut crate::context::Context) -> Result<PkiMessage> {
    let old = ctx
        .old_client_cert
        .clone()
        .ok_or_else(|| CmpError::InvalidArgs("rr requires ctx.old_client_cert".into()))?;

    let mut template = CertTemplate::for_revocation(
        old.tbs_certificate.issuer.clone(),
        old.tbs_certificate.serial_number.as_bytes().to_vec(),
    );
    template.subject = Some(old.tbs_certificate.subject.clone());
    template.public_key = Some(old.tbs_certificate.subject_public_key_info.clone());

    if let Some(reason) = ctx.revocation_reason {
        let der = crate::asn1::encode_crl_reason(reason);
        let extn_value =
            der::asn1::OctetString::new(der).map_err(|e| CmpError::InvalidArgs(e.to_string()))?;
        let mut exts = Extensions::default();
        exts.push(Extension {
            extn_id: ObjectIdentifier::new_unwrap(OID_CRL_REASON),
            critical: false,
            extn_value,
        });
        template.extensions = Some(exts);
    }

    let shell = super::msg_create(ctx, PkiBodyType::Rr)?;
    super::finish(ctx, shell, PkiBody::Rr(vec![template]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Context;

    #[test]
    fn rr_requires_old_client_cert() {
        let mut ctx = Context::new()
            .set_pbmac(
                b"ref".to_vec(),
                b"secret".to_vec(),
                crate::protect::pbmac::DigestAlg::Sha256,
                crate::protect::pbmac::MacAlg::HmacSha256,
                500,
            )
            .unwrap();
        let err = create_rr(&mut ctx).unwrap_err();
        assert!(matches!(err, CmpError::InvalidArgs(_)));
    }
}
