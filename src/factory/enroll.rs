//! IR / CR / KUR / P10CR body builders (spec.md §4.3), grounded on
//! `ossl_cmp_certreq_new` in
//! `examples/original_source/crypto/cmp/cmp_msg.c`.

use crate::asn1::body::{CertId, PkiBody, PkiBodyType};
use crate::asn1::certreq::{CertRequest, CertTemplate, Control, OptionalValidity, ProofOfPossession};
use crate::asn1::message::PkiMessage;
use crate::context::{Context, PopoMethod, ProtectionMethod};
use crate::error::{CmpError, Result};
use der::asn1::ObjectIdentifier;
use der::Encode;
use spki::SubjectPublicKeyInfoOwned;
use x509_cert::ext::{Extension, Extensions};

const OID_SUBJECT_ALT_NAME: &str = "2.5.29.17";
const OID_CERT_POLICIES: &str = "2.5.29.32";
const OID_REG_CTRL_OLD_CERT_ID: &str = "1.3.6.1.5.5.7.5.1.5";

fn validity_window(days: u32) -> Result<OptionalValidity> {
    use std::time::{Duration, SystemTime};

    let not_before = SystemTime::now();
    let not_after = not_before + Duration::from_secs(u64::from(days) * 86_400);
    let to_gt = |t: SystemTime| -> Result<der::asn1::GeneralizedTime> {
        let dt = der::asn1::DateTime::try_from(t).map_err(|e| CmpError::InvalidArgs(e.to_string()))?;
        Ok(der::asn1::GeneralizedTime::from(dt))
    };
    Ok(OptionalValidity {
        not_before: Some(to_gt(not_before)?),
        not_after: Some(to_gt(not_after)?),
    })
}

/// Resolve the template's public key: the configured new key pair, else the
/// key currently used for signature protection (rebinding the same key,
/// e.g. a KUR that only refreshes validity/extensions), else the public key
/// embedded in a configured PKCS#10 CSR.
fn resolve_public_key(ctx: &Context) -> Result<SubjectPublicKeyInfoOwned> {
    if let Some(new_key) = &ctx.new_key {
        return new_key.public_key_info();
    }
    if let Some(ProtectionMethod::Signature { signing_key, .. }) = &ctx.protection {
        return signing_key.public_key_info();
    }
    if let Some(csr_der) = &ctx.pkcs10_csr {
        let csr = x509_cert::request::CertReq::from_der(csr_der)
            .map_err(|e| CmpError::X509Parse(e.to_string()))?;
        return Ok(csr.info.public_key);
    }
    Err(CmpError::InvalidArgs(
        "no public key available for the certificate template".into(),
    ))
}

fn set_extension(exts: &mut Extensions, oid: ObjectIdentifier, critical: bool, value_der: Vec<u8>) -> Result<()> {
    let extn_value =
        der::asn1::OctetString::new(value_der).map_err(|e| CmpError::InvalidArgs(e.to_string()))?;
    exts.retain(|e| e.extn_id != oid);
    exts.push(Extension { extn_id: oid, critical, extn_value });
    Ok(())
}

/// Build the merged extensions list (spec.md §4.3's "merge in order": SANs,
/// SAN inheritance from the reference cert, configured policies, on top of
/// whatever extensions the caller already configured via
/// `set_req_extensions`).
fn build_extensions(ctx: &Context, body_type: PkiBodyType) -> Result<Option<Extensions>> {
    let mut exts: Extensions = ctx.req_extensions.clone().unwrap_or_default();

    if !ctx.subject_alt_names.is_empty() {
        let der = crate::asn1::encode_general_names(&ctx.subject_alt_names);
        set_extension(
            &mut exts,
            ObjectIdentifier::new_unwrap(OID_SUBJECT_ALT_NAME),
            ctx.set_subject_alt_name_critical,
            der,
        )?;
    } else if !ctx.subject_alt_name_nodefault {
        if let Some(old) = &ctx.old_client_cert {
            if let Some(old_exts) = &old.tbs_certificate.extensions {
                if let Some(san) = old_exts
                    .iter()
                    .find(|e| e.extn_id.to_string() == OID_SUBJECT_ALT_NAME)
                {
                    exts.retain(|e| e.extn_id.to_string() != OID_SUBJECT_ALT_NAME);
                    exts.push(san.clone());
                }
            }
        }
    }

    if !ctx.cert_policies.is_empty() {
        let der = crate::asn1::encode_cert_policies(&ctx.cert_policies);
        set_extension(
            &mut exts,
            ObjectIdentifier::new_unwrap(OID_CERT_POLICIES),
            ctx.policies_critical,
            der,
        )?;
    }

    let _ = body_type;
    Ok(if exts.is_empty() { None } else { Some(exts) })
}

fn build_template(ctx: &Context, body_type: PkiBodyType) -> Result<CertTemplate> {
    let subject = match &ctx.subject_name {
        Some(s) => Some(s.clone()),
        None if body_type == PkiBodyType::Kur || ctx.subject_alt_names.is_empty() => {
            ctx.old_client_cert.as_ref().map(|c| c.tbs_certificate.subject.clone())
        }
        None => None,
    };
    let issuer = ctx
        .issuer
        .clone()
        .or_else(|| ctx.old_client_cert.as_ref().map(|c| c.tbs_certificate.issuer.clone()));
    let public_key = Some(resolve_public_key(ctx)?);
    let validity = match ctx.days {
        Some(days) => Some(validity_window(days)?),
        None => None,
    };
    let extensions = build_extensions(ctx, body_type)?;

    Ok(CertTemplate {
        version: None,
        serial_number: None,
        signing_alg: None,
        issuer,
        validity,
        subject,
        public_key,
        extensions,
    })
}

fn old_cert_id_control(ctx: &Context) -> Option<Control> {
    let old = ctx.old_client_cert.as_ref()?;
    let id = CertId {
        issuer: crate::asn1::header::GeneralName::DirectoryName(old.tbs_certificate.issuer.clone()),
        serial_number: old.tbs_certificate.serial_number.as_bytes().to_vec(),
    };
    let value = crate::asn1::encode_cert_id_any(&id).ok()?;
    Some(Control {
        control_type: ObjectIdentifier::new_unwrap(OID_REG_CTRL_OLD_CERT_ID),
        value,
    })
}

fn build_popo(ctx: &Context, cert_req: &CertRequest) -> Result<Option<ProofOfPossession>> {
    match ctx.popo_method {
        PopoMethod::RaVerified => Ok(Some(ProofOfPossession::RaVerified)),
        PopoMethod::Signature => {
            let key = ctx
                .new_key
                .as_ref()
                .ok_or_else(|| CmpError::InvalidArgs("signature POPO requires a configured new key pair".into()))?;
            let data = crate::asn1::encode_cert_request(cert_req);
            let signature = key.sign_to_bit_string(&data, ctx.digest_alg)?;
            Ok(Some(ProofOfPossession::Signature(
                crate::asn1::certreq::PopoSigningKey {
                    algorithm_identifier: key.algorithm_identifier(ctx.digest_alg),
                    signature,
                },
            )))
        }
        PopoMethod::KeyEncipherment | PopoMethod::KeyAgreement => Ok(None),
    }
}

fn build_cert_req_msg(ctx: &Context, body_type: PkiBodyType) -> Result<crate::asn1::certreq::CertReqMsg> {
    let cert_template = build_template(ctx, body_type)?;
    let mut controls = Vec::new();
    if body_type == PkiBodyType::Kur {
        if let Some(control) = old_cert_id_control(ctx) {
            controls.push(control);
        }
    }
    let cert_req = CertRequest {
        cert_req_id: 0,
        cert_template,
        controls: if controls.is_empty() { None } else { Some(controls) },
    };
    let popo = build_popo(ctx, &cert_req)?;
    Ok(crate::asn1::certreq::CertReqMsg { cert_req, popo, reg_info: None })
}

fn create_enrollment(ctx: &mut Context, body_type: PkiBodyType) -> Result<PkiMessage> {
    let shell = super::msg_create(ctx, body_type)?;
    let msg = build_cert_req_msg(ctx, body_type)
        .map_err(|e| CmpError::BodyConstruction { body: body_type.name(), detail: e.to_string() })?;
    let body = match body_type {
        PkiBodyType::Ir => PkiBody::Ir(vec![msg]),
        PkiBodyType::Cr => PkiBody::Cr(vec![msg]),
        PkiBodyType::Kur => PkiBody::Kur(vec![msg]),
        _ => unreachable!("create_enrollment only called for IR/CR/KUR"),
    };
    super::finish(ctx, shell, body)
}

/// Build and protect an `ir` carrying one `CertReqMsg`.
pub fn create_ir(ctx: &mut Context) -> Result<PkiMessage> {
    create_enrollment(ctx, PkiBodyType::Ir)
}

/// Build and protect a `cr` carrying one `CertReqMsg`.
pub fn create_cr(ctx: &mut Context) -> Result<PkiMessage> {
    create_enrollment(ctx, PkiBodyType::Cr)
}

/// Build and protect a `kur` carrying one `CertReqMsg` plus its
/// `OldCertID` control.
pub fn create_kur(ctx: &mut Context) -> Result<PkiMessage> {
    create_enrollment(ctx, PkiBodyType::Kur)
}

/// Build and protect a `p10cr` embedding the configured PKCS#10 CSR
/// verbatim — no CRMF structure at all (spec.md §4.3).
pub fn create_p10cr(ctx: &mut Context) -> Result<PkiMessage> {
    let shell = super::msg_create(ctx, PkiBodyType::P10cr)?;
    let csr_der = ctx
        .pkcs10_csr
        .clone()
        .ok_or_else(|| CmpError::InvalidArgs("p10cr requires a configured PKCS#10 CSR".into()))?;
    let any = der::Any::from_der(&csr_der).map_err(CmpError::Der)?;
    super::finish(ctx, shell, PkiBody::P10cr(any))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protect::signature::SigningKeyHandle;
    use ed25519_dalek::SigningKey as EdSigningKey;
    use rand::rngs::OsRng;
    use x509_cert::name::Name;

    fn ctx_with_popo() -> Context {
        let mut rng = OsRng;
        let key = EdSigningKey::generate(&mut rng);
        Context::new()
            .set_subject(Name::default())
            .set_new_key(SigningKeyHandle::from_ed25519(key))
    }

    #[test]
    fn ir_requires_protection_material() {
        let mut ctx = ctx_with_popo();
        let err = create_ir(&mut ctx).unwrap_err();
        assert!(matches!(err, CmpError::MissingKeyInputForCreatingProtection));
    }

    #[test]
    fn ir_succeeds_with_pbmac_and_popo_signature() {
        let mut ctx = ctx_with_popo()
            .set_pbmac(b"ref".to_vec(), b"secret".to_vec(), crate::protect::pbmac::DigestAlg::Sha256, crate::protect::pbmac::MacAlg::HmacSha256, 500)
            .unwrap();
        let msg = create_ir(&mut ctx).unwrap();
        assert!(matches!(msg.body, PkiBody::Ir(ref reqs) if reqs.len() == 1));
        assert!(msg.protection.is_some());
    }
}
