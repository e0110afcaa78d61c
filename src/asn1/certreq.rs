//! CRMF (RFC 4211) types embedded in `ir`/`cr`/`kur` bodies.

use der::asn1::{BitString, GeneralizedTime};
use der::{oid::ObjectIdentifier, Any};
use spki::{AlgorithmIdentifierOwned, SubjectPublicKeyInfoOwned};
use x509_cert::ext::Extensions;
use x509_cert::name::Name;

/// `OptionalValidity ::= SEQUENCE { notBefore [0] Time OPTIONAL, notAfter [1] Time OPTIONAL }`
#[derive(Clone, Debug, Default)]
pub struct OptionalValidity {
    pub not_before: Option<GeneralizedTime>,
    pub not_after: Option<GeneralizedTime>,
}

/// `CertTemplate ::= SEQUENCE { version, serialNumber, signingAlg, issuer,
/// validity, subject, publicKey, issuerUID, subjectUID, extensions }` — all
/// fields `OPTIONAL` per RFC 4211 §5; this engine always sets at least
/// `subject` and `publicKey` for IR/CR/KUR, and only `issuer` +
/// `serialNumber` for RR (spec.md §4.3).
#[derive(Clone, Debug, Default)]
pub struct CertTemplate {
    pub version: Option<i8>,
    pub serial_number: Option<Vec<u8>>,
    pub signing_alg: Option<AlgorithmIdentifierOwned>,
    pub issuer: Option<Name>,
    pub validity: Option<OptionalValidity>,
    pub subject: Option<Name>,
    pub public_key: Option<SubjectPublicKeyInfoOwned>,
    pub extensions: Option<Extensions>,
}

impl CertTemplate {
    /// A template carrying only issuer + serial, as used by RR (spec.md
    /// §4.3: "fill a CertTemplate with the old cert's issuer + serial").
    pub fn for_revocation(issuer: Name, serial_number: Vec<u8>) -> Self {
        Self {
            issuer: Some(issuer),
            serial_number: Some(serial_number),
            ..Default::default()
        }
    }
}

/// `POPOSigningKey ::= SEQUENCE { poposkInput ... OPTIONAL, algorithmIdentifier AlgorithmIdentifier, signature BIT STRING }`
#[derive(Clone, Debug)]
pub struct PopoSigningKey {
    pub algorithm_identifier: AlgorithmIdentifierOwned,
    pub signature: BitString,
}

/// `ProofOfPossession ::= CHOICE { raVerified [0] NULL, signature [1]
/// POPOSigningKey, keyEncipherment [2] POPOPrivKey, keyAgreement [3]
/// POPOPrivKey }`. This engine only ever *produces* `raVerified` (for
/// MAC-authenticated, RA-vouched-for requests) or `signature` (the normal
/// case, spec.md §4.3 "Create PoP according to selected method"); the
/// encipherment/agreement choices are represented opaquely for
/// completeness since this engine never originates them.
#[derive(Clone, Debug)]
pub enum ProofOfPossession {
    RaVerified,
    Signature(PopoSigningKey),
    KeyEncipherment(Any),
    KeyAgreement(Any),
}

/// `AttributeTypeAndValue`-shaped CRMF control, e.g.
/// `id-regCtrl-oldCertID`.
#[derive(Clone, Debug)]
pub struct Control {
    pub control_type: ObjectIdentifier,
    pub value: Any,
}

/// `CertRequest ::= SEQUENCE { certReqId INTEGER, certTemplate CertTemplate, controls Controls OPTIONAL }`
#[derive(Clone, Debug)]
pub struct CertRequest {
    /// Always `0` — this engine never batches more than one request per
    /// message (spec.md §9 Open Question: `MULTIPLE_RESPONSES_NOT_SUPPORTED`).
    pub cert_req_id: i32,
    pub cert_template: CertTemplate,
    pub controls: Option<Vec<Control>>,
}

/// `CertReqMsg ::= SEQUENCE { certReq CertRequest, popo ProofOfPossession OPTIONAL, regInfo SEQUENCE OF AttributeTypeAndValue OPTIONAL }`
#[derive(Clone, Debug)]
pub struct CertReqMsg {
    pub cert_req: CertRequest,
    pub popo: Option<ProofOfPossession>,
    pub reg_info: Option<Vec<Control>>,
}
