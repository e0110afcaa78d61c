//! `PKIMessage` (RFC 4210 §5.1) and the `ProtectedPart` the protection
//! engine signs/MACs.

use crate::asn1::body::PkiBody;
use crate::asn1::header::PkiHeader;
use crate::error::{CmpError, Result};
use der::asn1::BitString;
use x509_cert::Certificate;

/// `ProtectedPart ::= SEQUENCE { header PKIHeader, body PKIBody }` — the
/// exact bytes protection is computed over and verified against (spec.md
/// §3, §4.4, §8). Re-encoding MUST be byte-identical to what the peer
/// hashed; this engine achieves that by treating [`PkiMessage::header`]
/// and [`PkiMessage::body`] as immutable for the lifetime of one protect/
/// verify cycle and always re-deriving `ProtectedPart` bytes from them
/// rather than caching a stale encoding.
pub struct ProtectedPart<'a> {
    pub header: &'a PkiHeader,
    pub body: &'a PkiBody,
}

impl<'a> ProtectedPart<'a> {
    /// DER-encode `SEQUENCE { header, body }`, the bytes signed/MACed and
    /// later re-derived for verification.
    pub fn to_der(&self) -> Result<Vec<u8>> {
        crate::asn1::codec::encode_protected_part(self.header, self.body)
    }
}

/// `PKIMessage ::= SEQUENCE { header PKIHeader, body PKIBody, protection
/// [0] BIT STRING OPTIONAL, extraCerts [1] SEQUENCE SIZE (1..MAX) OF
/// CMPCertificate OPTIONAL }`
#[derive(Clone, Debug)]
pub struct PkiMessage {
    pub header: PkiHeader,
    pub body: PkiBody,
    pub protection: Option<BitString>,
    pub extra_certs: Option<Vec<Certificate>>,
}

impl PkiMessage {
    /// Build an unprotected shell around a header and body.
    pub fn new(header: PkiHeader, body: PkiBody) -> Self {
        Self {
            header,
            body,
            protection: None,
            extra_certs: None,
        }
    }

    /// Borrow the `ProtectedPart` view used for protect/verify.
    pub fn protected_part(&self) -> ProtectedPart<'_> {
        ProtectedPart {
            header: &self.header,
            body: &self.body,
        }
    }

    /// DER-encode the full `PKIMessage`, including protection and
    /// extraCerts if present — the bytes actually placed on the wire by a
    /// [`crate::transfer::Transfer`] implementation.
    pub fn to_der(&self) -> Result<Vec<u8>> {
        crate::asn1::codec::encode_message(self)
    }

    /// Decode a `PKIMessage` previously produced by [`PkiMessage::to_der`]
    /// or received from a peer.
    pub fn from_der(bytes: &[u8]) -> Result<Self> {
        crate::asn1::codec::decode_message(bytes)
    }

    /// The [`crate::asn1::body::PkiBodyType`] of this message's body.
    pub fn body_type(&self) -> crate::asn1::body::PkiBodyType {
        self.body.body_type()
    }
}

impl TryFrom<&[u8]> for PkiMessage {
    type Error = CmpError;
    fn try_from(bytes: &[u8]) -> Result<Self> {
        Self::from_der(bytes)
    }
}

#[cfg(test)]
mod tests {
    //! `decode(encode(msg)) == msg` for a representative sample of body
    //! variants (spec.md §8's round-trip law), checked field-by-field
    //! since most of the ASN.1 types deliberately don't derive `PartialEq`
    //! (several carry `x509_cert`/`der` types that don't either).

    use super::*;
    use crate::asn1::body::{
        CertStatus, ErrorMsgContent, PkiBody, PkiFailureInfo, PkiStatusInfo,
    };
    use crate::asn1::header::InfoTypeAndValue;
    use crate::context::Context;
    use crate::header_builder::header_init;
    use der::asn1::{ObjectIdentifier, OctetString};

    fn sample_header() -> PkiHeader {
        let mut ctx = Context::new();
        header_init(&mut ctx, crate::asn1::body::PkiBodyType::Ir).unwrap()
    }

    fn round_trip(body: PkiBody) -> PkiMessage {
        let msg = PkiMessage::new(sample_header(), body);
        let der = msg.to_der().unwrap();
        PkiMessage::from_der(&der).unwrap()
    }

    #[test]
    fn pkiconf_round_trips() {
        let original = sample_header();
        let decoded = round_trip(PkiBody::PkiConf);
        assert_eq!(decoded.header.transaction_id, original.transaction_id);
        assert_eq!(decoded.header.sender_nonce, original.sender_nonce);
        assert_eq!(decoded.header.pvno, PkiHeader::PVNO_CMP2000);
        assert!(matches!(decoded.body, PkiBody::PkiConf));
    }

    #[test]
    fn error_body_round_trips() {
        let status = PkiStatusInfo::rejection(PkiFailureInfo::BAD_POP, "nope");
        let body = PkiBody::Error(ErrorMsgContent {
            status,
            error_code: Some(42),
            error_details: Some(vec!["extra detail".into()]),
        });
        let decoded = round_trip(body);
        match decoded.body {
            PkiBody::Error(content) => {
                assert_eq!(content.status.status, crate::asn1::body::PkiStatus::Rejection);
                assert!(content.status.fail_info.unwrap().has(PkiFailureInfo::BAD_POP));
                assert_eq!(content.error_code, Some(42));
                assert_eq!(content.error_details, Some(vec!["extra detail".to_string()]));
            }
            other => panic!("expected Error body, got {other:?}"),
        }
    }

    #[test]
    fn certconf_round_trips_with_accepted_status() {
        let cert_hash = OctetString::new(vec![1, 2, 3, 4]).unwrap();
        let body = PkiBody::CertConf(vec![CertStatus {
            cert_hash: cert_hash.clone(),
            cert_req_id: 0,
            status_info: Some(PkiStatusInfo::accepted()),
        }]);
        let decoded = round_trip(body);
        match decoded.body {
            PkiBody::CertConf(statuses) => {
                assert_eq!(statuses.len(), 1);
                assert_eq!(statuses[0].cert_hash, cert_hash);
                assert_eq!(statuses[0].cert_req_id, 0);
                assert_eq!(
                    statuses[0].status_info.as_ref().unwrap().status,
                    crate::asn1::body::PkiStatus::Accepted
                );
            }
            other => panic!("expected CertConf body, got {other:?}"),
        }
    }

    #[test]
    fn genm_round_trips_with_itavs() {
        let oid = ObjectIdentifier::new_unwrap("1.3.6.1.5.5.7.4.1");
        let body = PkiBody::GenM(vec![InfoTypeAndValue::flag(oid.clone())]);
        let decoded = round_trip(body);
        match decoded.body {
            PkiBody::GenM(itavs) => {
                assert_eq!(itavs.len(), 1);
                assert_eq!(itavs[0].info_type, oid);
                assert!(itavs[0].info_value.is_none());
            }
            other => panic!("expected GenM body, got {other:?}"),
        }
    }

    #[test]
    fn poll_req_round_trips() {
        let body = PkiBody::PollReq(crate::asn1::body::PollReqContent { cert_req_id: 7 });
        let decoded = round_trip(body);
        match decoded.body {
            PkiBody::PollReq(req) => assert_eq!(req.cert_req_id, 7),
            other => panic!("expected PollReq body, got {other:?}"),
        }
    }

    #[test]
    fn poll_rep_round_trips() {
        let body = PkiBody::PollRep(crate::asn1::body::PollRepContent {
            cert_req_id: 3,
            check_after: 120,
            reason: None,
        });
        let decoded = round_trip(body);
        match decoded.body {
            PkiBody::PollRep(rep) => {
                assert_eq!(rep.cert_req_id, 3);
                assert_eq!(rep.check_after, 120);
            }
            other => panic!("expected PollRep body, got {other:?}"),
        }
    }

    #[test]
    fn mutated_protection_byte_changes_reencoded_message() {
        // Sanity check for spec.md §8's "protect then verify fails with
        // flipped protection bits" law at the wire-format level: two
        // messages differing only in protection bytes encode differently.
        use der::asn1::BitString;

        let mut a = PkiMessage::new(sample_header(), PkiBody::PkiConf);
        a.protection = Some(BitString::from_bytes(&[1, 2, 3]).unwrap());
        let mut b = a.clone();
        b.protection = Some(BitString::from_bytes(&[1, 2, 4]).unwrap());

        assert_ne!(a.to_der().unwrap(), b.to_der().unwrap());
    }
}
