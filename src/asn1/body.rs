//! `PKIBody` (RFC 4210 Appendix F, the 27-variant `CHOICE`) and the status /
//! response types carried inside the enrollment and revocation bodies.

use crate::asn1::certreq::CertReqMsg;
use der::asn1::OctetString;
use der::Any;
use x509_cert::Certificate;

/// Integer tag identifying each `PKIBody` choice, used for diagnostics and
/// for the received-message body-type check (spec.md §4.6).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(i32)]
pub enum PkiBodyType {
    Ir = 0,
    Ip = 1,
    Cr = 2,
    Cp = 3,
    P10cr = 4,
    Popdecc = 5,
    Popdecr = 6,
    Kur = 7,
    Kup = 8,
    Krr = 9,
    Krp = 10,
    Rr = 11,
    Rp = 12,
    Ccr = 13,
    Ccp = 14,
    Ckuann = 15,
    Cann = 16,
    Rann = 17,
    Crlann = 18,
    PkiConf = 19,
    Nested = 20,
    GenM = 21,
    GenP = 22,
    Error = 23,
    CertConf = 24,
    PollReq = 25,
    PollRep = 26,
}

impl PkiBodyType {
    /// Name as used in diagnostics (`spec.md`'s own lowercase body names).
    pub fn name(self) -> &'static str {
        match self {
            PkiBodyType::Ir => "ir",
            PkiBodyType::Ip => "ip",
            PkiBodyType::Cr => "cr",
            PkiBodyType::Cp => "cp",
            PkiBodyType::P10cr => "p10cr",
            PkiBodyType::Popdecc => "popdecc",
            PkiBodyType::Popdecr => "popdecr",
            PkiBodyType::Kur => "kur",
            PkiBodyType::Kup => "kup",
            PkiBodyType::Krr => "krr",
            PkiBodyType::Krp => "krp",
            PkiBodyType::Rr => "rr",
            PkiBodyType::Rp => "rp",
            PkiBodyType::Ccr => "ccr",
            PkiBodyType::Ccp => "ccp",
            PkiBodyType::Ckuann => "ckuann",
            PkiBodyType::Cann => "cann",
            PkiBodyType::Rann => "rann",
            PkiBodyType::Crlann => "crlann",
            PkiBodyType::PkiConf => "pkiconf",
            PkiBodyType::Nested => "nested",
            PkiBodyType::GenM => "genm",
            PkiBodyType::GenP => "genp",
            PkiBodyType::Error => "error",
            PkiBodyType::CertConf => "certConf",
            PkiBodyType::PollReq => "pollReq",
            PkiBodyType::PollRep => "pollRep",
        }
    }

    /// Decode a raw body-type tag (0..26), per spec.md §4.6's "known CMP
    /// body" check.
    pub fn from_tag(tag: i32) -> Option<Self> {
        use PkiBodyType::*;
        Some(match tag {
            0 => Ir,
            1 => Ip,
            2 => Cr,
            3 => Cp,
            4 => P10cr,
            5 => Popdecc,
            6 => Popdecr,
            7 => Kur,
            8 => Kup,
            9 => Krr,
            10 => Krp,
            11 => Rr,
            12 => Rp,
            13 => Ccr,
            14 => Ccp,
            15 => Ckuann,
            16 => Cann,
            17 => Rann,
            18 => Crlann,
            19 => PkiConf,
            20 => Nested,
            21 => GenM,
            22 => GenP,
            23 => Error,
            24 => CertConf,
            25 => PollReq,
            26 => PollRep,
            _ => return None,
        })
    }
}

/// `PKIStatus ::= INTEGER` (RFC 4210 §5.2.3).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(i32)]
pub enum PkiStatus {
    Accepted = 0,
    GrantedWithMods = 1,
    Rejection = 2,
    Waiting = 3,
    RevocationWarning = 4,
    RevocationNotification = 5,
    KeyUpdateWarning = 6,
}

impl PkiStatus {
    /// Printable name, as used by [`crate::status::render`].
    pub fn name(self) -> &'static str {
        match self {
            PkiStatus::Accepted => "accepted",
            PkiStatus::GrantedWithMods => "grantedWithMods",
            PkiStatus::Rejection => "rejection",
            PkiStatus::Waiting => "waiting",
            PkiStatus::RevocationWarning => "revocationWarning",
            PkiStatus::RevocationNotification => "revocationNotification",
            PkiStatus::KeyUpdateWarning => "keyUpdateWarning",
        }
    }

    pub fn from_i32(v: i32) -> Option<Self> {
        use PkiStatus::*;
        Some(match v {
            0 => Accepted,
            1 => GrantedWithMods,
            2 => Rejection,
            3 => Waiting,
            4 => RevocationWarning,
            5 => RevocationNotification,
            6 => KeyUpdateWarning,
            _ => return None,
        })
    }
}

/// `PKIFailureInfo ::= BIT STRING` (RFC 4210 §5.2.3), 27 named bits. Stored
/// as a plain bitmask; bit `n` corresponds to the name at ASN.1 position
/// `n` (bit 0 = `badAlg`, ...).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PkiFailureInfo(pub u32);

macro_rules! fail_bits {
    ($(($name:ident, $bit:expr, $label:literal)),+ $(,)?) => {
        impl PkiFailureInfo {
            $(
                #[doc = $label]
                pub const $name: Self = Self(1 << $bit);
            )+

            /// All 27 names in ASN.1 bit order, for printing (spec.md §4.8).
            pub const NAMES: &'static [(Self, &'static str)] = &[
                $((Self::$name, $label)),+
            ];

            /// Whether this bitmask contains the given single flag.
            pub fn has(self, flag: Self) -> bool {
                self.0 & flag.0 != 0
            }

            /// Merge another bitmask in (used by certConf callback escalation).
            pub fn union(self, other: Self) -> Self {
                Self(self.0 | other.0)
            }

            /// True when no bits are set.
            pub fn is_empty(self) -> bool {
                self.0 == 0
            }

            /// Names of every set bit, in ASN.1 order.
            pub fn set_names(self) -> Vec<&'static str> {
                Self::NAMES
                    .iter()
                    .filter(|(flag, _)| self.has(*flag))
                    .map(|(_, name)| *name)
                    .collect()
            }
        }
    };
}

fail_bits! {
    (BAD_ALG, 0, "badAlg"),
    (BAD_MESSAGE_CHECK, 1, "badMessageCheck"),
    (BAD_REQUEST, 2, "badRequest"),
    (BAD_TIME, 3, "badTime"),
    (BAD_CERT_ID, 4, "badCertId"),
    (BAD_DATA_FORMAT, 5, "badDataFormat"),
    (WRONG_AUTHORITY, 6, "wrongAuthority"),
    (INCORRECT_DATA, 7, "incorrectData"),
    (MISSING_TIME_STAMP, 8, "missingTimeStamp"),
    (BAD_POP, 9, "badPOP"),
    (CERT_REVOKED, 10, "certRevoked"),
    (CERT_CONFIRMED, 11, "certConfirmed"),
    (WRONG_INTEGRITY, 12, "wrongIntegrity"),
    (BAD_RECIPIENT_NONCE, 13, "badRecipientNonce"),
    (TIME_NOT_AVAILABLE, 14, "timeNotAvailable"),
    (UNACCEPTED_POLICY, 15, "unacceptedPolicy"),
    (UNACCEPTED_EXTENSION, 16, "unacceptedExtension"),
    (ADD_INFO_NOT_AVAILABLE, 17, "addInfoNotAvailable"),
    (BAD_SENDER_NONCE, 18, "badSenderNonce"),
    (BAD_CERT_TEMPLATE, 19, "badCertTemplate"),
    (SIGNER_NOT_TRUSTED, 20, "signerNotTrusted"),
    (TRANSACTION_ID_IN_USE, 21, "transactionIdInUse"),
    (UNSUPPORTED_VERSION, 22, "unsupportedVersion"),
    (NOT_AUTHORIZED, 23, "notAuthorized"),
    (SYSTEM_UNAVAIL, 24, "systemUnavail"),
    (SYSTEM_FAILURE, 25, "systemFailure"),
    (DUPLICATE_CERT_REQ, 26, "duplicateCertReq"),
}

/// `PKIStatusInfo ::= SEQUENCE { status PKIStatus, statusString PKIFreeText OPTIONAL, failInfo PKIFailureInfo OPTIONAL }`
#[derive(Clone, Debug)]
pub struct PkiStatusInfo {
    pub status: PkiStatus,
    pub status_string: Option<Vec<String>>,
    pub fail_info: Option<PkiFailureInfo>,
}

impl PkiStatusInfo {
    pub fn accepted() -> Self {
        Self {
            status: PkiStatus::Accepted,
            status_string: None,
            fail_info: None,
        }
    }

    pub fn rejection(fail_info: PkiFailureInfo, text: impl Into<String>) -> Self {
        Self {
            status: PkiStatus::Rejection,
            status_string: Some(vec![text.into()]),
            fail_info: Some(fail_info),
        }
    }
}

/// `CertId ::= SEQUENCE { issuer GeneralName, serialNumber INTEGER }`
#[derive(Clone, Debug)]
pub struct CertId {
    pub issuer: crate::asn1::header::GeneralName,
    pub serial_number: Vec<u8>,
}

/// `CertStatus` carried in a `certConf` message — one per newly issued
/// certificate, always `certReqId = 0` per spec.md §4.3 (this engine never
/// requests more than one certificate per transaction).
#[derive(Clone, Debug)]
pub struct CertStatus {
    pub cert_hash: OctetString,
    pub cert_req_id: i32,
    pub status_info: Option<PkiStatusInfo>,
}

/// `CertResponse ::= SEQUENCE { certReqId INTEGER, status PKIStatusInfo, certifiedKeyPair CertifiedKeyPair OPTIONAL, rspInfo OCTET STRING OPTIONAL }`
#[derive(Clone, Debug)]
pub struct CertResponse {
    pub cert_req_id: i32,
    pub status: PkiStatusInfo,
    pub certified_key_pair: Option<Certificate>,
}

/// `CertRepMessage ::= SEQUENCE { caPubs [1] SEQUENCE SIZE (1..MAX) OF CMPCertificate OPTIONAL, response SEQUENCE OF CertResponse }`
#[derive(Clone, Debug)]
pub struct CertRepMessage {
    pub ca_pubs: Option<Vec<Certificate>>,
    pub response: Vec<CertResponse>,
}

/// `RevRepContent ::= SEQUENCE { status SEQUENCE OF PKIStatusInfo, revCerts [0] SEQUENCE OF CertId OPTIONAL, crls [1] SEQUENCE OF CertificateList OPTIONAL }`
#[derive(Clone, Debug)]
pub struct RevRepContent {
    pub status: Vec<PkiStatusInfo>,
    pub rev_certs: Option<Vec<CertId>>,
}

/// `PollReqContent ::= SEQUENCE OF SEQUENCE { certReqId INTEGER }`
#[derive(Clone, Debug)]
pub struct PollReqContent {
    pub cert_req_id: i32,
}

/// `PollRepContent ::= SEQUENCE OF SEQUENCE { certReqId INTEGER, checkAfter INTEGER, reason PKIFreeText OPTIONAL }`
#[derive(Clone, Debug)]
pub struct PollRepContent {
    pub cert_req_id: i32,
    pub check_after: i64,
    pub reason: Option<Vec<String>>,
}

/// `ErrorMsgContent ::= SEQUENCE { pKIStatusInfo PKIStatusInfo, errorCode INTEGER OPTIONAL, errorDetails PKIFreeText OPTIONAL }`
#[derive(Clone, Debug)]
pub struct ErrorMsgContent {
    pub status: PkiStatusInfo,
    pub error_code: Option<i64>,
    pub error_details: Option<Vec<String>>,
}

/// The 27-variant `PKIBody` choice. Variants this engine neither produces
/// nor consumes beyond pass-through (`nested`, `krr`/`krp`, the
/// announcement bodies, `popdecc`/`popdecr`) keep their raw `ANY` content.
#[derive(Clone, Debug)]
pub enum PkiBody {
    Ir(Vec<CertReqMsg>),
    Ip(CertRepMessage),
    Cr(Vec<CertReqMsg>),
    Cp(CertRepMessage),
    P10cr(Any),
    Popdecc(Any),
    Popdecr(Any),
    Kur(Vec<CertReqMsg>),
    Kup(CertRepMessage),
    Krr(Any),
    Krp(Any),
    Rr(Vec<crate::asn1::certreq::CertTemplate>),
    Rp(RevRepContent),
    Ccr(Any),
    Ccp(Any),
    Ckuann(Any),
    Cann(Any),
    Rann(Any),
    Crlann(Any),
    PkiConf,
    Nested(Any),
    GenM(Vec<crate::asn1::header::InfoTypeAndValue>),
    GenP(Vec<crate::asn1::header::InfoTypeAndValue>),
    Error(ErrorMsgContent),
    CertConf(Vec<CertStatus>),
    PollReq(PollReqContent),
    PollRep(PollRepContent),
}

impl PkiBody {
    /// The [`PkiBodyType`] tag for this variant.
    pub fn body_type(&self) -> PkiBodyType {
        match self {
            PkiBody::Ir(_) => PkiBodyType::Ir,
            PkiBody::Ip(_) => PkiBodyType::Ip,
            PkiBody::Cr(_) => PkiBodyType::Cr,
            PkiBody::Cp(_) => PkiBodyType::Cp,
            PkiBody::P10cr(_) => PkiBodyType::P10cr,
            PkiBody::Popdecc(_) => PkiBodyType::Popdecc,
            PkiBody::Popdecr(_) => PkiBodyType::Popdecr,
            PkiBody::Kur(_) => PkiBodyType::Kur,
            PkiBody::Kup(_) => PkiBodyType::Kup,
            PkiBody::Krr(_) => PkiBodyType::Krr,
            PkiBody::Krp(_) => PkiBodyType::Krp,
            PkiBody::Rr(_) => PkiBodyType::Rr,
            PkiBody::Rp(_) => PkiBodyType::Rp,
            PkiBody::Ccr(_) => PkiBodyType::Ccr,
            PkiBody::Ccp(_) => PkiBodyType::Ccp,
            PkiBody::Ckuann(_) => PkiBodyType::Ckuann,
            PkiBody::Cann(_) => PkiBodyType::Cann,
            PkiBody::Rann(_) => PkiBodyType::Rann,
            PkiBody::Crlann(_) => PkiBodyType::Crlann,
            PkiBody::PkiConf => PkiBodyType::PkiConf,
            PkiBody::Nested(_) => PkiBodyType::Nested,
            PkiBody::GenM(_) => PkiBodyType::GenM,
            PkiBody::GenP(_) => PkiBodyType::GenP,
            PkiBody::Error(_) => PkiBodyType::Error,
            PkiBody::CertConf(_) => PkiBodyType::CertConf,
            PkiBody::PollReq(_) => PkiBodyType::PollReq,
            PkiBody::PollRep(_) => PkiBodyType::PollRep,
        }
    }
}
