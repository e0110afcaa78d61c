//! `PKIHeader` (RFC 4210 §5.1.3) and its component types.

use der::asn1::{GeneralizedTime, OctetString, Utf8StringRef};
use der::Any;
use spki::AlgorithmIdentifierOwned;
use x509_cert::name::Name;

/// `GeneralName` (RFC 5280 §4.2.1.6), trimmed to the choices this engine
/// actually produces or inspects: `directoryName`, used throughout CMP
/// header sender/recipient fields, plus an opaque fallback for the other
/// eight choices (rfc822Name, dNSName, ...) the engine passes through
/// untouched when they appear in a peer's SubjectAltName.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GeneralName {
    /// `directoryName [4] Name` — the only choice CMP headers use for
    /// sender/recipient in this engine.
    DirectoryName(Name),
    /// Any other `GeneralName` choice, carried as its raw context-specific
    /// `ANY` content.
    Other(Any),
}

impl GeneralName {
    /// The NULL-DN general name used when no sender identity is
    /// established yet (spec.md §4.2: MAC-only requests before the first
    /// certificate is issued).
    pub fn null_dn() -> Self {
        GeneralName::DirectoryName(Name::default())
    }

    /// Render as an RFC 4514 distinguished-name string, if this is a
    /// `directoryName`.
    pub fn as_directory_name(&self) -> Option<&Name> {
        match self {
            GeneralName::DirectoryName(n) => Some(n),
            GeneralName::Other(_) => None,
        }
    }
}

/// `PKIFreeText ::= SEQUENCE SIZE (1..MAX) OF UTF8String`
pub type PkiFreeText = Vec<String>;

/// `InfoTypeAndValue ::= SEQUENCE { infoType OBJECT IDENTIFIER, infoValue ANY DEFINED BY infoType OPTIONAL }`
#[derive(Clone, Debug)]
pub struct InfoTypeAndValue {
    /// The OID identifying the general-message / generalInfo item kind
    pub info_type: der::asn1::ObjectIdentifier,
    /// Its associated value, absent for boolean-flag-style items such as
    /// `implicitConfirm`/`confirmWaitTime`.
    pub info_value: Option<Any>,
}

impl InfoTypeAndValue {
    /// Build a flag-style item with no value (e.g. `id-it-implicitConfirm`).
    pub fn flag(oid: der::asn1::ObjectIdentifier) -> Self {
        Self {
            info_type: oid,
            info_value: None,
        }
    }
}

/// `PKIHeader` (RFC 4210 §5.1.3). Field numbering follows the ASN.1 module;
/// tag handling for the implicit `[0]`..`[7]` context tags is the
/// responsibility of [`crate::asn1::message`]'s hand-rolled codec rather
/// than `der`'s `Sequence` derive, since several fields are themselves
/// already `CHOICE`/`ANY` types that don't compose cleanly with derive
/// attributes across `der` point releases.
#[derive(Clone, Debug)]
pub struct PkiHeader {
    /// Always 2 (`cmp2000`) for messages this engine produces.
    pub pvno: i8,
    /// Sender identity (usually the client cert subject or NULL-DN)
    pub sender: GeneralName,
    /// Recipient identity (see header_builder precedence rules)
    pub recipient: GeneralName,
    /// UTC second-granularity timestamp set at header construction
    pub message_time: Option<GeneralizedTime>,
    /// Protection algorithm identifier (PBMAC params or a signature alg)
    pub protection_alg: Option<AlgorithmIdentifierOwned>,
    /// SubjectKeyIdentifier of the client cert, or the PBM reference value
    pub sender_kid: Option<OctetString>,
    /// SubjectKeyIdentifier the sender expects the recipient to use
    pub recip_kid: Option<OctetString>,
    /// Opaque transaction identifier, stable for the whole exchange
    pub transaction_id: OctetString,
    /// 16 random bytes, regenerated on every outbound message
    pub sender_nonce: OctetString,
    /// Copy of the peer's last senderNonce
    pub recip_nonce: Option<OctetString>,
    /// Free-form human-readable text
    pub free_text: Option<PkiFreeText>,
    /// Extension items (implicitConfirm, confirmWaitTime, ...)
    pub general_info: Option<Vec<InfoTypeAndValue>>,
}

impl PkiHeader {
    /// `cmp2000`, the only protocol version this engine speaks.
    pub const PVNO_CMP2000: i8 = 2;
}

/// Helper so `PkiFreeText` and `Utf8StringRef` can interconvert when
/// assembling free text from `&str` literals.
pub fn utf8_owned(s: &str) -> der::Result<String> {
    Utf8StringRef::new(s)?;
    Ok(s.to_owned())
}
