//! Error types for the CMP client/server message engine

use thiserror::Error;

/// Result type alias for CMP operations
pub type Result<T> = std::result::Result<T, CmpError>;

/// Stable reason code usable for `matches!`/`==` comparisons, independent of
/// the human-readable message carried by [`CmpError`]. Mirrors the integer
/// `CMP_R_*`/`CRMF_R_*` codes of the reference implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ReasonCode {
    // Argument
    NullArgument,
    InvalidArgs,
    InvalidContext,
    MultipleSanSources,

    // Construction
    ErrorCreatingBody,
    MultipleResponsesNotSupported,

    // Crypto
    UnknownAlgorithmId,
    UnsupportedAlgorithm,
    UnsupportedKeyType,
    WrongAlgorithmOid,
    WrongPbmValue,
    ErrorCalculatingProtection,
    MissingKeyUsageDigitalSignature,
    MissingKeyInputForCreatingProtection,
    BadPbmIterationCount,

    // Validation
    ErrorValidatingProtection,
    MissingProtection,
    UnexpectedSender,
    UnexpectedPvno,
    TransactionIdUnmatched,
    RecipNonceUnmatched,
    NoValidServerCertFound,
    PotentiallyInvalidCertificate,
    CertAndKeyDoNotMatch,

    // Transport
    ConnectTimeout,
    ReadTimeout,
    TotalTimeout,
    TlsError,
    FailedToSendRequest,
    FailedToReceivePkiMessage,

    // Flow
    UnexpectedPkiBody,
    UnexpectedPkiStatus,
    EncounteredWaiting,
    EncounteredKeyUpdateWarning,
    ReceivedNegativeCheckAfterInPollRep,
    RequestRejectedByCa,
    CertificateNotAccepted,
    PollRepNotReceived,
    IpNotReceived,
    CpNotReceived,
    KupNotReceived,
    RpNotReceived,
    GenpNotReceived,
    PkiConfNotReceived,
    CertConfNotReceived,
}

/// Contextual data attached to a queued error (spec.md §7 propagation
/// policy): host:port, a distinguished name, an algorithm OID, or any other
/// single free-form diagnostic string.
pub type ErrorData = Option<String>;

/// Main error type for CMP protocol operations.
#[derive(Error, Debug)]
pub enum CmpError {
    /// A required argument or context field was absent
    #[error("null argument: {0}")]
    NullArgument(String),

    /// Arguments were structurally invalid or mutually inconsistent
    #[error("invalid arguments: {0}")]
    InvalidArgs(String),

    /// The context is missing required state for the requested operation
    #[error("invalid context: {0}")]
    InvalidContext(String),

    /// A setter received an inconsistent combination of inputs
    #[error("multiple SAN sources configured: {0}")]
    MultipleSanSources(String),

    /// Body construction failed for the named body type
    #[error("error creating {body} body: {detail}")]
    BodyConstruction {
        /// Name of the PKIBody variant being built (e.g. "ir", "certConf")
        body: &'static str,
        /// Detail describing the failure
        detail: String,
    },

    /// A `CertRepMessage` carried more than one `CertResponse`
    #[error("multiple CertResponse entries are not supported")]
    MultipleResponsesNotSupported,

    /// Neither a PBMAC secret nor a matching client cert + key were configured
    #[error("missing key input for creating protection")]
    MissingKeyInputForCreatingProtection,

    /// PBMAC iteration count outside the [100, cap] range
    #[error("PBM iteration count {0} out of allowed range [100, {1}]")]
    BadPbmIterationCount(u32, u32),

    /// PBMAC verification failed (wrong secret or corrupted protection)
    #[error("wrong PBM value")]
    WrongPbmValue,

    /// Signature or MAC algorithm identifier could not be resolved
    #[error("unknown algorithm id: {0}")]
    UnknownAlgorithmId(String),

    /// A supported-but-not-implemented-here algorithm was requested
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// The sender cert's public key type does not match the protection alg
    #[error("unsupported key type: {0}")]
    UnsupportedKeyType(String),

    /// The protectionAlg OID did not match the expected digest/key combination
    #[error("wrong algorithm OID: {0}")]
    WrongAlgorithmOid(String),

    /// Signing or MAC computation failed
    #[error("error calculating protection: {0}")]
    ErrorCalculatingProtection(String),

    /// The sender certificate's KeyUsage lacked digitalSignature
    #[error("sender certificate is missing the digitalSignature key usage bit")]
    MissingKeyUsageDigitalSignature,

    /// Protection present but failed cryptographic verification
    #[error("error validating protection: {0}")]
    ErrorValidatingProtection(String),

    /// A response arrived without protection and was not excused by §4.5.4
    #[error("missing protection")]
    MissingProtection,

    /// Response sender did not match the expected/pinned identity
    #[error("unexpected sender: {0}")]
    UnexpectedSender(String),

    /// `pvno` was not `cmp2000`
    #[error("unexpected pvno: {0}")]
    UnexpectedPvno(i32),

    /// Response transactionID did not match the context's
    #[error("transactionID unmatched")]
    TransactionIdUnmatched,

    /// Response recipNonce did not match the last outbound senderNonce
    #[error("recipNonce unmatched")]
    RecipNonceUnmatched,

    /// No acceptable, path-validated server certificate was found
    #[error("no valid server certificate found")]
    NoValidServerCertFound,

    /// A candidate certificate passed discovery but failed path validation
    #[error("potentially invalid certificate: {0}")]
    PotentiallyInvalidCertificate(String),

    /// Client certificate and private key do not correspond
    #[error("certificate and key do not match")]
    CertAndKeyDoNotMatch,

    /// TCP/TLS connect timed out
    #[error("connect timeout")]
    ConnectTimeout,

    /// Read from the peer timed out
    #[error("read timeout")]
    ReadTimeout,

    /// The transaction's aggregate timeout elapsed
    #[error("total timeout")]
    TotalTimeout,

    /// TLS handshake or record layer error
    #[error("TLS error: {0}")]
    TlsError(String),

    /// Sending the request failed
    #[error("failed to send request: {0}")]
    FailedToSendRequest(String),

    /// Receiving/decoding the response failed
    #[error("failed to receive PKIMessage: {0}")]
    FailedToReceivePkiMessage(String),

    /// Response body type was not the one expected at this point in the sequence
    #[error("unexpected PKIBody: expected {expected}, got {got}")]
    UnexpectedPkiBody {
        /// Expected body type name
        expected: &'static str,
        /// Body type name actually received
        got: String,
    },

    /// Response `PKIStatus` was not handled by the active sequence's table
    #[error("unexpected PKIStatus: {0}")]
    UnexpectedPkiStatus(String),

    /// Polling loop observed `waiting` outside a context that polls (e.g. RR)
    #[error("encountered waiting status where polling is not supported")]
    EncounteredWaiting,

    /// `keyUpdateWarning` received outside KUR
    #[error("encountered keyUpdateWarning outside a key update request")]
    EncounteredKeyUpdateWarning,

    /// `pollRep.checkAfter` was negative
    #[error("received negative checkAfter in pollRep: {0}")]
    ReceivedNegativeCheckAfterInPollRep(i64),

    /// CA returned a `rejection` status
    #[error("request rejected by CA: {0}")]
    RequestRejectedByCa(String),

    /// Issued certificate failed local acceptance checks
    #[error("certificate not accepted: {0}")]
    CertificateNotAccepted(String),

    /// Expected `pollRep` was not received
    #[error("pollRep not received")]
    PollRepNotReceived,

    /// Expected `IP` was not received
    #[error("IP not received")]
    IpNotReceived,

    /// Expected `CP` was not received
    #[error("CP not received")]
    CpNotReceived,

    /// Expected `KUP` was not received
    #[error("KUP not received")]
    KupNotReceived,

    /// Expected `RP` was not received
    #[error("RP not received")]
    RpNotReceived,

    /// Expected `genp` was not received
    #[error("genp not received")]
    GenpNotReceived,

    /// Expected `pkiconf` was not received
    #[error("pkiconf not received")]
    PkiConfNotReceived,

    /// Server rejected the implicit/explicit certConf exchange
    #[error("certConf exchange failed: {0}")]
    CertConfFailed(String),

    /// ASN.1 DER encode/decode failure
    #[error("DER error: {0}")]
    Der(#[from] der::Error),

    /// X.509 parse failure
    #[error("X.509 parse error: {0}")]
    X509Parse(String),

    /// RSA signature error
    #[error("RSA error: {0}")]
    Rsa(#[from] rsa::Error),

    /// Ed25519 signature error
    #[error("Ed25519 error: {0}")]
    Ed25519(#[from] ed25519_dalek::SignatureError),

    /// ECDSA (P-256) signature error
    #[error("ECDSA error: {0}")]
    Ecdsa(String),

    /// IO error (surfaced from a `Transfer` implementation)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Config parse error
    #[error("config error: {0}")]
    Config(#[from] toml::de::Error),

    /// Catch-all for errors not otherwise categorized
    #[error("other error: {0}")]
    Other(String),
}

impl CmpError {
    /// Stable reason code for this error, for callers that want to `match`
    /// on failure class rather than parse the message.
    pub fn reason(&self) -> ReasonCode {
        use CmpError::*;
        match self {
            NullArgument(_) => ReasonCode::NullArgument,
            InvalidArgs(_) => ReasonCode::InvalidArgs,
            InvalidContext(_) => ReasonCode::InvalidContext,
            MultipleSanSources(_) => ReasonCode::MultipleSanSources,
            BodyConstruction { .. } => ReasonCode::ErrorCreatingBody,
            MultipleResponsesNotSupported => ReasonCode::MultipleResponsesNotSupported,
            MissingKeyInputForCreatingProtection => {
                ReasonCode::MissingKeyInputForCreatingProtection
            }
            BadPbmIterationCount(..) => ReasonCode::BadPbmIterationCount,
            WrongPbmValue => ReasonCode::WrongPbmValue,
            UnknownAlgorithmId(_) => ReasonCode::UnknownAlgorithmId,
            UnsupportedAlgorithm(_) => ReasonCode::UnsupportedAlgorithm,
            UnsupportedKeyType(_) => ReasonCode::UnsupportedKeyType,
            WrongAlgorithmOid(_) => ReasonCode::WrongAlgorithmOid,
            ErrorCalculatingProtection(_) => ReasonCode::ErrorCalculatingProtection,
            MissingKeyUsageDigitalSignature => ReasonCode::MissingKeyUsageDigitalSignature,
            ErrorValidatingProtection(_) => ReasonCode::ErrorValidatingProtection,
            MissingProtection => ReasonCode::MissingProtection,
            UnexpectedSender(_) => ReasonCode::UnexpectedSender,
            UnexpectedPvno(_) => ReasonCode::UnexpectedPvno,
            TransactionIdUnmatched => ReasonCode::TransactionIdUnmatched,
            RecipNonceUnmatched => ReasonCode::RecipNonceUnmatched,
            NoValidServerCertFound => ReasonCode::NoValidServerCertFound,
            PotentiallyInvalidCertificate(_) => ReasonCode::PotentiallyInvalidCertificate,
            CertAndKeyDoNotMatch => ReasonCode::CertAndKeyDoNotMatch,
            ConnectTimeout => ReasonCode::ConnectTimeout,
            ReadTimeout => ReasonCode::ReadTimeout,
            TotalTimeout => ReasonCode::TotalTimeout,
            TlsError(_) => ReasonCode::TlsError,
            FailedToSendRequest(_) => ReasonCode::FailedToSendRequest,
            FailedToReceivePkiMessage(_) => ReasonCode::FailedToReceivePkiMessage,
            UnexpectedPkiBody { .. } => ReasonCode::UnexpectedPkiBody,
            UnexpectedPkiStatus(_) => ReasonCode::UnexpectedPkiStatus,
            EncounteredWaiting => ReasonCode::EncounteredWaiting,
            EncounteredKeyUpdateWarning => ReasonCode::EncounteredKeyUpdateWarning,
            ReceivedNegativeCheckAfterInPollRep(_) => {
                ReasonCode::ReceivedNegativeCheckAfterInPollRep
            }
            RequestRejectedByCa(_) => ReasonCode::RequestRejectedByCa,
            CertificateNotAccepted(_) => ReasonCode::CertificateNotAccepted,
            PollRepNotReceived => ReasonCode::PollRepNotReceived,
            IpNotReceived => ReasonCode::IpNotReceived,
            CpNotReceived => ReasonCode::CpNotReceived,
            KupNotReceived => ReasonCode::KupNotReceived,
            RpNotReceived => ReasonCode::RpNotReceived,
            GenpNotReceived => ReasonCode::GenpNotReceived,
            PkiConfNotReceived => ReasonCode::PkiConfNotReceived,
            CertConfFailed(_) => ReasonCode::CertConfNotReceived,
            Der(_) | X509Parse(_) => ReasonCode::InvalidArgs,
            Rsa(_) | Ed25519(_) | Ecdsa(_) => ReasonCode::UnsupportedAlgorithm,
            Io(_) => ReasonCode::FailedToSendRequest,
            Config(_) => ReasonCode::InvalidArgs,
            Other(_) => ReasonCode::InvalidArgs,
        }
    }
}
