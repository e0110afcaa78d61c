//! DER type definitions for `PKIMessage` and its contents (RFC 4210 Appendix
//! F, RFC 4211).
//!
//! These are hand-written on top of `der`/`spki`/`x509-cert`, the same way
//! the teacher builds typed wrappers over `x509-parser`/`der` output in
//! `src/crypto/rfc5280.rs` and `src/crypto/x509.rs`, rather than depending on
//! an ASN.1-schema-compiler-generated crate — the RFC 4210/4211 module is
//! small and stable enough that hand-written `der::Sequence`/`Choice` impls
//! are the idiomatic choice here, matching how `x509-cert` itself is built.
//!
//! ASN.1 DER encode/decode is otherwise an out-of-scope "external
//! collaborator" per spec.md §1 — these types are the shape of the wire
//! format the core engine reasons about, not a general-purpose X.509/CMP
//! ASN.1 toolkit.

pub mod body;
pub mod certreq;
mod codec;
pub mod header;
pub mod message;

pub use body::{CertStatus, PkiBody, PkiBodyType, PkiFailureInfo, PkiStatus, PkiStatusInfo};
pub use certreq::{CertReqMsg, CertTemplate, ProofOfPossession};
pub use header::{GeneralName, InfoTypeAndValue, PkiFreeText, PkiHeader};
pub use message::{PkiMessage, ProtectedPart};
pub(crate) use codec::{
    decode_pbm_parameter, encode_cert_id_any, encode_cert_policies, encode_cert_request,
    encode_crl_reason, encode_general_names,
};
