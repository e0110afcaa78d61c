//! Small certificate-introspection helpers bridging `x509_cert::Certificate`
//! (the RustCrypto type this engine builds messages with) to extension-level
//! semantics, following the `x509-parser`-based extension access already
//! established in `examples/TheCowboyAI-cim-keys/src/crypto/rfc5280.rs`:
//! re-DER-encode, then parse with `x509_parser::parse_x509_certificate` to
//! reach `ParsedExtension` variants `x509-cert` itself does not decode.

use crate::error::{CmpError, Result};
use der::Encode;
use x509_parser::prelude::*;

fn der_bytes(cert: &x509_cert::Certificate) -> Result<Vec<u8>> {
    cert.to_der().map_err(CmpError::Der)
}

/// Re-parse `cert` with `x509-parser`, run `f` over the parsed view, and map
/// parse failures onto [`CmpError::PotentiallyInvalidCertificate`].
fn with_parsed<T>(
    cert: &x509_cert::Certificate,
    f: impl FnOnce(&X509Certificate<'_>) -> T,
) -> Result<T> {
    let der = der_bytes(cert)?;
    let (_, parsed) = parse_x509_certificate(&der)
        .map_err(|e| CmpError::PotentiallyInvalidCertificate(e.to_string()))?;
    Ok(f(&parsed))
}

/// `subjectKeyIdentifier` extension octets, if present (RFC 5280 §4.2.1.2).
/// Used for `PKIHeader.senderKID` when protecting with a certificate
/// (spec.md §4.4) and as a candidate-matching key in sender discovery
/// (spec.md §4.5.3).
pub fn subject_key_identifier(cert: &x509_cert::Certificate) -> Result<Option<Vec<u8>>> {
    with_parsed(cert, |parsed| {
        parsed.extensions().iter().find_map(|ext| match ext.parsed_extension() {
            ParsedExtension::SubjectKeyIdentifier(ski) => Some(ski.0.to_vec()),
            _ => None,
        })
    })
}

/// Whether `cert`'s `keyUsage` extension, if present, asserts
/// `digitalSignature`. Returns `None` when the extension is absent, which
/// callers treat as "no opinion" rather than a rejection (spec.md §4.5.3's
/// `ignoreKeyUsage` option only suppresses the check when the bit is
/// present and unset).
pub fn has_digital_signature_key_usage(cert: &x509_cert::Certificate) -> Result<Option<bool>> {
    with_parsed(cert, |parsed| {
        parsed.extensions().iter().find_map(|ext| match ext.parsed_extension() {
            ParsedExtension::KeyUsage(ku) => Some(ku.digital_signature()),
            _ => None,
        })
    })
}

/// Whether `cert` is presently within its `notBefore`/`notAfter` validity
/// window (spec.md §4.5.3 candidate-acceptability filter).
pub fn is_currently_valid(cert: &x509_cert::Certificate) -> Result<bool> {
    with_parsed(cert, |parsed| {
        let now = x509_parser::time::ASN1Time::now();
        parsed.validity().not_before <= now && now <= parsed.validity().not_after
    })
}

/// Digest the `DER(cert)` bytes using the digest algorithm implied by the
/// certificate's own signature algorithm OID, as `certConf`'s `certHash`
/// requires (spec.md §4.3: "`certHash` = digest(DER(cert)) using the cert's
/// own signature-digest algorithm", CRMF §5).
pub fn hash_with_own_signature_digest(cert: &x509_cert::Certificate) -> Result<Vec<u8>> {
    use digest::Digest;
    let der = der_bytes(cert)?;
    let oid = cert.signature_algorithm.oid.to_string();
    Ok(match oid.as_str() {
        "1.2.840.113549.1.1.5" | "1.2.840.10040.4.3" => sha1::Sha1::digest(&der).to_vec(), // sha1WithRSA / dsaWithSha1
        "1.2.840.113549.1.1.12" | "1.2.840.10045.4.3.3" => sha2::Sha384::digest(&der).to_vec(),
        "1.2.840.113549.1.1.13" | "1.2.840.10045.4.3.4" => sha2::Sha512::digest(&der).to_vec(),
        // sha256WithRSA, ecdsa-with-SHA256, ed25519 and anything unrecognized default to SHA-256
        _ => sha2::Sha256::digest(&der).to_vec(),
    })
}
