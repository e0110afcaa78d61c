//! Certificate trust store and path validation (spec.md §6 external
//! collaborator: "verifying a chain to a trust anchor, including
//! revocation checking, is delegated to the embedding application rather
//! than reimplemented here").
//!
//! Grounded on `OSSL_CMP_validate_cert_path`/`X509_STORE` in
//! `examples/original_source/crypto/cmp/cmp_vfy.c` — this engine defines
//! the shape of the contract the reference implementation's `X509_STORE`
//! fills, rather than a path-building/revocation engine of its own.

use crate::error::Result;
use x509_cert::Certificate;

/// A pool of trust anchors plus whatever revocation/path-validation logic
/// the embedding application wants (OCSP, CRLs, a fixed root set, ...).
///
/// Implementations are expected to also apply any configured
/// `X509_VERIFY_PARAM`-equivalent constraints (validity period, key usage,
/// name constraints); this engine calls [`TrustStore::validate_path`] as
/// the single gate before accepting a candidate sender certificate.
pub trait TrustStore: Send + Sync {
    /// Validate that `cert` chains to a trust anchor in this store, given
    /// `untrusted` as additional intermediates to build the path from
    /// (`ctx->untrusted_certs` plus the message's own `extraCerts`).
    fn validate_path(&self, cert: &Certificate, untrusted: &[Certificate]) -> Result<()>;

    /// Whether `cert` is itself one of this store's trust anchors —
    /// checked in isolation for the 3GPP TS 33.310 exception path, which
    /// builds a *temporary* one-certificate store from the message's own
    /// `extraCerts` rather than consulting the real trust store.
    fn is_trust_anchor(&self, cert: &Certificate) -> bool;

    /// Absorb `certs` as additional trust anchors (spec.md §4.7 step 8:
    /// "move caPubs into the context trust store for MAC-authenticated
    /// IP/CP/KUP/CCP"). Stores that don't support runtime learning (e.g. a
    /// fixed deployment policy) may ignore this with the default no-op.
    fn add_trust_anchors(&self, certs: &[Certificate]) -> Result<()> {
        let _ = certs;
        Ok(())
    }
}

/// An in-memory trust store holding a fixed set of root certificates, with
/// only subject/issuer-chain validation (no revocation checking) — useful
/// for tests and simple deployments that don't need OCSP/CRL support.
#[derive(Debug, Default)]
pub struct StaticTrustStore {
    roots: std::sync::Mutex<Vec<Certificate>>,
}

impl Clone for StaticTrustStore {
    fn clone(&self) -> Self {
        Self::new(self.roots.lock().unwrap().clone())
    }
}

impl StaticTrustStore {
    pub fn new(roots: Vec<Certificate>) -> Self {
        Self { roots: std::sync::Mutex::new(roots) }
    }

    fn issuer_of<'a>(cert: &Certificate, candidates: impl Iterator<Item = &'a Certificate>) -> Option<&'a Certificate> {
        candidates
            .into_iter()
            .find(|c| c.tbs_certificate.subject == cert.tbs_certificate.issuer)
    }
}

impl TrustStore for StaticTrustStore {
    fn validate_path(&self, cert: &Certificate, untrusted: &[Certificate]) -> Result<()> {
        let roots = self.roots.lock().unwrap();
        let mut current = cert.clone();
        let mut hops = 0;
        loop {
            if roots.iter().any(|r| r.tbs_certificate.subject == current.tbs_certificate.subject) {
                return Ok(());
            }
            if current.tbs_certificate.subject == current.tbs_certificate.issuer {
                break;
            }
            hops += 1;
            if hops > 8 {
                break;
            }
            match Self::issuer_of(&current, roots.iter().chain(untrusted.iter())) {
                Some(issuer) => current = issuer.clone(),
                None => break,
            }
        }
        Err(crate::error::CmpError::PotentiallyInvalidCertificate(
            "no path to a trusted root certificate".into(),
        ))
    }

    fn is_trust_anchor(&self, cert: &Certificate) -> bool {
        self.roots
            .lock()
            .unwrap()
            .iter()
            .any(|r| r.tbs_certificate.subject == cert.tbs_certificate.subject)
    }

    fn add_trust_anchors(&self, certs: &[Certificate]) -> Result<()> {
        let mut roots = self.roots.lock().unwrap();
        for cert in certs {
            if !roots.iter().any(|r| r.tbs_certificate.subject == cert.tbs_certificate.subject) {
                roots.push(cert.clone());
            }
        }
        Ok(())
    }
}

/// A one-shot trust store built from a candidate set of self-signed
/// certificates (RFC 4210's `extraCerts`), used only by the 3GPP TS
/// 33.310 discovery exception (spec.md §4.5.3).
pub struct ExtraCertsTrustStore {
    anchors: Vec<Certificate>,
}

impl ExtraCertsTrustStore {
    /// Build from `extra_certs`, keeping only the self-signed ones
    /// (`ossl_cmp_X509_STORE_add1_certs(..., 1 /* self-signed only */)`).
    pub fn from_self_signed(extra_certs: &[Certificate]) -> Self {
        let anchors = extra_certs
            .iter()
            .filter(|c| c.tbs_certificate.subject == c.tbs_certificate.issuer)
            .cloned()
            .collect();
        Self { anchors }
    }
}

impl TrustStore for ExtraCertsTrustStore {
    fn validate_path(&self, cert: &Certificate, untrusted: &[Certificate]) -> Result<()> {
        StaticTrustStore::new(self.anchors.clone()).validate_path(cert, untrusted)
    }

    fn is_trust_anchor(&self, cert: &Certificate) -> bool {
        self.anchors
            .iter()
            .any(|a| a.tbs_certificate.subject == cert.tbs_certificate.subject)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protect::signature::SigningKeyHandle;
    use der::asn1::{BitString, UtcTime};
    use ed25519_dalek::SigningKey as EdSigningKey;
    use rand::rngs::OsRng;
    use x509_cert::serial_number::SerialNumber;
    use x509_cert::time::{Time, Validity};
    use x509_cert::{TbsCertificate, Version};

    fn leaf_certificate(subject: &str, issuer: &str) -> Certificate {
        let mut rng = OsRng;
        let key = SigningKeyHandle::from_ed25519(EdSigningKey::generate(&mut rng));
        let spki = key.public_key_info().unwrap();
        let signature_algorithm = spki.algorithm.clone();
        let now = std::time::SystemTime::now()
            .duration_since(std::time::SystemTime::UNIX_EPOCH)
            .unwrap();
        let tbs_certificate = TbsCertificate {
            version: Version::V3,
            serial_number: SerialNumber::new(&[1]).unwrap(),
            signature: signature_algorithm.clone(),
            issuer: issuer.parse().expect("valid RFC4514 name"),
            validity: Validity {
                not_before: Time::UtcTime(UtcTime::from_unix_duration(now).unwrap()),
                not_after: Time::UtcTime(UtcTime::from_unix_duration(now + std::time::Duration::from_secs(3600)).unwrap()),
            },
            subject: subject.parse().expect("valid RFC4514 name"),
            subject_public_key_info: spki,
            issuer_unique_id: None,
            subject_unique_id: None,
            extensions: None,
        };
        Certificate {
            tbs_certificate,
            signature_algorithm,
            signature: BitString::from_bytes(&[0u8; 64]).unwrap(),
        }
    }

    #[test]
    fn empty_store_rejects_path_validation() {
        let store = StaticTrustStore::default();
        let cert = leaf_certificate("CN=leaf", "CN=root");
        let err = store.validate_path(&cert, &[]).unwrap_err();
        assert!(matches!(err, crate::error::CmpError::PotentiallyInvalidCertificate(_)));
    }

    #[test]
    fn add_trust_anchors_deduplicates_by_subject() {
        let store = StaticTrustStore::default();
        let root_a = leaf_certificate("CN=root", "CN=root");
        let root_a_again = leaf_certificate("CN=root", "CN=root");
        let root_b = leaf_certificate("CN=other-root", "CN=other-root");

        store.add_trust_anchors(&[root_a.clone(), root_a_again]).unwrap();
        store.add_trust_anchors(&[root_b.clone()]).unwrap();

        let roots = store.roots.lock().unwrap();
        assert_eq!(roots.len(), 2, "same-subject root must not be inserted twice");
        assert!(roots.iter().any(|r| r.tbs_certificate.subject == root_a.tbs_certificate.subject));
        assert!(roots.iter().any(|r| r.tbs_certificate.subject == root_b.tbs_certificate.subject));
    }

    #[test]
    fn validate_path_succeeds_once_issuer_is_a_trust_anchor() {
        let store = StaticTrustStore::default();
        let root = leaf_certificate("CN=root", "CN=root");
        store.add_trust_anchors(&[root.clone()]).unwrap();

        let leaf = leaf_certificate("CN=leaf", "CN=root");
        assert!(store.validate_path(&leaf, &[]).is_ok());
    }
}
