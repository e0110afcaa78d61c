//! Shared fixtures for the transaction-level integration tests: a fresh
//! client identity, a minimal certificate standing in for a CA-issued one,
//! and the transactionID/nonce bookkeeping a real CA/RA would do from the
//! request it received.

#![allow(dead_code)]

use cmp_client::asn1::message::PkiMessage;
use cmp_client::protect::pbmac::{DigestAlg, MacAlg};
use cmp_client::protect::signature::SigningKeyHandle;
use cmp_client::{Context, Transfer, TransferError};
use der::asn1::{BitString, UtcTime};
use ed25519_dalek::SigningKey as EdSigningKey;
use rand::rngs::OsRng;
use spki::SubjectPublicKeyInfoOwned;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, SystemTime};
use x509_cert::name::Name;
use x509_cert::serial_number::SerialNumber;
use x509_cert::time::{Time, Validity};
use x509_cert::{Certificate, TbsCertificate, Version};

pub const PBM_REF: &[u8] = b"3gpp-ref";
pub const PBM_SECRET: &[u8] = b"correct-horse-battery-staple";
pub const PBM_ITERATIONS: u32 = 500;

/// A fresh Ed25519 client key pair and the distinguished name to request it
/// under.
pub fn client_identity() -> (SigningKeyHandle, Name) {
    let mut rng = OsRng;
    let key = EdSigningKey::generate(&mut rng);
    let name: Name = "CN=cmp-client integration test"
        .parse()
        .expect("valid RFC4514 name");
    (SigningKeyHandle::from_ed25519(key), name)
}

fn one_hour_validity() -> Validity {
    let now = SystemTime::now().duration_since(SystemTime::UNIX_EPOCH).unwrap();
    let later = now + Duration::from_secs(3600);
    Validity {
        not_before: Time::UtcTime(UtcTime::from_unix_duration(now).unwrap()),
        not_after: Time::UtcTime(UtcTime::from_unix_duration(later).unwrap()),
    }
}

/// A syntactically valid certificate binding `subject` to `spki`, issued by
/// `issuer` — standing in for what a CA would hand back in an `ip`/`cp`/
/// `kup`. Its own signature bytes are never verified by this engine (only a
/// candidate *sender* certificate's signature over the wire message is), so
/// they're left as a fixed placeholder rather than computed.
pub fn minimal_certificate(subject: Name, issuer: Name, spki: SubjectPublicKeyInfoOwned) -> Certificate {
    let signature_algorithm = spki.algorithm.clone();
    let tbs_certificate = TbsCertificate {
        version: Version::V3,
        serial_number: SerialNumber::new(&[1]).unwrap(),
        signature: signature_algorithm.clone(),
        issuer,
        validity: one_hour_validity(),
        subject,
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

/// A self-signed-shaped certificate (`subject == issuer`) for `key`, usable
/// as a 3GPP TS 33.310 trust anchor candidate.
pub fn self_signed_certificate(key: &SigningKeyHandle, name: Name) -> Certificate {
    minimal_certificate(name.clone(), name, key.public_key_info().unwrap())
}

/// A client context configured with PBMAC protection and a new key pair
/// ready to request a certificate, plus a CA-side mirror context used to
/// script responses carrying the right transactionID/nonces.
pub fn paired_contexts() -> (Context, Context) {
    let (key, subject) = client_identity();
    let client = Context::new()
        .set_subject(subject)
        .set_new_key(key)
        .set_pbmac(
            PBM_REF.to_vec(),
            PBM_SECRET.to_vec(),
            DigestAlg::Sha256,
            MacAlg::HmacSha256,
            PBM_ITERATIONS,
        )
        .unwrap();
    let server = client.clone();
    (client, server)
}

/// After the client has built its first outbound request, mirror its
/// transactionID into `server` and its senderNonce into `server.recip_nonce`
/// so a server-built reply threads through `check_received` correctly.
pub fn thread_nonces(server: &mut Context, request: &PkiMessage) {
    server.transaction_id = Some(request.header.transaction_id.clone());
    server.recip_nonce = Some(request.header.sender_nonce.clone());
}

/// One step of a scripted CA: given the server-side context (already
/// threaded with the just-received request's transactionID/recipNonce) and
/// the request itself, build the next reply.
pub type CaStep = Box<dyn FnMut(&mut Context, &PkiMessage) -> PkiMessage + Send>;

/// An in-process fake CA/RA that threads transactionID and nonces the way a
/// real peer would, rather than replaying fixed byte strings. Each call to
/// [`Transfer::transfer`] pops the next scripted step, after updating the
/// server-side context with the incoming request's transactionID and
/// senderNonce, so the step's own `factory::msg_create` call picks up the
/// right `recipNonce` automatically.
pub struct FakeCa {
    server: Mutex<Context>,
    steps: Mutex<VecDeque<CaStep>>,
    pub sent: Mutex<Vec<PkiMessage>>,
}

impl FakeCa {
    pub fn new(server: Context, steps: Vec<CaStep>) -> Self {
        Self {
            server: Mutex::new(server),
            steps: Mutex::new(steps.into()),
            sent: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait::async_trait]
impl Transfer for FakeCa {
    async fn transfer(
        &self,
        _ctx: &Context,
        request: &PkiMessage,
        _timeout: Duration,
    ) -> Result<PkiMessage, TransferError> {
        self.sent.lock().unwrap().push(request.clone());
        let mut server = self.server.lock().unwrap();
        server.transaction_id = Some(request.header.transaction_id.clone());
        server.recip_nonce = Some(request.header.sender_nonce.clone());
        let mut step = self
            .steps
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| TransferError::ReceiveFailure("script exhausted".into()))?;
        Ok(step(&mut server, request))
    }
}
