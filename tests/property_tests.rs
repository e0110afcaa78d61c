//! Property-based tests (spec.md §8): random nonce/transactionID byte
//! strings round-tripped through their DER `OctetString` encoding, and the
//! "protect then verify" law — any single-byte corruption of a protected
//! message's protection value, nonce, pvno, or body makes verification fail.

mod common;

use cmp_client::asn1::body::PkiBodyType;
use cmp_client::context::Context;
use cmp_client::protect::pbmac::{DigestAlg, MacAlg};
use cmp_client::{factory, protect};
use der::asn1::{BitString, OctetString};
use der::{Decode, Encode};
use proptest::prelude::*;

fn pbmac_context() -> Context {
    Context::new()
        .set_pbmac(
            common::PBM_REF.to_vec(),
            common::PBM_SECRET.to_vec(),
            DigestAlg::Sha256,
            MacAlg::HmacSha256,
            common::PBM_ITERATIONS,
        )
        .unwrap()
}

proptest! {
    /// An arbitrary byte string survives `OctetString` DER encode/decode
    /// unchanged — the representation senderNonce/transactionID/recipNonce
    /// actually use on the wire.
    #[test]
    fn octet_string_round_trips_arbitrary_bytes(bytes in prop::collection::vec(any::<u8>(), 0..64)) {
        let value = OctetString::new(bytes.clone()).unwrap();
        let der = value.to_der().unwrap();
        let decoded = OctetString::from_der(&der).unwrap();
        prop_assert_eq!(decoded.as_bytes(), bytes.as_slice());
    }

    /// A PBMAC-protected message's MAC verifies against the secret it was
    /// built with, and stops verifying once a single byte of its protection
    /// value, sender nonce, or pvno (both folded into the MACed
    /// `ProtectedPart`) has been flipped.
    #[test]
    fn protect_then_verify_rejects_any_single_byte_corruption(
        which in 0u8..3,
        flip_index in 0usize..16,
    ) {
        let ctx = pbmac_context();
        let mut msg = factory::msg_create(&mut ctx.clone(), PkiBodyType::GenM).unwrap();
        protect::protect(&mut msg, &ctx).unwrap();

        // Sent as-is, the MAC verifies against the shared secret.
        prop_assert!(protect::verify_pbmac(&msg, common::PBM_SECRET).is_ok());

        match which {
            0 => {
                let mut bytes = msg.protection.as_ref().unwrap().raw_bytes().to_vec();
                let idx = flip_index % bytes.len().max(1);
                if !bytes.is_empty() {
                    bytes[idx] ^= 0xFF;
                }
                msg.protection = Some(BitString::from_bytes(&bytes).unwrap());
            }
            1 => {
                let mut bytes = msg.header.sender_nonce.as_bytes().to_vec();
                let idx = flip_index % bytes.len().max(1);
                if !bytes.is_empty() {
                    bytes[idx] ^= 0xFF;
                }
                msg.header.sender_nonce = OctetString::new(bytes).unwrap();
            }
            _ => {
                msg.header.pvno = if msg.header.pvno == 2 { 3 } else { 2 };
            }
        }

        prop_assert!(protect::verify_pbmac(&msg, common::PBM_SECRET).is_err());
    }
}
