//! Nonce-replay rejection (spec.md §8 scenario 4) and PBMAC secret
//! mismatch (spec.md §8 scenario 6).

mod common;

use cmp_client::asn1::body::{CertRepMessage, CertResponse, PkiBody, PkiBodyType, PkiStatusInfo};
use cmp_client::protect::pbmac::{DigestAlg, MacAlg};
use cmp_client::{exec_ir, factory, AcceptAll, CmpError, Context};
use der::asn1::OctetString;

fn ip_accepting(server: &mut Context, issued: &x509_cert::Certificate) -> cmp_client::asn1::message::PkiMessage {
    let shell = factory::msg_create(server, PkiBodyType::Ip).unwrap();
    factory::finish(
        server,
        shell,
        PkiBody::Ip(CertRepMessage {
            ca_pubs: None,
            response: vec![CertResponse {
                cert_req_id: 0,
                status: PkiStatusInfo::accepted(),
                certified_key_pair: Some(issued.clone()),
            }],
        }),
    )
    .unwrap()
}

/// Scenario 4: the `ip`'s `recipNonce` doesn't match the `senderNonce` the
/// client actually sent with its `ir` — the session must fail with
/// `RecipNonceUnmatched` and extract no certificate.
#[tokio::test]
async fn mismatched_recip_nonce_is_rejected_without_extracting_a_certificate() {
    let (mut client, server) = common::paired_contexts();
    let issuer: x509_cert::name::Name = "CN=Test CA".parse().unwrap();
    let new_cert = common::minimal_certificate(
        client.subject_name.clone().unwrap(),
        issuer,
        client.new_key.as_ref().unwrap().public_key_info().unwrap(),
    );

    let tampered_step: common::CaStep = Box::new(move |server: &mut Context, _req| {
        // Flip one byte of the recipNonce the server would otherwise copy
        // from the request's senderNonce before building the reply.
        let mut tampered = server.clone();
        if let Some(nonce) = &mut tampered.recip_nonce {
            let mut bytes = nonce.as_bytes().to_vec();
            bytes[0] ^= 0xFF;
            *nonce = OctetString::new(bytes).unwrap();
        }
        ip_accepting(&mut tampered, &new_cert)
    });

    let ca = common::FakeCa::new(server, vec![tampered_step]);
    let err = exec_ir(&mut client, &ca, &AcceptAll).await.unwrap_err();

    assert!(matches!(err, CmpError::RecipNonceUnmatched));
    assert!(client.last_response.new_cert.is_none());
}

/// Scenario 6: an `ip` protected with the wrong PBMAC secret is rejected;
/// switching the client's secret to the one the CA actually used lets the
/// identical message verify.
#[tokio::test]
async fn wrong_pbmac_secret_is_rejected_then_accepted_once_corrected() {
    let (mut client, mut server) = common::paired_contexts();
    // The CA signs with a different shared secret than the client has
    // configured.
    server = server
        .set_pbmac(
            common::PBM_REF.to_vec(),
            b"insta".to_vec(),
            DigestAlg::Sha256,
            MacAlg::HmacSha256,
            common::PBM_ITERATIONS,
        )
        .unwrap();

    let issuer: x509_cert::name::Name = "CN=Test CA".parse().unwrap();
    let new_cert = common::minimal_certificate(
        client.subject_name.clone().unwrap(),
        issuer,
        client.new_key.as_ref().unwrap().public_key_info().unwrap(),
    );

    let issued = new_cert.clone();
    let ip_step: common::CaStep = Box::new(move |server: &mut Context, _req| ip_accepting(server, &issued));

    let ca = common::FakeCa::new(server, vec![ip_step]);
    let err = exec_ir(&mut client, &ca, &AcceptAll).await.unwrap_err();
    assert!(matches!(err, CmpError::WrongPbmValue));

    // Correct the client's secret to match the CA's and retry the same
    // exchange from scratch.
    client = client
        .set_pbmac(
            common::PBM_REF.to_vec(),
            b"insta".to_vec(),
            DigestAlg::Sha256,
            MacAlg::HmacSha256,
            common::PBM_ITERATIONS,
        )
        .unwrap();
    client.transaction_id = None;
    client.recip_nonce = None;

    let mut server2 = client.clone();
    let issued2 = new_cert.clone();
    let ip_step2: common::CaStep = Box::new(move |server: &mut Context, _req| ip_accepting(server, &issued2));
    let pkiconf_step: common::CaStep = Box::new(|server: &mut Context, _req| {
        let shell = factory::msg_create(server, PkiBodyType::PkiConf).unwrap();
        factory::finish(server, shell, PkiBody::PkiConf).unwrap()
    });
    server2 = server2
        .set_pbmac(
            common::PBM_REF.to_vec(),
            b"insta".to_vec(),
            DigestAlg::Sha256,
            MacAlg::HmacSha256,
            common::PBM_ITERATIONS,
        )
        .unwrap();
    let ca2 = common::FakeCa::new(server2, vec![ip_step2, pkiconf_step]);
    let issued = exec_ir(&mut client, &ca2, &AcceptAll).await.unwrap();
    assert_eq!(issued.tbs_certificate.subject, new_cert.tbs_certificate.subject);
}
