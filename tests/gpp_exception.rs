//! The 3GPP TS 33.310 discovery exception (spec.md §8 scenario 5): a client
//! with no configured trust store accepts an `ip` whose sender certificate
//! and newly issued certificate both chain under a self-signed root that
//! only appears in the message's own `extraCerts`, but only when
//! `permit_ta_in_extra_certs_for_ir` is set.

mod common;

use cmp_client::asn1::body::{CertRepMessage, CertResponse, PkiBody, PkiBodyType, PkiStatusInfo};
use cmp_client::context::CmpOption;
use cmp_client::protect::pbmac::{DigestAlg, MacAlg};
use cmp_client::protect::signature::SigningKeyHandle;
use cmp_client::{exec_ir, factory, AcceptAll, CmpError, Context};
use ed25519_dalek::SigningKey as EdSigningKey;
use rand::rngs::OsRng;
use x509_cert::name::Name;

struct Setup {
    client: Context,
    server: Context,
    new_cert: x509_cert::Certificate,
}

/// Build a client requesting under `CN=3gpp client`, a self-signed root
/// `R`, an intermediate `I` issued by `R` that signs the `ip`, and the
/// newly issued certificate (issued by `I`) that the `ip` carries.
fn setup() -> Setup {
    let mut rng = OsRng;
    let client_key = SigningKeyHandle::from_ed25519(EdSigningKey::generate(&mut rng));
    let client_subject: Name = "CN=3gpp client".parse().unwrap();

    let root_key = SigningKeyHandle::from_ed25519(EdSigningKey::generate(&mut rng));
    let root_name: Name = "CN=3GPP Root".parse().unwrap();
    let root = common::self_signed_certificate(&root_key, root_name.clone());

    let intermediate_key = SigningKeyHandle::from_ed25519(EdSigningKey::generate(&mut rng));
    let intermediate_name: Name = "CN=3GPP Intermediate".parse().unwrap();
    let intermediate = common::minimal_certificate(
        intermediate_name.clone(),
        root_name,
        intermediate_key.public_key_info().unwrap(),
    );

    let new_cert = common::minimal_certificate(
        client_subject.clone(),
        intermediate_name,
        client_key.public_key_info().unwrap(),
    );

    let client = Context::new()
        .set_subject(client_subject)
        .set_new_key(client_key)
        .set_pbmac(
            common::PBM_REF.to_vec(),
            common::PBM_SECRET.to_vec(),
            DigestAlg::Sha256,
            MacAlg::HmacSha256,
            common::PBM_ITERATIONS,
        )
        .unwrap()
        .set_option(CmpOption::PermitTaInExtraCertsForIr(true));

    let server = Context::new()
        .set_signature_protection(intermediate, intermediate_key)
        .add_extra_cert_out(root);

    Setup { client, server, new_cert }
}

#[tokio::test]
async fn three_gpp_exception_accepts_chain_from_extra_certs_only_when_flag_set() {
    let Setup { mut client, server, new_cert } = setup();

    let issued = new_cert.clone();
    let ip_step: common::CaStep = Box::new(move |server: &mut Context, _req| {
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
    });
    let pkiconf_step: common::CaStep = Box::new(|server: &mut Context, _req| {
        let shell = factory::msg_create(server, PkiBodyType::PkiConf).unwrap();
        factory::finish(server, shell, PkiBody::PkiConf).unwrap()
    });

    let ca = common::FakeCa::new(server, vec![ip_step, pkiconf_step]);
    let issued = exec_ir(&mut client, &ca, &AcceptAll).await.unwrap();
    assert_eq!(issued.tbs_certificate.subject, new_cert.tbs_certificate.subject);
}

#[tokio::test]
async fn identical_exchange_without_the_flag_finds_no_valid_server_cert() {
    let Setup { mut client, server, new_cert } = setup();
    client = client.set_option(CmpOption::PermitTaInExtraCertsForIr(false));

    let issued = new_cert.clone();
    let ip_step: common::CaStep = Box::new(move |server: &mut Context, _req| {
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
    });

    let ca = common::FakeCa::new(server, vec![ip_step]);
    let err = exec_ir(&mut client, &ca, &AcceptAll).await.unwrap_err();
    assert!(matches!(err, CmpError::NoValidServerCertFound));
}
