//! End-to-end Initialization Request: `ir` → `ip` → `certConf` → `pkiConf`,
//! all four messages exchanged over an in-process fake CA.

mod common;

use cmp_client::asn1::body::{CertRepMessage, CertResponse, PkiBody, PkiBodyType, PkiStatus, PkiStatusInfo};
use cmp_client::{exec_ir, factory, AcceptAll, Context};

#[tokio::test]
async fn ir_happy_path_issues_a_certificate_and_completes_cert_conf() {
    let (mut client, server) = common::paired_contexts();

    let issuer: x509_cert::name::Name = "CN=Test CA".parse().unwrap();
    let new_cert = common::minimal_certificate(
        client.subject_name.clone().unwrap(),
        issuer,
        client.new_key.as_ref().unwrap().public_key_info().unwrap(),
    );

    let issued_cert = new_cert.clone();
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
                    certified_key_pair: Some(issued_cert.clone()),
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
    assert_eq!(client.last_response.status, Some(PkiStatus::Accepted));
    // ir, then certConf: two requests sent for the two scripted steps.
    assert_eq!(ca.sent.lock().unwrap().len(), 2);
}
