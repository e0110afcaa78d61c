//! Key-update enrollment (spec.md §8 scenario 2) and the polling loop
//! (spec.md §8 scenario 3), both driven over the same in-process fake CA
//! as `ir_enrollment.rs`.

mod common;

use cmp_client::asn1::body::{
    CertRepMessage, CertResponse, PkiBody, PkiBodyType, PkiStatus, PkiStatusInfo, PollRepContent,
};
use cmp_client::protect::signature::SigningKeyHandle;
use cmp_client::{exec_ir, exec_kur, factory, AcceptAll, Context};
use ed25519_dalek::SigningKey as EdSigningKey;
use rand::rngs::OsRng;
use x509_cert::serial_number::SerialNumber;

/// Scenario 2: a KUR whose CRMF template subject equals the client
/// certificate's own subject, whose `OldCertID` control names the old
/// certificate's issuer+serial, and whose resulting certificate carries a
/// different serial number than the one being replaced.
#[tokio::test]
async fn kur_request_reuses_client_subject_and_issues_new_serial() {
    let (mut client, server) = common::paired_contexts();

    let issuer: x509_cert::name::Name = "CN=Test CA".parse().unwrap();
    let old_cert = common::minimal_certificate(
        client.subject_name.clone().unwrap(),
        issuer.clone(),
        client.new_key.as_ref().unwrap().public_key_info().unwrap(),
    );
    client = client.set_old_client_cert(old_cert.clone());

    // Sanity-check the request the factory actually builds before running
    // it through the full session: subject inherited from the old cert,
    // OldCertID present.
    let mut probe = client.clone();
    let kur_req = factory::enroll::create_kur(&mut probe).unwrap();
    let PkiBody::Kur(reqs) = &kur_req.body else {
        panic!("expected a kur body");
    };
    assert_eq!(reqs.len(), 1);
    assert_eq!(
        reqs[0].cert_req.cert_template.subject.as_ref(),
        Some(&old_cert.tbs_certificate.subject)
    );
    assert!(reqs[0].cert_req.controls.is_some(), "kur must carry an OldCertID control");

    let mut rng = OsRng;
    let new_key = EdSigningKey::generate(&mut rng);
    let new_cert = common::minimal_certificate(
        old_cert.tbs_certificate.subject.clone(),
        issuer,
        SigningKeyHandle::from_ed25519(new_key).public_key_info().unwrap(),
    );
    // Distinct serial from the old certificate.
    let mut new_cert = new_cert;
    new_cert.tbs_certificate.serial_number = SerialNumber::new(&[2]).unwrap();

    let issued = new_cert.clone();
    let kup_step: common::CaStep = Box::new(move |server: &mut Context, _req| {
        let shell = factory::msg_create(server, PkiBodyType::Kup).unwrap();
        factory::finish(
            server,
            shell,
            PkiBody::Kup(CertRepMessage {
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

    let ca = common::FakeCa::new(server, vec![kup_step, pkiconf_step]);
    let issued = exec_kur(&mut client, &ca, &AcceptAll).await.unwrap();

    assert_ne!(
        issued.tbs_certificate.serial_number.as_bytes(),
        old_cert.tbs_certificate.serial_number.as_bytes()
    );
}

/// Scenario 3: the CA answers the initial `ir` with status `waiting`,
/// hands back a `pollRep` with `checkAfter = 0` (kept at zero so the test
/// doesn't actually sleep), and only then returns the issued certificate —
/// exercising exactly one interim poll round trip.
#[tokio::test]
async fn waiting_status_drives_one_poll_round_trip_before_the_certificate_arrives() {
    let (mut client, server) = common::paired_contexts();

    let issuer: x509_cert::name::Name = "CN=Test CA".parse().unwrap();
    let new_cert = common::minimal_certificate(
        client.subject_name.clone().unwrap(),
        issuer,
        client.new_key.as_ref().unwrap().public_key_info().unwrap(),
    );

    let waiting_step: common::CaStep = Box::new(|server: &mut Context, _req| {
        let shell = factory::msg_create(server, PkiBodyType::Ip).unwrap();
        factory::finish(
            server,
            shell,
            PkiBody::Ip(CertRepMessage {
                ca_pubs: None,
                response: vec![CertResponse {
                    cert_req_id: 0,
                    status: PkiStatusInfo {
                        status: PkiStatus::Waiting,
                        status_string: None,
                        fail_info: None,
                    },
                    certified_key_pair: None,
                }],
            }),
        )
        .unwrap()
    });
    let poll_rep_step: common::CaStep = Box::new(|server: &mut Context, _req| {
        let shell = factory::msg_create(server, PkiBodyType::PollRep).unwrap();
        factory::finish(
            server,
            shell,
            PkiBody::PollRep(PollRepContent {
                cert_req_id: 0,
                check_after: 0,
                reason: None,
            }),
        )
        .unwrap()
    });
    let issued = new_cert.clone();
    let ip_accepted_step: common::CaStep = Box::new(move |server: &mut Context, _req| {
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

    let ca = common::FakeCa::new(
        server,
        vec![waiting_step, poll_rep_step, ip_accepted_step, pkiconf_step],
    );
    let issued = exec_ir(&mut client, &ca, &AcceptAll).await.unwrap();

    assert_eq!(issued.tbs_certificate.subject, new_cert.tbs_certificate.subject);
    // ir, pollReq (in response to "waiting"), pollReq (in response to the
    // pollRep), certConf: four requests for the four scripted steps.
    assert_eq!(ca.sent.lock().unwrap().len(), 4);
}
