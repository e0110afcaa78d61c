//! The shared `do_certreq_seq` transaction skeleton (spec.md §4.7), grounded
//! on `ossl_cmp_exec_certreq`/`ossl_cmp_exec_IR_ses`'s sequencing in
//! `examples/original_source/crypto/cmp/cmp_ses.c`. [`enroll`], [`revoke`],
//! and [`genm`] hold the per-body-type specializations that bind
//! `req_type`/`rep_type` and call back into this skeleton (or, for `genM`,
//! run their own trivial one-shot exchange).

pub mod enroll;
pub mod genm;
pub mod revoke;

use crate::asn1::body::{CertRepMessage, CertResponse, PkiBody, PkiBodyType, PkiFailureInfo, PkiStatus};
use crate::asn1::message::PkiMessage;
use crate::check;
use crate::context::{Context, ProtectionMethod};
use crate::error::{CmpError, Result};
use crate::factory;
use crate::log::Severity;
use crate::transfer::Transfer;
use std::time::{Duration, Instant};
use x509_cert::Certificate;

/// Application hook invoked once a candidate certificate has been extracted
/// from an `ip`/`cp`/`kup` response, before the `certConf`/`pkiConf`
/// exchange (spec.md §6's certConf callback contract). Returning a non-empty
/// [`PkiFailureInfo`] rejects the certificate; `text` carries the diagnostic
/// forwarded to the server in that case.
#[async_trait::async_trait]
pub trait CertConfirmCallback: Send + Sync {
    async fn cert_conf(
        &self,
        ctx: &Context,
        new_cert: &Certificate,
        current_fail_info: PkiFailureInfo,
        text: &mut String,
    ) -> PkiFailureInfo;
}

/// A callback that always accepts the issued certificate — the default for
/// callers with no extra application-level scrutiny to apply, and for tests.
pub struct AcceptAll;

#[async_trait::async_trait]
impl CertConfirmCallback for AcceptAll {
    async fn cert_conf(
        &self,
        _ctx: &Context,
        _new_cert: &Certificate,
        current_fail_info: PkiFailureInfo,
        _text: &mut String,
    ) -> PkiFailureInfo {
        current_fail_info
    }
}

/// Tracks the transaction's aggregate deadline and computes the effective
/// per-message timeout (spec.md §4.7 step 1/3, §5's two-tier timeout model).
pub(crate) struct Deadline {
    end_time: Option<Instant>,
}

impl Deadline {
    pub(crate) fn start(ctx: &Context) -> Self {
        Self {
            end_time: ctx.total_timeout.map(|d| Instant::now() + d),
        }
    }

    pub(crate) fn remaining(&self) -> Option<Duration> {
        self.end_time.map(|t| t.saturating_duration_since(Instant::now()))
    }

    pub(crate) fn check_not_expired(&self) -> Result<()> {
        if let Some(end) = self.end_time {
            if Instant::now() >= end {
                let err = CmpError::TotalTimeout;
                crate::queue::push_err(&err, None);
                return Err(err);
            }
        }
        Ok(())
    }

    pub(crate) fn effective_msg_timeout(&self, msg_timeout: Option<Duration>) -> Duration {
        match (msg_timeout, self.remaining()) {
            (Some(m), Some(r)) => m.min(r),
            (Some(m), None) => m,
            (None, Some(r)) => r,
            (None, None) => Duration::MAX,
        }
    }
}

fn extract_cert_rep(body: &PkiBody, expected: PkiBodyType) -> Result<&CertRepMessage> {
    match (body, expected) {
        (PkiBody::Ip(r), PkiBodyType::Ip) => Ok(r),
        (PkiBody::Cp(r), PkiBodyType::Cp) => Ok(r),
        (PkiBody::Kup(r), PkiBodyType::Kup) => Ok(r),
        _ => Err(CmpError::UnexpectedPkiBody {
            expected: expected.name(),
            got: body.body_type().name().to_string(),
        }),
    }
}

fn expected_public_key(ctx: &Context) -> Result<Option<spki::SubjectPublicKeyInfoOwned>> {
    if let Some(new_key) = &ctx.new_key {
        return Ok(Some(new_key.public_key_info()?));
    }
    if let Some(ProtectionMethod::Signature { signing_key, .. }) = &ctx.protection {
        return Ok(Some(signing_key.public_key_info()?));
    }
    Ok(None)
}

fn header_grants_implicit_confirm(msg: &PkiMessage) -> bool {
    const OID_IMPLICIT_CONFIRM: &str = "1.3.6.1.5.5.7.4.13";
    msg.header
        .general_info
        .as_ref()
        .is_some_and(|items| items.iter().any(|i| i.info_type.to_string() == OID_IMPLICIT_CONFIRM))
}

/// The shared enrollment skeleton (spec.md §4.7's `do_certreq_seq`):
/// build+protect+send `req_type`, validate and — if necessary — poll for the
/// response, dispatch on `CertResponse.status`, absorb `caPubs`, run the
/// `certConf` callback, and (unless implicit confirm was granted or
/// `disable_confirm` is set) complete the `certConf ↔ pkiConf` exchange.
pub(crate) async fn do_certreq_seq<T: Transfer>(
    ctx: &mut Context,
    transfer: &T,
    cert_confirm: &dyn CertConfirmCallback,
    req_type: PkiBodyType,
    rep_type: PkiBodyType,
    build_request: fn(&mut Context) -> Result<PkiMessage>,
) -> Result<Certificate> {
    let deadline = Deadline::start(ctx);
    ctx.last_response = Default::default();

    deadline.check_not_expired()?;
    let request = build_request(ctx)?;
    let timeout = deadline.effective_msg_timeout(ctx.msg_timeout);
    let mut response = transfer
        .transfer(ctx, &request, timeout)
        .await
        .map_err(CmpError::from)?;
    check::check_received(ctx, &response)?;

    let (cert_response, rep_message) = loop {
        match &response.body {
            PkiBody::PollRep(poll_rep) => {
                let check_after = poll_rep.check_after;
                let cert_req_id = poll_rep.cert_req_id;
                if check_after < 0 {
                    let err = CmpError::ReceivedNegativeCheckAfterInPollRep(check_after);
                    crate::queue::push_err(&err, None);
                    return Err(err);
                }
                deadline.check_not_expired()?;
                let sleep_for = match deadline.remaining() {
                    Some(remaining) if Duration::from_secs(check_after as u64) > remaining => remaining,
                    _ => Duration::from_secs(check_after as u64),
                };
                tokio::time::sleep(sleep_for).await;
                let poll_req = factory::poll::create_poll_req(ctx, cert_req_id)?;
                let timeout = deadline.effective_msg_timeout(ctx.msg_timeout);
                response = transfer
                    .transfer(ctx, &poll_req, timeout)
                    .await
                    .map_err(CmpError::from)?;
                check::check_received(ctx, &response)?;
            }
            body if body.body_type() == rep_type => {
                let rep = extract_cert_rep(&response.body, rep_type)?.clone();
                if rep.response.len() > 1 {
                    let err = CmpError::MultipleResponsesNotSupported;
                    crate::queue::push_err(&err, None);
                    return Err(err);
                }
                let cr: CertResponse = rep
                    .response
                    .first()
                    .cloned()
                    .ok_or_else(|| CmpError::UnexpectedPkiStatus("empty CertRepMessage".into()))?;
                if cr.status.status == PkiStatus::Waiting {
                    deadline.check_not_expired()?;
                    let poll_req = factory::poll::create_poll_req(ctx, cr.cert_req_id)?;
                    let timeout = deadline.effective_msg_timeout(ctx.msg_timeout);
                    response = transfer
                        .transfer(ctx, &poll_req, timeout)
                        .await
                        .map_err(CmpError::from)?;
                    check::check_received(ctx, &response)?;
                } else {
                    break (cr, rep);
                }
            }
            other => {
                let err = CmpError::UnexpectedPkiBody {
                    expected: rep_type.name(),
                    got: other.body_type().name().to_string(),
                };
                crate::queue::push_err(&err, None);
                return Err(err);
            }
        }
    };

    ctx.last_response.status = Some(cert_response.status.status);
    ctx.last_response.status_string = cert_response.status.status_string.clone();
    ctx.last_response.fail_info = cert_response.status.fail_info;
    ctx.last_response.ca_pubs = rep_message.ca_pubs.clone();

    let new_cert = match cert_response.status.status {
        PkiStatus::Accepted | PkiStatus::RevocationWarning | PkiStatus::RevocationNotification => {
            cert_response.certified_key_pair.clone().ok_or_else(|| {
                CmpError::CertificateNotAccepted("no certifiedKeyPair in response".into())
            })?
        }
        PkiStatus::GrantedWithMods => {
            crate::cmp_log!(Severity::Warn, "CA granted the request with modifications");
            cert_response.certified_key_pair.clone().ok_or_else(|| {
                CmpError::CertificateNotAccepted("no certifiedKeyPair in grantedWithMods response".into())
            })?
        }
        PkiStatus::KeyUpdateWarning if req_type == PkiBodyType::Kur => {
            cert_response.certified_key_pair.clone().ok_or_else(|| {
                CmpError::CertificateNotAccepted("no certifiedKeyPair in keyUpdateWarning response".into())
            })?
        }
        PkiStatus::KeyUpdateWarning => {
            let err = CmpError::UnexpectedPkiStatus("keyUpdateWarning received outside a key update request".into());
            crate::queue::push_err(&err, None);
            return Err(err);
        }
        PkiStatus::Rejection => {
            let text = cert_response
                .status
                .status_string
                .clone()
                .unwrap_or_default()
                .join("; ");
            let err = CmpError::RequestRejectedByCa(text);
            crate::queue::push_err(&err, None);
            return Err(err);
        }
        PkiStatus::Waiting => unreachable!("the polling loop above never breaks with status == waiting"),
    };

    if let Some(ca_pubs) = &ctx.last_response.ca_pubs {
        if let Some(store) = &ctx.trust_store {
            store.add_trust_anchors(ca_pubs)?;
        }
    }

    let mut fail_info = PkiFailureInfo::default();
    let mut text = String::new();
    if let Some(expected) = expected_public_key(ctx)? {
        if expected != new_cert.tbs_certificate.subject_public_key_info {
            crate::cmp_log!(
                Severity::Warn,
                "newly issued certificate's public key does not match the outstanding private key"
            );
            fail_info = PkiFailureInfo::INCORRECT_DATA;
            text = "public key in new certificate does not match our private key".to_string();
        }
    }

    let fail_info = cert_confirm.cert_conf(ctx, &new_cert, fail_info, &mut text).await;

    let implicit_confirm_granted = header_grants_implicit_confirm(&response);
    if !ctx.disable_confirm && !implicit_confirm_granted {
        let cert_conf_msg = factory::confirm::create_cert_conf(ctx, cert_response.cert_req_id, &new_cert, fail_info, &text)?;
        let timeout = deadline.effective_msg_timeout(ctx.msg_timeout);
        let conf_response = transfer
            .transfer(ctx, &cert_conf_msg, timeout)
            .await
            .map_err(CmpError::from)?;
        check::check_received(ctx, &conf_response)?;
        if conf_response.body_type() != PkiBodyType::PkiConf {
            let err = CmpError::PkiConfNotReceived;
            crate::queue::push_err(&err, None);
            return Err(err);
        }
        if !fail_info.is_empty() {
            let err = CmpError::CertConfFailed(text);
            crate::queue::push_err(&err, None);
            return Err(err);
        }
    }

    ctx.last_response.new_cert = Some(new_cert.clone());
    Ok(new_cert)
}
