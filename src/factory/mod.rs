//! Message factory (spec.md §4.3), grounded on `ossl_cmp_certreq_new` /
//! `ossl_cmp_certConf_new` / `ossl_cmp_pollReq_new` / `ossl_cmp_rr_new` /
//! `ossl_cmp_genm_new` in `examples/original_source/crypto/cmp/cmp_msg.c`.
//!
//! [`msg_create`] is the shared low-level shell builder the OpenSSL source
//! splits across its many `ossl_cmp_..._new` entry points: header
//! construction plus an empty placeholder body of the requested type. The
//! per-type submodules below are the entry points callers actually use —
//! each builds its shell, fills in the body content spec.md §4.3
//! describes, and protects the result before returning it.

pub mod confirm;
pub mod enroll;
pub mod error;
pub mod general;
pub mod poll;
pub mod revocation;

use crate::asn1::body::{
    CertRepMessage, ErrorMsgContent, PkiBody, PkiBodyType, PkiStatusInfo, PollReqContent,
    PollRepContent,
};
use crate::context::Context;
use crate::error::{CmpError, Result};
use crate::{header_builder, protect};
use der::Any;

fn null_any() -> Any {
    Any::from_der(&[0x05, 0x00]).expect("NULL is always valid DER")
}

/// The empty placeholder body for `body_type` (`msg_create`'s "installs the
/// empty body variant of the requested type").
fn empty_body(body_type: PkiBodyType) -> Result<PkiBody> {
    Ok(match body_type {
        PkiBodyType::Ir => PkiBody::Ir(Vec::new()),
        PkiBodyType::Ip => PkiBody::Ip(CertRepMessage { ca_pubs: None, response: Vec::new() }),
        PkiBodyType::Cr => PkiBody::Cr(Vec::new()),
        PkiBodyType::Cp => PkiBody::Cp(CertRepMessage { ca_pubs: None, response: Vec::new() }),
        PkiBodyType::P10cr => PkiBody::P10cr(null_any()),
        PkiBodyType::Kur => PkiBody::Kur(Vec::new()),
        PkiBodyType::Kup => PkiBody::Kup(CertRepMessage { ca_pubs: None, response: Vec::new() }),
        PkiBodyType::Rr => PkiBody::Rr(Vec::new()),
        PkiBodyType::Rp => PkiBody::Rp(crate::asn1::body::RevRepContent { status: Vec::new(), rev_certs: None }),
        PkiBodyType::PkiConf => PkiBody::PkiConf,
        PkiBodyType::GenM => PkiBody::GenM(Vec::new()),
        PkiBodyType::GenP => PkiBody::GenP(Vec::new()),
        PkiBodyType::Error => PkiBody::Error(ErrorMsgContent {
            status: PkiStatusInfo::accepted(),
            error_code: None,
            error_details: None,
        }),
        PkiBodyType::CertConf => PkiBody::CertConf(Vec::new()),
        PkiBodyType::PollReq => PkiBody::PollReq(PollReqContent { cert_req_id: 0 }),
        PkiBodyType::PollRep => {
            PkiBody::PollRep(PollRepContent { cert_req_id: 0, check_after: 0, reason: None })
        }
        other => {
            return Err(CmpError::BodyConstruction {
                body: other.name(),
                detail: "this engine does not originate this body type".into(),
            })
        }
    })
}

/// Build the header- and generalInfo-only shell for `body_type` (spec.md
/// §4.3): `header_init`, `implicitConfirm` pushed in if configured, and the
/// empty body placeholder. Unprotected — callers overwrite `.body` and call
/// [`protect::protect`] themselves.
pub fn msg_create(ctx: &mut Context, body_type: PkiBodyType) -> Result<crate::asn1::message::PkiMessage> {
    let mut header = header_builder::header_init(ctx, body_type)?;
    if ctx.implicit_confirm {
        header_builder::generalinfo_push(&mut header, protect::implicit_confirm_itav());
    }
    for itav in &ctx.geninfo_itavs {
        header_builder::generalinfo_push(&mut header, itav.clone());
    }
    let body = empty_body(body_type)?;
    Ok(crate::asn1::message::PkiMessage::new(header, body))
}

/// Finish a shell built by a per-type builder: install `body`, protect
/// unless `unprotected_send`, return. Shared tail of every
/// `factory::*::create_*` entry point, also used directly by test code that
/// needs to build a server-side reply carrying a body no `create_*` entry
/// point originates (e.g. a `cp`/`ip`/`kup` with a `certifiedKeyPair`).
pub fn finish(
    ctx: &Context,
    mut msg: crate::asn1::message::PkiMessage,
    body: PkiBody,
) -> Result<crate::asn1::message::PkiMessage> {
    msg.body = body;
    protect::protect(&mut msg, ctx)?;
    Ok(msg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_body_type_rejected() {
        let mut ctx = Context::new();
        let err = msg_create(&mut ctx, PkiBodyType::Nested).unwrap_err();
        assert!(matches!(err, CmpError::BodyConstruction { .. }));
    }

    #[test]
    fn pkiconf_shell_has_unit_body() {
        let mut ctx = Context::new();
        let msg = msg_create(&mut ctx, PkiBodyType::PkiConf).unwrap();
        assert!(matches!(msg.body, PkiBody::PkiConf));
    }
}
