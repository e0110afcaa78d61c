//! `pollReq`/`pollRep` body builders (spec.md §4.3), grounded on
//! `ossl_cmp_pollReq_new` in `examples/original_source/crypto/cmp/cmp_msg.c`.
//!
//! Trivial carriers of a `certReqId` (and, for `pollRep`, a `checkAfter`);
//! this engine only ever originates `pollReq` (the client side of the
//! polling loop, spec.md §4.7) — `create_poll_rep` exists for completeness
//! and for tests that exercise the session driver against an in-process
//! fake server.

use crate::asn1::body::{PkiBody, PkiBodyType, PollRepContent, PollReqContent};
use crate::asn1::message::PkiMessage;
use crate::context::Context;
use crate::error::Result;

/// Build and protect a `pollReq` for `cert_req_id` (always `0` in this
/// engine's single-request-per-transaction model).
pub fn create_poll_req(ctx: &mut Context, cert_req_id: i32) -> Result<PkiMessage> {
    let shell = super::msg_create(ctx, PkiBodyType::PollReq)?;
    super::finish(
        ctx,
        shell,
        PkiBody::PollReq(PollReqContent { cert_req_id }),
    )
}

/// Build and protect a `pollRep` (server-side / fake-transfer helper).
pub fn create_poll_rep(ctx: &mut Context, cert_req_id: i32, check_after: i64) -> Result<PkiMessage> {
    let shell = super::msg_create(ctx, PkiBodyType::PollRep)?;
    super::finish(
        ctx,
        shell,
        PkiBody::PollRep(PollRepContent {
            cert_req_id,
            check_after,
            reason: None,
        }),
    )
}
