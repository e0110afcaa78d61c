//! `error` body builder (spec.md §4.3), grounded on `ossl_cmp_error_new` in
//! `examples/original_source/crypto/cmp/cmp_msg.c`.

use crate::asn1::body::{ErrorMsgContent, PkiBody, PkiBodyType, PkiStatusInfo};
use crate::asn1::message::PkiMessage;
use crate::context::Context;
use crate::error::Result;

/// Build and protect an `error` message wrapping `status`, with an optional
/// `errorCode` and free-text `errorDetails` (spec.md §4.3).
pub fn create_error(
    ctx: &mut Context,
    status: PkiStatusInfo,
    error_code: Option<i64>,
    error_details: Option<Vec<String>>,
) -> Result<PkiMessage> {
    let shell = super::msg_create(ctx, PkiBodyType::Error)?;
    super::finish(
        ctx,
        shell,
        PkiBody::Error(ErrorMsgContent {
            status,
            error_code,
            error_details,
        }),
    )
}
