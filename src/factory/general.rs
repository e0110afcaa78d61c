//! `genM`/`genP` body builders (spec.md §4.3), grounded on
//! `ossl_cmp_genm_new` in `examples/original_source/crypto/cmp/cmp_msg.c`.

use crate::asn1::body::{PkiBody, PkiBodyType};
use crate::asn1::header::InfoTypeAndValue;
use crate::asn1::message::PkiMessage;
use crate::context::Context;
use crate::error::Result;

/// Build and protect a `genM` carrying `ctx.genm_itavs` verbatim
/// (spec.md §4.3: "sequence of (OID, value) items pre-loaded in context").
pub fn create_genm(ctx: &mut Context) -> Result<PkiMessage> {
    let itavs = ctx.genm_itavs.clone();
    let shell = super::msg_create(ctx, PkiBodyType::GenM)?;
    super::finish(ctx, shell, PkiBody::GenM(itavs))
}

/// Build and protect a `genP` carrying `itavs` (fake-transfer helper; this
/// engine never originates `genP` itself, only consumes it).
pub fn create_genp(ctx: &mut Context, itavs: Vec<InfoTypeAndValue>) -> Result<PkiMessage> {
    let shell = super::msg_create(ctx, PkiBodyType::GenP)?;
    super::finish(ctx, shell, PkiBody::GenP(itavs))
}
