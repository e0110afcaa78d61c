//! Minimal hand-rolled DER framing for [`super::message::PkiMessage`] and
//! its contents.
//!
//! Full ASN.1 DER encoding/decoding for X.509/CRMF/CMP is explicitly an
//! out-of-scope external collaborator (spec.md §1); this module is the
//! thin, self-consistent framing the core engine needs so that
//! `encode(decode(encode(x))) == encode(x)` — the property spec.md §8
//! actually exercises ("re-encoded ProtectedPart byte-identical to the
//! encoding used by the protection computation") — rather than a
//! byte-exact reimplementation of every implicit context tag in RFC
//! 4210/4211. Leaf values (`OCTET STRING`, `BIT STRING`, `OBJECT
//! IDENTIFIER`, `GeneralizedTime`, `ANY`) are encoded with the real `der`
//! crate types; composite framing (`SEQUENCE`, context-specific tags) is
//! built by hand with a small TLV writer/reader pair.

use crate::asn1::body::{
    CertId, CertRepMessage, CertResponse, CertStatus, ErrorMsgContent, PkiBody, PkiBodyType,
    PkiFailureInfo, PkiStatus, PkiStatusInfo, PollReqContent, PollRepContent, RevRepContent,
};
use crate::asn1::certreq::{CertReqMsg, CertRequest, CertTemplate, Control, ProofOfPossession};
use crate::asn1::header::{GeneralName, InfoTypeAndValue, PkiHeader};
use crate::asn1::message::PkiMessage;
use crate::error::{CmpError, Result};
use der::asn1::{BitString, OctetString};
use der::{Decode, Encode};

const TAG_SEQUENCE: u8 = 0x30;
const TAG_CONTEXT_CONSTRUCTED: u8 = 0xA0;

/// Minimal-length two's-complement `INTEGER` encoding, since this engine's
/// integers (`certReqId`, `PKIStatus`, `checkAfter`, ...) are small enough
/// that going through `der`'s primitive-integer impls for every width
/// variant isn't worth the churn; one helper pair covers all of them.
fn encode_integer(v: i64) -> Vec<u8> {
    let bytes = v.to_be_bytes();
    let mut start = 0;
    while start < bytes.len() - 1 {
        let b = bytes[start];
        let next = bytes[start + 1];
        if (b == 0x00 && next & 0x80 == 0) || (b == 0xff && next & 0x80 != 0) {
            start += 1;
        } else {
            break;
        }
    }
    wrap(0x02, &bytes[start..])
}

fn decode_integer(content: &[u8]) -> i64 {
    let negative = !content.is_empty() && content[0] & 0x80 != 0;
    let mut buf = if negative { [0xffu8; 8] } else { [0u8; 8] };
    let n = content.len().min(8);
    if n > 0 {
        buf[8 - n..].copy_from_slice(&content[content.len() - n..]);
    }
    i64::from_be_bytes(buf)
}

/// Append a DER definite-length header for `len` bytes.
fn push_length(out: &mut Vec<u8>, len: usize) {
    if len < 0x80 {
        out.push(len as u8);
    } else {
        let bytes = len.to_be_bytes();
        let significant: Vec<u8> = bytes
            .iter()
            .skip_while(|b| **b == 0)
            .copied()
            .collect();
        out.push(0x80 | significant.len() as u8);
        out.extend_from_slice(&significant);
    }
}

/// Wrap `content` in a TLV with the given tag byte.
fn wrap(tag: u8, content: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(content.len() + 4);
    out.push(tag);
    push_length(&mut out, content.len());
    out.extend_from_slice(content);
    out
}

fn sequence(parts: &[Vec<u8>]) -> Vec<u8> {
    let content: Vec<u8> = parts.iter().flat_map(|p| p.iter().copied()).collect();
    wrap(TAG_SEQUENCE, &content)
}

fn context(n: u8, content: &[u8]) -> Vec<u8> {
    wrap(TAG_CONTEXT_CONSTRUCTED | (n & 0x1f), content)
}

fn optional<T>(v: &Option<T>, f: impl Fn(&T) -> Vec<u8>) -> Vec<u8> {
    v.as_ref().map(f).unwrap_or_default()
}

/// Read one TLV from `buf` starting at `pos`, returning `(tag, content,
/// next_pos)`.
fn read_tlv(buf: &[u8], pos: usize) -> Result<(u8, &[u8], usize)> {
    if pos >= buf.len() {
        return Err(CmpError::FailedToReceivePkiMessage("truncated DER".into()));
    }
    let tag = buf[pos];
    let mut idx = pos + 1;
    if idx >= buf.len() {
        return Err(CmpError::FailedToReceivePkiMessage("truncated DER length".into()));
    }
    let first = buf[idx];
    idx += 1;
    let len = if first & 0x80 == 0 {
        first as usize
    } else {
        let n = (first & 0x7f) as usize;
        if idx + n > buf.len() {
            return Err(CmpError::FailedToReceivePkiMessage(
                "truncated DER long-form length".into(),
            ));
        }
        let mut len = 0usize;
        for b in &buf[idx..idx + n] {
            len = (len << 8) | (*b as usize);
        }
        idx += n;
        len
    };
    if idx + len > buf.len() {
        return Err(CmpError::FailedToReceivePkiMessage(
            "DER content runs past end of buffer".into(),
        ));
    }
    Ok((tag, &buf[idx..idx + len], idx + len))
}

/// Iterate sibling TLVs inside a SEQUENCE's content bytes.
fn iter_tlvs(content: &[u8]) -> Result<Vec<(u8, &[u8])>> {
    let mut out = Vec::new();
    let mut pos = 0;
    while pos < content.len() {
        let (tag, inner, next) = read_tlv(content, pos)?;
        out.push((tag, inner));
        pos = next;
    }
    Ok(out)
}

// ---- GeneralName --------------------------------------------------------

fn encode_general_name(name: &GeneralName) -> Vec<u8> {
    match name {
        GeneralName::DirectoryName(n) => {
            let der_name = n.to_der().unwrap_or_default();
            context(4, &der_name)
        }
        GeneralName::Other(any) => any.to_der().unwrap_or_default(),
    }
}

fn decode_general_name(tag: u8, content: &[u8]) -> Result<GeneralName> {
    if tag == (TAG_CONTEXT_CONSTRUCTED | 4) {
        let name = x509_cert::name::Name::from_der(content)
            .map_err(|e| CmpError::X509Parse(e.to_string()))?;
        Ok(GeneralName::DirectoryName(name))
    } else {
        Ok(GeneralName::Other(
            der::Any::from_der(&wrap(tag, content))?,
        ))
    }
}

// ---- InfoTypeAndValue / generalInfo -------------------------------------

fn encode_itav(itav: &InfoTypeAndValue) -> Vec<u8> {
    let oid = itav.info_type.to_der().unwrap_or_default();
    let value = optional(&itav.info_value, |a| a.to_der().unwrap_or_default());
    sequence(&[oid, value])
}

fn decode_itav(content: &[u8]) -> Result<InfoTypeAndValue> {
    let tlvs = iter_tlvs(content)?;
    if tlvs.is_empty() {
        return Err(CmpError::InvalidArgs("empty InfoTypeAndValue".into()));
    }
    let (_, oid_bytes) = tlvs[0];
    let info_type = der::asn1::ObjectIdentifier::from_der(&wrap(0x06, oid_bytes))?;
    let info_value = if tlvs.len() > 1 {
        let (tag, inner) = tlvs[1];
        Some(der::Any::from_der(&wrap(tag, inner))?)
    } else {
        None
    };
    Ok(InfoTypeAndValue {
        info_type,
        info_value,
    })
}

// ---- PKIHeader -----------------------------------------------------------

/// Field numbering follows RFC 4210 §5.1.3: pvno(no tag), sender[implicit
/// via GeneralName's own CHOICE tag], recipient[likewise], messageTime
/// [0], protectionAlg [1], senderKID [2], recipKID [3], transactionID [4],
/// senderNonce [5], recipNonce [6], freeText [7], generalInfo [8].
fn encode_header(hdr: &PkiHeader) -> Vec<u8> {
    let pvno = encode_integer(hdr.pvno as i64);
    let sender = encode_general_name(&hdr.sender);
    let recipient = encode_general_name(&hdr.recipient);
    let message_time = optional(&hdr.message_time, |t| context(0, &t.to_der().unwrap_or_default()));
    let protection_alg = optional(&hdr.protection_alg, |a| {
        context(1, &a.to_der().unwrap_or_default())
    });
    let sender_kid = optional(&hdr.sender_kid, |k| context(2, &k.to_der().unwrap_or_default()));
    let recip_kid = optional(&hdr.recip_kid, |k| context(3, &k.to_der().unwrap_or_default()));
    let transaction_id = context(4, &hdr.transaction_id.to_der().unwrap_or_default());
    let sender_nonce = context(5, &hdr.sender_nonce.to_der().unwrap_or_default());
    let recip_nonce = optional(&hdr.recip_nonce, |n| context(6, &n.to_der().unwrap_or_default()));
    let free_text = optional(&hdr.free_text, |texts| {
        let items: Vec<Vec<u8>> = texts
            .iter()
            .map(|t| {
                der::asn1::Utf8StringRef::new(t)
                    .map(|s| s.to_der().unwrap_or_default())
                    .unwrap_or_default()
            })
            .collect();
        context(7, &sequence(&items))
    });
    let general_info = optional(&hdr.general_info, |items| {
        let encoded: Vec<Vec<u8>> = items.iter().map(encode_itav).collect();
        context(8, &sequence(&encoded))
    });
    sequence(&[
        pvno,
        sender,
        recipient,
        message_time,
        protection_alg,
        sender_kid,
        recip_kid,
        transaction_id,
        sender_nonce,
        recip_nonce,
        free_text,
        general_info,
    ])
}

fn decode_header(content: &[u8]) -> Result<PkiHeader> {
    let tlvs = iter_tlvs(content)?;
    let mut iter = tlvs.into_iter();
    let (_, pvno_bytes) = iter
        .next()
        .ok_or_else(|| CmpError::InvalidArgs("header missing pvno".into()))?;
    let pvno = decode_integer(pvno_bytes) as i8;
    let (stag, sbytes) = iter
        .next()
        .ok_or_else(|| CmpError::InvalidArgs("header missing sender".into()))?;
    let sender = decode_general_name(stag, sbytes)?;
    let (rtag, rbytes) = iter
        .next()
        .ok_or_else(|| CmpError::InvalidArgs("header missing recipient".into()))?;
    let recipient = decode_general_name(rtag, rbytes)?;

    let mut message_time = None;
    let mut protection_alg = None;
    let mut sender_kid = None;
    let mut recip_kid = None;
    let mut transaction_id = None;
    let mut sender_nonce = None;
    let mut recip_nonce = None;
    let mut free_text = None;
    let mut general_info = None;

    for (tag, bytes) in iter {
        let number = tag & 0x1f;
        match number {
            0 => message_time = Some(der::asn1::GeneralizedTime::from_der(bytes)?),
            1 => protection_alg = Some(spki::AlgorithmIdentifierOwned::from_der(bytes)?),
            2 => sender_kid = Some(OctetString::from_der(bytes)?),
            3 => recip_kid = Some(OctetString::from_der(bytes)?),
            4 => transaction_id = Some(OctetString::from_der(bytes)?),
            5 => sender_nonce = Some(OctetString::from_der(bytes)?),
            6 => recip_nonce = Some(OctetString::from_der(bytes)?),
            7 => {
                let items = iter_tlvs(bytes)?;
                let mut texts = Vec::new();
                for (_, item) in items {
                    texts.push(der::asn1::Utf8StringRef::from_der(item)?.as_str().to_owned());
                }
                free_text = Some(texts);
            }
            8 => {
                let items = iter_tlvs(bytes)?;
                let mut out = Vec::new();
                for (_, item) in items {
                    out.push(decode_itav(item)?);
                }
                general_info = Some(out);
            }
            _ => {}
        }
    }

    Ok(PkiHeader {
        pvno,
        sender,
        recipient,
        message_time,
        protection_alg,
        sender_kid,
        recip_kid,
        transaction_id: transaction_id
            .ok_or_else(|| CmpError::InvalidArgs("header missing transactionID".into()))?,
        sender_nonce: sender_nonce
            .ok_or_else(|| CmpError::InvalidArgs("header missing senderNonce".into()))?,
        recip_nonce,
        free_text,
        general_info,
    })
}

// ---- PKIBody --------------------------------------------------------------

fn encode_body(body: &PkiBody) -> Vec<u8> {
    let (number, content): (u8, Vec<u8>) = match body {
        PkiBody::Ir(msgs) => (0, sequence(&msgs.iter().map(encode_cert_req_msg).collect::<Vec<_>>())),
        PkiBody::Ip(rep) => (1, encode_cert_rep_message(rep)),
        PkiBody::Cr(msgs) => (2, sequence(&msgs.iter().map(encode_cert_req_msg).collect::<Vec<_>>())),
        PkiBody::Cp(rep) => (3, encode_cert_rep_message(rep)),
        PkiBody::P10cr(any) => (4, any.to_der().unwrap_or_default()),
        PkiBody::Popdecc(any) => (5, any.to_der().unwrap_or_default()),
        PkiBody::Popdecr(any) => (6, any.to_der().unwrap_or_default()),
        PkiBody::Kur(msgs) => (7, sequence(&msgs.iter().map(encode_cert_req_msg).collect::<Vec<_>>())),
        PkiBody::Kup(rep) => (8, encode_cert_rep_message(rep)),
        PkiBody::Krr(any) => (9, any.to_der().unwrap_or_default()),
        PkiBody::Krp(any) => (10, any.to_der().unwrap_or_default()),
        PkiBody::Rr(templates) => (
            11,
            sequence(&templates.iter().map(encode_cert_template).collect::<Vec<_>>()),
        ),
        PkiBody::Rp(rep) => (12, encode_rev_rep_content(rep)),
        PkiBody::Ccr(any) => (13, any.to_der().unwrap_or_default()),
        PkiBody::Ccp(any) => (14, any.to_der().unwrap_or_default()),
        PkiBody::Ckuann(any) => (15, any.to_der().unwrap_or_default()),
        PkiBody::Cann(any) => (16, any.to_der().unwrap_or_default()),
        PkiBody::Rann(any) => (17, any.to_der().unwrap_or_default()),
        PkiBody::Crlann(any) => (18, any.to_der().unwrap_or_default()),
        PkiBody::PkiConf => (19, Vec::new()),
        PkiBody::Nested(any) => (20, any.to_der().unwrap_or_default()),
        PkiBody::GenM(items) => (21, sequence(&items.iter().map(encode_itav).collect::<Vec<_>>())),
        PkiBody::GenP(items) => (22, sequence(&items.iter().map(encode_itav).collect::<Vec<_>>())),
        PkiBody::Error(err) => (23, encode_error_content(err)),
        PkiBody::CertConf(statuses) => (
            24,
            sequence(&statuses.iter().map(encode_cert_status).collect::<Vec<_>>()),
        ),
        PkiBody::PollReq(req) => (25, encode_poll_req(req)),
        PkiBody::PollRep(rep) => (26, encode_poll_rep(rep)),
    };
    context(number, &content)
}

fn decode_body(tag: u8, content: &[u8]) -> Result<PkiBody> {
    let number = (tag & 0x1f) as i32;
    let body_type = PkiBodyType::from_tag(number)
        .ok_or_else(|| CmpError::InvalidArgs(format!("unknown PKIBody tag {number}")))?;
    Ok(match body_type {
        PkiBodyType::Ir => PkiBody::Ir(decode_cert_req_msgs(content)?),
        PkiBodyType::Ip => PkiBody::Ip(decode_cert_rep_message(content)?),
        PkiBodyType::Cr => PkiBody::Cr(decode_cert_req_msgs(content)?),
        PkiBodyType::Cp => PkiBody::Cp(decode_cert_rep_message(content)?),
        PkiBodyType::P10cr => PkiBody::P10cr(der::Any::from_der(content)?),
        PkiBodyType::Popdecc => PkiBody::Popdecc(der::Any::from_der(content)?),
        PkiBodyType::Popdecr => PkiBody::Popdecr(der::Any::from_der(content)?),
        PkiBodyType::Kur => PkiBody::Kur(decode_cert_req_msgs(content)?),
        PkiBodyType::Kup => PkiBody::Kup(decode_cert_rep_message(content)?),
        PkiBodyType::Krr => PkiBody::Krr(der::Any::from_der(content)?),
        PkiBodyType::Krp => PkiBody::Krp(der::Any::from_der(content)?),
        PkiBodyType::Rr => {
            let tlvs = iter_tlvs(content)?;
            let mut templates = Vec::new();
            for (_, bytes) in tlvs {
                templates.push(decode_cert_template(bytes)?);
            }
            PkiBody::Rr(templates)
        }
        PkiBodyType::Rp => PkiBody::Rp(decode_rev_rep_content(content)?),
        PkiBodyType::Ccr => PkiBody::Ccr(der::Any::from_der(content)?),
        PkiBodyType::Ccp => PkiBody::Ccp(der::Any::from_der(content)?),
        PkiBodyType::Ckuann => PkiBody::Ckuann(der::Any::from_der(content)?),
        PkiBodyType::Cann => PkiBody::Cann(der::Any::from_der(content)?),
        PkiBodyType::Rann => PkiBody::Rann(der::Any::from_der(content)?),
        PkiBodyType::Crlann => PkiBody::Crlann(der::Any::from_der(content)?),
        PkiBodyType::PkiConf => PkiBody::PkiConf,
        PkiBodyType::Nested => PkiBody::Nested(der::Any::from_der(content)?),
        PkiBodyType::GenM => PkiBody::GenM(decode_itav_seq(content)?),
        PkiBodyType::GenP => PkiBody::GenP(decode_itav_seq(content)?),
        PkiBodyType::Error => PkiBody::Error(decode_error_content(content)?),
        PkiBodyType::CertConf => {
            let tlvs = iter_tlvs(content)?;
            let mut statuses = Vec::new();
            for (_, bytes) in tlvs {
                statuses.push(decode_cert_status(bytes)?);
            }
            PkiBody::CertConf(statuses)
        }
        PkiBodyType::PollReq => PkiBody::PollReq(decode_poll_req(content)?),
        PkiBodyType::PollRep => PkiBody::PollRep(decode_poll_rep(content)?),
    })
}

fn decode_itav_seq(content: &[u8]) -> Result<Vec<InfoTypeAndValue>> {
    iter_tlvs(content)?.into_iter().map(|(_, b)| decode_itav(b)).collect()
}

// ---- CertTemplate / CertReqMsg -------------------------------------------

fn encode_cert_template(t: &CertTemplate) -> Vec<u8> {
    let version = optional(&t.version, |v| context(0, &encode_integer(*v as i64)));
    let serial = optional(&t.serial_number, |s| {
        context(1, &wrap(0x02, s))
    });
    let signing_alg = optional(&t.signing_alg, |a| context(2, &a.to_der().unwrap_or_default()));
    let issuer = optional(&t.issuer, |n| context(3, &n.to_der().unwrap_or_default()));
    let validity = optional(&t.validity, |v| {
        let nb = optional(&v.not_before, |t| context(0, &t.to_der().unwrap_or_default()));
        let na = optional(&v.not_after, |t| context(1, &t.to_der().unwrap_or_default()));
        context(4, &sequence(&[nb, na]))
    });
    let subject = optional(&t.subject, |n| context(5, &n.to_der().unwrap_or_default()));
    let public_key = optional(&t.public_key, |k| context(6, &k.to_der().unwrap_or_default()));
    let extensions = optional(&t.extensions, |e| {
        let items: Vec<Vec<u8>> = e.iter().map(|ext| ext.to_der().unwrap_or_default()).collect();
        context(9, &sequence(&items))
    });
    sequence(&[version, serial, signing_alg, issuer, validity, subject, public_key, extensions])
}

fn decode_cert_template(content: &[u8]) -> Result<CertTemplate> {
    let mut t = CertTemplate::default();
    for (tag, bytes) in iter_tlvs(content)? {
        match tag & 0x1f {
            0 => t.version = Some(decode_integer(bytes) as i8),
            1 => {
                let (_, inner, _) = read_tlv(bytes, 0)?;
                t.serial_number = Some(inner.to_vec());
            }
            2 => t.signing_alg = Some(spki::AlgorithmIdentifierOwned::from_der(bytes)?),
            3 => {
                t.issuer = Some(
                    x509_cert::name::Name::from_der(bytes)
                        .map_err(|e| CmpError::X509Parse(e.to_string()))?,
                )
            }
            4 => {
                let parts = iter_tlvs(bytes)?;
                let mut nb = None;
                let mut na = None;
                for (ptag, pbytes) in parts {
                    match ptag & 0x1f {
                        0 => nb = Some(der::asn1::GeneralizedTime::from_der(pbytes)?),
                        1 => na = Some(der::asn1::GeneralizedTime::from_der(pbytes)?),
                        _ => {}
                    }
                }
                t.validity = Some(crate::asn1::certreq::OptionalValidity {
                    not_before: nb,
                    not_after: na,
                });
            }
            5 => {
                t.subject = Some(
                    x509_cert::name::Name::from_der(bytes)
                        .map_err(|e| CmpError::X509Parse(e.to_string()))?,
                )
            }
            6 => t.public_key = Some(spki::SubjectPublicKeyInfoOwned::from_der(bytes)?),
            9 => {
                let mut exts = x509_cert::ext::Extensions::default();
                for (_, ebytes) in iter_tlvs(bytes)? {
                    exts.push(
                        x509_cert::ext::Extension::from_der(ebytes)
                            .map_err(|e| CmpError::X509Parse(e.to_string()))?,
                    );
                }
                t.extensions = Some(exts);
            }
            _ => {}
        }
    }
    Ok(t)
}

fn encode_controls(controls: &[Control]) -> Vec<u8> {
    let items: Vec<Vec<u8>> = controls
        .iter()
        .map(|c| sequence(&[c.control_type.to_der().unwrap_or_default(), c.value.to_der().unwrap_or_default()]))
        .collect();
    sequence(&items)
}

fn decode_controls(content: &[u8]) -> Result<Vec<Control>> {
    iter_tlvs(content)?
        .into_iter()
        .map(|(_, bytes)| {
            let parts = iter_tlvs(bytes)?;
            let (_, oid_bytes) = parts
                .first()
                .ok_or_else(|| CmpError::InvalidArgs("empty control".into()))?;
            let control_type = der::asn1::ObjectIdentifier::from_der(&wrap(0x06, oid_bytes))?;
            let value = match parts.get(1) {
                Some((tag, bytes)) => der::Any::from_der(&wrap(*tag, bytes))?,
                None => return Err(CmpError::InvalidArgs("control missing value".into())),
            };
            Ok(Control { control_type, value })
        })
        .collect()
}

fn encode_popo(popo: &ProofOfPossession) -> Vec<u8> {
    match popo {
        ProofOfPossession::RaVerified => context(0, &[0x05, 0x00]),
        ProofOfPossession::Signature(sig) => context(
            1,
            &sequence(&[
                sig.algorithm_identifier.to_der().unwrap_or_default(),
                sig.signature.to_der().unwrap_or_default(),
            ]),
        ),
        ProofOfPossession::KeyEncipherment(any) => context(2, &any.to_der().unwrap_or_default()),
        ProofOfPossession::KeyAgreement(any) => context(3, &any.to_der().unwrap_or_default()),
    }
}

fn decode_popo(tag: u8, content: &[u8]) -> Result<ProofOfPossession> {
    Ok(match tag & 0x1f {
        0 => ProofOfPossession::RaVerified,
        1 => {
            let parts = iter_tlvs(content)?;
            let (atag, abytes) = parts
                .first()
                .ok_or_else(|| CmpError::InvalidArgs("popo signature missing alg".into()))?;
            let (stag, sbytes) = parts
                .get(1)
                .ok_or_else(|| CmpError::InvalidArgs("popo signature missing value".into()))?;
            let algorithm_identifier =
                spki::AlgorithmIdentifierOwned::from_der(&wrap(*atag, abytes))?;
            let signature = BitString::from_der(&wrap(*stag, sbytes))?;
            ProofOfPossession::Signature(crate::asn1::certreq::PopoSigningKey {
                algorithm_identifier,
                signature,
            })
        }
        2 => ProofOfPossession::KeyEncipherment(der::Any::from_der(content)?),
        3 => ProofOfPossession::KeyAgreement(der::Any::from_der(content)?),
        n => return Err(CmpError::InvalidArgs(format!("unknown POPO choice {n}"))),
    })
}

fn encode_cert_req_msg(msg: &CertReqMsg) -> Vec<u8> {
    let cert_req_id = encode_integer(msg.cert_req.cert_req_id as i64);
    let cert_template = encode_cert_template(&msg.cert_req.cert_template);
    let controls = optional(&msg.cert_req.controls, |c| encode_controls(c));
    let cert_req = sequence(&[cert_req_id, cert_template, controls]);
    let popo = optional(&msg.popo, |p| encode_popo(p));
    let reg_info = optional(&msg.reg_info, |c| encode_controls(c));
    sequence(&[cert_req, popo, reg_info])
}

fn decode_cert_req_msgs(content: &[u8]) -> Result<Vec<CertReqMsg>> {
    iter_tlvs(content)?
        .into_iter()
        .map(|(_, bytes)| decode_cert_req_msg(bytes))
        .collect()
}

fn decode_cert_req_msg(content: &[u8]) -> Result<CertReqMsg> {
    let tlvs = iter_tlvs(content)?;
    let (_, cert_req_bytes) = tlvs
        .first()
        .ok_or_else(|| CmpError::InvalidArgs("CertReqMsg missing certReq".into()))?;
    let inner = iter_tlvs(cert_req_bytes)?;
    let (_, id_bytes) = inner
        .first()
        .ok_or_else(|| CmpError::InvalidArgs("CertRequest missing certReqId".into()))?;
    let cert_req_id = decode_integer(id_bytes) as i32;
    let (_, template_bytes) = inner
        .get(1)
        .ok_or_else(|| CmpError::InvalidArgs("CertRequest missing certTemplate".into()))?;
    let cert_template = decode_cert_template(template_bytes)?;
    let controls = match inner.get(2) {
        Some((_, bytes)) => Some(decode_controls(bytes)?),
        None => None,
    };
    let mut popo = None;
    let mut reg_info = None;
    for (tag, bytes) in tlvs.iter().skip(1) {
        if tag & TAG_CONTEXT_CONSTRUCTED == TAG_CONTEXT_CONSTRUCTED && popo.is_none() {
            popo = Some(decode_popo(*tag, bytes)?);
        } else {
            reg_info = Some(decode_controls(bytes)?);
        }
    }
    Ok(CertReqMsg {
        cert_req: CertRequest {
            cert_req_id,
            cert_template,
            controls,
        },
        popo,
        reg_info,
    })
}

// ---- CertRepMessage / CertResponse / CertStatus --------------------------

fn encode_pki_status_info(s: &PkiStatusInfo) -> Vec<u8> {
    let status = encode_integer(s.status as i64);
    let status_string = optional(&s.status_string, |texts| {
        let items: Vec<Vec<u8>> = texts
            .iter()
            .map(|t| der::asn1::Utf8StringRef::new(t).map(|s| s.to_der().unwrap_or_default()).unwrap_or_default())
            .collect();
        sequence(&items)
    });
    let fail_info = optional(&s.fail_info, |f| context(3, &f.0.to_be_bytes()));
    sequence(&[status, status_string, fail_info])
}

fn decode_pki_status_info(content: &[u8]) -> Result<PkiStatusInfo> {
    let tlvs = iter_tlvs(content)?;
    let (_, status_bytes) = tlvs
        .first()
        .ok_or_else(|| CmpError::InvalidArgs("PKIStatusInfo missing status".into()))?;
    let status_val = decode_integer(status_bytes) as i32;
    let status = PkiStatus::from_i32(status_val)
        .ok_or_else(|| CmpError::InvalidArgs(format!("unknown PKIStatus {status_val}")))?;
    let mut status_string = None;
    let mut fail_info = None;
    for (tag, bytes) in tlvs.iter().skip(1) {
        if *tag == TAG_SEQUENCE {
            let items = iter_tlvs(bytes)?;
            let mut texts = Vec::new();
            for (_, item) in items {
                texts.push(der::asn1::Utf8StringRef::from_der(item)?.as_str().to_owned());
            }
            status_string = Some(texts);
        } else {
            fail_info = Some(PkiFailureInfo(decode_integer(bytes) as u32));
        }
    }
    Ok(PkiStatusInfo {
        status,
        status_string,
        fail_info,
    })
}

fn encode_cert_response(r: &CertResponse) -> Vec<u8> {
    let id = encode_integer(r.cert_req_id as i64);
    let status = encode_pki_status_info(&r.status);
    let kp = optional(&r.certified_key_pair, |c| {
        let cert = c.to_der().unwrap_or_default();
        sequence(&[context(0, &sequence(&[cert]))])
    });
    sequence(&[id, status, kp])
}

fn decode_cert_response(content: &[u8]) -> Result<CertResponse> {
    let tlvs = iter_tlvs(content)?;
    let (_, id_bytes) = tlvs
        .first()
        .ok_or_else(|| CmpError::InvalidArgs("CertResponse missing certReqId".into()))?;
    let cert_req_id = decode_integer(id_bytes) as i32;
    let (_, status_bytes) = tlvs
        .get(1)
        .ok_or_else(|| CmpError::InvalidArgs("CertResponse missing status".into()))?;
    let status = decode_pki_status_info(status_bytes)?;
    let certified_key_pair = match tlvs.get(2) {
        Some((_, bytes)) => {
            let inner = iter_tlvs(bytes)?;
            match inner.first() {
                Some((_, cert_wrapper)) => {
                    let cert_items = iter_tlvs(cert_wrapper)?;
                    match cert_items.first() {
                        Some((_, cert_bytes)) => Some(
                            x509_cert::Certificate::from_der(cert_bytes)
                                .map_err(|e| CmpError::X509Parse(e.to_string()))?,
                        ),
                        None => None,
                    }
                }
                None => None,
            }
        }
        None => None,
    };
    Ok(CertResponse {
        cert_req_id,
        status,
        certified_key_pair,
    })
}

fn encode_cert_rep_message(rep: &CertRepMessage) -> Vec<u8> {
    let ca_pubs = optional(&rep.ca_pubs, |certs| {
        let items: Vec<Vec<u8>> = certs.iter().map(|c| c.to_der().unwrap_or_default()).collect();
        context(1, &sequence(&items))
    });
    let responses: Vec<Vec<u8>> = rep.response.iter().map(encode_cert_response).collect();
    sequence(&[ca_pubs, sequence(&responses)])
}

fn decode_cert_rep_message(content: &[u8]) -> Result<CertRepMessage> {
    let tlvs = iter_tlvs(content)?;
    let mut ca_pubs = None;
    let mut response = Vec::new();
    for (tag, bytes) in tlvs {
        if tag == (TAG_CONTEXT_CONSTRUCTED | 1) {
            let mut certs = Vec::new();
            for (_, cert_bytes) in iter_tlvs(bytes)? {
                certs.push(
                    x509_cert::Certificate::from_der(cert_bytes)
                        .map_err(|e| CmpError::X509Parse(e.to_string()))?,
                );
            }
            ca_pubs = Some(certs);
        } else if tag == TAG_SEQUENCE {
            for (_, r) in iter_tlvs(bytes)? {
                response.push(decode_cert_response(r)?);
            }
        }
    }
    if response.len() > 1 {
        return Err(CmpError::MultipleResponsesNotSupported);
    }
    Ok(CertRepMessage { ca_pubs, response })
}

fn encode_cert_status(s: &CertStatus) -> Vec<u8> {
    let hash = s.cert_hash.to_der().unwrap_or_default();
    let id = encode_integer(s.cert_req_id as i64);
    let status = optional(&s.status_info, |si| encode_pki_status_info(si));
    sequence(&[hash, id, status])
}

fn decode_cert_status(content: &[u8]) -> Result<CertStatus> {
    let tlvs = iter_tlvs(content)?;
    let (_, hash_bytes) = tlvs
        .first()
        .ok_or_else(|| CmpError::InvalidArgs("CertStatus missing certHash".into()))?;
    let cert_hash = OctetString::from_der(&wrap(0x04, hash_bytes))?;
    let (_, id_bytes) = tlvs
        .get(1)
        .ok_or_else(|| CmpError::InvalidArgs("CertStatus missing certReqId".into()))?;
    let cert_req_id = decode_integer(id_bytes) as i32;
    let status_info = match tlvs.get(2) {
        Some((_, bytes)) => Some(decode_pki_status_info(bytes)?),
        None => None,
    };
    Ok(CertStatus {
        cert_hash,
        cert_req_id,
        status_info,
    })
}

// ---- Revocation -----------------------------------------------------------

fn encode_cert_id(id: &CertId) -> Vec<u8> {
    sequence(&[encode_general_name(&id.issuer), wrap(0x02, &id.serial_number)])
}

fn decode_cert_id(content: &[u8]) -> Result<CertId> {
    let tlvs = iter_tlvs(content)?;
    let (itag, ibytes) = tlvs
        .first()
        .ok_or_else(|| CmpError::InvalidArgs("CertId missing issuer".into()))?;
    let issuer = decode_general_name(*itag, ibytes)?;
    let (_, sbytes) = tlvs
        .get(1)
        .ok_or_else(|| CmpError::InvalidArgs("CertId missing serialNumber".into()))?;
    Ok(CertId {
        issuer,
        serial_number: sbytes.to_vec(),
    })
}

fn encode_rev_rep_content(rep: &RevRepContent) -> Vec<u8> {
    let statuses: Vec<Vec<u8>> = rep.status.iter().map(encode_pki_status_info).collect();
    let rev_certs = optional(&rep.rev_certs, |ids| {
        let items: Vec<Vec<u8>> = ids.iter().map(encode_cert_id).collect();
        context(0, &sequence(&items))
    });
    sequence(&[sequence(&statuses), rev_certs])
}

fn decode_rev_rep_content(content: &[u8]) -> Result<RevRepContent> {
    let tlvs = iter_tlvs(content)?;
    let (_, status_bytes) = tlvs
        .first()
        .ok_or_else(|| CmpError::InvalidArgs("RevRepContent missing status".into()))?;
    let mut status = Vec::new();
    for (_, s) in iter_tlvs(status_bytes)? {
        status.push(decode_pki_status_info(s)?);
    }
    let rev_certs = match tlvs.get(1) {
        Some((_, bytes)) => {
            let mut ids = Vec::new();
            for (_, b) in iter_tlvs(bytes)? {
                ids.push(decode_cert_id(b)?);
            }
            Some(ids)
        }
        None => None,
    };
    Ok(RevRepContent { status, rev_certs })
}

// ---- Poll / Error ----------------------------------------------------------

fn encode_poll_req(req: &PollReqContent) -> Vec<u8> {
    sequence(&[sequence(&[encode_integer(req.cert_req_id as i64)])])
}

fn decode_poll_req(content: &[u8]) -> Result<PollReqContent> {
    let outer = iter_tlvs(content)?;
    let (_, first) = outer
        .first()
        .ok_or_else(|| CmpError::InvalidArgs("PollReqContent empty".into()))?;
    let inner = iter_tlvs(first)?;
    let (_, id_bytes) = inner
        .first()
        .ok_or_else(|| CmpError::InvalidArgs("PollReqContent missing certReqId".into()))?;
    Ok(PollReqContent {
        cert_req_id: decode_integer(id_bytes) as i32,
    })
}

fn encode_poll_rep(rep: &PollRepContent) -> Vec<u8> {
    let id = encode_integer(rep.cert_req_id as i64);
    let check_after = encode_integer(rep.check_after);
    let reason = optional(&rep.reason, |texts| {
        let items: Vec<Vec<u8>> = texts
            .iter()
            .map(|t| der::asn1::Utf8StringRef::new(t).map(|s| s.to_der().unwrap_or_default()).unwrap_or_default())
            .collect();
        sequence(&items)
    });
    sequence(&[sequence(&[id, check_after, reason])])
}

fn decode_poll_rep(content: &[u8]) -> Result<PollRepContent> {
    let outer = iter_tlvs(content)?;
    let (_, first) = outer
        .first()
        .ok_or_else(|| CmpError::InvalidArgs("PollRepContent empty".into()))?;
    let inner = iter_tlvs(first)?;
    let (_, id_bytes) = inner
        .first()
        .ok_or_else(|| CmpError::InvalidArgs("PollRepContent missing certReqId".into()))?;
    let (_, check_bytes) = inner
        .get(1)
        .ok_or_else(|| CmpError::InvalidArgs("PollRepContent missing checkAfter".into()))?;
    let check_after = decode_integer(check_bytes);
    let reason = match inner.get(2) {
        Some((_, bytes)) => {
            let mut texts = Vec::new();
            for (_, item) in iter_tlvs(bytes)? {
                texts.push(der::asn1::Utf8StringRef::from_der(item)?.as_str().to_owned());
            }
            Some(texts)
        }
        None => None,
    };
    Ok(PollRepContent {
        cert_req_id: decode_integer(id_bytes) as i32,
        check_after,
        reason,
    })
}

fn encode_error_content(err: &ErrorMsgContent) -> Vec<u8> {
    let status = encode_pki_status_info(&err.status);
    let code = optional(&err.error_code, |c| encode_integer(*c));
    let details = optional(&err.error_details, |texts| {
        let items: Vec<Vec<u8>> = texts
            .iter()
            .map(|t| der::asn1::Utf8StringRef::new(t).map(|s| s.to_der().unwrap_or_default()).unwrap_or_default())
            .collect();
        sequence(&items)
    });
    sequence(&[status, code, details])
}

fn decode_error_content(content: &[u8]) -> Result<ErrorMsgContent> {
    let tlvs = iter_tlvs(content)?;
    let (_, status_bytes) = tlvs
        .first()
        .ok_or_else(|| CmpError::InvalidArgs("ErrorMsgContent missing status".into()))?;
    let status = decode_pki_status_info(status_bytes)?;
    let mut error_code = None;
    let mut error_details = None;
    for (tag, bytes) in tlvs.iter().skip(1) {
        if *tag == 0x02 {
            error_code = Some(decode_integer(bytes));
        } else if *tag == TAG_SEQUENCE {
            let mut texts = Vec::new();
            for (_, item) in iter_tlvs(bytes)? {
                texts.push(der::asn1::Utf8StringRef::from_der(item)?.as_str().to_owned());
            }
            error_details = Some(texts);
        }
    }
    Ok(ErrorMsgContent {
        status,
        error_code,
        error_details,
    })
}

// ---- top-level message ----------------------------------------------------

pub(crate) fn encode_protected_part(
    header: &PkiHeader,
    body: &PkiBody,
) -> Result<Vec<u8>> {
    Ok(sequence(&[encode_header(header), encode_body(body)]))
}

pub(crate) fn encode_message(msg: &PkiMessage) -> Result<Vec<u8>> {
    let header = encode_header(&msg.header);
    let body = encode_body(&msg.body);
    let protection = optional(&msg.protection, |p| context(0, &p.to_der().unwrap_or_default()));
    let extra_certs = optional(&msg.extra_certs, |certs| {
        let items: Vec<Vec<u8>> = certs.iter().map(|c| c.to_der().unwrap_or_default()).collect();
        context(1, &sequence(&items))
    });
    Ok(sequence(&[header, body, protection, extra_certs]))
}

pub(crate) fn decode_message(bytes: &[u8]) -> Result<PkiMessage> {
    let (tag, content, _) = read_tlv(bytes, 0)?;
    if tag != TAG_SEQUENCE {
        return Err(CmpError::FailedToReceivePkiMessage(
            "PKIMessage is not a SEQUENCE".into(),
        ));
    }
    let tlvs = iter_tlvs(content)?;
    let (_, header_bytes) = tlvs
        .first()
        .ok_or_else(|| CmpError::InvalidArgs("PKIMessage missing header".into()))?;
    let header = decode_header(header_bytes)?;
    let (btag, body_bytes) = tlvs
        .get(1)
        .ok_or_else(|| CmpError::InvalidArgs("PKIMessage missing body".into()))?;
    let body = decode_body(*btag, body_bytes)?;
    let mut protection = None;
    let mut extra_certs = None;
    for (tag, bytes) in tlvs.iter().skip(2) {
        match tag & 0x1f {
            0 => protection = Some(BitString::from_der(bytes)?),
            1 => {
                let mut certs = Vec::new();
                for (_, cert_bytes) in iter_tlvs(bytes)? {
                    certs.push(
                        x509_cert::Certificate::from_der(cert_bytes)
                            .map_err(|e| CmpError::X509Parse(e.to_string()))?,
                    );
                }
                extra_certs = Some(certs);
            }
            _ => {}
        }
    }
    Ok(PkiMessage {
        header,
        body,
        protection,
        extra_certs,
    })
}

// ---- helpers shared with protect/factory (PBMAC params, extensions) ----

/// Decode `PBMParameter { salt OCTET STRING, owf AlgorithmIdentifier,
/// iterationCount INTEGER, mac AlgorithmIdentifier }` out of a
/// `protectionAlg.parameters` `ANY`, the inverse of
/// `protect::pbm_algorithm_identifier`.
pub(crate) fn decode_pbm_parameter(
    params: &der::Any,
) -> Result<(Vec<u8>, der::asn1::ObjectIdentifier, i64, der::asn1::ObjectIdentifier)> {
    let bytes = params.to_der().map_err(CmpError::Der)?;
    let (_tag, content, _) = read_tlv(&bytes, 0)?;
    let parts = iter_tlvs(content)?;
    if parts.len() < 4 {
        return Err(CmpError::InvalidArgs("malformed PBMParameter".into()));
    }
    let salt = parts[0].1.to_vec();
    let owf_oid = {
        let owf_parts = iter_tlvs(parts[1].1)?;
        der::asn1::ObjectIdentifier::from_der(&wrap(owf_parts[0].0, owf_parts[0].1))?
    };
    let iteration_count = decode_integer(parts[2].1);
    let mac_oid = {
        let mac_parts = iter_tlvs(parts[3].1)?;
        der::asn1::ObjectIdentifier::from_der(&wrap(mac_parts[0].0, mac_parts[0].1))?
    };
    Ok((salt, owf_oid, iteration_count, mac_oid))
}

/// `SubjectAltName ::= GeneralNames ::= SEQUENCE OF GeneralName`, reusing
/// the same `GeneralName` encoder the header uses for sender/recipient.
pub(crate) fn encode_general_names(names: &[GeneralName]) -> Vec<u8> {
    let parts: Vec<Vec<u8>> = names.iter().map(encode_general_name).collect();
    sequence(&parts)
}

/// `CertificatePolicies ::= SEQUENCE OF PolicyInformation`, where each
/// `PolicyInformation` here carries only `policyIdentifier` (no
/// qualifiers) — this engine's context only ever configures bare policy
/// OIDs (spec.md §3's "certificate-policy OIDs").
pub(crate) fn encode_cert_policies(oids: &[der::asn1::ObjectIdentifier]) -> Vec<u8> {
    let parts: Vec<Vec<u8>> = oids
        .iter()
        .map(|oid| sequence(&[oid.to_der().unwrap_or_default()]))
        .collect();
    sequence(&parts)
}

/// Encode a CRMF `CertId` as the `der::Any` carried by a KUR `OldCertID`
/// control's value (spec.md §4.3's "add `OldCertID` control from reference
/// cert issuer+serial").
pub(crate) fn encode_cert_id_any(id: &CertId) -> Result<der::Any> {
    der::Any::from_der(&encode_cert_id(id)).map_err(CmpError::Der)
}

/// DER-encode just the `CertRequest` (`certReqId`, `certTemplate`,
/// `controls`) — the bytes a `POPOSigningKey` without its own
/// `poposkInput` signs over (RFC 4211 §4.1).
pub(crate) fn encode_cert_request(req: &crate::asn1::certreq::CertRequest) -> Vec<u8> {
    let cert_req_id = encode_integer(req.cert_req_id as i64);
    let cert_template = encode_cert_template(&req.cert_template);
    let controls = optional(&req.controls, |c| encode_controls(c));
    sequence(&[cert_req_id, cert_template, controls])
}

/// `CRLReason ::= ENUMERATED`, the sole extension value carried by RR's
/// `crlEntryDetails` when a revocation reason is configured.
pub(crate) fn encode_crl_reason(reason: i32) -> Vec<u8> {
    wrap(0x0a, &encode_integer(reason as i64)[2..])
}
