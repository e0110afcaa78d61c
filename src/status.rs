//! `PKIStatusInfo` printing and construction helpers (spec.md §4.8),
//! grounded on `ossl_cmp_statusInfo_print`/`ossl_cmp_pkisi_new` in
//! `examples/original_source/crypto/cmp/cmp_status.c`.

use crate::asn1::body::{PkiFailureInfo, PkiStatusInfo};

/// Build a `PKIStatusInfo` from its three parts (`ossl_cmp_statusinfo_new`).
pub fn build(
    status: crate::asn1::body::PkiStatus,
    fail_info: Option<PkiFailureInfo>,
    status_string: Option<Vec<String>>,
) -> PkiStatusInfo {
    PkiStatusInfo {
        status,
        status_string,
        fail_info,
    }
}

/// Render `info` as the single-line human-readable form spec.md §4.8
/// describes, e.g.
/// `status: rejection; PKIFailureInfo: badPOP, badCertTemplate; StatusStrings: "no thanks"`.
pub fn render(info: &PkiStatusInfo) -> String {
    let mut out = format!("status: {}", info.status.name());
    if let Some(fail_info) = info.fail_info {
        if !fail_info.is_empty() {
            out.push_str("; PKIFailureInfo: ");
            out.push_str(&fail_info.set_names().join(", "));
        }
    }
    if let Some(strings) = &info.status_string {
        if !strings.is_empty() {
            out.push_str("; StatusStrings: ");
            let quoted: Vec<String> = strings.iter().map(|s| format!("\"{s}\"")).collect();
            out.push_str(&quoted.join(", "));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asn1::body::PkiStatus;

    #[test]
    fn renders_accepted_with_no_extra_detail() {
        let info = PkiStatusInfo::accepted();
        assert_eq!(render(&info), "status: accepted");
    }

    #[test]
    fn renders_rejection_with_failinfo_and_text() {
        let info = PkiStatusInfo::rejection(
            PkiFailureInfo::BAD_POP.union(PkiFailureInfo::BAD_CERT_TEMPLATE),
            "no thanks",
        );
        assert_eq!(
            render(&info),
            "status: rejection; PKIFailureInfo: badPOP, badCertTemplate; StatusStrings: \"no thanks\""
        );
    }

    #[test]
    fn build_matches_manual_construction() {
        let built = build(PkiStatus::Waiting, None, None);
        assert_eq!(built.status, PkiStatus::Waiting);
        assert!(built.fail_info.is_none());
    }
}
