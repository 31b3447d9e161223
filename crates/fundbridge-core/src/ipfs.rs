pub const DEFAULT_GATEWAY: &str = "https://gateway.pinata.cloud";

const BASE58: &str = "123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

/// CIDv0 (`Qm…`, base58btc) or CIDv1 in base32 (`b…`). Shape check only.
pub fn is_plausible_cid(s: &str) -> bool {
    if s.len() == 46 && s.starts_with("Qm") {
        return s.chars().all(|c| BASE58.contains(c));
    }
    if s.len() >= 59 && s.starts_with('b') {
        return s.chars().all(|c| c.is_ascii_lowercase() || ('2'..='7').contains(&c));
    }
    false
}

/// Rewrites `ipfs://` URIs and bare CIDs to `<gateway>/ipfs/<cid>`; http(s) URLs pass through.
pub fn resolve_ipfs_uri(uri: &str, gateway: &str) -> String {
    let uri = uri.trim();
    let gateway = gateway.trim_end_matches('/');

    if uri.is_empty() || uri.starts_with("http://") || uri.starts_with("https://") {
        return uri.to_string();
    }
    if let Some(rest) = uri.strip_prefix("ipfs://") {
        let rest = rest.strip_prefix("ipfs/").unwrap_or(rest);
        return format!("{}/ipfs/{}", gateway, rest);
    }
    if uri.starts_with("/ipfs/") {
        return format!("{}{}", gateway, uri);
    }
    let first = uri.split('/').next().unwrap_or_default();
    if is_plausible_cid(first) {
        return format!("{}/ipfs/{}", gateway, uri);
    }
    uri.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const V0: &str = "QmYwAPJzv5CZsnA625s3Xf2nemtYgPpHdWEz79ojWnPbdG";
    const V1: &str = "bafybeigdyrzt5sfp7udm7hu76uh7y26nf3efuylqabf3oclgtqy55fbzdi";

    #[test]
    fn cid_shapes() {
        assert!(is_plausible_cid(V0));
        assert!(is_plausible_cid(V1));
        assert!(!is_plausible_cid("Qm0000"));
        assert!(!is_plausible_cid("QmYwAPJzv5CZsnA625s3Xf2nemtYgPpHdWEz79ojWnPb0l"));
        assert!(!is_plausible_cid("https://example.com/a.png"));
    }

    #[test]
    fn resolves_uri_forms() {
        let gw = "https://gateway.pinata.cloud/";
        assert_eq!(resolve_ipfs_uri(&format!("ipfs://{}", V0), gw), format!("https://gateway.pinata.cloud/ipfs/{}", V0));
        assert_eq!(resolve_ipfs_uri(&format!("ipfs://ipfs/{}/a.png", V1), gw), format!("https://gateway.pinata.cloud/ipfs/{}/a.png", V1));
        assert_eq!(resolve_ipfs_uri(V0, gw), format!("https://gateway.pinata.cloud/ipfs/{}", V0));
        assert_eq!(resolve_ipfs_uri(&format!("/ipfs/{}", V0), gw), format!("https://gateway.pinata.cloud/ipfs/{}", V0));
        assert_eq!(resolve_ipfs_uri("https://cdn.example.mn/x.jpg", gw), "https://cdn.example.mn/x.jpg");
        assert_eq!(resolve_ipfs_uri("", gw), "");
        assert_eq!(resolve_ipfs_uri("placeholder.png", gw), "placeholder.png");
    }
}
