//! Which inbound paths need a signed transaction, and how many nonces they use.

/// Nonces consumed by a request path; 0 means plain pass-through.
pub fn sign_weight(path: &str) -> u64 {
    match path {
        // Staking deposits submit an approval and a deposit.
        "/staking/deposit" => 2,
        "/relay/withdrawal" | "/relay/deposit" => 1,
        _ if path.starts_with("/bounties/")
            && (path.ends_with("/vote") || path.ends_with("/settle")) =>
        {
            1
        }
        _ => 0,
    }
}
