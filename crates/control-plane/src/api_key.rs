//! Constant-time API key comparison for the HTTP transport's security
//! gate (spec.md §4.8). Lives in the control plane since it is the same
//! kind of cross-cutting, every-request concern as rate limiting and
//! auditing.

use subtle::ConstantTimeEq;

/// Holds the configured key list; never logs a presented key, only a
/// short digest, to avoid leaking secrets into the audit trail.
pub struct ApiKeyGate {
    keys: Vec<String>,
}

impl ApiKeyGate {
    pub fn new(keys: Vec<String>) -> Self {
        Self { keys }
    }

    pub fn is_configured(&self) -> bool {
        !self.keys.is_empty()
    }

    /// `true` iff `presented` matches one configured key, compared in
    /// constant time against each candidate so the total running time
    /// doesn't leak which (if any) key nearly matched.
    pub fn verify(&self, presented: &str) -> bool {
        let presented_bytes = presented.as_bytes();
        let mut any_match = subtle::Choice::from(0u8);
        for key in &self.keys {
            any_match |= key.as_bytes().ct_eq(presented_bytes);
        }
        any_match.into()
    }

    /// A short, non-reversible fingerprint for audit logging — never the
    /// raw key (spec.md §4.8 rule 4).
    pub fn digest(presented: &str) -> String {
        let mut hash: u64 = 0xcbf29ce484222325;
        for byte in presented.as_bytes() {
            hash ^= *byte as u64;
            hash = hash.wrapping_mul(0x100000001b3);
        }
        format!("{hash:016x}")[..8].to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matching_key_verifies() {
        let gate = ApiKeyGate::new(vec!["secret-1".to_string(), "secret-2".to_string()]);
        assert!(gate.verify("secret-2"));
    }

    #[test]
    fn non_matching_key_is_rejected() {
        let gate = ApiKeyGate::new(vec!["secret-1".to_string()]);
        assert!(!gate.verify("wrong"));
    }

    #[test]
    fn empty_key_list_is_unconfigured() {
        let gate = ApiKeyGate::new(vec![]);
        assert!(!gate.is_configured());
        assert!(!gate.verify("anything"));
    }

    #[test]
    fn digest_is_stable_and_short() {
        let a = ApiKeyGate::digest("my-key");
        let b = ApiKeyGate::digest("my-key");
        assert_eq!(a, b);
        assert_eq!(a.len(), 8);
    }
}
