//! Account names
//!
//! Accounts are opaque `:`-separated names; the engine never builds an
//! account tree, it only needs the subaccount relation for inclusive
//! balance assertions.

use compact_str::CompactString;

/// A full account name, e.g. `assets:bank:checking`.
pub type AccountName = CompactString;

/// Is `parent` a proper prefix of `account` in the `:` hierarchy?
/// `a` is a prefix of `a:b` but not of `a` itself or of `ab`.
pub fn is_account_prefix_of(parent: &str, account: &str) -> bool {
    account.len() > parent.len() + 1
        && account.starts_with(parent)
        && account.as_bytes()[parent.len()] == b':'
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_proper_prefix() {
        assert!(is_account_prefix_of("a", "a:b"));
        assert!(is_account_prefix_of("a:b", "a:b:c"));
        assert!(is_account_prefix_of("a", "a:b:c"));
    }

    #[test]
    fn test_not_a_prefix() {
        assert!(!is_account_prefix_of("a", "a"));
        assert!(!is_account_prefix_of("a", "ab"));
        assert!(!is_account_prefix_of("a", "ab:c"));
        assert!(!is_account_prefix_of("a:b", "a"));
        assert!(!is_account_prefix_of("a", "a:"));
    }
}
