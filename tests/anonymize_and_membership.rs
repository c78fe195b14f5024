#[path = "common/mod.rs"]
mod common;

use chatreduce::{classify_membership, classify_status, Anonymizer, ReduceError, Salt};

/// Same identifier + same salt → same digest; a different salt → a different digest.
/// The digest is 40 hex chars (SHA-1) and never contains the identifier itself.
#[test]
fn anonymize_is_deterministic_and_salted() {
    let a = common::anonymizer();
    let ids = ["UC0123456789abcdef", "A", "", "日本語のID", "0000000000000000000000000000000000000000"];
    let other = Anonymizer::new(Salt::new("another-salt").unwrap());

    for id in ids {
        let h1 = a.anonymize(id);
        let h2 = a.anonymize(id);
        assert_eq!(h1, h2);
        assert_eq!(h1.len(), 40);
        assert!(h1.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(h1, other.anonymize(id), "salt must change the digest for {id:?}");
        if !id.is_empty() {
            assert!(!h1.contains(id), "digest leaks the identifier {id:?}");
        }
    }
}

/// Known value: sha1("A" + "test-salt").
#[test]
fn anonymize_hashes_identifier_then_salt() {
    use sha1::{Digest, Sha1};
    let expected = hex::encode(Sha1::digest(b"Atest-salt"));
    assert_eq!(common::anonymizer().anonymize("A"), expected);
}

#[test]
fn empty_salt_is_rejected() {
    assert!(matches!(Salt::new(""), Err(ReduceError::MissingSalt)));
}

#[test]
fn salt_debug_is_redacted() {
    let s = Salt::new("super-secret").unwrap();
    assert!(!format!("{s:?}").contains("super-secret"));
    let a = Anonymizer::new(s);
    assert!(!format!("{a:?}").contains("super-secret"));
}

/// "unknown" → None, "non-member" → false, every other string (tier labels, oddities) → true.
#[test]
fn membership_classification_is_total() {
    assert_eq!(classify_membership("unknown"), None);
    assert_eq!(classify_membership("non-member"), Some(false));
    for raw in ["tier1", "Member (6 months)", "New member", "", "UNKNOWN", "non-member ", "Non-Member"] {
        assert_eq!(classify_membership(raw), Some(true), "{raw:?} should count as a member");
    }
}

/// A null status is neither sentinel, so it classifies like a tier label.
#[test]
fn null_membership_counts_as_member() {
    assert_eq!(classify_status(None), Some(true));
    assert_eq!(classify_status(Some("unknown")), None);
    assert_eq!(classify_status(Some("non-member")), Some(false));
}
