pub const UNKNOWN: &str = "unknown";
pub const NON_MEMBER: &str = "non-member";

/// Collapse a raw membership status into member / non-member / unknown.
/// Total over all strings: any tier label counts as an active membership.
pub fn classify_membership(raw: &str) -> Option<bool> {
    match raw {
        UNKNOWN => None,
        NON_MEMBER => Some(false),
        _ => Some(true),
    }
}

/// Like [`classify_membership`], over a nullable column value. A null status is not one of the
/// two sentinels, so it counts as a member.
pub fn classify_status(raw: Option<&str>) -> Option<bool> {
    raw.map_or(Some(true), classify_membership)
}

#[inline]
pub fn is_member(raw: Option<&str>) -> bool {
    classify_status(raw) == Some(true)
}
