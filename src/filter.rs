//! Recipient gate applied before parsing

/// Whether `raw` looks addressed to `address`.
///
/// True when the text contains `To: <address>` literally or the address in
/// angle brackets anywhere. This is plain substring containment, so an
/// address quoted in a forwarded reply also matches. Bare occurrences of the
/// address do not.
#[must_use]
pub fn is_addressed_to(raw: &str, address: &str) -> bool {
    raw.contains(&format!("To: {address}")) || raw.contains(&format!("<{address}>"))
}
