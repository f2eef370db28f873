/// Normalize a field (or table) name into a column-safe identifier.
///
/// Lowercases, drops every character that is not `a-z`, a space or an underscore, then replaces
/// spaces with underscores. Digits and punctuation are removed, so `"Q3 Revenue ($)"` becomes
/// `"q_revenue_"`. Underscores survive so that an already-normalized name maps to itself.
///
/// The function is idempotent. Distinct inputs may collide (`"A-B"` and `"AB"` both become
/// `"ab"`); collisions are not detected.
pub fn normalize_field_name(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_lowercase() || *c == ' ' || *c == '_')
        .map(|c| if c == ' ' { '_' } else { c })
        .collect()
}
