//! MIME filter matching used during stream negotiation.

/// Filter accepting any MIME type.
pub const WILDCARD: &str = "*/*";

/// Whether `concrete` satisfies `filter`.
///
/// `filter` may be `*/*`, `type/*`, or a concrete type. Comparison is ASCII
/// case-insensitive; malformed inputs (no `/`) only match themselves exactly.
///
/// ```rust
/// use providerlink_transport::mime::matches;
///
/// assert!(matches("image/png", "image/*"));
/// assert!(matches("text/plain", "*/*"));
/// assert!(!matches("text/plain", "image/*"));
/// ```
pub fn matches(concrete: &str, filter: &str) -> bool {
    let (Some((c_type, c_sub)), Some((f_type, f_sub))) =
        (concrete.split_once('/'), filter.split_once('/'))
    else {
        return concrete.eq_ignore_ascii_case(filter);
    };

    let type_ok = f_type == "*" || f_type.eq_ignore_ascii_case(c_type);
    let sub_ok = f_sub == "*" || f_sub.eq_ignore_ascii_case(c_sub);
    type_ok && sub_ok
}

/// Keep only the entries of `available` that satisfy `filter`.
pub fn filter_types<'a, I>(available: I, filter: &str) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    available
        .into_iter()
        .filter(|candidate| matches(candidate, filter))
        .map(str::to_string)
        .collect()
}
