//! Broker-safe type identifiers.
//!
//! Consumers route and deserialize by the `type` property of a published
//! frame. A fully qualified type descriptor looks like
//!
//! ```text
//! MyApp.Envelope`1[[MyApp.OrderCreated, MyApp, Version=1.0.0.0, Culture=neutral, PublicKeyToken=null]], MyApp, Version=1.0.0.0, Culture=neutral, PublicKeyToken=null
//! ```
//!
//! The version/culture/token suffix changes on every rebuild of the publishing
//! service even when the payload shape does not, and the whole descriptor
//! easily exceeds the 255 byte limit of an AMQP short string. [`normalize`]
//! strips that suffix from every segment, at every nesting level:
//!
//! ```text
//! MyApp.Envelope`1[[MyApp.OrderCreated, MyApp]], MyApp
//! ```

/// Start of the unstable assembly metadata of a type segment.
const VERSION_MARKER: &str = ", Version";

/// Closes the argument list of a generic type.
const GENERIC_CLOSE: &str = "]]";

/// Separates two arguments of a generic type.
const ARGUMENT_SEPARATOR: &str = "],[";

/// Maximum length in bytes of the AMQP `type` property.
pub const MAX_TYPE_HEADER_LEN: usize = 255;

/// Strips version metadata from a qualified type descriptor.
///
/// Scans left to right. For each segment, everything from `", Version"` up to
/// the next generic boundary is dropped; the scan then resumes at that
/// boundary. A descriptor without any version marker is returned unchanged.
///
/// ```
/// use exchange_publisher::normalize;
///
/// assert_eq!(
///     normalize("MyApp.OrderCreated, MyApp, Version=1.0.0.0, Culture=neutral, PublicKeyToken=null"),
///     "MyApp.OrderCreated, MyApp",
/// );
/// assert_eq!(normalize("my_app::OrderCreated"), "my_app::OrderCreated");
/// ```
pub fn normalize(qualified_type_name: &str) -> String {
    let mut normalized = String::with_capacity(qualified_type_name.len());
    let mut offset = 0;

    loop {
        let Some(version) = find_marker(qualified_type_name, VERSION_MARKER, offset + 1) else {
            // Nothing unstable left in this segment.
            normalized.push_str(&qualified_type_name[offset..]);
            break;
        };

        normalized.push_str(&qualified_type_name[offset..version]);

        match next_boundary(qualified_type_name, version) {
            Some(boundary) => offset = boundary,
            None => break,
        }
    }

    normalized
}

/// Nearest generic boundary (`]]` or `],[`) at or after `from`.
fn next_boundary(haystack: &str, from: usize) -> Option<usize> {
    let close = find_marker(haystack, GENERIC_CLOSE, from);
    let separator = find_marker(haystack, ARGUMENT_SEPARATOR, from);

    match (close, separator) {
        (Some(close), Some(separator)) => Some(close.min(separator)),
        (close, separator) => close.or(separator),
    }
}

/// Byte offset of `marker` in `haystack`, searching from `from`.
///
/// Markers are ASCII, so any offset returned is a char boundary.
fn find_marker(haystack: &str, marker: &str, from: usize) -> Option<usize> {
    haystack
        .as_bytes()
        .get(from..)?
        .windows(marker.len())
        .position(|window| window == marker.as_bytes())
        .map(|position| position + from)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SUFFIX: &str = "Version=1.0.0.0, Culture=neutral, PublicKeyToken=null";

    #[test]
    fn unqualified_name_is_unchanged() {
        assert_eq!(normalize("MyApp.OrderCreated"), "MyApp.OrderCreated");
        assert_eq!(
            normalize("my_app::Envelope<my_app::OrderCreated>"),
            "my_app::Envelope<my_app::OrderCreated>"
        );
        assert_eq!(normalize(""), "");
    }

    #[test]
    fn flat_name_keeps_text_before_version() {
        let name = format!("MyApp.OrderCreated, MyApp, {SUFFIX}");
        assert_eq!(normalize(&name), "MyApp.OrderCreated, MyApp");
    }

    #[test]
    fn flat_descriptor_keeps_assembly_name() {
        assert_eq!(
            normalize(
                "MyApp.OrderCreated, MyApp, Version=1.0.0.0, Culture=neutral, PublicKeyToken=null"
            ),
            "MyApp.OrderCreated, MyApp"
        );
    }

    #[test]
    fn single_generic_argument() {
        let name = format!(
            "MyApp.Envelope`1[[MyApp.OrderCreated, MyApp.Orders, {SUFFIX}]], MyApp, {SUFFIX}"
        );
        assert_eq!(
            normalize(&name),
            "MyApp.Envelope`1[[MyApp.OrderCreated, MyApp.Orders]], MyApp"
        );
    }

    #[test]
    fn doubly_nested_generic_strips_every_level() {
        let name = format!(
            "Outer`1[[Middle`1[[Inner, Inner.Asm, Version=3.0.0.0, Culture=neutral, PublicKeyToken=null]], Middle.Asm, Version=2.1.0.0, Culture=neutral, PublicKeyToken=abc]], Outer.Asm, {SUFFIX}"
        );
        assert_eq!(
            normalize(&name),
            "Outer`1[[Middle`1[[Inner, Inner.Asm]], Middle.Asm]], Outer.Asm"
        );
    }

    #[test]
    fn builds_with_different_versions_normalize_identically() {
        let v1 = "Outer`1[[Inner, Asm, Version=1.0.0.0, Culture=neutral, PublicKeyToken=null]], Asm, Version=1.0.0.0, Culture=neutral, PublicKeyToken=null";
        let v2 = "Outer`1[[Inner, Asm, Version=1.4.2.0, Culture=neutral, PublicKeyToken=null]], Asm, Version=1.4.2.0, Culture=neutral, PublicKeyToken=null";
        assert_eq!(normalize(v1), normalize(v2));
    }

    #[test]
    fn every_generic_argument_is_kept() {
        let name = format!(
            "Pair`2[[Key, Keys, {SUFFIX}],[Value, Values, {SUFFIX}]], Pairs, {SUFFIX}"
        );
        assert_eq!(normalize(&name), "Pair`2[[Key, Keys],[Value, Values]], Pairs");
    }

    #[test]
    fn unversioned_outer_type_keeps_closing_brackets() {
        let name = format!("Outer[[Inner, Asm, {SUFFIX}]]");
        assert_eq!(normalize(&name), "Outer[[Inner, Asm]]");
    }

    #[test]
    fn non_ascii_names_are_handled() {
        let name = format!("Café.Commande, Café, {SUFFIX}");
        assert_eq!(normalize(&name), "Café.Commande, Café");
    }

    #[test]
    fn normalized_header_fits_short_string() {
        let inner = format!("Some.Rather.Long.Namespace.Inner, Some.Rather.Long.Assembly, {SUFFIX}");
        let name = format!(
            "Some.Rather.Long.Namespace.Outer`1[[Some.Rather.Long.Namespace.Middle`1[[{inner}]], Some.Rather.Long.Assembly, {SUFFIX}]], Some.Rather.Long.Assembly, {SUFFIX}"
        );
        assert!(name.len() > MAX_TYPE_HEADER_LEN);
        assert!(normalize(&name).len() <= MAX_TYPE_HEADER_LEN);
    }
}
