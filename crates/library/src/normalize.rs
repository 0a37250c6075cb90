//! Text normalization for file names and fuzzy comparisons.
//!
//! Both functions are pure and total: any input, including the empty string,
//! produces an output and the same input always produces the same output.

/// Turns free text into a filesystem-safe token.
///
/// Letters, digits and `-` are kept as-is. Every run of other characters
/// becomes a single `_`, and leading/trailing underscores are trimmed. Periods
/// survive only *between* kept characters (`v1.5`); a period that touches a
/// replaced run or either end of the text is swallowed by it, so
/// `"A. Author"` becomes `A_Author` rather than `A._Author`.
///
/// ```
/// use shelf_library::canonicalize;
///
/// assert_eq!(canonicalize("A. Author"), "A_Author");
/// assert_eq!(canonicalize("The Great Test: Part 2"), "The_Great_Test_Part_2");
/// assert_eq!(canonicalize("Release v1.5"), "Release_v1.5");
/// assert_eq!(canonicalize(""), "");
/// ```
pub fn canonicalize(text: &str) -> String {
    let mut token = String::with_capacity(text.len());
    // Characters seen since the last kept character, and whether that run
    // holds anything other than periods.
    let mut run = String::new();
    let mut separator = false;
    for c in text.chars() {
        if c.is_alphanumeric() || c == '-' {
            if !run.is_empty() {
                if separator || token.is_empty() {
                    token.push('_');
                } else {
                    token.push_str(&run);
                }
                run.clear();
                separator = false;
            }
            token.push(c);
        } else {
            separator |= c != '.';
            run.push(c);
        }
    }
    // A trailing run always touches the end of the text; drop it.
    token.trim_matches('_').to_string()
}

/// Projects text onto lowercase letters and digits only.
///
/// Used solely for equality and containment tests, never for display or
/// file names.
///
/// ```
/// use shelf_library::comparison_key;
///
/// assert_eq!(comparison_key("The Great Test!"), "thegreattest");
/// assert_eq!(comparison_key("A_Author_The_Great_Test"), "aauthorthegreattest");
/// ```
pub fn comparison_key(text: &str) -> String {
    text.chars().flat_map(char::to_lowercase).filter(|c| c.is_alphanumeric()).collect()
}
