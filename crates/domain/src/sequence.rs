//! Default display names: "New X", "New X (2)", "New X (3)", ...
//!
//! The next name is always computed from the names currently in the table,
//! never from a counter. Renaming every default-named row therefore resets
//! the sequence to the bare base name.

use sqlx::SqliteConnection;

use crate::Result;

/// Base name for warehouses.
pub const WAREHOUSE_BASE_NAME: &str = "New Warehouse";

/// Base name for inbound and outbound notes.
pub const NOTE_BASE_NAME: &str = "New Note";

/// Returns the sequence number of `name` if it follows the default pattern.
///
/// `"New X"` is number 1, `"New X (N)"` is number N; anything else is `None`.
fn sequence_number(base: &str, name: &str) -> Option<u64> {
    let rest = name.strip_prefix(base)?;
    if rest.is_empty() {
        return Some(1);
    }

    let digits = rest.strip_prefix(" (")?.strip_suffix(')')?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Computes the next default name given the names already taken.
pub fn next_sequence_name<'a>(base: &str, existing: impl IntoIterator<Item = &'a str>) -> String {
    let highest = existing
        .into_iter()
        .filter_map(|name| sequence_number(base, name))
        .max();

    match highest {
        None => base.to_string(),
        Some(n) => format!("{base} ({})", n + 1),
    }
}

/// Reads candidate names with `query` and returns the next one for `base`.
///
/// `query` must select a single `display_name` column and take two
/// parameters: the exact base name and a `LIKE` pattern for numbered names.
pub(crate) async fn next_name(
    conn: &mut SqliteConnection,
    query: &str,
    base: &str,
) -> Result<String> {
    let names: Vec<String> = sqlx::query_scalar(query)
        .bind(base)
        .bind(format!("{base} (%)"))
        .fetch_all(&mut *conn)
        .await?;

    Ok(next_sequence_name(base, names.iter().map(String::as_str)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_name_is_the_base() {
        assert_eq!(next_sequence_name("New Note", []), "New Note");
    }

    #[test]
    fn bare_base_is_followed_by_two() {
        assert_eq!(next_sequence_name("New Note", ["New Note"]), "New Note (2)");
    }

    #[test]
    fn follows_the_highest_number() {
        let names = ["New Note (3)", "New Note", "New Note (10)", "New Note (9)"];
        assert_eq!(next_sequence_name("New Note", names), "New Note (11)");
    }

    #[test]
    fn ignores_renamed_and_foreign_names() {
        let names = ["Spring delivery", "New Notebook", "New Note (x)", "New Note ()"];
        assert_eq!(next_sequence_name("New Note", names), "New Note");
    }

    #[test]
    fn numbered_name_without_bare_base_still_counts() {
        assert_eq!(
            next_sequence_name("New Warehouse", ["New Warehouse (4)"]),
            "New Warehouse (5)"
        );
    }

    #[test]
    fn sequence_number_parsing() {
        assert_eq!(sequence_number("New X", "New X"), Some(1));
        assert_eq!(sequence_number("New X", "New X (7)"), Some(7));
        assert_eq!(sequence_number("New X", "New X (7) copy"), None);
        assert_eq!(sequence_number("New X", "Old X (7)"), None);
    }
}
