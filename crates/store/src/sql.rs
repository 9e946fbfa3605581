//! Small helpers for building statements with variable-length parameter lists.

/// Returns `n` comma separated positional placeholders, e.g. `"?, ?, ?"`.
pub fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholders_for_several_params() {
        assert_eq!(placeholders(3), "?, ?, ?");
    }

    #[test]
    fn placeholders_for_single_param() {
        assert_eq!(placeholders(1), "?");
    }

    #[test]
    fn placeholders_for_none() {
        assert_eq!(placeholders(0), "");
    }
}
