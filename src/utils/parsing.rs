/// Parsing helpers for the routing service's text formats
pub struct ParsingUtils;

impl ParsingUtils {
    /// Extract the route string from the contents of a `.spf` way file.
    ///
    /// The route lives on the second-to-last line, after the last `=`, wrapped in one
    /// delimiter character on each side (`Route=XAIRWAYX` yields `AIRWAY`). This mirrors
    /// the routing service's current output exactly and breaks if that format changes.
    /// Returns an empty string when nothing usable is found.
    pub fn extract_airway(content: &str) -> String {
        let lines: Vec<&str> = content.lines().collect();
        if lines.len() < 2 {
            return String::new();
        }

        let line = lines[lines.len() - 2];
        let value = line.rsplit('=').next().unwrap_or_default();
        Self::strip_outer_chars(value)
    }

    /// Drop the first and last character (char-aware).
    fn strip_outer_chars(value: &str) -> String {
        let mut chars = value.chars();
        chars.next();
        chars.next_back();
        chars.as_str().to_string()
    }

    /// Airport codes are 4 ASCII letters
    pub fn is_icao_code(code: &str) -> bool {
        code.len() == 4 && code.chars().all(|c| c.is_ascii_alphabetic())
    }
}
