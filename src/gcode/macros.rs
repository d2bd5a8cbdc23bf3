//! Placeholder substitution for custom G-code scripts.
//!
//! Custom start/end and per-layer scripts may reference variables in square
//! brackets (`[layer_num]`, `[layer_z]`, ...). The processor replaces known
//! placeholders and leaves unknown text untouched; the engine sets the
//! per-layer variables before each expansion.

use std::collections::HashMap;
use std::fmt::Display;

use chrono::Local;

/// Expands `[variable]` placeholders in custom script text.
#[derive(Debug, Default, Clone)]
pub struct PlaceholderParser {
    vars: HashMap<String, String>,
}

impl PlaceholderParser {
    pub fn new() -> Self {
        let mut parser = Self::default();
        parser.set("version", env!("CARGO_PKG_VERSION"));
        parser
    }

    /// Set a variable to any displayable value.
    pub fn set(&mut self, key: impl Into<String>, value: impl Display) {
        self.vars.insert(key.into(), value.to_string());
    }

    /// Refresh the timestamp variables to the current local time.
    pub fn update_timestamp(&mut self) {
        let now = Local::now();
        self.set("timestamp", now.format("%Y%m%d-%H%M%S"));
        self.set("year", now.format("%Y"));
        self.set("month", now.format("%m"));
        self.set("day", now.format("%d"));
        self.set("hour", now.format("%H"));
        self.set("minute", now.format("%M"));
        self.set("second", now.format("%S"));
    }

    /// Expand all known placeholders in a script.
    pub fn process(&self, script: &str) -> String {
        let mut out = String::with_capacity(script.len());
        let mut rest = script;
        while let Some(open) = rest.find('[') {
            out.push_str(&rest[..open]);
            match rest[open + 1..].find(']') {
                Some(close) => {
                    let key = &rest[open + 1..open + 1 + close];
                    match self.vars.get(key) {
                        Some(value) => out.push_str(value),
                        // unknown placeholder: leave the brackets in place
                        None => out.push_str(&rest[open..open + close + 2]),
                    }
                    rest = &rest[open + close + 2..];
                }
                None => {
                    out.push_str(&rest[open..]);
                    rest = "";
                }
            }
        }
        out.push_str(rest);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_placeholder_is_replaced() {
        let mut parser = PlaceholderParser::new();
        parser.set("layer_num", 3);
        parser.set("layer_z", 0.6);
        assert_eq!(
            parser.process("M117 layer [layer_num] at [layer_z]mm"),
            "M117 layer 3 at 0.6mm"
        );
    }

    #[test]
    fn test_unknown_placeholder_left_intact() {
        let parser = PlaceholderParser::new();
        assert_eq!(parser.process("G1 [no_such_var] X0"), "G1 [no_such_var] X0");
    }

    #[test]
    fn test_unterminated_bracket() {
        let parser = PlaceholderParser::new();
        assert_eq!(parser.process("M117 [oops"), "M117 [oops");
    }

    #[test]
    fn test_timestamp_is_set() {
        let mut parser = PlaceholderParser::new();
        parser.update_timestamp();
        assert!(!parser.process("[timestamp]").contains('['));
    }
}
