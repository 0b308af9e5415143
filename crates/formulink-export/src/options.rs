//! Export configuration.

use serde::{Deserialize, Serialize};

/// What to do with a target cell whose formula failed to convert.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorHandling {
    /// Write the last computed value in place of the formula.
    #[default]
    Preserve,
    /// Leave the cell untouched.
    Skip,
    /// Abort the whole export; no output file is produced.
    Fail,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportOptions {
    /// Append a `_Export_Metadata` sheet with run info and the error table.
    pub include_metadata_sheet: bool,
    /// Under [`ErrorHandling::Preserve`], actually write cached values.
    /// Turning this off leaves failed cells blank while keeping the
    /// preserve accounting.
    pub preserve_values_on_error: bool,
    /// Re-open the saved file and sanity-check every written formula, and
    /// run the cycle search over the session's dependency graph.
    pub auto_validate: bool,
    pub error_handling: ErrorHandling,
    /// Emit `'[<path>]<sheet>'!A1` for references into the source workbook.
    pub use_absolute_external_paths: bool,
    /// Record a per-cell note for every fallback value on the metadata
    /// sheet.
    pub add_inline_comments: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            include_metadata_sheet: true,
            preserve_values_on_error: true,
            auto_validate: true,
            error_handling: ErrorHandling::Preserve,
            use_absolute_external_paths: false,
            add_inline_comments: false,
        }
    }
}

impl ExportOptions {
    pub fn with_error_handling(mut self, mode: ErrorHandling) -> Self {
        self.error_handling = mode;
        self
    }

    pub fn with_metadata_sheet(mut self, on: bool) -> Self {
        self.include_metadata_sheet = on;
        self
    }

    pub fn with_auto_validate(mut self, on: bool) -> Self {
        self.auto_validate = on;
        self
    }

    pub fn with_absolute_external_paths(mut self, on: bool) -> Self {
        self.use_absolute_external_paths = on;
        self
    }

    pub fn with_inline_comments(mut self, on: bool) -> Self {
        self.add_inline_comments = on;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_preserve_with_metadata() {
        let options = ExportOptions::default();
        assert_eq!(options.error_handling, ErrorHandling::Preserve);
        assert!(options.include_metadata_sheet);
        assert!(options.auto_validate);
        assert!(!options.use_absolute_external_paths);
    }

    #[test]
    fn serde_round_trip_uses_snake_case_modes() {
        let json = serde_json::to_string(&ExportOptions::default().with_error_handling(ErrorHandling::Fail))
            .unwrap();
        assert!(json.contains("\"fail\""));
        let back: ExportOptions = serde_json::from_str(&json).unwrap();
        assert_eq!(back.error_handling, ErrorHandling::Fail);
    }

    #[test]
    fn partial_json_fills_defaults() {
        let parsed: ExportOptions = serde_json::from_str(r#"{"error_handling":"skip"}"#).unwrap();
        assert_eq!(parsed.error_handling, ErrorHandling::Skip);
        assert!(parsed.include_metadata_sheet);
    }
}
