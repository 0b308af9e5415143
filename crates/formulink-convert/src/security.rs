//! Injection screening, coordinate bounds, and output-path validation.
//!
//! Literals extracted from user-authored formulas end up inside generated
//! spreadsheet formulas, so anything that a spreadsheet application would
//! execute (DDE command launches, UNC fetches) is rejected outright, and
//! text that merely *starts* like a formula is neutralized with a leading
//! quote.

use std::borrow::Cow;
use std::path::{Component, Path, PathBuf};

use formulink_common::{CellCoord, CoordError};
use once_cell::sync::Lazy;
use regex::Regex;

/// Rejected literal patterns: DDE command execution and UNC paths.
static INJECTION_PATTERNS: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    vec![
        ("dde_cmd", compile(r"(?i)=\s*cmd\s*\|")),
        ("dde_generic", compile(r"(?i)=\s*dde\s*\|")),
        ("sum_cmd", compile(r"(?i)@SUM\([^)]*cmd[^)]*\)")),
        ("unc_path", compile(r#"\\\\[\w.$-]+\\[\w.$-]+"#)),
    ]
});

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("static pattern")
}

/// First characters a spreadsheet treats as the start of a formula.
const FORMULA_LEADS: &[char] = &['=', '+', '-', '@', '\t', '\r', '\n'];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SecurityError {
    #[error("injection pattern '{pattern}' in literal {literal:?}")]
    Injection {
        pattern: &'static str,
        literal: String,
    },
}

/// Screen a literal for injection payloads; quote-prefix it when it would
/// otherwise be interpreted as a formula.
pub fn sanitize_literal(text: &str) -> Result<Cow<'_, str>, SecurityError> {
    for (name, pattern) in INJECTION_PATTERNS.iter() {
        if pattern.is_match(text) {
            return Err(SecurityError::Injection {
                pattern: name,
                literal: text.to_string(),
            });
        }
    }
    match text.chars().next() {
        Some(first) if FORMULA_LEADS.contains(&first) => Ok(Cow::Owned(format!("'{text}"))),
        _ => Ok(Cow::Borrowed(text)),
    }
}

/// Parse an A1 address and check it against the sheet limits.
pub fn validate_bounds(a1: &str) -> Result<CellCoord, CoordError> {
    CellCoord::parse_a1(a1)
}

#[derive(Debug, thiserror::Error)]
pub enum PathError {
    #[error("path contains an illegal character: {0:?}")]
    IllegalCharacter(String),
    #[error("path contains a parent-directory component: {0:?}")]
    Traversal(String),
    #[error("path has no file name: {0:?}")]
    MissingFileName(String),
    #[error("path escapes the allowed root {root:?}: {path:?}")]
    OutsideRoot { path: PathBuf, root: PathBuf },
    #[error("path could not be resolved: {0}")]
    Io(#[from] std::io::Error),
}

/// Validate an output path: no traversal, no shell-hostile characters, and
/// the (resolved) destination must stay under `allowed_root`. Returns the
/// resolved absolute path to write to.
pub fn validate_output_path(path: &Path, allowed_root: &Path) -> Result<PathBuf, PathError> {
    let display = path.to_string_lossy();
    if display.contains(['<', '>', '|', '\0']) {
        return Err(PathError::IllegalCharacter(display.into_owned()));
    }
    if path
        .components()
        .any(|c| matches!(c, Component::ParentDir))
    {
        return Err(PathError::Traversal(display.into_owned()));
    }
    let file_name = path
        .file_name()
        .ok_or_else(|| PathError::MissingFileName(display.clone().into_owned()))?
        .to_os_string();

    let root = allowed_root.canonicalize()?;
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    };
    // The file itself may not exist yet; resolve through its directory.
    let parent = joined.parent().map(Path::to_path_buf).unwrap_or_else(|| root.clone());
    let parent = parent.canonicalize()?;
    if !parent.starts_with(&root) {
        return Err(PathError::OutsideRoot {
            path: joined,
            root,
        });
    }
    Ok(parent.join(file_name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use formulink_common::{COL_LIMIT, ROW_LIMIT, column_to_letters};

    #[test]
    fn formula_leads_get_quoted() {
        for lead in ["=A1", "+100", "-100", "@sum"] {
            let out = sanitize_literal(lead).unwrap();
            assert_eq!(out, format!("'{lead}"), "{lead}");
        }
        assert_eq!(sanitize_literal("净利润").unwrap(), "净利润");
        assert_eq!(sanitize_literal("").unwrap(), "");
    }

    #[test]
    fn dde_and_unc_are_rejected() {
        for bad in [
            "=cmd|'/c calc'!A1",
            "=CMD|notepad",
            "=dde|launch",
            "@SUM(1+cmd)",
            r"\\attacker\share\x",
        ] {
            assert!(matches!(
                sanitize_literal(bad),
                Err(SecurityError::Injection { .. })
            ), "{bad}");
        }
    }

    #[test]
    fn bounds_accept_limits_reject_past_them() {
        assert!(validate_bounds("A1").is_ok());
        let last = format!("{}{}", column_to_letters(COL_LIMIT), ROW_LIMIT);
        assert!(validate_bounds(&last).is_ok());
        assert!(validate_bounds(&format!("A{}", ROW_LIMIT as u64 + 1)).is_err());
        assert!(validate_bounds("XFE1").is_err());
        assert!(validate_bounds("not-a-cell").is_err());
    }

    #[test]
    fn traversal_and_specials_rejected() {
        let root = std::env::temp_dir();
        assert!(matches!(
            validate_output_path(Path::new("../out.xlsx"), &root),
            Err(PathError::Traversal(_))
        ));
        assert!(matches!(
            validate_output_path(Path::new("out|.xlsx"), &root),
            Err(PathError::IllegalCharacter(_))
        ));
    }

    #[test]
    fn relative_path_resolves_under_root() {
        let root = std::env::temp_dir();
        let resolved = validate_output_path(Path::new("out.xlsx"), &root).unwrap();
        assert!(resolved.starts_with(root.canonicalize().unwrap()));
        assert_eq!(resolved.file_name().unwrap(), "out.xlsx");
    }
}
