//! SQL identifier checks
//!
//! Table names end up interpolated into SQL text, so they are restricted to
//! `name` or `schema.name` built from ASCII letters, digits and underscores.

use crate::error::WarehouseError;
use eyre::Result;
use regex::Regex;
use std::sync::LazyLock;

static IDENTIFIER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)?$")
        .expect("identifier pattern is valid")
});

/// Reject anything that is not a plain or schema-qualified identifier
pub fn validate_identifier(name: &str) -> Result<()> {
    if IDENTIFIER.is_match(name) {
        Ok(())
    } else {
        Err(WarehouseError::Validation(format!("invalid table identifier '{}'", name)).into())
    }
}

/// Validate and double-quote each part of an identifier
pub fn quote_identifier(name: &str) -> Result<String> {
    validate_identifier(name)?;
    Ok(name
        .split('.')
        .map(|part| format!("\"{}\"", part))
        .collect::<Vec<_>>()
        .join("."))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_identifiers() {
        for name in ["customers", "raw.customers", "_tmp", "Orders_2024"] {
            assert!(validate_identifier(name).is_ok(), "{}", name);
        }
    }

    #[test]
    fn test_invalid_identifiers() {
        for name in [
            "",
            "1table",
            "a.b.c",
            "users; DROP TABLE x",
            "raw.",
            "na-me",
        ] {
            assert!(validate_identifier(name).is_err(), "{}", name);
        }
    }

    #[test]
    fn test_quote() {
        assert_eq!(quote_identifier("raw.orders").unwrap(), "\"raw\".\"orders\"");
        assert!(quote_identifier("bad name").is_err());
    }
}
