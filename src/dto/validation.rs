//! Validation helpers for DTOs.

use validator::ValidationError;

/// Longest clue a host may attach to a game.
pub const CLUE_MAX_CHARS: usize = 280;

/// Longest justification a player may attach to a guess.
pub const JUSTIFICATION_MAX_CHARS: usize = 500;

/// Validates that a clue is non-blank and within the length bound.
pub fn validate_clue(clue: &str) -> Result<(), ValidationError> {
    if clue.trim().is_empty() {
        let mut err = ValidationError::new("clue_blank");
        err.message = Some("Clue must not be blank".into());
        return Err(err);
    }

    let chars = clue.chars().count();
    if chars > CLUE_MAX_CHARS {
        let mut err = ValidationError::new("clue_length");
        err.message = Some(
            format!("Clue must be at most {CLUE_MAX_CHARS} characters (got {chars})").into(),
        );
        return Err(err);
    }

    Ok(())
}

/// Validates that a justification stays within the length bound.
pub fn validate_justification(justification: &str) -> Result<(), ValidationError> {
    let chars = justification.chars().count();
    if chars > JUSTIFICATION_MAX_CHARS {
        let mut err = ValidationError::new("justification_length");
        err.message = Some(
            format!(
                "Justification must be at most {JUSTIFICATION_MAX_CHARS} characters (got {chars})"
            )
            .into(),
        );
        return Err(err);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_clue_valid() {
        assert!(validate_clue("A spicy clue").is_ok());
        assert!(validate_clue(&"x".repeat(CLUE_MAX_CHARS)).is_ok());
    }

    #[test]
    fn test_validate_clue_blank() {
        assert!(validate_clue("").is_err());
        assert!(validate_clue("   ").is_err());
        assert!(validate_clue("\t\n").is_err());
    }

    #[test]
    fn test_validate_clue_too_long() {
        assert!(validate_clue(&"x".repeat(CLUE_MAX_CHARS + 1)).is_err());
    }

    #[test]
    fn test_validate_justification_bounds() {
        assert!(validate_justification("vibes").is_ok());
        assert!(validate_justification("").is_ok());
        assert!(validate_justification(&"y".repeat(JUSTIFICATION_MAX_CHARS + 1)).is_err());
    }
}
