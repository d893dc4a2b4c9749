// ABOUTME: Guards values that get spliced into comma-joined mount option strings.
// ABOUTME: Rejects paths carrying characters the option encoding cannot represent.

use crate::error::ValidationError;

pub const FORBIDDEN_CHARS: &str = "\\,:\" ";

/// Reject `value` if it contains any of [`FORBIDDEN_CHARS`]. `label` names the
/// option the value was destined for.
pub fn check_forbidden(value: &str, label: &'static str) -> Result<(), ValidationError> {
    if value.contains(|c: char| FORBIDDEN_CHARS.contains(c)) {
        return Err(ValidationError::ForbiddenCharacters {
            label,
            value: value.to_string(),
            forbidden: FORBIDDEN_CHARS,
        });
    }
    Ok(())
}
