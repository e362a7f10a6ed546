// ============================================================================
// Order Validation Errors
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("required field is empty: {0}")]
    MissingField(&'static str),

    #[error("field {field} is malformed: {reason}")]
    Malformed {
        field: &'static str,
        reason: &'static str,
    },

    #[error("amount {field} must not be negative, got {value}")]
    NegativeAmount { field: &'static str, value: i32 },
}
