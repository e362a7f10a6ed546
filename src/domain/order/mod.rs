// ============================================================================
// Order Domain
// ============================================================================
//
// - Value objects (Delivery, Payment, Item)
// - Order aggregate with validation rules
// - Validation errors
//
// ============================================================================

pub mod errors;
pub mod aggregate;
pub mod sample;
pub mod value_objects;

pub use errors::*;
pub use aggregate::*;
pub use sample::{sample_order, sample_variant};
pub use value_objects::*;
