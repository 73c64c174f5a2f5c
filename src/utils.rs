//! Numeric helpers shared by the solver and the preview.

pub mod polynomial;
pub mod safe_cast;
