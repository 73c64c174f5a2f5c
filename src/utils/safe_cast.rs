//! Checked numeric conversions for pixel coordinates and frame sizes

use crate::{Error, Result};

/// Safely convert u32 to usize with overflow checking
///
/// # Errors
///
/// Returns an error if the value does not fit in usize on this target
pub fn u32_to_usize(value: u32) -> Result<usize> {
    value
        .try_into()
        .map_err(|_| Error::InvalidInput(format!("Value {value} too large to fit in usize")))
}

/// Round f64 to the nearest i64, rejecting non-finite or out of range values
#[must_use]
#[allow(clippy::cast_possible_truncation)] // Range checked before the cast
#[allow(clippy::cast_precision_loss)] // i64 bounds are only approximate in f64
pub fn f64_to_i64_round(value: f64) -> Option<i64> {
    let rounded = value.round();
    if rounded.is_finite() && rounded >= i64::MIN as f64 && rounded < i64::MAX as f64 {
        Some(rounded as i64)
    } else {
        None
    }
}

/// Turn a signed coordinate into an index below `len`
#[must_use]
pub fn checked_index(coordinate: i64, len: usize) -> Option<usize> {
    usize::try_from(coordinate).ok().filter(|&index| index < len)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_u32_to_usize() {
        assert_eq!(u32_to_usize(42).unwrap(), 42);
        assert_eq!(u32_to_usize(0).unwrap(), 0);
        assert_eq!(u32_to_usize(u32::MAX).unwrap(), u32::MAX as usize);
    }

    #[test]
    fn test_f64_to_i64_round() {
        assert_eq!(f64_to_i64_round(41.6), Some(42));
        assert_eq!(f64_to_i64_round(-41.6), Some(-42));
        assert_eq!(f64_to_i64_round(0.49), Some(0));

        assert_eq!(f64_to_i64_round(f64::NAN), None);
        assert_eq!(f64_to_i64_round(f64::INFINITY), None);
        assert_eq!(f64_to_i64_round(f64::NEG_INFINITY), None);
        assert_eq!(f64_to_i64_round(1e300), None);
    }

    #[test]
    fn test_checked_index() {
        assert_eq!(checked_index(0, 10), Some(0));
        assert_eq!(checked_index(9, 10), Some(9));
        assert_eq!(checked_index(10, 10), None);
        assert_eq!(checked_index(-1, 10), None);
        assert_eq!(checked_index(0, 0), None);
    }

    // Property-based tests
    proptest! {
        #[test]
        fn prop_f64_to_i64_round_preserves_integers(value in -1_000_000_000i64..1_000_000_000i64) {
            #[allow(clippy::cast_precision_loss)]
            let as_f64 = value as f64;
            prop_assert_eq!(f64_to_i64_round(as_f64), Some(value));
        }

        #[test]
        fn prop_checked_index_within_bounds(coordinate in any::<i64>(), len in 0usize..10_000) {
            if let Some(index) = checked_index(coordinate, len) {
                prop_assert!(index < len);
                prop_assert_eq!(index as i64, coordinate);
            }
        }
    }
}
