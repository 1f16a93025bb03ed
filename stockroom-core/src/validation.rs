//! Validation rules applied before any network call.
//!
//! Every mutation entry point runs these first; a failure here is a
//! synchronous `ValidationError` and the network layer is never reached.

use crate::{EquipmentItem, ValidationError};

/// Check an issue quantity against the item's limits and availability.
pub fn validate_issue_quantity(item: &EquipmentItem, quantity: u32) -> Result<(), ValidationError> {
    if quantity < item.min_issue_limit {
        return Err(ValidationError::QuantityBelowMinimum {
            quantity,
            min: item.min_issue_limit,
        });
    }
    if quantity > item.max_issue_limit {
        return Err(ValidationError::QuantityAboveMaximum {
            quantity,
            max: item.max_issue_limit,
        });
    }
    if quantity > item.available {
        return Err(ValidationError::QuantityUnavailable {
            quantity,
            available: item.available,
        });
    }
    Ok(())
}

/// Check that a mandatory remark is present and not blank.
///
/// Returns the trimmed remark so callers send a canonical form.
pub fn validate_remark<'a>(
    remark: &'a str,
    action: &'static str,
) -> Result<&'a str, ValidationError> {
    let trimmed = remark.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::RemarkRequired { action });
    }
    Ok(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(min: u32, max: u32, available: u32) -> EquipmentItem {
        EquipmentItem {
            id: 1,
            name: "Multimeter".to_string(),
            available,
            min_issue_limit: min,
            max_issue_limit: max,
            consumable: false,
        }
    }

    #[test]
    fn test_quantity_within_bounds() {
        assert!(validate_issue_quantity(&item(1, 5, 3), 2).is_ok());
        assert!(validate_issue_quantity(&item(1, 5, 3), 1).is_ok());
        assert!(validate_issue_quantity(&item(1, 5, 3), 3).is_ok());
    }

    #[test]
    fn test_quantity_below_minimum() {
        let err = validate_issue_quantity(&item(2, 5, 5), 1).unwrap_err();
        assert_eq!(
            err,
            ValidationError::QuantityBelowMinimum { quantity: 1, min: 2 }
        );
    }

    #[test]
    fn test_quantity_above_maximum() {
        let err = validate_issue_quantity(&item(1, 5, 10), 6).unwrap_err();
        assert_eq!(
            err,
            ValidationError::QuantityAboveMaximum { quantity: 6, max: 5 }
        );
    }

    #[test]
    fn test_quantity_exceeds_available() {
        // Within limits but more than the shelf holds.
        let err = validate_issue_quantity(&item(1, 5, 3), 4).unwrap_err();
        assert_eq!(
            err,
            ValidationError::QuantityUnavailable {
                quantity: 4,
                available: 3
            }
        );
    }

    #[test]
    fn test_remark_required() {
        assert!(validate_remark("", "reject").is_err());
        assert!(validate_remark("   ", "reject").is_err());
        assert!(validate_remark("\t\n", "reject").is_err());
        assert_eq!(validate_remark("  out of stock  ", "reject"), Ok("out of stock"));
    }
}
