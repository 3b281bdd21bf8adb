//! Workflow signals and their validation
//!
//! Validation collects every violation rather than stopping at the first, so a
//! dropped signal is logged with the full list of reasons.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use core_kernel::LineItemId;

/// Signal that adds a line item
pub const ADD_ITEM_SIGNAL: &str = "add-item";

/// Signal that closes a bill
pub const CLOSE_BILL_SIGNAL: &str = "close-bill";

/// Largest accepted line item amount in minor units ($1,000,000.00)
pub const MAX_ITEM_AMOUNT: i64 = 100_000_000;

/// Longest accepted description, in characters
pub const MAX_DESCRIPTION_LEN: usize = 500;

/// Payload of an add-item signal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddItemSignal {
    pub item_id: String,
    pub amount: i64,
    pub description: String,
}

impl AddItemSignal {
    pub fn new(item_id: LineItemId, amount: i64, description: impl Into<String>) -> Self {
        Self {
            item_id: item_id.as_uuid().to_string(),
            amount,
            description: description.into(),
        }
    }
}

/// Payload of a close-bill signal
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloseBillSignal {}

/// A single reason an add-item signal was rejected
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignalViolation {
    #[error("item id is not a valid UUID: {0:?}")]
    InvalidItemId(String),

    #[error("amount must be positive, got {0}")]
    NonPositiveAmount(i64),

    #[error("amount {0} exceeds the maximum of {max}", max = MAX_ITEM_AMOUNT)]
    AmountTooLarge(i64),

    #[error("description is empty")]
    EmptyDescription,

    #[error("description has {0} characters, maximum is {max}", max = MAX_DESCRIPTION_LEN)]
    DescriptionTooLong(usize),
}

/// All violations found in one signal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignalRejection {
    pub violations: Vec<SignalViolation>,
}

impl fmt::Display for SignalRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reasons: Vec<String> = self.violations.iter().map(ToString::to_string).collect();
        write!(f, "{}", reasons.join("; "))
    }
}

impl std::error::Error for SignalRejection {}

impl SignalRejection {
    pub fn contains(&self, violation: &SignalViolation) -> bool {
        self.violations.contains(violation)
    }
}

/// An add-item signal that passed validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedItem {
    pub item_id: LineItemId,
    pub amount: i64,
    /// Description with surrounding whitespace removed
    pub description: String,
}

/// Validator for add-item signals
pub struct SignalValidator;

impl SignalValidator {
    /// Validates an add-item signal
    ///
    /// # Returns
    ///
    /// The parsed item, or every violation found
    pub fn validate(signal: &AddItemSignal) -> Result<ValidatedItem, SignalRejection> {
        let mut violations = Vec::new();

        let item_id = match Uuid::parse_str(&signal.item_id) {
            Ok(uuid) => Some(LineItemId::from_uuid(uuid)),
            Err(_) => {
                violations.push(SignalViolation::InvalidItemId(signal.item_id.clone()));
                None
            }
        };

        Self::validate_amount(signal.amount, &mut violations);

        let description = signal.description.trim();
        Self::validate_description(description, &mut violations);

        match item_id {
            Some(item_id) if violations.is_empty() => Ok(ValidatedItem {
                item_id,
                amount: signal.amount,
                description: description.to_string(),
            }),
            _ => Err(SignalRejection { violations }),
        }
    }

    fn validate_amount(amount: i64, violations: &mut Vec<SignalViolation>) {
        if amount <= 0 {
            violations.push(SignalViolation::NonPositiveAmount(amount));
        } else if amount > MAX_ITEM_AMOUNT {
            violations.push(SignalViolation::AmountTooLarge(amount));
        }
    }

    fn validate_description(description: &str, violations: &mut Vec<SignalViolation>) {
        let length = description.chars().count();
        if length == 0 {
            violations.push(SignalViolation::EmptyDescription);
        } else if length > MAX_DESCRIPTION_LEN {
            violations.push(SignalViolation::DescriptionTooLong(length));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signal(amount: i64, description: &str) -> AddItemSignal {
        AddItemSignal::new(LineItemId::new(), amount, description)
    }

    #[test]
    fn test_valid_signal_is_trimmed() {
        let item = SignalValidator::validate(&signal(500, "  coffee \n")).unwrap();
        assert_eq!(item.amount, 500);
        assert_eq!(item.description, "coffee");
    }

    #[test]
    fn test_amount_bounds() {
        assert!(SignalValidator::validate(&signal(1, "a")).is_ok());
        assert!(SignalValidator::validate(&signal(MAX_ITEM_AMOUNT, "a")).is_ok());

        let zero = SignalValidator::validate(&signal(0, "a")).unwrap_err();
        assert!(zero.contains(&SignalViolation::NonPositiveAmount(0)));

        let negative = SignalValidator::validate(&signal(-5, "a")).unwrap_err();
        assert!(negative.contains(&SignalViolation::NonPositiveAmount(-5)));

        let too_large = SignalValidator::validate(&signal(2_000_000_00, "a")).unwrap_err();
        assert!(too_large.contains(&SignalViolation::AmountTooLarge(2_000_000_00)));
    }

    #[test]
    fn test_description_bounds() {
        let blank = SignalValidator::validate(&signal(10, "   ")).unwrap_err();
        assert_eq!(blank.violations, vec![SignalViolation::EmptyDescription]);

        let exact = "x".repeat(MAX_DESCRIPTION_LEN);
        assert!(SignalValidator::validate(&signal(10, &exact)).is_ok());

        let long = "x".repeat(MAX_DESCRIPTION_LEN + 1);
        let rejection = SignalValidator::validate(&signal(10, &long)).unwrap_err();
        assert_eq!(rejection.violations, vec![SignalViolation::DescriptionTooLong(501)]);
    }

    #[test]
    fn test_description_length_counts_characters() {
        let multibyte = "ლ".repeat(MAX_DESCRIPTION_LEN);
        assert!(SignalValidator::validate(&signal(10, &multibyte)).is_ok());
    }

    #[test]
    fn test_collects_all_violations() {
        let bad = AddItemSignal {
            item_id: "not-a-uuid".to_string(),
            amount: 0,
            description: String::new(),
        };
        let rejection = SignalValidator::validate(&bad).unwrap_err();

        assert_eq!(rejection.violations.len(), 3);
        assert!(rejection.to_string().contains("not a valid UUID"));
    }
}
