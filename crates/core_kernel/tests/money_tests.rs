//! Unit tests for the Money module
//!
//! Tests cover construction, checked addition, currency handling,
//! formatting, and the algebraic properties of addition.

use core_kernel::{Currency, Money, MoneyError};
use proptest::prelude::*;
use rust_decimal_macros::dec;

mod creation {
    use super::*;

    #[test]
    fn test_new_accepts_zero_and_positive() {
        assert_eq!(Money::new(0, Currency::USD).unwrap().amount(), 0);
        assert_eq!(Money::new(50, Currency::GEL).unwrap().amount(), 50);
    }

    #[test]
    fn test_new_rejects_negative() {
        assert_eq!(Money::new(-1, Currency::USD), Err(MoneyError::InvalidAmount(-1)));
    }

    #[test]
    fn test_from_code_parses_supported_currencies() {
        assert_eq!(Money::from_code(100, "USD").unwrap().currency(), Currency::USD);
        assert_eq!(Money::from_code(100, "gel").unwrap().currency(), Currency::GEL);
    }

    #[test]
    fn test_from_code_rejects_unknown_currency() {
        assert_eq!(
            Money::from_code(100, "EUR"),
            Err(MoneyError::UnsupportedCurrency("EUR".to_string()))
        );
    }

    #[test]
    fn test_zero_creates_zero_amount() {
        let m = Money::zero(Currency::GEL);
        assert!(m.is_zero());
        assert_eq!(m.currency(), Currency::GEL);
    }
}

mod arithmetic {
    use super::*;

    #[test]
    fn test_checked_add_same_currency() {
        let a = Money::new(100, Currency::USD).unwrap();
        let b = Money::new(50, Currency::USD).unwrap();
        assert_eq!(a.checked_add(&b).unwrap().amount(), 150);
    }

    #[test]
    fn test_checked_add_zero_is_identity() {
        let a = Money::new(100, Currency::USD).unwrap();
        assert_eq!(a.checked_add(&Money::zero(Currency::USD)).unwrap(), a);
    }

    #[test]
    fn test_checked_add_overflow() {
        let a = Money::new(i64::MAX - 5, Currency::USD).unwrap();
        let b = Money::new(10, Currency::USD).unwrap();
        assert_eq!(a.checked_add(&b), Err(MoneyError::Overflow));
    }

    #[test]
    fn test_sum_of_empty_is_zero() {
        let total = Money::sum(Currency::USD, std::iter::empty()).unwrap();
        assert!(total.is_zero());
    }

    #[test]
    fn test_sum_rejects_foreign_currency() {
        let items = [
            Money::new(10, Currency::USD).unwrap(),
            Money::new(10, Currency::GEL).unwrap(),
        ];
        assert!(matches!(
            Money::sum(Currency::USD, items.iter()),
            Err(MoneyError::CurrencyMismatch(Currency::USD, Currency::GEL))
        ));
    }
}

mod formatting {
    use super::*;

    #[test]
    fn test_usd_renders_dollars_and_cents() {
        assert_eq!(Money::new(123, Currency::USD).unwrap().to_string(), "$1.23 USD");
        assert_eq!(Money::new(5, Currency::USD).unwrap().to_string(), "$0.05 USD");
    }

    #[test]
    fn test_gel_renders_minor_units() {
        assert_eq!(Money::new(100, Currency::GEL).unwrap().to_string(), "100 GEL");
    }

    #[test]
    fn test_major_units() {
        assert_eq!(Money::new(80000, Currency::GEL).unwrap().to_major_units(), dec!(800.00));
    }

    #[test]
    fn test_currency_serializes_as_code() {
        let json = serde_json::to_string(&Currency::GEL).unwrap();
        assert_eq!(json, "\"GEL\"");
    }
}

fn currency_strategy() -> impl Strategy<Value = Currency> {
    prop_oneof![Just(Currency::USD), Just(Currency::GEL)]
}

proptest! {
    #[test]
    fn prop_add_is_commutative(
        a in 0i64..i64::MAX / 2,
        b in 0i64..i64::MAX / 2,
        currency in currency_strategy()
    ) {
        let ma = Money::new(a, currency).unwrap();
        let mb = Money::new(b, currency).unwrap();
        prop_assert_eq!(ma.checked_add(&mb).unwrap(), mb.checked_add(&ma).unwrap());
    }

    #[test]
    fn prop_add_is_associative(
        a in 0i64..i64::MAX / 4,
        b in 0i64..i64::MAX / 4,
        c in 0i64..i64::MAX / 4
    ) {
        let ma = Money::new(a, Currency::USD).unwrap();
        let mb = Money::new(b, Currency::USD).unwrap();
        let mc = Money::new(c, Currency::USD).unwrap();

        let left = ma.checked_add(&mb).and_then(|ab| ab.checked_add(&mc)).unwrap();
        let right = mb.checked_add(&mc).and_then(|bc| ma.checked_add(&bc)).unwrap();
        prop_assert_eq!(left, right);
    }

    #[test]
    fn prop_mismatch_in_both_directions(a in 0i64..1_000_000i64, b in 0i64..1_000_000i64) {
        let usd = Money::new(a, Currency::USD).unwrap();
        let gel = Money::new(b, Currency::GEL).unwrap();

        prop_assert_eq!(
            usd.checked_add(&gel),
            Err(MoneyError::CurrencyMismatch(Currency::USD, Currency::GEL))
        );
        prop_assert_eq!(
            gel.checked_add(&usd),
            Err(MoneyError::CurrencyMismatch(Currency::GEL, Currency::USD))
        );
    }
}
