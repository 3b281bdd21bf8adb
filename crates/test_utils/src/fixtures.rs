//! Pre-built Test Fixtures
//!
//! Ready-to-use test data for bills and line items. Fixtures are consistent
//! and predictable for unit tests.

use chrono::{DateTime, Duration, TimeZone, Utc};
use core_kernel::{BillId, Currency, LineItemId, Money};
use fake::faker::lorem::en::Words;
use fake::Fake;

/// Fixture for Money test data
pub struct MoneyFixtures;

impl MoneyFixtures {
    /// $5.00
    pub fn usd_500() -> Money {
        Money::new(500, Currency::USD).expect("fixture amount is valid")
    }

    /// $3.00
    pub fn usd_300() -> Money {
        Money::new(300, Currency::USD).expect("fixture amount is valid")
    }

    /// 1.00 GEL
    pub fn gel_100() -> Money {
        Money::new(100, Currency::GEL).expect("fixture amount is valid")
    }

    /// Largest amount a single line item may carry, $1,000,000.00
    pub fn usd_max_item() -> Money {
        Money::new(100_000_000, Currency::USD).expect("fixture amount is valid")
    }
}

/// Fixture for temporal test data
pub struct TemporalFixtures;

impl TemporalFixtures {
    /// Fixed instant used as "bill created" in deterministic tests
    pub fn created_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0)
            .single()
            .unwrap_or_else(Utc::now)
    }

    /// One second after [`TemporalFixtures::created_at`]
    pub fn item_at() -> DateTime<Utc> {
        Self::created_at() + Duration::seconds(1)
    }

    /// Two seconds after [`TemporalFixtures::created_at`]
    pub fn closed_at() -> DateTime<Utc> {
        Self::created_at() + Duration::seconds(2)
    }
}

/// Fixture for string test data
pub struct StringFixtures;

impl StringFixtures {
    pub fn coffee() -> &'static str {
        "coffee"
    }

    pub fn muffin() -> &'static str {
        "muffin"
    }

    /// Description at the 500 character limit
    pub fn longest_description() -> String {
        "x".repeat(500)
    }

    /// Description one character over the limit
    pub fn too_long_description() -> String {
        "x".repeat(501)
    }

    /// A random lorem description of two to five words
    pub fn random_description() -> String {
        let words: Vec<String> = Words(2..6).fake();
        words.join(" ")
    }
}

/// Fixture for identifiers
pub struct IdFixtures;

impl IdFixtures {
    pub fn bill_id() -> BillId {
        BillId::new_v7()
    }

    pub fn line_item_id() -> LineItemId {
        LineItemId::new_v7()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_money_fixtures() {
        assert_eq!(MoneyFixtures::usd_500().amount(), 500);
        assert_eq!(MoneyFixtures::gel_100().currency(), Currency::GEL);
        assert_eq!(MoneyFixtures::usd_max_item().amount(), 100_000_000);
    }

    #[test]
    fn test_temporal_fixtures_are_ordered() {
        assert!(TemporalFixtures::created_at() < TemporalFixtures::item_at());
        assert!(TemporalFixtures::item_at() < TemporalFixtures::closed_at());
    }

    #[test]
    fn test_random_description_fits_limit() {
        let description = StringFixtures::random_description();
        assert!(!description.trim().is_empty());
        assert!(description.chars().count() <= 500);
    }
}
