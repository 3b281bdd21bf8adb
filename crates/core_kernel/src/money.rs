//! Money types with checked integer arithmetic
//!
//! Amounts are held as signed 64-bit minor units (cents, tetri). Every
//! arithmetic operation is checked: currency mismatches and range overflows
//! are reported as errors instead of panicking or wrapping.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Supported currency codes (ISO 4217)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    USD,
    GEL,
}

impl Currency {
    /// Returns the number of minor-unit decimal places for this currency
    pub fn decimal_places(&self) -> u32 {
        match self {
            Currency::USD | Currency::GEL => 2,
        }
    }

    /// Returns the currency symbol
    pub fn symbol(&self) -> &'static str {
        match self {
            Currency::USD => "$",
            Currency::GEL => "₾",
        }
    }

    /// Returns the ISO 4217 code
    pub fn code(&self) -> &'static str {
        match self {
            Currency::USD => "USD",
            Currency::GEL => "GEL",
        }
    }

    /// All currencies a bill can be opened in
    pub fn all() -> [Currency; 2] {
        [Currency::USD, Currency::GEL]
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl FromStr for Currency {
    type Err = MoneyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "USD" => Ok(Currency::USD),
            "GEL" => Ok(Currency::GEL),
            _ => Err(MoneyError::UnsupportedCurrency(s.to_string())),
        }
    }
}

/// Errors that can occur during money operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MoneyError {
    #[error("Invalid amount: {0} (amount cannot be negative)")]
    InvalidAmount(i64),

    #[error("Unsupported currency: {0}")]
    UnsupportedCurrency(String),

    #[error("Currency mismatch: cannot operate on {0} and {1}")]
    CurrencyMismatch(Currency, Currency),

    #[error("Addition would overflow")]
    Overflow,

    #[error("Addition would underflow")]
    Underflow,
}

/// A non-negative monetary amount in minor units with its currency
///
/// `Money` is an immutable value type. Construct it through [`Money::new`],
/// which enforces the non-negative invariant, and combine values with
/// [`Money::checked_add`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Money {
    amount: i64,
    currency: Currency,
}

impl Money {
    /// Creates a new Money value
    ///
    /// # Errors
    ///
    /// Returns `MoneyError::InvalidAmount` if `amount` is negative.
    pub fn new(amount: i64, currency: Currency) -> Result<Self, MoneyError> {
        if amount < 0 {
            return Err(MoneyError::InvalidAmount(amount));
        }
        Ok(Self { amount, currency })
    }

    /// Creates a Money value from a currency code such as `"USD"`
    ///
    /// # Errors
    ///
    /// Returns `MoneyError::UnsupportedCurrency` for unknown codes and
    /// `MoneyError::InvalidAmount` for negative amounts.
    pub fn from_code(amount: i64, currency_code: &str) -> Result<Self, MoneyError> {
        let currency = currency_code.parse::<Currency>()?;
        Self::new(amount, currency)
    }

    /// Creates a zero amount in the specified currency
    pub fn zero(currency: Currency) -> Self {
        Self { amount: 0, currency }
    }

    /// Returns the amount in minor units
    pub fn amount(&self) -> i64 {
        self.amount
    }

    /// Returns the currency
    pub fn currency(&self) -> Currency {
        self.currency
    }

    /// Returns true if the amount is zero
    pub fn is_zero(&self) -> bool {
        self.amount == 0
    }

    /// Returns the amount in major units (e.g. dollars) for reporting
    pub fn to_major_units(&self) -> Decimal {
        Decimal::new(self.amount, self.currency.decimal_places())
    }

    /// Checked addition
    ///
    /// # Errors
    ///
    /// - `CurrencyMismatch` if the currencies differ
    /// - `Overflow` / `Underflow` if the sum leaves the `i64` range
    pub fn checked_add(&self, other: &Money) -> Result<Money, MoneyError> {
        if self.currency != other.currency {
            return Err(MoneyError::CurrencyMismatch(self.currency, other.currency));
        }
        match self.amount.checked_add(other.amount) {
            Some(amount) => Ok(Self { amount, currency: self.currency }),
            None if other.amount > 0 => Err(MoneyError::Overflow),
            None => Err(MoneyError::Underflow),
        }
    }

    /// Sums an iterator of Money values in the given currency
    ///
    /// An empty iterator yields zero.
    pub fn sum<'a, I>(currency: Currency, values: I) -> Result<Money, MoneyError>
    where
        I: IntoIterator<Item = &'a Money>,
    {
        values
            .into_iter()
            .try_fold(Money::zero(currency), |acc, m| acc.checked_add(m))
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.currency {
            Currency::USD => write!(
                f,
                "{}{}.{:02} {}",
                self.currency.symbol(),
                self.amount / 100,
                self.amount % 100,
                self.currency
            ),
            Currency::GEL => write!(f, "{} {}", self.amount, self.currency),
        }
    }
}
