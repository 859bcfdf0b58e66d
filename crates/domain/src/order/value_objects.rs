//! Value objects for the order domain.

use serde::{Deserialize, Serialize};

use super::OrderError;

/// Product identifier (SKU).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(String);

impl ProductId {
    /// Creates a new product ID from a string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the product ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if the ID is empty or whitespace only.
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl std::fmt::Display for ProductId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ProductId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ProductId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for ProductId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A currency amount held as whole cents.
///
/// Serialized as the bare integer cent count so stored orders never pass
/// through floating point. Decimal amounts only appear at the edges, via
/// [`Money::from_decimal`] and [`Money::to_decimal`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money {
    cents: i64,
}

impl Money {
    pub fn from_cents(cents: i64) -> Self {
        Self { cents }
    }

    /// Converts a decimal currency value, rounding to the nearest cent (half
    /// away from zero). NaN, infinities and out-of-range values are rejected.
    pub fn from_decimal(amount: f64) -> Result<Self, OrderError> {
        let cents = (amount * 100.0).round();
        if !cents.is_finite() || cents.abs() >= i64::MAX as f64 {
            return Err(OrderError::InvalidAmount(amount.to_string()));
        }
        Ok(Self {
            cents: cents as i64,
        })
    }

    pub fn zero() -> Self {
        Self::default()
    }

    pub fn cents(&self) -> i64 {
        self.cents
    }

    /// The amount in currency units, e.g. `75.48`.
    pub fn to_decimal(&self) -> f64 {
        self.cents as f64 / 100.0
    }

    pub fn is_negative(&self) -> bool {
        self.cents < 0
    }

    /// Price of `quantity` units, or `None` if it does not fit in cents.
    pub fn checked_multiply(&self, quantity: u32) -> Option<Money> {
        self.cents
            .checked_mul(i64::from(quantity))
            .map(Money::from_cents)
    }

    pub fn checked_add(&self, rhs: Money) -> Option<Money> {
        self.cents.checked_add(rhs.cents).map(Money::from_cents)
    }

    /// Exact sum of `amounts`, or `None` on overflow.
    pub fn checked_sum(amounts: impl IntoIterator<Item = Money>) -> Option<Money> {
        amounts
            .into_iter()
            .try_fold(Money::zero(), |acc, m| acc.checked_add(m))
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.cents < 0 { "-" } else { "" };
        let abs = self.cents.unsigned_abs();
        write!(f, "{sign}${}.{:02}", abs / 100, abs % 100)
    }
}

/// A line item of a placed order.
///
/// `total_price` is derived once from `quantity × unit_price` when the item
/// is created and never recomputed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub product_id: ProductId,

    /// Always positive.
    pub quantity: u32,

    pub unit_price: Money,

    /// quantity × unit_price.
    pub total_price: Money,
}

impl OrderItem {
    /// Builds a line item, rejecting it if the line total overflows.
    pub fn new(
        product_id: impl Into<ProductId>,
        quantity: u32,
        unit_price: Money,
    ) -> Result<Self, OrderError> {
        let product_id = product_id.into();
        let total_price = unit_price.checked_multiply(quantity).ok_or_else(|| {
            OrderError::InvalidAmount(format!(
                "{quantity} x {unit_price} for {product_id} is too large"
            ))
        })?;

        Ok(Self {
            product_id,
            quantity,
            unit_price,
            total_price,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_product_ids() {
        assert!(ProductId::new(" ").is_blank());
        assert!(!ProductId::from("SKU-001").is_blank());
    }

    #[test]
    fn decimal_prices_round_to_the_nearest_cent() {
        assert_eq!(Money::from_decimal(29.99).unwrap().cents(), 2999);
        assert_eq!(Money::from_decimal(15.5).unwrap().cents(), 1550);
        assert_eq!(Money::from_decimal(0.1 + 0.2).unwrap().cents(), 30);
        assert_eq!(Money::from_decimal(0.125).unwrap().cents(), 13);
        assert_eq!(Money::from_decimal(-1.005).unwrap().cents(), -100);
    }

    #[test]
    fn unrepresentable_decimals_are_rejected() {
        assert!(Money::from_decimal(f64::NAN).is_err());
        assert!(Money::from_decimal(f64::INFINITY).is_err());
        assert!(Money::from_decimal(1e300).is_err());
    }

    #[test]
    fn scenario_total_is_exact() {
        let items = [
            OrderItem::new("p1", 2, Money::from_decimal(29.99).unwrap()).unwrap(),
            OrderItem::new("p2", 1, Money::from_decimal(15.50).unwrap()).unwrap(),
        ];
        let total = Money::checked_sum(items.iter().map(|i| i.total_price)).unwrap();

        assert_eq!(items[0].total_price.cents(), 5998);
        assert_eq!(total.cents(), 7548);
        assert_eq!(total.to_decimal(), 75.48);
        assert_eq!(total.to_string(), "$75.48");
    }

    #[test]
    fn display_handles_small_and_negative_amounts() {
        assert_eq!(Money::from_cents(5).to_string(), "$0.05");
        assert_eq!(Money::from_cents(-1234).to_string(), "-$12.34");
    }

    #[test]
    fn overflowing_line_total_is_rejected() {
        let result = OrderItem::new("p1", u32::MAX, Money::from_cents(1_000_000_000_000));
        assert!(matches!(result, Err(OrderError::InvalidAmount(_))));

        let max = OrderItem::new("p1", 1, Money::from_cents(i64::MAX)).unwrap();
        assert_eq!(max.total_price.cents(), i64::MAX);
    }

    #[test]
    fn checked_arithmetic_reports_overflow() {
        let big = Money::from_cents(i64::MAX - 50);
        assert_eq!(big.checked_add(Money::from_cents(100)), None);
        assert_eq!(
            big.checked_add(Money::from_cents(50)),
            Some(Money::from_cents(i64::MAX))
        );
        assert_eq!(Money::checked_sum([big, Money::from_cents(100)]), None);
        assert_eq!(Money::checked_sum(std::iter::empty()), Some(Money::zero()));
    }

    #[test]
    fn money_is_stored_as_integer_cents() {
        let item = OrderItem::new("SKU-001", 2, Money::from_cents(999)).unwrap();
        let json = serde_json::to_value(&item).unwrap();

        assert_eq!(json["unit_price"], 999);
        assert_eq!(json["total_price"], 1998);
        assert_eq!(serde_json::from_value::<OrderItem>(json).unwrap(), item);
    }
}
