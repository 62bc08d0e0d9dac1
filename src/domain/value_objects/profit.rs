use crate::domain::errors::ValidationError;

/// Ledger profit for a symbol.
///
/// Computed as net BUY cost minus net SELL proceeds, so a positive value means the
/// symbol has consumed more cash than it returned (a net spend) and a negative value
/// means the sells brought back more than the buys cost.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Profit(f64);

impl Profit {
    /// # Errors
    /// Returns ValidationError::MustBeFinite if the value is NaN or infinite
    pub fn new(value: f64) -> Result<Self, ValidationError> {
        if !value.is_finite() {
            return Err(ValidationError::MustBeFinite);
        }
        Ok(Profit(value))
    }

    /// Build from the two fee-adjusted aggregates of the ledger.
    pub fn from_aggregates(buy_cost: f64, sell_proceeds: f64) -> Result<Self, ValidationError> {
        Profit::new(buy_cost - sell_proceeds)
    }

    pub fn zero() -> Self {
        Profit(0.0)
    }

    pub fn value(&self) -> f64 {
        self.0
    }

    pub fn is_net_spend(&self) -> bool {
        self.0 > 0.0
    }

    pub fn is_net_gain(&self) -> bool {
        self.0 < 0.0
    }
}

impl std::fmt::Display for Profit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.0 >= 0.0 {
            write!(f, "+${:.2}", self.0)
        } else {
            write!(f, "-${:.2}", self.0.abs())
        }
    }
}
