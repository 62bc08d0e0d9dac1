use crate::domain::errors::ValidationError;

/// Number of shares in a single transaction. Always a whole, strictly positive count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Quantity(i64);

impl Quantity {
    pub fn new(value: i64) -> Result<Self, ValidationError> {
        if value > 0 {
            Ok(Quantity(value))
        } else {
            Err(ValidationError::InvalidQuantity(format!(
                "{} must be greater than zero",
                value
            )))
        }
    }

    pub fn value(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for Quantity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quantity_new_valid() {
        let qty = Quantity::new(100);
        assert!(qty.is_ok());
        assert_eq!(qty.unwrap().value(), 100);
    }

    #[test]
    fn test_quantity_new_negative() {
        let qty = Quantity::new(-5);
        assert!(matches!(qty, Err(ValidationError::InvalidQuantity(_))));
    }

    #[test]
    fn test_quantity_new_zero() {
        assert!(Quantity::new(0).is_err());
    }
}
