use crate::domain::errors::ValidationError;

/// Per-share price quoted by the market-data source.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Price(f64);

impl Price {
    pub fn new(value: f64) -> Result<Self, ValidationError> {
        if !value.is_finite() {
            return Err(ValidationError::MustBeFinite);
        }
        if value < 0.0 {
            return Err(ValidationError::InvalidPrice(format!(
                "{} must be non-negative",
                value
            )));
        }
        Ok(Price(value))
    }

    /// Parse a price from the textual form used by the quote API (e.g. "412.3400").
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let value = raw
            .trim()
            .parse::<f64>()
            .map_err(|e| ValidationError::InvalidPrice(format!("'{}': {}", raw, e)))?;
        Price::new(value)
    }

    pub fn value(&self) -> f64 {
        self.0
    }
}

impl std::fmt::Display for Price {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "${:.4}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_price_new_valid() {
        let price = Price::new(100.0);
        assert!(price.is_ok());
        assert_eq!(price.unwrap().value(), 100.0);
    }

    #[test]
    fn test_price_new_negative() {
        let price = Price::new(-10.0);
        assert!(matches!(price, Err(ValidationError::InvalidPrice(_))));
    }

    #[test]
    fn test_price_new_zero() {
        assert_eq!(Price::new(0.0).unwrap().value(), 0.0);
    }

    #[test]
    fn test_price_new_nan() {
        assert!(matches!(
            Price::new(f64::NAN),
            Err(ValidationError::MustBeFinite)
        ));
    }

    #[test]
    fn test_price_parse_api_string() {
        let price = Price::parse("412.3400").unwrap();
        assert_eq!(price.value(), 412.34);

        let padded = Price::parse(" 7.5 ").unwrap();
        assert_eq!(padded.value(), 7.5);
    }

    #[test]
    fn test_price_parse_garbage() {
        assert!(Price::parse("n/a").is_err());
        assert!(Price::parse("").is_err());
    }

    #[test]
    fn test_price_display() {
        assert_eq!(Price::new(120.5).unwrap().to_string(), "$120.5000");
    }
}
