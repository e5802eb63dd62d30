//! Merchant identities and their coin exchange rates.

use rust_decimal::Decimal;

use crate::error::{MerchantError, MerchantResult};

/// Who the merchant is and how many coins one currency unit earns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MerchantProfile {
    /// Business name. Recorded on every ledger movement the merchant causes.
    pub name: String,
    pub rate: Decimal,
}

impl MerchantProfile {
    pub fn new(name: impl Into<String>, rate: Decimal) -> MerchantResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(MerchantError::InvalidArgument(
                "merchant name must not be empty".into(),
            ));
        }
        if rate <= Decimal::ZERO {
            return Err(MerchantError::InvalidArgument(format!(
                "rate must be positive, got {rate}"
            )));
        }
        Ok(Self { name, rate })
    }

    pub fn cinema() -> Self {
        Self {
            name: "cineplanet".into(),
            rate: Decimal::ONE,
        }
    }

    pub fn pharmacy() -> Self {
        Self {
            name: "inkafarma".into(),
            rate: Decimal::from(3),
        }
    }

    /// The supermarket's rate is set per deployment; one coin per unit
    /// unless configured.
    pub fn supermarket(rate: Option<Decimal>) -> MerchantResult<Self> {
        Self::new("vivanda", rate.unwrap_or(Decimal::ONE))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn built_in_rates() {
        assert_eq!(MerchantProfile::cinema().rate, Decimal::ONE);
        assert_eq!(MerchantProfile::pharmacy().rate, Decimal::from(3));
        assert_eq!(MerchantProfile::supermarket(None).unwrap().rate, Decimal::ONE);
        assert_eq!(
            MerchantProfile::supermarket(Some(Decimal::from(2))).unwrap().rate,
            Decimal::from(2)
        );
    }

    #[test]
    fn rejects_non_positive_rate() {
        assert!(MerchantProfile::new("shop", Decimal::ZERO).is_err());
        assert!(MerchantProfile::supermarket(Some(Decimal::NEGATIVE_ONE)).is_err());
        assert!(MerchantProfile::new(" ", Decimal::ONE).is_err());
    }
}
