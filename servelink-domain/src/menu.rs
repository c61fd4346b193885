use bigdecimal::{BigDecimal, Zero};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Which tab of the customer menu is being looked at.
#[derive(Serialize, Deserialize, PartialEq, Eq, Copy, Clone, Debug, Default)]
#[serde(rename_all = "snake_case", tag = "kind", content = "category_id")]
pub enum MenuFilter {
    #[default]
    All,
    Category(Uuid),
}

impl MenuFilter {
    /// Items without a category only ever show up under `All`.
    pub fn matches(&self, category_id: Option<Uuid>) -> bool {
        match self {
            MenuFilter::All => true,
            MenuFilter::Category(wanted) => category_id == Some(*wanted),
        }
    }

    pub fn from_category(category_id: Option<Uuid>) -> Self {
        category_id.map_or(MenuFilter::All, MenuFilter::Category)
    }

    pub fn apply<T, F>(&self, items: Vec<T>, category_of: F) -> Vec<T>
    where
        F: Fn(&T) -> Option<Uuid>,
    {
        items
            .into_iter()
            .filter(|item| self.matches(category_of(item)))
            .collect()
    }
}

/// Largest value of a `NUMERIC(10,2)` money column.
pub const MAX_AMOUNT: &str = "99999999.99";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AmountError {
    #[error("amount must not be negative")]
    Negative,
    #[error("amount must not exceed {MAX_AMOUNT}")]
    TooLarge,
    #[error("amount must have at most two decimal places")]
    TooPrecise,
}

/// Accepts amounts that fit the money columns without rounding.
pub fn validate_price(price: &BigDecimal) -> Result<(), AmountError> {
    if *price < BigDecimal::zero() {
        return Err(AmountError::Negative);
    }
    if *price > max_amount() {
        return Err(AmountError::TooLarge);
    }
    let (_, scale) = price.normalized().as_bigint_and_exponent();
    if scale > 2 {
        return Err(AmountError::TooPrecise);
    }
    Ok(())
}

fn max_amount() -> BigDecimal {
    BigDecimal::from(9_999_999_999_i64) / BigDecimal::from(100)
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    struct Item {
        name: &'static str,
        category_id: Option<Uuid>,
    }

    #[test]
    fn test_uncategorized_item_only_in_all() {
        let starters = Uuid::new_v4();
        let mains = Uuid::new_v4();
        let items = || {
            vec![
                Item {
                    name: "Samosa",
                    category_id: Some(starters),
                },
                Item {
                    name: "Biryani",
                    category_id: Some(mains),
                },
                Item {
                    name: "Chef special",
                    category_id: None,
                },
            ]
        };

        let all: Vec<_> = MenuFilter::All
            .apply(items(), |i| i.category_id)
            .into_iter()
            .map(|i| i.name)
            .collect();
        assert_eq!(all, vec!["Samosa", "Biryani", "Chef special"]);

        for category in [starters, mains] {
            let names: Vec<_> = MenuFilter::Category(category)
                .apply(items(), |i| i.category_id)
                .into_iter()
                .map(|i| i.name)
                .collect();
            assert_eq!(names.len(), 1);
            assert!(!names.contains(&"Chef special"));
        }
    }

    #[test]
    fn test_from_category() {
        let id = Uuid::new_v4();
        assert_eq!(MenuFilter::from_category(None), MenuFilter::All);
        assert_eq!(
            MenuFilter::from_category(Some(id)),
            MenuFilter::Category(id)
        );
    }

    fn amount(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).unwrap()
    }

    #[test]
    fn test_validate_price() {
        assert_eq!(validate_price(&amount("0")), Ok(()));
        assert_eq!(validate_price(&amount("12.50")), Ok(()));
        assert_eq!(validate_price(&amount("10.990")), Ok(()));
        assert_eq!(validate_price(&amount(MAX_AMOUNT)), Ok(()));
        assert_eq!(validate_price(&amount("-1")), Err(AmountError::Negative));
        assert_eq!(
            validate_price(&amount("100000000")),
            Err(AmountError::TooLarge)
        );
        assert_eq!(
            validate_price(&amount("10.999")),
            Err(AmountError::TooPrecise)
        );
    }
}
