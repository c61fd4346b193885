//! Owner dashboard figures.

use std::collections::{BTreeMap, HashMap};

use bigdecimal::{BigDecimal, Zero};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

pub const REVENUE_DAYS: usize = 7;
pub const TOP_ITEMS: usize = 5;

#[derive(Clone, Debug)]
pub struct OrderSample {
    pub total_amount: Option<BigDecimal>,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug)]
pub struct ItemSale {
    pub name: String,
    pub quantity: i64,
}

#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct Summary {
    pub total_orders: usize,
    pub total_revenue: BigDecimal,
    pub avg_order_value: BigDecimal,
    pub total_tables: usize,
}

#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct DailyRevenue {
    pub day: NaiveDate,
    pub revenue: BigDecimal,
}

#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct TopItem {
    pub name: String,
    pub quantity: i64,
}

/// Orders without a total count towards the order count but not towards
/// the average.
pub fn summarize(orders: &[OrderSample], total_tables: usize) -> Summary {
    let totals: Vec<&BigDecimal> = orders
        .iter()
        .filter_map(|o| o.total_amount.as_ref())
        .collect();
    let total_revenue = totals
        .iter()
        .fold(BigDecimal::zero(), |acc, t| acc + *t);
    let avg_order_value = if totals.is_empty() {
        BigDecimal::zero()
    } else {
        (total_revenue.clone() / BigDecimal::from(totals.len() as u64)).round(2)
    };

    Summary {
        total_orders: orders.len(),
        total_revenue,
        avg_order_value,
        total_tables,
    }
}

/// Revenue per UTC day, limited to the most recent `days` days that saw
/// orders, oldest first.
pub fn revenue_by_day(orders: &[OrderSample], days: usize) -> Vec<DailyRevenue> {
    let mut by_day: BTreeMap<NaiveDate, BigDecimal> = BTreeMap::new();
    for order in orders {
        let entry = by_day
            .entry(order.created_at.date_naive())
            .or_insert_with(BigDecimal::zero);
        if let Some(total) = &order.total_amount {
            *entry += total;
        }
    }

    let skip = by_day.len().saturating_sub(days);
    by_day
        .into_iter()
        .skip(skip)
        .map(|(day, revenue)| DailyRevenue {
            day,
            revenue: revenue.round(2),
        })
        .collect()
}

pub fn top_items(sales: &[ItemSale], limit: usize) -> Vec<TopItem> {
    let mut grouped: HashMap<&str, i64> = HashMap::new();
    for sale in sales {
        *grouped.entry(sale.name.as_str()).or_insert(0) += sale.quantity;
    }

    let mut items: Vec<TopItem> = grouped
        .into_iter()
        .map(|(name, quantity)| TopItem {
            name: name.to_string(),
            quantity,
        })
        .collect();
    items.sort_by(|a, b| b.quantity.cmp(&a.quantity).then_with(|| a.name.cmp(&b.name)));
    items.truncate(limit);
    items
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use chrono::TimeZone;

    use super::*;

    fn amount(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).unwrap()
    }

    fn order(total: Option<&str>, day: u32) -> OrderSample {
        OrderSample {
            total_amount: total.map(amount),
            created_at: Utc.with_ymd_and_hms(2024, 3, day, 12, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_summary_skips_missing_totals_in_average() {
        let orders = vec![
            order(Some("250.00"), 1),
            order(Some("150.00"), 1),
            order(None, 2),
        ];
        let summary = summarize(&orders, 6);
        assert_eq!(summary.total_orders, 3);
        assert_eq!(summary.total_revenue, amount("400"));
        assert_eq!(summary.avg_order_value, amount("200"));
        assert_eq!(summary.total_tables, 6);
    }

    #[test]
    fn test_summary_of_no_orders() {
        let summary = summarize(&[], 0);
        assert_eq!(summary.total_orders, 0);
        assert_eq!(summary.total_revenue, BigDecimal::zero());
        assert_eq!(summary.avg_order_value, BigDecimal::zero());
    }

    #[test]
    fn test_revenue_by_day_keeps_last_days() {
        let orders: Vec<_> = (1..=9)
            .map(|day| order(Some("10.00"), day))
            .chain(std::iter::once(order(Some("5.50"), 9)))
            .collect();
        let revenue = revenue_by_day(&orders, REVENUE_DAYS);

        assert_eq!(revenue.len(), REVENUE_DAYS);
        assert_eq!(
            revenue.first().unwrap().day,
            NaiveDate::from_ymd_opt(2024, 3, 3).unwrap()
        );
        assert_eq!(revenue.last().unwrap().revenue, amount("15.50"));
    }

    #[test]
    fn test_top_items_groups_and_sorts() {
        let sales = vec![
            ItemSale {
                name: "Dosa".to_string(),
                quantity: 2,
            },
            ItemSale {
                name: "Vada".to_string(),
                quantity: 3,
            },
            ItemSale {
                name: "Dosa".to_string(),
                quantity: 4,
            },
            ItemSale {
                name: "Idli".to_string(),
                quantity: 3,
            },
        ];
        let top = top_items(&sales, 2);
        assert_eq!(
            top,
            vec![
                TopItem {
                    name: "Dosa".to_string(),
                    quantity: 6
                },
                TopItem {
                    name: "Idli".to_string(),
                    quantity: 3
                },
            ]
        );
    }
}
