use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct Subscriber {
    pub id: String,
    pub price_tier: String,
    pub name: String,
}

/// One menu line, keyed by (date, meal-type). Prices are kept per tier code,
/// one entry per price column of the menu table.
#[derive(Debug, Clone)]
pub struct MenuEntry {
    pub date: NaiveDate,
    pub meal_type: String,
    pub name: String,
    pub prices: HashMap<String, Decimal>,
}

impl MenuEntry {
    pub fn price_for(&self, tier: &str) -> Decimal {
        self.prices.get(tier).copied().unwrap_or(Decimal::ZERO)
    }
}

#[derive(Debug, Clone)]
pub struct OrderRecord {
    pub date: NaiveDate,
    pub meal_type: String,
    pub subscriber_id: String,
    pub quantity: i64,
    pub ordered_at: NaiveDateTime,
}

impl OrderRecord {
    /// The logical slot an order fills; a later order for the same slot
    /// supersedes an earlier one.
    pub fn slot(&self) -> (&str, NaiveDate, &str) {
        (&self.subscriber_id, self.date, &self.meal_type)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReportLineItem {
    pub date: NaiveDate,
    pub meal_type: String,
    pub ordered_at: NaiveDateTime,
    pub meal_name: String,
    pub quantity: i64,
    pub unit_price: Decimal,
    pub line_total: Decimal,
}

#[derive(Debug, Clone)]
pub struct SubscriberReport {
    pub subscriber_id: String,
    pub owner: String,
    pub items: Vec<ReportLineItem>,
    pub total_count: i64,
    pub total_amount: Decimal,
}

impl SubscriberReport {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
