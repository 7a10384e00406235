pub mod dbf;
pub mod excel;
pub mod model;
pub mod range;

use std::collections::HashMap;

use chrono::NaiveDate;
use log::info;
use rust_decimal::Decimal;

use crate::model::{MenuEntry, OrderRecord, ReportLineItem, Subscriber, SubscriberReport};

/// Keeps only the latest order per (subscriber, date, meal-type) slot.
/// Subscribers correct an order by placing it again; the last one placed
/// is the one billed.
fn latest_orders(mut orders: Vec<OrderRecord>) -> Vec<OrderRecord> {
    // Stable sort, so orders with equal timestamps keep their stream order
    // and the later one in the stream wins the slot.
    orders.sort_by(|a, b| (a.slot(), a.ordered_at).cmp(&(b.slot(), b.ordered_at)));
    let mut latest: Vec<OrderRecord> = Vec::with_capacity(orders.len());
    for order in orders {
        if let Some(prev) = latest.last_mut() {
            if prev.slot() == order.slot() {
                *prev = order;
                continue;
            }
        }
        latest.push(order);
    }
    latest
}

fn line_item(
    order: &OrderRecord,
    tier: &str,
    menu_by_day: &HashMap<(NaiveDate, &str), &MenuEntry>,
) -> ReportLineItem {
    // No menu entry for that day and meal-type is not an error: the item is
    // billed with an empty name at price zero.
    let (meal_name, unit_price) = match menu_by_day.get(&(order.date, order.meal_type.as_str())) {
        Some(entry) => (entry.name.clone(), entry.price_for(tier)),
        None => (String::new(), Decimal::ZERO),
    };
    ReportLineItem {
        date: order.date,
        meal_type: order.meal_type.clone(),
        ordered_at: order.ordered_at,
        meal_name,
        quantity: order.quantity,
        unit_price,
        line_total: unit_price * Decimal::from(order.quantity),
    }
}

/// Joins the three record lists into one report per subscriber, in roster
/// order. Subscribers without any surviving order still get a report with an
/// empty item list; the renderer decides what to skip.
pub fn build_reports(
    subscribers: &[Subscriber],
    menu: &[MenuEntry],
    orders: Vec<OrderRecord>,
) -> Vec<SubscriberReport> {
    info!("generating report data");
    let orders = latest_orders(orders);
    let menu_by_day: HashMap<(NaiveDate, &str), &MenuEntry> = menu
        .iter()
        .map(|entry| ((entry.date, entry.meal_type.as_str()), entry))
        .collect();

    subscribers
        .iter()
        .map(|subscriber| {
            let mut items: Vec<ReportLineItem> = orders
                .iter()
                .filter(|order| order.subscriber_id == subscriber.id)
                .map(|order| line_item(order, &subscriber.price_tier, &menu_by_day))
                .collect();
            items.sort_by(|a, b| {
                (a.date, &a.meal_type, a.ordered_at).cmp(&(b.date, &b.meal_type, b.ordered_at))
            });
            let total_count = items.iter().map(|item| item.quantity).sum();
            let total_amount = items.iter().map(|item| item.line_total).sum();
            SubscriberReport {
                subscriber_id: subscriber.id.clone(),
                owner: subscriber.name.clone(),
                items,
                total_count,
                total_amount,
            }
        })
        .collect()
}

#[cfg(test)]
use chrono::NaiveDateTime;
#[cfg(test)]
use rust_decimal_macros::dec;

#[cfg(test)]
fn subscriber(id: &str, tier: &str, name: &str) -> Subscriber {
    Subscriber {
        id: id.to_string(),
        price_tier: tier.to_string(),
        name: name.to_string(),
    }
}

#[cfg(test)]
fn menu_entry(date: &str, meal: &str, name: &str, tier: &str, price: Decimal) -> MenuEntry {
    MenuEntry {
        date: day(date),
        meal_type: meal.to_string(),
        name: name.to_string(),
        prices: HashMap::from([(tier.to_string(), price)]),
    }
}

#[cfg(test)]
fn order(id: &str, date: &str, meal: &str, quantity: i64, at: &str) -> OrderRecord {
    OrderRecord {
        date: day(date),
        meal_type: meal.to_string(),
        subscriber_id: id.to_string(),
        quantity,
        ordered_at: NaiveDateTime::parse_from_str(at, "%Y-%m-%d %H:%M").unwrap(),
    }
}

#[cfg(test)]
fn day(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

#[test]
fn latest_order_wins_the_slot() {
    let roster = vec![subscriber("E1", "A", "Alice")];
    let menu = vec![menu_entry("2024-01-01", "lunch", "Soup", "A", dec!(5.0))];
    let orders = vec![
        order("E1", "2024-01-01", "lunch", 2, "2024-01-01 10:00"),
        order("E1", "2024-01-01", "lunch", 3, "2024-01-01 11:00"),
    ];

    let reports = build_reports(&roster, &menu, orders);
    assert_eq!(reports.len(), 1);
    let report = &reports[0];
    assert_eq!(report.items.len(), 1);
    assert_eq!(report.items[0].quantity, 3);
    assert_eq!(report.items[0].unit_price, dec!(5.0));
    assert_eq!(report.items[0].line_total, dec!(15.0));
    assert_eq!(report.items[0].meal_name, "Soup");
    assert_eq!(report.total_count, 3);
    assert_eq!(report.total_amount, dec!(15.0));
}

#[test]
fn equal_timestamps_keep_the_later_stream_record() {
    let roster = vec![subscriber("E1", "A", "Alice")];
    let menu = vec![menu_entry("2024-01-01", "lunch", "Soup", "A", dec!(5.0))];
    let orders = vec![
        order("E1", "2024-01-01", "lunch", 2, "2024-01-01 10:00"),
        order("E1", "2024-01-01", "lunch", 4, "2024-01-01 10:00"),
    ];

    let reports = build_reports(&roster, &menu, orders);
    assert_eq!(reports[0].items.len(), 1);
    assert_eq!(reports[0].items[0].quantity, 4);
}

#[test]
fn distinct_slots_are_not_deduplicated() {
    let roster = vec![subscriber("E1", "A", "Alice")];
    let menu = vec![menu_entry("2024-01-01", "lunch", "Soup", "A", dec!(5.0))];
    let orders = vec![
        order("E1", "2024-01-01", "lunch", 1, "2024-01-01 10:00"),
        order("E1", "2024-01-01", "dinner", 1, "2024-01-01 10:00"),
        order("E1", "2024-01-02", "lunch", 1, "2024-01-01 10:00"),
    ];

    let reports = build_reports(&roster, &menu, orders);
    assert_eq!(reports[0].items.len(), 3);
    assert_eq!(reports[0].total_count, 3);
}

#[test]
fn trailing_order_is_always_retained() {
    let orders = vec![
        order("E1", "2024-01-01", "lunch", 2, "2024-01-01 10:00"),
        order("E1", "2024-01-01", "lunch", 3, "2024-01-01 11:00"),
        order("E2", "2024-01-01", "lunch", 1, "2024-01-01 09:00"),
    ];

    let latest = latest_orders(orders);
    assert_eq!(latest.len(), 2);
    assert_eq!(latest[0].subscriber_id, "E1");
    assert_eq!(latest[0].quantity, 3);
    assert_eq!(latest[1].subscriber_id, "E2");
}

#[test]
fn missing_menu_entry_defaults_to_zero() {
    let roster = vec![subscriber("E1", "A", "Alice")];
    let menu = vec![menu_entry("2024-01-01", "lunch", "Soup", "A", dec!(5.0))];
    let orders = vec![
        order("E1", "2024-01-01", "lunch", 1, "2024-01-01 10:00"),
        order("E1", "2024-01-02", "lunch", 2, "2024-01-02 10:00"),
    ];

    let reports = build_reports(&roster, &menu, orders);
    let gap = &reports[0].items[1];
    assert_eq!(gap.meal_name, "");
    assert_eq!(gap.unit_price, dec!(0));
    assert_eq!(gap.line_total, dec!(0));
    // the gap item carries quantity but no money
    assert_eq!(reports[0].total_count, 3);
    assert_eq!(reports[0].total_amount, dec!(5.0));
}

#[test]
fn unknown_price_tier_is_zero() {
    let roster = vec![subscriber("E1", "B", "Bob")];
    let menu = vec![menu_entry("2024-01-01", "lunch", "Soup", "A", dec!(5.0))];
    let orders = vec![order("E1", "2024-01-01", "lunch", 1, "2024-01-01 10:00")];

    let reports = build_reports(&roster, &menu, orders);
    assert_eq!(reports[0].items[0].meal_name, "Soup");
    assert_eq!(reports[0].items[0].unit_price, dec!(0));
    assert_eq!(reports[0].total_amount, dec!(0));
}

#[test]
fn subscriber_without_orders_gets_an_empty_report() {
    let roster = vec![subscriber("E1", "A", "Alice"), subscriber("E2", "A", "Bob")];
    let menu = vec![menu_entry("2024-01-01", "lunch", "Soup", "A", dec!(5.0))];
    let orders = vec![order("E1", "2024-01-01", "lunch", 1, "2024-01-01 10:00")];

    let reports = build_reports(&roster, &menu, orders);
    assert_eq!(reports.len(), 2);
    assert!(reports[1].is_empty());
    assert_eq!(reports[1].total_count, 0);
    assert_eq!(reports[1].total_amount, dec!(0));
}

#[test]
fn reports_follow_roster_order() {
    let roster = vec![
        subscriber("E9", "A", "Zoe"),
        subscriber("E1", "A", "Alice"),
        subscriber("E5", "A", "Mia"),
    ];
    let reports = build_reports(&roster, &[], Vec::new());
    let ids: Vec<&str> = reports.iter().map(|r| r.subscriber_id.as_str()).collect();
    assert_eq!(ids, ["E9", "E1", "E5"]);
}

#[test]
fn items_are_sorted_by_date_meal_then_time() {
    let roster = vec![subscriber("E1", "A", "Alice")];
    let orders = vec![
        order("E1", "2024-01-02", "lunch", 1, "2024-01-01 10:00"),
        order("E1", "2024-01-01", "lunch", 1, "2024-01-01 12:00"),
        order("E1", "2024-01-01", "dinner", 1, "2024-01-01 11:00"),
    ];

    let reports = build_reports(&roster, &[], orders);
    let items = &reports[0].items;
    assert!(items.windows(2).all(|pair| {
        (pair[0].date, &pair[0].meal_type, pair[0].ordered_at)
            <= (pair[1].date, &pair[1].meal_type, pair[1].ordered_at)
    }));
    assert_eq!(items[0].meal_type, "dinner");
    assert_eq!(items[0].date, day("2024-01-01"));
    assert_eq!(items[2].date, day("2024-01-02"));
}
