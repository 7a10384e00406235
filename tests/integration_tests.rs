use std::collections::HashMap;

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal_macros::dec;

use steward::build_reports;
use steward::excel;
use steward::model::{MenuEntry, OrderRecord, Subscriber};
use steward::range::DateRange;

fn day(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

fn at(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").unwrap()
}

#[test]
fn monthly_report_end_to_end() {
    let range = DateRange::new(day("2024-01-01"), day("2024-01-31"));
    let roster = vec![
        Subscriber {
            id: "E1".to_string(),
            price_tier: "1".to_string(),
            name: "Alice".to_string(),
        },
        Subscriber {
            id: "E2".to_string(),
            price_tier: "2".to_string(),
            name: "Bob".to_string(),
        },
    ];
    let menu = vec![MenuEntry {
        date: day("2024-01-01"),
        meal_type: "2".to_string(),
        name: "Soup".to_string(),
        prices: HashMap::from([("1".to_string(), dec!(5.0)), ("2".to_string(), dec!(7.5))]),
    }];
    let orders = vec![
        // resubmitted order, the 11:00 one is billed
        OrderRecord {
            date: day("2024-01-01"),
            meal_type: "2".to_string(),
            subscriber_id: "E1".to_string(),
            quantity: 2,
            ordered_at: at("2024-01-01 10:00"),
        },
        OrderRecord {
            date: day("2024-01-01"),
            meal_type: "2".to_string(),
            subscriber_id: "E1".to_string(),
            quantity: 3,
            ordered_at: at("2024-01-01 11:00"),
        },
        // no menu entry for this day, billed at zero
        OrderRecord {
            date: day("2024-01-02"),
            meal_type: "2".to_string(),
            subscriber_id: "E1".to_string(),
            quantity: 1,
            ordered_at: at("2024-01-02 09:00"),
        },
    ];

    let reports = build_reports(&roster, &menu, orders);

    assert_eq!(reports.len(), 2);
    let alice = &reports[0];
    assert_eq!(alice.items.len(), 2);
    assert_eq!(alice.items[0].quantity, 3);
    assert_eq!(alice.items[0].line_total, dec!(15.0));
    assert_eq!(alice.items[1].meal_name, "");
    assert_eq!(alice.items[1].line_total, dec!(0));
    assert_eq!(alice.total_count, 4);
    assert_eq!(alice.total_amount, dec!(15.0));

    let bob = &reports[1];
    assert!(bob.is_empty());
    assert_eq!(bob.total_amount, dec!(0));

    let mut workbook = excel::render(&reports).unwrap();
    let buffer = workbook.save_to_buffer().unwrap();
    assert!(!buffer.is_empty());
    assert_eq!(excel::report_file_name(&range), "report_01-01-2024_31-01-2024.xlsx");
}
