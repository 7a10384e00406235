//! Loaders for the legacy DBF tables. The rest of the crate only ever sees
//! decoded strings, parsed dates and `Decimal` prices; the code page and the
//! fixed date formats of the tables stay behind this module.

use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

use chrono::{NaiveDate, NaiveDateTime};
use dbase::{FieldValue, Record};
use log::info;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use thiserror::Error;

use crate::model::{MenuEntry, OrderRecord, Subscriber};
use crate::range::DateRange;

const SUBSCRIBER_TABLE: &str = "stravnik.dbf";
const ORDER_TABLE: &str = "objednav.dbf";
const MENU_TABLE: &str = "jidelnic.dbf";

const DATE_FORMAT: &str = "%Y%m%d";
const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

/// Price columns are named by tier: the tier code appended to this prefix.
const PRICE_PREFIX: &str = "CENA";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    /// Central-European code page the canteen tables are written in.
    Cp1250,
    Utf8,
}

#[derive(Debug, Clone)]
pub struct DbfConfig {
    pub data_dir: PathBuf,
    pub encoding: Encoding,
}

/// A load error is fatal for the affected table only; the caller logs it and
/// carries on with an empty list for that source.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("cannot read table: {0}")]
    Table(#[from] dbase::Error),
    #[error("field '{field}' is missing")]
    MissingField { field: String },
    #[error("field '{field}' value '{value}' is not a number")]
    BadNumber { field: String, value: String },
    #[error("field '{field}' value '{value}' is not a '{format}' date")]
    BadDate {
        field: String,
        value: String,
        format: &'static str,
    },
}

type DbfReader = dbase::Reader<BufReader<File>>;

// Deleted rows are dropped by the reader itself, so every record that comes
// out of `read()` is live.
fn open_table(cfg: &DbfConfig, table: &str) -> Result<DbfReader, LoadError> {
    let path = cfg.data_dir.join(table);
    let reader = match cfg.encoding {
        Encoding::Cp1250 => dbase::Reader::from_path_with_encoding(&path, yore::code_pages::CP1250)?,
        Encoding::Utf8 => dbase::Reader::from_path(&path)?,
    };
    Ok(reader)
}

pub fn load_subscribers(cfg: &DbfConfig) -> Result<Vec<Subscriber>, LoadError> {
    let mut reader = open_table(cfg, SUBSCRIBER_TABLE)?;
    let records = reader.read()?;
    info!("reading subscriber records: {}", records.len());

    let mut subscribers = Vec::with_capacity(records.len());
    for record in &records {
        subscribers.push(Subscriber {
            id: text_field(record, "EV_CISLO")?,
            price_tier: text_field(record, "CEN_SKUP")?,
            name: text_field(record, "JMENO")?,
        });
    }
    Ok(subscribers)
}

pub fn load_orders(cfg: &DbfConfig, range: &DateRange) -> Result<Vec<OrderRecord>, LoadError> {
    let mut reader = open_table(cfg, ORDER_TABLE)?;
    let records = reader.read()?;
    info!("reading order records: {}", records.len());

    let mut orders = Vec::new();
    for record in &records {
        let date = date_field(record, "DATUM")?;
        if !range.contains(date) {
            continue;
        }
        let quantity = int_field(record, "POCET")?;
        if quantity == 0 {
            continue;
        }
        orders.push(OrderRecord {
            date,
            meal_type: text_field(record, "DRUH")?,
            subscriber_id: text_field(record, "EV_CISLO")?,
            quantity,
            ordered_at: timestamp_field(record, "DATCAS_OBJ")?,
        });
    }
    Ok(orders)
}

pub fn load_menu(cfg: &DbfConfig, range: &DateRange) -> Result<Vec<MenuEntry>, LoadError> {
    let mut reader = open_table(cfg, MENU_TABLE)?;
    let price_fields: Vec<String> = reader
        .fields()
        .iter()
        .map(|field| field.name().to_string())
        .filter(|name| name.starts_with(PRICE_PREFIX) && name.len() > PRICE_PREFIX.len())
        .collect();
    let records = reader.read()?;
    info!("reading menu records: {}", records.len());

    let mut menu = Vec::new();
    for record in &records {
        let date = date_field(record, "DATUM")?;
        if !range.contains(date) {
            continue;
        }
        let mut prices = HashMap::new();
        for name in &price_fields {
            if let Some(value) = record.get(name) {
                if let Some(price) = price_value(value, name)? {
                    prices.insert(name[PRICE_PREFIX.len()..].to_string(), price);
                }
            }
        }
        menu.push(MenuEntry {
            date,
            meal_type: text_field(record, "DRUH")?,
            name: text_field(record, "NAZEV")?,
            prices,
        });
    }
    Ok(menu)
}

fn field<'a>(record: &'a Record, name: &str) -> Result<&'a FieldValue, LoadError> {
    record.get(name).ok_or_else(|| LoadError::MissingField {
        field: name.to_string(),
    })
}

fn text_field(record: &Record, name: &str) -> Result<String, LoadError> {
    Ok(text_value(field(record, name)?))
}

fn text_value(value: &FieldValue) -> String {
    match value {
        FieldValue::Character(Some(s)) => s.trim().to_string(),
        FieldValue::Character(None) => String::new(),
        other => other.to_string(),
    }
}

fn date_field(record: &Record, name: &str) -> Result<NaiveDate, LoadError> {
    parse_date(field(record, name)?, name)
}

fn parse_date(value: &FieldValue, name: &str) -> Result<NaiveDate, LoadError> {
    let bad = |raw: String| LoadError::BadDate {
        field: name.to_string(),
        value: raw,
        format: DATE_FORMAT,
    };
    match value {
        FieldValue::Date(Some(date)) => {
            NaiveDate::from_ymd_opt(date.year() as i32, date.month(), date.day())
                .ok_or_else(|| bad(format!("{date:?}")))
        }
        FieldValue::Date(None) => Err(bad(String::new())),
        other => {
            let raw = text_value(other);
            NaiveDate::parse_from_str(&raw, DATE_FORMAT).map_err(|_| bad(raw))
        }
    }
}

fn timestamp_field(record: &Record, name: &str) -> Result<NaiveDateTime, LoadError> {
    let raw = text_value(field(record, name)?);
    NaiveDateTime::parse_from_str(&raw, TIMESTAMP_FORMAT).map_err(|_| LoadError::BadDate {
        field: name.to_string(),
        value: raw,
        format: TIMESTAMP_FORMAT,
    })
}

fn int_field(record: &Record, name: &str) -> Result<i64, LoadError> {
    parse_int(field(record, name)?, name)
}

fn parse_int(value: &FieldValue, name: &str) -> Result<i64, LoadError> {
    let bad = |raw: String| LoadError::BadNumber {
        field: name.to_string(),
        value: raw,
    };
    match value {
        // Quantities are whole meals; a fractional value is bad data, not
        // something to round.
        FieldValue::Numeric(Some(n)) if n.fract() == 0.0 => Ok(*n as i64),
        FieldValue::Numeric(Some(n)) => Err(bad(n.to_string())),
        FieldValue::Integer(n) => Ok(i64::from(*n)),
        FieldValue::Numeric(None) => Err(bad(String::new())),
        other => {
            let raw = text_value(other);
            raw.parse().map_err(|_| bad(raw))
        }
    }
}

/// Parses one price column. Blank columns yield `None`, since not every tier
/// has a price on every menu day. A missing tier prices at zero.
fn price_value(value: &FieldValue, name: &str) -> Result<Option<Decimal>, LoadError> {
    let bad = |raw: String| LoadError::BadNumber {
        field: name.to_string(),
        value: raw,
    };
    match value {
        FieldValue::Numeric(Some(n)) => Decimal::from_f64(*n)
            .map(Some)
            .ok_or_else(|| bad(n.to_string())),
        FieldValue::Float(Some(n)) => Decimal::from_f64(f64::from(*n))
            .map(Some)
            .ok_or_else(|| bad(n.to_string())),
        FieldValue::Numeric(None) | FieldValue::Float(None) => Ok(None),
        other => {
            let raw = text_value(other);
            if raw.is_empty() {
                return Ok(None);
            }
            raw.parse().map(Some).map_err(|_| bad(raw))
        }
    }
}

#[cfg(test)]
use dbase::{FieldName, TableWriterBuilder};

#[cfg(test)]
fn character(s: &str) -> FieldValue {
    FieldValue::Character(Some(s.to_string()))
}

#[cfg(test)]
fn field_name(name: &str) -> FieldName {
    FieldName::try_from(name).unwrap()
}

#[cfg(test)]
fn january() -> DateRange {
    DateRange::new(
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
    )
}

#[cfg(test)]
fn order_row(date: &str, meal: &str, id: &str, quantity: f64, at: &str) -> Record {
    let mut record = Record::default();
    record.insert("DATUM".to_string(), character(date));
    record.insert("DRUH".to_string(), character(meal));
    record.insert("EV_CISLO".to_string(), character(id));
    record.insert("POCET".to_string(), FieldValue::Numeric(Some(quantity)));
    record.insert("DATCAS_OBJ".to_string(), character(at));
    record
}

#[cfg(test)]
fn menu_row(date: &str, meal: &str, name: &str, price: f64) -> Record {
    let mut record = Record::default();
    record.insert("DATUM".to_string(), character(date));
    record.insert("DRUH".to_string(), character(meal));
    record.insert("NAZEV".to_string(), character(name));
    record.insert("CENA1".to_string(), FieldValue::Numeric(Some(price)));
    record
}

#[test]
fn order_load_drops_out_of_range_and_zero_quantity_records() {
    let dir = tempfile::tempdir().unwrap();
    let writer = TableWriterBuilder::new()
        .add_character_field(field_name("DATUM"), 8)
        .add_character_field(field_name("DRUH"), 2)
        .add_character_field(field_name("EV_CISLO"), 10)
        .add_numeric_field(field_name("POCET"), 5, 0)
        .add_character_field(field_name("DATCAS_OBJ"), 14)
        .build_with_file_dest(dir.path().join(ORDER_TABLE))
        .unwrap();
    let records = vec![
        order_row("20240115", "2", "E1", 2.0, "20240114100000"),
        // dated past the range end, excluded from everything
        order_row("20240201", "2", "E1", 1.0, "20240131100000"),
        // cancelled order, discarded at load
        order_row("20240116", "2", "E1", 0.0, "20240115100000"),
    ];
    writer.write_records(&records).unwrap();

    let cfg = DbfConfig {
        data_dir: dir.path().to_path_buf(),
        encoding: Encoding::Utf8,
    };
    let orders = load_orders(&cfg, &january()).unwrap();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].date, NaiveDate::from_ymd_opt(2024, 1, 15).unwrap());
    assert_eq!(orders[0].subscriber_id, "E1");
    assert_eq!(orders[0].quantity, 2);
}

#[test]
fn menu_load_applies_the_date_range() {
    let dir = tempfile::tempdir().unwrap();
    let writer = TableWriterBuilder::new()
        .add_character_field(field_name("DATUM"), 8)
        .add_character_field(field_name("DRUH"), 2)
        .add_character_field(field_name("NAZEV"), 30)
        .add_numeric_field(field_name("CENA1"), 8, 2)
        .build_with_file_dest(dir.path().join(MENU_TABLE))
        .unwrap();
    let records = vec![
        menu_row("20240115", "2", "Soup", 27.5),
        menu_row("20240201", "2", "Goulash", 30.0),
    ];
    writer.write_records(&records).unwrap();

    let cfg = DbfConfig {
        data_dir: dir.path().to_path_buf(),
        encoding: Encoding::Utf8,
    };
    let menu = load_menu(&cfg, &january()).unwrap();
    assert_eq!(menu.len(), 1);
    assert_eq!(menu[0].name, "Soup");
    assert_eq!(menu[0].price_for("1"), Decimal::from_f64(27.5).unwrap());
}

#[test]
fn parses_character_dates() {
    let date = parse_date(&character("20240115"), "DATUM").unwrap();
    assert_eq!(date, NaiveDate::from_ymd_opt(2024, 1, 15).unwrap());
}

#[test]
fn rejects_malformed_dates() {
    let err = parse_date(&character("15.01.2024"), "DATUM").unwrap_err();
    assert!(matches!(err, LoadError::BadDate { .. }));
}

#[test]
fn parses_order_timestamps() {
    let raw = FieldValue::Character(Some("20240115103000".to_string()));
    let at = NaiveDateTime::parse_from_str(&text_value(&raw), TIMESTAMP_FORMAT).unwrap();
    assert_eq!(at.format("%Y-%m-%d %H:%M:%S").to_string(), "2024-01-15 10:30:00");
}

#[test]
fn numeric_prices_become_decimals() {
    let price = price_value(&FieldValue::Numeric(Some(27.5)), "CENA1").unwrap();
    assert_eq!(price, Some(Decimal::from_f64(27.5).unwrap()));
}

#[test]
fn blank_prices_are_skipped() {
    assert_eq!(price_value(&FieldValue::Numeric(None), "CENA1").unwrap(), None);
    assert_eq!(price_value(&character("   "), "CENA1").unwrap(), None);
}

#[test]
fn garbage_prices_fail_the_load() {
    let err = price_value(&character("n/a"), "CENA1").unwrap_err();
    assert!(matches!(err, LoadError::BadNumber { .. }));
}

#[test]
fn quantities_parse_from_numeric_and_character_fields() {
    assert_eq!(parse_int(&FieldValue::Numeric(Some(3.0)), "POCET").unwrap(), 3);
    assert_eq!(parse_int(&character("2"), "POCET").unwrap(), 2);
    assert_eq!(parse_int(&FieldValue::Integer(-1), "POCET").unwrap(), -1);
}

#[test]
fn fractional_quantities_fail_the_load() {
    assert!(matches!(
        parse_int(&FieldValue::Numeric(Some(3.7)), "POCET").unwrap_err(),
        LoadError::BadNumber { .. }
    ));
}

#[test]
fn non_numeric_quantities_fail_the_load() {
    assert!(matches!(
        parse_int(&character("two"), "POCET").unwrap_err(),
        LoadError::BadNumber { .. }
    ));
    assert!(matches!(
        parse_int(&FieldValue::Numeric(None), "POCET").unwrap_err(),
        LoadError::BadNumber { .. }
    ));
}
