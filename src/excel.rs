//! Turns the aggregated reports into the billing workbook: one sheet per
//! subscriber with orders, plus a summary sheet with the monthly totals.

use log::info;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_xlsxwriter::{Format, Formula, Workbook, Worksheet, XlsxError};

use crate::model::SubscriberReport;
use crate::range::DateRange;

const SUMMARY_SHEET: &str = "Summary";
// xlsx caps sheet names at 31 characters
const SHEET_NAME_LIMIT: usize = 31;

pub fn report_file_name(range: &DateRange) -> String {
    format!(
        "report_{}_{}.xlsx",
        range.from.format("%d-%m-%Y"),
        range.to.format("%d-%m-%Y")
    )
}

/// Builds the workbook. Subscribers without any order get neither a sheet
/// nor a summary row; their IDs are only logged.
pub fn render(reports: &[SubscriberReport]) -> Result<Workbook, XlsxError> {
    info!("generating excel report");
    let mut workbook = Workbook::new();
    let date_format = Format::new().set_num_format("dd.mm.yyyy");

    // the summary goes first so it opens as the first tab
    workbook.add_worksheet().set_name(SUMMARY_SHEET)?;

    let mut total_count: i64 = 0;
    let mut total_amount = Decimal::ZERO;
    let mut skipped: Vec<&str> = Vec::new();

    for report in reports {
        if report.is_empty() {
            skipped.push(&report.subscriber_id);
            continue;
        }
        let sheet = workbook.add_worksheet();
        sheet.set_name(sheet_name(&report.subscriber_id))?;
        write_subscriber_sheet(sheet, report, &date_format)?;
        total_count += report.total_count;
        total_amount += report.total_amount;
    }
    if !skipped.is_empty() {
        info!("skipping sheets for subscribers without orders: {skipped:?}");
    }

    let summary = workbook.worksheet_from_name(SUMMARY_SHEET)?;
    summary.set_column_width(0, 50)?;
    let mut row: u32 = 0;
    for report in reports {
        if report.total_amount.is_zero() {
            continue;
        }
        summary.write_string(row, 0, &report.owner)?;
        summary.write_number(row, 1, report.total_amount.to_f64().unwrap_or(0.0))?;
        row += 1;
    }
    summary.write_string(row, 0, "Total count:")?;
    summary.write_number(row, 1, total_count as f64)?;
    row += 1;
    summary.write_string(row, 0, "Total amount:")?;
    summary.write_number(row, 1, total_amount.to_f64().unwrap_or(0.0))?;

    Ok(workbook)
}

fn write_subscriber_sheet(
    sheet: &mut Worksheet,
    report: &SubscriberReport,
    date_format: &Format,
) -> Result<(), XlsxError> {
    sheet.set_column_width(0, 20)?;
    sheet.set_column_width(2, 70)?;

    sheet.write_string(0, 0, &report.owner)?;
    for (col, header) in ["Date", "Meal", "Name", "Qty", "Price", "Total"]
        .iter()
        .enumerate()
    {
        sheet.write_string(1, col as u16, *header)?;
    }

    let mut row: u32 = 2;
    for item in &report.items {
        sheet.write_datetime_with_format(row, 0, &item.date, date_format)?;
        sheet.write_string(row, 1, &item.meal_type)?;
        sheet.write_string(row, 2, &item.meal_name)?;
        sheet.write_number(row, 3, item.quantity as f64)?;
        sheet.write_number(row, 4, item.unit_price.to_f64().unwrap_or(0.0))?;
        sheet.write_number(row, 5, item.line_total.to_f64().unwrap_or(0.0))?;
        row += 1;
    }
    // the formula rows are 1-indexed: items sit in rows 3..=row
    sheet.write_string(row, 0, "Summary:")?;
    sheet.write_formula(row, 3, Formula::new(format!("=SUM(D3:D{row})")))?;
    sheet.write_formula(row, 5, Formula::new(format!("=SUM(F3:F{row})")))?;
    Ok(())
}

fn sheet_name(id: &str) -> &str {
    match id.char_indices().nth(SHEET_NAME_LIMIT) {
        Some((pos, _)) => &id[..pos],
        None => id,
    }
}

#[cfg(test)]
use crate::model::ReportLineItem;
#[cfg(test)]
use chrono::{NaiveDate, NaiveDateTime};
#[cfg(test)]
use rust_decimal_macros::dec;

#[cfg(test)]
fn sample_report(id: &str, owner: &str, items: usize) -> SubscriberReport {
    let item = ReportLineItem {
        date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        meal_type: "2".to_string(),
        ordered_at: NaiveDateTime::parse_from_str("2024-01-01 10:00", "%Y-%m-%d %H:%M").unwrap(),
        meal_name: "Soup".to_string(),
        quantity: 1,
        unit_price: dec!(5.0),
        line_total: dec!(5.0),
    };
    SubscriberReport {
        subscriber_id: id.to_string(),
        owner: owner.to_string(),
        items: vec![item; items],
        total_count: items as i64,
        total_amount: dec!(5.0) * Decimal::from(items as i64),
    }
}

#[test]
fn file_name_encodes_the_range() {
    let range = DateRange::new(
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
    );
    assert_eq!(report_file_name(&range), "report_01-01-2024_31-01-2024.xlsx");
}

#[test]
fn sheet_names_are_capped_at_31_chars() {
    assert_eq!(sheet_name("E1"), "E1");
    let long = "X".repeat(40);
    assert_eq!(sheet_name(&long).len(), 31);
}

#[test]
fn workbook_renders_to_a_valid_buffer() {
    let reports = vec![
        sample_report("E1", "Alice", 2),
        sample_report("E2", "Bob", 0),
    ];
    let mut workbook = render(&reports).unwrap();
    let buffer = workbook.save_to_buffer().unwrap();
    // xlsx files are zip archives
    assert_eq!(&buffer[..2], b"PK");
}

#[test]
fn duplicate_sheet_names_are_a_render_error() {
    let reports = vec![
        sample_report("E1", "Alice", 1),
        sample_report("E1", "Alice again", 1),
    ];
    assert!(render(&reports).is_err());
}
