//! `salesync rentals` — what was booked in one week.
//!
//! Looks at Booqable orders that start or stop inside a Monday–Sunday week.
//! Every order line becomes a [`RentalLine`] carrying the order's number and
//! its `client_code` / `job_site` properties; the report prints those lines
//! followed by units totalled per product.

use anyhow::Result;
use chrono::{Datelike, Duration, NaiveDate, Utc};
use serde::Serialize;
use std::path::Path;
use tracing::info;

use crate::booqable::{BooqableClient, LineAttributes, Order, OrderQuery};
use crate::config::Config;

/// One booked line, with the order context it belongs to.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct RentalLine {
    pub client_code: String,
    pub order_number: Option<i64>,
    pub job_site: String,
    pub units: i64,
    pub product_name: String,
}

/// Units of one product across the week's orders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductUnits {
    pub name: String,
    pub units: i64,
}

/// Monday and Sunday of the week `weeks_ago` weeks before `today`'s week.
pub fn week_bounds(today: NaiveDate, weeks_ago: u32) -> (NaiveDate, NaiveDate) {
    let anchor = today - Duration::weeks(i64::from(weeks_ago));
    let monday = anchor - Duration::days(i64::from(anchor.weekday().num_days_from_monday()));
    (monday, monday + Duration::days(6))
}

/// Attach `order`'s number and properties to each of its lines.
pub fn rental_lines(order: &Order, lines: &[LineAttributes]) -> Vec<RentalLine> {
    let client_code = order.attributes.property("client_code");
    let job_site = order.attributes.property("job_site");

    lines
        .iter()
        .map(|line| RentalLine {
            client_code: client_code.clone(),
            order_number: order.attributes.number,
            job_site: job_site.clone(),
            units: line.quantity,
            product_name: line.title.clone().unwrap_or_else(|| "Untitled".to_string()),
        })
        .collect()
}

/// Sum units per product, keeping first-seen order.
pub fn summarize(lines: &[RentalLine]) -> Vec<ProductUnits> {
    let mut summary: Vec<ProductUnits> = Vec::new();
    for line in lines {
        match summary.iter_mut().find(|p| p.name == line.product_name) {
            Some(existing) => existing.units += line.units,
            None => summary.push(ProductUnits {
                name: line.product_name.clone(),
                units: line.units,
            }),
        }
    }
    summary
}

/// Fetch every line booked between `from` and `till`, in order listing order.
pub async fn collect_rentals(
    client: &BooqableClient,
    from: NaiveDate,
    till: NaiveDate,
) -> Result<Vec<RentalLine>> {
    let orders = client.orders(&OrderQuery::active_between(from, till)).await?;
    info!(orders = orders.len(), "fetched rental orders");

    let mut rows = Vec::new();
    for order in &orders {
        let lines = client.order_lines(&order.id).await?;
        rows.extend(rental_lines(order, &lines));
    }
    Ok(rows)
}

pub async fn run_rentals(config: &Config, weeks_ago: u32, csv_out: Option<&Path>) -> Result<()> {
    let client = BooqableClient::new(config.booqable()?)?;
    let (from, till) = week_bounds(Utc::now().date_naive(), weeks_ago);
    info!(%from, %till, "building rental summary");

    let rows = collect_rentals(&client, from, till).await?;

    if let Some(path) = csv_out {
        write_csv(&rows, path)?;
        println!("wrote {} rental lines to {}", rows.len(), path.display());
        return Ok(());
    }

    println!("rentals {} to {}", from, till);
    println!();
    println!(
        "{:<12} {:>8} {:<28} {:>6}  {}",
        "CLIENT", "ORDER", "JOB SITE", "UNITS", "PRODUCT"
    );
    for row in &rows {
        println!(
            "{:<12} {:>8} {:<28} {:>6}  {}",
            row.client_code,
            row.order_number.map(|n| n.to_string()).unwrap_or_default(),
            row.job_site,
            row.units,
            row.product_name
        );
    }

    println!();
    println!("{:<40} {:>8}", "PRODUCT", "UNITS");
    for product in summarize(&rows) {
        println!("{:<40} {:>8}", product.name, product.units);
    }
    Ok(())
}

fn write_csv(rows: &[RentalLine], path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let mut writer = csv::Writer::from_path(path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}
