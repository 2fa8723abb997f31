#![allow(dead_code)]

use std::fs;
use std::path::Path;

use chrono::NaiveDate;

pub const PREAMBLE: &str = "\\\\\nCREATED AT 2024/03/01 04:12:31 FOR 2024/02\nIESO Generator Output and Capability Month Report\n";

/// One wide row: (date, generator, fuel type, measurement, sparse hour cells).
pub struct WideRow<'a> {
    pub date: &'a str,
    pub generator: &'a str,
    pub fuel_type: &'a str,
    pub measurement: &'a str,
    pub hours: &'a [(u32, &'a str)],
}

pub fn wide_header() -> String {
    let mut columns = vec![
        "Delivery Date".to_string(),
        "Generator".to_string(),
        "Fuel Type".to_string(),
        "Measurement".to_string(),
    ];
    columns.extend((1..=24).map(|hour| format!("Hour {hour}")));
    columns.join(",")
}

pub fn monthly_csv(rows: &[WideRow<'_>]) -> String {
    let mut body = String::from(PREAMBLE);
    body.push_str(&wide_header());
    body.push('\n');
    for row in rows {
        let mut cells = vec![
            row.date.to_string(),
            row.generator.to_string(),
            row.fuel_type.to_string(),
            row.measurement.to_string(),
        ];
        cells.extend((1..=24).map(|hour| {
            row.hours
                .iter()
                .find(|(h, _)| *h == hour)
                .map(|(_, value)| value.to_string())
                .unwrap_or_default()
        }));
        body.push_str(&cells.join(","));
        body.push('\n');
    }
    body
}

pub fn intertie_xml(date: NaiveDate, hours: &[u32]) -> String {
    let entries: String = hours
        .iter()
        .map(|hour| {
            format!(
                "<Schedule><Hour>{hour}</Hour><EnergyMWhr><Import>{}</Import><Export>{}</Export></EnergyMWhr></Schedule>",
                1000 + hour,
                400 + hour
            )
        })
        .collect();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<IMODocument xmlns="http://www.theIMO.com/schema">
  <IMODocHeader><DocTitle>Intertie Schedules and Flows Report</DocTitle></IMODocHeader>
  <IMODocBody>
    <Date>{date}</Date>
    <Totals>
      <Schedules>{entries}</Schedules>
    </Totals>
  </IMODocBody>
</IMODocument>"#
    )
}

pub fn load_xml(date: NaiveDate, hours: &[u32]) -> String {
    let blocks: String = hours
        .iter()
        .map(|hour| {
            format!(
                "<HourlyConstrainedEnergy><DeliveryHour>{hour}</DeliveryHour>\
                 <MQ><MarketQuantity>Total Energy</MarketQuantity><EnergyMW>{}</EnergyMW></MQ>\
                 <MQ><MarketQuantity>Total Loss</MarketQuantity><EnergyMW>310.2</EnergyMW></MQ>\
                 <MQ><MarketQuantity>Total Load</MarketQuantity><EnergyMW>{}</EnergyMW></MQ>\
                 </HourlyConstrainedEnergy>",
                15_000 + hour,
                14_500 + hour
            )
        })
        .collect();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<Document xmlns="http://www.ieso.ca/schema">
  <DocHeader><DocTitle>Day-Ahead Constrained Totals Report</DocTitle></DocHeader>
  <DocBody>
    <DeliveryDate>{date}</DeliveryDate>
    <Energies>{blocks}</Energies>
  </DocBody>
</Document>"#
    )
}

pub fn write_file(path: &Path, body: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("parent directory should be creatable");
    }
    fs::write(path, body).expect("fixture should be written");
}

pub fn all_hours() -> Vec<u32> {
    (1..=24).collect()
}
