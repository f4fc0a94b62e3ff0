//! Transaction records and the CSV adapter that produces them.
//!
//! Column lookup is resolved once from the header row. A column that is not
//! present in the file behaves exactly like an empty cell: the field is
//! missing and nothing else about the row changes.

use std::collections::HashMap;
use std::io::Read;

use chrono::NaiveDate;
use csv::StringRecord;
use serde::{Deserialize, Serialize};

use crate::coerce::{parse_integer, parse_number};

/// Input column names. The default matches the public Seoul apartment
/// transaction dataset headers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMap {
    pub contract_year_month: String,
    pub address: String,
    pub area: String,
    pub floor: String,
    pub construction_year: String,
    pub price: String,
    pub coord_x: String,
    pub coord_y: String,
    pub total_households: String,
    pub total_buildings: String,
    pub parking: String,
}

impl Default for ColumnMap {
    fn default() -> Self {
        Self {
            contract_year_month: "계약년월".to_string(),
            address: "시군구".to_string(),
            area: "전용면적(㎡)".to_string(),
            floor: "층".to_string(),
            construction_year: "건축년도".to_string(),
            price: "target".to_string(),
            coord_x: "좌표X".to_string(),
            coord_y: "좌표Y".to_string(),
            total_households: "k-전체세대수".to_string(),
            total_buildings: "k-전체동수".to_string(),
            parking: "주차대수".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContractPeriod {
    pub year: i32,
    pub month: Option<u32>,
}

impl ContractPeriod {
    /// Parses a `YYYYMM` contract stamp. A valid year with an unusable month
    /// still yields a period so yearly statistics keep the record.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        let year_digits = trimmed.get(..4)?;
        if !year_digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let year = year_digits.parse::<i32>().ok()?;

        let month = trimmed
            .get(4..6)
            .filter(|digits| digits.bytes().all(|b| b.is_ascii_digit()))
            .and_then(|digits| digits.parse::<u32>().ok())
            .filter(|month| NaiveDate::from_ymd_opt(year, *month, 1).is_some());

        Some(Self { year, month })
    }

    pub fn year_key(&self) -> String {
        format!("{:04}", self.year)
    }

    pub fn month_key(&self) -> Option<String> {
        self.month
            .map(|month| format!("{:04}{:02}", self.year, month))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub contract: Option<ContractPeriod>,
    pub district: String,
    pub sub_district: String,
    pub area_m2: Option<f64>,
    pub floor: Option<i64>,
    pub construction_year: Option<i64>,
    pub coord_x: Option<f64>,
    pub coord_y: Option<f64>,
    pub total_households: Option<f64>,
    pub total_buildings: Option<f64>,
    pub parking: Option<f64>,
    pub price: Option<f64>,
}

impl Record {
    pub fn contract_year(&self) -> Option<i64> {
        self.contract.map(|period| i64::from(period.year))
    }

    pub fn contract_month(&self) -> Option<u32> {
        self.contract.and_then(|period| period.month)
    }

    /// The price when it can enter statistics. Negative prices are treated
    /// like an unparseable cell.
    pub fn sale_price(&self) -> Option<f64> {
        self.price.filter(|price| *price >= 0.0)
    }
}

/// Splits `"<city> <district> <sub-district> ..."` into district and
/// sub-district. Missing tokens fall back to the whole (trimmed) address.
pub fn parse_address(raw: &str) -> (String, String) {
    let trimmed = raw.trim();
    let parts: Vec<&str> = trimmed.split_whitespace().collect();
    let district = parts.get(1).copied().unwrap_or(trimmed).to_string();
    let sub_district = parts.get(2).copied().unwrap_or(trimmed).to_string();
    (district, sub_district)
}

#[derive(Debug, Clone, Default)]
struct ResolvedColumns {
    contract_year_month: Option<usize>,
    address: Option<usize>,
    area: Option<usize>,
    floor: Option<usize>,
    construction_year: Option<usize>,
    price: Option<usize>,
    coord_x: Option<usize>,
    coord_y: Option<usize>,
    total_households: Option<usize>,
    total_buildings: Option<usize>,
    parking: Option<usize>,
}

impl ResolvedColumns {
    fn resolve(headers: &StringRecord, columns: &ColumnMap) -> Self {
        let index: HashMap<&str, usize> = headers
            .iter()
            .enumerate()
            .map(|(idx, name)| (name.trim().trim_start_matches('\u{feff}'), idx))
            .collect();
        let find = |name: &str| index.get(name).copied();

        Self {
            contract_year_month: find(&columns.contract_year_month),
            address: find(&columns.address),
            area: find(&columns.area),
            floor: find(&columns.floor),
            construction_year: find(&columns.construction_year),
            price: find(&columns.price),
            coord_x: find(&columns.coord_x),
            coord_y: find(&columns.coord_y),
            total_households: find(&columns.total_households),
            total_buildings: find(&columns.total_buildings),
            parking: find(&columns.parking),
        }
    }

    fn missing(&self, columns: &ColumnMap) -> Vec<String> {
        [
            (self.contract_year_month, &columns.contract_year_month),
            (self.address, &columns.address),
            (self.area, &columns.area),
            (self.floor, &columns.floor),
            (self.construction_year, &columns.construction_year),
            (self.price, &columns.price),
            (self.coord_x, &columns.coord_x),
            (self.coord_y, &columns.coord_y),
            (self.total_households, &columns.total_households),
            (self.total_buildings, &columns.total_buildings),
            (self.parking, &columns.parking),
        ]
        .into_iter()
        .filter(|(idx, _)| idx.is_none())
        .map(|(_, name)| name.clone())
        .collect()
    }
}

fn field(record: &StringRecord, idx: Option<usize>) -> Option<&str> {
    idx.and_then(|idx| record.get(idx))
}

fn record_from_row(row: &StringRecord, columns: &ResolvedColumns) -> Record {
    let (district, sub_district) = parse_address(field(row, columns.address).unwrap_or_default());

    Record {
        contract: field(row, columns.contract_year_month).and_then(ContractPeriod::parse),
        district,
        sub_district,
        area_m2: parse_number(field(row, columns.area)),
        floor: parse_integer(field(row, columns.floor)),
        construction_year: parse_integer(field(row, columns.construction_year)),
        coord_x: parse_number(field(row, columns.coord_x)),
        coord_y: parse_number(field(row, columns.coord_y)),
        total_households: parse_number(field(row, columns.total_households)),
        total_buildings: parse_number(field(row, columns.total_buildings)),
        parking: parse_number(field(row, columns.parking)),
        price: parse_number(field(row, columns.price)),
    }
}

/// Streams [`Record`]s out of a headed CSV source, one row at a time.
pub struct RecordReader<R: Read> {
    reader: csv::Reader<R>,
    columns: ResolvedColumns,
    missing_columns: Vec<String>,
    row: StringRecord,
}

impl<R: Read> RecordReader<R> {
    pub fn new(source: R, columns: &ColumnMap) -> Result<Self, csv::Error> {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(source);
        let headers = reader.headers()?.clone();
        let resolved = ResolvedColumns::resolve(&headers, columns);
        let missing_columns = resolved.missing(columns);

        Ok(Self {
            reader,
            columns: resolved,
            missing_columns,
            row: StringRecord::new(),
        })
    }

    /// Configured columns absent from the header row.
    pub fn missing_columns(&self) -> &[String] {
        &self.missing_columns
    }
}

impl<R: Read> Iterator for RecordReader<R> {
    type Item = Result<Record, csv::Error>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.reader.read_record(&mut self.row) {
            Ok(true) => Some(Ok(record_from_row(&self.row, &self.columns))),
            Ok(false) => None,
            Err(err) => Some(Err(err)),
        }
    }
}
