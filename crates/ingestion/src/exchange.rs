//! Adapters for the exchange's daily report feeds.
//!
//! The exchange publishes three JSON reports, all shaped as
//! `{ "stat": "OK", "data": [[...], ...] }` with every cell a display string:
//! - monthly price history per security (one row per trading day),
//! - daily institutional flow for all securities,
//! - daily valuation ratios for all securities.
//!
//! Price rows carry Minguo-calendar dates (`113/01/02` is 2024-01-02).
//! HTTP itself is left to a [`Transport`].

use crate::source::{walk_days, FetchError, Source};
use chrono::{Datelike, NaiveDate};
use daybook_core::{Error, PartialRecord, Result, SourceField, SourceKind};
use serde::Deserialize;
use tracing::{debug, warn};

/// Offset between the Minguo calendar and the Gregorian year.
pub const MINGUO_YEAR_OFFSET: i32 = 1911;

/// Default report host.
pub const DEFAULT_BASE_URL: &str = "https://www.twse.com.tw";

/// Convert a Minguo date (`YYY/MM/DD`) to a calendar date.
pub fn parse_minguo_date(s: &str) -> Result<NaiveDate> {
    let parts: Vec<&str> = s.trim().split('/').collect();
    if parts.len() != 3 {
        return Err(Error::data(format!("malformed Minguo date {s:?}")));
    }
    let num = |p: &str| -> Result<u32> {
        p.trim()
            .parse::<u32>()
            .map_err(|_| Error::data(format!("malformed Minguo date {s:?}")))
    };
    let year = num(parts[0])? as i32 + MINGUO_YEAR_OFFSET;
    NaiveDate::from_ymd_opt(year, num(parts[1])?, num(parts[2])?)
        .ok_or_else(|| Error::data(format!("invalid Minguo date {s:?}")))
}

/// Report envelope shared by all feeds.
#[derive(Debug, Clone, Deserialize)]
pub struct ReportResponse {
    pub stat: String,
    #[serde(default)]
    pub data: Option<Vec<Vec<String>>>,
}

impl ReportResponse {
    pub fn from_json(s: &str) -> Result<Self> {
        Ok(serde_json::from_str(s)?)
    }

    pub fn is_ok(&self) -> bool {
        self.stat == "OK"
    }

    /// Data rows, empty unless the report is OK.
    pub fn rows(&self) -> &[Vec<String>] {
        match (&self.data, self.is_ok()) {
            (Some(rows), true) => rows,
            _ => &[],
        }
    }
}

/// Price report column layout.
const PRICE_COLUMNS: [(usize, SourceField); 8] = [
    (1, SourceField::Shares),
    (2, SourceField::Value),
    (3, SourceField::Open),
    (4, SourceField::High),
    (5, SourceField::Low),
    (6, SourceField::Close),
    (7, SourceField::Change),
    (8, SourceField::Transactions),
];

/// Institutional report column layout (foreign figures exclude foreign dealers).
const INSTITUTIONAL_COLUMNS: [(usize, SourceField); 8] = [
    (2, SourceField::ForeignBuy),
    (3, SourceField::ForeignSell),
    (4, SourceField::ForeignNet),
    (8, SourceField::TrustBuy),
    (9, SourceField::TrustSell),
    (10, SourceField::TrustNet),
    (11, SourceField::DealerNet),
    (18, SourceField::InstitutionalTotal),
];

const FUNDAMENTAL_COLUMNS: [(usize, SourceField); 5] = [
    (2, SourceField::DividendYield),
    (3, SourceField::DividendYear),
    (4, SourceField::PeRatio),
    (5, SourceField::PbRatio),
    (6, SourceField::ReportPeriod),
];

fn build_record(
    kind: SourceKind,
    security_id: &str,
    date: NaiveDate,
    row: &[String],
    columns: &[(usize, SourceField)],
) -> Result<PartialRecord> {
    let needed = columns.iter().map(|(i, _)| i + 1).max().unwrap_or(0);
    if row.len() < needed {
        return Err(Error::data(format!(
            "{kind} row for {security_id} on {date} has {} columns, expected {needed}",
            row.len()
        )));
    }
    Ok(columns
        .iter()
        .fold(PartialRecord::new(kind, security_id, date), |rec, &(i, field)| {
            rec.with(field, row[i].trim())
        }))
}

/// Convert price report rows, keeping dates within `[start, end]`.
///
/// Malformed rows are logged and skipped.
pub fn price_records(
    security_id: &str,
    rows: &[Vec<String>],
    start: NaiveDate,
    end: NaiveDate,
) -> Vec<PartialRecord> {
    rows.iter()
        .filter_map(|row| {
            let date = match row.first().map(|s| parse_minguo_date(s)) {
                Some(Ok(date)) => date,
                Some(Err(err)) => {
                    warn!(security_id, %err, "skipping price row");
                    return None;
                }
                None => return None,
            };
            if date < start || date > end {
                return None;
            }
            build_record(SourceKind::Price, security_id, date, row, &PRICE_COLUMNS)
                .map_err(|err| warn!(%err, "skipping price row"))
                .ok()
        })
        .collect()
}

fn find_row<'a>(security_id: &str, rows: &'a [Vec<String>]) -> Option<&'a Vec<String>> {
    rows.iter()
        .find(|row| row.first().map(|s| s.trim()) == Some(security_id))
}

/// Pick the security's row from a daily institutional report.
pub fn institutional_record(
    security_id: &str,
    date: NaiveDate,
    rows: &[Vec<String>],
) -> Result<Option<PartialRecord>> {
    find_row(security_id, rows)
        .map(|row| build_record(SourceKind::Institutional, security_id, date, row, &INSTITUTIONAL_COLUMNS))
        .transpose()
}

/// Pick the security's row from a daily valuation report.
pub fn fundamental_record(
    security_id: &str,
    date: NaiveDate,
    rows: &[Vec<String>],
) -> Result<Option<PartialRecord>> {
    find_row(security_id, rows)
        .map(|row| build_record(SourceKind::Fundamental, security_id, date, row, &FUNDAMENTAL_COLUMNS))
        .transpose()
}

/// First day of every month touching `[start, end]`.
pub fn month_starts(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    let mut months = Vec::new();
    let mut current = NaiveDate::from_ymd_opt(start.year(), start.month(), 1);
    while let Some(month) = current {
        if month > end {
            break;
        }
        months.push(month);
        current = if month.month() == 12 {
            NaiveDate::from_ymd_opt(month.year() + 1, 1, 1)
        } else {
            NaiveDate::from_ymd_opt(month.year(), month.month() + 1, 1)
        };
    }
    months
}

/// Blocking GET returning the response body.
pub trait Transport: Sync {
    fn get(&self, url: &str) -> std::result::Result<String, FetchError>;
}

/// A [`Source`] backed by one of the exchange reports.
pub struct ExchangeSource<T: Transport> {
    kind: SourceKind,
    base_url: String,
    transport: T,
}

impl<T: Transport> ExchangeSource<T> {
    /// Create a source for `kind` against the default host.
    pub fn new(kind: SourceKind, transport: T) -> Self {
        Self {
            kind,
            base_url: DEFAULT_BASE_URL.to_string(),
            transport,
        }
    }

    /// Override the report host.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Report URL for a security and query date.
    pub fn url(&self, security_id: &str, date: NaiveDate) -> String {
        let base = &self.base_url;
        match self.kind {
            SourceKind::Price => format!(
                "{base}/exchangeReport/STOCK_DAY?response=json&date={}&stockNo={security_id}",
                date.format("%Y%m01")
            ),
            SourceKind::Institutional => format!(
                "{base}/rwd/zh/fund/T86?date={}&selectType=ALLBUT0999&response=json",
                date.format("%Y%m%d")
            ),
            SourceKind::Fundamental => format!(
                "{base}/rwd/zh/afterTrading/BWIBBU_d?date={}&selectType=ALL&response=json",
                date.format("%Y%m%d")
            ),
        }
    }

    fn report(&self, security_id: &str, date: NaiveDate) -> std::result::Result<ReportResponse, FetchError> {
        let url = self.url(security_id, date);
        debug!(%url, "requesting report");
        let body = self.transport.get(&url)?;
        ReportResponse::from_json(&body).map_err(|err| FetchError::Malformed(err.to_string()))
    }

    fn month_records(
        &self,
        security_id: &str,
        month: NaiveDate,
        start: NaiveDate,
        end: NaiveDate,
    ) -> std::result::Result<Vec<PartialRecord>, FetchError> {
        let report = self.report(security_id, month)?;
        Ok(price_records(security_id, report.rows(), start, end))
    }
}

impl<T: Transport> Source for ExchangeSource<T> {
    fn kind(&self) -> SourceKind {
        self.kind
    }

    fn fetch(&self, security_id: &str, date: NaiveDate) -> std::result::Result<Option<PartialRecord>, FetchError> {
        match self.kind {
            SourceKind::Price => Ok(self
                .month_records(security_id, date, date, date)?
                .into_iter()
                .next()),
            SourceKind::Institutional => {
                let report = self.report(security_id, date)?;
                Ok(institutional_record(security_id, date, report.rows())?)
            }
            SourceKind::Fundamental => {
                let report = self.report(security_id, date)?;
                Ok(fundamental_record(security_id, date, report.rows())?)
            }
        }
    }

    /// Price history is published per month, so the range is fetched one
    /// month at a time. Other reports fall back to the daily walk.
    fn fetch_range(
        &self,
        security_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> std::result::Result<Vec<PartialRecord>, FetchError> {
        if self.kind != SourceKind::Price {
            return Ok(walk_days(self, security_id, start, end));
        }

        let mut records = Vec::new();
        for month in month_starts(start, end) {
            match self.month_records(security_id, month, start, end) {
                Ok(batch) => records.extend(batch),
                Err(err) => warn!(security_id, %month, %err, "price month fetch failed"),
            }
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|s| s.to_string()).collect()
    }

    struct FakeTransport {
        bodies: HashMap<String, String>,
        requested: Mutex<Vec<String>>,
    }

    impl FakeTransport {
        fn new() -> Self {
            Self {
                bodies: HashMap::new(),
                requested: Mutex::new(Vec::new()),
            }
        }

        fn with(mut self, url_part: &str, body: &str) -> Self {
            self.bodies.insert(url_part.to_string(), body.to_string());
            self
        }
    }

    impl Transport for FakeTransport {
        fn get(&self, url: &str) -> std::result::Result<String, FetchError> {
            self.requested.lock().unwrap().push(url.to_string());
            self.bodies
                .iter()
                .find(|(part, _)| url.contains(part.as_str()))
                .map(|(_, body)| body.clone())
                .ok_or_else(|| FetchError::Network(format!("no route for {url}")))
        }
    }

    #[test]
    fn test_parse_minguo_date() {
        assert_eq!(parse_minguo_date("113/01/02").unwrap(), d(2024, 1, 2));
        assert_eq!(parse_minguo_date(" 99/12/31 ").unwrap(), d(2010, 12, 31));
        assert!(parse_minguo_date("113-01-02").is_err());
        assert!(parse_minguo_date("113/02/30").is_err());
        assert!(parse_minguo_date("abc/01/02").is_err());
    }

    #[test]
    fn test_report_rows_require_ok() {
        let ok = ReportResponse::from_json(r#"{"stat":"OK","data":[["a"]]}"#).unwrap();
        assert_eq!(ok.rows().len(), 1);
        let bad = ReportResponse::from_json(r#"{"stat":"很抱歉，沒有符合條件的資料!","data":[["a"]]}"#).unwrap();
        assert!(bad.rows().is_empty());
        let missing = ReportResponse::from_json(r#"{"stat":"OK"}"#).unwrap();
        assert!(missing.rows().is_empty());
    }

    #[test]
    fn test_price_records_filter_range() {
        let rows = vec![
            row(&["112/12/29", "1,000", "590,000", "589", "593", "588", "593", "+4.00", "100"]),
            row(&["113/01/02", "2,000", "1,180,000", "590", "593", "589", "593", " 0.00", "200"]),
            row(&["bad", "1", "1", "1", "1", "1", "1", "1", "1"]),
            row(&["113/01/03", "3,000"]),
        ];
        let records = price_records("2330", &rows, d(2024, 1, 1), d(2024, 1, 31));
        assert_eq!(records.len(), 1);
        let rec = &records[0];
        assert_eq!(rec.date, d(2024, 1, 2));
        assert_eq!(rec.source, SourceKind::Price);
        assert_eq!(rec.values.get("shares").map(String::as_str), Some("2,000"));
        assert_eq!(rec.values.get("change").map(String::as_str), Some("0.00"));
        assert_eq!(rec.values.get("transactions").map(String::as_str), Some("200"));
    }

    #[test]
    fn test_institutional_record_columns() {
        let mut cells: Vec<String> = (0..19).map(|i| format!("c{i}")).collect();
        cells[0] = "2330 ".to_string();
        let rows = vec![row(&["2317", "x"]), cells];
        let rec = institutional_record("2330", d(2024, 1, 2), &rows).unwrap().unwrap();
        assert_eq!(rec.values.get("foreign_buy").map(String::as_str), Some("c2"));
        assert_eq!(rec.values.get("trust_net").map(String::as_str), Some("c10"));
        assert_eq!(rec.values.get("dealer_net").map(String::as_str), Some("c11"));
        assert_eq!(rec.values.get("institutional_total").map(String::as_str), Some("c18"));
        assert_eq!(rec.values.len(), 8);

        assert!(institutional_record("1101", d(2024, 1, 2), &rows).unwrap().is_none());
    }

    #[test]
    fn test_short_row_is_data_error() {
        let rows = vec![row(&["2330", "name", "1"])];
        assert!(matches!(
            fundamental_record("2330", d(2024, 1, 2), &rows),
            Err(Error::Data(_))
        ));
    }

    #[test]
    fn test_month_starts() {
        let months = month_starts(d(2023, 11, 15), d(2024, 1, 3));
        assert_eq!(months, vec![d(2023, 11, 1), d(2023, 12, 1), d(2024, 1, 1)]);
        assert!(month_starts(d(2024, 2, 1), d(2024, 1, 1)).is_empty());
    }

    #[test]
    fn test_price_source_fetches_per_month() {
        let body = r#"{"stat":"OK","data":[
            ["113/01/02","1,000","1","590","591","589","590","+1.00","10"],
            ["113/01/03","2,000","1","590","596","589","595","+5.00","20"]
        ]}"#;
        let transport = FakeTransport::new().with("date=20240101&stockNo=2330", body);
        let source = ExchangeSource::new(SourceKind::Price, transport);

        let records = source.fetch_range("2330", d(2024, 1, 3), d(2024, 1, 10)).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].date, d(2024, 1, 3));
        assert_eq!(source.transport.requested.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_fundamental_source_single_day() {
        let body = r#"{"stat":"OK","data":[["2330","台積電","1.76","112","20.5","5.3","112/3"]]}"#;
        let transport = FakeTransport::new().with("BWIBBU_d?date=20240102", body);
        let source = ExchangeSource::new(SourceKind::Fundamental, transport).with_base_url("http://localhost/");

        let rec = source.fetch("2330", d(2024, 1, 2)).unwrap().unwrap();
        assert_eq!(rec.values.get("pe_ratio").map(String::as_str), Some("20.5"));
        assert_eq!(rec.values.get("report_period").map(String::as_str), Some("112/3"));
        assert!(source.url("2330", d(2024, 1, 2)).starts_with("http://localhost/rwd/"));

        // Unrouted date surfaces as a fetch error, and the range walk skips it.
        assert!(source.fetch("2330", d(2024, 1, 3)).is_err());
        let records = source.fetch_range("2330", d(2024, 1, 2), d(2024, 1, 3)).unwrap();
        assert_eq!(records.len(), 1);
    }
}
