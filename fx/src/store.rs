//! Historical daily rate table, parsed from the cached CSV dataset.

use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::Read;
use std::path::Path;

use cambist_common::Currency;
use chrono::NaiveDate;
use csv::{ReaderBuilder, Trim};
use rust_decimal::Decimal;
use tracing::debug;

use crate::error::{FxError, FxResult};

/// Date format used by the upstream dataset (`YYYY-MM-DD`).
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Quotes for a single day: units of currency per 1 unit of base currency.
pub type DailyQuotes = HashMap<Currency, Decimal>;

/// Time series of daily quotes keyed by calendar date.
///
/// Rebuilt wholesale on every cache refresh and shared immutably behind an
/// `Arc`; readers never observe a partially-built table. Days may be sparse:
/// not every currency is quoted every day.
#[derive(Debug, Clone, Default)]
pub struct RateTable {
    days: BTreeMap<NaiveDate, DailyQuotes>,
}

impl RateTable {
    /// Load and parse the table from a file on disk.
    pub fn load(path: &Path) -> FxResult<Self> {
        let file = File::open(path).map_err(|source| FxError::CacheRead {
            path: path.to_path_buf(),
            source,
        })?;
        let table = Self::from_reader(file).map_err(|source| FxError::CacheRead {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), dates = table.len(), "Loaded rate table");
        Ok(table)
    }

    /// Parse line-oriented tabular data: a header row `Date,<CUR1>,<CUR2>,...`
    /// followed by rows `YYYY-MM-DD,<value or empty>,...`.
    ///
    /// Tolerates ragged rows, empty header columns, rows with unparseable
    /// dates, and unparseable or non-positive cells; all are skipped rather
    /// than escalated. The only failure mode is unreadable input.
    pub fn from_reader<R: Read>(input: R) -> Result<Self, std::io::Error> {
        let mut reader = ReaderBuilder::new()
            .flexible(true)
            .trim(Trim::All)
            .from_reader(input);

        // First header cell is the date column; the rest name currencies.
        let currencies: Vec<Option<Currency>> = match reader.headers() {
            Ok(headers) => headers
                .iter()
                .skip(1)
                .map(|code| {
                    if code.is_empty() {
                        None
                    } else {
                        Some(Currency::new(code))
                    }
                })
                .collect(),
            Err(err) => match err.into_kind() {
                csv::ErrorKind::Io(io) => return Err(io),
                _ => Vec::new(),
            },
        };

        let mut days = BTreeMap::new();
        for record in reader.records() {
            let record = match record {
                Ok(record) => record,
                Err(err) => match err.into_kind() {
                    csv::ErrorKind::Io(io) => return Err(io),
                    // Malformed trailing rows are tolerated.
                    _ => continue,
                },
            };

            let date = match record
                .get(0)
                .and_then(|cell| NaiveDate::parse_from_str(cell, DATE_FORMAT).ok())
            {
                Some(date) => date,
                None => continue,
            };

            let mut quotes = DailyQuotes::new();
            for (currency, cell) in currencies.iter().zip(record.iter().skip(1)) {
                let Some(currency) = currency else { continue };
                if cell.is_empty() {
                    continue;
                }
                match cell.parse::<Decimal>() {
                    Ok(rate) if rate > Decimal::ZERO => {
                        quotes.insert(currency.clone(), rate);
                    }
                    // Unquoted or malformed cell: skip this pair only.
                    _ => continue,
                }
            }
            days.insert(date, quotes);
        }

        Ok(Self { days })
    }

    /// Number of dates present.
    pub fn len(&self) -> usize {
        self.days.len()
    }

    /// Whether the table holds no dates at all.
    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    /// Most recent date present.
    pub fn latest_date(&self) -> Option<NaiveDate> {
        self.days.keys().next_back().copied()
    }

    /// Oldest date present.
    pub fn oldest_date(&self) -> Option<NaiveDate> {
        self.days.keys().next().copied()
    }

    /// Most recent date present that is on or before `date`.
    pub fn latest_on_or_before(&self, date: NaiveDate) -> Option<NaiveDate> {
        self.days.range(..=date).next_back().map(|(d, _)| *d)
    }

    /// Most recent date present that is strictly before `date`.
    pub fn previous_day_with_data(&self, date: NaiveDate) -> Option<NaiveDate> {
        self.days.range(..date).next_back().map(|(d, _)| *d)
    }

    /// Quotes for an exact date, if present.
    pub fn quotes_on(&self, date: NaiveDate) -> Option<&DailyQuotes> {
        self.days.get(&date)
    }

    /// Quote for one currency on an exact date.
    pub fn quote(&self, date: NaiveDate, currency: &Currency) -> Option<Decimal> {
        self.days.get(&date).and_then(|quotes| quotes.get(currency)).copied()
    }
}
