use super::{
    parse_calendar_date, MarketDataProvider, ProviderError, RawColumn, RawFrame, RawTimestamp,
};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::Value;
use std::path::PathBuf;

/// Offline provider reading `<dir>/<TICKER>.csv`.
///
/// Accepts flat exports (`Date,Open,High,Low,Close,Adj Close,Volume`) and
/// yfinance-style multi-level headers, where several header rows precede the
/// data:
///
/// ```text
/// Price,Close,High,Low,Open,Volume
/// Ticker,AAPL,AAPL,AAPL,AAPL,AAPL
/// Date,,,,,
/// 2024-01-01,171.48,199.62,164.08,187.15,3574800000
/// ```
///
/// The first column is always the date index. Rows dated outside the
/// requested range are dropped; rows with an unreadable date are kept for the
/// pipeline to reject and log.
pub struct CsvDirectoryProvider {
    dir: PathBuf,
}

impl CsvDirectoryProvider {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    fn path_for(&self, ticker: &str) -> PathBuf {
        self.dir.join(format!("{}.csv", ticker))
    }
}

#[async_trait]
impl MarketDataProvider for CsvDirectoryProvider {
    fn name(&self) -> &str {
        "csv"
    }

    async fn fetch(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<RawFrame, ProviderError> {
        let path = self.path_for(ticker);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ProviderError::NotFound(path.display().to_string()))
            }
            Err(e) => return Err(ProviderError::Io(e)),
        };

        let frame = parse_csv_frame(&content, start, end)?;
        if frame.is_empty() {
            return Err(ProviderError::Empty(ticker.to_string()));
        }
        Ok(frame)
    }
}

/// Parse CSV text into a frame, keeping rows dated within `[start, end]`
pub fn parse_csv_frame(
    content: &str,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<RawFrame, ProviderError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());

    let mut header_rows: Vec<Vec<String>> = Vec::new();
    let mut data_rows: Vec<Vec<String>> = Vec::new();

    for record in reader.records() {
        let record = record.map_err(|e| ProviderError::Parse(e.to_string()))?;
        let cells: Vec<String> = record.iter().map(|c| c.to_string()).collect();
        if cells.iter().all(|c| c.is_empty()) {
            continue;
        }

        // Header rows run until the first row whose index cell is a date
        let first = cells.first().map(|s| s.as_str()).unwrap_or("");
        if data_rows.is_empty() && parse_calendar_date(first).is_none() {
            header_rows.push(cells);
        } else {
            data_rows.push(cells);
        }
    }

    if header_rows.is_empty() {
        return Err(ProviderError::Parse("CSV has no header row".to_string()));
    }

    let width = header_rows.iter().map(|r| r.len()).max().unwrap_or(0);

    let labels: Vec<Vec<String>> = (1..width)
        .map(|col| {
            header_rows
                .iter()
                .filter_map(|row| row.get(col))
                .filter(|cell| !cell.is_empty())
                .cloned()
                .collect()
        })
        .collect();

    let kept: Vec<&Vec<String>> = data_rows
        .iter()
        .filter(|row| match row.first().and_then(|c| parse_calendar_date(c)) {
            Some(date) => date >= start && date <= end,
            None => true,
        })
        .collect();

    let index = kept
        .iter()
        .map(|row| RawTimestamp::Text(row.first().cloned().unwrap_or_default()))
        .collect();

    let columns = labels
        .into_iter()
        .enumerate()
        .map(|(offset, label)| {
            let col = offset + 1;
            let values = kept
                .iter()
                .map(|row| match row.get(col) {
                    Some(cell) if !cell.is_empty() => Value::String(cell.clone()),
                    _ => Value::Null,
                })
                .collect();
            RawColumn::new(label, values)
        })
        .collect();

    Ok(RawFrame::new(index, columns))
}
