//! 생산자 페이로드 정규화.
//!
//! 거래소와 피드마다 형태가 다른 원시 JSON을 저장소 레코드로 바꿉니다. 한 항목이 실패해도
//! 배치는 계속되며, 실패한 항목은 위치와 사유가 담긴 `Skipped`로 남습니다.

use chrono::{DateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use scraper::Html;
use serde_json::Value;
use std::str::FromStr;
use tickvault_core::{
    parse_published_date, parse_rss_pub_date, Interval, NewsRecord, RecordError, Symbol,
    TimeSeriesRecord,
};

/// 정규화에서 건너뛴 항목.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Skipped {
    /// 원시 배치 내 위치
    pub position: usize,
    pub reason: String,
}

/// 정규화 결과.
#[derive(Debug, Clone, PartialEq)]
pub struct Normalized<T> {
    pub records: Vec<T>,
    pub skipped: Vec<Skipped>,
}

impl<T> Normalized<T> {
    fn from_items(items: &[Value], mut convert: impl FnMut(&Value) -> Result<T, RecordError>) -> Self {
        let mut records = Vec::with_capacity(items.len());
        let mut skipped = Vec::new();
        for (position, item) in items.iter().enumerate() {
            match convert(item) {
                Ok(record) => records.push(record),
                Err(e) => skipped.push(Skipped {
                    position,
                    reason: e.to_string(),
                }),
            }
        }
        Self { records, skipped }
    }
}

/// Binance kline 배열을 변환합니다.
///
/// 각 행은 `[open_ms, open, high, low, close, volume, close_ms, quote_volume, trades, ...]`입니다.
pub fn binance_klines(symbol: &Symbol, interval: Interval, rows: &[Value]) -> Normalized<TimeSeriesRecord> {
    Normalized::from_items(rows, |row| kline(symbol, interval, row))
}

fn kline(symbol: &Symbol, interval: Interval, row: &Value) -> Result<TimeSeriesRecord, RecordError> {
    let Some(cells) = row.as_array() else {
        return Err(RecordError::Undecodable {
            reason: "kline 행이 배열이 아닙니다".to_string(),
        });
    };
    let open_ms = cells
        .first()
        .and_then(Value::as_i64)
        .ok_or(RecordError::MissingField { field: "open_time" })?;
    let begins_at = DateTime::<Utc>::from_timestamp_millis(open_ms).ok_or_else(|| {
        RecordError::InvalidTimestamp {
            value: open_ms.to_string(),
        }
    })?;

    let mut record = TimeSeriesRecord::new(
        symbol.clone(),
        interval,
        begins_at,
        decimal(cells.get(1), "open_price")?,
        decimal(cells.get(2), "high_price")?,
        decimal(cells.get(3), "low_price")?,
        decimal(cells.get(4), "close_price")?,
        decimal(cells.get(5), "volume")?,
    );
    if cells.get(7).is_some() {
        record = record.with_quote_volume(decimal(cells.get(7), "quote_volume")?);
    }
    if let Some(trades) = cells.get(8).and_then(Value::as_u64) {
        record = record.with_num_trades(trades);
    }
    Ok(record)
}

/// `begins_at`과 `*_price` 필드를 가진 일반 시계열 객체를 변환합니다.
///
/// `symbol`과 `interval`이 없으면 인자로 채우고, 알 수 없는 필드는 `extra`에 보존됩니다.
pub fn historicals(symbol: &Symbol, interval: Interval, items: &[Value]) -> Normalized<TimeSeriesRecord> {
    Normalized::from_items(items, |item| {
        let Some(object) = item.as_object() else {
            return Err(RecordError::Undecodable {
                reason: "시계열 항목이 객체가 아닙니다".to_string(),
            });
        };
        let mut object = object.clone();
        object
            .entry("symbol")
            .or_insert_with(|| Value::String(symbol.to_string()));
        object
            .entry("interval")
            .or_insert_with(|| Value::String(interval.to_string()));
        serde_json::from_value(Value::Object(object)).map_err(|e| RecordError::Undecodable {
            reason: e.to_string(),
        })
    })
}

/// RSS 항목(JSON으로 변환된 `<item>`)을 미처리 뉴스 레코드로 변환합니다.
///
/// 날짜는 `pubDate`(RFC 2822) 또는 `published_date`에서 읽습니다. 요약은 HTML을 걷어낸
/// 텍스트이며 첫 `...`에서 자릅니다.
pub fn rss_items(asset: &Symbol, items: &[Value]) -> Normalized<NewsRecord> {
    Normalized::from_items(items, |item| rss_item(asset, item))
}

fn rss_item(asset: &Symbol, item: &Value) -> Result<NewsRecord, RecordError> {
    let title = text_field(item, "title").ok_or(RecordError::MissingField { field: "title" })?;

    let (date, time) = match text_field(item, "pubDate") {
        Some(raw) => {
            let (date, time) = parse_rss_pub_date(&raw)?;
            (date, Some(time))
        }
        None => {
            let raw = text_field(item, "published_date")
                .ok_or(RecordError::MissingField { field: "pubDate" })?;
            let time = text_field(item, "published_time")
                .and_then(|t| NaiveTime::parse_from_str(t.trim(), "%H:%M").ok());
            (parse_published_date(&raw)?, time)
        }
    };

    let mut record = NewsRecord::new(asset.clone(), date, title)
        .with_link(text_field(item, "link").unwrap_or_else(|| "#".to_string()))
        .with_source(source_name(item).unwrap_or_else(|| "Unknown source".to_string()));
    if let Some(time) = time {
        record = record.with_time(time);
    }
    if let Some(raw) = text_field(item, "description").or_else(|| text_field(item, "summary")) {
        record = record.with_summary(clean_summary(&raw));
    }
    record.normalized()
}

/// HTML 요약을 텍스트로 바꾸고 첫 `...`까지만 남깁니다.
pub fn clean_summary(raw: &str) -> String {
    let mut text = fragment_text(raw);
    // 이중 이스케이프된 마크업
    if text.contains('<') && text.contains('>') {
        text = fragment_text(&text);
    }
    let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
    match text.split_once("...") {
        Some((head, _)) => format!("{head}..."),
        None => text,
    }
}

fn fragment_text(html: &str) -> String {
    Html::parse_fragment(html)
        .root_element()
        .text()
        .collect::<String>()
}

fn text_field(item: &Value, field: &str) -> Option<String> {
    item.get(field)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// `source`는 문자열이거나 `{ "title": ... }` 또는 `{ "#text": ... }` 객체입니다.
fn source_name(item: &Value) -> Option<String> {
    match item.get("source")? {
        Value::String(s) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
        source @ Value::Object(_) => text_field(source, "title").or_else(|| text_field(source, "#text")),
        _ => None,
    }
}

/// 문자열 또는 숫자 JSON 값을 `Decimal`로 읽습니다.
fn decimal(value: Option<&Value>, field: &'static str) -> Result<Decimal, RecordError> {
    let raw = match value {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(_) => {
            return Err(RecordError::InvalidNumber {
                field,
                reason: "숫자가 아닙니다".to_string(),
            })
        }
        None => return Err(RecordError::MissingField { field }),
    };
    Decimal::from_str(&raw)
        .or_else(|_| Decimal::from_scientific(&raw))
        .map_err(|e| RecordError::InvalidNumber {
            field,
            reason: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone};
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn btc() -> Symbol {
        Symbol::parse("btcusdt").unwrap()
    }

    #[test]
    fn test_binance_kline_row() {
        let rows = vec![json!([
            1748649600000i64,
            "104000.10",
            "104100.00",
            "103900.50",
            "104050.00",
            "12.5",
            1748649899999i64,
            "1300000.0",
            420,
            "6.1",
            "634000.0",
            "0"
        ])];

        let result = binance_klines(&btc(), Interval::FiveMinutes, &rows);
        assert!(result.skipped.is_empty());
        let record = &result.records[0];
        assert_eq!(record.begins_at, Utc.with_ymd_and_hms(2025, 5, 31, 0, 0, 0).unwrap());
        assert_eq!(record.open_price, dec!(104000.10));
        assert_eq!(record.volume, dec!(12.5));
        assert_eq!(record.quote_volume, Some(dec!(1300000.0)));
        assert_eq!(record.num_trades, Some(420));
        assert_eq!(record.symbol.as_str(), "BTCUSDT");
    }

    #[test]
    fn test_bad_kline_rows_are_skipped() {
        let rows = vec![
            json!({"not": "an array"}),
            json!([1748649600000i64, "1", "2"]),
            json!([1748649600000i64, "1", "2", "abc", "1", "1"]),
            json!([1748649600000i64, 1, 2, 0.5, 1.5, 3]),
        ];

        let result = binance_klines(&btc(), Interval::OneMinute, &rows);
        assert_eq!(result.records.len(), 1);
        assert_eq!(result.records[0].low_price, dec!(0.5));
        let positions: Vec<_> = result.skipped.iter().map(|s| s.position).collect();
        assert_eq!(positions, vec![0, 1, 2]);
        assert!(result.skipped[1].reason.contains("low_price"));
    }

    #[test]
    fn test_historicals_fill_symbol_and_keep_extra_fields() {
        let items = vec![
            json!({
                "begins_at": "2025-05-31T00:05:00Z",
                "open_price": "1.0",
                "high_price": "1.2",
                "low_price": "0.9",
                "close_price": "1.1",
                "volume": 0,
                "session": "reg",
                "interpolated": false
            }),
            json!({"begins_at": "garbage"}),
        ];

        let result = historicals(&btc(), Interval::FiveMinutes, &items);
        assert_eq!(result.records.len(), 1);
        assert_eq!(result.skipped.len(), 1);

        let record = &result.records[0];
        assert_eq!(record.interval, Interval::FiveMinutes);
        assert_eq!(record.symbol, btc());
        assert_eq!(record.extra.get("session"), Some(&json!("reg")));
    }

    #[test]
    fn test_rss_item_from_pub_date() {
        let items = vec![json!({
            "title": "  Dogecoin rallies  ",
            "link": "https://news.google.com/rss/articles/abc",
            "pubDate": "Fri, 09 May 2025 07:00:00 GMT",
            "source": {"title": "CoinDesk", "url": "https://coindesk.com"},
            "description": "&lt;a href=\"x\"&gt;Dogecoin rallies as memes return...&lt;/a&gt;&amp;nbsp;"
        })];

        let result = rss_items(&Symbol::parse("doge").unwrap(), &items);
        assert!(result.skipped.is_empty());
        let record = &result.records[0];
        assert_eq!(record.title, "Dogecoin rallies");
        assert_eq!(record.published_date, NaiveDate::from_ymd_opt(2025, 5, 9).unwrap());
        assert_eq!(record.published_time, NaiveTime::from_hms_opt(7, 0, 0));
        assert_eq!(record.source, "CoinDesk");
        assert_eq!(record.summary, "Dogecoin rallies as memes return...");
        assert!(!record.processed);
    }

    #[test]
    fn test_rss_item_without_date_or_title_is_skipped() {
        let items = vec![
            json!({"title": "no date"}),
            json!({"pubDate": "Fri, 09 May 2025 07:00:00 GMT"}),
            json!({"title": "bad date", "pubDate": "yesterday"}),
            json!({"title": "dated", "published_date": "2025-05-09", "published_time": "07:30"}),
        ];

        let result = rss_items(&Symbol::parse("DOGE").unwrap(), &items);
        assert_eq!(result.skipped.len(), 3);
        assert_eq!(result.records.len(), 1);
        assert_eq!(result.records[0].source, "Unknown source");
        assert_eq!(result.records[0].link, "#");
    }

    #[test]
    fn test_clean_summary() {
        assert_eq!(clean_summary("<b>plain</b>   text"), "plain text");
        assert_eq!(clean_summary("first part... second part"), "first part...");
    }
}
