//! The normalized ticker record and its CSV line serializer.

use crate::error::{DecodeError, ParseError};
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

/// One decoded ticker event, enriched with EMA values by the Compute stage.
///
/// Transport fields are filled once by [`Record::from_decoded`] in the
/// Ingress stage and are read-only afterward; only `price_ema` and
/// `mid_price_ema` are mutated downstream, by the Compute stage.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub r#type: String,
    pub sequence: String,
    pub product_id: String,
    pub price: String,
    pub open_24h: String,
    pub volume_24h: String,
    pub low_24h: String,
    pub high_24h: String,
    pub volume_30d: String,
    pub best_bid: String,
    pub best_ask: String,
    pub side: String,
    pub time: String,
    pub trade_id: String,
    pub last_size: String,

    /// `(parse(best_bid) + parse(best_ask)) / 2`, or `0.0` on parse failure.
    pub mid_price: f64,
    /// Populated by the Compute stage; `0.0` until the first sample applies.
    pub price_ema: f64,
    /// Populated by the Compute stage; `0.0` until the first sample applies.
    pub mid_price_ema: f64,
    /// Parsed from `time`; falls back to the current wall clock on parse
    /// failure, so every record always carries a usable timestamp.
    pub event_time: DateTime<Utc>,
}

/// Field order fixed by the file format (§6). `to_row` must emit these in
/// this exact order, followed by the three derived real-valued fields.
const TRANSPORT_FIELD_ORDER: [&str; 15] = [
    "type",
    "sequence",
    "product_id",
    "price",
    "open_24h",
    "volume_24h",
    "low_24h",
    "high_24h",
    "volume_30d",
    "best_bid",
    "best_ask",
    "side",
    "time",
    "trade_id",
    "last_size",
];

/// The header line, exact field order, written once per (empty) output file.
pub const HEADER_ROW: &str = "type,sequence,product_id,price,open_24h,volume_24h,low_24h,high_24h,volume_30d,best_bid,best_ask,side,time,trade_id,last_size,price_ema,mid_price_ema,mid_price";

impl Record {
    /// Builds a `Record` from a decoded frame.
    ///
    /// `DecodeError::NotTicker` if `type` is absent or not `"ticker"`, or if
    /// `product_id` / `price` are absent. Missing optional fields default
    /// to the empty string. A field given as a JSON number is stringified
    /// so the transport contract (everything is a string on the wire) is
    /// preserved.
    pub fn from_decoded(map: &Map<String, Value>) -> Result<Self, DecodeError> {
        match map.get("type").and_then(Value::as_str) {
            Some("ticker") => {}
            _ => return Err(DecodeError::NotTicker),
        }

        if !map.contains_key("product_id") || !map.contains_key("price") {
            return Err(DecodeError::NotTicker);
        }

        let field = |key: &str| -> String {
            map.get(key).map(stringify_value).unwrap_or_default()
        };

        let best_bid = field("best_bid");
        let best_ask = field("best_ask");
        let mid_price = mid_price_from_strs(&best_bid, &best_ask);

        let time = field("time");
        let event_time = parse_event_time(&time);

        Ok(Record {
            r#type: field("type"),
            sequence: field("sequence"),
            product_id: field("product_id"),
            price: field("price"),
            open_24h: field("open_24h"),
            volume_24h: field("volume_24h"),
            low_24h: field("low_24h"),
            high_24h: field("high_24h"),
            volume_30d: field("volume_30d"),
            best_bid,
            best_ask,
            side: field("side"),
            time,
            trade_id: field("trade_id"),
            last_size: field("last_size"),
            mid_price,
            price_ema: 0.0,
            mid_price_ema: 0.0,
            event_time,
        })
    }

    /// `(parse(best_bid) + parse(best_ask)) / 2`, `0.0` on parse failure.
    /// Exposed separately from construction so callers (and tests) can
    /// recompute it without rebuilding a `Record`.
    pub fn mid_price_from_fields(&self) -> f64 {
        mid_price_from_strs(&self.best_bid, &self.best_ask)
    }

    /// Serializes this record as one CSV line (no trailing newline),
    /// 18 fields / 17 commas, field order per the file format.
    pub fn to_row(&self) -> String {
        let transport = [
            self.r#type.as_str(),
            self.sequence.as_str(),
            self.product_id.as_str(),
            self.price.as_str(),
            self.open_24h.as_str(),
            self.volume_24h.as_str(),
            self.low_24h.as_str(),
            self.high_24h.as_str(),
            self.volume_30d.as_str(),
            self.best_bid.as_str(),
            self.best_ask.as_str(),
            self.side.as_str(),
            self.time.as_str(),
            self.trade_id.as_str(),
            self.last_size.as_str(),
        ];

        let mut fields: Vec<String> = transport.iter().map(|f| csv_escape(f)).collect();
        fields.push(format_real(self.price_ema));
        fields.push(format_real(self.mid_price_ema));
        fields.push(format_real(self.mid_price));

        debug_assert_eq!(fields.len(), TRANSPORT_FIELD_ORDER.len() + 3);
        fields.join(",")
    }
}

fn stringify_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn mid_price_from_strs(best_bid: &str, best_ask: &str) -> f64 {
    match (
        parse_decimal_field("best_bid", best_bid),
        parse_decimal_field("best_ask", best_ask),
    ) {
        (Some(bid), Some(ask)) => (bid + ask) / 2.0,
        _ => 0.0,
    }
}

/// Parses a decimal field, logging a [`ParseError::Decimal`] iff the field
/// was present but malformed. A merely absent (empty-string) optional field
/// is not a parse error — it is the documented default from
/// [`Record::from_decoded`] — so it is not logged.
fn parse_decimal_field(field: &'static str, raw: &str) -> Option<f64> {
    if raw.is_empty() {
        return None;
    }
    match raw.parse::<f64>() {
        Ok(value) => Some(value),
        Err(_) => {
            let err = ParseError::Decimal {
                field,
                raw: raw.to_string(),
            };
            eprintln!("record: {err}");
            None
        }
    }
}

fn parse_event_time(time: &str) -> DateTime<Utc> {
    if time.is_empty() {
        return Utc::now();
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(time) {
        return dt.with_timezone(&Utc);
    }
    // Trailing `Z` is optional per §3; retry assuming UTC if it was omitted.
    if let Ok(dt) = DateTime::parse_from_rfc3339(&format!("{time}Z")) {
        return dt.with_timezone(&Utc);
    }
    let err = ParseError::Timestamp {
        field: "time",
        raw: time.to_string(),
    };
    eprintln!("record: {err}");
    Utc::now()
}

/// Formats a real-valued field with fixed-point notation, eight fractional
/// digits, per the file format.
fn format_real(value: f64) -> String {
    format!("{value:.8}")
}

/// Wraps `field` in double quotes (doubling embedded quotes) iff it
/// contains a comma, double-quote, or newline.
fn csv_escape(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') {
        let mut escaped = String::with_capacity(field.len() + 2);
        escaped.push('"');
        for ch in field.chars() {
            if ch == '"' {
                escaped.push('"');
            }
            escaped.push(ch);
        }
        escaped.push('"');
        escaped
    } else {
        field.to_string()
    }
}
