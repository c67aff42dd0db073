//! Asset amounts as the Steem APIs encode them.
//!
//! Two encodings show up in the wild:
//! - legacy strings: `"1.234 STEEM"`, `"5000.000000 VESTS"`
//! - NAI objects: `{"amount": "1234", "precision": 3, "nai": "@@000000021"}`

use anyhow::{anyhow, Result};
use serde_json::Value;
use std::fmt;

pub const STEEM: &str = "STEEM";
pub const SBD: &str = "SBD";
pub const VESTS: &str = "VESTS";
pub const SP: &str = "SP";

/// Map a NAI asset identifier to its legacy symbol
fn nai_symbol(nai: &str) -> &str {
    match nai {
        "@@000000021" => STEEM,
        "@@000000013" => SBD,
        "@@000000037" => VESTS,
        other => other,
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Amount {
    pub value: f64,
    pub precision: u8,
    pub symbol: String,
}

impl Amount {
    pub fn new(value: f64, precision: u8, symbol: impl Into<String>) -> Self {
        Self {
            value,
            precision,
            symbol: symbol.into(),
        }
    }

    /// Parse `"<decimal> <SYMBOL>"`, keeping the number of fractional digits
    pub fn parse(text: &str) -> Result<Self> {
        let mut parts = text.split_whitespace();
        let magnitude = parts
            .next()
            .ok_or_else(|| anyhow!("empty amount string"))?;
        let symbol = parts
            .next()
            .ok_or_else(|| anyhow!("amount '{text}' has no symbol"))?;
        if parts.next().is_some() {
            return Err(anyhow!("amount '{text}' has trailing data"));
        }
        let value: f64 = magnitude
            .parse()
            .map_err(|_| anyhow!("amount '{text}' has a non-numeric magnitude"))?;
        let precision = magnitude
            .split_once('.')
            .map(|(_, frac)| frac.len().min(u8::MAX as usize) as u8)
            .unwrap_or(0);
        Ok(Self::new(value, precision, symbol))
    }

    /// Accept either the legacy string or the NAI object encoding
    pub fn from_value(v: &Value) -> Result<Self> {
        match v {
            Value::String(s) => Self::parse(s),
            Value::Object(map) => {
                let raw = match map.get("amount") {
                    Some(Value::String(s)) => s
                        .parse::<i128>()
                        .map_err(|_| anyhow!("NAI amount '{s}' is not an integer"))?,
                    Some(Value::Number(n)) => n
                        .as_i64()
                        .map(i128::from)
                        .ok_or_else(|| anyhow!("NAI amount {n} is not an integer"))?,
                    _ => return Err(anyhow!("NAI object without amount")),
                };
                let precision = map
                    .get("precision")
                    .and_then(Value::as_u64)
                    .ok_or_else(|| anyhow!("NAI object without precision"))?
                    .min(18) as u8;
                let nai = map
                    .get("nai")
                    .and_then(Value::as_str)
                    .ok_or_else(|| anyhow!("NAI object without nai"))?;
                let value = raw as f64 / 10f64.powi(precision as i32);
                Ok(Self::new(value, precision, nai_symbol(nai)))
            }
            other => Err(anyhow!("unsupported amount encoding: {other}")),
        }
    }

    pub fn is_vests(&self) -> bool {
        self.symbol == VESTS
    }

    pub fn is_zero(&self) -> bool {
        self.value == 0.0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:.*} {}",
            self.precision as usize, self.value, self.symbol
        )
    }
}

/// Render a derived value with the three decimals the explorer uses
pub fn format_fixed3(value: f64, symbol: &str) -> String {
    format!("{value:.3} {symbol}")
}
