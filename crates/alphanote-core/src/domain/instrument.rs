//! 금융 상품 (종목/ETF/LOF)과 일봉 시세.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::CoreError;

/// 상품 유형.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetKind {
    #[default]
    Stock,
    Etf,
    Lof,
}

impl AssetKind {
    /// 종목 코드 접두어로 유형을 추정합니다.
    pub fn infer(symbol: &str) -> Self {
        const LOF_PREFIXES: [&str; 7] = ["160", "161", "162", "163", "164", "165", "50"];
        const ETF_PREFIXES: [&str; 6] = ["51", "56", "58", "15", "16", "18"];

        if LOF_PREFIXES.iter().any(|p| symbol.starts_with(p)) {
            AssetKind::Lof
        } else if ETF_PREFIXES.iter().any(|p| symbol.starts_with(p)) {
            AssetKind::Etf
        } else {
            AssetKind::Stock
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AssetKind::Stock => "stock",
            AssetKind::Etf => "etf",
            AssetKind::Lof => "lof",
        }
    }

    pub fn is_fund(&self) -> bool {
        matches!(self, AssetKind::Etf | AssetKind::Lof)
    }
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AssetKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "stock" => Ok(AssetKind::Stock),
            "etf" => Ok(AssetKind::Etf),
            "lof" => Ok(AssetKind::Lof),
            other => Err(CoreError::Parse(format!("알 수 없는 상품 유형: {}", other))),
        }
    }
}

/// 상장 거래소.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Exchange {
    Shanghai,
    Shenzhen,
    Beijing,
}

impl Exchange {
    /// 6자리 코드의 첫 자리로 거래소를 판별합니다.
    pub fn from_code(symbol: &str) -> Self {
        if symbol.starts_with("92") || symbol.starts_with('4') || symbol.starts_with('8') {
            Exchange::Beijing
        } else if symbol.starts_with('6') || symbol.starts_with('5') || symbol.starts_with('9') {
            Exchange::Shanghai
        } else {
            Exchange::Shenzhen
        }
    }
}

/// 시세/연관 대상 상품.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instrument {
    pub symbol: String,
    pub name: String,
    pub asset_kind: AssetKind,
}

impl Instrument {
    pub fn new(symbol: impl Into<String>, name: impl Into<String>) -> Self {
        let symbol = symbol.into();
        Self {
            asset_kind: AssetKind::infer(&symbol),
            symbol,
            name: name.into(),
        }
    }

    pub fn exchange(&self) -> Exchange {
        Exchange::from_code(&self.symbol)
    }
}

/// 종목 별칭 (예: "宁王" → 300750).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstrumentAlias {
    pub symbol: String,
    pub alias: String,
}

/// 일봉 시세 한 건.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyQuote {
    pub symbol: String,
    pub date: NaiveDate,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Option<i64>,
    pub turnover: Option<Decimal>,
}
