//! Field catalogue for daily security records.
//!
//! Every field carries a stable English key (used for serialization) and the
//! label the exchange publishes it under. Both forms are accepted by
//! [`Field::from_name`].

use serde::{Deserialize, Serialize};
use std::fmt;

/// Upstream dataset a raw field comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Daily price bars (OHLC, change, traded volume).
    Price,
    /// Institutional buy/sell/net flow by actor class.
    Institutional,
    /// Valuation ratios and dividend data.
    Fundamental,
}

impl SourceKind {
    /// All source kinds in their default fetch order.
    pub const ALL: [SourceKind; 3] = [
        SourceKind::Price,
        SourceKind::Institutional,
        SourceKind::Fundamental,
    ];

    /// Whether this source publishes one file per trading day.
    ///
    /// Such sources are only queried on weekdays when walking a date range.
    pub fn is_per_trading_day(self) -> bool {
        matches!(self, SourceKind::Institutional)
    }

    pub fn name(self) -> &'static str {
        match self {
            SourceKind::Price => "price",
            SourceKind::Institutional => "institutional",
            SourceKind::Fundamental => "fundamental",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A raw field contributed by exactly one upstream source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceField {
    Open,
    High,
    Low,
    Close,
    /// Absolute price change versus the prior close.
    Change,
    /// Traded shares.
    Shares,
    /// Traded value.
    Value,
    /// Number of transactions.
    Transactions,
    ForeignBuy,
    ForeignSell,
    ForeignNet,
    TrustBuy,
    TrustSell,
    TrustNet,
    DealerNet,
    /// Net of all three institutional classes.
    InstitutionalTotal,
    PeRatio,
    DividendYield,
    PbRatio,
    DividendYear,
    ReportPeriod,
}

impl SourceField {
    pub const ALL: [SourceField; 21] = [
        SourceField::Open,
        SourceField::High,
        SourceField::Low,
        SourceField::Close,
        SourceField::Change,
        SourceField::Shares,
        SourceField::Value,
        SourceField::Transactions,
        SourceField::ForeignBuy,
        SourceField::ForeignSell,
        SourceField::ForeignNet,
        SourceField::TrustBuy,
        SourceField::TrustSell,
        SourceField::TrustNet,
        SourceField::DealerNet,
        SourceField::InstitutionalTotal,
        SourceField::PeRatio,
        SourceField::DividendYield,
        SourceField::PbRatio,
        SourceField::DividendYear,
        SourceField::ReportPeriod,
    ];

    /// The source that owns this field.
    pub fn source(self) -> SourceKind {
        use SourceField::*;
        match self {
            Open | High | Low | Close | Change | Shares | Value | Transactions => SourceKind::Price,
            ForeignBuy | ForeignSell | ForeignNet | TrustBuy | TrustSell | TrustNet | DealerNet
            | InstitutionalTotal => SourceKind::Institutional,
            PeRatio | DividendYield | PbRatio | DividendYear | ReportPeriod => {
                SourceKind::Fundamental
            }
        }
    }

    pub fn key(self) -> &'static str {
        use SourceField::*;
        match self {
            Open => "open",
            High => "high",
            Low => "low",
            Close => "close",
            Change => "change",
            Shares => "shares",
            Value => "value",
            Transactions => "transactions",
            ForeignBuy => "foreign_buy",
            ForeignSell => "foreign_sell",
            ForeignNet => "foreign_net",
            TrustBuy => "trust_buy",
            TrustSell => "trust_sell",
            TrustNet => "trust_net",
            DealerNet => "dealer_net",
            InstitutionalTotal => "institutional_total",
            PeRatio => "pe_ratio",
            DividendYield => "dividend_yield_pct",
            PbRatio => "pb_ratio",
            DividendYear => "dividend_year",
            ReportPeriod => "report_period",
        }
    }

    pub fn label(self) -> &'static str {
        use SourceField::*;
        match self {
            Open => "開盤價",
            High => "最高價",
            Low => "最低價",
            Close => "收盤價",
            Change => "漲跌價差",
            Shares => "成交股數",
            Value => "成交金額",
            Transactions => "成交筆數",
            ForeignBuy => "外資買進",
            ForeignSell => "外資賣出",
            ForeignNet => "外資買賣超",
            TrustBuy => "投信買進",
            TrustSell => "投信賣出",
            TrustNet => "投信買賣超",
            DealerNet => "自營商買賣超",
            InstitutionalTotal => "三大法人買賣超合計",
            PeRatio => "本益比",
            DividendYield => "殖利率(%)",
            PbRatio => "股價淨值比",
            DividendYear => "股利年度",
            ReportPeriod => "財報年季",
        }
    }
}

/// A metric computed over the ordered series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DerivedField {
    /// Day-over-day price change in percent.
    ChangePct,
    /// Traded shares in units of 10^8 shares.
    VolumeHundredMillion,
    /// Day-over-day traded-shares change in percent.
    VolumeChangePct,
    /// Traded shares relative to the trailing window mean.
    VolumeRatio,
    /// Simple moving average of the close over `n` positions.
    MovingAverage(u32),
}

impl DerivedField {
    pub fn key(self) -> String {
        match self {
            DerivedField::ChangePct => "change_pct".to_string(),
            DerivedField::VolumeHundredMillion => "volume_hundred_million".to_string(),
            DerivedField::VolumeChangePct => "volume_change_pct".to_string(),
            DerivedField::VolumeRatio => "volume_ratio".to_string(),
            DerivedField::MovingAverage(n) => format!("ma{n}"),
        }
    }

    pub fn label(self) -> String {
        match self {
            DerivedField::ChangePct => "漲跌幅(%)".to_string(),
            DerivedField::VolumeHundredMillion => "成交量(億股)".to_string(),
            DerivedField::VolumeChangePct => "量變化率(%)".to_string(),
            DerivedField::VolumeRatio => "量比".to_string(),
            DerivedField::MovingAverage(n) => format!("MA{n}"),
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        let fixed = [
            DerivedField::ChangePct,
            DerivedField::VolumeHundredMillion,
            DerivedField::VolumeChangePct,
            DerivedField::VolumeRatio,
        ];
        if let Some(field) = fixed.into_iter().find(|f| f.key() == name || f.label() == name) {
            return Some(field);
        }
        let digits = name.strip_prefix("ma").or_else(|| name.strip_prefix("MA"))?;
        match digits.parse::<u32>() {
            Ok(n) if n > 0 && digits.chars().all(|c| c.is_ascii_digit()) => {
                Some(DerivedField::MovingAverage(n))
            }
            _ => None,
        }
    }
}

/// Any field that can appear on a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Field {
    Date,
    SecurityId,
    Source(SourceField),
    Derived(DerivedField),
}

impl Field {
    pub fn key(self) -> String {
        match self {
            Field::Date => "date".to_string(),
            Field::SecurityId => "security_id".to_string(),
            Field::Source(f) => f.key().to_string(),
            Field::Derived(f) => f.key(),
        }
    }

    pub fn label(self) -> String {
        match self {
            Field::Date => "日期".to_string(),
            Field::SecurityId => "股票代碼".to_string(),
            Field::Source(f) => f.label().to_string(),
            Field::Derived(f) => f.label(),
        }
    }

    /// Resolve a field from either its key or its exchange label.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "date" | "日期" => return Some(Field::Date),
            "security_id" | "股票代碼" => return Some(Field::SecurityId),
            _ => {}
        }
        if let Some(f) = SourceField::ALL
            .into_iter()
            .find(|f| f.key() == name || f.label() == name)
        {
            return Some(Field::Source(f));
        }
        DerivedField::from_name(name).map(Field::Derived)
    }
}

impl From<SourceField> for Field {
    fn from(f: SourceField) -> Self {
        Field::Source(f)
    }
}

impl From<DerivedField> for Field {
    fn from(f: DerivedField) -> Self {
        Field::Derived(f)
    }
}
