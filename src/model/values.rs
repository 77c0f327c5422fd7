use serde::{Deserialize, Serialize};
use std::fmt;

/// A signed decimal with one fractional digit, stored as tenths
///
/// Flight numbers (`-1`, `5.5`) and measurements (`175.1 gr`, `21.1 cm`)
/// all fit this shape. Storing tenths keeps the value `Ord` and `Eq` so it
/// can take part in deterministic tie-breaking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Tenths(pub i32);

impl Tenths {
    /// Parses the leading number of a field, ignoring any trailing unit
    ///
    /// Returns None when the text does not start with a number. Values with
    /// more than one fractional digit are rounded to the nearest tenth.
    ///
    /// # Examples
    ///
    /// ```
    /// use disc_harvest::model::Tenths;
    ///
    /// assert_eq!(Tenths::parse("5.5"), Some(Tenths(55)));
    /// assert_eq!(Tenths::parse("-1"), Some(Tenths(-10)));
    /// assert_eq!(Tenths::parse(" 175.1 gr"), Some(Tenths(1751)));
    /// assert_eq!(Tenths::parse("n/a"), None);
    /// ```
    pub fn parse(raw: &str) -> Option<Self> {
        let scaled = parse_scaled(raw, 10.0)?;
        i32::try_from(scaled).ok().map(Self)
    }

    pub fn as_f64(&self) -> f64 {
        f64::from(self.0) / 10.0
    }
}

impl fmt::Display for Tenths {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        if abs % 10 == 0 {
            write!(f, "{}{}", sign, abs / 10)
        } else {
            write!(f, "{}{}.{}", sign, abs / 10, abs % 10)
        }
    }
}

/// A non-integral measurement with three fractional digits
///
/// Rim ratios (`0.094`) and flex readings (`9.07 kg`) need more precision
/// than [`Tenths`] offers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Thousandths(pub i64);

impl Thousandths {
    /// Parses the leading number of a field, rounding to the nearest thousandth
    ///
    /// ```
    /// use disc_harvest::model::Thousandths;
    ///
    /// assert_eq!(Thousandths::parse("0.094"), Some(Thousandths(94)));
    /// assert_eq!(Thousandths::parse("9.07 kg"), Some(Thousandths(9070)));
    /// ```
    pub fn parse(raw: &str) -> Option<Self> {
        parse_scaled(raw, 1000.0).map(Self)
    }

    pub fn as_f64(&self) -> f64 {
        self.0 as f64 / 1000.0
    }
}

impl fmt::Display for Thousandths {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let fraction = format!("{:03}", abs % 1000);
        let fraction = fraction.trim_end_matches('0');
        if fraction.is_empty() {
            write!(f, "{}{}", sign, abs / 1000)
        } else {
            write!(f, "{}{}.{}", sign, abs / 1000, fraction)
        }
    }
}

/// Leading number of `raw` multiplied by `scale` and rounded
fn parse_scaled(raw: &str, scale: f64) -> Option<i64> {
    let raw = raw.trim();
    let end = raw
        .char_indices()
        .find(|&(i, c)| !(c.is_ascii_digit() || c == '.' || (i == 0 && (c == '-' || c == '+'))))
        .map(|(i, _)| i)
        .unwrap_or(raw.len());

    let value: f64 = raw[..end].parse().ok()?;
    if !value.is_finite() {
        return None;
    }

    let scaled = (value * scale).round();
    if scaled.abs() > i64::MAX as f64 {
        return None;
    }
    Some(scaled as i64)
}

/// Whether a disc mold is still being manufactured
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ReleaseStatus {
    InProduction,
    OutOfProduction,
}

impl ReleaseStatus {
    /// Reads the status from the free text shown on a disc page
    pub fn parse(raw: &str) -> Option<Self> {
        let text = raw.trim().to_lowercase();
        if text.contains("out of production") || text.contains("discontinued") {
            Some(Self::OutOfProduction)
        } else if text.contains("production") || text == "current" || text == "active" {
            Some(Self::InProduction)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InProduction => "in_production",
            Self::OutOfProduction => "out_of_production",
        }
    }
}

impl fmt::Display for ReleaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Monotonic fetch sequence number of the page a value came from
///
/// Stamps are handed out by the coordinator in page completion order and
/// persisted with the candidate journal, so a resumed run sees the same
/// stamps as the run that fetched the pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct Stamp(pub u64);

impl Stamp {
    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for Stamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A value together with the stamp of the page it was read from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stamped<T> {
    pub value: T,
    pub stamp: Stamp,
}

/// An entity attribute that may not have been observed yet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field<T>(pub(crate) Option<Stamped<T>>);

impl<T> Field<T> {
    pub fn empty() -> Self {
        Self(None)
    }

    /// Wraps an optional parsed value
    pub fn observed(value: Option<T>, stamp: Stamp) -> Self {
        Self(value.map(|value| Stamped { value, stamp }))
    }

    pub fn value(&self) -> Option<&T> {
        self.0.as_ref().map(|s| &s.value)
    }

    pub fn stamp(&self) -> Option<Stamp> {
        self.0.as_ref().map(|s| s.stamp)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_none()
    }
}

impl<T> Default for Field<T> {
    fn default() -> Self {
        Self::empty()
    }
}
