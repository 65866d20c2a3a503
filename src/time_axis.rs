//! Decoding a file's time axis into concrete timestamps.
//!
//! A time variable stores durations relative to an origin carried in a
//! companion attribute. The attribute's textual form is `"<date> <time>"`
//! (space-separated); it is normalised to `"<date>T<time>Z"` and parsed as
//! UTC. Each value is interpreted as seconds, rounded to the nearest whole
//! second, and added to the origin.
#![warn(missing_docs)]

use chrono::{DateTime, Duration, Utc};
use log::debug;

use crate::error::BridgeError;
use crate::store::values::Values;

/// Parses a `"<date> <time>"` origin attribute into a UTC timestamp.
///
/// # Errors
/// [`BridgeError::TimeOriginUnparseable`] when the text has no date/time
/// split or does not parse as an ISO-8601 instant.
pub fn parse_origin(text: &str) -> Result<DateTime<Utc>, BridgeError> {
    let mut parts = text.split_whitespace();
    let (Some(date), Some(time), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(BridgeError::TimeOriginUnparseable(text.to_owned()));
    };
    let iso = format!("{date}T{time}Z");
    DateTime::parse_from_rfc3339(&iso)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| BridgeError::TimeOriginUnparseable(text.to_owned()))
}

/// An ascending list of timestamps, one per file time step.
#[derive(Clone, Debug, PartialEq)]
pub struct TimeAxis {
    origin: DateTime<Utc>,
    stamps: Vec<DateTime<Utc>>,
}

impl TimeAxis {
    /// Decodes a time variable's values against an origin attribute.
    ///
    /// Accepts any numeric element type — producers disagree on whether a
    /// time variable is double, float or int, so values are widened before
    /// rounding.
    pub fn decode(origin_text: &str, seconds: &Values) -> Result<Self, BridgeError> {
        let origin = parse_origin(origin_text)?;
        let mut stamps = Vec::with_capacity(seconds.len());
        for index in 0..seconds.len() {
            let raw = seconds.get_f64(index)?;
            stamps.push(origin + Duration::seconds(raw.round() as i64));
        }
        debug!("decoded time axis: {} step(s) from {origin}", stamps.len());
        Ok(Self { origin, stamps })
    }

    /// The origin the axis was decoded against.
    #[inline]
    pub fn origin(&self) -> DateTime<Utc> {
        self.origin
    }

    /// Number of time steps.
    #[inline]
    pub fn len(&self) -> usize {
        self.stamps.len()
    }

    /// Whether the axis has no steps.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.stamps.is_empty()
    }

    /// The decoded timestamps in file order.
    #[inline]
    pub fn stamps(&self) -> &[DateTime<Utc>] {
        &self.stamps
    }

    /// Index of the step exactly matching `stamp`. No interpolation; a
    /// near-miss is a [`BridgeError::TimestampNotFound`].
    pub fn index_of(&self, stamp: DateTime<Utc>) -> Result<usize, BridgeError> {
        self.stamps
            .iter()
            .position(|&s| s == stamp)
            .ok_or_else(|| BridgeError::TimestampNotFound(stamp.to_rfc3339()))
    }
}
