use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::StatsError;

/// Fraction of the full corpus processed by a run, in `(0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct DownScale(f64);

impl DownScale {
    pub fn new(value: f64) -> Result<Self, StatsError> {
        if value.is_finite() && value > 0.0 && value <= 1.0 {
            Ok(Self(value))
        } else {
            Err(StatsError::InvalidScale(value))
        }
    }

    /// The whole corpus.
    pub fn full() -> Self {
        Self(1.0)
    }

    pub fn get(self) -> f64 {
        self.0
    }
}

impl TryFrom<f64> for DownScale {
    type Error = StatsError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<DownScale> for f64 {
    fn from(scale: DownScale) -> Self {
        scale.0
    }
}

impl fmt::Display for DownScale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_unit_interval() {
        assert_eq!(DownScale::new(1.0).unwrap().get(), 1.0);
        assert_eq!(DownScale::new(0.001).unwrap().get(), 0.001);
    }

    #[test]
    fn rejects_out_of_range() {
        for bad in [0.0, -0.5, 1.5, f64::NAN, f64::INFINITY] {
            assert!(matches!(DownScale::new(bad), Err(StatsError::InvalidScale(_))), "{bad}");
        }
    }

    #[test]
    fn deserialization_validates() {
        let ok: DownScale = serde_json::from_str("0.25").unwrap();
        assert_eq!(ok.get(), 0.25);
        assert!(serde_json::from_str::<DownScale>("1.5").is_err());
        assert_eq!(serde_json::to_string(&ok).unwrap(), "0.25");
    }
}
