use serde::{Deserialize, Serialize};

/// Complementary YES/NO prices of a binary-outcome market.
///
/// Invariant: `0 < yes < 1` and `no == 1 - yes`. The only way to build one is
/// through [`Odds::from_yes`], which rejects degenerate, out-of-range and NaN inputs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Odds {
    yes: f64,
    no: f64,
}

impl Odds {
    /// Build odds from a YES price. Returns `None` unless `0 < yes < 1`.
    pub fn from_yes(yes: f64) -> Option<Self> {
        // NaN fails both comparisons
        if yes > 0.0 && yes < 1.0 {
            Some(Self { yes, no: 1.0 - yes })
        } else {
            None
        }
    }

    pub fn yes(&self) -> f64 {
        self.yes
    }

    pub fn no(&self) -> f64 {
        self.no
    }

    /// `(yes, no)` pair in callback order
    pub fn pair(&self) -> (f64, f64) {
        (self.yes, self.no)
    }
}
