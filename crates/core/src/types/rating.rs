//! Review star ratings.

use serde::{Deserialize, Serialize};

/// A rating outside the 1–5 range.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("rating must be between 1 and 5 (got {0})")]
pub struct RatingError(pub i16);

/// A 1–5 star rating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i16", into = "i16")]
pub struct Rating(i16);

impl Rating {
    /// Create a rating.
    ///
    /// # Errors
    ///
    /// Returns `RatingError` if `value` is not in `1..=5`.
    pub const fn new(value: i16) -> Result<Self, RatingError> {
        if value < 1 || value > 5 {
            return Err(RatingError(value));
        }
        Ok(Self(value))
    }

    #[must_use]
    pub const fn get(self) -> i16 {
        self.0
    }
}

impl TryFrom<i16> for Rating {
    type Error = RatingError;

    fn try_from(value: i16) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Rating> for i16 {
    fn from(rating: Rating) -> Self {
        rating.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range() {
        assert_eq!(Rating::new(0), Err(RatingError(0)));
        assert_eq!(Rating::new(6), Err(RatingError(6)));
        assert_eq!(Rating::new(5).map(Rating::get), Ok(5));
    }
}
