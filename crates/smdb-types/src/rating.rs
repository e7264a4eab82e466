//! Rating aggregation and its derived display.
//!
//! A movie's `rating`/`num_reviews` pair is a projection over its reviews.
//! [`Aggregate::from_ratings`] recomputes it from the full review set every
//! time; nothing here applies incremental deltas.

use std::fmt;

use serde::{Deserialize, Serialize};

pub const MIN_RATING: f64 = 0.0;
pub const MAX_RATING: f64 = 10.0;

/// Number of hearts rendered for a rated movie.
pub const HEART_SLOTS: usize = 5;

/// Inclusive bounds check. NaN and infinities are rejected.
pub fn is_valid_rating(rating: f64) -> bool {
    rating.is_finite() && (MIN_RATING..=MAX_RATING).contains(&rating)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aggregate {
    pub rating: f64,
    pub num_reviews: u32,
}

impl Aggregate {
    pub const EMPTY: Aggregate = Aggregate {
        rating: 0.0,
        num_reviews: 0,
    };

    /// Mean of `ratings`, or [`Aggregate::EMPTY`] for an empty set.
    ///
    /// Ratings are summed in sorted order so the result is bit-identical no
    /// matter which order the store returns them in.
    pub fn from_ratings<I>(ratings: I) -> Self
    where
        I: IntoIterator<Item = f64>,
    {
        let mut values: Vec<f64> = ratings.into_iter().collect();
        if values.is_empty() {
            return Self::EMPTY;
        }
        values.sort_by(f64::total_cmp);

        let count = values.len();
        let sum: f64 = values.iter().sum();
        Self {
            rating: sum / count as f64,
            num_reviews: count as u32,
        }
    }

    pub fn has_reviews(&self) -> bool {
        self.num_reviews > 0
    }

    pub fn display(&self) -> RatingDisplay {
        RatingDisplay::new(self.rating, self.num_reviews)
    }

    pub fn hearts(&self) -> Option<[Heart; HEART_SLOTS]> {
        hearts(self.rating, self.num_reviews)
    }
}

/// Round to one decimal place, the precision ratings are shown with.
pub fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Heart {
    Full,
    Half,
    Empty,
}

/// Heart row for a 0–10 rating, or `None` when there are no reviews.
///
/// The rating is scaled to 0–5 as `round(rating) / 2`. A slot is half when
/// `slot + 0.5` equals the scaled value exactly; that test runs before the
/// full test so that 9 renders as four full hearts and one half.
pub fn hearts(rating: f64, num_reviews: u32) -> Option<[Heart; HEART_SLOTS]> {
    if num_reviews == 0 {
        return None;
    }

    let rounded = rating.round() / 2.0;
    let mut row = [Heart::Empty; HEART_SLOTS];
    for (slot, heart) in row.iter_mut().enumerate() {
        let index = slot as f64;
        *heart = if index + 0.5 == rounded {
            Heart::Half
        } else if index < rounded {
            Heart::Full
        } else {
            Heart::Empty
        };
    }
    Some(row)
}

/// Text form of an aggregate. Decided by `num_reviews`, never by `rating`,
/// so an unreviewed movie and a movie rated zero stay distinguishable.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RatingDisplay {
    NoReviews,
    Rated(f64),
}

impl RatingDisplay {
    pub fn new(rating: f64, num_reviews: u32) -> Self {
        if num_reviews == 0 {
            Self::NoReviews
        } else {
            Self::Rated(round_one_decimal(rating))
        }
    }
}

impl fmt::Display for RatingDisplay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoReviews => f.write_str("No reviews"),
            Self::Rated(rating) => write!(f, "{:.1}/10", rating),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_set_is_zero_with_no_reviews() {
        let agg = Aggregate::from_ratings(Vec::new());
        assert_eq!(agg, Aggregate::EMPTY);
        assert_eq!(agg.display().to_string(), "No reviews");
        assert!(agg.hearts().is_none());
    }

    #[test]
    fn rating_is_arithmetic_mean() {
        let sets: &[&[f64]] = &[
            &[7.0],
            &[10.0, 0.0],
            &[8.5, 6.0, 9.0],
            &[1.1, 2.2, 3.3, 4.4, 5.5, 6.6],
            &[0.0, 0.0, 0.0],
        ];
        for set in sets {
            let agg = Aggregate::from_ratings(set.iter().copied());
            let mean = set.iter().sum::<f64>() / set.len() as f64;
            assert_eq!(agg.num_reviews as usize, set.len());
            assert_eq!(round_one_decimal(agg.rating), round_one_decimal(mean));
        }
    }

    #[test]
    fn result_does_not_depend_on_order() {
        let forward = Aggregate::from_ratings([0.1, 0.2, 0.3, 9.9, 4.7]);
        let backward = Aggregate::from_ratings([4.7, 9.9, 0.3, 0.2, 0.1]);
        assert_eq!(forward.rating.to_bits(), backward.rating.to_bits());
    }

    #[test]
    fn zero_rating_with_reviews_is_not_no_reviews() {
        let agg = Aggregate::from_ratings([0.0]);
        assert_eq!(agg.display().to_string(), "0.0/10");
        assert_eq!(agg.hearts(), Some([Heart::Empty; HEART_SLOTS]));
    }

    #[test]
    fn display_rounds_to_one_decimal() {
        assert_eq!(RatingDisplay::new(7.25, 4).to_string(), "7.3/10");
        assert_eq!(RatingDisplay::new(6.6666, 3).to_string(), "6.7/10");
        assert_eq!(RatingDisplay::new(10.0, 1).to_string(), "10.0/10");
        assert_eq!(RatingDisplay::new(0.0, 0).to_string(), "No reviews");
    }

    #[test]
    fn ten_renders_five_full_hearts() {
        assert_eq!(hearts(10.0, 2), Some([Heart::Full; HEART_SLOTS]));
    }

    #[test]
    fn nine_renders_four_full_and_one_half() {
        assert_eq!(
            hearts(9.0, 1),
            Some([Heart::Full, Heart::Full, Heart::Full, Heart::Full, Heart::Half])
        );
    }

    #[test]
    fn half_heart_boundaries() {
        // round(1.0) / 2 = 0.5: the first slot is the half.
        assert_eq!(
            hearts(1.0, 1),
            Some([Heart::Half, Heart::Empty, Heart::Empty, Heart::Empty, Heart::Empty])
        );
        // round(4.4) / 2 = 2.0: two full, no half.
        assert_eq!(
            hearts(4.4, 1),
            Some([Heart::Full, Heart::Full, Heart::Empty, Heart::Empty, Heart::Empty])
        );
        // round(4.5) / 2 = 2.5: rounds half away from zero.
        assert_eq!(
            hearts(4.5, 1),
            Some([Heart::Full, Heart::Full, Heart::Half, Heart::Empty, Heart::Empty])
        );
    }

    #[test]
    fn bounds_are_inclusive() {
        assert!(is_valid_rating(0.0));
        assert!(is_valid_rating(10.0));
        assert!(is_valid_rating(5.5));
        assert!(!is_valid_rating(11.0));
        assert!(!is_valid_rating(-0.1));
        assert!(!is_valid_rating(f64::NAN));
        assert!(!is_valid_rating(f64::INFINITY));
    }
}
