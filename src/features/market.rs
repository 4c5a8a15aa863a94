//! Market features from sportsbook lines
//!
//! Consensus values are plain means across books. Nothing here reads a
//! game result.

use crate::data::StatsStore;
use crate::features::nullable::WeightedTotal;
use crate::{BettingLine, GameId, Result};

/// Implied win probability of American odds (-150 → 0.6, +130 → 0.4348).
/// `None` for 0, which is not a valid price.
pub fn american_to_probability(odds: i32) -> Option<f64> {
    let odds = f64::from(odds);
    if odds > 0.0 {
        Some(100.0 / (odds + 100.0))
    } else if odds < 0.0 {
        Some(odds.abs() / (odds.abs() + 100.0))
    } else {
        None
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MarketFeatures {
    pub books: usize,
    /// Mean home spread
    pub consensus_spread: Option<f64>,
    /// Mean over/under
    pub consensus_total: Option<f64>,
    pub home_moneyline_prob: Option<f64>,
    pub away_moneyline_prob: Option<f64>,
}

impl MarketFeatures {
    pub fn from_lines(lines: &[BettingLine]) -> Self {
        MarketFeatures {
            books: lines.len(),
            consensus_spread: mean_of(lines, |l| l.spread_home),
            consensus_total: mean_of(lines, |l| l.over_under),
            home_moneyline_prob: mean_of(lines, |l| {
                l.moneyline_home.and_then(american_to_probability)
            }),
            away_moneyline_prob: mean_of(lines, |l| {
                l.moneyline_away.and_then(american_to_probability)
            }),
        }
    }
}

fn mean_of(lines: &[BettingLine], f: impl Fn(&BettingLine) -> Option<f64>) -> Option<f64> {
    lines
        .iter()
        .map(|l| (f(l), 1.0))
        .collect::<WeightedTotal>()
        .mean()
}

pub fn market_features<S: StatsStore + ?Sized>(store: &S, game_id: &GameId) -> Result<MarketFeatures> {
    let lines = store.get_betting_lines(game_id)?;
    Ok(MarketFeatures::from_lines(&lines))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn line(book: &str, spread: Option<f64>, ml_home: Option<i32>, ml_away: Option<i32>, total: Option<f64>) -> BettingLine {
        BettingLine {
            game_id: GameId::new("g"),
            sportsbook: book.to_string(),
            spread_home: spread,
            moneyline_home: ml_home,
            moneyline_away: ml_away,
            over_under: total,
        }
    }

    #[test]
    fn test_american_odds() {
        assert_relative_eq!(american_to_probability(-150).unwrap(), 0.6, epsilon = 1e-12);
        assert_relative_eq!(american_to_probability(130).unwrap(), 100.0 / 230.0, epsilon = 1e-12);
        assert_relative_eq!(american_to_probability(100).unwrap(), 0.5);
        assert!(american_to_probability(0).is_none());
    }

    #[test]
    fn test_consensus() {
        let lines = vec![
            line("a", Some(-5.5), Some(-200), Some(170), Some(221.5)),
            line("b", Some(-4.5), Some(-180), Some(155), None),
        ];
        let m = MarketFeatures::from_lines(&lines);
        assert_eq!(m.books, 2);
        assert_relative_eq!(m.consensus_spread.unwrap(), -5.0);
        assert_relative_eq!(m.consensus_total.unwrap(), 221.5);
        let home = (200.0 / 300.0 + 180.0 / 280.0) / 2.0;
        assert_relative_eq!(m.home_moneyline_prob.unwrap(), home, epsilon = 1e-12);
    }

    #[test]
    fn test_no_lines_is_null() {
        let m = MarketFeatures::from_lines(&[]);
        assert_eq!(m, MarketFeatures::default());
    }
}
