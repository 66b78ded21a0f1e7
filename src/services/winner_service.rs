//! End-of-game winner enumeration and prize split.

use crate::{
    dao::models::UserId,
    dto::ws::WinnerShare,
};

/// Split `prize_pool` evenly between `winners`, rounding half up.
///
/// Returns the share of one winner together with the per-winner list, in the
/// order the winners were given. No winners means no share.
pub fn split_prize(prize_pool: i64, winners: &[UserId]) -> (i64, Vec<WinnerShare>) {
    if winners.is_empty() {
        return (0, Vec::new());
    }
    let count = winners.len() as i128;
    let pool = i128::from(prize_pool);
    let share = (2 * pool + count).div_euclid(2 * count);
    let share = i64::try_from(share).unwrap_or(i64::MAX);

    let shares = winners
        .iter()
        .map(|&user_id| WinnerShare {
            user_id,
            prize: share,
        })
        .collect();
    (share, shares)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_winners_no_prize() {
        let (share, winners) = split_prize(1_000, &[]);
        assert_eq!(share, 0);
        assert!(winners.is_empty());
    }

    #[test]
    fn half_rounds_up() {
        assert_eq!(split_prize(5, &[1, 2]).0, 3);
        assert_eq!(split_prize(100, &[1, 2, 3]).0, 33);
        assert_eq!(split_prize(200, &[1, 2, 3]).0, 67);
    }

    #[test]
    fn every_winner_gets_the_same_share() {
        let (share, winners) = split_prize(90, &[4, 8, 15]);
        assert_eq!(share, 30);
        assert_eq!(
            winners.iter().map(|w| (w.user_id, w.prize)).collect::<Vec<_>>(),
            vec![(4, 30), (8, 30), (15, 30)]
        );
    }
}
