use crate::{
    audio::Cue,
    balance::format_money,
    symbols::Symbol,
};
use itertools::Itertools;

pub const JACKPOT_MULTIPLIER: f64 = 25.0;
pub const FULL_MATCH_MULTIPLIER: f64 = 15.0;
pub const PAIR_MULTIPLIER: f64 = 2.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// every reel shows the trophy
    Jackpot,
    /// every reel shows the same common symbol
    FullMatch(Symbol),
    /// at least two reels agree, but not all of them
    Pair(Symbol),
    NoWin,
}

impl Outcome {
    pub fn multiplier(self) -> f64 {
        match self {
            Outcome::Jackpot => JACKPOT_MULTIPLIER,
            Outcome::FullMatch(_) => FULL_MATCH_MULTIPLIER,
            Outcome::Pair(_) => PAIR_MULTIPLIER,
            Outcome::NoWin => 0.0,
        }
    }

    pub fn cue(self) -> Option<Cue> {
        match self {
            Outcome::Jackpot | Outcome::FullMatch(_) => Some(Cue::WinBig),
            Outcome::Pair(_) => Some(Cue::WinSmall),
            Outcome::NoWin => None,
        }
    }
}

/// Only the highest occurrence count matters. On a tie the symbol that
/// appears first in reel order is reported.
pub fn classify(symbols: &[Symbol]) -> Outcome {
    let counts = symbols.iter().copied().counts();
    let Some(best) = counts.values().copied().max() else {
        return Outcome::NoWin;
    };
    let Some(winner) = symbols.iter().copied().find(|s| counts[s] == best) else {
        return Outcome::NoWin;
    };
    if best == symbols.len() && best >= 2 {
        if winner.is_trophy() {
            Outcome::Jackpot
        } else {
            Outcome::FullMatch(winner)
        }
    } else if best >= 2 {
        Outcome::Pair(winner)
    } else {
        Outcome::NoWin
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Settlement {
    pub symbols: Vec<Symbol>,
    pub wager: f64,
    pub outcome: Outcome,
    pub payout: f64,
}

impl Settlement {
    pub fn message(&self) -> String {
        let win = format_money(self.payout);
        let reels = self.symbols.len();
        match self.outcome {
            Outcome::Jackpot => {
                format!("JACKPOT! {reels}x {} | Win: {win}", Symbol::Trophy)
            }
            Outcome::FullMatch(_) => {
                format!("Big win! {reels} of a kind | Win: {win}")
            }
            Outcome::Pair(symbol) => format!("Nice! 2x {symbol} | Win: {win}"),
            Outcome::NoWin => String::from("No win, better luck next time!"),
        }
    }
}

pub fn evaluate(symbols: &[Symbol], wager: f64) -> Settlement {
    let outcome = classify(symbols);
    Settlement {
        symbols: symbols.to_vec(),
        wager,
        outcome,
        payout: wager * outcome.multiplier(),
    }
}
