use rand::Rng;
use serde::{
    Deserialize,
    Serialize,
};
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Symbol {
    Kart,
    Mushroom,
    Banana,
    Shell,
    Star,
    Flag,
    Boost,
    Trophy,
}

impl Symbol {
    pub fn emoji(self) -> &'static str {
        match self {
            Symbol::Kart => "🚗",
            Symbol::Mushroom => "🍄",
            Symbol::Banana => "🍌",
            Symbol::Shell => "🐢",
            Symbol::Star => "⭐",
            Symbol::Flag => "🏁",
            Symbol::Boost => "💨",
            Symbol::Trophy => "🏆",
        }
    }

    pub fn is_trophy(self) -> bool {
        self == Symbol::Trophy
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.emoji())
    }
}

pub const COMMON_SYMBOLS: [Symbol; 7] = [
    Symbol::Kart,
    Symbol::Mushroom,
    Symbol::Banana,
    Symbol::Shell,
    Symbol::Star,
    Symbol::Flag,
    Symbol::Boost,
];

/// Copies of every common symbol in the animation pool.
pub const COMMON_TICK_WEIGHT: usize = 4;
/// Copies of the trophy in the animation pool.
pub const TROPHY_TICK_WEIGHT: usize = 1;
pub const TICK_POOL_SIZE: usize =
    COMMON_SYMBOLS.len() * COMMON_TICK_WEIGHT + TROPHY_TICK_WEIGHT;

/// Chance that a stopping reel lands on the trophy. Independent of the
/// animation pool weighting (1 in 29), which only drives cosmetic ticks.
pub const TROPHY_PROBABILITY: f64 = 0.06;

/// Animation pool: the common symbols repeated in order, trophy last.
pub static TICK_POOL: [Symbol; TICK_POOL_SIZE] = build_tick_pool();

const fn build_tick_pool() -> [Symbol; TICK_POOL_SIZE] {
    let mut pool = [Symbol::Trophy; TICK_POOL_SIZE];
    let mut i = 0;
    while i < COMMON_SYMBOLS.len() * COMMON_TICK_WEIGHT {
        pool[i] = COMMON_SYMBOLS[i % COMMON_SYMBOLS.len()];
        i += 1;
    }
    pool
}

/// Uniform pick from the weighted animation pool.
pub fn tick_symbol<R: Rng + ?Sized>(rng: &mut R) -> Symbol {
    TICK_POOL[rng.random_range(0..TICK_POOL.len())]
}

/// Final reel result: trophy with `trophy_probability`, otherwise a uniform
/// common symbol.
pub fn final_symbol<R: Rng + ?Sized>(rng: &mut R, trophy_probability: f64) -> Symbol {
    if rng.random::<f64>() < trophy_probability {
        Symbol::Trophy
    } else {
        COMMON_SYMBOLS[rng.random_range(0..COMMON_SYMBOLS.len())]
    }
}

/// Randomness consumed by a spin. The engine only ever talks to this trait so
/// a scripted source can force reel outcomes.
pub trait SymbolSource {
    fn tick_symbol(&mut self) -> Symbol;

    fn final_symbol(&mut self, reel: usize) -> Symbol;

    /// Extra stop delay in milliseconds, in `[0, max_ms)`.
    fn stop_jitter(&mut self, max_ms: u64) -> u64;
}

pub struct RandomSymbols<R> {
    rng: R,
    trophy_probability: f64,
}

impl<R: Rng> RandomSymbols<R> {
    pub fn new(rng: R, trophy_probability: f64) -> Self {
        Self {
            rng,
            trophy_probability,
        }
    }
}

impl<R: Rng> SymbolSource for RandomSymbols<R> {
    fn tick_symbol(&mut self) -> Symbol {
        tick_symbol(&mut self.rng)
    }

    fn final_symbol(&mut self, _reel: usize) -> Symbol {
        final_symbol(&mut self.rng, self.trophy_probability)
    }

    fn stop_jitter(&mut self, max_ms: u64) -> u64 {
        if max_ms == 0 {
            0
        } else {
            self.rng.random_range(0..max_ms)
        }
    }
}
