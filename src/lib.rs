pub mod audio;
pub mod balance;
pub mod config;
pub mod engine;
pub mod payout;
pub mod storage;
pub mod symbols;

pub use crate::{
    audio::{
        AudioSink,
        Cue,
        Jukebox,
    },
    balance::{
        Ledger,
        WagerRejection,
        format_money,
        validate_wager,
    },
    config::GameConfig,
    engine::{
        EngineEvent,
        Phase,
        SpinEngine,
        SpinRejection,
    },
    payout::{
        Outcome,
        Settlement,
        evaluate,
    },
    storage::{
        FileStore,
        InMemoryStore,
        KeyValueStore,
    },
    symbols::{
        RandomSymbols,
        Symbol,
        SymbolSource,
    },
};
