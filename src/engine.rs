//! Spin scheduling and settlement.
//!
//! Timers run as tokio tasks that only post [`EngineEvent`]s back to the owner
//! of the [`SpinEngine`]. All state changes happen in [`SpinEngine::handle`] on
//! the owner's task, so nothing here needs a lock.

use crate::{
    audio::{
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
    payout::{
        Settlement,
        evaluate,
    },
    storage::KeyValueStore,
    symbols::{
        Symbol,
        SymbolSource,
    },
};
use std::{
    fmt,
    time::Duration,
};
use tokio::{
    sync::mpsc,
    task::AbortHandle,
    time::{
        self,
        Instant,
        MissedTickBehavior,
    },
};
use tracing::{
    debug,
    info,
};

pub type SpinId = u64;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Spinning,
    Settling,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EngineEvent {
    Tick { spin: SpinId, reel: usize },
    Stop { spin: SpinId, reel: usize },
    Settle { spin: SpinId },
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SpinRejection {
    Busy,
    Wager(WagerRejection),
}

impl fmt::Display for SpinRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpinRejection::Busy => write!(f, "The reels are still spinning."),
            SpinRejection::Wager(rejection) => write!(f, "{rejection}"),
        }
    }
}

struct ReelTimers {
    tick: AbortHandle,
    stop: AbortHandle,
}

struct SpinSession {
    id: SpinId,
    wager: f64,
    stopped: Vec<bool>,
    stopped_count: usize,
    timers: Vec<ReelTimers>,
    settle: Option<AbortHandle>,
}

impl SpinSession {
    fn all_stopped(&self) -> bool {
        self.stopped_count == self.stopped.len()
    }
}

impl Drop for SpinSession {
    fn drop(&mut self) {
        for timers in &self.timers {
            timers.tick.abort();
            timers.stop.abort();
        }
        if let Some(settle) = &self.settle {
            settle.abort();
        }
    }
}

pub struct SpinEngine<S, Src> {
    config: GameConfig,
    ledger: Ledger<S>,
    symbols: Src,
    jukebox: Jukebox,
    reels: Vec<Symbol>,
    phase: Phase,
    session: Option<SpinSession>,
    next_spin: SpinId,
    message: String,
    last_settlement: Option<Settlement>,
    events: mpsc::UnboundedSender<EngineEvent>,
}

impl<S: KeyValueStore, Src: SymbolSource> SpinEngine<S, Src> {
    /// Builds an idle engine. Timer events arrive on the returned receiver and
    /// must be fed back through [`SpinEngine::handle`].
    pub fn new(
        config: GameConfig,
        ledger: Ledger<S>,
        mut symbols: Src,
        jukebox: Jukebox,
    ) -> (Self, mpsc::UnboundedReceiver<EngineEvent>) {
        let (events, receiver) = mpsc::unbounded_channel();
        let reels = (0..config.reel_count)
            .map(|_| symbols.tick_symbol())
            .collect();
        let engine = Self {
            config,
            ledger,
            symbols,
            jukebox,
            reels,
            phase: Phase::Idle,
            session: None,
            next_spin: 1,
            message: String::new(),
            last_settlement: None,
            events,
        };
        (engine, receiver)
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn balance(&self) -> f64 {
        self.ledger.balance()
    }

    pub fn ledger(&self) -> &Ledger<S> {
        &self.ledger
    }

    pub fn reels(&self) -> &[Symbol] {
        &self.reels
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// The trigger control is only usable while idle.
    pub fn can_spin(&self) -> bool {
        self.phase == Phase::Idle
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn last_settlement(&self) -> Option<&Settlement> {
        self.last_settlement.as_ref()
    }

    pub fn reel_stopped(&self, reel: usize) -> bool {
        match &self.session {
            Some(session) => session.stopped.get(reel).copied().unwrap_or(true),
            None => true,
        }
    }

    pub fn stopped_count(&self) -> usize {
        self.session
            .as_ref()
            .map_or(self.config.reel_count, |session| session.stopped_count)
    }

    /// Largest wager the balance allows, floored to whole units.
    pub fn max_wager(&self) -> f64 {
        self.ledger.balance().floor()
    }

    /// Any user interaction may start the ambient loop.
    pub fn note_interaction(&mut self) {
        self.jukebox.start_ambient();
    }

    pub fn start_spin(&mut self, raw_wager: f64) -> Result<SpinId, SpinRejection> {
        self.jukebox.start_ambient();
        if self.phase != Phase::Idle {
            debug!(phase = ?self.phase, "spin requested while busy");
            return Err(SpinRejection::Busy);
        }
        let wager = match validate_wager(raw_wager, self.ledger.balance()) {
            Ok(wager) => wager,
            Err(rejection) => {
                info!(raw_wager, balance = self.ledger.balance(), %rejection, "wager rejected");
                self.message = rejection.to_string();
                return Err(SpinRejection::Wager(rejection));
            }
        };

        self.ledger.debit(wager);
        let id = self.next_spin;
        self.next_spin += 1;
        self.phase = Phase::Spinning;
        self.message = String::from("Spinning...");
        self.jukebox.play(Cue::SpinLoop);

        let mut timers = Vec::with_capacity(self.config.reel_count);
        for reel in 0..self.config.reel_count {
            let jitter = self.symbols.stop_jitter(self.config.stop_jitter_ms);
            timers.push(ReelTimers {
                tick: spawn_ticker(
                    self.events.clone(),
                    id,
                    reel,
                    self.config.tick_interval(reel),
                ),
                stop: spawn_delayed(
                    self.events.clone(),
                    EngineEvent::Stop { spin: id, reel },
                    self.config.stop_delay(reel, jitter),
                ),
            });
        }
        self.session = Some(SpinSession {
            id,
            wager,
            stopped: vec![false; self.config.reel_count],
            stopped_count: 0,
            timers,
            settle: None,
        });
        info!(
            spin = id,
            wager,
            balance = self.ledger.balance(),
            "spin started"
        );
        Ok(id)
    }

    /// Applies one timer event. Returns the settlement when this event
    /// completed the spin.
    pub fn handle(&mut self, event: EngineEvent) -> Option<Settlement> {
        match event {
            EngineEvent::Tick { spin, reel } => {
                self.on_tick(spin, reel);
                None
            }
            EngineEvent::Stop { spin, reel } => {
                self.on_stop(spin, reel);
                None
            }
            EngineEvent::Settle { spin } => self.on_settle(spin),
        }
    }

    fn current_session(&self, spin: SpinId) -> bool {
        self.session.as_ref().is_some_and(|session| session.id == spin)
    }

    fn on_tick(&mut self, spin: SpinId, reel: usize) {
        if self.phase != Phase::Spinning || !self.current_session(spin) {
            return;
        }
        if self.reel_stopped(reel) {
            return;
        }
        self.reels[reel] = self.symbols.tick_symbol();
    }

    fn on_stop(&mut self, spin: SpinId, reel: usize) {
        if self.phase != Phase::Spinning || !self.current_session(spin) {
            debug!(spin, reel, "ignoring stale stop");
            return;
        }
        let Some(session) = self.session.as_mut() else {
            return;
        };
        match session.stopped.get_mut(reel) {
            Some(stopped) if !*stopped => *stopped = true,
            _ => {
                debug!(spin, reel, "ignoring duplicate stop");
                return;
            }
        }
        session.timers[reel].tick.abort();
        session.stopped_count += 1;
        let symbol = self.symbols.final_symbol(reel);
        self.reels[reel] = symbol;
        debug!(spin, reel, %symbol, stopped = session.stopped_count, "reel stopped");

        if session.all_stopped() {
            self.phase = Phase::Settling;
            self.jukebox.stop(Cue::SpinLoop);
            session.settle = Some(spawn_delayed(
                self.events.clone(),
                EngineEvent::Settle { spin },
                self.config.settle_delay(),
            ));
        }
    }

    fn on_settle(&mut self, spin: SpinId) -> Option<Settlement> {
        if self.phase != Phase::Settling || !self.current_session(spin) {
            debug!(spin, "ignoring stale settle");
            return None;
        }
        let session = self.session.take()?;
        let settlement = evaluate(&self.reels, session.wager);
        self.ledger.credit(settlement.payout);
        self.message = settlement.message();
        if let Some(cue) = settlement.outcome.cue() {
            self.jukebox.play(cue);
        }
        self.phase = Phase::Idle;
        info!(
            spin,
            wager = session.wager,
            payout = settlement.payout,
            outcome = ?settlement.outcome,
            balance = %format_money(self.ledger.balance()),
            "spin settled"
        );
        self.last_settlement = Some(settlement.clone());
        Some(settlement)
    }
}

fn spawn_ticker(
    events: mpsc::UnboundedSender<EngineEvent>,
    spin: SpinId,
    reel: usize,
    period: Duration,
) -> AbortHandle {
    tokio::spawn(async move {
        // a period past the clock's range never fires
        let Some(start) = Instant::now().checked_add(period) else {
            return;
        };
        let mut ticker = time::interval_at(start, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            if events.send(EngineEvent::Tick { spin, reel }).is_err() {
                break;
            }
        }
    })
    .abort_handle()
}

fn spawn_delayed(
    events: mpsc::UnboundedSender<EngineEvent>,
    event: EngineEvent,
    delay: Duration,
) -> AbortHandle {
    tokio::spawn(async move {
        time::sleep(delay).await;
        let _ = events.send(event);
    })
    .abort_handle()
}

#[cfg(test)]
#[allow(non_snake_case)]
mod tests {
    use super::*;
    use crate::{
        balance::BALANCE_KEY,
        storage::InMemoryStore,
    };
    use Symbol::*;

    struct FixedSymbols {
        finals: Vec<Symbol>,
    }

    impl SymbolSource for FixedSymbols {
        fn tick_symbol(&mut self) -> Symbol {
            Star
        }

        fn final_symbol(&mut self, reel: usize) -> Symbol {
            self.finals[reel]
        }

        fn stop_jitter(&mut self, _max_ms: u64) -> u64 {
            0
        }
    }

    fn engine(
        balance: &str,
        finals: Vec<Symbol>,
    ) -> (
        SpinEngine<InMemoryStore, FixedSymbols>,
        mpsc::UnboundedReceiver<EngineEvent>,
    ) {
        let config = GameConfig::default();
        let ledger = Ledger::load(
            InMemoryStore::new_with(BALANCE_KEY, balance),
            BALANCE_KEY,
            config.default_balance,
        );
        SpinEngine::new(config, ledger, FixedSymbols { finals }, Jukebox::silent())
    }

    #[test]
    fn new__reels_show_tick_symbols_and_engine_is_idle() {
        let (engine, _events) = engine("100", vec![Kart, Kart, Kart]);

        assert_eq!(engine.reels(), &[Star, Star, Star]);
        assert_eq!(engine.phase(), Phase::Idle);
        assert!(engine.can_spin());
        assert_eq!(engine.stopped_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn handle__manual_events__settles_once_after_every_reel() {
        // given
        let (mut engine, _events) = engine("100", vec![Kart, Kart, Mushroom]);
        let spin = engine.start_spin(10.0).unwrap();

        // when
        assert!(engine.handle(EngineEvent::Stop { spin, reel: 0 }).is_none());
        assert!(engine.handle(EngineEvent::Stop { spin, reel: 0 }).is_none());
        assert!(engine.handle(EngineEvent::Settle { spin }).is_none());
        assert!(engine.handle(EngineEvent::Stop { spin, reel: 1 }).is_none());
        assert_eq!(engine.phase(), Phase::Spinning);
        assert!(engine.handle(EngineEvent::Stop { spin, reel: 2 }).is_none());
        assert_eq!(engine.phase(), Phase::Settling);
        let settled = engine.handle(EngineEvent::Settle { spin });
        let again = engine.handle(EngineEvent::Settle { spin });

        // then
        let settlement = settled.unwrap();
        assert_eq!(settlement.payout, 20.0);
        assert!(again.is_none());
        assert_eq!(engine.balance(), 110.0);
        assert_eq!(engine.phase(), Phase::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn handle__tick_after_stop__does_not_change_reel() {
        let (mut engine, _events) = engine("100", vec![Kart, Banana, Shell]);
        let spin = engine.start_spin(1.0).unwrap();

        engine.handle(EngineEvent::Stop { spin, reel: 1 });
        engine.handle(EngineEvent::Tick { spin, reel: 1 });

        assert_eq!(engine.reels()[1], Banana);
        assert!(engine.reel_stopped(1));
        assert!(!engine.reel_stopped(0));
    }

    #[tokio::test(start_paused = true)]
    async fn handle__out_of_range_reel__is_ignored() {
        let (mut engine, _events) = engine("100", vec![Kart, Banana, Shell]);
        let spin = engine.start_spin(1.0).unwrap();

        engine.handle(EngineEvent::Stop { spin, reel: 7 });
        engine.handle(EngineEvent::Tick { spin, reel: 7 });

        assert_eq!(engine.stopped_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn start_spin__while_spinning__is_busy() {
        let (mut engine, _events) = engine("100", vec![Kart, Kart, Kart]);
        engine.start_spin(10.0).unwrap();

        let second = engine.start_spin(10.0);

        assert_eq!(second, Err(SpinRejection::Busy));
        assert_eq!(engine.balance(), 90.0);
        assert!(!engine.can_spin());
    }

    #[tokio::test(start_paused = true)]
    async fn start_spin__saturated_timings__does_not_panic() {
        // given a config that skipped validation
        let config = GameConfig {
            stop_stagger_ms: u64::MAX / 2,
            tick_stagger_ms: u64::MAX,
            ..GameConfig::default()
        };
        let ledger = Ledger::load(
            InMemoryStore::new_with(BALANCE_KEY, "100"),
            BALANCE_KEY,
            config.default_balance,
        );
        let (mut engine, mut events) = SpinEngine::new(
            config,
            ledger,
            FixedSymbols {
                finals: vec![Kart, Kart, Kart],
            },
            Jukebox::silent(),
        );

        // when
        let spin = engine.start_spin(10.0).unwrap();
        let first = events.recv().await.unwrap();

        // then
        assert_eq!(engine.balance(), 90.0);
        assert!(matches!(first, EngineEvent::Tick { spin: s, reel: 0 } if s == spin));
        assert_eq!(engine.phase(), Phase::Spinning);
    }

    #[test]
    fn max_wager__floors_balance() {
        let (engine, _events) = engine("12.75", vec![Kart, Kart, Kart]);

        assert_eq!(engine.max_wager(), 12.0);
    }
}
