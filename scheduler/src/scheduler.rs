use crate::bucket::bucket_of;
use crate::error::SchedulerError;
use chrono::{DateTime, Utc};
use kite_execution::{OrderGateway, OrderGatewayError};
use kite_graph::{ExecutionEvent, SessionMode, StrategyGraph, TraversalContext};
use kite_instrument::ExpiryCalendar;
use kite_market_data::{MarketDataPipeline, Tick, TickSource};
use kite_positions::PositionStore;
use rust_decimal::Decimal;
use std::time::{Duration, Instant};

/// Everything produced by running the strategy graph once over a completed
/// second-bucket (§4.7 step 2).
#[derive(Debug, Clone)]
pub struct BucketResult {
    pub tick_time: DateTime<Utc>,
    pub events: Vec<ExecutionEvent>,
    pub completed_candles: usize,
    pub ticks_in_bucket: u64,
}

/// `{current_tick, total_ticks, percentage}` fed into the session's snapshot
/// (§4.8). `total_ticks`/`percentage` are only known when the caller supplies
/// a count up front (backtests over a `VecTickSource`); absent for live feeds.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct Progress {
    pub current_tick: u64,
    pub total_ticks: Option<u64>,
    pub percentage: Option<f64>,
}

/// The Tick Processor / Session Scheduler (C7, §4.7): owns the market-data
/// pipeline and GPS for one session, batches ticks into one-second buckets,
/// and drives one [`StrategyGraph::run_tick`] per bucket. `graph`, `gateway`,
/// and `calendar` are read-only collaborators shared per §5's resource policy;
/// `pipeline` and `positions` are exclusively owned by this scheduler.
pub struct TickScheduler<'a> {
    graph: &'a StrategyGraph,
    gateway: &'a (dyn OrderGateway<Error = OrderGatewayError> + Send + Sync),
    calendar: &'a dyn ExpiryCalendar,
    mode: SessionMode,
    strategy_scale: Decimal,
    pipeline: MarketDataPipeline,
    positions: PositionStore,
    ticks_processed: u64,
    total_ticks: Option<u64>,
}

impl<'a> TickScheduler<'a> {
    pub fn new(
        graph: &'a StrategyGraph,
        gateway: &'a (dyn OrderGateway<Error = OrderGatewayError> + Send + Sync),
        calendar: &'a dyn ExpiryCalendar,
        mode: SessionMode,
        strategy_scale: Decimal,
    ) -> Self {
        let mut pipeline = MarketDataPipeline::default();
        graph.register_market_data(&mut pipeline);
        Self {
            graph,
            gateway,
            calendar,
            mode,
            strategy_scale,
            pipeline,
            positions: PositionStore::new(),
            ticks_processed: 0,
            total_ticks: None,
        }
    }

    /// Enables `Progress::percentage` by supplying the known tick count up
    /// front (e.g. the length of a pre-loaded backtest `VecTickSource`).
    pub fn with_total_ticks(mut self, total: u64) -> Self {
        self.total_ticks = Some(total);
        self
    }

    pub fn positions(&self) -> &PositionStore {
        &self.positions
    }

    pub fn positions_mut(&mut self) -> &mut PositionStore {
        &mut self.positions
    }

    pub fn pipeline(&self) -> &MarketDataPipeline {
        &self.pipeline
    }

    pub fn progress(&self) -> Progress {
        Progress {
            current_tick: self.ticks_processed,
            total_ticks: self.total_ticks,
            percentage: self.total_ticks.map(|total| {
                if total == 0 {
                    100.0
                } else {
                    (self.ticks_processed as f64 / total as f64) * 100.0
                }
            }),
        }
    }

    /// Drives `source` to exhaustion, invoking `on_bucket` once per completed
    /// second-bucket with that bucket's execution events (§4.7 steps 1-2).
    /// Paces itself between buckets in live-simulation mode (§4.7 step 3);
    /// runs unthrottled in backtest mode.
    pub async fn run<T, F>(&mut self, source: &mut T, on_bucket: F) -> Result<(), SchedulerError>
    where
        T: TickSource,
        T::Error: std::fmt::Display,
        F: FnMut(BucketResult, &PositionStore),
    {
        self.run_cancellable(source, on_bucket, || false).await
    }

    /// As [`Self::run`], but `should_stop` is polled after every completed
    /// bucket; returning `true` ends the run early, leaving `source` wherever
    /// it was (§5 "Cancellation": a cancelled session stops between buckets,
    /// never mid-bucket).
    ///
    /// `on_bucket` also receives the scheduler's [`PositionStore`] as of that
    /// bucket (prices already refreshed for the bucket's last tick) so a
    /// caller layering session/event persistence on top (`kite-core`'s
    /// supervisor) can derive trade projections without the scheduler crate
    /// depending on `kite-session` (which itself depends on this crate).
    pub async fn run_cancellable<T, F, C>(&mut self, source: &mut T, mut on_bucket: F, should_stop: C) -> Result<(), SchedulerError>
    where
        T: TickSource,
        T::Error: std::fmt::Display,
        F: FnMut(BucketResult, &PositionStore),
        C: Fn() -> bool,
    {
        let mut current_bucket: Option<DateTime<Utc>> = None;
        let mut last_tick: Option<Tick> = None;
        let mut ticks_in_bucket: u64 = 0;
        let mut completed_in_bucket: usize = 0;
        let mut bucket_started_at = Instant::now();

        loop {
            if should_stop() {
                break;
            }

            let next = source.next_tick().await.map_err(|err| SchedulerError::TickSource(err.to_string()))?;

            let Some(tick) = next else {
                if let Some(tick) = last_tick.take() {
                    let result = self.run_bucket(tick, ticks_in_bucket, completed_in_bucket).await?;
                    on_bucket(result, &self.positions);
                }
                break;
            };

            let bucket = bucket_of(tick.timestamp);
            if let Some(current) = current_bucket {
                if bucket != current {
                    let finished = last_tick.take().expect("a tracked bucket always has at least one tick");
                    let result = self.run_bucket(finished, ticks_in_bucket, completed_in_bucket).await?;
                    on_bucket(result, &self.positions);
                    self.pace(bucket_started_at);
                    ticks_in_bucket = 0;
                    completed_in_bucket = 0;
                    bucket_started_at = Instant::now();
                }
            }

            current_bucket = Some(bucket);
            let update = self.pipeline.on_tick(&tick);
            completed_in_bucket += update.completed_candles.len();
            self.positions.update_prices(&self.pipeline.ltp);
            ticks_in_bucket += 1;
            self.ticks_processed += 1;
            last_tick = Some(tick);
        }

        Ok(())
    }

    async fn run_bucket(
        &mut self,
        tick: Tick,
        ticks_in_bucket: u64,
        completed_candles: usize,
    ) -> Result<BucketResult, SchedulerError> {
        let mut ctx = TraversalContext {
            tick_time: tick.timestamp,
            ltp: &self.pipeline.ltp,
            candles: &self.pipeline.candles,
            positions: &mut self.positions,
            gateway: self.gateway,
            calendar: self.calendar,
            mode: self.mode,
            strategy_scale: self.strategy_scale,
        };
        let events = self.graph.run_tick(&mut ctx).await?;
        Ok(BucketResult {
            tick_time: tick.timestamp,
            events,
            completed_candles,
            ticks_in_bucket,
        })
    }

    /// In live-simulation mode, blocks this session's dedicated worker thread
    /// (§5: a session is pinned to one worker for its lifetime) until
    /// wall-clock time has advanced by `1 / speed_multiplier` seconds since
    /// `bucket_started_at`, using `spin_sleep` for tighter precision than a
    /// coarse timer wheel; backtest mode never sleeps.
    fn pace(&self, bucket_started_at: Instant) {
        let SessionMode::LiveSimulation { speed_multiplier } = self.mode else {
            return;
        };
        let target = Duration::from_secs_f64(1.0 / speed_multiplier.max(0.000_1));
        if let Some(remaining) = target.checked_sub(bucket_started_at.elapsed()) {
            spin_sleep::sleep(remaining);
        }
    }
}
