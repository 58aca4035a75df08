use crate::candle::{Candle, CandleBuilder};
use crate::indicator::IndicatorEngine;
use crate::ltp::LtpStore;
use crate::tick::Tick;

/// What changed in the market-data state as a result of one tick, handed to the
/// strategy graph / diagnostics recorder by the scheduler (§4.7 step 2a).
#[derive(Debug, Clone, Default)]
pub struct PipelineUpdate {
    pub completed_candles: Vec<Candle>,
}

/// Wires the LTP store, Candle Builder (C2), and Indicator Engine (C3) together:
/// on every tick, updates LTP, feeds the candle builder, and for every candle
/// that completes as a result, recomputes indicators over it (§4.2 step 2,
/// §4.3). This is the single entry point the Tick Processor (C7) calls per tick.
#[derive(Debug, Clone, Default)]
pub struct MarketDataPipeline {
    pub ltp: LtpStore,
    pub candles: CandleBuilder,
    pub indicators: IndicatorEngine,
}

impl MarketDataPipeline {
    pub fn new(candles: CandleBuilder, indicators: IndicatorEngine) -> Self {
        Self {
            ltp: LtpStore::new(),
            candles,
            indicators,
        }
    }

    /// Feed one tick through LTP, candle aggregation, and indicator
    /// recomputation, in that order (§4.7 step 2a). Indicators are computed
    /// into each candle before it is recorded into history, so that later
    /// reads of history (`completed_offset`, `EvalContext::indicator`) see
    /// the same enriched instance returned here — not an empty clone taken
    /// before indicators were written.
    pub fn on_tick(&mut self, tick: &Tick) -> PipelineUpdate {
        self.ltp.update(tick);
        let mut completed = self.candles.on_tick(tick);

        for candle in &mut completed {
            // The builder already appended this candle to its own history, so
            // the closes prior to it are everything but the last entry.
            let history = self.candles.recent_closes(&candle.symbol, candle.timeframe_minutes, usize::MAX);
            let prior_len = history.len().saturating_sub(1);
            self.indicators.on_candle_complete(candle, &history[..prior_len]);
            self.candles
                .set_completed_indicators(&candle.symbol, candle.timeframe_minutes, candle.indicators.clone());
        }

        PipelineUpdate {
            completed_candles: completed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicator::{IndicatorKind, IndicatorSpec};
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;
    use smol_str::SmolStr;

    #[test]
    fn completed_candle_carries_indicator_value() {
        let mut candles = CandleBuilder::new(50);
        candles.register("NIFTY", 1);
        let mut indicators = IndicatorEngine::new();
        indicators.register(IndicatorSpec {
            symbol: SmolStr::new("NIFTY"),
            timeframe_minutes: 1,
            key: "sma2".into(),
            kind: IndicatorKind::Sma,
            period: 2,
        });
        let mut pipeline = MarketDataPipeline::new(candles, indicators);

        let base = Utc.with_ymd_and_hms(2026, 7, 28, 9, 15, 0).unwrap();
        pipeline.on_tick(&Tick::new(base, "NIFTY", dec!(100), dec!(1)));
        pipeline.on_tick(&Tick::new(base + chrono::Duration::minutes(1), "NIFTY", dec!(200), dec!(1)));
        let update = pipeline.on_tick(&Tick::new(
            base + chrono::Duration::minutes(2),
            "NIFTY",
            dec!(300),
            dec!(1),
        ));

        assert_eq!(update.completed_candles.len(), 1);
        assert_eq!(update.completed_candles[0].close, dec!(200));
        assert_eq!(
            update.completed_candles[0].indicators.get("sma2").copied().flatten(),
            Some(150.0)
        );
        assert_eq!(pipeline.ltp.ltp("NIFTY"), Some(dec!(300)));

        // The same value must also be visible through history, not only on
        // the instance `on_tick` handed back.
        let archived = pipeline.candles.completed_offset("NIFTY", 1, 0).unwrap();
        assert_eq!(archived.indicators.get("sma2").copied().flatten(), Some(150.0));
    }
}
