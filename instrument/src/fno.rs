use crate::error::FnoError;
use crate::symbol::{
    DynamicSymbol, ExpiryKind, InstrumentKind, OptionType, ResolvedContract, StrikeSelector,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use std::collections::HashMap;

/// External collaborator providing expiry dates and strike granularity for a base
/// symbol. Implementations are expected to be cheap to clone (read-only, shared
/// across sessions per §5's shared-resource policy) and to cache internally.
pub trait ExpiryCalendar {
    /// The Nth upcoming expiry (zero-indexed) of the given cadence for `base`,
    /// as observed on `reference_date`.
    fn nth_expiry(
        &self,
        base: &str,
        kind: ExpiryKind,
        index: u32,
        reference_date: NaiveDate,
    ) -> Option<NaiveDate>;

    /// The strike price increment for `base` (e.g. 50 for NIFTY, 100 for
    /// BANKNIFTY), in the same unit as spot.
    fn strike_step(&self, base: &str) -> Option<Decimal>;
}

/// Resolves dynamic F&O symbols (`BASE:<EXP>[:<STRIKE>][:<CE|PE>]`) to concrete
/// contracts (§4.6). Caches per `(dynamic_symbol, reference_date)` since the
/// resolution is pure given a fixed spot-at-resolution-time and is invoked once
/// per trading day by `StartNode`.
#[derive(Debug, Default)]
pub struct FnoResolver {
    cache: HashMap<(String, NaiveDate), ResolvedContract>,
}

impl FnoResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve `dynamic` against `reference_date`, using `spot` to compute the
    /// strike for option legs. `spot` is ignored for futures/equity.
    pub fn resolve(
        &mut self,
        dynamic: &str,
        reference_date: NaiveDate,
        spot: Option<Decimal>,
        calendar: &(impl ExpiryCalendar + ?Sized),
    ) -> Result<ResolvedContract, FnoError> {
        let cache_key = (dynamic.to_string(), reference_date);
        if let Some(hit) = self.cache.get(&cache_key) {
            return Ok(hit.clone());
        }

        let parsed: DynamicSymbol = dynamic.parse()?;
        let expiry_date = calendar
            .nth_expiry(&parsed.base, parsed.expiry.kind, parsed.expiry.index, reference_date)
            .ok_or(FnoError::NoExpiry {
                base: parsed.base.to_string(),
                kind: parsed.expiry.kind,
                index: parsed.expiry.index,
            })?;

        let resolved = if parsed.is_future() {
            ResolvedContract {
                base: parsed.base.clone(),
                expiry_date,
                kind: InstrumentKind::Future,
                strike: None,
            }
        } else {
            let option_type = parsed
                .option_type
                .ok_or_else(|| FnoError::InvalidFormat(dynamic.to_string()))?;
            let selector = parsed
                .strike
                .ok_or_else(|| FnoError::InvalidFormat(dynamic.to_string()))?;
            let strike = resolve_strike(&parsed.base, selector, option_type, spot, calendar)?;
            ResolvedContract {
                base: parsed.base.clone(),
                expiry_date,
                kind: InstrumentKind::Option { option_type },
                strike: Some(strike),
            }
        };

        self.cache.insert(cache_key, resolved.clone());
        Ok(resolved)
    }
}

/// ATM strike = spot rounded to the nearest strike step. OTM/ITM offset N steps
/// in the direction appropriate to the option type: a call goes OTM as strike
/// rises above spot, a put goes OTM as strike falls below spot.
fn resolve_strike(
    base: &str,
    selector: StrikeSelector,
    option_type: OptionType,
    spot: Option<Decimal>,
    calendar: &(impl ExpiryCalendar + ?Sized),
) -> Result<i64, FnoError> {
    let spot = spot.ok_or_else(|| FnoError::NoSpot(base.to_string()))?;
    let step = calendar
        .strike_step(base)
        .ok_or_else(|| FnoError::NoStrikeStep(base.to_string()))?;

    let steps_from_spot = (spot / step).round();
    let atm = steps_from_spot * step;

    let offset = match selector {
        StrikeSelector::Atm => 0i64,
        StrikeSelector::Otm(n) => match option_type {
            OptionType::Ce => n as i64,
            OptionType::Pe => -(n as i64),
        },
        StrikeSelector::Itm(n) => match option_type {
            OptionType::Ce => -(n as i64),
            OptionType::Pe => n as i64,
        },
    };

    let strike = atm + Decimal::from(offset) * step;
    strike
        .to_i64()
        .ok_or_else(|| FnoError::InvalidFormat(format!("strike overflow for {base}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    struct FixedCalendar;

    impl ExpiryCalendar for FixedCalendar {
        fn nth_expiry(
            &self,
            _base: &str,
            _kind: ExpiryKind,
            index: u32,
            reference_date: NaiveDate,
        ) -> Option<NaiveDate> {
            reference_date.checked_add_signed(chrono::Duration::days(7 * (index as i64 + 1)))
        }

        fn strike_step(&self, base: &str) -> Option<Decimal> {
            match base {
                "NIFTY" => Some(dec!(50)),
                "BANKNIFTY" => Some(dec!(100)),
                _ => None,
            }
        }
    }

    #[test]
    fn resolves_atm_call() {
        let mut resolver = FnoResolver::new();
        let reference = NaiveDate::from_ymd_opt(2026, 7, 28).unwrap();
        let resolved = resolver
            .resolve("NIFTY:W0:ATM:CE", reference, Some(dec!(24513)), &FixedCalendar)
            .unwrap();
        assert_eq!(resolved.strike, Some(24500));
        assert!(matches!(resolved.kind, InstrumentKind::Option { option_type: OptionType::Ce }));
    }

    #[test]
    fn otm_call_goes_above_spot() {
        let mut resolver = FnoResolver::new();
        let reference = NaiveDate::from_ymd_opt(2026, 7, 28).unwrap();
        let resolved = resolver
            .resolve("NIFTY:W0:OTM2:CE", reference, Some(dec!(24513)), &FixedCalendar)
            .unwrap();
        assert_eq!(resolved.strike, Some(24600));
    }

    #[test]
    fn otm_put_goes_below_spot() {
        let mut resolver = FnoResolver::new();
        let reference = NaiveDate::from_ymd_opt(2026, 7, 28).unwrap();
        let resolved = resolver
            .resolve("NIFTY:W0:OTM2:PE", reference, Some(dec!(24513)), &FixedCalendar)
            .unwrap();
        assert_eq!(resolved.strike, Some(24400));
    }

    #[test]
    fn future_ignores_spot() {
        let mut resolver = FnoResolver::new();
        let reference = NaiveDate::from_ymd_opt(2026, 7, 28).unwrap();
        let resolved = resolver.resolve("NIFTY:M0", reference, None, &FixedCalendar).unwrap();
        assert!(matches!(resolved.kind, InstrumentKind::Future));
    }

    #[test]
    fn caches_by_symbol_and_reference_date() {
        let mut resolver = FnoResolver::new();
        let reference = NaiveDate::from_ymd_opt(2026, 7, 28).unwrap();
        let first = resolver
            .resolve("NIFTY:W0:ATM:CE", reference, Some(dec!(24513)), &FixedCalendar)
            .unwrap();
        // Even with a different spot, the cached resolution is returned.
        let second = resolver
            .resolve("NIFTY:W0:ATM:CE", reference, Some(dec!(99999)), &FixedCalendar)
            .unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn missing_spot_is_an_error() {
        let mut resolver = FnoResolver::new();
        let reference = NaiveDate::from_ymd_opt(2026, 7, 28).unwrap();
        let err = resolver.resolve("NIFTY:W0:ATM:CE", reference, None, &FixedCalendar).unwrap_err();
        assert!(matches!(err, FnoError::NoSpot(_)));
    }
}
