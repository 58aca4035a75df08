use crate::error::FnoError;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::fmt;
use std::str::FromStr;

/// Position / order side.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// The side an exit order takes to flatten a position opened with `self`.
    pub fn opposite(self) -> Self {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "BUY"),
            Side::Sell => write!(f, "SELL"),
        }
    }
}

/// Exchange a symbol trades on.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Deserialize, Serialize)]
pub enum Exchange {
    /// National Stock Exchange — cash/equity segment.
    Nse,
    /// NSE Futures & Options segment.
    Nfo,
    /// Bombay Stock Exchange.
    Bse,
}

impl fmt::Display for Exchange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Exchange::Nse => write!(f, "NSE"),
            Exchange::Nfo => write!(f, "NFO"),
            Exchange::Bse => write!(f, "BSE"),
        }
    }
}

impl Exchange {
    /// Default exchange inference rule from §4.1: `NFO` when the symbol carries an
    /// `:OPT:` or `:FUT:` segment, `NSE` otherwise.
    pub fn infer_from_symbol(symbol: &str) -> Self {
        if symbol.contains(":OPT:") || symbol.contains(":FUT:") {
            Exchange::Nfo
        } else {
            Exchange::Nse
        }
    }
}

/// Call/Put designation for an options contract.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Deserialize, Serialize)]
pub enum OptionType {
    Ce,
    Pe,
}

impl fmt::Display for OptionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionType::Ce => write!(f, "CE"),
            OptionType::Pe => write!(f, "PE"),
        }
    }
}

impl FromStr for OptionType {
    type Err = FnoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CE" => Ok(OptionType::Ce),
            "PE" => Ok(OptionType::Pe),
            other => Err(FnoError::InvalidFormat(other.to_string())),
        }
    }
}

/// Which expiry cadence an `<EXP>` token refers to.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Deserialize, Serialize)]
pub enum ExpiryKind {
    Weekly,
    Monthly,
    Quarterly,
    Yearly,
}

/// A parsed `<EXP>` token (e.g. `W0`, `M2`, `Q1`, `Y0`): the Nth upcoming expiry of
/// the given cadence, zero-indexed.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Deserialize, Serialize)]
pub struct ExpirySelector {
    pub kind: ExpiryKind,
    pub index: u32,
}

impl FromStr for ExpirySelector {
    type Err = FnoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.chars();
        let letter = chars.next().ok_or_else(|| FnoError::UnknownExpiryToken(s.to_string()))?;
        let rest: String = chars.collect();
        let index: u32 = rest
            .parse()
            .map_err(|_| FnoError::UnknownExpiryToken(s.to_string()))?;
        let kind = match letter {
            'W' => ExpiryKind::Weekly,
            'M' => ExpiryKind::Monthly,
            'Q' => ExpiryKind::Quarterly,
            'Y' => ExpiryKind::Yearly,
            _ => return Err(FnoError::UnknownExpiryToken(s.to_string())),
        };
        Ok(ExpirySelector { kind, index })
    }
}

/// Strike selection relative to spot: at-the-money, or N steps out/in the money.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Deserialize, Serialize)]
pub enum StrikeSelector {
    Atm,
    Otm(u32),
    Itm(u32),
}

impl FromStr for StrikeSelector {
    type Err = FnoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "ATM" {
            return Ok(StrikeSelector::Atm);
        }
        let (prefix, rest) = s.split_at(3.min(s.len()));
        let n: u32 = rest
            .parse()
            .map_err(|_| FnoError::UnknownStrikeSelector(s.to_string()))?;
        match prefix {
            "OTM" => Ok(StrikeSelector::Otm(n)),
            "ITM" => Ok(StrikeSelector::Itm(n)),
            _ => Err(FnoError::UnknownStrikeSelector(s.to_string())),
        }
    }
}

/// What a resolved contract actually is.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Deserialize, Serialize)]
pub enum InstrumentKind {
    Equity,
    Future,
    Option {
        option_type: OptionType,
    },
}

/// A dynamic symbol of the form `BASE:<EXP>[:<STRIKE_SELECTOR>][:<CE|PE>]`, as it
/// appears in strategy JSON `tradingInstrument` / `optionDetails` fields.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct DynamicSymbol {
    pub base: SmolStr,
    pub expiry: ExpirySelector,
    pub strike: Option<StrikeSelector>,
    pub option_type: Option<OptionType>,
}

impl FromStr for DynamicSymbol {
    type Err = FnoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(':').collect();
        if parts.len() < 2 || parts.len() > 4 {
            return Err(FnoError::InvalidFormat(s.to_string()));
        }
        let base = SmolStr::new(parts[0]);
        let expiry: ExpirySelector = parts[1].parse()?;

        let (strike, option_type) = match parts.len() {
            2 => (None, None),
            3 => {
                // Either a strike selector or a bare CE/PE (futures-adjacent shorthand
                // is not supported — a lone third token must be a strike selector).
                (Some(parts[2].parse()?), None)
            }
            4 => (Some(parts[2].parse()?), Some(parts[3].parse()?)),
            _ => unreachable!(),
        };

        Ok(DynamicSymbol {
            base,
            expiry,
            strike,
            option_type,
        })
    }
}

impl DynamicSymbol {
    /// Whether this dynamic symbol names a future (no strike/option-type tokens).
    pub fn is_future(&self) -> bool {
        self.strike.is_none() && self.option_type.is_none()
    }
}

/// A concrete, tradeable contract resolved from a [`DynamicSymbol`] against a
/// reference date and spot price.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Deserialize, Serialize)]
pub struct ResolvedContract {
    pub base: SmolStr,
    pub expiry_date: NaiveDate,
    pub kind: InstrumentKind,
    /// Strike price in the smallest exchange-quoted unit (whole rupees for index
    /// options); `None` for futures/equity.
    pub strike: Option<i64>,
}

impl fmt::Display for ResolvedContract {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            InstrumentKind::Equity => write!(f, "{}", self.base),
            InstrumentKind::Future => write!(f, "{}:{}:FUT", self.base, self.expiry_date),
            InstrumentKind::Option { option_type } => write!(
                f,
                "{}:{}:OPT:{}:{}",
                self.base,
                self.expiry_date,
                self.strike.unwrap_or_default(),
                option_type
            ),
        }
    }
}

impl ResolvedContract {
    /// Exchange inference per §4.1's rule, applied to the canonical string form.
    pub fn exchange(&self) -> Exchange {
        Exchange::infer_from_symbol(&self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_atm_call() {
        let sym: DynamicSymbol = "NIFTY:W0:ATM:CE".parse().unwrap();
        assert_eq!(sym.base.as_str(), "NIFTY");
        assert_eq!(sym.expiry, ExpirySelector { kind: ExpiryKind::Weekly, index: 0 });
        assert_eq!(sym.strike, Some(StrikeSelector::Atm));
        assert_eq!(sym.option_type, Some(OptionType::Ce));
    }

    #[test]
    fn parses_future() {
        let sym: DynamicSymbol = "NIFTY:M1".parse().unwrap();
        assert!(sym.is_future());
        assert_eq!(sym.expiry, ExpirySelector { kind: ExpiryKind::Monthly, index: 1 });
    }

    #[test]
    fn rejects_malformed() {
        assert!("NIFTY".parse::<DynamicSymbol>().is_err());
        assert!("NIFTY:W0:ATM:CE:EXTRA".parse::<DynamicSymbol>().is_err());
    }

    #[test]
    fn exchange_inference() {
        let future = ResolvedContract {
            base: SmolStr::new("NIFTY"),
            expiry_date: NaiveDate::from_ymd_opt(2026, 7, 31).unwrap(),
            kind: InstrumentKind::Future,
            strike: None,
        };
        assert_eq!(future.exchange(), Exchange::Nfo);

        let equity = ResolvedContract {
            base: SmolStr::new("RELIANCE"),
            expiry_date: NaiveDate::from_ymd_opt(2026, 7, 31).unwrap(),
            kind: InstrumentKind::Equity,
            strike: None,
        };
        assert_eq!(equity.exchange(), Exchange::Nse);
    }
}
