//! Supported exchanges and provider ticker mapping.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::market::ValidationError;

/// An exchange the gateway serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Exchange {
    Nse,
    Bse,
    Nasdaq,
}

impl Exchange {
    pub const ALL: [Exchange; 3] = [Exchange::Nse, Exchange::Bse, Exchange::Nasdaq];

    pub fn as_str(&self) -> &'static str {
        match self {
            Exchange::Nse => "NSE",
            Exchange::Bse => "BSE",
            Exchange::Nasdaq => "NASDAQ",
        }
    }

    /// Ticker suffix used by Yahoo Finance.
    pub fn suffix(&self) -> &'static str {
        match self {
            Exchange::Nse => ".NS",
            Exchange::Bse => ".BO",
            Exchange::Nasdaq => "",
        }
    }

    /// Provider ticker for a normalized symbol, e.g. `TCS` on NSE → `TCS.NS`.
    pub fn provider_symbol(&self, symbol: &str) -> String {
        format!("{}{}", symbol.to_uppercase(), self.suffix())
    }

    /// Split a provider ticker into symbol and exchange. Unknown suffixes map
    /// to NASDAQ.
    pub fn from_provider_symbol(provider_symbol: &str) -> (String, Exchange) {
        let upper = provider_symbol.to_uppercase();
        for exchange in [Exchange::Nse, Exchange::Bse] {
            if let Some(symbol) = upper.strip_suffix(exchange.suffix()) {
                return (symbol.to_string(), exchange);
            }
        }
        (upper, Exchange::Nasdaq)
    }
}

impl fmt::Display for Exchange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Exchange {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "NSE" => Ok(Exchange::Nse),
            "BSE" => Ok(Exchange::Bse),
            "NASDAQ" => Ok(Exchange::Nasdaq),
            _ => Err(ValidationError::Exchange(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_case_insensitive() {
        assert_eq!(" nse ".parse::<Exchange>().unwrap(), Exchange::Nse);
        assert_eq!("Nasdaq".parse::<Exchange>().unwrap(), Exchange::Nasdaq);
        assert!("LSE".parse::<Exchange>().is_err());
    }

    #[test]
    fn test_provider_symbol_mapping() {
        assert_eq!(Exchange::Nse.provider_symbol("tcs"), "TCS.NS");
        assert_eq!(Exchange::Bse.provider_symbol("RELIANCE"), "RELIANCE.BO");
        assert_eq!(Exchange::Nasdaq.provider_symbol("aapl"), "AAPL");
    }

    #[test]
    fn test_from_provider_symbol() {
        assert_eq!(
            Exchange::from_provider_symbol("infy.ns"),
            ("INFY".to_string(), Exchange::Nse)
        );
        assert_eq!(
            Exchange::from_provider_symbol("SBIN.BO"),
            ("SBIN".to_string(), Exchange::Bse)
        );
        assert_eq!(
            Exchange::from_provider_symbol("MSFT"),
            ("MSFT".to_string(), Exchange::Nasdaq)
        );
    }

    #[test]
    fn test_serializes_uppercase() {
        assert_eq!(serde_json::to_string(&Exchange::Nasdaq).unwrap(), "\"NASDAQ\"");
    }
}
