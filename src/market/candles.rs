//! Candle sanitization.

use crate::market::models::Candle;

/// Largest accepted close-to-close move relative to the previous kept close.
const MAX_CLOSE_JUMP: f64 = 0.5;

/// Drop bars that are empty, negative or implausible, then sort by time.
///
/// A bar is dropped when its volume is zero, any OHLC field is negative, or its
/// close moved more than 50% from the previous kept close.
pub fn sanitize_candles(candles: Vec<Candle>) -> Vec<Candle> {
    let mut cleaned = Vec::new();
    let mut prev_close: Option<f64> = None;

    for candle in candles {
        if candle.volume == 0 {
            continue;
        }
        if [candle.open, candle.high, candle.low, candle.close]
            .iter()
            .any(|v| *v < 0.0 || !v.is_finite())
        {
            continue;
        }
        if let Some(prev) = prev_close.filter(|p| *p > 0.0) {
            if ((candle.close - prev) / prev).abs() > MAX_CLOSE_JUMP {
                continue;
            }
        }
        prev_close = Some(candle.close);
        cleaned.push(candle);
    }

    cleaned.sort_by_key(|c| c.timestamp);
    cleaned
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn bar(minute: u32, close: f64, volume: u64) -> Candle {
        Candle {
            timestamp: Utc.with_ymd_and_hms(2024, 3, 4, 10, minute, 0).unwrap(),
            open: close,
            high: close,
            low: close,
            close,
            volume,
        }
    }

    #[test]
    fn test_drops_bad_rows() {
        let mut negative = bar(3, 101.0, 10);
        negative.low = -1.0;

        let cleaned = sanitize_candles(vec![
            bar(0, 100.0, 10),
            bar(1, 100.5, 0),
            bar(2, 180.0, 10),
            negative,
            bar(4, 102.0, 10),
        ]);
        let closes: Vec<f64> = cleaned.iter().map(|c| c.close).collect();
        assert_eq!(closes, vec![100.0, 102.0]);
    }

    #[test]
    fn test_sorted_by_timestamp() {
        let cleaned = sanitize_candles(vec![bar(5, 100.0, 1), bar(1, 101.0, 1), bar(3, 99.0, 1)]);
        let minutes: Vec<i64> = cleaned.iter().map(|c| c.timestamp.timestamp() / 60 % 60).collect();
        assert_eq!(minutes, vec![1, 3, 5]);
    }

    #[test]
    fn test_empty_input() {
        assert!(sanitize_candles(Vec::new()).is_empty());
    }
}
