//! Candle and threshold predicates shared by the detector families

use crate::{OHLCV, OHLCVExt};

/// Today's white body engulfs yesterday's black body.
///
/// `close > open`, `prev_close < prev_open`, `close >= prev_open`,
/// `open <= prev_close`.
#[inline]
pub fn is_bullish_engulfing<T: OHLCV>(prev: &T, curr: &T) -> bool {
    curr.is_bullish()
        && prev.is_bearish()
        && curr.close() >= prev.open()
        && curr.open() <= prev.close()
}

/// Mirror of [`is_bullish_engulfing`]
#[inline]
pub fn is_bearish_engulfing<T: OHLCV>(prev: &T, curr: &T) -> bool {
    curr.is_bearish()
        && prev.is_bullish()
        && curr.close() <= prev.open()
        && curr.open() >= prev.close()
}

/// `prev` below `level`, `curr` at or above it
#[inline]
pub fn crossed_up(prev: f64, curr: f64, level: f64) -> bool {
    prev < level && curr >= level
}

/// `prev` above `level`, `curr` at or below it
#[inline]
pub fn crossed_down(prev: f64, curr: f64, level: f64) -> bool {
    prev > level && curr <= level
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Bar(f64, f64);

    impl OHLCV for Bar {
        fn open(&self) -> f64 {
            self.0
        }

        fn high(&self) -> f64 {
            self.0.max(self.1)
        }

        fn low(&self) -> f64 {
            self.0.min(self.1)
        }

        fn close(&self) -> f64 {
            self.1
        }
    }

    #[test]
    fn test_bullish_engulfing() {
        assert!(is_bullish_engulfing(&Bar(10.0, 9.0), &Bar(8.5, 10.5)));
        // touching both ends still counts
        assert!(is_bullish_engulfing(&Bar(10.0, 9.0), &Bar(9.0, 10.0)));
        // body does not reach the prior open
        assert!(!is_bullish_engulfing(&Bar(10.0, 9.0), &Bar(8.5, 9.8)));
        // prior bar is white
        assert!(!is_bullish_engulfing(&Bar(9.0, 10.0), &Bar(8.5, 10.5)));
    }

    #[test]
    fn test_bearish_engulfing() {
        assert!(is_bearish_engulfing(&Bar(9.0, 10.0), &Bar(10.5, 8.5)));
        assert!(!is_bearish_engulfing(&Bar(9.0, 10.0), &Bar(9.8, 8.5)));
        assert!(!is_bearish_engulfing(&Bar(10.0, 9.0), &Bar(10.5, 8.5)));
    }

    #[test]
    fn test_doji_never_engulfs() {
        assert!(!is_bullish_engulfing(&Bar(10.0, 9.0), &Bar(9.5, 9.5)));
        assert!(!is_bearish_engulfing(&Bar(9.0, 10.0), &Bar(9.5, 9.5)));
    }

    #[test]
    fn test_crossings() {
        assert!(crossed_up(28.0, 30.0, 30.0));
        assert!(!crossed_up(30.0, 35.0, 30.0));
        assert!(crossed_down(72.0, 70.0, 70.0));
        assert!(!crossed_down(70.0, 65.0, 70.0));
    }
}
