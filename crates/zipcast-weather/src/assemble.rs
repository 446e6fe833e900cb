use crate::types::{ForecastPeriod, ForecastResult, RawPeriod};

/// Classify periods in upstream order and apply the optional limit.
///
/// Periods numbered 0 are not real periods and are dropped. A limit of
/// `None` or `Some(0)` keeps everything.
pub fn assemble(periods: Vec<RawPeriod>, limit: Option<usize>) -> ForecastResult {
    let limit = match limit {
        Some(n) if n > 0 => n,
        _ => usize::MAX,
    };

    let periods = periods
        .into_iter()
        .filter(|p| p.number >= 1)
        .take(limit)
        .map(ForecastPeriod::from_raw)
        .collect();

    ForecastResult::new(periods)
}
