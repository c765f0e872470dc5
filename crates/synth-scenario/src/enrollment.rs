//! Stage 1: enrollment dates.

use chrono::{Datelike, Days, NaiveDate};
use synth_common::SynthRng;
use synth_common::rng::uniform;
use synth_model::EnrollmentPattern;

/// Rate parameter of the front-loaded pattern, in units of the window length.
const FRONT_LOADED_DECAY: f64 = 3.0;
/// Relative enrollment rate during slow months.
const SLOW_MONTH_RATE: f64 = 0.5;
const SLOW_MONTHS: [u32; 3] = [7, 8, 12];

/// Enrollment dates for `n_subjects`, ascending, within `days` of `start`.
pub fn schedule_enrollment(
    n_subjects: usize,
    pattern: EnrollmentPattern,
    start: NaiveDate,
    days: u32,
    rng: &mut SynthRng,
) -> Vec<NaiveDate> {
    let window = f64::from(days.max(1));
    let mut dates: Vec<NaiveDate> = (0..n_subjects)
        .map(|_| {
            let offset = match pattern {
                EnrollmentPattern::Uniform => uniform(rng) * window,
                EnrollmentPattern::FrontLoaded => front_loaded_offset(window, rng),
                EnrollmentPattern::Seasonal => seasonal_offset(start, window, rng),
            };
            offset_date(start, offset, days)
        })
        .collect();
    dates.sort();
    dates
}

/// Inverse-CDF draw from an exponential truncated to `[0, window)`.
fn front_loaded_offset(window: f64, rng: &mut SynthRng) -> f64 {
    let rate = FRONT_LOADED_DECAY / window;
    let mass = 1.0 - (-rate * window).exp();
    -(1.0 - uniform(rng) * mass).ln() / rate
}

fn seasonal_offset(start: NaiveDate, window: f64, rng: &mut SynthRng) -> f64 {
    loop {
        let offset = uniform(rng) * window;
        let date = offset_date(start, offset, u32::MAX);
        let accept = if SLOW_MONTHS.contains(&date.month()) {
            SLOW_MONTH_RATE
        } else {
            1.0
        };
        if uniform(rng) < accept {
            return offset;
        }
    }
}

fn offset_date(start: NaiveDate, offset: f64, days: u32) -> NaiveDate {
    let whole = (offset.max(0.0).floor() as u64).min(u64::from(days.saturating_sub(1)));
    start.checked_add_days(Days::new(whole)).unwrap_or(start)
}

#[cfg(test)]
mod tests {
    use super::*;
    use synth_common::{Stream, stream_rng};

    fn start() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).expect("valid date")
    }

    #[test]
    fn dates_are_sorted_and_within_window() {
        for pattern in [
            EnrollmentPattern::FrontLoaded,
            EnrollmentPattern::Seasonal,
            EnrollmentPattern::Uniform,
        ] {
            let mut rng = stream_rng(3, Stream::Enrollment);
            let dates = schedule_enrollment(300, pattern, start(), 365, &mut rng);
            assert_eq!(dates.len(), 300);
            assert!(dates.windows(2).all(|pair| pair[0] <= pair[1]));
            let last = start().checked_add_days(Days::new(364)).expect("valid date");
            assert!(dates.iter().all(|date| *date >= start() && *date <= last));
        }
    }

    #[test]
    fn front_loaded_enrolls_most_subjects_early() {
        let mut rng = stream_rng(11, Stream::Enrollment);
        let dates = schedule_enrollment(
            1000,
            EnrollmentPattern::FrontLoaded,
            start(),
            365,
            &mut rng,
        );
        let midpoint = start().checked_add_days(Days::new(182)).expect("valid date");
        let early = dates.iter().filter(|date| **date < midpoint).count();
        assert!(early > 700, "only {early} of 1000 enrolled in the first half");
    }

    #[test]
    fn seasonal_pattern_thins_slow_months() {
        let mut rng = stream_rng(5, Stream::Enrollment);
        let dates = schedule_enrollment(4000, EnrollmentPattern::Seasonal, start(), 365, &mut rng);
        let count = |month: u32| dates.iter().filter(|date| date.month() == month).count();
        assert!(count(7) < count(5));
        assert!(count(12) < count(10));
    }
}
