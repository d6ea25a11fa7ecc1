//! Menstrual-cycle phase calculation.
//!
//! The engine only consumes [`CyclePhaseOracle`]; [`StandardCycleCalculator`]
//! is the default model used when no external calculator is wired in.

use chrono::NaiveDate;

use crate::models::{CyclePhase, PhaseMap};

const MIN_CYCLE_LENGTH: i32 = 21;
const MAX_CYCLE_LENGTH: i32 = 45;
const MENSTRUATION_DAYS: i32 = 5;
const LUTEAL_PHASE_DAYS: i32 = 14;

pub trait CyclePhaseOracle: Send + Sync {
    fn phase_on_date(&self, period_start: NaiveDate, cycle_length: i32, date: NaiveDate) -> CyclePhase;

    /// Phase for every date in `start..=end`
    fn predict_phases_for_range(
        &self,
        period_start: NaiveDate,
        cycle_length: i32,
        start: NaiveDate,
        end: NaiveDate,
    ) -> PhaseMap {
        start
            .iter_days()
            .take_while(|date| *date <= end)
            .map(|date| (date, self.phase_on_date(period_start, cycle_length, date)))
            .collect()
    }
}

/// Calendar model: fixed 14-day luteal phase counted back from the next period
#[derive(Debug, Default, Clone, Copy)]
pub struct StandardCycleCalculator;

impl StandardCycleCalculator {
    /// 1-based day within the cycle containing `date`; dates before the
    /// reference start are projected backwards.
    pub fn day_of_cycle(period_start: NaiveDate, cycle_length: i32, date: NaiveDate) -> i32 {
        let length = cycle_length.clamp(MIN_CYCLE_LENGTH, MAX_CYCLE_LENGTH) as i64;
        let offset = (date - period_start).num_days();
        (offset.rem_euclid(length) + 1) as i32
    }
}

impl CyclePhaseOracle for StandardCycleCalculator {
    fn phase_on_date(&self, period_start: NaiveDate, cycle_length: i32, date: NaiveDate) -> CyclePhase {
        let length = cycle_length.clamp(MIN_CYCLE_LENGTH, MAX_CYCLE_LENGTH);
        let day = Self::day_of_cycle(period_start, length, date);
        let ovulation_day = length - LUTEAL_PHASE_DAYS;

        if day <= MENSTRUATION_DAYS {
            CyclePhase::Menstrual
        } else if day < ovulation_day - 1 {
            CyclePhase::Follicular
        } else if day <= ovulation_day + 1 {
            CyclePhase::Ovulation
        } else {
            CyclePhase::Luteal
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, day).unwrap()
    }

    #[test]
    fn test_phases_across_a_28_day_cycle() {
        let calc = StandardCycleCalculator;
        let start = date(1);

        assert_eq!(calc.phase_on_date(start, 28, date(1)), CyclePhase::Menstrual);
        assert_eq!(calc.phase_on_date(start, 28, date(5)), CyclePhase::Menstrual);
        assert_eq!(calc.phase_on_date(start, 28, date(6)), CyclePhase::Follicular);
        assert_eq!(calc.phase_on_date(start, 28, date(12)), CyclePhase::Follicular);
        // Ovulation day 14, window 13..=15
        assert_eq!(calc.phase_on_date(start, 28, date(13)), CyclePhase::Ovulation);
        assert_eq!(calc.phase_on_date(start, 28, date(15)), CyclePhase::Ovulation);
        assert_eq!(calc.phase_on_date(start, 28, date(16)), CyclePhase::Luteal);
        assert_eq!(calc.phase_on_date(start, 28, date(28)), CyclePhase::Luteal);
        // Next cycle
        assert_eq!(calc.phase_on_date(start, 28, date(29)), CyclePhase::Menstrual);
    }

    #[test]
    fn test_dates_before_reference_start_wrap_backwards() {
        let start = date(29);
        assert_eq!(StandardCycleCalculator::day_of_cycle(start, 28, date(28)), 28);
        assert_eq!(StandardCycleCalculator::day_of_cycle(start, 28, date(1)), 1);
    }

    #[test]
    fn test_out_of_range_cycle_length_is_clamped() {
        let start = date(1);
        assert_eq!(StandardCycleCalculator::day_of_cycle(start, 5, date(22)), 1);
        assert_eq!(StandardCycleCalculator::day_of_cycle(start, 0, date(22)), 1);
    }

    #[test]
    fn test_range_prediction_is_inclusive() {
        let map = StandardCycleCalculator.predict_phases_for_range(date(1), 28, date(3), date(9));
        assert_eq!(map.len(), 7);
        assert_eq!(map.get(&date(3)), Some(&CyclePhase::Menstrual));
        assert_eq!(map.get(&date(9)), Some(&CyclePhase::Follicular));
    }

    #[test]
    fn test_empty_range_when_end_precedes_start() {
        let map = StandardCycleCalculator.predict_phases_for_range(date(1), 28, date(9), date(3));
        assert!(map.is_empty());
    }
}
