use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Menstrual-cycle phase attached to a calendar date
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "cycle_phase", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CyclePhase {
    Menstrual,
    Follicular,
    Ovulation,
    Luteal,
}

/// Calendar date to phase over a bounded window
pub type PhaseMap = BTreeMap<NaiveDate, CyclePhase>;

impl CyclePhase {
    /// Coaching note written onto sessions that fall in this phase
    pub fn guidance(&self) -> &'static str {
        match self {
            CyclePhase::Menstrual => {
                "Energy may be lower. Favour easy running and extra recovery; cut intensity if cramps or fatigue flare."
            }
            CyclePhase::Follicular => {
                "Rising energy and good recovery. A strong window for quality sessions and building volume."
            }
            CyclePhase::Ovulation => {
                "Peak strength is likely. Warm up thoroughly, as ligament laxity can be higher around ovulation."
            }
            CyclePhase::Luteal => {
                "Core temperature and perceived effort run higher. Hydrate well and keep hard efforts controlled."
            }
        }
    }
}

impl std::fmt::Display for CyclePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Menstrual => write!(f, "menstrual"),
            Self::Follicular => write!(f, "follicular"),
            Self::Ovulation => write!(f, "ovulation"),
            Self::Luteal => write!(f, "luteal"),
        }
    }
}
