//! Score presentation helpers: accuracy, score bands and time pressure.

/// Accuracy percentage of `score` out of `total`, rounded half-up.
///
/// Returns 0 for an empty quiz.
#[must_use]
pub fn accuracy_percent(score: u32, total: usize) -> u32 {
    let Ok(total) = u64::try_from(total) else {
        return 0;
    };
    if total == 0 {
        return 0;
    }
    let scaled = (u64::from(score) * 200 + total) / (total * 2);
    u32::try_from(scaled).unwrap_or(u32::MAX)
}

/// Qualitative tier for a finished attempt, keyed by accuracy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreBand {
    Outstanding,
    Excellent,
    Great,
    Good,
    Fair,
    NeedsPractice,
}

impl ScoreBand {
    #[must_use]
    pub fn from_accuracy(percent: u32) -> Self {
        match percent {
            90.. => Self::Outstanding,
            80..=89 => Self::Excellent,
            70..=79 => Self::Great,
            60..=69 => Self::Good,
            50..=59 => Self::Fair,
            _ => Self::NeedsPractice,
        }
    }

    #[must_use]
    pub fn message(self) -> &'static str {
        match self {
            Self::Outstanding => "Outstanding! You're a master of this subject!",
            Self::Excellent => "Excellent work! You really know your stuff!",
            Self::Great => "Great job! You have a solid understanding!",
            Self::Good => "Good effort! Keep learning and improving!",
            Self::Fair => "Not bad! You're on the right track!",
            Self::NeedsPractice => "Keep practicing! You'll improve with more study!",
        }
    }

    /// Bands worth a celebration in the results view.
    #[must_use]
    pub fn celebrate(self) -> bool {
        matches!(self, Self::Outstanding | Self::Excellent | Self::Great)
    }
}

/// How close the countdown is to running out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimePressure {
    Normal,
    /// Less than 30% of the budget left.
    Warning,
    /// Less than 15% of the budget left.
    Critical,
}

impl TimePressure {
    #[must_use]
    pub fn from_remaining(time_left_secs: u32, budget_secs: u32) -> Self {
        if budget_secs == 0 {
            return Self::Critical;
        }
        let left = u64::from(time_left_secs) * 100;
        let budget = u64::from(budget_secs);
        if left < budget * 15 {
            Self::Critical
        } else if left < budget * 30 {
            Self::Warning
        } else {
            Self::Normal
        }
    }
}

/// Formats seconds as `m:ss`.
#[must_use]
pub fn format_clock(secs: u32) -> String {
    format!("{}:{:02}", secs / 60, secs % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accuracy_rounds_half_up() {
        assert_eq!(accuracy_percent(4, 5), 80);
        assert_eq!(accuracy_percent(1, 3), 33);
        assert_eq!(accuracy_percent(2, 3), 67);
        assert_eq!(accuracy_percent(1, 8), 13);
        assert_eq!(accuracy_percent(0, 0), 0);
    }

    #[test]
    fn bands_follow_thresholds() {
        assert_eq!(ScoreBand::from_accuracy(100), ScoreBand::Outstanding);
        assert_eq!(ScoreBand::from_accuracy(80), ScoreBand::Excellent);
        assert_eq!(ScoreBand::from_accuracy(70), ScoreBand::Great);
        assert_eq!(ScoreBand::from_accuracy(69), ScoreBand::Good);
        assert_eq!(ScoreBand::from_accuracy(50), ScoreBand::Fair);
        assert_eq!(ScoreBand::from_accuracy(49), ScoreBand::NeedsPractice);
        assert!(ScoreBand::Great.celebrate());
        assert!(!ScoreBand::Good.celebrate());
    }

    #[test]
    fn time_pressure_thresholds() {
        assert_eq!(TimePressure::from_remaining(180, 180), TimePressure::Normal);
        assert_eq!(TimePressure::from_remaining(54, 180), TimePressure::Normal);
        assert_eq!(TimePressure::from_remaining(53, 180), TimePressure::Warning);
        assert_eq!(TimePressure::from_remaining(26, 180), TimePressure::Critical);
    }

    #[test]
    fn clock_format() {
        assert_eq!(format_clock(180), "3:00");
        assert_eq!(format_clock(65), "1:05");
        assert_eq!(format_clock(0), "0:00");
    }
}
