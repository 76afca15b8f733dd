use chrono::{DateTime, Duration, Utc};

/// What the freshness indicator shows. Re-rendered every 10s by the display
/// layer so relative ages keep counting up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndicatorState {
    /// Nothing analyzed since startup.
    NoData,
    Analyzing,
    Updated(DateTime<Utc>),
    /// Last pass kept a previous roster; the data shown is older than the
    /// last capture.
    CachedData(DateTime<Utc>),
    Error(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FreshnessTier {
    Fresh,
    Stale,
    Old,
}

pub fn tier_for(age: Duration) -> FreshnessTier {
    if age < Duration::seconds(60) {
        FreshnessTier::Fresh
    } else if age < Duration::seconds(180) {
        FreshnessTier::Stale
    } else {
        FreshnessTier::Old
    }
}

#[derive(Default)]
pub struct FreshnessIndicator {
    state: parking_lot::Mutex<Option<IndicatorState>>,
}

impl FreshnessIndicator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, state: IndicatorState) {
        *self.state.lock() = Some(state);
    }

    pub fn state(&self) -> IndicatorState {
        self.state.lock().clone().unwrap_or(IndicatorState::NoData)
    }

    pub fn label(&self) -> String {
        self.label_at(Utc::now())
    }

    fn label_at(&self, now: DateTime<Utc>) -> String {
        match self.state() {
            IndicatorState::NoData => "No analysis yet".to_string(),
            IndicatorState::Analyzing => "Analyzing...".to_string(),
            IndicatorState::Updated(at) => format!("Updated {}", age_label(now - at)),
            IndicatorState::CachedData(at) => {
                format!("Showing cached data ({})", age_label(now - at))
            }
            IndicatorState::Error(msg) => format!("Error: {}", msg),
        }
    }
}

fn age_label(age: Duration) -> String {
    match tier_for(age) {
        FreshnessTier::Fresh => "just now".to_string(),
        FreshnessTier::Stale => format!("{}m ago", age.num_minutes().max(1)),
        FreshnessTier::Old => format!("{}m ago", age.num_minutes()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_boundaries() {
        assert_eq!(tier_for(Duration::seconds(0)), FreshnessTier::Fresh);
        assert_eq!(tier_for(Duration::seconds(59)), FreshnessTier::Fresh);
        assert_eq!(tier_for(Duration::seconds(60)), FreshnessTier::Stale);
        assert_eq!(tier_for(Duration::seconds(179)), FreshnessTier::Stale);
        assert_eq!(tier_for(Duration::seconds(180)), FreshnessTier::Old);
        assert_eq!(tier_for(Duration::minutes(30)), FreshnessTier::Old);
    }

    #[test]
    fn labels_follow_state() {
        let indicator = FreshnessIndicator::new();
        assert_eq!(indicator.label(), "No analysis yet");

        indicator.set(IndicatorState::Analyzing);
        assert_eq!(indicator.label(), "Analyzing...");

        let now = Utc::now();
        indicator.set(IndicatorState::Updated(now - Duration::seconds(5)));
        assert_eq!(indicator.label_at(now), "Updated just now");

        indicator.set(IndicatorState::Updated(now - Duration::seconds(125)));
        assert_eq!(indicator.label_at(now), "Updated 2m ago");

        indicator.set(IndicatorState::CachedData(now - Duration::seconds(200)));
        assert_eq!(indicator.label_at(now), "Showing cached data (3m ago)");

        indicator.set(IndicatorState::Error("boom".into()));
        assert_eq!(indicator.label(), "Error: boom");
    }
}
