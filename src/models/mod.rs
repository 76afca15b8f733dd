pub mod analysis;
pub mod settings;
pub mod token;

pub use analysis::{
    AnalysisResponse, AnalysisSnapshot, Freshness, HeroAnalysis, MatchState, RosterAnalysis,
};
pub use settings::{Settings, SettingsHandle};
pub use token::{TokenGrant, TokenSet};
