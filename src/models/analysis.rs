use crate::error::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Wire ids the detector emits for roster slots it could not identify.
/// 0 = unknown, 1 = hidden behind UI, 2 = name unspecified.
pub const SENTINEL_HERO_IDS: [u32; 3] = [0, 1, 2];

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct MatchState {
    #[serde(default)]
    pub player_hero: Option<u32>,
    #[serde(default)]
    pub map: Option<String>,
    #[serde(default)]
    pub game_mode: Option<String>,
}

/// Server-computed guidance for one hero slot. The scoring itself is opaque
/// to this client; only `score` participates in the min-score display filters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeroAnalysis {
    pub score: i32,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub counters: Vec<u32>,
    #[serde(default)]
    pub note: Option<String>,
}

pub type RosterAnalysis = BTreeMap<u32, HeroAnalysis>;

#[derive(Debug, Clone)]
pub struct AnalysisResponse {
    pub match_state: MatchState,
    pub blue_team: RosterAnalysis,
    pub red_team: RosterAnalysis,
    pub persisted_blue_slots: Vec<String>,
    pub persisted_red_slots: Vec<String>,
}

impl AnalysisResponse {
    /// Parses the service response. The roster analyses are nested under
    /// `matchStateAnalysis` keyed by numeric hero id; non-numeric keys and
    /// undecodable entries are skipped. A missing or empty `matchState` is a
    /// malformed response and a hard error.
    pub fn parse(body: &str) -> AppResult<Self> {
        let root: serde_json::Value = serde_json::from_str(body)
            .map_err(|e| AppError::Api {
                status: None,
                detail: format!("undeserializable analysis response: {}", e),
            })?;

        let match_state_value = root.get("matchState").ok_or_else(|| AppError::Api {
            status: None,
            detail: "analysis response missing matchState".to_string(),
        })?;
        if match_state_value.as_object().map_or(true, |o| o.is_empty()) {
            return Err(AppError::Api {
                status: None,
                detail: "analysis response has empty matchState".to_string(),
            });
        }
        let match_state: MatchState = serde_json::from_value(match_state_value.clone())
            .map_err(|e| AppError::Api {
                status: None,
                detail: format!("invalid matchState: {}", e),
            })?;

        let rosters = root.get("matchStateAnalysis");
        let blue_team = parse_roster(rosters.and_then(|a| a.get("blueTeamAnalysis")));
        let red_team = parse_roster(rosters.and_then(|a| a.get("redTeamAnalysis")));

        Ok(Self {
            match_state,
            blue_team,
            red_team,
            persisted_blue_slots: parse_slot_list(root.get("persistedBlueTeamSlots")),
            persisted_red_slots: parse_slot_list(root.get("persistedRedTeamSlots")),
        })
    }
}

fn parse_roster(value: Option<&serde_json::Value>) -> RosterAnalysis {
    let mut roster = RosterAnalysis::new();
    let Some(map) = value.and_then(|v| v.as_object()) else {
        return roster;
    };
    for (key, entry) in map {
        let Ok(hero_id) = key.parse::<u32>() else {
            tracing::debug!("Skipping non-numeric roster key: {}", key);
            continue;
        };
        match serde_json::from_value::<HeroAnalysis>(entry.clone()) {
            Ok(analysis) => {
                roster.insert(hero_id, analysis);
            }
            Err(e) => tracing::debug!("Skipping undecodable analysis for hero {}: {}", hero_id, e),
        }
    }
    roster
}

fn parse_slot_list(value: Option<&serde_json::Value>) -> Vec<String> {
    value
        .and_then(|v| v.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

/// Removes slots the detector flagged as unidentified.
pub fn filter_recognized(roster: &RosterAnalysis) -> RosterAnalysis {
    roster
        .iter()
        .filter(|(id, _)| !SENTINEL_HERO_IDS.contains(id))
        .map(|(id, a)| (*id, a.clone()))
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Freshness {
    Fresh,
    Stale,
    Error,
}

/// What the display layer renders: the merged per-roster guidance plus how
/// trustworthy each side currently is.
#[derive(Debug, Clone)]
pub struct AnalysisSnapshot {
    pub match_state: MatchState,
    pub blue_team: RosterAnalysis,
    pub red_team: RosterAnalysis,
    pub blue_freshness: Freshness,
    pub red_freshness: Freshness,
    pub produced_at: chrono::DateTime<chrono::Utc>,
}

impl AnalysisSnapshot {
    pub fn any_stale(&self) -> bool {
        self.blue_freshness == Freshness::Stale || self.red_freshness == Freshness::Stale
    }
}
