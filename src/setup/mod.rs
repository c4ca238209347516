//! Scenario setup data model
//!
//! The setup document drives a whole run: who is in the room, what the world
//! looks like, and how the meeting is framed. Field declaration order matches
//! the on-disk key order of `setup.json`.

pub mod generate;

use crate::llm::KNOWN_MODELS;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::collections::HashSet;
use std::fs;
use std::path::Path;

pub const PLACEHOLDER: &str = "<not_ready>";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Character {
    pub name: String,
    pub position: String,
    pub role: String,
    pub hierarchy: i64,
    pub assigned_model: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorldContext {
    pub era: String,
    pub year: String,
    pub season: String,
    pub technological_level: String,
    pub culture_and_society: String,
    pub religions: Vec<String>,
    pub magic_and_myths: String,
    pub political_climate: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Location {
    pub name: String,
    pub coordinates: String,
    pub latitude: f64,
    pub longitude: f64,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub event_description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub title: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeatingArrangement {
    pub position: i64,
    pub name: String,
    pub role: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomSetup {
    pub description: String,
    pub seating_arrangement: Vec<SeatingArrangement>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurposeAndContext {
    pub purpose: String,
    pub context: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Goal {
    pub objectives: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BriefingMaterials {
    pub documents: Vec<Document>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtocolReminder {
    pub speaking_order: Vec<String>,
    pub customs: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpeningMessage {
    pub speaker: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeetingSetup {
    pub date: String,
    pub time: String,
    pub location: Location,
    pub recent_events: Vec<Event>,
    pub summary_of_last_meetings: String,
    pub tags_keywords: Vec<String>,
    pub category: String,
    pub room_setup: RoomSetup,
    pub purpose_and_context: PurposeAndContext,
    pub goal: Goal,
    pub briefing_materials: BriefingMaterials,
    pub protocol_reminder: ProtocolReminder,
    pub opening_message: OpeningMessage,
    pub agenda_outline: BTreeMap<String, String>,
}

/// Pseudo-participant that narrates system entries in the log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Logkeeper {
    pub name: String,
    pub position: String,
    pub role: String,
    pub assigned_model: String,
}

impl Default for Logkeeper {
    fn default() -> Self {
        Self {
            name: "The Logkeeper".to_string(),
            position: "Logkeeper".to_string(),
            role: "Group chat manager. Logs the meeting and provides a summary of the meeting"
                .to_string(),
            assigned_model: "openai-gpt".to_string(),
        }
    }
}

/// Everything a conversation run needs, as read from `setup.json`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioSetup {
    pub id: String,
    pub version: String,
    pub name: String,
    pub topic: String,
    #[serde(default)]
    pub logkeeper: Logkeeper,
    /// Accumulated generation latency in milliseconds
    #[serde(default)]
    pub simulation_time: u64,
    pub characters: Vec<Character>,
    pub world_or_simulation_context: WorldContext,
    pub meeting_setup: MeetingSetup,
}

impl ScenarioSetup {
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read setup file {}", path.display()))?;
        let setup: ScenarioSetup = serde_json::from_str(&text)
            .with_context(|| format!("Invalid setup file {}", path.display()))?;
        setup.validate()?;
        Ok(setup)
    }

    pub fn write_to_file(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)
            .with_context(|| format!("Failed to write setup file {}", path.display()))?;
        Ok(())
    }

    /// Reject setups the conversation loop cannot run against
    pub fn validate(&self) -> Result<()> {
        if self.characters.is_empty() {
            bail!("Setup has no characters");
        }

        let mut seen = HashSet::new();
        for character in &self.characters {
            if !seen.insert(character.name.as_str()) {
                bail!("Duplicate character name '{}'", character.name);
            }
            if !KNOWN_MODELS.contains(&character.assigned_model.as_str()) {
                bail!(
                    "Character '{}' is assigned unknown model '{}' (supported: {})",
                    character.name,
                    character.assigned_model,
                    KNOWN_MODELS.join(", ")
                );
            }
        }
        Ok(())
    }

    pub fn character_names(&self) -> Vec<String> {
        self.characters.iter().map(|c| c.name.clone()).collect()
    }

    pub fn find_character(&self, name: &str) -> Option<&Character> {
        self.characters.iter().find(|c| c.name == name)
    }
}

#[cfg(test)]
pub(crate) mod test_fixtures {
    use super::*;

    pub fn minimal_setup(names_and_models: &[(&str, &str)]) -> ScenarioSetup {
        ScenarioSetup {
            id: PLACEHOLDER.to_string(),
            version: "2.0".to_string(),
            name: PLACEHOLDER.to_string(),
            topic: "Quarterly planning".to_string(),
            logkeeper: Logkeeper::default(),
            simulation_time: 0,
            characters: names_and_models
                .iter()
                .map(|(name, model)| Character {
                    name: name.to_string(),
                    position: "Member".to_string(),
                    role: "Participant".to_string(),
                    hierarchy: 1,
                    assigned_model: model.to_string(),
                })
                .collect(),
            world_or_simulation_context: WorldContext {
                era: "Present day".to_string(),
                year: "2026".to_string(),
                season: "Summer".to_string(),
                technological_level: "Modern".to_string(),
                culture_and_society: "Corporate".to_string(),
                religions: vec![],
                magic_and_myths: "None".to_string(),
                political_climate: "Stable".to_string(),
            },
            meeting_setup: MeetingSetup {
                date: "2026/08/29".to_string(),
                time: "15:00".to_string(),
                location: Location {
                    name: "Boardroom".to_string(),
                    coordinates: "0,0".to_string(),
                    latitude: 0.0,
                    longitude: 0.0,
                    description: "A boardroom".to_string(),
                },
                recent_events: vec![],
                summary_of_last_meetings: "None".to_string(),
                tags_keywords: vec![],
                category: "planning".to_string(),
                room_setup: RoomSetup {
                    description: "Round table".to_string(),
                    seating_arrangement: vec![],
                },
                purpose_and_context: PurposeAndContext {
                    purpose: "Plan the quarter".to_string(),
                    context: "Quarterly cadence".to_string(),
                },
                goal: Goal {
                    objectives: vec!["Agree on priorities".to_string()],
                },
                briefing_materials: BriefingMaterials { documents: vec![] },
                protocol_reminder: ProtocolReminder {
                    speaking_order: vec![],
                    customs: vec![],
                },
                opening_message: OpeningMessage {
                    speaker: names_and_models
                        .first()
                        .map(|(name, _)| name.to_string())
                        .unwrap_or_default(),
                    message: "Welcome everyone, let's begin.".to_string(),
                },
                agenda_outline: BTreeMap::new(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_fixtures::minimal_setup;
    use super::*;

    #[test]
    fn test_validate_accepts_well_formed_setup() {
        let setup = minimal_setup(&[("Alice", "claude"), ("Bob", "openai-gpt")]);
        assert!(setup.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_duplicate_names() {
        let setup = minimal_setup(&[("Alice", "claude"), ("Alice", "gemini")]);
        let err = setup.validate().unwrap_err().to_string();
        assert!(err.contains("Duplicate character name"));
    }

    #[test]
    fn test_validate_rejects_unknown_model() {
        let setup = minimal_setup(&[("Alice", "mistral")]);
        let err = setup.validate().unwrap_err().to_string();
        assert!(err.contains("unknown model 'mistral'"));
    }

    #[test]
    fn test_setup_serializes_with_fixed_key_order() {
        let setup = minimal_setup(&[("Alice", "claude")]);
        let json = serde_json::to_string(&setup).unwrap();

        let id_pos = json.find("\"id\"").unwrap();
        let topic_pos = json.find("\"topic\"").unwrap();
        let characters_pos = json.find("\"characters\"").unwrap();
        let meeting_pos = json.find("\"meeting_setup\"").unwrap();
        assert!(id_pos < topic_pos);
        assert!(topic_pos < characters_pos);
        assert!(characters_pos < meeting_pos);
    }

    #[test]
    fn test_round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("setup.json");
        let setup = minimal_setup(&[("Alice", "claude")]);

        setup.write_to_file(&path).unwrap();
        let loaded = ScenarioSetup::from_file(&path).unwrap();
        assert_eq!(loaded.topic, setup.topic);
        assert_eq!(loaded.characters.len(), 1);
        assert_eq!(loaded.logkeeper.name, "The Logkeeper");
    }
}
