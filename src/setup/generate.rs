//! AI-driven setup generation
//!
//! Builds a full `ScenarioSetup` from a bare topic by asking the manager
//! model for characters, world context, and meeting framing in three calls.
//! Model output is JSON-ish at best, so responses are scrubbed and accepted
//! only once they parse cleanly.

use crate::gateway::{is_error_response, Gateway, GatewayError};
use crate::llm::factory::random_model_id;
use crate::setup::{
    BriefingMaterials, Character, Document, Event, Goal, Location, Logkeeper, MeetingSetup,
    OpeningMessage, ProtocolReminder, PurposeAndContext, RoomSetup, ScenarioSetup,
    SeatingArrangement, WorldContext, PLACEHOLDER,
};
use serde_json::Value;
use std::collections::BTreeMap;

/// Scrub a model response down to parseable JSON
///
/// Strips markdown code fences, drops lines carrying `//` comments, and
/// removes trailing commas before closing brackets.
pub fn clean_json_response(response: &str) -> String {
    let mut text = response;

    if let Some((_, after)) = text.split_once("```json") {
        text = after;
    }
    if let Some((before, _)) = text.split_once("```") {
        text = before;
    }

    let no_comments: String = text
        .split('\n')
        .filter(|line| !line.contains("//"))
        .collect::<Vec<_>>()
        .join("\n");

    no_comments
        .replace(",]", "]")
        .replace(",}", "}")
        .trim()
        .to_string()
}

/// Clean a response and parse it, refusing anything that is still not JSON
fn parse_json_response(response: &str) -> Option<Value> {
    let cleaned = clean_json_response(response);
    serde_json::from_str(&cleaned).ok()
}

fn str_or(value: &Value, key: &str) -> String {
    value
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or(PLACEHOLDER)
        .to_string()
}

fn f64_or(value: &Value, key: &str) -> f64 {
    value.get(key).and_then(Value::as_f64).unwrap_or(0.0)
}

fn string_list_or(value: &Value, key: &str) -> Vec<String> {
    match value.get(key).and_then(Value::as_array) {
        Some(items) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        None => vec![PLACEHOLDER.to_string()],
    }
}

const CHARACTERS_EXAMPLE: &str = r#"{
  "characters": [
    {"name": "Khal", "position": "Queen", "role": "Ruler and Leader", "hierarchy_level": 1},
    {"name": "Tyrion Lann", "position": "Hand of the Queen", "role": "Chief Advisor and Strategist", "hierarchy_level": 2},
    {"name": "Jon Melt", "position": "King in the North", "role": "Leader of the Northern forces", "hierarchy_level": 3},
    {"name": "Annie of Tarth", "position": "Knight", "role": "Protector and warrior", "hierarchy_level": 4}
  ]
}"#;

const WORLD_CONTEXT_EXAMPLE: &str = r#"{
  "world_or_simulation_context": {
    "era": "Medieval Fantasy",
    "year": "300 AC (After Conquest)",
    "season": "Late Summer",
    "technological_level": "Medieval with elements of magic",
    "culture_and_society": "Feudal society with noble houses, knights, and smallfolk",
    "religions": ["Faith of the Seven", "Old Gods of the Forest"],
    "political_climate": "Feudal system with power struggles among noble families",
    "magic_and_myths": "Magic exists, with dragons and prophecies playing significant roles"
  }
}"#;

const MEETING_SETUP_EXAMPLE: &str = r#"{
  "meeting_setup": {
    "date": "1234/11/23",
    "time": "15:00",
    "location": {
      "name": "Council Chamber",
      "coordinates": "35.6762 N, 139.6503 E",
      "latitude": 35.6762,
      "longitude": 139.6503,
      "description": "A fortified chamber beneath the keep"
    },
    "recent_events": [
      {"event_description": "Unrest has been growing among the outlying provinces."}
    ],
    "summary_of_last_meetings": "Previous meetings focused on alliances and military strength.",
    "tags_keywords": ["strategy", "alliances"],
    "category": "war council",
    "room_setup": {
      "description": "A circular arrangement symbolizing unity",
      "seating_arrangement": [
        {"position": 0, "name": "Khaleesi", "role": "Final authority and chairperson"},
        {"position": 1, "name": "Tyrion Lannister", "role": "Presents arguments and insights"}
      ]
    },
    "purpose_and_context": {
      "purpose": "To strategize the reclamation of the throne",
      "context": "A realm in political turmoil"
    },
    "goal": {
      "objectives": ["Develop a comprehensive strategy.", "Resolve immediate threats."]
    },
    "briefing_materials": {
      "documents": [
        {"title": "Current Political Landscape", "description": "Report on alliances and conflicts."}
      ]
    },
    "protocol_reminder": {
      "speaking_order": ["Khaleesi opens the meeting and sets the agenda."],
      "customs": ["Address Khaleesi as 'Your Grace'"]
    },
    "opening_message": {
      "speaker": "Khaleesi",
      "message": "Esteemed members of the council, we gather today under the shadow of uncertainty."
    },
    "agenda_outline": {
      "1": "Opening remarks",
      "2": "Updates on recent events",
      "3": "Next steps and assignments"
    }
  }
}"#;

fn characters_prompt(topic: &str) -> String {
    format!(
        "Topic: {}\n\
         Please generate a list of 4-6 characters for this meeting/conversation.\n\
         For each character include:\n\
         - name\n\
         - position/title\n\
         - role/responsibility\n\
         - hierarchy level (1-10, where 1 is highest)\n\n\
         Example:\n{}\n\n\
         Requirements: your response MUST be in JSON format",
        topic, CHARACTERS_EXAMPLE
    )
}

fn world_context_prompt(topic: &str) -> String {
    format!(
        "Topic: {}\n\
         Generate a detailed world context that includes:\n\
         - Current era/time period\n\
         - Year\n\
         - Season\n\
         - Technological level\n\
         - Culture and society\n\
         - Religions\n\
         - Political climate\n\
         - Magic and myths\n\n\
         Example:\n{}\n\n\
         Requirements: your response MUST be in JSON format",
        topic, WORLD_CONTEXT_EXAMPLE
    )
}

fn meeting_setup_prompt(topic: &str) -> String {
    format!(
        "Topic: {}\n\
         Generate meeting/conversation setup details including:\n\
         - Date and time\n\
         - Meeting location and its description\n\
         - Recent events leading to this meeting\n\
         - Summary of last meetings\n\
         - Room setup and seating arrangement\n\
         - Meeting purpose and goals\n\
         - Briefing materials (documents, reports, etc.)\n\
         - Protocol, speaking order and customs\n\
         - Opening message and its speaker\n\
         - Agenda outline (briefly outline the order of discussions)\n\n\
         Example:\n{}\n\n\
         Requirements: your response MUST be in JSON format, suitable for games \
         and meeting session playback programs.",
        topic, MEETING_SETUP_EXAMPLE
    )
}

fn parse_characters(value: &Value) -> Option<Vec<Character>> {
    let items = value.get("characters")?.as_array()?;
    let mut characters = Vec::with_capacity(items.len());
    for item in items {
        characters.push(Character {
            name: item.get("name")?.as_str()?.to_string(),
            position: item.get("position")?.as_str()?.to_string(),
            role: item.get("role")?.as_str()?.to_string(),
            hierarchy: item.get("hierarchy_level")?.as_i64()?,
            assigned_model: random_model_id().to_string(),
        });
    }
    Some(characters)
}

fn parse_world_context(value: &Value) -> Option<WorldContext> {
    let ctx = value.get("world_or_simulation_context")?;
    Some(WorldContext {
        era: ctx.get("era")?.as_str()?.to_string(),
        year: ctx.get("year")?.as_str()?.to_string(),
        season: ctx.get("season")?.as_str()?.to_string(),
        technological_level: ctx.get("technological_level")?.as_str()?.to_string(),
        culture_and_society: ctx.get("culture_and_society")?.as_str()?.to_string(),
        religions: string_list_or(ctx, "religions"),
        magic_and_myths: ctx.get("magic_and_myths")?.as_str()?.to_string(),
        political_climate: ctx.get("political_climate")?.as_str()?.to_string(),
    })
}

/// Meeting setup parsing is lenient: missing leaves become placeholders so a
/// slightly malformed response still produces an editable setup file.
fn parse_meeting_setup(value: &Value) -> Option<MeetingSetup> {
    let setup = value.get("meeting_setup")?;

    let location_value = setup.get("location").cloned().unwrap_or(Value::Null);
    let location = Location {
        name: str_or(&location_value, "name"),
        coordinates: str_or(&location_value, "coordinates"),
        latitude: f64_or(&location_value, "latitude"),
        longitude: f64_or(&location_value, "longitude"),
        description: str_or(&location_value, "description"),
    };

    let recent_events = match setup.get("recent_events") {
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| Event {
                event_description: str_or(item, "event_description"),
            })
            .collect(),
        Some(Value::String(text)) => vec![Event {
            event_description: text.clone(),
        }],
        _ => Vec::new(),
    };

    let room_value = setup.get("room_setup").cloned().unwrap_or(Value::Null);
    let seating = match room_value.get("seating_arrangement").and_then(Value::as_array) {
        Some(items) => items
            .iter()
            .map(|seat| SeatingArrangement {
                position: seat.get("position").and_then(Value::as_i64).unwrap_or(0),
                name: str_or(seat, "name"),
                role: str_or(seat, "role"),
            })
            .collect(),
        None => Vec::new(),
    };
    let room_setup = RoomSetup {
        description: str_or(&room_value, "description"),
        seating_arrangement: seating,
    };

    let purpose_value = setup
        .get("purpose_and_context")
        .cloned()
        .unwrap_or(Value::Null);
    let goal_value = setup.get("goal").cloned().unwrap_or(Value::Null);

    let documents = match setup
        .get("briefing_materials")
        .and_then(|b| b.get("documents"))
        .and_then(Value::as_array)
    {
        Some(items) => items
            .iter()
            .map(|doc| Document {
                title: str_or(doc, "title"),
                description: str_or(doc, "description"),
            })
            .collect(),
        None => Vec::new(),
    };

    let protocol_value = setup
        .get("protocol_reminder")
        .cloned()
        .unwrap_or(Value::Null);
    let opening_value = setup.get("opening_message").cloned().unwrap_or(Value::Null);

    let agenda_outline: BTreeMap<String, String> =
        match setup.get("agenda_outline").and_then(Value::as_object) {
            Some(map) => map
                .iter()
                .map(|(key, item)| {
                    (
                        key.clone(),
                        item.as_str().unwrap_or(PLACEHOLDER).to_string(),
                    )
                })
                .collect(),
            None => BTreeMap::from([("1".to_string(), PLACEHOLDER.to_string())]),
        };

    Some(MeetingSetup {
        date: str_or(setup, "date"),
        time: str_or(setup, "time"),
        location,
        recent_events,
        summary_of_last_meetings: str_or(setup, "summary_of_last_meetings"),
        tags_keywords: string_list_or(setup, "tags_keywords"),
        category: str_or(setup, "category"),
        room_setup,
        purpose_and_context: PurposeAndContext {
            purpose: str_or(&purpose_value, "purpose"),
            context: str_or(&purpose_value, "context"),
        },
        goal: Goal {
            objectives: string_list_or(&goal_value, "objectives"),
        },
        briefing_materials: BriefingMaterials { documents },
        protocol_reminder: ProtocolReminder {
            speaking_order: string_list_or(&protocol_value, "speaking_order"),
            customs: string_list_or(&protocol_value, "customs"),
        },
        opening_message: OpeningMessage {
            speaker: str_or(&opening_value, "speaker"),
            message: str_or(&opening_value, "message"),
        },
        agenda_outline,
    })
}

/// Generate a complete setup for `topic`, or `None` when the model output
/// could not be coaxed into the required shape.
pub async fn generate_setup(
    gateway: &Gateway,
    manager_model: &str,
    topic: &str,
) -> Result<Option<ScenarioSetup>, GatewayError> {
    let mut total_ttfb_secs = 0.0;

    eprintln!("\nGenerating characters...");
    let reply = gateway.invoke(manager_model, &characters_prompt(topic)).await?;
    if is_error_response(&reply) {
        eprintln!("Character generation failed: {}", reply.text);
        return Ok(None);
    }
    total_ttfb_secs += reply.usage.ttfb_seconds.unwrap_or(0.0);
    let characters = match parse_json_response(&reply.text).and_then(|v| parse_characters(&v)) {
        Some(characters) if !characters.is_empty() => characters,
        _ => {
            eprintln!("Could not parse characters from response:\n{}", reply.text);
            return Ok(None);
        }
    };

    eprintln!("Generating world context...");
    let reply = gateway
        .invoke(manager_model, &world_context_prompt(topic))
        .await?;
    if is_error_response(&reply) {
        eprintln!("World context generation failed: {}", reply.text);
        return Ok(None);
    }
    total_ttfb_secs += reply.usage.ttfb_seconds.unwrap_or(0.0);
    let world_context = match parse_json_response(&reply.text).and_then(|v| parse_world_context(&v))
    {
        Some(ctx) => ctx,
        None => {
            eprintln!(
                "Could not parse world context from response:\n{}",
                reply.text
            );
            return Ok(None);
        }
    };

    eprintln!("Generating meeting setup...");
    let reply = gateway
        .invoke(manager_model, &meeting_setup_prompt(topic))
        .await?;
    if is_error_response(&reply) {
        eprintln!("Meeting setup generation failed: {}", reply.text);
        return Ok(None);
    }
    total_ttfb_secs += reply.usage.ttfb_seconds.unwrap_or(0.0);
    let meeting_setup = match parse_json_response(&reply.text).and_then(|v| parse_meeting_setup(&v))
    {
        Some(setup) => setup,
        None => {
            eprintln!(
                "Could not parse meeting setup from response:\n{}",
                reply.text
            );
            return Ok(None);
        }
    };

    Ok(Some(ScenarioSetup {
        id: PLACEHOLDER.to_string(),
        version: std::env::var("VERSION").unwrap_or_else(|_| "2.0".to_string()),
        name: PLACEHOLDER.to_string(),
        topic: topic.to_string(),
        logkeeper: Logkeeper::default(),
        simulation_time: (total_ttfb_secs * 1000.0) as u64,
        characters,
        world_or_simulation_context: world_context,
        meeting_setup,
    }))
}
