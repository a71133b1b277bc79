//! # Conversation Script
//!
//! Builds what the upstream model is configured with for every session:
//! the system prompt, which walks the user through one slot at a time, and
//! the `saveTrip` tool declaration the model calls once all slots are
//! confirmed.
//!
//! Both are generated from the `TripCatalog`, so the names the model is told
//! to offer are exactly the names validation accepts.

use crate::config::AppConfig;
use crate::trips::catalog::TripCatalog;
use crate::trips::record::{TripType, REQUIRED_FIELDS};
use crate::upstream::{FunctionDeclaration, SessionSetup};
use serde_json::json;
use std::fmt::Write;

/// Name of the only tool the relay handles.
pub const SAVE_TRIP_TOOL: &str = "saveTrip";

/// The date the model records when the user does not give one.
pub const DEFAULT_DATE: &str = "today";

pub fn system_prompt(catalog: &TripCatalog) -> String {
    let mut prompt = String::new();

    prompt.push_str(
        "You are a dispatch assistant that records trips by voice. \
         Speak briefly and ask for exactly one thing at a time, in this order:\n",
    );

    let _ = writeln!(prompt, "1. Client. Valid clients: {}.", catalog.client_names().join(", "));
    let _ = writeln!(prompt, "2. Driver. Valid drivers: {}.", catalog.drivers.join(", "));
    prompt.push_str("3. Destination. Only offer the destinations of the chosen client:\n");
    for client in &catalog.clients {
        let _ = writeln!(prompt, "   - {}: {}", client.name, client.destinations.join(", "));
    }
    let trip_types: Vec<&str> = TripType::ALL.iter().map(TripType::as_str).collect();
    let _ = writeln!(prompt, "4. Trip type: {}.", trip_types.join(", "));
    let _ = writeln!(
        prompt,
        "5. Date. If the user does not give one, use \"{}\".",
        DEFAULT_DATE
    );
    // no origins configured, no origin slot
    if !catalog.origins.is_empty() {
        let _ = writeln!(
            prompt,
            "6. Origin, optional. Valid origins: {}. Skip it if the user has none.",
            catalog.origins.join(", ")
        );
    }

    let _ = write!(
        prompt,
        "If the user names something that is not in a list, say so and repeat the valid options. \
         When every slot is filled, summarize the trip in one sentence and ask the user to confirm. \
         Only after the user confirms, call {tool} with the collected values, using the exact \
         spellings listed above. If the user wants a change, update that slot and confirm again. \
         After {tool} succeeds, tell the user the trip was saved and offer to record another one.",
        tool = SAVE_TRIP_TOOL
    );

    prompt
}

/// Declaration of the `saveTrip` tool. Every field is required except `origin`,
/// which is only declared when the catalog lists origins.
///
/// Destinations are advertised as the union over all clients; narrowing to
/// the chosen client's list happens when the call is validated.
pub fn save_trip_declaration(catalog: &TripCatalog) -> FunctionDeclaration {
    let trip_types: Vec<&str> = TripType::ALL.iter().map(TripType::as_str).collect();

    let mut parameters = json!({
        "type": "OBJECT",
        "properties": {
            "client": {
                "type": "STRING",
                "description": "Client the trip is for",
                "enum": catalog.client_names(),
            },
            "driver": {
                "type": "STRING",
                "description": "Driver assigned to the trip",
                "enum": catalog.drivers,
            },
            "destination": {
                "type": "STRING",
                "description": "Destination, must belong to the chosen client",
                "enum": catalog.all_destinations(),
            },
            "tripType": {
                "type": "STRING",
                "description": "Direction of the trip",
                "enum": trip_types,
            },
            "date": {
                "type": "STRING",
                "description": format!("Date of the trip as spoken, or \"{}\"", DEFAULT_DATE),
            },
        },
        "required": REQUIRED_FIELDS,
    });

    if !catalog.origins.is_empty() {
        parameters["properties"]["origin"] = json!({
            "type": "STRING",
            "description": "Where the trip starts, if given",
            "enum": catalog.origins,
        });
    }

    FunctionDeclaration {
        name: SAVE_TRIP_TOOL.to_string(),
        description: "Save a confirmed trip. Call only after the user confirmed the summary.".to_string(),
        parameters,
    }
}

/// Session parameters for one upstream conversation.
pub fn session_setup(config: &AppConfig) -> SessionSetup {
    SessionSetup {
        model: config.upstream.model.clone(),
        voice: config.upstream.voice.clone(),
        system_prompt: system_prompt(&config.catalog),
        tools: vec![save_trip_declaration(&config.catalog)],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[test]
    fn test_prompt_lists_catalog_values_in_slot_order() {
        let catalog = TripCatalog::default();
        let prompt = system_prompt(&catalog);

        let client = prompt.find("1. Client").unwrap();
        let driver = prompt.find("2. Driver").unwrap();
        let destination = prompt.find("3. Destination").unwrap();
        let date = prompt.find("5. Date").unwrap();
        assert!(client < driver && driver < destination && destination < date);

        assert!(prompt.contains("Harbor Foods: Port Terminal, Downtown Market"));
        assert!(prompt.contains("Carlos, Maria, John"));
        assert!(prompt.contains("round_trip"));
        assert!(prompt.contains(SAVE_TRIP_TOOL));
    }

    #[test]
    fn test_declaration_requires_all_but_origin() {
        let declaration = save_trip_declaration(&TripCatalog::default());
        assert_eq!(declaration.name, "saveTrip");

        let required: Vec<&str> = declaration.parameters["required"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(Value::as_str)
            .collect();
        assert_eq!(required, vec!["client", "driver", "destination", "tripType", "date"]);
        assert!(declaration.parameters["properties"]["origin"].is_object());
    }

    #[test]
    fn test_declaration_enums_follow_catalog() {
        let declaration = save_trip_declaration(&TripCatalog::default());
        let properties = &declaration.parameters["properties"];

        assert_eq!(properties["driver"]["enum"], serde_json::json!(["Carlos", "Maria", "John"]));
        assert_eq!(
            properties["tripType"]["enum"],
            serde_json::json!(["outbound", "return", "round_trip"])
        );
        assert_eq!(properties["destination"]["enum"].as_array().unwrap().len(), 6);
    }

    #[test]
    fn test_catalog_without_origins_leaves_the_slot_out() {
        let mut catalog = TripCatalog::default();
        catalog.origins.clear();

        let prompt = system_prompt(&catalog);
        assert!(!prompt.contains("Origin"));
        assert!(prompt.contains("5. Date"));

        let declaration = save_trip_declaration(&catalog);
        let properties = declaration.parameters["properties"].as_object().unwrap();
        assert!(!properties.contains_key("origin"));
        assert_eq!(properties.len(), 5);
    }

    #[test]
    fn test_session_setup_uses_configured_model_and_voice() {
        let config = AppConfig::default();
        let setup = session_setup(&config);

        assert_eq!(setup.model, config.upstream.model);
        assert_eq!(setup.voice, config.upstream.voice);
        assert_eq!(setup.tools.len(), 1);
        assert!(!setup.system_prompt.is_empty());
    }
}
