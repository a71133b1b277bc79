//! # Trip Catalog
//!
//! The closed vocabularies the conversation works with: which clients exist,
//! where each client can be driven to, who can drive and where a trip may
//! start. The same catalog feeds three places, so they can never disagree:
//! - the system prompt read by the upstream model (`prompt.rs`)
//! - the `enum` lists of the `saveTrip` tool declaration
//! - validation of the arguments the model sends back (`record.rs`)

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// A client and the destinations that are valid for it.
///
/// Destinations are per-client: "Port Terminal" is only a valid destination
/// when the client is one that actually ships through the port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientDestinations {
    pub name: String,
    pub destinations: Vec<String>,
}

/// Every enumerated value a Trip Record can hold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TripCatalog {
    pub clients: Vec<ClientDestinations>,
    pub drivers: Vec<String>,
    pub origins: Vec<String>,
}

impl Default for TripCatalog {
    fn default() -> Self {
        Self {
            clients: vec![
                ClientDestinations {
                    name: "Acme Logistics".to_string(),
                    destinations: vec!["Central Warehouse".to_string(), "North Depot".to_string()],
                },
                ClientDestinations {
                    name: "Harbor Foods".to_string(),
                    destinations: vec!["Port Terminal".to_string(), "Downtown Market".to_string()],
                },
                ClientDestinations {
                    name: "Valley Clinic".to_string(),
                    destinations: vec!["Main Campus".to_string(), "East Annex".to_string()],
                },
            ],
            drivers: vec!["Carlos".to_string(), "Maria".to_string(), "John".to_string()],
            origins: vec!["Head Office".to_string(), "Airport".to_string()],
        }
    }
}

impl TripCatalog {
    /// Look up a client by name, ignoring case and surrounding whitespace.
    pub fn client(&self, name: &str) -> Option<&ClientDestinations> {
        let wanted = name.trim();
        self.clients
            .iter()
            .find(|client| client.name.eq_ignore_ascii_case(wanted))
    }

    pub fn client_names(&self) -> Vec<&str> {
        self.clients.iter().map(|c| c.name.as_str()).collect()
    }

    /// Every destination of every client, first occurrence wins.
    ///
    /// The tool declaration can't express "destination depends on client",
    /// so it advertises the union and validation narrows it afterwards.
    pub fn all_destinations(&self) -> Vec<&str> {
        let mut seen: Vec<&str> = Vec::new();
        for destination in self.clients.iter().flat_map(|c| c.destinations.iter()) {
            if !seen.iter().any(|d| d.eq_ignore_ascii_case(destination)) {
                seen.push(destination.as_str());
            }
        }
        seen
    }

    /// Canonical spelling of a driver, if the driver list knows it.
    pub fn driver(&self, name: &str) -> Option<&str> {
        find_ignore_case(&self.drivers, name)
    }

    /// Canonical spelling of an origin, if the origin list knows it.
    pub fn origin(&self, name: &str) -> Option<&str> {
        find_ignore_case(&self.origins, name)
    }

    /// Reject catalogs the conversation script can't work with.
    pub fn validate(&self) -> Result<()> {
        if self.clients.is_empty() {
            return Err(anyhow::anyhow!("Trip catalog must list at least one client"));
        }

        for client in &self.clients {
            if client.name.trim().is_empty() {
                return Err(anyhow::anyhow!("Trip catalog contains a client with an empty name"));
            }
            if client.destinations.is_empty() {
                return Err(anyhow::anyhow!(
                    "Client '{}' must have at least one destination",
                    client.name
                ));
            }
        }

        if self.drivers.is_empty() {
            return Err(anyhow::anyhow!("Trip catalog must list at least one driver"));
        }

        Ok(())
    }
}

/// Case-insensitive membership test that hands back the catalog's spelling.
pub(crate) fn find_ignore_case<'a>(items: &'a [String], wanted: &str) -> Option<&'a str> {
    let wanted = wanted.trim();
    items
        .iter()
        .find(|item| item.eq_ignore_ascii_case(wanted))
        .map(String::as_str)
}
