//! Append-only, in-memory list of accepted trips.

use crate::trips::record::TripRecord;

/// Ordered sequence of accepted Trip Records for the lifetime of the process.
///
/// Insertion order is acceptance order. There is no update or delete path,
/// no capacity bound and no persistence. The store itself is not
/// synchronized: `TripHub` owns it and serializes every access.
#[derive(Debug, Default)]
pub struct TripStore {
    records: Vec<TripRecord>,
}

impl TripStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a record to the end and return the new number of records.
    pub fn append(&mut self, record: TripRecord) -> usize {
        self.records.push(record);
        self.records.len()
    }

    /// The full current sequence.
    pub fn snapshot(&self) -> Vec<TripRecord> {
        self.records.clone()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trips::record::TripType;

    fn trip(driver: &str, date: &str) -> TripRecord {
        TripRecord {
            client: "Acme Logistics".to_string(),
            driver: driver.to_string(),
            destination: "North Depot".to_string(),
            trip_type: TripType::Outbound,
            date: date.to_string(),
            origin: None,
        }
    }

    #[test]
    fn test_snapshot_preserves_acceptance_order() {
        let mut store = TripStore::new();
        let accepted: Vec<TripRecord> = (1..=20)
            .map(|day| trip(if day % 2 == 0 { "Maria" } else { "Carlos" }, &format!("day {}", day)))
            .collect();

        for (index, record) in accepted.iter().cloned().enumerate() {
            assert_eq!(store.append(record), index + 1);
        }

        assert_eq!(store.snapshot(), accepted);
    }

    #[test]
    fn test_snapshot_is_detached_from_later_appends() {
        let mut store = TripStore::new();
        store.append(trip("Carlos", "today"));
        let before = store.snapshot();

        store.append(trip("John", "tomorrow"));

        assert_eq!(before.len(), 1);
        assert_eq!(store.len(), 2);
        assert!(!store.is_empty());
    }
}
