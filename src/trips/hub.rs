//! # Trip Hub
//!
//! The single owner of the `TripStore`. Every connection actor talks to the
//! hub through messages, so appends, snapshots and broadcasts are serialized
//! by the hub's mailbox. No lock is shared between connections.
//!
//! ## Broadcast:
//! After every append the hub serializes one `trips_update` envelope and
//! delivers the same text to every subscriber. Subscribers whose actor has
//! already stopped are dropped from the set without sending anything.

use crate::protocol::ServerEnvelope;
use crate::trips::record::TripRecord;
use crate::trips::store::TripStore;
use actix::prelude::*;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info};
use uuid::Uuid;

/// A serialized `trips_update` envelope, identical for every recipient.
#[derive(Message, Clone, Debug)]
#[rtype(result = "()")]
pub struct TripsBroadcast(pub Arc<str>);

/// Register a connection for broadcasts. The hub immediately sends the
/// current snapshot to the new subscriber.
#[derive(Message)]
#[rtype(result = "()")]
pub struct Subscribe {
    pub id: Uuid,
    pub recipient: Recipient<TripsBroadcast>,
}

#[derive(Message)]
#[rtype(result = "()")]
pub struct Unsubscribe {
    pub id: Uuid,
}

/// Append an accepted trip and broadcast. Replies with the new trip count.
#[derive(Message)]
#[rtype(result = "usize")]
pub struct AppendTrip(pub TripRecord);

#[derive(Message)]
#[rtype(result = "Vec<TripRecord>")]
pub struct GetTrips;

#[derive(Message)]
#[rtype(result = "usize")]
pub struct CountTrips;

#[derive(Default)]
pub struct TripHub {
    store: TripStore,
    subscribers: HashMap<Uuid, Recipient<TripsBroadcast>>,
}

impl TripHub {
    pub fn new() -> Self {
        Self::default()
    }

    fn snapshot_payload(&self) -> Option<Arc<str>> {
        let envelope = ServerEnvelope::TripsUpdate {
            trips: self.store.snapshot(),
        };
        match envelope.to_json() {
            Ok(json) => Some(Arc::from(json)),
            Err(err) => {
                error!(error = %err, "Failed to serialize trips snapshot");
                None
            }
        }
    }

    fn broadcast(&mut self) {
        let Some(payload) = self.snapshot_payload() else {
            return;
        };

        self.subscribers.retain(|id, recipient| {
            if recipient.connected() {
                recipient.do_send(TripsBroadcast(payload.clone()));
                true
            } else {
                debug!(subscriber = %id, "Dropping closed subscriber");
                false
            }
        });

        debug!(
            subscribers = self.subscribers.len(),
            trips = self.store.len(),
            "Broadcast trips update"
        );
    }
}

impl Actor for TripHub {
    type Context = Context<Self>;

    fn started(&mut self, _ctx: &mut Self::Context) {
        info!("Trip hub started");
    }
}

impl Handler<Subscribe> for TripHub {
    type Result = ();

    fn handle(&mut self, msg: Subscribe, _ctx: &mut Self::Context) {
        if let Some(payload) = self.snapshot_payload() {
            msg.recipient.do_send(TripsBroadcast(payload));
        }
        self.subscribers.insert(msg.id, msg.recipient);
        debug!(subscriber = %msg.id, total = self.subscribers.len(), "Subscriber added");
    }
}

impl Handler<Unsubscribe> for TripHub {
    type Result = ();

    fn handle(&mut self, msg: Unsubscribe, _ctx: &mut Self::Context) {
        if self.subscribers.remove(&msg.id).is_some() {
            debug!(subscriber = %msg.id, total = self.subscribers.len(), "Subscriber removed");
        }
    }
}

impl Handler<AppendTrip> for TripHub {
    type Result = usize;

    fn handle(&mut self, msg: AppendTrip, _ctx: &mut Self::Context) -> usize {
        let record = msg.0;
        info!(
            client = %record.client,
            driver = %record.driver,
            destination = %record.destination,
            trip_type = %record.trip_type,
            "Trip accepted"
        );
        let count = self.store.append(record);
        self.broadcast();
        count
    }
}

impl Handler<GetTrips> for TripHub {
    type Result = Vec<TripRecord>;

    fn handle(&mut self, _msg: GetTrips, _ctx: &mut Self::Context) -> Vec<TripRecord> {
        self.store.snapshot()
    }
}

impl Handler<CountTrips> for TripHub {
    type Result = usize;

    fn handle(&mut self, _msg: CountTrips, _ctx: &mut Self::Context) -> usize {
        self.store.len()
    }
}
