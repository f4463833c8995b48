use chrono::{DateTime, Utc};
use common::{CompanyId, OfferId};
use domain::{BookingEventKind, BookingOffer};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a logged event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(Uuid);

impl EventId {
    /// Creates a new random event ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates an event ID from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One row of the append-only booking event log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub event_id: EventId,

    /// Position in the log, assigned by the store on append.
    pub sequence: i64,

    pub offer_id: OfferId,
    pub company_id: CompanyId,

    /// Event type, e.g. "booking_started".
    pub event_type: String,

    /// Transition-specific payload.
    pub payload: serde_json::Value,

    pub created_at: DateTime<Utc>,

    /// Human actor, or `None` for the system.
    pub created_by: Option<String>,
}

impl EventRecord {
    /// Builds a record of `kind` for `offer`, stamped with the current time.
    pub fn for_offer(
        offer: &BookingOffer,
        kind: &BookingEventKind,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self {
            event_id: EventId::new(),
            sequence: 0,
            offer_id: offer.id,
            company_id: offer.company_id,
            event_type: kind.event_type().to_string(),
            payload: kind.payload()?,
            created_at: Utc::now(),
            created_by: None,
        })
    }

    /// Sets the human actor responsible for the event.
    pub fn created_by(mut self, actor: impl Into<String>) -> Self {
        self.created_by = Some(actor.into());
        self
    }

    /// Overrides the creation timestamp.
    pub fn at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    /// Decodes the typed event.
    pub fn kind(&self) -> Result<BookingEventKind, serde_json::Error> {
        BookingEventKind::from_parts(&self.event_type, &self.payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::sample_offer;

    #[test]
    fn event_id_new_creates_unique_ids() {
        assert_ne!(EventId::new(), EventId::new());
    }

    #[test]
    fn record_for_offer_carries_type_and_payload() {
        let offer = sample_offer();
        let kind = BookingEventKind::BookingStarted {
            partner_order_id: "HO-1".to_string(),
        };

        let record = EventRecord::for_offer(&offer, &kind)
            .unwrap()
            .created_by("agent@example.com");

        assert_eq!(record.offer_id, offer.id);
        assert_eq!(record.company_id, offer.company_id);
        assert_eq!(record.event_type, "booking_started");
        assert_eq!(record.payload["partner_order_id"], "HO-1");
        assert_eq!(record.created_by.as_deref(), Some("agent@example.com"));
        assert_eq!(record.kind().unwrap(), kind);
    }
}
