/// DOMAIN EVENTS
///
/// Externally observable signals. The coordinator pushes these into an
/// outbox the notification layer (front-end, oracle clients) drains after
/// each committed operation.

use serde::{Deserialize, Serialize};

use crate::flight_directory::FlightStatus;
use crate::AccountId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DomainEvent {
    /// A new airline entered the admission pipeline.
    AirlineApplied { airline: AccountId, name: String },
    /// An applied airline crossed the approval quorum.
    AirlineRegistered { airline: AccountId },
    /// A registered airline paid its dues into the escrow pool.
    AirlinePaid { airline: AccountId, amount: u128 },
    /// A status probe was opened; only oracles holding `index` may answer.
    OracleRequest {
        index: u8,
        airline: AccountId,
        designator: String,
        departs_at: u64,
    },
    /// An oracle report was accepted into a request bucket.
    OracleReport {
        airline: AccountId,
        designator: String,
        departs_at: u64,
        status: FlightStatus,
    },
    /// A request reached quorum; the flight status is final.
    FlightStatusInfo {
        airline: AccountId,
        designator: String,
        departs_at: u64,
        status: FlightStatus,
    },
}
