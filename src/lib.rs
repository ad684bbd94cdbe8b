/// SKYSURETY: CONSORTIUM FLIGHT-DELAY INSURANCE
///
/// This crate implements the complete marketplace state machine, ensuring:
/// - Airline admission turns multiparty once the consortium is large
/// - Premiums sit in escrow and every payout is credited exactly once
/// - Flight status settles through an index-gated oracle quorum
/// - Every externally observable action lands in the event outbox
///
/// State lives in owned aggregates behind a single coordinator; nothing
/// here touches a network, a clock, or a real token.

pub mod airline_registry;
pub mod entropy;
pub mod events;
pub mod flight_directory;
pub mod insurance_ledger;
pub mod marketplace;
pub mod oracle_engine;
pub mod params;

/// Account identity as raw bytes, hex-encoded wherever it is displayed.
pub type AccountId = Vec<u8>;

// Re-export key types for easy access
pub use airline_registry::{
    Airline, AirlineRegistry, AirlineState, ApprovalOutcome, ApprovalSet, RegistryError,
};

pub use entropy::{EntropySource, OsEntropy, SequenceEntropy};

pub use events::DomainEvent;

pub use flight_directory::{
    DirectoryError, Flight, FlightDirectory, FlightKey, FlightStatus,
};

pub use insurance_ledger::{Insurance, InsuranceLedger, LedgerError, PolicyState};

pub use marketplace::{AuthContext, InsuranceMarketplace, MarketplaceError};

pub use oracle_engine::{
    Oracle, OracleEngine, OracleError, OracleRequest, RequestKey, SubmissionOutcome,
};

pub use params::{ParamsError, ProtocolParams, ORACLE_INDEX_COUNT, UNIT};
