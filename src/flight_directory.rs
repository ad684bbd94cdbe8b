/// FLIGHT DIRECTORY
///
/// Catalogue of flights offered for insurance, keyed by
/// (airline, designator, departure time). Status is written only through
/// the coordinator's oracle resolution path, never by callers.

use log::info;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::AccountId;

/// Resolution status of a flight. `Unknown` until a quorum settles it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FlightStatus {
    Unknown,
    OnTime,
    LateAirline,
    LateWeather,
    LateTechnical,
    LateOther,
}

impl FlightStatus {
    /// Wire code used on the oracle-client surface.
    pub fn code(&self) -> u8 {
        match self {
            FlightStatus::Unknown => 0,
            FlightStatus::OnTime => 10,
            FlightStatus::LateAirline => 20,
            FlightStatus::LateWeather => 30,
            FlightStatus::LateTechnical => 40,
            FlightStatus::LateOther => 50,
        }
    }

    pub fn from_code(code: u8) -> Option<FlightStatus> {
        match code {
            0 => Some(FlightStatus::Unknown),
            10 => Some(FlightStatus::OnTime),
            20 => Some(FlightStatus::LateAirline),
            30 => Some(FlightStatus::LateWeather),
            40 => Some(FlightStatus::LateTechnical),
            50 => Some(FlightStatus::LateOther),
            _ => None,
        }
    }
}

/// Identity of a flight offered for insurance.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FlightKey {
    /// Operating airline account.
    pub airline: AccountId,
    /// Flight designator, e.g. "ND1309".
    pub designator: String,
    /// Scheduled departure (epoch seconds).
    pub departs_at: u64,
}

/// A registered flight and its resolution state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flight {
    pub key: FlightKey,
    pub status: FlightStatus,
}

/// Insertion-ordered flight catalogue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlightDirectory {
    /// Flights by identity.
    pub flights: BTreeMap<FlightKey, Flight>,
    /// Registration order, for index-based enumeration.
    pub order: Vec<FlightKey>,
}

impl FlightDirectory {
    pub fn genesis() -> Self {
        FlightDirectory {
            flights: BTreeMap::new(),
            order: Vec::new(),
        }
    }

    /// Add a flight. The identity tuple must be unused.
    pub fn register_flight(&mut self, key: FlightKey) -> Result<(), DirectoryError> {
        if self.flights.contains_key(&key) {
            return Err(DirectoryError::DuplicateFlight);
        }
        info!(
            "flight registered: {} {}@{}",
            hex::encode(&key.airline),
            key.designator,
            key.departs_at
        );
        self.order.push(key.clone());
        self.flights.insert(
            key.clone(),
            Flight {
                key,
                status: FlightStatus::Unknown,
            },
        );
        Ok(())
    }

    pub fn is_registered(&self, key: &FlightKey) -> bool {
        self.flights.contains_key(key)
    }

    /// Status of a flight, `Unknown` when the key was never registered.
    pub fn status_of(&self, key: &FlightKey) -> FlightStatus {
        self.flights
            .get(key)
            .map(|flight| flight.status)
            .unwrap_or(FlightStatus::Unknown)
    }

    pub fn flight_count(&self) -> usize {
        self.order.len()
    }

    /// Flight by registration order.
    pub fn flight_at(&self, index: usize) -> Option<&Flight> {
        self.order.get(index).and_then(|key| self.flights.get(key))
    }

    /// Record a quorum-resolved status. Crate-internal: only the oracle
    /// resolution path may write here.
    pub(crate) fn set_status(
        &mut self,
        key: &FlightKey,
        status: FlightStatus,
    ) -> Result<(), DirectoryError> {
        let flight = self
            .flights
            .get_mut(key)
            .ok_or(DirectoryError::UnknownFlight)?;
        flight.status = status;
        info!(
            "flight status written: {}@{} -> {:?}",
            key.designator, key.departs_at, status
        );
        Ok(())
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum DirectoryError {
    #[error("Flight already registered")]
    DuplicateFlight,
    #[error("Flight not registered")]
    UnknownFlight,
}
