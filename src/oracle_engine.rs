/// ORACLE CONSENSUS ENGINE
///
/// Flight status is attested by self-selected reporters. Registration
/// assigns each oracle three indexes from a small space; a status request
/// draws its own index and only index-holders may answer it. The first
/// status bucket to reach the quorum closes the request for good.

use log::info;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

use crate::entropy::EntropySource;
use crate::flight_directory::{FlightKey, FlightStatus};
use crate::params::{ProtocolParams, ORACLE_INDEX_COUNT};
use crate::AccountId;

/// A registered status reporter and its assigned index group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Oracle {
    pub account: AccountId,
    /// Draws from [0, index space). Duplicates are kept as drawn.
    pub indexes: [u8; ORACLE_INDEX_COUNT],
    pub fee_paid: u128,
}

impl Oracle {
    pub fn holds_index(&self, index: u8) -> bool {
        self.indexes.contains(&index)
    }
}

/// Identity of one status request.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RequestKey {
    pub index: u8,
    pub flight: FlightKey,
}

/// Responses collected for one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OracleRequest {
    pub key: RequestKey,
    pub requester: AccountId,
    /// Responder sets bucketed by reported status.
    pub responses: BTreeMap<FlightStatus, BTreeSet<AccountId>>,
    /// Every account already counted for this request.
    pub responders: BTreeSet<AccountId>,
    pub is_open: bool,
}

/// What a submitted response did to its request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionOutcome {
    /// Counted; quorum not yet reached.
    Recorded,
    /// Counted and the bucket reached quorum; the request is now closed.
    Resolved(FlightStatus),
    /// Responder already counted for this request; nothing changed.
    AlreadyCounted,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OracleEngine {
    pub params: ProtocolParams,
    pub oracles: BTreeMap<AccountId, Oracle>,
    pub requests: BTreeMap<RequestKey, OracleRequest>,
    /// Monotonic counter feeding every index derivation.
    pub draw_nonce: u64,
}

impl OracleEngine {
    pub fn genesis(params: ProtocolParams) -> Self {
        OracleEngine {
            params,
            oracles: BTreeMap::new(),
            requests: BTreeMap::new(),
            draw_nonce: 0,
        }
    }

    /// Register the caller as an oracle against the exact fee.
    /// Re-registration pays again and redraws the index group.
    pub fn register_oracle(
        &mut self,
        account: AccountId,
        fee: u128,
        entropy: &mut dyn EntropySource,
    ) -> Result<[u8; ORACLE_INDEX_COUNT], OracleError> {
        if fee != self.params.oracle_registration_fee {
            return Err(OracleError::WrongFee);
        }
        let indexes = self.draw_indexes(&account, entropy);
        info!(
            "oracle registered: {} indexes {:?}",
            hex::encode(&account),
            indexes
        );
        self.oracles.insert(
            account.clone(),
            Oracle {
                account,
                indexes,
                fee_paid: fee,
            },
        );
        Ok(indexes)
    }

    pub fn my_indexes(&self, account: &AccountId) -> Result<[u8; ORACLE_INDEX_COUNT], OracleError> {
        self.oracles
            .get(account)
            .map(|oracle| oracle.indexes)
            .ok_or(OracleError::NotAuthorized)
    }

    pub fn is_registered(&self, account: &AccountId) -> bool {
        self.oracles.contains_key(account)
    }

    pub fn oracle_count(&self) -> usize {
        self.oracles.len()
    }

    /// Open a status request for a flight identity, or re-broadcast a live
    /// one. The request index is an independent draw from the same family
    /// as oracle assignment.
    pub fn open_request(
        &mut self,
        requester: AccountId,
        flight: FlightKey,
        entropy: &mut dyn EntropySource,
    ) -> Result<u8, OracleError> {
        let index = self.draw_index(&requester, entropy);
        let key = RequestKey { index, flight };
        if let Some(existing) = self.requests.get(&key) {
            if !existing.is_open {
                return Err(OracleError::RequestClosed);
            }
            // Re-broadcast of a live request; collected responses stay.
            return Ok(index);
        }
        info!(
            "status request opened: {}@{} index {}",
            key.flight.designator, key.flight.departs_at, index
        );
        self.requests.insert(
            key.clone(),
            OracleRequest {
                key,
                requester,
                responses: BTreeMap::new(),
                responders: BTreeSet::new(),
                is_open: true,
            },
        );
        Ok(index)
    }

    /// Record an oracle's status report. The first bucket to reach the
    /// quorum closes the request; reports after closure are rejected, a
    /// repeated report on a live request is ignored.
    pub fn submit_response(
        &mut self,
        responder: &AccountId,
        index: u8,
        flight: &FlightKey,
        status: FlightStatus,
    ) -> Result<SubmissionOutcome, OracleError> {
        let oracle = self
            .oracles
            .get(responder)
            .ok_or(OracleError::NotAuthorized)?;
        if !oracle.holds_index(index) {
            return Err(OracleError::IndexMismatch);
        }

        let quorum = self.params.oracle_quorum;
        let key = RequestKey {
            index,
            flight: flight.clone(),
        };
        let request = self
            .requests
            .get_mut(&key)
            .ok_or(OracleError::RequestClosed)?;
        if !request.is_open {
            return Err(OracleError::RequestClosed);
        }
        if !request.responders.insert(responder.clone()) {
            return Ok(SubmissionOutcome::AlreadyCounted);
        }

        let bucket = request.responses.entry(status).or_default();
        bucket.insert(responder.clone());
        if bucket.len() >= quorum {
            request.is_open = false;
            info!(
                "status request resolved: {}@{} -> {:?}",
                key.flight.designator, key.flight.departs_at, status
            );
            return Ok(SubmissionOutcome::Resolved(status));
        }
        Ok(SubmissionOutcome::Recorded)
    }

    pub fn request_of(&self, index: u8, flight: &FlightKey) -> Option<&OracleRequest> {
        self.requests.get(&RequestKey {
            index,
            flight: flight.clone(),
        })
    }

    /// One derivation family for every draw: the low byte of
    /// Sha256(account, nonce, salt) reduced into the index space.
    fn draw_index(&mut self, account: &AccountId, entropy: &mut dyn EntropySource) -> u8 {
        let salt = entropy.next_salt();
        let nonce = self.draw_nonce;
        self.draw_nonce = self.draw_nonce.wrapping_add(1);

        let mut hasher = Sha256::new();
        hasher.update(account.as_slice());
        hasher.update(nonce.to_le_bytes());
        hasher.update(salt.to_le_bytes());
        let digest = hasher.finalize();
        digest[0] % self.params.oracle_index_space
    }

    fn draw_indexes(
        &mut self,
        account: &AccountId,
        entropy: &mut dyn EntropySource,
    ) -> [u8; ORACLE_INDEX_COUNT] {
        let mut indexes = [0u8; ORACLE_INDEX_COUNT];
        for slot in indexes.iter_mut() {
            *slot = self.draw_index(account, entropy);
        }
        indexes
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum OracleError {
    #[error("Registration fee must match the fixed amount")]
    WrongFee,
    #[error("Caller is not a registered oracle")]
    NotAuthorized,
    #[error("Oracle does not hold the request index")]
    IndexMismatch,
    #[error("Request is closed or was never opened")]
    RequestClosed,
}
