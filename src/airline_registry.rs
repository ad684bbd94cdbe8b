/// AIRLINE REGISTRY
///
/// Admission state machine for the consortium. A candidate applies, sitting
/// airlines vote, and the approval quorum tightens once the paid membership
/// reaches the multiparty threshold. Paying dues is what turns membership
/// into underwriting capital.

use log::info;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

use crate::params::ProtocolParams;
use crate::AccountId;

/// Admission lifecycle. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AirlineState {
    Applied,
    Registered,
    Paid,
}

/// One consortium member or applicant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Airline {
    pub account: AccountId,
    pub name: String,
    pub state: AirlineState,
    /// Dues credited to the escrow pool when the airline became Paid.
    pub dues_paid: u128,
}

/// Votes collected for one Applied candidate. A voter counts once.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalSet {
    pub approvers: BTreeSet<AccountId>,
}

impl ApprovalSet {
    pub fn count(&self) -> usize {
        self.approvers.len()
    }
}

/// Outcome of a recorded approval vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalOutcome {
    /// Quorum reached; the candidate is now Registered.
    Promoted,
    /// Vote recorded (or repeated); quorum not yet reached.
    Recorded { approvals: usize, required: usize },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AirlineRegistry {
    pub params: ProtocolParams,
    pub airlines: BTreeMap<AccountId, Airline>,
    /// Approval sets per candidate, kept as audit data after promotion.
    pub approvals: BTreeMap<AccountId, ApprovalSet>,
}

impl AirlineRegistry {
    /// Seed the consortium with its founding airline, directly Paid.
    pub fn genesis(founder: AccountId, founder_name: String, params: ProtocolParams) -> Self {
        let mut airlines = BTreeMap::new();
        airlines.insert(
            founder.clone(),
            Airline {
                account: founder.clone(),
                name: founder_name,
                state: AirlineState::Paid,
                dues_paid: 0,
            },
        );
        info!("consortium founded by {}", hex::encode(&founder));
        AirlineRegistry {
            params,
            airlines,
            approvals: BTreeMap::new(),
        }
    }

    /// Create an Applied record for a new account.
    pub fn apply_for_registration(
        &mut self,
        applicant: AccountId,
        name: String,
    ) -> Result<(), RegistryError> {
        if self.airlines.contains_key(&applicant) {
            return Err(RegistryError::DuplicateApplication);
        }
        info!("airline applied: {} ({})", name, hex::encode(&applicant));
        self.airlines.insert(
            applicant.clone(),
            Airline {
                account: applicant.clone(),
                name,
                state: AirlineState::Applied,
                dues_paid: 0,
            },
        );
        self.approvals.insert(applicant, ApprovalSet::default());
        Ok(())
    }

    /// Record `approver`'s vote for `candidate`. Voting twice is a
    /// successful no-op; promotion happens the moment the quorum holds.
    pub fn approve_registration(
        &mut self,
        approver: &AccountId,
        candidate: &AccountId,
    ) -> Result<ApprovalOutcome, RegistryError> {
        match self.airlines.get(approver).map(|airline| airline.state) {
            Some(AirlineState::Registered) | Some(AirlineState::Paid) => {}
            _ => return Err(RegistryError::NotAuthorized),
        }
        match self.airlines.get(candidate).map(|airline| airline.state) {
            Some(AirlineState::Applied) => {}
            _ => return Err(RegistryError::InvalidState),
        }

        let votes = self.approvals.entry(candidate.clone()).or_default();
        votes.approvers.insert(approver.clone());
        let approvals = votes.approvers.len();
        let required = self.required_approvals();

        if approvals >= required {
            if let Some(airline) = self.airlines.get_mut(candidate) {
                airline.state = AirlineState::Registered;
            }
            info!(
                "airline registered: {} ({} of {} approvals)",
                hex::encode(candidate),
                approvals,
                required
            );
            return Ok(ApprovalOutcome::Promoted);
        }
        Ok(ApprovalOutcome::Recorded {
            approvals,
            required,
        })
    }

    /// Approvals needed for promotion under the current paid membership:
    /// one vote while the membership is small, half of it (rounded down)
    /// from the multiparty threshold on.
    pub fn required_approvals(&self) -> usize {
        let paid = self.paid_airline_count();
        if paid < self.params.multiparty_threshold {
            1
        } else {
            paid / 2
        }
    }

    /// Pay the fixed dues and become Paid. Returns the amount to credit to
    /// the escrow pool.
    pub fn pay_dues(&mut self, payer: &AccountId, amount: u128) -> Result<u128, RegistryError> {
        let airline = self
            .airlines
            .get_mut(payer)
            .ok_or(RegistryError::NotAuthorized)?;
        if airline.state != AirlineState::Registered {
            return Err(RegistryError::InvalidState);
        }
        if amount != self.params.airline_dues {
            return Err(RegistryError::WrongDuesAmount);
        }
        airline.state = AirlineState::Paid;
        airline.dues_paid = amount;
        info!("airline paid dues: {} ({} units)", airline.name, amount);
        Ok(amount)
    }

    pub fn airline_state(&self, account: &AccountId) -> Option<AirlineState> {
        self.airlines.get(account).map(|airline| airline.state)
    }

    pub fn is_paid(&self, account: &AccountId) -> bool {
        self.airline_state(account) == Some(AirlineState::Paid)
    }

    pub fn airline_count(&self) -> usize {
        self.airlines.len()
    }

    pub fn paid_airline_count(&self) -> usize {
        self.airlines
            .values()
            .filter(|airline| airline.state == AirlineState::Paid)
            .count()
    }

    pub fn approval_count(&self, candidate: &AccountId) -> usize {
        self.approvals
            .get(candidate)
            .map(|votes| votes.count())
            .unwrap_or(0)
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum RegistryError {
    #[error("Account already has an airline record")]
    DuplicateApplication,
    #[error("Caller is not an admitted airline")]
    NotAuthorized,
    #[error("Airline is not in the required lifecycle state")]
    InvalidState,
    #[error("Dues payment must match the fixed amount")]
    WrongDuesAmount,
}
