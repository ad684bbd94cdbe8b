/// MARKETPLACE COORDINATOR
///
/// Owns the four aggregates and is the only writer to any of them. Every
/// operation takes an explicit caller context, checks the operational
/// flag, routes the mutation, and records the observable events in an
/// outbox for the notification layer to drain.

use log::{info, warn};

use crate::airline_registry::{AirlineRegistry, AirlineState, ApprovalOutcome, RegistryError};
use crate::entropy::{EntropySource, OsEntropy};
use crate::events::DomainEvent;
use crate::flight_directory::{DirectoryError, Flight, FlightDirectory, FlightKey, FlightStatus};
use crate::insurance_ledger::{Insurance, InsuranceLedger, LedgerError};
use crate::oracle_engine::{OracleEngine, OracleError, SubmissionOutcome};
use crate::params::{ParamsError, ProtocolParams, ORACLE_INDEX_COUNT};
use crate::AccountId;
use thiserror::Error;

/// Verified identity of the account driving an operation. Construction
/// sits with the transport layer; everything below trusts it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthContext {
    pub caller: AccountId,
}

impl AuthContext {
    pub fn new(caller: AccountId) -> Self {
        AuthContext { caller }
    }
}

#[derive(Debug, Clone)]
pub struct InsuranceMarketplace<E: EntropySource> {
    pub params: ProtocolParams,
    /// Maintenance account allowed to toggle the operational flag.
    pub owner: AccountId,
    pub registry: AirlineRegistry,
    pub directory: FlightDirectory,
    pub ledger: InsuranceLedger,
    pub oracles: OracleEngine,
    operational: bool,
    entropy: E,
    events: Vec<DomainEvent>,
}

impl InsuranceMarketplace<OsEntropy> {
    /// Marketplace under default parameters, drawing from OS entropy.
    pub fn genesis(founder: AccountId, founder_name: String) -> Self {
        Self::assemble(founder, founder_name, ProtocolParams::default(), OsEntropy)
    }
}

impl<E: EntropySource> InsuranceMarketplace<E> {
    /// Marketplace under caller-supplied parameters and entropy.
    pub fn with_params(
        founder: AccountId,
        founder_name: String,
        params: ProtocolParams,
        entropy: E,
    ) -> Result<Self, MarketplaceError> {
        params.validate()?;
        Ok(Self::assemble(founder, founder_name, params, entropy))
    }

    fn assemble(founder: AccountId, founder_name: String, params: ProtocolParams, entropy: E) -> Self {
        info!("marketplace genesis: founder {}", hex::encode(&founder));
        InsuranceMarketplace {
            registry: AirlineRegistry::genesis(founder.clone(), founder_name, params.clone()),
            directory: FlightDirectory::genesis(),
            ledger: InsuranceLedger::genesis(params.clone()),
            oracles: OracleEngine::genesis(params.clone()),
            params,
            owner: founder,
            operational: true,
            entropy,
            events: Vec::new(),
        }
    }

    // ---- consortium governance ----

    pub fn apply_for_registration(
        &mut self,
        ctx: &AuthContext,
        name: &str,
    ) -> Result<(), MarketplaceError> {
        self.ensure_operational()?;
        self.registry
            .apply_for_registration(ctx.caller.clone(), name.to_string())?;
        self.events.push(DomainEvent::AirlineApplied {
            airline: ctx.caller.clone(),
            name: name.to_string(),
        });
        Ok(())
    }

    pub fn approve_registration(
        &mut self,
        ctx: &AuthContext,
        candidate: &AccountId,
    ) -> Result<ApprovalOutcome, MarketplaceError> {
        self.ensure_operational()?;
        let outcome = self.registry.approve_registration(&ctx.caller, candidate)?;
        if outcome == ApprovalOutcome::Promoted {
            self.events.push(DomainEvent::AirlineRegistered {
                airline: candidate.clone(),
            });
        }
        Ok(outcome)
    }

    /// Pay the fixed membership dues. The amount moves into the escrow
    /// pool and the airline gains full participation rights.
    pub fn pay_dues(&mut self, ctx: &AuthContext, amount: u128) -> Result<(), MarketplaceError> {
        self.ensure_operational()?;
        let credited = self.registry.pay_dues(&ctx.caller, amount)?;
        self.ledger.credit_fund(credited);
        self.events.push(DomainEvent::AirlinePaid {
            airline: ctx.caller.clone(),
            amount: credited,
        });
        Ok(())
    }

    // ---- flights and insurance ----

    /// List a flight for insurance purchase. Only a Paid airline may list,
    /// and only under its own identity.
    pub fn register_flight(
        &mut self,
        ctx: &AuthContext,
        designator: &str,
        departs_at: u64,
    ) -> Result<(), MarketplaceError> {
        self.ensure_operational()?;
        if !self.registry.is_paid(&ctx.caller) {
            return Err(MarketplaceError::NotAuthorized);
        }
        let key = FlightKey {
            airline: ctx.caller.clone(),
            designator: designator.to_string(),
            departs_at,
        };
        self.directory.register_flight(key)?;
        Ok(())
    }

    pub fn purchase_insurance(
        &mut self,
        ctx: &AuthContext,
        flight: &FlightKey,
        amount: u128,
    ) -> Result<u128, MarketplaceError> {
        self.ensure_operational()?;
        if !self.directory.is_registered(flight) {
            return Err(DirectoryError::UnknownFlight.into());
        }
        let payout = self
            .ledger
            .purchase_policy(ctx.caller.clone(), flight.clone(), amount)?;
        Ok(payout)
    }

    /// Credit the payout of a policy on a flight resolved LateAirline.
    pub fn claim_insurance(
        &mut self,
        ctx: &AuthContext,
        flight: &FlightKey,
    ) -> Result<u128, MarketplaceError> {
        self.ensure_operational()?;
        let resolved = self.directory.status_of(flight);
        let credited = self.ledger.claim_policy(&ctx.caller, flight, resolved)?;
        Ok(credited)
    }

    /// Move the caller's entire credited balance out of the marketplace.
    pub fn withdraw_balance(&mut self, ctx: &AuthContext) -> Result<u128, MarketplaceError> {
        self.ensure_operational()?;
        let amount = self.ledger.withdraw_balance(&ctx.caller)?;
        Ok(amount)
    }

    // ---- oracle protocol ----

    pub fn register_oracle(
        &mut self,
        ctx: &AuthContext,
        fee: u128,
    ) -> Result<[u8; ORACLE_INDEX_COUNT], MarketplaceError> {
        self.ensure_operational()?;
        let indexes = self
            .oracles
            .register_oracle(ctx.caller.clone(), fee, &mut self.entropy)?;
        Ok(indexes)
    }

    pub fn my_indexes(&self, ctx: &AuthContext) -> Result<[u8; ORACLE_INDEX_COUNT], MarketplaceError> {
        Ok(self.oracles.my_indexes(&ctx.caller)?)
    }

    /// Open (or re-broadcast) a status request for a flight identity. The
    /// flight need not be listed here; resolution then reaches the outbox
    /// but never the directory.
    pub fn fetch_flight_status(
        &mut self,
        ctx: &AuthContext,
        flight: &FlightKey,
    ) -> Result<u8, MarketplaceError> {
        self.ensure_operational()?;
        let index = self
            .oracles
            .open_request(ctx.caller.clone(), flight.clone(), &mut self.entropy)?;
        self.events.push(DomainEvent::OracleRequest {
            index,
            airline: flight.airline.clone(),
            designator: flight.designator.clone(),
            departs_at: flight.departs_at,
        });
        Ok(index)
    }

    pub fn submit_oracle_response(
        &mut self,
        ctx: &AuthContext,
        index: u8,
        flight: &FlightKey,
        status: FlightStatus,
    ) -> Result<SubmissionOutcome, MarketplaceError> {
        self.ensure_operational()?;
        let outcome = self
            .oracles
            .submit_response(&ctx.caller, index, flight, status)?;
        match outcome {
            SubmissionOutcome::AlreadyCounted => {}
            SubmissionOutcome::Recorded => {
                self.events.push(DomainEvent::OracleReport {
                    airline: flight.airline.clone(),
                    designator: flight.designator.clone(),
                    departs_at: flight.departs_at,
                    status,
                });
            }
            SubmissionOutcome::Resolved(resolved) => {
                self.events.push(DomainEvent::OracleReport {
                    airline: flight.airline.clone(),
                    designator: flight.designator.clone(),
                    departs_at: flight.departs_at,
                    status: resolved,
                });
                if self.directory.is_registered(flight) {
                    self.directory.set_status(flight, resolved)?;
                }
                self.events.push(DomainEvent::FlightStatusInfo {
                    airline: flight.airline.clone(),
                    designator: flight.designator.clone(),
                    departs_at: flight.departs_at,
                    status: resolved,
                });
            }
        }
        Ok(outcome)
    }

    // ---- maintenance ----

    /// Pause or resume state-changing operations. Owner only; works while
    /// paused so a pause is always reversible.
    pub fn set_operational(&mut self, ctx: &AuthContext, flag: bool) -> Result<(), MarketplaceError> {
        if ctx.caller != self.owner {
            return Err(MarketplaceError::NotAuthorized);
        }
        if self.operational != flag {
            warn!("operational flag set to {}", flag);
        }
        self.operational = flag;
        Ok(())
    }

    pub fn is_operational(&self) -> bool {
        self.operational
    }

    fn ensure_operational(&self) -> Result<(), MarketplaceError> {
        if !self.operational {
            return Err(MarketplaceError::OperationsPaused);
        }
        Ok(())
    }

    // ---- reads ----

    pub fn airline_state(&self, account: &AccountId) -> Option<AirlineState> {
        self.registry.airline_state(account)
    }

    pub fn airline_count(&self) -> usize {
        self.registry.airline_count()
    }

    pub fn paid_airline_count(&self) -> usize {
        self.registry.paid_airline_count()
    }

    pub fn approval_count(&self, candidate: &AccountId) -> usize {
        self.registry.approval_count(candidate)
    }

    pub fn flight_count(&self) -> usize {
        self.directory.flight_count()
    }

    pub fn flight_at(&self, index: usize) -> Option<&Flight> {
        self.directory.flight_at(index)
    }

    pub fn flight_status(&self, flight: &FlightKey) -> FlightStatus {
        self.directory.status_of(flight)
    }

    pub fn insurance_of(&self, passenger: &AccountId, flight: &FlightKey) -> Option<Insurance> {
        self.ledger.insurance_of(passenger, flight).cloned()
    }

    pub fn balance_of(&self, passenger: &AccountId) -> u128 {
        self.ledger.balance_of(passenger)
    }

    pub fn fund_balance(&self) -> u128 {
        self.ledger.fund_balance()
    }

    /// Escrow must cover every Active payout.
    pub fn verify_solvency(&self) -> Result<(), MarketplaceError> {
        self.ledger.verify_solvency()?;
        Ok(())
    }

    /// Hand the accumulated events to the notification layer and clear
    /// the outbox.
    pub fn drain_events(&mut self) -> Vec<DomainEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn pending_events(&self) -> &[DomainEvent] {
        &self.events
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum MarketplaceError {
    #[error("Operations are paused")]
    OperationsPaused,
    #[error("Caller is not authorized for this operation")]
    NotAuthorized,
    #[error("Parameter error: {0}")]
    Params(#[from] ParamsError),
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),
    #[error("Directory error: {0}")]
    Directory(#[from] DirectoryError),
    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),
    #[error("Oracle error: {0}")]
    Oracle(#[from] OracleError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entropy::SequenceEntropy;
    use crate::oracle_engine::Oracle;
    use crate::params::UNIT;

    fn account(tag: u8) -> AccountId {
        vec![tag; 4]
    }

    fn market() -> InsuranceMarketplace<SequenceEntropy> {
        InsuranceMarketplace::with_params(
            account(1),
            "Aurora Air".to_string(),
            ProtocolParams::default(),
            SequenceEntropy::new((0..64).collect()),
        )
        .unwrap()
    }

    #[test]
    fn test_genesis_state() {
        let market = market();
        assert!(market.is_operational());
        assert_eq!(market.airline_state(&account(1)), Some(AirlineState::Paid));
        assert_eq!(market.paid_airline_count(), 1);
        assert_eq!(market.fund_balance(), 0);
        assert!(market.pending_events().is_empty());
    }

    #[test]
    fn test_invalid_params_rejected() {
        let mut params = ProtocolParams::default();
        params.oracle_quorum = 0;
        let result = InsuranceMarketplace::with_params(
            account(1),
            "Aurora Air".to_string(),
            params,
            SequenceEntropy::new(vec![0]),
        );
        assert!(matches!(result, Err(MarketplaceError::Params(_))));
    }

    #[test]
    fn test_pause_gates_mutations_not_reads() {
        let mut market = market();
        let owner = AuthContext::new(account(1));
        let stranger = AuthContext::new(account(9));

        assert_eq!(
            market.set_operational(&stranger, false),
            Err(MarketplaceError::NotAuthorized)
        );
        market.set_operational(&owner, false).unwrap();
        assert!(!market.is_operational());

        assert_eq!(
            market.apply_for_registration(&stranger, "Borealis"),
            Err(MarketplaceError::OperationsPaused)
        );
        assert_eq!(
            market.withdraw_balance(&stranger),
            Err(MarketplaceError::OperationsPaused)
        );
        // Reads stay available while paused.
        assert_eq!(market.airline_count(), 1);
        assert_eq!(market.fund_balance(), 0);

        // The toggle itself must keep working, or the pause is permanent.
        market.set_operational(&owner, true).unwrap();
        assert!(market.is_operational());
        market.apply_for_registration(&stranger, "Borealis").unwrap();
    }

    #[test]
    fn test_dues_flow_into_escrow() {
        let mut market = market();
        let founder = AuthContext::new(account(1));
        let newcomer = AuthContext::new(account(2));

        market
            .apply_for_registration(&newcomer, "Borealis")
            .unwrap();
        market
            .approve_registration(&founder, &account(2))
            .unwrap();
        market
            .pay_dues(&newcomer, market.params.airline_dues)
            .unwrap();

        assert_eq!(market.fund_balance(), 10 * UNIT);
        assert_eq!(market.airline_state(&account(2)), Some(AirlineState::Paid));

        let events = market.drain_events();
        assert_eq!(
            events,
            vec![
                DomainEvent::AirlineApplied {
                    airline: account(2),
                    name: "Borealis".to_string(),
                },
                DomainEvent::AirlineRegistered {
                    airline: account(2),
                },
                DomainEvent::AirlinePaid {
                    airline: account(2),
                    amount: 10 * UNIT,
                },
            ]
        );
        assert!(market.pending_events().is_empty());
    }

    #[test]
    fn test_flight_listing_requires_paid_membership() {
        let mut market = market();
        let founder = AuthContext::new(account(1));
        let applicant = AuthContext::new(account(2));

        market
            .apply_for_registration(&applicant, "Borealis")
            .unwrap();
        assert_eq!(
            market.register_flight(&applicant, "BA2490", 1700000000),
            Err(MarketplaceError::NotAuthorized)
        );

        market.register_flight(&founder, "AA101", 1700000000).unwrap();
        assert_eq!(market.flight_count(), 1);
        let listed = market.flight_at(0).unwrap();
        assert_eq!(listed.key.airline, account(1));
        assert_eq!(listed.status, FlightStatus::Unknown);
    }

    #[test]
    fn test_insurance_requires_listed_flight() {
        let mut market = market();
        let passenger = AuthContext::new(account(7));
        let ghost = FlightKey {
            airline: account(1),
            designator: "ZZ999".to_string(),
            departs_at: 1,
        };
        assert_eq!(
            market.purchase_insurance(&passenger, &ghost, UNIT),
            Err(MarketplaceError::Directory(DirectoryError::UnknownFlight))
        );
    }

    #[test]
    fn test_probe_of_unlisted_flight_resolves_without_directory_write() {
        let mut market = market();
        let watcher = AuthContext::new(account(7));
        let foreign = FlightKey {
            airline: account(8),
            designator: "XX123".to_string(),
            departs_at: 1700000000,
        };

        let index = market.fetch_flight_status(&watcher, &foreign).unwrap();

        // Plant quorum-many oracles holding the drawn index.
        for tag in 10..13u8 {
            market.oracles.oracles.insert(
                account(tag),
                Oracle {
                    account: account(tag),
                    indexes: [index; ORACLE_INDEX_COUNT],
                    fee_paid: UNIT,
                },
            );
        }
        for tag in 10..13u8 {
            market
                .submit_oracle_response(
                    &AuthContext::new(account(tag)),
                    index,
                    &foreign,
                    FlightStatus::LateWeather,
                )
                .unwrap();
        }

        assert_eq!(market.flight_count(), 0);
        assert_eq!(market.flight_status(&foreign), FlightStatus::Unknown);
        let events = market.drain_events();
        assert!(events.contains(&DomainEvent::FlightStatusInfo {
            airline: account(8),
            designator: "XX123".to_string(),
            departs_at: 1700000000,
            status: FlightStatus::LateWeather,
        }));
    }
}
