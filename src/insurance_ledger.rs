/// INSURANCE LEDGER
///
/// Escrowed policy accounting. Premiums and airline dues pool into a single
/// escrow balance; a payout moves value from the pool into a passenger's
/// withdrawable balance exactly once per policy. Policies are kept after
/// settlement as audit records.

use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::flight_directory::{FlightKey, FlightStatus};
use crate::params::ProtocolParams;
use crate::AccountId;

/// Settlement lifecycle of one policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PolicyState {
    Active,
    PaidOut,
}

/// One passenger's cover on one flight.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Insurance {
    pub passenger: AccountId,
    pub flight: FlightKey,
    pub amount_paid: u128,
    /// Fixed at purchase: amount_paid + amount_paid / payout divider.
    pub payout_amount: u128,
    pub state: PolicyState,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsuranceLedger {
    pub params: ProtocolParams,
    /// Policies keyed by (flight, passenger).
    pub policies: BTreeMap<(FlightKey, AccountId), Insurance>,
    /// Pooled escrow backing payouts.
    pub escrow_balance: u128,
    /// Withdrawable credits per passenger.
    pub passenger_balances: BTreeMap<AccountId, u128>,
}

impl InsuranceLedger {
    pub fn genesis(params: ProtocolParams) -> Self {
        InsuranceLedger {
            params,
            policies: BTreeMap::new(),
            escrow_balance: 0,
            passenger_balances: BTreeMap::new(),
        }
    }

    /// Credit pool funding (airline dues) to the escrow.
    pub fn credit_fund(&mut self, amount: u128) {
        self.escrow_balance = self.escrow_balance.saturating_add(amount);
    }

    /// Issue an Active policy. The premium joins the escrow pool; the
    /// payout is fixed here and never recomputed.
    pub fn purchase_policy(
        &mut self,
        passenger: AccountId,
        flight: FlightKey,
        amount: u128,
    ) -> Result<u128, LedgerError> {
        if amount == 0 || amount > self.params.max_insurance_premium {
            return Err(LedgerError::AmountOutOfRange);
        }
        let key = (flight.clone(), passenger.clone());
        if self.policies.contains_key(&key) {
            return Err(LedgerError::DuplicatePolicy);
        }

        let payout_amount = amount.saturating_add(amount / self.params.insurance_payout_divider);
        info!(
            "policy purchased: {} covers {}@{} for {} (payout {})",
            hex::encode(&passenger),
            flight.designator,
            flight.departs_at,
            amount,
            payout_amount
        );
        self.policies.insert(
            key,
            Insurance {
                passenger,
                flight,
                amount_paid: amount,
                payout_amount,
                state: PolicyState::Active,
            },
        );
        self.escrow_balance = self.escrow_balance.saturating_add(amount);
        Ok(payout_amount)
    }

    /// Settle a policy. `resolved` is the status the directory currently
    /// holds for the policy's flight; only LateAirline pays.
    pub fn claim_policy(
        &mut self,
        passenger: &AccountId,
        flight: &FlightKey,
        resolved: FlightStatus,
    ) -> Result<u128, LedgerError> {
        let key = (flight.clone(), passenger.clone());
        let policy = self.policies.get_mut(&key).ok_or(LedgerError::NotClaimable)?;
        if policy.state == PolicyState::PaidOut {
            return Err(LedgerError::AlreadyPaidOut);
        }
        if resolved != FlightStatus::LateAirline {
            return Err(LedgerError::NotClaimable);
        }

        let payout = policy.payout_amount;
        let remaining = match self.escrow_balance.checked_sub(payout) {
            Some(remaining) => remaining,
            None => {
                warn!("escrow pool cannot cover payout of {}", payout);
                return Err(LedgerError::EscrowShortfall);
            }
        };

        policy.state = PolicyState::PaidOut;
        self.escrow_balance = remaining;
        let balance = self.passenger_balances.entry(passenger.clone()).or_insert(0);
        *balance = balance.saturating_add(payout);
        info!(
            "policy paid out: {} credited {}",
            hex::encode(passenger),
            payout
        );
        Ok(payout)
    }

    /// Withdraw the full balance. Bookkeeping is zeroed before the amount
    /// is released to the caller.
    pub fn withdraw_balance(&mut self, passenger: &AccountId) -> Result<u128, LedgerError> {
        let balance = self
            .passenger_balances
            .get_mut(passenger)
            .ok_or(LedgerError::NoBalance)?;
        if *balance == 0 {
            return Err(LedgerError::NoBalance);
        }
        let amount = std::mem::take(balance);
        info!(
            "balance withdrawn: {} takes {}",
            hex::encode(passenger),
            amount
        );
        Ok(amount)
    }

    pub fn insurance_of(&self, passenger: &AccountId, flight: &FlightKey) -> Option<&Insurance> {
        self.policies.get(&(flight.clone(), passenger.clone()))
    }

    pub fn balance_of(&self, passenger: &AccountId) -> u128 {
        self.passenger_balances.get(passenger).copied().unwrap_or(0)
    }

    pub fn fund_balance(&self) -> u128 {
        self.escrow_balance
    }

    /// Total payout exposure across Active policies.
    pub fn outstanding_payouts(&self) -> u128 {
        self.policies
            .values()
            .filter(|policy| policy.state == PolicyState::Active)
            .map(|policy| policy.payout_amount)
            .fold(0u128, |total, payout| total.saturating_add(payout))
    }

    /// The pool is solvent while outstanding exposure fits in escrow.
    pub fn verify_solvency(&self) -> Result<(), LedgerError> {
        if self.outstanding_payouts() > self.escrow_balance {
            return Err(LedgerError::EscrowShortfall);
        }
        Ok(())
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum LedgerError {
    #[error("Premium must be positive and at most the cap")]
    AmountOutOfRange,
    #[error("Passenger already holds a policy for this flight")]
    DuplicatePolicy,
    #[error("Policy is not claimable for this flight outcome")]
    NotClaimable,
    #[error("Policy was already paid out")]
    AlreadyPaidOut,
    #[error("No withdrawable balance")]
    NoBalance,
    #[error("Escrow pool cannot cover the payout")]
    EscrowShortfall,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::UNIT;

    fn flight() -> FlightKey {
        FlightKey {
            airline: vec![0xF0],
            designator: "ND1309".to_string(),
            departs_at: 1700000000,
        }
    }

    fn passenger() -> AccountId {
        vec![0x70]
    }

    fn ledger() -> InsuranceLedger {
        InsuranceLedger::genesis(ProtocolParams::default())
    }

    #[test]
    fn test_payout_fixed_at_purchase() {
        let mut ledger = ledger();
        let payout = ledger
            .purchase_policy(passenger(), flight(), UNIT)
            .unwrap();
        assert_eq!(payout, UNIT + UNIT / 2);

        let policy = ledger.insurance_of(&passenger(), &flight()).unwrap();
        assert_eq!(policy.amount_paid, UNIT);
        assert_eq!(policy.payout_amount, UNIT + UNIT / 2);
        assert_eq!(policy.state, PolicyState::Active);
        assert_eq!(ledger.fund_balance(), UNIT);
    }

    #[test]
    fn test_premium_bounds() {
        let mut ledger = ledger();
        assert_eq!(
            ledger.purchase_policy(passenger(), flight(), 0),
            Err(LedgerError::AmountOutOfRange)
        );
        assert_eq!(
            ledger.purchase_policy(passenger(), flight(), UNIT + 1),
            Err(LedgerError::AmountOutOfRange)
        );
        assert_eq!(ledger.fund_balance(), 0);
    }

    #[test]
    fn test_one_policy_per_passenger_per_flight() {
        let mut ledger = ledger();
        ledger
            .purchase_policy(passenger(), flight(), UNIT / 2)
            .unwrap();
        assert_eq!(
            ledger.purchase_policy(passenger(), flight(), UNIT / 4),
            Err(LedgerError::DuplicatePolicy)
        );

        // A different passenger on the same flight is fine.
        ledger
            .purchase_policy(vec![0x71], flight(), UNIT / 4)
            .unwrap();
    }

    #[test]
    fn test_claim_pays_exactly_once() {
        let mut ledger = ledger();
        ledger.credit_fund(10 * UNIT);
        ledger
            .purchase_policy(passenger(), flight(), UNIT)
            .unwrap();
        let escrow_before = ledger.fund_balance();

        let payout = ledger
            .claim_policy(&passenger(), &flight(), FlightStatus::LateAirline)
            .unwrap();
        assert_eq!(payout, UNIT + UNIT / 2);
        assert_eq!(ledger.balance_of(&passenger()), payout);
        assert_eq!(ledger.fund_balance(), escrow_before - payout);

        assert_eq!(
            ledger.claim_policy(&passenger(), &flight(), FlightStatus::LateAirline),
            Err(LedgerError::AlreadyPaidOut)
        );
        assert_eq!(ledger.balance_of(&passenger()), payout);
    }

    #[test]
    fn test_only_late_airline_pays() {
        let mut ledger = ledger();
        ledger.credit_fund(10 * UNIT);
        ledger
            .purchase_policy(passenger(), flight(), UNIT)
            .unwrap();

        for status in [
            FlightStatus::Unknown,
            FlightStatus::OnTime,
            FlightStatus::LateWeather,
            FlightStatus::LateTechnical,
            FlightStatus::LateOther,
        ] {
            assert_eq!(
                ledger.claim_policy(&passenger(), &flight(), status),
                Err(LedgerError::NotClaimable)
            );
        }
        // Still Active afterwards.
        assert_eq!(
            ledger.insurance_of(&passenger(), &flight()).unwrap().state,
            PolicyState::Active
        );
    }

    #[test]
    fn test_claim_without_policy_rejected() {
        let mut ledger = ledger();
        assert_eq!(
            ledger.claim_policy(&passenger(), &flight(), FlightStatus::LateAirline),
            Err(LedgerError::NotClaimable)
        );
    }

    #[test]
    fn test_underfunded_pool_cannot_settle() {
        let mut ledger = ledger();
        // The premium alone leaves the pool short of the 1.5x payout.
        ledger
            .purchase_policy(passenger(), flight(), UNIT)
            .unwrap();
        assert_eq!(
            ledger.claim_policy(&passenger(), &flight(), FlightStatus::LateAirline),
            Err(LedgerError::EscrowShortfall)
        );
        // The failed claim left the policy Active and the pool untouched.
        assert_eq!(
            ledger.insurance_of(&passenger(), &flight()).unwrap().state,
            PolicyState::Active
        );
        assert_eq!(ledger.fund_balance(), UNIT);
    }

    #[test]
    fn test_withdrawal_zeroes_balance_first() {
        let mut ledger = ledger();
        ledger.credit_fund(10 * UNIT);
        ledger
            .purchase_policy(passenger(), flight(), UNIT)
            .unwrap();
        ledger
            .claim_policy(&passenger(), &flight(), FlightStatus::LateAirline)
            .unwrap();

        let amount = ledger.withdraw_balance(&passenger()).unwrap();
        assert_eq!(amount, UNIT + UNIT / 2);
        assert_eq!(ledger.balance_of(&passenger()), 0);
        assert_eq!(
            ledger.withdraw_balance(&passenger()),
            Err(LedgerError::NoBalance)
        );
    }

    #[test]
    fn test_withdrawal_without_credit_rejected() {
        let mut ledger = ledger();
        assert_eq!(
            ledger.withdraw_balance(&passenger()),
            Err(LedgerError::NoBalance)
        );
    }

    #[test]
    fn test_solvency_tracks_outstanding_exposure() {
        let mut ledger = ledger();
        assert!(ledger.verify_solvency().is_ok());

        // A bare premium cannot back its own 1.5x payout.
        ledger
            .purchase_policy(passenger(), flight(), UNIT)
            .unwrap();
        assert_eq!(
            ledger.verify_solvency(),
            Err(LedgerError::EscrowShortfall)
        );

        // Dues funding restores solvency.
        ledger.credit_fund(10 * UNIT);
        assert!(ledger.verify_solvency().is_ok());
        assert_eq!(ledger.outstanding_payouts(), UNIT + UNIT / 2);
    }
}
