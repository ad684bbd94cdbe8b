/// PROTOCOL PARAMETERS
///
/// Every knob that governs marketplace behavior lives here so a test can
/// tighten or loosen it. Money is denominated in the smallest unit of the
/// settlement substrate (10^18 per whole unit).

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Smallest-denomination scaling for one whole unit of value.
pub const UNIT: u128 = 10u128.pow(18);

/// Indexes assigned to every oracle at registration.
pub const ORACLE_INDEX_COUNT: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolParams {
    /// Dues a Registered airline pays to become Paid.
    pub airline_dues: u128,
    /// Paid-airline count at which 50% approval voting takes over.
    pub multiparty_threshold: usize,
    /// Largest premium a passenger may pay for one policy.
    pub max_insurance_premium: u128,
    /// Payout bonus divider (payout = premium + premium / divider).
    pub insurance_payout_divider: u128,
    /// Exact fee an oracle pays to register.
    pub oracle_registration_fee: u128,
    /// Matching responses required to resolve a status request.
    pub oracle_quorum: usize,
    /// Oracle indexes are drawn from [0, oracle_index_space).
    pub oracle_index_space: u8,
}

impl Default for ProtocolParams {
    fn default() -> Self {
        ProtocolParams {
            airline_dues: 10 * UNIT,
            multiparty_threshold: 5,
            max_insurance_premium: UNIT,
            insurance_payout_divider: 2,
            oracle_registration_fee: UNIT,
            oracle_quorum: 3,
            oracle_index_space: 10,
        }
    }
}

impl ProtocolParams {
    /// Reject configurations that would stall the protocol or divide by
    /// zero.
    pub fn validate(&self) -> Result<(), ParamsError> {
        if self.airline_dues == 0 {
            return Err(ParamsError::ZeroParameter("airline_dues"));
        }
        if self.multiparty_threshold == 0 {
            return Err(ParamsError::ZeroParameter("multiparty_threshold"));
        }
        if self.max_insurance_premium == 0 {
            return Err(ParamsError::ZeroParameter("max_insurance_premium"));
        }
        if self.insurance_payout_divider == 0 {
            return Err(ParamsError::ZeroParameter("insurance_payout_divider"));
        }
        if self.oracle_registration_fee == 0 {
            return Err(ParamsError::ZeroParameter("oracle_registration_fee"));
        }
        if self.oracle_quorum == 0 {
            return Err(ParamsError::ZeroParameter("oracle_quorum"));
        }
        if self.oracle_index_space == 0 {
            return Err(ParamsError::ZeroParameter("oracle_index_space"));
        }
        Ok(())
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ParamsError {
    #[error("Protocol parameter must be non-zero: {0}")]
    ZeroParameter(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_params_validate() {
        assert!(ProtocolParams::default().validate().is_ok());
    }

    #[test]
    fn test_zero_quorum_rejected() {
        let mut params = ProtocolParams::default();
        params.oracle_quorum = 0;
        assert_eq!(
            params.validate(),
            Err(ParamsError::ZeroParameter("oracle_quorum"))
        );
    }

    #[test]
    fn test_zero_divider_rejected() {
        let mut params = ProtocolParams::default();
        params.insurance_payout_divider = 0;
        assert!(params.validate().is_err());
    }

    #[test]
    fn test_whole_unit_scaling() {
        let params = ProtocolParams::default();
        assert_eq!(params.airline_dues, 10 * UNIT);
        assert_eq!(params.max_insurance_premium, UNIT);
    }
}
