// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use crate::handle::{handle_index, handle_type};
use crate::parse::parse_plaintext;
use crate::service::{ConfidentialService, EncryptRequest, ServiceError};
use crate::{FheType, Handle};
use alloy::primitives::{Address, Bytes, U256};
use std::sync::Arc;
use thiserror::Error as ThisError;
use tracing::{debug, instrument, warn};

/// Most values a single encrypted input can carry
pub const MAX_INPUT_VALUES: usize = 255;
/// Most plaintext bits a single encrypted input can carry
pub const MAX_INPUT_BITS: usize = 2048;

#[derive(ThisError, Debug, Clone, PartialEq, Eq)]
pub enum InputError {
    #[error("Encrypted input: value {value} is out of range for {ty}")]
    ValueOutOfRange { value: String, ty: FheType },
    #[error("Encrypted input: `{0}` is not a number")]
    InvalidNumber(String),
    #[error("Encrypted input: adding a {ty} would exceed {MAX_INPUT_VALUES} values or {MAX_INPUT_BITS} bits")]
    CapacityExceeded { ty: FheType },
    #[error("Encrypted input has already been finalized")]
    AlreadyFinalized,
    #[error("Encrypted input has no values to encrypt")]
    Empty,
    #[error("Encrypted input: encryption failed: {0}")]
    EncryptionService(#[from] ServiceError),
}

/// Handles plus the validity proof covering them, ready to pass as contract call arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedPayload {
    pub handles: Vec<Handle>,
    pub input_proof: Bytes,
}

/// Builder session for one encrypted input, bound to a destination contract and the account that
/// will submit it.
///
/// Values are encrypted in the order they are added; the resulting handles follow the same order,
/// which must match the argument order the destination contract expects.
pub struct EncryptedInput {
    service: Arc<dyn ConfidentialService>,
    chain_id: u64,
    contract_address: Address,
    user_address: Address,
    values: Vec<(U256, FheType)>,
    finalized: bool,
}

impl EncryptedInput {
    pub fn new(
        service: Arc<dyn ConfidentialService>,
        chain_id: u64,
        contract_address: Address,
        user_address: Address,
    ) -> Self {
        Self {
            service,
            chain_id,
            contract_address,
            user_address,
            values: Vec::new(),
            finalized: false,
        }
    }

    pub fn contract_address(&self) -> Address {
        self.contract_address
    }

    pub fn user_address(&self) -> Address {
        self.user_address
    }

    pub fn values(&self) -> &[(U256, FheType)] {
        &self.values
    }

    pub fn total_bits(&self) -> usize {
        self.values.iter().map(|(_, ty)| ty.bits()).sum()
    }

    /// Append `value` encrypted as `ty`. On error the session is left untouched.
    pub fn add(&mut self, value: U256, ty: FheType) -> Result<&mut Self, InputError> {
        if self.finalized {
            return Err(InputError::AlreadyFinalized);
        }
        if !ty.fits(&value) {
            return Err(InputError::ValueOutOfRange {
                value: value.to_string(),
                ty,
            });
        }
        if self.values.len() >= MAX_INPUT_VALUES || self.total_bits() + ty.bits() > MAX_INPUT_BITS
        {
            return Err(InputError::CapacityExceeded { ty });
        }
        self.values.push((value, ty));
        Ok(self)
    }

    /// Append a value given as text, see [`parse_plaintext`]
    pub fn add_str(&mut self, raw: &str, ty: FheType) -> Result<&mut Self, InputError> {
        if self.finalized {
            return Err(InputError::AlreadyFinalized);
        }
        let value = parse_plaintext(raw, ty)?;
        self.add(value, ty)
    }

    /// Append a signed value; negative values are rejected
    pub fn add_signed(&mut self, value: i128, ty: FheType) -> Result<&mut Self, InputError> {
        if value < 0 {
            if self.finalized {
                return Err(InputError::AlreadyFinalized);
            }
            return Err(InputError::ValueOutOfRange {
                value: value.to_string(),
                ty,
            });
        }
        self.add(U256::from(value as u128), ty)
    }

    pub fn add_bool(&mut self, value: bool) -> Result<&mut Self, InputError> {
        self.add(U256::from(value as u8), FheType::Bool)
    }

    pub fn add8(&mut self, value: u8) -> Result<&mut Self, InputError> {
        self.add(U256::from(value), FheType::Uint8)
    }

    pub fn add16(&mut self, value: u16) -> Result<&mut Self, InputError> {
        self.add(U256::from(value), FheType::Uint16)
    }

    pub fn add32(&mut self, value: u32) -> Result<&mut Self, InputError> {
        self.add(U256::from(value), FheType::Uint32)
    }

    pub fn add64(&mut self, value: u64) -> Result<&mut Self, InputError> {
        self.add(U256::from(value), FheType::Uint64)
    }

    pub fn add128(&mut self, value: u128) -> Result<&mut Self, InputError> {
        self.add(U256::from(value), FheType::Uint128)
    }

    pub fn add256(&mut self, value: U256) -> Result<&mut Self, InputError> {
        self.add(value, FheType::Uint256)
    }

    pub fn add_address(&mut self, value: Address) -> Result<&mut Self, InputError> {
        self.add(U256::from_be_slice(value.as_slice()), FheType::Address)
    }

    /// Finalize the input: send the values to the service for encryption and proof generation.
    ///
    /// This is one-shot. The session is finalized before the service is contacted, so a failed
    /// call cannot be retried on the same session; build a new input instead.
    #[instrument(skip_all, fields(contract = %self.contract_address, user = %self.user_address))]
    pub async fn encrypt(&mut self) -> Result<EncryptedPayload, InputError> {
        if self.finalized {
            return Err(InputError::AlreadyFinalized);
        }
        if self.values.is_empty() {
            return Err(InputError::Empty);
        }
        self.finalized = true;

        let values = std::mem::take(&mut self.values);
        let expected_types: Vec<FheType> = values.iter().map(|(_, ty)| *ty).collect();
        debug!("Encrypting {} values", values.len());

        let response = self
            .service
            .encrypt(EncryptRequest {
                contract_address: self.contract_address,
                user_address: self.user_address,
                chain_id: self.chain_id,
                values,
            })
            .await
            .map_err(|e| {
                warn!("Encryption request failed: {e}");
                InputError::EncryptionService(e)
            })?;

        check_handles(&response.handles, &expected_types)?;
        if response.input_proof.is_empty() {
            return Err(ServiceError::InvalidResponse("empty input proof".to_string()).into());
        }

        Ok(EncryptedPayload {
            handles: response.handles,
            input_proof: response.input_proof,
        })
    }
}

fn check_handles(handles: &[Handle], expected_types: &[FheType]) -> Result<(), InputError> {
    if handles.len() != expected_types.len() {
        return Err(ServiceError::InvalidResponse(format!(
            "expected {} handles, got {}",
            expected_types.len(),
            handles.len()
        ))
        .into());
    }
    for (position, (handle, expected)) in handles.iter().zip(expected_types).enumerate() {
        if handle_index(handle) as usize != position {
            return Err(ServiceError::InvalidResponse(format!(
                "handle {position} carries index {}",
                handle_index(handle)
            ))
            .into());
        }
        if handle_type(handle) != Some(*expected) {
            return Err(ServiceError::InvalidResponse(format!(
                "handle {position} is not an {expected}"
            ))
            .into());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::local::LocalCoprocessor;
    use crate::service::{EncryptResponse, SealedValue, UserDecryptRequest};
    use async_trait::async_trait;

    const CHAIN_ID: u64 = 31337;

    fn contract() -> Address {
        Address::repeat_byte(0xbb)
    }

    fn user() -> Address {
        Address::repeat_byte(0xaa)
    }

    fn input(service: Arc<dyn ConfidentialService>) -> EncryptedInput {
        EncryptedInput::new(service, CHAIN_ID, contract(), user())
    }

    #[tokio::test]
    async fn test_every_width_accepts_its_range() -> anyhow::Result<()> {
        let service = Arc::new(LocalCoprocessor::new(CHAIN_ID));
        for ty in FheType::ALL {
            let mut session = input(service.clone());
            session
                .add(U256::ZERO, ty)?
                .add(ty.max_value(), ty)?
                .add(ty.max_value() >> 1, ty)?;
            let payload = session.encrypt().await?;

            assert_eq!(payload.handles.len(), 3);
            for (i, handle) in payload.handles.iter().enumerate() {
                assert_eq!(handle_index(handle) as usize, i);
                assert_eq!(handle_type(handle), Some(ty));
            }
            assert!(!payload.input_proof.is_empty());
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_out_of_range_leaves_session_usable() -> anyhow::Result<()> {
        let service = Arc::new(LocalCoprocessor::new(CHAIN_ID));
        let mut session = input(service);
        session.add64(5)?;

        let too_big = U256::from(1) << 32;
        assert!(matches!(
            session.add(too_big, FheType::Uint32),
            Err(InputError::ValueOutOfRange { .. })
        ));
        assert!(matches!(
            session.add_signed(-1, FheType::Uint64),
            Err(InputError::ValueOutOfRange { .. })
        ));
        assert!(matches!(
            session.add_str("-42", FheType::Uint64),
            Err(InputError::ValueOutOfRange { .. })
        ));
        assert_eq!(session.values().len(), 1);

        session.add32(7)?;
        let payload = session.encrypt().await?;
        assert_eq!(payload.handles.len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_finalize_is_one_shot() -> anyhow::Result<()> {
        let service = Arc::new(LocalCoprocessor::new(CHAIN_ID));
        let mut session = input(service);
        session.add64(1_000_000)?;
        session.encrypt().await?;

        assert_eq!(session.encrypt().await, Err(InputError::AlreadyFinalized));
        assert!(matches!(
            session.add64(1),
            Err(InputError::AlreadyFinalized)
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_empty_input_is_refused_before_finalizing() -> anyhow::Result<()> {
        let mut session = input(Arc::new(FailingService));
        assert_eq!(session.encrypt().await, Err(InputError::Empty));

        let mut session = input(Arc::new(LocalCoprocessor::new(CHAIN_ID)));
        assert_eq!(session.encrypt().await, Err(InputError::Empty));
        session.add8(7)?;
        assert_eq!(session.encrypt().await?.handles.len(), 1);
        Ok(())
    }

    #[test]
    fn test_capacity_limits() {
        let service = Arc::new(LocalCoprocessor::new(CHAIN_ID));
        let mut session = input(service);
        for _ in 0..8 {
            session.add256(U256::from(1)).unwrap();
        }
        assert_eq!(session.total_bits(), MAX_INPUT_BITS);
        assert_eq!(
            session.add_bool(true).err(),
            Some(InputError::CapacityExceeded { ty: FheType::Bool })
        );
    }

    struct FailingService;

    #[async_trait]
    impl ConfidentialService for FailingService {
        async fn encrypt(&self, _: EncryptRequest) -> Result<EncryptResponse, ServiceError> {
            Err(ServiceError::Unavailable("connection refused".to_string()))
        }

        async fn user_decrypt(
            &self,
            _: UserDecryptRequest,
        ) -> Result<Vec<SealedValue>, ServiceError> {
            Err(ServiceError::Unavailable("connection refused".to_string()))
        }
    }

    struct ShortService;

    #[async_trait]
    impl ConfidentialService for ShortService {
        async fn encrypt(&self, _: EncryptRequest) -> Result<EncryptResponse, ServiceError> {
            Ok(EncryptResponse {
                handles: vec![],
                input_proof: Bytes::from_static(&[1]),
            })
        }

        async fn user_decrypt(
            &self,
            _: UserDecryptRequest,
        ) -> Result<Vec<SealedValue>, ServiceError> {
            Ok(vec![])
        }
    }

    #[tokio::test]
    async fn test_service_failures_surface_as_encryption_errors() {
        let mut session = input(Arc::new(FailingService));
        session.add64(1).unwrap();
        assert_eq!(
            session.encrypt().await,
            Err(InputError::EncryptionService(ServiceError::Unavailable(
                "connection refused".to_string()
            )))
        );
        // the failed attempt still consumed the session
        assert_eq!(session.encrypt().await, Err(InputError::AlreadyFinalized));

        let mut session = input(Arc::new(ShortService));
        session.add64(1).unwrap();
        assert!(matches!(
            session.encrypt().await,
            Err(InputError::EncryptionService(ServiceError::InvalidResponse(_)))
        ));
    }
}
