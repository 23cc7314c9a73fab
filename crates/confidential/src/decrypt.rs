// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use crate::authorization::{AuthorizationWindow, Clock, DecryptionDomain, UserDecryptAuthorization};
use crate::service::{ConfidentialService, HandleContractPair, ServiceError, UserDecryptRequest};
use crate::signer::TypedDataSigner;
use crate::{Handle, Keypair};
use alloy::primitives::{Address, Signature, U256};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;
use thiserror::Error as ThisError;
use tracing::{debug, info, instrument, warn};

/// Most distinct contracts a single authorization may cover
pub const MAX_AUTHORIZED_CONTRACTS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SessionStage {
    Created,
    KeysGenerated,
    AuthorizationBuilt,
    Signed,
    Exchanged,
}

impl fmt::Display for SessionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionStage::Created => "created",
            SessionStage::KeysGenerated => "keys generated",
            SessionStage::AuthorizationBuilt => "authorization built",
            SessionStage::Signed => "signed",
            SessionStage::Exchanged => "exchanged",
        };
        f.write_str(name)
    }
}

#[derive(ThisError, Debug, Clone, PartialEq, Eq)]
pub enum DecryptError {
    #[error("Key generation failed: {0}")]
    KeyGeneration(String),
    #[error("Invalid authorization window: {0}")]
    InvalidWindow(String),
    #[error("Authorization cannot cover {requested} contracts, at most {max} at once")]
    TooManyContracts { requested: usize, max: usize },
    #[error("Signing failed: {0}")]
    SignatureRejected(String),
    #[error("Exchange refused: {0}")]
    Unauthorized(String),
    #[error("Exchange refused: authorization window expired at {end_timestamp} (now {now})")]
    WindowExpired { end_timestamp: u64, now: u64 },
    #[error("Exchange failed: {0}")]
    Service(ServiceError),
    #[error("Decryption session step called at stage `{actual}`, expected `{expected}`")]
    OutOfOrder {
        expected: SessionStage,
        actual: SessionStage,
    },
}

impl DecryptError {
    /// Stage the session was in when the error occurred
    pub fn stage(&self) -> SessionStage {
        match self {
            DecryptError::KeyGeneration(_) => SessionStage::Created,
            DecryptError::InvalidWindow(_) | DecryptError::TooManyContracts { .. } => {
                SessionStage::KeysGenerated
            }
            DecryptError::SignatureRejected(_) => SessionStage::AuthorizationBuilt,
            DecryptError::Unauthorized(_)
            | DecryptError::WindowExpired { .. }
            | DecryptError::Service(_) => SessionStage::Signed,
            DecryptError::OutOfOrder { actual, .. } => *actual,
        }
    }

    /// Only an unavailable service is worth retrying, with a fresh session. A rejected request
    /// or an unreadable response fails the same way again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, DecryptError::Service(ServiceError::Unavailable(_)))
    }
}

impl From<ServiceError> for DecryptError {
    fn from(value: ServiceError) -> Self {
        match value {
            ServiceError::Unauthorized(reason) => DecryptError::Unauthorized(reason),
            ServiceError::WindowExpired { end_timestamp, now } => {
                DecryptError::WindowExpired { end_timestamp, now }
            }
            other => DecryptError::Service(other),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecryptOptions {
    pub duration_days: u64,
}

impl Default for DecryptOptions {
    fn default() -> Self {
        Self { duration_days: 10 }
    }
}

/// Plaintexts keyed by handle, covering exactly the distinct handles that were requested
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecryptionResult(HashMap<Handle, U256>);

impl DecryptionResult {
    pub fn get(&self, handle: &Handle) -> Option<U256> {
        self.0.get(handle).copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Handle, &U256)> {
        self.0.iter()
    }

    pub fn into_inner(self) -> HashMap<Handle, U256> {
        self.0
    }
}

/// One user decryption exchange.
///
/// Steps must run in order: [`generate_keys`](Self::generate_keys),
/// [`build_authorization`](Self::build_authorization), [`sign`](Self::sign) and finally
/// [`exchange`](Self::exchange), which consumes the session.
pub struct UserDecryptSession {
    service: Arc<dyn ConfidentialService>,
    domain: DecryptionDomain,
    contracts_chain_id: u64,
    clock: Arc<dyn Clock>,
    pairs: Vec<HandleContractPair>,
    stage: SessionStage,
    keypair: Option<Keypair>,
    window: Option<AuthorizationWindow>,
    authorization: Option<UserDecryptAuthorization>,
    signed: Option<(Address, Signature)>,
}

impl UserDecryptSession {
    pub fn stage(&self) -> SessionStage {
        self.stage
    }

    pub fn pairs(&self) -> &[HandleContractPair] {
        &self.pairs
    }

    pub fn authorization(&self) -> Option<&UserDecryptAuthorization> {
        self.authorization.as_ref()
    }

    fn expect_stage(&self, expected: SessionStage) -> Result<(), DecryptError> {
        if self.stage != expected {
            return Err(DecryptError::OutOfOrder {
                expected,
                actual: self.stage,
            });
        }
        Ok(())
    }

    pub fn generate_keys(&mut self) -> Result<(), DecryptError> {
        self.expect_stage(SessionStage::Created)?;
        let keypair =
            Keypair::generate().map_err(|e| DecryptError::KeyGeneration(e.to_string()))?;
        self.keypair = Some(keypair);
        self.stage = SessionStage::KeysGenerated;
        Ok(())
    }

    /// Fix the validity window starting now and build the message to sign
    pub fn build_authorization(&mut self, duration_days: u64) -> Result<(), DecryptError> {
        self.expect_stage(SessionStage::KeysGenerated)?;
        if duration_days == 0 {
            return Err(DecryptError::InvalidWindow(
                "duration must be at least one day".to_string(),
            ));
        }
        let contracts: BTreeSet<Address> =
            self.pairs.iter().map(|p| p.contract_address).collect();
        if contracts.len() > MAX_AUTHORIZED_CONTRACTS {
            return Err(DecryptError::TooManyContracts {
                requested: contracts.len(),
                max: MAX_AUTHORIZED_CONTRACTS,
            });
        }
        let Some(keypair) = self.keypair.as_ref() else {
            return Err(DecryptError::OutOfOrder {
                expected: SessionStage::KeysGenerated,
                actual: SessionStage::Created,
            });
        };

        let window = AuthorizationWindow {
            start_timestamp: self.clock.now(),
            duration_days,
        };
        self.authorization = Some(UserDecryptAuthorization::new(
            &self.domain,
            &keypair.public_key(),
            contracts,
            window,
        ));
        self.window = Some(window);
        self.stage = SessionStage::AuthorizationBuilt;
        Ok(())
    }

    pub async fn sign(&mut self, signer: &dyn TypedDataSigner) -> Result<(), DecryptError> {
        self.expect_stage(SessionStage::AuthorizationBuilt)?;
        let Some(authorization) = self.authorization.as_ref() else {
            return Err(DecryptError::OutOfOrder {
                expected: SessionStage::AuthorizationBuilt,
                actual: SessionStage::KeysGenerated,
            });
        };
        let signature = signer
            .sign_authorization(authorization)
            .await
            .map_err(|e| DecryptError::SignatureRejected(e.to_string()))?;
        self.signed = Some((signer.address(), signature));
        self.stage = SessionStage::Signed;
        Ok(())
    }

    /// Send the signed authorization and open the returned values
    pub async fn exchange(mut self) -> Result<DecryptionResult, DecryptError> {
        self.expect_stage(SessionStage::Signed)?;
        let (Some(keypair), Some(window), Some(authorization), Some((user_address, signature))) = (
            self.keypair.take(),
            self.window,
            self.authorization.take(),
            self.signed,
        ) else {
            return Err(DecryptError::OutOfOrder {
                expected: SessionStage::Signed,
                actual: self.stage,
            });
        };

        let request = UserDecryptRequest {
            pairs: self.pairs.clone(),
            public_key: keypair.public_key(),
            signature,
            contract_addresses: authorization.contract_addresses().to_vec(),
            contracts_chain_id: self.contracts_chain_id,
            user_address,
            window,
        };
        let sealed = self.service.user_decrypt(request).await?;
        self.stage = SessionStage::Exchanged;

        let requested: BTreeSet<Handle> = self.pairs.iter().map(|p| p.handle).collect();
        let mut values = HashMap::with_capacity(requested.len());
        for item in sealed {
            if !requested.contains(&item.handle) {
                warn!("Dropping unrequested handle {} from response", item.handle);
                continue;
            }
            if values.contains_key(&item.handle) {
                continue;
            }
            let value = keypair.open(&item.handle, &item.payload).map_err(|e| {
                DecryptError::Service(ServiceError::InvalidResponse(format!(
                    "cannot open value for {}: {e}",
                    item.handle
                )))
            })?;
            values.insert(item.handle, value);
        }

        if let Some(missing) = requested.iter().find(|h| !values.contains_key(*h)) {
            return Err(DecryptError::Service(ServiceError::InvalidResponse(format!(
                "no value returned for {missing}"
            ))));
        }
        Ok(DecryptionResult(values))
    }
}

/// Runs user decryption sessions against a confidential computation service
#[derive(Clone)]
pub struct DecryptionClient {
    service: Arc<dyn ConfidentialService>,
    domain: DecryptionDomain,
    contracts_chain_id: u64,
    clock: Arc<dyn Clock>,
}

impl DecryptionClient {
    pub fn new(
        service: Arc<dyn ConfidentialService>,
        domain: DecryptionDomain,
        contracts_chain_id: u64,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            service,
            domain,
            contracts_chain_id,
            clock,
        }
    }

    pub fn domain(&self) -> &DecryptionDomain {
        &self.domain
    }

    /// Clock that opens authorization windows
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Start a session for `pairs`. Duplicate pairs are collapsed.
    pub fn session(&self, pairs: impl IntoIterator<Item = HandleContractPair>) -> UserDecryptSession {
        let pairs: Vec<HandleContractPair> = pairs
            .into_iter()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        UserDecryptSession {
            service: self.service.clone(),
            domain: self.domain,
            contracts_chain_id: self.contracts_chain_id,
            clock: self.clock.clone(),
            pairs,
            stage: SessionStage::Created,
            keypair: None,
            window: None,
            authorization: None,
            signed: None,
        }
    }

    /// Decrypt every handle in `pairs` on behalf of `signer`
    #[instrument(skip_all, fields(user = %signer.address()))]
    pub async fn user_decrypt(
        &self,
        pairs: impl IntoIterator<Item = HandleContractPair>,
        signer: &dyn TypedDataSigner,
        options: DecryptOptions,
    ) -> Result<DecryptionResult, DecryptError> {
        let mut session = self.session(pairs);
        if session.pairs().is_empty() {
            debug!("Nothing to decrypt");
            return Ok(DecryptionResult::default());
        }

        session.generate_keys()?;
        session.build_authorization(options.duration_days)?;
        session.sign(signer).await?;
        let handles = session.pairs().len();
        let result = session.exchange().await?;
        info!("Decrypted {} values from {} pairs", result.len(), handles);
        Ok(result)
    }
}
