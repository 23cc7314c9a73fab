// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

//! Client side of confidential token operations: building encrypted, proof carrying contract
//! inputs and decrypting on-chain ciphertext handles through a signed, time bound authorization.

mod authorization;
mod client;
mod decrypt;
mod fhe_type;
pub mod handle;
mod input;
mod keypair;
mod local;
mod parse;
mod proof;
mod relayer;
mod sealing;
mod service;
mod signer;

pub use authorization::{
    AuthorizationWindow, Clock, DecryptionDomain, SystemClock, UserDecryptAuthorization,
    UserDecryptRequestVerification, DECRYPTION_DOMAIN_NAME, DECRYPTION_DOMAIN_VERSION,
    SECONDS_PER_DAY,
};
pub use client::ConfidentialClient;
pub use decrypt::{
    DecryptError, DecryptOptions, DecryptionClient, DecryptionResult, SessionStage,
    UserDecryptSession, MAX_AUTHORIZED_CONTRACTS,
};
pub use fhe_type::FheType;
pub use handle::Handle;
pub use input::{EncryptedInput, EncryptedPayload, InputError, MAX_INPUT_BITS, MAX_INPUT_VALUES};
pub use keypair::{Keypair, PUBLIC_KEY_SIZE};
pub use local::{LocalCoprocessor, ResponseOrder};
pub use parse::parse_plaintext;
pub use proof::{InputProof, ProofError};
pub use relayer::RelayerClient;
pub use sealing::{open_value, seal_value, SealingError};
pub use service::{
    ConfidentialService, EncryptRequest, EncryptResponse, HandleContractPair, SealedValue,
    ServiceError, UserDecryptRequest,
};
pub use signer::{SignerError, TypedDataSigner};
