// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use crate::Handle;
use alloy::primitives::{Bytes, Signature, B256};
use thiserror::Error as ThisError;

const SIGNATURE_LEN: usize = 65;

#[derive(ThisError, Debug, PartialEq, Eq)]
pub enum ProofError {
    #[error("Input proof is truncated: expected at least {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },
    #[error("Input proof contains a malformed signature at position {0}")]
    BadSignature(usize),
    #[error("Input proof must cover between 1 and 255 handles")]
    HandleCount,
    #[error("Input proof can carry at most 255 signatures, got {0}")]
    SignerCount(usize),
}

/// Validity proof attached to an encrypted input.
///
/// Wire format, as consumed by the token and bridge contracts:
/// `[n_handles: u8][n_signers: u8][handles: 32 * n][signatures: 65 * m][extra_data]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputProof {
    pub handles: Vec<Handle>,
    pub signatures: Vec<Signature>,
    pub extra_data: Bytes,
}

impl InputProof {
    pub fn encode(&self) -> Result<Bytes, ProofError> {
        if self.handles.is_empty() || self.handles.len() > u8::MAX as usize {
            return Err(ProofError::HandleCount);
        }
        if self.signatures.len() > u8::MAX as usize {
            return Err(ProofError::SignerCount(self.signatures.len()));
        }
        let mut out = Vec::with_capacity(
            2 + self.handles.len() * 32 + self.signatures.len() * SIGNATURE_LEN + self.extra_data.len(),
        );
        out.push(self.handles.len() as u8);
        out.push(self.signatures.len() as u8);
        for handle in &self.handles {
            out.extend_from_slice(handle.as_slice());
        }
        for signature in &self.signatures {
            out.extend_from_slice(&signature.as_bytes());
        }
        out.extend_from_slice(&self.extra_data);
        Ok(out.into())
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, ProofError> {
        if bytes.len() < 2 {
            return Err(ProofError::Truncated {
                expected: 2,
                actual: bytes.len(),
            });
        }
        let n_handles = bytes[0] as usize;
        let n_signers = bytes[1] as usize;
        if n_handles == 0 {
            return Err(ProofError::HandleCount);
        }
        let signatures_start = 2 + n_handles * 32;
        let extra_start = signatures_start + n_signers * SIGNATURE_LEN;
        if bytes.len() < extra_start {
            return Err(ProofError::Truncated {
                expected: extra_start,
                actual: bytes.len(),
            });
        }

        let handles = bytes[2..signatures_start]
            .chunks_exact(32)
            .map(B256::from_slice)
            .collect();
        let signatures = bytes[signatures_start..extra_start]
            .chunks_exact(SIGNATURE_LEN)
            .enumerate()
            .map(|(i, chunk)| Signature::try_from(chunk).map_err(|_| ProofError::BadSignature(i)))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            handles,
            signatures,
            extra_data: Bytes::copy_from_slice(&bytes[extra_start..]),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::U256;

    #[test]
    fn test_decode_rejects_truncated_proofs() {
        assert_eq!(
            InputProof::decode(&[1]),
            Err(ProofError::Truncated {
                expected: 2,
                actual: 1
            })
        );
        // claims two handles, carries one
        let mut bytes = vec![2u8, 0u8];
        bytes.extend_from_slice(&[7u8; 32]);
        assert_eq!(
            InputProof::decode(&bytes),
            Err(ProofError::Truncated {
                expected: 66,
                actual: 34
            })
        );
        assert_eq!(InputProof::decode(&[0, 0]), Err(ProofError::HandleCount));
    }

    #[test]
    fn test_layout_is_stable() {
        let signature = Signature::new(U256::from(1), U256::from(2), false);
        let proof = InputProof {
            handles: vec![B256::repeat_byte(0x11), B256::repeat_byte(0x22)],
            signatures: vec![signature],
            extra_data: Bytes::from_static(&[0x00]),
        };
        let encoded = proof.encode().unwrap();

        assert_eq!(encoded.len(), 2 + 64 + 65 + 1);
        assert_eq!(encoded[0], 2);
        assert_eq!(encoded[1], 1);
        assert_eq!(&encoded[2..34], B256::repeat_byte(0x11).as_slice());
        assert_eq!(InputProof::decode(&encoded).unwrap(), proof);
    }

    #[test]
    fn test_encode_refuses_too_many_signers() {
        let signature = Signature::new(U256::from(1), U256::from(2), false);
        let proof = InputProof {
            handles: vec![B256::repeat_byte(0x11)],
            signatures: vec![signature; 256],
            extra_data: Bytes::new(),
        };
        assert_eq!(proof.encode(), Err(ProofError::SignerCount(256)));
    }
}
