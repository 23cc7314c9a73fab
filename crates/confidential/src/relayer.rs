// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use crate::authorization::{AuthorizationWindow, Clock, SystemClock};
use crate::service::{
    ConfidentialService, EncryptRequest, EncryptResponse, HandleContractPair, SealedValue,
    ServiceError, UserDecryptRequest,
};
use crate::Handle;
use alloy::primitives::{Address, Bytes};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, trace};
use url::Url;

const INPUT_PROOF_PATH: &str = "v1/input-proof";
const USER_DECRYPT_PATH: &str = "v1/user-decrypt";
const WINDOW_EXPIRED_LABEL: &str = "window_expired";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InputProofBody {
    contract_address: Address,
    user_address: Address,
    contract_chain_id: u64,
    values: Vec<TypedValue>,
    extra_data: Bytes,
}

#[derive(Serialize)]
struct TypedValue {
    value: String,
    #[serde(rename = "type")]
    ty: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct InputProofReply {
    handles: Vec<Handle>,
    input_proof: Bytes,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RequestValidity {
    start_timestamp: String,
    duration_days: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UserDecryptBody {
    handle_contract_pairs: Vec<HandleContractPair>,
    request_validity: RequestValidity,
    contracts_chain_id: u64,
    contract_addresses: Vec<Address>,
    user_address: Address,
    signature: Bytes,
    public_key: Bytes,
    extra_data: Bytes,
}

#[derive(Deserialize)]
struct UserDecryptReply {
    response: Vec<SealedItem>,
}

#[derive(Deserialize)]
struct SealedItem {
    handle: Handle,
    payload: Bytes,
}

#[derive(Deserialize, Default)]
struct ErrorReply {
    #[serde(default)]
    label: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// HTTP client for a relayer gateway fronting the coprocessors and KMS
#[derive(Debug, Clone)]
pub struct RelayerClient {
    client: Client,
    base_url: Url,
}

impl RelayerClient {
    pub fn new(base_url: Url, timeout: Duration) -> Result<Self, ServiceError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ServiceError::Unavailable(e.to_string()))?;
        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url, ServiceError> {
        let mut base = self.base_url.clone();
        if !base.path().ends_with('/') {
            base.set_path(&format!("{}/", base.path()));
        }
        base.join(path)
            .map_err(|e| ServiceError::Rejected(format!("bad relayer url: {e}")))
    }

    async fn post<B: Serialize, R: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
        window: Option<&AuthorizationWindow>,
    ) -> Result<R, ServiceError> {
        let url = self.endpoint(path)?;
        debug!("POST {url}");
        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| ServiceError::Unavailable(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ServiceError::Unavailable(e.to_string()))?;
        trace!("{status}: {text}");
        if !status.is_success() {
            return Err(status_error(status, &text, window));
        }
        serde_json::from_str(&text).map_err(|e| ServiceError::InvalidResponse(e.to_string()))
    }
}

/// Map a non-success reply onto the service error it stands for.
///
/// The relayer does not echo the validity window back, so an expiry is reported against the
/// window that was sent. Without one the reply is a rejection.
fn status_error(
    status: StatusCode,
    body: &str,
    window: Option<&AuthorizationWindow>,
) -> ServiceError {
    let reply: ErrorReply = serde_json::from_str(body).unwrap_or_default();
    let detail = reply
        .message
        .unwrap_or_else(|| format!("HTTP {status}"));

    if status == StatusCode::GONE || reply.label.as_deref() == Some(WINDOW_EXPIRED_LABEL) {
        return match window {
            Some(window) => ServiceError::WindowExpired {
                end_timestamp: window.end_timestamp(),
                now: SystemClock.now(),
            },
            None => ServiceError::Rejected(detail),
        };
    }
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ServiceError::Unauthorized(detail),
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => ServiceError::Rejected(detail),
        s if s.is_server_error() => ServiceError::Unavailable(detail),
        _ => ServiceError::InvalidResponse(detail),
    }
}

#[async_trait]
impl ConfidentialService for RelayerClient {
    async fn encrypt(&self, request: EncryptRequest) -> Result<EncryptResponse, ServiceError> {
        let body = InputProofBody {
            contract_address: request.contract_address,
            user_address: request.user_address,
            contract_chain_id: request.chain_id,
            values: request
                .values
                .iter()
                .map(|(value, ty)| TypedValue {
                    value: value.to_string(),
                    ty: ty.to_string(),
                })
                .collect(),
            extra_data: Bytes::from_static(&[0x00]),
        };
        let reply: InputProofReply = self.post(INPUT_PROOF_PATH, &body, None).await?;
        Ok(EncryptResponse {
            handles: reply.handles,
            input_proof: reply.input_proof,
        })
    }

    async fn user_decrypt(
        &self,
        request: UserDecryptRequest,
    ) -> Result<Vec<SealedValue>, ServiceError> {
        let window = request.window;
        let body = UserDecryptBody {
            handle_contract_pairs: request.pairs,
            request_validity: RequestValidity {
                start_timestamp: request.window.start_timestamp.to_string(),
                duration_days: request.window.duration_days.to_string(),
            },
            contracts_chain_id: request.contracts_chain_id,
            contract_addresses: request.contract_addresses,
            user_address: request.user_address,
            signature: Bytes::from(request.signature.as_bytes().to_vec()),
            public_key: Bytes::copy_from_slice(&request.public_key),
            extra_data: Bytes::from_static(&[0x00]),
        };
        let reply: UserDecryptReply = self
            .post(USER_DECRYPT_PATH, &body, Some(&window))
            .await?;
        Ok(reply
            .response
            .into_iter()
            .map(|item| SealedValue {
                handle: item.handle,
                payload: item.payload,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FheType;
    use alloy::primitives::U256;

    #[test]
    fn test_status_mapping() {
        let window = AuthorizationWindow {
            start_timestamp: 1_700_000_000,
            duration_days: 1,
        };
        assert!(matches!(
            status_error(StatusCode::UNAUTHORIZED, "", None),
            ServiceError::Unauthorized(_)
        ));
        assert!(matches!(
            status_error(StatusCode::FORBIDDEN, r#"{"message":"acl"}"#, None),
            ServiceError::Unauthorized(m) if m == "acl"
        ));
        assert!(matches!(
            status_error(StatusCode::GONE, "", Some(&window)),
            ServiceError::WindowExpired { .. }
        ));
        assert!(matches!(
            status_error(
                StatusCode::BAD_REQUEST,
                r#"{"label":"window_expired"}"#,
                Some(&window)
            ),
            ServiceError::WindowExpired { .. }
        ));
        assert!(matches!(
            status_error(StatusCode::UNPROCESSABLE_ENTITY, "not json", None),
            ServiceError::Rejected(_)
        ));
        assert!(matches!(
            status_error(StatusCode::BAD_GATEWAY, "", None),
            ServiceError::Unavailable(_)
        ));
    }

    #[test]
    fn test_expiry_reports_the_sent_window() {
        let window = AuthorizationWindow {
            start_timestamp: 1_700_000_000,
            duration_days: 2,
        };
        let ServiceError::WindowExpired { end_timestamp, now } =
            status_error(StatusCode::GONE, "", Some(&window))
        else {
            panic!("window expiry expected");
        };
        assert_eq!(end_timestamp, 1_700_000_000 + 2 * 86_400);
        assert!(now > end_timestamp);

        assert!(matches!(
            status_error(StatusCode::GONE, r#"{"message":"gone"}"#, None),
            ServiceError::Rejected(m) if m == "gone"
        ));
    }

    #[test]
    fn test_endpoint_keeps_base_path() -> anyhow::Result<()> {
        let client = RelayerClient::new(
            Url::parse("https://relayer.example.org/api")?,
            Duration::from_secs(1),
        )?;
        assert_eq!(
            client.endpoint(INPUT_PROOF_PATH)?.as_str(),
            "https://relayer.example.org/api/v1/input-proof"
        );
        Ok(())
    }

    #[test]
    fn test_input_proof_body_shape() -> anyhow::Result<()> {
        let body = InputProofBody {
            contract_address: Address::repeat_byte(0xbb),
            user_address: Address::repeat_byte(0xaa),
            contract_chain_id: 11155111,
            values: vec![TypedValue {
                value: U256::from(1_000_000u64).to_string(),
                ty: FheType::Uint64.to_string(),
            }],
            extra_data: Bytes::from_static(&[0x00]),
        };
        let json = serde_json::to_value(&body)?;
        assert_eq!(json["contractChainId"], 11155111);
        assert_eq!(json["values"][0]["value"], "1000000");
        assert_eq!(json["values"][0]["type"], "euint64");
        assert_eq!(json["extraData"], "0x00");
        Ok(())
    }

    #[tokio::test]
    async fn test_unreachable_relayer_is_unavailable() -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        drop(listener);

        let client = RelayerClient::new(
            Url::parse(&format!("http://{addr}"))?,
            Duration::from_secs(2),
        )?;
        let err = client
            .encrypt(EncryptRequest {
                contract_address: Address::repeat_byte(0xbb),
                user_address: Address::repeat_byte(0xaa),
                chain_id: 11155111,
                values: vec![(U256::from(1), FheType::Uint64)],
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Unavailable(_)));
        Ok(())
    }
}
