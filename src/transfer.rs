//! The pluggable HTTP transport contract (spec.md §6), expressed as an
//! `async_trait` the way the teacher's `src/traits.rs` expresses
//! `KeyManager`/`Signer`/`Encryptor` — the core engine never opens a socket
//! itself, it calls whatever [`Transfer`] the host application installs.

use crate::asn1::message::PkiMessage;
use std::time::Duration;
use thiserror::Error;

/// Transport-layer failures a [`Transfer`] implementation reports back to
/// the session driver (spec.md §6), mapped onto [`crate::error::CmpError`]
/// variants by the session driver rather than here, so `Transfer`
/// implementations stay free of CMP-specific error modeling.
#[derive(Debug, Error)]
pub enum TransferError {
    /// The request could not be sent (connection refused, broken pipe, ...)
    #[error("send failure: {0}")]
    SendFailure(String),
    /// A response was not received (peer closed without replying)
    #[error("receive failure: {0}")]
    ReceiveFailure(String),
    /// The bytes received did not decode as a `PKIMessage`
    #[error("decode failure: {0}")]
    DecodeFailure(String),
    /// The read deadline elapsed before a response arrived
    #[error("read timeout")]
    ReadTimeout,
    /// The connect deadline elapsed before a connection was established
    #[error("connect timeout")]
    ConnectTimeout,
    /// A TLS handshake or record-layer error occurred
    #[error("TLS error: {0}")]
    TlsError(String),
}

impl From<TransferError> for crate::error::CmpError {
    fn from(e: TransferError) -> Self {
        use crate::error::CmpError;
        match e {
            TransferError::SendFailure(s) => CmpError::FailedToSendRequest(s),
            TransferError::ReceiveFailure(s) => CmpError::FailedToReceivePkiMessage(s),
            TransferError::DecodeFailure(s) => CmpError::FailedToReceivePkiMessage(s),
            TransferError::ReadTimeout => CmpError::ReadTimeout,
            TransferError::ConnectTimeout => CmpError::ConnectTimeout,
            TransferError::TlsError(s) => CmpError::TlsError(s),
        }
    }
}

/// One request/response round trip over whatever transport the host
/// application wires up (HTTP POST with the CMP content type, in the
/// common case). `timeout` is the effective per-message budget the session
/// driver has already computed as `min(msg_timeout, remaining-to-end-time)`
/// (spec.md §4.7 step 3).
#[async_trait::async_trait]
pub trait Transfer: Send + Sync {
    /// Send `request` and wait for the peer's response, honoring `timeout`.
    async fn transfer(
        &self,
        ctx: &crate::context::Context,
        request: &PkiMessage,
        timeout: Duration,
    ) -> Result<PkiMessage, TransferError>;
}

#[cfg(any(test, feature = "test-util"))]
pub mod fake {
    //! An in-process fake [`Transfer`] used by session-driver tests and by
    //! the integration tests under `tests/`. Gated behind the `test-util`
    //! feature (in addition to `cfg(test)`) so binaries under `tests/` —
    //! which compile this crate as an ordinary dependency, not with
    //! `cfg(test)` active — can still reach it; the core engine itself has
    //! no business shipping a mock transport in a default build.

    use super::*;
    use std::sync::Mutex;

    /// Replays a fixed queue of responses, one per call, ignoring the
    /// request's content beyond recording it for assertions.
    pub struct ScriptedTransfer {
        responses: Mutex<std::collections::VecDeque<Result<PkiMessage, TransferError>>>,
        pub sent: Mutex<Vec<PkiMessage>>,
    }

    impl ScriptedTransfer {
        pub fn new(responses: Vec<Result<PkiMessage, TransferError>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                sent: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait::async_trait]
    impl Transfer for ScriptedTransfer {
        async fn transfer(
            &self,
            _ctx: &crate::context::Context,
            request: &PkiMessage,
            _timeout: Duration,
        ) -> Result<PkiMessage, TransferError> {
            self.sent.lock().unwrap().push(request.clone());
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(TransferError::ReceiveFailure("script exhausted".into())))
        }
    }
}
