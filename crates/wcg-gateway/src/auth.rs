//! Authorization prompting: deciding whether to grant a `Login` request.
//!
//! A real desktop deployment would pop a PIN or biometric prompt here;
//! prompting the user is out of scope for this daemon, so the default
//! policy auto-approves every request within its timeout. The trait
//! boundary exists so a caller can swap in a real prompt later without
//! touching the session state machine.

use async_trait::async_trait;
use tokio::time::{timeout, Duration};

use crate::error::GatewayError;

#[async_trait]
pub trait AuthPrompt: Send + Sync {
    /// Ask whether to authorize the current session. `Ok(true)` moves
    /// the session to `open-auth`; `Ok(false)` or a timeout leaves it
    /// `open-unauth`.
    async fn prompt(&self) -> bool;
}

/// Auto-approves every login — the only policy this daemon ships.
pub struct AutoApprove;

#[async_trait]
impl AuthPrompt for AutoApprove {
    async fn prompt(&self) -> bool {
        true
    }
}

/// Run `prompt.prompt()` under `timeout_ms` (default 30s), turning an
/// elapsed deadline into [`GatewayError::LoginTimeout`].
pub async fn authorize(
    prompt: &dyn AuthPrompt,
    timeout_ms: Option<u64>,
) -> Result<bool, GatewayError> {
    let duration = Duration::from_millis(timeout_ms.unwrap_or(30_000));
    match timeout(duration, prompt.prompt()).await {
        Ok(approved) => Ok(approved),
        Err(_) => Err(GatewayError::LoginTimeout),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn auto_approve_grants_immediately() {
        assert!(authorize(&AutoApprove, Some(100)).await.unwrap());
    }
}
