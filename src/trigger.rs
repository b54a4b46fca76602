//! Request/response protocol used by interactive clients.
//!
//! Each request starts one analysis run. Responses are always produced, a
//! failure is reported as a degraded outcome rather than an error.

use chrono::{DateTime, TimeZone};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use crate::analysis::RunOutcome;
use crate::identity::IdentityMode;
use crate::pipeline::{Pipeline, StoreOpener};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Request {
    /// Analyse the currently cached account.
    TriggerAnalysis,
    /// Pick another account, then analyse it.
    SwitchAccount,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Response {
    Switched { success: bool, result: RunOutcome },
    Analysis(RunOutcome),
}

impl Response {
    pub fn outcome(&self) -> &RunOutcome {
        match self {
            Response::Switched { result, .. } => result,
            Response::Analysis(outcome) => outcome,
        }
    }
}

pub async fn handle_request<Tz: TimeZone>(
    pipeline: &Pipeline,
    opener: &dyn StoreOpener,
    request: Request,
    now: &DateTime<Tz>,
) -> Response {
    debug!("Handling request {:?}", request);

    match request {
        Request::TriggerAnalysis => {
            Response::Analysis(pipeline.execute(opener, IdentityMode::Cached, now).await)
        }
        Request::SwitchAccount => {
            let result = pipeline.execute(opener, IdentityMode::SwitchAccount, now).await;
            Response::Switched {
                success: result.is_success(),
                result,
            }
        }
    }
}

/// Answer newline-delimited JSON requests until `reader` is exhausted.
///
/// The reference clock is sampled per request with `clock`.
pub async fn serve<R, W, Tz, C>(
    pipeline: &Pipeline,
    opener: &dyn StoreOpener,
    reader: R,
    mut writer: W,
    clock: C,
) -> std::io::Result<usize>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
    Tz: TimeZone,
    C: Fn() -> DateTime<Tz>,
{
    let mut lines = reader.lines();
    let mut handled = 0;

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<Request>(&line) {
            Ok(request) => handle_request(pipeline, opener, request, &clock()).await,
            Err(e) => {
                warn!("⚠️  Invalid request '{}': {}", line, e);
                Response::Analysis(RunOutcome::failed(format!("invalid request: {}", e)))
            }
        };

        let mut encoded = serde_json::to_vec(&response)?;
        encoded.push(b'\n');
        writer.write_all(&encoded).await?;
        writer.flush().await?;
        handled += 1;
    }

    Ok(handled)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_wire_format() {
        let request: Request = serde_json::from_str(r#"{"type":"triggerAnalysis"}"#).unwrap();
        assert_eq!(request, Request::TriggerAnalysis);

        let request: Request = serde_json::from_str(r#"{"type":"switchAccount"}"#).unwrap();
        assert_eq!(request, Request::SwitchAccount);

        assert!(serde_json::from_str::<Request>(r#"{"type":"refresh"}"#).is_err());
    }

    #[test]
    fn test_switch_response_wire_format() {
        let response = Response::Switched {
            success: false,
            result: RunOutcome::failed("cancelled"),
        };
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["result"]["authorizedIdentity"], "");
        assert!(json["result"]["analysis"].is_null());
    }
}
