use std::sync::Arc;

use crate::api::PromoApi;
use crate::extractor::ScanContext;
use crate::models::CouponInfo;
use crate::redemption::{RedemptionClient, RedemptionOutcome};

/// Coupon statuses that still allow confirmation. Taken from the server's
/// observed vocabulary; compared case-insensitively.
const CONFIRMABLE_STATUSES: [&str; 3] = ["new", "available", "claimed"];

/// Where one confirmation session currently stands
#[derive(Debug)]
pub enum SessionState {
    LoadingInfo,
    Ready(CouponInfo),
    InfoFailed(String),
    Confirming,
    Done(RedemptionOutcome),
}

/// One scan-to-result confirmation session.
///
/// Drives the step sequence: fetch coupon info, wait for the operator,
/// run the claim/redeem pipeline, land in a terminal state.
pub struct ConfirmationSession {
    api: Arc<dyn PromoApi>,
    client: RedemptionClient,
    ctx: ScanContext,
    state: SessionState,
}

impl ConfirmationSession {
    pub fn new(api: Arc<dyn PromoApi>, device_tag: impl Into<String>, ctx: ScanContext) -> Self {
        let client = RedemptionClient::new(api.clone(), device_tag);
        Self {
            api,
            client,
            ctx,
            state: SessionState::LoadingInfo,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn context(&self) -> &ScanContext {
        &self.ctx
    }

    /// Fetch coupon info to populate the confirmation display.
    ///
    /// A failure lands in `InfoFailed` but does not block a later
    /// `confirm`: the claim call remains the authority on coupon state.
    pub async fn load_info(&mut self) -> &SessionState {
        self.state = match self.api.info(&self.ctx.code).await {
            Ok(reply) if reply.is_success() => {
                let info = reply
                    .json
                    .clone()
                    .and_then(|json| serde_json::from_value::<CouponInfo>(json).ok())
                    .unwrap_or_default();
                SessionState::Ready(info)
            }
            Ok(reply) => SessionState::InfoFailed(
                reply
                    .server_message()
                    .unwrap_or_else(|| "No se pudo obtener el detalle del QR.".to_string()),
            ),
            Err(err) => SessionState::InfoFailed(err.to_string()),
        };

        &self.state
    }

    /// Whether the operator may trigger the claim/redeem sequence:
    /// no submission in flight, not already terminal, and the reported
    /// status (when known) not itself terminal.
    pub fn can_confirm(&self) -> bool {
        match &self.state {
            SessionState::Confirming | SessionState::Done(_) => false,
            SessionState::Ready(info) => match info.status.as_deref() {
                Some(status) => CONFIRMABLE_STATUSES
                    .iter()
                    .any(|allowed| status.eq_ignore_ascii_case(allowed)),
                None => true,
            },
            // Info unavailable: leave the decision to the claim call
            SessionState::LoadingInfo | SessionState::InfoFailed(_) => true,
        }
    }

    /// Run the claim/redeem sequence and land in a terminal state.
    ///
    /// Returns `None` when the guard rejects the attempt (submission in
    /// flight, session already terminal, or a non-confirmable status).
    pub async fn confirm(&mut self) -> Option<&RedemptionOutcome> {
        if !self.can_confirm() {
            return None;
        }

        self.state = SessionState::Confirming;
        let outcome = self.client.run(&self.ctx).await;
        self.state = SessionState::Done(outcome);

        match &self.state {
            SessionState::Done(outcome) => Some(outcome),
            _ => None,
        }
    }
}

/// Guards the scanner against double-fired scan events.
///
/// Explicit idle/processing value released when the flow settles (result
/// shown or operator cancel), never by a timer.
#[derive(Debug, Default)]
pub struct ScanGate {
    processing: bool,
}

impl ScanGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Try to start processing a scan. Returns `false` while a previous
    /// scan's flow is still settling.
    pub fn begin(&mut self) -> bool {
        if self.processing {
            return false;
        }
        self.processing = true;
        true
    }

    pub fn release(&mut self) {
        self.processing = false;
    }

    pub fn is_processing(&self) -> bool {
        self.processing
    }
}
