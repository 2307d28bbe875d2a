use serde::Serialize;
use serde_json::json;
use std::sync::Arc;

use crate::api::{ApiError, ApiReply, PromoApi};
use crate::extractor::ScanContext;
use crate::models::{ClaimBody, RedeemBody};

/// Closed set of terminal outcome categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutcomeCategory {
    Success,
    InvalidCode,
    NotFound,
    AlreadyUsed,
    ValidationFailed,
    GenericFailure,
    ConnectionFailure,
}

/// Result tag handed to the result display
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeTag {
    Ok,
    Error,
}

/// Terminal result of one redemption attempt.
///
/// Serializes to the navigation record `{status, title, message, details?}`
/// consumed by the result display; the category stays internal.
#[derive(Debug, Clone, Serialize)]
pub struct RedemptionOutcome {
    pub status: OutcomeTag,
    #[serde(skip)]
    pub category: OutcomeCategory,
    pub title: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl RedemptionOutcome {
    pub fn ok(
        category: OutcomeCategory,
        title: impl Into<String>,
        message: impl Into<String>,
        details: Option<String>,
    ) -> Self {
        Self {
            status: OutcomeTag::Ok,
            category,
            title: title.into(),
            message: message.into(),
            details,
        }
    }

    pub fn error(
        category: OutcomeCategory,
        title: impl Into<String>,
        message: impl Into<String>,
        details: Option<String>,
    ) -> Self {
        Self {
            status: OutcomeTag::Error,
            category,
            title: title.into(),
            message: message.into(),
            details,
        }
    }

    /// Terminal result for a scan that yielded no usable code
    pub fn invalid_qr() -> Self {
        Self::error(
            OutcomeCategory::InvalidCode,
            "QR inválido",
            "No pude extraer un código válido.",
            None,
        )
    }

    fn connection_failure(err: &ApiError) -> Self {
        Self::error(
            OutcomeCategory::ConnectionFailure,
            "Sin conexión",
            err.to_string(),
            None,
        )
    }
}

/// Map an HTTP reply from claim or redeem onto an outcome category
pub fn classify(reply: &ApiReply) -> OutcomeCategory {
    match reply.status {
        status if (200..300).contains(&status) => OutcomeCategory::Success,
        404 => OutcomeCategory::NotFound,
        409 => OutcomeCategory::AlreadyUsed,
        422 => OutcomeCategory::ValidationFailed,
        _ => OutcomeCategory::GenericFailure,
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "lowercase")]
enum Step {
    Claim,
    Redeem,
}

/// Result of the claim step: continue to redeem, or stop with the terminal
/// outcome. The redeem call is structurally unreachable after a rejection.
#[derive(Debug)]
pub enum ClaimOutcome {
    Claimed,
    Rejected(RedemptionOutcome),
}

/// Claim-then-redeem pipeline against the promotions API
pub struct RedemptionClient {
    api: Arc<dyn PromoApi>,
    device_tag: String,
}

impl RedemptionClient {
    pub fn new(api: Arc<dyn PromoApi>, device_tag: impl Into<String>) -> Self {
        Self {
            api,
            device_tag: device_tag.into(),
        }
    }

    /// Run the two-step sequence for one scan context. Redeem is only
    /// issued after claim's success response is observed.
    pub async fn run(&self, ctx: &ScanContext) -> RedemptionOutcome {
        match self.claim(&ctx.code).await {
            ClaimOutcome::Claimed => self.redeem(ctx).await,
            ClaimOutcome::Rejected(outcome) => outcome,
        }
    }

    async fn claim(&self, code: &str) -> ClaimOutcome {
        let body = ClaimBody {
            device: self.device_tag.clone(),
        };

        let reply = match self.api.claim(code, &body).await {
            Ok(reply) => reply,
            Err(err) => return ClaimOutcome::Rejected(RedemptionOutcome::connection_failure(&err)),
        };

        match classify(&reply) {
            OutcomeCategory::Success => ClaimOutcome::Claimed,
            category => {
                let title = match category {
                    OutcomeCategory::NotFound => "QR no encontrado",
                    OutcomeCategory::AlreadyUsed => "QR ya utilizado",
                    _ => "No se pudo reservar el QR",
                };
                ClaimOutcome::Rejected(RedemptionOutcome::error(
                    category,
                    title,
                    failure_message(category, &reply),
                    Some(detail(Step::Claim, &reply)),
                ))
            }
        }
    }

    async fn redeem(&self, ctx: &ScanContext) -> RedemptionOutcome {
        let body = RedeemBody {
            source: "scanner".to_string(),
            dni: ctx.dni.clone(),
            external_user_id: ctx.external_user_id.clone(),
        };

        let reply = match self.api.redeem(&ctx.code, &body).await {
            Ok(reply) => reply,
            Err(err) => return RedemptionOutcome::connection_failure(&err),
        };

        match classify(&reply) {
            OutcomeCategory::Success => {
                let message = reply
                    .json
                    .as_ref()
                    .and_then(|json| json.get("message").and_then(serde_json::Value::as_str))
                    .unwrap_or("El cupón fue canjeado correctamente.")
                    .to_string();

                RedemptionOutcome::ok(
                    OutcomeCategory::Success,
                    "Canje exitoso",
                    message,
                    Some(detail(Step::Redeem, &reply)),
                )
            }
            category => {
                let title = match category {
                    OutcomeCategory::NotFound => "QR no encontrado",
                    OutcomeCategory::AlreadyUsed => "QR ya utilizado",
                    OutcomeCategory::ValidationFailed => "Error de validación",
                    _ => "Error al canjear",
                };
                RedemptionOutcome::error(
                    category,
                    title,
                    failure_message(category, &reply),
                    Some(detail(Step::Redeem, &reply)),
                )
            }
        }
    }
}

/// Operator-facing failure message: the server's word when it gave one,
/// else a canned fallback per category
fn failure_message(category: OutcomeCategory, reply: &ApiReply) -> String {
    reply.server_message().unwrap_or_else(|| match category {
        OutcomeCategory::NotFound => "QR no encontrado.".to_string(),
        OutcomeCategory::AlreadyUsed => "QR ya utilizado.".to_string(),
        OutcomeCategory::ValidationFailed => "QR expirado o sin claim.".to_string(),
        _ => format!("Error HTTP {}", reply.status),
    })
}

fn detail(step: Step, reply: &ApiReply) -> String {
    json!({
        "step": step,
        "status": reply.status,
        "body": reply.json.clone().unwrap_or_else(|| json!(reply.text)),
    })
    .to_string()
}
