use async_trait::async_trait;
use serde_json::Value;
use std::sync::{Arc, Mutex};

use promo_scanner::api::{ApiError, ApiReply, ApiResult, PromoApi};
use promo_scanner::extractor::ScanContext;
use promo_scanner::models::{ClaimBody, RedeemBody};
use promo_scanner::redemption::{
    OutcomeCategory, OutcomeTag, RedemptionClient, RedemptionOutcome,
};
use promo_scanner::session::{ConfirmationSession, ScanGate, SessionState};

const DEVICE_TAG: &str = "scanner-test";

#[derive(Clone, Copy)]
struct Scripted {
    status: u16,
    body: &'static str,
}

struct MockApi {
    info: Scripted,
    claim: Scripted,
    redeem: Scripted,
    claim_down: bool,
    claim_calls: Arc<Mutex<Vec<ClaimBody>>>,
    redeem_calls: Arc<Mutex<Vec<RedeemBody>>>,
}

impl MockApi {
    fn new(claim: (u16, &'static str), redeem: (u16, &'static str)) -> Self {
        Self::with_info((200, r#"{"status":"available"}"#), claim, redeem)
    }

    fn with_info(
        info: (u16, &'static str),
        claim: (u16, &'static str),
        redeem: (u16, &'static str),
    ) -> Self {
        Self {
            info: Scripted {
                status: info.0,
                body: info.1,
            },
            claim: Scripted {
                status: claim.0,
                body: claim.1,
            },
            redeem: Scripted {
                status: redeem.0,
                body: redeem.1,
            },
            claim_down: false,
            claim_calls: Arc::new(Mutex::new(Vec::new())),
            redeem_calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn down() -> Self {
        let mut mock = Self::new((200, "{}"), (200, "{}"));
        mock.claim_down = true;
        mock
    }

    fn reply(scripted: Scripted) -> ApiReply {
        ApiReply {
            status: scripted.status,
            text: scripted.body.to_string(),
            json: serde_json::from_str(scripted.body).ok(),
        }
    }

    fn claim_count(&self) -> usize {
        self.claim_calls.lock().expect("claim lock poisoned").len()
    }

    fn redeem_count(&self) -> usize {
        self.redeem_calls.lock().expect("redeem lock poisoned").len()
    }
}

#[async_trait]
impl PromoApi for MockApi {
    async fn info(&self, _code: &str) -> ApiResult<ApiReply> {
        Ok(Self::reply(self.info))
    }

    async fn claim(&self, _code: &str, body: &ClaimBody) -> ApiResult<ApiReply> {
        if self.claim_down {
            return Err(ApiError::Transport("connection refused".to_string()));
        }
        self.claim_calls
            .lock()
            .expect("claim lock poisoned")
            .push(body.clone());
        Ok(Self::reply(self.claim))
    }

    async fn redeem(&self, _code: &str, body: &RedeemBody) -> ApiResult<ApiReply> {
        self.redeem_calls
            .lock()
            .expect("redeem lock poisoned")
            .push(body.clone());
        Ok(Self::reply(self.redeem))
    }
}

fn context(payload: &str) -> ScanContext {
    ScanContext::from_payload(payload).expect("payload must extract")
}

// ========== Pipeline ==========

#[tokio::test]
async fn successful_claim_then_redeem() {
    let mock = Arc::new(MockApi::new((200, "{}"), (200, r#"{"message":"done"}"#)));
    let client = RedemptionClient::new(mock.clone(), DEVICE_TAG);

    let outcome = client.run(&context("ABC123")).await;

    assert_eq!(outcome.status, OutcomeTag::Ok);
    assert_eq!(outcome.category, OutcomeCategory::Success);
    assert_eq!(outcome.title, "Canje exitoso");
    assert_eq!(outcome.message, "done");
    assert_eq!(mock.claim_count(), 1);
    assert_eq!(mock.redeem_count(), 1);

    let claim = mock.claim_calls.lock().expect("claim lock poisoned")[0].clone();
    assert_eq!(claim.device, DEVICE_TAG);

    let redeem = mock.redeem_calls.lock().expect("redeem lock poisoned")[0].clone();
    assert_eq!(redeem.source, "scanner");
    assert!(redeem.dni.is_none());
    assert!(redeem.external_user_id.is_none());
}

#[tokio::test]
async fn redeem_success_without_message_uses_default() {
    let mock = Arc::new(MockApi::new((200, "{}"), (200, "{}")));
    let client = RedemptionClient::new(mock.clone(), DEVICE_TAG);

    let outcome = client.run(&context("ABC123")).await;

    assert_eq!(outcome.status, OutcomeTag::Ok);
    assert_eq!(outcome.message, "El cupón fue canjeado correctamente.");
}

#[tokio::test]
async fn claim_conflict_stops_before_redeem() {
    let mock = Arc::new(MockApi::new((409, r#"{"message":"ya usado"}"#), (200, "{}")));
    let client = RedemptionClient::new(mock.clone(), DEVICE_TAG);

    let outcome = client.run(&context("ABC123")).await;

    assert_eq!(outcome.status, OutcomeTag::Error);
    assert_eq!(outcome.category, OutcomeCategory::AlreadyUsed);
    assert_eq!(outcome.title, "QR ya utilizado");
    assert_eq!(outcome.message, "ya usado");
    assert_eq!(mock.claim_count(), 1);
    assert_eq!(mock.redeem_count(), 0);
}

#[tokio::test]
async fn claim_not_found_stops_before_redeem() {
    let mock = Arc::new(MockApi::new((404, "{}"), (200, "{}")));
    let client = RedemptionClient::new(mock.clone(), DEVICE_TAG);

    let outcome = client.run(&context("ABC123")).await;

    assert_eq!(outcome.category, OutcomeCategory::NotFound);
    assert_eq!(outcome.title, "QR no encontrado");
    assert_eq!(outcome.message, "QR no encontrado.");
    assert_eq!(mock.redeem_count(), 0);
}

#[tokio::test]
async fn claim_generic_failure_uses_server_error_field() {
    let mock = Arc::new(MockApi::new((500, r#"{"error":"boom"}"#), (200, "{}")));
    let client = RedemptionClient::new(mock.clone(), DEVICE_TAG);

    let outcome = client.run(&context("ABC123")).await;

    assert_eq!(outcome.category, OutcomeCategory::GenericFailure);
    assert_eq!(outcome.title, "No se pudo reservar el QR");
    assert_eq!(outcome.message, "boom");
    assert_eq!(mock.redeem_count(), 0);
}

#[tokio::test]
async fn non_json_failure_body_is_kept_as_text() {
    let mock = Arc::new(MockApi::new((503, "mantenimiento programado"), (200, "{}")));
    let client = RedemptionClient::new(mock.clone(), DEVICE_TAG);

    let outcome = client.run(&context("ABC123")).await;

    assert_eq!(outcome.category, OutcomeCategory::GenericFailure);
    assert_eq!(outcome.message, "mantenimiento programado");
}

#[tokio::test]
async fn redeem_validation_failure() {
    let mock = Arc::new(MockApi::new((200, "{}"), (422, "{}")));
    let client = RedemptionClient::new(mock.clone(), DEVICE_TAG);

    let outcome = client.run(&context("ABC123")).await;

    assert_eq!(outcome.status, OutcomeTag::Error);
    assert_eq!(outcome.category, OutcomeCategory::ValidationFailed);
    assert_eq!(outcome.title, "Error de validación");
    assert_eq!(outcome.message, "QR expirado o sin claim.");
    assert_eq!(mock.redeem_count(), 1);
}

#[tokio::test]
async fn redeem_conflict_is_already_used() {
    let mock = Arc::new(MockApi::new((200, "{}"), (409, "{}")));
    let client = RedemptionClient::new(mock.clone(), DEVICE_TAG);

    let outcome = client.run(&context("ABC123")).await;

    assert_eq!(outcome.category, OutcomeCategory::AlreadyUsed);
    assert_eq!(outcome.title, "QR ya utilizado");
}

#[tokio::test]
async fn transport_failure_is_connection_outcome() {
    let mock = Arc::new(MockApi::down());
    let client = RedemptionClient::new(mock.clone(), DEVICE_TAG);

    let outcome = client.run(&context("ABC123")).await;

    assert_eq!(outcome.status, OutcomeTag::Error);
    assert_eq!(outcome.category, OutcomeCategory::ConnectionFailure);
    assert_eq!(outcome.title, "Sin conexión");
    assert_eq!(mock.redeem_count(), 0);
}

#[tokio::test]
async fn outcome_serializes_to_navigation_record() {
    let mock = Arc::new(MockApi::new((200, "{}"), (200, r#"{"message":"done"}"#)));
    let client = RedemptionClient::new(mock.clone(), DEVICE_TAG);

    let outcome = client.run(&context("ABC123")).await;
    let record = serde_json::to_value(&outcome).expect("outcome serializes");

    assert_eq!(record["status"], "ok");
    assert_eq!(record["title"], "Canje exitoso");
    assert_eq!(record["message"], "done");
    assert!(record["details"].is_string());
    assert!(record.get("category").is_none());
}

#[tokio::test]
async fn failure_details_carry_step_and_status() {
    let mock = Arc::new(MockApi::new((409, r#"{"message":"ya usado"}"#), (200, "{}")));
    let client = RedemptionClient::new(mock.clone(), DEVICE_TAG);

    let outcome = client.run(&context("ABC123")).await;
    let details: Value = serde_json::from_str(outcome.details.as_deref().expect("details present"))
        .expect("details are JSON");

    assert_eq!(details["step"], "claim");
    assert_eq!(details["status"], 409);
    assert_eq!(details["body"]["message"], "ya usado");
}

// ========== Confirmation session ==========

#[tokio::test]
async fn info_populates_ready_state() {
    let mock = Arc::new(MockApi::with_info(
        (
            200,
            r#"{"status":"new","promotion":{"title":"Promo"},"commerce":{"name":"Bar"}}"#,
        ),
        (200, "{}"),
        (200, "{}"),
    ));
    let mut session = ConfirmationSession::new(mock.clone(), DEVICE_TAG, context("ABC123"));

    match session.load_info().await {
        SessionState::Ready(info) => {
            assert_eq!(info.status.as_deref(), Some("new"));
            assert_eq!(
                info.promotion.as_ref().and_then(|p| p.title.as_deref()),
                Some("Promo")
            );
            assert_eq!(
                info.commerce.as_ref().and_then(|c| c.name.as_deref()),
                Some("Bar")
            );
        }
        other => panic!("expected Ready, got {:?}", other),
    }

    assert!(session.can_confirm());
}

#[tokio::test]
async fn redeemed_status_disables_confirmation() {
    let mock = Arc::new(MockApi::with_info(
        (200, r#"{"status":"redeemed"}"#),
        (200, "{}"),
        (200, "{}"),
    ));
    let mut session = ConfirmationSession::new(mock.clone(), DEVICE_TAG, context("ABC123"));

    session.load_info().await;

    assert!(!session.can_confirm());
    assert!(session.confirm().await.is_none());
    assert_eq!(mock.claim_count(), 0);
}

#[tokio::test]
async fn expired_status_disables_confirmation() {
    let mock = Arc::new(MockApi::with_info(
        (200, r#"{"status":"expired"}"#),
        (200, "{}"),
        (200, "{}"),
    ));
    let mut session = ConfirmationSession::new(mock.clone(), DEVICE_TAG, context("ABC123"));

    session.load_info().await;

    assert!(!session.can_confirm());
}

#[tokio::test]
async fn status_check_is_case_insensitive() {
    let mock = Arc::new(MockApi::with_info(
        (200, r#"{"status":"CLAIMED"}"#),
        (200, "{}"),
        (200, "{}"),
    ));
    let mut session = ConfirmationSession::new(mock.clone(), DEVICE_TAG, context("ABC123"));

    session.load_info().await;

    assert!(session.can_confirm());
}

#[tokio::test]
async fn info_failure_keeps_confirmation_open() {
    let mock = Arc::new(MockApi::with_info(
        (500, r#"{"message":"detalle no disponible"}"#),
        (200, "{}"),
        (200, "{}"),
    ));
    let mut session = ConfirmationSession::new(mock.clone(), DEVICE_TAG, context("ABC123"));

    match session.load_info().await {
        SessionState::InfoFailed(message) => assert_eq!(message, "detalle no disponible"),
        other => panic!("expected InfoFailed, got {:?}", other),
    }

    assert!(session.can_confirm());

    let status = session.confirm().await.map(|outcome| outcome.status);
    assert_eq!(status, Some(OutcomeTag::Ok));
    assert_eq!(mock.claim_count(), 1);
}

#[tokio::test]
async fn terminal_session_rejects_a_second_confirm() {
    let mock = Arc::new(MockApi::new((200, "{}"), (200, "{}")));
    let mut session = ConfirmationSession::new(mock.clone(), DEVICE_TAG, context("ABC123"));

    session.load_info().await;

    assert!(session.confirm().await.is_some());
    assert!(!session.can_confirm());
    assert!(session.confirm().await.is_none());
    assert_eq!(mock.claim_count(), 1);
}

#[tokio::test]
async fn scan_context_parameters_reach_the_redeem_body() {
    let mock = Arc::new(MockApi::new((200, "{}"), (200, "{}")));
    let client = RedemptionClient::new(mock.clone(), DEVICE_TAG);

    let ctx = context("https://x.com/api/v1/promotions/qrs/XYZ9?dni=123&external_user_id=u-9");
    assert_eq!(ctx.code, "XYZ9");

    client.run(&ctx).await;

    let redeem = mock.redeem_calls.lock().expect("redeem lock poisoned")[0].clone();
    assert_eq!(redeem.dni.as_deref(), Some("123"));
    assert_eq!(redeem.external_user_id.as_deref(), Some("u-9"));
}

#[test]
fn invalid_payload_yields_invalid_qr_outcome() {
    assert!(ScanContext::from_payload("not a code!!").is_none());

    let outcome = RedemptionOutcome::invalid_qr();
    assert_eq!(outcome.status, OutcomeTag::Error);
    assert_eq!(outcome.category, OutcomeCategory::InvalidCode);
    assert_eq!(outcome.title, "QR inválido");
}

#[test]
fn scan_gate_blocks_until_release() {
    let mut gate = ScanGate::new();

    assert!(gate.begin());
    assert!(gate.is_processing());
    assert!(!gate.begin());

    gate.release();
    assert!(gate.begin());
}
