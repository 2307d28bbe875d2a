use anyhow::Result;
use std::io::Write;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing_subscriber::EnvFilter;

use promo_scanner::{
    api::HttpPromoApi,
    config::Config,
    extractor::ScanContext,
    logger::TracingObserver,
    redemption::{OutcomeTag, RedemptionOutcome},
    session::{ConfirmationSession, ScanGate, SessionState},
};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("promo_scanner=info")),
        )
        .init();

    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    let api = Arc::new(HttpPromoApi::new(config.clone(), Arc::new(TracingObserver))?);

    println!("API: {}", config.api_base);
    println!("Escaneá un QR (o ingresá el código) y presioná Enter.");
    println!("================================");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut gate = ScanGate::new();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        if !gate.begin() {
            continue;
        }

        let Some(ctx) = ScanContext::from_payload(&line) else {
            print_outcome(&RedemptionOutcome::invalid_qr());
            println!("================================");
            gate.release();
            continue;
        };

        let mut session = ConfirmationSession::new(api.clone(), config.device_tag.clone(), ctx);
        session.load_info().await;
        print_session_info(session.state(), session.context());

        if session.can_confirm() && operator_confirms(&mut lines).await? {
            if let Some(outcome) = session.confirm().await {
                print_outcome(outcome);
            }
        } else {
            println!("↩️  Canje cancelado.");
        }

        println!("================================");
        gate.release();
    }

    Ok(())
}

fn print_session_info(state: &SessionState, ctx: &ScanContext) {
    println!("📷 Código: {}", ctx.code);

    match state {
        SessionState::Ready(info) => {
            let title = info
                .promotion
                .as_ref()
                .and_then(|promotion| promotion.title.as_deref())
                .unwrap_or("Promoción");
            let commerce = info
                .commerce
                .as_ref()
                .and_then(|commerce| commerce.name.as_deref())
                .unwrap_or("—");

            println!("🎁 {}", title);
            println!("🏪 Comercio: {}", commerce);
            if let Some(status) = info.status.as_deref() {
                println!("📍 Estado: {}", status);
            }
        }
        SessionState::InfoFailed(message) => {
            println!("⚠️  No se pudo obtener el detalle: {}", message);
        }
        _ => {}
    }
}

async fn operator_confirms(lines: &mut Lines<BufReader<Stdin>>) -> Result<bool> {
    print!("¿Confirmar canje? [s/N] ");
    std::io::stdout().flush()?;

    let answer = lines.next_line().await?.unwrap_or_default();
    Ok(matches!(
        answer.trim().to_lowercase().as_str(),
        "s" | "si" | "sí"
    ))
}

fn print_outcome(outcome: &RedemptionOutcome) {
    match outcome.status {
        OutcomeTag::Ok => println!("✅ {}: {}", outcome.title, outcome.message),
        OutcomeTag::Error => println!("❌ {}: {}", outcome.title, outcome.message),
    }

    if let Some(details) = &outcome.details {
        tracing::debug!(details = %details, "resultado");
    }
}
