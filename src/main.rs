//! `tonproof-verify <request.json>`
//!
//! Checks one `ton_proof` request file against the environment configuration
//! and prints the outcome as JSON.
//!
//! Exit codes: `0` valid, `1` rejected, `2` configuration, IO or lookup failure.

use std::process::ExitCode;
use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use tonproof::{
    HmacPayloadIssuer, PayloadCheck, ProofRequest, ProofVerifier, ServiceSettings,
    ToncenterResolver, VerifierConfig,
};

const EXIT_REJECTED: u8 = 1;
const EXIT_FAILURE: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    // Logs go to stderr; stdout carries only the JSON outcome
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("info,tonproof=debug")))
        .with(tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_level(true))
        .init();

    match run().await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(EXIT_REJECTED),
        Err(e) => {
            error!("{}", e);
            ExitCode::from(EXIT_FAILURE)
        }
    }
}

async fn run() -> Result<bool, String> {
    let path = std::env::args()
        .nth(1)
        .ok_or_else(|| "usage: tonproof-verify <request.json>".to_string())?;

    let config = VerifierConfig::from_env().map_err(|e| e.to_string())?;
    let settings = ServiceSettings::from_env().map_err(|e| e.to_string())?;

    info!("Allowed domains: {:?}", config.allowed_domains);
    info!("Payload TTL: {:?}, payload check: {}", config.payload_ttl, config.payload_check);

    let resolver = ToncenterResolver::new(settings.toncenter_api_key.clone(), config.resolver_timeout)
        .map_err(|e| e.to_string())?;

    let mut verifier = ProofVerifier::new(config.clone(), Arc::new(resolver));
    if config.payload_check != PayloadCheck::Disabled {
        let secret = settings
            .payload_secret
            .clone()
            .ok_or_else(|| format!("{} not set", tonproof::config::ENV_PAYLOAD_SECRET))?;
        let issuer = HmacPayloadIssuer::new(secret).map_err(|e| e.to_string())?;
        verifier = verifier.with_payload_issuer(Arc::new(issuer));
    }

    let raw = std::fs::read_to_string(&path).map_err(|e| format!("Failed to read {}: {}", path, e))?;
    let request: ProofRequest =
        serde_json::from_str(&raw).map_err(|e| format!("Invalid request JSON in {}: {}", path, e))?;

    let outcome = verifier.verify(&request).await.map_err(|e| e.to_string())?;

    let report = serde_json::json!({
        "address": request.address,
        "outcome": outcome,
    });
    println!("{}", report);

    Ok(outcome.is_valid())
}
