//! ton_proof pipeline tests
//!
//! End-to-end checks of `ProofVerifier` with wallets whose keys the test
//! holds, plus one vector produced by an independent implementation.


use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use test_helpers::*;
use tonproof::{
    state_init, HmacPayloadIssuer, PayloadCheck, ProofRequest, ServiceError, TonDomain,
    TonNetwork, TonProof, VerificationOutcome, WalletTemplate,
};

const NOW: u64 = PROOF_TIME + 60;

fn found_nothing() -> Arc<StubResolver> {
    StubResolver::new(ResolverBehavior::NotFound)
}

// ============================================================================
// SCENARIOS
// ============================================================================

#[tokio::test]
async fn test_valid_proof_for_every_known_template() {
    for (seed, template) in WalletTemplate::ALL.into_iter().enumerate() {
        let wallet = TestWallet::standard(seed as u8 + 1, template, 0);
        let resolver = found_nothing();
        let verifier = create_verifier(resolver.clone());

        let outcome = verifier.verify_at(&wallet.default_request(), NOW).await.unwrap();
        assert_eq!(outcome, VerificationOutcome::Valid, "{} wallet should verify", template);
        assert_eq!(resolver.calls(), 0, "known code must not hit the network");
    }
}

#[tokio::test]
async fn test_tampered_payload_is_hash_mismatch() {
    let wallet = TestWallet::standard(1, WalletTemplate::V3R2, 0);
    let mut request = wallet.default_request();
    request.proof.payload = "another-payload".to_string();

    let outcome = create_verifier(found_nothing()).verify_at(&request, NOW).await.unwrap();
    assert_eq!(outcome, VerificationOutcome::HashMismatch);
}

#[tokio::test]
async fn test_foreign_domain_rejected() {
    let wallet = TestWallet::standard(1, WalletTemplate::V3R2, 0);
    let request = wallet.signed_request("evil.com", PROOF_TIME, "p");

    let outcome = create_verifier(found_nothing()).verify_at(&request, NOW).await.unwrap();
    assert_eq!(outcome, VerificationOutcome::DomainNotAllowed);
}

#[tokio::test]
async fn test_domain_must_match_exactly() {
    let wallet = TestWallet::standard(1, WalletTemplate::V3R2, 0);
    let verifier = create_verifier(found_nothing());

    for domain in ["EXAMPLE.COM", "Example.com", " example.com", "example.com."] {
        let request = wallet.signed_request(domain, PROOF_TIME, "p");
        assert_eq!(
            verifier.verify_at(&request, NOW).await.unwrap(),
            VerificationOutcome::DomainNotAllowed,
            "domain {:?}",
            domain
        );
    }
}

#[tokio::test]
async fn test_expiry_boundary() {
    let wallet = TestWallet::standard(1, WalletTemplate::V3R2, 0);
    let request = wallet.default_request();
    let verifier = create_verifier(found_nothing());
    let deadline = PROOF_TIME + PAYLOAD_TTL.as_secs();

    assert_eq!(
        verifier.verify_at(&request, deadline).await.unwrap(),
        VerificationOutcome::Valid
    );
    assert_eq!(
        verifier.verify_at(&request, deadline + 1).await.unwrap(),
        VerificationOutcome::ProofExpired
    );
}

#[tokio::test]
async fn test_claimed_key_of_someone_else() {
    let wallet = TestWallet::standard(1, WalletTemplate::V3R2, 0);
    let other = TestWallet::standard(2, WalletTemplate::V3R2, 0);
    let mut request = wallet.default_request();
    request.public_key = other.public_key_hex();

    let outcome = create_verifier(found_nothing()).verify_at(&request, NOW).await.unwrap();
    assert_eq!(outcome, VerificationOutcome::PublicKeyMismatch);
}

#[tokio::test]
async fn test_claimed_key_is_case_insensitive() {
    let wallet = TestWallet::standard(1, WalletTemplate::V3R2, 0);
    let mut request = wallet.default_request();
    request.public_key = request.public_key.to_uppercase();

    let outcome = create_verifier(found_nothing()).verify_at(&request, NOW).await.unwrap();
    assert_eq!(outcome, VerificationOutcome::Valid);
}

#[tokio::test]
async fn test_state_init_of_another_wallet() {
    let wallet = TestWallet::standard(1, WalletTemplate::V3R2, 0);
    let victim = TestWallet::standard(2, WalletTemplate::V3R2, 0);

    // attacker signs for the victim's address with their own state-init and key
    let mut request = wallet.default_request();
    request.address = victim.address.to_raw();

    let outcome = create_verifier(found_nothing()).verify_at(&request, NOW).await.unwrap();
    assert_eq!(outcome, VerificationOutcome::AddressMismatch);
}

#[tokio::test]
async fn test_masterchain_wallet() {
    let wallet = TestWallet::standard(3, WalletTemplate::V3R1, -1);
    let request = wallet.default_request();
    assert!(request.address.starts_with("-1:"));

    let outcome = create_verifier(found_nothing()).verify_at(&request, NOW).await.unwrap();
    assert_eq!(outcome, VerificationOutcome::Valid);
}

// ============================================================================
// GATE ORDER
// ============================================================================

#[tokio::test]
async fn test_bad_address_wins_over_everything() {
    let wallet = TestWallet::standard(1, WalletTemplate::V3R2, 0);
    let verifier = create_verifier(found_nothing());

    for address in ["", "garbage", "0:abcd", "EQBhvfMi41dQD2yn5gp_W6OMhkBDQWYrABOTORSt8l4zihAA"] {
        let mut request = wallet.signed_request("evil.com", 1, "p");
        request.address = address.to_string();
        request.proof.state_init = None;

        let outcome = verifier.verify_at(&request, NOW).await.unwrap();
        assert_eq!(outcome, VerificationOutcome::InvalidAddress, "address {:?}", address);
    }
}

#[tokio::test]
async fn test_init_state_checked_before_domain() {
    let wallet = TestWallet::standard(1, WalletTemplate::V3R2, 0);
    let verifier = create_verifier(found_nothing());

    let mut missing = wallet.signed_request("evil.com", PROOF_TIME, "p");
    missing.proof.state_init = None;
    assert_eq!(
        verifier.verify_at(&missing, NOW).await.unwrap(),
        VerificationOutcome::InvalidInitState
    );

    let mut corrupted = wallet.default_request();
    corrupted.proof.state_init = Some(corrupt_boc(&wallet.state_init_boc()));
    assert_eq!(
        verifier.verify_at(&corrupted, NOW).await.unwrap(),
        VerificationOutcome::InvalidInitState
    );

    let mut deep = wallet.default_request();
    deep.proof.state_init = Some(deep_code_state_init(100_000));
    assert_eq!(
        verifier.verify_at(&deep, NOW).await.unwrap(),
        VerificationOutcome::InvalidInitState
    );

    let mut not_base64 = wallet.default_request();
    not_base64.proof.state_init = Some("%%%".to_string());
    assert_eq!(
        verifier.verify_at(&not_base64, NOW).await.unwrap(),
        VerificationOutcome::InvalidInitState
    );
}

#[tokio::test]
async fn test_domain_checked_before_expiry() {
    let wallet = TestWallet::standard(1, WalletTemplate::V3R2, 0);
    let request = wallet.signed_request("evil.com", 1, "p");

    let outcome = create_verifier(found_nothing()).verify_at(&request, NOW).await.unwrap();
    assert_eq!(outcome, VerificationOutcome::DomainNotAllowed);
}

#[tokio::test]
async fn test_expiry_checked_before_key() {
    let wallet = TestWallet::standard(1, WalletTemplate::V3R2, 0);
    let mut request = wallet.signed_request(DOMAIN, 1, "p");
    request.public_key = "00".repeat(32);

    let outcome = create_verifier(found_nothing()).verify_at(&request, NOW).await.unwrap();
    assert_eq!(outcome, VerificationOutcome::ProofExpired);
}

#[tokio::test]
async fn test_lying_domain_length_is_hash_mismatch() {
    let wallet = TestWallet::standard(1, WalletTemplate::V3R2, 0);
    let mut request = wallet.default_request();
    request.proof.domain.length_bytes += 1;

    let outcome = create_verifier(found_nothing()).verify_at(&request, NOW).await.unwrap();
    assert_eq!(outcome, VerificationOutcome::HashMismatch);
}

#[tokio::test]
async fn test_garbage_signature_is_hash_mismatch() {
    let wallet = TestWallet::standard(1, WalletTemplate::V3R2, 0);
    let verifier = create_verifier(found_nothing());

    let zeroes = STANDARD.encode([0u8; 64]);
    for signature in ["", "not base64", "AAAA", zeroes.as_str()] {
        let mut request = wallet.default_request();
        request.proof.signature = signature.to_string();
        assert_eq!(
            verifier.verify_at(&request, NOW).await.unwrap(),
            VerificationOutcome::HashMismatch,
            "signature {:?}",
            signature
        );
    }
}

#[tokio::test]
async fn test_flipped_signature_byte_is_hash_mismatch() {
    let wallet = TestWallet::standard(1, WalletTemplate::V3R2, 0);
    let verifier = create_verifier(found_nothing());

    let mut request = wallet.default_request();
    assert_eq!(verifier.verify_at(&request, NOW).await.unwrap(), VerificationOutcome::Valid);

    let mut signature = STANDARD.decode(&request.proof.signature).unwrap();
    signature[10] ^= 0x01;
    request.proof.signature = STANDARD.encode(&signature);
    assert_eq!(
        verifier.verify_at(&request, NOW).await.unwrap(),
        VerificationOutcome::HashMismatch
    );
}

// ============================================================================
// RESOLVER FALLBACK
// ============================================================================

#[tokio::test]
async fn test_unknown_code_uses_resolver() {
    let wallet = TestWallet::custom(4, 0);
    let resolver = StubResolver::new(ResolverBehavior::Key(wallet.public_key()));
    let verifier = create_verifier(resolver.clone());

    let outcome = verifier.verify_at(&wallet.default_request(), NOW).await.unwrap();
    assert_eq!(outcome, VerificationOutcome::Valid);
    assert_eq!(resolver.calls(), 1);
}

#[tokio::test]
async fn test_resolver_key_differs_from_claim() {
    let wallet = TestWallet::custom(4, 0);
    let resolver = StubResolver::new(ResolverBehavior::Key([9u8; 32]));

    let outcome = create_verifier(resolver)
        .verify_at(&wallet.default_request(), NOW)
        .await
        .unwrap();
    assert_eq!(outcome, VerificationOutcome::PublicKeyMismatch);
}

#[tokio::test]
async fn test_state_init_without_data_uses_resolver() {
    let mut wallet = TestWallet::custom(4, 0);
    wallet.state_init.data = None;
    let wallet = TestWallet {
        address: tonproof::derive_address(&wallet.state_init, 0).unwrap(),
        ..wallet
    };
    let resolver = StubResolver::new(ResolverBehavior::Key(wallet.public_key()));

    let outcome = create_verifier(resolver.clone())
        .verify_at(&wallet.default_request(), NOW)
        .await
        .unwrap();
    assert_eq!(outcome, VerificationOutcome::Valid);
    assert_eq!(resolver.calls(), 1);
}

#[tokio::test]
async fn test_resolver_not_found_is_key_unresolvable() {
    let wallet = TestWallet::custom(4, 0);
    let outcome = create_verifier(found_nothing())
        .verify_at(&wallet.default_request(), NOW)
        .await
        .unwrap();
    assert_eq!(outcome, VerificationOutcome::KeyUnresolvable);
}

#[tokio::test]
async fn test_resolver_failure_is_service_error() {
    let wallet = TestWallet::custom(4, 0);
    let err = create_verifier(StubResolver::new(ResolverBehavior::Fail))
        .verify_at(&wallet.default_request(), NOW)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::LookupFailed(_)), "got {:?}", err);
}

#[tokio::test(start_paused = true)]
async fn test_resolver_timeout_is_service_error() {
    let wallet = TestWallet::custom(4, 0);
    let err = create_verifier(StubResolver::new(ResolverBehavior::Hang))
        .verify_at(&wallet.default_request(), NOW)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Timeout(t) if t == RESOLVER_TIMEOUT));
}

// ============================================================================
// PAYLOAD GATE
// ============================================================================

#[tokio::test]
async fn test_issued_payload_accepted_forged_rejected() {
    let wallet = TestWallet::standard(1, WalletTemplate::V3R2, 0);
    let issuer = Arc::new(HmacPayloadIssuer::new(b"integration-secret".to_vec()).unwrap());
    let verifier = create_verifier_with_payloads(found_nothing(), issuer.clone(), PayloadCheck::BeforeSignature);

    let token = issuer.token_expiring_at(u64::MAX).unwrap();
    let good = wallet.signed_request(DOMAIN, PROOF_TIME, &token);
    assert_eq!(verifier.verify_at(&good, NOW).await.unwrap(), VerificationOutcome::Valid);

    let forged = wallet.signed_request(DOMAIN, PROOF_TIME, &"ab".repeat(48));
    assert_eq!(
        verifier.verify_at(&forged, NOW).await.unwrap(),
        VerificationOutcome::InvalidPayload
    );
}

#[tokio::test]
async fn test_payload_gate_placement() {
    let wallet = TestWallet::standard(1, WalletTemplate::V3R2, 0);
    let mut bad_signature = wallet.default_request();
    bad_signature.proof.signature = STANDARD.encode([1u8; 64]);

    let before = RecordingIssuer::new(false);
    let verifier = create_verifier_with_payloads(found_nothing(), before.clone(), PayloadCheck::BeforeSignature);
    assert_eq!(
        verifier.verify_at(&bad_signature, NOW).await.unwrap(),
        VerificationOutcome::InvalidPayload
    );
    assert_eq!(before.checks(), 1);

    let after = RecordingIssuer::new(false);
    let verifier = create_verifier_with_payloads(found_nothing(), after.clone(), PayloadCheck::AfterSignature);
    assert_eq!(
        verifier.verify_at(&bad_signature, NOW).await.unwrap(),
        VerificationOutcome::HashMismatch
    );
    assert_eq!(after.checks(), 0, "signature failure stops before the payload gate");
    assert_eq!(
        verifier.verify_at(&wallet.default_request(), NOW).await.unwrap(),
        VerificationOutcome::InvalidPayload
    );

    let disabled = RecordingIssuer::new(false);
    let verifier = create_verifier_with_payloads(found_nothing(), disabled.clone(), PayloadCheck::Disabled);
    assert_eq!(
        verifier.verify_at(&wallet.default_request(), NOW).await.unwrap(),
        VerificationOutcome::Valid
    );
    assert_eq!(disabled.checks(), 0);
}

#[tokio::test]
async fn test_payload_checked_after_address() {
    let wallet = TestWallet::standard(1, WalletTemplate::V3R2, 0);
    let victim = TestWallet::standard(2, WalletTemplate::V3R2, 0);
    let mut request = wallet.default_request();
    request.address = victim.address.to_raw();

    let issuer = RecordingIssuer::new(false);
    let verifier = create_verifier_with_payloads(found_nothing(), issuer.clone(), PayloadCheck::BeforeSignature);
    assert_eq!(
        verifier.verify_at(&request, NOW).await.unwrap(),
        VerificationOutcome::AddressMismatch
    );
    assert_eq!(issuer.checks(), 0);
}

// ============================================================================
// INDEPENDENT VECTOR
// ============================================================================

// produced outside this crate: seed [7; 32], wallet v3R2, basechain
const VECTOR_STATE_INIT: &str = "te6cckEBAwEAoAACATQBAgDe/wAg3SCCAUyXuiGCATOcurGfcbDtRNDTH9MfMdcL/+ME4KTyYIMI1xgg0x/TH9Mf+CMTu/Jj7UTQ0x/TH9P/0VEyuvKhUUS68qIE+QFUEFX5EPKj+ACTINdKltMH1AL7AOjRAaTIyx/LH8v/ye1UAFAAAAAAKamjF+pKbGPinFIKvvVQexMuxfmVR3auvr57kkIe6mkURtIs1L7flw==";
const VECTOR_ADDRESS: &str = "0:61bdf322e357500f6ca7e60a7f5ba38c86404341662b0013933914adf25e338a";
const VECTOR_PUBLIC_KEY: &str = "ea4a6c63e29c520abef5507b132ec5f9954776aebebe7b92421eea691446d22c";
const VECTOR_SIGNATURE: &str = "ElI7+p8kAkIa4FtbHZGus09TtIjQ8glZJ9tjYU5C5XQm+72nJS5CB1Zj0wRyXlNF1VxTk/UTwByWxcOZdSPYAg==";

fn vector_request() -> ProofRequest {
    ProofRequest {
        address: VECTOR_ADDRESS.to_string(),
        network: TonNetwork::Mainnet,
        public_key: VECTOR_PUBLIC_KEY.to_string(),
        proof: TonProof {
            timestamp: PROOF_TIME,
            domain: TonDomain::new(DOMAIN),
            payload: "c0ffee-payload".to_string(),
            signature: VECTOR_SIGNATURE.to_string(),
            state_init: Some(VECTOR_STATE_INIT.to_string()),
        },
    }
}

#[tokio::test]
async fn test_independent_vector_verifies() {
    let outcome = create_verifier(found_nothing())
        .verify_at(&vector_request(), NOW)
        .await
        .unwrap();
    assert_eq!(outcome, VerificationOutcome::Valid);
}

#[test]
fn test_independent_vector_round_trip() {
    let decoded = state_init::decode(VECTOR_STATE_INIT).unwrap();
    let derived = state_init::derive_address(&decoded.state_init, 0).unwrap();
    assert_eq!(derived.to_raw(), VECTOR_ADDRESS);

    // our own wallet builder reproduces the same deployment byte for byte
    let wallet = TestWallet::standard(7, WalletTemplate::V3R2, 0);
    assert_eq!(wallet.state_init_boc(), VECTOR_STATE_INIT);
    assert_eq!(wallet.address.to_raw(), VECTOR_ADDRESS);
    assert_eq!(wallet.public_key_hex(), VECTOR_PUBLIC_KEY);
}

#[tokio::test]
async fn test_request_from_json() {
    let json = serde_json::json!({
        "address": VECTOR_ADDRESS,
        "network": "-239",
        "public_key": VECTOR_PUBLIC_KEY,
        "proof": {
            "timestamp": PROOF_TIME,
            "domain": { "lengthBytes": 11, "value": DOMAIN },
            "payload": "c0ffee-payload",
            "signature": VECTOR_SIGNATURE,
            "state_init": VECTOR_STATE_INIT,
        }
    });
    let request: ProofRequest = serde_json::from_value(json).unwrap();
    assert_eq!(request, vector_request());

    let outcome = create_verifier(found_nothing()).verify_at(&request, NOW).await.unwrap();
    assert_eq!(serde_json::to_value(outcome).unwrap(), "valid");
}
