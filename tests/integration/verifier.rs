//! Integration tests for SET signature and claim verification.

// crates.io
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde_json::json;
use shared_signal_receiver::{SetErrorCode, SetTokenError, VerifiedPayload};
use wiremock::MockServer;
// self
use crate::support::{self, AUDIENCE, ISSUER, USER_ID};

async fn verify(server: &MockServer, token: &str) -> Result<VerifiedPayload, SetTokenError> {
	support::verifier().verify(token.as_bytes(), &support::signals(server)).await
}

fn code(result: Result<VerifiedPayload, SetTokenError>) -> SetErrorCode {
	match result {
		Ok(payload) => panic!("token unexpectedly verified: {}", payload.jti),
		Err(err) => err.code(),
	}
}

fn tamper_signature(token: &str) -> String {
	let (signed, signature) = token.rsplit_once('.').expect("compact jws");
	let mut bytes = URL_SAFE_NO_PAD.decode(signature).expect("signature");

	bytes[0] ^= 0x01;

	format!("{signed}.{}", URL_SAFE_NO_PAD.encode(bytes))
}

#[tokio::test]
async fn valid_token_yields_claims() {
	support::init_tracing();

	let server = MockServer::start().await;

	support::mount_jwks(&server, Some(1)).await;

	let (token, jti) = support::mint(support::password_change(USER_ID));
	let payload = verify(&server, &token).await.expect("verified payload");

	assert_eq!(payload.jti, jti);
	assert_eq!(payload.iss, ISSUER);
	assert!(payload.aud.contains(AUDIENCE));
	assert!(payload.events.contains_key(support::CREDENTIAL_CHANGE));

	server.verify().await;
}

#[tokio::test]
async fn tampered_signature_fails_authentication() {
	support::init_tracing();

	let server = MockServer::start().await;

	support::mount_jwks(&server, None).await;

	let (token, _) = support::mint(support::password_change(USER_ID));

	assert_eq!(
		code(verify(&server, &tamper_signature(&token)).await),
		SetErrorCode::AuthenticationFailed
	);

	let claims = support::claims(support::password_change(USER_ID));
	let forged = support::sign_with_rogue_key(&support::set_header(), &claims);

	assert_eq!(code(verify(&server, &forged).await), SetErrorCode::AuthenticationFailed);
}

#[tokio::test]
async fn missing_kid_is_rejected_without_fetching_keys() {
	support::init_tracing();

	let server = MockServer::start().await;

	support::mount_jwks(&server, Some(0)).await;

	let mut header = support::set_header();

	header.kid = None;

	let token = support::sign(&header, &support::claims(support::password_change(USER_ID)));

	assert_eq!(code(verify(&server, &token).await), SetErrorCode::InvalidKey);

	server.verify().await;
}

#[tokio::test]
async fn claim_mismatches_are_indistinguishable_from_bad_signatures() {
	support::init_tracing();

	let server = MockServer::start().await;

	support::mount_jwks(&server, None).await;

	let mut wrong_audience = support::claims(support::password_change(USER_ID));

	wrong_audience["aud"] = json!("https://someone-else.example");

	let mut wrong_issuer = support::claims(support::password_change(USER_ID));

	wrong_issuer["iss"] = json!("https://attacker.example");

	let mut expired = support::claims(support::password_change(USER_ID));

	expired["exp"] = json!(chrono::Utc::now().timestamp() - 3_600);

	let mut issued_in_future = support::claims(support::password_change(USER_ID));

	issued_in_future["iat"] = json!(chrono::Utc::now().timestamp() + 3_600);

	let header = support::set_header();
	let errors = [
		verify(&server, &support::sign(&header, &wrong_audience)).await,
		verify(&server, &support::sign(&header, &wrong_issuer)).await,
		verify(&server, &support::sign(&header, &expired)).await,
		verify(&server, &support::sign(&header, &issued_in_future)).await,
	]
	.into_iter()
	.map(|result| result.expect_err("claim mismatch"))
	.collect::<Vec<_>>();

	for error in errors {
		assert_eq!(error.code(), SetErrorCode::AuthenticationFailed);
		assert_eq!(error.public_message(), SetErrorCode::AuthenticationFailed.public_message());
	}
}

#[tokio::test]
async fn header_policy_is_enforced() {
	support::init_tracing();

	let server = MockServer::start().await;

	support::mount_jwks(&server, None).await;

	let claims = support::claims(support::password_change(USER_ID));
	let mut plain_jwt = support::set_header();

	plain_jwt.typ = Some("JWT".into());

	assert_eq!(
		code(verify(&server, &support::sign(&plain_jwt, &claims)).await),
		SetErrorCode::AuthenticationFailed
	);

	let mut unknown_kid = support::set_header();

	unknown_kid.kid = Some("retired".into());

	assert_eq!(
		code(verify(&server, &support::sign(&unknown_kid, &claims)).await),
		SetErrorCode::AuthenticationFailed
	);

	let mut symmetric = Header::new(Algorithm::HS256);

	symmetric.kid = Some(support::KID.into());
	symmetric.typ = Some("secevent+jwt".into());

	let token = jsonwebtoken::encode(&symmetric, &claims, &EncodingKey::from_secret(b"secret"))
		.expect("token");

	assert_eq!(code(verify(&server, &token).await), SetErrorCode::AuthenticationFailed);
}

#[tokio::test]
async fn full_media_type_is_accepted_for_typ() {
	support::init_tracing();

	let server = MockServer::start().await;

	support::mount_jwks(&server, Some(1)).await;

	let verifier = support::verifier();
	let signals = support::signals(&server);
	let claims = support::claims(support::password_change(USER_ID));

	for typ in ["application/secevent+jwt", "SECEVENT+JWT"] {
		let mut header = support::set_header();

		header.typ = Some(typ.into());

		let token = support::sign(&header, &claims);
		let payload = verifier.verify(token.as_bytes(), &signals).await.expect(typ);

		assert_eq!(payload.iss, ISSUER);
	}

	server.verify().await;
}

#[tokio::test]
async fn malformed_input_is_an_invalid_request() {
	support::init_tracing();

	let server = MockServer::start().await;

	support::mount_jwks(&server, Some(0)).await;

	let verifier = support::verifier();
	let signals = support::signals(&server);

	for token in [&b"\xff\xfe\xfd"[..], &b"   "[..]] {
		let error = verifier.verify(token, &signals).await.expect_err("invalid token");

		assert_eq!(error.code(), SetErrorCode::InvalidRequest);
	}

	assert_eq!(code(verify(&server, "not-a-jwt").await), SetErrorCode::AuthenticationFailed);

	server.verify().await;
}
