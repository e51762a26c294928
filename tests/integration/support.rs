//! Shared fixtures: signing keys, SET minting, a recording identity provider, and log capture.

// std
use std::{
	collections::HashSet,
	io,
	sync::{
		Arc, Mutex,
		atomic::{AtomicUsize, Ordering},
	},
	time::Duration,
};
// crates.io
use async_trait::async_trait;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde_json::{Value, json};
use tokio::{
	io::{AsyncReadExt, AsyncWriteExt},
	net::{TcpListener, TcpStream},
};
use shared_signal_receiver::{
	Error, IdentityProvider, JwksResolver, ReceiverSettings, Result, SetVerifier,
	SharedSignalsConfig,
	http::{client::RetryingClient, retry::RetryConfig},
};
use tracing_subscriber::fmt::MakeWriter;
use url::Url;
use wiremock::{
	Mock, MockServer, ResponseTemplate,
	matchers::{method, path},
};

pub const AUDIENCE: &str = "https://service.example.gov.uk";
pub const ISSUER: &str = "https://identity.example.com";
pub const JWKS_PATH: &str = "/.well-known/jwks.json";
pub const KID: &str = "primary";
pub const USER_ID: &str = "urn:fdc:example.gov.uk:2022:user-1";

pub const CREDENTIAL_CHANGE: &str =
	"https://schemas.openid.net/secevent/caep/event-type/credential-change";
pub const CREDENTIAL_CHANGE_INFORMATION: &str =
	"https://vocab.account.gov.uk/secevent/v1/credentialChange/eventInformation";
pub const ACCOUNT_PURGED: &str =
	"https://schemas.openid.net/secevent/risc/event-type/account-purged";
pub const VERIFICATION: &str = "https://schemas.openid.net/secevent/ssf/event-type/verification";

const SIGNING_KEY: &[u8] = include_bytes!("../fixtures/signing_key.pem");
const ROGUE_KEY: &[u8] = include_bytes!("../fixtures/rogue_key.pem");
const JWKS: &str = include_str!("../fixtures/jwks.json");

pub fn init_tracing() {
	let _ = tracing_subscriber::fmt::try_init();
}

/// Serve the fixture key set; `expected` pins the number of fetches when given.
pub async fn mount_jwks(server: &MockServer, expected: Option<u64>) {
	let mock = Mock::given(method("GET")).and(path(JWKS_PATH)).respond_with(
		ResponseTemplate::new(200)
			.set_body_string(JWKS)
			.insert_header("content-type", "application/json"),
	);
	let mock = match expected {
		Some(expected) => mock.expect(expected),
		None => mock,
	};

	mock.mount(server).await;
}

pub fn jwks_uri(server: &MockServer) -> String {
	format!("{}{JWKS_PATH}", server.uri())
}

pub fn signals(server: &MockServer) -> SharedSignalsConfig {
	SharedSignalsConfig::new(AUDIENCE, ISSUER, jwks_uri(server)).expect("signals config")
}

pub fn settings(server: &MockServer) -> ReceiverSettings {
	ReceiverSettings::new(signals(server)).with_require_https(false)
}

pub fn verifier() -> SetVerifier {
	let retry = RetryConfig::default().with_base_delay(Duration::from_millis(5));
	let client = RetryingClient::new(retry).expect("client");

	SetVerifier::new(Arc::new(JwksResolver::new(client)))
}

pub fn claims(events: Value) -> Value {
	json!({
		"iss": ISSUER,
		"aud": AUDIENCE,
		"iat": chrono::Utc::now().timestamp(),
		"jti": format!("jti-{}", next_id()),
		"events": events,
	})
}

pub fn set_header() -> Header {
	let mut header = Header::new(Algorithm::RS256);

	header.kid = Some(KID.into());
	header.typ = Some("secevent+jwt".into());

	header
}

pub fn sign(header: &Header, claims: &Value) -> String {
	let key = EncodingKey::from_rsa_pem(SIGNING_KEY).expect("signing key");

	jsonwebtoken::encode(header, claims, &key).expect("token")
}

pub fn sign_with_rogue_key(header: &Header, claims: &Value) -> String {
	let key = EncodingKey::from_rsa_pem(ROGUE_KEY).expect("rogue key");

	jsonwebtoken::encode(header, claims, &key).expect("token")
}

pub fn mint(events: Value) -> (String, String) {
	let claims = claims(events);
	let jti = claims["jti"].as_str().expect("jti").to_owned();

	(sign(&set_header(), &claims), jti)
}

pub fn password_change(user_id: &str) -> Value {
	json!({
		CREDENTIAL_CHANGE: {
			"change_type": "update",
			"credential_type": "password",
			"subject": { "format": "urn:example:format:account-id", "uri": user_id }
		}
	})
}

pub fn email_change(user_id: &str, email: Option<&str>) -> Value {
	let mut events = json!({
		CREDENTIAL_CHANGE: {
			"change_type": "update",
			"credential_type": "email",
			"subject": { "format": "urn:example:format:account-id", "uri": user_id }
		}
	});

	if let Some(email) = email {
		events[CREDENTIAL_CHANGE_INFORMATION] = json!({ "email": email });
	}

	events
}

pub fn account_purged(user_id: &str) -> Value {
	json!({
		ACCOUNT_PURGED: {
			"subject": { "format": "urn:example:format:account-id", "uri": user_id }
		}
	})
}

fn next_id() -> u64 {
	use std::sync::atomic::AtomicU64;

	static NEXT: AtomicU64 = AtomicU64::new(1);

	NEXT.fetch_add(1, Ordering::Relaxed)
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Call {
	GlobalSignOut(String),
	DeleteUser(String),
	UpdateEmail(String, String),
	UserExists(String),
}

/// In-memory user directory recording every call in order.
#[derive(Debug, Default)]
pub struct RecordingProvider {
	users: Mutex<HashSet<String>>,
	calls: Mutex<Vec<Call>>,
	refuse_delete: bool,
	fail_sign_out: bool,
}
impl RecordingProvider {
	pub fn with_user(user_id: &str) -> Self {
		let provider = Self::default();

		provider.users.lock().expect("users").insert(user_id.to_owned());

		provider
	}

	pub fn refusing_delete(mut self) -> Self {
		self.refuse_delete = true;

		self
	}

	pub fn failing_sign_out(mut self) -> Self {
		self.fail_sign_out = true;

		self
	}

	pub fn calls(&self) -> Vec<Call> {
		self.calls.lock().expect("calls").clone()
	}

	pub fn side_effects(&self) -> Vec<Call> {
		self.calls().into_iter().filter(|call| !matches!(call, Call::UserExists(_))).collect()
	}

	fn record(&self, call: Call) {
		self.calls.lock().expect("calls").push(call);
	}
}
#[async_trait]
impl IdentityProvider for RecordingProvider {
	async fn global_sign_out(&self, user_id: &str) -> Result<bool> {
		self.record(Call::GlobalSignOut(user_id.to_owned()));

		if self.fail_sign_out {
			return Err(Error::identity_provider("global_sign_out", "directory throttled"));
		}

		Ok(true)
	}

	async fn delete_user(&self, user_id: &str) -> Result<bool> {
		self.record(Call::DeleteUser(user_id.to_owned()));

		Ok(!self.refuse_delete && self.users.lock().expect("users").remove(user_id))
	}

	async fn update_email(&self, user_id: &str, email: &str) -> Result<bool> {
		self.record(Call::UpdateEmail(user_id.to_owned(), email.to_owned()));

		Ok(true)
	}

	async fn user_exists(&self, user_id: &str) -> Result<bool> {
		self.record(Call::UserExists(user_id.to_owned()));

		Ok(self.users.lock().expect("users").contains(user_id))
	}
}

/// Captures formatted log output for assertions.
#[derive(Clone, Debug, Default)]
pub struct LogCapture(Arc<Mutex<Vec<u8>>>);
impl LogCapture {
	/// Install a thread-local subscriber writing into the buffer until the guard drops.
	pub fn install(&self) -> tracing::subscriber::DefaultGuard {
		let subscriber = tracing_subscriber::fmt()
			.with_ansi(false)
			.with_max_level(tracing::Level::DEBUG)
			.with_writer(self.clone())
			.finish();

		tracing::subscriber::set_default(subscriber)
	}

	pub fn contents(&self) -> String {
		String::from_utf8_lossy(&self.0.lock().expect("log buffer")).into_owned()
	}
}
impl io::Write for LogCapture {
	fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
		self.0.lock().expect("log buffer").extend_from_slice(buf);

		Ok(buf.len())
	}

	fn flush(&mut self) -> io::Result<()> {
		Ok(())
	}
}
impl<'a> MakeWriter<'a> for LogCapture {
	type Writer = Self;

	fn make_writer(&'a self) -> Self::Writer {
		self.clone()
	}
}

/// Plain TCP listener for transport failures wiremock cannot produce.
#[derive(Clone, Debug)]
pub struct RawServer {
	url: Url,
	accepted: Arc<AtomicUsize>,
}
impl RawServer {
	/// Answer every request with `200` headers announcing a body that never arrives.
	pub async fn stalled_body() -> Self {
		Self::spawn(|_, mut stream| async move {
			read_request(&mut stream).await;

			let _ = stream
				.write_all(
					b"HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: 1000\r\n\r\n{\"keys\":",
				)
				.await;

			tokio::time::sleep(Duration::from_secs(30)).await;
		})
		.await
	}

	/// Close the first `dropped` connections without a response, then answer `200 {}`.
	pub async fn dropping_first(dropped: usize) -> Self {
		Self::spawn(move |index, mut stream| async move {
			if index < dropped {
				return;
			}

			read_request(&mut stream).await;

			let _ = stream
				.write_all(
					b"HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: 2\r\nconnection: close\r\n\r\n{}",
				)
				.await;
			let _ = stream.shutdown().await;
		})
		.await
	}

	pub fn url(&self) -> &Url {
		&self.url
	}

	/// Connections accepted so far.
	pub fn accepted(&self) -> usize {
		self.accepted.load(Ordering::SeqCst)
	}

	async fn spawn<F, Fut>(serve: F) -> Self
	where
		F: Fn(usize, TcpStream) -> Fut + Send + 'static,
		Fut: Future<Output = ()> + Send + 'static,
	{
		let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
		let address = listener.local_addr().expect("local address");
		let accepted = Arc::new(AtomicUsize::new(0));
		let counter = accepted.clone();

		tokio::spawn(async move {
			while let Ok((stream, _)) = listener.accept().await {
				let index = counter.fetch_add(1, Ordering::SeqCst);

				tokio::spawn(serve(index, stream));
			}
		});

		let url = Url::parse(&format!("http://{address}{JWKS_PATH}")).expect("raw server url");

		Self { url, accepted }
	}
}

async fn read_request(stream: &mut TcpStream) {
	let mut request = Vec::new();
	let mut buffer = [0; 1024];

	while !request.windows(4).any(|window| window == b"\r\n\r\n") {
		match stream.read(&mut buffer).await {
			Ok(0) | Err(_) => return,
			Ok(read) => request.extend_from_slice(&buffer[..read]),
		}
	}
}
