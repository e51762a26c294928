//! Security event types and their typed bodies.
//!
//! A verified payload carries an `events` map keyed by event-type URI. [`SecurityEvent::parse`]
//! turns the entry for one known URI into a typed variant; unknown URIs and malformed bodies
//! produce `None` rather than an error so the dispatcher can move on to the next registration.

// crates.io
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};

/// CAEP credential-change event URI.
pub const CREDENTIAL_CHANGE_URI: &str =
	"https://schemas.openid.net/secevent/caep/event-type/credential-change";
/// RISC account-purged event URI.
pub const ACCOUNT_PURGED_URI: &str =
	"https://schemas.openid.net/secevent/risc/event-type/account-purged";
/// SSF stream verification event URI.
pub const VERIFICATION_URI: &str =
	"https://schemas.openid.net/secevent/ssf/event-type/verification";
/// Companion event carrying the new address for an email credential change.
pub const CREDENTIAL_CHANGE_INFORMATION_URI: &str =
	"https://vocab.account.gov.uk/secevent/v1/credentialChange/eventInformation";

/// Event types this receiver understands.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventType {
	/// A credential of the subject changed.
	CredentialChange,
	/// The subject's account was purged at the transmitter.
	AccountPurged,
	/// Transmitter-initiated stream verification.
	Verification,
}
impl EventType {
	/// Every supported type, in default registration order.
	pub const ALL: [Self; 3] = [Self::CredentialChange, Self::AccountPurged, Self::Verification];

	/// Event-type URI used as the key in the `events` claim.
	pub const fn uri(self) -> &'static str {
		match self {
			Self::CredentialChange => CREDENTIAL_CHANGE_URI,
			Self::AccountPurged => ACCOUNT_PURGED_URI,
			Self::Verification => VERIFICATION_URI,
		}
	}

	/// Short name for logs and metric labels.
	pub const fn name(self) -> &'static str {
		match self {
			Self::CredentialChange => "credential_change",
			Self::AccountPurged => "account_purged",
			Self::Verification => "verification",
		}
	}

	/// Look up a type by its URI.
	pub fn from_uri(uri: &str) -> Option<Self> {
		Self::ALL.into_iter().find(|event_type| event_type.uri() == uri)
	}
}

/// Account identifier subject.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
	/// Subject identifier format, e.g. `urn:example:format:account-id`.
	pub format: String,
	/// Identifier of the affected user.
	pub uri: String,
}

/// Kind of credential change.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
	/// Credential replaced.
	Update,
	/// Credential removed.
	Delete,
	/// Credential added.
	Create,
	/// Credential revoked.
	Revoke,
}
impl ChangeType {
	/// Wire representation.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Update => "update",
			Self::Delete => "delete",
			Self::Create => "create",
			Self::Revoke => "revoke",
		}
	}
}

/// Credential affected by a change.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CredentialType {
	/// Sign-in email address.
	Email,
	/// Password.
	Password,
}

/// Body of a credential-change event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialChange {
	/// What happened to the credential.
	pub change_type: ChangeType,
	/// Which credential changed.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub credential_type: Option<CredentialType>,
	/// Affected account.
	pub subject: Subject,
	/// New address, taken from the companion information event.
	#[serde(skip)]
	pub email: Option<String>,
}

/// Body of an account-purged event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountPurged {
	/// Purged account.
	pub subject: Subject,
}

/// Body of a stream verification event.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verification {
	/// Opaque value echoed from the verification request.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub state: Option<String>,
}

#[derive(Deserialize)]
struct CredentialChangeInformation {
	#[serde(default)]
	email: Option<String>,
}

/// A recognised event extracted from a verified payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SecurityEvent {
	#[allow(missing_docs)]
	CredentialChange(CredentialChange),
	#[allow(missing_docs)]
	AccountPurged(AccountPurged),
	#[allow(missing_docs)]
	Verification(Verification),
}
impl SecurityEvent {
	/// Parse the body stored under `event_type`'s URI.
	///
	/// Returns `None` when the URI is absent or the body does not have the expected shape.
	pub fn parse(event_type: EventType, events: &Map<String, Value>) -> Option<Self> {
		let body = events.get(event_type.uri())?;

		match event_type {
			EventType::CredentialChange => {
				let mut change = from_body::<CredentialChange>(body)?;

				// A malformed companion event only means the address is unavailable.
				change.email = events
					.get(CREDENTIAL_CHANGE_INFORMATION_URI)
					.filter(|value| !value.is_null())
					.and_then(from_body::<CredentialChangeInformation>)
					.and_then(|information| information.email);

				Some(Self::CredentialChange(change))
			},
			EventType::AccountPurged => from_body(body).map(Self::AccountPurged),
			EventType::Verification => from_body(body).map(Self::Verification),
		}
	}

	/// Type of the event.
	pub fn event_type(&self) -> EventType {
		match self {
			Self::CredentialChange(_) => EventType::CredentialChange,
			Self::AccountPurged(_) => EventType::AccountPurged,
			Self::Verification(_) => EventType::Verification,
		}
	}

	/// Subject of the event, if the event concerns a user.
	pub fn subject(&self) -> Option<&Subject> {
		match self {
			Self::CredentialChange(change) => Some(&change.subject),
			Self::AccountPurged(purged) => Some(&purged.subject),
			Self::Verification(_) => None,
		}
	}

	/// Change type for events that carry one.
	pub fn change_type(&self) -> Option<ChangeType> {
		match self {
			Self::CredentialChange(change) => Some(change.change_type),
			_ => None,
		}
	}
}

fn from_body<T>(body: &Value) -> Option<T>
where
	T: DeserializeOwned,
{
	match T::deserialize(body) {
		Ok(value) => Some(value),
		Err(err) => {
			tracing::debug!(error = %err, "event body does not match its type");

			None
		},
	}
}
