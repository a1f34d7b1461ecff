//! Identity token wrapper that redacts the signature in every formatted representation.

// self
use crate::_prelude::*;

const REDACTED: &str = "REDACTED";

/// Redacts a bearer token for logs and error messages.
///
/// A three-part `header.body.signature` token keeps its header and body and loses the
/// signature; anything else collapses to `REDACTED`. The function is total and idempotent.
pub fn redact_token(token: &str) -> String {
	let mut parts = token.splitn(4, '.');

	match (parts.next(), parts.next(), parts.next(), parts.next()) {
		(Some(header), Some(body), Some(_), None) => format!("{header}.{body}.{REDACTED}"),
		_ => REDACTED.into(),
	}
}

/// Opaque identity token; formatters print the redacted form only.
#[derive(Clone, PartialEq, Eq)]
pub struct IdToken(String);
impl IdToken {
	/// Wraps a raw token.
	pub fn new(value: impl Into<String>) -> Self {
		Self(value.into())
	}

	/// Extracts the token from an `Authorization: Bearer <token>` header value.
	pub fn from_bearer_header(value: &str) -> Option<Self> {
		let (scheme, token) = value.trim().split_once(' ')?;
		let token = token.trim();

		(scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then(|| Self::new(token))
	}

	/// Returns the raw token. Callers must avoid logging this string.
	pub fn expose(&self) -> &str {
		&self.0
	}

	/// Returns the redacted form.
	pub fn redacted(&self) -> String {
		redact_token(&self.0)
	}
}
impl Debug for IdToken {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("IdToken").field(&self.redacted()).finish()
	}
}
impl Display for IdToken {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(&self.redacted())
	}
}
