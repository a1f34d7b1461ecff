//! Request pagination parsing with defaults, clamps, and staleness-aware resets.
//!
//! [`Pagination::from_query`] reads `cursor`, `order_by`, `limit`, `offset`, `order`, and
//! `read_timestamp` from a query string. Cursor and ordering key are captured first, then the
//! numeric fields and order are validated in turn (each failure short-circuits with
//! [`Error::BadRequest`]), and finally a stale `read_timestamp` resets the continuation state.

// std
use std::borrow::Cow;
// crates.io
use time::format_description::well_known::Rfc3339;
use url::form_urlencoded;
// self
use crate::_prelude::*;

/// Sort direction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Order {
	/// Ascending.
	#[serde(rename = "ASC")]
	Asc,
	/// Descending.
	#[default]
	#[serde(rename = "DESC")]
	Desc,
}
impl Order {
	/// Returns the wire form.
	pub const fn as_str(self) -> &'static str {
		match self {
			Order::Asc => "ASC",
			Order::Desc => "DESC",
		}
	}
}
impl Display for Order {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
impl FromStr for Order {
	type Err = Error;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"ASC" => Ok(Order::Asc),
			"DESC" => Ok(Order::Desc),
			_ => Err(Error::bad_request(format!(
				"Not recognized: order = {s}, expected ASC or DESC"
			))),
		}
	}
}

/// Caller-provided overrides for [`Pagination::from_query`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PaginationOptions {
	/// Maximum page size; defaults to [`Pagination::MAX_LIMIT`].
	pub allowed_limit: Option<u32>,
	/// How old a `read_timestamp` may be before continuation resets; defaults to 30 minutes.
	pub acceptable_staleness: Option<Duration>,
	/// Clock override; defaults to the current UTC instant.
	pub now: Option<OffsetDateTime>,
}
impl PaginationOptions {
	/// Overrides the maximum page size.
	pub fn with_allowed_limit(mut self, limit: u32) -> Self {
		self.allowed_limit = Some(limit);

		self
	}

	/// Overrides the staleness allowance.
	pub fn with_acceptable_staleness(mut self, staleness: Duration) -> Self {
		self.acceptable_staleness = Some(staleness);

		self
	}

	/// Pins the clock used for staleness checks.
	pub fn with_now(mut self, now: OffsetDateTime) -> Self {
		self.now = Some(now);

		self
	}
}

/// Normalized pagination descriptor.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
	/// Opaque continuation cursor.
	pub cursor: String,
	/// Page size.
	pub limit: u32,
	/// Number of rows to skip.
	pub offset: u64,
	/// Sort direction.
	pub order: Order,
	/// Sort key.
	pub order_by: String,
	/// Instant the client last read the collection, when still fresh.
	#[serde(default, skip_serializing_if = "Option::is_none", with = "time::serde::rfc3339::option")]
	pub read_timestamp: Option<OffsetDateTime>,
	/// Total row count, filled in by downstream search.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub total: Option<i64>,
}
impl Pagination {
	/// Page size used when the client sends none.
	pub const DEFAULT_LIMIT: u32 = 20;
	/// Platform ceiling for the page size.
	pub const MAX_LIMIT: u32 = 100;
	/// Staleness allowance used when the caller sends none.
	pub const DEFAULT_ACCEPTABLE_STALENESS: Duration = Duration::minutes(30);

	/// Parses pagination from a raw query string (a leading `?` is ignored).
	pub fn from_query(query: &str, options: &PaginationOptions) -> Result<Self> {
		let query = query.strip_prefix('?').unwrap_or(query);
		let mut params = HashMap::new();

		for (key, value) in form_urlencoded::parse(query.as_bytes()) {
			params.entry(key).or_insert(value);
		}

		let mut pagination = Self {
			cursor: first_value(&params, "cursor").to_owned(),
			order_by: first_value(&params, "order_by").to_owned(),
			..Self::default()
		};
		let max = options.allowed_limit.unwrap_or(Self::MAX_LIMIT);

		pagination.apply_limit(first_value(&params, "limit"), max)?;
		pagination.apply_offset(first_value(&params, "offset"))?;
		pagination.apply_order(first_value(&params, "order"))?;
		pagination.apply_read_timestamp(first_value(&params, "read_timestamp"), options)?;

		Ok(pagination)
	}

	/// Parses pagination from a request URL's query.
	pub fn from_url(url: &Url, options: &PaginationOptions) -> Result<Self> {
		Self::from_query(url.query().unwrap_or(""), options)
	}

	/// Renders the descriptor back into query-string form.
	pub fn to_query(&self) -> String {
		let mut serializer = form_urlencoded::Serializer::new(String::new());

		serializer
			.append_pair("cursor", &self.cursor)
			.append_pair("limit", &self.limit.to_string())
			.append_pair("offset", &self.offset.to_string())
			.append_pair("order", self.order.as_str())
			.append_pair("order_by", &self.order_by);

		if let Some(read_timestamp) = self.read_timestamp
			&& let Ok(formatted) = read_timestamp.format(&Rfc3339)
		{
			serializer.append_pair("read_timestamp", &formatted);
		}

		serializer.finish()
	}

	/// Records the total row count reported by downstream search.
	pub fn with_total(mut self, total: i64) -> Self {
		self.total = Some(total);

		self
	}

	fn apply_limit(&mut self, raw: &str, max: u32) -> Result<()> {
		if raw.is_empty() {
			return Ok(());
		}

		let value = raw
			.parse::<i64>()
			.map_err(|_| Error::bad_request(format!("Not recognized: limit = {raw}")))?;

		if value >= 0 {
			self.limit = u32::try_from(value.min(i64::from(max))).unwrap_or(max);
		}

		Ok(())
	}

	fn apply_offset(&mut self, raw: &str) -> Result<()> {
		if raw.is_empty() {
			return Ok(());
		}

		let value = raw
			.parse::<i64>()
			.map_err(|_| Error::bad_request(format!("Not recognized: o = {raw}")))?;

		if let Ok(offset) = u64::try_from(value)
			&& offset > 0
		{
			self.offset = offset;
		}

		Ok(())
	}

	fn apply_order(&mut self, raw: &str) -> Result<()> {
		if !raw.is_empty() {
			self.order = raw.parse()?;
		}

		Ok(())
	}

	fn apply_read_timestamp(&mut self, raw: &str, options: &PaginationOptions) -> Result<()> {
		if raw.is_empty() {
			return Ok(());
		}

		let read_timestamp = OffsetDateTime::parse(raw, &Rfc3339)
			.map_err(|_| Error::bad_request(format!("Not recognized: read_timestamp = {raw}")))?;
		let now = options.now.unwrap_or_else(OffsetDateTime::now_utc);
		let staleness = options.acceptable_staleness.unwrap_or(Self::DEFAULT_ACCEPTABLE_STALENESS);

		// An allowance reaching past the representable range never goes stale.
		let stale = now.checked_sub(staleness).is_some_and(|oldest| read_timestamp < oldest);

		if stale {
			self.offset = 0;
			self.read_timestamp = None;
			self.total = None;
		} else {
			self.read_timestamp = Some(read_timestamp);
		}

		Ok(())
	}
}
impl Default for Pagination {
	fn default() -> Self {
		Self {
			cursor: String::new(),
			limit: Self::DEFAULT_LIMIT,
			offset: 0,
			order: Order::default(),
			order_by: String::new(),
			read_timestamp: None,
			total: None,
		}
	}
}

fn first_value<'q>(params: &'q HashMap<Cow<'_, str>, Cow<'_, str>>, key: &str) -> &'q str {
	params.get(key).map(|value| value.trim()).unwrap_or("")
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;

	fn parse(query: &str) -> Result<Pagination> {
		Pagination::from_query(query, &PaginationOptions::default())
	}

	fn message(query: &str) -> String {
		match parse(query).expect_err("Query should be rejected.") {
			Error::BadRequest { message } => message,
			other => panic!("Unexpected error variant: {other:?}."),
		}
	}

	#[test]
	fn empty_query_yields_defaults() {
		let pagination = parse("").expect("Empty query should parse.");

		assert_eq!(pagination, Pagination::default());
		assert_eq!(pagination.limit, 20);
		assert_eq!(pagination.offset, 0);
		assert_eq!(pagination.order, Order::Desc);
	}

	#[test]
	fn limit_boundaries() {
		assert_eq!(parse("limit=-5").expect("Negative limit should parse.").limit, 20);
		assert_eq!(parse("limit=0").expect("Zero limit should parse.").limit, 0);
		assert_eq!(parse("limit=999").expect("Large limit should parse.").limit, 100);
		assert_eq!(parse("limit=%2042%20").expect("Padded limit should parse.").limit, 42);
		assert_eq!(message("limit=abc"), "Not recognized: limit = abc");

		let allowance = PaginationOptions::default().with_allowed_limit(10);
		let clamped =
			Pagination::from_query("limit=50", &allowance).expect("Limit should clamp to allowance.");

		assert_eq!(clamped.limit, 10);
	}

	#[test]
	fn offset_boundaries() {
		assert_eq!(parse("offset=0").expect("Zero offset should parse.").offset, 0);
		assert_eq!(parse("offset=-1").expect("Negative offset should parse.").offset, 0);
		assert_eq!(parse("offset=7").expect("Positive offset should parse.").offset, 7);
		assert_eq!(message("offset=xyz"), "Not recognized: o = xyz");
	}

	#[test]
	fn order_is_case_sensitive() {
		assert_eq!(parse("order=ASC").expect("ASC should parse.").order, Order::Asc);
		assert_eq!(parse("order=DESC").expect("DESC should parse.").order, Order::Desc);
		assert_eq!(message("order=asc"), "Not recognized: order = asc, expected ASC or DESC");
	}

	#[test]
	fn errors_short_circuit_in_field_order() {
		assert_eq!(message("order=up&offset=x&limit=y"), "Not recognized: limit = y");
		assert_eq!(message("order=up&offset=x"), "Not recognized: o = x");
	}

	#[test]
	fn staleness_boundary_does_not_reset() {
		let now = macros::datetime!(2026-10-17 12:00 UTC);
		let options = PaginationOptions::default().with_now(now);
		let at_boundary = Pagination::from_query(
			"offset=40&read_timestamp=2026-10-17T11:30:00Z",
			&options,
		)
		.expect("Boundary timestamp should parse.");

		assert_eq!(at_boundary.offset, 40);
		assert_eq!(at_boundary.read_timestamp, Some(macros::datetime!(2026-10-17 11:30 UTC)));

		let stale = Pagination::from_query(
			"offset=40&read_timestamp=2026-10-17T11:29:59Z",
			&options,
		)
		.expect("Stale timestamp should parse.");

		assert_eq!(stale.offset, 0);
		assert_eq!(stale.read_timestamp, None);
		assert_eq!(stale.total, None);
	}

	#[test]
	fn custom_staleness_allowance() {
		let now = macros::datetime!(2026-10-17 12:00 UTC);
		let options = PaginationOptions::default()
			.with_now(now)
			.with_acceptable_staleness(Duration::minutes(5));
		let pagination = Pagination::from_query(
			"offset=3&read_timestamp=2026-10-17T11:50:00Z",
			&options,
		)
		.expect("Timestamp should parse.");

		assert_eq!(pagination.offset, 0);
		assert_eq!(message("read_timestamp=yesterday"), "Not recognized: read_timestamp = yesterday");
	}

	#[test]
	fn oversized_staleness_allowance_never_resets() {
		let options = PaginationOptions::default()
			.with_now(macros::datetime!(2026-10-17 12:00 UTC))
			.with_acceptable_staleness(Duration::MAX);
		let pagination =
			Pagination::from_query("offset=40&read_timestamp=2000-01-01T00:00:00Z", &options)
				.expect("Old timestamp should parse.");

		assert_eq!(pagination.offset, 40);
		assert_eq!(pagination.read_timestamp, Some(macros::datetime!(2000-01-01 0:00 UTC)));
	}

	#[test]
	fn first_value_wins_for_repeated_keys() {
		let pagination = parse("?limit=5&limit=50&cursor=abc").expect("Query should parse.");

		assert_eq!(pagination.limit, 5);
		assert_eq!(pagination.cursor, "abc");
	}

	#[test]
	fn serializes_with_optional_fields_omitted() {
		let json = serde_json::to_value(Pagination::default()).expect("Pagination should serialize.");

		assert_eq!(
			json,
			serde_json::json!({
				"cursor": "",
				"limit": 20,
				"offset": 0,
				"order": "DESC",
				"order_by": "",
			})
		);

		let with_total = serde_json::to_value(Pagination::default().with_total(9))
			.expect("Pagination should serialize.");

		assert_eq!(with_total["total"], 9);
	}

	#[test]
	fn query_round_trip_preserves_values() {
		let parsed = parse("limit=5000&offset=3&order=ASC&order_by=created_at&cursor=c1")
			.expect("Query should parse.");
		let reparsed = parse(&parsed.to_query()).expect("Rendered query should parse.");

		assert_eq!(reparsed, parsed);

		let defaults = parse(&Pagination::default().to_query()).expect("Defaults should parse.");

		assert_eq!(defaults, Pagination::default());
	}
}
