//! Natural ordering for comic issue identifiers.
//!
//! Issue "numbers" in a collection are rarely plain integers: `12`, `12.5`,
//! `12A`, `Annual`, `#7` and entries with no number at all must still land in
//! an order a collector expects on the shelf. This crate produces a total
//! order over such identifiers:
//!
//! - numeric issues sort ascending by decimal value (`9 < 10 < 10.5`);
//! - among equal values, suffix-less issues come before suffixed ones
//!   (`10` before `10A`), then suffixes compare case-insensitively, then
//!   zero-padded renderings sort after unpadded ones (`007` after `7`);
//! - non-numeric labels (annuals, specials) follow all numeric issues,
//!   compared case-insensitively;
//! - entries with no issue token sort last;
//! - any remaining tie falls back to the title.
//!
//! The comparison is a strict weak ordering, safe for stable sorts.

use std::cmp::Ordering;

use once_cell::sync::Lazy;
use regex::Regex;

/// `digits[.digits]` optionally followed by a short alphanumeric suffix,
/// e.g. `12`, `12.5`, `12A`, `007b`.
static NUMERIC_TOKEN: Lazy<Regex> = Lazy::new(|| {
	Regex::new(r"^(\d+)(?:\.(\d+))?\s*([A-Za-z][A-Za-z0-9]*)?$").expect("static regex")
});

/// Trailing `#<token>` in a free-text title, e.g. `Saga #12`.
static TITLE_TOKEN: Lazy<Regex> =
	Lazy::new(|| Regex::new(r"#\s*([^#]*?)\s*$").expect("static regex"));

/// Anything that can be placed in issue order.
///
/// `issue_number` is the structured field when the catalog has one; the
/// title is the fallback source of the token and the final tie-breaker.
pub trait IssueSortable {
	fn issue_number(&self) -> Option<&str>;
	fn title(&self) -> &str;
}

/// Parsed sort key for one item.
#[derive(Debug, Clone, PartialEq)]
pub enum IssueKey {
	/// `digits[.digits]` with an optional alphabetic suffix. `width` is the
	/// rendered length of the integer part, so `007` and `7` stay
	/// distinguishable once the value compares equal.
	Numeric {
		value: f64,
		suffix: String,
		width: usize,
	},
	/// A non-numeric label such as `Annual` or `Special`.
	Alpha(String),
	/// No usable token; sorts after everything else.
	Missing,
}

impl IssueKey {
	/// Extract and classify the issue token for an item.
	///
	/// The structured field wins when present and non-blank; otherwise the
	/// trailing `#<token>` of the title is used; otherwise the key is
	/// [`IssueKey::Missing`].
	pub fn parse(issue_number: Option<&str>, title: &str) -> Self {
		let raw = issue_number
			.map(str::trim)
			.filter(|t| !t.is_empty())
			.map(ToOwned::to_owned)
			.or_else(|| token_from_title(title));

		match raw {
			Some(raw) => Self::classify(&normalize(&raw)),
			None => Self::Missing,
		}
	}

	fn classify(token: &str) -> Self {
		if token.is_empty() {
			return Self::Missing;
		}

		if let Some(caps) = NUMERIC_TOKEN.captures(token) {
			let int_part = &caps[1];
			let frac_part = caps.get(2).map_or("", |m| m.as_str());
			let rendered = if frac_part.is_empty() {
				int_part.to_owned()
			} else {
				format!("{int_part}.{frac_part}")
			};

			if let Ok(value) = rendered.parse::<f64>() {
				return Self::Numeric {
					value,
					suffix: caps.get(3).map_or_else(String::new, |m| m.as_str().to_owned()),
					width: int_part.len(),
				};
			}
		}

		Self::Alpha(token.to_owned())
	}

	fn class_rank(&self) -> u8 {
		match self {
			Self::Numeric { .. } => 0,
			Self::Alpha(_) => 1,
			Self::Missing => 2,
		}
	}

	/// Compare two keys. Numeric before alpha before missing, then the
	/// per-class tie-break ladder described at the crate root.
	pub fn compare(&self, other: &Self) -> Ordering {
		match (self, other) {
			(
				Self::Numeric {
					value: av,
					suffix: asfx,
					width: aw,
				},
				Self::Numeric {
					value: bv,
					suffix: bsfx,
					width: bw,
				},
			) => av
				.total_cmp(bv)
				.then_with(|| asfx.is_empty().cmp(&bsfx.is_empty()).reverse())
				.then_with(|| asfx.to_ascii_lowercase().cmp(&bsfx.to_ascii_lowercase()))
				.then_with(|| aw.cmp(bw))
				.then_with(|| asfx.cmp(bsfx)),
			(Self::Alpha(a), Self::Alpha(b)) => a
				.to_ascii_lowercase()
				.cmp(&b.to_ascii_lowercase())
				.then_with(|| a.cmp(b)),
			_ => self.class_rank().cmp(&other.class_rank()),
		}
	}
}

/// Total order over two sortable items: parsed key first, then the title
/// (case-insensitively, then exactly, so equal elements are truly equal).
pub fn compare<T: IssueSortable + ?Sized>(a: &T, b: &T) -> Ordering {
	IssueKey::parse(a.issue_number(), a.title())
		.compare(&IssueKey::parse(b.issue_number(), b.title()))
		.then_with(|| {
			a.title()
				.to_ascii_lowercase()
				.cmp(&b.title().to_ascii_lowercase())
		})
		.then_with(|| a.title().cmp(b.title()))
}

fn token_from_title(title: &str) -> Option<String> {
	// Only the text after the *last* `#` counts, so `Saga #12` yields `12`
	// and a title without a hash yields nothing.
	let idx = title.rfind('#')?;
	TITLE_TOKEN
		.captures(&title[idx..])
		.map(|caps| caps[1].to_owned())
		.filter(|t| !t.is_empty())
}

/// Strip a leading `#` and a leading `issue`/`no.` label, then trim.
fn normalize(raw: &str) -> String {
	let mut token = raw.trim();
	token = token.strip_prefix('#').unwrap_or(token).trim_start();

	let lower = token.to_ascii_lowercase();
	for label in ["issue", "no."] {
		if lower.starts_with(label) {
			token = token[label.len()..].trim_start();
			break;
		}
	}

	token.to_owned()
}
