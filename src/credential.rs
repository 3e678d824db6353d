//! Session credential discovery.
//!
//! The site keeps its access token and account number somewhere in client-side
//! storage, under keys that change between releases. The locator runs a fixed,
//! ranked list of named predicates over every storage entry and takes the first
//! hit; cookies are consulted only once storage has been exhausted.

use regex::Regex;
use serde_json::Value;

use crate::error::ExportError;
use crate::jwt;
use crate::record::number_string;
use crate::storage::PageStorage;
use crate::types::{Credential, mask};

/// Storage keys the site has been seen to use for its bearer token.
const KNOWN_TOKEN_KEYS: [&str; 10] = [
    "accesstoken",
    "accesstokenv2",
    "accesstoken_v2",
    "accesstoken2",
    "accesstokenlatest",
    "accesstokenlegacy",
    "accesstokenprod",
    "cxp-token",
    "cxptoken",
    "cxpaccesstoken",
];

/// Opaque tokens under a "token" key must be longer than this.
const MIN_OPAQUE_TOKEN_LEN: usize = 60;

/// Nested storage values deeper than this are not visited.
pub const MAX_SEARCH_DEPTH: usize = 64;

const MIN_CUSTOMER_ID_DIGITS: usize = 4;
const MAX_CUSTOMER_ID_DIGITS: usize = 9;

/// Which heuristic produced a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchSource {
    /// The raw storage value passed the candidate test.
    StorageValue,
    /// The storage key is a known token key and the value is JWT-shaped.
    ///
    /// `StorageValue` accepts every JWT-shaped value first, so this rule only
    /// holds its place in the ranking and never matches on its own.
    KnownKey,
    /// A member of a JSON storage value passed the candidate test.
    NestedValue,
    /// Decoded token payload (`custId`/`accountNo`).
    TokenPayload,
    Cookie(&'static str),
}

/// A located value together with the heuristic that found it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Located {
    pub value: String,
    pub source: MatchSource,
}

type EntryPredicate = fn(&str, &str) -> Option<String>;
type CookiePredicate = fn(&str) -> Option<String>;

/// Token rules applied to each storage entry, in priority order.
const TOKEN_ENTRY_RULES: [(MatchSource, EntryPredicate); 3] = [
    (MatchSource::StorageValue, direct_token),
    (MatchSource::KnownKey, known_key_token),
    (MatchSource::NestedValue, nested_token),
];

const TOKEN_COOKIE_RULES: [(MatchSource, CookiePredicate); 2] = [
    (MatchSource::Cookie("accesstoken"), access_token_cookie),
    (MatchSource::Cookie("cxp-token"), cxp_token_cookie),
];

const CUSTOMER_ENTRY_RULES: [(MatchSource, EntryPredicate); 2] = [
    (MatchSource::StorageValue, direct_customer_id),
    (MatchSource::NestedValue, nested_customer_id),
];

const CUSTOMER_COOKIE_RULES: [(MatchSource, CookiePredicate); 1] =
    [(MatchSource::Cookie("customer-id"), customer_id_cookie)];

/// Run entry rules over every storage entry, then cookie rules.
fn scan(
    storage: &PageStorage,
    entry_rules: &[(MatchSource, EntryPredicate)],
    cookie_rules: &[(MatchSource, CookiePredicate)],
) -> Option<Located> {
    for surface in storage.surfaces() {
        for (key, raw) in surface.entries() {
            if raw.is_empty() {
                continue;
            }
            for (source, rule) in entry_rules {
                if let Some(value) = rule(&key, &raw) {
                    tracing::debug!(?source, %key, "storage entry matched");
                    return Some(Located {
                        value,
                        source: *source,
                    });
                }
            }
        }
    }

    cookie_rules.iter().find_map(|(source, rule)| {
        rule(storage.cookie()).map(|value| Located {
            value,
            source: *source,
        })
    })
}

/// Depth-first walk over the members of a JSON object or array.
///
/// Each `(key, value)` pair is offered to `predicate` before descending into
/// it. Array members are keyed by their index.
pub fn search_tree<T, F>(value: &Value, predicate: &F) -> Option<T>
where
    F: Fn(&str, &Value) -> Option<T>,
{
    search_tree_at(value, predicate, 0)
}

fn search_tree_at<T, F>(value: &Value, predicate: &F, depth: usize) -> Option<T>
where
    F: Fn(&str, &Value) -> Option<T>,
{
    if depth >= MAX_SEARCH_DEPTH {
        return None;
    }
    let visit = |key: &str, child: &Value| {
        predicate(key, child).or_else(|| match child {
            Value::Object(_) | Value::Array(_) => search_tree_at(child, predicate, depth + 1),
            _ => None,
        })
    };
    match value {
        Value::Object(map) => map.iter().find_map(|(k, v)| visit(k.as_str(), v)),
        Value::Array(items) => items
            .iter()
            .enumerate()
            .find_map(|(i, v)| visit(i.to_string().as_str(), v)),
        _ => None,
    }
}

/// Parse a storage value as JSON and search it with `predicate`.
fn search_raw<F>(raw: &str, predicate: F) -> Option<String>
where
    F: Fn(&str, &Value) -> Option<String>,
{
    let parsed: Value = serde_json::from_str(raw).ok()?;
    search_tree(&parsed, &predicate)
}

/* ---------------- Token predicates ---------------- */

/// Accept a JWT-shaped string, or a long dotted string under a "token" key.
pub fn token_candidate(key: &str, value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    if jwt::is_likely_jwt(trimmed) {
        return Some(trimmed.to_string());
    }
    if key.to_lowercase().contains("token")
        && trimmed.contains('.')
        && trimmed.len() > MIN_OPAQUE_TOKEN_LEN
    {
        return Some(trimmed.to_string());
    }
    None
}

fn direct_token(key: &str, raw: &str) -> Option<String> {
    token_candidate(key, raw)
}

fn known_key_token(key: &str, raw: &str) -> Option<String> {
    let key = key.to_lowercase();
    if !KNOWN_TOKEN_KEYS.contains(&key.as_str()) {
        return None;
    }
    let trimmed = raw.trim();
    jwt::is_likely_jwt(trimmed).then(|| trimmed.to_string())
}

fn nested_token(_key: &str, raw: &str) -> Option<String> {
    search_raw(raw, |k, v| v.as_str().and_then(|s| token_candidate(k, s)))
}

/// Capture group 1 of a cookie pattern, percent-decoded.
fn cookie_value(cookie: &str, pattern: &str) -> Option<String> {
    let re = Regex::new(pattern).ok()?;
    let raw = re.captures(cookie)?.get(1)?.as_str();
    urlencoding::decode(raw).ok().map(|s| s.into_owned())
}

fn jwt_cookie(cookie: &str, pattern: &str) -> Option<String> {
    let candidate = cookie_value(cookie, pattern)?;
    jwt::is_likely_jwt(&candidate).then(|| candidate.trim().to_string())
}

fn access_token_cookie(cookie: &str) -> Option<String> {
    jwt_cookie(cookie, r"(?i)(?:^|;\s*)(?:accesstoken|accesstokenv2)=([^;]+)")
}

fn cxp_token_cookie(cookie: &str) -> Option<String> {
    jwt_cookie(cookie, r"(?i)(?:^|;\s*)cxp-token=([^;]+)")
}

/// Locate the bearer token. Storage is searched before cookies.
pub fn locate_token(storage: &PageStorage) -> Option<Located> {
    scan(storage, &TOKEN_ENTRY_RULES, &TOKEN_COOKIE_RULES)
}

/* ---------------- Customer id predicates ---------------- */

/// Strip non-digits; keep the result if it is 4 to 9 digits long.
pub fn normalize_customer_id(candidate: &str) -> Option<String> {
    let digits: String = candidate.chars().filter(|c| c.is_ascii_digit()).collect();
    (MIN_CUSTOMER_ID_DIGITS..=MAX_CUSTOMER_ID_DIGITS)
        .contains(&digits.len())
        .then_some(digits)
}

/// Accept a string or finite number that normalizes to a plausible id.
pub fn customer_candidate(key: &str, value: &Value) -> Option<String> {
    match value {
        Value::String(s) => normalize_customer_id(s.trim()).or_else(|| {
            (key.to_lowercase().contains("customer") && !s.is_empty())
                .then(|| normalize_customer_id(s))
                .flatten()
        }),
        Value::Number(n) => {
            let f = n.as_f64().filter(|f| f.is_finite())?;
            let rounded = (f + 0.5).floor();
            // Magnitudes this large would print in exponent form
            if rounded.abs() >= 1e21 {
                return None;
            }
            normalize_customer_id(&number_string(rounded))
        }
        _ => None,
    }
}

fn direct_customer_id(key: &str, raw: &str) -> Option<String> {
    customer_candidate(key, &Value::String(raw.to_string()))
}

fn nested_customer_id(_key: &str, raw: &str) -> Option<String> {
    search_raw(raw, customer_candidate)
}

fn customer_id_cookie(cookie: &str) -> Option<String> {
    let raw = cookie_value(cookie, r"(?i)customer-id=([^;]+)")?;
    normalize_customer_id(&raw)
}

/// Generic customer id search over storage, then the `customer-id` cookie.
pub fn locate_customer_id(storage: &PageStorage) -> Option<Located> {
    scan(storage, &CUSTOMER_ENTRY_RULES, &CUSTOMER_COOKIE_RULES)
}

/// Locate the token, then the customer id.
///
/// The id embedded in the token payload takes precedence over the generic
/// storage search.
pub fn locate_credential(storage: &PageStorage) -> Result<Credential, ExportError> {
    let token = locate_token(storage).ok_or(ExportError::CredentialNotFound)?;
    tracing::info!(source = ?token.source, token = %mask(&token.value), "access token located");

    let customer = jwt::customer_id_from_token(&token.value)
        .map(|value| Located {
            value,
            source: MatchSource::TokenPayload,
        })
        .or_else(|| locate_customer_id(storage))
        .ok_or(ExportError::AccountNotFound)?;
    tracing::info!(source = ?customer.source, "customer id located");

    Ok(Credential {
        access_token: token.value,
        customer_id: customer.value,
    })
}
