//! Client platform detection.
//!
//! Decides, per request, which digest family a client speaks and whether a
//! version context rides along. Detection is an ordered rule chain rather
//! than nested conditionals so new platform families stay additive: add a
//! rule, not a branch.

use axum::http::{header::USER_AGENT, HeaderMap, HeaderName};

use super::compute::{AlgorithmFamily, VersionContext};

/// Executable version header sent by the version-bearing handheld clients.
pub const EXE_VERSION_HEADER: HeaderName = HeaderName::from_static("x-exe-v");
/// Data version header sent alongside [`EXE_VERSION_HEADER`].
pub const DATA_VERSION_HEADER: HeaderName = HeaderName::from_static("x-data-v");

/// User-Agent fragment sent by clients that speak the keyed digest family.
pub const KEYED_CLIENT_UA_FRAGMENT: &str = "MM CHTTPClient LBP3";

/// Test-only query flags that force evaluation of a family's keys in
/// addition to the detected one. Verification hooks, never a trust signal.
pub const FORCE_PLAIN_QUERY_FLAG: &str = "force_ps3_digest";
pub const FORCE_KEYED_QUERY_FLAG: &str = "force_ps4_digest";

/// Resolved per-request client profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientProfile {
    /// Primary family. Signs the response when no key matches.
    pub family: AlgorithmFamily,
    /// Version pair mixed into request-side digests, when the client sent one.
    pub version: Option<VersionContext>,
    /// Families whose keys the selector tries, in order. Forced families
    /// come first; the primary family is always included.
    pub candidates: Vec<AlgorithmFamily>,
}

/// One step of the detection chain: inspect the headers, maybe produce an
/// outcome of (primary family, version context).
type Rule = fn(&HeaderMap) -> Option<(AlgorithmFamily, Option<VersionContext>)>;

/// Ordered detection rules; the first that fires wins.
const RULES: &[Rule] = &[version_headers_rule, keyed_user_agent_rule];

/// Resolve the client profile from request headers and query string.
pub fn detect_client_profile(headers: &HeaderMap, query: Option<&str>) -> ClientProfile {
    let (family, version) = RULES
        .iter()
        .find_map(|rule| rule(headers))
        .unwrap_or((AlgorithmFamily::Plain, None));

    let mut candidates = Vec::with_capacity(3);
    if query_flag(query, FORCE_PLAIN_QUERY_FLAG) {
        candidates.push(AlgorithmFamily::Plain);
    }
    if query_flag(query, FORCE_KEYED_QUERY_FLAG) {
        candidates.push(AlgorithmFamily::Keyed);
    }
    if !candidates.contains(&family) {
        candidates.push(family);
    }

    ClientProfile {
        family,
        version,
        candidates,
    }
}

/// Both version headers parse as integers: the version-bearing handheld
/// profile. A malformed or missing value in either header means "no version
/// context", never an error.
fn version_headers_rule(headers: &HeaderMap) -> Option<(AlgorithmFamily, Option<VersionContext>)> {
    let exe_version = int_header(headers, &EXE_VERSION_HEADER)?;
    let data_version = int_header(headers, &DATA_VERSION_HEADER)?;
    Some((
        AlgorithmFamily::Plain,
        Some(VersionContext {
            exe_version,
            data_version,
        }),
    ))
}

fn keyed_user_agent_rule(headers: &HeaderMap) -> Option<(AlgorithmFamily, Option<VersionContext>)> {
    let user_agent = headers.get(USER_AGENT)?.to_str().ok()?;
    user_agent
        .contains(KEYED_CLIENT_UA_FRAGMENT)
        .then_some((AlgorithmFamily::Keyed, None))
}

fn int_header(headers: &HeaderMap, name: &HeaderName) -> Option<i32> {
    headers.get(name)?.to_str().ok()?.trim().parse().ok()
}

/// True when `name=1` or `name=true` appears in the query string.
fn query_flag(query: Option<&str>, name: &str) -> bool {
    let Some(query) = query else {
        return false;
    };
    query.split('&').any(|pair| {
        let mut parts = pair.splitn(2, '=');
        parts.next() == Some(name) && matches!(parts.next(), Some("1") | Some("true"))
    })
}
