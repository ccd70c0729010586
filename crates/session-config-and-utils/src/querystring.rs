//! Query string building for issuer navigation targets.

use std::collections::BTreeMap;
use url::Url;

/// Append `params` to `base` as a URL-encoded query string.
///
/// Keys are emitted in sorted order. Empty `params` leave `base` without a
/// query.
pub fn stringify_url(base: &str, params: &BTreeMap<String, String>) -> Result<String, url::ParseError> {
    let mut url = Url::parse(base)?;
    if !params.is_empty() {
        url.query_pairs_mut().extend_pairs(params.iter());
    }
    Ok(url.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn encodes_sorted_params() {
        let url = stringify_url(
            "https://auth.example/authorize",
            &params(&[
                ("redirect_uri", "https://app.example/cb?x=1"),
                ("prompt", "none"),
            ]),
        )
        .unwrap();
        assert_eq!(
            url,
            "https://auth.example/authorize?prompt=none&redirect_uri=https%3A%2F%2Fapp.example%2Fcb%3Fx%3D1"
        );
    }

    #[test]
    fn empty_params_leave_no_query() {
        let url = stringify_url("https://auth.example/logout", &BTreeMap::new()).unwrap();
        assert_eq!(url, "https://auth.example/logout");
    }

    #[test]
    fn invalid_base_is_error() {
        assert!(stringify_url("nope", &BTreeMap::new()).is_err());
    }
}
