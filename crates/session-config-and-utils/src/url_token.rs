//! One-time token pickup from redirect URLs.

use url::Url;

/// Query parameter the issuer uses to deliver the session token.
pub const TOKEN_PARAM: &str = "token";

/// Extract the session token from `href`'s query string.
///
/// The first non-empty `token` parameter wins. The value is returned as it
/// appears in the URL, without form decoding, so opaque tokens containing
/// `+` or `%` survive intact. Unparseable URLs yield `None`.
pub fn extract_token(href: &str) -> Option<String> {
    let url = Url::parse(href).ok()?;
    let query = url.query()?;
    query
        .split('&')
        .filter_map(|segment| segment.split_once('='))
        .find(|(key, value)| *key == TOKEN_PARAM && !value.is_empty())
        .map(|(_, value)| value.to_string())
}

fn is_token_segment(segment: &str) -> bool {
    segment.split_once('=').map_or(segment, |(key, _)| key) == TOKEN_PARAM
}

/// Return `href` without any `token` query parameter.
///
/// Other parameters are kept byte for byte, as is the fragment. An empty
/// query is dropped entirely so no trailing `?` remains. Unparseable input
/// is returned as is.
pub fn strip_token_from_url(href: &str) -> String {
    let Ok(mut url) = Url::parse(href) else {
        return href.to_string();
    };
    let Some(query) = url.query() else {
        return href.to_string();
    };

    if !query.split('&').any(is_token_segment) {
        return href.to_string();
    }

    let kept = query
        .split('&')
        .filter(|segment| !segment.is_empty() && !is_token_segment(segment))
        .collect::<Vec<_>>()
        .join("&");

    if kept.is_empty() {
        url.set_query(None);
    } else {
        url.set_query(Some(&kept));
    }

    url.into()
}
