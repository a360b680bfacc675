//! URL and query-parameter synchronization.
//!
//! A request stores both a raw URL and a decoded parameter list; edits may
//! arrive through either one. These helpers project the query string of a
//! URL into parameter pairs and rebuild the URL from an edited pair list,
//! so the two representations never drift apart.

use crate::session::model::KeyValue;

/// Decode the query string of `url` into ordered key/value pairs.
///
/// Only the first `?` starts the query; later `?` characters belong to it.
/// Each pair splits at its first `=`; a pair without `=` keeps an empty
/// value. A URL without a query, or with a bare trailing `?`, yields no
/// pairs.
pub fn params_from_url(url: &str) -> Vec<KeyValue> {
    let Some((_, query)) = url.split_once('?') else {
        return Vec::new();
    };
    if query.is_empty() {
        return Vec::new();
    }

    query
        .split('&')
        .map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            KeyValue::new(key, value.replace("%26", "&"))
        })
        .collect()
}

/// Rebuild `url` so its query string reflects `params`.
///
/// The path portion (everything before the first `?`) is kept verbatim.
/// Literal `&` characters in values are escaped as `%26` so they cannot be
/// mistaken for pair separators. An empty parameter list produces a URL
/// with no query string at all.
pub fn url_with_params(url: &str, params: &[KeyValue]) -> String {
    let path = url.split_once('?').map_or(url, |(path, _)| path);

    if params.is_empty() {
        return path.to_string();
    }

    let query = params
        .iter()
        .map(|kv| format!("{}={}", kv.key, kv.value.replace('&', "%26")))
        .collect::<Vec<_>>()
        .join("&");

    format!("{path}?{query}")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_without_query_has_no_params() {
        assert!(params_from_url("http://example.com/api").is_empty());
    }

    #[test]
    fn url_with_bare_question_mark_has_no_params() {
        assert!(params_from_url("http://example.com/api?").is_empty());
    }

    #[test]
    fn single_pair() {
        let params = params_from_url("http://example.com/api?user=jing");
        assert_eq!(params, vec![KeyValue::new("user", "jing")]);
    }

    #[test]
    fn multiple_pairs_keep_order() {
        let params = params_from_url("http://example.com/api?a=1&b=2&c=3");
        assert_eq!(
            params,
            vec![
                KeyValue::new("a", "1"),
                KeyValue::new("b", "2"),
                KeyValue::new("c", "3"),
            ]
        );
    }

    #[test]
    fn pair_without_equals_has_empty_value() {
        let params = params_from_url("http://example.com/api?flag&x=1");
        assert_eq!(
            params,
            vec![KeyValue::new("flag", ""), KeyValue::new("x", "1")]
        );
    }

    #[test]
    fn value_splits_at_first_equals_only() {
        let params = params_from_url("http://example.com/api?expr=a=b");
        assert_eq!(params, vec![KeyValue::new("expr", "a=b")]);
    }

    #[test]
    fn later_question_marks_belong_to_the_query() {
        let params = params_from_url("http://example.com/api?q=what?");
        assert_eq!(params, vec![KeyValue::new("q", "what?")]);
    }

    #[test]
    fn escaped_ampersand_decodes_in_value() {
        let params = params_from_url("http://example.com/api?q=salt%26pepper");
        assert_eq!(params, vec![KeyValue::new("q", "salt&pepper")]);
    }

    #[test]
    fn duplicate_keys_are_kept() {
        let params = params_from_url("http://example.com/api?tag=a&tag=b");
        assert_eq!(
            params,
            vec![KeyValue::new("tag", "a"), KeyValue::new("tag", "b")]
        );
    }

    #[test]
    fn rebuild_with_empty_params_strips_query() {
        let url = url_with_params("http://example.com/api?stale=1", &[]);
        assert_eq!(url, "http://example.com/api");
    }

    #[test]
    fn rebuild_replaces_existing_query() {
        let url = url_with_params(
            "http://example.com/api?old=1",
            &[KeyValue::new("new", "2")],
        );
        assert_eq!(url, "http://example.com/api?new=2");
    }

    #[test]
    fn rebuild_joins_pairs_in_order() {
        let url = url_with_params(
            "http://example.com/api",
            &[KeyValue::new("a", "1"), KeyValue::new("b", "2")],
        );
        assert_eq!(url, "http://example.com/api?a=1&b=2");
    }

    #[test]
    fn rebuild_escapes_every_ampersand_in_values() {
        let url = url_with_params(
            "http://example.com/api",
            &[KeyValue::new("q", "a&b&c")],
        );
        assert_eq!(url, "http://example.com/api?q=a%26b%26c");
    }

    #[test]
    fn rebuild_keeps_empty_values() {
        let url = url_with_params("http://example.com/api", &[KeyValue::new("flag", "")]);
        assert_eq!(url, "http://example.com/api?flag=");
    }

    #[test]
    fn round_trip_url_to_params_to_url() {
        let url = "http://example.com/search?q=rust&page=2&sort=";
        let params = params_from_url(url);
        assert_eq!(url_with_params(url, &params), url);
    }

    #[test]
    fn round_trip_with_ampersand_in_value() {
        let params = vec![KeyValue::new("q", "fish & chips")];
        let url = url_with_params("http://example.com/search", &params);
        assert_eq!(params_from_url(&url), params);
    }

    #[test]
    fn projection_is_idempotent() {
        let url = "http://example.com/api?a=1&b=two";
        let once = params_from_url(url);
        let rebuilt = url_with_params(url, &once);
        assert_eq!(params_from_url(&rebuilt), once);
    }
}
