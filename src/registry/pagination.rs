use hyper::header::LINK;
use hyper::Response;
use regex::Regex;
use std::sync::LazyLock;

static NEXT_LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"<([^>]+)>\s*;\s*rel="?next"?"#).unwrap());

/// Extracts the next page location from a `Link: <...>; rel="next"` header.
///
/// Registries return the link relative to their root, so relative locations
/// are resolved against `base_url`.
pub fn next_page_location<B>(response: &Response<B>, base_url: &str) -> Option<String> {
    let link = response.headers().get(LINK)?.to_str().ok()?;
    parse_next_link(link, base_url)
}

fn parse_next_link(link: &str, base_url: &str) -> Option<String> {
    let location = NEXT_LINK.captures(link)?.get(1)?.as_str();

    if location.starts_with("http://") || location.starts_with("https://") {
        Some(location.to_string())
    } else {
        let base_url = base_url.trim_end_matches('/');
        let location = location.trim_start_matches('/');
        Some(format!("{base_url}/{location}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relative_link() {
        let link = r#"</acr/v1/_catalog?last=app&n=100>; rel="next""#;
        assert_eq!(
            parse_next_link(link, "https://example.io/"),
            Some("https://example.io/acr/v1/_catalog?last=app&n=100".to_string())
        );
    }

    #[test]
    fn test_absolute_link() {
        let link = r#"<https://mirror.example.io/v2/_catalog?last=b&n=2>; rel="next""#;
        assert_eq!(
            parse_next_link(link, "https://example.io"),
            Some("https://mirror.example.io/v2/_catalog?last=b&n=2".to_string())
        );
    }

    #[test]
    fn test_no_next_relation() {
        let link = r#"</acr/v1/_catalog?last=app&n=100>; rel="prev""#;
        assert_eq!(parse_next_link(link, "https://example.io"), None);
    }

    #[test]
    fn test_from_response() {
        let response = Response::builder()
            .header(LINK, r#"</acr/v1/app/_manifests?last=sha256:abc&n=10>; rel="next""#)
            .body(())
            .unwrap();

        assert_eq!(
            next_page_location(&response, "https://example.io"),
            Some("https://example.io/acr/v1/app/_manifests?last=sha256:abc&n=10".to_string())
        );

        let response = Response::builder().body(()).unwrap();
        assert_eq!(next_page_location(&response, "https://example.io"), None);
    }
}
