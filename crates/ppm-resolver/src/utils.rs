use url::Url;

/// Normalizes an index URL to pip's conventions: ensures a trailing slash so relative listing
/// paths resolve correctly.
pub fn normalize_index_url(mut url: Url) -> Url {
    let path = url.path();
    if !path.ends_with('/') {
        url.set_path(&format!("{path}/"));
    }
    url
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_normalize_adds_trailing_slash() {
        let url: Url = "https://pypi.org/simple".parse().unwrap();
        assert_eq!(normalize_index_url(url).as_str(), "https://pypi.org/simple/");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let url: Url = "https://pypi.org/simple/".parse().unwrap();
        assert_eq!(normalize_index_url(url).as_str(), "https://pypi.org/simple/");
    }
}
