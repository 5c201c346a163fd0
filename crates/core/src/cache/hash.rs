//! Request identity keys.

use sha2::{Digest, Sha256};

/// Storage key for a request: SHA-256 over the upper-cased method and the
/// absolute URL. Two requests with the same key overwrite each other.
pub fn request_key(method: &str, url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(method.to_ascii_uppercase().as_bytes());
    hasher.update(b" ");
    hasher.update(url.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_stability() {
        assert_eq!(request_key("GET", "https://site.test/"), request_key("GET", "https://site.test/"));
    }

    #[test]
    fn test_key_method_case_insensitive() {
        assert_eq!(request_key("get", "https://site.test/a.json"), request_key("GET", "https://site.test/a.json"));
    }

    #[test]
    fn test_key_distinguishes_method_and_query() {
        assert_ne!(request_key("GET", "https://site.test/a"), request_key("HEAD", "https://site.test/a"));
        assert_ne!(request_key("GET", "https://site.test/a?x=1"), request_key("GET", "https://site.test/a?x=2"));
    }

    #[test]
    fn test_key_format() {
        let key = request_key("GET", "https://site.test/");
        assert_eq!(key.len(), 64);
        assert!(key.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
