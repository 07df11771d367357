use serde::Serialize;
use sha2::{Digest, Sha256};

pub fn compute_hash(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    let digest = hasher.finalize();
    hex::encode(digest)
}

/// Derives a cache key from a namespace and the serialized request.
///
/// The hash covers the serde_json rendering of `request`, so it follows the
/// field order of the serialized type: two requests whose maps list the same
/// entries in a different order can hash differently.
pub fn cache_key<T: Serialize>(namespace: &str, request: &T) -> String {
    let body = serde_json::to_string(request).unwrap_or_default();
    compute_hash(&format!("{namespace}:{body}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn same_input_same_key() {
        let a = cache_key("recipe", &json!({"ingredients": ["tomatoes", "beef"]}));
        let b = cache_key("recipe", &json!({"ingredients": ["tomatoes", "beef"]}));
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn namespace_and_order_matter() {
        let base = cache_key("recipe", &vec!["tomatoes", "beef"]);
        assert_ne!(base, cache_key("detect", &vec!["tomatoes", "beef"]));
        assert_ne!(base, cache_key("recipe", &vec!["beef", "tomatoes"]));
    }
}
