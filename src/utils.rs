#[inline]
pub fn safe_truncate(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}


/// Hide everything but the first few characters of a credential for logs.
pub fn mask_secret(secret: &str) -> String {
    if secret.chars().count() <= 8 {
        return "****".to_string();
    }
    format!("{}****", safe_truncate(secret, 4))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_truncate_query_preview() {
        assert_eq!(safe_truncate("Who is the CEO of OpenAI?", 10), "Who is the");
    }

    #[test]
    fn test_safe_truncate_multibyte() {
        assert_eq!(safe_truncate("Größenordnung", 5), "Größe");
    }

    #[test]
    fn test_mask_secret() {
        assert_eq!(mask_secret("sk-abcdefghijkl"), "sk-a****");
        assert_eq!(mask_secret("short"), "****");
    }
}
