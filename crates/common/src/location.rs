//! Azure location helpers

/// Canonical form of a location: lower case without spaces
pub fn normalize_location(location: &str) -> String {
    location.replace(' ', "").to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_location() {
        assert_eq!(normalize_location("West US"), "westus");
        assert_eq!(normalize_location("westeurope"), "westeurope");
        assert_eq!(normalize_location("North Central US"), "northcentralus");
    }
}
