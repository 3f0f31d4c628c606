//! Phone number normalization.

/// Normalize a phone number to E.164 format.
///
/// Formatting characters are stripped. Numbers without a leading `+` are
/// accepted only when long enough to carry a country code.
pub fn normalize_phone_number(number: &str) -> Result<String, String> {
    let trimmed = number.trim();
    let (has_plus, rest) = match trimmed.strip_prefix('+') {
        Some(rest) => (true, rest),
        None => (false, trimmed),
    };
    let digits: String = number.chars().filter(|c| c.is_ascii_digit()).collect();

    if digits.is_empty() {
        return Err("phone must contain at least one digit".into());
    }

    if rest
        .chars()
        .any(|c| !(c.is_ascii_digit() || matches!(c, ' ' | '-' | '(' | ')' | '.')))
    {
        return Err("phone contains invalid characters".into());
    }

    if digits.len() < 7 {
        return Err("phone too short".into());
    }

    if digits.len() > 15 {
        return Err("phone too long".into());
    }

    if has_plus || digits.len() >= 10 {
        Ok(format!("+{}", digits))
    } else {
        Err("phone must include country code".into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_phone_number() {
        assert_eq!(
            normalize_phone_number("+1 (555) 123-4567"),
            Ok("+15551234567".into())
        );
        assert_eq!(normalize_phone_number("+15551234567"), Ok("+15551234567".into()));
        assert_eq!(normalize_phone_number("15551234567"), Ok("+15551234567".into()));
    }

    #[test]
    fn test_rejects_invalid_numbers() {
        assert!(normalize_phone_number("").is_err());
        assert!(normalize_phone_number("123").is_err());
        assert!(normalize_phone_number("1234567890123456").is_err());
        assert!(normalize_phone_number("5551234").is_err());
        assert!(normalize_phone_number("+1555abc4567").is_err());
    }

    #[test]
    fn test_plus_only_allowed_as_prefix() {
        assert_eq!(normalize_phone_number(" +15551234567"), Ok("+15551234567".into()));
        assert!(normalize_phone_number("1+5551234567").is_err());
        assert!(normalize_phone_number("++15551234567").is_err());
        assert!(normalize_phone_number("+1555123+4567").is_err());
    }
}
