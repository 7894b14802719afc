//! Payer phone number normalization.
//!
//! The gateway requires the international `2547XXXXXXXX` form. Local formats
//! are rewritten; anything unrecognizable is rejected before a network call
//! is made.

use super::errors::MpesaError;

/// Subscriber-trunk digit for mobile numbers written without the leading zero.
const TRUNK_DIGIT: char = '7';

/// Normalize a payer phone number to the gateway's international format.
///
/// Rules, applied to the trimmed input:
/// - leading `0` is replaced with the country prefix (`0712…` -> `254712…`)
/// - leading trunk digit gets the prefix prepended (`712…` -> `254712…`)
/// - an already-prefixed number passes through unchanged
/// - anything else (non-digits included) is rejected
pub fn normalize(phone: &str, country_prefix: &str) -> Result<String, MpesaError> {
    let phone = phone.trim();

    if phone.is_empty() || !phone.chars().all(|c| c.is_ascii_digit()) {
        return Err(MpesaError::InvalidPhoneNumber(phone.to_string()));
    }

    if let Some(rest) = phone.strip_prefix('0') {
        return Ok(format!("{country_prefix}{rest}"));
    }
    if phone.starts_with(TRUNK_DIGIT) {
        return Ok(format!("{country_prefix}{phone}"));
    }
    if phone.starts_with(country_prefix) {
        return Ok(phone.to_string());
    }

    Err(MpesaError::InvalidPhoneNumber(phone.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_leading_zero_replaced() {
        assert_eq!(normalize("0712345678", "254").unwrap(), "254712345678");
    }

    #[test]
    fn test_trunk_digit_prefixed() {
        assert_eq!(normalize("712345678", "254").unwrap(), "254712345678");
    }

    #[test]
    fn test_already_prefixed_passes_through() {
        assert_eq!(normalize("254712345678", "254").unwrap(), "254712345678");
    }

    #[test]
    fn test_whitespace_trimmed() {
        assert_eq!(normalize("  0712345678 ", "254").unwrap(), "254712345678");
    }

    #[test]
    fn test_invalid_formats_rejected() {
        assert!(normalize("", "254").is_err());
        assert!(normalize("+254712345678", "254").is_err());
        assert!(normalize("0712-345-678", "254").is_err());
        assert!(normalize("112345678", "254").is_err());
        assert!(normalize("not a phone", "254").is_err());
    }

    proptest! {
        #[test]
        fn local_formats_always_get_the_prefix(suffix in "[0-9]{8}") {
            let with_zero = normalize(&format!("07{suffix}"), "254").unwrap();
            let without_zero = normalize(&format!("7{suffix}"), "254").unwrap();

            prop_assert_eq!(&with_zero, &format!("2547{}", suffix));
            prop_assert_eq!(with_zero, without_zero);
        }

        #[test]
        fn non_digit_input_never_normalizes(input in "[a-zA-Z+#* -]{1,16}") {
            prop_assert!(normalize(&input, "254").is_err());
        }
    }
}
