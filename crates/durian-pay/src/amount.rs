use alloy::primitives::U256;

use crate::PayError;

/// Parse a human-readable token amount ("0.01", "$1.50", "49.99") into base
/// units for a token with `decimals` decimal places.
///
/// Integer-only arithmetic; digits beyond `decimals` are truncated. A single
/// leading `$` is accepted, any other non-digit apart from one `.` is an error.
pub fn parse_amount(amount: &str, decimals: u32) -> Result<U256, PayError> {
    let trimmed = amount.trim();
    let cleaned = trimmed.strip_prefix('$').unwrap_or(trimmed);

    if cleaned.is_empty() || cleaned == "." {
        return Err(PayError::InvalidAmount(format!(
            "'{amount}' has no numeric content"
        )));
    }
    if let Some(bad) = cleaned.chars().find(|c| !c.is_ascii_digit() && *c != '.') {
        return Err(PayError::InvalidAmount(format!(
            "'{amount}' contains '{bad}'"
        )));
    }

    let (integer_part, fractional_part) = cleaned.split_once('.').unwrap_or((cleaned, ""));
    if fractional_part.contains('.') {
        return Err(PayError::InvalidAmount(format!(
            "'{amount}' has more than one decimal point"
        )));
    }

    let integer = if integer_part.is_empty() {
        U256::ZERO
    } else {
        integer_part
            .parse::<U256>()
            .map_err(|e| PayError::InvalidAmount(format!("'{amount}': integer part: {e}")))?
    };

    let decimals = decimals as usize;
    let frac_digits = &fractional_part[..fractional_part.len().min(decimals)];
    let fractional = if frac_digits.is_empty() {
        U256::ZERO
    } else {
        frac_digits
            .parse::<U256>()
            .map_err(|e| PayError::InvalidAmount(format!("'{amount}': fractional part: {e}")))?
    };

    let multiplier = U256::from(10u64).pow(U256::from(decimals));
    let scale = U256::from(10u64).pow(U256::from(decimals - frac_digits.len()));

    integer
        .checked_mul(multiplier)
        .and_then(|whole| fractional.checked_mul(scale).map(|frac| (whole, frac)))
        .and_then(|(whole, frac)| whole.checked_add(frac))
        .ok_or_else(|| PayError::InvalidAmount(format!("'{amount}': overflow")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cents() {
        assert_eq!(parse_amount("0.01", 6).unwrap(), U256::from(10_000u64));
    }

    #[test]
    fn test_parse_dollar_sign() {
        assert_eq!(parse_amount("$49.99", 6).unwrap(), U256::from(49_990_000u64));
    }

    #[test]
    fn test_parse_whole_number() {
        assert_eq!(parse_amount("10", 6).unwrap(), U256::from(10_000_000u64));
    }

    #[test]
    fn test_parse_leading_dot() {
        assert_eq!(parse_amount(".5", 6).unwrap(), U256::from(500_000u64));
    }

    #[test]
    fn test_parse_truncates_beyond_decimals() {
        assert_eq!(parse_amount("0.0000019", 6).unwrap(), U256::from(1u64));
    }

    #[test]
    fn test_parse_eighteen_decimals() {
        assert_eq!(
            parse_amount("1", 18).unwrap(),
            U256::from(1_000_000_000_000_000_000u128)
        );
    }

    #[test]
    fn test_parse_empty_fails() {
        assert!(parse_amount("$", 6).is_err());
    }

    #[test]
    fn test_parse_two_points_fails() {
        assert!(parse_amount("1.2.3", 6).is_err());
    }

    #[test]
    fn test_parse_rejects_sign_and_exponent() {
        assert!(matches!(parse_amount("-5", 6), Err(PayError::InvalidAmount(_))));
        assert!(matches!(parse_amount("+5", 6), Err(PayError::InvalidAmount(_))));
        assert!(matches!(parse_amount("1e3", 6), Err(PayError::InvalidAmount(_))));
        assert!(matches!(parse_amount("1,000", 6), Err(PayError::InvalidAmount(_))));
        assert!(parse_amount(".", 6).is_err());
    }

    #[test]
    fn test_parse_trims_whitespace() {
        assert_eq!(parse_amount(" 0.01 ", 6).unwrap(), U256::from(10_000u64));
    }
}
