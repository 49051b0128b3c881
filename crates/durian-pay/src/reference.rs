//! Settlement references correlate an on-chain transfer with an off-chain
//! payment record. Callers may supply their own; otherwise one is derived
//! from the settlement time and the transaction hash.

use alloy::primitives::TxHash;

use crate::REFERENCE_PREFIX;

/// Build `DUR-<base36 millis>-<6 hex chars of tx hash>`, all uppercase.
pub fn generate_reference(now_millis: u64, tx_hash: &TxHash) -> String {
    let hex = format!("{tx_hash:x}");
    let tail = hex.trim_start_matches("0x");
    format!(
        "{REFERENCE_PREFIX}-{}-{}",
        to_base36(now_millis),
        tail[..6].to_ascii_uppercase()
    )
}

/// Whether `reference` has the shape produced by [`generate_reference`].
pub fn is_generated_reference(reference: &str) -> bool {
    let mut parts = reference.split('-');
    let (Some(prefix), Some(time), Some(tail), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return false;
    };
    prefix == REFERENCE_PREFIX
        && !time.is_empty()
        && time
            .chars()
            .all(|c| c.is_ascii_digit() || c.is_ascii_uppercase())
        && tail.len() == 6
        && tail
            .chars()
            .all(|c| c.is_ascii_digit() || ('A'..='F').contains(&c))
}

fn to_base36(mut value: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";
    if value == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while value > 0 {
        out.push(DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base36() {
        assert_eq!(to_base36(0), "0");
        assert_eq!(to_base36(35), "Z");
        assert_eq!(to_base36(36), "10");
        // 2024-11-01T00:00:00Z in millis
        assert_eq!(to_base36(1_730_419_200_000), "M2XYWW00");
    }

    #[test]
    fn test_generate_reference_shape() {
        let tx: TxHash = "0xabc123def4560000000000000000000000000000000000000000000000000000"
            .parse()
            .unwrap();
        let reference = generate_reference(1_730_419_200_000, &tx);
        assert_eq!(reference, "DUR-M2XYWW00-ABC123");
        assert!(is_generated_reference(&reference));
    }

    #[test]
    fn test_rejects_foreign_references() {
        assert!(!is_generated_reference("order-2847"));
        assert!(!is_generated_reference("DUR-M2XYWW00-abc123"));
        assert!(!is_generated_reference("DUR-M2XYWW00-ABC12"));
        assert!(!is_generated_reference("DUR--ABC123"));
        assert!(!is_generated_reference("DUR-A-ABC123-X"));
    }
}
