//! Small formatting and arithmetic helpers shared by the report and CSV writers.

const IEC_UNITS: [&str; 6] = ["KiB", "MiB", "GiB", "TiB", "PiB", "EiB"];

/// Format a byte count with the largest binary prefix it reaches.
///
/// # Examples
///
/// ```
/// use tracesonar::utils::iec_bytes;
///
/// assert_eq!(iec_bytes(512), "512.000000 B");
/// assert_eq!(iec_bytes(3 * 1024 * 1024), "3.000000 MiB");
/// ```
pub fn iec_bytes(bytes: u64) -> String {
    let mut unit = "B";
    let mut scaled = bytes as f64;
    for (exp, name) in IEC_UNITS.iter().enumerate().rev() {
        let factor = 1u64 << (10 * (exp as u32 + 1));
        if bytes >= factor {
            unit = name;
            scaled = bytes as f64 / factor as f64;
            break;
        }
    }
    format!("{scaled:.6} {unit}")
}

/// Cut `name` to `max` characters, marking the cut with a trailing `" ..."`.
///
/// Names that already fit are returned unchanged. Counts characters, not
/// bytes, so multi-byte names are never split inside a code point.
pub fn truncate_name(name: &str, max: usize) -> String {
    if name.chars().count() <= max || max < 4 {
        return name.to_string();
    }
    let mut cut: String = name.chars().take(max - 4).collect();
    cut.push_str(" ...");
    cut
}

/// Arithmetic mean, 0.0 for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_iec_bytes() {
        assert_eq!(iec_bytes(0), "0.000000 B");
        assert_eq!(iec_bytes(1023), "1023.000000 B");
        assert_eq!(iec_bytes(1024), "1.000000 KiB");
        assert_eq!(iec_bytes(1536), "1.500000 KiB");
        assert_eq!(iec_bytes(5 << 30), "5.000000 GiB");
        assert_eq!(iec_bytes(u64::MAX), "16.000000 EiB");
    }

    #[test]
    fn test_truncate_name() {
        assert_eq!(truncate_name("MPI_Send", 30), "MPI_Send");
        assert_eq!(truncate_name("abcdefghij", 8), "abcd ...");
        assert_eq!(truncate_name("abcdefghij", 8).chars().count(), 8);
        // Exactly at the limit
        assert_eq!(truncate_name("abcdefgh", 8), "abcdefgh");
    }

    #[test]
    fn test_truncate_multibyte() {
        assert_eq!(truncate_name("äöüäöüäöü", 6), "äö ...");
    }

    #[test]
    fn test_mean() {
        assert_eq!(mean(&[]), 0.0);
        assert_eq!(mean(&[1.0, 2.0, 3.0]), 2.0);
    }
}
