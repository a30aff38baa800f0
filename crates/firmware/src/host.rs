//! Host CPU frequency probe.
//!
//! The cpu table reports a clock rate; lacking anything better, it is taken
//! from the host's `/proc/cpuinfo` "model name" line (the `@ N...` suffix,
//! read as MHz). Any failure yields 0 and the table builder falls back to a
//! fixed rate.

/// Returns the host CPU frequency in Hz, or 0 when it cannot be determined.
pub fn host_cpu_freq_hz() -> u32 {
    match std::fs::read_to_string("/proc/cpuinfo") {
        Ok(contents) => parse_model_name_freq(&contents).unwrap_or(0),
        Err(_) => 0,
    }
}

/// Extracts the frequency from the first "model name" line.
///
/// Mirrors the firmware's crude scan: find the `@`, skip one separator
/// character, read leading decimal digits as MHz.
fn parse_model_name_freq(cpuinfo: &str) -> Option<u32> {
    let line = cpuinfo.split('\n').find(|l| l.contains("model name"))?;
    let after_at = &line[line.find('@')? + 1..];
    let digits = after_at
        .get(1..)?
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect::<String>();
    let mhz: u32 = digits.parse().ok()?;
    Some(mhz.saturating_mul(1_000_000))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_mhz_from_model_name_line() {
        let cpuinfo = "processor\t: 0\nmodel name\t: Some CPU @ 2400MHz\nflags\t: fpu\n";
        assert_eq!(parse_model_name_freq(cpuinfo), Some(2_400_000_000));
    }

    #[test]
    fn ghz_style_suffix_only_yields_the_integer_part() {
        // "2.40GHz" reads as 2 MHz; the caller's fallback handles sanity.
        let cpuinfo = "model name\t: Intel(R) Core(TM) i7 @ 2.40GHz\n";
        assert_eq!(parse_model_name_freq(cpuinfo), Some(2_000_000));
    }

    #[test]
    fn missing_or_malformed_lines_yield_none() {
        assert_eq!(parse_model_name_freq(""), None);
        assert_eq!(parse_model_name_freq("model name\t: No frequency here\n"), None);
        assert_eq!(parse_model_name_freq("cpu MHz\t: 2400\n"), None);
        assert_eq!(parse_model_name_freq("model name\t: Oddity @"), None);
    }
}
