//! Display helpers for quote fields. Pure string formatting, no I/O.

/// Format a price with two decimals and en-IN digit grouping (last three
/// digits, then groups of two). Missing or non-finite input renders `"0.00"`.
pub fn format_price(price: Option<f64>) -> String {
    let price = match price {
        Some(p) if p.is_finite() => p,
        _ => return "0.00".to_string(),
    };

    let rounded = format!("{:.2}", price.abs());
    let (int_part, frac_part) = rounded.split_once('.').unwrap_or((rounded.as_str(), "00"));
    let grouped = group_indian(int_part);

    if price < 0.0 && rounded != "0.00" {
        format!("-{}.{}", grouped, frac_part)
    } else {
        format!("{}.{}", grouped, frac_part)
    }
}

/// Format an absolute change and its percentage with a shared sign:
/// `+1,234.50 (+2.10%)`.
pub fn format_change(change: f64, change_percent: f64) -> String {
    let sign = if change >= 0.0 { "+" } else { "-" };
    format!(
        "{}{} ({}{:.2}%)",
        sign,
        format_price(Some(change.abs())),
        sign,
        change_percent.abs()
    )
}

/// Format a traded volume compactly: millions as `M`, thousands as `K`,
/// anything smaller as a whole number. Missing input renders `"0"`.
pub fn format_volume(volume: Option<f64>) -> String {
    let volume = match volume {
        Some(v) if v.is_finite() => v,
        _ => return "0".to_string(),
    };

    if volume >= 1_000_000.0 {
        format!("{:.1}M", volume / 1_000_000.0)
    } else if volume >= 1_000.0 {
        format!("{:.1}K", volume / 1_000.0)
    } else {
        format!("{:.0}", volume)
    }
}

/// en-IN grouping: the last three digits form one group, the rest pair up.
fn group_indian(digits: &str) -> String {
    if digits.len() <= 3 {
        return digits.to_string();
    }

    let (head, tail) = digits.split_at(digits.len() - 3);
    let head_chars: Vec<char> = head.chars().collect();
    let mut groups: Vec<String> = head_chars
        .rchunks(2)
        .map(|chunk| chunk.iter().collect())
        .collect();
    groups.reverse();
    format!("{},{}", groups.join(","), tail)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prices_use_indian_grouping() {
        assert_eq!(format_price(Some(1234567.891)), "12,34,567.89");
        assert_eq!(format_price(Some(123456.7)), "1,23,456.70");
        assert_eq!(format_price(Some(1234.5)), "1,234.50");
        assert_eq!(format_price(Some(999.0)), "999.00");
    }

    #[test]
    fn prices_handle_missing_and_edge_values() {
        assert_eq!(format_price(None), "0.00");
        assert_eq!(format_price(Some(f64::NAN)), "0.00");
        assert_eq!(format_price(Some(0.0)), "0.00");
        assert_eq!(format_price(Some(-1234.5)), "-1,234.50");
        assert_eq!(format_price(Some(-0.001)), "0.00");
    }

    #[test]
    fn change_carries_a_shared_sign() {
        assert_eq!(format_change(12.345, 2.1), "+12.35 (+2.10%)");
        assert_eq!(format_change(-1234.5, -2.099), "-1,234.50 (-2.10%)");
        assert_eq!(format_change(0.0, 0.0), "+0.00 (+0.00%)");
    }

    #[test]
    fn volume_scales_to_m_and_k() {
        assert_eq!(format_volume(Some(2_500_000.0)), "2.5M");
        assert_eq!(format_volume(Some(1_000_000.0)), "1.0M");
        assert_eq!(format_volume(Some(12_340.0)), "12.3K");
        assert_eq!(format_volume(Some(999.4)), "999");
        assert_eq!(format_volume(None), "0");
    }
}
