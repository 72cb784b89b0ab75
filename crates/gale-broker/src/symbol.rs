//! Currency-pair symbol helpers.

const OTC_SUFFIX: &str = ".OTC";

/// Swap base and quote of a six-letter pair, keeping any `.OTC` suffix.
///
/// Some venues list a pair only in one orientation; a placement rejected for
/// `EURUSD` may succeed as `USDEUR`. Symbols that are not six-letter pairs are
/// returned unchanged.
pub fn invert_symbol(symbol: &str) -> String {
    let (base, suffix) = match symbol.strip_suffix(OTC_SUFFIX) {
        Some(base) => (base, OTC_SUFFIX),
        None => (symbol, ""),
    };

    if base.len() != 6 || !base.is_ascii() {
        return symbol.to_string();
    }

    format!("{}{}{}", &base[3..], &base[..3], suffix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invert_plain_pair() {
        assert_eq!(invert_symbol("EURUSD"), "USDEUR");
    }

    #[test]
    fn test_invert_otc_pair() {
        assert_eq!(invert_symbol("EURUSD.OTC"), "USDEUR.OTC");
    }

    #[test]
    fn test_non_pair_unchanged() {
        assert_eq!(invert_symbol("BTCUSDT"), "BTCUSDT");
        assert_eq!(invert_symbol("AAPL.OTC"), "AAPL.OTC");
        assert_eq!(invert_symbol(""), "");
    }
}
