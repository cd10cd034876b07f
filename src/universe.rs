use std::collections::HashSet;
use std::path::Path;

use crate::error::Result;

/// The ordered universe of supported assets. Position in the list is the
/// asset's popularity rank; membership checks are O(1). Built once at
/// startup and treated as immutable afterwards.
#[derive(Clone, Debug)]
pub struct AssetUniverse {
    ordered: Vec<String>,
    members: HashSet<String>,
}

impl AssetUniverse {
    /// Build a universe from an ordered symbol list. Symbols are
    /// lower-cased; duplicates keep their first (highest) rank.
    pub fn from_symbols<I, S>(symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut ordered = Vec::new();
        let mut members = HashSet::new();
        for symbol in symbols {
            let symbol = symbol.as_ref().trim().to_lowercase();
            if symbol.is_empty() {
                continue;
            }
            if members.insert(symbol.clone()) {
                ordered.push(symbol);
            }
        }
        AssetUniverse { ordered, members }
    }

    /// Load symbols from a CSV file: first column, header row skipped.
    pub fn from_csv_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let symbols = contents
            .lines()
            .skip(1)
            .filter_map(|line| line.split(',').next());
        let universe = Self::from_symbols(symbols);
        tracing::info!("Loaded {} symbols", universe.len());
        Ok(universe)
    }

    pub fn contains(&self, asset: &str) -> bool {
        self.members.contains(asset)
    }

    pub fn ordered(&self) -> &[String] {
        &self.ordered
    }

    pub fn len(&self) -> usize {
        self.ordered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }
}

/// A well-formed symbol is non-empty ASCII alphanumeric. Anything else is
/// rejected before universe membership is even consulted.
pub fn is_well_formed_symbol(symbol: &str) -> bool {
    !symbol.is_empty() && symbol.chars().all(|c| c.is_ascii_alphanumeric())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symbols_are_normalized_and_deduplicated() {
        let universe = AssetUniverse::from_symbols(["BTCUSDT", "ethusdt", "btcusdt", " "]);

        assert_eq!(universe.ordered(), &["btcusdt", "ethusdt"]);
        assert!(universe.contains("btcusdt"));
        assert!(!universe.contains("BTCUSDT"));
        assert_eq!(universe.len(), 2);
    }

    #[test]
    fn csv_loader_skips_header_and_takes_first_column() {
        let dir = std::env::temp_dir().join("universe_csv_test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("symbols.csv");
        std::fs::write(&path, "symbol,rank\nBTCUSDT,1\nethusdt,2\n").unwrap();

        let universe = AssetUniverse::from_csv_file(&path).unwrap();
        assert_eq!(universe.ordered(), &["btcusdt", "ethusdt"]);
    }

    #[test]
    fn symbol_validation() {
        assert!(is_well_formed_symbol("btcusdt"));
        assert!(is_well_formed_symbol("asset42"));
        assert!(!is_well_formed_symbol(""));
        assert!(!is_well_formed_symbol("btc-usdt"));
        assert!(!is_well_formed_symbol("btc usdt"));
    }
}
