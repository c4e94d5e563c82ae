use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::DataIngestionError;

/// Closed vocabulary of coins the pipeline knows how to fetch, train on and serve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Coin {
    Bitcoin,
    Ethereum,
    Solana,
    Dogecoin,
    ShibaInu,
}

impl Coin {
    pub const ALL: [Coin; 5] = [
        Coin::Bitcoin,
        Coin::Ethereum,
        Coin::Solana,
        Coin::Dogecoin,
        Coin::ShibaInu,
    ];

    /// Identifier used by the market data API and in every persisted file.
    pub fn id(&self) -> &'static str {
        match self {
            Coin::Bitcoin => "bitcoin",
            Coin::Ethereum => "ethereum",
            Coin::Solana => "solana",
            Coin::Dogecoin => "dogecoin",
            Coin::ShibaInu => "shiba-inu",
        }
    }

    pub fn display_name(&self) -> String {
        let id = self.id();
        let mut chars = id.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        }
    }
}

impl fmt::Display for Coin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.id())
    }
}

impl FromStr for Coin {
    type Err = DataIngestionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Coin::ALL
            .iter()
            .copied()
            .find(|coin| coin.id() == s.trim())
            .ok_or_else(|| DataIngestionError::UnknownCoin(s.to_string()))
    }
}

impl TryFrom<String> for Coin {
    type Error = DataIngestionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Coin> for String {
    fn from(coin: Coin) -> Self {
        coin.id().to_string()
    }
}
