//! Well-known networks the crawler can target.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use shared_types::Hash;

const MAINNET_GENESIS: Hash = [
    0xd4, 0xe5, 0x67, 0x40, 0xf8, 0x76, 0xae, 0xf8, 0xc0, 0x10, 0xb8, 0x6a, 0x40, 0xd5, 0xf5, 0x67,
    0x45, 0xa1, 0x18, 0xd0, 0x90, 0x6a, 0x34, 0xe6, 0x9a, 0xec, 0x8c, 0x0d, 0xb1, 0xcb, 0x8f, 0xa3,
];

const SEPOLIA_GENESIS: Hash = [
    0x25, 0xa5, 0xcc, 0x10, 0x6e, 0xea, 0x71, 0x38, 0xac, 0xab, 0x33, 0x23, 0x1d, 0x71, 0x60, 0xd6,
    0x9c, 0xb7, 0x77, 0xee, 0x0c, 0x2c, 0x55, 0x3f, 0xcd, 0xdf, 0x51, 0x38, 0x99, 0x3e, 0x6d, 0xd9,
];

const GOERLI_GENESIS: Hash = [
    0xbf, 0x7e, 0x33, 0x1f, 0x7f, 0x7c, 0x1d, 0xd2, 0xe0, 0x51, 0x59, 0x66, 0x6b, 0x3b, 0xf8, 0xbc,
    0x7a, 0x8a, 0x3a, 0x9e, 0xb1, 0xd5, 0x18, 0x96, 0x9e, 0xab, 0x52, 0x9d, 0xd9, 0xb8, 0x8c, 0x1a,
];

/// Network preset: network id plus genesis hash.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    #[default]
    Mainnet,
    Sepolia,
    Goerli,
}

impl Network {
    pub fn network_id(&self) -> u64 {
        match self {
            Network::Mainnet => 1,
            Network::Sepolia => 11_155_111,
            Network::Goerli => 5,
        }
    }

    pub fn genesis_hash(&self) -> Hash {
        match self {
            Network::Mainnet => MAINNET_GENESIS,
            Network::Sepolia => SEPOLIA_GENESIS,
            Network::Goerli => GOERLI_GENESIS,
        }
    }
}

impl FromStr for Network {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mainnet" => Ok(Network::Mainnet),
            "sepolia" => Ok(Network::Sepolia),
            "goerli" => Ok(Network::Goerli),
            other => Err(format!("unknown network: {}", other)),
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Network::Mainnet => "mainnet",
            Network::Sepolia => "sepolia",
            Network::Goerli => "goerli",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::decode_hash;

    #[test]
    fn test_presets() {
        assert_eq!(Network::Mainnet.network_id(), 1);
        assert_eq!(
            Network::Mainnet.genesis_hash(),
            decode_hash("d4e56740f876aef8c010b86a40d5f56745a118d0906a34e69aec8c0db1cb8fa3").unwrap()
        );
        assert_eq!(Network::Sepolia.network_id(), 11_155_111);
        assert_eq!(Network::Goerli.network_id(), 5);
    }

    #[test]
    fn test_parse() {
        assert_eq!("Sepolia".parse::<Network>().unwrap(), Network::Sepolia);
        assert!("ropsten".parse::<Network>().is_err());
        assert_eq!(Network::Goerli.to_string(), "goerli");
    }
}
