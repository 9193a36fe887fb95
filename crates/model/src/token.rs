use {
    crate::NATIVE_TOKEN_ADDRESS,
    alloy::primitives::Address,
    serde::{Deserialize, Serialize},
};

/// A fungible token as reported by the token-list service. Immutable once
/// fetched; the address is the unique key.
#[derive(Clone, Debug, Default, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Token {
    pub address: Address,
    pub symbol: String,
    /// Determines the scale factor for converting minimal-unit amounts to
    /// human-readable amounts.
    pub decimals: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Token {
    /// The sentinel entry for the chain's native asset.
    pub fn native() -> Self {
        Self {
            address: NATIVE_TOKEN_ADDRESS,
            symbol: "ETH".to_owned(),
            decimals: 18,
            name: Some("Ether".to_owned()),
        }
    }

    pub fn is_native(&self) -> bool {
        self.address == NATIVE_TOKEN_ADDRESS
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_remote_entry() {
        let token: Token = serde_json::from_str(
            r#"{
                "address": "0x6b175474e89094c44da98b954eedeac495271d0f",
                "symbol": "DAI",
                "decimals": 18,
                "name": "Dai Stablecoin"
            }"#,
        )
        .unwrap();
        assert_eq!(token.symbol, "DAI");
        assert_eq!(token.decimals, 18);
        assert!(!token.is_native());
    }

    #[test]
    fn native_sentinel() {
        let native = Token::native();
        assert!(native.is_native());
        assert_eq!(native.decimals, 18);
    }
}
