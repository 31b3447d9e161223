use primitive_types::U256;

/// A decoded ABI value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Uint(U256),
    Address([u8; 20]),
    Bool(bool),
    String(String),
    Tuple(Vec<Token>),
    Array(Vec<Token>),
}

impl Token {
    /// Short type-class name used in decode errors.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Uint(_) => "uint",
            Self::Address(_) => "address",
            Self::Bool(_) => "bool",
            Self::String(_) => "string",
            Self::Tuple(_) => "tuple",
            Self::Array(_) => "array",
        }
    }
}

/// `0x`-prefixed lowercase hex, the canonical form used for equality checks.
pub fn format_address(bytes: &[u8; 20]) -> String {
    format!("0x{}", hex::encode(bytes))
}

/// Parses a `0x`-prefixed 20-byte address in any letter case.
pub fn parse_address(s: &str) -> Option<[u8; 20]> {
    let digits = s.trim().strip_prefix("0x").or_else(|| s.trim().strip_prefix("0X"))?;
    let raw = hex::decode(digits).ok()?;
    raw.try_into().ok()
}

/// Lowercases an address string after checking its shape.
pub fn normalize_address(s: &str) -> Option<String> {
    parse_address(s).map(|bytes| format_address(&bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checksummed_addresses_normalize_to_lowercase() {
        let addr = normalize_address("0x5FbDB2315678afecb367f032d93F642f64180aa3").unwrap();
        assert_eq!(addr, "0x5fbdb2315678afecb367f032d93f642f64180aa3");
    }

    #[test]
    fn malformed_addresses_rejected() {
        assert!(parse_address("5FbDB2315678afecb367f032d93F642f64180aa3").is_none());
        assert!(parse_address("0x1234").is_none());
        assert!(parse_address("0xZZbDB2315678afecb367f032d93F642f64180aa3").is_none());
    }
}
