//! Solidity ABI head/tail encoding for the types the FundBridge contracts use.

use fundbridge_core::token::Token;
use primitive_types::U256;
use sha3::{Digest, Keccak256};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AbiError {
    #[error("read of 32 bytes at offset {offset} past end of data ({len} bytes)")]
    OutOfBounds { offset: usize, len: usize },

    #[error("offset or length {0} does not fit the payload")]
    BadOffset(U256),

    #[error("invalid bool word")]
    InvalidBool,

    #[error("address word has non-zero padding")]
    InvalidAddress,

    #[error("string is not valid UTF-8")]
    InvalidUtf8,

    #[error("{function}: expected {expected} arguments, got {found}")]
    ArgumentCount {
        function: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("{function}: argument {index} should be {expected}, got {found}")]
    ArgumentType {
        function: &'static str,
        index: usize,
        expected: String,
        found: &'static str,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamType {
    Uint,
    Address,
    Bool,
    String,
    Tuple(Vec<ParamType>),
    Array(Box<ParamType>),
}

impl ParamType {
    pub fn is_dynamic(&self) -> bool {
        match self {
            Self::String | Self::Array(_) => true,
            Self::Tuple(members) => members.iter().any(|m| m.is_dynamic()),
            _ => false,
        }
    }

    /// Canonical type string used in function signatures.
    pub fn canonical(&self) -> String {
        match self {
            Self::Uint => "uint256".to_string(),
            Self::Address => "address".to_string(),
            Self::Bool => "bool".to_string(),
            Self::String => "string".to_string(),
            Self::Tuple(members) => format!(
                "({})",
                members.iter().map(|m| m.canonical()).collect::<Vec<_>>().join(",")
            ),
            Self::Array(inner) => format!("{}[]", inner.canonical()),
        }
    }

    /// Bytes this parameter occupies in the head of its enclosing tuple.
    fn head_size(&self) -> usize {
        match self {
            Self::Tuple(members) if !self.is_dynamic() => members.iter().map(|m| m.head_size()).sum(),
            _ => 32,
        }
    }

    fn accepts(&self, token: &Token) -> bool {
        match (self, token) {
            (Self::Uint, Token::Uint(_))
            | (Self::Address, Token::Address(_))
            | (Self::Bool, Token::Bool(_))
            | (Self::String, Token::String(_)) => true,
            (Self::Tuple(types), Token::Tuple(tokens)) => {
                types.len() == tokens.len() && types.iter().zip(tokens).all(|(t, v)| t.accepts(v))
            }
            (Self::Array(inner), Token::Array(tokens)) => tokens.iter().all(|v| inner.accepts(v)),
            _ => false,
        }
    }
}

pub fn keccak256(input: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(input);
    let mut out = [0u8; 32];
    out.copy_from_slice(&hasher.finalize());
    out
}

/// A contract function: name plus input and output layout.
#[derive(Debug, Clone)]
pub struct Function {
    pub name: &'static str,
    pub inputs: Vec<ParamType>,
    pub outputs: Vec<ParamType>,
    pub payable: bool,
}

impl Function {
    pub fn new(name: &'static str, inputs: Vec<ParamType>, outputs: Vec<ParamType>) -> Self {
        Self { name, inputs, outputs, payable: false }
    }

    pub fn payable(mut self) -> Self {
        self.payable = true;
        self
    }

    pub fn signature(&self) -> String {
        let inputs: Vec<String> = self.inputs.iter().map(|p| p.canonical()).collect();
        format!("{}({})", self.name, inputs.join(","))
    }

    pub fn selector(&self) -> [u8; 4] {
        let hash = keccak256(self.signature().as_bytes());
        [hash[0], hash[1], hash[2], hash[3]]
    }

    /// Selector followed by ABI-encoded, type-checked arguments.
    pub fn encode_call(&self, args: &[Token]) -> Result<Vec<u8>, AbiError> {
        if args.len() != self.inputs.len() {
            return Err(AbiError::ArgumentCount {
                function: self.name,
                expected: self.inputs.len(),
                found: args.len(),
            });
        }
        for (index, (ty, arg)) in self.inputs.iter().zip(args).enumerate() {
            if !ty.accepts(arg) {
                return Err(AbiError::ArgumentType {
                    function: self.name,
                    index,
                    expected: ty.canonical(),
                    found: arg.kind(),
                });
            }
        }

        let mut out = self.selector().to_vec();
        out.extend(encode(args));
        Ok(out)
    }

    pub fn decode_output(&self, data: &[u8]) -> Result<Vec<Token>, AbiError> {
        decode(&self.outputs, data)
    }
}

// -- Encoding --

fn token_is_dynamic(token: &Token) -> bool {
    match token {
        Token::String(_) | Token::Array(_) => true,
        Token::Tuple(members) => members.iter().any(token_is_dynamic),
        _ => false,
    }
}

fn token_head_size(token: &Token) -> usize {
    match token {
        Token::Tuple(members) if !token_is_dynamic(token) => members.iter().map(token_head_size).sum(),
        _ => 32,
    }
}

fn word_from_u256(v: U256) -> [u8; 32] {
    let mut word = [0u8; 32];
    v.to_big_endian(&mut word);
    word
}

fn word_from_usize(v: usize) -> [u8; 32] {
    word_from_u256(U256::from(v as u64))
}

fn encode_token(token: &Token) -> Vec<u8> {
    match token {
        Token::Uint(v) => word_from_u256(*v).to_vec(),
        Token::Address(bytes) => {
            let mut word = [0u8; 32];
            word[12..].copy_from_slice(bytes);
            word.to_vec()
        }
        Token::Bool(b) => word_from_usize(*b as usize).to_vec(),
        Token::String(s) => {
            let bytes = s.as_bytes();
            let padded = bytes.len().div_ceil(32) * 32;
            let mut out = word_from_usize(bytes.len()).to_vec();
            out.extend_from_slice(bytes);
            out.resize(32 + padded, 0);
            out
        }
        Token::Array(items) => {
            let mut out = word_from_usize(items.len()).to_vec();
            out.extend(encode(items));
            out
        }
        Token::Tuple(items) => encode(items),
    }
}

/// Encodes a parameter list as a tuple: static values inline, dynamic values
/// as offsets into the tail.
pub fn encode(tokens: &[Token]) -> Vec<u8> {
    let head_len: usize = tokens.iter().map(token_head_size).sum();
    let mut head = Vec::with_capacity(head_len);
    let mut tail = Vec::new();

    for token in tokens {
        if token_is_dynamic(token) {
            head.extend_from_slice(&word_from_usize(head_len + tail.len()));
            tail.extend(encode_token(token));
        } else {
            head.extend(encode_token(token));
        }
    }

    head.extend(tail);
    head
}

// -- Decoding --

fn read_word(data: &[u8], offset: usize) -> Result<&[u8], AbiError> {
    offset
        .checked_add(32)
        .and_then(|end| data.get(offset..end))
        .ok_or(AbiError::OutOfBounds { offset, len: data.len() })
}

fn read_usize(data: &[u8], offset: usize) -> Result<usize, AbiError> {
    let v = U256::from_big_endian(read_word(data, offset)?);
    if v > U256::from(data.len() as u64) {
        return Err(AbiError::BadOffset(v));
    }
    Ok(v.low_u64() as usize)
}

pub fn decode(types: &[ParamType], data: &[u8]) -> Result<Vec<Token>, AbiError> {
    decode_params(types, data, 0)
}

fn decode_params(types: &[ParamType], data: &[u8], base: usize) -> Result<Vec<Token>, AbiError> {
    let mut cursor = base;
    let mut out = Vec::with_capacity(types.len());

    for ty in types {
        if ty.is_dynamic() {
            let rel = read_usize(data, cursor)?;
            out.push(decode_at(ty, data, base + rel)?);
            cursor += 32;
        } else {
            out.push(decode_at(ty, data, cursor)?);
            cursor += ty.head_size();
        }
    }

    Ok(out)
}

fn decode_at(ty: &ParamType, data: &[u8], at: usize) -> Result<Token, AbiError> {
    match ty {
        ParamType::Uint => Ok(Token::Uint(U256::from_big_endian(read_word(data, at)?))),
        ParamType::Address => {
            let word = read_word(data, at)?;
            if word[..12].iter().any(|b| *b != 0) {
                return Err(AbiError::InvalidAddress);
            }
            let mut bytes = [0u8; 20];
            bytes.copy_from_slice(&word[12..]);
            Ok(Token::Address(bytes))
        }
        ParamType::Bool => {
            let word = read_word(data, at)?;
            if word[..31].iter().any(|b| *b != 0) || word[31] > 1 {
                return Err(AbiError::InvalidBool);
            }
            Ok(Token::Bool(word[31] == 1))
        }
        ParamType::String => {
            let len = read_usize(data, at)?;
            let start = at + 32;
            let bytes = data
                .get(start..start + len)
                .ok_or(AbiError::OutOfBounds { offset: start, len: data.len() })?;
            let s = String::from_utf8(bytes.to_vec()).map_err(|_| AbiError::InvalidUtf8)?;
            Ok(Token::String(s))
        }
        ParamType::Array(inner) => {
            let len = read_usize(data, at)?;
            let remaining = data.len().saturating_sub(at + 32);
            if len.saturating_mul(inner.head_size()) > remaining {
                return Err(AbiError::BadOffset(U256::from(len as u64)));
            }
            let types = vec![(**inner).clone(); len];
            Ok(Token::Array(decode_params(&types, data, at + 32)?))
        }
        ParamType::Tuple(members) => Ok(Token::Tuple(decode_params(members, data, at)?)),
    }
}
