use std::fmt;

use fundbridge_core::token::format_address;
use k256::ecdsa::{RecoveryId, Signature, SigningKey};
use primitive_types::U256;
use rlp::RlpStream;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::abi::keccak256;
use crate::error::ChainError;
use crate::rpc::RpcClient;

const EIP1559_TX_TYPE: u8 = 0x02;

/// Used when the node does not implement `eth_maxPriorityFeePerGas`.
const FALLBACK_PRIORITY_FEE_WEI: u64 = 1_500_000_000;

/// Headroom on top of `eth_estimateGas`, in percent.
const GAS_LIMIT_MARGIN: u64 = 20;

/// Dynamic-fee (type 2) transaction with an empty access list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Eip1559Tx {
    pub chain_id: u64,
    pub nonce: u64,
    pub max_priority_fee_per_gas: U256,
    pub max_fee_per_gas: U256,
    pub gas_limit: U256,
    pub to: [u8; 20],
    pub value: U256,
    pub data: Vec<u8>,
}

impl Eip1559Tx {
    fn append_fields(&self, s: &mut RlpStream) {
        s.append(&self.chain_id);
        s.append(&self.nonce);
        append_uint(s, self.max_priority_fee_per_gas);
        append_uint(s, self.max_fee_per_gas);
        append_uint(s, self.gas_limit);
        s.append(&self.to.to_vec());
        append_uint(s, self.value);
        s.append(&self.data);
        s.begin_list(0);
    }

    /// `keccak256(0x02 || rlp([chain_id, nonce, ..., access_list]))`.
    pub fn signing_hash(&self) -> [u8; 32] {
        let mut s = RlpStream::new_list(9);
        self.append_fields(&mut s);
        keccak256(&typed(&s.out()))
    }

    fn encode_signed(&self, y_odd: bool, r: U256, s_value: U256) -> Vec<u8> {
        let mut s = RlpStream::new_list(12);
        self.append_fields(&mut s);
        s.append(&u64::from(y_odd));
        append_uint(&mut s, r);
        append_uint(&mut s, s_value);
        typed(&s.out())
    }
}

fn typed(payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(payload.len() + 1);
    out.push(EIP1559_TX_TYPE);
    out.extend_from_slice(payload);
    out
}

/// RLP integers are big-endian with no leading zeros.
fn append_uint(s: &mut RlpStream, value: U256) {
    let mut buf = [0u8; 32];
    value.to_big_endian(&mut buf);
    let start = buf.iter().position(|b| *b != 0).unwrap_or(buf.len());
    s.append(&buf[start..].to_vec());
}

/// Server-held key that signs audit log writes. Sends are serialized so
/// concurrent writers never reuse a nonce.
pub struct LocalSigner {
    key: SigningKey,
    address: [u8; 20],
    send_lock: Mutex<()>,
}

impl fmt::Debug for LocalSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalSigner")
            .field("address", &format_address(&self.address))
            .finish_non_exhaustive()
    }
}

impl LocalSigner {
    /// Accepts a 32-byte hex key with or without `0x`.
    pub fn from_hex(private_key: &str) -> Result<Self, ChainError> {
        let digits = private_key.trim();
        let digits = digits.strip_prefix("0x").unwrap_or(digits);
        let bytes = hex::decode(digits).map_err(|_| ChainError::InvalidKey("not hex".into()))?;
        if bytes.len() != 32 {
            return Err(ChainError::InvalidKey(format!("expected 32 bytes, got {}", bytes.len())));
        }
        let key = SigningKey::from_slice(&bytes).map_err(|_| ChainError::InvalidKey("not a valid secp256k1 scalar".into()))?;

        let point = key.verifying_key().to_encoded_point(false);
        let hash = keccak256(&point.as_bytes()[1..]);
        let mut address = [0u8; 20];
        address.copy_from_slice(&hash[12..]);

        Ok(Self {
            key,
            address,
            send_lock: Mutex::new(()),
        })
    }

    pub fn address(&self) -> [u8; 20] {
        self.address
    }

    /// Signs and returns the raw transaction bytes for `eth_sendRawTransaction`.
    pub fn sign(&self, tx: &Eip1559Tx) -> Result<Vec<u8>, ChainError> {
        let hash = tx.signing_hash();
        let (signature, recovery) = self
            .key
            .sign_prehash_recoverable(&hash)
            .map_err(|e| ChainError::Signing(e.to_string()))?;
        let (signature, recovery) = low_s(signature, recovery);

        let (r, s) = signature.split_bytes();
        Ok(tx.encode_signed(
            recovery.is_y_odd(),
            U256::from_big_endian(&r),
            U256::from_big_endian(&s),
        ))
    }

    /// Fills nonce, fees and gas from the node, signs, and submits. Returns the tx hash.
    pub async fn send(&self, rpc: &RpcClient, to: [u8; 20], data: Vec<u8>, value: U256) -> Result<String, ChainError> {
        let _guard = self.send_lock.lock().await;
        let from = format_address(&self.address);
        let to_hex = format_address(&to);

        let chain_id = rpc.chain_id().await?;
        let nonce = rpc.transaction_count(&from).await?;
        let estimate = rpc.estimate_gas(&from, &to_hex, &data, value).await?;
        let gas_limit = estimate + estimate * U256::from(GAS_LIMIT_MARGIN) / U256::from(100u64);

        let priority = match rpc.max_priority_fee().await {
            Ok(fee) => fee,
            Err(ChainError::Rpc { .. }) => U256::from(FALLBACK_PRIORITY_FEE_WEI),
            Err(e) => return Err(e),
        };
        let (max_fee, priority) = match rpc.base_fee().await? {
            Some(base) => (base * U256::from(2u64) + priority, priority),
            // Pre-London chain: a legacy gas price in both fields.
            None => {
                let price = rpc.gas_price().await?;
                (price, price)
            }
        };

        let tx = Eip1559Tx {
            chain_id,
            nonce,
            max_priority_fee_per_gas: priority,
            max_fee_per_gas: max_fee,
            gas_limit,
            to,
            value,
            data,
        };
        debug!(from = %from, nonce, chain_id, "Signing transaction");
        let raw = self.sign(&tx)?;
        let hash = rpc.send_raw_transaction(&raw).await?;
        info!(from = %from, nonce, "Transaction submitted: {}", hash);
        Ok(hash)
    }
}

/// Ethereum rejects high-s signatures; flipping s also flips the y parity.
fn low_s(signature: Signature, recovery: RecoveryId) -> (Signature, RecoveryId) {
    match signature.normalize_s() {
        Some(normalized) => (
            normalized,
            RecoveryId::new(!recovery.is_y_odd(), recovery.is_x_reduced()),
        ),
        None => (signature, recovery),
    }
}
