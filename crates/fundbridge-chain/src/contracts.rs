use std::sync::Arc;

use fundbridge_core::decode::{decode_audit_entry, decode_campaign, decode_donation, decode_item, decode_list};
use fundbridge_core::records::{AuditEntry, Campaign, Donation, MarketplaceItem};
use fundbridge_core::token::{Token, format_address, parse_address};
use primitive_types::U256;
use tracing::{debug, info};

use crate::abi::Function;
use crate::error::ChainError;
use crate::functions::{audit_log, fundraising, marketplace};
use crate::rpc::RpcClient;
use crate::signer::LocalSigner;

/// Deterministic addresses of the first three deployments on a fresh Hardhat node.
pub const DEV_FUNDRAISING_ADDRESS: &str = "0x5FbDB2315678afecb367f032d93F642f64180aa3";
pub const DEV_MARKETPLACE_ADDRESS: &str = "0xe7f1725E7734CE288F8367e1Bb143E90bb3F0512";
pub const DEV_AUDIT_LOG_ADDRESS: &str = "0x9fE46736679d2D9a65F0992F2272dE9f3c7fa6e0";

#[derive(Debug, Clone)]
pub struct ContractAddresses {
    pub fundraising: String,
    pub marketplace: String,
    pub audit_log: String,
}

impl Default for ContractAddresses {
    fn default() -> Self {
        Self {
            fundraising: DEV_FUNDRAISING_ADDRESS.to_string(),
            marketplace: DEV_MARKETPLACE_ADDRESS.to_string(),
            audit_log: DEV_AUDIT_LOG_ADDRESS.to_string(),
        }
    }
}

/// Unsigned transaction for the user's wallet to sign and send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxRequest {
    pub to: String,
    pub data: Vec<u8>,
    pub value: U256,
}

impl TxRequest {
    pub fn data_hex(&self) -> String {
        format!("0x{}", hex::encode(&self.data))
    }
}

/// A deployed contract bound to an RPC provider and, optionally, a signing key.
#[derive(Clone)]
pub struct Contract {
    address: [u8; 20],
    rpc: Arc<RpcClient>,
    signer: Option<Arc<LocalSigner>>,
}

impl Contract {
    pub fn new(address: &str, rpc: Arc<RpcClient>, signer: Option<Arc<LocalSigner>>) -> Result<Self, ChainError> {
        let address = parse_address(address).ok_or_else(|| ChainError::InvalidAddress(address.to_string()))?;
        Ok(Self { address, rpc, signer })
    }

    pub fn address(&self) -> String {
        format_address(&self.address)
    }

    pub async fn call(&self, function: &Function, args: &[Token]) -> Result<Vec<Token>, ChainError> {
        let data = function.encode_call(args)?;
        let out = self.rpc.eth_call(&self.address(), &data).await?;
        debug!("{} returned {} bytes", function.name, out.len());
        Ok(function.decode_output(&out)?)
    }

    /// Signs with the bound key and submits. Fails with `NoSender` on a read-only handle.
    pub async fn send(&self, function: &Function, args: &[Token], value: U256) -> Result<String, ChainError> {
        let signer = self.signer.as_ref().ok_or(ChainError::NoSender)?;
        let data = function.encode_call(args)?;
        let hash = signer.send(&self.rpc, self.address, data, value).await?;
        info!("{} submitted: {}", function.name, hash);
        Ok(hash)
    }

    pub fn tx_request(&self, function: &Function, args: &[Token], value: U256) -> Result<TxRequest, ChainError> {
        Ok(TxRequest {
            to: self.address(),
            data: function.encode_call(args)?,
            value,
        })
    }

    pub fn can_send(&self) -> bool {
        self.signer.is_some()
    }
}

fn single(tokens: Vec<Token>, function: &str) -> Result<Token, ChainError> {
    let mut tokens = tokens.into_iter();
    match (tokens.next(), tokens.next()) {
        (Some(token), None) => Ok(token),
        _ => Err(ChainError::MalformedResponse(format!("{} should return exactly one value", function))),
    }
}

fn tuple_fields(token: Token, function: &str) -> Result<Vec<Token>, ChainError> {
    match token {
        Token::Tuple(fields) => Ok(fields),
        other => Err(ChainError::MalformedResponse(format!(
            "{} returned {} instead of a tuple",
            function,
            other.kind()
        ))),
    }
}

fn uint(n: u64) -> Token {
    Token::Uint(U256::from(n))
}

fn text(s: &str) -> Token {
    Token::String(s.to_string())
}

/// Handles for the three FundBridge contracts.
#[derive(Clone)]
pub struct Contracts {
    fundraising: Contract,
    marketplace: Contract,
    audit_log: Contract,
}

impl Contracts {
    /// `signer` binds the audit log handle to the server key for `addLog`; the
    /// other two are always read-only since users sign those writes themselves.
    pub fn new(
        rpc: Arc<RpcClient>,
        addresses: &ContractAddresses,
        signer: Option<Arc<LocalSigner>>,
    ) -> Result<Self, ChainError> {
        Ok(Self {
            fundraising: Contract::new(&addresses.fundraising, rpc.clone(), None)?,
            marketplace: Contract::new(&addresses.marketplace, rpc.clone(), None)?,
            audit_log: Contract::new(&addresses.audit_log, rpc, signer)?,
        })
    }

    pub fn fundraising(&self) -> Fundraising<'_> {
        Fundraising(&self.fundraising)
    }

    pub fn marketplace(&self) -> Marketplace<'_> {
        Marketplace(&self.marketplace)
    }

    pub fn audit_log(&self) -> AuditLog<'_> {
        AuditLog(&self.audit_log)
    }
}

pub struct Fundraising<'a>(&'a Contract);

impl Fundraising<'_> {
    pub fn address(&self) -> String {
        self.0.address()
    }

    pub async fn get_campaign(&self, id: u64) -> Result<Campaign, ChainError> {
        let f = fundraising::get_campaign();
        let out = self.0.call(&f, &[uint(id)]).await?;
        let fields = tuple_fields(single(out, f.name)?, f.name)?;
        Ok(decode_campaign(&fields)?)
    }

    pub async fn get_all_campaigns(&self) -> Result<Vec<Campaign>, ChainError> {
        let f = fundraising::get_all_campaigns();
        let out = self.0.call(&f, &[]).await?;
        Ok(decode_list("Campaign", &single(out, f.name)?, decode_campaign)?)
    }

    pub async fn get_donations_history(&self, id: u64) -> Result<Vec<Donation>, ChainError> {
        let f = fundraising::get_donations_history();
        let out = self.0.call(&f, &[uint(id)]).await?;
        Ok(decode_list("Donation", &single(out, f.name)?, decode_donation)?)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn create_campaign(
        &self,
        title: &str,
        primary_category: &str,
        description: &str,
        goal_wei: U256,
        image_url: &str,
        metadata_hash: &str,
        deadline: u64,
    ) -> Result<TxRequest, ChainError> {
        self.0.tx_request(
            &fundraising::create_campaign(),
            &[
                text(title),
                text(primary_category),
                text(description),
                Token::Uint(goal_wei),
                text(image_url),
                text(metadata_hash),
                uint(deadline),
            ],
            U256::zero(),
        )
    }

    pub fn donate(&self, id: u64, comment: &str, value: U256) -> Result<TxRequest, ChainError> {
        self.0.tx_request(&fundraising::donate(), &[uint(id), text(comment)], value)
    }

    pub fn close_campaign(&self, id: u64) -> Result<TxRequest, ChainError> {
        self.0.tx_request(&fundraising::close_campaign(), &[uint(id)], U256::zero())
    }

    pub fn withdraw(&self, id: u64) -> Result<TxRequest, ChainError> {
        self.0.tx_request(&fundraising::withdraw(), &[uint(id)], U256::zero())
    }

    pub fn withdraw_all(&self, id: u64) -> Result<TxRequest, ChainError> {
        self.0.tx_request(&fundraising::withdraw_all(), &[uint(id)], U256::zero())
    }

    #[allow(clippy::too_many_arguments)]
    pub fn update_campaign(
        &self,
        id: u64,
        title: &str,
        primary_category: &str,
        description: &str,
        goal_wei: U256,
        image_url: &str,
        deadline: u64,
    ) -> Result<TxRequest, ChainError> {
        self.0.tx_request(
            &fundraising::update_campaign(),
            &[
                uint(id),
                text(title),
                text(primary_category),
                text(description),
                Token::Uint(goal_wei),
                text(image_url),
                uint(deadline),
            ],
            U256::zero(),
        )
    }

    pub fn update_metadata_hash(&self, id: u64, metadata_hash: &str) -> Result<TxRequest, ChainError> {
        self.0.tx_request(
            &fundraising::update_metadata_hash(),
            &[uint(id), text(metadata_hash)],
            U256::zero(),
        )
    }
}

pub struct Marketplace<'a>(&'a Contract);

impl Marketplace<'_> {
    pub fn address(&self) -> String {
        self.0.address()
    }

    pub async fn get_item(&self, id: u64) -> Result<MarketplaceItem, ChainError> {
        let f = marketplace::get_item();
        let out = self.0.call(&f, &[uint(id)]).await?;
        let fields = tuple_fields(single(out, f.name)?, f.name)?;
        Ok(decode_item(&fields)?)
    }

    pub async fn get_all_items(&self) -> Result<Vec<MarketplaceItem>, ChainError> {
        let f = marketplace::get_all_items();
        let out = self.0.call(&f, &[]).await?;
        Ok(decode_list("MarketplaceItem", &single(out, f.name)?, decode_item)?)
    }

    pub fn create_item(
        &self,
        title: &str,
        description: &str,
        price_wei: U256,
        image_url: &str,
        campaign_id: u64,
    ) -> Result<TxRequest, ChainError> {
        self.0.tx_request(
            &marketplace::create_item(),
            &[text(title), text(description), Token::Uint(price_wei), text(image_url), uint(campaign_id)],
            U256::zero(),
        )
    }

    /// `price_wei` must be the listed price; the contract rejects anything else.
    pub fn buy_item(&self, id: u64, price_wei: U256) -> Result<TxRequest, ChainError> {
        self.0.tx_request(&marketplace::buy_item(), &[uint(id)], price_wei)
    }

    pub fn update_item(
        &self,
        id: u64,
        title: &str,
        description: &str,
        price_wei: U256,
        image_url: &str,
    ) -> Result<TxRequest, ChainError> {
        self.0.tx_request(
            &marketplace::update_item(),
            &[uint(id), text(title), text(description), Token::Uint(price_wei), text(image_url)],
            U256::zero(),
        )
    }

    pub fn deactivate_item(&self, id: u64) -> Result<TxRequest, ChainError> {
        self.0.tx_request(&marketplace::deactivate_item(), &[uint(id)], U256::zero())
    }
}

pub struct AuditLog<'a>(&'a Contract);

impl AuditLog<'_> {
    pub fn can_write(&self) -> bool {
        self.0.can_send()
    }

    pub async fn add_log(&self, action: &str, details: &str) -> Result<String, ChainError> {
        self.0
            .send(&audit_log::add_log(), &[text(action), text(details)], U256::zero())
            .await
    }

    pub async fn get_logs(&self) -> Result<Vec<AuditEntry>, ChainError> {
        let f = audit_log::get_logs();
        let out = self.0.call(&f, &[]).await?;
        Ok(decode_list("AuditEntry", &single(out, f.name)?, decode_audit_entry)?)
    }

    pub async fn get_log(&self, id: u64) -> Result<AuditEntry, ChainError> {
        let f = audit_log::get_log();
        let out = self.0.call(&f, &[uint(id)]).await?;
        let fields = tuple_fields(single(out, f.name)?, f.name)?;
        Ok(decode_audit_entry(&fields)?)
    }

    pub async fn get_count(&self) -> Result<u64, ChainError> {
        let f = audit_log::get_count();
        let out = self.0.call(&f, &[]).await?;
        match single(out, f.name)? {
            Token::Uint(n) if n <= U256::from(u64::MAX) => Ok(n.low_u64()),
            other => Err(ChainError::MalformedResponse(format!("getCount returned {}", other.kind()))),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::abi::{decode, encode};
    use crate::functions::campaign_tuple;

    const DEV_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    fn contracts(signer: Option<&str>) -> Contracts {
        let rpc = Arc::new(RpcClient::new("http://127.0.0.1:8545", Duration::from_secs(1)).unwrap());
        let signer = signer.map(|k| Arc::new(LocalSigner::from_hex(k).unwrap()));
        Contracts::new(rpc, &ContractAddresses::default(), signer).unwrap()
    }

    #[test]
    fn addresses_are_normalized() {
        let c = contracts(None);
        assert_eq!(c.fundraising().address(), "0x5fbdb2315678afecb367f032d93f642f64180aa3");
        assert!(!c.audit_log().can_write());
    }

    #[test]
    fn invalid_addresses_rejected() {
        let rpc = Arc::new(RpcClient::new("http://127.0.0.1:8545", Duration::from_secs(1)).unwrap());
        let bad = ContractAddresses {
            fundraising: "not-an-address".into(),
            ..ContractAddresses::default()
        };
        assert!(matches!(Contracts::new(rpc, &bad, None), Err(ChainError::InvalidAddress(_))));
    }

    #[test]
    fn donate_carries_value_and_selector() {
        let c = contracts(None);
        let value = U256::exp10(17);
        let tx = c.fundraising().donate(3, "for the kids", value).unwrap();
        assert_eq!(tx.value, value);
        assert_eq!(tx.to, c.fundraising().address());
        assert_eq!(&tx.data[..4], &fundraising::donate().selector());

        let args = decode(&fundraising::donate().inputs, &tx.data[4..]).unwrap();
        assert_eq!(args[0], uint(3));
        assert_eq!(args[1], text("for the kids"));
    }

    #[test]
    fn buy_item_pays_listed_price() {
        let c = contracts(Some(DEV_KEY));
        let tx = c.marketplace().buy_item(8, U256::from(12345u64)).unwrap();
        assert_eq!(tx.value, U256::from(12345u64));
        assert!(tx.data_hex().starts_with("0x"));
        assert!(c.audit_log().can_write());
    }

    #[test]
    fn struct_return_decodes_into_campaign() {
        let fields = vec![
            uint(1),
            Token::Address([0x42; 20]),
            text("Solar panels"),
            text("energy"),
            text("Off-grid school"),
            Token::Uint(U256::exp10(18)),
            uint(0),
            Token::Bool(true),
            text(""),
            text(""),
            uint(1_900_000_000),
            Token::Bool(false),
        ];
        let payload = encode(&[Token::Tuple(fields)]);
        let out = decode(&[campaign_tuple()], &payload).unwrap();
        let tuple = tuple_fields(single(out, "getCampaign").unwrap(), "getCampaign").unwrap();
        let campaign = decode_campaign(&tuple).unwrap();
        assert_eq!(campaign.title, "Solar panels");
        assert_eq!(campaign.owner, format!("0x{}", "42".repeat(20)));
        assert_eq!(campaign.deadline, 1_900_000_000);
    }

    #[tokio::test]
    async fn read_only_handle_cannot_send() {
        let c = contracts(None);
        let err = c.audit_log().add_log("TEST", "x").await.unwrap_err();
        assert!(matches!(err, ChainError::NoSender));
    }
}
