//! Positional contract tuples -> named records.
//!
//! Field order mirrors the Solidity struct declarations. Every decoder checks
//! the exact tuple length and the token class at each position, so an ABI
//! change surfaces as a `DecodeError` instead of silently shifted fields.

use primitive_types::U256;

use crate::error::DecodeError;
use crate::records::{AuditEntry, Campaign, Donation, MarketplaceItem};
use crate::token::{Token, format_address};

pub const CAMPAIGN_FIELDS: usize = 12;
pub const ITEM_FIELDS: usize = 10;
pub const DONATION_FIELDS: usize = 3;
pub const AUDIT_ENTRY_FIELDS: usize = 5;

struct Fields<'a> {
    record: &'static str,
    tokens: &'a [Token],
}

impl<'a> Fields<'a> {
    fn new(record: &'static str, tokens: &'a [Token], expected: usize) -> Result<Self, DecodeError> {
        if tokens.len() != expected {
            return Err(DecodeError::Length {
                record,
                expected,
                found: tokens.len(),
            });
        }
        Ok(Self { record, tokens })
    }

    fn mismatch(&self, index: usize, field: &'static str, expected: &'static str) -> DecodeError {
        DecodeError::Field {
            record: self.record,
            index,
            field,
            expected,
            found: self.tokens[index].kind(),
        }
    }

    fn uint(&self, index: usize, field: &'static str) -> Result<U256, DecodeError> {
        match &self.tokens[index] {
            Token::Uint(v) => Ok(*v),
            _ => Err(self.mismatch(index, field, "uint")),
        }
    }

    fn u64(&self, index: usize, field: &'static str) -> Result<u64, DecodeError> {
        let v = self.uint(index, field)?;
        if v > U256::from(u64::MAX) {
            return Err(DecodeError::Overflow {
                record: self.record,
                field,
            });
        }
        Ok(v.low_u64())
    }

    fn address(&self, index: usize, field: &'static str) -> Result<String, DecodeError> {
        match &self.tokens[index] {
            Token::Address(bytes) => Ok(format_address(bytes)),
            _ => Err(self.mismatch(index, field, "address")),
        }
    }

    fn optional_address(&self, index: usize, field: &'static str) -> Result<Option<String>, DecodeError> {
        match &self.tokens[index] {
            Token::Address(bytes) if bytes.iter().all(|b| *b == 0) => Ok(None),
            Token::Address(bytes) => Ok(Some(format_address(bytes))),
            _ => Err(self.mismatch(index, field, "address")),
        }
    }

    fn bool(&self, index: usize, field: &'static str) -> Result<bool, DecodeError> {
        match &self.tokens[index] {
            Token::Bool(b) => Ok(*b),
            _ => Err(self.mismatch(index, field, "bool")),
        }
    }

    fn string(&self, index: usize, field: &'static str) -> Result<String, DecodeError> {
        match &self.tokens[index] {
            Token::String(s) => Ok(s.clone()),
            _ => Err(self.mismatch(index, field, "string")),
        }
    }
}

pub fn decode_campaign(tokens: &[Token]) -> Result<Campaign, DecodeError> {
    let f = Fields::new("Campaign", tokens, CAMPAIGN_FIELDS)?;
    Ok(Campaign {
        id: f.u64(0, "id")?,
        owner: f.address(1, "owner")?,
        title: f.string(2, "title")?,
        primary_category: f.string(3, "primaryCategory")?,
        description: f.string(4, "description")?,
        goal_wei: f.uint(5, "goal")?,
        raised_wei: f.uint(6, "raised")?,
        is_active: f.bool(7, "isActive")?,
        image_url: f.string(8, "imageUrl")?,
        metadata_hash: f.string(9, "metadataHash")?,
        deadline: f.u64(10, "deadline")?,
        was_goal_reached: f.bool(11, "wasGoalReached")?,
    })
}

pub fn decode_item(tokens: &[Token]) -> Result<MarketplaceItem, DecodeError> {
    let f = Fields::new("MarketplaceItem", tokens, ITEM_FIELDS)?;
    Ok(MarketplaceItem {
        id: f.u64(0, "id")?,
        seller: f.address(1, "seller")?,
        buyer: f.optional_address(2, "buyer")?,
        title: f.string(3, "title")?,
        description: f.string(4, "description")?,
        price_wei: f.uint(5, "price")?,
        image_url: f.string(6, "imageUrl")?,
        campaign_id: f.u64(7, "campaignId")?,
        is_sold: f.bool(8, "isSold")?,
        is_active: f.bool(9, "isActive")?,
    })
}

pub fn decode_donation(tokens: &[Token]) -> Result<Donation, DecodeError> {
    let f = Fields::new("Donation", tokens, DONATION_FIELDS)?;
    Ok(Donation {
        donor: f.address(0, "donor")?,
        amount_wei: f.uint(1, "amount")?,
        comment: f.string(2, "comment")?,
    })
}

pub fn decode_audit_entry(tokens: &[Token]) -> Result<AuditEntry, DecodeError> {
    let f = Fields::new("AuditEntry", tokens, AUDIT_ENTRY_FIELDS)?;
    Ok(AuditEntry {
        id: f.u64(0, "id")?,
        actor: f.address(1, "actor")?,
        action: f.string(2, "action")?,
        details: f.string(3, "details")?,
        timestamp: f.u64(4, "timestamp")?,
    })
}

/// Decodes an `Array(Tuple(..))` return value such as `getAllCampaigns()`.
/// The first bad element fails the whole list.
pub fn decode_list<T>(
    record: &'static str,
    token: &Token,
    decode_one: fn(&[Token]) -> Result<T, DecodeError>,
) -> Result<Vec<T>, DecodeError> {
    let Token::Array(elements) = token else {
        return Err(DecodeError::NotAList {
            record,
            found: token.kind(),
        });
    };

    elements
        .iter()
        .enumerate()
        .map(|(index, element)| {
            let fields = match element {
                Token::Tuple(fields) => fields.as_slice(),
                other => {
                    return Err(DecodeError::Element {
                        record,
                        index,
                        source: Box::new(DecodeError::NotAList {
                            record,
                            found: other.kind(),
                        }),
                    });
                }
            };
            decode_one(fields).map_err(|e| DecodeError::Element {
                record,
                index,
                source: Box::new(e),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(last: u8) -> Token {
        let mut bytes = [0u8; 20];
        bytes[0] = 0xAB;
        bytes[19] = last;
        Token::Address(bytes)
    }

    fn campaign_tokens() -> Vec<Token> {
        vec![
            Token::Uint(U256::from(7u64)),
            addr(0xCD),
            Token::String("Clean water for Khovd".into()),
            Token::String("community".into()),
            Token::String("Wells for three soums".into()),
            Token::Uint(U256::exp10(18) * U256::from(10u64)),
            Token::Uint(U256::exp10(17) * U256::from(25u64)),
            Token::Bool(true),
            Token::String("ipfs://QmYwAPJzv5CZsnA625s3Xf2nemtYgPpHdWEz79ojWnPbdG".into()),
            Token::String("QmYwAPJzv5CZsnA625s3Xf2nemtYgPpHdWEz79ojWnPbdG".into()),
            Token::Uint(U256::from(1_767_225_600u64)),
            Token::Bool(false),
        ]
    }

    #[test]
    fn decodes_campaign_in_declaration_order() {
        let c = decode_campaign(&campaign_tokens()).unwrap();
        assert_eq!(c.id, 7);
        assert_eq!(c.owner, "0xab000000000000000000000000000000000000cd");
        assert_eq!(c.title, "Clean water for Khovd");
        assert_eq!(c.primary_category, "community");
        assert_eq!(c.goal_wei, U256::exp10(19));
        assert_eq!(c.raised_wei, U256::from_dec_str("2500000000000000000").unwrap());
        assert!(c.is_active);
        assert_eq!(c.deadline, 1_767_225_600);
        assert!(!c.was_goal_reached);
    }

    #[test]
    fn length_drift_is_detected() {
        let mut tokens = campaign_tokens();
        tokens.push(Token::Bool(true));
        assert_eq!(
            decode_campaign(&tokens).unwrap_err(),
            DecodeError::Length { record: "Campaign", expected: 12, found: 13 }
        );

        tokens.truncate(11);
        assert!(matches!(
            decode_campaign(&tokens),
            Err(DecodeError::Length { found: 11, .. })
        ));
    }

    #[test]
    fn swapped_fields_are_detected() {
        let mut tokens = campaign_tokens();
        tokens.swap(7, 8);
        let err = decode_campaign(&tokens).unwrap_err();
        assert_eq!(
            err,
            DecodeError::Field {
                record: "Campaign",
                index: 7,
                field: "isActive",
                expected: "bool",
                found: "string",
            }
        );
    }

    #[test]
    fn oversized_id_overflows() {
        let mut tokens = campaign_tokens();
        tokens[0] = Token::Uint(U256::from(u64::MAX) + U256::one());
        assert_eq!(
            decode_campaign(&tokens).unwrap_err(),
            DecodeError::Overflow { record: "Campaign", field: "id" }
        );
    }

    #[test]
    fn unsold_item_has_no_buyer() {
        let tokens = vec![
            Token::Uint(U256::from(1u64)),
            addr(1),
            Token::Address([0u8; 20]),
            Token::String("Felt slippers".into()),
            Token::String("Handmade".into()),
            Token::Uint(U256::exp10(16)),
            Token::String("".into()),
            Token::Uint(U256::from(7u64)),
            Token::Bool(false),
            Token::Bool(true),
        ];
        let item = decode_item(&tokens).unwrap();
        assert_eq!(item.buyer, None);
        assert_eq!(item.seller, "0xab00000000000000000000000000000000000001");
        assert_eq!(item.campaign_id, 7);
        assert!(item.is_active && !item.is_sold);
    }

    #[test]
    fn list_errors_carry_element_index() {
        let good = Token::Tuple(vec![addr(2), Token::Uint(U256::from(5u64)), Token::String("hi".into())]);
        let bad = Token::Tuple(vec![addr(3), Token::String("5".into()), Token::String("".into())]);
        let list = Token::Array(vec![good.clone(), bad]);

        let err = decode_list("Donation", &list, decode_donation).unwrap_err();
        match err {
            DecodeError::Element { index, source, .. } => {
                assert_eq!(index, 1);
                assert!(matches!(*source, DecodeError::Field { field: "amount", .. }));
            }
            other => panic!("unexpected {:?}", other),
        }

        let ok = decode_list("Donation", &Token::Array(vec![good]), decode_donation).unwrap();
        assert_eq!(ok.len(), 1);
        assert_eq!(ok[0].amount_wei, U256::from(5u64));

        assert!(matches!(
            decode_list("Donation", &Token::Bool(true), decode_donation),
            Err(DecodeError::NotAList { found: "bool", .. })
        ));
    }

    #[test]
    fn audit_entry_decodes() {
        let entry = decode_audit_entry(&[
            Token::Uint(U256::from(0u64)),
            addr(9),
            Token::String("CAMPAIGN_CREATED".into()),
            Token::String("id=7".into()),
            Token::Uint(U256::from(1_700_000_000u64)),
        ])
        .unwrap();
        assert_eq!(entry.action, "CAMPAIGN_CREATED");
        assert_eq!(entry.timestamp, 1_700_000_000);
    }
}
