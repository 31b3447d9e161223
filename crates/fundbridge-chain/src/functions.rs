//! Function tables for the deployed contracts.
//!
//! Struct-returning getters (`getCampaign`, `getItem`, `getLog`) return one
//! tuple; list getters return an array of those tuples.

use crate::abi::{Function, ParamType};

use ParamType::{Address, Bool, String as Str, Uint};

fn array_of(tuple: ParamType) -> ParamType {
    ParamType::Array(Box::new(tuple))
}

pub fn campaign_tuple() -> ParamType {
    ParamType::Tuple(vec![
        Uint,    // id
        Address, // owner
        Str,     // title
        Str,     // primaryCategory
        Str,     // description
        Uint,    // goal
        Uint,    // raised
        Bool,    // isActive
        Str,     // imageUrl
        Str,     // metadataHash
        Uint,    // deadline
        Bool,    // wasGoalReached
    ])
}

pub fn item_tuple() -> ParamType {
    ParamType::Tuple(vec![
        Uint,    // id
        Address, // seller
        Address, // buyer
        Str,     // title
        Str,     // description
        Uint,    // price
        Str,     // imageUrl
        Uint,    // campaignId
        Bool,    // isSold
        Bool,    // isActive
    ])
}

pub fn donation_tuple() -> ParamType {
    ParamType::Tuple(vec![Address, Uint, Str])
}

pub fn audit_entry_tuple() -> ParamType {
    ParamType::Tuple(vec![Uint, Address, Str, Str, Uint])
}

pub mod fundraising {
    use super::*;

    pub fn create_campaign() -> Function {
        Function::new(
            "createCampaign",
            vec![Str, Str, Str, Uint, Str, Str, Uint],
            vec![],
        )
    }

    pub fn donate() -> Function {
        Function::new("donate", vec![Uint, Str], vec![]).payable()
    }

    pub fn get_campaign() -> Function {
        Function::new("getCampaign", vec![Uint], vec![campaign_tuple()])
    }

    pub fn get_all_campaigns() -> Function {
        Function::new("getAllCampaigns", vec![], vec![array_of(campaign_tuple())])
    }

    pub fn close_campaign() -> Function {
        Function::new("closeCampaign", vec![Uint], vec![])
    }

    pub fn withdraw() -> Function {
        Function::new("withdraw", vec![Uint], vec![])
    }

    pub fn withdraw_all() -> Function {
        Function::new("withdrawAll", vec![Uint], vec![])
    }

    pub fn update_campaign() -> Function {
        Function::new(
            "updateCampaign",
            vec![Uint, Str, Str, Str, Uint, Str, Uint],
            vec![],
        )
    }

    pub fn update_metadata_hash() -> Function {
        Function::new("updateMetadataHash", vec![Uint, Str], vec![])
    }

    pub fn get_donations_history() -> Function {
        Function::new("getDonationsHistory", vec![Uint], vec![array_of(donation_tuple())])
    }
}

pub mod marketplace {
    use super::*;

    pub fn create_item() -> Function {
        Function::new("createItem", vec![Str, Str, Uint, Str, Uint], vec![])
    }

    pub fn buy_item() -> Function {
        Function::new("buyItem", vec![Uint], vec![]).payable()
    }

    pub fn get_item() -> Function {
        Function::new("getItem", vec![Uint], vec![item_tuple()])
    }

    pub fn get_all_items() -> Function {
        Function::new("getAllItems", vec![], vec![array_of(item_tuple())])
    }

    pub fn update_item() -> Function {
        Function::new("updateItem", vec![Uint, Str, Str, Uint, Str], vec![])
    }

    pub fn deactivate_item() -> Function {
        Function::new("deactivateItem", vec![Uint], vec![])
    }
}

pub mod audit_log {
    use super::*;

    pub fn add_log() -> Function {
        Function::new("addLog", vec![Str, Str], vec![])
    }

    pub fn get_logs() -> Function {
        Function::new("getLogs", vec![], vec![array_of(audit_entry_tuple())])
    }

    pub fn get_log() -> Function {
        Function::new("getLog", vec![Uint], vec![audit_entry_tuple()])
    }

    pub fn get_count() -> Function {
        Function::new("getCount", vec![], vec![Uint])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signatures() {
        assert_eq!(
            fundraising::create_campaign().signature(),
            "createCampaign(string,string,string,uint256,string,string,uint256)"
        );
        assert_eq!(fundraising::donate().signature(), "donate(uint256,string)");
        assert_eq!(fundraising::get_all_campaigns().signature(), "getAllCampaigns()");
        assert_eq!(marketplace::update_item().signature(), "updateItem(uint256,string,string,uint256,string)");
        assert_eq!(audit_log::add_log().signature(), "addLog(string,string)");
    }

    #[test]
    fn only_value_carrying_calls_are_payable() {
        assert!(fundraising::donate().payable);
        assert!(marketplace::buy_item().payable);
        assert!(!fundraising::withdraw_all().payable);
        assert!(!marketplace::deactivate_item().payable);
    }

    #[test]
    fn tuple_widths_match_records() {
        use fundbridge_core::decode::{AUDIT_ENTRY_FIELDS, CAMPAIGN_FIELDS, DONATION_FIELDS, ITEM_FIELDS};

        let width = |t: ParamType| match t {
            ParamType::Tuple(m) => m.len(),
            _ => 0,
        };
        assert_eq!(width(campaign_tuple()), CAMPAIGN_FIELDS);
        assert_eq!(width(item_tuple()), ITEM_FIELDS);
        assert_eq!(width(donation_tuple()), DONATION_FIELDS);
        assert_eq!(width(audit_entry_tuple()), AUDIT_ENTRY_FIELDS);
    }
}
