//! Account lookup types.

use serde::{Deserialize, Serialize};

/// One account owned by the token holder.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub account_id: String,

    /// `BROKERAGE`, `HIGH_YIELD`, `BOND_ACCOUNT`, ...
    #[serde(default)]
    pub account_type: String,

    #[serde(default)]
    options_level: Option<String>,

    #[serde(default)]
    brokerage_account_type: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Default)]
pub struct AccountsResponse {
    #[serde(default)]
    pub accounts: Vec<Account>,
}

impl AccountsResponse {
    /// Picks the brokerage account, falling back to the first listed account.
    pub fn brokerage_account(&self) -> Option<&Account> {
        self.accounts
            .iter()
            .find(|a| a.account_type == "BROKERAGE")
            .or_else(|| self.accounts.first())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(id: &str, kind: &str) -> Account {
        Account {
            account_id: id.to_string(),
            account_type: kind.to_string(),
            options_level: None,
            brokerage_account_type: None,
        }
    }

    #[test]
    fn prefers_brokerage_account() {
        let resp = AccountsResponse {
            accounts: vec![account("HY1", "HIGH_YIELD"), account("BR1", "BROKERAGE")],
        };
        assert_eq!(resp.brokerage_account().unwrap().account_id, "BR1");
    }

    #[test]
    fn falls_back_to_first_account() {
        let resp = AccountsResponse {
            accounts: vec![account("HY1", "HIGH_YIELD"), account("BD1", "BOND_ACCOUNT")],
        };
        assert_eq!(resp.brokerage_account().unwrap().account_id, "HY1");
    }

    #[test]
    fn empty_has_no_account() {
        assert!(AccountsResponse::default().brokerage_account().is_none());
    }
}
