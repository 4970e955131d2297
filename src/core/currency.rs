use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Currencies accepted by the payment gateway
///
/// All amounts are carried as integers in the currency's minor unit. The CFA
/// francs, the Congolese franc and the Guinean franc have no subdivision in
/// practice, so for those the minor unit is the franc itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    /// West African CFA franc
    XOF,
    /// Central African CFA franc
    XAF,
    /// Congolese franc
    CDF,
    /// Guinean franc
    GNF,
    /// US Dollar (cents)
    USD,
}

impl Currency {
    /// Validates an amount expressed in minor units
    ///
    /// The gateway rejects CFA amounts that are not multiples of 5.
    pub fn validate_amount(&self, amount: i64) -> Result<(), String> {
        if amount <= 0 {
            return Err(format!("{} amount must be positive, got {}", self, amount));
        }

        match self {
            Currency::XOF | Currency::XAF if amount % 5 != 0 => Err(format!(
                "{} amounts must be a multiple of 5, got {}",
                self, amount
            )),
            _ => Ok(()),
        }
    }

    /// Formats an amount for display
    pub fn format_amount(&self, amount: i64) -> String {
        match self {
            Currency::USD => format!("{} {}.{:02}", self, amount / 100, (amount % 100).abs()),
            _ => format!("{} {}", self, amount),
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let code = match self {
            Currency::XOF => "XOF",
            Currency::XAF => "XAF",
            Currency::CDF => "CDF",
            Currency::GNF => "GNF",
            Currency::USD => "USD",
        };
        f.write_str(code)
    }
}

impl FromStr for Currency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "XOF" => Ok(Currency::XOF),
            "XAF" => Ok(Currency::XAF),
            "CDF" => Ok(Currency::CDF),
            "GNF" => Ok(Currency::GNF),
            "USD" => Ok(Currency::USD),
            _ => Err(format!("Unsupported currency: {}", s)),
        }
    }
}
