//! Registry of supported institutions.
//!
//! Every institution here fronts the same Fiserv retail online portal; they
//! differ only in branding, homepage, and routing number.

use crate::error::ConfigError;

/// Default host of the shared retail online portal.
pub const DEFAULT_REMOTE_HOST: &str = "retailonline.fiservapps.com";

/// Default portal theme number.
pub const DEFAULT_THEME_NUMBER: u32 = 1;

/// A supported bank.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Institution {
    pub name: &'static str,
    pub homepage_url: &'static str,
    pub routing_number: &'static str,
}

/// The fixed table of supported institutions.
pub static INSTITUTIONS: [Institution; 5] = [
    Institution {
        name: "First Federal Lakewood",
        homepage_url: "https://www.ffl.net",
        routing_number: "241071212",
    },
    Institution {
        name: "Blue Grass Federal",
        homepage_url: "https://www.bluegrassfederal.com",
        routing_number: "242170549",
    },
    Institution {
        name: "First Mutual Bank",
        homepage_url: "https://www.1stmutualbank.com",
        routing_number: "244270191",
    },
    Institution {
        name: "Martinsville First Savings Bank",
        homepage_url: "https://www.martinsvillefirst.com",
        routing_number: "251472759",
    },
    Institution {
        name: "Warsaw Federal",
        homepage_url: "https://www.warsawfederal.com",
        routing_number: "242071855",
    },
];

impl Institution {
    /// Look up an institution by its homepage URL. One trailing `/` is ignored.
    pub fn from_homepage(url: &str) -> Result<&'static Institution, ConfigError> {
        let trimmed = url.strip_suffix('/').unwrap_or(url);
        INSTITUTIONS
            .iter()
            .find(|i| i.homepage_url == trimmed)
            .ok_or_else(|| ConfigError::UnknownInstitution(trimmed.to_string()))
    }

    /// Homepage with a trailing slash, as a browser sends it in `Referer`.
    pub fn referer(&self) -> String {
        format!("{}/", self.homepage_url)
    }
}
