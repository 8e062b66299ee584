use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};

/// Physical site an employee is assigned to.
#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
pub enum Branch {
    #[serde(rename = "GODOWN HQ")]
    #[strum(serialize = "GODOWN HQ")]
    GodownHq,
    #[serde(rename = "NAIVASHA BRANCH")]
    #[strum(serialize = "NAIVASHA BRANCH")]
    Naivasha,
    #[serde(rename = "OLKALOU BRANCH")]
    #[strum(serialize = "OLKALOU BRANCH")]
    Olkalou,
    #[serde(rename = "GILGIL BRANCH")]
    #[strum(serialize = "GILGIL BRANCH")]
    Gilgil,
    #[serde(rename = "ENGINEER BRANCH")]
    #[strum(serialize = "ENGINEER BRANCH")]
    Engineer,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn display_and_parse_agree() {
        assert_eq!(Branch::Gilgil.to_string(), "GILGIL BRANCH");
        assert_eq!(Branch::from_str("GODOWN HQ").unwrap(), Branch::GodownHq);
        assert!(Branch::from_str("Gilgil").is_err());
    }
}
