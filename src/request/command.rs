//! Client Commands
//!
//! Parsing of the single-line text protocol.

use std::fmt;
use std::str::FromStr;

use crate::cache::FoodId;
use crate::error::{Error, Result};

pub const GET_FOOD: &str = "get-food";
pub const GET_FOOD_REPORT: &str = "get-food-report";
pub const GET_FOOD_BY_BARCODE: &str = "get-food-by-barcode";

/// A parsed client command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Keyword search
    GetFood { keywords: Vec<String> },
    /// Lookup by FoodData Central id
    GetFoodReport { fdc_id: FoodId },
    /// Lookup by barcode
    GetFoodByBarcode { gtin_upc: String },
}

impl Command {
    /// Parse raw request text. Line terminators anywhere in the input are
    /// dropped; tokens are separated by whitespace.
    pub fn parse(raw: &str) -> Result<Self> {
        let line = raw.replace(['\r', '\n'], "");
        let mut tokens = line.split_whitespace();

        let name = tokens
            .next()
            .ok_or_else(|| Error::InvalidRequest("empty request".into()))?;
        let args: Vec<&str> = tokens.collect();

        match name {
            GET_FOOD => {
                if args.is_empty() {
                    return Err(Error::InvalidRequest("keywords missing".into()));
                }
                Ok(Command::GetFood {
                    keywords: args.into_iter().map(str::to_string).collect(),
                })
            }
            GET_FOOD_REPORT => {
                let arg = single_arg(name, &args, "fdcId")?;
                let fdc_id = arg
                    .parse()
                    .map_err(|_| Error::InvalidRequest(format!("invalid fdcId '{}'", arg)))?;
                Ok(Command::GetFoodReport { fdc_id })
            }
            GET_FOOD_BY_BARCODE => {
                let arg = single_arg(name, &args, "gtinUpc")?;
                Ok(Command::GetFoodByBarcode {
                    gtin_upc: arg.to_string(),
                })
            }
            other => Err(Error::InvalidRequest(format!("unknown command '{}'", other))),
        }
    }

    /// Key under which a keyword search is cached
    pub fn keyword_key(keywords: &[String]) -> String {
        keywords.join(" ")
    }
}

fn single_arg<'a>(command: &str, args: &[&'a str], what: &str) -> Result<&'a str> {
    match args {
        [arg] => Ok(*arg),
        [] => Err(Error::InvalidRequest(format!("{} missing", what))),
        _ => Err(Error::InvalidRequest(format!(
            "{} takes exactly one argument",
            command
        ))),
    }
}

impl FromStr for Command {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::GetFood { keywords } => write!(f, "{} {}", GET_FOOD, keywords.join(" ")),
            Command::GetFoodReport { fdc_id } => write!(f, "{} {}", GET_FOOD_REPORT, fdc_id),
            Command::GetFoodByBarcode { gtin_upc } => {
                write!(f, "{} {}", GET_FOOD_BY_BARCODE, gtin_upc)
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use proptest::prelude::*;

    #[test]
    fn test_parse_food_report() {
        assert_eq!(
            Command::parse("get-food-report 534358\r\n").unwrap(),
            Command::GetFoodReport { fdc_id: 534358 }
        );
    }

    #[test]
    fn test_parse_keywords() {
        let command: Command = "get-food raffaello  treat".parse().unwrap();
        assert_eq!(
            command,
            Command::GetFood {
                keywords: vec!["raffaello".into(), "treat".into()]
            }
        );
    }

    #[test]
    fn test_parse_barcode() {
        assert_eq!(
            Command::parse("get-food-by-barcode 009800146130").unwrap(),
            Command::GetFoodByBarcode {
                gtin_upc: "009800146130".into()
            }
        );
    }

    #[test]
    fn test_parse_rejects_malformed_requests() {
        assert_matches!(Command::parse(""), Err(Error::InvalidRequest(_)));
        assert_matches!(Command::parse("\n"), Err(Error::InvalidRequest(_)));
        assert_matches!(Command::parse("get-food"), Err(Error::InvalidRequest(_)));
        assert_matches!(Command::parse("get-food-report"), Err(Error::InvalidRequest(_)));
        assert_matches!(Command::parse("get-food-report abc"), Err(Error::InvalidRequest(_)));
        assert_matches!(Command::parse("get-food-report 1 2"), Err(Error::InvalidRequest(_)));
        assert_matches!(Command::parse("get-drink cola"), Err(Error::InvalidRequest(_)));
    }

    #[test]
    fn test_keyword_key_joins_with_single_space() {
        let keywords = vec!["cheddar".to_string(), "cheese".to_string()];
        assert_eq!(Command::keyword_key(&keywords), "cheddar cheese");
    }

    proptest! {
        #[test]
        fn prop_display_round_trips(keywords in prop::collection::vec("[a-z]{1,12}", 1..6)) {
            let command = Command::GetFood { keywords };
            let parsed = Command::parse(&command.to_string()).unwrap();
            prop_assert_eq!(parsed, command);
        }

        #[test]
        fn prop_any_id_parses(id in any::<u64>()) {
            let parsed = Command::parse(&format!("get-food-report {}", id)).unwrap();
            prop_assert_eq!(parsed, Command::GetFoodReport { fdc_id: id });
        }
    }
}
