use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How the skill catalog is exposed to the model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mechanism {
    /// Catalog behind a callable lookup tool
    Tool,
    /// Terse routing index in the system message
    Compressed,
    /// Full name + description listing in the system message
    Fat,
}

impl Mechanism {
    pub const ALL: [Mechanism; 3] = [Mechanism::Tool, Mechanism::Compressed, Mechanism::Fat];

    pub fn as_str(&self) -> &'static str {
        match self {
            Mechanism::Tool => "tool",
            Mechanism::Compressed => "compressed",
            Mechanism::Fat => "fat",
        }
    }
}

impl fmt::Display for Mechanism {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mechanism {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "tool" => Ok(Mechanism::Tool),
            "compressed" => Ok(Mechanism::Compressed),
            "fat" => Ok(Mechanism::Fat),
            other => Err(format!(
                "unknown mechanism '{}' (expected tool, compressed or fat)",
                other
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_mechanism() {
        assert_eq!("tool".parse::<Mechanism>().unwrap(), Mechanism::Tool);
        assert_eq!(" FAT ".parse::<Mechanism>().unwrap(), Mechanism::Fat);
        assert!("index".parse::<Mechanism>().is_err());
    }

    #[test]
    fn test_display_matches_serde() {
        for mechanism in Mechanism::ALL {
            let json = serde_json::to_string(&mechanism).unwrap();
            assert_eq!(json, format!("\"{}\"", mechanism));
        }
    }
}
