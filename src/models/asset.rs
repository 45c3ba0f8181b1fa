use serde::{Deserialize, Serialize};

pub const LOVELACE: &str = "lovelace";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Asset {
    pub policy_id: String,
    pub name_hex: String,
}

impl Asset {
    pub fn new(policy_id: &str, name_hex: &str) -> Self {
        Self {
            policy_id: policy_id.to_lowercase(),
            name_hex: name_hex.to_lowercase(),
        }
    }

    /// Build an asset from a readable token name, e.g. `"PIZADA"`.
    pub fn from_text(policy_id: &str, name: &str) -> Self {
        Self::new(policy_id, &hex::encode(name.as_bytes()))
    }

    pub fn from_identifier(id: &str) -> Asset {
        let id = id.replace('.', "");
        Asset::new(&id[..56], &id[56..])
    }

    pub fn identifier(&self, delimiter: &str) -> String {
        format!("{}{}{}", self.policy_id, delimiter, self.name_hex)
    }

    pub fn asset_name(&self) -> String {
        String::from_utf8_lossy(&hex::decode(&self.name_hex).unwrap_or_default()).to_string()
    }
}

/// An asset class: ada or a native token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Token {
    Lovelace,
    Asset(Asset),
}

impl Token {
    pub fn is_lovelace(&self) -> bool {
        matches!(self, Token::Lovelace)
    }

    pub fn policy_id(&self) -> Option<&str> {
        match self {
            Token::Lovelace => None,
            Token::Asset(a) => Some(&a.policy_id),
        }
    }

    pub fn as_asset(&self) -> Option<&Asset> {
        match self {
            Token::Lovelace => None,
            Token::Asset(a) => Some(a),
        }
    }

    /// Datums carry assets as `(policy, name)`; the empty pair is ada.
    pub fn from_parts(policy_hex: &str, name_hex: &str) -> Token {
        if policy_hex.is_empty() && name_hex.is_empty() {
            Token::Lovelace
        } else {
            Token::Asset(Asset::new(policy_hex, name_hex))
        }
    }

    pub fn parts(&self) -> (String, String) {
        match self {
            Token::Lovelace => (String::new(), String::new()),
            Token::Asset(a) => (a.policy_id.clone(), a.name_hex.clone()),
        }
    }

    pub fn unit(&self) -> String {
        token_identifier(self)
    }
}

pub fn from_identifier(id: &str) -> Token {
    let id = id.replace('.', "");
    if id == LOVELACE || id.is_empty() || id.len() < 56 {
        return Token::Lovelace;
    }
    Token::Asset(Asset::from_identifier(&id))
}

pub fn token_name(token: &Token) -> String {
    match token {
        Token::Lovelace => "ADA".to_string(),
        Token::Asset(a) => a.asset_name(),
    }
}

pub fn token_identifier(token: &Token) -> String {
    match token {
        Token::Lovelace => LOVELACE.to_string(),
        Token::Asset(a) => a.identifier(""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const POLICY: &str = "f13ac4d66b3ee19a6aa0f2a22298737bd907cc95121662fc971b5275";

    #[test]
    fn test_identifier_round_trip() {
        let pizada = Token::Asset(Asset::from_text(POLICY, "PIZADA"));
        let unit = pizada.unit();
        assert_eq!(unit, format!("{}50495a414441", POLICY));
        assert_eq!(from_identifier(&unit), pizada);
        assert_eq!(token_name(&pizada), "PIZADA");
    }

    #[test]
    fn test_empty_parts_are_lovelace() {
        assert_eq!(Token::from_parts("", ""), Token::Lovelace);
        assert_eq!(Token::Lovelace.parts(), (String::new(), String::new()));
        assert_eq!(from_identifier("lovelace"), Token::Lovelace);
    }
}
