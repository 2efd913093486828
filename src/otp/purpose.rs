use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;

/// Use-case a code is scoped to. A code issued for one purpose never
/// satisfies another.
#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Purpose {
    Login,
    Register,
    PhoneChange,
}

impl Purpose {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Login => "login",
            Self::Register => "register",
            Self::PhoneChange => "phone_change",
        }
    }
}

impl fmt::Display for Purpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Purpose {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "login" => Ok(Self::Login),
            "register" => Ok(Self::Register),
            "phone_change" => Ok(Self::PhoneChange),
            other => Err(format!("unknown purpose: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    #[test]
    fn purpose_parses_db_values() {
        assert_eq!("login".parse::<Purpose>(), Ok(Purpose::Login));
        assert_eq!("REGISTER".parse::<Purpose>(), Ok(Purpose::Register));
        assert_eq!("phone_change".parse::<Purpose>(), Ok(Purpose::PhoneChange));
        assert!("reset".parse::<Purpose>().is_err());
    }

    #[test]
    fn purpose_serializes_snake_case() -> Result<()> {
        let value = serde_json::to_value(Purpose::PhoneChange)?;
        assert_eq!(value, serde_json::json!("phone_change"));
        let decoded: Purpose = serde_json::from_value(serde_json::json!("login"))?;
        assert_eq!(decoded, Purpose::Login);
        Ok(())
    }
}
