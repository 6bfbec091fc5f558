use std::fmt;

use crate::error::SchemaError;

/// Trust classification, 0 (most restrictive) through 4.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SecurityLevel(u8);

impl SecurityLevel {
    pub const NULLSEC: Self = Self(0);
    pub const LOWSEC: Self = Self(1);
    pub const MIDSEC: Self = Self(2);
    pub const HIGHSEC: Self = Self(3);
    pub const FULLSEC: Self = Self(4);

    const NAMES: [&'static str; 5] = ["NULLSEC", "LOWSEC", "MIDSEC", "HIGHSEC", "FULLSEC"];

    pub fn new(level: i64) -> Result<Self, SchemaError> {
        u8::try_from(level)
            .ok()
            .filter(|l| *l <= Self::FULLSEC.0)
            .map(Self)
            .ok_or(SchemaError::Level(level))
    }

    pub fn value(self) -> u8 {
        self.0
    }

    pub fn name(self) -> &'static str {
        Self::NAMES[usize::from(self.0)]
    }
}

impl Default for SecurityLevel {
    fn default() -> Self {
        Self::FULLSEC
    }
}

impl fmt::Display for SecurityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Visibility {
    Hidden,
    #[default]
    Private,
    Public,
    Trust,
}

impl Visibility {
    pub fn as_str(self) -> &'static str {
        match self {
            Visibility::Hidden => "HIDDEN",
            Visibility::Private => "PRIVATE",
            Visibility::Public => "PUBLIC",
            Visibility::Trust => "TRUST",
        }
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_are_bounded() {
        assert_eq!(SecurityLevel::new(2).unwrap().name(), "MIDSEC");
        assert!(SecurityLevel::new(5).is_err());
        assert!(SecurityLevel::new(-1).is_err());
        assert!(SecurityLevel::NULLSEC < SecurityLevel::FULLSEC);
    }
}
