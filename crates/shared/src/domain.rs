use std::fmt;

use serde::{Deserialize, Serialize};

/// Label shown for the synthetic "no selection" option.
pub const BLANK_LABEL: &str = "---------";
/// Label shown while a field waits for its option list.
pub const LOADING_LABEL: &str = "Loading…";

macro_rules! key_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

key_newtype!(FieldKey);
key_newtype!(OptionValue);

impl OptionValue {
    pub fn blank() -> Self {
        Self(String::new())
    }

    pub fn is_blank(&self) -> bool {
        self.0.is_empty()
    }
}

/// Per-field request counter. Only a response carrying the latest
/// generation issued for its field may be applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct Generation(pub u64);

impl Generation {
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectOption {
    pub value: OptionValue,
    pub label: String,
}

impl SelectOption {
    pub fn new(value: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            value: OptionValue(value.into()),
            label: label.into(),
        }
    }

    pub fn blank() -> Self {
        Self::new("", BLANK_LABEL)
    }

    pub fn loading() -> Self {
        Self::new("", LOADING_LABEL)
    }
}
