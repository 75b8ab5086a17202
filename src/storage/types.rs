//! core value types for the account store.

use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A validated account identifier.
///
/// Identifiers are chosen by the caller and are globally unique once an
/// account has been created with them.
///
/// Valid identifiers:
/// - 1-128 characters
/// - no whitespace or control characters
///
/// Ordering is plain string ordering and is what the transaction manager
/// uses to lock several accounts in a fixed global order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AccountId(String);

impl AccountId {
    /// longest identifier accepted
    pub const MAX_LEN: usize = 128;

    /// create a new AccountId, validating the input
    pub fn new(id: impl Into<String>) -> Result<Self, InvalidIdError> {
        let id = id.into();
        Self::validate(&id)?;
        Ok(Self(id))
    }

    fn validate(id: &str) -> Result<(), InvalidIdError> {
        if id.is_empty() {
            return Err(InvalidIdError::Empty);
        }

        let len = id.chars().count();
        if len > Self::MAX_LEN {
            return Err(InvalidIdError::TooLong(len));
        }

        for (i, c) in id.chars().enumerate() {
            if c.is_whitespace() || c.is_control() {
                return Err(InvalidIdError::InvalidCharacter { char: c, position: i });
            }
        }

        Ok(())
    }

    /// get the string representation
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// convert to owned String
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for AccountId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for AccountId {
    type Error = InvalidIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<AccountId> for String {
    fn from(id: AccountId) -> Self {
        id.0
    }
}

impl std::str::FromStr for AccountId {
    type Err = InvalidIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// An account as seen from outside the store: its id and a balance value.
///
/// This is a plain value. The authoritative copy lives in the store as an
/// [`AccountRecord`](crate::storage::AccountRecord).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// immutable identity
    pub account_id: AccountId,
    /// current balance, never negative once created
    pub balance: Decimal,
}

impl Account {
    /// a new account with a zero balance
    pub fn new(account_id: AccountId) -> Self {
        Self {
            account_id,
            balance: Decimal::ZERO,
        }
    }

    /// a new account with an opening balance
    pub fn with_balance(account_id: AccountId, balance: Decimal) -> Self {
        Self {
            account_id,
            balance,
        }
    }

    /// get the account id
    pub fn id(&self) -> &AccountId {
        &self.account_id
    }
}

/// error type for invalid account identifiers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidIdError {
    Empty,
    TooLong(usize),
    InvalidCharacter { char: char, position: usize },
}

impl fmt::Display for InvalidIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "account id cannot be empty"),
            Self::TooLong(len) => write!(f, "account id too long: {} characters", len),
            Self::InvalidCharacter { char, position } => {
                write!(f, "invalid character {:?} at position {}", char, position)
            }
        }
    }
}

impl std::error::Error for InvalidIdError {}
