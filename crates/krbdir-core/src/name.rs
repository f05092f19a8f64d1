//! Realm-qualified principal names.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::error::Error as CoreError;

/// Separator between the principal name and its realm.
pub const REALM_SEPARATOR: char = '@';

const ESCAPE: char = '\\';

/// Errors that can occur when parsing principal names.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PrincipalNameError {
    /// The name component was empty.
    #[error("principal name cannot be empty")]
    Empty,
    /// A realm separator was present but nothing followed it.
    #[error("principal `{0}` has an empty realm")]
    EmptyRealm(String),
    /// More than one unescaped realm separator.
    #[error("principal `{0}` contains more than one realm separator")]
    MultipleRealms(String),
    /// No realm was given where one is required.
    #[error("principal `{0}` is not qualified with a realm")]
    MissingRealm(String),
    /// The name ended with an escape character.
    #[error("principal name contains an unterminated escape sequence")]
    UnterminatedEscape,
}

impl From<PrincipalNameError> for CoreError {
    fn from(err: PrincipalNameError) -> Self {
        CoreError::BadData(err.to_string())
    }
}

/// A principal identity: the pair (name, realm).
///
/// Two names are equal iff both components match exactly.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PrincipalName {
    name: String,
    realm: String,
}

impl PrincipalName {
    /// Creates a name from already-unescaped components.
    #[must_use]
    pub fn new(name: impl Into<String>, realm: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            realm: realm.into(),
        }
    }

    /// Parses `name[@REALM]`, qualifying it with `default_realm` when no realm is present.
    ///
    /// A backslash escapes the following character, so `svc\@host` names a principal whose
    /// name contains an `@`.
    ///
    /// # Errors
    ///
    /// Returns [`PrincipalNameError`] for empty components, a dangling escape or repeated
    /// realm separators.
    pub fn parse(
        input: impl AsRef<str>,
        default_realm: &str,
    ) -> std::result::Result<Self, PrincipalNameError> {
        let input = input.as_ref();
        let (name, realm) = split_realm(input)?;
        let realm = match realm {
            Some(realm) if realm.is_empty() => {
                return Err(PrincipalNameError::EmptyRealm(input.to_string()))
            }
            Some(realm) => realm,
            None => default_realm.to_string(),
        };
        Ok(Self { name, realm })
    }

    /// Parses a name that must already carry its realm.
    ///
    /// # Errors
    ///
    /// Returns [`PrincipalNameError::MissingRealm`] when no realm is present.
    pub fn parse_qualified(input: impl AsRef<str>) -> std::result::Result<Self, PrincipalNameError> {
        let input = input.as_ref();
        match split_realm(input)? {
            (_, None) => Err(PrincipalNameError::MissingRealm(input.to_string())),
            (_, Some(realm)) if realm.is_empty() => {
                Err(PrincipalNameError::EmptyRealm(input.to_string()))
            }
            (name, Some(realm)) => Ok(Self { name, realm }),
        }
    }

    /// The name component, unescaped.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The realm component.
    #[must_use]
    pub fn realm(&self) -> &str {
        &self.realm
    }

    /// Returns true if this principal lives in `realm`.
    #[must_use]
    pub fn in_realm(&self, realm: &str) -> bool {
        self.realm == realm
    }

    /// Returns the same name moved into another realm.
    #[must_use]
    pub fn with_realm(mut self, realm: impl Into<String>) -> Self {
        self.realm = realm.into();
        self
    }
}

impl fmt::Display for PrincipalName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{REALM_SEPARATOR}{}", escape(&self.name), self.realm)
    }
}

impl FromStr for PrincipalName {
    type Err = PrincipalNameError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::parse_qualified(s)
    }
}

impl From<PrincipalName> for String {
    fn from(value: PrincipalName) -> Self {
        value.to_string()
    }
}

/// Returns true if `input` contains an unescaped realm separator.
#[must_use]
pub fn has_realm(input: &str) -> bool {
    let mut escape = false;
    for ch in input.chars() {
        if escape {
            escape = false;
        } else if ch == ESCAPE {
            escape = true;
        } else if ch == REALM_SEPARATOR {
            return true;
        }
    }
    false
}

fn split_realm(input: &str) -> std::result::Result<(String, Option<String>), PrincipalNameError> {
    let mut name = String::with_capacity(input.len());
    let mut realm: Option<String> = None;
    let mut escape = false;

    for ch in input.chars() {
        if escape {
            realm.as_mut().unwrap_or(&mut name).push(ch);
            escape = false;
            continue;
        }

        match ch {
            ESCAPE => escape = true,
            REALM_SEPARATOR => {
                if realm.is_some() {
                    return Err(PrincipalNameError::MultipleRealms(input.to_string()));
                }
                realm = Some(String::new());
            }
            _ => realm.as_mut().unwrap_or(&mut name).push(ch),
        }
    }

    if escape {
        return Err(PrincipalNameError::UnterminatedEscape);
    }
    if name.is_empty() {
        return Err(PrincipalNameError::Empty);
    }

    Ok((name, realm))
}

fn escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        if ch == ESCAPE || ch == REALM_SEPARATOR {
            escaped.push(ESCAPE);
        }
        escaped.push(ch);
    }
    escaped
}
