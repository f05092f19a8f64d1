//! Principal records, seeds and attribute flags.

use bitflags::bitflags;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use std::time::Duration;

use crate::error::Error;
use crate::mask::FieldMask;
use crate::name::PrincipalName;

bitflags! {
    /// Principal attribute bits.
    ///
    /// Unknown bits are preserved as-is.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct PrincipalFlags: u32 {
        /// Postdated tickets are not allowed
        const DISALLOW_POSTDATED = 0x0001;
        /// Forwardable tickets are not allowed
        const DISALLOW_FORWARDABLE = 0x0002;
        /// TGT-based requests are not allowed
        const DISALLOW_TGT_BASED = 0x0004;
        /// Renewable tickets are not allowed
        const DISALLOW_RENEWABLE = 0x0008;
        /// Proxiable tickets are not allowed
        const DISALLOW_PROXIABLE = 0x0010;
        /// Duplicate session keys are not allowed
        const DISALLOW_DUP_SKEY = 0x0020;
        /// No tickets at all (principal disabled)
        const DISALLOW_ALL_TIX = 0x0040;
        /// Pre-authentication required
        const REQUIRES_PREAUTH = 0x0080;
        /// Hardware pre-authentication required
        const REQUIRES_HWAUTH = 0x0100;
        /// Password change required
        const REQUIRES_PWCHANGE = 0x0200;
    }
}

// Serialized as the raw attribute integer.
impl Serialize for PrincipalFlags {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.bits().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for PrincipalFlags {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let bits = u32::deserialize(deserializer)?;
        Ok(PrincipalFlags::from_bits_retain(bits))
    }
}

/// Named boolean views over [`PrincipalFlags`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrincipalFlag {
    /// Tickets may be issued (negated `DISALLOW_ALL_TIX`)
    AllowTix,
    /// Forwardable tickets may be issued (negated `DISALLOW_FORWARDABLE`)
    AllowForwardable,
    /// Renewable tickets may be issued (negated `DISALLOW_RENEWABLE`)
    AllowRenewable,
    /// `REQUIRES_PREAUTH`
    RequiresPreauth,
    /// `REQUIRES_HWAUTH`
    RequiresHwauth,
    /// `REQUIRES_PWCHANGE`
    RequiresPwchange,
}

impl PrincipalFlag {
    /// All named flags.
    pub const ALL: [Self; 6] = [
        Self::AllowTix,
        Self::AllowForwardable,
        Self::AllowRenewable,
        Self::RequiresPreauth,
        Self::RequiresHwauth,
        Self::RequiresPwchange,
    ];

    /// Returns the attribute name of the flag.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::AllowTix => "allowTix",
            Self::AllowForwardable => "allowForwardable",
            Self::AllowRenewable => "allowRenewable",
            Self::RequiresPreauth => "requiresPreauth",
            Self::RequiresHwauth => "requiresHwauth",
            Self::RequiresPwchange => "requiresPwchange",
        }
    }

    /// The underlying bit and whether the bit is stored negated.
    const fn bit(self) -> (PrincipalFlags, bool) {
        match self {
            Self::AllowTix => (PrincipalFlags::DISALLOW_ALL_TIX, true),
            Self::AllowForwardable => (PrincipalFlags::DISALLOW_FORWARDABLE, true),
            Self::AllowRenewable => (PrincipalFlags::DISALLOW_RENEWABLE, true),
            Self::RequiresPreauth => (PrincipalFlags::REQUIRES_PREAUTH, false),
            Self::RequiresHwauth => (PrincipalFlags::REQUIRES_HWAUTH, false),
            Self::RequiresPwchange => (PrincipalFlags::REQUIRES_PWCHANGE, false),
        }
    }
}

impl fmt::Display for PrincipalFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PrincipalFlag {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|flag| flag.name() == s)
            .ok_or_else(|| Error::InvalidInput(format!("unknown principal flag `{s}`")))
    }
}

impl PrincipalFlags {
    /// Reads a named flag.
    #[must_use]
    pub const fn flag(self, flag: PrincipalFlag) -> bool {
        let (bit, negated) = flag.bit();
        self.contains(bit) != negated
    }

    /// Sets a named flag, returning the updated value.
    #[must_use]
    pub fn with_flag(mut self, flag: PrincipalFlag, value: bool) -> Self {
        let (bit, negated) = flag.bit();
        self.set(bit, value != negated);
        self
    }

    /// Returns true unless the principal is disabled.
    #[must_use]
    pub const fn allows_tickets(self) -> bool {
        self.flag(PrincipalFlag::AllowTix)
    }
}

/// A principal record as returned by the administration service.
///
/// Identity is the (name, realm) pair: two records compare equal iff their names match.
/// Zero timestamps and durations are represented as `None`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Principal {
    /// Realm-qualified name.
    pub name: PrincipalName,
    /// When the principal expires.
    #[serde(default)]
    pub expiration: Option<DateTime<Utc>>,
    /// When the password expires.
    #[serde(default)]
    pub password_expiration: Option<DateTime<Utc>>,
    /// When the password was last changed.
    #[serde(default)]
    pub last_password_change: Option<DateTime<Utc>>,
    /// Principal that last modified this record.
    #[serde(default)]
    pub modified_by: Option<PrincipalName>,
    /// When this record was last modified.
    #[serde(default)]
    pub modified_at: Option<DateTime<Utc>>,
    /// Attribute flags.
    #[serde(default)]
    pub attributes: PrincipalFlags,
    /// Associated policy.
    #[serde(default)]
    pub policy: Option<String>,
    /// Maximum ticket life.
    #[serde(default)]
    pub max_ticket_life: Option<Duration>,
    /// Maximum renewable ticket life.
    #[serde(default)]
    pub max_renewable_life: Option<Duration>,
    /// Last successful authentication.
    #[serde(default)]
    pub last_login: Option<DateTime<Utc>>,
    /// Last failed authentication.
    #[serde(default)]
    pub last_failed_login: Option<DateTime<Utc>>,
}

impl PartialEq for Principal {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for Principal {}

impl Hash for Principal {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

impl Principal {
    /// Creates a builder for a record with all other fields at their defaults.
    #[must_use]
    pub fn builder(name: PrincipalName) -> PrincipalBuilder {
        PrincipalBuilder {
            inner: Self {
                name,
                expiration: None,
                password_expiration: None,
                last_password_change: None,
                modified_by: None,
                modified_at: None,
                attributes: PrincipalFlags::empty(),
                policy: None,
                max_ticket_life: None,
                max_renewable_life: None,
                last_login: None,
                last_failed_login: None,
            },
        }
    }

    /// Writes the masked fields of `seed` into this record; unmasked fields keep their values.
    ///
    /// `name` replaces the identity only when the mask carries [`FieldMask::PRINCIPAL`].
    pub fn apply_seed(&mut self, name: &PrincipalName, seed: &PrincipalSeed, mask: FieldMask) {
        if mask.contains(FieldMask::PRINCIPAL) {
            self.name = name.clone();
        }
        if mask.contains(FieldMask::POLICY) {
            self.policy.clone_from(&seed.policy);
        }
        if mask.contains(FieldMask::POLICY_CLEAR) {
            self.policy = None;
        }
        if mask.contains(FieldMask::EXPIRATION) {
            self.expiration = seed.expiration;
        }
        if mask.contains(FieldMask::PASSWORD_EXPIRATION) {
            self.password_expiration = seed.password_expiration;
        }
        if mask.contains(FieldMask::LAST_PASSWORD_CHANGE) {
            self.last_password_change = seed.last_password_change;
        }
        if mask.contains(FieldMask::ATTRIBUTES) {
            self.attributes = seed.attributes;
        }
        if mask.contains(FieldMask::MAX_TICKET_LIFE) {
            self.max_ticket_life = seed.max_ticket_life;
        }
        if mask.contains(FieldMask::MAX_RENEWABLE_LIFE) {
            self.max_renewable_life = seed.max_renewable_life;
        }
    }

    /// Records who modified the principal and when.
    pub fn stamp(&mut self, actor: &PrincipalName, at: DateTime<Utc>) {
        self.modified_by = Some(actor.clone());
        self.modified_at = Some(at);
    }

    /// Returns true if the principal may obtain tickets.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.attributes.allows_tickets()
    }
}

/// Builder for [`Principal`].
#[derive(Debug)]
pub struct PrincipalBuilder {
    inner: Principal,
}

impl PrincipalBuilder {
    /// Sets the expiration.
    #[must_use]
    pub fn expiration(mut self, at: DateTime<Utc>) -> Self {
        self.inner.expiration = Some(at);
        self
    }

    /// Sets the password expiration.
    #[must_use]
    pub fn password_expiration(mut self, at: DateTime<Utc>) -> Self {
        self.inner.password_expiration = Some(at);
        self
    }

    /// Sets the last password change.
    #[must_use]
    pub fn last_password_change(mut self, at: DateTime<Utc>) -> Self {
        self.inner.last_password_change = Some(at);
        self
    }

    /// Sets the modifying principal.
    #[must_use]
    pub fn modified_by(mut self, by: PrincipalName) -> Self {
        self.inner.modified_by = Some(by);
        self
    }

    /// Sets the modification time.
    #[must_use]
    pub fn modified_at(mut self, at: DateTime<Utc>) -> Self {
        self.inner.modified_at = Some(at);
        self
    }

    /// Sets the attribute flags.
    #[must_use]
    pub fn attributes(mut self, attributes: PrincipalFlags) -> Self {
        self.inner.attributes = attributes;
        self
    }

    /// Sets the policy.
    #[must_use]
    pub fn policy(mut self, policy: impl Into<String>) -> Self {
        self.inner.policy = Some(policy.into());
        self
    }

    /// Sets the maximum ticket life.
    #[must_use]
    pub fn max_ticket_life(mut self, life: Duration) -> Self {
        self.inner.max_ticket_life = Some(life);
        self
    }

    /// Sets the maximum renewable life.
    #[must_use]
    pub fn max_renewable_life(mut self, life: Duration) -> Self {
        self.inner.max_renewable_life = Some(life);
        self
    }

    /// Finalises the builder.
    #[must_use]
    pub fn build(self) -> Principal {
        self.inner
    }
}

/// Caller-supplied input for create and modify.
///
/// Which fields are written is decided by the accompanying [`FieldMask`], not by which
/// fields are set here.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrincipalSeed {
    /// Principal name, optionally realm-qualified.
    pub name: String,
    /// Principal expiration.
    #[serde(default)]
    pub expiration: Option<DateTime<Utc>>,
    /// Password expiration.
    #[serde(default)]
    pub password_expiration: Option<DateTime<Utc>>,
    /// Last password change.
    #[serde(default)]
    pub last_password_change: Option<DateTime<Utc>>,
    /// Attribute flags.
    #[serde(default)]
    pub attributes: PrincipalFlags,
    /// Policy; `None` together with [`FieldMask::POLICY`] clears it.
    #[serde(default)]
    pub policy: Option<String>,
    /// Maximum ticket life.
    #[serde(default)]
    pub max_ticket_life: Option<Duration>,
    /// Maximum renewable life.
    #[serde(default)]
    pub max_renewable_life: Option<Duration>,
}

impl PrincipalSeed {
    /// Creates a seed for `name` with every other field at its default.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Sets the policy.
    #[must_use]
    pub fn with_policy(mut self, policy: impl Into<String>) -> Self {
        self.policy = Some(policy.into());
        self
    }

    /// Sets the attribute flags.
    #[must_use]
    pub fn with_attributes(mut self, attributes: PrincipalFlags) -> Self {
        self.attributes = attributes;
        self
    }

    /// Sets the principal expiration.
    #[must_use]
    pub fn with_expiration(mut self, at: DateTime<Utc>) -> Self {
        self.expiration = Some(at);
        self
    }

    /// Sets the password expiration.
    #[must_use]
    pub fn with_password_expiration(mut self, at: DateTime<Utc>) -> Self {
        self.password_expiration = Some(at);
        self
    }

    /// Sets both ticket lifetimes.
    #[must_use]
    pub fn with_ticket_lifetimes(mut self, max_life: Duration, max_renewable: Duration) -> Self {
        self.max_ticket_life = Some(max_life);
        self.max_renewable_life = Some(max_renewable);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(value: &str) -> PrincipalName {
        PrincipalName::new(value, "EXAMPLE.COM")
    }

    #[test]
    fn named_flags_follow_negation() {
        let flags = PrincipalFlags::empty();
        assert!(flags.flag(PrincipalFlag::AllowTix));
        assert!(flags.flag(PrincipalFlag::AllowForwardable));
        assert!(!flags.flag(PrincipalFlag::RequiresPreauth));

        let flags = flags
            .with_flag(PrincipalFlag::AllowTix, false)
            .with_flag(PrincipalFlag::RequiresPreauth, true);
        assert_eq!(
            flags,
            PrincipalFlags::DISALLOW_ALL_TIX | PrincipalFlags::REQUIRES_PREAUTH
        );
        assert!(!flags.allows_tickets());

        let flags = flags.with_flag(PrincipalFlag::AllowTix, true);
        assert_eq!(flags.bits(), 0x80);
    }

    #[test]
    fn flag_names_round_trip() {
        for flag in PrincipalFlag::ALL {
            assert_eq!(flag.name().parse::<PrincipalFlag>().unwrap(), flag);
        }
        assert!(matches!(
            "allowEverything".parse::<PrincipalFlag>(),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn unknown_bits_are_preserved() {
        let flags: PrincipalFlags = serde_json::from_str("65664").unwrap();
        assert_eq!(flags.bits(), 65_664);
        assert_eq!(serde_json::to_string(&flags).unwrap(), "65664");
    }

    #[test]
    fn apply_seed_writes_only_masked_fields() {
        let now = Utc::now();
        let mut record = Principal::builder(name("alice"))
            .policy("default")
            .expiration(now)
            .build();
        let seed = PrincipalSeed::new("alice")
            .with_attributes(PrincipalFlags::REQUIRES_PREAUTH)
            .with_policy("strict");

        record.apply_seed(&name("ignored"), &seed, FieldMask::ATTRIBUTES);

        assert_eq!(record.name, name("alice"));
        assert_eq!(record.attributes, PrincipalFlags::REQUIRES_PREAUTH);
        assert_eq!(record.policy.as_deref(), Some("default"));
        assert_eq!(record.expiration, Some(now));
    }

    #[test]
    fn apply_seed_policy_clear() {
        let mut record = Principal::builder(name("alice")).policy("default").build();
        record.apply_seed(
            &name("alice"),
            &PrincipalSeed::new("alice"),
            FieldMask::POLICY_CLEAR,
        );
        assert!(record.policy.is_none());
    }

    #[test]
    fn identity_equality() {
        let a = Principal::builder(name("alice")).policy("x").build();
        let b = Principal::builder(name("alice")).build();
        let c = Principal::builder(PrincipalName::new("alice", "OTHER.ORG")).build();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn stamp_sets_modifier() {
        let mut record = Principal::builder(name("alice")).build();
        let at = Utc::now();
        record.stamp(&name("admin"), at);
        assert_eq!(record.modified_by, Some(name("admin")));
        assert_eq!(record.modified_at, Some(at));
    }
}
