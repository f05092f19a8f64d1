//! Field masks for partial principal updates.

use bitflags::bitflags;

use crate::error::{Error, Result};

bitflags! {
    /// Set of principal fields an update operation may write.
    ///
    /// Fields absent from the mask are left untouched in the target record. Bit values follow
    /// the kadm5 mask layout.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct FieldMask: u32 {
        /// Principal identity (name); mandatory on create, forbidden on modify
        const PRINCIPAL = 0x0001;
        /// Principal expiration
        const EXPIRATION = 0x0002;
        /// Password expiration
        const PASSWORD_EXPIRATION = 0x0004;
        /// Last password change
        const LAST_PASSWORD_CHANGE = 0x0008;
        /// Attribute flags
        const ATTRIBUTES = 0x0010;
        /// Maximum ticket life
        const MAX_TICKET_LIFE = 0x0020;
        /// Set policy
        const POLICY = 0x0800;
        /// Clear policy
        const POLICY_CLEAR = 0x1000;
        /// Maximum renewable ticket life
        const MAX_RENEWABLE_LIFE = 0x2000;
    }
}

impl FieldMask {
    /// Checks the contract shared by every update: `POLICY` and `POLICY_CLEAR` are exclusive.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] when both policy bits are requested.
    pub fn check_policy(self) -> Result<Self> {
        if self.contains(Self::POLICY | Self::POLICY_CLEAR) {
            return Err(Error::InvalidInput(
                "policy and policy-clear cannot be requested together".to_string(),
            ));
        }
        Ok(self)
    }

    /// Prepares a mask for create: policy bits checked, `PRINCIPAL` implied.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] when both policy bits are requested.
    pub fn for_create(self) -> Result<Self> {
        Ok(self.check_policy()? | Self::PRINCIPAL)
    }

    /// Prepares a mask for modify: policy bits checked, `PRINCIPAL` rejected.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the mask names the principal identity or both policy
    /// bits.
    pub fn for_modify(self) -> Result<Self> {
        if self.contains(Self::PRINCIPAL) {
            return Err(Error::InvalidInput(
                "principal names cannot be changed through modify".to_string(),
            ));
        }
        self.check_policy()
    }

    /// Turns a `POLICY` request without a policy value into `POLICY_CLEAR`.
    #[must_use]
    pub fn resolve_policy(mut self, has_policy: bool) -> Self {
        if self.contains(Self::POLICY) && !has_policy {
            self.remove(Self::POLICY);
            self.insert(Self::POLICY_CLEAR);
        }
        self
    }
}
