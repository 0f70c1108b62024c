//! # Request-Shape Identifiers
//!
//! Stable runtime keys for concrete message types. The registry is keyed by
//! [`TypeKey`]; open behaviors inspect a [`CommandShape`] to learn which
//! response type a command resolves to.

use std::any::{type_name, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::message::Command;

/// Identifies one concrete Rust type at runtime.
///
/// Equality and hashing use the [`TypeId`] only. The type name is carried
/// for diagnostics and is not guaranteed to be unique or stable across
/// compiler versions.
#[derive(Clone, Copy)]
pub struct TypeKey {
    id: TypeId,
    name: &'static str,
}

impl TypeKey {
    /// Key for `T`.
    #[must_use]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: type_name::<T>(),
        }
    }

    /// The underlying [`TypeId`].
    #[must_use]
    pub fn type_id(&self) -> TypeId {
        self.id
    }

    /// Fully-qualified type name, for logs and errors.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Type name without its module path (`my_app::orders::Place` -> `Place`).
    ///
    /// Generic arguments are left untouched.
    #[must_use]
    pub fn short_name(&self) -> &'static str {
        let base = self.name.split('<').next().unwrap_or(self.name);
        match base.rfind("::") {
            Some(idx) => &self.name[idx + 2..],
            None => self.name,
        }
    }

    /// Whether this key identifies `T`.
    #[must_use]
    pub fn is<T: ?Sized + 'static>(&self) -> bool {
        self.id == TypeId::of::<T>()
    }
}

impl PartialEq for TypeKey {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeKey {}

impl Hash for TypeKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeKey({})", self.name)
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// The runtime shape of a command: its own key plus its response key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CommandShape {
    /// Key of the command type.
    pub command: TypeKey,
    /// Key of `C::Response`.
    pub response: TypeKey,
}

impl CommandShape {
    /// Shape of command `C`.
    #[must_use]
    pub fn of<C: Command>() -> Self {
        Self {
            command: TypeKey::of::<C>(),
            response: TypeKey::of::<C::Response>(),
        }
    }
}

impl fmt::Display for CommandShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.command, self.response)
    }
}
