//! Type context: the mapping between user type identifiers and the types
//! of the embedding system.

use std::collections::{BTreeMap, HashMap};

use crate::error::{PofError, Result};

/// Descriptor of a registered user type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserTypeInfo {
    pub type_id: i32,
    pub name: String,
}

/// Resolves user type identifiers.
///
/// The engine consults the context when it meets a non-negative type
/// identifier; intrinsic types never reach it.
pub trait PofContext {
    /// Native type registered for `type_id`.
    fn type_for_id(&self, type_id: i32) -> Result<&UserTypeInfo>;

    /// Identifier registered for the native type `name`.
    fn id_for_type(&self, name: &str) -> Result<i32>;

    /// Whether `name` is a registered user type.
    fn is_user_type(&self, name: &str) -> bool {
        self.id_for_type(name).is_ok()
    }
}

/// In-memory [`PofContext`].
///
/// # Example
///
/// ```
/// use pof::{PofContext, SimplePofContext};
///
/// let mut ctx = SimplePofContext::new();
/// ctx.register(1001, "Person").unwrap();
/// assert_eq!(ctx.id_for_type("Person").unwrap(), 1001);
/// assert_eq!(ctx.type_for_id(1001).unwrap().name, "Person");
/// ```
#[derive(Debug, Clone, Default)]
pub struct SimplePofContext {
    by_id: BTreeMap<i32, UserTypeInfo>,
    by_name: HashMap<String, i32>,
}

impl SimplePofContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `name` under `type_id`. Re-registering the same pair is a
    /// no-op; reusing either half with a different partner is rejected.
    pub fn register(&mut self, type_id: i32, name: impl Into<String>) -> Result<()> {
        let name = name.into();
        if type_id < 0 {
            return Err(PofError::Config(format!(
                "user type id must be non-negative, got {type_id}"
            )));
        }
        match (self.by_id.get(&type_id), self.by_name.get(&name)) {
            (None, None) => {}
            (Some(info), Some(&id)) if info.name == name && id == type_id => return Ok(()),
            _ => {
                return Err(PofError::Config(format!(
                    "conflicting registration of user type {type_id} ({name})"
                )))
            }
        }
        self.by_name.insert(name.clone(), type_id);
        self.by_id.insert(type_id, UserTypeInfo { type_id, name });
        Ok(())
    }

    /// Builder-style [`register`](Self::register).
    pub fn with_type(mut self, type_id: i32, name: impl Into<String>) -> Result<Self> {
        self.register(type_id, name)?;
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

impl PofContext for SimplePofContext {
    fn type_for_id(&self, type_id: i32) -> Result<&UserTypeInfo> {
        self.by_id
            .get(&type_id)
            .ok_or(PofError::UnknownUserType(type_id))
    }

    fn id_for_type(&self, name: &str) -> Result<i32> {
        self.by_name
            .get(name)
            .copied()
            .ok_or_else(|| PofError::UnknownTypeName(name.to_owned()))
    }
}
