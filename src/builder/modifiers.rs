use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::error::ModifierError;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct Modifiers: u16 {
        const PUBLIC = 1 << 0;
        const PROTECTED = 1 << 1;
        const PRIVATE = 1 << 2;
        const STATIC = 1 << 3;
        /// Written `abstract` keyword.
        const ABSTRACT = 1 << 4;
        /// Abstract without the keyword: interfaces and their methods.
        const IMPLICIT_ABSTRACT = 1 << 5;
        const FINAL = 1 << 6;
        const READONLY = 1 << 7;

        const VISIBILITY = Self::PUBLIC.bits() | Self::PROTECTED.bits() | Self::PRIVATE.bits();
    }
}

impl Modifiers {
    pub fn from_keyword(keyword: &str) -> Option<Modifiers> {
        match keyword.to_ascii_lowercase().as_str() {
            "public" | "var" => Some(Modifiers::PUBLIC),
            "protected" => Some(Modifiers::PROTECTED),
            "private" => Some(Modifiers::PRIVATE),
            "static" => Some(Modifiers::STATIC),
            "abstract" => Some(Modifiers::ABSTRACT),
            "final" => Some(Modifiers::FINAL),
            "readonly" => Some(Modifiers::READONLY),
            _ => None,
        }
    }

    pub fn visibility(&self) -> Modifiers {
        *self & Modifiers::VISIBILITY
    }

    /// Replaces the visibility bits, keeping everything else.
    pub fn with_visibility(&self, visibility: Modifiers) -> Modifiers {
        (*self - Modifiers::VISIBILITY) | visibility.visibility()
    }

    pub fn is_abstract(&self) -> bool {
        self.intersects(Modifiers::ABSTRACT | Modifiers::IMPLICIT_ABSTRACT)
    }

    /// Public unless another visibility is set.
    pub fn effective_visibility(&self) -> Modifiers {
        match self.visibility() {
            v if v.is_empty() => Modifiers::PUBLIC,
            v => v,
        }
    }
}

/// Declaration kind a modifier set is validated for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModifierTarget {
    Class,
    Interface,
    Trait,
    Function,
    Method,
    Field,
    Constant,
}

impl ModifierTarget {
    fn name(&self) -> &'static str {
        match self {
            ModifierTarget::Class => "class",
            ModifierTarget::Interface => "interface",
            ModifierTarget::Trait => "trait",
            ModifierTarget::Function => "function",
            ModifierTarget::Method => "method",
            ModifierTarget::Field => "field",
            ModifierTarget::Constant => "constant",
        }
    }

    fn allowed(&self) -> (Modifiers, &'static str) {
        match self {
            ModifierTarget::Class => (
                Modifiers::ABSTRACT | Modifiers::FINAL | Modifiers::READONLY,
                "IS_EXPLICIT_ABSTRACT, IS_FINAL and IS_READONLY",
            ),
            ModifierTarget::Interface => (Modifiers::IMPLICIT_ABSTRACT, "IS_IMPLICIT_ABSTRACT"),
            ModifierTarget::Trait | ModifierTarget::Function => (Modifiers::empty(), "none"),
            ModifierTarget::Method => (
                Modifiers::VISIBILITY
                    | Modifiers::STATIC
                    | Modifiers::ABSTRACT
                    | Modifiers::IMPLICIT_ABSTRACT
                    | Modifiers::FINAL,
                "IS_PUBLIC, IS_PROTECTED, IS_PRIVATE, IS_STATIC, IS_ABSTRACT and IS_FINAL",
            ),
            ModifierTarget::Field => (
                Modifiers::VISIBILITY | Modifiers::STATIC | Modifiers::READONLY,
                "IS_PUBLIC, IS_PROTECTED, IS_PRIVATE, IS_STATIC and IS_READONLY",
            ),
            ModifierTarget::Constant => (
                Modifiers::VISIBILITY | Modifiers::FINAL,
                "IS_PUBLIC, IS_PROTECTED, IS_PRIVATE and IS_FINAL",
            ),
        }
    }

    /// Checks `modifiers` for this kind of declaration.
    pub fn validate(&self, modifiers: Modifiers) -> Result<Modifiers, ModifierError> {
        let (allowed, listing) = self.allowed();
        let invalid = |detail: &str| {
            let kind = self.name();
            ModifierError::new(
                kind,
                format!("Invalid {kind} modifiers given{detail}, allowed modifiers are {listing}."),
            )
        };

        if !allowed.contains(modifiers) {
            return Err(invalid(""));
        }
        if modifiers.visibility().bits().count_ones() > 1 {
            return Err(invalid(" (more than one visibility)"));
        }
        if modifiers.contains(Modifiers::ABSTRACT | Modifiers::FINAL) {
            return Err(invalid(" (abstract and final)"));
        }
        if *self == ModifierTarget::Method && modifiers.contains(Modifiers::ABSTRACT | Modifiers::PRIVATE) {
            return Err(invalid(" (abstract and private)"));
        }
        Ok(modifiers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_rejects_abstract() {
        let err = ModifierTarget::Field.validate(Modifiers::ABSTRACT | Modifiers::PUBLIC).unwrap_err();
        assert_eq!(
            err.message,
            "Invalid field modifiers given, allowed modifiers are IS_PUBLIC, IS_PROTECTED, IS_PRIVATE, IS_STATIC and IS_READONLY."
        );
    }

    #[test]
    fn field_accepts_private_static() {
        let modifiers = ModifierTarget::Field.validate(Modifiers::PRIVATE | Modifiers::STATIC).unwrap();
        assert!(modifiers.contains(Modifiers::PRIVATE));
        assert!(modifiers.contains(Modifiers::STATIC));
    }

    #[test]
    fn rejects_two_visibilities() {
        assert!(ModifierTarget::Method.validate(Modifiers::PUBLIC | Modifiers::PROTECTED).is_err());
        assert!(ModifierTarget::Class.validate(Modifiers::ABSTRACT | Modifiers::FINAL).is_err());
    }

    #[test]
    fn with_visibility_keeps_other_bits() {
        let origin = Modifiers::PUBLIC | Modifiers::STATIC | Modifiers::ABSTRACT;
        assert_eq!(
            origin.with_visibility(Modifiers::PROTECTED),
            Modifiers::PROTECTED | Modifiers::STATIC | Modifiers::ABSTRACT
        );
    }
}
