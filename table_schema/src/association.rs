//! Associations between tables

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssociationKind {
    BelongsTo,
    HasOne,
    HasMany,
    HasAndBelongsToMany,
}

/// Has-one and has-many, the kinds that own child rows
pub const OWNING_KINDS: &[AssociationKind] = &[AssociationKind::HasOne, AssociationKind::HasMany];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Association {
    pub kind: AssociationKind,
    /// Underscore name of the target table
    pub target: String,
    /// Column carrying the reference; `parent_id` for polymorphic links
    pub foreign_key: String,
    #[serde(default)]
    pub polymorphic: bool,
    /// Join table of a has-and-belongs-to-many link
    #[serde(default)]
    pub through: Option<String>,
}

impl Association {
    fn new(kind: AssociationKind, target: &str, foreign_key: &str) -> Self {
        Self {
            kind,
            target: target.to_string(),
            foreign_key: foreign_key.to_string(),
            polymorphic: false,
            through: None,
        }
    }

    pub fn belongs_to(target: &str, foreign_key: &str) -> Self {
        Self::new(AssociationKind::BelongsTo, target, foreign_key)
    }

    pub fn has_one(target: &str, foreign_key: &str) -> Self {
        Self::new(AssociationKind::HasOne, target, foreign_key)
    }

    pub fn has_many(target: &str, foreign_key: &str) -> Self {
        Self::new(AssociationKind::HasMany, target, foreign_key)
    }

    /// Children reference the owner through `parent_type`/`parent_id`
    pub fn has_many_polymorphic(target: &str) -> Self {
        let mut association = Self::new(AssociationKind::HasMany, target, "parent_id");
        association.polymorphic = true;
        association
    }

    pub fn has_one_polymorphic(target: &str) -> Self {
        let mut association = Self::new(AssociationKind::HasOne, target, "parent_id");
        association.polymorphic = true;
        association
    }

    pub fn has_and_belongs_to_many(target: &str, through: &str, foreign_key: &str) -> Self {
        let mut association = Self::new(AssociationKind::HasAndBelongsToMany, target, foreign_key);
        association.through = Some(through.to_string());
        association
    }

    pub fn is_owning(&self) -> bool {
        OWNING_KINDS.contains(&self.kind)
    }
}
