//! # Collections
//!
//! Every list view in the dashboard is backed by one of a closed set of
//! collections. Each collection carries a static column catalog describing
//! which columns can be sorted, filtered and searched, along with the SQL
//! field each wire column maps to.
//!
//! ## Column ids
//! - Wire ids are camelCase (`createdAt`), SQL fields snake_case (`created_at`)
//! - `id` is the primary key of every collection and doubles as the tiebreak
//!   for stable ordering
//!
//! ## Access
//! - Public: catalogue pages (courses, products)
//! - Authenticated: any signed-in user (partners)
//! - Admin: dashboard-only lists (users, newsletters, community posts)
use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const PRIMARY_KEY: &str = "id";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Collection {
    Users,
    Courses,
    Newsletters,
    Posts,
    Products,
    Partners,
}

/// Minimum role needed to list a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Access {
    Public,
    Authenticated,
    Admin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Integer,
    Text,
    Bool,
    Enum(&'static [&'static str]),
    Timestamp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnDef {
    pub id: &'static str,
    pub field: &'static str,
    pub kind: ColumnKind,
    pub sortable: bool,
    pub filterable: bool,
    pub searchable: bool,
}

impl ColumnDef {
    const fn new(id: &'static str, field: &'static str, kind: ColumnKind) -> Self {
        Self {
            id,
            field,
            kind,
            sortable: false,
            filterable: false,
            searchable: false,
        }
    }

    const fn sortable(self) -> Self {
        Self {
            sortable: true,
            ..self
        }
    }

    const fn filterable(self) -> Self {
        Self {
            filterable: true,
            ..self
        }
    }

    const fn searchable(self) -> Self {
        Self {
            searchable: true,
            ..self
        }
    }
}

const ROLES: &[&str] = &["admin", "instructor", "student"];
const LEVELS: &[&str] = &["beginner", "intermediate", "advanced"];
const CAMPAIGN_STATUSES: &[&str] = &["draft", "scheduled", "sent"];
const POST_STATUSES: &[&str] = &["pending", "approved", "hidden"];
const PRODUCT_KINDS: &[&str] = &["course", "bundle", "event", "membership"];
const TIERS: &[&str] = &["gold", "silver", "bronze"];

use ColumnKind::{Bool, Enum, Integer, Text, Timestamp};

const ID: ColumnDef = ColumnDef::new("id", "id", Integer).sortable().filterable();
const CREATED_AT: ColumnDef = ColumnDef::new("createdAt", "created_at", Timestamp).sortable();

const USERS: &[ColumnDef] = &[
    ID,
    ColumnDef::new("name", "name", Text).sortable().searchable(),
    ColumnDef::new("email", "email", Text)
        .sortable()
        .filterable()
        .searchable(),
    ColumnDef::new("role", "role", Enum(ROLES)).sortable().filterable(),
    ColumnDef::new("active", "active", Bool).filterable(),
    CREATED_AT,
];

const COURSES: &[ColumnDef] = &[
    ID,
    ColumnDef::new("title", "title", Text).sortable().searchable(),
    ColumnDef::new("slug", "slug", Text).filterable().searchable(),
    ColumnDef::new("category", "category", Text)
        .sortable()
        .filterable()
        .searchable(),
    ColumnDef::new("level", "level", Enum(LEVELS))
        .sortable()
        .filterable(),
    ColumnDef::new("published", "published", Bool).filterable(),
    ColumnDef::new("priceCents", "price_cents", Integer)
        .sortable()
        .filterable(),
    CREATED_AT,
];

const NEWSLETTERS: &[ColumnDef] = &[
    ID,
    ColumnDef::new("subject", "subject", Text)
        .sortable()
        .searchable(),
    ColumnDef::new("status", "status", Enum(CAMPAIGN_STATUSES))
        .sortable()
        .filterable(),
    ColumnDef::new("recipients", "recipients", Integer).sortable(),
    CREATED_AT,
];

const POSTS: &[ColumnDef] = &[
    ID,
    ColumnDef::new("title", "title", Text).sortable().searchable(),
    ColumnDef::new("author", "author", Text)
        .sortable()
        .filterable()
        .searchable(),
    ColumnDef::new("status", "status", Enum(POST_STATUSES))
        .sortable()
        .filterable(),
    ColumnDef::new("reports", "reports", Integer)
        .sortable()
        .filterable(),
    CREATED_AT,
];

const PRODUCTS: &[ColumnDef] = &[
    ID,
    ColumnDef::new("name", "name", Text).sortable().searchable(),
    ColumnDef::new("kind", "kind", Enum(PRODUCT_KINDS))
        .sortable()
        .filterable(),
    ColumnDef::new("priceCents", "price_cents", Integer)
        .sortable()
        .filterable(),
    ColumnDef::new("discountPercent", "discount_percent", Integer)
        .sortable()
        .filterable(),
    ColumnDef::new("active", "active", Bool).filterable(),
    CREATED_AT,
];

const PARTNERS: &[ColumnDef] = &[
    ID,
    ColumnDef::new("name", "name", Text).sortable().searchable(),
    ColumnDef::new("website", "website", Text).searchable(),
    ColumnDef::new("tier", "tier", Enum(TIERS)).sortable().filterable(),
    ColumnDef::new("active", "active", Bool).filterable(),
    CREATED_AT,
];

impl Collection {
    pub const ALL: [Self; 6] = [
        Self::Users,
        Self::Courses,
        Self::Newsletters,
        Self::Posts,
        Self::Products,
        Self::Partners,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            Self::Users => "users",
            Self::Courses => "courses",
            Self::Newsletters => "newsletters",
            Self::Posts => "posts",
            Self::Products => "products",
            Self::Partners => "partners",
        }
    }

    /// SQL table backing the collection.
    pub const fn table(self) -> &'static str {
        match self {
            Self::Posts => "community_posts",
            other => other.name(),
        }
    }

    pub const fn access(self) -> Access {
        match self {
            Self::Courses | Self::Products => Access::Public,
            Self::Partners => Access::Authenticated,
            Self::Users | Self::Newsletters | Self::Posts => Access::Admin,
        }
    }

    pub const fn columns(self) -> &'static [ColumnDef] {
        match self {
            Self::Users => USERS,
            Self::Courses => COURSES,
            Self::Newsletters => NEWSLETTERS,
            Self::Posts => POSTS,
            Self::Products => PRODUCTS,
            Self::Partners => PARTNERS,
        }
    }

    pub fn column(self, id: &str) -> Option<&'static ColumnDef> {
        self.columns().iter().find(|column| column.id == id)
    }

    pub fn searchable(self) -> impl Iterator<Item = &'static ColumnDef> {
        self.columns().iter().filter(|column| column.searchable)
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown collection `{0}`")]
pub struct UnknownCollection(pub String);

impl FromStr for Collection {
    type Err = UnknownCollection;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|collection| collection.name() == s)
            .ok_or_else(|| UnknownCollection(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collection_names_round_trip() {
        for collection in Collection::ALL {
            assert_eq!(collection.name().parse::<Collection>(), Ok(collection));
        }
        assert_eq!(
            "lessons".parse::<Collection>().unwrap_err().to_string(),
            "unknown collection `lessons`"
        );
    }

    #[test]
    fn test_primary_key_is_sortable() {
        for collection in Collection::ALL {
            let id = collection.column(PRIMARY_KEY).expect("primary key");
            assert!(id.sortable, "{collection} id not sortable");
        }
    }

    #[test]
    fn test_every_catalog_is_searchable() {
        for collection in Collection::ALL {
            assert!(collection.searchable().count() > 0, "{collection}");
        }
    }

    #[test]
    fn test_timestamps_are_not_filterable() {
        for collection in Collection::ALL {
            for column in collection.columns() {
                if column.kind == ColumnKind::Timestamp {
                    assert!(!column.filterable, "{collection}.{}", column.id);
                }
            }
        }
    }
}
