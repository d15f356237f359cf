//! Row shapes for each collection, as served in `data`.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::collection::Collection;

/// A row type that belongs to exactly one collection.
pub trait Record {
    const COLLECTION: Collection;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub role: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub category: String,
    pub level: String,
    pub published: bool,
    pub price_cents: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Newsletter {
    pub id: i64,
    pub subject: String,
    pub status: String,
    pub recipients: i64,
    pub created_at: DateTime<Utc>,
}

/// Community post awaiting or past moderation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: i64,
    pub title: String,
    pub author: String,
    pub status: String,
    pub reports: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub kind: String,
    pub price_cents: i64,
    pub discount_percent: i64,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Partner {
    pub id: i64,
    pub name: String,
    pub website: String,
    pub tier: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl Record for User {
    const COLLECTION: Collection = Collection::Users;
}

impl Record for Course {
    const COLLECTION: Collection = Collection::Courses;
}

impl Record for Newsletter {
    const COLLECTION: Collection = Collection::Newsletters;
}

impl Record for Post {
    const COLLECTION: Collection = Collection::Posts;
}

impl Record for Product {
    const COLLECTION: Collection = Collection::Products;
}

impl Record for Partner {
    const COLLECTION: Collection = Collection::Partners;
}
