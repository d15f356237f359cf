//! Deterministic rows for every collection. Row `i` of a collection is the
//! same on every run, so pages and search results can be compared between
//! seeds.
use protocol::{Course, Newsletter, Partner, Post, Product, User};

use crate::utils::{created_at, pick, slugify};

const FIRST_NAMES: &[&str] = &[
    "Ada", "Alan", "Grace", "Edsger", "Barbara", "Donald", "Frances", "Ken", "Radia", "Linus",
    "Margaret", "Dennis",
];
const LAST_NAMES: &[&str] = &[
    "Lovelace", "Turing", "Hopper", "Dijkstra", "Liskov", "Knuth", "Allen", "Thompson", "Perlman",
    "Torvalds", "Hamilton", "Ritchie", "Wirth",
];
const TOPICS: &[&str] = &[
    "Rust", "Databases", "Networking", "Compilers", "Typography", "Photography", "Statistics",
    "Pottery", "Accounting", "Spanish", "Guitar",
];
const FORMATS: &[&str] = &["Foundations", "Workshop", "Masterclass", "Bootcamp", "in Practice"];
const CATEGORIES: &[&str] = &["Programming", "Design", "Business", "Languages", "Music"];
const LEVELS: &[&str] = &["beginner", "intermediate", "advanced"];
const CAMPAIGN_STATUSES: &[&str] = &["sent", "sent", "scheduled", "draft"];
const POST_STATUSES: &[&str] = &["approved", "approved", "pending", "hidden"];
const POST_OPENERS: &[&str] = &[
    "Question about",
    "Notes from",
    "Stuck on",
    "Loving",
    "Study group for",
];
const PRODUCT_KINDS: &[&str] = &["course", "bundle", "event", "membership"];
const TIERS: &[&str] = &["gold", "silver", "silver", "bronze", "bronze"];
const PARTNERS: &[&str] = &[
    "Northwind", "Contoso", "Initech", "Globex", "Umbrella Labs", "Hooli", "Vandelay", "Stark Tutoring",
    "Wayne Learning",
];

pub const ADMIN_ID: i64 = 1;

fn full_name(index: usize) -> String {
    let first = pick(FIRST_NAMES, index);
    let last = pick(LAST_NAMES, index / FIRST_NAMES.len() + index);

    format!("{first} {last}")
}

fn row_id(index: usize) -> i64 {
    index as i64 + 1
}

/// The first user is always an active admin.
pub fn users(count: usize) -> Vec<User> {
    (0..count)
        .map(|index| {
            let name = full_name(index);
            let role = match index {
                0 => "admin",
                _ if index % 6 == 0 => "instructor",
                _ => "student",
            };

            User {
                id: row_id(index),
                email: format!("{}.{}@campus.test", slugify(&name), row_id(index)),
                name,
                role: role.to_string(),
                active: index == 0 || index % 7 != 0,
                created_at: created_at(index),
            }
        })
        .collect()
}

pub fn courses(count: usize) -> Vec<Course> {
    (0..count)
        .map(|index| {
            let topic = pick(TOPICS, index);
            let title = format!("{topic} {}", pick(FORMATS, index / TOPICS.len() + index));

            Course {
                id: row_id(index),
                slug: format!("{}-{}", slugify(&title), row_id(index)),
                title,
                category: pick(CATEGORIES, index).to_string(),
                level: pick(LEVELS, index / 2).to_string(),
                published: index % 5 != 4,
                price_cents: 1_900 + (index as i64 * 700) % 18_000,
                created_at: created_at(index),
            }
        })
        .collect()
}

pub fn newsletters(count: usize) -> Vec<Newsletter> {
    (0..count)
        .map(|index| Newsletter {
            id: row_id(index),
            subject: format!("{} digest #{}", pick(TOPICS, index), row_id(index)),
            status: pick(CAMPAIGN_STATUSES, index).to_string(),
            recipients: 120 + (index as i64 * 53) % 900,
            created_at: created_at(index),
        })
        .collect()
}

pub fn posts(count: usize) -> Vec<Post> {
    (0..count)
        .map(|index| Post {
            id: row_id(index),
            title: format!("{} {}", pick(POST_OPENERS, index), pick(TOPICS, index * 3)),
            author: full_name(index * 5),
            status: pick(POST_STATUSES, index).to_string(),
            reports: (index as i64 * 7) % 5,
            created_at: created_at(index),
        })
        .collect()
}

pub fn products(count: usize) -> Vec<Product> {
    (0..count)
        .map(|index| {
            let kind = pick(PRODUCT_KINDS, index);

            Product {
                id: row_id(index),
                name: format!("{} {kind}", pick(TOPICS, index + 2)),
                kind: kind.to_string(),
                price_cents: 2_500 + (index as i64 * 1_300) % 30_000,
                discount_percent: (index as i64 * 5) % 40,
                active: index % 6 != 5,
                created_at: created_at(index),
            }
        })
        .collect()
}

pub fn partners(count: usize) -> Vec<Partner> {
    (0..count)
        .map(|index| {
            let name = pick(PARTNERS, index);

            Partner {
                id: row_id(index),
                website: format!("https://{}.example", slugify(name)),
                name: format!("{name} {}", row_id(index)),
                tier: pick(TIERS, index).to_string(),
                active: index % 4 != 3,
                created_at: created_at(index),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use protocol::{Collection, ColumnKind};

    use super::*;

    fn allowed(collection: Collection, column: &str, value: &str) -> bool {
        match collection.column(column).map(|column| column.kind) {
            Some(ColumnKind::Enum(values)) => values.iter().any(|allowed| *allowed == value),
            _ => false,
        }
    }

    #[test]
    fn test_first_user_is_active_admin() {
        let users = users(30);

        assert_eq!(users[0].id, ADMIN_ID);
        assert_eq!(users[0].role, "admin");
        assert!(users[0].active);
        assert!(users[1..].iter().all(|user| user.role != "admin"));
    }

    #[test]
    fn test_unique_keys() {
        let users = users(200);
        let emails = users.iter().map(|user| &user.email).collect::<HashSet<_>>();
        assert_eq!(emails.len(), users.len());

        let courses = courses(200);
        let slugs = courses.iter().map(|course| &course.slug).collect::<HashSet<_>>();
        assert_eq!(slugs.len(), courses.len());
    }

    #[test]
    fn test_enumerated_values_match_catalog() {
        assert!(users(50).iter().all(|user| allowed(Collection::Users, "role", &user.role)));
        assert!(courses(50).iter().all(|course| allowed(Collection::Courses, "level", &course.level)));
        assert!(
            newsletters(50)
                .iter()
                .all(|newsletter| allowed(Collection::Newsletters, "status", &newsletter.status))
        );
        assert!(posts(50).iter().all(|post| allowed(Collection::Posts, "status", &post.status)));
        assert!(products(50).iter().all(|product| allowed(Collection::Products, "kind", &product.kind)));
        assert!(partners(50).iter().all(|partner| allowed(Collection::Partners, "tier", &partner.tier)));
    }

    #[test]
    fn test_deterministic() {
        assert_eq!(courses(25), courses(25));
        assert_eq!(posts(25), posts(25));
    }
}
