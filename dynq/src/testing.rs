//! Shared test fixtures

use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};

use crate::query::{FieldAccessible, FieldRegistry, FieldType};

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Person {
    pub id: i64,
    pub name: String,
    pub age: i64,
    pub score: Option<f64>,
    pub active: bool,
    pub joined: NaiveDate,
    pub created_at: DateTime<Utc>,
    pub email: Option<String>,
}

impl FieldAccessible for Person {
    fn fields() -> &'static FieldRegistry<Self> {
        static FIELDS: LazyLock<FieldRegistry<Person>> = LazyLock::new(|| {
            FieldRegistry::builder()
                .field("id", FieldType::Int, |p: &Person| p.id.into())
                .field("name", FieldType::Text, |p: &Person| p.name.as_str().into())
                .field("age", FieldType::Int, |p: &Person| p.age.into())
                .field("score", FieldType::Float, |p: &Person| p.score.into())
                .field("active", FieldType::Bool, |p: &Person| p.active.into())
                .field("joined", FieldType::Date, |p: &Person| p.joined.into())
                .field("createdAt", FieldType::DateTime, |p: &Person| {
                    p.created_at.into()
                })
                .field("email", FieldType::Text, |p: &Person| p.email.clone().into())
                .build()
        });
        &FIELDS
    }
}

fn person(
    id: i64,
    name: &str,
    age: i64,
    score: Option<f64>,
    active: bool,
    joined: (i32, u32, u32),
    email: Option<&str>,
) -> Person {
    let (y, m, d) = joined;
    Person {
        id,
        name: name.to_string(),
        age,
        score,
        active,
        joined: NaiveDate::from_ymd_opt(y, m, d).unwrap(),
        created_at: Utc
            .with_ymd_and_hms(2024, 1, id as u32, 10, 0, 0)
            .unwrap(),
        email: email.map(str::to_string),
    }
}

/// Eight people with mixed case names, shared ages and scores, and null fields
pub fn people() -> Vec<Person> {
    vec![
        person(1, "Ann", 34, Some(88.5), true, (2020, 1, 15), Some("ann@example.com")),
        person(2, "bob", 17, None, false, (2021, 6, 1), None),
        person(3, "Cara", 25, Some(92.0), true, (2019, 11, 30), Some("cara@example.org")),
        person(4, "Dan", 41, Some(70.25), false, (2022, 2, 2), Some("dan@example.com")),
        person(5, "Eve", 18, Some(88.5), true, (2023, 3, 3), None),
        person(6, "anna", 25, None, true, (2020, 7, 7), Some("anna@example.com")),
        person(7, "Finn", 10, Some(55.0), false, (2024, 1, 1), Some("finn@example.net")),
        person(8, "Gus", 20, Some(61.0), true, (2018, 5, 5), None),
    ]
}

/// `n` people with `id == age`, numbered from 1
pub fn numbered(n: i64) -> Vec<Person> {
    (1..=n)
        .map(|i| Person {
            id: i,
            name: format!("p{i}"),
            age: i,
            score: Some(i as f64),
            active: i % 2 == 0,
            joined: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            email: None,
        })
        .collect()
}
