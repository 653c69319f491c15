#![allow(dead_code)]

use repokit_data::{Entity, MemoryDataSource};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, PartialEq, PartialOrd)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub age: u32,
    pub active: bool,
    pub deleted: bool,
    pub orders: Vec<String>,
}

impl Entity for User {
    type Key = i64;

    fn table_name() -> &'static str {
        "users"
    }

    fn key_columns() -> &'static [&'static str] {
        &["id"]
    }

    fn columns() -> &'static [&'static str] {
        &["id", "name", "age", "active", "deleted"]
    }

    fn key(&self) -> i64 {
        self.id
    }
}

pub fn user(id: i64) -> User {
    User {
        id,
        name: format!("user-{id:02}"),
        age: 20 + (id % 7) as u32,
        active: id % 2 == 0,
        deleted: false,
        orders: Vec::new(),
    }
}

pub fn users(n: i64) -> Vec<User> {
    (1..=n).map(user).collect()
}

pub fn source(n: i64) -> MemoryDataSource<User> {
    MemoryDataSource::from_rows(users(n))
}

pub fn ids(items: &[User]) -> Vec<i64> {
    items.iter().map(|u| u.id).collect()
}

/// Route `tracing` output through the test harness. Respects `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("repokit_data=debug")),
        )
        .with_test_writer()
        .try_init();
}
