//! Standard response envelopes.

use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Serialize)]
pub struct SuccessOne<T> {
    pub data: T,
}

#[derive(Debug, Serialize)]
pub struct SuccessMany<T> {
    pub data: Vec<T>,
    pub meta: MetaCount,
}

#[derive(Debug, Serialize)]
pub struct MetaCount {
    pub count: u64,
}

#[derive(Debug, Serialize)]
pub struct Paginated<T> {
    pub data: Vec<T>,
    pub meta: PageMeta,
}

/// `from`/`to` are 1-based positions of the first and last row on the page; null on an empty page.
#[derive(Debug, PartialEq, Serialize)]
pub struct PageMeta {
    pub current_page: u64,
    pub per_page: u64,
    pub total: u64,
    pub last_page: u64,
    pub from: Option<u64>,
    pub to: Option<u64>,
}

impl PageMeta {
    pub fn new(page: u64, per_page: u64, total: u64, len: usize) -> Self {
        let offset = (page - 1).saturating_mul(per_page);
        let (from, to) = if len == 0 {
            (None, None)
        } else {
            (Some(offset + 1), Some(offset + len as u64))
        };
        PageMeta {
            current_page: page,
            per_page,
            total,
            last_page: total.div_ceil(per_page).max(1),
            from,
            to,
        }
    }
}

/// `list`/`search` answer: a page, or the whole filtered set for `limit=max`.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum Listing<T> {
    Page(Paginated<T>),
    All(SuccessMany<T>),
}

#[derive(Debug, Serialize)]
pub struct CountBody {
    pub count: u64,
}

#[derive(Debug, Serialize)]
pub struct Deleted<T> {
    pub status: &'static str,
    pub message: &'static str,
    pub data: T,
}

impl<T> Deleted<T> {
    pub fn new(data: T) -> Self {
        Deleted {
            status: "success",
            message: "Resource deleted",
            data,
        }
    }
}

/// One `GET /{resource}/options` entry.
#[derive(Debug, PartialEq, Serialize)]
pub struct SelectOption {
    pub value: Value,
    pub label: Value,
}
