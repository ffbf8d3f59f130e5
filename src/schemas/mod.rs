use std::collections::HashMap;

use serde::Serialize;

pub(crate) mod auth;
pub(crate) mod cart;
pub(crate) mod course;
pub(crate) mod enrollment;
pub(crate) mod product;
pub(crate) mod purchase;
pub(crate) mod user;

/// Uniform success wrapper: `{success, message?, data, count?}`. Errors use
/// the mirror shape in `api::errors`.
#[derive(Debug, Serialize)]
pub(crate) struct Envelope<T: Serialize> {
    pub(crate) success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) message: Option<String>,
    pub(crate) data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) count: Option<usize>,
}

impl<T: Serialize> Envelope<T> {
    pub(crate) fn ok(data: T) -> Self {
        Self { success: true, message: None, data, count: None }
    }

    pub(crate) fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub(crate) fn with_count(mut self, count: usize) -> Self {
        self.count = Some(count);
        self
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct HealthResponse {
    pub(crate) service: String,
    pub(crate) status: String,
    pub(crate) components: HashMap<String, String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct RootResponse {
    pub(crate) message: String,
    pub(crate) version: String,
}
