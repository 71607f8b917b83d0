pub mod postings;
pub mod posts;
pub mod probes;
pub mod profile;
pub mod wallet;

use serde::Deserialize;
use validator::Validate;

use crate::{
    pkg::internal::{category::Category, failure::Failure},
    prelude::Result,
};

/// `?type=` filter shared by the listing endpoints.
#[derive(Deserialize, Default)]
pub struct CategoryFilter {
    #[serde(rename = "type")]
    pub category: Option<Category>,
}

pub(crate) fn validated<T: Validate>(input: T) -> Result<T> {
    input
        .validate()
        .map_err(|e| Failure::InvalidArgument(e.to_string()).reject())?;
    Ok(input)
}
