use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
}
