use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct CreateCategory {
    pub name: Option<String>,
    #[serde(default)]
    pub subcategories: Vec<String>,
}
