use uuid::Uuid;

/// A top-level video category and its subcategories.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    pub subcategories: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct NewCategory {
    pub name: String,
    pub subcategories: Vec<String>,
}
