use crate::domain::auth::Identity;
use crate::domain::category::{Category, NewCategory};
use crate::error::{AppError, Result};
use crate::services::repository::CategoryRepository;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Clone, Debug)]
pub struct CategoryService {
    categories: Arc<dyn CategoryRepository>,
}

impl CategoryService {
    #[must_use]
    pub fn new(categories: Arc<dyn CategoryRepository>) -> Self {
        Self { categories }
    }

    /// # Errors
    /// Returns an error if the store cannot be read.
    pub async fn list_categories(&self) -> Result<Vec<Category>> {
        self.categories.list().await
    }

    /// # Errors
    /// Returns `AppError::NotFound` if the category does not exist.
    pub async fn get_category(&self, id: Uuid) -> Result<Category> {
        self.categories.find(id).await?.ok_or(AppError::NotFound)
    }

    /// Creates a category. Blank subcategories are dropped and duplicates collapsed, keeping order.
    ///
    /// # Errors
    /// Returns `AppError::BadRequest` if the name is missing or blank.
    /// Returns `AppError::Conflict` if a category with that name exists.
    #[tracing::instrument(err(level = "warn"), skip(self, caller, subcategories), fields(user_id = %caller.id))]
    pub async fn create_category(
        &self,
        caller: &Identity,
        name: Option<&str>,
        subcategories: Vec<String>,
    ) -> Result<Category> {
        let name = name
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .ok_or_else(|| AppError::BadRequest("Invalid payload: \"name\" is required".to_string()))?;

        let mut unique: Vec<String> = Vec::with_capacity(subcategories.len());
        for sub in subcategories {
            let sub = sub.trim();
            if !sub.is_empty() && !unique.iter().any(|s| s == sub) {
                unique.push(sub.to_string());
            }
        }

        let category = self.categories.create(NewCategory { name: name.to_string(), subcategories: unique }).await?;
        tracing::info!(category_id = %category.id, "Category created");
        Ok(category)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::MemoryStore;

    fn caller() -> Identity {
        Identity { id: Uuid::new_v4(), email: "admin@example.com".into() }
    }

    #[tokio::test]
    async fn test_create_normalises_subcategories() {
        let service = CategoryService::new(Arc::new(MemoryStore::new()));
        let subs = vec!["GTA V".into(), " ".into(), "PUBG ".into(), "GTA V".into()];
        let games = service.create_category(&caller(), Some(" Games "), subs).await.unwrap();

        assert_eq!(games.name, "Games");
        assert_eq!(games.subcategories, vec!["GTA V", "PUBG"]);
        assert_eq!(service.get_category(games.id).await.unwrap(), games);
    }

    #[tokio::test]
    async fn test_name_is_required_and_unique() {
        let service = CategoryService::new(Arc::new(MemoryStore::new()));
        assert!(matches!(
            service.create_category(&caller(), Some("  "), Vec::new()).await,
            Err(AppError::BadRequest(_))
        ));

        service.create_category(&caller(), Some("Music"), Vec::new()).await.unwrap();
        assert!(matches!(
            service.create_category(&caller(), Some("Music"), Vec::new()).await,
            Err(AppError::Conflict(_))
        ));
        assert!(matches!(service.get_category(Uuid::new_v4()).await, Err(AppError::NotFound)));
    }

    #[tokio::test]
    async fn test_list_is_sorted_by_name() {
        let service = CategoryService::new(Arc::new(MemoryStore::new()));
        for name in ["Music", "Games", "Sports"] {
            service.create_category(&caller(), Some(name), Vec::new()).await.unwrap();
        }
        let names: Vec<String> = service.list_categories().await.unwrap().into_iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["Games", "Music", "Sports"]);
    }
}
