use crate::domain::category::Category;
use crate::domain::video::Video;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, sqlx::FromRow)]
pub struct VideoRecord {
    pub(crate) id: Uuid,
    pub(crate) title: String,
    pub(crate) description: Option<String>,
    pub(crate) category: String,
    pub(crate) subcategory: String,
    pub(crate) url: String,
    pub(crate) thumbnail: Option<String>,
    pub(crate) uploader_id: Uuid,
    pub(crate) liked_by: Vec<Uuid>,
    pub(crate) created_at: OffsetDateTime,
}

impl From<VideoRecord> for Video {
    fn from(record: VideoRecord) -> Self {
        Self {
            id: record.id,
            title: record.title,
            description: record.description,
            category: record.category,
            subcategory: record.subcategory,
            url: record.url,
            thumbnail: record.thumbnail,
            uploader: record.uploader_id,
            liked_by: record.liked_by,
            created_at: record.created_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub struct CategoryRecord {
    pub(crate) id: Uuid,
    pub(crate) name: String,
    pub(crate) subcategories: Vec<String>,
}

impl From<CategoryRecord> for Category {
    fn from(record: CategoryRecord) -> Self {
        Self { id: record.id, name: record.name, subcategories: record.subcategories }
    }
}
