//! Entity records in a DashMap keyed by id.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use duel_core::{DuelError, DuelResult, EntityId, EntityRef, EntityRepository};
use serde::{Deserialize, Serialize};
use tracing::info;

const MAX_NAME_LEN: usize = 200;
const MAX_DESCRIPTION_LEN: usize = 1000;
const MAX_IMAGE_URLS: usize = 10;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,
    pub name: String,
    pub description: String,
    pub image_urls: Vec<String>,
    pub rating: f64,
    pub created_at: DateTime<Utc>,
}

impl Entity {
    pub fn to_ref(&self) -> EntityRef {
        EntityRef {
            id: self.id,
            rating: self.rating,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewEntity {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub image_urls: Vec<String>,
}

impl NewEntity {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// Partial update of the descriptive fields. Ratings change only through
/// `EntityRepository::set_rating`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EntityUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub image_urls: Option<Vec<String>>,
}

fn validate_name(name: &str) -> DuelResult<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(DuelError::Validation("name cannot be empty".to_string()));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(DuelError::Validation(format!(
            "name cannot exceed {MAX_NAME_LEN} characters"
        )));
    }
    Ok(name.to_string())
}

fn validate_description(description: &str) -> DuelResult<()> {
    if description.chars().count() > MAX_DESCRIPTION_LEN {
        return Err(DuelError::Validation(format!(
            "description cannot exceed {MAX_DESCRIPTION_LEN} characters"
        )));
    }
    Ok(())
}

fn validate_image_urls(urls: &[String]) -> DuelResult<()> {
    if urls.len() > MAX_IMAGE_URLS {
        return Err(DuelError::Validation(format!(
            "cannot have more than {MAX_IMAGE_URLS} image URLs"
        )));
    }
    if urls.iter().any(|u| u.trim().is_empty()) {
        return Err(DuelError::Validation(
            "image URLs must be non-empty strings".to_string(),
        ));
    }
    Ok(())
}

/// Entity store keyed by sequentially assigned ids.
pub struct MemoryEntityStore {
    entities: DashMap<EntityId, Entity>,
    next_id: AtomicU64,
    initial_rating: f64,
}

impl MemoryEntityStore {
    pub fn new(initial_rating: f64) -> Self {
        Self {
            entities: DashMap::new(),
            next_id: AtomicU64::new(1),
            initial_rating,
        }
    }

    /// Validate and insert a new entity at the initial rating.
    pub fn create(&self, new: NewEntity) -> DuelResult<Entity> {
        let name = validate_name(&new.name)?;
        validate_description(&new.description)?;
        validate_image_urls(&new.image_urls)?;

        let id = EntityId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let entity = Entity {
            id,
            name,
            description: new.description,
            image_urls: new.image_urls,
            rating: self.initial_rating,
            created_at: Utc::now(),
        };
        info!(%id, name = %entity.name, "entity created");
        self.entities.insert(id, entity.clone());
        Ok(entity)
    }

    pub fn get(&self, id: EntityId) -> Option<Entity> {
        self.entities.get(&id).map(|e| e.clone())
    }

    /// Every entity in id order.
    pub fn list(&self) -> Vec<Entity> {
        let mut all: Vec<Entity> = self.entities.iter().map(|e| e.value().clone()).collect();
        all.sort_by_key(|e| e.id);
        all
    }

    pub fn update(&self, id: EntityId, update: EntityUpdate) -> DuelResult<Entity> {
        let name = update.name.as_deref().map(validate_name).transpose()?;
        if let Some(description) = &update.description {
            validate_description(description)?;
        }
        if let Some(urls) = &update.image_urls {
            validate_image_urls(urls)?;
        }

        let mut entity = self
            .entities
            .get_mut(&id)
            .ok_or(DuelError::UnknownEntity(id))?;
        if let Some(name) = name {
            entity.name = name;
        }
        if let Some(description) = update.description {
            entity.description = description;
        }
        if let Some(urls) = update.image_urls {
            entity.image_urls = urls;
        }
        Ok(entity.clone())
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

impl EntityRepository for MemoryEntityStore {
    fn list_entities(&self) -> DuelResult<Vec<EntityRef>> {
        Ok(self.list().iter().map(Entity::to_ref).collect())
    }

    fn get_entity(&self, id: EntityId) -> DuelResult<Option<EntityRef>> {
        Ok(self.entities.get(&id).map(|e| e.to_ref()))
    }

    fn set_rating(&self, id: EntityId, rating: f64) -> DuelResult<()> {
        if !rating.is_finite() {
            return Err(DuelError::Validation(format!(
                "rating for entity {id} must be finite"
            )));
        }
        let mut entity = self
            .entities
            .get_mut(&id)
            .ok_or(DuelError::UnknownEntity(id))?;
        entity.rating = rating;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_assigns_sequential_ids() {
        let store = MemoryEntityStore::new(1500.0);
        let a = store.create(NewEntity::named("Burger Palace")).unwrap();
        let b = store.create(NewEntity::named("Pizza Corner")).unwrap();
        assert_eq!(a.id, EntityId(1));
        assert_eq!(b.id, EntityId(2));
        assert_eq!(a.rating, 1500.0);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_name_is_trimmed_and_required() {
        let store = MemoryEntityStore::new(1500.0);
        let e = store.create(NewEntity::named("  Sushi Zen  ")).unwrap();
        assert_eq!(e.name, "Sushi Zen");

        assert!(store.create(NewEntity::named("   ")).is_err());
        assert!(store.create(NewEntity::named("x".repeat(201))).is_err());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_description_and_urls_limits() {
        let store = MemoryEntityStore::new(1500.0);
        let long = NewEntity::named("a").with_description("d".repeat(1001));
        assert!(matches!(store.create(long), Err(DuelError::Validation(_))));

        let mut many = NewEntity::named("b");
        many.image_urls = (0..11).map(|i| format!("http://example.com/{i}.jpg")).collect();
        assert!(store.create(many).is_err());

        let mut blank = NewEntity::named("c");
        blank.image_urls = vec![" ".to_string()];
        assert!(store.create(blank).is_err());
    }

    #[test]
    fn test_list_in_id_order() {
        let store = MemoryEntityStore::new(1200.0);
        for i in 0..20 {
            store.create(NewEntity::named(format!("e{i}"))).unwrap();
        }
        let ids: Vec<u64> = store.list_entities().unwrap().iter().map(|e| e.id.0).collect();
        assert_eq!(ids, (1..=20).collect::<Vec<_>>());
    }

    #[test]
    fn test_set_rating() {
        let store = MemoryEntityStore::new(1500.0);
        let e = store.create(NewEntity::named("a")).unwrap();
        store.set_rating(e.id, 1612.5).unwrap();
        assert_eq!(store.get_entity(e.id).unwrap().unwrap().rating, 1612.5);

        assert!(matches!(
            store.set_rating(EntityId(77), 1500.0),
            Err(DuelError::UnknownEntity(EntityId(77)))
        ));
        assert!(store.set_rating(e.id, f64::INFINITY).is_err());
    }

    #[test]
    fn test_update_descriptive_fields() {
        let store = MemoryEntityStore::new(1500.0);
        let e = store.create(NewEntity::named("old")).unwrap();
        let updated = store
            .update(
                e.id,
                EntityUpdate {
                    name: Some(" new ".to_string()),
                    description: Some("fresh".to_string()),
                    image_urls: None,
                },
            )
            .unwrap();
        assert_eq!(updated.name, "new");
        assert_eq!(updated.description, "fresh");
        assert_eq!(updated.rating, 1500.0);

        assert!(store.update(EntityId(99), EntityUpdate::default()).is_err());
        assert!(store
            .update(
                e.id,
                EntityUpdate {
                    name: Some(String::new()),
                    ..Default::default()
                }
            )
            .is_err());
        assert_eq!(store.get(e.id).unwrap().name, "new");
    }
}
