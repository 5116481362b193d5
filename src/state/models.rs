// Data models for Grow state management
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Plant identifier, derived from the creation time in epoch milliseconds
pub type PlantId = i64;

/// One timestamped photograph of a plant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Picture {
    pub taken_at: DateTime<Utc>,
    /// Encoded image as a data URI (`data:image/jpeg;base64,...`)
    pub data: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plant {
    pub id: PlantId,
    pub name: String,
    #[serde(default)]
    pub pictures: Vec<Picture>,
}

impl Plant {
    pub fn new(id: PlantId, name: String) -> Self {
        Self {
            id,
            name,
            pictures: Vec::new(),
        }
    }
}

/// Ordered set of plants, the unit of persistence.
///
/// Plant ids are unique within a collection. Every mutation goes through the
/// methods below so the invariant cannot be broken from outside.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Collection {
    plants: Vec<Plant>,
}

impl Collection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.plants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plants.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Plant> {
        self.plants.iter()
    }

    pub fn as_slice(&self) -> &[Plant] {
        &self.plants
    }

    pub fn ids(&self) -> Vec<PlantId> {
        self.plants.iter().map(|p| p.id).collect()
    }

    pub fn find(&self, id: PlantId) -> Option<&Plant> {
        self.plants.iter().find(|p| p.id == id)
    }

    pub fn contains(&self, id: PlantId) -> bool {
        self.find(id).is_some()
    }

    /// Append a plant. Returns the plant back if its id is already taken.
    pub fn push(&mut self, plant: Plant) -> Result<(), Plant> {
        if self.contains(plant.id) {
            return Err(plant);
        }
        self.plants.push(plant);
        Ok(())
    }

    /// Remove the plant with the given id, keeping the order of the others
    pub fn remove(&mut self, id: PlantId) -> Option<Plant> {
        let index = self.plants.iter().position(|p| p.id == id)?;
        Some(self.plants.remove(index))
    }

    /// Append a picture to the matching plant. Returns false if no plant matched.
    pub fn append_picture(&mut self, id: PlantId, picture: Picture) -> bool {
        match self.plants.iter_mut().find(|p| p.id == id) {
            Some(plant) => {
                plant.pictures.push(picture);
                true
            }
            None => false,
        }
    }

    /// Most recent picture of a plant, shown as the overlay in the camera view
    pub fn last_picture(&self, id: PlantId) -> Option<&Picture> {
        self.find(id).and_then(|p| p.pictures.last())
    }

    /// Generate an id for a plant created at `now_millis`.
    ///
    /// Ids come from the clock, but two plants created in the same
    /// millisecond (or after the clock stepped back) get `max + 1` instead.
    /// `None` once the id space is exhausted.
    pub fn next_id(&self, now_millis: i64) -> Option<PlantId> {
        match self.plants.iter().map(|p| p.id).max() {
            Some(max) if max >= now_millis => max.checked_add(1),
            _ => Some(now_millis),
        }
    }
}

impl From<Vec<Plant>> for Collection {
    /// Builds a collection, dropping later entries whose id was already seen
    fn from(plants: Vec<Plant>) -> Self {
        let mut collection = Collection::new();
        for plant in plants {
            let _ = collection.push(plant);
        }
        collection
    }
}

impl<'de> Deserialize<'de> for Collection {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Vec::<Plant>::deserialize(deserializer).map(Collection::from)
    }
}

impl<'a> IntoIterator for &'a Collection {
    type Item = &'a Plant;
    type IntoIter = std::slice::Iter<'a, Plant>;

    fn into_iter(self) -> Self::IntoIter {
        self.plants.iter()
    }
}
