use std::collections::HashMap;

use anyhow::Context;
use axum::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::plants::dto::{Plant, WateringEntry};
use crate::plants::repo_types::{NewPlant, PlantRow};

/// Owner-scoped persistence for plant documents and their watering history.
#[async_trait]
pub trait PlantStore: Send + Sync {
    async fn find_default(&self, owner_id: Uuid) -> anyhow::Result<Option<Plant>>;
    /// Stores `seed` as the owner's default plant unless one already exists,
    /// then returns whichever default plant is stored.
    async fn insert_default(&self, seed: NewPlant) -> anyhow::Result<Plant>;
    async fn insert(&self, plant: NewPlant) -> anyhow::Result<Plant>;
    async fn find_by_id(&self, owner_id: Uuid, id: Uuid) -> anyhow::Result<Option<Plant>>;
    /// Oldest plant of that name, if several share it.
    async fn find_by_name(&self, owner_id: Uuid, name: &str) -> anyhow::Result<Option<Plant>>;
    async fn list_by_owner(&self, owner_id: Uuid) -> anyhow::Result<Vec<Plant>>;
    /// Marks the plant watered at `at` and appends to its history.
    async fn record_watering(
        &self,
        owner_id: Uuid,
        plant_id: Uuid,
        at: OffsetDateTime,
    ) -> anyhow::Result<Option<Plant>>;
}

const PLANT_COLUMNS: &str =
    "id, owner_id, name, species, status, last_watered_at, temperature, image_url, is_default";

#[derive(Clone)]
pub struct PgPlantStore {
    db: PgPool,
}

impl PgPlantStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    async fn history_for(&self, plant_ids: &[Uuid]) -> anyhow::Result<HashMap<Uuid, Vec<WateringEntry>>> {
        let rows = sqlx::query_as::<_, (Uuid, OffsetDateTime)>(
            r#"
            SELECT plant_id, watered_at
              FROM plant_waterings
             WHERE plant_id = ANY($1)
             ORDER BY watered_at ASC, id ASC
            "#,
        )
        .bind(plant_ids)
        .fetch_all(&self.db)
        .await
        .context("load watering history")?;

        let mut out: HashMap<Uuid, Vec<WateringEntry>> = HashMap::new();
        for (plant_id, watered_at) in rows {
            out.entry(plant_id).or_default().push(WateringEntry { watered_at });
        }
        Ok(out)
    }

    async fn hydrate(&self, rows: Vec<PlantRow>) -> anyhow::Result<Vec<Plant>> {
        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let mut history = self.history_for(&ids).await?;
        rows.into_iter()
            .map(|r| {
                let h = history.remove(&r.id).unwrap_or_default();
                r.into_plant(h)
            })
            .collect()
    }

    async fn hydrate_one(&self, row: Option<PlantRow>) -> anyhow::Result<Option<Plant>> {
        match row {
            Some(r) => Ok(self.hydrate(vec![r]).await?.pop()),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl PlantStore for PgPlantStore {
    async fn find_default(&self, owner_id: Uuid) -> anyhow::Result<Option<Plant>> {
        let row = sqlx::query_as::<_, PlantRow>(&format!(
            "SELECT {PLANT_COLUMNS} FROM plants WHERE owner_id = $1 AND is_default"
        ))
        .bind(owner_id)
        .fetch_optional(&self.db)
        .await
        .context("find default plant")?;
        self.hydrate_one(row).await
    }

    async fn insert_default(&self, seed: NewPlant) -> anyhow::Result<Plant> {
        // A partial unique index allows one default plant per owner.
        sqlx::query(
            r#"
            INSERT INTO plants
                (owner_id, name, species, status, last_watered_at, temperature, image_url, is_default)
            VALUES ($1, $2, $3, $4, $5, $6, $7, TRUE)
            ON CONFLICT (owner_id) WHERE is_default DO NOTHING
            "#,
        )
        .bind(seed.owner_id)
        .bind(&seed.name)
        .bind(&seed.species)
        .bind(seed.status.as_str())
        .bind(seed.last_watered_at)
        .bind(seed.temperature)
        .bind(&seed.image_url)
        .execute(&self.db)
        .await
        .context("insert default plant")?;

        self.find_default(seed.owner_id)
            .await?
            .context("default plant missing after insert")
    }

    async fn insert(&self, plant: NewPlant) -> anyhow::Result<Plant> {
        let row = sqlx::query_as::<_, PlantRow>(&format!(
            r#"
            INSERT INTO plants
                (owner_id, name, species, status, last_watered_at, temperature, image_url, is_default)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {PLANT_COLUMNS}
            "#
        ))
        .bind(plant.owner_id)
        .bind(&plant.name)
        .bind(&plant.species)
        .bind(plant.status.as_str())
        .bind(plant.last_watered_at)
        .bind(plant.temperature)
        .bind(&plant.image_url)
        .bind(plant.is_default)
        .fetch_one(&self.db)
        .await
        .context("insert plant")?;
        row.into_plant(Vec::new())
    }

    async fn find_by_id(&self, owner_id: Uuid, id: Uuid) -> anyhow::Result<Option<Plant>> {
        let row = sqlx::query_as::<_, PlantRow>(&format!(
            "SELECT {PLANT_COLUMNS} FROM plants WHERE id = $1 AND owner_id = $2"
        ))
        .bind(id)
        .bind(owner_id)
        .fetch_optional(&self.db)
        .await
        .context("find plant by id")?;
        self.hydrate_one(row).await
    }

    async fn find_by_name(&self, owner_id: Uuid, name: &str) -> anyhow::Result<Option<Plant>> {
        let row = sqlx::query_as::<_, PlantRow>(&format!(
            r#"
            SELECT {PLANT_COLUMNS} FROM plants
             WHERE owner_id = $1 AND name = $2
             ORDER BY created_at ASC
             LIMIT 1
            "#
        ))
        .bind(owner_id)
        .bind(name)
        .fetch_optional(&self.db)
        .await
        .context("find plant by name")?;
        self.hydrate_one(row).await
    }

    async fn list_by_owner(&self, owner_id: Uuid) -> anyhow::Result<Vec<Plant>> {
        let rows = sqlx::query_as::<_, PlantRow>(&format!(
            "SELECT {PLANT_COLUMNS} FROM plants WHERE owner_id = $1 ORDER BY created_at ASC"
        ))
        .bind(owner_id)
        .fetch_all(&self.db)
        .await
        .context("list plants by owner")?;
        self.hydrate(rows).await
    }

    async fn record_watering(
        &self,
        owner_id: Uuid,
        plant_id: Uuid,
        at: OffsetDateTime,
    ) -> anyhow::Result<Option<Plant>> {
        let mut tx = self.db.begin().await.context("begin tx")?;

        let row = sqlx::query_as::<_, PlantRow>(&format!(
            r#"
            UPDATE plants
               SET status = 'success', last_watered_at = $3
             WHERE id = $1 AND owner_id = $2
            RETURNING {PLANT_COLUMNS}
            "#
        ))
        .bind(plant_id)
        .bind(owner_id)
        .bind(at)
        .fetch_optional(&mut *tx)
        .await
        .context("update plant status")?;

        let Some(row) = row else {
            return Ok(None);
        };

        sqlx::query("INSERT INTO plant_waterings (plant_id, watered_at) VALUES ($1, $2)")
            .bind(plant_id)
            .bind(at)
            .execute(&mut *tx)
            .await
            .context("insert watering")?;

        tx.commit().await.context("commit tx")?;
        self.hydrate_one(Some(row)).await
    }
}

#[cfg(test)]
pub mod memory {
    use std::sync::Mutex;

    use super::*;
    use crate::plants::dto::WateringStatus;

    #[derive(Default)]
    pub struct MemoryPlantStore {
        plants: Mutex<Vec<Plant>>,
    }

    impl MemoryPlantStore {
        pub fn len(&self) -> usize {
            self.plants.lock().unwrap().len()
        }
    }

    fn materialize(p: NewPlant) -> Plant {
        Plant {
            id: Uuid::new_v4(),
            owner_id: p.owner_id,
            name: p.name,
            species: p.species,
            status: p.status,
            last_watered_at: p.last_watered_at,
            temperature: p.temperature,
            image_url: p.image_url,
            is_default: p.is_default,
            history: Vec::new(),
        }
    }

    #[async_trait]
    impl PlantStore for MemoryPlantStore {
        async fn find_default(&self, owner_id: Uuid) -> anyhow::Result<Option<Plant>> {
            let plants = self.plants.lock().unwrap();
            Ok(plants
                .iter()
                .find(|p| p.owner_id == owner_id && p.is_default)
                .cloned())
        }

        async fn insert_default(&self, mut seed: NewPlant) -> anyhow::Result<Plant> {
            let mut plants = self.plants.lock().unwrap();
            if let Some(p) = plants
                .iter()
                .find(|p| p.owner_id == seed.owner_id && p.is_default)
            {
                return Ok(p.clone());
            }
            seed.is_default = true;
            let plant = materialize(seed);
            plants.push(plant.clone());
            Ok(plant)
        }

        async fn insert(&self, plant: NewPlant) -> anyhow::Result<Plant> {
            let plant = materialize(plant);
            self.plants.lock().unwrap().push(plant.clone());
            Ok(plant)
        }

        async fn find_by_id(&self, owner_id: Uuid, id: Uuid) -> anyhow::Result<Option<Plant>> {
            let plants = self.plants.lock().unwrap();
            Ok(plants
                .iter()
                .find(|p| p.owner_id == owner_id && p.id == id)
                .cloned())
        }

        async fn find_by_name(&self, owner_id: Uuid, name: &str) -> anyhow::Result<Option<Plant>> {
            let plants = self.plants.lock().unwrap();
            Ok(plants
                .iter()
                .find(|p| p.owner_id == owner_id && p.name == name)
                .cloned())
        }

        async fn list_by_owner(&self, owner_id: Uuid) -> anyhow::Result<Vec<Plant>> {
            let plants = self.plants.lock().unwrap();
            Ok(plants
                .iter()
                .filter(|p| p.owner_id == owner_id)
                .cloned()
                .collect())
        }

        async fn record_watering(
            &self,
            owner_id: Uuid,
            plant_id: Uuid,
            at: OffsetDateTime,
        ) -> anyhow::Result<Option<Plant>> {
            let mut plants = self.plants.lock().unwrap();
            let Some(p) = plants
                .iter_mut()
                .find(|p| p.owner_id == owner_id && p.id == plant_id)
            else {
                return Ok(None);
            };
            p.status = WateringStatus::Success;
            p.last_watered_at = Some(at);
            p.history.push(WateringEntry { watered_at: at });
            Ok(Some(p.clone()))
        }
    }
}
