//! In-memory collaborators for tests.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::sync::Mutex;

use crate::storage::Storage;
use crate::warehouse::{Query, ResultSet, Warehouse};

/// A warehouse that answers queries with canned results, or fails
/// queries whose text contains a given marker.
#[derive(Default)]
pub struct MemoryWarehouse {
    result: ResultSet,
    results_for: Vec<(String, ResultSet)>,
    fail_on: Option<(String, String)>,
    queries: Mutex<Vec<Query>>,
}

impl MemoryWarehouse {
    pub fn returning(result: ResultSet) -> Self {
        MemoryWarehouse {
            result,
            ..Default::default()
        }
    }

    /// Answer the queries containing `marker` with `result` instead.
    pub fn with_result_for(mut self, marker: &str, result: ResultSet) -> Self {
        self.results_for.push((marker.to_string(), result));
        self
    }

    pub fn failing(message: &str) -> Self {
        Self::failing_on("", message)
    }

    /// Fail only the queries containing `marker`.
    pub fn failing_on(marker: &str, message: &str) -> Self {
        MemoryWarehouse {
            fail_on: Some((marker.to_string(), message.to_string())),
            ..Default::default()
        }
    }

    pub fn queries(&self) -> Vec<Query> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl Warehouse for MemoryWarehouse {
    async fn execute(&self, query: &Query) -> Result<ResultSet> {
        self.queries.lock().unwrap().push(query.clone());
        match &self.fail_on {
            Some((marker, message)) if query.text.contains(marker.as_str()) => {
                Err(anyhow!(message.clone()))
            }
            _ => Ok(self
                .results_for
                .iter()
                .find(|(marker, _)| query.text.contains(marker.as_str()))
                .map(|(_, result)| result)
                .unwrap_or(&self.result)
                .clone()),
        }
    }
}

/// An object created in [`MemoryStorage`].
#[derive(Debug, Clone)]
pub struct StoredObject {
    pub bucket: String,
    pub key: String,
    pub body: Vec<u8>,
    pub content_type: String,
}

/// A storage that keeps objects in memory, or fails uploads whose
/// key contains a given marker.
#[derive(Default)]
pub struct MemoryStorage {
    fail_on: Option<(String, String)>,
    attempts: Mutex<usize>,
    objects: Mutex<Vec<StoredObject>>,
}

impl MemoryStorage {
    pub fn failing(message: &str) -> Self {
        Self::failing_on("", message)
    }

    /// Fail only the uploads whose key contains `marker`.
    pub fn failing_on(marker: &str, message: &str) -> Self {
        MemoryStorage {
            fail_on: Some((marker.to_string(), message.to_string())),
            ..Default::default()
        }
    }

    pub fn attempts(&self) -> usize {
        *self.attempts.lock().unwrap()
    }

    pub fn objects(&self) -> Vec<StoredObject> {
        self.objects.lock().unwrap().clone()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn create_object(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<()> {
        *self.attempts.lock().unwrap() += 1;
        if let Some((marker, message)) = &self.fail_on {
            if key.contains(marker.as_str()) {
                return Err(anyhow!(message.clone()));
            }
        }
        self.objects.lock().unwrap().push(StoredObject {
            bucket: bucket.to_string(),
            key: key.to_string(),
            body,
            content_type: content_type.to_string(),
        });
        Ok(())
    }
}
