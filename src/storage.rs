use crate::error::{StoreError, StoreResult};
use rusqlite::{params, Connection};
use serde_json::Value;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, warn};

/// All measurements recorded at one location, as stored
#[derive(Debug, Clone, PartialEq)]
pub struct LocationDocument {
    pub location: String,
    pub measurements: Vec<Value>,
}

/// Read side of the external measurement store
pub trait DocumentSource: Send + Sync {
    fn fetch_all(&self) -> StoreResult<Vec<LocationDocument>>;
}

/// SQLite-backed document store: one row per location, measurements kept as a JSON array
pub struct SqliteDocumentStore {
    conn: Mutex<Connection>,
}

impl SqliteDocumentStore {
    pub fn new<P: AsRef<Path>>(path: P, busy_timeout: Duration) -> StoreResult<Self> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(busy_timeout)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.initialize_schema()?;
        Ok(store)
    }

    pub fn open_in_memory() -> StoreResult<Self> {
        let store = Self {
            conn: Mutex::new(Connection::open_in_memory()?),
        };
        store.initialize_schema()?;
        Ok(store)
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Unavailable("connection lock poisoned".to_string()))
    }

    fn initialize_schema(&self) -> StoreResult<()> {
        let conn = self.lock()?;
        conn.execute_batch(
            r#"
            -- One document per surveyed location
            CREATE TABLE IF NOT EXISTS location_documents (
                location TEXT PRIMARY KEY,
                measurements JSON NOT NULL
            );
            "#,
        )?;
        Ok(())
    }

    /// Appends a measurement to a location's document, creating the document if needed
    pub fn push_measurement(&self, location: &str, measurement: &Value) -> StoreResult<()> {
        let data = measurement.to_string();
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO location_documents (location, measurements) VALUES (?1, json_array(json(?2)))
             ON CONFLICT(location) DO UPDATE SET measurements = json_insert(measurements, '$[#]', json(?2))",
            params![location, data],
        )?;
        debug!("Appended measurement to {}", location);
        Ok(())
    }

    /// Overwrites a location's document with the given measurements
    pub fn replace_document(&self, location: &str, measurements: &[Value]) -> StoreResult<()> {
        let data = Value::Array(measurements.to_vec()).to_string();
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR REPLACE INTO location_documents (location, measurements) VALUES (?1, ?2)",
            params![location, data],
        )?;
        Ok(())
    }

    pub fn clear(&self) -> StoreResult<usize> {
        let conn = self.lock()?;
        Ok(conn.execute("DELETE FROM location_documents", [])?)
    }
}

impl DocumentSource for SqliteDocumentStore {
    fn fetch_all(&self) -> StoreResult<Vec<LocationDocument>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT location, measurements FROM location_documents ORDER BY location")?;
        let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?;

        let mut documents = Vec::new();
        for row in rows {
            let (location, data) = row?;
            match serde_json::from_str::<Vec<Value>>(&data) {
                Ok(measurements) => documents.push(LocationDocument { location, measurements }),
                Err(source) => {
                    warn!("{}", StoreError::MalformedDocument { location, source });
                }
            }
        }

        debug!("Fetched {} location documents", documents.len());
        Ok(documents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn push_creates_then_appends() {
        let store = SqliteDocumentStore::open_in_memory().unwrap();
        store.push_measurement("ECC", &json!({"run_no": 1})).unwrap();
        store.push_measurement("ECC", &json!({"run_no": 2})).unwrap();
        store.push_measurement("GEC", &json!({"run_no": 1})).unwrap();

        let docs = store.fetch_all().unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].location, "ECC");
        assert_eq!(docs[0].measurements, vec![json!({"run_no": 1}), json!({"run_no": 2})]);
        assert_eq!(docs[1].measurements.len(), 1);
    }

    #[test]
    fn replace_and_clear() {
        let store = SqliteDocumentStore::open_in_memory().unwrap();
        store.push_measurement("SDB", &json!({"run_no": 1})).unwrap();
        store.replace_document("SDB", &[json!({"run_no": 9})]).unwrap();
        assert_eq!(store.fetch_all().unwrap()[0].measurements, vec![json!({"run_no": 9})]);

        assert_eq!(store.clear().unwrap(), 1);
        assert!(store.fetch_all().unwrap().is_empty());
    }

    #[test]
    fn unparsable_document_is_skipped() {
        let store = SqliteDocumentStore::open_in_memory().unwrap();
        store.push_measurement("ECC", &json!({"run_no": 1})).unwrap();
        {
            let conn = store.lock().unwrap();
            conn.execute(
                "INSERT INTO location_documents (location, measurements) VALUES ('BAD', '{\"not\": \"a list\"}')",
                [],
            )
            .unwrap();
        }
        let docs = store.fetch_all().unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].location, "ECC");
    }
}
