//! Partition operations: open, put, match, keys, delete, trim.
//!
//! Writes are last-write-wins per request identity. `put_all` commits every
//! entry in one transaction or none of them.

use super::connection::CacheDb;
use super::hash::request_key;
use crate::Error;
use crate::http::{Request, Response, ResponseKind};
use chrono::Utc;
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;
use url::Url;

/// A response read back from a partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredResponse {
    /// Partition the entry was found in.
    pub cache_name: String,
    pub method: String,
    /// RFC 3339 timestamp of the write.
    pub stored_at: String,
    pub response: Response,
}

/// Row shape shared by reads and writes.
struct EntryRow {
    key_hash: String,
    method: String,
    url: String,
    status: i64,
    status_text: String,
    headers_json: String,
    body: Vec<u8>,
    kind: String,
    stored_at: String,
}

impl EntryRow {
    fn new(request: &Request, response: &Response) -> Result<Self, Error> {
        let method = request.method.to_ascii_uppercase();
        Ok(Self {
            key_hash: request_key(&method, request.url.as_str()),
            url: request.url.to_string(),
            method,
            status: i64::from(response.status),
            status_text: response.status_text.clone(),
            headers_json: serde_json::to_string(&response.headers)?,
            body: response.body.to_vec(),
            kind: kind_name(response.kind).to_string(),
            stored_at: Utc::now().to_rfc3339(),
        })
    }

    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<(String, Self)> {
        Ok((
            row.get(0)?,
            Self {
                key_hash: row.get(1)?,
                method: row.get(2)?,
                url: row.get(3)?,
                status: row.get(4)?,
                status_text: row.get(5)?,
                headers_json: row.get(6)?,
                body: row.get(7)?,
                kind: row.get(8)?,
                stored_at: row.get(9)?,
            },
        ))
    }

    fn into_stored(self, cache_name: String) -> Result<StoredResponse, Error> {
        let url = Url::parse(&self.url).map_err(|e| Error::Serialization(format!("stored url {}: {e}", self.url)))?;
        let status = u16::try_from(self.status)
            .map_err(|_| Error::Serialization(format!("stored status out of range: {}", self.status)))?;
        let response = Response {
            url,
            status,
            status_text: self.status_text,
            headers: serde_json::from_str(&self.headers_json)?,
            body: self.body.into(),
            kind: parse_kind(&self.kind)?,
        };
        Ok(StoredResponse { cache_name, method: self.method, stored_at: self.stored_at, response })
    }
}

const SELECT_ENTRY: &str = "SELECT e.partition, e.key_hash, e.method, e.url, e.status, e.status_text,
        e.headers_json, e.body, e.kind, e.stored_at
    FROM entries e";

fn kind_name(kind: ResponseKind) -> &'static str {
    match kind {
        ResponseKind::Basic => "basic",
        ResponseKind::Cors => "cors",
        ResponseKind::Opaque => "opaque",
    }
}

fn parse_kind(s: &str) -> Result<ResponseKind, Error> {
    match s {
        "basic" => Ok(ResponseKind::Basic),
        "cors" => Ok(ResponseKind::Cors),
        "opaque" => Ok(ResponseKind::Opaque),
        other => Err(Error::Serialization(format!("unknown response kind: {other}"))),
    }
}

fn ensure_partition(conn: &rusqlite::Connection, name: &str) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO partitions (name, created_at) VALUES (?1, ?2)",
        params![name, Utc::now().to_rfc3339()],
    )?;
    Ok(())
}

fn insert_entry(conn: &rusqlite::Connection, name: &str, row: &EntryRow) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO entries (
            partition, key_hash, method, url, status, status_text,
            headers_json, body, kind, stored_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            name,
            &row.key_hash,
            &row.method,
            &row.url,
            row.status,
            &row.status_text,
            &row.headers_json,
            &row.body,
            &row.kind,
            &row.stored_at,
        ],
    )?;
    Ok(())
}

impl CacheDb {
    /// Names of all partitions, oldest first.
    pub async fn cache_names(&self) -> Result<Vec<String>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT name FROM partitions ORDER BY id ASC")?;
                let names = stmt
                    .query_map([], |row| row.get(0))?
                    .collect::<rusqlite::Result<Vec<String>>>()?;
                Ok(names)
            })
            .await
            .map_err(Error::from)
    }

    pub async fn has_cache(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let exists =
                    conn.query_row("SELECT EXISTS(SELECT 1 FROM partitions WHERE name = ?1)", params![name], |row| {
                        row.get(0)
                    })?;
                Ok(exists)
            })
            .await
            .map_err(Error::from)
    }

    /// Create the partition if it does not exist yet.
    pub async fn open_cache(&self, name: &str) -> Result<(), Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                ensure_partition(conn, &name)?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Delete a partition and every entry in it.
    ///
    /// Returns false if the partition did not exist.
    pub async fn delete_cache(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let deleted = conn.execute("DELETE FROM partitions WHERE name = ?1", params![name])?;
                Ok(deleted > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// Store `response` under the identity of `request`, creating the partition lazily.
    pub async fn put(&self, name: &str, request: &Request, response: &Response) -> Result<(), Error> {
        let name = name.to_string();
        let row = EntryRow::new(request, response)?;
        self.conn
            .call(move |conn| -> Result<(), Error> {
                let tx = conn.transaction()?;
                ensure_partition(&tx, &name)?;
                insert_entry(&tx, &name, &row)?;
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Store every entry in a single transaction.
    ///
    /// Either the partition ends up holding all entries or it is left exactly
    /// as it was before the call.
    pub async fn put_all(&self, name: &str, entries: &[(Request, Response)]) -> Result<(), Error> {
        let name = name.to_string();
        let rows = entries
            .iter()
            .map(|(req, resp)| EntryRow::new(req, resp))
            .collect::<Result<Vec<_>, Error>>()?;
        self.conn
            .call(move |conn| -> Result<(), Error> {
                let tx = conn.transaction()?;
                ensure_partition(&tx, &name)?;
                for row in &rows {
                    insert_entry(&tx, &name, row)?;
                }
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Look up a request in one partition.
    pub async fn match_in(&self, name: &str, request: &Request) -> Result<Option<StoredResponse>, Error> {
        let name = name.to_string();
        let key = request_key(&request.method, request.url.as_str());
        let found = self
            .conn
            .call(move |conn| -> Result<Option<(String, EntryRow)>, Error> {
                let sql = format!("{SELECT_ENTRY} WHERE e.partition = ?1 AND e.key_hash = ?2");
                let mut stmt = conn.prepare(&sql)?;
                match stmt.query_row(params![name, key], EntryRow::from_row) {
                    Ok(found) => Ok(Some(found)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)?;

        found.map(|(cache, row)| row.into_stored(cache)).transpose()
    }

    /// Look up a request across all partitions, oldest partition first.
    pub async fn match_any(&self, request: &Request) -> Result<Option<StoredResponse>, Error> {
        let key = request_key(&request.method, request.url.as_str());
        let found = self
            .conn
            .call(move |conn| -> Result<Option<(String, EntryRow)>, Error> {
                let sql = format!(
                    "{SELECT_ENTRY} JOIN partitions p ON p.name = e.partition
                    WHERE e.key_hash = ?1 ORDER BY p.id ASC LIMIT 1"
                );
                let mut stmt = conn.prepare(&sql)?;
                match stmt.query_row(params![key], EntryRow::from_row) {
                    Ok(found) => Ok(Some(found)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)?;

        found.map(|(cache, row)| row.into_stored(cache)).transpose()
    }

    /// URLs stored in a partition, in write order.
    pub async fn keys(&self, name: &str) -> Result<Vec<String>, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT url FROM entries WHERE partition = ?1 ORDER BY rowid ASC")?;
                let urls = stmt
                    .query_map(params![name], |row| row.get(0))?
                    .collect::<rusqlite::Result<Vec<String>>>()?;
                Ok(urls)
            })
            .await
            .map_err(Error::from)
    }

    /// Remove the oldest writes until the partition holds at most `max_entries`.
    ///
    /// Returns the number of deleted entries.
    pub async fn trim_cache(&self, name: &str, max_entries: usize) -> Result<u64, Error> {
        let name = name.to_string();
        let max = i64::try_from(max_entries).unwrap_or(i64::MAX);
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count: i64 =
                    conn.query_row("SELECT COUNT(*) FROM entries WHERE partition = ?1", params![name], |row| {
                        row.get(0)
                    })?;
                if count <= max {
                    return Ok(0);
                }

                let deleted = conn.execute(
                    "DELETE FROM entries WHERE partition = ?1 AND rowid IN (
                        SELECT rowid FROM entries WHERE partition = ?1 ORDER BY rowid ASC LIMIT ?2
                    )",
                    params![name, count - max],
                )?;
                Ok(deleted as u64)
            })
            .await
            .map_err(Error::from)
    }
}
