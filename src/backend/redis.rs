use super::{CursorBatch, Document, IndexBackend, IndexDefinition, QueryResult};
use crate::error::{ClientError, Result};
use crate::query::SearchQuery;
use crate::schema::PAYLOAD_FIELD;
use parking_lot::Mutex;
use redis::{Client, Connection, RedisError, Value};
use std::sync::Arc;

/// Largest window a single FT.SEARCH may request
const MAX_SEARCH_RESULTS: usize = 1_000_000;

/// Pseudo-field carrying the document key in aggregate replies
const KEY_FIELD: &str = "__key";

/// RediSearch backend over a single shared connection
#[derive(Clone)]
pub struct RedisBackend {
    client: Arc<Client>,
    connection: Arc<Mutex<Connection>>,
}

impl RedisBackend {
    /// Connect to a Redis server with the search module loaded
    pub fn new(redis_url: &str) -> Result<Self> {
        let client = Client::open(redis_url).map_err(|e| {
            ClientError::Backend(format!("Failed to create Redis client: {}", e))
        })?;

        let mut connection = client
            .get_connection()
            .map_err(|e| ClientError::Backend(format!("Failed to connect to Redis: {}", e)))?;

        // Test connection
        redis::cmd("PING")
            .query::<String>(&mut connection)
            .map_err(|e| ClientError::Backend(format!("Redis connection test failed: {}", e)))?;

        tracing::info!("Initialized Redis backend at {}", redis_url);

        Ok(Self {
            client: Arc::new(client),
            connection: Arc::new(Mutex::new(connection)),
        })
    }

    /// Open a second, independent connection to the same server
    pub fn reconnect(&self) -> Result<Self> {
        let connection = self.client.get_connection()?;
        Ok(Self {
            client: Arc::clone(&self.client),
            connection: Arc::new(Mutex::new(connection)),
        })
    }

    fn query<T: redis::FromRedisValue>(&self, cmd: &redis::Cmd) -> redis::RedisResult<T> {
        let mut connection = self.connection.lock();
        cmd.query(&mut *connection)
    }

    fn index_error(index: &str, err: RedisError) -> ClientError {
        if is_unknown_index(&err) {
            ClientError::UnknownIndex(index.to_string())
        } else {
            ClientError::Backend(err.to_string())
        }
    }

    fn aggregate_command(index: &str, query: &SearchQuery, batch_size: usize) -> redis::Cmd {
        let mut cmd = redis::cmd("FT.AGGREGATE");
        cmd.arg(index).arg(&query.query);

        let mut load = vec![format!("@{}", KEY_FIELD)];
        if query.include_content {
            load.push(format!("@{}", PAYLOAD_FIELD));
        }
        if let Some(sort) = &query.sort {
            load.push(format!("@{}", sort.field));
        }
        cmd.arg("LOAD").arg(load.len()).arg(load);

        if let Some(sort) = &query.sort {
            cmd.arg("SORTBY")
                .arg(2)
                .arg(format!("@{}", sort.field))
                .arg(sort.order.keyword());
        }
        if query.offset > 0 || query.limit < MAX_SEARCH_RESULTS {
            cmd.arg("LIMIT")
                .arg(query.offset)
                .arg(query.limit.min(MAX_SEARCH_RESULTS));
        }

        cmd.arg("WITHCURSOR").arg("COUNT").arg(batch_size.max(1));
        cmd
    }
}

impl IndexBackend for RedisBackend {
    fn name(&self) -> &'static str {
        "redis"
    }

    fn create_index(&self, definition: &IndexDefinition) -> Result<()> {
        let mut cmd = redis::cmd("FT.CREATE");
        cmd.arg(&definition.name)
            .arg("ON")
            .arg("HASH")
            .arg("PREFIX")
            .arg(1)
            .arg(&definition.prefix)
            .arg("SCHEMA");
        for field in &definition.fields {
            cmd.arg(&field.name).arg(field.field_type.schema_keyword());
            if field.sortable {
                cmd.arg("SORTABLE");
            }
        }

        self.query::<()>(&cmd).map_err(|e| {
            ClientError::Backend(format!("Failed to create index {}: {}", definition.name, e))
        })?;
        tracing::debug!(index = %definition.name, prefix = %definition.prefix, "Index created");
        Ok(())
    }

    fn drop_index(&self, name: &str) -> Result<bool> {
        match self.query::<()>(redis::cmd("FT.DROPINDEX").arg(name)) {
            Ok(()) => {
                tracing::debug!(index = %name, "Index dropped");
                Ok(true)
            }
            Err(e) if is_unknown_index(&e) => Ok(false),
            Err(e) => Err(ClientError::Backend(format!(
                "Failed to drop index {}: {}",
                name, e
            ))),
        }
    }

    fn index_exists(&self, name: &str) -> Result<bool> {
        match self.query::<Value>(redis::cmd("FT.INFO").arg(name)) {
            Ok(_) => Ok(true),
            Err(e) if is_unknown_index(&e) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn write_document(&self, index: &str, document: &Document) -> Result<()> {
        let mut pipe = redis::pipe();
        pipe.atomic().cmd("DEL").arg(&document.key).ignore();

        if !document.fields.is_empty() || document.payload.is_some() {
            pipe.cmd("HSET").arg(&document.key);
            for (name, value) in &document.fields {
                pipe.arg(name).arg(value);
            }
            if let Some(payload) = &document.payload {
                pipe.arg(PAYLOAD_FIELD).arg(payload);
            }
            pipe.ignore();
        }

        let mut connection = self.connection.lock();
        pipe.query::<()>(&mut *connection).map_err(|e| {
            ClientError::Backend(format!(
                "Failed to write document {} to index {}: {}",
                document.key, index, e
            ))
        })?;
        Ok(())
    }

    fn read_document(&self, key: &str) -> Result<Option<Document>> {
        let value: Value = self.query(redis::cmd("HGETALL").arg(key))?;
        match value {
            Value::Bulk(items) if !items.is_empty() => {
                let mut document = Document::new(key);
                fill_document(&mut document, &items);
                Ok(Some(document))
            }
            _ => Ok(None),
        }
    }

    fn delete_document(&self, key: &str) -> Result<bool> {
        let removed: i64 = self.query(redis::cmd("DEL").arg(key))?;
        Ok(removed > 0)
    }

    fn search(&self, index: &str, query: &SearchQuery) -> Result<QueryResult> {
        let mut cmd = redis::cmd("FT.SEARCH");
        cmd.arg(index).arg(&query.query);
        if !query.include_content {
            cmd.arg("NOCONTENT");
        }
        if let Some(sort) = &query.sort {
            cmd.arg("SORTBY").arg(&sort.field).arg(sort.order.keyword());
        }
        cmd.arg("LIMIT")
            .arg(query.offset)
            .arg(query.limit.min(MAX_SEARCH_RESULTS));

        let reply: Value = self
            .query(&cmd)
            .map_err(|e| Self::index_error(index, e))?;
        parse_search_reply(reply, query.include_content)
    }

    fn supports_cursors(&self) -> bool {
        true
    }

    fn cursor_query(
        &self,
        index: &str,
        query: &SearchQuery,
        batch_size: usize,
    ) -> Result<CursorBatch> {
        let cmd = Self::aggregate_command(index, query, batch_size);
        let reply: Value = self
            .query(&cmd)
            .map_err(|e| Self::index_error(index, e))?;
        parse_cursor_reply(reply)
    }

    fn cursor_read(&self, index: &str, cursor: u64, batch_size: usize) -> Result<CursorBatch> {
        let reply: Value = self
            .query(
                redis::cmd("FT.CURSOR")
                    .arg("READ")
                    .arg(index)
                    .arg(cursor)
                    .arg("COUNT")
                    .arg(batch_size.max(1)),
            )
            .map_err(|e| Self::index_error(index, e))?;
        parse_cursor_reply(reply)
    }

    fn cursor_close(&self, index: &str, cursor: u64) -> Result<()> {
        self.query::<()>(redis::cmd("FT.CURSOR").arg("DEL").arg(index).arg(cursor))?;
        Ok(())
    }
}

fn is_unknown_index(err: &RedisError) -> bool {
    let message = err.to_string().to_lowercase();
    message.contains("unknown index") || message.contains("no such index")
}

fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::Data(bytes) => Some(String::from_utf8_lossy(bytes).into_owned()),
        Value::Status(s) => Some(s.clone()),
        Value::Int(i) => Some(i.to_string()),
        _ => None,
    }
}

fn value_to_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Int(i) => u64::try_from(*i).ok(),
        Value::Data(bytes) => std::str::from_utf8(bytes).ok()?.parse().ok(),
        _ => None,
    }
}

/// Copy a flat `[name, value, ...]` reply into a document
fn fill_document(document: &mut Document, items: &[Value]) {
    for pair in items.chunks(2) {
        let [name, value] = pair else { continue };
        let Some(name) = value_to_string(name) else {
            continue;
        };
        if name == PAYLOAD_FIELD {
            if let Value::Data(bytes) = value {
                document.payload = Some(bytes.clone());
            }
        } else if name == KEY_FIELD {
            if let Some(key) = value_to_string(value) {
                document.key = key;
            }
        } else if let Some(value) = value_to_string(value) {
            document.fields.insert(name, value);
        }
    }
}

fn unexpected(command: &str, value: &Value) -> ClientError {
    ClientError::Backend(format!("Unexpected {} reply: {:?}", command, value))
}

fn parse_search_reply(reply: Value, include_content: bool) -> Result<QueryResult> {
    let items = match reply {
        Value::Bulk(items) => items,
        other => return Err(unexpected("FT.SEARCH", &other)),
    };

    let mut items = items.into_iter();
    let total = items
        .next()
        .as_ref()
        .and_then(value_to_u64)
        .ok_or_else(|| ClientError::Backend("FT.SEARCH reply without total".to_string()))?;

    let mut documents = Vec::new();
    while let Some(key) = items.next() {
        let key = value_to_string(&key).ok_or_else(|| unexpected("FT.SEARCH", &key))?;
        let mut document = Document::new(key);
        if include_content {
            if let Some(Value::Bulk(fields)) = items.next() {
                fill_document(&mut document, &fields);
            }
        }
        documents.push(document);
    }

    Ok(QueryResult { total, documents })
}

fn parse_cursor_reply(reply: Value) -> Result<CursorBatch> {
    let (rows, cursor) = match reply {
        Value::Bulk(mut parts) if parts.len() == 2 => {
            let cursor = value_to_u64(&parts[1]).unwrap_or(0);
            (parts.swap_remove(0), cursor)
        }
        other => return Err(unexpected("FT.AGGREGATE", &other)),
    };
    let rows = match rows {
        Value::Bulk(rows) => rows,
        other => return Err(unexpected("FT.AGGREGATE", &other)),
    };

    let mut rows = rows.into_iter();
    let total = rows.next().as_ref().and_then(value_to_u64).unwrap_or(0);

    let mut documents = Vec::new();
    for row in rows {
        let Value::Bulk(items) = row else { continue };
        let mut document = Document::default();
        fill_document(&mut document, &items);
        if document.key.is_empty() {
            tracing::warn!("Skipping aggregate row without a document key");
            continue;
        }
        documents.push(document);
    }

    Ok(CursorBatch {
        total,
        documents,
        cursor: (cursor != 0).then_some(cursor),
    })
}
