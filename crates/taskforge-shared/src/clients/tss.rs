//! Task State Store client, backed by Redis. Grounded on
//! `original_source/core/utils.py::RedisClient`: key format `task:<uuid>`,
//! JSON-serialized record, TTL absolute from last write.

use redis::aio::ConnectionManager;
use redis::AsyncCommands;

use crate::error::{TaskforgeError, TaskforgeResult};
use crate::models::{TaskRecord, TaskStatus};

fn task_key(task_id: &str) -> String {
    format!("task:{task_id}")
}

/// Lua script implementing the compare-and-swap for the dispatcher's
/// `PENDING -> PROCESSING` hint (DESIGN.md Open Question 1): only writes if
/// the stored record's status is still `PENDING`. Returns 1 if it wrote, 0
/// otherwise (already advanced past PENDING, or record gone).
const TRY_MARK_PROCESSING_SCRIPT: &str = r#"
local key = KEYS[1]
local new_value = ARGV[1]
local current = redis.call('GET', key)
if current == false then
  return 0
end
local ok, decoded = pcall(cjson.decode, current)
if not ok then
  return 0
end
if decoded['status'] ~= 'PENDING' then
  return 0
end
local ttl = redis.call('TTL', key)
redis.call('SET', key, new_value)
if ttl and ttl > 0 then
  redis.call('EXPIRE', key, ttl)
end
return 1
"#;

#[derive(Clone)]
pub struct TaskStateStore {
    conn: ConnectionManager,
}

impl TaskStateStore {
    pub async fn connect(url: &str) -> TaskforgeResult<Self> {
        let client = redis::Client::open(url)?;
        let conn = client.get_connection_manager().await?;
        Ok(Self { conn })
    }

    pub async fn set_task(
        &self,
        record: &TaskRecord,
        ttl_secs: u64,
    ) -> TaskforgeResult<()> {
        let mut conn = self.conn.clone();
        let body = serde_json::to_string(record)?;
        conn.set_ex::<_, _, ()>(task_key(&record.task_id), body, ttl_secs)
            .await?;
        Ok(())
    }

    pub async fn get_task(&self, task_id: &str) -> TaskforgeResult<Option<TaskRecord>> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.get(task_key(task_id)).await?;
        match raw {
            Some(body) => Ok(Some(serde_json::from_str(&body)?)),
            None => Ok(None),
        }
    }

    pub async fn delete_task(&self, task_id: &str) -> TaskforgeResult<bool> {
        let mut conn = self.conn.clone();
        let deleted: i64 = conn.del(task_key(task_id)).await?;
        Ok(deleted > 0)
    }

    /// Best-effort `PENDING -> PROCESSING` upgrade, only applied if the
    /// stored record is still PENDING. Never overwrites a record the ICC
    /// has already advanced past PENDING.
    pub async fn try_mark_processing(&self, task_id: &str) -> TaskforgeResult<bool> {
        let Some(mut record) = self.get_task(task_id).await? else {
            return Ok(false);
        };
        if record.status != TaskStatus::Pending {
            return Ok(false);
        }
        record.status = TaskStatus::Processing;
        record.updated_at = chrono::Utc::now();
        let body = serde_json::to_string(&record)?;

        let mut conn = self.conn.clone();
        let script = redis::Script::new(TRY_MARK_PROCESSING_SCRIPT);
        let wrote: i64 = script
            .key(task_key(task_id))
            .arg(body)
            .invoke_async(&mut conn)
            .await
            .map_err(TaskforgeError::from)?;
        Ok(wrote == 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_key_format_matches_source() {
        assert_eq!(task_key("abc-123"), "task:abc-123");
    }
}
