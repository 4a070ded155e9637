use async_trait::async_trait;
use marquee_catalog::inventory::{InventoryError, SeatLockStore};
use uuid::Uuid;

fn storage(err: redis::RedisError) -> InventoryError {
    InventoryError::Storage(err.to_string())
}

/// Seat lock store over Redis. One key per (showtime, seat); the value is
/// the hold token with a ":confirmed" suffix once permanent. Unconfirmed
/// holds carry a TTL so an abandoned process cannot strand seats forever;
/// `confirm` strips the TTL. A companion set per showtime indexes the keys
/// for listing and purge.
///
/// Every multi-seat operation runs as a single Lua script, which is what
/// gives two racing bookings exactly one winner: Redis executes scripts
/// atomically.
#[derive(Clone)]
pub struct RedisSeatLocks {
    client: redis::Client,
    hold_ttl_seconds: u64,
}

const TRY_LOCK_SCRIPT: &str = r#"
local token = ARGV[1]
local ttl = tonumber(ARGV[2])
local index = KEYS[1]
local taken = {}
for i = 2, #KEYS do
    local holder = redis.call("GET", KEYS[i])
    if holder and holder ~= token and holder ~= token .. ":confirmed" then
        table.insert(taken, KEYS[i])
    end
end
if #taken > 0 then
    return taken
end
for i = 2, #KEYS do
    if not redis.call("GET", KEYS[i]) then
        redis.call("SET", KEYS[i], token, "EX", ttl)
        redis.call("SADD", index, KEYS[i])
    end
end
return {}
"#;

const RELEASE_SCRIPT: &str = r#"
local token = ARGV[1]
local index = KEYS[1]
for i = 2, #KEYS do
    if redis.call("GET", KEYS[i]) == token then
        redis.call("DEL", KEYS[i])
        redis.call("SREM", index, KEYS[i])
    end
end
return 1
"#;

const CONFIRM_SCRIPT: &str = r#"
local token = ARGV[1]
local index = KEYS[1]
local taken = {}
for i = 2, #KEYS do
    local holder = redis.call("GET", KEYS[i])
    if holder and holder ~= token and holder ~= token .. ":confirmed" then
        table.insert(taken, KEYS[i])
    end
end
if #taken > 0 then
    return taken
end
for i = 2, #KEYS do
    redis.call("SET", KEYS[i], token .. ":confirmed")
    redis.call("SADD", index, KEYS[i])
end
return {}
"#;

impl RedisSeatLocks {
    pub fn new(client: redis::Client, hold_ttl_seconds: u64) -> Self {
        Self {
            client,
            hold_ttl_seconds,
        }
    }

    pub async fn connect(
        connection_string: &str,
        hold_ttl_seconds: u64,
    ) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(connection_string)?;
        Ok(Self::new(client, hold_ttl_seconds))
    }

    fn index_key(showtime_id: Uuid) -> String {
        format!("showtime:{}:seats", showtime_id)
    }

    fn seat_key(showtime_id: Uuid, seat_id: Uuid) -> String {
        format!("seat:{}:{}", showtime_id, seat_id)
    }

    fn seat_id_from_key(key: &str) -> Option<Uuid> {
        key.rsplit(':').next().and_then(|id| Uuid::parse_str(id).ok())
    }

    async fn run_guarded(
        &self,
        script: &str,
        showtime_id: Uuid,
        seat_ids: &[Uuid],
        token: Uuid,
        with_ttl: bool,
    ) -> Result<Vec<String>, InventoryError> {
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(storage)?;

        let script = redis::Script::new(script);
        let mut invocation = script.prepare_invoke();
        invocation.key(Self::index_key(showtime_id));
        for seat in seat_ids {
            invocation.key(Self::seat_key(showtime_id, *seat));
        }
        invocation.arg(token.to_string());
        if with_ttl {
            invocation.arg(self.hold_ttl_seconds);
        }
        invocation.invoke_async(&mut conn).await.map_err(storage)
    }
}

#[async_trait]
impl SeatLockStore for RedisSeatLocks {
    async fn try_lock(
        &self,
        showtime_id: Uuid,
        seat_ids: &[Uuid],
        token: Uuid,
    ) -> Result<(), InventoryError> {
        let taken = self
            .run_guarded(TRY_LOCK_SCRIPT, showtime_id, seat_ids, token, true)
            .await?;
        if taken.is_empty() {
            return Ok(());
        }
        let mut taken: Vec<Uuid> = taken
            .iter()
            .filter_map(|key| Self::seat_id_from_key(key))
            .collect();
        taken.sort();
        Err(InventoryError::Conflict { taken })
    }

    async fn release(
        &self,
        showtime_id: Uuid,
        seat_ids: &[Uuid],
        token: Uuid,
    ) -> Result<(), InventoryError> {
        self.run_guarded(RELEASE_SCRIPT, showtime_id, seat_ids, token, false)
            .await
            .map(|_| ())
    }

    async fn confirm(
        &self,
        showtime_id: Uuid,
        seat_ids: &[Uuid],
        token: Uuid,
    ) -> Result<(), InventoryError> {
        let taken = self
            .run_guarded(CONFIRM_SCRIPT, showtime_id, seat_ids, token, false)
            .await?;
        if taken.is_empty() {
            return Ok(());
        }
        let mut taken: Vec<Uuid> = taken
            .iter()
            .filter_map(|key| Self::seat_id_from_key(key))
            .collect();
        taken.sort();
        Err(InventoryError::Conflict { taken })
    }

    async fn held_seats(&self, showtime_id: Uuid) -> Result<Vec<Uuid>, InventoryError> {
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(storage)?;

        // Seat keys expire independently of the index set; only count
        // members whose key still exists.
        let script = redis::Script::new(
            r#"
            local live = {}
            for _, key in ipairs(redis.call("SMEMBERS", KEYS[1])) do
                if redis.call("EXISTS", key) == 1 then
                    table.insert(live, key)
                else
                    redis.call("SREM", KEYS[1], key)
                end
            end
            return live
            "#,
        );
        let keys: Vec<String> = script
            .key(Self::index_key(showtime_id))
            .invoke_async(&mut conn)
            .await
            .map_err(storage)?;

        let mut seats: Vec<Uuid> = keys
            .iter()
            .filter_map(|key| Self::seat_id_from_key(key))
            .collect();
        seats.sort();
        Ok(seats)
    }

    async fn purge_showtime(&self, showtime_id: Uuid) -> Result<(), InventoryError> {
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(storage)?;

        let script = redis::Script::new(
            r#"
            for _, key in ipairs(redis.call("SMEMBERS", KEYS[1])) do
                redis.call("DEL", key)
            end
            redis.call("DEL", KEYS[1])
            return 1
            "#,
        );
        let _: i64 = script
            .key(Self::index_key(showtime_id))
            .invoke_async(&mut conn)
            .await
            .map_err(storage)?;
        Ok(())
    }
}
