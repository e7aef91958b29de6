//! Lua scripts executed atomically by the Redis broker.

/// Moves due IDs from the scheduled set to the pending list.
///
/// `KEYS[1]` scheduled set, `KEYS[2]` pending list, `ARGV[1]` now in epoch
/// milliseconds. Returns the number of promoted IDs.
pub(super) const PROMOTE_DUE: &str = r"
local due = redis.call('ZRANGEBYSCORE', KEYS[1], '-inf', ARGV[1])
for _, id in ipairs(due) do
  redis.call('ZREM', KEYS[1], id)
  redis.call('LPUSH', KEYS[2], id)
end
return #due
";

/// Returns claimed IDs of stale consumers to the pending list.
///
/// `KEYS[1]` consumer registry, `KEYS[2]` pending list, `ARGV[1]` cutoff in
/// epoch milliseconds or `all`, `ARGV[2]` and `ARGV[3]` the claimed-list key
/// prefix and suffix. Returns a flat list of consumer ID and requeued count
/// pairs.
pub(super) const RECLAIM: &str = r"
local registry = redis.call('HGETALL', KEYS[1])
local result = {}
for i = 1, #registry, 2 do
  local consumer = registry[i]
  local last_seen = tonumber(registry[i + 1])
  if ARGV[1] == 'all' or last_seen == nil or last_seen < tonumber(ARGV[1]) then
    local claimed = ARGV[2] .. consumer .. ARGV[3]
    local requeued = 0
    local id = redis.call('LPOP', claimed)
    while id do
      redis.call('RPUSH', KEYS[2], id)
      requeued = requeued + 1
      id = redis.call('LPOP', claimed)
    end
    redis.call('HDEL', KEYS[1], consumer)
    table.insert(result, consumer)
    table.insert(result, tostring(requeued))
  end
end
return result
";
