//! Lua scripts executed server-side by the Redis store.
//!
//! Both scripts take KEYS in `BreakerKeys::all` order: fails, open, half, probe.

/// ARGV: fail window ms, threshold, open cooldown ms, recovery window ms.
///
/// Returns `{count, outcome}` where outcome is one of
/// `counted`, `opened`, `reopened`, `already_open`.
pub(crate) const RECORD_FAILURE: &str = r#"
local fails_key = KEYS[1]
local open_key  = KEYS[2]
local half_key  = KEYS[3]
local probe_key = KEYS[4]

local fail_window_ms     = tonumber(ARGV[1])
local threshold          = tonumber(ARGV[2])
local open_cooldown_ms   = tonumber(ARGV[3])
local recovery_window_ms = tonumber(ARGV[4])

if redis.call("EXISTS", open_key) == 1 then
  return {0, "already_open"}
end

if redis.call("EXISTS", half_key) == 1 then
  redis.call("SET", open_key, "1", "PX", open_cooldown_ms)
  redis.call("SET", half_key, "1", "PX", recovery_window_ms)
  redis.call("DEL", fails_key, probe_key)
  return {0, "reopened"}
end

local fails = redis.call("INCR", fails_key)
if redis.call("PTTL", fails_key) < 0 then
  redis.call("PEXPIRE", fails_key, fail_window_ms)
end

if fails >= threshold then
  redis.call("SET", open_key, "1", "PX", open_cooldown_ms)
  redis.call("SET", half_key, "1", "PX", recovery_window_ms)
  redis.call("DEL", fails_key, probe_key)
  return {fails, "opened"}
end

redis.call("DEL", probe_key)
return {fails, "counted"}
"#;

/// ARGV: probe lease ms. Returns `closed`, `open` or `probe`.
pub(crate) const ADMIT_PROBE: &str = r#"
local open_key  = KEYS[2]
local half_key  = KEYS[3]
local probe_key = KEYS[4]

local lease_ms = tonumber(ARGV[1])

if redis.call("EXISTS", open_key) == 1 then
  return "open"
end

if redis.call("EXISTS", half_key) == 0 then
  return "closed"
end

if redis.call("SET", probe_key, "1", "NX", "PX", lease_ms) then
  return "probe"
end

return "open"
"#;
