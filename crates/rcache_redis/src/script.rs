// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Server-side script executing the atomic write protocol.

/// Lua source of the store-track-evict script.
///
/// `KEYS[1]` primary key, `KEYS[2]` tracking set, `ARGV[1]` value, `ARGV[2]` ttl in
/// milliseconds (0 = no expiry), `ARGV[3]` eviction limit (0 = untracked).
///
/// Scores are the server `TIME` in whole microseconds, built as a string so no
/// precision is lost to Lua numbers. The ttl is forwarded as received for the same reason.
/// Evicted keys are deleted in chunks of at most 1000 to stay within Lua's `unpack` limit.
/// Requires Redis 5.0 or later for `ZPOPMIN`.
pub(crate) const ATOMIC_WRITE_SOURCE: &str = r"
local reply
if tonumber(ARGV[2]) > 0 then
  reply = redis.call('SET', KEYS[1], ARGV[1], 'PX', ARGV[2])
else
  reply = redis.call('SET', KEYS[1], ARGV[1])
end
local limit = tonumber(ARGV[3])
if limit > 0 then
  local now = redis.call('TIME')
  local score = now[1] .. string.format('%06d', tonumber(now[2]))
  redis.call('ZADD', KEYS[2], score, KEYS[1])
  local over = redis.call('ZCOUNT', KEYS[2], '-inf', '+inf') - limit
  if over > 0 then
    local popped = redis.call('ZPOPMIN', KEYS[2], over)
    local stale = {}
    for i = 1, #popped, 2 do
      stale[#stale + 1] = popped[i]
      if #stale == 1000 then
        redis.call('DEL', unpack(stale))
        stale = {}
      end
    end
    if #stale > 0 then
      redis.call('DEL', unpack(stale))
    end
  end
end
return reply
";

/// Number of `KEYS` the script expects, as passed to `EVALSHA`.
pub(crate) const ATOMIC_WRITE_KEYS: usize = 2;
