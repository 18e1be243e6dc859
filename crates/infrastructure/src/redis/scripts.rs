//! 在Redis服务端原子执行的Lua脚本

/// 令牌匹配时删除。KEYS[1]=锁键, ARGV[1]=令牌
pub const RELEASE_LOCK: &str = r#"
if redis.call('GET', KEYS[1]) == ARGV[1] then
    return redis.call('DEL', KEYS[1])
end
return 0
"#;

/// 令牌匹配时重置TTL。KEYS[1]=锁键, ARGV[1]=令牌, ARGV[2]=TTL毫秒
pub const EXTEND_LOCK: &str = r#"
if redis.call('GET', KEYS[1]) == ARGV[1] then
    return redis.call('PEXPIRE', KEYS[1], ARGV[2])
end
return 0
"#;

/// 滑动窗口：清理、计数、插入在同一脚本中完成。
///
/// KEYS[1]=有序集合键, ARGV[1]=上限, ARGV[2]=窗口毫秒, ARGV[3]=随机成员后缀。
/// 时间取自服务端 `TIME`，避免各实例时钟偏差。
/// 返回 `{allowed, remaining, reset_in_ms}`。
pub const SLIDING_WINDOW: &str = r#"
local key = KEYS[1]
local limit = tonumber(ARGV[1])
local window = tonumber(ARGV[2])
local t = redis.call('TIME')
local now = tonumber(t[1]) * 1000 + math.floor(tonumber(t[2]) / 1000)

-- inclusive bound: an entry exactly one window old is dropped
redis.call('ZREMRANGEBYSCORE', key, '-inf', now - window)
local count = redis.call('ZCARD', key)

if count < limit then
    redis.call('ZADD', key, now, now .. '-' .. ARGV[3])
    redis.call('PEXPIRE', key, window)
    return {1, limit - count - 1, 0}
end

local reset_in = 0
local oldest = redis.call('ZRANGE', key, 0, 0, 'WITHSCORES')
if oldest[2] then
    reset_in = tonumber(oldest[2]) + window - now
    if reset_in < 0 then
        reset_in = 0
    end
end
return {0, 0, reset_in}
"#;
