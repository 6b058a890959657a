// Command categorization: maps a command name to its access type and data-type group.

use std::collections::BTreeMap;

use crate::models::{CommandCategory, CommandStats};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Read,
    Write,
    Other,
}

/// Read/write classification for GetTypeCmds / SetTypeCmds / OtherTypeCmds.
pub fn access(cmd: &str) -> Access {
    match cmd {
        "get" | "mget" | "getrange" | "substr" | "strlen" | "lcs" | "getbit" | "bitcount"
        | "bitpos" | "bitfield_ro" | "hget" | "hmget" | "hgetall" | "hkeys" | "hvals" | "hlen"
        | "hexists" | "hstrlen" | "hrandfield" | "hscan" | "lrange" | "lindex" | "llen"
        | "lpos" | "smembers" | "sismember" | "smismember" | "scard" | "srandmember" | "sscan"
        | "sinter" | "sintercard" | "sunion" | "sdiff" | "zrange" | "zrangebyscore"
        | "zrangebylex" | "zrevrange" | "zrevrangebyscore" | "zrevrangebylex" | "zscore"
        | "zmscore" | "zrank" | "zrevrank" | "zcard" | "zcount" | "zlexcount" | "zscan"
        | "zrandmember" | "zinter" | "zunion" | "zdiff" | "zintercard" | "exists" | "type"
        | "ttl" | "pttl" | "expiretime" | "pexpiretime" | "scan" | "keys" | "randomkey"
        | "dump" | "object" | "sort_ro" | "touch" | "pfcount" | "geopos" | "geodist"
        | "geohash" | "georadius_ro" | "georadiusbymember_ro" | "geosearch" | "xrange"
        | "xrevrange" | "xlen" | "xread" | "xinfo" | "xpending" | "eval_ro" | "evalsha_ro"
        | "fcall_ro" => Access::Read,

        "set" | "setex" | "psetex" | "setnx" | "mset" | "msetnx" | "append" | "incr"
        | "incrby" | "incrbyfloat" | "decr" | "decrby" | "getset" | "getdel" | "getex"
        | "setrange" | "setbit" | "bitop" | "bitfield" | "hset" | "hsetnx" | "hmset" | "hdel"
        | "hincrby" | "hincrbyfloat" | "lpush" | "rpush" | "lpushx" | "rpushx" | "lpop"
        | "rpop" | "lset" | "linsert" | "lrem" | "ltrim" | "rpoplpush" | "lmove" | "lmpop"
        | "blpop" | "brpop" | "blmove" | "brpoplpush" | "blmpop" | "sadd" | "srem" | "spop"
        | "smove" | "sinterstore" | "sunionstore" | "sdiffstore" | "zadd" | "zincrby"
        | "zrem" | "zremrangebyscore" | "zremrangebyrank" | "zremrangebylex" | "zpopmin"
        | "zpopmax" | "bzpopmin" | "bzpopmax" | "zmpop" | "bzmpop" | "zunionstore"
        | "zinterstore" | "zdiffstore" | "zrangestore" | "del" | "unlink" | "expire"
        | "pexpire" | "expireat" | "pexpireat" | "persist" | "rename" | "renamenx"
        | "restore" | "move" | "copy" | "sort" | "pfadd" | "pfmerge" | "geoadd" | "georadius"
        | "georadiusbymember" | "geosearchstore" | "xadd" | "xdel" | "xtrim" | "xgroup"
        | "xack" | "xclaim" | "xautoclaim" | "xreadgroup" | "xsetid" | "flushdb"
        | "flushall" => Access::Write,

        _ => Access::Other,
    }
}

/// Data-type group of a command, if it belongs to one.
pub fn data_type(cmd: &str) -> Option<CommandCategory> {
    let category = match cmd {
        "setbit" | "getbit" | "bitcount" | "bitpos" | "bitop" | "bitfield" | "bitfield_ro" => {
            CommandCategory::Bitmap
        }
        "cluster" | "readonly" | "readwrite" | "asking" => CommandCategory::Cluster,
        "eval" | "evalsha" | "eval_ro" | "evalsha_ro" | "script" | "fcall" | "fcall_ro"
        | "function" => CommandCategory::Eval,
        "geoadd" | "geodist" | "geohash" | "geopos" | "georadius" | "georadius_ro"
        | "georadiusbymember" | "georadiusbymember_ro" | "geosearch" | "geosearchstore" => {
            CommandCategory::GeoSpatial
        }
        "pfadd" | "pfcount" | "pfmerge" | "pfdebug" | "pfselftest" => CommandCategory::HyperLogLog,
        "del" | "unlink" | "exists" | "expire" | "pexpire" | "expireat" | "pexpireat"
        | "expiretime" | "pexpiretime" | "persist" | "ttl" | "pttl" | "type" | "keys"
        | "scan" | "randomkey" | "rename" | "renamenx" | "dump" | "restore" | "move"
        | "copy" | "object" | "sort" | "sort_ro" | "touch" | "wait" | "migrate" => {
            CommandCategory::Key
        }
        "lpush" | "rpush" | "lpushx" | "rpushx" | "lpop" | "rpop" | "lrange" | "lindex"
        | "llen" | "lpos" | "lset" | "linsert" | "lrem" | "ltrim" | "rpoplpush" | "lmove"
        | "lmpop" | "blpop" | "brpop" | "blmove" | "brpoplpush" | "blmpop" => {
            CommandCategory::List
        }
        "publish" | "subscribe" | "unsubscribe" | "psubscribe" | "punsubscribe" | "pubsub"
        | "spublish" | "ssubscribe" | "sunsubscribe" => CommandCategory::PubSub,
        "sadd" | "srem" | "spop" | "smove" | "smembers" | "sismember" | "smismember"
        | "scard" | "srandmember" | "sscan" | "sinter" | "sintercard" | "sinterstore"
        | "sunion" | "sunionstore" | "sdiff" | "sdiffstore" => CommandCategory::Set,
        "get" | "set" | "setex" | "psetex" | "setnx" | "mget" | "mset" | "msetnx" | "append"
        | "incr" | "incrby" | "incrbyfloat" | "decr" | "decrby" | "getset" | "getdel"
        | "getex" | "getrange" | "setrange" | "substr" | "strlen" | "lcs" => {
            CommandCategory::String
        }
        "multi" | "exec" | "discard" | "watch" | "unwatch" => CommandCategory::Transaction,
        c if c.starts_with('h') && is_hash(c) => CommandCategory::Hash,
        c if (c.starts_with('z') || c.starts_with("bz")) && is_sorted_set(c) => {
            CommandCategory::SortedSet
        }
        c if c.starts_with('x') && is_stream(c) => CommandCategory::Stream,
        _ => return None,
    };
    Some(category)
}

fn is_hash(cmd: &str) -> bool {
    matches!(
        cmd,
        "hset"
            | "hsetnx"
            | "hmset"
            | "hget"
            | "hmget"
            | "hgetall"
            | "hdel"
            | "hexists"
            | "hincrby"
            | "hincrbyfloat"
            | "hkeys"
            | "hvals"
            | "hlen"
            | "hstrlen"
            | "hrandfield"
            | "hscan"
    )
}

fn is_sorted_set(cmd: &str) -> bool {
    matches!(
        cmd,
        "zadd"
            | "zincrby"
            | "zrem"
            | "zremrangebyscore"
            | "zremrangebyrank"
            | "zremrangebylex"
            | "zrange"
            | "zrangebyscore"
            | "zrangebylex"
            | "zrevrange"
            | "zrevrangebyscore"
            | "zrevrangebylex"
            | "zrangestore"
            | "zscore"
            | "zmscore"
            | "zrank"
            | "zrevrank"
            | "zcard"
            | "zcount"
            | "zlexcount"
            | "zscan"
            | "zrandmember"
            | "zpopmin"
            | "zpopmax"
            | "bzpopmin"
            | "bzpopmax"
            | "zmpop"
            | "bzmpop"
            | "zunion"
            | "zunionstore"
            | "zinter"
            | "zinterstore"
            | "zintercard"
            | "zdiff"
            | "zdiffstore"
    )
}

fn is_stream(cmd: &str) -> bool {
    matches!(
        cmd,
        "xadd"
            | "xdel"
            | "xtrim"
            | "xlen"
            | "xrange"
            | "xrevrange"
            | "xread"
            | "xreadgroup"
            | "xgroup"
            | "xack"
            | "xclaim"
            | "xautoclaim"
            | "xpending"
            | "xinfo"
            | "xsetid"
    )
}

/// Categorizes one timestamp's per-command values. Every category is present (zero if unused).
/// Unknown commands count toward throughput and OtherTypeCmds only.
pub fn process_metric_point(commands: &BTreeMap<String, f64>) -> CommandStats {
    let mut stats = CommandStats::new();
    for (name, value) in commands {
        let cmd = name.to_ascii_lowercase();
        stats.add(CommandCategory::Throughput, *value);
        let access_category = match access(&cmd) {
            Access::Read => CommandCategory::GetType,
            Access::Write => CommandCategory::SetType,
            Access::Other => CommandCategory::OtherType,
        };
        stats.add(access_category, *value);
        if let Some(category) = data_type(&cmd) {
            stats.add(category, *value);
        }
    }
    stats
}

/// Per-category maximum over a set of processed points (timestamps or nodes).
pub fn process_node_stats<'a, K: 'a>(
    processed: impl IntoIterator<Item = (&'a K, &'a CommandStats)>,
) -> CommandStats {
    let mut out = CommandStats::new();
    for (_, stats) in processed {
        out.max_with(stats);
    }
    out
}

/// Sum of the named commands (missing names count as zero).
pub fn command_total(commands: &BTreeMap<String, f64>, names: &[&str]) -> f64 {
    names
        .iter()
        .filter_map(|name| commands.get(*name))
        .sum()
}

pub fn all_commands_total(commands: &BTreeMap<String, f64>) -> f64 {
    commands.values().sum()
}
