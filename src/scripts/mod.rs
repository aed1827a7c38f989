//! Atomic mutation scripts
//!
//! Record mutations must update the record hash and every affected
//! index entry as one indivisible step on one store instance. That
//! atomicity is delegated entirely to the store's server-side
//! scripting: each mutation is a named, versioned program loaded once
//! per connection and invoked by handle.
//!
//! The Lua sources here are the wire contract for Redis-compatible
//! deployments. The in-memory store executes the same programs
//! natively; both sides share the argument-vector codec in this
//! module, so the ARGV layout is defined in exactly one place:
//!
//! ```text
//! ARGV = [ model, id,
//!          n_exact, exact_attr...,
//!          n_range, range_attr...,
//!          n_fields, (name, value)... ]
//! ```
//!
//! Scripts derive every key they touch from `(model, id, attr, value)`,
//! so a single invocation never leaves its shard.

pub mod errors;

pub use errors::{ScriptArgsError, ScriptArgsResult};

/// The three mutation programs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScriptName {
    /// Write a new record hash and all of its index entries
    CreateRecord,
    /// Migrate changed fields and their index entries in place
    UpdateRecord,
    /// Remove a record hash and every index entry it appears in
    DeleteRecord,
}

impl ScriptName {
    /// Every program, in load order
    pub fn all() -> [ScriptName; 3] {
        [
            ScriptName::CreateRecord,
            ScriptName::UpdateRecord,
            ScriptName::DeleteRecord,
        ]
    }

    /// Stable program name, used in logs and memory-store handles
    pub fn name(&self) -> &'static str {
        match self {
            ScriptName::CreateRecord => "create-record",
            ScriptName::UpdateRecord => "update-record",
            ScriptName::DeleteRecord => "delete-record",
        }
    }

    /// Program version. Bump only with a coordinated deploy: the
    /// sources are a wire contract with existing deployments.
    pub fn version(&self) -> u32 {
        1
    }

    /// Lua source executed by Redis-compatible stores
    pub fn source(&self) -> &'static str {
        match self {
            ScriptName::CreateRecord => CREATE_RECORD_LUA,
            ScriptName::UpdateRecord => UPDATE_RECORD_LUA,
            ScriptName::DeleteRecord => DELETE_RECORD_LUA,
        }
    }
}

/// Decoded argument vector shared by all three programs.
///
/// `exact_attrs` and `range_attrs` always carry the model's full
/// index tables; `fields` carries only the fields being written and is
/// empty for delete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationArgs {
    pub model: String,
    pub id: String,
    pub exact_attrs: Vec<String>,
    pub range_attrs: Vec<String>,
    pub fields: Vec<(String, String)>,
}

impl MutationArgs {
    /// Encode into the ARGV layout
    pub fn encode(&self) -> Vec<String> {
        let mut argv = Vec::with_capacity(
            5 + self.exact_attrs.len() + self.range_attrs.len() + self.fields.len() * 2,
        );
        argv.push(self.model.clone());
        argv.push(self.id.clone());
        argv.push(self.exact_attrs.len().to_string());
        argv.extend(self.exact_attrs.iter().cloned());
        argv.push(self.range_attrs.len().to_string());
        argv.extend(self.range_attrs.iter().cloned());
        argv.push(self.fields.len().to_string());
        for (name, value) in &self.fields {
            argv.push(name.clone());
            argv.push(value.clone());
        }
        argv
    }

    /// Decode an ARGV vector
    pub fn decode(argv: &[String]) -> ScriptArgsResult<Self> {
        let mut cursor = ArgCursor::new(argv);
        let model = cursor.next()?.to_string();
        let id = cursor.next()?.to_string();
        let exact_attrs = cursor.next_list()?;
        let range_attrs = cursor.next_list()?;

        let n_fields = cursor.next_count()?;
        let mut fields = Vec::with_capacity(n_fields);
        for _ in 0..n_fields {
            let name = cursor.next()?.to_string();
            let value = cursor.next()?.to_string();
            fields.push((name, value));
        }
        cursor.finish()?;

        Ok(Self {
            model,
            id,
            exact_attrs,
            range_attrs,
            fields,
        })
    }
}

struct ArgCursor<'a> {
    argv: &'a [String],
    position: usize,
}

impl<'a> ArgCursor<'a> {
    fn new(argv: &'a [String]) -> Self {
        Self { argv, position: 0 }
    }

    fn next(&mut self) -> ScriptArgsResult<&'a str> {
        let arg = self
            .argv
            .get(self.position)
            .ok_or(ScriptArgsError::Truncated { at: self.position })?;
        self.position += 1;
        Ok(arg.as_str())
    }

    fn next_count(&mut self) -> ScriptArgsResult<usize> {
        let at = self.position;
        let raw = self.next()?;
        raw.parse().map_err(|_| ScriptArgsError::BadCount {
            at,
            value: raw.to_string(),
        })
    }

    fn next_list(&mut self) -> ScriptArgsResult<Vec<String>> {
        let n = self.next_count()?;
        let mut items = Vec::with_capacity(n);
        for _ in 0..n {
            items.push(self.next()?.to_string());
        }
        Ok(items)
    }

    fn finish(&self) -> ScriptArgsResult<()> {
        if self.position == self.argv.len() {
            Ok(())
        } else {
            Err(ScriptArgsError::Trailing {
                at: self.position,
                len: self.argv.len(),
            })
        }
    }
}

const CREATE_RECORD_LUA: &str = r#"
-- create-record v1
local model = ARGV[1]
local id = ARGV[2]
local i = 3
local exact = {}
local n = tonumber(ARGV[i]); i = i + 1
for _ = 1, n do exact[ARGV[i]] = true; i = i + 1 end
local range = {}
n = tonumber(ARGV[i]); i = i + 1
for _ = 1, n do range[ARGV[i]] = true; i = i + 1 end

local key = model .. ':id:' .. id
if redis.call('exists', key) == 1 then
  return redis.error_reply('live record collision on ' .. key)
end

n = tonumber(ARGV[i]); i = i + 1
for _ = 1, n do
  local name = ARGV[i]
  local value = ARGV[i + 1]
  i = i + 2
  redis.call('hset', key, name, value)
  if exact[name] then
    redis.call('sadd', model .. ':index:' .. name .. ':' .. value, id)
  elseif range[name] then
    redis.call('zadd', model .. ':index:' .. name, tonumber(value), id)
  end
end

local ttl = tonumber(redis.call('get', model .. ':ttl') or '-1')
if ttl and ttl > 0 then
  redis.call('expire', key, ttl)
end
return id
"#;

const UPDATE_RECORD_LUA: &str = r#"
-- update-record v1
local model = ARGV[1]
local id = ARGV[2]
local i = 3
local exact = {}
local n = tonumber(ARGV[i]); i = i + 1
for _ = 1, n do exact[ARGV[i]] = true; i = i + 1 end
local range = {}
n = tonumber(ARGV[i]); i = i + 1
for _ = 1, n do range[ARGV[i]] = true; i = i + 1 end

local key = model .. ':id:' .. id
if redis.call('exists', key) == 0 then
  return 0
end

n = tonumber(ARGV[i]); i = i + 1
for _ = 1, n do
  local name = ARGV[i]
  local value = ARGV[i + 1]
  i = i + 2
  if exact[name] then
    local old = redis.call('hget', key, name)
    if old ~= value then
      if old then
        redis.call('srem', model .. ':index:' .. name .. ':' .. old, id)
      end
      redis.call('sadd', model .. ':index:' .. name .. ':' .. value, id)
    end
  elseif range[name] then
    redis.call('zadd', model .. ':index:' .. name, tonumber(value), id)
  end
  redis.call('hset', key, name, value)
end

local ttl = tonumber(redis.call('get', model .. ':ttl') or '-1')
if ttl and ttl > 0 then
  redis.call('expire', key, ttl)
else
  redis.call('persist', key)
end
return 1
"#;

const DELETE_RECORD_LUA: &str = r#"
-- delete-record v1
local model = ARGV[1]
local id = ARGV[2]
local i = 3
local exact = {}
local n = tonumber(ARGV[i]); i = i + 1
for _ = 1, n do exact[ARGV[i]] = true; i = i + 1 end
local range = {}
n = tonumber(ARGV[i]); i = i + 1
for _ = 1, n do range[ARGV[i]] = true; i = i + 1 end

local key = model .. ':id:' .. id
if redis.call('exists', key) == 0 then
  return 0
end

for name in pairs(exact) do
  local old = redis.call('hget', key, name)
  if old then
    redis.call('srem', model .. ':index:' .. name .. ':' .. old, id)
  end
end
for name in pairs(range) do
  redis.call('zrem', model .. ':index:' .. name, id)
end
redis.call('del', key)
return 1
"#;
