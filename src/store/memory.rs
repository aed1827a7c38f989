//! In-memory store
//!
//! Reference implementation of the store protocol, used by the test
//! suites and as executable documentation of the script semantics. One
//! mutex over the whole keyspace gives exactly the per-instance
//! atomicity the protocol demands of script execution; the three
//! mutation programs run natively under that lock with effects
//! matching their Lua sources.
//!
//! Expiration is lazy: any access to a key past its deadline observes
//! it as absent and evicts it.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::scripts::{MutationArgs, ScriptName};

use super::errors::{StoreError, StoreResult};
use super::{ScoreBound, ScriptHandle, ScriptReply, Store};

/// An in-memory store instance
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Keyspace>,
}

#[derive(Debug, Default)]
struct Keyspace {
    entries: HashMap<String, Entry>,
    scripts: HashMap<String, ScriptName>,
}

#[derive(Debug)]
struct Entry {
    value: Value,
    expires_at: Option<Instant>,
}

impl Entry {
    fn new(value: Value) -> Self {
        Self {
            value,
            expires_at: None,
        }
    }

    fn expired(&self) -> bool {
        self.expires_at.is_some_and(|deadline| deadline <= Instant::now())
    }
}

#[derive(Debug)]
enum Value {
    Str(String),
    Hash(HashMap<String, String>),
    Set(HashSet<String>),
    SortedSet(HashMap<String, f64>),
}

impl Value {
    fn kind(&self) -> &'static str {
        match self {
            Value::Str(_) => "string",
            Value::Hash(_) => "hash",
            Value::Set(_) => "set",
            Value::SortedSet(_) => "sorted-set",
        }
    }
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Keyspace> {
        // Poisoning only means a panic elsewhere; the keyspace itself
        // is still structurally valid.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Keyspace {
    /// Live entry for a key, evicting it first if it has expired
    fn live(&mut self, key: &str) -> Option<&mut Entry> {
        if self.entries.get(key).is_some_and(Entry::expired) {
            self.entries.remove(key);
        }
        self.entries.get_mut(key)
    }

    fn exists(&mut self, key: &str) -> bool {
        self.live(key).is_some()
    }

    fn str_value(&mut self, key: &str) -> StoreResult<Option<&str>> {
        match self.live(key) {
            None => Ok(None),
            Some(entry) => match &entry.value {
                Value::Str(s) => Ok(Some(s.as_str())),
                other => Err(wrong_type(key, "string", other.kind())),
            },
        }
    }

    fn hash_value(&mut self, key: &str) -> StoreResult<Option<&mut HashMap<String, String>>> {
        match self.live(key) {
            None => Ok(None),
            Some(entry) => match &mut entry.value {
                Value::Hash(h) => Ok(Some(h)),
                other => Err(wrong_type(key, "hash", other.kind())),
            },
        }
    }

    fn set_value(&mut self, key: &str) -> StoreResult<Option<&mut HashSet<String>>> {
        match self.live(key) {
            None => Ok(None),
            Some(entry) => match &mut entry.value {
                Value::Set(s) => Ok(Some(s)),
                other => Err(wrong_type(key, "set", other.kind())),
            },
        }
    }

    fn sorted_set_value(&mut self, key: &str) -> StoreResult<Option<&mut HashMap<String, f64>>> {
        match self.live(key) {
            None => Ok(None),
            Some(entry) => match &mut entry.value {
                Value::SortedSet(z) => Ok(Some(z)),
                other => Err(wrong_type(key, "sorted-set", other.kind())),
            },
        }
    }

    fn hset(&mut self, key: &str, field: &str, value: &str) -> StoreResult<()> {
        match self.live(key) {
            None => {
                let mut fields = HashMap::new();
                fields.insert(field.to_string(), value.to_string());
                self.entries
                    .insert(key.to_string(), Entry::new(Value::Hash(fields)));
            }
            Some(entry) => match &mut entry.value {
                Value::Hash(h) => {
                    h.insert(field.to_string(), value.to_string());
                }
                other => return Err(wrong_type(key, "hash", other.kind())),
            },
        }
        Ok(())
    }

    fn sadd(&mut self, key: &str, member: &str) -> StoreResult<bool> {
        match self.set_value(key)? {
            Some(set) => Ok(set.insert(member.to_string())),
            None => {
                let mut set = HashSet::new();
                set.insert(member.to_string());
                self.entries
                    .insert(key.to_string(), Entry::new(Value::Set(set)));
                Ok(true)
            }
        }
    }

    /// Set removal with the protocol's empty-collection cleanup
    fn srem(&mut self, key: &str, member: &str) -> StoreResult<bool> {
        let Some(set) = self.set_value(key)? else {
            return Ok(false);
        };
        let removed = set.remove(member);
        if set.is_empty() {
            self.entries.remove(key);
        }
        Ok(removed)
    }

    fn zadd(&mut self, key: &str, member: &str, score: f64) -> StoreResult<bool> {
        match self.sorted_set_value(key)? {
            Some(z) => Ok(z.insert(member.to_string(), score).is_none()),
            None => {
                let mut z = HashMap::new();
                z.insert(member.to_string(), score);
                self.entries
                    .insert(key.to_string(), Entry::new(Value::SortedSet(z)));
                Ok(true)
            }
        }
    }

    fn zrem(&mut self, key: &str, member: &str) -> StoreResult<bool> {
        let Some(z) = self.sorted_set_value(key)? else {
            return Ok(false);
        };
        let removed = z.remove(member).is_some();
        if z.is_empty() {
            self.entries.remove(key);
        }
        Ok(removed)
    }

    fn expire_in(&mut self, key: &str, seconds: u64) -> bool {
        match self.live(key) {
            Some(entry) => {
                entry.expires_at = Some(Instant::now() + Duration::from_secs(seconds));
                true
            }
            None => false,
        }
    }

    fn persist(&mut self, key: &str) -> bool {
        match self.live(key) {
            Some(entry) => entry.expires_at.take().is_some(),
            None => false,
        }
    }

    // ------------------------------------------------------------------
    // Mutation programs (native form of the Lua sources)
    // ------------------------------------------------------------------

    fn run_program(&mut self, program: ScriptName, args: &[String]) -> StoreResult<ScriptReply> {
        let decoded = MutationArgs::decode(args)
            .map_err(|e| StoreError::script(program.name(), e.to_string()))?;
        match program {
            ScriptName::CreateRecord => self.create_record(&decoded),
            ScriptName::UpdateRecord => self.update_record(&decoded),
            ScriptName::DeleteRecord => self.delete_record(&decoded),
        }
    }

    fn create_record(&mut self, args: &MutationArgs) -> StoreResult<ScriptReply> {
        let key = crate::keys::record_key_raw(&args.model, &args.id);
        if self.exists(&key) {
            return Err(StoreError::script(
                ScriptName::CreateRecord.name(),
                format!("live record collision on {}", key),
            ));
        }

        for (name, value) in &args.fields {
            self.hset(&key, name, value)?;
            if args.exact_attrs.iter().any(|a| a == name) {
                let index_key = crate::keys::exact_index_key(&args.model, name, value);
                self.sadd(&index_key, &args.id)?;
            } else if args.range_attrs.iter().any(|a| a == name) {
                let score = parse_score(ScriptName::CreateRecord, name, value)?;
                let index_key = crate::keys::range_index_key(&args.model, name);
                self.zadd(&index_key, &args.id, score)?;
            }
        }

        if let Some(seconds) = self.model_ttl(&args.model)? {
            self.expire_in(&key, seconds);
        }
        Ok(ScriptReply::Str(args.id.clone()))
    }

    fn update_record(&mut self, args: &MutationArgs) -> StoreResult<ScriptReply> {
        let key = crate::keys::record_key_raw(&args.model, &args.id);
        if !self.exists(&key) {
            return Ok(ScriptReply::Int(0));
        }

        for (name, value) in &args.fields {
            if args.exact_attrs.iter().any(|a| a == name) {
                let old = self
                    .hash_value(&key)?
                    .and_then(|h| h.get(name).cloned());
                if old.as_deref() != Some(value.as_str()) {
                    if let Some(old) = old {
                        let old_key = crate::keys::exact_index_key(&args.model, name, &old);
                        self.srem(&old_key, &args.id)?;
                    }
                    let new_key = crate::keys::exact_index_key(&args.model, name, value);
                    self.sadd(&new_key, &args.id)?;
                }
            } else if args.range_attrs.iter().any(|a| a == name) {
                let score = parse_score(ScriptName::UpdateRecord, name, value)?;
                let index_key = crate::keys::range_index_key(&args.model, name);
                self.zadd(&index_key, &args.id, score)?;
            }
            self.hset(&key, name, value)?;
        }

        match self.model_ttl(&args.model)? {
            Some(seconds) => self.expire_in(&key, seconds),
            None => self.persist(&key),
        };
        Ok(ScriptReply::Int(1))
    }

    fn delete_record(&mut self, args: &MutationArgs) -> StoreResult<ScriptReply> {
        let key = crate::keys::record_key_raw(&args.model, &args.id);
        if !self.exists(&key) {
            return Ok(ScriptReply::Int(0));
        }

        for name in &args.exact_attrs {
            let old = self
                .hash_value(&key)?
                .and_then(|h| h.get(name).cloned());
            if let Some(old) = old {
                let index_key = crate::keys::exact_index_key(&args.model, name, &old);
                self.srem(&index_key, &args.id)?;
            }
        }
        for name in &args.range_attrs {
            let index_key = crate::keys::range_index_key(&args.model, name);
            self.zrem(&index_key, &args.id)?;
        }
        self.entries.remove(&key);
        Ok(ScriptReply::Int(1))
    }

    /// TTL the programs apply to record keys: positive seconds, or
    /// None for the no-expiration sentinel.
    fn model_ttl(&mut self, model: &str) -> StoreResult<Option<u64>> {
        let raw = self.str_value(&crate::keys::ttl_key(model))?.map(str::to_string);
        Ok(raw
            .and_then(|s| s.parse::<i64>().ok())
            .filter(|&s| s > 0)
            .map(|s| s as u64))
    }
}

fn wrong_type(key: &str, expected: &'static str, found: &'static str) -> StoreError {
    StoreError::WrongType {
        key: key.to_string(),
        expected,
        found,
    }
}

fn parse_score(program: ScriptName, attr: &str, value: &str) -> StoreResult<f64> {
    value.parse().map_err(|_| {
        StoreError::script(
            program.name(),
            format!("range attribute '{}' value '{}' is not numeric", attr, value),
        )
    })
}

#[async_trait]
impl Store for MemoryStore {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        self.lock().str_value(key).map(|v| v.map(str::to_string))
    }

    async fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        self.lock()
            .entries
            .insert(key.to_string(), Entry::new(Value::Str(value.to_string())));
        Ok(())
    }

    async fn del(&self, key: &str) -> StoreResult<bool> {
        let mut ks = self.lock();
        let existed = ks.exists(key);
        ks.entries.remove(key);
        Ok(existed)
    }

    async fn exists(&self, key: &str) -> StoreResult<bool> {
        Ok(self.lock().exists(key))
    }

    async fn hgetall(&self, key: &str) -> StoreResult<HashMap<String, String>> {
        Ok(self.lock().hash_value(key)?.cloned().unwrap_or_default())
    }

    async fn hmget(&self, key: &str, fields: &[String]) -> StoreResult<Vec<Option<String>>> {
        let mut ks = self.lock();
        let hash = ks.hash_value(key)?;
        Ok(fields
            .iter()
            .map(|f| hash.as_ref().and_then(|h| h.get(f).cloned()))
            .collect())
    }

    async fn sadd(&self, key: &str, member: &str) -> StoreResult<bool> {
        self.lock().sadd(key, member)
    }

    async fn srem(&self, key: &str, member: &str) -> StoreResult<bool> {
        self.lock().srem(key, member)
    }

    async fn smembers(&self, key: &str) -> StoreResult<Vec<String>> {
        Ok(self
            .lock()
            .set_value(key)?
            .map(|s| s.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn scard(&self, key: &str) -> StoreResult<usize> {
        Ok(self.lock().set_value(key)?.map_or(0, |s| s.len()))
    }

    async fn zadd(&self, key: &str, member: &str, score: f64) -> StoreResult<bool> {
        self.lock().zadd(key, member, score)
    }

    async fn zrem(&self, key: &str, member: &str) -> StoreResult<bool> {
        self.lock().zrem(key, member)
    }

    async fn zscore(&self, key: &str, member: &str) -> StoreResult<Option<f64>> {
        Ok(self
            .lock()
            .sorted_set_value(key)?
            .and_then(|z| z.get(member).copied()))
    }

    async fn zrangebyscore(
        &self,
        key: &str,
        min: ScoreBound,
        max: ScoreBound,
    ) -> StoreResult<Vec<String>> {
        let mut ks = self.lock();
        let Some(z) = ks.sorted_set_value(key)? else {
            return Ok(Vec::new());
        };
        let mut members: Vec<(String, f64)> = z
            .iter()
            .filter(|(_, &score)| min.admits_from_below(score) && max.admits_from_above(score))
            .map(|(m, &score)| (m.clone(), score))
            .collect();
        // Score order, member order as tie break, matching the
        // protocol's sorted-set semantics.
        members.sort_by(|a, b| {
            a.1.partial_cmp(&b.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        Ok(members.into_iter().map(|(m, _)| m).collect())
    }

    async fn zcount(&self, key: &str, min: ScoreBound, max: ScoreBound) -> StoreResult<usize> {
        let mut ks = self.lock();
        let Some(z) = ks.sorted_set_value(key)? else {
            return Ok(0);
        };
        Ok(z.values()
            .filter(|&&score| min.admits_from_below(score) && max.admits_from_above(score))
            .count())
    }

    async fn expire(&self, key: &str, seconds: u64) -> StoreResult<bool> {
        Ok(self.lock().expire_in(key, seconds))
    }

    async fn persist(&self, key: &str) -> StoreResult<bool> {
        Ok(self.lock().persist(key))
    }

    async fn ttl(&self, key: &str) -> StoreResult<i64> {
        let mut ks = self.lock();
        match ks.live(key) {
            None => Ok(-2),
            Some(entry) => match entry.expires_at {
                None => Ok(-1),
                Some(deadline) => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    Ok(remaining.as_secs_f64().ceil() as i64)
                }
            },
        }
    }

    async fn scan(
        &self,
        cursor: u64,
        pattern: &str,
        count: usize,
    ) -> StoreResult<(u64, Vec<String>)> {
        let mut ks = self.lock();

        // Evict lazily so the window math only sees live keys.
        let expired: Vec<String> = ks
            .entries
            .iter()
            .filter(|(_, e)| e.expired())
            .map(|(k, _)| k.clone())
            .collect();
        for key in expired {
            ks.entries.remove(&key);
        }

        let mut keys: Vec<&String> = ks.entries.keys().collect();
        keys.sort();

        let start = cursor as usize;
        let end = (start + count.max(1)).min(keys.len());
        let window: Vec<String> = keys[start.min(keys.len())..end]
            .iter()
            .filter(|k| glob_match(pattern, k))
            .map(|k| k.to_string())
            .collect();
        let next = if end >= keys.len() { 0 } else { end as u64 };
        Ok((next, window))
    }

    async fn script_load(&self, source: &str) -> StoreResult<ScriptHandle> {
        let program = ScriptName::all()
            .into_iter()
            .find(|p| p.source() == source)
            .ok_or_else(|| StoreError::script("load", "unrecognized program source"))?;
        let token = format!("memory:{}:v{}", program.name(), program.version());
        self.lock().scripts.insert(token.clone(), program);
        Ok(ScriptHandle::new(token))
    }

    async fn run_script(
        &self,
        handle: &ScriptHandle,
        _keys: &[String],
        args: &[String],
    ) -> StoreResult<ScriptReply> {
        let mut ks = self.lock();
        let program = *ks
            .scripts
            .get(handle.token())
            .ok_or_else(|| StoreError::script(handle.token(), "no such loaded program"))?;
        ks.run_program(program, args)
    }
}

/// Key pattern matching: `*` and `?`, the subset the key layout needs
fn glob_match(pattern: &str, text: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let t: Vec<char> = text.chars().collect();
    let (mut pi, mut ti) = (0usize, 0usize);
    let mut backtrack: Option<(usize, usize)> = None;

    while ti < t.len() {
        if pi < p.len() && (p[pi] == '?' || p[pi] == t[ti]) {
            pi += 1;
            ti += 1;
        } else if pi < p.len() && p[pi] == '*' {
            backtrack = Some((pi, ti));
            pi += 1;
        } else if let Some((star_pi, star_ti)) = backtrack {
            backtrack = Some((star_pi, star_ti + 1));
            pi = star_pi + 1;
            ti = star_ti + 1;
        } else {
            return false;
        }
    }
    while pi < p.len() && p[pi] == '*' {
        pi += 1;
    }
    pi == p.len()
}
