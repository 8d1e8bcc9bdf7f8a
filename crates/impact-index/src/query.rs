use std::collections::HashMap;
use std::time::{Duration, Instant};

use impact_config::QueryConfig;
use impact_core::binary_name;
use impact_storage::OrderedKv;
use serde::Serialize;

use crate::error::Result;
use crate::schema::{field_prefix, HierarchyRecord, MethodRefRecord, Partition};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryOptions {
    /// Deepest ancestor chain that is expanded; parents beyond it are not
    /// looked up.
    pub max_depth: usize,
    /// Hierarchy lookups allowed for one resolution.
    pub max_visited_classes: usize,
}

impl Default for QueryOptions {
    fn default() -> Self {
        QueryConfig::default().into()
    }
}

impl From<QueryConfig> for QueryOptions {
    fn from(config: QueryConfig) -> Self {
        Self {
            max_depth: config.max_depth,
            max_visited_classes: config.max_visited_classes,
        }
    }
}

/// Outcome of one "is `class` `ancestor` or a descendant of it" check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Descendant,
    Unrelated,
    /// A work limit was hit before a path to the ancestor was found.
    BudgetExhausted,
}

impl Resolution {
    pub fn is_descendant(self) -> bool {
        self == Resolution::Descendant
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Visit {
    Visiting,
    Resolved(bool),
}

struct Frame {
    class: String,
    parents: Vec<String>,
    next: usize,
    /// Some ancestor path through this class was cut by `max_depth`.
    depth_cut: bool,
}

impl Frame {
    fn new(class: String, parents: Vec<String>) -> Self {
        Self {
            class,
            parents,
            next: 0,
            depth_cut: false,
        }
    }
}

/// Ancestor search over the `hierarchy` partition.
///
/// A depth-first walk with an explicit stack and a three-state memo. A parent
/// that is still being visited counts as "not an ancestor" for that edge, so
/// cycles in the recorded hierarchy terminate. A class whose search was cut
/// by `max_depth` is not memoized, so a shorter path reaching it later is
/// still explored. The memo lives for one resolution only.
pub struct SubtypeResolver<'s, S: OrderedKv + ?Sized> {
    store: &'s S,
    options: QueryOptions,
}

impl<'s, S: OrderedKv + ?Sized> Clone for SubtypeResolver<'s, S> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<'s, S: OrderedKv + ?Sized> Copy for SubtypeResolver<'s, S> {}

impl<'s, S: OrderedKv + ?Sized> SubtypeResolver<'s, S> {
    pub fn new(store: &'s S, options: QueryOptions) -> Self {
        Self { store, options }
    }

    /// Distinct direct supertypes of `class` across every archive that
    /// defines it, superclasses first.
    pub fn parents_of(&self, class: &str) -> Result<Vec<String>> {
        let mut parents: Vec<String> = Vec::new();
        for record in records_for(self.store, class)? {
            for parent in record.parents() {
                if !parents.iter().any(|p| p == parent) {
                    parents.push(parent.to_owned());
                }
            }
        }
        Ok(parents)
    }

    pub fn resolve(&self, ancestor: &str, class: &str) -> Result<Resolution> {
        if class == ancestor {
            return Ok(Resolution::Descendant);
        }

        let mut memo: HashMap<String, Visit> = HashMap::new();
        memo.insert(ancestor.to_owned(), Visit::Resolved(true));

        let mut lookups = 1usize;
        let parents = self.parents_of(class)?;
        if parents.iter().any(|p| p == ancestor) {
            return Ok(Resolution::Descendant);
        }
        memo.insert(class.to_owned(), Visit::Visiting);
        let mut stack = vec![Frame::new(class.to_owned(), parents)];
        let mut depth_limited = false;

        while let Some(top) = stack.last_mut() {
            let Some(parent) = top.parents.get(top.next).cloned() else {
                let Some(done) = stack.pop() else { break };
                if done.depth_cut {
                    memo.remove(&done.class);
                    if let Some(child) = stack.last_mut() {
                        child.depth_cut = true;
                    }
                } else {
                    memo.insert(done.class, Visit::Resolved(false));
                }
                continue;
            };
            top.next += 1;

            match memo.get(&parent) {
                Some(Visit::Resolved(true)) => return Ok(Resolution::Descendant),
                Some(Visit::Resolved(false)) | Some(Visit::Visiting) => continue,
                None => {}
            }

            if stack.len() >= self.options.max_depth {
                if let Some(top) = stack.last_mut() {
                    top.depth_cut = true;
                }
                depth_limited = true;
                continue;
            }
            if lookups >= self.options.max_visited_classes {
                tracing::debug!(
                    target: "impact.query",
                    ancestor,
                    class,
                    lookups,
                    "visited-class budget exhausted"
                );
                return Ok(Resolution::BudgetExhausted);
            }
            lookups += 1;

            let grand_parents = self.parents_of(&parent)?;
            if grand_parents.iter().any(|p| p == ancestor) {
                return Ok(Resolution::Descendant);
            }
            memo.insert(parent.clone(), Visit::Visiting);
            stack.push(Frame::new(parent, grand_parents));
        }

        if depth_limited {
            tracing::debug!(target: "impact.query", ancestor, class, "depth limit reached");
            return Ok(Resolution::BudgetExhausted);
        }
        Ok(Resolution::Unrelated)
    }
}

fn records_for<S: OrderedKv + ?Sized>(store: &S, class: &str) -> Result<Vec<HierarchyRecord>> {
    let prefix = field_prefix(class);
    store
        .scan(Partition::Hierarchy.name(), &prefix)?
        .map(|(key, value)| HierarchyRecord::decode(key, value))
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QuerySummary {
    /// Call sites whose method name matched.
    pub scanned: usize,
    /// Call sites whose target is the queried class or a descendant.
    pub matched: usize,
    /// Call sites dropped because a work limit was hit.
    pub budget_exhausted: usize,
    #[serde(rename = "elapsed_ms", serialize_with = "crate::serialize_millis")]
    pub elapsed: Duration,
}

/// Read-only queries against a built index.
pub struct QueryEngine<'s, S: OrderedKv + ?Sized> {
    store: &'s S,
    options: QueryOptions,
}

impl<'s, S: OrderedKv + ?Sized> QueryEngine<'s, S> {
    pub fn new(store: &'s S, options: QueryOptions) -> Self {
        Self { store, options }
    }

    pub fn resolver(&self) -> SubtypeResolver<'s, S> {
        SubtypeResolver::new(self.store, self.options)
    }

    /// Call sites of `method_name` whose static target is `class_name` or one
    /// of its descendants, in store key order. Class names may be given in
    /// internal or binary form.
    pub fn query(&self, class_name: &str, method_name: &str) -> Result<CallSites<'s, S>> {
        let class_name = binary_name(class_name).into_owned();
        tracing::debug!(
            target: "impact.query",
            class = %class_name,
            method = method_name,
            "query"
        );
        let prefix = field_prefix(method_name);
        let entries = self.store.scan(Partition::MethodRefs.name(), &prefix)?;
        Ok(CallSites {
            entries,
            resolver: self.resolver(),
            ancestor: class_name,
            targets: HashMap::new(),
            summary: QuerySummary::default(),
            started: Instant::now(),
            done: false,
        })
    }

    /// Every hierarchy record stored for `class_name`, one per archive.
    pub fn find_class(&self, class_name: &str) -> Result<Vec<HierarchyRecord>> {
        records_for(self.store, &binary_name(class_name))
    }
}

/// Lazily resolved query results. Each distinct target class is resolved
/// once per query.
pub struct CallSites<'s, S: OrderedKv + ?Sized> {
    entries: Box<dyn Iterator<Item = (&'s [u8], &'s [u8])> + 's>,
    resolver: SubtypeResolver<'s, S>,
    ancestor: String,
    targets: HashMap<String, Resolution>,
    summary: QuerySummary,
    started: Instant,
    done: bool,
}

impl<S: OrderedKv + ?Sized> CallSites<'_, S> {
    /// Counters so far; final once the iterator is exhausted.
    pub fn summary(&self) -> QuerySummary {
        let mut summary = self.summary.clone();
        summary.elapsed = self.started.elapsed();
        summary
    }

    fn resolve_target(&mut self, target: &str) -> Result<Resolution> {
        if let Some(resolution) = self.targets.get(target) {
            return Ok(*resolution);
        }
        let resolution = self.resolver.resolve(&self.ancestor, target)?;
        tracing::trace!(
            target: "impact.query",
            ancestor = %self.ancestor,
            class = target,
            ?resolution,
            "resolved target"
        );
        self.targets.insert(target.to_owned(), resolution);
        Ok(resolution)
    }
}

impl<S: OrderedKv + ?Sized> Iterator for CallSites<'_, S> {
    type Item = Result<MethodRefRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        loop {
            let Some((key, _)) = self.entries.next() else {
                self.done = true;
                tracing::debug!(
                    target: "impact.query",
                    scanned = self.summary.scanned,
                    matched = self.summary.matched,
                    budget_exhausted = self.summary.budget_exhausted,
                    "query finished"
                );
                return None;
            };
            self.summary.scanned += 1;

            let resolved = MethodRefRecord::from_key(key).and_then(|record| {
                let resolution = self.resolve_target(&record.target_class)?;
                Ok((record, resolution))
            });
            match resolved {
                Ok((record, Resolution::Descendant)) => {
                    self.summary.matched += 1;
                    return Some(Ok(record));
                }
                Ok((_, Resolution::Unrelated)) => {}
                Ok((_, Resolution::BudgetExhausted)) => self.summary.budget_exhausted += 1,
                Err(err) => {
                    self.done = true;
                    return Some(Err(err));
                }
            }
        }
    }
}
