// reflection_hints.rs — the slice of a ReflectionHints document WriteGate
// is allowed to see: a human-readable summary and a digest to record on
// the decision. WriteGate takes this by reference rather than depending on
// the lc-reflection crate directly, keeping the dependency edge one-way
// (lc-reflection depends on lc-policy's types, not the other way around).

#[derive(Debug, Clone)]
pub struct ReflectionHintsRef {
    pub summary: String,
    pub digest: String,
}
