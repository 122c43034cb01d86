use indexmap::IndexMap;

use crate::ir::Function;

/// Lowest and highest index of the jumps that target one label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JumpSpan {
    pub first: usize,
    pub last: usize,
}

impl JumpSpan {
    fn widen(&mut self, idx: usize) {
        self.first = self.first.min(idx);
        self.last = self.last.max(idx);
    }
}

/// Per-label jump spans, plus where each label sits.
#[derive(Debug)]
pub struct JumpRanges {
    spans: IndexMap<String, JumpSpan>,
    positions: IndexMap<String, usize>,
}

impl JumpRanges {
    pub fn new(func: &Function) -> Self {
        let mut spans: IndexMap<String, JumpSpan> = IndexMap::new();
        for (idx, inst) in func.insts.iter().enumerate() {
            let Some(target) = inst.jump_target() else {
                continue;
            };
            spans
                .entry(target.to_string())
                .and_modify(|span| span.widen(idx))
                .or_insert(JumpSpan {
                    first: idx,
                    last: idx,
                });
        }
        Self {
            spans,
            positions: func.label_positions(),
        }
    }

    pub fn span(&self, label: &str) -> Option<JumpSpan> {
        self.spans.get(label).copied()
    }

    /// Whether control can only reach `start + 1 ..= end` by falling through
    /// from `start`, or by jumps that themselves lie within `start..=end`.
    /// A label on `start` itself is fine: entering there re-runs the region.
    pub fn is_closed(&self, start: usize, end: usize) -> bool {
        self.positions
            .iter()
            .filter(|(_, pos)| **pos > start && **pos <= end)
            .all(|(label, _)| match self.spans.get(label) {
                Some(span) => span.first >= start && span.last <= end,
                None => true,
            })
    }
}
