//! Transitive glyph closure over composite references and substitutions.
//!
//! Starting from the glyphs the target characters map to, the closure adds
//! every composite component (recursively) and every glyph a substitution
//! rule can produce, until a fixed point is reached.

use std::collections::{BTreeSet, HashMap, VecDeque};

use log::{debug, warn};
use read_fonts::{
    TableProvider,
    tables::{
        glyf::{Glyf, Glyph},
        loca::Loca,
    },
    types,
};

use crate::{
    directory::SourceFont,
    error::{Result, SubsetError},
    options::{ClosurePolicy, DEFAULT_COMPOSITE_DEPTH_LIMIT},
    rules::SubstitutionRule,
    types::GlyphId,
};

/// Immutable sorted set of glyphs kept in the subset. Always holds `.notdef`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetainedSet(BTreeSet<GlyphId>);

impl RetainedSet {
    pub fn contains(&self, gid: GlyphId) -> bool {
        self.0.contains(&gid)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = GlyphId> + '_ {
        self.0.iter().copied()
    }
}

impl Default for RetainedSet {
    fn default() -> Self {
        Self(BTreeSet::from([GlyphId::NOTDEF]))
    }
}

impl FromIterator<GlyphId> for RetainedSet {
    fn from_iter<I: IntoIterator<Item = GlyphId>>(iter: I) -> Self {
        let mut set = Self::default();
        set.0.extend(iter);
        set
    }
}

/// Anything that can answer "which glyphs does this composite reference?".
pub trait CompositeSource {
    /// Direct components of `gid`; empty for simple and empty glyphs.
    fn components(&self, gid: GlyphId) -> Result<Vec<GlyphId>>;
}

/// Composite references read from `glyf`/`loca`.
pub struct GlyfSource<'a> {
    glyf: Glyf<'a>,
    loca: Loca<'a>,
    num_glyphs: u16,
}

impl<'a> GlyfSource<'a> {
    pub fn new(font: &SourceFont<'a>) -> Result<Self> {
        Ok(Self {
            glyf: font.glyf()?,
            loca: font.loca(None)?,
            num_glyphs: font.num_glyphs(),
        })
    }
}

impl CompositeSource for GlyfSource<'_> {
    fn components(&self, gid: GlyphId) -> Result<Vec<GlyphId>> {
        let glyph = self
            .loca
            .get_glyf(types::GlyphId::new(gid.to_u32()), &self.glyf)
            .map_err(|e| SubsetError::malformed(format!("{gid}: {e}")))?;
        let Some(Glyph::Composite(composite)) = glyph else {
            return Ok(Vec::new());
        };
        composite
            .components()
            .map(|component| {
                let child = GlyphId::from(component.glyph);
                if child.to_u16() >= self.num_glyphs {
                    return Err(SubsetError::malformed(format!(
                        "{gid} references component {child} beyond glyph count {}",
                        self.num_glyphs
                    )));
                }
                Ok(child)
            })
            .collect()
    }
}

impl CompositeSource for HashMap<GlyphId, Vec<GlyphId>> {
    fn components(&self, gid: GlyphId) -> Result<Vec<GlyphId>> {
        Ok(self.get(&gid).cloned().unwrap_or_default())
    }
}

/// Computes the retained glyph set for a font.
pub struct ClosureComputer<'a, S> {
    source: &'a S,
    rules: Vec<&'a SubstitutionRule>,
    policy: ClosurePolicy,
    depth_limit: u16,
}

impl<'a, S: CompositeSource> ClosureComputer<'a, S> {
    pub fn new(source: &'a S) -> Self {
        Self {
            source,
            rules: Vec::new(),
            policy: ClosurePolicy::default(),
            depth_limit: DEFAULT_COMPOSITE_DEPTH_LIMIT,
        }
    }

    /// Substitution rules to close over. Rules mentioning glyphs at or past
    /// `num_glyphs` are ignored.
    pub fn rules(mut self, rules: &'a [SubstitutionRule], num_glyphs: u16) -> Self {
        self.rules = rules
            .iter()
            .filter(|rule| match rule.max_glyph() {
                Some(max) if max.to_u16() >= num_glyphs => {
                    warn!(
                        "ignoring substitution {:?} -> {:?}: {} is beyond glyph count {}",
                        rule.input, rule.output, max, num_glyphs
                    );
                    false
                }
                _ => !rule.input.is_empty(),
            })
            .collect();
        self
    }

    pub fn policy(mut self, policy: ClosurePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn depth_limit(mut self, limit: u16) -> Self {
        self.depth_limit = limit;
        self
    }

    /// Runs the closure to its fixed point. `.notdef` is always included.
    pub fn compute(&self, seeds: impl IntoIterator<Item = GlyphId>) -> Result<RetainedSet> {
        let mut retained = BTreeSet::from([GlyphId::NOTDEF]);
        let mut queue: VecDeque<GlyphId> = VecDeque::from([GlyphId::NOTDEF]);
        for gid in seeds {
            if retained.insert(gid) {
                queue.push_back(gid);
            }
        }

        let mut heights: HashMap<GlyphId, u16> = HashMap::new();
        let mut fired = vec![false; self.rules.len()];
        let mut rounds = 0usize;

        loop {
            while let Some(gid) = queue.pop_front() {
                self.check_nesting(gid, &mut Vec::new(), &mut heights)?;
                for child in self.source.components(gid)? {
                    if retained.insert(child) {
                        queue.push_back(child);
                    }
                }
            }

            rounds += 1;
            for (rule, done) in self.rules.iter().zip(fired.iter_mut()) {
                if *done || !self.fires(rule, &retained) {
                    continue;
                }
                *done = true;
                for out in &rule.output {
                    if retained.insert(*out) {
                        queue.push_back(*out);
                    }
                }
            }

            if queue.is_empty() {
                break;
            }
        }

        debug!(
            "closure reached a fixed point after {} rounds with {} glyphs",
            rounds,
            retained.len()
        );
        Ok(RetainedSet(retained))
    }

    fn fires(&self, rule: &SubstitutionRule, retained: &BTreeSet<GlyphId>) -> bool {
        match self.policy {
            ClosurePolicy::Strict => rule.input.iter().all(|g| retained.contains(g)),
            ClosurePolicy::Permissive => rule.input.iter().any(|g| retained.contains(g)),
        }
    }

    /// Composite nesting height below `gid`, memoized. `path` holds the
    /// composites currently being expanded.
    fn check_nesting(
        &self,
        gid: GlyphId,
        path: &mut Vec<GlyphId>,
        heights: &mut HashMap<GlyphId, u16>,
    ) -> Result<u16> {
        if let Some(height) = heights.get(&gid) {
            return Ok(*height);
        }
        if path.contains(&gid) {
            return Err(SubsetError::CompositeCycle { glyph: gid });
        }
        let components = self.source.components(gid)?;
        if components.is_empty() {
            heights.insert(gid, 0);
            return Ok(0);
        }
        if path.len() >= self.depth_limit as usize {
            return Err(SubsetError::CompositeDepthExceeded {
                glyph: path.first().copied().unwrap_or(gid),
                limit: self.depth_limit,
            });
        }

        path.push(gid);
        let mut height = 0;
        for child in components {
            height = height.max(self.check_nesting(child, path, heights)?);
        }
        path.pop();

        let height = height + 1;
        if path.len() + height as usize > self.depth_limit as usize {
            return Err(SubsetError::CompositeDepthExceeded {
                glyph: path.first().copied().unwrap_or(gid),
                limit: self.depth_limit,
            });
        }
        heights.insert(gid, height);
        Ok(height)
    }
}
