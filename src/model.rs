//! The text range model - the immutable intermediate form of a parsed template
//!
//! A loaded template is a flat, ordered sequence of [`TextRange`]s (literal
//! spans and substitution sites) interleaved with a flat sequence of
//! [`Marker`]s delimiting directive regions. The flat-list encoding is what
//! makes loop re-iteration and loop-skip cheap index jumps at build time
//! instead of tree rewrites.

use std::sync::Arc;

use crate::accessor::FieldAccessor;
use crate::options::RemoveIfNullPolicy;

/// Byte range in source text
pub type Span = std::ops::Range<usize>;

/// One literal or substitution unit of template output.
///
/// The span indexes the original source buffer. When `indent` is recorded
/// the renderer re-applies it (plus the base indentation) as spaces; the
/// span itself excludes the leading whitespace. `substitution` indexes the
/// match-site table when this range must be resolved by a `REPLACE` value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextRange {
    pub span: Span,
    /// Leading indentation width of the physical line, recorded on the
    /// line's first range only
    pub indent: Option<usize>,
    /// Whether a line break follows this range
    pub newline: bool,
    /// Substitution-slot index when this range is a substitution site
    pub substitution: Option<usize>,
}

/// Captured match data for one substitution site
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchSite {
    /// The matched substring
    pub text: String,
    /// Capture groups of the match (index 0 is the first explicit group)
    pub groups: Vec<Option<String>>,
    /// Source location of the match
    pub span: Span,
    /// Whether the owning `REPLACE` directive carried `REMOVE_IF_NULL`
    pub removable: bool,
}

/// Typed payload of a begin marker
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Region {
    /// `REPLACE("pattern", $accessor [, REMOVE_IF_NULL])`
    Replace {
        accessor: FieldAccessor,
        removable: bool,
        /// Substitution slots registered to this region, in source order
        sites: Vec<usize>,
    },
    /// `FOREACH($var : $collection)`
    Foreach {
        var: String,
        collection: FieldAccessor,
    },
    /// `INSERT($accessor)`, with the directive line's own indentation
    Insert {
        accessor: FieldAccessor,
        indent: usize,
    },
}

impl std::fmt::Display for Region {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Region::Replace { accessor, .. } => write!(f, "REPLACE({})", accessor),
            Region::Foreach { var, collection } => {
                write!(f, "FOREACH(${} : {})", var, collection)
            }
            Region::Insert { accessor, .. } => write!(f, "INSERT({})", accessor),
        }
    }
}

/// Begin or end of a directive region
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkerKind {
    Begin(Region),
    End,
}

/// One entry of the region-marker sequence.
///
/// `range_index` and `slot_index` record how many ranges and substitution
/// slots precede this marker in source order; begin/end pairs are
/// stack-balanced by construction of the loader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Marker {
    pub kind: MarkerKind,
    pub range_index: usize,
    pub slot_index: usize,
}

#[derive(Debug)]
struct ModelData {
    source: String,
    ranges: Vec<TextRange>,
    markers: Vec<Marker>,
    sites: Vec<MatchSite>,
    /// `REMOVE_IF_NULL` policy captured from the load options, consulted by
    /// builder sessions when a removable site resolves to no value
    remove_if_null: RemoveIfNullPolicy,
}

/// An immutable, randomly-traversable parsed template.
///
/// Cloning is cheap (the model is shared); one loaded template can back any
/// number of independent builder sessions.
#[derive(Debug, Clone)]
pub struct LoadedTemplate {
    inner: Arc<ModelData>,
}

impl LoadedTemplate {
    pub(crate) fn new(
        source: String,
        ranges: Vec<TextRange>,
        markers: Vec<Marker>,
        sites: Vec<MatchSite>,
        remove_if_null: RemoveIfNullPolicy,
    ) -> Self {
        Self {
            inner: Arc::new(ModelData {
                source,
                ranges,
                markers,
                sites,
                remove_if_null,
            }),
        }
    }

    /// The `REMOVE_IF_NULL` policy this template was loaded under
    pub(crate) fn remove_policy(&self) -> RemoveIfNullPolicy {
        self.inner.remove_if_null
    }

    /// The original template source text
    pub fn source(&self) -> &str {
        &self.inner.source
    }

    /// The flat range sequence
    pub fn ranges(&self) -> &[TextRange] {
        &self.inner.ranges
    }

    /// The flat marker sequence
    pub fn markers(&self) -> &[Marker] {
        &self.inner.markers
    }

    /// All registered substitution sites, in source order
    pub fn sites(&self) -> &[MatchSite] {
        &self.inner.sites
    }

    /// Number of substitution slots requiring a value per traversal
    pub fn site_count(&self) -> usize {
        self.inner.sites.len()
    }

    /// Slice the source buffer for a range's span
    pub fn slice(&self, range: &TextRange) -> &str {
        &self.inner.source[range.span.clone()]
    }

    /// Start a builder session over this template
    pub fn builder(&self) -> crate::builder::TemplateBuilder {
        crate::builder::TemplateBuilder::new(self.clone())
    }

    /// Index of the end marker matching the begin marker at `begin`.
    ///
    /// Walks the flat marker list tracking nesting depth. Panics if `begin`
    /// does not index a begin marker; the loader guarantees balance, so a
    /// missing end marker is unreachable for loaded templates.
    pub(crate) fn matching_end(&self, begin: usize) -> usize {
        debug_assert!(matches!(
            self.inner.markers[begin].kind,
            MarkerKind::Begin(_)
        ));
        let mut depth = 0usize;
        for (offset, marker) in self.inner.markers[begin..].iter().enumerate() {
            match marker.kind {
                MarkerKind::Begin(_) => depth += 1,
                MarkerKind::End => {
                    depth -= 1;
                    if depth == 0 {
                        return begin + offset;
                    }
                }
            }
        }
        unreachable!("marker list is stack-balanced by construction")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn literal(span: Span, indent: Option<usize>, newline: bool) -> TextRange {
        TextRange {
            span,
            indent,
            newline,
            substitution: None,
        }
    }

    #[test]
    fn test_slice_references_source() {
        let model = LoadedTemplate::new(
            "hello world".to_string(),
            vec![literal(0..5, Some(0), false), literal(6..11, None, false)],
            vec![],
            vec![],
            RemoveIfNullPolicy::default(),
        );
        assert_eq!(model.slice(&model.ranges()[0]), "hello");
        assert_eq!(model.slice(&model.ranges()[1]), "world");
    }

    #[test]
    fn test_matching_end_with_nesting() {
        let begin = |range_index| Marker {
            kind: MarkerKind::Begin(Region::Foreach {
                var: "x".to_string(),
                collection: FieldAccessor::global("Xs").unwrap(),
            }),
            range_index,
            slot_index: 0,
        };
        let end = |range_index| Marker {
            kind: MarkerKind::End,
            range_index,
            slot_index: 0,
        };
        // begin(0) begin(1) end(1) begin(2) end(2) end(3)
        let model = LoadedTemplate::new(
            String::new(),
            vec![],
            vec![begin(0), begin(1), end(1), begin(2), end(2), end(3)],
            vec![],
            RemoveIfNullPolicy::default(),
        );
        assert_eq!(model.matching_end(0), 5);
        assert_eq!(model.matching_end(1), 2);
        assert_eq!(model.matching_end(3), 4);
    }

    #[test]
    fn test_clone_shares_model() {
        let model = LoadedTemplate::new(
            "abc".to_string(),
            vec![],
            vec![],
            vec![],
            RemoveIfNullPolicy::default(),
        );
        let clone = model.clone();
        assert!(std::ptr::eq(model.source(), clone.source()));
    }
}
