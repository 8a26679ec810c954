//! Builder - the traversal engine that parameterizes a loaded template
//!
//! A [`TemplateBuilder`] is driven step by step by the caller: enter a
//! loop, begin iterations, supply replacements, splice inserts. Every
//! operation is validated against the next pending region marker in
//! declaration order, so hand-written driving code and the template file
//! cannot silently drift apart. As the traversal advances, committed
//! ranges and an instruction tape accumulate; re-iteration and loop-skip
//! are recorded as range-pointer resets and replayed at render time.
//!
//! Exclusive access is structural: nested bodies borrow the builder
//! mutably for the duration of one callback, and finalization consumes
//! the builder, so interleaved bodies and reuse after [`finish`] are
//! compile errors rather than runtime checks.
//!
//! [`finish`]: TemplateBuilder::finish

mod error;

pub use error::BuildError;

use crate::accessor::FieldAccessor;
use crate::model::{LoadedTemplate, Marker, MarkerKind, MatchSite, Region};
use crate::options::RemoveIfNullPolicy;
use crate::template::{Instr, ParameterizedTemplate};

/// Staging state of one substitution slot within the current span
#[derive(Debug, Clone)]
enum Slot {
    Empty,
    Filled(String),
    Removed,
}

/// One active `foreach` region
struct LoopFrame {
    /// Index of the begin marker
    begin: usize,
    /// Index of the matching end marker
    end: usize,
    /// First range of the loop body
    body_start: usize,
    /// Whether `begin_iteration` has been called for this frame
    iterated: bool,
}

/// A single parameterization pass over a loaded template.
///
/// Created by [`LoadedTemplate::builder`]; discarded by
/// [`TemplateBuilder::finish`], which produces the immutable
/// [`ParameterizedTemplate`].
pub struct TemplateBuilder {
    model: LoadedTemplate,
    /// Next pending marker index
    marker: usize,
    /// Source-range read pointer
    read: usize,
    /// Count of ranges committed to the tape; this is the tape position
    emitted: usize,
    values: Vec<String>,
    scratch: Vec<Slot>,
    tape: Vec<(usize, Instr)>,
    loops: Vec<LoopFrame>,
}

impl TemplateBuilder {
    pub(crate) fn new(model: LoadedTemplate) -> Self {
        let scratch = vec![Slot::Empty; model.site_count()];
        Self {
            model,
            marker: 0,
            read: 0,
            emitted: 0,
            values: Vec::new(),
            scratch,
            tape: Vec::new(),
            loops: Vec::new(),
        }
    }

    /// Enter the next pending `FOREACH` region.
    ///
    /// The body callback drives the loop: each call to
    /// [`begin_iteration`](Self::begin_iteration) replays the loop body
    /// with fresh substitution values. If the body never begins an
    /// iteration, the whole region is skipped and contributes no output.
    pub fn foreach<B>(&mut self, collection: &FieldAccessor, body: B) -> Result<(), BuildError>
    where
        B: FnOnce(&mut Self) -> Result<(), BuildError>,
    {
        let invoked = format!("FOREACH({})", collection);
        let (index, region, range_index) = self.pending_begin(&invoked)?;
        let Region::Foreach {
            collection: declared,
            ..
        } = &region
        else {
            return Err(BuildError::RegionMismatch {
                expected: region.to_string(),
                invoked,
            });
        };
        if declared != collection {
            return Err(BuildError::AccessorMismatch {
                region: region.to_string(),
                declared: declared.to_string(),
                supplied: collection.to_string(),
            });
        }

        self.commit_to(range_index)?;
        let end = self.model.matching_end(index);
        self.loops.push(LoopFrame {
            begin: index,
            end,
            body_start: range_index,
            iterated: false,
        });
        self.marker = index + 1;

        body(self)?;

        let frame = self.loops.pop().expect("frame pushed on loop entry");
        let end_range = self.model.markers()[frame.end].range_index;
        if frame.iterated {
            if self.marker != frame.end {
                return Err(BuildError::UnfinishedIteration {
                    loop_region: self.describe_marker(frame.begin),
                    pending: self.describe_pending(),
                });
            }
            self.commit_to(end_range)?;
        } else {
            // Zero iterations: hop the read pointer straight past the body
            self.tape.push((self.emitted, Instr::SetRangePointer(end_range)));
            self.read = end_range;
        }
        self.marker = frame.end + 1;
        Ok(())
    }

    /// Begin one iteration of the innermost active loop.
    ///
    /// The first call falls through into the loop body; every subsequent
    /// call commits the previous iteration and records a range-pointer
    /// reset so the body's ranges replay with new values.
    pub fn begin_iteration(&mut self) -> Result<(), BuildError> {
        let Some(frame) = self.loops.last() else {
            return Err(BuildError::NoActiveLoop);
        };
        let (begin, end, body_start, iterated) =
            (frame.begin, frame.end, frame.body_start, frame.iterated);

        if !iterated {
            self.loops
                .last_mut()
                .expect("frame checked above")
                .iterated = true;
            return Ok(());
        }

        if self.marker != end {
            return Err(BuildError::UnfinishedIteration {
                loop_region: self.describe_marker(begin),
                pending: self.describe_pending(),
            });
        }
        let end_range = self.model.markers()[end].range_index;
        self.commit_to(end_range)?;
        self.tape
            .push((self.emitted, Instr::SetRangePointer(body_start)));
        self.marker = begin + 1;
        self.read = body_start;
        Ok(())
    }

    /// Satisfy the next pending `REPLACE` region that contains nested
    /// regions: the replacer is invoked once per registered match, then
    /// the body drives the inner regions.
    pub fn replace_region<F, B>(
        &mut self,
        accessor: &FieldAccessor,
        mut replacer: F,
        body: B,
    ) -> Result<(), BuildError>
    where
        F: FnMut(&MatchSite) -> Option<String>,
        B: FnOnce(&mut Self) -> Result<(), BuildError>,
    {
        let invoked = format!("REPLACE({})", accessor);
        let (index, region, range_index) = self.pending_begin(&invoked)?;
        let Region::Replace {
            accessor: declared,
            sites,
            ..
        } = &region
        else {
            return Err(BuildError::RegionMismatch {
                expected: region.to_string(),
                invoked,
            });
        };
        if declared != accessor {
            return Err(BuildError::AccessorMismatch {
                region: region.to_string(),
                declared: declared.to_string(),
                supplied: accessor.to_string(),
            });
        }

        self.commit_to(range_index)?;
        for &slot in sites {
            let site = &self.model.sites()[slot];
            match replacer(site) {
                Some(value) => self.scratch[slot] = Slot::Filled(value),
                None if site.removable => self.scratch[slot] = Slot::Removed,
                None => {
                    return Err(BuildError::MissingReplacement {
                        site: site.text.clone(),
                    })
                }
            }
        }

        let end = self.model.matching_end(index);
        self.marker = index + 1;

        body(self)?;

        if self.marker != end {
            return Err(BuildError::IncompleteBody {
                region: region.to_string(),
                pending: self.describe_pending(),
            });
        }
        let end_range = self.model.markers()[end].range_index;
        self.commit_to(end_range)?;
        self.marker = end + 1;
        Ok(())
    }

    /// Satisfy the next pending `REPLACE` region (no nested regions)
    pub fn replace<F>(&mut self, accessor: &FieldAccessor, replacer: F) -> Result<(), BuildError>
    where
        F: FnMut(&MatchSite) -> Option<String>,
    {
        self.replace_region(accessor, replacer, |_| Ok(()))
    }

    /// Satisfy two back-to-back nested `REPLACE` regions in one call
    pub fn replace_pair<F1, F2>(
        &mut self,
        first: &FieldAccessor,
        first_replacer: F1,
        second: &FieldAccessor,
        second_replacer: F2,
    ) -> Result<(), BuildError>
    where
        F1: FnMut(&MatchSite) -> Option<String>,
        F2: FnMut(&MatchSite) -> Option<String>,
    {
        self.replace_region(first, first_replacer, |builder| {
            builder.replace(second, second_replacer)
        })
    }

    /// Satisfy the next pending `INSERT` region with literal text,
    /// spliced at the region's relative indentation
    pub fn insert(&mut self, accessor: &FieldAccessor, content: &str) -> Result<(), BuildError> {
        let content = content.to_string();
        self.insert_common(accessor, |indent| Some(Instr::InsertLiteral(content, indent)))
    }

    /// Satisfy the next pending `INSERT` region with a finalized template,
    /// rendered at the accumulated indentation when this template renders
    pub fn insert_template(
        &mut self,
        accessor: &FieldAccessor,
        template: ParameterizedTemplate,
    ) -> Result<(), BuildError> {
        self.insert_common(accessor, |indent| {
            Some(Instr::InsertTemplate(template, indent))
        })
    }

    /// Satisfy the next pending `INSERT` region with no content
    pub fn skip_insert(&mut self, accessor: &FieldAccessor) -> Result<(), BuildError> {
        self.insert_common(accessor, |_| None)
    }

    fn insert_common(
        &mut self,
        accessor: &FieldAccessor,
        make: impl FnOnce(usize) -> Option<Instr>,
    ) -> Result<(), BuildError> {
        let invoked = format!("INSERT({})", accessor);
        let (index, region, range_index) = self.pending_begin(&invoked)?;
        let Region::Insert {
            accessor: declared,
            indent,
        } = &region
        else {
            return Err(BuildError::RegionMismatch {
                expected: region.to_string(),
                invoked,
            });
        };
        if declared != accessor {
            return Err(BuildError::AccessorMismatch {
                region: region.to_string(),
                declared: declared.to_string(),
                supplied: accessor.to_string(),
            });
        }

        self.commit_to(range_index)?;
        if let Some(instr) = make(*indent) {
            self.tape.push((self.emitted, instr));
        }

        // The region body is placeholder content; hop past it
        let end = self.model.matching_end(index);
        let end_range = self.model.markers()[end].range_index;
        if end_range > range_index {
            self.tape.push((self.emitted, Instr::SetRangePointer(end_range)));
        }
        self.read = end_range;
        self.marker = end + 1;
        Ok(())
    }

    /// Finalize the session, producing the render-ready template.
    ///
    /// Consumes the builder: a finished session cannot be reused. Errors
    /// if any region remains unsatisfied.
    pub fn finish(mut self) -> Result<ParameterizedTemplate, BuildError> {
        debug_assert!(self.loops.is_empty(), "loop frames end with their bodies");
        if self.marker < self.model.markers().len() {
            return Err(BuildError::UnsatisfiedRegion {
                pending: self.describe_pending(),
            });
        }
        let total = self.model.ranges().len();
        self.commit_to(total)?;
        Ok(ParameterizedTemplate::new(
            self.model,
            self.values,
            self.tape,
            self.emitted,
        ))
    }

    /// Check and fetch the next pending begin marker
    fn pending_begin(&self, invoked: &str) -> Result<(usize, Region, usize), BuildError> {
        if let Some(frame) = self.loops.last() {
            if !frame.iterated {
                return Err(BuildError::IterationRequired {
                    loop_region: self.describe_marker(frame.begin),
                });
            }
        }
        match self.model.markers().get(self.marker) {
            None => Err(BuildError::PastLastRegion {
                invoked: invoked.to_string(),
            }),
            Some(Marker {
                kind: MarkerKind::End,
                ..
            }) => Err(BuildError::RegionMismatch {
                expected: "the end of the current region".to_string(),
                invoked: invoked.to_string(),
            }),
            Some(Marker {
                kind: MarkerKind::Begin(region),
                range_index,
                ..
            }) => Ok((self.marker, region.clone(), *range_index)),
        }
    }

    /// Commit ranges up to (but excluding) `to`, line by line: values move
    /// from scratch into the permanent list, removed lines become pointer
    /// hops, and every site in the span must have been set.
    fn commit_to(&mut self, to: usize) -> Result<(), BuildError> {
        debug_assert!(self.read <= to, "range pointer only moves forward");
        let mut current = self.read;
        while current < to {
            // Extent of the physical line within the span
            let mut line_end = current;
            loop {
                let last_of_line = self.model.ranges()[line_end].newline;
                line_end += 1;
                if last_of_line || line_end >= to {
                    break;
                }
            }

            // Every slot in the line must be set before anything moves
            let mut removed_site: Option<usize> = None;
            let mut filled_site: Option<usize> = None;
            for i in current..line_end {
                if let Some(slot) = self.model.ranges()[i].substitution {
                    match self.scratch[slot] {
                        Slot::Empty => {
                            return Err(BuildError::MissingReplacement {
                                site: self.model.sites()[slot].text.clone(),
                            })
                        }
                        Slot::Removed => removed_site = Some(slot),
                        Slot::Filled(_) => filled_site = Some(slot),
                    }
                }
            }

            let drop_line = removed_site.is_some()
                && self.model.remove_policy() == RemoveIfNullPolicy::Line;
            if drop_line {
                if let Some(slot) = filled_site {
                    return Err(BuildError::ConflictingRemoval {
                        site: self.model.sites()[slot].text.clone(),
                    });
                }
                for i in current..line_end {
                    if let Some(slot) = self.model.ranges()[i].substitution {
                        self.scratch[slot] = Slot::Empty;
                    }
                }
                self.tape
                    .push((self.emitted, Instr::SetRangePointer(line_end)));
            } else {
                for i in current..line_end {
                    if let Some(slot) = self.model.ranges()[i].substitution {
                        let value =
                            match std::mem::replace(&mut self.scratch[slot], Slot::Empty) {
                                Slot::Filled(value) => value,
                                // MatchOnly policy clears just the match
                                Slot::Removed => String::new(),
                                Slot::Empty => unreachable!("slots checked above"),
                            };
                        self.values.push(value);
                    }
                    self.emitted += 1;
                }
            }
            current = line_end;
        }
        self.read = to;
        Ok(())
    }

    fn describe_marker(&self, index: usize) -> String {
        match &self.model.markers()[index].kind {
            MarkerKind::Begin(region) => region.to_string(),
            MarkerKind::End => "the end of the current region".to_string(),
        }
    }

    fn describe_pending(&self) -> String {
        match self.model.markers().get(self.marker) {
            None => "the end of the template".to_string(),
            Some(_) => self.describe_marker(self.marker),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::load;

    fn global(path: &str) -> FieldAccessor {
        FieldAccessor::global(path).unwrap()
    }

    #[test]
    fn test_region_mismatch_detected() {
        let model = load("// TEMPLATE INSERT($x)\n// TEMPLATE END\n").unwrap();
        let mut builder = model.builder();
        let err = builder
            .replace(&global("x"), |_| Some("v".to_string()))
            .unwrap_err();
        assert!(matches!(err, BuildError::RegionMismatch { .. }));
    }

    #[test]
    fn test_accessor_mismatch_detected() {
        let source = "// TEMPLATE REPLACE(\"X\", $val)\nX\n// TEMPLATE END\n";
        let model = load(source).unwrap();
        let mut builder = model.builder();
        let err = builder
            .replace(&global("other"), |_| Some("v".to_string()))
            .unwrap_err();
        match err {
            BuildError::AccessorMismatch {
                declared, supplied, ..
            } => {
                assert_eq!(declared, "$val");
                assert_eq!(supplied, "$other");
            }
            other => panic!("expected accessor mismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_operation_past_last_region() {
        let model = load("just text\n").unwrap();
        let mut builder = model.builder();
        let err = builder
            .replace(&global("x"), |_| Some("v".to_string()))
            .unwrap_err();
        assert!(matches!(err, BuildError::PastLastRegion { .. }));
    }

    #[test]
    fn test_begin_iteration_outside_loop() {
        let model = load("text\n").unwrap();
        let mut builder = model.builder();
        assert!(matches!(
            builder.begin_iteration(),
            Err(BuildError::NoActiveLoop)
        ));
    }

    #[test]
    fn test_operation_before_first_iteration() {
        let source = "\
// TEMPLATE FOREACH($i : $Xs)
//   TEMPLATE REPLACE(\"N\", $i.N)
N
//   TEMPLATE END
// TEMPLATE END
";
        let model = load(source).unwrap();
        let mut builder = model.builder();
        let err = builder
            .foreach(&global("Xs"), |b| {
                b.replace(
                    &FieldAccessor::field("i", "N")?,
                    |_| Some("v".to_string()),
                )
            })
            .unwrap_err();
        assert!(matches!(err, BuildError::IterationRequired { .. }));
    }

    #[test]
    fn test_unfinished_iteration_detected() {
        let source = "\
// TEMPLATE FOREACH($i : $Xs)
//   TEMPLATE REPLACE(\"N\", $i.N)
N
//   TEMPLATE END
// TEMPLATE END
";
        let model = load(source).unwrap();
        let mut builder = model.builder();
        // Second iteration begins without satisfying the replace region
        let err = builder
            .foreach(&global("Xs"), |b| {
                b.begin_iteration()?;
                b.begin_iteration()
            })
            .unwrap_err();
        assert!(matches!(err, BuildError::UnfinishedIteration { .. }));
    }

    #[test]
    fn test_null_replacement_for_plain_site() {
        let source = "// TEMPLATE REPLACE(\"X\", $val)\nX\n// TEMPLATE END\n";
        let model = load(source).unwrap();
        let mut builder = model.builder();
        let err = builder.replace(&global("val"), |_| None).unwrap_err();
        assert!(matches!(err, BuildError::MissingReplacement { .. }));
    }

    #[test]
    fn test_finish_with_pending_region() {
        let model = load("// TEMPLATE INSERT($x)\n// TEMPLATE END\n").unwrap();
        let builder = model.builder();
        let err = builder.finish().unwrap_err();
        assert!(matches!(err, BuildError::UnsatisfiedRegion { .. }));
    }

    #[test]
    fn test_shared_model_backs_independent_sessions() {
        let source = "// TEMPLATE REPLACE(\"X\", $val)\nX\n// TEMPLATE END\n";
        let model = load(source).unwrap();

        let mut first = model.builder();
        first
            .replace(&global("val"), |_| Some("1".to_string()))
            .unwrap();
        let mut second = model.builder();
        second
            .replace(&global("val"), |_| Some("2".to_string()))
            .unwrap();

        assert_eq!(first.finish().unwrap().render(0), "1\n");
        assert_eq!(second.finish().unwrap().render(0), "2\n");
    }

    #[test]
    fn test_replacer_receives_match_data() {
        let source = "\
// TEMPLATE REPLACE(\"get_(\\w+)\", $field)
get_name
// TEMPLATE END
";
        let model = load(source).unwrap();
        let mut builder = model.builder();
        builder
            .replace(&global("field"), |site| {
                assert_eq!(site.text, "get_name");
                assert_eq!(site.groups, vec![Some("name".to_string())]);
                Some(format!("fetch_{}", site.groups[0].as_deref().unwrap()))
            })
            .unwrap();
        assert_eq!(builder.finish().unwrap().render(0), "fetch_name\n");
    }
}
