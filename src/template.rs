//! Parameterized templates - the render-ready artifact and its playback
//!
//! A [`ParameterizedTemplate`] is what a finished builder session
//! produces: the shared range model, the ordered substitution values, and
//! the instruction tape. Rendering replays the tape against the range
//! sequence; it is a pure function of the template plus the base
//! indentation, so the same template can be rendered repeatedly or
//! spliced into several other templates.

use crate::model::LoadedTemplate;

/// One recorded tape operation, applied when playback reaches the tape
/// position it was recorded at
#[derive(Debug, Clone)]
pub enum Instr {
    /// Relocate the range read pointer (loop repetition, loop skip, or a
    /// removed line)
    SetRangePointer(usize),
    /// Splice literal text at the given relative indentation
    InsertLiteral(String, usize),
    /// Splice a nested template, rendered at accumulated indentation
    InsertTemplate(ParameterizedTemplate, usize),
}

/// The fully resolved, immutable result of one builder session
#[derive(Debug, Clone)]
pub struct ParameterizedTemplate {
    model: LoadedTemplate,
    /// Substitution values in emission order, one per traversed site
    values: Vec<String>,
    tape: Vec<(usize, Instr)>,
    /// Total ranges to emit across all iterations
    total: usize,
}

impl ParameterizedTemplate {
    pub(crate) fn new(
        model: LoadedTemplate,
        values: Vec<String>,
        tape: Vec<(usize, Instr)>,
        total: usize,
    ) -> Self {
        Self {
            model,
            values,
            tape,
            total,
        }
    }

    /// Render into `out` at the given base indentation.
    ///
    /// Panics if the tape desynchronizes from range playback; that is an
    /// internal-consistency failure of the builder, not a user error.
    pub fn write(&self, out: &mut String, base_indent: usize) {
        let ranges = self.model.ranges();
        let mut read = 0usize;
        let mut emitted = 0usize;
        let mut next_value = 0usize;
        let mut tape_index = 0usize;

        loop {
            // Several instructions can share one position; apply them all
            while tape_index < self.tape.len() && self.tape[tape_index].0 == emitted {
                match &self.tape[tape_index].1 {
                    Instr::SetRangePointer(target) => read = *target,
                    Instr::InsertLiteral(text, indent) => {
                        push_lines(out, text, base_indent + indent);
                    }
                    Instr::InsertTemplate(template, indent) => {
                        template.write(out, base_indent + indent);
                    }
                }
                tape_index += 1;
            }
            if emitted == self.total {
                break;
            }

            let range = &ranges[read];
            if let Some(indent) = range.indent {
                out.push_str(&" ".repeat(base_indent + indent));
            }
            if range.substitution.is_some() {
                out.push_str(&self.values[next_value]);
                next_value += 1;
            } else {
                out.push_str(self.model.slice(range));
            }
            if range.newline {
                out.push('\n');
            }
            read += 1;
            emitted += 1;
        }

        assert!(
            tape_index == self.tape.len(),
            "instruction tape out of sync with range playback"
        );
        debug_assert_eq!(next_value, self.values.len());
    }

    /// Render to a fresh string at the given base indentation
    pub fn render(&self, base_indent: usize) -> String {
        let mut out = String::new();
        self.write(&mut out, base_indent);
        out
    }
}

/// Append each line of `text` indented by `indent` columns, each followed
/// by a line break. Blank lines stay unindented.
fn push_lines(out: &mut String, text: &str, indent: usize) {
    for line in text.lines() {
        if !line.is_empty() {
            out.push_str(&" ".repeat(indent));
        }
        out.push_str(line);
        out.push('\n');
    }
}
