//! Loader - parses directive comments out of raw template text
//!
//! The loader walks the template line by line. Directive lines (lines whose
//! content, after an optional comment opener, starts with `TEMPLATE`) are
//! lexed and parsed into [`Directive`]s and become region markers; all other
//! lines accumulate as literal [`TextRange`]s, split wherever an open
//! `REPLACE` region's pattern matches.

pub mod lexer;
mod grammar;

use std::collections::HashMap;

use regex::Regex;

use crate::accessor::FieldAccessor;
use crate::error::LoadError;
use crate::model::{LoadedTemplate, Marker, MarkerKind, MatchSite, Region, Span, TextRange};
use crate::options::{EmptyReplacePolicy, LoadOptions};

use grammar::{parse_directive, Directive};

/// Load a single template with default options
pub fn load(text: &str) -> Result<LoadedTemplate, LoadError> {
    load_with_options(text, &LoadOptions::default())
}

/// Load a single template
pub fn load_with_options(text: &str, options: &LoadOptions) -> Result<LoadedTemplate, LoadError> {
    Scanner::new(text, options).scan()
}

/// Load every `DEFINE("name")`-delimited sub-template in a file, with
/// default options
pub fn load_all_defined(text: &str) -> Result<HashMap<String, LoadedTemplate>, LoadError> {
    load_all_defined_with_options(text, &LoadOptions::default())
}

/// Load every `DEFINE("name")`-delimited sub-template in a file.
///
/// Definitions are collected by pairing each `DEFINE` with its `END`
/// through the directive nesting; text outside the defined regions is
/// ignored. Nested and duplicate definitions are errors. Each definition's
/// body is loaded as an independent template (error spans are relative to
/// that body).
pub fn load_all_defined_with_options(
    text: &str,
    options: &LoadOptions,
) -> Result<HashMap<String, LoadedTemplate>, LoadError> {
    let mut templates = HashMap::new();
    let mut stack: Vec<BatchFrame> = Vec::new();

    for line in Lines::new(text) {
        let Some(dir_range) = directive_text_range(line.content, options) else {
            continue;
        };
        let directive_text = &line.content[dir_range.clone()];
        let directive = parse_directive(directive_text, line.offset + dir_range.start)?;
        let line_span = line.span();

        match directive {
            Directive::Define { name } => {
                if stack.iter().any(|f| f.define.is_some()) {
                    return Err(LoadError::NestedDefine {
                        name,
                        span: line_span,
                    });
                }
                if templates.contains_key(&name) {
                    return Err(LoadError::DuplicateDefine {
                        name,
                        span: line_span,
                    });
                }
                stack.push(BatchFrame {
                    define: Some((name, line.next_offset)),
                    directive: directive_text.trim().to_string(),
                    span: line_span,
                });
            }
            Directive::End => match stack.pop() {
                None => return Err(LoadError::StrayEnd { span: line_span }),
                Some(BatchFrame {
                    define: Some((name, body_start)),
                    ..
                }) => {
                    let body = &text[body_start..line.offset];
                    let loaded = load_with_options(body, options)?;
                    templates.insert(name, loaded);
                }
                Some(_) => {}
            },
            _ => {
                stack.push(BatchFrame {
                    define: None,
                    directive: directive_text.trim().to_string(),
                    span: line_span,
                });
            }
        }
    }

    if let Some(open) = stack.last() {
        return Err(LoadError::UnclosedRegion {
            directive: open.directive.clone(),
            span: open.span.clone(),
        });
    }
    Ok(templates)
}

struct BatchFrame {
    /// Set when this frame is a `DEFINE`: name plus body start offset
    define: Option<(String, usize)>,
    directive: String,
    span: Span,
}

/// One physical line with its position in the source buffer
struct Line<'a> {
    /// Line content, excluding the line break (and any `\r`)
    content: &'a str,
    /// Byte offset of the line start
    offset: usize,
    /// Byte offset of the next line start
    next_offset: usize,
    has_newline: bool,
}

impl Line<'_> {
    fn span(&self) -> Span {
        self.offset..(self.offset + self.content.len())
    }
}

struct Lines<'a> {
    text: &'a str,
    offset: usize,
}

impl<'a> Lines<'a> {
    fn new(text: &'a str) -> Self {
        Self { text, offset: 0 }
    }
}

impl<'a> Iterator for Lines<'a> {
    type Item = Line<'a>;

    fn next(&mut self) -> Option<Line<'a>> {
        if self.offset >= self.text.len() {
            return None;
        }
        let offset = self.offset;
        let (mut end, next_offset, has_newline) = match self.text[offset..].find('\n') {
            Some(i) => (offset + i, offset + i + 1, true),
            None => (self.text.len(), self.text.len(), false),
        };
        if end > offset && self.text.as_bytes()[end - 1] == b'\r' {
            end -= 1;
        }
        self.offset = next_offset;
        Some(Line {
            content: &self.text[offset..end],
            offset,
            next_offset,
            has_newline,
        })
    }
}

/// Locate the directive text within a line, if the line is a directive
/// line: optional leading whitespace, optional comment opener, the
/// `TEMPLATE` keyword. Any configured comment closer is stripped from the
/// end. Returns the byte range of the directive text within the line.
fn directive_text_range(line: &str, options: &LoadOptions) -> Option<Span> {
    let mut start = line.len() - line.trim_start().len();
    for prefix in &options.comment_prefixes {
        if line[start..].starts_with(prefix.as_str()) {
            start += prefix.len();
            break;
        }
    }
    start += line[start..].len() - line[start..].trim_start().len();

    let rest = &line[start..];
    let keyword_ok = rest.strip_prefix("TEMPLATE").map_or(false, |after| {
        after
            .chars()
            .next()
            .map_or(true, |c| !c.is_ascii_alphanumeric() && c != '_')
    });
    if !keyword_ok {
        return None;
    }

    let trimmed = line.trim_end();
    let mut end = trimmed.len();
    for suffix in &options.comment_suffixes {
        if trimmed.ends_with(suffix.as_str()) {
            end = trimmed.len() - suffix.len();
            break;
        }
    }
    Some(start..end.max(start))
}

/// Measure a line's leading whitespace: (column width, byte length)
fn indent_width(line: &str, options: &LoadOptions) -> (usize, usize) {
    let mut cols = 0usize;
    let mut bytes = 0usize;
    for c in line.chars() {
        match c {
            ' ' => cols += 1,
            '\t' => cols += options.tab_width,
            _ => break,
        }
        bytes += c.len_utf8();
    }
    (cols, bytes)
}

enum OpenKind {
    Foreach {
        var: String,
    },
    Replace {
        regex: Regex,
        pattern: String,
        accessor_text: String,
        removable: bool,
        sites: Vec<usize>,
    },
    Insert,
}

struct OpenRegion {
    kind: OpenKind,
    marker_index: usize,
    /// Directive text as written, for error display
    directive: String,
    span: Span,
}

struct Scanner<'a> {
    text: &'a str,
    options: &'a LoadOptions,
    ranges: Vec<TextRange>,
    markers: Vec<Marker>,
    sites: Vec<MatchSite>,
    stack: Vec<OpenRegion>,
}

impl<'a> Scanner<'a> {
    fn new(text: &'a str, options: &'a LoadOptions) -> Self {
        Self {
            text,
            options,
            ranges: Vec::new(),
            markers: Vec::new(),
            sites: Vec::new(),
            stack: Vec::new(),
        }
    }

    fn scan(mut self) -> Result<LoadedTemplate, LoadError> {
        for line in Lines::new(self.text) {
            match directive_text_range(line.content, self.options) {
                Some(dir_range) => {
                    let directive_text = &line.content[dir_range.clone()];
                    let directive =
                        parse_directive(directive_text, line.offset + dir_range.start)?;
                    self.handle_directive(directive, &line, directive_text.trim())?;
                }
                None => self.literal_line(&line),
            }
        }

        if let Some(open) = self.stack.last() {
            return Err(LoadError::UnclosedRegion {
                directive: open.directive.clone(),
                span: open.span.clone(),
            });
        }
        Ok(LoadedTemplate::new(
            self.text.to_string(),
            self.ranges,
            self.markers,
            self.sites,
            self.options.remove_if_null,
        ))
    }

    fn handle_directive(
        &mut self,
        directive: Directive,
        line: &Line<'_>,
        directive_text: &str,
    ) -> Result<(), LoadError> {
        let line_span = line.span();
        match directive {
            Directive::Foreach { var, collection } => {
                let var = self.loop_var_name(&var, &line_span)?;
                let collection = self.resolve_accessor(&collection, &line_span)?;
                self.open_region(
                    Region::Foreach {
                        var: var.clone(),
                        collection,
                    },
                    OpenKind::Foreach { var },
                    directive_text,
                    line_span,
                );
            }
            Directive::Replace {
                pattern,
                accessor,
                remove_if_null,
            } => {
                let regex = Regex::new(&pattern).map_err(|e| LoadError::InvalidPattern {
                    pattern: pattern.clone(),
                    span: line_span.clone(),
                    message: e.to_string(),
                })?;
                let resolved = self.resolve_accessor(&accessor, &line_span)?;
                self.open_region(
                    Region::Replace {
                        accessor: resolved,
                        removable: remove_if_null,
                        sites: Vec::new(),
                    },
                    OpenKind::Replace {
                        regex,
                        pattern,
                        accessor_text: accessor,
                        removable: remove_if_null,
                        sites: Vec::new(),
                    },
                    directive_text,
                    line_span,
                );
            }
            Directive::Insert { accessor } => {
                let resolved = self.resolve_accessor(&accessor, &line_span)?;
                let (indent, _) = indent_width(line.content, self.options);
                self.open_region(
                    Region::Insert {
                        accessor: resolved,
                        indent,
                    },
                    OpenKind::Insert,
                    directive_text,
                    line_span,
                );
            }
            Directive::Define { name } => {
                return Err(LoadError::MisplacedDefine {
                    name,
                    span: line_span,
                });
            }
            Directive::End => {
                let open = self
                    .stack
                    .pop()
                    .ok_or(LoadError::StrayEnd { span: line_span })?;
                if let OpenKind::Replace {
                    pattern,
                    accessor_text,
                    sites,
                    ..
                } = open.kind
                {
                    if sites.is_empty()
                        && self.options.on_empty_replace == EmptyReplacePolicy::Error
                    {
                        return Err(LoadError::EmptyReplace {
                            pattern,
                            accessor: accessor_text,
                            span: open.span,
                        });
                    }
                    match &mut self.markers[open.marker_index].kind {
                        MarkerKind::Begin(Region::Replace {
                            sites: slot_list, ..
                        }) => *slot_list = sites,
                        _ => unreachable!("open region indexes its own begin marker"),
                    }
                }
                self.markers.push(Marker {
                    kind: MarkerKind::End,
                    range_index: self.ranges.len(),
                    slot_index: self.sites.len(),
                });
            }
        }
        Ok(())
    }

    fn open_region(
        &mut self,
        region: Region,
        kind: OpenKind,
        directive_text: &str,
        span: Span,
    ) {
        let marker_index = self.markers.len();
        self.markers.push(Marker {
            kind: MarkerKind::Begin(region),
            range_index: self.ranges.len(),
            slot_index: self.sites.len(),
        });
        self.stack.push(OpenRegion {
            kind,
            marker_index,
            directive: directive_text.to_string(),
            span,
        });
    }

    /// The loop variable of a FOREACH must be a bare `$name`
    fn loop_var_name(&self, text: &str, span: &Span) -> Result<String, LoadError> {
        let invalid = || LoadError::InvalidAccessor {
            text: text.to_string(),
            span: span.clone(),
        };
        let name = text.strip_prefix('$').ok_or_else(invalid)?;
        if name.contains('.') {
            return Err(invalid());
        }
        FieldAccessor::variable(name).map_err(|_| invalid())?;
        Ok(name.to_string())
    }

    /// Resolve `$…` text against the open loop variables: a first segment
    /// naming an enclosing loop variable yields a `Field` (or bare
    /// `Variable`) accessor, anything else a `Global` one.
    fn resolve_accessor(&self, text: &str, span: &Span) -> Result<FieldAccessor, LoadError> {
        let invalid = || LoadError::InvalidAccessor {
            text: text.to_string(),
            span: span.clone(),
        };
        let rest = text.strip_prefix('$').ok_or_else(invalid)?;
        let (first, remainder) = match rest.split_once('.') {
            Some((first, remainder)) => (first, Some(remainder)),
            None => (rest, None),
        };
        let is_loop_var = self.stack.iter().any(
            |open| matches!(&open.kind, OpenKind::Foreach { var } if var == first),
        );
        let accessor = match (is_loop_var, remainder) {
            (true, Some(path)) => FieldAccessor::field(first, path),
            (true, None) => FieldAccessor::variable(first),
            (false, _) => FieldAccessor::global(rest),
        };
        accessor.map_err(|_| invalid())
    }

    fn literal_line(&mut self, line: &Line<'_>) {
        let (indent_cols, indent_bytes) = indent_width(line.content, self.options);
        let content = &line.content[indent_bytes..];
        let abs_start = line.offset + indent_bytes;

        if content.is_empty() {
            // Blank line: no indentation is re-applied at render time
            self.ranges.push(TextRange {
                span: abs_start..abs_start,
                indent: None,
                newline: line.has_newline,
                substitution: None,
            });
            return;
        }

        // Every open REPLACE region scans the line; matches collected
        // outermost-first so the stable sort favors the outer region on ties
        let mut found: Vec<(usize, usize, usize, MatchSite)> = Vec::new();
        for (stack_index, open) in self.stack.iter().enumerate() {
            let OpenKind::Replace {
                regex, removable, ..
            } = &open.kind
            else {
                continue;
            };
            for caps in regex.captures_iter(content) {
                let m = caps.get(0).expect("whole-match group always present");
                if m.start() == m.end() {
                    continue;
                }
                let groups = caps
                    .iter()
                    .skip(1)
                    .map(|g| g.map(|g| g.as_str().to_string()))
                    .collect();
                found.push((
                    m.start(),
                    m.end(),
                    stack_index,
                    MatchSite {
                        text: m.as_str().to_string(),
                        groups,
                        span: (abs_start + m.start())..(abs_start + m.end()),
                        removable: *removable,
                    },
                ));
            }
        }
        found.sort_by_key(|(start, _, _, _)| *start);

        let mut cursor = 0usize;
        let mut first_range = true;
        let mut line_indent = |first: &mut bool| {
            let indent = first.then_some(indent_cols);
            *first = false;
            indent
        };

        let mut taken_end = 0usize;
        for (start, end, stack_index, site) in found {
            if start < taken_end {
                // Overlapping match from another region; earliest wins
                continue;
            }
            taken_end = end;

            if start > cursor {
                self.ranges.push(TextRange {
                    span: (abs_start + cursor)..(abs_start + start),
                    indent: line_indent(&mut first_range),
                    newline: false,
                    substitution: None,
                });
            }
            let slot = self.sites.len();
            self.sites.push(site);
            if let OpenKind::Replace { sites, .. } = &mut self.stack[stack_index].kind {
                sites.push(slot);
            }
            self.ranges.push(TextRange {
                span: (abs_start + start)..(abs_start + end),
                indent: line_indent(&mut first_range),
                newline: false,
                substitution: Some(slot),
            });
            cursor = end;
        }

        if cursor < content.len() {
            self.ranges.push(TextRange {
                span: (abs_start + cursor)..(abs_start + content.len()),
                indent: line_indent(&mut first_range),
                newline: false,
                substitution: None,
            });
        }

        let last = self
            .ranges
            .last_mut()
            .expect("literal line produces at least one range");
        last.newline = line.has_newline;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_only_template() {
        let model = load("alpha\n  beta\n\ngamma").unwrap();
        assert!(model.markers().is_empty());
        assert_eq!(model.site_count(), 0);
        let ranges = model.ranges();
        assert_eq!(ranges.len(), 4);
        assert_eq!(model.slice(&ranges[0]), "alpha");
        assert_eq!(ranges[0].indent, Some(0));
        assert!(ranges[0].newline);
        assert_eq!(model.slice(&ranges[1]), "beta");
        assert_eq!(ranges[1].indent, Some(2));
        // blank line keeps its newline but records no indentation
        assert_eq!(model.slice(&ranges[2]), "");
        assert_eq!(ranges[2].indent, None);
        assert!(ranges[2].newline);
        // final line has no trailing newline
        assert!(!ranges[3].newline);
    }

    #[test]
    fn test_tab_indentation_width() {
        let model = load("\tindented\n").unwrap();
        assert_eq!(model.ranges()[0].indent, Some(4));

        let options = LoadOptions {
            tab_width: 8,
            ..LoadOptions::default()
        };
        let model = load_with_options("\tindented\n", &options).unwrap();
        assert_eq!(model.ranges()[0].indent, Some(8));
    }

    #[test]
    fn test_replace_region_splits_line() {
        let source = "\
// TEMPLATE REPLACE(\"\\$X\\$\", $val)
prefix $X$ suffix
// TEMPLATE END
";
        let model = load(source).unwrap();
        assert_eq!(model.ranges().len(), 3);
        assert_eq!(model.slice(&model.ranges()[0]), "prefix ");
        assert_eq!(model.slice(&model.ranges()[1]), "$X$");
        assert_eq!(model.slice(&model.ranges()[2]), " suffix");
        assert_eq!(model.ranges()[1].substitution, Some(0));
        assert!(model.ranges()[2].newline);
        assert_eq!(model.sites()[0].text, "$X$");
        assert_eq!(&source[model.sites()[0].span.clone()], "$X$");
        assert!(!model.sites()[0].removable);

        let markers = model.markers();
        assert_eq!(markers.len(), 2);
        assert_eq!(markers[0].range_index, 0);
        assert_eq!(markers[1].range_index, 3);
        match &markers[0].kind {
            MarkerKind::Begin(Region::Replace { sites, .. }) => assert_eq!(sites, &vec![0]),
            other => panic!("expected replace region, got {:?}", other),
        }
    }

    #[test]
    fn test_capture_groups_recorded() {
        let source = "\
# TEMPLATE REPLACE(\"get_(\\w+)\", $field)
get_name
# TEMPLATE END
";
        let model = load(source).unwrap();
        assert_eq!(model.sites()[0].text, "get_name");
        assert_eq!(model.sites()[0].groups, vec![Some("name".to_string())]);
    }

    #[test]
    fn test_foreach_binds_loop_variable() {
        let source = "\
// TEMPLATE FOREACH($item : $Items)
//   TEMPLATE REPLACE(\"NAME\", $item.Name)
NAME
//   TEMPLATE END
// TEMPLATE END
";
        let model = load(source).unwrap();
        let markers = model.markers();
        assert_eq!(markers.len(), 4);
        match &markers[0].kind {
            MarkerKind::Begin(Region::Foreach { var, collection }) => {
                assert_eq!(var, "item");
                assert_eq!(collection, &FieldAccessor::global("Items").unwrap());
            }
            other => panic!("expected foreach region, got {:?}", other),
        }
        match &markers[1].kind {
            MarkerKind::Begin(Region::Replace { accessor, .. }) => {
                assert_eq!(accessor, &FieldAccessor::field("item", "Name").unwrap());
            }
            other => panic!("expected replace region, got {:?}", other),
        }
    }

    #[test]
    fn test_accessor_outside_loop_is_global() {
        let source = "\
// TEMPLATE REPLACE(\"X\", $item.Name)
X
// TEMPLATE END
";
        let model = load(source).unwrap();
        match &model.markers()[0].kind {
            MarkerKind::Begin(Region::Replace { accessor, .. }) => {
                // no enclosing loop binds `item`, so the text is a global path
                assert_eq!(accessor, &FieldAccessor::global("item.Name").unwrap());
            }
            other => panic!("expected replace region, got {:?}", other),
        }
    }

    #[test]
    fn test_insert_captures_indentation() {
        let source = "\
fn main() {
    // TEMPLATE INSERT($body)
    placeholder();
    // TEMPLATE END
}
";
        let model = load(source).unwrap();
        match &model.markers()[0].kind {
            MarkerKind::Begin(Region::Insert { accessor, indent }) => {
                assert_eq!(accessor, &FieldAccessor::global("body").unwrap());
                assert_eq!(*indent, 4);
            }
            other => panic!("expected insert region, got {:?}", other),
        }
    }

    #[test]
    fn test_comment_styles() {
        for source in [
            "// TEMPLATE INSERT($x)\n// TEMPLATE END\n",
            "# TEMPLATE INSERT($x)\n# TEMPLATE END\n",
            "-- TEMPLATE INSERT($x)\n-- TEMPLATE END\n",
            "/* TEMPLATE INSERT($x) */\n/* TEMPLATE END */\n",
            "<!-- TEMPLATE INSERT($x) -->\n<!-- TEMPLATE END -->\n",
            "TEMPLATE INSERT($x)\nTEMPLATE END\n",
        ] {
            let model = load(source).unwrap();
            assert_eq!(model.markers().len(), 2, "source: {source:?}");
        }
    }

    #[test]
    fn test_template_word_in_literal_text() {
        // "TEMPLATED" does not end at a word boundary, so it's literal text
        let model = load("TEMPLATED output\n").unwrap();
        assert!(model.markers().is_empty());
        assert_eq!(model.ranges().len(), 1);
    }

    #[test]
    fn test_unclosed_region_error() {
        let err = load("// TEMPLATE FOREACH($i : $Xs)\nbody\n").unwrap_err();
        match err {
            LoadError::UnclosedRegion { directive, .. } => {
                assert!(directive.contains("FOREACH"));
            }
            other => panic!("expected unclosed region, got {other:?}"),
        }
    }

    #[test]
    fn test_stray_end_error() {
        let err = load("// TEMPLATE END\n").unwrap_err();
        assert!(matches!(err, LoadError::StrayEnd { .. }));
    }

    #[test]
    fn test_invalid_pattern_error() {
        let err = load("// TEMPLATE REPLACE(\"(\", $x)\nbody\n// TEMPLATE END\n").unwrap_err();
        assert!(matches!(err, LoadError::InvalidPattern { .. }));
    }

    #[test]
    fn test_invalid_accessor_error() {
        let err = load("// TEMPLATE INSERT($9bad)\n// TEMPLATE END\n").unwrap_err();
        assert!(matches!(err, LoadError::InvalidAccessor { .. }));
    }

    #[test]
    fn test_empty_replace_policy() {
        let source = "// TEMPLATE REPLACE(\"MISSING\", $x)\nnothing here\n// TEMPLATE END\n";
        let err = load(source).unwrap_err();
        assert!(matches!(err, LoadError::EmptyReplace { .. }));

        let options = LoadOptions {
            on_empty_replace: EmptyReplacePolicy::Allow,
            ..LoadOptions::default()
        };
        let model = load_with_options(source, &options).unwrap();
        assert_eq!(model.site_count(), 0);
    }

    #[test]
    fn test_define_rejected_by_single_loader() {
        let err = load("// TEMPLATE DEFINE(\"x\")\n// TEMPLATE END\n").unwrap_err();
        assert!(matches!(err, LoadError::MisplacedDefine { .. }));
    }

    #[test]
    fn test_load_all_defined() {
        let source = "\
ignored preamble
// TEMPLATE DEFINE(\"greeting\")
hello
// TEMPLATE END
between
// TEMPLATE DEFINE(\"farewell\")
// TEMPLATE REPLACE(\"WHO\", $who)
bye WHO
// TEMPLATE END
// TEMPLATE END
trailing
";
        let templates = load_all_defined(source).unwrap();
        assert_eq!(templates.len(), 2);
        let greeting = &templates["greeting"];
        assert_eq!(greeting.ranges().len(), 1);
        assert_eq!(greeting.slice(&greeting.ranges()[0]), "hello");
        assert_eq!(templates["farewell"].site_count(), 1);
    }

    #[test]
    fn test_duplicate_define_rejected() {
        let source = "\
// TEMPLATE DEFINE(\"a\")
// TEMPLATE END
// TEMPLATE DEFINE(\"a\")
// TEMPLATE END
";
        let err = load_all_defined(source).unwrap_err();
        assert!(matches!(err, LoadError::DuplicateDefine { .. }));
    }

    #[test]
    fn test_nested_define_rejected() {
        let source = "\
// TEMPLATE DEFINE(\"outer\")
// TEMPLATE DEFINE(\"inner\")
// TEMPLATE END
// TEMPLATE END
";
        let err = load_all_defined(source).unwrap_err();
        assert!(matches!(err, LoadError::NestedDefine { .. }));
    }

    #[test]
    fn test_crlf_line_endings() {
        let model = load("alpha\r\nbeta\r\n").unwrap();
        assert_eq!(model.slice(&model.ranges()[0]), "alpha");
        assert!(model.ranges()[0].newline);
        assert_eq!(model.slice(&model.ranges()[1]), "beta");
    }

    #[test]
    fn test_chained_replace_regions_share_a_line() {
        let source = "\
// TEMPLATE REPLACE(\"AAA\", $a)
// TEMPLATE REPLACE(\"BBB\", $b)
AAA and BBB
// TEMPLATE END
// TEMPLATE END
";
        let model = load(source).unwrap();
        assert_eq!(model.site_count(), 2);
        assert_eq!(model.sites()[0].text, "AAA");
        assert_eq!(model.sites()[1].text, "BBB");
        let outer_sites = match &model.markers()[0].kind {
            MarkerKind::Begin(Region::Replace { sites, .. }) => sites.clone(),
            _ => unreachable!(),
        };
        let inner_sites = match &model.markers()[1].kind {
            MarkerKind::Begin(Region::Replace { sites, .. }) => sites.clone(),
            _ => unreachable!(),
        };
        assert_eq!(outer_sites, vec![0]);
        assert_eq!(inner_sites, vec![1]);
    }
}
