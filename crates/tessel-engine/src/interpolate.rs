//! Text interpolation
//!
//! `{{ expr | filter }}` renders the stringified value, `{{{ expr }}}` the raw
//! value. Raw output is only honored with `allow_raw_html`; otherwise the
//! empty placeholder is emitted and a warning logged.

use tessel_dom::escape_text;
use tracing::warn;

use crate::runtime::Runtime;
use crate::scope::RenderContext;

/// Piece of an interpolation template
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Segment<'a> {
    Literal(&'a str),
    Escaped(&'a str),
    Raw(&'a str),
}

pub(crate) fn has_interpolation(text: &str) -> bool {
    text.find("{{").is_some_and(|start| text[start..].contains("}}"))
}

/// Split a template into literal and expression segments. An unterminated
/// marker is kept as literal text.
pub(crate) fn segments(template: &str) -> Vec<Segment<'_>> {
    let mut out = Vec::new();
    let mut rest = template;
    while let Some(start) = rest.find("{{") {
        let (raw, open, close) = if rest[start..].starts_with("{{{") {
            (true, 3, "}}}")
        } else {
            (false, 2, "}}")
        };
        let body = &rest[start + open..];
        let Some(end) = body.find(close) else {
            break;
        };
        if start > 0 {
            out.push(Segment::Literal(&rest[..start]));
        }
        let expr = body[..end].trim();
        out.push(if raw { Segment::Raw(expr) } else { Segment::Escaped(expr) });
        rest = &body[end + close.len()..];
    }
    if !rest.is_empty() {
        out.push(Segment::Literal(rest));
    }
    out
}

impl Runtime {
    /// Unescaped rendering for text nodes and attribute values; the
    /// serializer escapes on output
    pub fn interpolate_text(&self, template: &str, ctx: &RenderContext) -> String {
        let mut out = String::with_capacity(template.len());
        for segment in segments(template) {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Escaped(expr) => out.push_str(&self.stringify(&self.evaluate_filtered(expr, ctx))),
                Segment::Raw(expr) => out.push_str(&self.raw_output(expr, ctx)),
            }
        }
        out
    }

    /// HTML rendering: escaped segments are HTML-escaped, raw segments are
    /// passed through when allowed
    pub fn interpolate_html(&self, template: &str, ctx: &RenderContext) -> String {
        self.render_html(template, ctx, false)
    }

    /// HTML rendering of a text node's template. The literal text was
    /// already entity-decoded by the parser, so it is escaped again.
    pub fn interpolate_text_node_html(&self, template: &str, ctx: &RenderContext) -> String {
        self.render_html(template, ctx, true)
    }

    fn render_html(&self, template: &str, ctx: &RenderContext, escape_literals: bool) -> String {
        let mut out = String::with_capacity(template.len());
        for segment in segments(template) {
            match segment {
                Segment::Literal(text) if escape_literals => out.push_str(&escape_text(text)),
                Segment::Literal(text) => out.push_str(text),
                Segment::Escaped(expr) => {
                    out.push_str(&escape_text(&self.stringify(&self.evaluate_filtered(expr, ctx))))
                }
                Segment::Raw(expr) => out.push_str(&self.raw_output(expr, ctx)),
            }
        }
        out
    }

    fn raw_output(&self, expr: &str, ctx: &RenderContext) -> String {
        if !self.config.allow_raw_html {
            warn!(expression = expr, "raw interpolation needs allow_raw_html; placeholder rendered");
            return self.config.empty_placeholder.clone();
        }
        self.stringify(&self.evaluate_filtered(expr, ctx))
    }
}
