//! Template vocabulary normalization
//!
//! Templates may use the shorthand vocabulary (`v-if`, `v-for`, `@click`,
//! `:title`, `#header`, ...). It is rewritten textually to the native
//! `data-*` attributes before parsing. Self-closing non-void tags
//! (`<user-card />`) become open/close pairs, since the HTML parser would
//! otherwise treat them as unclosed.

use std::borrow::Cow;

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source", "track", "wbr",
];

/// Rewrite a template to the native vocabulary
pub fn normalize(template: &str) -> String {
    let bytes = template.as_bytes();
    let mut out = String::with_capacity(template.len() + 16);
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i..].starts_with(b"<!--") {
            let end = template[i + 4..].find("-->").map_or(template.len(), |p| i + 4 + p + 3);
            out.push_str(&template[i..end]);
            i = end;
        } else if bytes[i] == b'<' && bytes.get(i + 1).is_some_and(u8::is_ascii_alphabetic) {
            i = rewrite_start_tag(template, i, &mut out);
        } else {
            let step = template[i..].chars().next().map_or(1, char::len_utf8);
            let next = template[i + step..].find('<').map_or(template.len(), |p| i + step + p);
            out.push_str(&template[i..next]);
            i = next;
        }
    }
    out
}

/// Rewrite the start tag beginning at `start`, returning the index after it
fn rewrite_start_tag(src: &str, start: usize, out: &mut String) -> usize {
    let bytes = src.as_bytes();
    let mut i = start + 1;
    while i < bytes.len() && !bytes[i].is_ascii_whitespace() && bytes[i] != b'>' && bytes[i] != b'/' {
        i += 1;
    }
    let tag = &src[start + 1..i];
    out.push('<');
    out.push_str(tag);

    loop {
        let ws_start = i;
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        if i >= bytes.len() {
            out.push_str(&src[ws_start..]);
            return bytes.len();
        }
        if bytes[i] == b'>' {
            out.push('>');
            return i + 1;
        }
        if bytes[i..].starts_with(b"/>") {
            if VOID_ELEMENTS.contains(&tag.to_ascii_lowercase().as_str()) {
                out.push_str(" />");
            } else {
                out.push_str("></");
                out.push_str(tag);
                out.push('>');
            }
            return i + 2;
        }

        let name_start = i;
        while i < bytes.len()
            && !bytes[i].is_ascii_whitespace()
            && bytes[i] != b'='
            && bytes[i] != b'>'
            && !bytes[i..].starts_with(b"/>")
        {
            i += 1;
        }
        // A stray '/' that does not close the tag
        if i == name_start {
            i += 1;
            continue;
        }
        let name = &src[name_start..i];

        let mut value_text = None;
        if bytes.get(i) == Some(&b'=') {
            let value_start = i;
            i += 1;
            match bytes.get(i) {
                Some(&q @ (b'"' | b'\'')) => {
                    let close = src[i + 1..].find(q as char).map_or(bytes.len(), |p| i + 1 + p + 1);
                    i = close.min(bytes.len());
                }
                _ => {
                    while i < bytes.len() && !bytes[i].is_ascii_whitespace() && bytes[i] != b'>' {
                        i += 1;
                    }
                }
            }
            value_text = Some(&src[value_start..i]);
        }

        out.push(' ');
        let (name, forced) = normalize_attribute(name);
        out.push_str(&name);
        match (forced, value_text) {
            (Some(forced), _) => {
                out.push_str("=\"");
                out.push_str(&forced);
                out.push('"');
            }
            (None, Some(raw)) => out.push_str(raw),
            (None, None) => {}
        }
    }
}

/// Map one attribute name. The second element replaces the attribute value
/// (slot shorthands carry the slot name in the attribute name).
pub fn normalize_attribute(name: &str) -> (Cow<'_, str>, Option<String>) {
    if let Some(event) = name.strip_prefix('@') {
        return (Cow::Owned(format!("data-on:{event}")), None);
    }
    if let Some(attr) = name.strip_prefix(':') {
        return (Cow::Owned(format!("data-bind:{attr}")), None);
    }
    if let Some(slot) = name.strip_prefix('#') {
        return (Cow::Borrowed("data-slot"), Some(slot.to_string()));
    }
    let Some(directive) = name.strip_prefix("v-") else {
        return (Cow::Borrowed(name), None);
    };

    if let Some(event) = directive.strip_prefix("on:") {
        return (Cow::Owned(format!("data-on:{event}")), None);
    }
    if let Some(attr) = directive.strip_prefix("bind:") {
        return (Cow::Owned(format!("data-bind:{attr}")), None);
    }
    if let Some(slot) = directive.strip_prefix("slot:") {
        return (Cow::Borrowed("data-slot"), Some(slot.to_string()));
    }
    match directive {
        "for" => (Cow::Borrowed("data-repeat"), None),
        "slot" => (Cow::Borrowed("data-slot"), Some("default".into())),
        other => (Cow::Owned(format!("data-{other}")), None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shorthand_attributes() {
        assert_eq!(
            normalize(r#"<li v-for="item in items" :class="cls" @click="pick(item)">x</li>"#),
            r#"<li data-repeat="item in items" data-bind:class="cls" data-on:click="pick(item)">x</li>"#
        );
        assert_eq!(normalize(r#"<p v-if="ok" v-show='shown'>"#), r#"<p data-if="ok" data-show='shown'>"#);
        assert_eq!(normalize(r#"<input v-model="name">"#), r#"<input data-model="name">"#);
    }

    #[test]
    fn test_slot_shorthands() {
        assert_eq!(normalize("<template #header>h</template>"), r#"<template data-slot="header">h</template>"#);
        assert_eq!(normalize("<template v-slot:footer>f</template>"), r#"<template data-slot="footer">f</template>"#);
    }

    #[test]
    fn test_self_closing_expanded() {
        assert_eq!(normalize(r#"<user-card :user="u" />"#), r#"<user-card data-bind:user="u"></user-card>"#);
        assert_eq!(normalize("<br/>"), "<br />");
        assert_eq!(normalize("<img src=\"a.png\"/>"), "<img src=\"a.png\" />");
    }

    #[test]
    fn test_text_and_comments_untouched() {
        let src = "<!-- <a @click=\"x\"> --><p>1 < 2 and {{ a }}</p>";
        assert_eq!(normalize(src), src);
        assert_eq!(normalize("<p class=x data-on:click=go>"), "<p class=x data-on:click=go>");
    }

    #[test]
    fn test_native_vocabulary_unchanged() {
        let src = r#"<div data-if="a" data-bind:title.sync="t">ü</div>"#;
        assert_eq!(normalize(src), src);
    }

    #[test]
    fn test_multibyte_text_and_attributes() {
        assert_eq!(normalize("¡Hola!<p>¿qué?</p>"), "¡Hola!<p>¿qué?</p>");
        assert_eq!(normalize("<p>€</p><!--ß-->ñ"), "<p>€</p><!--ß-->ñ");
        assert_eq!(normalize(r#"<p títle="ö" @click="go">"#), r#"<p títle="ö" data-on:click="go">"#);
    }
}
