//! General entities declared in a DOCTYPE internal subset.
//!
//! Only internal general entities (`<!ENTITY name "value">`) are
//! collected. Parameter entities and external entities are skipped; a
//! reference to one of those still fails as an unknown entity.

use quick_xml::escape::{resolve_predefined_entity, unescape_with};
use std::collections::HashMap;

/// Upper bound on the expanded length of a single entity.
pub(crate) const MAX_ENTITY_LENGTH: usize = 1 << 20;

/// Entity name to replacement text, with character references and
/// references to earlier entities already expanded.
pub(crate) type EntityMap = HashMap<String, String>;

/// Collects the internal general entities declared in the body of a
/// DOCTYPE event (`root [<!ENTITY e "Jo">]`).
pub(crate) fn internal_entities(doctype: &str) -> Result<EntityMap, String> {
    let mut scanner = DeclScanner {
        input: doctype.as_bytes(),
        pos: 0,
    };
    let mut entities = EntityMap::new();

    while let Some(b) = scanner.peek() {
        if scanner.looking_at(b"<!--") {
            scanner.skip_past(b"-->");
        } else if scanner.looking_at(b"<?") {
            scanner.skip_past(b"?>");
        } else if scanner.looking_at(b"<!ENTITY") {
            if let Some((name, raw)) = scanner.entity_decl()? {
                // First declaration wins (XML 1.0 §4.2)
                if !entities.contains_key(&name) {
                    let value = expand(&name, &raw, &entities)?;
                    entities.insert(name, value);
                }
            }
        } else if scanner.looking_at(b"<!") {
            scanner.skip_declaration();
        } else if b == b'"' || b == b'\'' {
            scanner.quoted()?;
        } else {
            scanner.pos += 1;
        }
    }
    Ok(entities)
}

fn expand(name: &str, raw: &str, known: &EntityMap) -> Result<String, String> {
    let value = unescape_with(raw, |entity| {
        known
            .get(entity)
            .map(String::as_str)
            .or_else(|| resolve_predefined_entity(entity))
    })
    .map_err(|e| format!("entity '{name}': {e}"))?;
    if value.len() > MAX_ENTITY_LENGTH {
        return Err(format!(
            "entity '{name}' expands to more than {MAX_ENTITY_LENGTH} bytes"
        ));
    }
    Ok(value.into_owned())
}

struct DeclScanner<'a> {
    input: &'a [u8],
    pos: usize,
}

impl DeclScanner<'_> {
    fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    fn looking_at(&self, s: &[u8]) -> bool {
        self.input[self.pos..].starts_with(s)
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(|b| b.is_ascii_whitespace()) {
            self.pos += 1;
        }
    }

    fn skip_past(&mut self, end: &[u8]) {
        while self.pos < self.input.len() && !self.looking_at(end) {
            self.pos += 1;
        }
        self.pos = (self.pos + end.len()).min(self.input.len());
    }

    /// Skips a markup declaration up to its closing `>`, stepping over
    /// quoted literals.
    fn skip_declaration(&mut self) {
        while let Some(b) = self.peek() {
            match b {
                b'"' | b'\'' => {
                    if self.quoted().is_err() {
                        self.pos = self.input.len();
                    }
                }
                b'>' => {
                    self.pos += 1;
                    return;
                }
                _ => self.pos += 1,
            }
        }
    }

    fn name(&mut self) -> String {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|b| !b.is_ascii_whitespace() && b != b'>' && b != b'"' && b != b'\'')
        {
            self.pos += 1;
        }
        String::from_utf8_lossy(&self.input[start..self.pos]).into_owned()
    }

    fn quoted(&mut self) -> Result<String, String> {
        let Some(quote) = self.peek() else {
            return Err("expected a quoted value".to_string());
        };
        self.pos += 1;
        let start = self.pos;
        while self.peek().is_some_and(|b| b != quote) {
            self.pos += 1;
        }
        if self.peek().is_none() {
            return Err("unterminated literal in DOCTYPE".to_string());
        }
        let value = String::from_utf8_lossy(&self.input[start..self.pos]).into_owned();
        self.pos += 1;
        Ok(value)
    }

    /// Parses one `<!ENTITY ...>` declaration. Returns `None` for
    /// parameter and external entities.
    fn entity_decl(&mut self) -> Result<Option<(String, String)>, String> {
        self.pos += b"<!ENTITY".len();
        self.skip_whitespace();

        if self.peek() == Some(b'%') {
            self.skip_declaration();
            return Ok(None);
        }

        let name = self.name();
        if name.is_empty() {
            return Err("entity declaration without a name".to_string());
        }
        self.skip_whitespace();

        let value = match self.peek() {
            Some(b'"' | b'\'') => Some(self.quoted()?),
            _ => None,
        };
        self.skip_declaration();
        Ok(value.map(|v| (name, v)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_internal_entities() {
        let map = internal_entities(r#"root [<!ENTITY e "Jo"> <!ENTITY name 'John'>]"#).unwrap();
        assert_eq!(map.get("e").map(String::as_str), Some("Jo"));
        assert_eq!(map.get("name").map(String::as_str), Some("John"));
    }

    #[test]
    fn test_entity_values_expand_references() {
        let map = internal_entities(
            r#"root [<!ENTITY copy "&#169;"> <!ENTITY note "&copy; &amp; more">]"#,
        )
        .unwrap();
        assert_eq!(map.get("copy").map(String::as_str), Some("\u{a9}"));
        assert_eq!(map.get("note").map(String::as_str), Some("\u{a9} & more"));
    }

    #[test]
    fn test_skips_parameter_and_external_entities() {
        let map = internal_entities(
            r#"root SYSTEM "root.dtd" [
                <!-- <!ENTITY hidden "no"> -->
                <!ENTITY % common "(#PCDATA)">
                <!ENTITY chapter SYSTEM "chapter.xml">
                <!ATTLIST root note CDATA "<!ENTITY fake 'x'>">
                <!ENTITY real "yes">
            ]"#,
        )
        .unwrap();
        assert_eq!(map.len(), 1);
        assert_eq!(map.get("real").map(String::as_str), Some("yes"));
    }

    #[test]
    fn test_first_declaration_wins() {
        let map = internal_entities(r#"r [<!ENTITY e "one"><!ENTITY e "two">]"#).unwrap();
        assert_eq!(map.get("e").map(String::as_str), Some("one"));
    }

    #[test]
    fn test_expansion_limit() {
        let mut subset = String::from("r [<!ENTITY a0 \"xxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxx\">");
        for i in 1..8 {
            let refs = format!("&a{};", i - 1).repeat(10);
            subset.push_str(&format!("<!ENTITY a{i} \"{refs}\">"));
        }
        subset.push(']');
        let Err(message) = internal_entities(&subset) else {
            panic!("nested expansion should hit the limit");
        };
        assert!(message.contains("expands to more than"));
    }
}
