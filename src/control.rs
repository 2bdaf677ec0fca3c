// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Debian control paragraphs.

See <https://www.debian.org/doc/debian-policy/ch-controlfields.html>
for the canonical source of truth for how control files work.

A paragraph is an ordered series of `Name: value` fields. Multi-line values
are stored with embedded `\n` characters; the serializer re-emits them as
continuation lines and restores the `.` placeholder for blank lines, so a
parse/serialize round trip is byte identical.
*/

use {
    crate::error::{RepositoryError, Result},
    std::fmt::{Display, Formatter},
    std::io::Write,
};

/// A single field in a control paragraph.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ControlField {
    name: String,
    value: String,
}

impl ControlField {
    /// Construct an instance from a field name and value.
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    /// The name of this field.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The raw value of this field.
    ///
    /// Multi-line values contain embedded newlines; blank continuation lines
    /// are represented as empty lines, not `.` placeholders.
    pub fn value(&self) -> &str {
        &self.value
    }
}

/// An ordered collection of control fields.
///
/// Field names are case preserving and looked up exactly. Mutation keeps a
/// field's position in the paragraph; new fields are appended.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ControlParagraph {
    fields: Vec<ControlField>,
}

impl ControlParagraph {
    /// Parse a single control paragraph from text.
    ///
    /// Line endings are normalized to LF and a trailing newline is assumed.
    /// Comment lines (`#` prefix) are skipped. An empty line is only valid
    /// as the final line of the input.
    pub fn parse(text: &str) -> Result<Self> {
        let mut para = Self::default();

        let normalized = text.replace("\r\n", "\n");
        let body = format!("{}\n", normalized.trim_matches('\n'));
        let lines = body.split('\n').collect::<Vec<_>>();

        // Name of the field receiving continuation lines.
        let mut current: Option<String> = None;

        for (idx, line) in lines.iter().enumerate() {
            if line.starts_with('#') {
                continue;
            } else if line.starts_with(' ') || line.starts_with('\t') {
                let name = current.as_deref().ok_or_else(|| {
                    RepositoryError::ParseControl(format!(
                        "unexpected continuation line at line {}",
                        idx + 1
                    ))
                })?;

                let mut continuation = line[1..].trim_end().to_string();
                if continuation == "." {
                    // A lone dot is the placeholder for a blank line.
                    continuation.clear();
                }

                let value = para
                    .value_mut(name)
                    .expect("current field always resolves to a stored field");
                if !value.is_empty() && !value.ends_with('\n') {
                    value.push('\n');
                }
                value.push_str(&continuation);
                value.push('\n');
            } else if line.contains(':') {
                let (name, value) = line
                    .split_once(':')
                    .expect("line was checked to contain a colon");
                let name = name.trim();
                para.set(name, value.trim());
                current = Some(name.to_string());
            } else if line.is_empty() {
                if idx + 1 != lines.len() {
                    return Err(RepositoryError::ParseControl(format!(
                        "expected end of paragraph at line {}",
                        idx + 1
                    )));
                }
            } else {
                return Err(RepositoryError::ParseControl(format!(
                    "expected key-value pair at line {}",
                    idx + 1
                )));
            }
        }

        Ok(para)
    }

    /// Whether the paragraph has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Whether a named field is present.
    pub fn has_field(&self, name: &str) -> bool {
        self.fields.iter().any(|f| f.name == name)
    }

    /// Obtain the raw string value of the named field.
    pub fn field_str(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|f| f.name == name)
            .map(|f| f.value.as_str())
    }

    /// Iterate over fields in insertion order.
    pub fn iter_fields(&self) -> impl Iterator<Item = &ControlField> {
        self.fields.iter()
    }

    /// Set the value of a field.
    ///
    /// An existing field keeps its position in the paragraph; a new field is
    /// appended at the end.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();

        match self.value_mut(&name) {
            Some(existing) => *existing = value,
            None => self.fields.push(ControlField::new(name, value)),
        }
    }

    /// Move the named field to the front of the paragraph.
    ///
    /// Returns `false`, leaving the order unchanged, if the field is absent.
    pub fn move_to_order_start(&mut self, name: &str) -> bool {
        match self.fields.iter().position(|f| f.name == name) {
            Some(pos) => {
                let field = self.fields.remove(pos);
                self.fields.insert(0, field);
                true
            }
            None => false,
        }
    }

    /// Serialize the paragraph to a writer.
    ///
    /// A trailing newline is written as part of the final field, but no
    /// terminating blank line. When concatenating paragraphs (e.g. into a
    /// `Packages` file) the caller adds the separating newline.
    pub fn write<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        for field in &self.fields {
            writer.write_all(field.name.as_bytes())?;
            writer.write_all(b": ")?;
            writer.write_all(serialize_value(&field.value).as_bytes())?;
            writer.write_all(b"\n")?;
        }

        Ok(())
    }

    fn value_mut(&mut self, name: &str) -> Option<&mut String> {
        self.fields
            .iter_mut()
            .find(|f| f.name == name)
            .map(|f| &mut f.value)
    }
}

impl Display for ControlParagraph {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for field in &self.fields {
            writeln!(f, "{}: {}", field.name, serialize_value(&field.value))?;
        }

        Ok(())
    }
}

/// Rewrite a raw field value into its on-disk form.
///
/// Embedded newlines become continuation lines and blank continuation lines
/// are restored to the `.` placeholder.
fn serialize_value(raw: &str) -> String {
    let mut value = raw.replace('\n', "\n ").replace("\n \n", "\n .\n");
    if value.ends_with("\n ") {
        value.truncate(value.len() - 2);
    }

    value
}
