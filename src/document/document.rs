use serde::{Deserialize, Serialize};

/// The value of a field together with how it is treated by the index.
/// Every kind is stored verbatim; `Text` and `Token` are also searchable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum FieldValue {
    /// Retrievable but not searchable.
    Stored(String),
    /// Analyzed with the analyzer configured for the field name.
    Text(String),
    /// Indexed as one verbatim token, e.g. an identifier.
    Token(String),
}

impl FieldValue {
    pub fn as_str(&self) -> &str {
        match self {
            FieldValue::Stored(value) | FieldValue::Text(value) | FieldValue::Token(value) => value,
        }
    }

    pub fn is_indexed(&self) -> bool {
        !matches!(self, FieldValue::Stored(_))
    }

    pub fn is_stored(&self) -> bool {
        true
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub value: FieldValue,
}

impl Field {
    pub fn new(name: impl Into<String>, value: FieldValue) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

/// An immutable, ordered list of fields. A field name may repeat; each
/// occurrence is indexed as a separate value of the same field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Document {
    fields: Vec<Field>,
}

impl Document {
    pub fn builder() -> DocumentBuilder {
        DocumentBuilder::default()
    }

    pub fn from_fields(fields: Vec<Field>) -> Self {
        Self { fields }
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// First value of `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|field| field.name == name)
            .map(|field| field.value.as_str())
    }

    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.fields
            .iter()
            .filter(move |field| field.name == name)
            .map(|field| field.value.as_str())
    }

    pub fn indexed_fields(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter().filter(|field| field.value.is_indexed())
    }

    pub fn has_indexed_fields(&self) -> bool {
        self.indexed_fields().next().is_some()
    }
}

#[derive(Debug, Default)]
pub struct DocumentBuilder {
    fields: Vec<Field>,
}

impl DocumentBuilder {
    pub fn stored(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields
            .push(Field::new(name, FieldValue::Stored(value.into())));
        self
    }

    pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push(Field::new(name, FieldValue::Text(value.into())));
        self
    }

    pub fn token(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields
            .push(Field::new(name, FieldValue::Token(value.into())));
        self
    }

    pub fn field(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    pub fn build(self) -> Document {
        Document {
            fields: self.fields,
        }
    }
}
