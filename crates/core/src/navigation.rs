//! Reader navigation parameters carried in a query string.

use std::path::PathBuf;

use crate::BookId;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NavigationParams {
    pub id: Option<BookId>,
    pub file: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentSource {
    /// Bytes live in the binary store under this id.
    Stored(BookId),
    /// Bytes are read straight from a filesystem path.
    File {
        path: PathBuf,
        name: String,
        id: Option<BookId>,
    },
}

impl NavigationParams {
    pub fn for_book(id: BookId) -> Self {
        Self {
            id: Some(id),
            ..Self::default()
        }
    }

    /// Parses `id=..&file=..&name=..`, with or without a leading `?` or
    /// page prefix such as `reader?`. Unknown keys are ignored and blank
    /// values count as missing.
    pub fn from_query(query: &str) -> Self {
        let query = match query.split_once('?') {
            Some((_, rest)) => rest,
            None => query,
        };

        let mut params = Self::default();
        for pair in query.split('&') {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            let value = decode_component(value);
            let value = value.trim();
            if value.is_empty() {
                continue;
            }
            match decode_component(key).as_str() {
                "id" => params.id = Some(BookId(value.to_string())),
                "file" => params.file = Some(value.to_string()),
                "name" => params.name = Some(value.to_string()),
                _ => {}
            }
        }
        params
    }

    pub fn to_query(&self) -> String {
        let mut parts = Vec::new();
        if let Some(file) = &self.file {
            parts.push(format!("file={}", urlencoding::encode(file)));
        }
        if let Some(id) = &self.id {
            parts.push(format!("id={}", urlencoding::encode(id.as_str())));
        }
        if let Some(name) = &self.name {
            parts.push(format!("name={}", urlencoding::encode(name)));
        }
        parts.join("&")
    }

    /// Resolves where the document bytes come from. A `file` parameter
    /// wins over `id`; `None` means the required parameter is missing.
    pub fn source(&self) -> Option<DocumentSource> {
        if let Some(file) = &self.file {
            let path = PathBuf::from(file);
            let name = self.name.clone().unwrap_or_else(|| {
                path.file_name()
                    .map(|s| s.to_string_lossy().to_string())
                    .unwrap_or_else(|| file.clone())
            });
            return Some(DocumentSource::File {
                path,
                name,
                id: self.id.clone(),
            });
        }
        self.id.clone().map(DocumentSource::Stored)
    }
}

fn decode_component(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    match urlencoding::decode(&spaced) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => spaced,
    }
}
