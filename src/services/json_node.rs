use serde_json::Value;

/// A borrowed position inside a JSON document that remembers how it was
/// reached, so a failed lookup can name the exact path.
#[derive(Debug, Clone)]
pub struct JsonNode<'a> {
    value: &'a Value,
    path: String,
}

/// The path segment that could not be resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct MissingPath(pub String);

impl<'a> JsonNode<'a> {
    pub fn root(value: &'a Value) -> Self {
        JsonNode {
            value,
            path: String::new(),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn key(&self, name: &str) -> Result<JsonNode<'a>, MissingPath> {
        let path = match self.path.is_empty() {
            true => name.to_string(),
            false => format!("{}.{}", self.path, name),
        };

        match self.value.get(name) {
            Some(value) if !value.is_null() => Ok(JsonNode { value, path }),
            _ => Err(MissingPath(path)),
        }
    }

    /// Follows a dotted key path such as `props.pageProps.contentData`.
    pub fn keys(&self, dotted: &str) -> Result<JsonNode<'a>, MissingPath> {
        dotted
            .split('.')
            .try_fold(self.clone(), |node, name| node.key(name))
    }

    pub fn index(&self, i: usize) -> Result<JsonNode<'a>, MissingPath> {
        let path = format!("{}[{}]", self.path, i);

        match self.value.get(i) {
            Some(value) => Ok(JsonNode { value, path }),
            None => Err(MissingPath(path)),
        }
    }

    pub fn array(&self) -> Result<&'a [Value], MissingPath> {
        self.value
            .as_array()
            .map(Vec::as_slice)
            .ok_or_else(|| MissingPath(self.path.clone()))
    }

    /// Strings are returned as is and numbers as their decimal text.
    pub fn text(&self) -> Result<String, MissingPath> {
        match self.value {
            Value::String(s) => Ok(s.clone()),
            Value::Number(n) => Ok(n.to_string()),
            _ => Err(MissingPath(self.path.clone())),
        }
    }
}
