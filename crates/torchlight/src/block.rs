//! The unit of highlighting work.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::render;

/// A fragment of source code together with its rendering options and,
/// once highlighted, its HTML.
///
/// Inputs (`language`, `code`, `theme`, `options`) are set by the caller.
/// Outputs (`wrapped`, `highlighted`, `styles`, `classes`) are filled in by
/// the [`Client`](crate::Client) and may then be rewritten by post-processors.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Block {
    /// Caller-assigned identifier, unique within one batch.
    pub id: String,
    pub language: String,
    pub code: String,
    /// Theme name. Blocks without one get the configured default theme.
    pub theme: Option<String>,
    /// Extra rendering options forwarded to the service verbatim.
    pub options: BTreeMap<String, Value>,

    /// Complete HTML including the containing element.
    pub wrapped: Option<String>,
    /// Highlighted inner HTML.
    pub highlighted: Option<String>,
    pub styles: Option<String>,
    pub classes: Option<String>,
}

impl Block {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn code(mut self, code: impl Into<String>) -> Self {
        self.code = code.into();
        self
    }

    pub fn theme(mut self, theme: impl Into<String>) -> Self {
        self.theme = Some(theme.into());
        self
    }

    pub fn option(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    /// Content digest of the block's inputs.
    ///
    /// Two blocks with the same language, theme, code and options hash
    /// identically regardless of their ids.
    pub fn hash(&self) -> String {
        let mut hasher = blake3::Hasher::new();

        hasher.update(self.language.as_bytes());
        hasher.update(b"\0");
        match &self.theme {
            Some(theme) => {
                hasher.update(b"t");
                hasher.update(theme.as_bytes());
            }
            None => {
                hasher.update(b"-");
            }
        }
        hasher.update(b"\0");
        hasher.update(self.code.as_bytes());
        hasher.update(b"\0");

        // BTreeMap iteration is sorted, so insertion order never matters.
        for (key, value) in &self.options {
            hasher.update(key.as_bytes());
            hasher.update(b"=");
            hasher.update(value.to_string().as_bytes());
            hasher.update(b"\0");
        }

        hasher.finalize().to_hex().to_string()
    }

    /// Marker that templates embed where this block's HTML belongs.
    pub fn placeholder(&self) -> String {
        format!("__torchlight-block-[{}]", self.id)
    }

    /// Whether the block already has its outer HTML.
    pub fn is_resolved(&self) -> bool {
        is_present(&self.wrapped)
    }

    /// Copy every field that `rendered` carries onto the block.
    ///
    /// Fields missing from `rendered` are left untouched.
    pub fn apply(&mut self, rendered: &Rendered) {
        if let Some(wrapped) = &rendered.wrapped {
            self.wrapped = Some(wrapped.clone());
        }
        if let Some(highlighted) = &rendered.highlighted {
            self.highlighted = Some(highlighted.clone());
        }
        if let Some(styles) = &rendered.styles {
            self.styles = Some(styles.clone());
        }
        if let Some(classes) = &rendered.classes {
            self.classes = Some(classes.clone());
        }
    }

    /// The non-empty output fields, as stored in the cache.
    pub fn rendered(&self) -> Rendered {
        let keep = |field: &Option<String>| field.clone().filter(|s| !s.is_empty());
        Rendered {
            wrapped: keep(&self.wrapped),
            highlighted: keep(&self.highlighted),
            styles: keep(&self.styles),
            classes: keep(&self.classes),
        }
    }

    /// Fill `wrapped` and `highlighted` locally unless both are present.
    ///
    /// Returns true when the fallback was used.
    pub fn ensure_rendered(&mut self) -> bool {
        if is_present(&self.wrapped) && is_present(&self.highlighted) {
            return false;
        }
        self.highlighted = Some(render::fallback_highlighted(&self.code));
        self.wrapped = Some(render::fallback_wrapped(&self.code));
        true
    }
}

fn is_present(field: &Option<String>) -> bool {
    field.as_deref().is_some_and(|s| !s.is_empty())
}

/// The output fields of a block, as returned by the service or kept in the
/// cache. Absent fields are `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rendered {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wrapped: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub highlighted: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub styles: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classes: Option<String>,
}

impl Rendered {
    pub fn is_empty(&self) -> bool {
        self.wrapped.is_none()
            && self.highlighted.is_none()
            && self.styles.is_none()
            && self.classes.is_none()
    }
}
