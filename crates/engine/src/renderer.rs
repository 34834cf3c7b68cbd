//! Message renderer — template lookup and placeholder substitution.
//!
//! Lookup is strict: in store mode the row's template reference must name a
//! file under the template directory, and an unknown name is a row-level
//! failure. Substitution is permissive: `$name` / `${name}` placeholders
//! are replaced from the row's params, a placeholder without a matching key
//! stays in the output verbatim, and substitution itself never fails.

use std::path::PathBuf;

use serde_json::{Map, Value};
use thiserror::Error;

/// Rendering failures. `MissingTemplateDir` aborts the run during startup
/// validation; the other variants are row-level failures.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("template path `{0}` does not exist or is not a directory")]
    MissingTemplateDir(PathBuf),

    #[error("template `{name}` not found under `{dir}`")]
    TemplateNotFound { name: String, dir: PathBuf },

    #[error("failed to read template `{name}`: {source}")]
    TemplateRead {
        name: String,
        #[source]
        source: std::io::Error,
    },
}

/// Template directory with by-name lookup.
#[derive(Debug)]
pub struct TemplateStore {
    dir: PathBuf,
}

impl TemplateStore {
    /// Open a template directory. Existence is checked here, once per run,
    /// never per row.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, RenderError> {
        let dir = dir.into();
        if !dir.is_dir() {
            return Err(RenderError::MissingTemplateDir(dir));
        }
        Ok(Self { dir })
    }

    /// Load a template's content by file name.
    pub fn load(&self, name: &str) -> Result<String, RenderError> {
        let path = self.dir.join(name);
        if !path.is_file() {
            return Err(RenderError::TemplateNotFound {
                name: name.to_string(),
                dir: self.dir.clone(),
            });
        }
        std::fs::read_to_string(&path).map_err(|source| RenderError::TemplateRead {
            name: name.to_string(),
            source,
        })
    }
}

/// How row template references are interpreted. The mode is fixed for the
/// whole run by the presence of `--template-path`; there is no per-row
/// sniffing.
pub enum Renderer {
    /// References name files in a template directory.
    Store(TemplateStore),
    /// Each reference is the message text itself.
    Literal,
}

impl Renderer {
    /// Render a row's message body from its template reference and params.
    pub fn render(
        &self,
        template_ref: &str,
        params: &Map<String, Value>,
    ) -> Result<String, RenderError> {
        let text = match self {
            Renderer::Store(store) => store.load(template_ref)?,
            Renderer::Literal => template_ref.to_string(),
        };
        Ok(substitute(&text, params))
    }
}

/// Replace `$name` / `${name}` placeholders with values from `params`.
///
/// A placeholder whose key is missing from `params` is left in the output
/// verbatim; `$$` escapes a literal `$`. String values substitute bare,
/// any other JSON value substitutes in its JSON rendering.
pub fn substitute(text: &str, params: &Map<String, Value>) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(pos) = rest.find('$') {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];

        if let Some(tail) = after.strip_prefix('$') {
            out.push('$');
            rest = tail;
        } else if let Some(braced) = after.strip_prefix('{') {
            match braced.find('}') {
                Some(end) => {
                    let key = &braced[..end];
                    match lookup(params, key) {
                        Some(value) => out.push_str(&value),
                        None => {
                            out.push_str("${");
                            out.push_str(key);
                            out.push('}');
                        }
                    }
                    rest = &braced[end + 1..];
                }
                None => {
                    // Unterminated `${`: keep the tail as-is.
                    out.push_str(&rest[pos..]);
                    rest = "";
                }
            }
        } else {
            let len = ident_len(after);
            if len == 0 {
                out.push('$');
                rest = after;
            } else {
                let key = &after[..len];
                match lookup(params, key) {
                    Some(value) => out.push_str(&value),
                    None => {
                        out.push('$');
                        out.push_str(key);
                    }
                }
                rest = &after[len..];
            }
        }
    }

    out.push_str(rest);
    out
}

/// Length of the leading `[A-Za-z_][A-Za-z0-9_]*` identifier, 0 if none.
fn ident_len(s: &str) -> usize {
    s.bytes()
        .enumerate()
        .take_while(|(i, b)| {
            if *i == 0 {
                b.is_ascii_alphabetic() || *b == b'_'
            } else {
                b.is_ascii_alphanumeric() || *b == b'_'
            }
        })
        .count()
}

fn lookup(params: &Map<String, Value>, key: &str) -> Option<String> {
    params.get(key).map(|value| match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    })
}
