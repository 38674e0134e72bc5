//! Template IR: ordered symbol bindings plus an opaque body.
//!
//! Bodies reference bound values as `$name$` and tensor reads as
//! `$object[a, b, c]$`. The downstream shader compiler performs the actual
//! substitution; [`TemplateBinder`] implements the same resolution rules so
//! emitted templates can be checked without it.

use indexmap::IndexMap;
use serde::Serialize;

use crate::error::{GenerateError, Result};

/// Precision qualifier forced on every accumulator, shared or local.
pub const ACCUMULATOR_PRECISION: &str = "highp";

/// A named scalar bound into a template.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct KernelParameter {
    pub name: String,
    pub value: i32,
}

/// Element type of a shared-memory array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SharedElement {
    Vec4,
}

impl SharedElement {
    pub fn glsl(self) -> &'static str {
        match self {
            Self::Vec4 => "vec4",
        }
    }
}

/// A workgroup-shared array the template indexes into.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct SharedVariable {
    pub name: String,
    pub element: SharedElement,
    pub len: u32,
}

impl SharedVariable {
    /// GLSL declaration, e.g. `shared highp vec4 sh_mem[16];`.
    pub fn declaration(&self) -> String {
        format!(
            "shared {} {} {}[{}];",
            ACCUMULATOR_PRECISION,
            self.element.glsl(),
            self.name,
            self.len
        )
    }
}

/// A `$...$` token found in a template body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Placeholder {
    /// `$name$`
    Parameter(String),
    /// `$object[c0, c1, c2]$`
    Accessor { object: String, coords: Vec<String> },
}

/// Platform built-ins a body may reference directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Builtin {
    LocalInvocationId,
    WorkGroupSize,
    NumWorkGroups,
}

impl Builtin {
    pub const ALL: [Builtin; 3] = [
        Builtin::LocalInvocationId,
        Builtin::WorkGroupSize,
        Builtin::NumWorkGroups,
    ];

    pub fn glsl(self) -> &'static str {
        match self {
            Self::LocalInvocationId => "gl_LocalInvocationID",
            Self::WorkGroupSize => "gl_WorkGroupSize",
            Self::NumWorkGroups => "gl_NumWorkGroups",
        }
    }
}

/// Shader template: bindings in declaration order and the body text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShaderTemplate {
    parameters: IndexMap<String, i32>,
    shared: Vec<SharedVariable>,
    body: String,
}

impl ShaderTemplate {
    pub fn new(body: impl Into<String>) -> Self {
        ShaderTemplate {
            parameters: IndexMap::new(),
            shared: Vec::new(),
            body: body.into(),
        }
    }

    /// Bind a scalar parameter. Names must be unique.
    pub fn bind(&mut self, name: &str, value: i32) -> Result<()> {
        if self.parameters.contains_key(name) {
            return Err(GenerateError::DuplicateParameter(name.to_string()));
        }
        self.parameters.insert(name.to_string(), value);
        Ok(())
    }

    pub fn declare_shared(&mut self, var: SharedVariable) {
        self.shared.push(var);
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn shared(&self) -> &[SharedVariable] {
        &self.shared
    }

    pub fn value(&self, name: &str) -> Option<i32> {
        self.parameters.get(name).copied()
    }

    /// Parameters in binding order.
    pub fn parameters(&self) -> Vec<KernelParameter> {
        self.parameters
            .iter()
            .map(|(name, &value)| KernelParameter {
                name: name.clone(),
                value,
            })
            .collect()
    }

    pub fn placeholders(&self) -> Result<Vec<Placeholder>> {
        placeholders(&self.body)
    }

    pub fn builtins(&self) -> Vec<Builtin> {
        builtins(&self.body)
    }

    /// Decompose into (parameters, shared variables, body).
    pub fn into_parts(self) -> (Vec<KernelParameter>, Vec<SharedVariable>, String) {
        let parameters = self.parameters();
        (parameters, self.shared, self.body)
    }
}

/// Scan `body` for `$...$` placeholders, in order of appearance.
pub fn placeholders(body: &str) -> Result<Vec<Placeholder>> {
    let mut found = Vec::new();
    let mut rest = body;
    while let Some(open) = rest.find('$') {
        let after = &rest[open + 1..];
        let close = after
            .find('$')
            .ok_or_else(|| GenerateError::UnresolvedPlaceholder(after.trim().to_string()))?;
        found.push(parse_placeholder(&after[..close])?);
        rest = &after[close + 1..];
    }
    Ok(found)
}

fn parse_placeholder(token: &str) -> Result<Placeholder> {
    let token = token.trim();
    let Some(open) = token.find('[') else {
        if token.is_empty() || !token.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(GenerateError::UnresolvedPlaceholder(token.to_string()));
        }
        return Ok(Placeholder::Parameter(token.to_string()));
    };
    let inner = token[open + 1..]
        .strip_suffix(']')
        .ok_or_else(|| GenerateError::UnresolvedPlaceholder(token.to_string()))?;
    Ok(Placeholder::Accessor {
        object: token[..open].trim().to_string(),
        coords: inner.split(',').map(|c| c.trim().to_string()).collect(),
    })
}

/// Platform built-ins referenced by `body`.
pub fn builtins(body: &str) -> Vec<Builtin> {
    Builtin::ALL
        .into_iter()
        .filter(|b| body.contains(b.glsl()))
        .collect()
}

/// Resolves a template to final GLSL the way the shader compiler would.
///
/// Parameters become integer literals; `$object[a, b, c]$` becomes
/// `read_<object>(a, b, c)` for registered objects.
#[derive(Debug, Clone, Default)]
pub struct TemplateBinder {
    objects: Vec<String>,
}

impl TemplateBinder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a readable tensor object.
    pub fn with_object(mut self, name: impl Into<String>) -> Self {
        self.objects.push(name.into());
        self
    }

    /// Substitute every placeholder and prepend shared declarations.
    pub fn render(
        &self,
        parameters: &[KernelParameter],
        shared: &[SharedVariable],
        body: &str,
    ) -> Result<String> {
        let mut out = String::with_capacity(body.len() + 64 * shared.len());
        for var in shared {
            out.push_str(&var.declaration());
            out.push('\n');
        }

        let mut rest = body;
        while let Some(open) = rest.find('$') {
            out.push_str(&rest[..open]);
            let after = &rest[open + 1..];
            let close = after
                .find('$')
                .ok_or_else(|| GenerateError::UnresolvedPlaceholder(after.trim().to_string()))?;
            out.push_str(&self.resolve(parameters, &after[..close])?);
            rest = &after[close + 1..];
        }
        out.push_str(rest);
        Ok(out)
    }

    pub fn render_template(&self, template: &ShaderTemplate) -> Result<String> {
        self.render(&template.parameters(), template.shared(), template.body())
    }

    fn resolve(&self, parameters: &[KernelParameter], token: &str) -> Result<String> {
        match parse_placeholder(token)? {
            Placeholder::Parameter(name) => parameters
                .iter()
                .find(|p| p.name == name)
                .map(|p| p.value.to_string())
                .ok_or(GenerateError::UnresolvedPlaceholder(name)),
            Placeholder::Accessor { object, coords } => {
                if !self.objects.contains(&object) || coords.len() != 3 {
                    return Err(GenerateError::UnresolvedPlaceholder(token.trim().to_string()));
                }
                Ok(format!("read_{}({})", object, coords.join(", ")))
            }
        }
    }
}
