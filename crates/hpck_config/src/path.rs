//! Structural paths into a blueprint, used for error reporting.
//!
//! Paths are built with the YAML field names so that a user can find the
//! offending location in their blueprint file, e.g.
//! `deployment_groups[0].modules[1].settings.network_name`.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Segment {
    Field(String),
    Index(usize),
}

/// A location within a blueprint (or relative location within a value).
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct BpPath {
    segments: Vec<Segment>,
}

impl BpPath {
    /// The empty path.
    pub fn root() -> Self {
        Self::default()
    }

    /// Append a field access.
    pub fn dot(&self, name: impl Into<String>) -> Self {
        let mut p = self.clone();
        p.segments.push(Segment::Field(name.into()));
        p
    }

    /// Append a list index.
    pub fn at(&self, index: usize) -> Self {
        let mut p = self.clone();
        p.segments.push(Segment::Index(index));
        p
    }

    /// Append a relative path.
    pub fn join(&self, rel: &BpPath) -> Self {
        let mut p = self.clone();
        p.segments.extend(rel.segments.iter().cloned());
        p
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn blueprint_name() -> Self {
        Self::root().dot("blueprint_name")
    }

    pub fn vars() -> Self {
        Self::root().dot("vars")
    }

    pub fn var(name: &str) -> Self {
        Self::vars().dot(name)
    }

    pub fn backend_defaults() -> Self {
        Self::root().dot("terraform_backend_defaults")
    }

    pub fn validator(index: usize) -> Self {
        Self::root().dot("validators").at(index)
    }

    pub fn group(index: usize) -> Self {
        Self::root().dot("deployment_groups").at(index)
    }

    pub fn module(group: usize, module: usize) -> Self {
        Self::group(group).dot("modules").at(module)
    }
}

impl fmt::Display for BpPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for segment in &self.segments {
            match segment {
                Segment::Field(name) => {
                    if !first {
                        f.write_str(".")?;
                    }
                    f.write_str(name)?;
                }
                Segment::Index(i) => write!(f, "[{}]", i)?,
            }
            first = false;
        }
        Ok(())
    }
}
