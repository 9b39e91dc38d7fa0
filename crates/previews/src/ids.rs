use std::fmt;

use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::Serialize;

const ID_LENGTH: usize = 10;

fn random_id() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(ID_LENGTH)
        .map(char::from)
        .collect()
}

/// Opaque identifier of a [`Shader`](crate::Shader), stable for its lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ShaderId(String);

impl ShaderId {
    pub fn generate() -> Self {
        Self(random_id())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ShaderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque identifier of a [`Preview`](crate::Preview).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct PreviewId(String);

impl PreviewId {
    pub fn generate() -> Self {
        Self(random_id())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PreviewId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Addresses either the singleton background or one preview in the collection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PreviewSlot {
    Background,
    Preview(PreviewId),
}

impl From<PreviewId> for PreviewSlot {
    fn from(id: PreviewId) -> Self {
        Self::Preview(id)
    }
}

impl From<&PreviewId> for PreviewSlot {
    fn from(id: &PreviewId) -> Self {
        Self::Preview(id.clone())
    }
}

impl fmt::Display for PreviewSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PreviewSlot::Background => f.write_str("background"),
            PreviewSlot::Preview(id) => write!(f, "preview {id}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_are_alphanumeric_and_distinct() {
        let a = ShaderId::generate();
        let b = ShaderId::generate();
        assert_eq!(a.as_str().len(), ID_LENGTH);
        assert!(a.as_str().chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(a, b);
    }
}
