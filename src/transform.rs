//! Content transforms applied to source files on their way into a bundle.
//!
//! Dispatch is an ordered table of `(extension set, transform)` pairs. A
//! file is passed through a transform only when its path carries one of the
//! transform's recognized extensions; files recognized by nothing flow
//! through byte-identical. Each transform names an explicit error policy,
//! which is what decides whether a dialect failure degrades the single file
//! or fails the whole task.

use camino::Utf8Path;

use crate::error::TaskError;

/// What to do when a transform returns an error for one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformPolicy {
    /// Log the error and keep the file's previous bytes. Used for script
    /// dialects and minifiers, where the untransformed source is still a
    /// usable (if suboptimal) output.
    PassThrough,
    /// Abort the owning task. Used for stylesheet dialects, where there is
    /// no meaningful untransformed fallback.
    FailTask,
}

type TransformFn = Box<dyn Fn(&Utf8Path, &[u8]) -> anyhow::Result<Vec<u8>> + Send + Sync>;

/// A named, pure content transform with its extension predicate and error
/// policy. The function receives the source path alongside the bytes so
/// compilers that resolve relative imports can do so.
pub struct Transform {
    name: String,
    extensions: Vec<String>,
    policy: TransformPolicy,
    apply: TransformFn,
}

impl Transform {
    pub fn new<F>(
        name: impl Into<String>,
        extensions: impl IntoIterator<Item = impl Into<String>>,
        policy: TransformPolicy,
        apply: F,
    ) -> Self
    where
        F: Fn(&Utf8Path, &[u8]) -> anyhow::Result<Vec<u8>> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            extensions: extensions.into_iter().map(Into::into).collect(),
            policy,
            apply: Box::new(apply),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Extension match is suffix-based, so compound extensions such as
    /// `coffee.md` work the way callers expect.
    pub fn recognizes(&self, path: &Utf8Path) -> bool {
        self.extensions
            .iter()
            .any(|ext| path.as_str().ends_with(&format!(".{ext}")))
    }
}

impl std::fmt::Debug for Transform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transform")
            .field("name", &self.name)
            .field("extensions", &self.extensions)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

/// Run `bytes` through every transform in `chain` that recognizes `path`,
/// in table order.
pub fn apply_chain(
    chain: &[Transform],
    path: &Utf8Path,
    bytes: Vec<u8>,
) -> Result<Vec<u8>, TaskError> {
    let mut acc = bytes;

    for transform in chain.iter().filter(|t| t.recognizes(path)) {
        match (transform.apply)(path, &acc) {
            Ok(out) => acc = out,
            Err(e) => match transform.policy {
                TransformPolicy::PassThrough => {
                    tracing::warn!(
                        "transform '{}' failed on '{}', passing file through: {}",
                        transform.name,
                        path,
                        e,
                    );
                }
                TransformPolicy::FailTask => {
                    return Err(TaskError::Transform(
                        transform.name.clone(),
                        path.to_string(),
                        e,
                    ));
                }
            },
        }
    }

    Ok(acc)
}

/// Stylesheet compilation through `grass`, with the optimization pass baked
/// in via compressed output. Compiler errors fail the task.
#[cfg(feature = "grass")]
pub fn scss() -> Transform {
    Transform::new(
        "scss",
        ["scss"],
        TransformPolicy::FailTask,
        |path: &Utf8Path, _bytes: &[u8]| {
            let opts = grass::Options::default().style(grass::OutputStyle::Compressed);
            let css = grass::from_path(path, &opts)?;
            Ok(css.into_bytes())
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    fn upper() -> Transform {
        Transform::new(
            "upper",
            ["up"],
            TransformPolicy::PassThrough,
            |_, bytes: &[u8]| Ok(bytes.to_ascii_uppercase()),
        )
    }

    fn exclaim() -> Transform {
        Transform::new(
            "exclaim",
            ["up", "bang"],
            TransformPolicy::PassThrough,
            |_, bytes: &[u8]| {
                let mut out = bytes.to_vec();
                out.push(b'!');
                Ok(out)
            },
        )
    }

    fn broken(policy: TransformPolicy) -> Transform {
        Transform::new("broken", ["up"], policy, |_, _: &[u8]| {
            Err(anyhow!("no parse"))
        })
    }

    #[test]
    fn transforms_apply_in_table_order() {
        let chain = [upper(), exclaim()];
        let out = apply_chain(&chain, Utf8Path::new("a.up"), b"hey".to_vec()).unwrap();
        assert_eq!(out, b"HEY!");
    }

    #[test]
    fn unrecognized_extensions_pass_through_untouched() {
        let chain = [upper()];
        let out = apply_chain(&chain, Utf8Path::new("a.js"), b"hey".to_vec()).unwrap();
        assert_eq!(out, b"hey");
    }

    #[test]
    fn compound_extensions_are_recognized() {
        let t = Transform::new(
            "literate",
            ["coffee.md"],
            TransformPolicy::PassThrough,
            |_, bytes: &[u8]| Ok(bytes.to_vec()),
        );
        assert!(t.recognizes(Utf8Path::new("src/app.coffee.md")));
        assert!(!t.recognizes(Utf8Path::new("src/app.md")));
    }

    #[test]
    fn pass_through_keeps_prior_bytes_and_continues_the_chain() {
        let chain = [broken(TransformPolicy::PassThrough), exclaim()];
        let out = apply_chain(&chain, Utf8Path::new("a.up"), b"hey".to_vec()).unwrap();
        assert_eq!(out, b"hey!");
    }

    #[test]
    fn fail_task_aborts_with_a_transform_error() {
        let chain = [broken(TransformPolicy::FailTask), exclaim()];
        let err = apply_chain(&chain, Utf8Path::new("a.up"), b"hey".to_vec()).unwrap_err();
        assert!(matches!(err, TaskError::Transform(name, file, _)
            if name == "broken" && file == "a.up"));
    }
}
