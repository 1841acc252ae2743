#![forbid(unsafe_code)]
#![doc = include_str!("../README.md")]

mod error;
mod executor;
mod freeze;
mod graph;
mod group;
mod hash;
mod io;
#[cfg(feature = "logging")]
pub mod logging;
mod transform;
#[cfg(feature = "live")]
mod watch;

use std::sync::Arc;

use camino::Utf8PathBuf;
use glob::Pattern;

pub use crate::error::*;
pub use crate::executor::{run, run_all};
pub use crate::freeze::{FileRecord, Freezer, Manifest};
pub use crate::graph::{TaskGraph, WatchBinding};
pub use crate::group::MinifyFn;
pub use crate::hash::Hash32;
#[cfg(feature = "grass")]
pub use crate::transform::scss;
pub use crate::transform::{Transform, TransformPolicy};
#[cfg(feature = "live")]
pub use crate::watch::watch;

use crate::freeze::FreezeJob;
use crate::group::{GroupJob, MinifyOpts};

/// The declarative configuration for one asset pipeline.
///
/// A spec is assembled once through [`BuildSpec::builder`] and is immutable
/// afterwards; [`setup`] consumes it and produces the task graph.
pub struct BuildSpec {
    destination: Utf8PathBuf,
    scripts: Vec<(String, Vec<String>)>,
    styles: Vec<(String, Vec<String>)>,
    freeze: Vec<String>,
    manifest_path: Option<Utf8PathBuf>,
    watch_scripts: Option<String>,
    watch_styles: Option<String>,
    minify: bool,
    keep_unminified: bool,
    script_transforms: Vec<Transform>,
    style_transforms: Vec<Transform>,
    minifier: Option<MinifyFn>,
    task_prefix: String,
    watch_prefix: String,
}

impl BuildSpec {
    pub fn builder(destination: impl Into<Utf8PathBuf>) -> BuildSpecBuilder {
        BuildSpecBuilder::new(destination.into())
    }
}

/// A builder struct for assembling a [`BuildSpec`].
pub struct BuildSpecBuilder {
    spec: BuildSpec,
}

impl BuildSpecBuilder {
    fn new(destination: Utf8PathBuf) -> Self {
        Self {
            spec: BuildSpec {
                destination,
                scripts: Vec::new(),
                styles: Vec::new(),
                freeze: Vec::new(),
                manifest_path: None,
                watch_scripts: None,
                watch_styles: None,
                // Scripts are minified unless the caller opts out.
                minify: true,
                keep_unminified: false,
                script_transforms: Vec::new(),
                #[cfg(feature = "grass")]
                style_transforms: vec![crate::transform::scss()],
                #[cfg(not(feature = "grass"))]
                style_transforms: Vec::new(),
                minifier: None,
                task_prefix: "build".to_string(),
                watch_prefix: "watch".to_string(),
            },
        }
    }

    /// Add a script group: one output bundle built from the given input
    /// patterns, concatenated in pattern order.
    pub fn script(
        mut self,
        output: impl Into<String>,
        patterns: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.spec
            .scripts
            .push((output.into(), patterns.into_iter().map(Into::into).collect()));
        self
    }

    /// Add a stylesheet group, analogous to [`script`](Self::script).
    pub fn style(
        mut self,
        output: impl Into<String>,
        patterns: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.spec
            .styles
            .push((output.into(), patterns.into_iter().map(Into::into).collect()));
        self
    }

    /// Patterns selecting already-built outputs to freeze under
    /// content-hashed names in the production task.
    pub fn freeze(mut self, patterns: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.spec
            .freeze
            .extend(patterns.into_iter().map(Into::into));
        self
    }

    /// Where the freeze manifest is written. Defaults to
    /// `<destination>/manifest.json`.
    pub fn manifest_path(mut self, path: impl Into<Utf8PathBuf>) -> Self {
        self.spec.manifest_path = Some(path.into());
        self
    }

    /// Re-run the script umbrella task whenever a path matching this glob
    /// changes.
    pub fn watch_scripts(mut self, glob: impl Into<String>) -> Self {
        self.spec.watch_scripts = Some(glob.into());
        self
    }

    /// Re-run the style umbrella task whenever a path matching this glob
    /// changes.
    pub fn watch_styles(mut self, glob: impl Into<String>) -> Self {
        self.spec.watch_styles = Some(glob.into());
        self
    }

    /// Toggle script minification (on by default). Styles have no toggle;
    /// their compile chain always optimizes.
    pub fn minify(mut self, minify: bool) -> Self {
        self.spec.minify = minify;
        self
    }

    /// Keep the unminified bundle and write the minified bytes next to it
    /// as `<name>.min.<ext>`.
    pub fn keep_unminified(mut self, keep: bool) -> Self {
        self.spec.keep_unminified = keep;
        self
    }

    /// Register a dialect transform for script inputs. Transforms apply in
    /// registration order to the files whose extension they recognize.
    pub fn script_transform(mut self, transform: Transform) -> Self {
        self.spec.script_transforms.push(transform);
        self
    }

    /// Register an additional transform for style inputs, after the
    /// built-in stylesheet compiler.
    pub fn style_transform(mut self, transform: Transform) -> Self {
        self.spec.style_transforms.push(transform);
        self
    }

    /// Register the whole-bundle script minifier.
    pub fn minifier<F>(mut self, minifier: F) -> Self
    where
        F: Fn(&[u8]) -> anyhow::Result<Vec<u8>> + Send + Sync + 'static,
    {
        self.spec.minifier = Some(Arc::new(minifier));
        self
    }

    /// Base name for the build task family (defaults to `build`).
    pub fn task_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.spec.task_prefix = prefix.into();
        self
    }

    /// Base name for the watch binding family (defaults to `watch`).
    pub fn watch_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.spec.watch_prefix = prefix.into();
        self
    }

    pub fn finish(self) -> BuildSpec {
        self.spec
    }
}

/// Compose the task graph described by `spec`.
///
/// With `<p>` as the task prefix, the registered tasks are:
///
/// * `<p>:scripts:<name>` / `<p>:styles:<name>`: one per group
/// * `<p>:scripts` / `<p>:styles`: umbrellas over their groups
/// * `<p>:production`: present when freeze targets are configured; runs
///   the freeze stage after every build umbrella it freezes from
/// * `<p>`: the top-level build, depending on all of the above
///
/// Watch globs become [`WatchBinding`]s named `<watch prefix>:scripts` and
/// `<watch prefix>:styles`, each re-triggering its category's umbrella.
pub fn setup(spec: BuildSpec) -> Result<TaskGraph, PipelineError> {
    let BuildSpec {
        destination,
        scripts,
        styles,
        freeze,
        manifest_path,
        watch_scripts,
        watch_styles,
        minify,
        keep_unminified,
        script_transforms,
        style_transforms,
        minifier,
        task_prefix,
        watch_prefix,
    } = spec;

    let mut graph = TaskGraph::new();

    let minify_opts = minify.then(|| MinifyOpts {
        minifier,
        keep_unminified,
    });

    let script_umbrella = add_category(
        &mut graph,
        &task_prefix,
        "scripts",
        scripts,
        &destination,
        Arc::new(script_transforms),
        minify_opts,
    );

    let style_umbrella = add_category(
        &mut graph,
        &task_prefix,
        "styles",
        styles,
        &destination,
        Arc::new(style_transforms),
        None,
    );

    let production = if freeze.is_empty() {
        None
    } else {
        let job = Arc::new(FreezeJob {
            patterns: freeze,
            destination: destination.clone(),
            manifest_path: manifest_path.unwrap_or_else(|| destination.join("manifest.json")),
        });

        let node = graph.add_task(
            format!("{task_prefix}:production"),
            Some(Arc::new(move || job.run())),
        );
        for umbrella in [script_umbrella, style_umbrella].into_iter().flatten() {
            graph.add_dependency(umbrella, node);
        }
        Some(node)
    };

    let top = graph.add_task(task_prefix.clone(), None);
    for dep in [script_umbrella, style_umbrella, production]
        .into_iter()
        .flatten()
    {
        graph.add_dependency(dep, top);
    }

    for (glob, category, umbrella) in [
        (watch_scripts, "scripts", script_umbrella),
        (watch_styles, "styles", style_umbrella),
    ] {
        let Some(glob) = glob else { continue };
        Pattern::new(&glob)?;

        if umbrella.is_none() {
            tracing::warn!("watch glob '{}' has no {} groups to rebuild", glob, category);
            continue;
        }

        graph.bindings.push(WatchBinding {
            name: format!("{watch_prefix}:{category}"),
            glob,
            task: format!("{task_prefix}:{category}"),
        });
    }

    Ok(graph)
}

fn add_category(
    graph: &mut TaskGraph,
    prefix: &str,
    category: &str,
    groups: Vec<(String, Vec<String>)>,
    destination: &Utf8PathBuf,
    chain: Arc<Vec<Transform>>,
    minify: Option<MinifyOpts>,
) -> Option<petgraph::graph::NodeIndex> {
    if groups.is_empty() {
        return None;
    }

    let nodes: Vec<_> = groups
        .into_iter()
        .map(|(output, patterns)| {
            let job = Arc::new(GroupJob {
                output: output.clone(),
                patterns,
                destination: destination.clone(),
                chain: chain.clone(),
                minify: minify.clone(),
            });

            graph.add_task(
                format!("{prefix}:{category}:{output}"),
                Some(Arc::new(move || job.run())),
            )
        })
        .collect();

    let umbrella = graph.add_task(format!("{prefix}:{category}"), None);
    for node in nodes {
        graph.add_dependency(node, umbrella);
    }

    Some(umbrella)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> BuildSpecBuilder {
        BuildSpec::builder("dest")
    }

    #[test]
    fn each_script_group_gets_its_own_task_under_the_umbrella() {
        let graph = setup(
            spec()
                .script("a.js", ["src/a/*.js"])
                .script("b.js", ["src/b/*.js"])
                .finish(),
        )
        .unwrap();

        assert!(graph.contains("build:scripts:a.js"));
        assert!(graph.contains("build:scripts:b.js"));
        assert_eq!(
            graph.dependencies_of("build:scripts"),
            vec!["build:scripts:a.js", "build:scripts:b.js"],
        );
        assert_eq!(graph.dependencies_of("build"), vec!["build:scripts"]);
    }

    #[test]
    fn style_groups_compose_analogously() {
        let graph = setup(spec().style("style.css", ["css/*.scss"]).finish()).unwrap();

        assert_eq!(
            graph.dependencies_of("build:styles"),
            vec!["build:styles:style.css"],
        );
        assert_eq!(graph.dependencies_of("build"), vec!["build:styles"]);
    }

    #[test]
    fn production_task_depends_on_every_build_umbrella() {
        let graph = setup(
            spec()
                .script("app.js", ["src/*.js"])
                .style("style.css", ["css/*.scss"])
                .freeze(["dest/*.js", "dest/*.css"])
                .finish(),
        )
        .unwrap();

        assert_eq!(
            graph.dependencies_of("build:production"),
            vec!["build:scripts", "build:styles"],
        );
        assert_eq!(
            graph.dependencies_of("build"),
            vec!["build:production", "build:scripts", "build:styles"],
        );
    }

    #[test]
    fn no_freeze_targets_means_no_production_task() {
        let graph = setup(spec().script("app.js", ["src/*.js"]).finish()).unwrap();
        assert!(!graph.contains("build:production"));
    }

    #[test]
    fn freeze_without_build_groups_still_composes() {
        let graph = setup(spec().freeze(["dest/*.js"]).finish()).unwrap();

        assert!(graph.contains("build:production"));
        assert!(graph.dependencies_of("build:production").is_empty());
    }

    #[test]
    fn task_prefix_renames_the_whole_family() {
        let graph = setup(
            spec()
                .task_prefix("bundle:client")
                .script("app.js", ["src/*.js"])
                .freeze(["dest/*.js"])
                .finish(),
        )
        .unwrap();

        assert!(graph.contains("bundle:client"));
        assert!(graph.contains("bundle:client:scripts:app.js"));
        assert!(graph.contains("bundle:client:production"));
        assert!(!graph.contains("build"));
    }

    #[test]
    fn watch_globs_bind_to_their_category_umbrella() {
        let graph = setup(
            spec()
                .script("app.js", ["src/js/*.js"])
                .style("style.css", ["src/css/*.scss"])
                .watch_scripts("src/js/**/*.js")
                .watch_styles("src/css/**/*.scss")
                .finish(),
        )
        .unwrap();

        let bindings = graph.watch_bindings();
        assert_eq!(bindings.len(), 2);
        assert_eq!(bindings[0].name, "watch:scripts");
        assert_eq!(bindings[0].task, "build:scripts");
        assert_eq!(bindings[1].name, "watch:styles");
        assert_eq!(bindings[1].task, "build:styles");
    }

    #[test]
    fn watch_glob_without_matching_groups_registers_nothing() {
        let graph = setup(spec().watch_scripts("src/js/**/*.js").finish()).unwrap();
        assert!(graph.watch_bindings().is_empty());
    }

    #[test]
    fn invalid_watch_glob_is_a_setup_error() {
        let result = setup(
            spec()
                .script("app.js", ["src/*.js"])
                .watch_scripts("src/[")
                .finish(),
        );
        assert!(matches!(result, Err(PipelineError::GlobPattern(_))));
    }
}
