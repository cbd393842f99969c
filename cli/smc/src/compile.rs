//! The compile pipeline: read → parse → validate → render DOT and every
//! requested language into memory → write artifacts.
//!
//! Nothing touches the filesystem until every backend has succeeded, so a
//! failing compile leaves no partial output files.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use smc_codegen::{dot, generate, CodegenError, Language};
use smc_model::{validate, Model, ModelError};

/// Run one compile. `lang_override` wins over the model's `lang:` key;
/// with neither present the default is Rust.
pub fn run(input: &Path, lang_override: Option<&str>, output_base: &Path) -> Result<()> {
    let text = fs::read_to_string(input)
        .map_err(|e| anyhow!("input: {}: {e}", input.display()))?;
    let model = Model::from_yaml_str(&text).map_err(|e| model_error(input, e))?;

    println!("Validating model...");
    validate(&model).map_err(|e| model_error(input, e))?;
    println!("Model OK.");

    let languages = resolve_languages(&model, lang_override, input)?;
    let basename = output_base
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("statemachine")
        .to_string();

    println!("Generating Graphviz DOT...");
    let mut outputs: Vec<(PathBuf, String)> =
        vec![(artifact_path(output_base, "dot"), dot::render(&model))];

    for language in &languages {
        println!("Generating {} code...", language.name());
        let backend = language.backend();
        let artifacts = generate(&model, backend.as_ref(), &basename)
            .map_err(|e| codegen_error(input, e))?;
        for artifact in artifacts {
            outputs.push((artifact_path(output_base, artifact.extension), artifact.content));
        }
    }

    if let Some(dir) = output_base.parent() {
        if !dir.as_os_str().is_empty() {
            fs::create_dir_all(dir).map_err(|e| anyhow!("input: {}: {e}", dir.display()))?;
        }
    }
    for (path, content) in &outputs {
        fs::write(path, content).map_err(|e| anyhow!("input: {}: {e}", path.display()))?;
        println!(" -> {} created.", path.display());
    }
    Ok(())
}

fn artifact_path(output_base: &Path, extension: &str) -> PathBuf {
    PathBuf::from(format!("{}.{extension}", output_base.display()))
}

fn resolve_languages(
    model: &Model,
    lang_override: Option<&str>,
    input: &Path,
) -> Result<Vec<Language>> {
    let names: Vec<String> = match lang_override {
        Some(name) => vec![name.to_string()],
        None if !model.languages.is_empty() => model.languages.clone(),
        None => vec!["rust".to_string()],
    };
    names
        .iter()
        .map(|name| Language::parse(name).map_err(|e| codegen_error(input, e)))
        .collect()
}

/// Map model errors onto the `<kind>: <path>: <message>` diagnostic shape.
fn model_error(input: &Path, err: ModelError) -> anyhow::Error {
    match err {
        ModelError::Io(_) | ModelError::Yaml(_) => {
            anyhow!("input: {}: {err}", input.display())
        }
        ModelError::DuplicateDecision { name, path } => {
            anyhow!("validation: {path}: duplicate decision name '{name}'")
        }
        ModelError::Validation { path, message } => {
            anyhow!("validation: {path}: {message}")
        }
    }
}

fn codegen_error(input: &Path, err: CodegenError) -> anyhow::Error {
    match err {
        CodegenError::UnknownLanguage { .. } => anyhow!("input: {}: {err}", input.display()),
        err => anyhow!("emission: {}: {err}", input.display()),
    }
}
