//! Generated client output and API URL resolution.

use std::path::PathBuf;

use async_trait::async_trait;

use crate::artifacts::write_atomic;
use crate::config::{CollectionConfig, FieldType, Settings};
use crate::error::DevResult;
use crate::paths::ResolvedPaths;
use crate::schema::{BuiltSchema, type_name};

/// Files written by one code generation pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodegenOutput {
    pub api_url: String,
    pub files: Vec<PathBuf>,
}

#[async_trait]
pub trait Codegen: Send + Sync {
    async fn generate(
        &self,
        built: &BuiltSchema,
        settings: &Settings,
        paths: &ResolvedPaths,
    ) -> DevResult<CodegenOutput>;
}

/// URL clients should send queries to.
///
/// Hosted mode when a cloud client id is configured, local dev server otherwise.
pub fn api_url(settings: &Settings) -> String {
    match settings.cloud.client_id.as_deref() {
        Some(client_id) if !client_id.is_empty() => format!(
            "{}/content/{client_id}/github/{}",
            settings.cloud.content_api_url.trim_end_matches('/'),
            settings.cloud.branch
        ),
        _ => format!("http://localhost:{}/graphql", settings.server.port),
    }
}

/// Writes SDL, query and fragment documents and the admin page, plus the
/// typed client unless `no_client_build` is set.
#[derive(Debug, Default, Clone)]
pub struct ClientCodegen {
    no_client_build: bool,
}

impl ClientCodegen {
    pub fn new(no_client_build: bool) -> Self {
        Self { no_client_build }
    }
}

#[async_trait]
impl Codegen for ClientCodegen {
    async fn generate(
        &self,
        built: &BuiltSchema,
        settings: &Settings,
        paths: &ResolvedPaths,
    ) -> DevResult<CodegenOutput> {
        let api_url = api_url(settings);
        let dir = &paths.generated_folder;

        let mut outputs = vec![
            (dir.join("schema.gql"), built.sdl.clone()),
            (dir.join("queries.gql"), built.query_doc.clone()),
            (dir.join("frags.gql"), built.fragment_doc.clone()),
            (paths.output_folder.join("index.html"), render_admin_shell(&api_url)),
        ];
        if !self.no_client_build {
            outputs.push((dir.join("types.ts"), render_types(&settings.collections)));
            outputs.push((dir.join("client.ts"), render_client(&api_url)));
        }

        let mut files = Vec::with_capacity(outputs.len());
        for (path, contents) in outputs {
            write_atomic(path.clone(), contents.into_bytes()).await?;
            files.push(path);
        }

        crate::debug_event!("codegen", "wrote", "{} files", files.len());
        Ok(CodegenOutput { api_url, files })
    }
}

fn ts_type(field_type: FieldType) -> &'static str {
    match field_type {
        FieldType::Number => "number",
        FieldType::Boolean => "boolean",
        FieldType::RichText => "any",
        FieldType::String | FieldType::Datetime | FieldType::Image | FieldType::Reference => {
            "string"
        }
    }
}

fn render_types(collections: &[CollectionConfig]) -> String {
    let mut out = String::from("// Generated file, do not edit.\n\n");
    for collection in collections {
        out.push_str(&format!("export type {} = {{\n", type_name(&collection.name)));
        out.push_str("  id: string;\n");
        for field in &collection.fields {
            let optional = if field.required { "" } else { "?" };
            let suffix = if field.list { "[]" } else { "" };
            out.push_str(&format!(
                "  {}{optional}: {}{suffix};\n",
                field.name,
                ts_type(field.field_type)
            ));
        }
        out.push_str("};\n\n");
    }
    out
}

/// Static page served from the build output folder.
fn render_admin_shell(api_url: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n  <meta charset=\"utf-8\" />\n  <title>Content Admin</title>\n</head>\n<body>\n  <div id=\"root\" data-api-url=\"{api_url}\"></div>\n</body>\n</html>\n"
    )
}

fn render_client(api_url: &str) -> String {
    format!(
        "// Generated file, do not edit.\n\nexport const apiURL = \"{api_url}\";\n\nexport async function request(query: string, variables: Record<string, unknown> = {{}}) {{\n  const res = await fetch(apiURL, {{\n    method: \"POST\",\n    headers: {{ \"Content-Type\": \"application/json\" }},\n    body: JSON.stringify({{ query, variables }}),\n  }});\n  return res.json();\n}}\n"
    )
}
