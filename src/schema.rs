//! Schema building seam.
//!
//! A [`SchemaBuilder`] turns validated settings into the three derived
//! artifacts plus the query and fragment documents used by code generation.
//! All five outputs of one call belong to the same generation.

use async_trait::async_trait;
use indexmap::IndexMap;
use serde_json::{Value, json};

use crate::artifacts::ArtifactSnapshot;
use crate::config::{CollectionConfig, FieldConfig, Settings};
use crate::error::DevResult;
use crate::index::IndexHandle;

/// Output of one schema build.
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltSchema {
    /// Content-type schema.
    pub schema: Value,
    /// Type name to collection resolution table.
    pub lookup: Value,
    /// Query schema as a JSON document of type definitions.
    pub graphql: Value,
    /// Query schema in SDL form.
    pub sdl: String,
    pub query_doc: String,
    pub fragment_doc: String,
}

impl BuiltSchema {
    pub fn snapshot(&self) -> ArtifactSnapshot {
        ArtifactSnapshot {
            schema: self.schema.clone(),
            lookup: self.lookup.clone(),
            graphql: self.graphql.clone(),
        }
    }
}

#[async_trait]
pub trait SchemaBuilder: Send + Sync {
    async fn build(&self, index: &IndexHandle, settings: &Settings) -> DevResult<BuiltSchema>;
}

/// Builds a schema with one document type per configured collection.
#[derive(Debug, Default, Clone, Copy)]
pub struct CollectionSchemaBuilder;

#[async_trait]
impl SchemaBuilder for CollectionSchemaBuilder {
    async fn build(&self, _index: &IndexHandle, settings: &Settings) -> DevResult<BuiltSchema> {
        let collections = &settings.collections;

        let schema = json!({
            "version": { "fullVersion": env!("CARGO_PKG_VERSION") },
            "collections": collections.iter().map(collection_schema).collect::<Vec<_>>(),
        });

        let mut lookup = IndexMap::new();
        for collection in collections {
            let type_name = type_name(&collection.name);
            lookup.insert(
                type_name.clone(),
                json!({
                    "type": type_name,
                    "resolveType": "collectionDocument",
                    "collection": collection.name,
                    "createDocument": "create",
                    "updateDocument": "update",
                }),
            );
            lookup.insert(
                format!("{type_name}Connection"),
                json!({
                    "type": format!("{type_name}Connection"),
                    "resolveType": "collectionDocumentList",
                    "collection": collection.name,
                }),
            );
        }

        let definitions = type_definitions(collections);
        let graphql = json!({
            "kind": "Document",
            "definitions": definitions,
        });

        Ok(BuiltSchema {
            schema,
            lookup: serde_json::to_value(lookup)?,
            graphql,
            sdl: render_sdl(&definitions),
            query_doc: render_queries(collections),
            fragment_doc: render_fragments(collections),
        })
    }
}

/// `blog_posts` -> `BlogPosts`
pub fn type_name(collection: &str) -> String {
    collection
        .split('_')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect()
}

fn collection_schema(collection: &CollectionConfig) -> Value {
    json!({
        "name": collection.name,
        "label": collection.label.as_deref().unwrap_or(&collection.name),
        "path": collection.normalized_path(),
        "format": collection.format(),
        "fields": collection.fields.iter().map(|f| json!({
            "name": f.name,
            "type": f.field_type,
            "label": f.label.as_deref().unwrap_or(&f.name),
            "required": f.required,
            "list": f.list,
        })).collect::<Vec<_>>(),
    })
}

fn field_type_ref(field: &FieldConfig) -> String {
    let scalar = field.field_type.graphql_type();
    let inner = if field.list {
        format!("[{scalar}]")
    } else {
        scalar.to_string()
    };
    if field.required {
        format!("{inner}!")
    } else {
        inner
    }
}

fn type_definitions(collections: &[CollectionConfig]) -> Vec<Value> {
    let mut definitions = Vec::new();
    let mut query_fields = vec![json!({ "name": "document", "type": "Node" })];

    for collection in collections {
        let name = type_name(&collection.name);
        let mut fields = vec![
            json!({ "name": "id", "type": "ID!" }),
            json!({ "name": "_sys", "type": "SystemInfo!" }),
        ];
        fields.extend(
            collection
                .fields
                .iter()
                .map(|f| json!({ "name": f.name, "type": field_type_ref(f) })),
        );
        definitions.push(json!({
            "kind": "ObjectTypeDefinition",
            "name": name,
            "interfaces": ["Node", "Document"],
            "fields": fields,
        }));
        definitions.push(json!({
            "kind": "ObjectTypeDefinition",
            "name": format!("{name}Connection"),
            "interfaces": ["Connection"],
            "fields": [
                { "name": "totalCount", "type": "Float!" },
                { "name": "edges", "type": format!("[{name}]") },
            ],
        }));

        query_fields.push(json!({
            "name": collection.name,
            "type": format!("{name}!"),
            "arguments": [{ "name": "relativePath", "type": "String" }],
        }));
        query_fields.push(json!({
            "name": format!("{}Connection", collection.name),
            "type": format!("{name}Connection!"),
            "arguments": [
                { "name": "first", "type": "Float" },
                { "name": "after", "type": "String" },
            ],
        }));
    }

    definitions.push(json!({
        "kind": "ObjectTypeDefinition",
        "name": "Query",
        "interfaces": [],
        "fields": query_fields,
    }));
    definitions
}

fn render_sdl(definitions: &[Value]) -> String {
    let mut sdl = String::from(
        "scalar JSON\n\ninterface Node {\n  id: ID!\n}\n\ninterface Document {\n  id: ID!\n  _sys: SystemInfo!\n}\n\ninterface Connection {\n  totalCount: Float!\n}\n\ntype SystemInfo {\n  filename: String!\n  relativePath: String!\n  collection: String!\n}\n",
    );

    for def in definitions {
        let name = def["name"].as_str().unwrap_or_default();
        let interfaces: Vec<&str> = def["interfaces"]
            .as_array()
            .map(|list| list.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();
        sdl.push_str(&format!("\ntype {name}"));
        if !interfaces.is_empty() {
            sdl.push_str(&format!(" implements {}", interfaces.join(" & ")));
        }
        sdl.push_str(" {\n");
        for field in def["fields"].as_array().into_iter().flatten() {
            let field_name = field["name"].as_str().unwrap_or_default();
            let field_type = field["type"].as_str().unwrap_or_default();
            let args: Vec<String> = field["arguments"]
                .as_array()
                .into_iter()
                .flatten()
                .map(|a| {
                    format!(
                        "{}: {}",
                        a["name"].as_str().unwrap_or_default(),
                        a["type"].as_str().unwrap_or_default()
                    )
                })
                .collect();
            if args.is_empty() {
                sdl.push_str(&format!("  {field_name}: {field_type}\n"));
            } else {
                sdl.push_str(&format!("  {field_name}({}): {field_type}\n", args.join(", ")));
            }
        }
        sdl.push_str("}\n");
    }
    sdl
}

fn render_fragments(collections: &[CollectionConfig]) -> String {
    let mut doc = String::new();
    for collection in collections {
        let name = type_name(&collection.name);
        doc.push_str(&format!("fragment {name}Parts on {name} {{\n  __typename\n"));
        for field in &collection.fields {
            doc.push_str(&format!("  {}\n", field.name));
        }
        doc.push_str("}\n\n");
    }
    doc
}

fn render_queries(collections: &[CollectionConfig]) -> String {
    let mut doc = String::new();
    for collection in collections {
        let name = type_name(&collection.name);
        let field = &collection.name;
        doc.push_str(&format!(
            "query {field}($relativePath: String!) {{\n  {field}(relativePath: $relativePath) {{\n    ... on Document {{\n      _sys {{\n        filename\n        relativePath\n      }}\n      id\n    }}\n    ...{name}Parts\n  }}\n}}\n\n"
        ));
        doc.push_str(&format!(
            "query {field}Connection($first: Float, $after: String) {{\n  {field}Connection(first: $first, after: $after) {{\n    totalCount\n    edges {{\n      ...{name}Parts\n    }}\n  }}\n}}\n\n"
        ));
    }
    doc
}
