//! Search parameter templates.
//!
//! Each rule carries three minijinja templates (index selector, type selector
//! and query body) compiled once at initialization into a per-rule
//! [`minijinja::Environment`]. Every run renders them against the run's
//! [`ExecutionContext`].
//!
//! Structured query documents are compiled leaf by leaf: every string value
//! in the tree becomes its own template and is replaced by its rendered text,
//! so substitutions may appear in any nested string field and the rendered
//! values never need escaping. Raw query text is rendered as a whole and then
//! parsed as YAML or JSON.

mod filters;

use esalert_core::{ExecutionContext, SearchRequest};

const INDEX_TEMPLATE: &str = "search_index";
const TYPE_TEMPLATE: &str = "search_type";
const QUERY_TEMPLATE: &str = "search_query";

/// Source form of a rule's query body.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryTemplate {
    /// A nested document whose string fields may contain template syntax.
    Structured(serde_json::Value),
    /// YAML or JSON text with template syntax.
    Raw(String),
}

/// A template that failed to compile.
#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    #[error("invalid {template} template: {source}")]
    Syntax {
        template: &'static str,
        #[source]
        source: minijinja::Error,
    },
}

/// Errors raised while rendering search parameters for a run.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("rendering {template}: {source}")]
    Template {
        template: &'static str,
        #[source]
        source: minijinja::Error,
    },

    #[error("rendered query is not a valid document: {0}")]
    Query(#[from] serde_yaml::Error),
}

/// Compiled form of the query body.
enum CompiledQuery {
    /// Rendered as text under [`QUERY_TEMPLATE`], then parsed.
    Raw,
    /// The source document; its string leaves are templates named
    /// `search_query/<n>`, numbered in depth-first order.
    Structured(serde_json::Value),
}

/// The three compiled search templates of one rule.
pub struct CompiledSearch {
    env: minijinja::Environment<'static>,
    query: CompiledQuery,
}

impl std::fmt::Debug for CompiledSearch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledSearch").finish_non_exhaustive()
    }
}

impl CompiledSearch {
    /// Compile the index, type and query templates.
    pub fn compile(
        index: &str,
        doc_type: &str,
        query: &QueryTemplate,
    ) -> Result<Self, CompileError> {
        let mut env = filters::build_env();

        for (name, source) in [(INDEX_TEMPLATE, index), (TYPE_TEMPLATE, doc_type)] {
            env.add_template_owned(name, source.to_string())
                .map_err(|source| CompileError::Syntax {
                    template: name,
                    source,
                })?;
        }

        let query = match query {
            QueryTemplate::Raw(text) => {
                env.add_template_owned(QUERY_TEMPLATE, text.clone())
                    .map_err(|source| CompileError::Syntax {
                        template: QUERY_TEMPLATE,
                        source,
                    })?;
                CompiledQuery::Raw
            }
            QueryTemplate::Structured(document) => {
                let mut leaves = Vec::new();
                collect_leaves(document, &mut leaves);
                for (n, leaf) in leaves.into_iter().enumerate() {
                    env.add_template_owned(leaf_name(n), leaf)
                        .map_err(|source| CompileError::Syntax {
                            template: QUERY_TEMPLATE,
                            source,
                        })?;
                }
                CompiledQuery::Structured(document.clone())
            }
        };

        Ok(Self { env, query })
    }

    /// Render all three templates against a run context.
    ///
    /// An empty query body renders to an empty document.
    pub fn render(&self, ctx: &ExecutionContext) -> Result<SearchRequest, RenderError> {
        let value = ctx.to_value();

        let index = self.render_one(INDEX_TEMPLATE, &value)?;
        let doc_type = self.render_one(TYPE_TEMPLATE, &value)?;
        let query = match &self.query {
            CompiledQuery::Raw => parse_query(&self.render_one(QUERY_TEMPLATE, &value)?)?,
            CompiledQuery::Structured(document) => {
                let mut document = document.clone();
                let mut next = 0;
                self.render_leaves(&mut document, &value, &mut next)?;
                document
            }
        };

        Ok(SearchRequest {
            index,
            doc_type,
            query,
        })
    }

    fn render_one(&self, name: &'static str, ctx: &serde_json::Value) -> Result<String, RenderError> {
        self.render_named(name, name, ctx)
    }

    fn render_named(
        &self,
        template: &'static str,
        name: &str,
        ctx: &serde_json::Value,
    ) -> Result<String, RenderError> {
        self.env
            .get_template(name)
            .and_then(|tmpl| tmpl.render(ctx))
            .map_err(|source| RenderError::Template { template, source })
    }

    /// Replace every string leaf with its rendered template, in the same
    /// depth-first order [`collect_leaves`] numbered them.
    fn render_leaves(
        &self,
        node: &mut serde_json::Value,
        ctx: &serde_json::Value,
        next: &mut usize,
    ) -> Result<(), RenderError> {
        match node {
            serde_json::Value::String(text) => {
                *text = self.render_named(QUERY_TEMPLATE, &leaf_name(*next), ctx)?;
                *next += 1;
            }
            serde_json::Value::Array(items) => {
                for item in items {
                    self.render_leaves(item, ctx, next)?;
                }
            }
            serde_json::Value::Object(map) => {
                for item in map.values_mut() {
                    self.render_leaves(item, ctx, next)?;
                }
            }
            _ => {}
        }
        Ok(())
    }
}

fn leaf_name(n: usize) -> String {
    format!("{QUERY_TEMPLATE}/{n}")
}

fn collect_leaves(node: &serde_json::Value, leaves: &mut Vec<String>) {
    match node {
        serde_json::Value::String(text) => leaves.push(text.clone()),
        serde_json::Value::Array(items) => items.iter().for_each(|item| collect_leaves(item, leaves)),
        serde_json::Value::Object(map) => map.values().for_each(|item| collect_leaves(item, leaves)),
        _ => {}
    }
}

fn parse_query(text: &str) -> Result<serde_json::Value, serde_yaml::Error> {
    if text.trim().is_empty() {
        return Ok(serde_json::Value::Object(serde_json::Map::new()));
    }
    match serde_yaml::from_str::<serde_json::Value>(text)? {
        serde_json::Value::Null => Ok(serde_json::Value::Object(serde_json::Map::new())),
        document => Ok(document),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use esalert_core::Metadata;
    use serde_json::json;

    fn context() -> ExecutionContext {
        let mut metadata = Metadata::new();
        metadata.insert("service".to_string(), json!("checkout"));
        metadata.insert("threshold".to_string(), json!(5));
        ExecutionContext::new(
            "error-spike",
            Utc.with_ymd_and_hms(2026, 2, 16, 12, 0, 0).unwrap(),
            metadata,
        )
    }

    #[test]
    fn render_index_and_type() {
        let search = CompiledSearch::compile(
            "logstash-{{ time | strftime('%Y.%m.%d') }}",
            "{{ metadata.service }}",
            &QueryTemplate::Raw(String::new()),
        )
        .unwrap();

        let request = search.render(&context()).unwrap();
        assert_eq!(request.index, "logstash-2026.02.16");
        assert_eq!(request.doc_type, "checkout");
        assert_eq!(request.query, json!({}));
    }

    #[test]
    fn structured_query_substitutes_only_templated_fields() {
        let template = json!({
            "query": {
                "bool": {
                    "filter": [
                        {"range": {"ts": {"gte": "{{ time }}"}}},
                        {"term": {"service": "{{ metadata.service }}"}}
                    ]
                }
            },
            "size": 10,
            "sort": [{"ts": "desc"}]
        });
        let search =
            CompiledSearch::compile("logs", "", &QueryTemplate::Structured(template)).unwrap();

        let request = search.render(&context()).unwrap();
        assert_eq!(
            request.query,
            json!({
                "query": {
                    "bool": {
                        "filter": [
                            {"range": {"ts": {"gte": "2026-02-16T12:00:00Z"}}},
                            {"term": {"service": "checkout"}}
                        ]
                    }
                },
                "size": 10,
                "sort": [{"ts": "desc"}]
            })
        );
    }

    #[test]
    fn structured_query_keeps_quotes_and_backslashes_in_values() {
        let mut ctx = context();
        ctx.metadata
            .insert("msg".to_string(), json!(r#"say "hi" to C:\logs"#));
        let template = json!({"query": {"match": {"m": "{{ metadata.msg }}"}}, "size": 1});
        let search =
            CompiledSearch::compile("logs", "", &QueryTemplate::Structured(template)).unwrap();

        let request = search.render(&ctx).unwrap();
        assert_eq!(
            request.query,
            json!({"query": {"match": {"m": r#"say "hi" to C:\logs"#}}, "size": 1})
        );
    }

    #[test]
    fn structured_query_keys_are_not_templated() {
        let template = json!({"{{ name }}": ["{{ name }}", 3, null, {"k": "plain"}]});
        let search =
            CompiledSearch::compile("logs", "", &QueryTemplate::Structured(template)).unwrap();

        let request = search.render(&context()).unwrap();
        assert_eq!(
            request.query,
            json!({"{{ name }}": ["error-spike", 3, null, {"k": "plain"}]})
        );
    }

    #[test]
    fn compile_rejects_bad_structured_leaf() {
        let template = json!({"query": {"term": {"host": "{{ metadata.host "}}});
        let err = CompiledSearch::compile("logs", "", &QueryTemplate::Structured(template))
            .unwrap_err();
        assert!(matches!(
            err,
            CompileError::Syntax {
                template: QUERY_TEMPLATE,
                ..
            }
        ));
    }

    #[test]
    fn raw_yaml_query_is_parsed() {
        let raw = "query:\n  term:\n    rule: \"{{ name }}\"\nsize: {{ metadata.threshold }}\n";
        let search =
            CompiledSearch::compile("logs", "", &QueryTemplate::Raw(raw.to_string())).unwrap();

        let request = search.render(&context()).unwrap();
        assert_eq!(
            request.query,
            json!({"query": {"term": {"rule": "error-spike"}}, "size": 5})
        );
    }

    #[test]
    fn raw_json_query_is_parsed() {
        let raw = r#"{"query": {"range": {"ts": {"gte": {{ started_ts }}}}}}"#;
        let search =
            CompiledSearch::compile("logs", "", &QueryTemplate::Raw(raw.to_string())).unwrap();

        let request = search.render(&context()).unwrap();
        assert_eq!(request.query["query"]["range"]["ts"]["gte"], 1_771_243_200);
    }

    #[test]
    fn compile_rejects_bad_index_template() {
        let err = CompiledSearch::compile("logs-{{ unclosed", "", &QueryTemplate::Raw(String::new()))
            .unwrap_err();
        assert!(matches!(
            err,
            CompileError::Syntax {
                template: INDEX_TEMPLATE,
                ..
            }
        ));
    }

    #[test]
    fn compile_rejects_bad_query_template() {
        let err = CompiledSearch::compile(
            "logs",
            "",
            &QueryTemplate::Raw("{% if %}".to_string()),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            CompileError::Syntax {
                template: QUERY_TEMPLATE,
                ..
            }
        ));
    }

    #[test]
    fn render_fails_when_query_is_not_a_document() {
        let search = CompiledSearch::compile(
            "logs",
            "",
            &QueryTemplate::Raw("{ unbalanced: [ {{ name }}".to_string()),
        )
        .unwrap();
        assert!(matches!(
            search.render(&context()),
            Err(RenderError::Query(_))
        ));
    }

    #[test]
    fn render_fails_on_bad_strftime_input() {
        let search = CompiledSearch::compile(
            "{{ name | strftime('%Y') }}",
            "",
            &QueryTemplate::Raw(String::new()),
        )
        .unwrap();
        assert!(matches!(
            search.render(&context()),
            Err(RenderError::Template {
                template: INDEX_TEMPLATE,
                ..
            })
        ));
    }
}
