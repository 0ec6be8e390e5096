//! # Batch Query Builder
//!
//! For every project at index `i` the document gets one aliased block
//! `item<i>` and two variables `owner<i>` / `name<i>`. The alias table is kept
//! next to the document so the response is mapped back by data, never by
//! re-parsing alias strings.

use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt::Write as _;

use crate::error::FetchError;
use crate::projects::Project;

/// Name of the GraphQL operation.
const OPERATION_NAME: &str = "RepositoryMetrics";

/// Selection requested for each repository. `starCount` aliases the
/// provider's `stargazerCount`.
const REPOSITORY_FIELDS: &[&str] = &["name", "starCount: stargazerCount", "forkCount"];

/// One row of the index-to-identity table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AliasEntry {
    /// Block alias in the document and key in the response `data` object.
    pub alias: String,
    /// Position in the registry.
    pub index: usize,
    /// The project the block asks for.
    pub project: Project,
}

/// A ready-to-send batch: document text, variable bindings and alias table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchQuery {
    /// GraphQL document text.
    pub document: String,
    /// `owner<i>` / `name<i>` bindings. Ordered for deterministic output.
    pub variables: BTreeMap<String, String>,
    /// One entry per aliased block, in registry order.
    pub aliases: Vec<AliasEntry>,
}

impl BatchQuery {
    /// Number of aliased blocks (and of tracked projects).
    pub fn len(&self) -> usize {
        self.aliases.len()
    }

    /// Always false for a successfully built query.
    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty()
    }

    /// The `{query, variables}` JSON body posted to the provider.
    pub fn request_body(&self) -> Value {
        serde_json::json!({
            "query": self.document,
            "variables": self.variables,
        })
    }
}

/// Alias of the block for the project at `index`.
pub fn block_alias(index: usize) -> String {
    format!("item{index}")
}

/// Builds the batch query for `projects`, in order.
///
/// Pure and deterministic. Fails with [`FetchError::EmptyBatch`] when there
/// is nothing to ask for.
pub fn build(projects: &[Project]) -> Result<BatchQuery, FetchError> {
    if projects.is_empty() {
        return Err(FetchError::EmptyBatch);
    }

    let mut signature = Vec::with_capacity(projects.len() * 2);
    let mut body = String::new();
    let mut variables = BTreeMap::new();
    let mut aliases = Vec::with_capacity(projects.len());

    for (index, project) in projects.iter().enumerate() {
        let alias = block_alias(index);
        let owner_var = format!("owner{index}");
        let name_var = format!("name{index}");

        signature.push(format!("${owner_var}: String!"));
        signature.push(format!("${name_var}: String!"));

        // Writing into a String cannot fail.
        let _ = writeln!(
            body,
            "  {alias}: repository(owner: ${owner_var}, name: ${name_var}) {{"
        );
        for field in REPOSITORY_FIELDS {
            let _ = writeln!(body, "    {field}");
        }
        body.push_str("  }\n");

        variables.insert(owner_var, project.owner.clone());
        variables.insert(name_var, project.name.clone());
        aliases.push(AliasEntry {
            alias,
            index,
            project: project.clone(),
        });
    }

    let document = format!(
        "query {OPERATION_NAME}({}) {{\n{body}}}\n",
        signature.join(", ")
    );

    Ok(BatchQuery {
        document,
        variables,
        aliases,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn projects(n: usize) -> Vec<Project> {
        (0..n)
            .map(|i| Project::new(format!("owner-{i}"), format!("repo-{i}")))
            .collect()
    }

    #[test]
    fn test_empty_input_is_rejected() {
        assert!(matches!(build(&[]), Err(FetchError::EmptyBatch)));
    }

    #[test]
    fn test_block_and_parameter_counts_match_input() {
        for n in [1usize, 2, 7, 12] {
            let q = build(&projects(n)).unwrap();
            assert_eq!(q.len(), n);
            assert_eq!(q.variables.len(), 2 * n);
            assert_eq!(q.document.matches(": repository(").count(), n);
            assert_eq!(q.document.matches(": String!").count(), 2 * n);

            for i in 0..n {
                // Each alias is declared exactly once; `item1: ` must not
                // also count `item11: `, hence the leading indentation.
                assert_eq!(q.document.matches(&format!("  item{i}: ")).count(), 1);
                assert_eq!(q.document.matches(&format!("$owner{i}: String!")).count(), 1);
                assert_eq!(q.document.matches(&format!("$name{i}: String!")).count(), 1);
                assert_eq!(q.aliases[i].alias, format!("item{i}"));
                assert_eq!(q.aliases[i].index, i);
            }
        }
    }

    #[test]
    fn test_bindings_follow_projects() {
        let input = vec![Project::new("octo", "hello"), Project::new("octo", "world")];
        let q = build(&input).unwrap();
        assert_eq!(q.variables["owner0"], "octo");
        assert_eq!(q.variables["name0"], "hello");
        assert_eq!(q.variables["owner1"], "octo");
        assert_eq!(q.variables["name1"], "world");
        assert_eq!(q.aliases[1].project, input[1]);
    }

    #[test]
    fn test_document_layout() {
        let q = build(&[Project::new("octo", "hello")]).unwrap();
        let expected = "query RepositoryMetrics($owner0: String!, $name0: String!) {\n\
                        \x20 item0: repository(owner: $owner0, name: $name0) {\n\
                        \x20   name\n\
                        \x20   starCount: stargazerCount\n\
                        \x20   forkCount\n\
                        \x20 }\n\
                        }\n";
        assert_eq!(q.document, expected);
    }

    #[test]
    fn test_signature_declares_in_index_order() {
        let q = build(&projects(3)).unwrap();
        let header = q.document.lines().next().unwrap();
        assert_eq!(
            header,
            "query RepositoryMetrics($owner0: String!, $name0: String!, \
             $owner1: String!, $name1: String!, $owner2: String!, $name2: String!) {"
        );
    }

    #[test]
    fn test_build_is_deterministic() {
        let input = projects(5);
        let a = build(&input).unwrap();
        let b = build(&input).unwrap();
        assert_eq!(a.document.as_bytes(), b.document.as_bytes());
        assert_eq!(a.variables, b.variables);
        assert_eq!(
            serde_json::to_string(&a.request_body()).unwrap(),
            serde_json::to_string(&b.request_body()).unwrap()
        );
    }

    #[test]
    fn test_duplicate_projects_get_distinct_aliases() {
        let dup = Project::new("octo", "hello");
        let q = build(&[dup.clone(), dup]).unwrap();
        assert_eq!(q.aliases[0].alias, "item0");
        assert_eq!(q.aliases[1].alias, "item1");
        assert_eq!(q.variables.len(), 4);
    }

    #[test]
    fn test_request_body_shape() {
        let q = build(&[Project::new("octo", "hello")]).unwrap();
        let body = q.request_body();
        assert_eq!(body["query"], Value::String(q.document.clone()));
        assert_eq!(body["variables"]["owner0"], "octo");
        assert_eq!(body["variables"]["name0"], "hello");
    }
}
